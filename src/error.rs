use thiserror::Error;

/// Boxed error produced by user hooks (custom scalar codecs, keyed decoders, callbacks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
/// Error returned by every decode and encode entry point.
pub enum BindError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A single cell could not be converted. `row` and `column` are 1-based and count the
    /// header line when one was consumed.
    #[error("parse error on row {row}, column {column}: {source}")]
    Conversion {
        row: usize,
        column: usize,
        #[source]
        source: ConversionError,
    },

    #[error("channel is closed")]
    ChannelClosed,

    #[error("empty csv input")]
    EmptyInput,

    #[error("callback failed: {0}")]
    Callback(BoxError),

    #[error("pipeline producer panicked")]
    ProducerPanicked,

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BindError {
    /// Returns `(row, column)` for conversion errors.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            BindError::Conversion { row, column, .. } => Some((*row, *column)),
            _ => None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("no taggable fields found in {type_name}")]
    NoTaggableFields { type_name: &'static str },

    #[error("cannot use {type_name}, only struct or optional struct supported")]
    NotAStruct { type_name: &'static str },

    #[error("maps can only be created for csv of two columns, found {found}")]
    TwoColumnsRequired { found: usize },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("\"from\" cannot be set to a negative value ({0})")]
    NegativeFrom(i64),

    #[error("\"to\" cannot be set to a negative value other than -1 ({0})")]
    InvalidTo(i64),

    #[error("\"to\" ({to}) cannot be set before \"from\" ({from})")]
    ToBeforeFrom { from: i64, to: i64 },

    #[error("the length of the sort order ({found}) should be equal to the number of columns to be output ({expected})")]
    SortOrderLength { expected: usize, found: usize },

    #[error("sort order {0:?} is not a permutation of the output columns")]
    SortOrderNotPermutation(Vec<usize>),

    #[error("repeated header name: {0}")]
    DuplicateHeader(String),

    #[error("found unmatched struct fields with keys {0:?}")]
    MissingFields(Vec<Vec<String>>),
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("cannot parse {value:?} as {type_name}: {source}")]
    Parse {
        value: String,
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("cannot format {type_name}: {source}")]
    Format {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("custom hook failed: {0}")]
    Hook(#[source] BoxError),

    #[error("invalid list literal {value:?}: {source}")]
    List {
        value: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("index {index} out of bounds for sequence of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("value is not a {expected}")]
    TypeMismatch { expected: &'static str },
}

impl ConversionError {
    pub(crate) fn at(self, row: usize, column: usize) -> BindError {
        BindError::Conversion {
            row,
            column,
            source: self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_errors_expose_their_position() {
        let err = ConversionError::TypeMismatch { expected: "i32" }.at(3, 2);
        assert_eq!(err.position(), Some((3, 2)));
        assert_eq!(
            err.to_string(),
            "parse error on row 3, column 2: value is not a i32"
        );
        assert_eq!(BindError::ChannelClosed.position(), None);
    }
}
