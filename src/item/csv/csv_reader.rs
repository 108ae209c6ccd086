use std::{
    any::Any,
    cell::RefCell,
    fs::File,
    io::Read,
    marker::PhantomData,
    path::Path,
    sync::Arc,
};

use csv::{Reader, StringRecord};
use log::{debug, info, trace, warn};

use crate::{
    core::{
        codec,
        config::{DuplicateHeaderPolicy, NameNormalizer, ReadOptions, RowRange, SchemaConfig},
        item::{ItemReader, ItemReaderResult},
        matcher::HeaderBinding,
        reflect::Reflect,
        schema::Schema,
    },
    error::{BindError, ConfigurationError, ConversionError},
};

/// Transformation applied to every decoded record before it is returned.
pub type RecordTransform<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// Called for every conversion error. Returning `true` suppresses the error and decoding
/// carries on with the next cell.
pub type ErrorHandler = Arc<dyn Fn(&BindError) -> bool + Send + Sync>;

/// A CSV record reader that implements the `ItemReader` trait.
///
/// Rows are decoded into `T` through the field descriptors derived from `T`'s
/// [`Reflect`] description. The header row, when present, decides which column feeds
/// which field; without a header columns are taken in declaration order.
///
/// # Type Parameters
///
/// - `R`: The type of reader providing the CSV data. Must implement `Read`.
/// - `T`: The record type. Must implement `Reflect` and `Default`.
///
/// # Implementation Details
///
/// - Uses `RefCell`s so records can be pulled through `&self`
/// - The header is bound on the first read, so header errors surface before any record
/// - Rows outside the configured [`RowRange`] are skipped, and reading stops after its end
/// - Row numbers in errors are absolute line numbers, counting the header
///
/// # Examples
///
/// ```
/// use xsv_bind::item::csv::csv_reader::CsvRecordReaderBuilder;
/// use xsv_bind::core::item::ItemReader;
/// use xsv_bind::record;
///
/// #[derive(Debug, Default)]
/// struct Record {
///     name: String,
///     value: i32,
/// }
///
/// record! { Record { name: r#"csv:"name""#, value: r#"csv:"value""# } }
///
/// let data = "\
/// name,value
/// foo,123
/// bar,456
/// ";
///
/// let reader = CsvRecordReaderBuilder::<Record>::new()
///     .has_headers(true)
///     .from_reader(data.as_bytes())
///     .unwrap();
///
/// let record = reader.read().unwrap().unwrap();
/// assert_eq!(record.name, "foo");
/// assert_eq!(record.value, 123);
///
/// let record = reader.read().unwrap().unwrap();
/// assert_eq!(record.name, "bar");
/// assert_eq!(record.value, 456);
///
/// assert!(reader.read().unwrap().is_none());
/// ```
pub struct CsvRecordReader<R, T> {
    reader: RefCell<Reader<R>>,
    schema: Schema,
    options: ReadOptions,
    has_headers: bool,
    normalizer: NameNormalizer,
    on_record: Option<RecordTransform<T>>,
    error_handler: Option<ErrorHandler>,
    state: RefCell<ReadState>,
}

#[derive(Default)]
struct ReadState {
    binding: Option<HeaderBinding>,
    headers: Vec<String>,
    record: StringRecord,
    rows_seen: usize,
    finished: bool,
}

impl<R: Read, T: Reflect + Default> ItemReader<T> for CsvRecordReader<R, T> {
    /// Reads and decodes the next selected row.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` when a row was decoded
    /// - `Ok(None)` at the end of the input or of the row range
    /// - `Err(BindError)` on malformed CSV, header problems or an unsuppressed conversion error
    fn read(&self) -> ItemReaderResult<T> {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        if state.finished {
            return Ok(None);
        }

        let mut reader = self.reader.borrow_mut();
        if state.binding.is_none() {
            let binding = self.bind(&mut reader, state)?;
            state.binding = Some(binding);
        }

        loop {
            if !reader.read_record(&mut state.record)? {
                state.finished = true;
                if state.rows_seen == 0 && !self.has_headers {
                    return Err(BindError::EmptyInput);
                }
                return Ok(None);
            }
            state.rows_seen += 1;
            let row = state.rows_seen;

            if self.options.range.is_past_end(row) {
                debug!("row range ends before data row {row}, stopping");
                state.finished = true;
                return Ok(None);
            }
            if !self.options.range.contains(row) {
                continue;
            }

            let Some(binding) = state.binding.as_ref() else {
                return Ok(None);
            };
            let record = self.assemble(binding, &state.record, self.line_number(row))?;
            trace!("decoded data row {row}");
            return Ok(Some(match &self.on_record {
                Some(transform) => transform(record),
                None => record,
            }));
        }
    }
}

impl<R: Read, T: Reflect + Default> CsvRecordReader<R, T> {
    /// Decodes every remaining selected row.
    pub fn read_all(&self) -> Result<Vec<T>, BindError> {
        let mut records = Vec::new();
        while let Some(record) = self.read()? {
            records.push(record);
        }
        info!(
            "decoded {} records of {}",
            records.len(),
            self.schema.type_name()
        );
        Ok(records)
    }

    /// Header names as read from the input, before normalization. Empty for headerless input.
    pub fn headers(&self) -> Result<Vec<String>, BindError> {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        if state.binding.is_none() {
            let binding = self.bind(&mut self.reader.borrow_mut(), state)?;
            state.binding = Some(binding);
        }
        Ok(state.headers.clone())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn bind(&self, reader: &mut Reader<R>, state: &mut ReadState) -> Result<HeaderBinding, BindError> {
        if !self.has_headers {
            return Ok(HeaderBinding::positional(&self.schema));
        }
        if !reader.read_record(&mut state.record)? {
            return Err(BindError::EmptyInput);
        }

        let headers: Vec<String> = state
            .record
            .iter()
            .map(|header| self.normalizer.apply(header))
            .collect();
        let binding = HeaderBinding::bind(&headers, &self.schema, self.options.duplicate_headers)?;

        let missing = binding.unmatched_required(&self.schema);
        if !missing.is_empty() {
            if self.options.fail_if_unmatched {
                return Err(ConfigurationError::MissingFields(missing).into());
            }
            warn!(
                "{} fields of {} have no matching header: {:?}",
                missing.len(),
                self.schema.type_name(),
                missing
            );
        }

        state.headers = state.record.iter().map(str::to_string).collect();
        Ok(binding)
    }

    fn assemble(
        &self,
        binding: &HeaderBinding,
        row: &StringRecord,
        line: usize,
    ) -> Result<T, BindError> {
        let mut record = T::default();
        let keyed = self.schema.keyed_decoder();
        for (index, cell) in row.iter().enumerate() {
            let Some(field) = binding.get(index) else {
                continue;
            };
            let result = match keyed {
                Some(decoder) => decoder(&mut record as &mut dyn Any, field.first_key(), cell)
                    .map_err(ConversionError::Hook),
                None => codec::assign(&mut record, self.schema.root(), field, cell),
            };
            if let Err(source) = result {
                let error = source.at(line, index + 1);
                match &self.error_handler {
                    Some(handler) if handler(&error) => warn!("suppressed: {error}"),
                    _ => return Err(error),
                }
            }
        }
        Ok(record)
    }

    fn line_number(&self, row: usize) -> usize {
        if self.has_headers { row + 1 } else { row }
    }
}

/// A builder for configuring CSV record reading.
///
/// This builder allows you to customize the CSV reading behavior, including delimiter,
/// header handling, tag interpretation, row range and decoding hooks.
///
/// # Examples
///
/// ```
/// use xsv_bind::item::csv::csv_reader::CsvRecordReaderBuilder;
/// use xsv_bind::core::config::DuplicateHeaderPolicy;
/// use xsv_bind::record;
///
/// #[derive(Debug, Default)]
/// struct Row {
///     id: u32,
///     label: String,
/// }
///
/// record! { Row { id: r#"csv:"id""#, label: r#"csv:"label|name""# } }
///
/// let data = "id;name\n1;one\n2;two\n3;three\n";
///
/// let reader = CsvRecordReaderBuilder::<Row>::new()
///     .delimiter(b';')
///     .tag_separator("|")
///     .duplicate_headers(DuplicateHeaderPolicy::Fail)
///     .range(2, 3)
///     .from_reader(data.as_bytes())
///     .unwrap();
///
/// let rows = reader.read_all().unwrap();
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0].label, "two");
/// ```
pub struct CsvRecordReaderBuilder<T> {
    options: ReadOptions,
    has_headers: bool,
    normalizer: NameNormalizer,
    on_record: Option<RecordTransform<T>>,
    error_handler: Option<ErrorHandler>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for CsvRecordReaderBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CsvRecordReaderBuilder<T> {
    /// Creates a new builder with default settings: comma delimiter, header row expected,
    /// `csv` tag name, every row selected.
    pub fn new() -> Self {
        Self {
            options: ReadOptions::default(),
            has_headers: true,
            normalizer: NameNormalizer::identity(),
            on_record: None,
            error_handler: None,
            _marker: PhantomData,
        }
    }

    /// Replaces every serializable option at once.
    pub fn options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.options.format.delimiter = delimiter;
        self
    }

    pub fn quote(mut self, quote: u8) -> Self {
        self.options.format.quote = quote;
        self
    }

    pub fn terminator(mut self, terminator: u8) -> Self {
        self.options.format.terminator = Some(terminator);
        self
    }

    /// Trims whitespace around fields and accepts rows of uneven length.
    pub fn lazy(mut self, yes: bool) -> Self {
        self.options.format.lazy = yes;
        self
    }

    pub fn flexible(mut self, yes: bool) -> Self {
        self.options.format.flexible = yes;
        self
    }

    /// Sets whether the first row holds column names.
    pub fn has_headers(mut self, yes: bool) -> Self {
        self.has_headers = yes;
        self
    }

    pub fn tag_name(mut self, tag_name: &str) -> Self {
        self.options.tags.tag_name = tag_name.to_string();
        self
    }

    pub fn tag_separator(mut self, separator: &str) -> Self {
        self.options.tags.tag_separator = separator.to_string();
        self
    }

    pub fn key_combiner(mut self, combiner: &str) -> Self {
        self.options.tags.key_combiner = combiner.to_string();
        self
    }

    /// Function applied to header names and tag keys before they are compared.
    pub fn name_normalizer<F>(mut self, normalize: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.normalizer = NameNormalizer::new(normalize);
        self
    }

    pub fn duplicate_headers(mut self, policy: DuplicateHeaderPolicy) -> Self {
        self.options.duplicate_headers = policy;
        self
    }

    pub fn fail_if_unmatched(mut self, yes: bool) -> Self {
        self.options.fail_if_unmatched = yes;
        self
    }

    /// Selects data rows `from..=to` (1-based, header excluded). `to` of -1 reads to the end.
    pub fn range(mut self, from: i64, to: i64) -> Self {
        self.options.range = RowRange::new(from, to);
        self
    }

    pub fn on_record<F>(mut self, transform: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.on_record = Some(Arc::new(transform));
        self
    }

    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&BindError) -> bool + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }
}

impl<T: Reflect + Default> CsvRecordReaderBuilder<T> {
    /// Builds a reader over any `Read` source.
    ///
    /// # Errors
    ///
    /// Fails fast with a configuration error for an invalid row range and with a schema
    /// error when `T` has no taggable fields.
    pub fn from_reader<R: Read>(self, rdr: R) -> Result<CsvRecordReader<R, T>, BindError> {
        let reader = self.options.format.reader_builder().from_reader(rdr);
        self.build(reader)
    }

    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvRecordReader<File, T>, BindError> {
        let reader = self.options.format.reader_builder().from_path(path)?;
        self.build(reader)
    }

    fn build<R: Read>(self, reader: Reader<R>) -> Result<CsvRecordReader<R, T>, BindError> {
        self.options.range.validate()?;
        let config = SchemaConfig {
            tags: self.options.tags.clone(),
            normalizer: self.normalizer.clone(),
        };
        let schema = Schema::for_decoding::<T>(&config)?;

        Ok(CsvRecordReader {
            reader: RefCell::new(reader),
            schema,
            options: self.options,
            has_headers: self.has_headers,
            normalizer: self.normalizer,
            on_record: self.on_record,
            error_handler: self.error_handler,
            state: RefCell::new(ReadState::default()),
        })
    }
}
