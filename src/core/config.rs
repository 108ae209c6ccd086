//! Per-instance options for readers and writers.
//!
//! The serializable parts live in [`ReadOptions`] and [`WriteOptions`] so they can be loaded
//! from JSON alongside the rest of an application's configuration. Hooks that cannot be
//! serialized (name normalizer, record transforms, error handler) are set on the builders.

use std::{collections::HashMap, fmt, sync::Arc};

use csv::{ReaderBuilder, Terminator, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// How field tags are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagOptions {
    /// Tag key holding the column names.
    pub tag_name: String,
    /// Separates alternative keys inside one tag token.
    pub tag_separator: String,
    /// Joins parent and child keys for nested structs.
    pub key_combiner: String,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            tag_name: "csv".to_string(),
            tag_separator: ",".to_string(),
            key_combiner: ".".to_string(),
        }
    }
}

/// Transformation applied to header names and tag keys before they are compared.
#[derive(Clone)]
pub struct NameNormalizer(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl NameNormalizer {
    pub fn new<F>(normalize: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(normalize))
    }

    pub fn identity() -> Self {
        Self::new(str::to_string)
    }

    /// Case-insensitive matching.
    pub fn lowercase() -> Self {
        Self::new(str::to_lowercase)
    }

    pub fn apply(&self, name: &str) -> String {
        (self.0)(name)
    }
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for NameNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NameNormalizer")
    }
}

/// Everything the schema builder needs.
#[derive(Debug, Clone, Default)]
pub struct SchemaConfig {
    pub tags: TagOptions,
    pub normalizer: NameNormalizer,
}

/// What to do when the same header name appears more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateHeaderPolicy {
    /// Every duplicate binds to the first matching field, so the last column read wins.
    #[default]
    LastWins,
    /// The k-th occurrence binds to the k-th field declaring that name.
    AlignWithFieldOrder,
    /// Reject the input before any record is decoded.
    Fail,
}

/// Inclusive, 1-based window over the data rows (the header is not counted).
///
/// `from` of 0 or 1 starts at the first row; `to` of -1 reads to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowRange {
    pub from: i64,
    pub to: i64,
}

impl Default for RowRange {
    fn default() -> Self {
        Self { from: 1, to: -1 }
    }
}

impl RowRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.from < 0 {
            return Err(ConfigurationError::NegativeFrom(self.from));
        }
        if self.to < -1 {
            return Err(ConfigurationError::InvalidTo(self.to));
        }
        if self.to != -1 && self.from > self.to {
            return Err(ConfigurationError::ToBeforeFrom {
                from: self.from,
                to: self.to,
            });
        }
        Ok(())
    }

    /// Whether the 1-based data row `row` is selected.
    pub fn contains(&self, row: usize) -> bool {
        row as i64 >= self.from.max(1) && !self.is_past_end(row)
    }

    /// Whether `row` and every row after it fall outside the window.
    pub fn is_past_end(&self, row: usize) -> bool {
        self.to != -1 && row as i64 > self.to
    }
}

/// Pass-through options for the underlying `csv` reader and writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvFormat {
    pub delimiter: u8,
    pub quote: u8,
    /// Record terminator. `None` accepts `\r\n`, `\r` and `\n` when reading and writes `\n`.
    pub terminator: Option<u8>,
    /// Trim surrounding whitespace and tolerate ragged rows.
    pub lazy: bool,
    pub flexible: bool,
    /// Write `\r\n` line endings.
    pub use_crlf: bool,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            terminator: None,
            lazy: false,
            flexible: false,
            use_crlf: false,
        }
    }
}

impl CsvFormat {
    /// Tab separated values.
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }

    /// Headers are always handled by this crate, never by `csv` itself.
    pub(crate) fn reader_builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .has_headers(false)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .flexible(self.flexible || self.lazy)
            .trim(if self.lazy { Trim::All } else { Trim::None })
            .terminator(match self.terminator {
                Some(byte) => Terminator::Any(byte),
                None => Terminator::CRLF,
            });
        builder
    }

    pub(crate) fn writer_builder(&self) -> WriterBuilder {
        let mut builder = WriterBuilder::new();
        builder
            .has_headers(false)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .flexible(self.flexible)
            .terminator(if self.use_crlf {
                Terminator::CRLF
            } else {
                Terminator::Any(self.terminator.unwrap_or(b'\n'))
            });
        builder
    }
}

/// Serializable decoding options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub tags: TagOptions,
    pub duplicate_headers: DuplicateHeaderPolicy,
    /// Fail when a required field has no matching header.
    pub fail_if_unmatched: bool,
    pub range: RowRange,
    pub format: CsvFormat,
}

/// Serializable encoding options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub tags: TagOptions,
    pub omit_headers: bool,
    /// Only emit fields whose first key is listed. Empty means every field.
    pub selected_columns: Vec<String>,
    /// `sort_order[i]` is the output position of the i-th emitted column.
    pub sort_order: Vec<usize>,
    /// Header label overrides, keyed by first key.
    pub header_modifier: HashMap<String, String>,
    pub format: CsvFormat,
}

impl ReadOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl WriteOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_range_reads_everything() {
        let range = RowRange::default();
        assert!(range.validate().is_ok());
        assert!(range.contains(1));
        assert!(range.contains(1_000));
    }

    #[test]
    fn range_is_inclusive_and_one_based() {
        let range = RowRange::new(2, 3);
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(3));
        assert!(!range.contains(4));
        assert!(range.is_past_end(4));
        assert!(RowRange::new(0, 2).contains(1));
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert_eq!(
            RowRange::new(-1, 3).validate(),
            Err(ConfigurationError::NegativeFrom(-1))
        );
        assert_eq!(
            RowRange::new(1, -2).validate(),
            Err(ConfigurationError::InvalidTo(-2))
        );
        assert_eq!(
            RowRange::new(4, 2).validate(),
            Err(ConfigurationError::ToBeforeFrom { from: 4, to: 2 })
        );
        assert!(RowRange::new(4, -1).validate().is_ok());
    }

    #[test]
    fn options_load_from_partial_json() {
        let options = ReadOptions::from_json(
            r#"{"duplicate_headers":"AlignWithFieldOrder","range":{"from":2},"format":{"delimiter":59}}"#,
        )
        .unwrap();
        assert_eq!(
            options.duplicate_headers,
            DuplicateHeaderPolicy::AlignWithFieldOrder
        );
        assert_eq!(options.range, RowRange::new(2, -1));
        assert_eq!(options.format.delimiter, b';');
        assert_eq!(options.tags.tag_name, "csv");

        let options = WriteOptions::from_json(r#"{"omit_headers":true,"sort_order":[1,0]}"#)
            .unwrap();
        assert!(options.omit_headers);
        assert_eq!(options.sort_order, vec![1, 0]);
    }

    #[test]
    fn normalizers() {
        assert_eq!(NameNormalizer::identity().apply("Foo"), "Foo");
        assert_eq!(NameNormalizer::lowercase().apply("Foo"), "foo");
        let trimmed = NameNormalizer::new(|name| name.trim().to_string());
        assert_eq!(trimmed.apply("  Bar "), "Bar");
    }
}
