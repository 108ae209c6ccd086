#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # xsv-bind

 Tag-driven mapping between delimited text (CSV, TSV, any single-byte delimiter) and
 strongly-typed Rust records.

 ## Core Concepts

- **Record description:** a record type declares its fields with [`record!`], each with an
  optional raw tag such as `csv:"name|alias,omitempty,default=x"`. The description tells the
  schema builder how to reach every field without runtime reflection.
- **Schema:** the record type flattened into ordered column descriptors. Nested structs prefix
  their children (`parent.child`), embedded structs do not, and sequences tagged with
  `csv[]:"N"` expand into `name[0]`..`name[N-1]` columns.
- **ItemReader / ItemWriter:** the CSV reader and writer implement these traits, one record at
  a time, with `read_all` / `write_all` for whole batches.
- **Pipeline:** records flow through a bounded channel between a producer thread and a
  consumer, so large inputs are never fully materialized.

 ## Features

| **Feature**   | **Description**                                                        |
|---------------|------------------------------------------------------------------------|
| chrono        | `CsvScalar` impls for `chrono` timestamps and dates (RFC 3339, ISO 8601) |
| full          | Enables all available features                                         |

 ## Getting Started

```rust
use xsv_bind::{
    core::item::ItemReader,
    error::BindError,
    item::csv::{csv_reader::CsvRecordReaderBuilder, csv_writer::CsvRecordWriterBuilder},
    record,
};

#[derive(Debug, Default, Clone, PartialEq)]
struct Car {
    year: u16,
    make: String,
    model: String,
    options: Vec<String>,
}

record! {
    Car {
        year: r#"csv:"year""#,
        make: r#"csv:"make,omitempty""#,
        model: r#"csv:"model""#,
        options: r#"csv:"options""#,
    }
}

fn main() -> Result<(), BindError> {
    let csv = "year,make,model,options
1948,Porsche,356,\"[\"\"convertible\"\"]\"
1995,Peugeot,205,[]";

    let reader = CsvRecordReaderBuilder::<Car>::new()
        .delimiter(b',')
        .has_headers(true)
        .from_reader(csv.as_bytes())?;

    let first = reader.read()?.unwrap_or_default();
    assert_eq!(first.options, vec!["convertible"]);

    let writer = CsvRecordWriterBuilder::<Car>::new()
        .selected_columns(["model", "year"])
        .from_writer(Vec::new());
    writer.write_all(&[first])?;

    assert_eq!(String::from_utf8(writer.into_inner()?).unwrap(), "year,model\n1948,356\n");
    Ok(())
}
```
 */

/// Record description, schema derivation, conversion and configuration
pub mod core;

/// Error types for decoding and encoding
pub mod error;

#[doc(inline)]
pub use error::*;

/// Readers, writers and transports
pub mod item;
