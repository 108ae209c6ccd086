//! Record fixtures shared by the integration tests.
#![allow(dead_code)]

pub mod mocks;

pub use mocks::{MockSink, failing_sink};

use std::fmt;

use xsv_bind::{BoxError, core::scalar::CsvScalar, record, scalar};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Sample {
    pub foo: String,
    pub bar: i32,
    pub baz: String,
    pub frop: f64,
    pub blah: Option<i32>,
    pub sptr: Option<String>,
    pub omit: Option<String>,
}

record! {
    Sample {
        foo: r#"csv:"foo""#,
        bar: r#"csv:"BAR""#,
        baz: r#"csv:"Baz""#,
        frop: r#"csv:"Quux""#,
        blah: r#"csv:"Blah""#,
        sptr: r#"csv:"SPtr""#,
        omit: r#"csv:"Omit,omitempty""#,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EmbedSample {
    pub qux: String,
    pub sample: Sample,
    pub ignore: String,
    pub grault: f64,
    pub quux: String,
}

record! {
    EmbedSample {
        qux: r#"csv:"first""#,
        #[embed] sample,
        ignore: r#"csv:"-""#,
        grault: r#"csv:"garply""#,
        quux: r#"csv:"last""#,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EmbedPtrSample {
    pub qux: String,
    pub sample: Option<Sample>,
    pub ignore: String,
    pub grault: f64,
    pub quux: String,
}

record! {
    EmbedPtrSample {
        qux: r#"csv:"first""#,
        #[embed] sample,
        ignore: r#"csv:"-""#,
        grault: r#"csv:"garply""#,
        quux: r#"csv:"last""#,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SkipFieldSample {
    pub embed: EmbedSample,
    pub more_ignore: String,
    pub corge: String,
}

record! {
    SkipFieldSample {
        #[embed] embed,
        more_ignore: r#"csv:"-""#,
        corge: r#"csv:"abc""#,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SliceSample {
    pub slice: Vec<i32>,
}

record! { SliceSample { slice: r#"csv:"Slice""# } }

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SliceStruct {
    pub string: String,
    pub float: f64,
}

record! {
    SliceStruct {
        string: r#"csv:"s,string""#,
        float: r#"csv:"f,float""#,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SliceStructSample {
    pub slice: Vec<SliceStruct>,
    pub simple_slice: Vec<i32>,
    pub array: [SliceStruct; 2],
}

record! {
    SliceStructSample {
        slice: r#"csv:"s,slice" csv[]:"2""#,
        simple_slice: r#"csv:"ints" csv[]:"3""#,
        array: r#"csv:"a,array" csv[]:"2""#,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ObservedSample {
    pub key: String,
    pub items: Vec<i32>,
}

record! {
    ObservedSample {
        key: r#"csv:"key""#,
        items: r#"csv:"item" csv[]:"*""#,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct IndexedInts {
    pub id: i32,
    pub ints: Vec<i32>,
}

record! {
    IndexedInts {
        id: r#"csv:"id""#,
        ints: r#"csv:"ints" csv[]:"2""#,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InnerStruct {
    pub bool_ignore_field0: bool,
    pub bool_field1: bool,
    pub string_field2: String,
}

record! {
    InnerStruct {
        bool_ignore_field0: r#"csv:"-""#,
        bool_field1: r#"csv:"boolField1""#,
        string_field2: r#"csv:"stringField2""#,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NestedEmbedSample {
    pub inner: InnerStruct,
}

record! { NestedEmbedSample { #[embed] inner } }

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NestedSample {
    pub inner1: InnerStruct,
    pub inner2: InnerStruct,
    pub inner_ignore: InnerStruct,
    pub inner3: NestedEmbedSample,
}

record! {
    NestedSample {
        inner1: r#"csv:"one""#,
        inner2: r#"csv:"two""#,
        inner_ignore: r#"csv:"-""#,
        inner3: r#"csv:"three""#,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MultiTagSample {
    pub foo: String,
    pub bar: i32,
}

record! { MultiTagSample { foo: r#"csv:"Baz,foo""#, bar: r#"csv:"BAR""# } }

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TagSeparatorSample {
    pub foo: String,
    pub bar: i32,
}

record! { TagSeparatorSample { foo: r#"csv:"Baz|foo""#, bar: r#"csv:"BAR""# } }

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CustomTagSample {
    pub foo: String,
    pub bar: i32,
}

record! { CustomTagSample { foo: r#"custom:"foo""#, bar: r#"csv:"BAR" custom:"bar""# } }

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DefaultSample {
    pub id: i32,
    pub name: String,
    pub note: Option<String>,
}

record! {
    DefaultSample {
        id: r#"csv:"id,default=1""#,
        name: r#"csv:" name , default=anonymous ""#,
        note: r#"csv:"note , omitempty""#,
    }
}

#[derive(Debug)]
pub struct UnmarshalError(pub String);

impl fmt::Display for UnmarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UnmarshalError {}

#[derive(Debug)]
pub struct MarshalError(pub String);

impl fmt::Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MarshalError {}

/// Float written with a decimal comma.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DecimalComma(pub f64);

impl CsvScalar for DecimalComma {
    fn from_csv(text: &str) -> Result<Self, BoxError> {
        if text == "4.2" {
            return Err(Box::new(UnmarshalError(
                "Test error: Invalid float 4.2".to_string(),
            )));
        }
        Ok(DecimalComma(text.replace(',', ".").parse()?))
    }

    fn to_csv(&self) -> Result<String, BoxError> {
        if self.0 == 4.2 {
            return Err(Box::new(MarshalError(
                "Test error: Invalid float 4.2".to_string(),
            )));
        }
        Ok(format!("{:.1}", self.0).replace('.', ","))
    }
}

scalar!(DecimalComma);

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RenamedSample {
    pub renamed_float_unmarshaler: DecimalComma,
    pub renamed_float_default: f64,
}

record! {
    RenamedSample {
        renamed_float_unmarshaler: r#"csv:"foo""#,
        renamed_float_default: r#"csv:"bar""#,
    }
}

/// Seconds and nanoseconds rendered as one `seconds.nanos` cell.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl CsvScalar for Timestamp {
    fn from_csv(text: &str) -> Result<Self, BoxError> {
        let (seconds, nanos) = text.split_once('.').unwrap_or((text, "0"));
        Ok(Timestamp {
            seconds: seconds.parse()?,
            nanos: nanos.parse()?,
        })
    }

    fn to_csv(&self) -> Result<String, BoxError> {
        Ok(format!("{}.{}", self.seconds, self.nanos))
    }
}

scalar!(Timestamp);

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EmbedMarshalCsv {
    pub symbol: String,
    pub timestamp: Option<Timestamp>,
}

record! {
    EmbedMarshalCsv {
        symbol: r#"csv:"symbol""#,
        timestamp: r#"csv:"timestamp""#,
    }
}

/// Decoded column by column through a single hook.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct KeyedSample {
    pub foo: String,
    pub bar: i32,
    pub baz: String,
    pub frop: f64,
}

fn decode_keyed(record: &mut KeyedSample, key: &str, value: &str) -> Result<(), BoxError> {
    match key {
        "foo" => record.foo = value.to_uppercase(),
        "bar" => record.bar = value.parse::<i32>()? * 10,
        "baz" => record.baz = value.chars().rev().collect(),
        "frop" => record.frop = value.parse::<f64>()? * 100.0,
        _ => {}
    }
    Ok(())
}

record! {
    KeyedSample {
        foo: r#"csv:"foo""#,
        bar: r#"csv:"bar""#,
        baz: r#"csv:"baz""#,
        frop: r#"csv:"frop""#,
    } keyed = decode_keyed
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DuplicateSample {
    pub first: String,
    pub second: String,
    pub code: i32,
}

record! {
    DuplicateSample {
        first: r#"csv:"name""#,
        second: r#"csv:"name""#,
        code: r#"csv:"code""#,
    }
}

#[cfg(feature = "chrono")]
pub mod dated {
    use chrono::{DateTime, NaiveDate, Utc};
    use xsv_bind::record;

    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Event {
        pub name: String,
        pub at: DateTime<Utc>,
        pub day: NaiveDate,
        pub ended: Option<DateTime<Utc>>,
    }

    record! {
        Event {
            name: r#"csv:"name""#,
            at: r#"csv:"at""#,
            day: r#"csv:"day""#,
            ended: r#"csv:"ended""#,
        }
    }
}

pub fn sample_rows() -> Vec<Sample> {
    vec![
        Sample {
            foo: "f".to_string(),
            bar: 1,
            baz: "baz".to_string(),
            frop: 0.1,
            blah: Some(2),
            sptr: Some("*string".to_string()),
            omit: None,
        },
        Sample {
            foo: "e".to_string(),
            bar: 3,
            baz: "b".to_string(),
            frop: 6.0 / 13.0,
            blah: None,
            sptr: None,
            omit: None,
        },
    ]
}

/// Splits CSV output into rows of cells.
pub fn lines(output: &[u8]) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(output);
    reader
        .records()
        .map(|record| {
            record
                .expect("valid csv output")
                .iter()
                .map(str::to_string)
                .collect()
        })
        .collect()
}
