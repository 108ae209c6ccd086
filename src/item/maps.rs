//! Map-shaped conveniences: two-column files as dictionaries, and header-keyed rows.

use std::{
    any::Any,
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    hash::Hash,
    io::{Read, Write},
    sync::Arc,
};

use ::csv::{Reader, StringRecord};
use log::{debug, info};

use crate::{
    core::{
        codec,
        config::{CsvFormat, RowRange},
        item::{ItemReader, ItemReaderResult},
        reflect::Reflect,
    },
    error::{BindError, SchemaError},
};

/// A row keyed by header name.
pub type MapRow = HashMap<String, String>;

pub type MapTransform = Arc<dyn Fn(MapRow) -> MapRow + Send + Sync>;

/// Reads a two-column file into a map, the first column being the key. The header row is
/// required and skipped.
pub fn csv_to_map<R: Read>(rdr: R) -> Result<HashMap<String, String>, BindError> {
    read_map(rdr, &CsvFormat::default())
}

/// Reads a two-column file into a typed map. Keys and values go through the same
/// conversions as record fields, so values may be list literals such as `[1,2]`.
pub fn read_map<K, V, R>(rdr: R, format: &CsvFormat) -> Result<HashMap<K, V>, BindError>
where
    K: Reflect + Default + Eq + Hash,
    V: Reflect + Default,
    R: Read,
{
    let mut reader = format.reader_builder().from_reader(rdr);
    let mut row = StringRecord::new();
    if !reader.read_record(&mut row)? {
        return Err(BindError::EmptyInput);
    }
    if row.len() != 2 {
        return Err(SchemaError::TwoColumnsRequired { found: row.len() }.into());
    }

    let key_shape = K::shape();
    let value_shape = V::shape();
    let mut map = HashMap::new();
    let mut line = 1;
    while reader.read_record(&mut row)? {
        line += 1;
        let mut key = K::default();
        let mut value = V::default();
        let cell = |column: usize| row.get(column).unwrap_or_default();
        codec::decode_value(&mut key as &mut dyn Any, &key_shape, cell(0))
            .map_err(|source| source.at(line, 1))?;
        codec::decode_value(&mut value as &mut dyn Any, &value_shape, cell(1))
            .map_err(|source| source.at(line, 2))?;
        map.insert(key, value);
    }
    debug!("read {} map entries", map.len());
    Ok(map)
}

/// Reads every row into a map keyed by header name.
pub fn csv_to_maps<R: Read>(rdr: R) -> Result<Vec<MapRow>, BindError> {
    CsvMapReaderBuilder::new().from_reader(rdr)?.read_all()
}

/// Writes `rows` with a header. Column order is `columns` when given, otherwise the sorted
/// union of every row's keys. Missing keys are written as empty cells.
pub fn write_maps<W: Write>(
    wtr: W,
    format: &CsvFormat,
    rows: &[MapRow],
    columns: Option<&[String]>,
) -> Result<W, BindError> {
    let columns: Vec<String> = match columns {
        Some(columns) => columns.to_vec(),
        None => rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let mut writer = format.writer_builder().from_writer(wtr);
    writer.write_record(&columns)?;
    for row in rows {
        writer.write_record(
            columns
                .iter()
                .map(|column| row.get(column).map(String::as_str).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    info!("wrote {} map rows", rows.len());
    writer
        .into_inner()
        .map_err(|error| BindError::Io(std::io::Error::new(error.error().kind(), error.error().to_string())))
}

/// Streams rows as header-keyed maps.
pub struct CsvMapReader<R> {
    reader: RefCell<Reader<R>>,
    range: RowRange,
    on_record: Option<MapTransform>,
    state: RefCell<MapState>,
}

#[derive(Default)]
struct MapState {
    headers: Option<Vec<String>>,
    record: StringRecord,
    rows_seen: usize,
    finished: bool,
}

impl<R: Read> ItemReader<MapRow> for CsvMapReader<R> {
    fn read(&self) -> ItemReaderResult<MapRow> {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        if state.finished {
            return Ok(None);
        }
        let mut reader = self.reader.borrow_mut();
        if state.headers.is_none() {
            if !reader.read_record(&mut state.record)? {
                state.finished = true;
                return Err(BindError::EmptyInput);
            }
            state.headers = Some(state.record.iter().map(str::to_string).collect());
        }

        loop {
            if !reader.read_record(&mut state.record)? {
                state.finished = true;
                return Ok(None);
            }
            state.rows_seen += 1;
            if self.range.is_past_end(state.rows_seen) {
                state.finished = true;
                return Ok(None);
            }
            if !self.range.contains(state.rows_seen) {
                continue;
            }
            let headers = state.headers.as_deref().unwrap_or_default();
            let row: MapRow = headers
                .iter()
                .cloned()
                .zip(state.record.iter().map(str::to_string))
                .collect();
            return Ok(Some(match &self.on_record {
                Some(transform) => transform(row),
                None => row,
            }));
        }
    }
}

impl<R: Read> CsvMapReader<R> {
    pub fn read_all(&self) -> Result<Vec<MapRow>, BindError> {
        let mut rows = Vec::new();
        while let Some(row) = self.read()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

#[derive(Default)]
pub struct CsvMapReaderBuilder {
    format: CsvFormat,
    range: RowRange,
    on_record: Option<MapTransform>,
}

impl CsvMapReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: CsvFormat) -> Self {
        self.format = format;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.format.delimiter = delimiter;
        self
    }

    pub fn range(mut self, from: i64, to: i64) -> Self {
        self.range = RowRange::new(from, to);
        self
    }

    pub fn on_record<F>(mut self, transform: F) -> Self
    where
        F: Fn(MapRow) -> MapRow + Send + Sync + 'static,
    {
        self.on_record = Some(Arc::new(transform));
        self
    }

    pub fn from_reader<R: Read>(self, rdr: R) -> Result<CsvMapReader<R>, BindError> {
        self.range.validate()?;
        Ok(CsvMapReader {
            reader: RefCell::new(self.format.reader_builder().from_reader(rdr)),
            range: self.range,
            on_record: self.on_record,
            state: RefCell::new(MapState::default()),
        })
    }
}
