use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::HashMap,
    fs::File,
    io::{self, Write},
    marker::PhantomData,
    path::Path,
    slice,
    sync::Arc,
};

use csv::Writer;
use log::{debug, info, trace};

use crate::{
    core::{
        codec,
        config::{NameNormalizer, SchemaConfig, WriteOptions},
        item::{ItemWriter, ItemWriterResult},
        reflect::Reflect,
        schema::{FieldDescriptor, Schema},
    },
    error::{BindError, ConfigurationError},
};

/// Transformation applied to each record right before it is encoded.
pub type EncodeTransform<T> = Arc<dyn Fn(&T) -> T + Send + Sync>;

/// A CSV writer encoding records of type `T`.
///
/// The column layout is fixed by the first chunk written: observed-size sequences are
/// expanded from that chunk, then selection, ordering and header renaming are applied.
pub struct CsvRecordWriter<W: Write, T> {
    wrapper: RefCell<Writer<W>>,
    options: WriteOptions,
    normalizer: NameNormalizer,
    on_record: Option<EncodeTransform<T>>,
    layout: RefCell<Option<Layout>>,
    rows: Cell<usize>,
}

struct Layout {
    schema: Schema,
    columns: Vec<FieldDescriptor>,
}

impl<W: Write, T: Reflect> ItemWriter<T> for CsvRecordWriter<W, T> {
    fn write(&self, item: &T) -> ItemWriterResult {
        self.write_chunk(slice::from_ref(item))
    }

    fn flush(&self) -> ItemWriterResult {
        self.wrapper.borrow_mut().flush()?;
        Ok(())
    }

    /// Writes the header even when no record was written, then flushes.
    fn close(&self) -> ItemWriterResult {
        self.write_chunk(&[])?;
        self.flush()
    }
}

impl<W: Write, T: Reflect> CsvRecordWriter<W, T> {
    /// Encodes `items`. The first call writes the header row.
    pub fn write_chunk(&self, items: &[T]) -> ItemWriterResult {
        let mut guard = self.layout.borrow_mut();
        let layout = match guard.take() {
            Some(layout) => layout,
            None => self.establish(items)?,
        };
        let result = self.write_rows(&layout, items);
        *guard = Some(layout);
        result
    }

    /// Encodes a whole batch and flushes.
    pub fn write_all(&self, items: &[T]) -> ItemWriterResult {
        self.write_chunk(items)?;
        self.flush()?;
        info!(
            "encoded {} records of {}",
            items.len(),
            std::any::type_name::<T>()
        );
        Ok(())
    }

    /// Output header labels, once the layout is known.
    pub fn headers(&self) -> Option<Vec<String>> {
        self.layout
            .borrow()
            .as_ref()
            .map(|layout| layout.columns.iter().map(|c| self.label(c)).collect())
    }

    fn establish(&self, items: &[T]) -> Result<Layout, BindError> {
        let config = SchemaConfig {
            tags: self.options.tags.clone(),
            normalizer: self.normalizer.clone(),
        };
        let schema = Schema::for_encoding(&config, items)?;

        let selected: Vec<String> = self
            .options
            .selected_columns
            .iter()
            .map(|name| self.normalizer.apply(name))
            .collect();
        let mut columns: Vec<FieldDescriptor> = schema
            .columns()
            .filter(|field| selected.is_empty() || selected.iter().any(|s| s == field.first_key()))
            .cloned()
            .collect();

        if !self.options.sort_order.is_empty() {
            columns = reorder(columns, &self.options.sort_order)?;
        }

        let layout = Layout { schema, columns };
        if !self.options.omit_headers {
            let header: Vec<String> = layout.columns.iter().map(|c| self.label(c)).collect();
            self.wrapper.borrow_mut().write_record(&header)?;
            self.rows.set(1);
        }
        debug!(
            "writing {} columns for {}",
            layout.columns.len(),
            layout.schema.type_name()
        );
        Ok(layout)
    }

    fn label(&self, field: &FieldDescriptor) -> String {
        let key = field.first_key();
        self.options
            .header_modifier
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    fn write_rows(&self, layout: &Layout, items: &[T]) -> ItemWriterResult {
        let mut wtr = self.wrapper.borrow_mut();
        for item in items {
            let transformed;
            let record = match &self.on_record {
                Some(transform) => {
                    transformed = transform(item);
                    &transformed
                }
                None => item,
            };

            let row = self.rows.get() + 1;
            let cells = layout
                .columns
                .iter()
                .enumerate()
                .map(|(index, field)| {
                    codec::extract(record as &dyn Any, layout.schema.root(), field)
                        .map_err(|source| source.at(row, index + 1))
                })
                .collect::<Result<Vec<_>, _>>()?;
            wtr.write_record(&cells)?;
            self.rows.set(row);
            trace!("encoded output row {row}");
        }
        Ok(())
    }
}

impl<W: Write, T> CsvRecordWriter<W, T> {
    pub fn into_inner(self) -> Result<W, BindError> {
        self.wrapper
            .into_inner()
            .into_inner()
            .map_err(|error| BindError::Io(io::Error::new(error.error().kind(), error.error().to_string())))
    }
}

/// Places column `i` at position `order[i]`.
fn reorder(
    columns: Vec<FieldDescriptor>,
    order: &[usize],
) -> Result<Vec<FieldDescriptor>, ConfigurationError> {
    if order.len() != columns.len() {
        return Err(ConfigurationError::SortOrderLength {
            expected: columns.len(),
            found: order.len(),
        });
    }
    let mut slots: Vec<Option<FieldDescriptor>> = vec![None; columns.len()];
    for (column, &target) in columns.into_iter().zip(order) {
        match slots.get_mut(target) {
            Some(slot @ None) => *slot = Some(column),
            _ => return Err(ConfigurationError::SortOrderNotPermutation(order.to_vec())),
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

pub struct CsvRecordWriterBuilder<T> {
    options: WriteOptions,
    normalizer: NameNormalizer,
    on_record: Option<EncodeTransform<T>>,
    _marker: PhantomData<fn(&T)>,
}

impl<T> Default for CsvRecordWriterBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CsvRecordWriterBuilder<T> {
    pub fn new() -> Self {
        Self {
            options: WriteOptions::default(),
            normalizer: NameNormalizer::identity(),
            on_record: None,
            _marker: PhantomData,
        }
    }

    pub fn options(mut self, options: WriteOptions) -> Self {
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

    pub fn use_crlf(mut self, yes: bool) -> Self {
        self.options.format.use_crlf = yes;
        self
    }

    pub fn has_headers(mut self, yes: bool) -> Self {
        self.options.omit_headers = !yes;
        self
    }

    pub fn omit_headers(mut self, yes: bool) -> Self {
        self.options.omit_headers = yes;
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

    pub fn name_normalizer<F>(mut self, normalize: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.normalizer = NameNormalizer::new(normalize);
        self
    }

    /// Only emit the fields whose first key is listed.
    pub fn selected_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.selected_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn sort_order(mut self, order: Vec<usize>) -> Self {
        self.options.sort_order = order;
        self
    }

    pub fn rename_header(mut self, key: &str, label: &str) -> Self {
        self.options
            .header_modifier
            .insert(key.to_string(), label.to_string());
        self
    }

    pub fn header_modifier(mut self, modifier: HashMap<String, String>) -> Self {
        self.options.header_modifier = modifier;
        self
    }

    pub fn on_record<F>(mut self, transform: F) -> Self
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        self.on_record = Some(Arc::new(transform));
        self
    }

    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvRecordWriter<File, T>, BindError> {
        let wtr = self.options.format.writer_builder().from_path(path)?;
        Ok(self.build(wtr))
    }

    pub fn from_writer<W: Write>(self, wtr: W) -> CsvRecordWriter<W, T> {
        let wtr = self.options.format.writer_builder().from_writer(wtr);
        self.build(wtr)
    }

    fn build<W: Write>(self, wtr: Writer<W>) -> CsvRecordWriter<W, T> {
        CsvRecordWriter {
            wrapper: RefCell::new(wtr),
            options: self.options,
            normalizer: self.normalizer,
            on_record: self.on_record,
            layout: RefCell::new(None),
            rows: Cell::new(0),
        }
    }
}
