/// Tag-driven CSV reading and writing.
///
/// This module provides builder-configured components that move rows between delimited text
/// and records described with [`record!`](crate::record).
///
/// # Module Architecture
///
/// The CSV module consists of two main components:
///
/// 1. **CsvRecordReader**: decodes rows into records. Headers are matched against the keys
///    declared in field tags (with aliases, nested prefixes and indexed element columns), or
///    taken positionally when the input has no header row.
///
/// 2. **CsvRecordWriter**: encodes records into rows, with column selection, ordering,
///    header renaming and optional header suppression.
///
/// Both components follow the builder pattern and implement the `ItemReader` and `ItemWriter`
/// traits from [`core::item`](crate::core::item).
///
/// # Ownership and Borrowing Considerations
///
/// - Writers borrow their destination (file, buffer, etc.) and hold that borrow until dropped
/// - To read from a buffer after writing to it, either drop the writer first or call
///   `into_inner` to get the destination back
///
/// # Examples
///
/// ## Reading from CSV
///
/// ```
/// use xsv_bind::item::csv::csv_reader::CsvRecordReaderBuilder;
/// use xsv_bind::record;
///
/// #[derive(Debug, Default, PartialEq)]
/// struct City {
///     city: String,
///     country: String,
///     pop: u32,
/// }
///
/// record! {
///     City {
///         city: r#"csv:"city""#,
///         country: r#"csv:"country""#,
///         pop: r#"csv:"pop,omitempty""#,
///     }
/// }
///
/// let csv_data = "\
/// city,country,pop
/// Boston,United States,4628910
/// Concord,United States,42695
/// ";
///
/// let reader = CsvRecordReaderBuilder::<City>::new()
///     .has_headers(true)
///     .delimiter(b',')
///     .from_reader(csv_data.as_bytes())
///     .unwrap();
///
/// let cities = reader.read_all().unwrap();
///
/// assert_eq!(cities.len(), 2);
/// assert_eq!(cities[0].city, "Boston");
/// assert_eq!(cities[1].pop, 42695);
/// ```
///
/// ## Writing to CSV
///
/// ```
/// use xsv_bind::item::csv::csv_writer::CsvRecordWriterBuilder;
/// use xsv_bind::record;
///
/// #[derive(Debug, Default)]
/// struct Person {
///     name: String,
///     age: u8,
///     skills: Vec<String>,
/// }
///
/// record! {
///     Person {
///         name: r#"csv:"name""#,
///         age: r#"csv:"age""#,
///         skills: r#"csv:"skill" csv[]:"2""#,
///     }
/// }
///
/// let people = vec![
///     Person { name: "Alice".into(), age: 28, skills: vec!["rust".into()] },
///     Person { name: "Bob".into(), age: 35, skills: vec!["go".into(), "sql".into()] },
/// ];
///
/// let mut buffer = Vec::new();
/// {
///     let writer = CsvRecordWriterBuilder::<Person>::new().from_writer(&mut buffer);
///     writer.write_all(&people).unwrap();
/// }
///
/// assert_eq!(
///     String::from_utf8(buffer).unwrap(),
///     "name,age,skill[0],skill[1]\nAlice,28,rust,\nBob,35,go,sql\n"
/// );
/// ```

/// A module providing facilities for reading CSV data records.
pub mod csv_reader;

/// A module providing facilities for writing CSV data records.
pub mod csv_writer;
