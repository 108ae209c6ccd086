use std::{env::temp_dir, fs, thread};

use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::mpsc;

use xsv_bind::{
    BindError, BoxError,
    core::scalar::CsvScalar,
    item::{
        csv::{csv_reader::CsvRecordReaderBuilder, csv_writer::CsvRecordWriterBuilder},
        pipeline::encode_from_channel,
    },
    record, scalar,
};

/// Employment timestamp written as `YYYYDDMM`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Employed(NaiveDateTime);

impl CsvScalar for Employed {
    fn from_csv(text: &str) -> Result<Self, BoxError> {
        let date = NaiveDate::parse_from_str(text, "%Y%d%m")?;
        Ok(Employed(date.and_hms_opt(0, 0, 0).unwrap_or_default()))
    }

    fn to_csv(&self) -> Result<String, BoxError> {
        Ok(self.0.format("%Y%d%m").to_string())
    }
}

scalar!(Employed);

#[derive(Debug, Default, Clone)]
struct Address {
    street: String,
    city: String,
}

record! {
    Address {
        street: r#"csv:"street""#,
        city: r#"csv:"city""#,
    }
}

#[derive(Debug, Default, Clone)]
struct Client {
    id: String,
    name: String,
    age: String,
    not_used: String,
    address1: Address,
    // untagged, so the header uses the field name
    address2: Address,
    employed: Employed,
}

record! {
    Client {
        id: r#"csv:"client_id""#,
        name: r#"csv:"client_name""#,
        age: r#"csv:"client_age""#,
        not_used: r#"csv:"-""#,
        address1: r#"csv:"addr1""#,
        address2,
        employed: r#"csv:"employed""#,
    }
}

fn employed_at(hour: u32) -> Employed {
    let at = NaiveDate::from_ymd_opt(2022, 11, 4)
        .and_then(|day| day.and_hms_opt(hour, 0, 0))
        .unwrap_or_default();
    Employed(at)
}

fn client(id: &str, name: &str, age: &str, street: &str, hour: u32) -> Client {
    Client {
        id: id.to_string(),
        name: name.to_string(),
        age: age.to_string(),
        not_used: String::new(),
        address1: Address {
            street: format!("{street} 1"),
            city: "City1".to_string(),
        },
        address2: Address {
            street: format!("{street} 2"),
            city: "City2".to_string(),
        },
        employed: employed_at(hour),
    }
}

fn main() -> Result<(), BindError> {
    env_logger::init();

    let clients = vec![
        client("12", "John", "21", "Street", 12),
        client("13", "Fred", "", "Main \"Street\"", 13),
        client("14", "James", "32", "Center Street", 14),
        client("15", "Danny", "", "State Street", 15),
    ];

    let clients_path = temp_dir().join("clients.csv");
    let writer = CsvRecordWriterBuilder::<Client>::new().from_path(&clients_path)?;
    writer.write_all(&clients)?;
    drop(writer);
    println!("{}", fs::read_to_string(&clients_path)?);

    let reader = CsvRecordReaderBuilder::<Client>::new().from_path(&clients_path)?;
    for client in reader.read_all()? {
        println!("{} lives in {}", client.name, client.address1.street);
    }

    // Stream a hundred clients through the pipeline without a header row.
    let (tx, rx) = mpsc::channel(1);
    let chan_path = temp_dir().join("clients-from-chan.csv");
    let writer = CsvRecordWriterBuilder::<Client>::new()
        .omit_headers(true)
        .from_path(&chan_path)?;

    thread::scope(|scope| {
        scope.spawn(move || {
            for i in 1..=100 {
                if tx
                    .blocking_send(client(&i.to_string(), "Danny", "", "State Street", 15))
                    .is_err()
                {
                    break;
                }
            }
        });
        encode_from_channel(&writer, rx)
    })?;

    println!("wrote {}", chan_path.display());
    Ok(())
}
