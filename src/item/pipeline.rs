//! Record-at-a-time transfer between CSV and a bounded channel.
//!
//! Producers and consumers run on blocking threads and exchange records over
//! `tokio::sync::mpsc`, so the receiving side may just as well live in an async task.

use std::{
    collections::HashMap,
    io::{Read, Write},
    slice, thread,
};

use log::{debug, info};
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::{
    core::{
        item::{ItemReader, ItemWriter},
        reflect::Reflect,
    },
    error::{BindError, BoxError},
    item::{
        csv::{csv_reader::CsvRecordReader, csv_writer::CsvRecordWriter},
        maps::CsvMapReader,
    },
};

/// Capacity of the channel created by [`decode_to_callback`].
pub const PIPELINE_CAPACITY: usize = 1;

/// Decodes every selected row into `tx`.
///
/// The sender is dropped on every exit path, which closes the channel. A dropped receiver
/// stops decoding without error.
pub fn decode_to_channel<R, T>(reader: CsvRecordReader<R, T>, tx: Sender<T>) -> Result<(), BindError>
where
    R: Read,
    T: Reflect + Default,
{
    let mut sent = 0usize;
    while let Some(record) = reader.read()? {
        if tx.blocking_send(record).is_err() {
            debug!("receiver dropped after {sent} records, stopping");
            return Ok(());
        }
        sent += 1;
    }
    info!("sent {sent} records down the pipeline");
    Ok(())
}

/// Decodes rows on a scoped producer thread and hands each record to `callback`.
///
/// A failing callback does not stop the producer: the pipeline is drained and the first
/// callback error is reported once decoding is over. Producer errors take precedence.
pub fn decode_to_callback<R, T, F, E>(reader: CsvRecordReader<R, T>, mut callback: F) -> Result<(), BindError>
where
    R: Read + Send,
    T: Reflect + Default + Send,
    F: FnMut(T) -> Result<(), E>,
    E: Into<BoxError>,
{
    let (tx, mut rx) = mpsc::channel(PIPELINE_CAPACITY);
    thread::scope(|scope| {
        let producer = scope.spawn(move || decode_to_channel(reader, tx));

        let mut failure: Option<BoxError> = None;
        while let Some(record) = rx.blocking_recv() {
            if failure.is_some() {
                continue;
            }
            if let Err(error) = callback(record) {
                debug!("callback failed, draining the pipeline");
                failure = Some(error.into());
            }
        }

        match producer.join() {
            Err(_) => Err(BindError::ProducerPanicked),
            Ok(Err(error)) => Err(error),
            Ok(Ok(())) => match failure {
                Some(error) => Err(BindError::Callback(error)),
                None => Ok(()),
            },
        }
    })
}

/// Moves `reader` onto its own thread and returns the receiving end of the pipeline.
///
/// The receiver can be consumed from async code with `recv().await`.
pub fn spawn_decode<R, T>(
    reader: CsvRecordReader<R, T>,
    capacity: usize,
) -> (Receiver<T>, thread::JoinHandle<Result<(), BindError>>)
where
    R: Read + Send + 'static,
    T: Reflect + Default + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = thread::spawn(move || decode_to_channel(reader, tx));
    (rx, handle)
}

/// Encodes records from `rx` until the channel closes, then flushes once.
///
/// The column layout is taken from the first record. On error the channel is closed and
/// drained so that producers blocked on it are released.
pub fn encode_from_channel<W, T>(writer: &CsvRecordWriter<W, T>, mut rx: Receiver<T>) -> Result<(), BindError>
where
    W: Write,
    T: Reflect,
{
    let Some(first) = rx.blocking_recv() else {
        return Err(BindError::ChannelClosed);
    };

    let result = pump(writer, first, &mut rx);
    if result.is_err() {
        rx.close();
        while rx.blocking_recv().is_some() {}
    }
    result
}

fn pump<W, T>(writer: &CsvRecordWriter<W, T>, first: T, rx: &mut Receiver<T>) -> Result<(), BindError>
where
    W: Write,
    T: Reflect,
{
    writer.write_chunk(slice::from_ref(&first))?;
    let mut written = 1usize;
    while let Some(record) = rx.blocking_recv() {
        writer.write(&record)?;
        written += 1;
    }
    writer.flush()?;
    info!("encoded {written} records from the pipeline");
    Ok(())
}

/// Decodes header-keyed maps into `tx`.
pub fn decode_maps_to_channel<R: Read>(
    reader: CsvMapReader<R>,
    tx: Sender<HashMap<String, String>>,
) -> Result<(), BindError> {
    while let Some(row) = reader.read()? {
        if tx.blocking_send(row).is_err() {
            debug!("receiver dropped, stopping map decoding");
            break;
        }
    }
    Ok(())
}
