//! Mock output sink, used to make the writer fail on demand.
use mockall::mock;

use std::io::{self, Write};

mock! {
    pub Sink {}
    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
        fn flush(&mut self) -> io::Result<()>;
    }
}

/// A sink whose every write fails with `kind`.
pub fn failing_sink(kind: io::ErrorKind) -> MockSink {
    let mut sink = MockSink::new();
    sink.expect_write()
        .returning(move |_| Err(io::Error::new(kind, "sink refused the write")));
    sink.expect_flush().returning(|| Ok(()));
    sink
}
