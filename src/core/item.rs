use crate::error::BindError;

/// `Ok(None)` marks the end of the input.
pub type ItemReaderResult<T> = Result<Option<T>, BindError>;

pub type ItemWriterResult = Result<(), BindError>;

pub trait ItemReader<R> {
    fn read(&self) -> ItemReaderResult<R>;
}

pub trait ItemWriter<W> {
    fn write(&self, item: &W) -> ItemWriterResult;
    fn flush(&self) -> ItemWriterResult;
    fn close(&self) -> ItemWriterResult {
        self.flush()
    }
}
