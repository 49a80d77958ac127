mod buffered;
mod consumer;
pub(crate) mod errors;

pub use buffered::BufferedSink;
pub use buffered::Completion;

pub use consumer::Consumer;
pub use consumer::WriterConsumer;

pub use errors::SinkError;
