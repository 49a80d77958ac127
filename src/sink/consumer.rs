use std::io;

use async_trait::async_trait;

use futures::stream::{BoxStream, StreamExt};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use tracing::{debug, trace};

#[async_trait]
/// The destination of a [`BufferedSink`]. A `Consumer` is only ever asked to
/// drain one stream at a time and is finalized at most once.
///
/// [`BufferedSink`]: super::BufferedSink
pub trait Consumer<T: Send + 'static>: Send + 'static {
    /// Drain `stream` until it ends or an error occurs. An `Err` item in the
    /// stream must be reported as the result of this call.
    async fn accept_stream(
        &mut self,
        stream: BoxStream<'static, io::Result<T>>,
    ) -> io::Result<()>;

    /// Release the underlying resource. Consumes the `Consumer` since nothing
    /// can be written to it afterwards.
    async fn finalize(self) -> io::Result<()>;
}

/// A `Consumer` writing every chunk it receives to some `AsyncWrite`
pub struct WriterConsumer<W> {
    writer: W,
    written: usize,
}

impl<W> WriterConsumer<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a new `WriterConsumer` that writes to the given `AsyncWrite`
    ///
    /// # Example
    /// ```
    /// use iosink::sink::WriterConsumer;
    ///
    /// let consumer = WriterConsumer::new(tokio::io::sink());
    /// assert_eq!(consumer.written(), 0);
    /// ```
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Total number of bytes written so far
    pub fn written(&self) -> usize {
        self.written
    }
}

#[async_trait]
impl<W, T> Consumer<T> for WriterConsumer<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
    T: AsRef<[u8]> + Send + 'static,
{
    async fn accept_stream(
        &mut self,
        mut stream: BoxStream<'static, io::Result<T>>,
    ) -> io::Result<()> {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let bytes = chunk.as_ref();

            trace!("writing {} bytes", bytes.len());

            self.writer.write_all(bytes).await?;
            self.written += bytes.len();
        }

        self.writer.flush().await
    }

    async fn finalize(mut self) -> io::Result<()> {
        debug!("shutting down writer after {} bytes", self.written);

        self.writer.shutdown().await
    }
}
