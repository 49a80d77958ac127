use std::fmt::{self, Write};
use std::io;

use super::encoder::{Encoder, Utf8};
use crate::sink::errors::{Encoding, InvalidCodePoint};
use crate::sink::{
    BufferedSink, Completion, Consumer, SinkError, WriterConsumer,
};

use futures::stream::Stream;

use snafu::{OptionExt, ResultExt};

use tokio::io::AsyncWrite;

/// A [`BufferedSink`] of bytes that can also be written text to. Text is turned
/// into bytes using an [`Encoder`] and then handled exactly like a chunk given
/// to [`BufferedSink::add`].
pub struct TextSink<C, E = Utf8> {
    sink: BufferedSink<Vec<u8>, C>,
    encoder: E,
}

impl<C, E> TextSink<C, E>
where
    C: Consumer<Vec<u8>>,
    E: Encoder,
{
    /// Create a new `TextSink` writing to `target` using the given `Encoder`
    pub fn new(target: C, encoder: E) -> Self {
        Self::from_sink(BufferedSink::new(target), encoder)
    }

    /// Wrap an existing `BufferedSink`
    pub fn from_sink(sink: BufferedSink<Vec<u8>, C>, encoder: E) -> Self {
        Self { sink, encoder }
    }

    /// Render `value` and queue its encoding. Nothing is queued when the
    /// rendered text is empty.
    ///
    /// # Errors
    /// `Encoding` if the `Display` implementation of `value` fails, and any
    /// error returned by [`BufferedSink::add`]
    pub fn write<D: fmt::Display + ?Sized>(
        &self,
        value: &D,
    ) -> Result<(), SinkError> {
        let mut text = String::new();

        write!(text, "{}", value).context(Encoding)?;

        self.write_str(&text)
    }

    /// Queue the encoding of `text` unless it is empty
    pub fn write_str(&self, text: &str) -> Result<(), SinkError> {
        if text.is_empty() {
            return Ok(());
        }

        self.sink.add(self.encoder.encode(text))
    }

    /// Write every value in order with `separator` between two consecutive
    /// values
    ///
    /// # Example
    /// ```ignore
    /// text.write_all(&["a", "b", "c"], ",")?; // writes "a,b,c"
    /// ```
    pub fn write_all<I>(
        &self,
        values: I,
        separator: &str,
    ) -> Result<(), SinkError>
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        let mut values = values.into_iter();

        if let Some(first) = values.next() {
            self.write(&first)?;

            for value in values {
                self.write_str(separator)?;
                self.write(&value)?;
            }
        }

        Ok(())
    }

    /// Write `value` followed by a newline
    pub fn writeln<D: fmt::Display + ?Sized>(
        &self,
        value: &D,
    ) -> Result<(), SinkError> {
        self.write(value)?;
        self.write_str("\n")
    }

    /// Write the character with the given code point
    ///
    /// # Errors
    /// `InvalidCodePoint` if `code` is not a unicode scalar value
    pub fn write_char_code(&self, code: u32) -> Result<(), SinkError> {
        let c = std::char::from_u32(code).context(InvalidCodePoint { code })?;
        let mut buffer = [0u8; 4];

        self.write_str(c.encode_utf8(&mut buffer))
    }

    /// See [`BufferedSink::add`]
    pub fn add(&self, chunk: Vec<u8>) -> Result<(), SinkError> {
        self.sink.add(chunk)
    }

    /// See [`BufferedSink::add_error`]
    pub fn add_error(&self, error: io::Error) -> Result<(), SinkError> {
        self.sink.add_error(error)
    }

    /// See [`BufferedSink::add_stream`]
    pub fn add_stream<S>(&self, stream: S) -> Result<Completion, SinkError>
    where
        S: Stream<Item = io::Result<Vec<u8>>> + Send + 'static,
    {
        self.sink.add_stream(stream)
    }

    /// See [`BufferedSink::flush`]
    pub fn flush(&self) -> Result<Completion, SinkError> {
        self.sink.flush()
    }

    /// See [`BufferedSink::close`]
    pub fn close(&self) -> Result<Completion, SinkError> {
        self.sink.close()
    }

    /// See [`BufferedSink::done`]
    pub fn done(&self) -> Completion {
        self.sink.done()
    }

    /// The `Encoder` used by this `TextSink`
    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// The underlying `BufferedSink`
    pub fn sink(&self) -> &BufferedSink<Vec<u8>, C> {
        &self.sink
    }
}

impl<W, E> TextSink<WriterConsumer<W>, E>
where
    W: AsyncWrite + Unpin + Send + 'static,
    E: Encoder,
{
    /// Create a `TextSink` writing to the given `AsyncWrite`
    pub fn from_writer(writer: W, encoder: E) -> Self {
        Self::from_sink(BufferedSink::from_writer(writer), encoder)
    }
}

impl<C, E: fmt::Debug> fmt::Debug for TextSink<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TextSink")
            .field("sink", &self.sink)
            .field("encoder", &self.encoder)
            .finish()
    }
}
