use std::fmt;
use std::io::Error as IoError;
use std::sync::Arc;

use snafu::{Backtrace, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
/// Error encountered when writing to a [`BufferedSink`] or one of its wrappers
///
/// [`BufferedSink`]: super::BufferedSink
pub enum SinkError {
    #[snafu(display("cannot {}: sink is bound to a stream", operation))]
    /// A write, flush, close or stream adoption was attempted while another
    /// stream holds the sink
    InvalidState {
        /// Name of the rejected operation
        operation: &'static str,
        /// Error backtrace
        backtrace: Backtrace,
    },

    #[snafu(display("consumer failed: {}", source))]
    /// The underlying consumer failed while draining data
    ConsumerFailure {
        /// Underlying error cause, shared by every observer of the sink
        source: Arc<IoError>,
    },

    #[snafu(display("could not render value as text: {}", source))]
    /// A value handed to a text write could not be formatted
    Encoding {
        /// Underlying error cause
        source: fmt::Error,
    },

    #[snafu(display("{:#x} is not a valid character code", code))]
    /// `write_char_code` was given something that is not a unicode scalar
    InvalidCodePoint {
        /// The rejected code point
        code: u32,
    },

    #[snafu(display("sink was dropped before completing"))]
    /// Every handle able to complete the sink was dropped
    Abandoned,
}

impl SinkError {
    /// Checks whether this error was caused by calling into a bound sink
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, SinkError::InvalidState { .. })
    }

    /// Returns the consumer error if this is a `ConsumerFailure`
    pub fn consumer_error(&self) -> Option<&IoError> {
        match self {
            SinkError::ConsumerFailure { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}
