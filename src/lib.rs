#![deny(missing_docs)]

//! This is iosink, a small library providing buffered asynchronous output sinks.
//!
//! The central type is [`BufferedSink`] which forwards chunks to a single [`Consumer`]. Chunks can be written
//! one at a time or a whole `Stream` can be handed over, and the sink guarantees that the `Consumer` only ever
//! drains one stream at a time and receives everything in the order it was written. All of this is found in
//! the [`sink`] module.
//!
//! Text output on top of a byte sink is provided by the [`text`] module, with a pluggable [`Encoder`].
//!
//! Lastly iosink provides a recording `Consumer` and logging helpers for tests in the [`test`] module.
//!
//!
//! [`BufferedSink`]: self::sink::BufferedSink
//! [`Consumer`]: self::sink::Consumer
//! [`Encoder`]: self::text::Encoder
//! [`sink`]: self::sink
//! [`text`]: self::text
//! [`test`]: self::test

/// Buffered sinks and the consumers they forward to
pub mod sink;

/// Text encoding on top of byte sinks
pub mod text;

#[cfg(any(test, feature = "test"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test")))]
/// Test utilities used all across the library
pub mod test;

/// Re-export `async_trait` to use when implementing custom `Consumer`s
pub use async_trait::async_trait;
