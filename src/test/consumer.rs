use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::sink::Consumer;

use async_trait::async_trait;

use futures::stream::{BoxStream, StreamExt};

use tracing::trace;

/// Message carried by errors produced by a failing `RecordingConsumer`
pub const INJECTED_FAILURE: &str = "injected consumer failure";

struct Log<T> {
    items: Vec<T>,
    streams: usize,
    finalized: usize,
}

/// Shared view of everything a `RecordingConsumer` received
pub struct Recording<T> {
    log: Arc<Mutex<Log<T>>>,
}

impl<T> Recording<T> {
    fn lock(&self) -> MutexGuard<'_, Log<T>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of streams the consumer was asked to drain
    pub fn streams(&self) -> usize {
        self.lock().streams
    }

    /// Number of times the consumer was finalized
    pub fn finalized(&self) -> usize {
        self.lock().finalized
    }
}

impl<T: Clone> Recording<T> {
    /// Every item received so far, in order
    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }
}

impl Recording<Vec<u8>> {
    /// All received chunks concatenated
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().items.concat()
    }
}

impl<T> Clone for Recording<T> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
        }
    }
}

/// A `Consumer` that records what it receives and can be told to fail
pub struct RecordingConsumer<T> {
    recording: Recording<T>,
    fail_at: Option<usize>,
    fail_finalize: bool,
}

impl<T> RecordingConsumer<T> {
    /// Create a new `RecordingConsumer` along with the `Recording` that
    /// observes it
    pub fn new() -> (Self, Recording<T>) {
        let recording = Recording {
            log: Arc::new(Mutex::new(Log {
                items: Vec::new(),
                streams: 0,
                finalized: 0,
            })),
        };

        let consumer = Self {
            recording: recording.clone(),
            fail_at: None,
            fail_finalize: false,
        };

        (consumer, recording)
    }

    /// Fail instead of recording the item at position `index`, counting
    /// across all streams
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Fail when finalized, after counting the finalization
    pub fn fail_finalize(mut self) -> Self {
        self.fail_finalize = true;
        self
    }
}

fn injected() -> io::Error {
    io::Error::new(io::ErrorKind::Other, INJECTED_FAILURE)
}

#[async_trait]
impl<T: Send + 'static> Consumer<T> for RecordingConsumer<T> {
    async fn accept_stream(
        &mut self,
        mut stream: BoxStream<'static, io::Result<T>>,
    ) -> io::Result<()> {
        self.recording.lock().streams += 1;

        while let Some(item) = stream.next().await {
            let item = item?;
            let mut log = self.recording.lock();

            if self.fail_at == Some(log.items.len()) {
                trace!("injecting failure at item {}", log.items.len());
                return Err(injected());
            }

            log.items.push(item);
        }

        Ok(())
    }

    async fn finalize(self) -> io::Result<()> {
        self.recording.lock().finalized += 1;

        if self.fail_finalize {
            Err(injected())
        } else {
            Ok(())
        }
    }
}
