use std::fmt;
use std::io;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::consumer::{Consumer, WriterConsumer};
use super::errors::{InvalidState, SinkError};

use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{BoxStream, Stream, StreamExt};

use snafu::ensure;

use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task;
use tokio_stream::wrappers::UnboundedReceiverStream;

use tracing::{debug, debug_span, trace, warn};
use tracing_futures::Instrument;

/// Result of a single transfer, or of the sink as a whole
type Outcome = Result<(), Arc<io::Error>>;

/// A future resolving once some operation on a sink has completed
pub type Completion = BoxFuture<'static, Result<(), SinkError>>;

/// What currently holds the consumer
enum Phase<T, C> {
    /// Nothing in flight, the consumer is parked here
    Idle(C),
    /// Direct writes go through a buffer channel whose receiving end is being
    /// forwarded to the consumer. `producer` is `None` once the channel was
    /// closed and is only draining.
    Buffering {
        producer: Option<mpsc::UnboundedSender<io::Result<T>>>,
        flush: Option<oneshot::Sender<Outcome>>,
        adoption: Option<Transfer<T>>,
    },
    /// A stream given to `add_stream` is being forwarded
    StreamBound,
    /// The consumer is being finalized or already was
    Closed,
}

impl<T, C> Phase<T, C> {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle(_) => "idle",
            Phase::Buffering { .. } => "buffering",
            Phase::StreamBound => "stream bound",
            Phase::Closed => "closed",
        }
    }
}

/// One stream to forward, along with whoever waits for it if it was adopted
struct Transfer<T> {
    stream: BoxStream<'static, io::Result<T>>,
    reply: Option<oneshot::Sender<Outcome>>,
}

/// What the task holding the consumer must do once a transfer is over
enum Release<T, C> {
    Forward(C, Transfer<T>),
    Finalize(C, Option<Arc<io::Error>>),
    Parked,
}

struct State<T, C> {
    phase: Phase<T, C>,
    bound: bool,
    closed: bool,
    failure: Option<Arc<io::Error>>,
}

struct Shared<T, C> {
    state: Mutex<State<T, C>>,
    done: watch::Sender<Option<Outcome>>,
}

/// A sink that forwards chunks to a single [`Consumer`], accepting direct
/// writes and whole streams while making sure the `Consumer` only ever drains
/// one stream at a time.
///
/// Chunks given to [`add`] are queued in a buffer channel that is itself
/// forwarded to the `Consumer`. Adopting a stream with [`add_stream`] first
/// drains everything that was queued, so the `Consumer` always observes chunks
/// in the order they were handed to the sink.
///
/// All operations must be called from within a tokio runtime.
///
/// [`add`]: BufferedSink::add
/// [`add_stream`]: BufferedSink::add_stream
pub struct BufferedSink<T, C> {
    shared: Arc<Shared<T, C>>,
    done: watch::Receiver<Option<Outcome>>,
}

impl<T, C> BufferedSink<T, C>
where
    T: Send + 'static,
    C: Consumer<T>,
{
    /// Create a new `BufferedSink` that will forward everything to `target`
    pub fn new(target: C) -> Self {
        let (done, receiver) = watch::channel(None);
        let state = State {
            phase: Phase::Idle(target),
            bound: false,
            closed: false,
            failure: None,
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                done,
            }),
            done: receiver,
        }
    }

    /// Queue a chunk for delivery. This never waits for the `Consumer`, delivery
    /// errors are only reported through [`done`]. Chunks added after the sink was
    /// closed are silently dropped.
    ///
    /// # Errors
    /// `InvalidState` if a stream is currently bound to this sink
    ///
    /// [`done`]: BufferedSink::done
    pub fn add(&self, chunk: T) -> Result<(), SinkError> {
        self.enqueue(Ok(chunk), "add")
    }

    /// Queue an error for delivery. The `Consumer` receives it in place of a
    /// chunk, which usually makes the current transfer fail.
    pub fn add_error(&self, error: io::Error) -> Result<(), SinkError> {
        self.enqueue(Err(error), "add_error")
    }

    fn enqueue(
        &self,
        item: io::Result<T>,
        operation: &'static str,
    ) -> Result<(), SinkError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;

        ensure!(!state.bound, InvalidState { operation });

        if state.closed || state.failure.is_some() {
            trace!("dropping {} on closed sink", operation);
            return Ok(());
        }

        state.phase = match mem::replace(&mut state.phase, Phase::Closed) {
            Phase::Idle(target) => {
                debug!("opening buffer channel");

                let (producer, receiver) = mpsc::unbounded_channel();
                let _ = producer.send(item);

                self.shared.clone().forward(
                    target,
                    Transfer {
                        stream: UnboundedReceiverStream::new(receiver).boxed(),
                        reply: None,
                    },
                );

                Phase::Buffering {
                    producer: Some(producer),
                    flush: None,
                    adoption: None,
                }
            }
            Phase::Buffering {
                producer: Some(producer),
                flush,
                adoption,
            } => {
                if producer.send(item).is_err() {
                    trace!("buffer channel already drained, dropping write");
                }

                Phase::Buffering {
                    producer: Some(producer),
                    flush,
                    adoption,
                }
            }
            other => {
                trace!("dropping {} while {}", operation, other.name());
                other
            }
        };

        Ok(())
    }

    /// Forward all of `stream` to the `Consumer` once every chunk queued so
    /// far has been delivered. The sink stays bound until the returned
    /// `Completion` resolves and rejects any other operation in the meantime.
    ///
    /// If the sink already failed or was closed, `stream` is dropped and the
    /// returned `Completion` is the one from [`done`].
    ///
    /// # Errors
    /// `InvalidState` if another stream is already bound to this sink
    ///
    /// # Example
    /// ```ignore
    /// let sink: BufferedSink<Vec<u8>, _>;
    /// sink.add(vec![1, 2])?;
    /// sink.add_stream(stream::iter(vec![Ok(vec![3])]))?.await?;
    /// ```
    ///
    /// [`done`]: BufferedSink::done
    pub fn add_stream<S>(&self, stream: S) -> Result<Completion, SinkError>
    where
        S: Stream<Item = io::Result<T>> + Send + 'static,
    {
        let mut guard = self.shared.lock();
        let state = &mut *guard;

        ensure!(!state.bound, InvalidState {
            operation: "add_stream"
        });

        if state.failure.is_some() || state.closed {
            debug!("sink is done, ignoring adopted stream");
            drop(guard);

            return Ok(self.done());
        }

        let (reply, receiver) = oneshot::channel();
        let transfer = Transfer {
            stream: stream.boxed(),
            reply: Some(reply),
        };

        state.phase = match mem::replace(&mut state.phase, Phase::StreamBound)
        {
            Phase::Idle(target) => {
                debug!("forwarding adopted stream");
                state.bound = true;
                self.shared.clone().forward(target, transfer);

                Phase::StreamBound
            }
            Phase::Buffering { flush, .. } => {
                debug!("draining buffer channel before adopted stream");
                state.bound = true;

                Phase::Buffering {
                    producer: None,
                    flush,
                    adoption: Some(transfer),
                }
            }
            other => other,
        };

        Ok(wait_reply(receiver))
    }

    /// Wait until every chunk queued so far has been delivered to the
    /// `Consumer`. The sink is bound until the returned `Completion`
    /// resolves.
    ///
    /// # Errors
    /// `InvalidState` if a stream is currently bound to this sink
    pub fn flush(&self) -> Result<Completion, SinkError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;

        ensure!(!state.bound, InvalidState { operation: "flush" });

        if state.closed || state.failure.is_some() {
            drop(guard);

            return Ok(self.done());
        }

        match &mut state.phase {
            Phase::Buffering { producer, flush, .. } => {
                debug!("flushing buffer channel");

                let (reply, receiver) = oneshot::channel();

                producer.take();
                flush.replace(reply);
                state.bound = true;

                Ok(wait_reply(receiver))
            }
            _ => Ok(future::ok(()).boxed()),
        }
    }

    /// Close this sink. Queued chunks are still delivered, after which the
    /// `Consumer` is finalized. Calling `close` again has no effect besides
    /// returning the same [`done`] `Completion`.
    ///
    /// # Errors
    /// `InvalidState` if a stream is currently bound to this sink
    ///
    /// [`done`]: BufferedSink::done
    pub fn close(&self) -> Result<Completion, SinkError> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;

        ensure!(!state.bound, InvalidState { operation: "close" });

        if !state.closed {
            state.closed = true;

            state.phase = match mem::replace(&mut state.phase, Phase::Closed) {
                Phase::Idle(target) => {
                    let shared = self.shared.clone();

                    task::spawn(
                        async move { shared.finalize(target, None).await }
                            .instrument(debug_span!("sink_finalize")),
                    );

                    Phase::Closed
                }
                Phase::Buffering { flush, adoption, .. } => {
                    debug!("closing buffer channel");

                    Phase::Buffering {
                        producer: None,
                        flush,
                        adoption,
                    }
                }
                other => other,
            };
        }

        drop(guard);

        Ok(self.done())
    }

    /// Get a `Completion` that resolves once the `Consumer` has been finalized,
    /// with the first error it encountered if any. This can be awaited any
    /// number of times.
    pub fn done(&self) -> Completion {
        let mut done = self.done.clone();

        async move {
            loop {
                let current = done.borrow().clone();

                if let Some(outcome) = current {
                    return outcome
                        .map_err(|source| SinkError::ConsumerFailure { source });
                }

                if done.changed().await.is_err() {
                    return Err(SinkError::Abandoned);
                }
            }
        }
        .boxed()
    }

    /// Checks whether a stream is currently bound to this sink
    pub fn is_bound(&self) -> bool {
        self.shared.lock().bound
    }

    /// Checks whether `close` has been called on this sink
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Checks whether the `Consumer` failed at some point
    pub fn has_failed(&self) -> bool {
        self.shared.lock().failure.is_some()
    }
}

impl<W> BufferedSink<Vec<u8>, WriterConsumer<W>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a `BufferedSink` writing every chunk to the given `AsyncWrite`
    pub fn from_writer(writer: W) -> Self {
        Self::new(WriterConsumer::new(writer))
    }
}

impl<T, C> fmt::Debug for BufferedSink<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.shared.lock();

        f.debug_struct("BufferedSink")
            .field("phase", &state.phase.name())
            .field("bound", &state.bound)
            .field("closed", &state.closed)
            .field("failed", &state.failure.is_some())
            .finish()
    }
}

impl<T, C> Drop for BufferedSink<T, C> {
    fn drop(&mut self) {
        // the forwarding task only lets go of the consumer once its buffer
        // channel ends
        if let Phase::Buffering { producer, .. } = &mut self.shared.lock().phase
        {
            producer.take();
        }
    }
}

impl<T, C> Shared<T, C> {
    fn lock(&self) -> MutexGuard<'_, State<T, C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, C> Shared<T, C>
where
    T: Send + 'static,
    C: Consumer<T>,
{
    /// Spawn the task that owns `target` until it is parked or finalized
    fn forward(self: Arc<Self>, target: C, transfer: Transfer<T>) {
        task::spawn(
            async move {
                let mut target = target;
                let mut transfer = transfer;

                loop {
                    let result = target.accept_stream(transfer.stream).await;

                    match self.release(target, result, transfer.reply) {
                        Release::Forward(next, adoption) => {
                            target = next;
                            transfer = adoption;
                        }
                        Release::Finalize(last, failure) => {
                            self.finalize(last, failure).await;
                            return;
                        }
                        Release::Parked => return,
                    }
                }
            }
            .instrument(debug_span!("sink_forward")),
        );
    }

    /// Hand `target` back once a transfer is over and decide what it does next
    fn release(
        &self,
        target: C,
        result: io::Result<()>,
        reply: Option<oneshot::Sender<Outcome>>,
    ) -> Release<T, C> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let (flush, adoption) =
            match mem::replace(&mut state.phase, Phase::StreamBound) {
                Phase::Buffering { flush, adoption, .. } => (flush, adoption),
                _ => (None, None),
            };

        let error = match result {
            Ok(()) => None,
            Err(error) => Some(Arc::new(error)),
        };

        if let Some(error) = error {
            warn!("consumer failed: {}", error);

            let waiters = reply
                .into_iter()
                .chain(flush)
                .chain(adoption.and_then(|adoption| adoption.reply));

            for waiter in waiters {
                let _ = waiter.send(Err(error.clone()));
            }

            state.failure = Some(error.clone());
            state.bound = false;
            state.phase = Phase::Closed;

            return Release::Finalize(target, Some(error));
        }

        if let Some(reply) = reply {
            debug!("adopted stream forwarded");

            state.bound = false;
            state.phase = Phase::Idle(target);
            let _ = reply.send(Ok(()));

            return Release::Parked;
        }

        trace!("buffer channel drained");

        if let Some(flush) = flush {
            let _ = flush.send(Ok(()));
        }

        if let Some(adoption) = adoption {
            debug!("forwarding adopted stream");

            Release::Forward(target, adoption)
        } else if state.closed {
            state.phase = Phase::Closed;

            Release::Finalize(target, None)
        } else {
            state.bound = false;
            state.phase = Phase::Idle(target);

            Release::Parked
        }
    }

    /// Finalize `target` and resolve the completion signal. `failure` wins
    /// over whatever finalizing returns.
    async fn finalize(&self, target: C, failure: Option<Arc<io::Error>>) {
        debug!("finalizing consumer");

        let result = target.finalize().await;

        let outcome = match (failure, result) {
            (Some(failure), Ok(())) => Err(failure),
            (Some(failure), Err(error)) => {
                warn!("finalizing failed consumer: {}", error);
                Err(failure)
            }
            (None, Ok(())) => Ok(()),
            (None, Err(error)) => {
                warn!("consumer failed to finalize: {}", error);

                let error = Arc::new(error);
                self.lock().failure = Some(error.clone());

                Err(error)
            }
        };

        self.done.send_replace(Some(outcome));
    }
}

fn wait_reply(receiver: oneshot::Receiver<Outcome>) -> Completion {
    async move {
        match receiver.await {
            Ok(outcome) => {
                outcome.map_err(|source| SinkError::ConsumerFailure { source })
            }
            Err(_) => Err(SinkError::Abandoned),
        }
    }
    .boxed()
}
