use std::io;

use iosink::sink::{BufferedSink, SinkError};
use iosink::test::{init_logger, RecordingConsumer, INJECTED_FAILURE};
use iosink::text::{Charset, TextSink};

use futures::stream;

use tokio::io::{duplex, AsyncReadExt};
use tokio::task;

use tracing::trace_span;
use tracing_futures::Instrument;

#[tokio::test]
async fn buffered_writes_precede_adopted_stream() {
    init_logger();

    let (consumer, recording) = RecordingConsumer::new();
    let sink = BufferedSink::new(consumer);

    sink.add(vec![1, 2]).expect("add failed");
    sink.add(vec![3]).expect("add failed");

    let adopted = sink
        .add_stream(stream::iter(vec![Ok(vec![4]), Ok(vec![5])]))
        .expect("bound sink");

    adopted
        .instrument(trace_span!("adopt"))
        .await
        .expect("adoption failed");

    sink.close().expect("bound sink").await.expect("close failed");

    assert_eq!(
        recording.items(),
        vec![vec![1, 2], vec![3], vec![4], vec![5]]
    );
    assert_eq!(recording.finalized(), 1);

    sink.done().await.expect("done failed");
}

#[tokio::test]
async fn failure_is_reported_once() {
    init_logger();

    let (consumer, recording) = RecordingConsumer::new();
    let sink = BufferedSink::new(consumer.fail_at(0));

    let err = sink
        .add_stream(stream::iter(vec![Ok(vec![1])]))
        .expect("bound sink")
        .await
        .expect_err("adoption succeeded");

    match err {
        SinkError::ConsumerFailure { source } => {
            assert_eq!(source.to_string(), INJECTED_FAILURE)
        }
        other => panic!("unexpected error {}", other),
    }

    sink.done().await.expect_err("done succeeded");
    sink.add_stream(stream::iter(vec![Ok(vec![2])]))
        .expect("bound sink")
        .await
        .expect_err("adoption succeeded after failure");

    assert!(recording.items().is_empty());
    assert_eq!(recording.streams(), 1);
    assert_eq!(recording.finalized(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn text_to_writer() {
    init_logger();

    let (writer, mut reader) = duplex(16);
    let text = TextSink::from_writer(writer, Charset::Utf8);

    let reading = task::spawn(async move {
        let mut output = Vec::new();

        reader
            .read_to_end(&mut output)
            .await
            .expect("read failed");

        output
    });

    for line in 0..100 {
        text.writeln(&line).expect("write failed");
    }

    text.flush().expect("bound sink").await.expect("flush failed");

    text.add_stream(stream::iter(
        (0..10).map(|x| Ok::<_, io::Error>(vec![b'a' + x])),
    ))
    .expect("bound sink")
    .await
    .expect("adoption failed");

    text.write_all(&["x", "y", "z"], "-").expect("write failed");
    text.close().expect("bound sink").await.expect("close failed");

    let expected = (0..100)
        .map(|x| format!("{}\n", x))
        .chain(std::iter::once("abcdefghij".to_string()))
        .chain(std::iter::once("x-y-z".to_string()))
        .collect::<String>();

    let output = reading.await.expect("reader panicked");

    assert_eq!(String::from_utf8(output).expect("invalid utf-8"), expected);
}
