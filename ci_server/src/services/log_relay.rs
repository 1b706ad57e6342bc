//! Forward a build's console stream to a viewer.
//!
//! A relay pulls chunks from a [`LogChunks`] stream and hands them to a
//! [`LogSink`] until the stream ends, fails, the subscription is
//! cancelled or the sink goes away. The stream is dropped on every exit
//! path, which closes the upstream connection.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::body::Body;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::services::jenkins::LogChunks;

/// How a relay session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The build stopped producing output.
    Ended,
    /// The upstream stream failed; the sink was told.
    Errored,
    /// The viewer unsubscribed or disconnected.
    Unsubscribed,
}

/// Destination of a relay session.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver one chunk. `false` means the viewer is gone.
    async fn chunk(&mut self, text: String) -> bool;

    async fn end(&mut self);

    async fn error(&mut self, message: String);

    /// Resolves once the viewer is gone.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

pub async fn relay(
    mut chunks: LogChunks,
    sink: &mut dyn LogSink,
    cancel: &CancellationToken,
) -> RelayOutcome {
    crate::metrics::log_session_opened();
    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            _ = sink.closed() => None,
            next = chunks.next() => Some(next),
        };

        match next {
            None => break RelayOutcome::Unsubscribed,
            Some(Some(Ok(text))) => {
                if !sink.chunk(text).await {
                    break RelayOutcome::Unsubscribed;
                }
            }
            Some(Some(Err(e))) => {
                tracing::warn!("Log stream failed: {e}");
                sink.error(e.to_string()).await;
                break RelayOutcome::Errored;
            }
            Some(None) => {
                sink.end().await;
                break RelayOutcome::Ended;
            }
        }
    };
    drop(chunks);
    crate::metrics::log_session_closed();
    outcome
}

/// Chunked HTTP response body fed by a relay.
pub struct BodySink {
    tx: mpsc::Sender<String>,
}

impl BodySink {
    /// A sink and the response body it writes to. Dropping the body (the
    /// client disconnected) closes the sink.
    pub fn channel() -> (Self, Body) {
        let (tx, rx) = mpsc::channel::<String>(16);
        let body = stream::unfold(rx, |mut rx| async move {
            rx.recv()
                .await
                .map(|text| (Ok::<_, Infallible>(text), rx))
        });
        (Self { tx }, Body::from_stream(body))
    }
}

#[async_trait]
impl LogSink for BodySink {
    async fn chunk(&mut self, text: String) -> bool {
        self.tx.send(text).await.is_ok()
    }

    async fn end(&mut self) {}

    async fn error(&mut self, _message: String) {
        let _ = self
            .tx
            .send("\nError occurred while streaming log\n".to_string())
            .await;
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use http_body_util::BodyExt;

    use super::*;
    use crate::services::jenkins::JenkinsError;

    #[derive(Debug, PartialEq, Eq)]
    enum Seen {
        Chunk(String),
        End,
        Error(String),
    }

    #[derive(Default)]
    struct RecordingSink {
        seen: Vec<Seen>,
    }

    #[async_trait]
    impl LogSink for RecordingSink {
        async fn chunk(&mut self, text: String) -> bool {
            self.seen.push(Seen::Chunk(text));
            true
        }
        async fn end(&mut self) {
            self.seen.push(Seen::End);
        }
        async fn error(&mut self, message: String) {
            self.seen.push(Seen::Error(message));
        }
    }

    /// Sets its flag when dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn chunks(items: Vec<Result<String, JenkinsError>>) -> LogChunks {
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn forwards_chunks_in_order_then_ends_once() {
        let mut sink = RecordingSink::default();
        let outcome = relay(
            chunks(vec![Ok("a".into()), Ok("b".into()), Ok("c".into())]),
            &mut sink,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome, RelayOutcome::Ended);
        assert_eq!(
            sink.seen,
            [
                Seen::Chunk("a".into()),
                Seen::Chunk("b".into()),
                Seen::Chunk("c".into()),
                Seen::End,
            ]
        );
    }

    #[tokio::test]
    async fn stream_error_is_reported_and_terminal() {
        let mut sink = RecordingSink::default();
        let outcome = relay(
            chunks(vec![
                Ok("a".into()),
                Err(JenkinsError::NotFound("build shop #9".into())),
                Ok("never".into()),
            ]),
            &mut sink,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome, RelayOutcome::Errored);
        assert_eq!(
            sink.seen,
            [
                Seen::Chunk("a".into()),
                Seen::Error("build shop #9 not found".into()),
            ]
        );
    }

    #[tokio::test]
    async fn unsubscribe_drops_stream_and_stops_events() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let source = stream::once(async { Ok::<_, JenkinsError>("first".to_string()) })
            .chain(stream::pending())
            .map(move |item| {
                let _keep = &flag;
                item
            })
            .boxed();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut sink = RecordingSink::default();
        let outcome = relay(source, &mut sink, &cancel).await;

        assert_eq!(outcome, RelayOutcome::Unsubscribed);
        assert_eq!(sink.seen, [Seen::Chunk("first".into())]);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancelled_before_start_emits_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink = RecordingSink::default();
        let outcome = relay(chunks(vec![Ok("a".into())]), &mut sink, &cancel).await;
        assert_eq!(outcome, RelayOutcome::Unsubscribed);
        assert!(sink.seen.is_empty());
    }

    #[tokio::test]
    async fn body_sink_writes_chunks_and_error_line() {
        let (mut sink, body) = BodySink::channel();
        let task = tokio::spawn(async move {
            relay(
                chunks(vec![
                    Ok("one\n".into()),
                    Err(JenkinsError::Status {
                        operation: "fetch log",
                        status: 500,
                    }),
                ]),
                &mut sink,
                &CancellationToken::new(),
            )
            .await
        });

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            "one\n\nError occurred while streaming log\n"
        );
        assert_eq!(task.await.unwrap(), RelayOutcome::Errored);
    }

    #[tokio::test]
    async fn dropped_body_stops_relay() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let source = stream::pending::<Result<String, JenkinsError>>()
            .map(move |item| {
                let _keep = &flag;
                item
            })
            .boxed();

        let (mut sink, body) = BodySink::channel();
        drop(body);
        let outcome = relay(source, &mut sink, &CancellationToken::new()).await;

        assert_eq!(outcome, RelayOutcome::Unsubscribed);
        assert!(dropped.load(Ordering::SeqCst));
    }
}
