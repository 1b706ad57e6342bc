//! Log subscriptions over WebSocket.
//!
//! Each socket holds at most one log session. A new `subscribe_log`
//! replaces the current one; events still queued from a replaced or
//! unsubscribed session are discarded by session id.

use std::pin::pin;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::events::log::{ClientEvent, LogTarget, ServerEvent};
use crate::routes::AppState;
use crate::services::jenkins::{log_stream, StreamOptions};
use crate::services::log_relay::{relay, LogSink};

const PING_INTERVAL: Duration = Duration::from_secs(30);

const PONG_TIMEOUT: Duration = Duration::from_secs(60);

type SessionId = u64;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    SocketSessions::new(state, StreamOptions::default())
        .run(sender, receiver)
        .await;
}

struct Session {
    id: SessionId,
    cancel: CancellationToken,
}

impl Session {
    fn stop(self) {
        self.cancel.cancel();
    }
}

/// Relay sink that tags every event with its session.
struct SocketSink {
    session: SessionId,
    target: LogTarget,
    tx: mpsc::Sender<(SessionId, ServerEvent)>,
}

#[async_trait]
impl LogSink for SocketSink {
    async fn chunk(&mut self, text: String) -> bool {
        let event = ServerEvent::LogUpdate {
            job_name: self.target.job_name.clone(),
            build_number: self.target.build_number,
            log: text,
        };
        self.tx.send((self.session, event)).await.is_ok()
    }

    async fn end(&mut self) {
        let event = ServerEvent::LogEnd {
            job_name: self.target.job_name.clone(),
            build_number: self.target.build_number,
        };
        let _ = self.tx.send((self.session, event)).await;
    }

    async fn error(&mut self, message: String) {
        let event = ServerEvent::LogError {
            job_name: self.target.job_name.clone(),
            build_number: self.target.build_number,
            error: message,
        };
        let _ = self.tx.send((self.session, event)).await;
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

fn subscribe(
    state: &AppState,
    options: StreamOptions,
    session: SessionId,
    target: LogTarget,
    tx: mpsc::Sender<(SessionId, ServerEvent)>,
) -> Session {
    tracing::info!(
        job = %target.job_name,
        build = target.build_number,
        "Client subscribed to log"
    );

    let cancel = CancellationToken::new();
    let chunks = log_stream(
        state.jobs.clone(),
        target.job_name.clone(),
        target.build_number,
        options,
    );
    let mut sink = SocketSink {
        session,
        target,
        tx,
    };
    let token = cancel.clone();
    tokio::spawn(async move {
        let outcome = relay(chunks, &mut sink, &token).await;
        tracing::info!(
            job = %sink.target.job_name,
            build = sink.target.build_number,
            ?outcome,
            "Log session finished"
        );
    });

    Session { id: session, cancel }
}

async fn send_event<W>(sender: &mut W, event: &ServerEvent) -> Result<(), W::Error>
where
    W: Sink<Message> + Unpin,
{
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::error!("Failed to serialize socket event: {e}");
            Ok(())
        }
    }
}

/// One socket's log session and the queue its relay writes into.
struct SocketSessions {
    state: AppState,
    options: StreamOptions,
    events_tx: mpsc::Sender<(SessionId, ServerEvent)>,
    events_rx: mpsc::Receiver<(SessionId, ServerEvent)>,
    current: Option<Session>,
    next_session: SessionId,
}

impl SocketSessions {
    fn new(state: AppState, options: StreamOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            state,
            options,
            events_tx,
            events_rx,
            current: None,
            next_session: 0,
        }
    }

    fn handle_client(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::SubscribeLog(target) => {
                if let Some(previous) = self.current.take() {
                    previous.stop();
                }
                self.next_session += 1;
                self.current = Some(subscribe(
                    &self.state,
                    self.options,
                    self.next_session,
                    target,
                    self.events_tx.clone(),
                ));
            }
            ClientEvent::UnsubscribeLog => {
                if let Some(session) = self.current.take() {
                    tracing::info!("Client unsubscribed from log");
                    session.stop();
                }
            }
        }
    }

    /// `Some` when the event belongs to the live session.
    fn accept(&mut self, session: SessionId, event: ServerEvent) -> Option<ServerEvent> {
        if self.current.as_ref().map(|s| s.id) != Some(session) {
            return None;
        }
        if event.is_terminal() {
            self.current = None;
        }
        Some(event)
    }

    /// Serve one socket until the client leaves. Client frames are handled
    /// before queued events, so nothing from a dropped session is sent
    /// after the frame that dropped it.
    async fn run<W, R, E>(mut self, sender: W, receiver: R)
    where
        W: Sink<Message>,
        R: Stream<Item = Result<Message, E>>,
    {
        let mut sender = pin!(sender);
        let mut receiver = pin!(receiver);

        let mut ping_interval = tokio::time::interval(PING_INTERVAL);
        ping_interval.tick().await;
        let mut last_pong = Instant::now();
        let mut awaiting_pong = false;

        loop {
            tokio::select! {
                biased;

                msg = receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => match ClientEvent::from_json(text.as_str()) {
                            Ok(event) => self.handle_client(event),
                            Err(e) => tracing::warn!("Ignoring socket frame: {e}"),
                        },
                        Some(Ok(Message::Pong(_))) => {
                            last_pong = Instant::now();
                            awaiting_pong = false;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break,
                    }
                }

                Some((session, event)) = self.events_rx.recv() => {
                    let Some(event) = self.accept(session, event) else {
                        continue;
                    };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }

                _ = ping_interval.tick() => {
                    if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                        tracing::debug!("Socket missed its pong, closing");
                        break;
                    }
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                    awaiting_pong = true;
                }
            }
        }

        if let Some(session) = self.current.take() {
            session.stop();
        }
        let _ = sender.send(Message::Close(None)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::Arc;

    use futures_util::stream;
    use serde_json::{json, Value};
    use tokio::time::timeout;
    use tokio_util::sync::PollSender;

    use super::*;
    use crate::models::build::{LogFormat, LogPage};
    use crate::services::log_relay::RelayOutcome;
    use crate::testing::{app_state, test_config, FakeJobs};

    fn target() -> LogTarget {
        LogTarget {
            job_name: "deploy-shop".into(),
            build_number: 5,
        }
    }

    #[tokio::test]
    async fn socket_sink_tags_events_with_session() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut sink = SocketSink {
            session: 3,
            target: target(),
            tx,
        };
        let chunks = stream::iter(vec![Ok("a".to_string()), Ok("b".to_string())]).boxed();
        let outcome = relay(chunks, &mut sink, &CancellationToken::new()).await;
        assert_eq!(outcome, RelayOutcome::Ended);
        drop(sink);

        let mut events = Vec::new();
        while let Some(item) = rx.recv().await {
            events.push(item);
        }
        assert_eq!(
            events,
            [
                (
                    3,
                    ServerEvent::LogUpdate {
                        job_name: "deploy-shop".into(),
                        build_number: 5,
                        log: "a".into()
                    }
                ),
                (
                    3,
                    ServerEvent::LogUpdate {
                        job_name: "deploy-shop".into(),
                        build_number: 5,
                        log: "b".into()
                    }
                ),
                (
                    3,
                    ServerEvent::LogEnd {
                        job_name: "deploy-shop".into(),
                        build_number: 5
                    }
                ),
            ]
        );
    }

    #[tokio::test]
    async fn closed_socket_ends_session() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let mut sink = SocketSink {
            session: 1,
            target: target(),
            tx,
        };
        let outcome = relay(
            stream::pending().boxed(),
            &mut sink,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(outcome, RelayOutcome::Unsubscribed);
    }

    /// Client end of a socket served by [`SocketSessions::run`].
    struct Client {
        frames: mpsc::UnboundedSender<Message>,
        out: mpsc::Receiver<Message>,
        /// Queue the relays write into, for events a relay left behind.
        queued: mpsc::Sender<(SessionId, ServerEvent)>,
    }

    fn connect(jobs: Arc<FakeJobs>) -> Client {
        let options = StreamOptions {
            format: LogFormat::Text,
            delay: Duration::ZERO,
        };
        let sessions = SocketSessions::new(app_state(jobs, Arc::default(), test_config()), options);
        let queued = sessions.events_tx.clone();

        let (frames, frames_rx) = mpsc::unbounded_channel();
        let incoming = stream::unfold(frames_rx, |mut rx| async move {
            rx.recv().await.map(|msg| (Ok::<_, Infallible>(msg), rx))
        });
        let (out_tx, out) = mpsc::channel(16);
        tokio::spawn(sessions.run(PollSender::new(out_tx), incoming));

        Client {
            frames,
            out,
            queued,
        }
    }

    impl Client {
        fn send(&self, frame: Value) {
            self.frames
                .send(Message::Text(frame.to_string().into()))
                .unwrap();
        }

        async fn next_event(&mut self) -> Value {
            let msg = timeout(Duration::from_secs(5), self.out.recv())
                .await
                .expect("no event within 5s")
                .expect("socket closed");
            match msg {
                Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("unexpected frame {other:?}"),
            }
        }

        async fn assert_silent(&mut self) {
            let next = timeout(Duration::from_millis(200), self.out.recv()).await;
            assert!(next.is_err(), "unexpected frame {next:?}");
        }
    }

    fn subscribe_frame(build: u64) -> Value {
        json!({"event": "subscribe_log", "data": {"jobName": "deploy-shop", "buildNumber": build}})
    }

    fn page(text: &str, size: u64) -> LogPage {
        LogPage {
            text: text.into(),
            more: true,
            size,
        }
    }

    fn update(build: u64, log: &str) -> ServerEvent {
        ServerEvent::LogUpdate {
            job_name: "deploy-shop".into(),
            build_number: build,
            log: log.into(),
        }
    }

    #[tokio::test]
    async fn nothing_is_sent_after_unsubscribe() {
        let jobs = FakeJobs::with_jobs(&["deploy-shop"]);
        let feed = jobs.feed_log(1);
        let mut client = connect(jobs);

        client.send(subscribe_frame(1));
        feed.send(page("one\n", 4)).unwrap();
        let event = client.next_event().await;
        assert_eq!(event["event"], "log_update");
        assert_eq!(event["data"]["buildNumber"], 1);
        assert_eq!(event["data"]["log"], "one\n");

        client.send(json!({"event": "unsubscribe_log"}));
        client.queued.send((1, update(1, "queued\n"))).await.unwrap();
        let _ = feed.send(page("late\n", 9));
        client.assert_silent().await;
    }

    #[tokio::test]
    async fn new_subscription_replaces_the_current_one() {
        let jobs = FakeJobs::with_jobs(&["deploy-shop"]);
        let first = jobs.feed_log(1);
        let second = jobs.feed_log(2);
        let mut client = connect(jobs);

        client.send(subscribe_frame(1));
        client.send(subscribe_frame(2));
        let _ = first.send(page("from one\n", 9));
        second.send(page("from two\n", 9)).unwrap();

        let event = client.next_event().await;
        assert_eq!(event["data"]["buildNumber"], 2);
        assert_eq!(event["data"]["log"], "from two\n");

        client.queued.send((1, update(1, "queued\n"))).await.unwrap();
        client.assert_silent().await;

        drop(second);
        let event = client.next_event().await;
        assert_eq!(event["event"], "log_end");
        assert_eq!(event["data"]["buildNumber"], 2);
    }
}
