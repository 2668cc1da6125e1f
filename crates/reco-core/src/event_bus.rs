//! Per-session pub/sub fabric.
//!
//! Built directly on `tokio::sync::broadcast`: its built-in `Lagged` error
//! is the slow-subscriber-disconnect mechanism (§4.1) rather than something
//! hand-rolled on top of per-subscriber mpsc channels — a receiver that
//! falls more than the channel's capacity behind the ring buffer is told
//! exactly how many messages it missed, which this module turns into a
//! terminal `overflow` marker for that subscriber alone.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use reco_types::{ErrorKind, Event};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::config::OrchestratorConfig;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

struct SessionState {
    tx: broadcast::Sender<Event>,
    terminal_at: RwLock<Option<Instant>>,
}

/// Process-wide registry mapping session id to its live `Session`.
#[derive(Clone)]
pub struct EventBus {
    config: OrchestratorConfig,
    sessions: Arc<RwLock<HashMap<String, Arc<SessionState>>>>,
}

impl EventBus {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Idempotent: reopening a live session returns the same underlying
    /// channel. Reopening a reaped session starts fresh.
    pub async fn open(&self, session_id: &str) -> bool {
        self.reap_if_expired(session_id).await;
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            return false;
        }
        let (tx, _rx) = broadcast::channel(self.config.per_subscriber_buffer.max(1));
        sessions.insert(
            session_id.to_string(),
            Arc::new(SessionState {
                tx,
                terminal_at: RwLock::new(None),
            }),
        );
        tracing::debug!(session_id, "event_bus.session_opened");
        true
    }

    /// Fails silently if the session does not exist, or already received a
    /// terminal event (I2) — producers never block on an absent or closed
    /// audience.
    pub async fn publish(&self, session_id: &str, event: Event) {
        self.reap_if_expired(session_id).await;
        let state = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).cloned()
        };
        let Some(state) = state else {
            tracing::trace!(session_id, "event_bus.publish_dropped_no_session");
            return;
        };
        {
            let terminal_at = state.terminal_at.read().await;
            if terminal_at.is_some() {
                return;
            }
        }
        if event.is_terminal() {
            *state.terminal_at.write().await = Some(Instant::now());
        }
        // Err means no receivers are currently subscribed; that is not a
        // failure from the producer's point of view.
        let _ = state.tx.send(event);
    }

    /// Subscribing to an unknown session creates it, so a client may
    /// connect before the orchestrator has published anything.
    pub async fn subscribe(&self, session_id: &str) -> Subscription {
        self.open(session_id).await;
        let rx = {
            let sessions = self.sessions.read().await;
            sessions
                .get(session_id)
                .expect("just opened")
                .tx
                .subscribe()
        };
        Subscription::new(session_id.to_string(), rx, self.config.clone())
    }

    /// Marks the session terminal (if not already) so it becomes eligible
    /// for reaping after the grace period. Reaping itself happens lazily
    /// the next time the session id is touched.
    pub async fn close(&self, session_id: &str) {
        let sessions = self.sessions.read().await;
        if let Some(state) = sessions.get(session_id) {
            let mut terminal_at = state.terminal_at.write().await;
            if terminal_at.is_none() {
                *terminal_at = Some(Instant::now());
            }
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub async fn session_exists(&self, session_id: &str) -> bool {
        self.reap_if_expired(session_id).await;
        self.sessions.read().await.contains_key(session_id)
    }

    async fn reap_if_expired(&self, session_id: &str) {
        let expired = {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                Some(state) => {
                    let terminal_at = state.terminal_at.read().await;
                    terminal_at
                        .map(|t| t.elapsed() > self.config.session_reap_grace())
                        .unwrap_or(false)
                }
                None => false,
            }
        };
        if expired {
            self.sessions.write().await.remove(session_id);
            tracing::debug!(session_id, "event_bus.session_reaped");
        }
    }
}

/// A single subscriber's view of a session's event stream.
pub struct Subscription {
    session_id: String,
    inner: BroadcastStream<Event>,
    keep_alive_interval: std::time::Duration,
    sent_initial: bool,
    done: bool,
}

impl Subscription {
    fn new(session_id: String, rx: broadcast::Receiver<Event>, config: OrchestratorConfig) -> Self {
        Self {
            session_id,
            inner: BroadcastStream::new(rx),
            keep_alive_interval: config.keep_alive_interval(),
            sent_initial: false,
            done: false,
        }
    }

    /// Pull the next event, synthesizing `connection_established` as the
    /// very first item and `keep_alive` after a silent interval. Returns
    /// `None` once a terminal event (or an overflow disconnect) has been
    /// delivered — nothing follows it.
    pub async fn recv(&mut self) -> Option<Event> {
        if self.done {
            return None;
        }
        if !self.sent_initial {
            self.sent_initial = true;
            return Some(Event::ConnectionEstablished {
                session_id: self.session_id.clone(),
                timestamp_ms: now_ms(),
            });
        }
        loop {
            match tokio::time::timeout(self.keep_alive_interval, self.inner.next()).await {
                Ok(Some(Ok(event))) => {
                    if event.is_terminal() {
                        self.done = true;
                    }
                    return Some(event);
                }
                Ok(Some(Err(BroadcastStreamRecvError::Lagged(missed)))) => {
                    tracing::warn!(session_id = %self.session_id, missed, "event_bus.subscriber_overflow");
                    self.done = true;
                    return Some(Event::Error {
                        session_id: self.session_id.clone(),
                        timestamp_ms: now_ms(),
                        kind: ErrorKind::Overflow,
                        message: format!("subscriber lagged and missed {missed} events"),
                    });
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(_elapsed) => {
                    return Some(Event::KeepAlive {
                        session_id: self.session_id.clone(),
                        timestamp_ms: now_ms(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reco_types::FusedResult;
    use std::time::Duration;

    fn test_config() -> OrchestratorConfig {
        OrchestratorConfig {
            per_subscriber_buffer: 8,
            keep_alive_interval_secs: 30,
            ..Default::default()
        }
    }

    fn completed(session_id: &str) -> Event {
        Event::RecommendationCompleted {
            session_id: session_id.to_string(),
            timestamp_ms: now_ms(),
            result: FusedResult::empty(),
        }
    }

    #[tokio::test]
    async fn subscribe_to_unknown_session_creates_it() {
        let bus = EventBus::new(test_config());
        assert!(!bus.session_exists("s1").await);
        let _sub = bus.subscribe("s1").await;
        assert!(bus.session_exists("s1").await);
    }

    #[tokio::test]
    async fn first_event_is_always_connection_established() {
        let bus = EventBus::new(test_config());
        let mut sub = bus.subscribe("s1").await;
        let first = sub.recv().await.unwrap();
        assert_eq!(first.event_type(), "connection_established");
    }

    #[tokio::test]
    async fn publish_before_any_subscriber_exists_is_silently_dropped() {
        let bus = EventBus::new(test_config());
        bus.open("s1").await;
        bus.publish(
            "s1",
            Event::CollaborationStarted {
                session_id: "s1".into(),
                timestamp_ms: now_ms(),
            },
        )
        .await;
        // No panic, no observable effect: nothing to assert but that it didn't block/crash.
    }

    #[tokio::test]
    async fn events_are_delivered_in_publish_order() {
        let bus = EventBus::new(test_config());
        let mut sub = bus.subscribe("s1").await;
        sub.recv().await; // connection_established

        for i in 0..3 {
            bus.publish(
                "s1",
                Event::FusionProgress {
                    session_id: "s1".into(),
                    timestamp_ms: now_ms(),
                    message: format!("step-{i}"),
                },
            )
            .await;
        }
        bus.publish("s1", completed("s1")).await;

        for i in 0..3 {
            let event = sub.recv().await.unwrap();
            match event {
                Event::FusionProgress { message, .. } => assert_eq!(message, format!("step-{i}")),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        let terminal = sub.recv().await.unwrap();
        assert_eq!(terminal.event_type(), "recommendation_completed");
    }

    #[tokio::test]
    async fn nothing_follows_a_terminal_event() {
        let bus = EventBus::new(test_config());
        let mut sub = bus.subscribe("s1").await;
        sub.recv().await; // connection_established

        bus.publish("s1", completed("s1")).await;
        bus.publish(
            "s1",
            Event::FusionProgress {
                session_id: "s1".into(),
                timestamp_ms: now_ms(),
                message: "too-late".into(),
            },
        )
        .await;

        let terminal = sub.recv().await.unwrap();
        assert_eq!(terminal.event_type(), "recommendation_completed");
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn opening_a_session_twice_returns_the_same_session() {
        let bus = EventBus::new(test_config());
        let created_first = bus.open("s1").await;
        let created_second = bus.open("s1").await;
        assert!(created_first);
        assert!(!created_second);
    }

    #[tokio::test]
    async fn slow_subscriber_is_disconnected_with_overflow_and_others_are_unaffected() {
        let bus = EventBus::new(test_config()); // buffer = 8
        let mut slow = bus.subscribe("s1").await;
        let mut prompt = bus.subscribe("s1").await;
        slow.recv().await;
        prompt.recv().await;

        // Publish well past the buffer capacity without the slow subscriber reading.
        for i in 0..30 {
            bus.publish(
                "s1",
                Event::FusionProgress {
                    session_id: "s1".into(),
                    timestamp_ms: now_ms(),
                    message: format!("e{i}"),
                },
            )
            .await;
        }
        bus.publish("s1", completed("s1")).await;

        let mut saw_overflow = false;
        while let Some(event) = slow.recv().await {
            if let Event::Error { kind, .. } = event {
                assert_eq!(kind, ErrorKind::Overflow);
                saw_overflow = true;
                break;
            }
        }
        assert!(saw_overflow, "slow subscriber should observe an overflow terminal");

        let mut saw_terminal = false;
        while let Some(event) = prompt.recv().await {
            if event.is_terminal() {
                assert_eq!(event.event_type(), "recommendation_completed");
                saw_terminal = true;
            }
        }
        assert!(saw_terminal, "prompt subscriber should still see the full stream");
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_is_synthesized_after_silence() {
        let mut config = test_config();
        config.keep_alive_interval_secs = 1;
        let bus = EventBus::new(config);
        let mut sub = bus.subscribe("s1").await;
        sub.recv().await; // connection_established

        tokio::time::advance(Duration::from_secs(2)).await;
        let event = sub.recv().await.unwrap();
        assert_eq!(event.event_type(), "keep_alive");
    }
}
