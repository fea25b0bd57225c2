//! Server side of the event stream: one channel per session

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::subscriber::{EventSource, EventStream};
use super::{AutomationEvent, EventKind, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventConfig {
    pub heartbeat: Duration,
    pub reconnect_backoff: Duration,
    /// Live events buffered per subscriber before it counts as lagging
    pub buffer: usize,
    /// How long a finished channel stays replayable before it is pruned
    pub retention: Duration,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(15),
            reconnect_backoff: Duration::from_secs(3),
            buffer: 256,
            retention: Duration::from_secs(600),
        }
    }
}

struct ChannelLog {
    events: Vec<AutomationEvent>,
    last_seq: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl ChannelLog {
    /// Wall clock, but never earlier than anything already handed out
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let timestamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }
}

struct SessionChannel {
    session_id: String,
    /// `None` once the task finished; receivers drain and then end
    sender: Mutex<Option<broadcast::Sender<AutomationEvent>>>,
    log: Mutex<ChannelLog>,
    finished: CancellationToken,
    finished_at: Mutex<Option<Instant>>,
}

impl SessionChannel {
    fn publish(&self, kind: EventKind, message: String, data: Option<Value>) -> AutomationEvent {
        let mut log = self.log.lock();
        log.last_seq += 1;
        let event = AutomationEvent {
            session_id: self.session_id.clone(),
            seq: log.last_seq,
            timestamp: log.next_timestamp(),
            kind,
            message,
            data,
        };
        if kind != EventKind::Heartbeat {
            log.events.push(event.clone());
        }
        // Sent under the log lock so replay and live delivery never overlap
        if let Some(sender) = self.sender.lock().as_ref() {
            let _ = sender.send(event.clone());
        }
        event
    }
}

/// Publishing handle for one session
#[derive(Clone)]
pub struct EventEmitter {
    channel: Arc<SessionChannel>,
}

impl EventEmitter {
    pub fn session_id(&self) -> &str {
        &self.channel.session_id
    }

    pub fn emit(
        &self,
        kind: EventKind,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> AutomationEvent {
        let event = self.channel.publish(kind, message.into(), data);
        debug!(
            session_id = %event.session_id,
            seq = event.seq,
            kind = ?event.kind,
            "{}",
            event.message
        );
        event
    }

    pub fn info(&self, message: impl Into<String>) -> AutomationEvent {
        self.emit(EventKind::Info, message, None)
    }

    pub fn success(&self, message: impl Into<String>, data: Option<Value>) -> AutomationEvent {
        self.emit(EventKind::Success, message, data)
    }

    pub fn error(&self, message: impl Into<String>, data: Option<Value>) -> AutomationEvent {
        self.emit(EventKind::Error, message, data)
    }

    pub fn screenshot(&self, url: &str) -> AutomationEvent {
        self.emit(
            EventKind::Screenshot,
            format!("Screenshot captured: {url}"),
            Some(serde_json::json!({ "screenshotUrl": url })),
        )
    }
}

/// Per-session event channels with replay
pub struct EventHub {
    channels: DashMap<String, Arc<SessionChannel>>,
    config: EventConfig,
}

impl EventHub {
    pub fn new(config: EventConfig) -> Self {
        Self {
            channels: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> EventConfig {
        self.config
    }

    /// Open the channel for a session and start its heartbeat
    ///
    /// Channels finished longer than the retention window are pruned first.
    pub fn open(&self, session_id: &str) -> EventEmitter {
        self.prune();
        if let Some(existing) = self.channels.get(session_id) {
            return EventEmitter {
                channel: existing.value().clone(),
            };
        }

        let (sender, _) = broadcast::channel(self.config.buffer.max(1));
        let channel = Arc::new(SessionChannel {
            session_id: session_id.to_string(),
            sender: Mutex::new(Some(sender)),
            log: Mutex::new(ChannelLog {
                events: Vec::new(),
                last_seq: 0,
                last_timestamp: None,
            }),
            finished: CancellationToken::new(),
            finished_at: Mutex::new(None),
        });
        self.channels
            .insert(session_id.to_string(), channel.clone());

        let heartbeat = channel.clone();
        let period = self.config.heartbeat;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = heartbeat.finished.cancelled() => break,
                    _ = ticker.tick() => {
                        heartbeat.publish(EventKind::Heartbeat, String::new(), None);
                    }
                }
            }
        });

        EventEmitter { channel }
    }

    /// Stored events with `seq > after_seq`, in order
    pub fn backlog(&self, session_id: &str, after_seq: Option<u64>) -> Vec<AutomationEvent> {
        self.channels
            .get(session_id)
            .map(|channel| {
                let log = channel.log.lock();
                let after = after_seq.unwrap_or(0);
                log.events.iter().filter(|e| e.seq > after).cloned().collect()
            })
            .unwrap_or_default()
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.channels
            .get(session_id)
            .is_some_and(|c| !c.finished.is_cancelled())
    }

    /// Mark the task finished: heartbeats stop, live streams end after draining
    pub fn finish(&self, session_id: &str) {
        if let Some(channel) = self.channels.get(session_id) {
            channel.finished.cancel();
            channel.sender.lock().take();
            channel.finished_at.lock().get_or_insert_with(Instant::now);
        }
    }

    /// Drop channels finished at least `retention` ago; returns how many
    pub fn prune(&self) -> usize {
        let retention = self.config.retention;
        let before = self.channels.len();
        self.channels.retain(|_, channel| {
            channel
                .finished_at
                .lock()
                .is_none_or(|at| at.elapsed() < retention)
        });
        let pruned = before.saturating_sub(self.channels.len());
        if pruned > 0 {
            info!(pruned, "Pruned finished event channels");
        }
        pruned
    }

    /// Number of channels held, finished ones included
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Drop a finished channel and its replay log
    pub fn remove(&self, session_id: &str) {
        if let Some((_, channel)) = self.channels.remove(session_id) {
            channel.finished.cancel();
            channel.sender.lock().take();
        }
    }
}

#[async_trait]
impl EventSource for EventHub {
    async fn connect(
        &self,
        session_id: &str,
        after_seq: Option<u64>,
    ) -> Result<EventStream, TransportError> {
        let channel = self
            .channels
            .get(session_id)
            .map(|c| c.value().clone())
            .ok_or_else(|| TransportError::UnknownSession(session_id.to_string()))?;

        let (connected, backlog, receiver) = {
            let mut log = channel.log.lock();
            let after = after_seq.unwrap_or(0);
            let backlog: Vec<AutomationEvent> =
                log.events.iter().filter(|e| e.seq > after).cloned().collect();
            // Never later than the replay it announces
            let (seq, timestamp) = match backlog.first() {
                Some(first) => (first.seq - 1, first.timestamp),
                None => (log.last_seq, log.next_timestamp()),
            };
            let connected = AutomationEvent {
                session_id: session_id.to_string(),
                seq,
                timestamp,
                kind: EventKind::Connected,
                message: "Connected to event stream".to_string(),
                data: None,
            };
            let receiver = channel.sender.lock().as_ref().map(|s| s.subscribe());
            (connected, backlog, receiver)
        };

        let replay = futures::stream::iter(
            std::iter::once(connected)
                .chain(backlog)
                .map(Ok::<_, TransportError>),
        );

        let Some(receiver) = receiver else {
            return Ok(replay.boxed());
        };
        let live = BroadcastStream::new(receiver).map(|item| {
            item.map_err(|BroadcastStreamRecvError::Lagged(skipped)| TransportError::Lagged(skipped))
        });
        Ok(replay.chain(live).boxed())
    }
}
