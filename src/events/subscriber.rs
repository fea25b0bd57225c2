//! Client side of the event stream
//!
//! Follows one session: keeps an ordered log of everything except
//! heartbeats, and reconnects after a fixed backoff when the connection
//! drops while the task is still running.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{AutomationEvent, EventKind, TransportError};

pub type EventStream = Pin<Box<dyn Stream<Item = Result<AutomationEvent, TransportError>> + Send>>;

/// Something a subscriber can (re)connect to
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Stream starting with a `connected` event, then every stored event
    /// after `after_seq`, then live events until the task finishes
    ///
    /// The `connected` event is never stamped later than the first event
    /// replayed after it.
    async fn connect(
        &self,
        session_id: &str,
        after_seq: Option<u64>,
    ) -> Result<EventStream, TransportError>;
}

pub struct EventSubscriber {
    source: Arc<dyn EventSource>,
    session_id: String,
    backoff: Duration,
    log: RwLock<Vec<AutomationEvent>>,
    last_seq: Mutex<Option<u64>>,
    running: AtomicBool,
    connected: AtomicBool,
    connections: AtomicUsize,
    stop: CancellationToken,
}

impl EventSubscriber {
    pub fn new(source: Arc<dyn EventSource>, session_id: impl Into<String>, backoff: Duration) -> Self {
        Self {
            source,
            session_id: session_id.into(),
            backoff,
            log: RwLock::new(Vec::new()),
            last_seq: Mutex::new(None),
            running: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            connections: AtomicUsize::new(0),
            stop: CancellationToken::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Everything received so far, heartbeats excluded
    pub fn events(&self) -> Vec<AutomationEvent> {
        self.log.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Stop following; a pending reconnect is abandoned
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop.cancel();
    }

    /// Follow the session until it finishes or `stop` is called
    ///
    /// `on_event` sees each accepted event once, in log order.
    pub async fn run<F>(&self, mut on_event: F) -> Result<(), TransportError>
    where
        F: FnMut(&AutomationEvent) + Send,
    {
        loop {
            if self.stop.is_cancelled() {
                return Ok(());
            }

            let after_seq = *self.last_seq.lock();
            let mut stream = match self.source.connect(&self.session_id, after_seq).await {
                Ok(stream) => stream,
                Err(TransportError::UnknownSession(id)) => {
                    self.running.store(false, Ordering::SeqCst);
                    return Err(TransportError::UnknownSession(id));
                }
                Err(e) => {
                    warn!(session_id = %self.session_id, error = %e, "Event stream connect failed");
                    if !self.pause().await {
                        return Ok(());
                    }
                    continue;
                }
            };
            self.connected.store(true, Ordering::SeqCst);
            self.connections.fetch_add(1, Ordering::SeqCst);

            let failure = loop {
                let item = tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => {
                        self.connected.store(false, Ordering::SeqCst);
                        return Ok(());
                    }
                    item = stream.next() => item,
                };
                match item {
                    Some(Ok(event)) => {
                        if let Some(accepted) = self.accept(event) {
                            on_event(&accepted);
                        }
                    }
                    Some(Err(e)) => break Some(e),
                    None => break None,
                }
            };

            // Release the old connection before any retry
            drop(stream);
            self.connected.store(false, Ordering::SeqCst);

            match failure {
                None => {
                    info!(session_id = %self.session_id, "Event stream finished");
                    self.running.store(false, Ordering::SeqCst);
                    return Ok(());
                }
                Some(e) => {
                    if !self.is_running() {
                        return Ok(());
                    }
                    warn!(
                        session_id = %self.session_id,
                        error = %e,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Event stream dropped, reconnecting"
                    );
                    if !self.pause().await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Sleep for the backoff; false if stopped meanwhile
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.stop.cancelled() => false,
            _ = tokio::time::sleep(self.backoff) => self.is_running(),
        }
    }

    fn accept(&self, mut event: AutomationEvent) -> Option<AutomationEvent> {
        match event.kind {
            EventKind::Heartbeat => return None,
            EventKind::Connected => {
                // The log stays in timestamp order whatever the source stamped
                if let Some(last) = self.log.read().last() {
                    event.timestamp = event.timestamp.max(last.timestamp);
                }
            }
            _ => {
                let mut last = self.last_seq.lock();
                if last.is_some_and(|seen| event.seq <= seen) {
                    return None;
                }
                *last = Some(event.seq);
            }
        }
        self.log.write().push(event.clone());
        Some(event)
    }
}
