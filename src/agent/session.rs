//! Background task handle

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

use super::orchestrator::{FailureBody, RunFailure, RunResult};
use crate::events::EventHub;
use crate::session::SessionRegistry;

type Outcome = Result<RunResult, RunFailure>;

/// One task running in the background, addressed by its session id
#[derive(Clone)]
pub struct TaskSession {
    session_id: String,
    prompt: String,
    outcome: Arc<RwLock<Option<Outcome>>>,
    task_handle: Arc<RwLock<Option<JoinHandle<()>>>>,
    completed: Arc<RwLock<bool>>,
    finished_at: Arc<RwLock<Option<Instant>>>,
}

/// Point-in-time view of a [`TaskSession`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub session_id: String,
    pub prompt: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureBody>,
    pub summary: String,
}

impl TaskSession {
    pub(crate) fn new(session_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            prompt: prompt.into(),
            outcome: Arc::new(RwLock::new(None)),
            task_handle: Arc::new(RwLock::new(None)),
            completed: Arc::new(RwLock::new(false)),
            finished_at: Arc::new(RwLock::new(None)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Spawn `run` and record whatever it returns
    pub(crate) async fn start<F>(&self, run: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let outcome = self.outcome.clone();
        let completed = self.completed.clone();
        let finished_at = self.finished_at.clone();
        let handle = tokio::spawn(async move {
            let result = run.await;
            *outcome.write().await = Some(result);
            *completed.write().await = true;
            finished_at.write().await.get_or_insert_with(Instant::now);
        });
        *self.task_handle.write().await = Some(handle);
    }

    pub async fn read(&self) -> TaskSnapshot {
        let completed = *self.completed.read().await;
        let outcome = self.outcome.read().await.clone();
        let (result, error) = match outcome {
            Some(Ok(result)) => (Some(result), None),
            Some(Err(failure)) => (None, Some(failure.to_response())),
            None => (None, None),
        };

        let summary = if let Some(err) = &error {
            format!("Task failed: {}", err.error.message)
        } else if let Some(result) = &result {
            format!(
                "Task completed by {} in {} steps",
                result.last_policy,
                result.history.len()
            )
        } else if completed {
            "Task cancelled".to_string()
        } else {
            "Task in progress".to_string()
        };

        TaskSnapshot {
            session_id: self.session_id.clone(),
            prompt: self.prompt.clone(),
            completed,
            result,
            error,
            summary,
        }
    }

    /// Wait for the background run to end
    pub async fn wait(&self) -> Option<Outcome> {
        let handle = self.task_handle.write().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.outcome.read().await.clone()
    }

    /// Abort the run and tear its browser down
    pub async fn kill(&self, sessions: &SessionRegistry, hub: &EventHub) {
        if let Some(handle) = self.task_handle.write().await.take() {
            handle.abort();
        }
        // Already gone when the run finished on its own
        let _ = sessions.close(&self.session_id).await;
        hub.finish(&self.session_id);
        *self.completed.write().await = true;
        self.finished_at.write().await.get_or_insert_with(Instant::now);
        info!(session_id = %self.session_id, "Task killed");
    }

    pub async fn is_complete(&self) -> bool {
        *self.completed.read().await
    }

    /// Finished at least `age` ago
    pub async fn finished_before(&self, age: Duration) -> bool {
        self.finished_at
            .read()
            .await
            .is_some_and(|at| at.elapsed() >= age)
    }

    pub async fn has_error(&self) -> bool {
        matches!(*self.outcome.read().await, Some(Err(_)))
    }
}
