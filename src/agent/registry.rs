//! Background tasks keyed by session id

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::session::TaskSession;

#[derive(Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<String, Arc<TaskSession>>>>,
}

/// Summary row for listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub session_id: String,
    pub prompt: String,
    pub completed: bool,
    pub has_error: bool,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, task: Arc<TaskSession>) {
        self.tasks
            .lock()
            .await
            .insert(task.session_id().to_string(), task);
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<TaskSession>> {
        self.tasks.lock().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<TaskSession>> {
        self.tasks.lock().await.remove(session_id)
    }

    pub async fn list(&self) -> Vec<TaskInfo> {
        let tasks: Vec<Arc<TaskSession>> = self.tasks.lock().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(tasks.len());
        for task in tasks {
            let snapshot = task.read().await;
            infos.push(TaskInfo {
                session_id: snapshot.session_id,
                prompt: snapshot.prompt,
                completed: snapshot.completed,
                has_error: snapshot.error.is_some(),
            });
        }
        infos.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        infos
    }

    /// Forget every finished task; returns their session ids
    pub async fn cleanup_completed(&self) -> Vec<String> {
        self.cleanup_finished(Duration::ZERO).await
    }

    /// Forget tasks that finished at least `age` ago; returns their session ids
    pub async fn cleanup_finished(&self, age: Duration) -> Vec<String> {
        let mut tasks = self.tasks.lock().await;
        let mut finished = Vec::new();
        for (id, task) in tasks.iter() {
            if task.finished_before(age).await {
                finished.push(id.clone());
            }
        }
        for id in &finished {
            tasks.remove(id);
        }
        finished
    }
}
