//! Task orchestration: validate, route, run policies, always tear down

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::guard::TaskGuard;
use super::model::{ChatModel, ModelSettings};
use super::policy::{Policy, PolicyKind};
use super::registry::TaskRegistry;
use super::router::route;
use super::runner::{PolicyOutcome, PolicyRunner, StepBudget};
use super::session::TaskSession;
use super::task::TaskIntent;
use super::{FinalOutput, StepRole, StepStatus, Transcript};
use crate::browser::LaunchOptions;
use crate::error::{AutomationFailure, ErrorResponse};
use crate::events::{EventEmitter, EventHub};
use crate::request::TaskRequest;
use crate::session::{BrowserSession, SessionRegistry};
use crate::tools::ToolRegistry;
use crate::utils::validate_navigation_timeout;

/// How a task is mapped onto policies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Route to specialist policies, in sequence
    #[default]
    Gateway,
    /// One policy holding every tool
    Unified,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub mode: Mode,
    /// Model turns per task, shared across handoffs
    pub max_steps: usize,
    pub launch: LaunchOptions,
    pub model: ModelSettings,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            mode: Mode::Gateway,
            max_steps: 20,
            launch: LaunchOptions::default(),
            model: ModelSettings::default(),
        }
    }
}

/// `{history, lastPolicy, finalOutput}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub session_id: String,
    pub history: Transcript,
    pub last_policy: String,
    pub final_output: FinalOutput,
}

/// A failed run plus whatever it got done
#[derive(Debug, Clone)]
pub struct RunFailure {
    pub session_id: Option<String>,
    pub failure: AutomationFailure,
    pub history: Transcript,
    pub last_policy: Option<String>,
    pub last_screenshot: Option<String>,
}

/// Outbound failure body: the error shape plus the partial run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureBody {
    #[serde(flatten)]
    pub error: ErrorResponse,
    pub history: Transcript,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_screenshot: Option<String>,
}

impl RunFailure {
    fn before_start(failure: AutomationFailure) -> Self {
        Self {
            session_id: None,
            failure,
            history: Transcript::new(),
            last_policy: None,
            last_screenshot: None,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.failure.status_code()
    }

    pub fn to_response(&self) -> FailureBody {
        let mut error = self.failure.to_response();
        if error.session_id.is_none() {
            error.session_id = self.session_id.clone();
        }
        FailureBody {
            error,
            history: self.history.clone(),
            last_policy: self.last_policy.clone(),
            last_screenshot: self.last_screenshot.clone(),
        }
    }
}

/// A validated task with its session allocated, ready to execute
///
/// Dropping it without [`Orchestrator::execute`] releases the session and
/// its event channel.
pub struct PreparedTask {
    pub prompt: String,
    pub intent: TaskIntent,
    pub plan: Vec<PolicyKind>,
    session: Arc<BrowserSession>,
    emitter: EventEmitter,
    launch: LaunchOptions,
    model: ModelSettings,
    sessions: Arc<SessionRegistry>,
    hub: Arc<EventHub>,
    consumed: bool,
}

impl PreparedTask {
    pub fn session_id(&self) -> &str {
        self.session.id()
    }
}

impl Drop for PreparedTask {
    fn drop(&mut self) {
        if self.consumed {
            return;
        }
        let session_id = self.session.id();
        self.sessions.forget(session_id);
        self.hub.remove(session_id);
        debug!(session_id = %session_id, "Prepared task dropped before execution");
    }
}

/// Mutable run state, threaded through every policy
struct RunState {
    transcript: Transcript,
    guard: TaskGuard,
    budget: StepBudget,
    last_policy: Option<PolicyKind>,
}

pub struct Orchestrator {
    sessions: Arc<SessionRegistry>,
    hub: Arc<EventHub>,
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    tasks: TaskRegistry,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        hub: Arc<EventHub>,
        model: Arc<dyn ChatModel>,
        settings: OrchestratorSettings,
    ) -> Self {
        let tools = Arc::new(ToolRegistry::with_defaults(settings.launch.clone()));
        Self {
            sessions,
            hub,
            model,
            tools,
            tasks: TaskRegistry::new(),
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Validate and allocate; nothing touches a browser or model on failure
    pub fn prepare(&self, request: TaskRequest) -> Result<PreparedTask, RunFailure> {
        request
            .validate()
            .map_err(|e| RunFailure::before_start(e.into()))?;

        let mut launch = self.settings.launch.clone();
        let mut model = self.settings.model.clone();
        if let Some(config) = &request.config {
            if let Some(headless) = config.headless {
                launch.headless = headless;
            }
            if config.timeout.is_some() {
                launch.timeout = validate_navigation_timeout(config.timeout, 0)
                    .map_err(|e| RunFailure::before_start(e.into()))?;
            }
            if let Some(name) = &config.model {
                model.model = Some(name.clone());
            }
            if let Some(temperature) = config.temperature {
                model.temperature = Some(temperature);
            }
            if let Some(max_tokens) = config.max_tokens {
                model.max_tokens = Some(max_tokens);
            }
        }

        let intent = TaskIntent::parse(&request.prompt);
        let plan = match self.settings.mode {
            Mode::Gateway => route(&intent),
            Mode::Unified => vec![PolicyKind::UnifiedWebsiteAutomation],
        };

        let session = self.sessions.create();
        let emitter = self.hub.open(session.id());
        info!(
            session_id = %session.id(),
            mode = ?self.settings.mode,
            plan = ?plan,
            "Task prepared"
        );

        Ok(PreparedTask {
            prompt: request.prompt,
            intent,
            plan,
            session,
            emitter,
            launch,
            model,
            sessions: self.sessions.clone(),
            hub: self.hub.clone(),
            consumed: false,
        })
    }

    /// Run a prepared task to the end; the session is closed on every path
    pub async fn execute(&self, mut task: PreparedTask) -> Result<RunResult, RunFailure> {
        task.consumed = true;
        let session_id = task.session.id().to_string();
        let mut state = RunState {
            transcript: Transcript::new(),
            guard: TaskGuard::new(task.intent.clone()),
            budget: StepBudget::new(self.settings.max_steps),
            last_policy: None,
        };

        let entry = match self.settings.mode {
            Mode::Gateway => PolicyKind::Gateway,
            Mode::Unified => PolicyKind::UnifiedWebsiteAutomation,
        };
        state.transcript.push(
            StepRole::User,
            entry,
            None,
            None,
            Some(json!(task.prompt)),
            StepStatus::Completed,
        );
        task.emitter.info("Task started");

        let outcome = self.drive(&task, &mut state).await;
        let last_screenshot = task.session.last_screenshot();

        if let Err(e) = self.sessions.close(&session_id).await {
            warn!(session_id = %session_id, error = %e, "Session already gone at teardown");
        }

        let result = match outcome {
            Ok((kind, final_output)) => {
                info!(session_id = %session_id, policy = %kind, steps = state.budget.used(), "Task completed");
                task.emitter.success(
                    "Task completed",
                    Some(json!({ "lastPolicy": kind.name(), "finalOutput": final_output })),
                );
                Ok(RunResult {
                    session_id: session_id.clone(),
                    history: state.transcript,
                    last_policy: kind.name().to_string(),
                    final_output,
                })
            }
            Err(failure) => {
                error!(session_id = %session_id, error = %failure, "Task failed");
                let failure = RunFailure {
                    session_id: Some(session_id.clone()),
                    failure,
                    history: state.transcript,
                    last_policy: state.last_policy.map(|k| k.name().to_string()),
                    last_screenshot,
                };
                task.emitter.error(
                    failure.failure.to_string(),
                    serde_json::to_value(failure.failure.to_response()).ok(),
                );
                Err(failure)
            }
        };

        self.hub.finish(&session_id);
        result
    }

    /// Prepare and execute in one go
    pub async fn run_task(&self, request: TaskRequest) -> Result<RunResult, RunFailure> {
        let task = self.prepare(request)?;
        self.execute(task).await
    }

    /// Start a task in the background; validation failures come back at once
    pub async fn start_task(
        self: &Arc<Self>,
        request: TaskRequest,
    ) -> Result<Arc<TaskSession>, RunFailure> {
        let task = self.prepare(request)?;
        self.reap_finished().await;
        let handle = Arc::new(TaskSession::new(task.session_id(), task.prompt.clone()));
        self.tasks.insert(handle.clone()).await;

        let this = self.clone();
        handle.start(async move { this.execute(task).await }).await;
        Ok(handle)
    }

    /// Abort a background task and release its browser
    pub async fn kill_task(&self, session_id: &str) -> Result<(), AutomationFailure> {
        let task = self
            .tasks
            .remove(session_id)
            .await
            .ok_or_else(|| AutomationFailure::Session {
                session_id: session_id.to_string(),
                message: format!("No task for session {session_id}"),
            })?;
        task.kill(&self.sessions, &self.hub).await;
        self.hub.remove(session_id);
        Ok(())
    }

    /// Forget every finished background task and its event channel
    pub async fn cleanup_completed(&self) -> usize {
        let finished = self.tasks.cleanup_completed().await;
        for id in &finished {
            self.hub.remove(id);
        }
        finished.len()
    }

    /// Forget background tasks finished longer ago than event retention
    async fn reap_finished(&self) {
        let finished = self.tasks.cleanup_finished(self.hub.config().retention).await;
        for id in &finished {
            self.hub.remove(id);
        }
        if !finished.is_empty() {
            debug!(count = finished.len(), "Reaped finished tasks");
        }
    }

    /// Close every browser, used on process shutdown
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }

    async fn drive(
        &self,
        task: &PreparedTask,
        state: &mut RunState,
    ) -> Result<(PolicyKind, FinalOutput), AutomationFailure> {
        task.session.initialize(&task.launch).await?;
        task.emitter.success("Browser initialized", None);

        let mut input = task.prompt.clone();
        let mut last_text = String::new();
        let handoff = self.settings.mode == Mode::Gateway;

        for kind in &task.plan {
            let policy = Policy::for_kind(*kind);
            if handoff {
                state.transcript.push(
                    StepRole::System,
                    PolicyKind::Gateway,
                    None,
                    None,
                    Some(json!(format!("Handoff to {}", policy.name()))),
                    StepStatus::Completed,
                );
                task.emitter.info(format!("Routing to {}", policy.name()));
            }
            state.last_policy = Some(*kind);

            let outcome = PolicyRunner {
                session: &task.session,
                tools: &self.tools,
                model: self.model.as_ref(),
                settings: &task.model,
                emitter: &task.emitter,
                guard: &mut state.guard,
                transcript: &mut state.transcript,
                budget: &mut state.budget,
            }
            .run(&policy, std::mem::take(&mut input))
            .await?;

            match outcome {
                PolicyOutcome::Stopped(output) => {
                    task.emitter.info(output.message().to_string());
                    return Ok((*kind, output));
                }
                PolicyOutcome::Finished(text) => {
                    input = format!(
                        "Original task: {}\n\nThe {} reported:\n{}\n\nThe browser is still open on that page. Do your part of the task.",
                        task.prompt,
                        policy.name(),
                        text
                    );
                    last_text = text;
                }
            }
        }

        let kind = state.last_policy.unwrap_or(PolicyKind::Navigation);
        Ok((
            kind,
            FinalOutput::Completed {
                message: last_text,
                screenshot_url: task.session.last_screenshot(),
            },
        ))
    }
}
