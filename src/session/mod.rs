//! Browser session engine
//!
//! One [`BrowserSession`] owns one browser, one isolated context and one
//! page. Lifecycle: `Uninitialized -> Ready <-> Busy -> Closed`. Only one
//! action runs at a time; expected failures come back as
//! `ActionResult { success: false, .. }` while lifecycle misuse and a dead
//! browser surface as [`EngineError`].

mod action;
mod registry;

pub use action::ActionResult;
pub use registry::SessionRegistry;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::browser::{DriverLauncher, DriverResult, LaunchOptions, PageDriver, PageInfo};
use crate::discovery::{self, DiscoveryIntent, DiscoveryOutcome};
use crate::error::{AutomationFailure, ErrorCode};
use crate::image_store::ImageStore;
use crate::utils::constants::{
    DEFAULT_INTERACTION_TIMEOUT_MS, DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_UPLOAD_TIMEOUT_MS,
    DEFAULT_WAIT_TIMEOUT_MS, MAX_SCROLL_DELTA,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Uninitialized,
    Ready,
    Busy,
    Closed,
}

/// Per-category action deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTimeouts {
    pub navigation: Duration,
    /// Wait for an element before click/fill/select
    pub interaction: Duration,
    /// Default for explicit `wait_for_element`
    pub wait: Duration,
    pub upload: Duration,
}

impl Default for ActionTimeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS),
            interaction: Duration::from_millis(DEFAULT_INTERACTION_TIMEOUT_MS),
            wait: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            upload: Duration::from_millis(DEFAULT_UPLOAD_TIMEOUT_MS),
        }
    }
}

/// Lifecycle misuse or an unusable browser. Never an expected action failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Session {session_id} is not initialized")]
    NotInitialized { session_id: String },

    #[error("Session {session_id} is already initialized")]
    AlreadyInitialized { session_id: String },

    #[error("Session {session_id} is busy with another action")]
    Busy { session_id: String },

    #[error("Session {session_id} is closed")]
    Closed { session_id: String },

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Browser driver failed: {0}")]
    DriverCrashed(String),
}

impl From<EngineError> for AutomationFailure {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Closed { ref session_id } => AutomationFailure::Session {
                session_id: session_id.clone(),
                message: err.to_string(),
            },
            EngineError::LaunchFailed(message) => {
                AutomationFailure::automation(ErrorCode::BrowserLaunchFailed, message)
            }
            EngineError::DriverCrashed(message) => {
                AutomationFailure::automation(ErrorCode::DriverCrashed, message)
            }
            structural @ (EngineError::NotInitialized { .. }
            | EngineError::AlreadyInitialized { .. }
            | EngineError::Busy { .. }) => AutomationFailure::Structural(structural.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub status: SessionStatus,
    pub current_url: Option<String>,
    pub last_screenshot: Option<String>,
    pub created_at: DateTime<Utc>,
}

struct SessionState {
    status: SessionStatus,
    current_url: Option<String>,
    last_screenshot: Option<String>,
}

/// Flips `Busy` back to `Ready` when the action finishes, however it finishes
struct BusyGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.status == SessionStatus::Busy {
            state.status = SessionStatus::Ready;
        }
    }
}

pub struct BrowserSession {
    id: String,
    created_at: DateTime<Utc>,
    launcher: Arc<dyn DriverLauncher>,
    image_store: Arc<dyn ImageStore>,
    timeouts: ActionTimeouts,
    state: Mutex<SessionState>,
    driver: Mutex<Option<Arc<dyn PageDriver>>>,
    cancel: CancellationToken,
}

impl BrowserSession {
    pub fn new(
        id: impl Into<String>,
        launcher: Arc<dyn DriverLauncher>,
        image_store: Arc<dyn ImageStore>,
        timeouts: ActionTimeouts,
    ) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            launcher,
            image_store,
            timeouts,
            state: Mutex::new(SessionState {
                status: SessionStatus::Uninitialized,
                current_url: None,
                last_screenshot: None,
            }),
            driver: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    pub fn last_screenshot(&self) -> Option<String> {
        self.state.lock().last_screenshot.clone()
    }

    pub fn info(&self) -> SessionInfo {
        let state = self.state.lock();
        SessionInfo {
            id: self.id.clone(),
            status: state.status,
            current_url: state.current_url.clone(),
            last_screenshot: state.last_screenshot.clone(),
            created_at: self.created_at,
        }
    }

    fn closed(&self) -> EngineError {
        EngineError::Closed {
            session_id: self.id.clone(),
        }
    }

    /// Launch the browser and open the session page
    pub async fn initialize(&self, options: &LaunchOptions) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock();
            match state.status {
                SessionStatus::Uninitialized => state.status = SessionStatus::Busy,
                SessionStatus::Closed => return Err(self.closed()),
                SessionStatus::Ready | SessionStatus::Busy => {
                    return Err(EngineError::AlreadyInitialized {
                        session_id: self.id.clone(),
                    });
                }
            }
        }

        let launched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(self.closed()),
            launched = self.launcher.launch(options) => launched,
        };

        let driver: Arc<dyn PageDriver> = match launched {
            Ok(driver) => Arc::from(driver),
            Err(e) => {
                let mut state = self.state.lock();
                if state.status == SessionStatus::Busy {
                    state.status = SessionStatus::Uninitialized;
                }
                error!(session_id = %self.id, error = %e, "Browser launch failed");
                return Err(EngineError::LaunchFailed(e.to_string()));
            }
        };

        let closed_meanwhile = {
            let mut state = self.state.lock();
            if state.status == SessionStatus::Closed {
                true
            } else {
                state.status = SessionStatus::Ready;
                *self.driver.lock() = Some(driver.clone());
                false
            }
        };
        if closed_meanwhile {
            driver.shutdown().await;
            return Err(self.closed());
        }

        info!(session_id = %self.id, headless = options.headless, "Browser session initialized");
        Ok(())
    }

    fn begin(&self) -> Result<(Arc<dyn PageDriver>, BusyGuard<'_>), EngineError> {
        let mut state = self.state.lock();
        match state.status {
            SessionStatus::Ready => {}
            SessionStatus::Uninitialized => {
                return Err(EngineError::NotInitialized {
                    session_id: self.id.clone(),
                });
            }
            SessionStatus::Busy => {
                return Err(EngineError::Busy {
                    session_id: self.id.clone(),
                });
            }
            SessionStatus::Closed => return Err(self.closed()),
        }
        let driver = self
            .driver
            .lock()
            .clone()
            .ok_or_else(|| EngineError::NotInitialized {
                session_id: self.id.clone(),
            })?;
        state.status = SessionStatus::Busy;
        Ok((driver, BusyGuard { state: &self.state }))
    }

    /// Run one driver operation under the busy flag
    ///
    /// A close racing the operation wins; a dead browser closes the session.
    async fn run<T, F, Fut>(&self, op: F) -> Result<DriverResult<T>, EngineError>
    where
        F: FnOnce(Arc<dyn PageDriver>) -> Fut,
        Fut: Future<Output = DriverResult<T>>,
    {
        let (driver, guard) = self.begin()?;
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            outcome = op(driver) => Some(outcome),
        };
        drop(guard);

        match outcome {
            None => Err(self.closed()),
            Some(Err(err)) if err.is_fatal() => {
                error!(session_id = %self.id, error = %err, "Browser driver failed, closing session");
                self.close().await;
                Err(EngineError::DriverCrashed(err.to_string()))
            }
            Some(outcome) => Ok(outcome),
        }
    }

    async fn perform<F, Fut>(
        &self,
        failure: impl Into<String>,
        op: F,
    ) -> Result<ActionResult, EngineError>
    where
        F: FnOnce(Arc<dyn PageDriver>) -> Fut,
        Fut: Future<Output = DriverResult<ActionResult>>,
    {
        match self.run(op).await? {
            Ok(result) => {
                debug!(session_id = %self.id, success = result.success, "{}", result.message);
                Ok(result)
            }
            Err(err) => {
                let failure = failure.into();
                warn!(session_id = %self.id, error = %err, "{}", failure);
                Ok(ActionResult::fail(failure, err.to_string()))
            }
        }
    }

    pub async fn navigate(&self, url: &str) -> Result<ActionResult, EngineError> {
        let timeout = self.timeouts.navigation;
        let failure = format!("Failed to navigate to {url}");
        self.perform(failure.clone(), |driver| async move {
            let target = match normalize_url(url) {
                Ok(target) => target,
                Err(reason) => return Ok(ActionResult::fail(failure, reason)),
            };
            let page = driver.goto(&target, timeout).await?;
            self.state.lock().current_url = Some(page.url.clone());
            Ok(ActionResult::ok_with(
                format!("Successfully navigated to {}", page.url),
                json!({ "url": page.url, "title": page.title }),
            ))
        })
        .await
    }

    pub async fn click(&self, selector: &str) -> Result<ActionResult, EngineError> {
        let timeout = self.timeouts.interaction;
        self.perform(format!("Failed to click {selector}"), |driver| async move {
            driver.click(selector, timeout).await?;
            Ok(ActionResult::ok_with(
                format!("Successfully clicked {selector}"),
                json!({ "selector": selector }),
            ))
        })
        .await
    }

    pub async fn fill(&self, selector: &str, value: &str) -> Result<ActionResult, EngineError> {
        let timeout = self.timeouts.interaction;
        self.perform(format!("Failed to fill {selector}"), |driver| async move {
            driver.fill(selector, value, timeout).await?;
            Ok(ActionResult::ok_with(
                format!("Successfully filled {selector}"),
                json!({ "selector": selector, "length": value.chars().count() }),
            ))
        })
        .await
    }

    pub async fn select_option(
        &self,
        selector: &str,
        value: &str,
    ) -> Result<ActionResult, EngineError> {
        let timeout = self.timeouts.interaction;
        self.perform(format!("Failed to select '{value}' in {selector}"), |driver| async move {
            let selected = driver.select_option(selector, value, timeout).await?;
            Ok(ActionResult::ok_with(
                format!("Selected '{selected}' in {selector}"),
                json!({ "selector": selector, "value": selected }),
            ))
        })
        .await
    }

    /// Text of `selector`, or of the whole page
    pub async fn extract_text(&self, selector: Option<&str>) -> Result<ActionResult, EngineError> {
        let timeout = self.timeouts.interaction;
        let target = selector.unwrap_or("page");
        self.perform(format!("Failed to extract text from {target}"), |driver| async move {
            let text = driver.text_content(selector, timeout).await?;
            Ok(ActionResult::ok_with(
                format!("Extracted {} characters from {target}", text.chars().count()),
                json!({ "text": text, "selector": selector }),
            ))
        })
        .await
    }

    pub async fn extract_links(&self, selector: Option<&str>) -> Result<ActionResult, EngineError> {
        let selector = selector.unwrap_or("a[href]");
        self.perform(format!("Failed to extract links from {selector}"), |driver| async move {
            let mut links = driver.link_hrefs(selector).await?;
            let mut seen = std::collections::HashSet::new();
            links.retain(|link| seen.insert(link.clone()));
            Ok(ActionResult::ok_with(
                format!("Found {} links", links.len()),
                json!({ "links": links, "count": links.len() }),
            ))
        })
        .await
    }

    pub async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Option<Duration>,
    ) -> Result<ActionResult, EngineError> {
        let timeout = timeout.unwrap_or(self.timeouts.wait);
        self.perform(format!("Element {selector} did not appear"), |driver| async move {
            driver.wait_for(selector, timeout).await?;
            Ok(ActionResult::ok_with(
                format!("Element {selector} is present"),
                json!({ "selector": selector }),
            ))
        })
        .await
    }

    pub async fn discover_form_fields(&self) -> Result<ActionResult, EngineError> {
        self.perform("Failed to list form fields", |driver| async move {
            let fields = driver.form_fields().await?;
            Ok(ActionResult::ok_with(
                format!("Found {} form fields", fields.len()),
                json!({ "fields": fields, "count": fields.len() }),
            ))
        })
        .await
    }

    pub async fn discover_buttons(&self) -> Result<ActionResult, EngineError> {
        self.perform("Failed to list buttons", |driver| async move {
            let buttons = driver.buttons().await?;
            Ok(ActionResult::ok_with(
                format!("Found {} buttons", buttons.len()),
                json!({ "buttons": buttons, "count": buttons.len() }),
            ))
        })
        .await
    }

    /// Whether clicking `selector` would submit a form
    ///
    /// A selector the page cannot answer for counts as not a submit control.
    pub async fn is_submit_control(&self, selector: &str) -> Result<bool, EngineError> {
        match self
            .run(|driver| async move { driver.is_submit_control(selector).await })
            .await?
        {
            Ok(submit) => Ok(submit),
            Err(e) => {
                debug!(session_id = %self.id, selector, error = %e, "Could not inspect click target");
                Ok(false)
            }
        }
    }

    /// Locate the form matching `intent` on the current page
    pub async fn discover_target_form(
        &self,
        intent: &DiscoveryIntent,
    ) -> Result<ActionResult, EngineError> {
        let label = intent.label.clone();
        self.perform(format!("Failed to search for {label}"), |driver| async move {
            let snapshot = driver.snapshot(&intent.selectors).await?;
            let outcome = discovery::discover(&snapshot, intent);
            let data = outcome.to_data(&snapshot.url);
            info!(
                session_id = %self.id,
                outcome = outcome.tag(),
                containers = snapshot.containers.len(),
                "Target discovery finished"
            );
            Ok(match &outcome {
                DiscoveryOutcome::Found { chosen, .. } => ActionResult::ok_with(
                    format!(
                        "Found {label} at {} via {} (score {})",
                        chosen.selector,
                        chosen.matched_strategy.as_str(),
                        chosen.score
                    ),
                    data,
                ),
                DiscoveryOutcome::Ambiguous { candidates } => ActionResult::fail(
                    format!("{} candidates match the {label}", candidates.len()),
                    "ambiguous target, disambiguation required",
                )
                .with_data(data),
                DiscoveryOutcome::NotFound => {
                    ActionResult::fail(format!("No {label} found"), "no matching target found")
                        .with_data(data)
                }
            })
        })
        .await
    }

    /// Scroll the window; deltas are clamped to a sane range
    pub async fn scroll(&self, x: i64, y: i64) -> Result<ActionResult, EngineError> {
        let x = x.clamp(-MAX_SCROLL_DELTA, MAX_SCROLL_DELTA);
        let y = y.clamp(-MAX_SCROLL_DELTA, MAX_SCROLL_DELTA);
        self.perform("Failed to scroll", |driver| async move {
            driver.scroll_by(x, y).await?;
            Ok(ActionResult::ok_with(
                format!("Scrolled by ({x}, {y})"),
                json!({ "x": x, "y": y }),
            ))
        })
        .await
    }

    /// Capture the page (or its first form) and upload it
    pub async fn screenshot(&self) -> Result<ActionResult, EngineError> {
        let upload_timeout = self.timeouts.upload;
        self.perform("Failed to take screenshot", |driver| async move {
            let capture = driver.screenshot().await?;
            let size = capture.bytes.len();
            let uploaded = tokio::time::timeout(
                upload_timeout,
                self.image_store.upload(capture.bytes, capture.mime_type),
            )
            .await;

            let url = match uploaded {
                Ok(Ok(url)) => url,
                Ok(Err(e)) => {
                    return Ok(ActionResult::fail("Failed to upload screenshot", e.to_string()));
                }
                Err(_) => {
                    return Ok(ActionResult::fail(
                        "Failed to upload screenshot",
                        format!("upload timed out after {}ms", upload_timeout.as_millis()),
                    ));
                }
            };

            self.state.lock().last_screenshot = Some(url.clone());
            Ok(ActionResult::ok_with(
                format!("Screenshot captured: {url}"),
                json!({ "screenshotUrl": url, "target": capture.target, "bytes": size }),
            ))
        })
        .await
    }

    /// URL and title of the current page
    ///
    /// Falls back to the last known URL if the page cannot be queried.
    pub async fn page_info(&self) -> Result<PageInfo, EngineError> {
        match self.run(|driver| async move { driver.page_info().await }).await? {
            Ok(info) => Ok(info),
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Page info unavailable");
                Ok(PageInfo {
                    url: self.state.lock().current_url.clone().unwrap_or_default(),
                    title: String::new(),
                })
            }
        }
    }

    pub async fn get_current_url(&self) -> Result<String, EngineError> {
        Ok(self.page_info().await?.url)
    }

    pub async fn get_page_title(&self) -> Result<String, EngineError> {
        Ok(self.page_info().await?.title)
    }

    /// Tear everything down. Idempotent, never fails.
    ///
    /// Cancels any in-flight action first; that action then reports the
    /// session as closed.
    pub async fn close(&self) {
        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.status, SessionStatus::Closed)
        };
        if previous == SessionStatus::Closed {
            return;
        }

        self.cancel.cancel();
        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            driver.shutdown().await;
        }
        info!(session_id = %self.id, "Browser session closed");
    }
}

/// Accept absolute http(s) URLs; bare hosts get `https://`
fn normalize_url(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    let parsed = match url::Url::parse(raw) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) => url::Url::parse(&format!("https://{raw}"))
            .map_err(|e| format!("Invalid URL '{raw}': {e}"))?,
        Err(e) => return Err(format!("Invalid URL '{raw}': {e}")),
    };
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(format!("Unsupported URL scheme '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeLauncher, FakePage, contact_form};
    use crate::image_store::testing::MemoryImageStore;

    fn session_with(launcher: FakeLauncher) -> Arc<BrowserSession> {
        Arc::new(BrowserSession::new(
            "test-session",
            Arc::new(launcher),
            Arc::new(MemoryImageStore::default()),
            ActionTimeouts::default(),
        ))
    }

    fn site() -> FakeLauncher {
        FakeLauncher::new()
            .with_page(
                FakePage::new("https://example.com/", "Example Domain")
                    .with_text("Example Domain body")
                    .with_elements(&["#more"])
                    .with_links(&["https://example.com/a", "https://example.com/a", "https://example.com/b"]),
            )
            .with_page(
                FakePage::new("https://example.com/contact", "Contact")
                    .with_form(contact_form("#contact-form"))
                    .with_select("#topic", &["sales", "support"]),
            )
    }

    async fn ready(launcher: FakeLauncher) -> Arc<BrowserSession> {
        let session = session_with(launcher);
        session.initialize(&LaunchOptions::default()).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_action_before_initialize_is_structural() {
        let session = session_with(site());
        let err = session.navigate("https://example.com/").await.unwrap_err();
        assert!(matches!(err, EngineError::NotInitialized { .. }));
        assert!(matches!(
            AutomationFailure::from(err),
            AutomationFailure::Structural(_)
        ));
    }

    #[tokio::test]
    async fn test_double_initialize_fails() {
        let session = ready(site()).await;
        let err = session
            .initialize(&LaunchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyInitialized { .. }));
        assert_eq!(session.status(), SessionStatus::Ready);
    }

    #[tokio::test]
    async fn test_launch_failure_leaves_session_uninitialized() {
        let session = session_with(FakeLauncher::failing());
        let err = session
            .initialize(&LaunchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::LaunchFailed(_)));
        assert_eq!(session.status(), SessionStatus::Uninitialized);
    }

    #[tokio::test]
    async fn test_navigate_updates_url_and_reports_title() {
        let session = ready(site()).await;
        let result = session.navigate("https://example.com/").await.unwrap();
        assert!(result.success);
        assert_eq!(result.data.as_ref().unwrap()["title"], "Example Domain");
        assert_eq!(session.get_current_url().await.unwrap(), "https://example.com/");
        assert_eq!(session.get_page_title().await.unwrap(), "Example Domain");
        assert_eq!(
            session.info().current_url.as_deref(),
            Some("https://example.com/")
        );
    }

    #[tokio::test]
    async fn test_expected_failures_keep_session_ready() {
        let launcher = site();
        let recorder = launcher.recorder.clone();
        let session = ready(launcher).await;

        let unreachable = session.navigate("https://nowhere.invalid/").await.unwrap();
        assert!(!unreachable.success);
        assert!(unreachable.error.unwrap().contains("ERR_NAME_NOT_RESOLVED"));

        let bad_scheme = session.navigate("ftp://example.com").await.unwrap();
        assert!(!bad_scheme.success);

        let missing = session.click("#does-not-exist").await.unwrap();
        assert!(!missing.success);
        assert_eq!(missing.message, "Failed to click #does-not-exist");

        assert_eq!(session.status(), SessionStatus::Ready);
        let calls = recorder.lock().calls.clone();
        assert!(!calls.iter().any(|c| c.starts_with("goto ftp")));
    }

    #[tokio::test]
    async fn test_bare_host_gets_https() {
        assert_eq!(normalize_url("example.com").unwrap(), "https://example.com/");
        assert!(normalize_url("javascript:alert(1)").is_err());
    }

    #[tokio::test]
    async fn test_form_actions() {
        let launcher = site();
        let recorder = launcher.recorder.clone();
        let session = ready(launcher).await;
        session.navigate("https://example.com/contact").await.unwrap();

        assert!(session.fill("#email", "a@b.com").await.unwrap().success);
        let selected = session.select_option("#topic", "Support").await.unwrap();
        assert_eq!(selected.data_str("value"), Some("support"));
        let fields = session.discover_form_fields().await.unwrap();
        assert_eq!(fields.data.unwrap()["count"], 3);
        let buttons = session.discover_buttons().await.unwrap();
        assert_eq!(buttons.data.unwrap()["buttons"][0]["type"], "submit");

        assert_eq!(
            recorder.lock().fills,
            vec![("#email".to_string(), "a@b.com".to_string())]
        );
    }

    #[tokio::test]
    async fn test_extract_text_and_links() {
        let session = ready(site()).await;
        session.navigate("https://example.com/").await.unwrap();

        let text = session.extract_text(None).await.unwrap();
        assert_eq!(text.data.unwrap()["text"], "Example Domain body");

        let links = session.extract_links(None).await.unwrap();
        assert_eq!(links.data.unwrap()["count"], 2);
    }

    #[tokio::test]
    async fn test_discover_target_form_outcomes() {
        let two_forms = FakeLauncher::new()
            .with_page(
                FakePage::new("https://example.com/contact", "Contact")
                    .with_form(contact_form("#contact-form")),
            )
            .with_page(
                FakePage::new("https://example.com/twin", "Twin")
                    .with_form(contact_form("#left"))
                    .with_form(contact_form("#right")),
            )
            .with_page(FakePage::new("https://example.com/empty", "Empty"));
        let session = ready(two_forms).await;
        let intent = DiscoveryIntent::contact_form();

        session.navigate("https://example.com/contact").await.unwrap();
        let found = session.discover_target_form(&intent).await.unwrap();
        assert!(found.success);
        assert_eq!(found.data_str("selector"), Some("#contact-form"));

        session.navigate("https://example.com/twin").await.unwrap();
        let ambiguous = session.discover_target_form(&intent).await.unwrap();
        assert!(!ambiguous.success);
        assert_eq!(ambiguous.data_str("outcome"), Some("ambiguous"));
        assert_eq!(ambiguous.data.unwrap()["candidates"].as_array().unwrap().len(), 2);

        session.navigate("https://example.com/empty").await.unwrap();
        let missing = session.discover_target_form(&intent).await.unwrap();
        assert_eq!(missing.error.as_deref(), Some("no matching target found"));
    }

    #[tokio::test]
    async fn test_screenshot_is_uploaded_and_remembered() {
        let session = ready(site()).await;
        session.navigate("https://example.com/contact").await.unwrap();
        let shot = session.screenshot().await.unwrap();
        assert!(shot.success);
        assert_eq!(shot.data_str("screenshotUrl"), Some("https://images.test/shot-1.jpg"));
        assert_eq!(shot.data_str("target"), Some("form"));
        assert_eq!(
            session.last_screenshot().as_deref(),
            Some("https://images.test/shot-1.jpg")
        );
    }

    #[tokio::test]
    async fn test_upload_failure_is_expected_failure() {
        let session = Arc::new(BrowserSession::new(
            "s",
            Arc::new(site()),
            Arc::new(MemoryImageStore {
                fail: true,
                ..Default::default()
            }),
            ActionTimeouts::default(),
        ));
        session.initialize(&LaunchOptions::default()).await.unwrap();
        let shot = session.screenshot().await.unwrap();
        assert!(!shot.success);
        assert!(session.last_screenshot().is_none());
    }

    #[tokio::test]
    async fn test_scroll_is_clamped() {
        let session = ready(site()).await;
        let result = session.scroll(0, 50_000).await.unwrap();
        assert_eq!(result.data.unwrap()["y"], MAX_SCROLL_DELTA);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_ordered() {
        let launcher = site();
        let recorder = launcher.recorder.clone();
        let session = ready(launcher).await;

        session.close().await;
        session.close().await;

        assert_eq!(recorder.lock().teardown, vec!["page", "context", "browser"]);
        assert_eq!(session.status(), SessionStatus::Closed);
        let err = session.click("#more").await.unwrap_err();
        assert!(matches!(err, EngineError::Closed { .. }));
        assert!(matches!(
            session.initialize(&LaunchOptions::default()).await,
            Err(EngineError::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_without_initialize() {
        let session = session_with(site());
        session.close().await;
        assert_eq!(session.status(), SessionStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_action_is_rejected_as_busy() {
        let session = ready(site().with_action_delay(Duration::from_secs(2))).await;
        session.navigate("https://example.com/").await.unwrap();

        let background = session.clone();
        let first = tokio::spawn(async move { background.click("#more").await });
        tokio::task::yield_now().await;

        assert_eq!(session.status(), SessionStatus::Busy);
        let err = session.fill("#more", "x").await.unwrap_err();
        assert!(matches!(err, EngineError::Busy { .. }));

        let first = first.await.unwrap().unwrap();
        assert!(first.success);
        assert_eq!(session.status(), SessionStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_in_flight_action() {
        let launcher = site().with_action_delay(Duration::from_secs(60));
        let recorder = launcher.recorder.clone();
        let session = ready(launcher).await;

        let background = session.clone();
        let pending = tokio::spawn(async move { background.click("#more").await });
        tokio::task::yield_now().await;

        session.close().await;
        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, EngineError::Closed { .. }));
        assert!(recorder.lock().clicks.is_empty());
        assert_eq!(recorder.lock().teardown.len(), 3);
    }

    #[tokio::test]
    async fn test_driver_crash_closes_session() {
        let launcher = site().crashing_on_click();
        let recorder = launcher.recorder.clone();
        let session = ready(launcher).await;

        let err = session.click("#more").await.unwrap_err();
        assert!(matches!(err, EngineError::DriverCrashed(_)));
        assert_eq!(session.status(), SessionStatus::Closed);
        assert_eq!(recorder.lock().teardown, vec!["page", "context", "browser"]);
    }
}
