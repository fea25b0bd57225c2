//! Browser infrastructure: the driver seam and its Chromium implementation
//!
//! The session engine only ever talks to [`PageDriver`]; everything that
//! touches chromiumoxide lives in [`chromium`] and [`wrapper`].

mod chromium;
#[cfg(test)]
pub(crate) mod fake;
mod scripts;
mod wrapper;

pub use chromium::{ChromiumDriver, ChromiumLauncher};
pub use wrapper::BrowserWrapper;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::discovery::{ButtonDescriptor, FieldDescriptor, PageSnapshot};
use crate::utils::constants::{
    DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Element not found: '{0}'")]
    NotFound(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Interaction failed: {0}")]
    Interaction(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// The browser process or its connection is gone
    #[error("Browser connection lost: {0}")]
    Crashed(String),
}

impl DriverError {
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        DriverError::Timeout {
            what: what.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Whether the session is unusable after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Crashed(_))
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT_WIDTH,
            height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

/// Browser launch parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub headless: bool,
    pub disable_security: bool,
    pub viewport: Viewport,
    /// Default per-operation timeout for the CDP connection
    pub timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            disable_security: false,
            viewport: Viewport::default(),
            timeout: Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub url: String,
    pub title: String,
}

/// What a screenshot covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureTarget {
    /// The first form on the page
    Form,
    FullPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotCapture {
    pub bytes: Vec<u8>,
    pub target: CaptureTarget,
    pub mime_type: &'static str,
}

/// One live page inside an isolated browser context
///
/// Methods take `&self`; implementations synchronize internally so a
/// session can tear the driver down while an action is still in flight.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the page to settle
    async fn goto(&self, url: &str, timeout: Duration) -> DriverResult<PageInfo>;

    async fn click(&self, selector: &str, timeout: Duration) -> DriverResult<()>;

    /// Replace the element's value with `value`
    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> DriverResult<()>;

    /// Select by option value or visible label, returns the selected value
    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        timeout: Duration,
    ) -> DriverResult<String>;

    /// Visible text of `selector`, or of the whole page when `None`
    async fn text_content(&self, selector: Option<&str>, timeout: Duration)
    -> DriverResult<String>;

    /// Absolute hrefs of every element matching `selector`
    async fn link_hrefs(&self, selector: &str) -> DriverResult<Vec<String>>;

    async fn wait_for(&self, selector: &str, timeout: Duration) -> DriverResult<()>;

    async fn form_fields(&self) -> DriverResult<Vec<FieldDescriptor>>;

    async fn buttons(&self) -> DriverResult<Vec<ButtonDescriptor>>;

    /// Whether clicking `selector` would submit a form
    async fn is_submit_control(&self, selector: &str) -> DriverResult<bool>;

    /// Collect every form-like container, marking which `queries` resolve to it
    async fn snapshot(&self, queries: &[String]) -> DriverResult<PageSnapshot>;

    async fn scroll_by(&self, x: i64, y: i64) -> DriverResult<()>;

    /// JPEG capture of the first form, or the full page when there is none
    async fn screenshot(&self) -> DriverResult<ScreenshotCapture>;

    async fn page_info(&self) -> DriverResult<PageInfo>;

    /// Release page, then context, then browser. Never fails; errors are logged.
    async fn shutdown(&self);
}

/// Starts a fresh browser and hands back its single page
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> DriverResult<Box<dyn PageDriver>>;
}
