//! Natural-language web task automation over a live headless browser
//!
//! A task string is routed to one or more policies, each driving a bounded
//! tool-call loop against a [`session::BrowserSession`]. Progress is streamed
//! per session through [`events::EventHub`].

pub mod agent;
pub mod browser;
pub mod browser_setup;
pub mod discovery;
pub mod error;
pub mod events;
pub mod image_store;
pub mod request;
pub mod session;
pub mod tools;
mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::agent::{Mode, ModelSettings, OrchestratorSettings};
use crate::browser::{LaunchOptions, Viewport};
use crate::events::EventConfig;
use crate::image_store::{FileImageStore, HttpImageStore, ImageStore};
use crate::session::ActionTimeouts;
use crate::utils::constants::{
    DEFAULT_INTERACTION_TIMEOUT_MS, DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_UPLOAD_TIMEOUT_MS,
    DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH, DEFAULT_WAIT_TIMEOUT_MS,
};
use crate::utils::{validate_interaction_timeout, validate_navigation_timeout};

pub use agent::{FinalOutput, Orchestrator, RunFailure, RunResult, Transcript};
pub use error::{AutomationFailure, ErrorCode, ErrorResponse, ValidationError};
pub use request::{RequestConfig, TaskRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub image_store: ImageStoreConfig,

    #[serde(default)]
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Model turns per task, across every handoff
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// OpenAI-compatible endpoint; `OPENAI_BASE_URL` overrides
    #[serde(default)]
    pub base_url: Option<String>,

    /// Only ever set from `OPENAI_API_KEY`
    #[serde(skip)]
    pub api_key: Option<String>,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,

    /// Default CDP request timeout
    #[serde(default = "default_navigation_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Per action class, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,

    #[serde(default = "default_interaction_ms")]
    pub interaction_ms: u64,

    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,

    #[serde(default = "default_upload_ms")]
    pub upload_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    #[serde(default = "default_event_buffer")]
    pub buffer: usize,

    /// Finished sessions stay replayable this long
    #[serde(default = "default_event_retention_secs")]
    pub retention_secs: u64,
}

/// Where screenshots go: an HTTP upload endpoint if set, else a local directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageStoreConfig {
    #[serde(default)]
    pub upload_url: Option<String>,

    #[serde(default)]
    pub upload_preset: Option<String>,

    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_max_steps() -> usize {
    20
}
fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false // SECURE BY DEFAULT
}

fn default_window_width() -> u32 {
    DEFAULT_VIEWPORT_WIDTH
}

fn default_window_height() -> u32 {
    DEFAULT_VIEWPORT_HEIGHT
}

fn default_navigation_ms() -> u64 {
    DEFAULT_NAVIGATION_TIMEOUT_MS
}
fn default_interaction_ms() -> u64 {
    DEFAULT_INTERACTION_TIMEOUT_MS
}
fn default_wait_ms() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}
fn default_upload_ms() -> u64 {
    DEFAULT_UPLOAD_TIMEOUT_MS
}

fn default_heartbeat_secs() -> u64 {
    15
}
fn default_reconnect_backoff_ms() -> u64 {
    3000
}
fn default_event_buffer() -> usize {
    256
}
fn default_event_retention_secs() -> u64 {
    600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            browser: BrowserConfig::default(),
            timeouts: TimeoutConfig::default(),
            events: EventsConfig::default(),
            image_store: ImageStoreConfig::default(),
            mode: Mode::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_steps: default_max_steps(),
            llm_timeout_secs: default_llm_timeout_secs(),
            base_url: None,
            api_key: None,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
            timeout_ms: default_navigation_ms(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_ms: default_navigation_ms(),
            interaction_ms: default_interaction_ms(),
            wait_ms: default_wait_ms(),
            upload_ms: default_upload_ms(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            buffer: default_event_buffer(),
            retention_secs: default_event_retention_secs(),
        }
    }
}

impl Config {
    /// Apply environment overrides on top of file values
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            self.model.base_url = Some(url);
        }
        if let Some(url) = var("WEB_PILOT_IMAGE_UPLOAD_URL") {
            self.image_store.upload_url = Some(url);
        }
    }

    /// Per-category deadlines, checked against the navigation/interaction ceilings
    pub fn action_timeouts(&self) -> Result<ActionTimeouts, ValidationError> {
        Ok(ActionTimeouts {
            navigation: validate_navigation_timeout(Some(self.timeouts.navigation_ms), 0)?,
            interaction: validate_interaction_timeout(Some(self.timeouts.interaction_ms), 0)?,
            wait: validate_interaction_timeout(Some(self.timeouts.wait_ms), 0)?,
            upload: validate_navigation_timeout(Some(self.timeouts.upload_ms), 0)?,
        })
    }

    pub fn launch_options(&self) -> Result<LaunchOptions, ValidationError> {
        Ok(LaunchOptions {
            headless: self.browser.headless,
            disable_security: self.browser.disable_security,
            viewport: Viewport {
                width: self.browser.window.width,
                height: self.browser.window.height,
            },
            timeout: validate_navigation_timeout(Some(self.browser.timeout_ms), 0)?,
        })
    }

    pub fn event_config(&self) -> EventConfig {
        EventConfig {
            heartbeat: Duration::from_secs(self.events.heartbeat_secs.max(1)),
            reconnect_backoff: Duration::from_millis(self.events.reconnect_backoff_ms),
            buffer: self.events.buffer.max(1),
            retention: Duration::from_secs(self.events.retention_secs),
        }
    }

    pub fn orchestrator_settings(&self) -> Result<OrchestratorSettings, ValidationError> {
        Ok(OrchestratorSettings {
            mode: self.mode,
            max_steps: self.model.max_steps.max(1),
            launch: self.launch_options()?,
            model: ModelSettings {
                model: Some(self.model.model.clone()),
                temperature: Some(self.model.temperature),
                max_tokens: Some(self.model.max_tokens),
            },
        })
    }

    /// HTTP store when an upload URL is configured, else files under `directory`
    pub fn image_store(&self) -> Arc<dyn ImageStore> {
        match &self.image_store.upload_url {
            Some(url) => Arc::new(HttpImageStore::new(
                url.clone(),
                self.image_store.upload_preset.clone(),
            )),
            None => {
                let directory = self
                    .image_store
                    .directory
                    .clone()
                    .unwrap_or_else(|| std::env::temp_dir().join("web_pilot_screenshots"));
                Arc::new(FileImageStore::new(directory))
            }
        }
    }
}

/// Load config from config.yaml in package root, or `WEB_PILOT_CONFIG`
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = std::env::var("WEB_PILOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml"));

    let mut config = if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        info!(path = %config_path.display(), "Loaded config");
        config
    } else {
        Config::default()
    };
    config.apply_env(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));
    Ok(config)
}
