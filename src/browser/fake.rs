//! In-memory driver for exercising the engine without a browser

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{
    CaptureTarget, DriverError, DriverLauncher, DriverResult, LaunchOptions, PageDriver, PageInfo,
    ScreenshotCapture,
};
use crate::discovery::{ButtonDescriptor, ContainerSnapshot, FieldDescriptor, PageSnapshot};

#[derive(Debug, Clone, Default)]
pub(crate) struct FakePage {
    pub url: String,
    pub title: String,
    pub text: String,
    pub elements: Vec<String>,
    pub options: HashMap<String, Vec<String>>,
    pub containers: Vec<ContainerSnapshot>,
    pub links: Vec<String>,
}

impl FakePage {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            elements: vec!["body".to_string()],
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_elements(mut self, selectors: &[&str]) -> Self {
        self.elements.extend(selectors.iter().map(|s| s.to_string()));
        self
    }

    /// Adds the container plus every field and button selector inside it
    pub fn with_form(mut self, mut container: ContainerSnapshot) -> Self {
        container.index = self.containers.len();
        self.elements.push(container.selector.clone());
        self.elements.extend(
            container
                .fields
                .iter()
                .map(|f| f.selector.clone())
                .chain(container.buttons.iter().map(|b| b.selector.clone()))
                .filter(|s| !s.is_empty()),
        );
        self.containers.push(container);
        self
    }

    pub fn with_select(mut self, selector: &str, options: &[&str]) -> Self {
        self.elements.push(selector.to_string());
        self.options.insert(
            selector.to_string(),
            options.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_links(mut self, links: &[&str]) -> Self {
        self.links = links.iter().map(|s| s.to_string()).collect();
        self
    }

    fn has(&self, selector: &str) -> bool {
        self.elements.iter().any(|e| e == selector)
    }
}

/// Everything the fake observed, shared with the test after teardown
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub launches: usize,
    pub calls: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub clicks: Vec<String>,
    /// Teardown steps in the order they ran
    pub teardown: Vec<&'static str>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeLauncher {
    pages: HashMap<String, FakePage>,
    pub recorder: Arc<Mutex<Recorder>>,
    fail_launch: bool,
    action_delay: Option<Duration>,
    crash_on_click: bool,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: FakePage) -> Self {
        self.pages.insert(page.url.clone(), page);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::default()
        }
    }

    /// Make click/fill take this long, to observe in-flight behaviour
    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = Some(delay);
        self
    }

    pub fn crashing_on_click(mut self) -> Self {
        self.crash_on_click = true;
        self
    }

    pub fn driver(&self) -> FakeDriver {
        FakeDriver {
            pages: self.pages.clone(),
            current: Mutex::new(FakePage::new("about:blank", "")),
            recorder: self.recorder.clone(),
            action_delay: self.action_delay,
            crash_on_click: self.crash_on_click,
        }
    }
}

#[async_trait]
impl DriverLauncher for FakeLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> DriverResult<Box<dyn PageDriver>> {
        if self.fail_launch {
            return Err(DriverError::Launch("no browser executable".to_string()));
        }
        self.recorder.lock().launches += 1;
        Ok(Box::new(self.driver()))
    }
}

pub(crate) struct FakeDriver {
    pages: HashMap<String, FakePage>,
    current: Mutex<FakePage>,
    recorder: Arc<Mutex<Recorder>>,
    action_delay: Option<Duration>,
    crash_on_click: bool,
}

impl FakeDriver {
    fn record(&self, call: String) {
        self.recorder.lock().calls.push(call);
    }

    fn require(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        if self.current.lock().has(selector) {
            Ok(())
        } else {
            Err(DriverError::timeout(format!("element '{selector}'"), timeout))
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.action_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn goto(&self, url: &str, _timeout: Duration) -> DriverResult<PageInfo> {
        self.record(format!("goto {url}"));
        let page = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| DriverError::Navigation(format!("net::ERR_NAME_NOT_RESOLVED at {url}")))?;
        let info = PageInfo {
            url: page.url.clone(),
            title: page.title.clone(),
        };
        *self.current.lock() = page;
        Ok(info)
    }

    async fn click(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        self.record(format!("click {selector}"));
        self.pause().await;
        if self.crash_on_click {
            return Err(DriverError::Crashed("websocket closed".to_string()));
        }
        self.require(selector, timeout)?;
        self.recorder.lock().clicks.push(selector.to_string());
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> DriverResult<()> {
        self.record(format!("fill {selector}"));
        self.pause().await;
        self.require(selector, timeout)?;
        self.recorder
            .lock()
            .fills
            .push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        timeout: Duration,
    ) -> DriverResult<String> {
        self.record(format!("select {selector}"));
        self.require(selector, timeout)?;
        let current = self.current.lock();
        current
            .options
            .get(selector)
            .and_then(|options| options.iter().find(|o| o.eq_ignore_ascii_case(value)))
            .cloned()
            .ok_or_else(|| {
                DriverError::Interaction(format!("No option matching '{value}' in '{selector}'"))
            })
    }

    async fn text_content(
        &self,
        selector: Option<&str>,
        timeout: Duration,
    ) -> DriverResult<String> {
        if let Some(selector) = selector {
            self.require(selector, timeout)?;
        }
        Ok(self.current.lock().text.clone())
    }

    async fn link_hrefs(&self, _selector: &str) -> DriverResult<Vec<String>> {
        Ok(self.current.lock().links.clone())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        self.record(format!("wait {selector}"));
        self.require(selector, timeout)
    }

    async fn form_fields(&self) -> DriverResult<Vec<FieldDescriptor>> {
        Ok(self
            .current
            .lock()
            .containers
            .iter()
            .flat_map(|c| c.fields.clone())
            .collect())
    }

    async fn buttons(&self) -> DriverResult<Vec<ButtonDescriptor>> {
        Ok(self
            .current
            .lock()
            .containers
            .iter()
            .flat_map(|c| c.buttons.clone())
            .collect())
    }

    async fn is_submit_control(&self, selector: &str) -> DriverResult<bool> {
        self.record(format!("inspect {selector}"));
        Ok(self
            .current
            .lock()
            .containers
            .iter()
            .flat_map(|c| c.buttons.iter())
            .any(|b| b.selector == selector && b.is_submit()))
    }

    async fn snapshot(&self, queries: &[String]) -> DriverResult<PageSnapshot> {
        let current = self.current.lock();
        let containers = current
            .containers
            .iter()
            .cloned()
            .map(|mut c| {
                c.matched_selectors.retain(|p| queries.contains(p));
                c
            })
            .collect();
        Ok(PageSnapshot {
            url: current.url.clone(),
            title: current.title.clone(),
            containers,
        })
    }

    async fn scroll_by(&self, x: i64, y: i64) -> DriverResult<()> {
        self.record(format!("scroll {x},{y}"));
        Ok(())
    }

    async fn screenshot(&self) -> DriverResult<ScreenshotCapture> {
        let target = if self.current.lock().containers.is_empty() {
            CaptureTarget::FullPage
        } else {
            CaptureTarget::Form
        };
        Ok(ScreenshotCapture {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            target,
            mime_type: "image/jpeg",
        })
    }

    async fn page_info(&self) -> DriverResult<PageInfo> {
        let current = self.current.lock();
        Ok(PageInfo {
            url: current.url.clone(),
            title: current.title.clone(),
        })
    }

    async fn shutdown(&self) {
        let mut recorder = self.recorder.lock();
        recorder.teardown.extend(["page", "context", "browser"]);
    }
}

/// A contact form with required name, email and message fields
pub(crate) fn contact_form(selector: &str) -> ContainerSnapshot {
    let field = |tag: &str, kind: &str, name: &str| FieldDescriptor {
        tag: tag.to_string(),
        field_type: kind.to_string(),
        name: name.to_string(),
        id: name.to_string(),
        required: true,
        selector: format!("#{name}"),
        ..Default::default()
    };
    ContainerSnapshot {
        tag: "form".to_string(),
        selector: selector.to_string(),
        id: selector.trim_start_matches('#').to_string(),
        fields: vec![
            field("input", "text", "name"),
            field("input", "email", "email"),
            field("textarea", "textarea", "message"),
        ],
        buttons: vec![ButtonDescriptor {
            tag: "button".to_string(),
            button_type: "submit".to_string(),
            text: "Send".to_string(),
            selector: format!("{selector} button[type=\"submit\"]"),
            ..Default::default()
        }],
        nearby_text: "Contact us".to_string(),
        ..Default::default()
    }
}
