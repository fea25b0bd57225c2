//! chromiumoxide-backed [`PageDriver`]

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide_cdp::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide_cdp::cdp::js_protocol::runtime::{
    CallArgument, CallFunctionOnParams, EventConsoleApiCalled,
};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::scripts;
use super::wrapper::BrowserWrapper;
use super::{
    CaptureTarget, DriverError, DriverLauncher, DriverResult, LaunchOptions, PageDriver, PageInfo,
    ScreenshotCapture,
};
use crate::browser_setup::launch_browser;
use crate::discovery::{ButtonDescriptor, FieldDescriptor, PageSnapshot};
use crate::utils::poll_until;

const SCREENSHOT_QUALITY: i64 = 80;

/// Launches a dedicated Chromium per session
#[derive(Debug, Default, Clone)]
pub struct ChromiumLauncher;

#[async_trait]
impl DriverLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> DriverResult<Box<dyn PageDriver>> {
        // Unique profile per launch, concurrent sessions never share a lock
        let user_data_dir =
            std::env::temp_dir().join(format!("web_pilot_profile_{}", Uuid::new_v4()));

        let (browser, handler) = launch_browser(options, user_data_dir.clone())
            .await
            .map_err(|e| DriverError::Launch(format!("{e:#}")))?;
        let mut wrapper = BrowserWrapper::new(browser, handler, user_data_dir);

        let page = match wrapper.open_isolated_page().await {
            Ok(page) => page,
            Err(e) => {
                wrapper.shutdown(None).await;
                return Err(DriverError::Launch(format!("{e:#}")));
            }
        };

        let console_task = spawn_console_logger(&page).await;
        info!(
            width = options.viewport.width,
            height = options.viewport.height,
            "Browser page ready"
        );

        Ok(Box::new(ChromiumDriver {
            page,
            wrapper: Mutex::new(Some(wrapper)),
            console_task,
        }))
    }
}

/// Forward page console output into the log at debug level
async fn spawn_console_logger(page: &Page) -> Option<JoinHandle<()>> {
    let mut events = match page.event_listener::<EventConsoleApiCalled>().await {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "Console listener unavailable");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let text = event
                .args
                .iter()
                .filter_map(|arg| {
                    arg.value
                        .as_ref()
                        .map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .or_else(|| arg.description.clone())
                })
                .collect::<Vec<_>>()
                .join(" ");
            debug!(target: "web_pilot::console", level = ?event.r#type, "{}", text);
        }
    }))
}

/// Treat transport-level failures as a dead browser
fn classify(err: CdpError, expected: fn(String) -> DriverError) -> DriverError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    let disconnected = ["channel", "websocket", "connection closed", "target closed"]
        .iter()
        .any(|marker| lowered.contains(marker));
    if disconnected {
        DriverError::Crashed(message)
    } else {
        expected(message)
    }
}

pub struct ChromiumDriver {
    page: Page,
    wrapper: Mutex<Option<BrowserWrapper>>,
    console_task: Option<JoinHandle<()>>,
}

impl ChromiumDriver {
    async fn find(&self, selector: &str, timeout: Duration) -> DriverResult<Element> {
        poll_until(timeout, || async { self.page.find_element(selector).await.ok() })
            .await
            .ok_or_else(|| DriverError::timeout(format!("element '{selector}'"), timeout))
    }

    /// Run a page-level function with JSON arguments, returning its value
    async fn call<T: DeserializeOwned>(&self, function: String, args: Vec<Value>) -> DriverResult<T> {
        let mut builder = CallFunctionOnParams::builder()
            .function_declaration(function)
            .return_by_value(true);
        for arg in args {
            builder = builder.argument(CallArgument::builder().value(arg).build());
        }
        let call = builder.build().map_err(DriverError::Script)?;

        self.page
            .evaluate_function(call)
            .await
            .map_err(|e| classify(e, DriverError::Script))?
            .into_value::<T>()
            .map_err(|e| DriverError::Script(format!("Unexpected script result: {e}")))
    }

    /// Scroll into view and click the element's centre point
    async fn press(&self, element: &Element, selector: &str) -> DriverResult<()> {
        element
            .scroll_into_view()
            .await
            .map_err(|e| classify(e, DriverError::Interaction))?;
        let point = element.clickable_point().await.map_err(|e| {
            DriverError::Interaction(format!("'{selector}' is not visible: {e}"))
        })?;
        self.page
            .click(point)
            .await
            .map_err(|e| classify(e, DriverError::Interaction))?;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn goto(&self, url: &str, timeout: Duration) -> DriverResult<PageInfo> {
        let navigation = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, CdpError>(())
        };
        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| DriverError::timeout(format!("navigation to {url}"), timeout))?
            .map_err(|e| classify(e, DriverError::Navigation))?;

        self.page_info().await
    }

    async fn click(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        let element = self.find(selector, timeout).await?;
        self.press(&element, selector).await
    }

    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> DriverResult<()> {
        let element = self.find(selector, timeout).await?;
        self.press(&element, selector).await?;

        let cleared: bool = self
            .call(scripts::CLEAR_VALUE.to_string(), vec![json!(selector)])
            .await?;
        if !cleared {
            return Err(DriverError::NotFound(selector.to_string()));
        }

        element
            .type_str(value)
            .await
            .map_err(|e| classify(e, DriverError::Interaction))?;
        Ok(())
    }

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        timeout: Duration,
    ) -> DriverResult<String> {
        self.find(selector, timeout).await?;
        let selected: Option<String> = self
            .call(
                scripts::SELECT_OPTION.to_string(),
                vec![json!(selector), json!(value)],
            )
            .await?;
        selected.ok_or_else(|| {
            DriverError::Interaction(format!("No option matching '{value}' in '{selector}'"))
        })
    }

    async fn text_content(
        &self,
        selector: Option<&str>,
        timeout: Duration,
    ) -> DriverResult<String> {
        if let Some(selector) = selector {
            let element = self.find(selector, timeout).await?;
            return element
                .inner_text()
                .await
                .map(Option::unwrap_or_default)
                .map_err(|e| classify(e, DriverError::Script));
        }

        let text = self
            .page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(|e| classify(e, DriverError::Script))?
            .into_value::<String>()
            .unwrap_or_default();

        if !text.trim().is_empty() {
            return Ok(text);
        }

        // SPAs may not have populated innerText yet; fall back to rendered HTML
        let html = self
            .page
            .content()
            .await
            .map_err(|e| classify(e, DriverError::Script))?;
        Ok(html2md::parse_html(&html))
    }

    async fn link_hrefs(&self, selector: &str) -> DriverResult<Vec<String>> {
        self.call(scripts::LINK_HREFS.to_string(), vec![json!(selector)])
            .await
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        self.find(selector, timeout).await.map(|_| ())
    }

    async fn form_fields(&self) -> DriverResult<Vec<FieldDescriptor>> {
        self.call(scripts::with_helpers(scripts::FORM_FIELDS), Vec::new())
            .await
    }

    async fn buttons(&self) -> DriverResult<Vec<ButtonDescriptor>> {
        self.call(scripts::with_helpers(scripts::BUTTONS), Vec::new())
            .await
    }

    async fn is_submit_control(&self, selector: &str) -> DriverResult<bool> {
        self.call(scripts::IS_SUBMIT_CONTROL.to_string(), vec![json!(selector)])
            .await
    }

    async fn snapshot(&self, queries: &[String]) -> DriverResult<PageSnapshot> {
        self.call(scripts::with_helpers(scripts::SNAPSHOT), vec![json!(queries)])
            .await
    }

    async fn scroll_by(&self, x: i64, y: i64) -> DriverResult<()> {
        let call = CallFunctionOnParams::builder()
            .function_declaration(scripts::SCROLL_BY)
            .argument(CallArgument::builder().value(json!(x)).build())
            .argument(CallArgument::builder().value(json!(y)).build())
            .build()
            .map_err(DriverError::Script)?;
        self.page
            .evaluate_function(call)
            .await
            .map_err(|e| classify(e, DriverError::Script))?;
        Ok(())
    }

    async fn screenshot(&self) -> DriverResult<ScreenshotCapture> {
        if let Ok(form) = self.page.find_element("form").await {
            match form.screenshot(CaptureScreenshotFormat::Jpeg).await {
                Ok(bytes) => {
                    return Ok(ScreenshotCapture {
                        bytes,
                        target: CaptureTarget::Form,
                        mime_type: "image/jpeg",
                    });
                }
                Err(e) => debug!(error = %e, "Form capture failed, capturing full page"),
            }
        }

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Jpeg)
            .quality(SCREENSHOT_QUALITY)
            .full_page(true)
            .build();
        let bytes = self
            .page
            .screenshot(params)
            .await
            .map_err(|e| classify(e, DriverError::Interaction))?;

        Ok(ScreenshotCapture {
            bytes,
            target: CaptureTarget::FullPage,
            mime_type: "image/jpeg",
        })
    }

    async fn page_info(&self) -> DriverResult<PageInfo> {
        let (url, title) = tokio::try_join!(self.page.url(), self.page.get_title())
            .map_err(|e| classify(e, DriverError::Script))?;
        Ok(PageInfo {
            url: url.unwrap_or_default(),
            title: title.unwrap_or_default(),
        })
    }

    async fn shutdown(&self) {
        if let Some(task) = &self.console_task {
            task.abort();
        }

        let Some(mut wrapper) = self.wrapper.lock().await.take() else {
            return;
        };
        info!("Shutting down browser");
        wrapper.shutdown(Some(self.page.clone())).await;
    }
}
