//! Browser lifecycle management
//!
//! Owns the chromiumoxide `Browser`, its event handler task, the isolated
//! browser context the session page lives in, and the temp profile dir.

use anyhow::{Context, Result};
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use chromiumoxide_cdp::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide_cdp::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Wrapper for Browser and its event handler task
///
/// Handler MUST be aborted to prevent it running indefinitely after
/// browser is closed; `Drop` takes care of that.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
    context_id: Option<BrowserContextId>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
            context_id: None,
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Create a fresh browser context and one blank page inside it
    ///
    /// The page starts at about:blank so viewport and listeners are in place
    /// before the first real navigation.
    pub(crate) async fn open_isolated_page(&mut self) -> Result<Page> {
        let context = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("Failed to create browser context")?;
        let context_id = context.result.browser_context_id.clone();
        self.context_id = Some(context_id.clone());

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build target params: {e}"))?;

        let page = self
            .browser
            .new_page(params)
            .await
            .context("Failed to create blank page")?;

        info!("Created isolated blank page");
        Ok(page)
    }

    /// Tear down in order: page, context, browser process, profile dir
    ///
    /// Every step is attempted even if an earlier one fails; failures are
    /// logged and swallowed.
    pub async fn shutdown(&mut self, page: Option<Page>) {
        if let Some(page) = page
            && let Err(e) = page.close().await
        {
            warn!(error = %e, "Failed to close page");
        }

        if let Some(context_id) = self.context_id.take()
            && let Err(e) = self
                .browser
                .execute(DisposeBrowserContextParams::new(context_id))
                .await
        {
            warn!(error = %e, "Failed to dispose browser context");
        }

        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser cleanly");
        }

        // close() only sends the command; wait() reaps the process
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Failed to wait for browser exit");
        }

        self.cleanup_temp_dir();
    }

    /// Clean up temp directory (blocking operation)
    ///
    /// MUST be called AFTER `browser.wait()` completes so Chrome has released
    /// all file handles. Windows will fail to remove locked files.
    pub fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        info!("Dropping BrowserWrapper - aborting handler task");
        self.handler.abort();

        if let Some(path) = &self.user_data_dir {
            warn!(
                "BrowserWrapper dropped without explicit shutdown. \
                Temp directory will be orphaned: {}",
                path.display()
            );
        }
    }
}
