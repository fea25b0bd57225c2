//! Locating, downloading and launching Chrome/Chromium

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::PathBuf;
use std::process::Command;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, trace, warn};

use crate::browser::LaunchOptions;
use crate::utils::constants::CHROME_USER_AGENT;

/// Removes the profile directory on drop unless released with `keep()`
struct TempDirGuard {
    path: PathBuf,
    keep: bool,
}

impl TempDirGuard {
    fn new(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path).context("Failed to create user data directory")?;
        Ok(Self { path, keep: false })
    }

    /// Call on success; ownership of the directory moves to `BrowserWrapper`
    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => info!(
                "Cleaned up temp dir after launch failure: {}",
                self.path.display()
            ),
            Err(e) => warn!("Failed to clean up temp dir {}: {}", self.path.display(), e),
        }
    }
}

/// Find Chrome/Chromium executable on the system with platform-specific search paths.
///
/// `CHROMIUM_PATH` overrides everything else.
pub async fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!(
                "Using browser from CHROMIUM_PATH environment variable: {}",
                path.display()
            );
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH environment variable points to non-existent file: {}",
            path.display()
        );
    }

    let paths = if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"%LOCALAPPDATA%\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "~/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        vec![
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for path_str in paths {
        let path = if let Some(rest) = path_str.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => continue,
            }
        } else if path_str.contains('%') && cfg!(target_os = "windows") {
            PathBuf::from(expand_windows_env_vars(path_str))
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            info!("Found browser at: {}", path.display());
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    let path = PathBuf::from(path_str);
                    info!("Found browser using 'which' command: {}", path.display());
                    return Ok(path);
                }
            }
        }
    }

    warn!("No Chrome/Chromium executable found. Will download and use fetcher.");
    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Expand `%VAR%` tokens; unknown variables are left untouched
fn expand_windows_env_vars(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            result.push(ch);
            continue;
        }
        let var_name: String = chars.by_ref().take_while(|&c| c != '%').collect();
        if var_name.is_empty() {
            result.push('%');
        } else if let Ok(value) = std::env::var(&var_name) {
            result.push_str(&value);
        } else {
            result.push('%');
            result.push_str(&var_name);
            result.push('%');
        }
    }

    result
}

/// Downloads a managed Chromium into the user cache dir and returns its executable
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("Downloading managed Chromium browser...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| {
            let fallback = std::env::temp_dir().join(".cache");
            warn!(
                "Could not determine system cache directory, using temp directory fallback: {}",
                fallback.display()
            );
            fallback
        })
        .join("web-pilot/chromium");

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );

    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!(
        "Downloaded Chromium to: {}",
        revision_info.folder_path.display()
    );

    Ok(revision_info.executable_path)
}

/// Command-line flags for a launch, excluding headless/window/profile which
/// go through the config builder
pub(crate) fn launch_args(options: &LaunchOptions, in_container: bool) -> Vec<String> {
    let mut args: Vec<String> = [
        "--disable-blink-features=AutomationControlled",
        "--disable-infobars",
        "--disable-notifications",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--disable-software-rasterizer",
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-extensions",
        "--disable-popup-blocking",
        "--disable-background-networking",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-breakpad",
        "--disable-features=TranslateUI",
        "--disable-hang-monitor",
        "--disable-prompt-on-repost",
        "--password-store=basic",
        "--use-mock-keychain",
        "--hide-scrollbars",
        "--mute-audio",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(format!("--user-agent={CHROME_USER_AGENT}"));

    if options.disable_security {
        args.extend(
            [
                "--disable-web-security",
                "--disable-features=IsolateOrigins,site-per-process",
                "--ignore-certificate-errors",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
    }

    // setuid sandboxing does not work inside containers
    if in_container || options.disable_security {
        args.push("--no-sandbox".to_string());
        args.push("--disable-setuid-sandbox".to_string());
    }

    args
}

/// Find or download a browser and launch it with the given options
///
/// `user_data_dir` must be unique per instance so concurrent sessions never
/// contend on a Chrome profile lock. It is removed again if launch fails.
pub async fn launch_browser(
    options: &LaunchOptions,
    user_data_dir: PathBuf,
) -> Result<(Browser, JoinHandle<()>)> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    let temp_guard = TempDirGuard::new(user_data_dir)?;

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(options.timeout)
        .window_size(options.viewport.width, options.viewport.height)
        .viewport(None)
        .user_data_dir(temp_guard.path.clone())
        .chrome_executable(chrome_path);

    config_builder = if options.headless {
        config_builder.headless_mode(HeadlessMode::default())
    } else {
        config_builder.with_head()
    };

    if options.disable_security {
        warn!("Disabling browser security features (disable_security=true)");
    }
    let in_container = should_disable_sandbox();
    if in_container {
        info!("Detected containerized environment, disabling sandbox");
    }
    config_builder = config_builder.args(launch_args(options, in_container));

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    info!(headless = options.headless, "Launching browser");
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let error_msg = e.to_string();

                // Chrome emits CDP events chromiumoxide cannot deserialize
                // (mattsse/chromiumoxide#167, #229); those are noise.
                let is_benign_serialization_error = error_msg
                    .contains("data did not match any variant of untagged enum Message")
                    || error_msg.contains("Failed to deserialize WS response");

                if is_benign_serialization_error {
                    trace!("Suppressed benign CDP serialization error: {}", error_msg);
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        info!("Browser handler task completed");
    });

    temp_guard.keep();

    Ok((browser, handler_task))
}

/// Detect containerized environments (Docker, Kubernetes)
fn should_disable_sandbox() -> bool {
    std::path::Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_windows_env_vars_keeps_unknown_tokens() {
        let expanded = expand_windows_env_vars(r"%WEB_PILOT_SURELY_UNSET_VAR%\chrome.exe");
        assert_eq!(expanded, r"%WEB_PILOT_SURELY_UNSET_VAR%\chrome.exe");
        assert_eq!(expand_windows_env_vars("100%%"), "100%");
    }

    #[test]
    fn test_launch_args_sandbox_and_security() {
        let options = LaunchOptions::default();
        let args = launch_args(&options, false);
        assert!(args.iter().any(|a| a.starts_with("--user-agent=")));
        assert!(!args.contains(&"--no-sandbox".to_string()));
        assert!(!args.contains(&"--disable-web-security".to_string()));

        let contained = launch_args(&options, true);
        assert!(contained.contains(&"--no-sandbox".to_string()));

        let insecure = LaunchOptions {
            disable_security: true,
            ..LaunchOptions::default()
        };
        let args = launch_args(&insecure, false);
        assert!(args.contains(&"--disable-web-security".to_string()));
        assert!(args.contains(&"--disable-setuid-sandbox".to_string()));
    }

    #[test]
    fn test_temp_dir_guard_removes_unless_kept() {
        let root = tempfile::tempdir().unwrap();
        let dropped = root.path().join("dropped");
        drop(TempDirGuard::new(dropped.clone()).unwrap());
        assert!(!dropped.exists());

        let kept = root.path().join("kept");
        TempDirGuard::new(kept.clone()).unwrap().keep();
        assert!(kept.exists());
    }
}
