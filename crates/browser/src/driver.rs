use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::BrowserError;

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub headless: bool,
    pub nav_timeout: Duration,
    /// Where exploration screenshots are written.
    pub screenshot_dir: PathBuf,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            nav_timeout: Duration::from_secs(60),
            screenshot_dir: std::env::temp_dir(),
        }
    }
}

struct Launched {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
}

/// Chrome/Chromium driver used by the exploration phase.
///
/// The browser is launched lazily on first navigation and reused for
/// the lifetime of the driver. One driver per run; drivers are not
/// shared across concurrent runs.
pub struct BrowserDriver {
    config: DriverConfig,
    launched: Mutex<Option<Launched>>,
}

impl BrowserDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            launched: Mutex::new(None),
        }
    }

    async fn ensure_launched(&self) -> Result<(), BrowserError> {
        let mut guard = self.launched.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let mut builder = BrowserConfig::builder().no_sandbox().window_size(1280, 900);
        if !self.config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        info!(headless = self.config.headless, "browser launched");

        *guard = Some(Launched {
            browser,
            handler_task,
            page,
        });
        Ok(())
    }

    /// Navigate to a URL and wait for the load to settle.
    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.ensure_launched().await?;
        let guard = self.launched.lock().await;
        let launched = guard.as_ref().ok_or(BrowserError::NoPage)?;

        let navigation = async {
            launched
                .page
                .goto(url)
                .await
                .map_err(|e| BrowserError::Navigation(e.to_string()))?;
            let _ = launched.page.wait_for_navigation().await;
            Ok::<_, BrowserError>(())
        };

        match timeout(self.config.nav_timeout, navigation).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(BrowserError::Navigation(format!(
                    "timed out after {}s",
                    self.config.nav_timeout.as_secs()
                )))
            }
        }

        let current = launched.page.url().await.ok().flatten().unwrap_or_default();
        info!(url = %current, "navigated");
        Ok(())
    }

    /// Full markup of the current page. Empty string when nothing is loaded.
    pub async fn content(&self) -> Result<String, BrowserError> {
        let guard = self.launched.lock().await;
        match guard.as_ref() {
            Some(launched) => Ok(launched.page.content().await?),
            None => Ok(String::new()),
        }
    }

    /// Capture a PNG screenshot to `screenshot_dir`. Returns the path,
    /// or `None` when capture fails (screenshots are best-effort).
    pub async fn screenshot(&self, file_name: &str) -> Option<PathBuf> {
        let guard = self.launched.lock().await;
        let launched = guard.as_ref()?;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(false)
            .build();

        let bytes = match launched.page.screenshot(params).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "screenshot capture failed");
                return None;
            }
        };

        let path = self.config.screenshot_dir.join(file_name);
        if let Err(e) = write_screenshot(&path, &bytes).await {
            warn!(error = %e, path = %path.display(), "screenshot write failed");
            return None;
        }
        debug!(path = %path.display(), bytes = bytes.len(), "screenshot saved");
        Some(path)
    }

    pub async fn close(&self) {
        let mut guard = self.launched.lock().await;
        if let Some(mut launched) = guard.take() {
            if let Err(e) = launched.browser.close().await {
                warn!(error = %e, "browser close failed");
            }
            let _ = launched.browser.wait().await;
            launched.handler_task.abort();
        }
    }
}

async fn write_screenshot(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}
