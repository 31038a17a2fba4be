//! Chrome/Chromium driver over CDP (chromiumoxide).

use crate::browser::{Driver, DriverError, ElementTarget, TabSource};
use crate::config::Config;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig as CdpBrowserConfig, Page};
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Resolves document `i` (0 = main, n = n-th iframe) inside injected scripts.
const RESOLVE_DOC_JS: &str = r#"const __doc = (i) => {
    if (i === 0) return document;
    const frame = document.querySelectorAll('iframe')[i - 1];
    try { return frame ? frame.contentDocument : null; } catch (_) { return null; }
};"#;

const DOCUMENTS_JS: &str = r#"(() => {
    const docs = [document.documentElement.outerHTML];
    for (const frame of document.querySelectorAll('iframe')) {
        try {
            const doc = frame.contentDocument;
            docs.push(doc && doc.documentElement ? doc.documentElement.outerHTML : '');
        } catch (_) {
            docs.push('');
        }
    }
    return docs;
})()"#;

/// A launched browser; every tab shares its cookie jar.
pub struct ChromeBrowser {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
}

impl ChromeBrowser {
    /// Launch a local Chrome/Chromium according to `config`.
    pub async fn launch(config: &Config) -> Result<Self, DriverError> {
        let mut builder = CdpBrowserConfig::builder();

        // chromiumoxide is headless unless asked otherwise
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder = builder
            .request_timeout(config.navigation_timeout)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--lang=es-ES");

        let cdp_config = builder.build().map_err(|e| {
            DriverError::LaunchFailed(format!("failed to build browser config: {e}"))
        })?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| DriverError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
            debug!("browser event handler exited");
        });

        info!(headless = config.headless, "browser launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
        })
    }

    /// Close the browser process. Errors are logged, not returned.
    pub async fn shutdown(self) {
        let mut browser = self.browser.into_inner();
        if let Err(e) = browser.close().await {
            warn!(error = %e, "failed to close browser cleanly");
        }
        let _ = browser.wait().await;
        self.handler_task.abort();
        info!("browser shut down");
    }
}

#[async_trait]
impl TabSource for ChromeBrowser {
    async fn new_tab(&self) -> Result<Box<dyn Driver>, DriverError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::TabOpenFailed(e.to_string()))?;
        Ok(Box::new(ChromeTab { page }))
    }
}

/// One CDP page.
pub struct ChromeTab {
    page: Page,
}

impl ChromeTab {
    async fn eval<T: serde::de::DeserializeOwned>(&self, js: &str) -> Result<T, DriverError> {
        self.page
            .evaluate(js)
            .await
            .map_err(|e| DriverError::JsEvalFailed(e.to_string()))?
            .into_value()
            .map_err(|e| DriverError::JsEvalFailed(format!("{e:?}")))
    }

    /// Run `body` with `el` bound to the target element; `body` must return a
    /// boolean. A missing element maps to [`DriverError::ElementNotFound`].
    async fn with_element(&self, target: &ElementTarget, body: &str) -> Result<(), DriverError> {
        let path = serde_json::to_string(&target.css_path)
            .map_err(|e| DriverError::JsEvalFailed(e.to_string()))?;
        let js = format!(
            r#"(() => {{
    {RESOLVE_DOC_JS}
    const doc = __doc({document});
    const el = doc ? doc.querySelector({path}) : null;
    if (!el) return false;
    {body}
}})()"#,
            document = target.document,
        );

        let found: bool = self.eval(&js).await?;
        if found {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(target.to_string()))
        }
    }
}

#[derive(Deserialize)]
struct IdleReport {
    ok: bool,
    #[serde(rename = "waitedMs")]
    waited_ms: u64,
}

#[async_trait]
impl Driver for ChromeTab {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::NavigationFailed {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn documents(&self) -> Result<Vec<String>, DriverError> {
        self.eval(DOCUMENTS_JS).await
    }

    async fn click(&self, target: &ElementTarget) -> Result<(), DriverError> {
        self.with_element(
            target,
            "el.scrollIntoView({ block: 'center' }); el.click(); return true;",
        )
        .await
    }

    async fn fill(&self, target: &ElementTarget, value: &str) -> Result<(), DriverError> {
        let value = serde_json::to_string(value)
            .map_err(|e| DriverError::JsEvalFailed(e.to_string()))?;
        // Use the native setter so framework-bound inputs observe the change
        let body = format!(
            r#"el.focus();
    const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
    if (desc && desc.set) {{ desc.set.call(el, {value}); }} else {{ el.value = {value}; }}
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;"#
        );
        self.with_element(target, &body).await
    }

    async fn press_enter(&self, target: &ElementTarget) -> Result<(), DriverError> {
        if target.document == 0 {
            let element = self
                .page
                .find_element(target.css_path.as_str())
                .await
                .map_err(|_| DriverError::ElementNotFound(target.to_string()))?;
            element.press_key("Enter").await?;
            return Ok(());
        }

        // Frames are not reachable through find_element; synthesize the key
        self.with_element(
            target,
            r#"for (const type of ['keydown', 'keypress', 'keyup']) {
        el.dispatchEvent(new KeyboardEvent(type, { key: 'Enter', code: 'Enter', keyCode: 13, bubbles: true }));
    }
    if (el.form) { el.form.requestSubmit ? el.form.requestSubmit() : el.form.submit(); }
    return true;"#,
        )
        .await
    }

    async fn wait_for_idle(&self, limit: Duration) -> Result<bool, DriverError> {
        let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        let js = format!(
            r#"(async () => {{
    const timeoutMs = {timeout_ms};
    const idleMs = 750;
    const interval = 250;
    const start = Date.now();
    let lastCount = 0;
    let stableMs = 0;
    try {{ lastCount = performance.getEntriesByType('resource').length; }} catch (_) {{ lastCount = 0; }}
    while (Date.now() - start < timeoutMs) {{
        await new Promise(r => setTimeout(r, interval));
        let count = lastCount;
        try {{ count = performance.getEntriesByType('resource').length; }} catch (_) {{}}
        if (document.readyState === 'complete' && count === lastCount) {{
            stableMs += interval;
            if (stableMs >= idleMs) return {{ ok: true, waitedMs: Date.now() - start }};
        }} else {{
            stableMs = 0;
        }}
        lastCount = count;
    }}
    return {{ ok: false, waitedMs: Date.now() - start }};
}})()"#
        );

        let report: IdleReport = self.eval(&js).await?;
        debug!(ok = report.ok, waited_ms = report.waited_ms, "network idle wait");
        Ok(report.ok)
    }

    async fn remove_elements(&self, selectors: &[&str]) -> Result<usize, DriverError> {
        let selectors = serde_json::to_string(selectors)
            .map_err(|e| DriverError::JsEvalFailed(e.to_string()))?;
        let js = format!(
            r#"(() => {{
    let removed = 0;
    for (const sel of {selectors}) {{
        try {{ document.querySelectorAll(sel).forEach(el => {{ el.remove(); removed++; }}); }} catch (_) {{}}
    }}
    return removed;
}})()"#
        );
        self.eval(&js).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await
            .map_err(|e| DriverError::ScreenshotFailed(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.page.close().await?;
        Ok(())
    }
}
