//! Shared test utilities: a scripted in-memory browser and config builder.
#![allow(dead_code)]

use async_trait::async_trait;
use biwenger_scraper::browser::{Driver, DriverError, ElementTarget, TabSource};
use biwenger_scraper::config::Config;
use figment::{Figment, providers::Serialized};
use html_scraper::{Html, Selector};
use serde_json::json;
use std::collections::HashMap;
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE: &str = "https://fantasy.test";
pub const LEAGUE: &str = "42";

const BLANK: &str = "<html><head></head><body></body></html>";

/// Wrap a body fragment into a full document.
pub fn page(body: &str) -> String {
    format!("<html><head></head><body>{body}</body></html>")
}

pub fn view_url(segment: &str) -> String {
    format!("{BASE}/app/#/league/{LEAGUE}/{segment}")
}

pub fn detail_url(id: usize) -> String {
    format!("{BASE}/app/#/player/{id}")
}

/// A login form that submits through a button.
pub fn login_form() -> String {
    page(
        r#"<form><input type="email" placeholder="Email"><input type="password" placeholder="Contraseña"><button type="submit">Entrar</button></form>"#,
    )
}

/// Config pointing every output into `dir`, with test-friendly timeouts.
pub fn test_config(dir: &Path) -> Config {
    test_config_with(dir, json!({}))
}

pub fn test_config_with(dir: &Path, overrides: serde_json::Value) -> Config {
    let mut values = json!({
        "biwenger_email": "manager@example.com",
        "biwenger_password": "s3cret",
        "liga_id": LEAGUE,
        "base_url": BASE,
        "public_out_path": dir.join("public/data.json"),
        "diagnostics_dir": dir.join("diagnostics"),
        "concurrency": 3,
        "run_timeout": "30s",
        "auth_timeout": "400ms",
        "consent_timeout": "50ms",
        "settle_delay": "10ms",
        "navigation_timeout": "2s",
        "idle_timeout": "100ms",
        "detail_timeout": "2s",
    });
    if let (Some(values), Some(extra)) = (values.as_object_mut(), overrides.as_object()) {
        values.extend(extra.clone());
    }
    Figment::new()
        .merge(Serialized::defaults(values))
        .extract()
        .expect("test config must be valid")
}

/// A fake site: fixed pages keyed by URL, plus a login flow.
///
/// Clicking an element with `data-navigate` loads that URL. Submitting (a
/// `type=submit` click, or Enter) after both credential fields were filled
/// moves to `login_redirect`, when set.
#[derive(Default)]
pub struct StubSite {
    pages: HashMap<String, String>,
    login_redirect: Option<String>,
    failing: Vec<String>,
    delays: HashMap<String, Duration>,
    visits: Mutex<HashMap<String, usize>>,
    screenshots: AtomicUsize,
    tabs_opened: AtomicUsize,
    fills: Mutex<Vec<String>>,
}

impl StubSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    pub fn with_login_redirect(mut self, url: impl Into<String>) -> Self {
        self.login_redirect = Some(url.into());
        self
    }

    /// Navigating to `url` fails with a driver error.
    pub fn with_failing(mut self, url: impl Into<String>) -> Self {
        self.failing.push(url.into());
        self
    }

    /// Navigating to `url` takes `delay` before it completes.
    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    pub fn into_browser(self) -> StubBrowser {
        StubBrowser {
            site: Arc::new(self),
        }
    }

    pub fn visits(&self, url: &str) -> usize {
        self.visits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_visits(&self, prefix: &str) -> usize {
        self.visits
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url.starts_with(prefix))
            .map(|(_, count)| count)
            .sum()
    }

    pub fn screenshots(&self) -> usize {
        self.screenshots.load(Ordering::SeqCst)
    }

    pub fn tabs_opened(&self) -> usize {
        self.tabs_opened.load(Ordering::SeqCst)
    }

    pub fn filled_values(&self) -> Vec<String> {
        self.fills.lock().unwrap().clone()
    }

    fn html(&self, url: &str) -> String {
        self.pages.get(url).cloned().unwrap_or_else(|| BLANK.to_owned())
    }
}

/// Hands out tabs on a shared [`StubSite`]; derefs to the site for assertions.
#[derive(Clone)]
pub struct StubBrowser {
    site: Arc<StubSite>,
}

impl StubBrowser {
    pub fn tabs(&self) -> Arc<dyn TabSource> {
        Arc::new(self.clone())
    }
}

impl Deref for StubBrowser {
    type Target = StubSite;

    fn deref(&self) -> &StubSite {
        &self.site
    }
}

#[async_trait]
impl TabSource for StubBrowser {
    async fn new_tab(&self) -> Result<Box<dyn Driver>, DriverError> {
        self.site.tabs_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubTab {
            site: self.site.clone(),
            state: Mutex::new(TabState {
                url: "about:blank".to_owned(),
                filled: 0,
            }),
        }))
    }
}

struct TabState {
    url: String,
    filled: usize,
}

pub struct StubTab {
    site: Arc<StubSite>,
    state: Mutex<TabState>,
}

/// Attributes of the element at `css_path`, if it exists.
fn element_attrs(html: &str, css_path: &str) -> Option<HashMap<String, String>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(css_path).ok()?;
    let element = document.select(&selector).next()?;
    Some(
        element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect(),
    )
}

impl StubTab {
    fn current_html(&self) -> String {
        let url = self.state.lock().unwrap().url.clone();
        self.site.html(&url)
    }

    fn resolve(&self, target: &ElementTarget) -> Result<HashMap<String, String>, DriverError> {
        if target.document != 0 {
            return Err(DriverError::ElementNotFound(target.to_string()));
        }
        element_attrs(&self.current_html(), &target.css_path)
            .ok_or_else(|| DriverError::ElementNotFound(target.to_string()))
    }

    fn submit(&self) {
        let mut state = self.state.lock().unwrap();
        if state.filled >= 2
            && let Some(redirect) = &self.site.login_redirect
        {
            state.url = redirect.clone();
        }
    }
}

#[async_trait]
impl Driver for StubTab {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        *self
            .site
            .visits
            .lock()
            .unwrap()
            .entry(url.to_owned())
            .or_default() += 1;
        if let Some(delay) = self.site.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if self.site.failing.iter().any(|failing| failing == url) {
            return Err(DriverError::NavigationFailed {
                url: url.to_owned(),
                reason: "connection refused".to_owned(),
            });
        }
        self.state.lock().unwrap().url = url.to_owned();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn documents(&self) -> Result<Vec<String>, DriverError> {
        Ok(vec![self.current_html()])
    }

    async fn click(&self, target: &ElementTarget) -> Result<(), DriverError> {
        let attrs = self.resolve(target)?;
        if let Some(url) = attrs.get("data-navigate") {
            self.state.lock().unwrap().url = url.clone();
        } else if attrs.get("type").map(String::as_str) == Some("submit") {
            self.submit();
        }
        Ok(())
    }

    async fn fill(&self, target: &ElementTarget, value: &str) -> Result<(), DriverError> {
        self.resolve(target)?;
        self.site.fills.lock().unwrap().push(value.to_owned());
        self.state.lock().unwrap().filled += 1;
        Ok(())
    }

    async fn press_enter(&self, target: &ElementTarget) -> Result<(), DriverError> {
        self.resolve(target)?;
        self.submit();
        Ok(())
    }

    async fn wait_for_idle(&self, _limit: Duration) -> Result<bool, DriverError> {
        Ok(true)
    }

    async fn remove_elements(&self, _selectors: &[&str]) -> Result<usize, DriverError> {
        Ok(0)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.site.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }
}
