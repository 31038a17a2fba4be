//! Brings the authenticated session to a roster or market view.

use crate::browser::{Driver, ElementTarget};
use crate::config::Config;
use crate::locator::{LocatorChain, Strategy, parse_documents};
use crate::models::ViewTarget;
use crate::outcome::Outcome;
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use url::Url;

/// Transient layers that can cover the view after it loads.
const OVERLAYS: &[&str] = &[
    "#didomi-host",
    "[role='dialog']",
    ".modal-backdrop",
    ".cdk-overlay-container",
    "[class*='overlay']",
    "[class*='popup']",
];

static ROSTER_LINKS: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "roster-link",
        vec![
            Strategy::css("a[href*='/team']"),
            Strategy::text("a, [role='link'], [role='tab']", r"(?i)^(mi )?equipo$|^plantilla$|^team$"),
            Strategy::text("button, li, span, div", r"(?i)^(mi )?equipo$|^plantilla$"),
        ],
    )
});

static MARKET_LINKS: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "market-link",
        vec![
            Strategy::css("a[href*='/market']"),
            Strategy::text("a, [role='link'], [role='tab']", r"(?i)^mercado$|^market$"),
            Strategy::text("button, li, span, div", r"(?i)^mercado( de fichajes)?$"),
        ],
    )
});

fn activation_chain(view: ViewTarget) -> &'static LocatorChain {
    match view {
        ViewTarget::Roster => &ROSTER_LINKS,
        ViewTarget::Market => &MARKET_LINKS,
    }
}

/// Canonical hash route for a view, e.g. `{base}/app/#/league/42/market`.
pub fn view_url(base_url: &str, league_id: &str, view: ViewTarget) -> String {
    format!(
        "{}/app/#/league/{}/{}",
        base_url.trim_end_matches('/'),
        league_id,
        view.route_segment()
    )
}

/// `true` when the hash route of `current` ends in the view's segment.
pub fn is_on_view(current: &str, view: ViewTarget) -> bool {
    let Ok(url) = Url::parse(current) else {
        return false;
    };
    let route = url.fragment().unwrap_or(url.path());
    route
        .split(['?', '&'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .ends_with(&format!("/{}", view.route_segment()))
}

fn find_activation(raw: &[String], view: ViewTarget) -> Option<ElementTarget> {
    let documents = parse_documents(raw);
    activation_chain(view)
        .locate(&documents)
        .map(|located| located.first().clone())
}

pub struct Navigator<'a> {
    driver: &'a dyn Driver,
    config: &'a Config,
}

impl<'a> Navigator<'a> {
    pub fn new(driver: &'a dyn Driver, config: &'a Config) -> Self {
        Self { driver, config }
    }

    /// Navigate to `view`. Never fails: the outcome says whether the view was
    /// reached, and the session stays where it is when nothing worked.
    pub async fn open(&self, view: ViewTarget) -> Outcome<()> {
        let url = view_url(&self.config.base_url, &self.config.league_id, view);

        let direct = self.direct(&url, view).await;
        let reached = match direct {
            Outcome::Success(()) => Outcome::Success(()),
            other => {
                debug!(view = view.as_str(), outcome = other.label(), "direct navigation failed, trying in-page activation");
                self.activate(view).await
            }
        };

        if !reached.is_success() {
            warn!(view = view.as_str(), outcome = reached.label(), "view unreachable");
            return reached;
        }

        self.settle().await;
        info!(view = view.as_str(), "view ready");
        Outcome::Success(())
    }

    async fn direct(&self, url: &str, view: ViewTarget) -> Outcome<()> {
        Outcome::bounded(self.config.navigation_timeout, async {
            self.driver.goto(url).await?;
            // The hash router may bounce us elsewhere (e.g. a league picker)
            let current = self.driver.current_url().await?;
            Ok(is_on_view(&current, view).then_some(()))
        })
        .await
    }

    async fn activate(&self, view: ViewTarget) -> Outcome<()> {
        Outcome::bounded(self.config.navigation_timeout, async {
            let documents = self.driver.documents().await?;
            let Some(target) = find_activation(&documents, view) else {
                return Ok(None);
            };
            debug!(view = view.as_str(), target = %target, "activating view link");
            self.driver.click(&target).await?;
            Ok(Some(()))
        })
        .await
    }

    /// Wait for the network to go quiet, then strip overlays. Both best effort.
    async fn settle(&self) {
        let idle = Outcome::bounded(self.config.idle_timeout, async {
            self.driver
                .wait_for_idle(self.config.idle_timeout)
                .await
                .map(|idle| idle.then_some(()))
        })
        .await;
        debug!(outcome = idle.label(), "view settle");

        match self.driver.remove_elements(OVERLAYS).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "removed overlays"),
            Err(e) => debug!(error = %e, "overlay removal failed"),
        }
    }
}
