//! Login state machine.
//!
//! `Init → ConsentDismissed → FormReady → Submitted → Authenticated | Failed`.
//! Consent dismissal is best effort; the two failure transitions
//! (fields never found, still on the login route after submitting) are fatal.

use crate::browser::{Driver, DriverError, ElementTarget};
use crate::config::Config;
use crate::error::RunError;
use crate::locator::{LocatorChain, Role, Strategy, parse_documents};
use crate::models::Credential;
use crate::outcome::Outcome;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// How often the form poll re-reads the page.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound on clicks of the "open login form" control.
const MAX_OPENER_CLICKS: usize = 3;

/// Bound for single fill/click/key operations.
const ACTION_TIMEOUT: Duration = Duration::from_secs(5);

static CONSENT: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "consent",
        vec![
            Strategy::css("#didomi-notice-agree-button"),
            Strategy::css("#onetrust-accept-btn-handler"),
            Strategy::role(
                Role::Button,
                r"(?i)^\s*(aceptar( y cerrar| todo)?|acepto|accept( all)?|agree|de acuerdo|entendido)\s*$",
            ),
            Strategy::css("[class*='consent'] button, [id*='consent'] button"),
        ],
    )
});

static IDENTIFIER: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "identifier",
        vec![
            Strategy::placeholder(r"(?i)email|correo"),
            Strategy::css("input[type='email']"),
            Strategy::css("input[name*='email'], input[id*='email']"),
            Strategy::css("input[autocomplete='username']"),
        ],
    )
});

static SECRET: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "secret",
        vec![
            Strategy::placeholder(r"(?i)contraseña|password"),
            Strategy::css("input[type='password']"),
            Strategy::css("input[autocomplete='current-password']"),
        ],
    )
});

static OPENER: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "login-opener",
        vec![
            Strategy::role(Role::Button, r"(?i)iniciar sesión|entrar|acceder|log ?in|sign ?in"),
            Strategy::role(Role::Link, r"(?i)iniciar sesión|entrar|acceder|log ?in|sign ?in"),
            Strategy::text("[class*='login'], [class*='signin']", r"(?i)iniciar|entrar|login"),
        ],
    )
});

static SUBMIT: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "submit",
        vec![
            Strategy::css("form button[type='submit'], form input[type='submit']"),
            Strategy::css("button[type='submit'], input[type='submit']"),
            Strategy::role(
                Role::Button,
                r"(?i)iniciar sesión|entrar|acceder|continuar|log ?in|sign ?in",
            ),
        ],
    )
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Init,
    ConsentDismissed,
    FormReady,
    Submitted,
    Authenticated,
    Failed,
}

/// Both credential fields, located in the same pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub identifier: ElementTarget,
    pub secret: ElementTarget,
}

/// What one read of the page revealed about the login form.
#[derive(Debug, Default)]
struct FormScan {
    identifier: Option<ElementTarget>,
    secret: Option<ElementTarget>,
    opener: Option<ElementTarget>,
}

impl FormScan {
    fn form(&self) -> Option<LoginForm> {
        Some(LoginForm {
            identifier: self.identifier.clone()?,
            secret: self.secret.clone()?,
        })
    }
}

fn scan_form(raw: &[String]) -> FormScan {
    let documents = parse_documents(raw);
    let identifier = IDENTIFIER.locate(&documents).map(|l| l.first().clone());
    let secret = SECRET.locate(&documents).map(|l| l.first().clone());
    let opener = if identifier.is_none() || secret.is_none() {
        OPENER.locate(&documents).map(|l| l.first().clone())
    } else {
        None
    };
    FormScan {
        identifier,
        secret,
        opener,
    }
}

/// Submit control in the same document as the secret field.
fn find_submit(raw: &[String], document: usize) -> Option<ElementTarget> {
    let html = raw.get(document)?;
    let documents = parse_documents(std::slice::from_ref(html));
    SUBMIT.locate(&documents).map(|located| ElementTarget {
        document,
        css_path: located.first().css_path.clone(),
    })
}

fn find_consent(raw: &[String]) -> Option<ElementTarget> {
    let documents = parse_documents(raw);
    CONSENT.locate(&documents).map(|l| l.first().clone())
}

/// `true` when `current` still points at the login entry point.
///
/// Anything that is not an http(s) page counts as not logged in. A different
/// host never does. Otherwise the path plus hash route are compared, and a
/// `login`/`signin` segment anywhere in the route also counts.
pub fn is_login_route(current: &str, login_url: &str) -> bool {
    let Ok(current) = Url::parse(current) else {
        return true;
    };
    if !matches!(current.scheme(), "http" | "https") {
        return true;
    }
    let Ok(login) = Url::parse(login_url) else {
        return has_login_segment(&current);
    };
    if current.host_str() != login.host_str() {
        return false;
    }

    route(&current) == route(&login) || has_login_segment(&current)
}

fn route(url: &Url) -> String {
    let path = url.path().trim_end_matches('/');
    let fragment = url
        .fragment()
        .unwrap_or_default()
        .trim_start_matches('!')
        .trim_matches('/');
    format!("{path}#{fragment}")
}

fn has_login_segment(url: &Url) -> bool {
    let fragment = url.fragment().unwrap_or_default();
    url.path()
        .split('/')
        .chain(fragment.split(['/', '?']))
        .any(|segment| {
            matches!(
                segment.to_ascii_lowercase().as_str(),
                "login" | "signin" | "sign-in" | "auth"
            )
        })
}

/// Drives one tab through the login flow.
pub struct SessionController<'a> {
    driver: &'a dyn Driver,
    config: &'a Config,
    state: LoginState,
}

impl<'a> SessionController<'a> {
    pub fn new(driver: &'a dyn Driver, config: &'a Config) -> Self {
        Self {
            driver,
            config,
            state: LoginState::Init,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    fn transition(&mut self, next: LoginState) {
        debug!(from = ?self.state, to = ?next, "login state transition");
        self.state = next;
    }

    fn fail(&mut self, error: RunError) -> RunError {
        self.transition(LoginState::Failed);
        error
    }

    /// Run the whole flow. On success the tab is authenticated and the
    /// session cookies are shared by every tab of the same browser.
    pub async fn login(&mut self, credential: &Credential) -> Result<(), RunError> {
        let login_url = self.config.login_url().to_owned();

        let opened = Outcome::bounded(self.config.navigation_timeout, async {
            self.driver.goto(&login_url).await.map(Some)
        })
        .await;
        if !opened.is_success() {
            // Missing fields will surface the problem below
            warn!(url = %login_url, outcome = opened.label(), "login page did not load cleanly");
        }

        let dismissed = self.dismiss_consent().await;
        debug!(outcome = dismissed.label(), "consent dismissal");
        self.transition(LoginState::ConsentDismissed);

        let form = match Outcome::bounded(self.config.auth_timeout, self.wait_for_form()).await {
            Outcome::Success(form) => form,
            other => {
                warn!(outcome = other.label(), "login fields not found");
                return Err(self.fail(RunError::AuthFieldsNotFound));
            }
        };
        debug!(identifier = %form.identifier, secret = %form.secret, "login form located");
        self.transition(LoginState::FormReady);

        self.submit(&form, credential).await;
        self.transition(LoginState::Submitted);

        tokio::time::sleep(self.config.settle_delay).await;
        let idle = Outcome::bounded(self.config.idle_timeout, async {
            self.driver
                .wait_for_idle(self.config.idle_timeout)
                .await
                .map(|idle| idle.then_some(()))
        })
        .await;
        debug!(outcome = idle.label(), "post-login settle");

        let current = match self.driver.current_url().await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "could not read location after login");
                String::new()
            }
        };
        if is_login_route(&current, &login_url) {
            return Err(self.fail(RunError::LoginIncomplete { url: current }));
        }

        self.transition(LoginState::Authenticated);
        info!(url = %current, "login complete");
        Ok(())
    }

    /// Click the first consent control that shows up within the consent budget.
    async fn dismiss_consent(&self) -> Outcome<()> {
        Outcome::bounded(self.config.consent_timeout, async {
            loop {
                let documents = self.driver.documents().await?;
                if let Some(target) = find_consent(&documents) {
                    debug!(target = %target, "dismissing consent banner");
                    self.driver.click(&target).await?;
                    return Ok(Some(()));
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await
    }

    /// Poll until both fields are present, clicking the login opener while
    /// they are not. Runs until found; the caller bounds it.
    async fn wait_for_form(&self) -> Result<Option<LoginForm>, DriverError> {
        let mut opener_clicks = 0;
        loop {
            let scan = match self.driver.documents().await {
                Ok(documents) => scan_form(&documents),
                Err(e) => {
                    debug!(error = %e, "could not read documents while waiting for login form");
                    FormScan::default()
                }
            };

            if let Some(form) = scan.form() {
                return Ok(Some(form));
            }

            if let Some(opener) = scan.opener
                && opener_clicks < MAX_OPENER_CLICKS
            {
                opener_clicks += 1;
                debug!(target = %opener, attempt = opener_clicks, "opening login form");
                if let Err(e) = self.driver.click(&opener).await {
                    debug!(error = %e, "login opener click failed");
                }
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Fill both fields and submit. Failures here are logged; whether the
    /// login took effect is judged by the location afterwards.
    async fn submit(&self, form: &LoginForm, credential: &Credential) {
        let filled = Outcome::bounded(ACTION_TIMEOUT, async {
            self.driver
                .fill(&form.identifier, &credential.identifier)
                .await?;
            self.driver.fill(&form.secret, credential.secret()).await?;
            Ok(Some(()))
        })
        .await;
        if !filled.is_success() {
            warn!(outcome = filled.label(), "could not fill login form");
        }

        let submit = match self.driver.documents().await {
            Ok(documents) => find_submit(&documents, form.secret.document),
            Err(e) => {
                debug!(error = %e, "could not read documents to find submit control");
                None
            }
        };

        if let Some(target) = submit {
            let clicked = Outcome::bounded(ACTION_TIMEOUT, async {
                self.driver.click(&target).await.map(Some)
            })
            .await;
            if clicked.is_success() {
                debug!(target = %target, "login submitted via control");
                return;
            }
            debug!(outcome = clicked.label(), "submit control failed, pressing enter");
        }

        let entered = Outcome::bounded(ACTION_TIMEOUT, async {
            self.driver.press_enter(&form.secret).await.map(Some)
        })
        .await;
        debug!(outcome = entered.label(), "login submitted via enter key");
    }
}
