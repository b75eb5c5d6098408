//! The credential acquisition state machine.
//!
//! Drives one browser session from the protected probe URL through login,
//! the human-paced MFA challenge, and the token-bearing re-probe. States
//! advance monotonically forward; `Failed` is reachable from every
//! non-terminal state and always carries a typed cause.

use std::cell::Cell;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::driver::PageDriver;
use crate::error::{Error, Result};
use crate::extract;
use crate::locator::{self, LocatorChain};
use crate::wait::{WaitOptions, poll_until};

/// URL fragments that mark an in-progress login or MFA challenge.
const CHALLENGE_MARKERS: [&str; 4] = ["mfa", "challenge", "login", "verify"];

/// Upper bound for resolving one login form field.
const FIELD_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of interactive credentials. Prompting blocks the flow — a
/// genuine suspension point, not polling. Values must never be persisted
/// or logged.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn username(&self) -> Result<String>;
    async fn password(&self) -> Result<String>;
}

/// Tunables for one acquisition run.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Protected endpoint that echoes request headers. Navigated directly;
    /// the identity provider's redirect decides whether login is required.
    pub probe_url: String,
    /// Pre-seeded username; when absent the [`CredentialSource`] is asked.
    pub username: Option<String>,
    /// Deadline for navigations and probe-content waits.
    pub browser_timeout: Duration,
    /// Deadline for the human MFA step.
    pub mfa_timeout: Duration,
    /// Tick interval for all bounded waits.
    pub poll_interval: Duration,
}

/// States of the acquisition flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Init,
    Navigate,
    CredentialEntry,
    MfaWait,
    Probe,
    Extract,
    Done,
    Failed,
}

impl AuthState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AuthState::Done | AuthState::Failed)
    }
}

pub struct AuthFlow<'a> {
    driver: &'a dyn PageDriver,
    credentials: &'a dyn CredentialSource,
    config: &'a FlowConfig,
    state: AuthState,
}

impl<'a> AuthFlow<'a> {
    pub fn new(
        driver: &'a dyn PageDriver,
        credentials: &'a dyn CredentialSource,
        config: &'a FlowConfig,
    ) -> Self {
        Self {
            driver,
            credentials,
            config,
            state: AuthState::Init,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Drive the machine to a terminal state, returning the token in
    /// `name=value` wire format. Any step failure moves the machine to
    /// `Failed` and aborts the whole attempt.
    pub async fn run(&mut self) -> Result<String> {
        let mut token = None;
        while !self.state.is_terminal() {
            match self.step(&mut token).await {
                Ok(next) => {
                    debug!(target = "oxy", from = ?self.state, to = ?next, "flow transition");
                    self.state = next;
                }
                Err(err) => {
                    self.state = AuthState::Failed;
                    return Err(err);
                }
            }
        }
        token.ok_or_else(|| Error::TokenNotFound("flow finished without a token".into()))
    }

    async fn step(&mut self, token: &mut Option<String>) -> Result<AuthState> {
        match self.state {
            AuthState::Init => self.enter_probe_url().await,
            AuthState::Navigate => self.detect_landing().await,
            AuthState::CredentialEntry => self.submit_credentials().await,
            AuthState::MfaWait => self.await_mfa().await,
            AuthState::Probe => self.reprobe().await,
            AuthState::Extract => {
                *token = Some(extract::token_from_session(self.driver, &self.config.probe_url).await?);
                Ok(AuthState::Done)
            }
            AuthState::Done | AuthState::Failed => {
                unreachable!("step called on a terminal state")
            }
        }
    }

    async fn enter_probe_url(&self) -> Result<AuthState> {
        info!(target = "oxy", url = %self.config.probe_url, "navigating to probe endpoint");
        self.driver
            .navigate(&self.config.probe_url)
            .await
            .map_err(|e| self.probe_error(e.to_string()))?;
        Ok(AuthState::Navigate)
    }

    /// The identity provider's redirect decides where we land: either the
    /// probe content is already visible (session still valid upstream) or
    /// a login form is waiting.
    async fn detect_landing(&self) -> Result<AuthState> {
        let driver = self.driver;
        let chain = LocatorChain::username();
        let chain = &chain;

        let landed = poll_until(self.wait(self.config.browser_timeout), move || async move {
            if probe_body_visible(driver).await? {
                return Ok(Some(AuthState::Probe));
            }
            if locator::try_once(driver, chain).await?.is_some() {
                return Ok(Some(AuthState::CredentialEntry));
            }
            Ok(None)
        })
        .await?;

        landed.ok_or_else(|| {
            self.probe_error("neither probe content nor a login form appeared".into())
        })
    }

    async fn submit_credentials(&self) -> Result<AuthState> {
        let field_timeout = FIELD_TIMEOUT.min(self.config.browser_timeout);
        let interval = self.config.poll_interval;

        let username_field =
            locator::resolve(self.driver, &LocatorChain::username(), field_timeout, interval).await?;
        let password_field =
            locator::resolve(self.driver, &LocatorChain::password(), field_timeout, interval).await?;

        let username = match &self.config.username {
            Some(configured) => configured.clone(),
            None => self.credentials.username().await?,
        };
        let password = self.credentials.password().await?;

        username_field.type_text(&username).await?;
        password_field.type_text(&password).await?;

        let submit =
            locator::resolve(self.driver, &LocatorChain::submit(), field_timeout, interval).await?;
        submit.click().await?;
        info!(target = "oxy", "credentials submitted");

        Ok(AuthState::MfaWait)
    }

    /// Wait for the challenge page to clear. The security-key factor is
    /// pre-selected once when the selection page offers it, so the user
    /// only has to touch the key; everything else is human-paced and the
    /// process just waits, bounded by the MFA deadline.
    async fn await_mfa(&self) -> Result<AuthState> {
        info!(target = "oxy", "complete the MFA challenge in the browser window");

        let driver = self.driver;
        let chain = LocatorChain::mfa_security_key();
        let chain = &chain;
        let auto_selected = Cell::new(false);
        let auto_selected = &auto_selected;

        let cleared = poll_until(self.wait(self.config.mfa_timeout), move || async move {
            let url = driver.current_url().await?;
            if challenge_cleared(&url) {
                return Ok(Some(()));
            }
            if !auto_selected.get() {
                if let Ok(Some(option)) = locator::try_once(driver, chain).await {
                    if option.click().await.is_ok() {
                        auto_selected.set(true);
                        debug!(target = "oxy", "security key factor auto-selected");
                    }
                }
            }
            Ok(None)
        })
        .await?;

        match cleared {
            Some(()) => Ok(AuthState::Probe),
            None => Err(Error::MfaTimeout {
                ms: self.config.mfa_timeout.as_millis() as u64,
            }),
        }
    }

    /// Navigate to the probe endpoint again so the fully authenticated
    /// cookies are attached, and wait for the headers document.
    async fn reprobe(&self) -> Result<AuthState> {
        self.driver
            .navigate(&self.config.probe_url)
            .await
            .map_err(|e| self.probe_error(e.to_string()))?;

        let driver = self.driver;
        let visible = poll_until(self.wait(self.config.browser_timeout), move || async move {
            Ok(probe_body_visible(driver).await?.then_some(()))
        })
        .await?;

        match visible {
            Some(()) => Ok(AuthState::Extract),
            None => Err(self.probe_error("authenticated probe response never appeared".into())),
        }
    }

    fn wait(&self, timeout: Duration) -> WaitOptions {
        WaitOptions::new(timeout, self.config.poll_interval)
    }

    fn probe_error(&self, reason: String) -> Error {
        Error::ProbeNavigation {
            url: self.config.probe_url.clone(),
            reason,
        }
    }
}

/// True once the page body looks like the probe's headers document.
async fn probe_body_visible(driver: &dyn PageDriver) -> Result<bool> {
    let body = driver.read_body().await.unwrap_or_default();
    Ok(extract::parse_headers(&body).is_some())
}

/// The challenge is cleared once the URL no longer matches any marker.
fn challenge_cleared(url: &str) -> bool {
    let lower = url.to_lowercase();
    !CHALLENGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::locator::Locator;
    use crate::testing::{MockDriver, StaticCredentials};

    const PROBE_URL: &str = "https://probe.internal/headers";
    const PROBE_BODY: &str =
        r#"{"headers": {"Accept": "*/*", "Cookie": "_oauth2_proxy=abc123; theme=dark"}}"#;
    const LOGIN_BODY: &str = "Sign in to your organization";

    fn config() -> FlowConfig {
        FlowConfig {
            probe_url: PROBE_URL.to_string(),
            username: None,
            browser_timeout: Duration::from_millis(300),
            mfa_timeout: Duration::from_millis(300),
            poll_interval: Duration::from_millis(10),
        }
    }

    fn login_form(driver: &MockDriver) {
        driver.add_element(Locator::Name("identifier".into()), "username");
        driver.add_element(Locator::Css("input[type='password']".into()), "password");
        driver.add_element(Locator::Css("button[type='submit']".into()), "submit");
    }

    #[tokio::test]
    async fn already_authenticated_session_skips_credential_entry() {
        let driver = MockDriver::new();
        driver.push_body(PROBE_BODY);
        let creds = StaticCredentials::new("unused", "unused");
        let cfg = config();

        let mut flow = AuthFlow::new(&driver, &creds, &cfg);
        let token = flow.run().await.unwrap();

        assert_eq!(token, "_oauth2_proxy=abc123");
        assert_eq!(flow.state(), AuthState::Done);
        // Initial navigation plus the mandatory re-probe, nothing else.
        assert_eq!(driver.navigations(), vec![PROBE_URL.to_string(), PROBE_URL.to_string()]);
        assert!(driver.typed().is_empty());
        assert!(driver.clicks().is_empty());
    }

    #[tokio::test]
    async fn full_login_flow_types_credentials_and_waits_out_mfa() {
        let driver = MockDriver::new();
        login_form(&driver);
        driver.add_element(Locator::Css("button[data-se='webauthn']".into()), "mfa-option");
        driver.push_body(LOGIN_BODY);
        driver.push_body(PROBE_BODY);
        driver.push_url("https://idp.example.com/signin/verify");
        driver.push_url("https://app.internal/home");

        let creds = StaticCredentials::new("ignored", "hunter2");
        let cfg = FlowConfig {
            username: Some("alice@example.com".to_string()),
            ..config()
        };

        let mut flow = AuthFlow::new(&driver, &creds, &cfg);
        let token = flow.run().await.unwrap();

        assert_eq!(token, "_oauth2_proxy=abc123");
        assert_eq!(flow.state(), AuthState::Done);
        assert_eq!(
            driver.typed(),
            vec![
                ("username".to_string(), "alice@example.com".to_string()),
                ("password".to_string(), "hunter2".to_string()),
            ]
        );
        assert_eq!(driver.clicks(), vec!["submit".to_string(), "mfa-option".to_string()]);
        assert_eq!(driver.navigations(), vec![PROBE_URL.to_string(), PROBE_URL.to_string()]);
    }

    #[tokio::test]
    async fn prompted_username_is_used_when_none_configured() {
        let driver = MockDriver::new();
        login_form(&driver);
        driver.push_body(LOGIN_BODY);
        driver.push_body(PROBE_BODY);
        driver.push_url("https://idp.example.com/signin/verify");
        driver.push_url("https://app.internal/home");

        let creds = StaticCredentials::new("bob@example.com", "s3cret");
        let cfg = config();

        let mut flow = AuthFlow::new(&driver, &creds, &cfg);
        flow.run().await.unwrap();

        assert_eq!(
            driver.typed()[0],
            ("username".to_string(), "bob@example.com".to_string())
        );
    }

    #[tokio::test]
    async fn unclearing_challenge_fails_with_mfa_timeout_at_the_deadline() {
        let driver = MockDriver::new();
        login_form(&driver);
        driver.push_body(LOGIN_BODY);
        driver.push_url("https://idp.example.com/signin/verify");

        let creds = StaticCredentials::new("alice", "pw");
        let cfg = config();

        let mut flow = AuthFlow::new(&driver, &creds, &cfg);
        let start = Instant::now();
        let err = flow.run().await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, Error::MfaTimeout { ms: 300 }));
        assert_eq!(flow.state(), AuthState::Failed);
        assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn missing_password_field_fails_with_locator_not_found() {
        let driver = MockDriver::new();
        driver.add_element(Locator::Name("identifier".into()), "username");
        driver.push_body(LOGIN_BODY);

        let creds = StaticCredentials::new("alice", "pw");
        let cfg = config();

        let mut flow = AuthFlow::new(&driver, &creds, &cfg);
        let err = flow.run().await.unwrap_err();

        assert!(
            matches!(err, Error::LocatorNotFound { ref target, .. } if target == "password field")
        );
        assert_eq!(flow.state(), AuthState::Failed);
        // Nothing was typed and no partial submission happened.
        assert!(driver.typed().is_empty());
        assert!(driver.clicks().is_empty());
    }

    #[tokio::test]
    async fn blank_landing_fails_with_probe_navigation() {
        let driver = MockDriver::new();
        driver.push_body("");

        let creds = StaticCredentials::new("alice", "pw");
        let cfg = config();

        let mut flow = AuthFlow::new(&driver, &creds, &cfg);
        let err = flow.run().await.unwrap_err();

        assert!(matches!(err, Error::ProbeNavigation { .. }));
        assert_eq!(flow.state(), AuthState::Failed);
    }

    #[test]
    fn challenge_markers_cover_login_mfa_and_verify_urls() {
        assert!(!challenge_cleared("https://idp.example.com/signin/verify"));
        assert!(!challenge_cleared("https://idp.example.com/login/step-up"));
        assert!(!challenge_cleared("https://idp.example.com/MFA/select"));
        assert!(!challenge_cleared("https://idp.example.com/authn/challenge"));
        assert!(challenge_cleared("https://app.internal/home"));
    }
}
