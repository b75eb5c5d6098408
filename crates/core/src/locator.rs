//! Ordered fallback strategies for locating login form elements.
//!
//! Okta's login markup changes without notice and is outside our control;
//! a single brittle selector means total failure. Each semantic target
//! (username field, password field, submit control, MFA factor option)
//! therefore carries an ordered chain of strategies tried first-to-last,
//! and resolution only fails once every strategy has been attempted and
//! the cumulative deadline has elapsed.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::driver::{ElementHandle, PageDriver};
use crate::error::{Error, Result};
use crate::wait::{WaitOptions, poll_until};

/// A single element-locating strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Element id attribute.
    Id(String),
    /// Form control name attribute.
    Name(String),
    /// CSS selector.
    Css(String),
    /// XPath matching on visible text or placeholder content.
    XPathText(String),
    /// XPath matching on document structure.
    XPathStructural(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(expr) => write!(f, "id={expr}"),
            Locator::Name(expr) => write!(f, "name={expr}"),
            Locator::Css(expr) => write!(f, "css={expr}"),
            Locator::XPathText(expr) => write!(f, "xpath-text={expr}"),
            Locator::XPathStructural(expr) => write!(f, "xpath={expr}"),
        }
    }
}

/// Ordered strategies for one semantic target.
#[derive(Debug, Clone)]
pub struct LocatorChain {
    pub target: &'static str,
    pub strategies: Vec<Locator>,
}

impl LocatorChain {
    /// The login form's username/identifier input. The `identifier` name
    /// is what the current Okta sign-in widget renders; the rest cover
    /// the classic widget and custom-branded forms.
    pub fn username() -> Self {
        Self {
            target: "username field",
            strategies: vec![
                Locator::Id("okta-signin-username".into()),
                Locator::Name("identifier".into()),
                Locator::Name("username".into()),
                Locator::Css("input[type='text']".into()),
                Locator::Css("input[type='email']".into()),
                Locator::XPathText(
                    "//input[contains(@placeholder, 'Username') or contains(@placeholder, 'username')]"
                        .into(),
                ),
            ],
        }
    }

    pub fn password() -> Self {
        Self {
            target: "password field",
            strategies: vec![
                Locator::Id("okta-signin-password".into()),
                Locator::Name("password".into()),
                Locator::Css("input[type='password']".into()),
                Locator::XPathText(
                    "//input[contains(@placeholder, 'Password') or contains(@placeholder, 'password')]"
                        .into(),
                ),
            ],
        }
    }

    pub fn submit() -> Self {
        Self {
            target: "submit control",
            strategies: vec![
                Locator::Id("okta-signin-submit".into()),
                Locator::Css("button[type='submit']".into()),
                Locator::Css("input[type='submit']".into()),
                Locator::XPathText(
                    "//button[contains(text(), 'Sign in') or contains(text(), 'Sign In') or contains(text(), 'Login')]"
                        .into(),
                ),
            ],
        }
    }

    /// The security-key factor tile on the MFA selection page.
    pub fn mfa_security_key() -> Self {
        Self {
            target: "security key option",
            strategies: vec![
                Locator::XPathText(
                    "//button[contains(text(), 'Security Key') or contains(text(), 'Biometric')]".into(),
                ),
                Locator::Css("button[data-se='webauthn']".into()),
                Locator::XPathStructural(
                    "//span[contains(text(), 'Security Key')]//ancestor::div//button".into(),
                ),
            ],
        }
    }
}

/// One pass over the chain; the first matching strategy wins and later
/// strategies are not attempted.
pub async fn try_once(
    driver: &dyn PageDriver,
    chain: &LocatorChain,
) -> Result<Option<Box<dyn ElementHandle>>> {
    for strategy in &chain.strategies {
        if let Some(element) = driver.find(strategy).await? {
            debug!(target = "oxy", what = chain.target, locator = %strategy, "element resolved");
            return Ok(Some(element));
        }
    }
    Ok(None)
}

/// Resolve `chain` against the live page, retrying the whole chain on
/// every tick until `timeout` elapses.
pub async fn resolve(
    driver: &dyn PageDriver,
    chain: &LocatorChain,
    timeout: Duration,
    interval: Duration,
) -> Result<Box<dyn ElementHandle>> {
    let found = poll_until(WaitOptions::new(timeout, interval), move || {
        try_once(driver, chain)
    })
    .await?;
    found.ok_or_else(|| Error::LocatorNotFound {
        target: chain.target.to_string(),
        ms: timeout.as_millis() as u64,
    })
}
