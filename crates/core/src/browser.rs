//! Isolated Chromium session management over the DevTools protocol.
//!
//! Every acquisition attempt gets a freshly created throwaway profile
//! directory, so a crashed prior session can never poison the next launch
//! with a "profile already in use" failure. The session never shares state
//! with the user's regular browser.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::driver::{ElementHandle, PageDriver};
use crate::error::{Error, Result};
use crate::locator::Locator;

impl From<CdpError> for Error {
    fn from(err: CdpError) -> Self {
        Error::Driver(err.to_string())
    }
}

/// Launch options for one acquisition attempt.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub headless: bool,
    pub launch_timeout: Duration,
}

/// An owned browser instance bound to a unique, disposable profile
/// directory.
///
/// The profile directory is removed when the session is dropped, on every
/// exit path; the browser process itself is reaped by [`close`], and the
/// engine kills it with the child handle if the process is torn down
/// early.
///
/// [`close`]: BrowserSession::close
pub struct BrowserSession {
    browser: Browser,
    page: chromiumoxide::Page,
    events: JoinHandle<()>,
    profile_dir: TempDir,
}

impl BrowserSession {
    pub async fn launch(options: &SessionOptions) -> Result<Self> {
        let profile_dir = TempDir::with_prefix("oxy-profile-")
            .map_err(|e| Error::SessionLaunch(format!("could not create profile dir: {e}")))?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir.path())
            .window_size(1920, 1080)
            .launch_timeout(options.launch_timeout);
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(Error::SessionLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::SessionLaunch(e.to_string()))?;

        // Pump CDP events until the browser goes away.
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                events.abort();
                return Err(Error::SessionLaunch(e.to_string()));
            }
        };

        debug!(
            target = "oxy",
            profile = %profile_dir.path().display(),
            headless = options.headless,
            "browser session launched"
        );

        Ok(Self {
            browser,
            page,
            events,
            profile_dir,
        })
    }

    /// Quit the browser and remove the profile directory.
    ///
    /// Teardown problems are logged rather than propagated: release must
    /// succeed on every exit path, including ones already carrying an
    /// error.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(target = "oxy", error = %e, "browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(target = "oxy", error = %e, "browser did not exit cleanly");
        }
        self.events.abort();
        if let Err(e) = self.profile_dir.close() {
            warn!(target = "oxy", error = %e, "profile dir not removed");
        }
        debug!(target = "oxy", "browser session released");
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<Box<dyn ElementHandle>>> {
        // A lookup miss is a normal outcome here; the resolver polls and
        // falls back, so engine-level "not found" noise maps to `None`.
        let found: Option<Element> = match locator {
            Locator::Id(id) => self.page.find_element(format!("#{id}")).await.ok(),
            Locator::Name(name) => self.page.find_element(format!("[name='{name}']")).await.ok(),
            Locator::Css(css) => self.page.find_element(css.clone()).await.ok(),
            Locator::XPathText(xpath) | Locator::XPathStructural(xpath) => {
                self.page.find_xpath(xpath.clone()).await.ok()
            }
        };

        Ok(found.map(|element| Box::new(CdpElement { element }) as Box<dyn ElementHandle>))
    }

    async fn read_body(&self) -> Result<String> {
        let result = self.page.evaluate("document.body.innerText").await?;
        result
            .into_value::<String>()
            .map_err(|e| Error::Driver(e.to_string()))
    }

    async fn cookie_header(&self) -> Result<String> {
        let cookies = self.page.get_cookies().await?;
        Ok(cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; "))
    }
}

struct CdpElement {
    element: Element,
}

#[async_trait]
impl ElementHandle for CdpElement {
    async fn click(&self) -> Result<()> {
        self.element.click().await?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.element.focus().await?;
        self.element.type_str(text).await?;
        Ok(())
    }
}
