//! Capability contract for the driven browser engine.
//!
//! The acquisition flow, locator resolution, and token extraction talk to
//! the browser exclusively through these traits. The real implementation
//! lives in [`crate::browser`]; [`crate::testing`] provides mocks so the
//! state machine can be exercised without spawning a browser.

use async_trait::async_trait;

use crate::error::Result;
use crate::locator::Locator;

/// One driven page in a live browser session.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load `url` and wait for the navigation to settle.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// URL currently loaded in the page.
    async fn current_url(&self) -> Result<String>;

    /// Try a single locator strategy. `None` means nothing matches right
    /// now; polling and fallback ordering are the caller's concern.
    async fn find(&self, locator: &Locator) -> Result<Option<Box<dyn ElementHandle>>>;

    /// Visible text of the current page body.
    async fn read_body(&self) -> Result<String>;

    /// Session cookies rendered as a `name=value; name2=value2` request
    /// header, for requests issued outside the browser.
    async fn cookie_header(&self) -> Result<String>;
}

/// A located element that can be interacted with.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    async fn click(&self) -> Result<()>;

    /// Focus the element and type `text` into it.
    async fn type_text(&self, text: &str) -> Result<()>;
}
