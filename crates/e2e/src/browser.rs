//! The browser seam the runner drives
//!
//! [`crate::webdriver`] implements it against a real browser; tests plug in
//! a scripted application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::device::Viewport;
use crate::error::E2eResult;
use crate::locator::Locator;

/// Opaque reference to an element in the current page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

/// Observable state of one matched element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementState {
    pub handle: ElementHandle,
    pub visible: bool,
    pub enabled: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Seconds since the epoch; absent for session cookies
    #[serde(default)]
    pub expiry: Option<u64>,
}

/// One browser session
#[async_trait]
pub trait Browser: Send {
    async fn visit(&mut self, url: &Url) -> E2eResult<()>;

    async fn current_url(&mut self) -> E2eResult<Url>;

    /// Every element currently matching `locator`, in document order
    async fn query(&mut self, locator: &Locator) -> E2eResult<Vec<ElementState>>;

    /// Type into the element, or into the first input inside it
    async fn type_text(&mut self, element: &ElementHandle, text: &str) -> E2eResult<()>;

    async fn clear(&mut self, element: &ElementHandle) -> E2eResult<()>;

    async fn blur(&mut self, element: &ElementHandle) -> E2eResult<()>;

    async fn click(&mut self, element: &ElementHandle) -> E2eResult<()>;

    /// Tick a checkbox; no-op when already checked
    async fn check(&mut self, element: &ElementHandle) -> E2eResult<()>;

    async fn cookie(&mut self, name: &str) -> E2eResult<Option<Cookie>>;

    /// PNG bytes of the viewport
    async fn screenshot(&mut self) -> E2eResult<Vec<u8>>;

    async fn close(&mut self) -> E2eResult<()>;
}

/// Opens a fresh, isolated session per scenario
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, viewport: Viewport) -> E2eResult<Box<dyn Browser>>;
}
