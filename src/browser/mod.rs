//! Browser seam: the pipeline only talks to the page through [`Driver`].
//!
//! The production implementation is [`chrome::ChromeBrowser`]; tests provide
//! stub drivers that serve fixed HTML.

pub mod chrome;
pub mod errors;

pub use errors::DriverError;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// A browser-addressable element: the document it lives in (0 is the main
/// document, `n` is the `n`-th iframe) and a structural CSS path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTarget {
    pub document: usize,
    pub css_path: String,
}

impl fmt::Display for ElementTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc[{}] {}", self.document, self.css_path)
    }
}

/// One browser tab.
///
/// Every method may suspend on network/DOM activity; callers bound each call
/// with an operation-local timeout.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// Serialized HTML of the main document followed by one entry per iframe.
    /// Cross-origin frames are returned as empty strings so indexes stay
    /// aligned with [`ElementTarget::document`].
    async fn documents(&self) -> Result<Vec<String>, DriverError>;

    async fn click(&self, target: &ElementTarget) -> Result<(), DriverError>;

    async fn fill(&self, target: &ElementTarget, value: &str) -> Result<(), DriverError>;

    /// Send the "confirm" key to an element.
    async fn press_enter(&self, target: &ElementTarget) -> Result<(), DriverError>;

    /// Wait until the page looks network-idle. Returns `false` when the limit
    /// elapsed first.
    async fn wait_for_idle(&self, limit: Duration) -> Result<bool, DriverError>;

    /// Remove every element matching any of `selectors`; returns how many went.
    async fn remove_elements(&self, selectors: &[&str]) -> Result<usize, DriverError>;

    /// Full-page PNG.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Opens tabs that share one authenticated browser context.
#[async_trait]
pub trait TabSource: Send + Sync {
    async fn new_tab(&self) -> Result<Box<dyn Driver>, DriverError>;
}
