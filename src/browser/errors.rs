//! Error types for the browser driver seam.

use thiserror::Error;

/// Errors raised by a [`Driver`](super::Driver) operation.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("could not open tab: {0}")]
    TabOpenFailed(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript evaluation failed: {0}")]
    JsEvalFailed(String),

    #[error("screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("browser connection closed")]
    ConnectionClosed,

    #[error("CDP error: {0}")]
    Cdp(String),
}

impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        DriverError::Cdp(err.to_string())
    }
}
