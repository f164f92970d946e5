//! Browser automation module
//!
//! Extraction only needs three capabilities from a browser: load a URL, read
//! the rendered markup and send a key to the page body. They are expressed by
//! the [`BrowserSession`] trait so that the polling and orchestration logic
//! can run against a real headless Chromium or against scripted markup in
//! tests.

mod chrome;
#[cfg(test)]
pub(crate) mod scripted;

pub use chrome::ChromeSessionFactory;

use crate::browser_provisioning::ProvisioningError;
use thiserror::Error;

/// Errors raised by browser sessions
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser process could not be started
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// No usable browser executable is available
    #[error("Browser executable unavailable: {0}")]
    ExecutableUnavailable(#[from] ProvisioningError),

    /// Navigation to a page failed
    #[error("Failed to navigate to {url}: {message}")]
    NavigationFailed { url: String, message: String },

    /// The rendered markup could not be read
    #[error("Failed to read page content: {0}")]
    ContentUnavailable(String),

    /// A synthetic input event could not be delivered
    #[error("Failed to dispatch key '{key}': {message}")]
    InputFailed { key: String, message: String },
}

/// One live page in an isolated browser instance
///
/// Dropping a session releases it: the browser process is terminated and its
/// profile is removed.
pub trait BrowserSession {
    /// Loads `url` and waits until the navigation has finished
    fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Returns the full rendered HTML of the current page
    fn current_markup(&self) -> Result<String, BrowserError>;

    /// Delivers a single key press to the page body
    fn dispatch_key(&self, key: &str) -> Result<(), BrowserError>;
}

/// Opens fresh, independent browser sessions
///
/// Every call must return a session that shares no state with any session
/// opened before it.
pub trait SessionFactory: Send + Sync {
    fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}
