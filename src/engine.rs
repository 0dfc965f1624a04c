//! Browser engine abstraction
//!
//! The converter talks to the browser through these traits so that the
//! lifecycle and pipeline logic does not depend on a particular DevTools
//! client. [`crate::chrome`] provides the Chromium implementation.

use crate::{ConversionError, PrintParams, WaitUntil};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Starts browser processes.
#[async_trait]
pub trait BrowserEngine: Send + Sync + 'static {
    async fn launch(&self) -> Result<Arc<dyn EngineBrowser>, ConversionError>;
}

/// A running browser process shared by all conversions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineBrowser: Send + Sync {
    /// Whether the DevTools connection to the process is still alive.
    fn is_connected(&self) -> bool;

    /// Open a fresh, isolated page.
    async fn open_surface(&self) -> Result<Box<dyn RenderingSurface>, ConversionError>;

    /// Terminate the browser process.
    async fn close(&self) -> Result<(), ConversionError>;
}

/// A single page owned by one conversion request.
///
/// Implementations apply no timeouts of their own; the pipeline bounds every
/// call with the request deadline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RenderingSurface: Send {
    /// Navigate to `url` and wait for `wait_until`.
    async fn navigate(&mut self, url: &str, wait_until: WaitUntil) -> Result<(), ConversionError>;

    /// Replace the document with `html` and wait for `wait_until`.
    async fn set_content(&mut self, html: &str, wait_until: WaitUntil) -> Result<(), ConversionError>;

    /// Resolve once `document.readyState` is `complete`.
    async fn wait_for_document_complete(&mut self) -> Result<(), ConversionError>;

    /// Print the current document and write the PDF to `output`.
    async fn print_to_pdf(&mut self, params: &PrintParams, output: &Path) -> Result<(), ConversionError>;

    async fn close(&mut self) -> Result<(), ConversionError>;
}
