use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    #[error("Either htmlPath or htmlContent must be provided")]
    MissingContent,

    #[error("Invalid option: {0}")]
    InvalidInput(String),

    #[error("HTML file not found: {}", .0.display())]
    HtmlNotFound(PathBuf),

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("{stage} timed out after {timeout:?}")]
    Timeout { stage: &'static str, timeout: Duration },

    #[error("PDF generation failed: {0}")]
    RenderFailed(String),

    #[error("Page error: {0}")]
    PageError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Failure taxonomy reported alongside a failed conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Launch,
    Navigation,
    Render,
    Internal,
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::MissingContent | ConversionError::InvalidInput(_) => {
                ErrorKind::Validation
            }
            ConversionError::HtmlNotFound(_) => ErrorKind::NotFound,
            ConversionError::BrowserLaunchFailed(_) => ErrorKind::Launch,
            ConversionError::Navigation(_)
            | ConversionError::Timeout { .. }
            | ConversionError::PageError(_) => ErrorKind::Navigation,
            ConversionError::RenderFailed(_) => ErrorKind::Render,
            ConversionError::ConfigurationError(_)
            | ConversionError::IoError(_)
            | ConversionError::SerializationError(_) => ErrorKind::Internal,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ConversionError::Timeout { .. })
    }
}

impl ErrorKind {
    /// Label used for the `kind` metric dimension and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Launch => "launch",
            ErrorKind::Navigation => "navigation",
            ErrorKind::Render => "render",
            ErrorKind::Internal => "internal",
        }
    }
}

impl From<std::io::Error> for ConversionError {
    fn from(err: std::io::Error) -> Self {
        ConversionError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ConversionError {
    fn from(err: serde_json::Error) -> Self {
        ConversionError::SerializationError(err.to_string())
    }
}
