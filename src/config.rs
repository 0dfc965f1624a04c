//! Configuration management with serde serialization/deserialization
//!
//! Operator-level settings for the converter: where Chrome lives, how long to
//! wait for it, and the defaults applied to requests that leave them out.
//! Launch flags that keep Chrome headless and container-friendly are fixed and
//! cannot be changed per request.

use crate::ConversionError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Flags every browser launch carries.
///
/// Sandboxing is disabled so the browser starts inside containers and CI
/// runners without extra privileges.
pub const FIXED_BROWSER_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
];

/// Main configuration structure for the converter
///
/// # Examples
///
/// ```rust
/// use html2pdf_mcp::Config;
/// use std::time::Duration;
///
/// let config = Config {
///     network_idle_window: Duration::from_millis(750),
///     ..Default::default()
/// };
/// assert_eq!(config.default_timeout_ms, 30_000);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Additional command-line flags appended after [`FIXED_BROWSER_ARGS`]
    pub extra_browser_args: Vec<String>,

    /// How long to wait for the browser process to come up (default: 20 seconds)
    #[serde(with = "humantime_serde")]
    pub launch_timeout: Duration,

    /// Upper bound for a single DevTools protocol round trip (default: 60 seconds)
    ///
    /// Request timeouts are enforced separately by the pipeline; this only
    /// keeps a wedged protocol call from outliving the browser.
    #[serde(with = "humantime_serde")]
    pub cdp_request_timeout: Duration,

    /// Quiet period with no in-flight requests that counts as network idle
    /// (default: 500ms)
    #[serde(with = "humantime_serde")]
    pub network_idle_window: Duration,

    /// Timeout applied when a request does not carry one (default: 30000ms)
    pub default_timeout_ms: u64,

    /// Address for the Prometheus scrape endpoint (default: disabled)
    pub metrics_listen: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chrome_path: None,
            extra_browser_args: Vec::new(),
            launch_timeout: Duration::from_secs(20),
            cdp_request_timeout: Duration::from_secs(60),
            network_idle_window: Duration::from_millis(500),
            default_timeout_ms: 30_000,
            metrics_listen: None,
        }
    }
}

impl Config {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConversionError> {
    if config.default_timeout_ms == 0 {
        return Err(ConversionError::ConfigurationError(
            "default_timeout_ms must be greater than 0".to_string(),
        ));
    }

    if config.launch_timeout.is_zero() {
        return Err(ConversionError::ConfigurationError(
            "launch_timeout must be greater than 0".to_string(),
        ));
    }

    if config.cdp_request_timeout.is_zero() {
        return Err(ConversionError::ConfigurationError(
            "cdp_request_timeout must be greater than 0".to_string(),
        ));
    }

    if config.network_idle_window.is_zero() {
        return Err(ConversionError::ConfigurationError(
            "network_idle_window must be greater than 0".to_string(),
        ));
    }

    if let Some(path) = &config.chrome_path {
        if path.trim().is_empty() {
            return Err(ConversionError::ConfigurationError(
                "chrome_path must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Chrome command-line arguments for the shared browser process
///
/// ```rust
/// use html2pdf_mcp::{Config, get_chrome_args};
///
/// let args = get_chrome_args(&Config::default());
/// assert!(args.iter().any(|a| a == "--disable-gpu"));
/// ```
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    let mut args: Vec<String> = FIXED_BROWSER_ARGS.iter().map(|a| a.to_string()).collect();

    for arg in &config.extra_browser_args {
        if !args.contains(arg) {
            args.push(arg.clone());
        }
    }

    args
}

pub fn create_browser_config(
    config: &Config,
) -> Result<chromiumoxide::browser::BrowserConfig, ConversionError> {
    use chromiumoxide::browser::BrowserConfig;

    // Unique profile dir so a stale lock from a previous run cannot block launch
    let user_data_dir = std::env::temp_dir().join(format!(
        "html2pdf-chromium-{}-{}",
        std::process::id(),
        uuid::Uuid::new_v4()
    ));

    let mut builder = BrowserConfig::builder()
        .user_data_dir(user_data_dir)
        .launch_timeout(config.launch_timeout)
        .request_timeout(config.cdp_request_timeout)
        .args(get_chrome_args(config));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder
        .build()
        .map_err(ConversionError::BrowserLaunchFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.default_timeout_ms, 30_000);
        assert_eq!(config.network_idle_window, Duration::from_millis(500));
        assert!(config.chrome_path.is_none());
        assert!(config.metrics_listen.is_none());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_chrome_args_carry_fixed_flags() {
        let args = get_chrome_args(&Config::default());
        for flag in FIXED_BROWSER_ARGS {
            assert!(args.contains(&flag.to_string()), "missing {flag}");
        }
        assert_eq!(args.len(), FIXED_BROWSER_ARGS.len());
    }

    #[test]
    fn test_extra_args_are_appended_once() {
        let config = Config {
            extra_browser_args: vec!["--disable-gpu".into(), "--lang=de-DE".into()],
            ..Default::default()
        };
        let args = get_chrome_args(&config);
        assert_eq!(args.iter().filter(|a| *a == "--disable-gpu").count(), 1);
        assert_eq!(args.last().map(String::as_str), Some("--lang=de-DE"));
    }

    #[test]
    fn test_partial_config_file() {
        let config: Config = serde_json::from_str(
            r#"{ "network_idle_window": "1s", "default_timeout_ms": 45000 }"#,
        )
        .unwrap();
        assert_eq!(config.network_idle_window, Duration::from_secs(1));
        assert_eq!(config.default_timeout(), Duration::from_secs(45));
        assert_eq!(config.launch_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = Config { default_timeout_ms: 0, ..Default::default() };
        assert!(validate_config(&config).is_err());

        let config = Config { network_idle_window: Duration::ZERO, ..Default::default() };
        assert!(validate_config(&config).is_err());

        let config = Config { chrome_path: Some("  ".into()), ..Default::default() };
        assert!(validate_config(&config).is_err());
    }
}
