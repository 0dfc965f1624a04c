//! Conversion requests, print parameters and results
//!
//! A [`ConversionRequest`] is what callers send over the wire. It is turned
//! into an engine-neutral [`PrintParams`] before the page is printed, and the
//! outcome is reported as a [`ConversionResult`].

use crate::ConversionError;
use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const DEFAULT_MARGIN: &str = "10mm";
pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 2.0;

/// Paper sizes understood by the converter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum PaperFormat {
    #[default]
    A4,
    A3,
    Letter,
    Legal,
    Tabloid,
}

impl PaperFormat {
    /// Width and height in inches, portrait orientation.
    pub fn dimensions_in(&self) -> (f64, f64) {
        match self {
            PaperFormat::A4 => (8.27, 11.7),
            PaperFormat::A3 => (11.7, 16.54),
            PaperFormat::Letter => (8.5, 11.0),
            PaperFormat::Legal => (8.5, 14.0),
            PaperFormat::Tabloid => (11.0, 17.0),
        }
    }
}

impl std::str::FromStr for PaperFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a4" => Ok(PaperFormat::A4),
            "a3" => Ok(PaperFormat::A3),
            "letter" => Ok(PaperFormat::Letter),
            "legal" => Ok(PaperFormat::Legal),
            "tabloid" => Ok(PaperFormat::Tabloid),
            other => Err(ConversionError::InvalidInput(format!(
                "unknown paper format '{other}' (expected A4, A3, Letter, Legal or Tabloid)"
            ))),
        }
    }
}

/// Arguments of the `convert_html_to_pdf` tool
///
/// Every field is optional on the wire. Empty strings and zero numbers are
/// treated as absent so that clients sending placeholder values get the
/// defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    /// Path to HTML file to convert (absolute or relative to current working directory)
    pub html_path: Option<String>,
    /// HTML content string to convert (alternative to htmlPath)
    pub html_content: Option<String>,
    /// Output PDF file path (default: auto-generated with timestamp in current directory)
    pub output_path: Option<String>,
    /// Paper format, case-insensitive (default: A4)
    #[serde(default, deserialize_with = "deserialize_paper_format")]
    pub format: Option<PaperFormat>,
    /// Use landscape orientation (default: false)
    pub landscape: Option<bool>,
    /// Print background graphics (default: true)
    pub print_background: Option<bool>,
    /// Scale of the webpage rendering (default: 1, range: 0.1 to 2)
    pub scale: Option<f64>,
    /// Top margin (default: 10mm, accepts px, cm, in, mm)
    pub margin_top: Option<String>,
    /// Bottom margin (default: 10mm)
    pub margin_bottom: Option<String>,
    /// Left margin (default: 10mm)
    pub margin_left: Option<String>,
    /// Right margin (default: 10mm)
    pub margin_right: Option<String>,
    /// Display header and footer (default: false)
    pub display_header_footer: Option<bool>,
    /// HTML template for header
    pub header_template: Option<String>,
    /// HTML template for footer
    pub footer_template: Option<String>,
    /// Give any CSS @page size declared in the page priority over format (default: false)
    #[serde(rename = "preferCSSPageSize")]
    pub prefer_css_page_size: Option<bool>,
    /// Wait for network to be idle before generating PDF (default: false)
    pub wait_for_network_idle: Option<bool>,
    /// Maximum time to wait for page load in milliseconds (default: 30000)
    #[serde(default, deserialize_with = "deserialize_timeout_ms")]
    #[schemars(with = "Option<f64>")]
    pub timeout: Option<u64>,
}

fn deserialize_paper_format<'de, D>(deserializer: D) -> Result<Option<PaperFormat>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(format) => format.parse().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Any JSON number of milliseconds. Fractions are rounded; zero, negative
/// and non-finite values fall back to the default.
fn deserialize_timeout_ms<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = Option::deserialize(deserializer)?;
    Ok(value
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map(|ms| ms.round() as u64))
}

/// Where the HTML comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlSource<'a> {
    File(&'a str),
    Inline(&'a str),
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl ConversionRequest {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            html_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn from_content(html: impl Into<String>) -> Self {
        Self {
            html_content: Some(html.into()),
            ..Default::default()
        }
    }

    /// The content source, with `htmlPath` taking precedence when both are set.
    pub fn source(&self) -> Result<HtmlSource<'_>, ConversionError> {
        if let Some(path) = non_empty(&self.html_path) {
            return Ok(HtmlSource::File(path));
        }
        non_empty(&self.html_content)
            .map(HtmlSource::Inline)
            .ok_or(ConversionError::MissingContent)
    }

    pub fn has_both_sources(&self) -> bool {
        non_empty(&self.html_path).is_some() && non_empty(&self.html_content).is_some()
    }

    pub fn timeout_or(&self, default: Duration) -> Duration {
        match self.timeout {
            Some(ms) if ms > 0 => Duration::from_millis(ms),
            _ => default,
        }
    }

    pub fn wait_until(&self) -> WaitUntil {
        if self.wait_for_network_idle.unwrap_or(false) {
            WaitUntil::NetworkIdle
        } else {
            WaitUntil::Load
        }
    }

    /// Translate the request options into print parameters.
    pub fn print_params(&self) -> Result<PrintParams, ConversionError> {
        let scale = match self.scale {
            Some(s) if s != 0.0 => s,
            _ => 1.0,
        };
        if !(MIN_SCALE..=MAX_SCALE).contains(&scale) {
            return Err(ConversionError::InvalidInput(format!(
                "scale must be between {MIN_SCALE} and {MAX_SCALE}, got {scale}"
            )));
        }

        let (paper_width, paper_height) = self.format.unwrap_or_default().dimensions_in();

        Ok(PrintParams {
            paper_width,
            paper_height,
            landscape: self.landscape.unwrap_or(false),
            print_background: self.print_background.unwrap_or(true),
            scale,
            display_header_footer: self.display_header_footer.unwrap_or(false),
            header_template: non_empty(&self.header_template).map(str::to_string),
            footer_template: non_empty(&self.footer_template).map(str::to_string),
            prefer_css_page_size: self.prefer_css_page_size.unwrap_or(false),
            margin_top: margin_or_default(&self.margin_top)?,
            margin_bottom: margin_or_default(&self.margin_bottom)?,
            margin_left: margin_or_default(&self.margin_left)?,
            margin_right: margin_or_default(&self.margin_right)?,
        })
    }
}

/// Page-readiness condition for navigation and content loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The document's load event
    Load,
    /// No in-flight network requests for the configured idle window
    NetworkIdle,
}

/// Engine-neutral print parameters. Lengths are in inches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintParams {
    pub paper_width: f64,
    pub paper_height: f64,
    pub landscape: bool,
    pub print_background: bool,
    pub scale: f64,
    pub display_header_footer: bool,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    pub prefer_css_page_size: bool,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub margin_right: f64,
}

fn margin_or_default(value: &Option<String>) -> Result<f64, ConversionError> {
    parse_length(non_empty(value).unwrap_or(DEFAULT_MARGIN))
}

/// Parse a CSS length (`px`, `in`, `cm`, `mm`, or a bare pixel count) into inches.
pub fn parse_length(value: &str) -> Result<f64, ConversionError> {
    let trimmed = value.trim().to_ascii_lowercase();
    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let pixels_per_unit = match unit {
        "" | "px" => 1.0,
        "in" => 96.0,
        "cm" => 37.8,
        "mm" => 3.78,
        _ => {
            return Err(ConversionError::InvalidInput(format!(
                "unknown unit in length '{value}' (expected px, in, cm or mm)"
            )))
        }
    };

    let number: f64 = number
        .trim()
        .parse()
        .map_err(|_| ConversionError::InvalidInput(format!("invalid length '{value}'")))?;
    if !number.is_finite() || number < 0.0 {
        return Err(ConversionError::InvalidInput(format!("invalid length '{value}'")));
    }

    Ok(number * pixels_per_unit / 96.0)
}

/// Make `path` absolute against `base` and fold `.` and `..` lexically,
/// without touching the filesystem.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// File name used when a request does not name its output.
///
/// ```rust
/// use html2pdf_mcp::default_output_file_name;
/// use std::time::{Duration, UNIX_EPOCH};
///
/// let name = default_output_file_name(UNIX_EPOCH + Duration::from_millis(1_500));
/// assert_eq!(name, "output-1970-01-01T00-00-01-500Z.pdf");
/// ```
pub fn default_output_file_name(started: SystemTime) -> String {
    let timestamp = DateTime::<Utc>::from(started)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("output-{timestamp}.pdf")
}

/// Absolute output path for a request started at `started`.
pub fn resolve_output_path(requested: Option<&str>, cwd: &Path, started: SystemTime) -> PathBuf {
    match requested.filter(|p| !p.is_empty()) {
        Some(path) => absolutize(Path::new(path), cwd),
        None => cwd.join(default_output_file_name(started)),
    }
}

/// Outcome of one conversion
#[derive(Debug, Clone)]
pub enum ConversionResult {
    Success {
        output_path: PathBuf,
        processing_time: Duration,
        /// Size of the written file; absent when it could not be read back
        file_size: Option<u64>,
    },
    Failure {
        error: ConversionError,
        processing_time: Duration,
    },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success { .. })
    }

    pub fn processing_time(&self) -> Duration {
        match self {
            ConversionResult::Success { processing_time, .. }
            | ConversionResult::Failure { processing_time, .. } => *processing_time,
        }
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            ConversionResult::Success { output_path, .. } => Some(output_path),
            ConversionResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ConversionError> {
        match self {
            ConversionResult::Failure { error, .. } => Some(error),
            ConversionResult::Success { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_length_units() {
        assert!(close(parse_length("1in").unwrap(), 1.0));
        assert!(close(parse_length("96px").unwrap(), 1.0));
        assert!(close(parse_length("96").unwrap(), 1.0));
        assert!(close(parse_length("10mm").unwrap(), 37.8 / 96.0));
        assert!(close(parse_length("2.5cm").unwrap(), 2.5 * 37.8 / 96.0));
        assert!(close(parse_length(" 15MM ").unwrap(), 15.0 * 3.78 / 96.0));
    }

    #[test]
    fn test_parse_length_rejects_garbage() {
        assert!(parse_length("10pt").is_err());
        assert!(parse_length("mm").is_err());
        assert!(parse_length("-1in").is_err());
        assert!(parse_length("abc").is_err());
    }

    #[test]
    fn test_print_params_defaults() {
        let params = ConversionRequest::from_content("<p>hi</p>").print_params().unwrap();
        assert_eq!((params.paper_width, params.paper_height), (8.27, 11.7));
        assert!(!params.landscape);
        assert!(params.print_background);
        assert_eq!(params.scale, 1.0);
        assert!(!params.display_header_footer);
        assert!(params.header_template.is_none());
        assert!(!params.prefer_css_page_size);
        for margin in [params.margin_top, params.margin_bottom, params.margin_left, params.margin_right] {
            assert!(close(margin, 37.8 / 96.0));
        }
    }

    #[test]
    fn test_print_params_custom() {
        let request = ConversionRequest {
            format: Some(PaperFormat::Letter),
            landscape: Some(true),
            print_background: Some(false),
            scale: Some(0.8),
            margin_top: Some("1in".into()),
            margin_left: Some("".into()),
            display_header_footer: Some(true),
            header_template: Some("<span class=\"title\"></span>".into()),
            footer_template: Some(String::new()),
            prefer_css_page_size: Some(true),
            ..ConversionRequest::from_content("<p>hi</p>")
        };
        let params = request.print_params().unwrap();
        assert_eq!((params.paper_width, params.paper_height), (8.5, 11.0));
        assert!(params.landscape);
        assert!(!params.print_background);
        assert_eq!(params.scale, 0.8);
        assert!(close(params.margin_top, 1.0));
        assert!(close(params.margin_left, 37.8 / 96.0));
        assert_eq!(params.header_template.as_deref(), Some("<span class=\"title\"></span>"));
        assert!(params.footer_template.is_none());
        assert!(params.prefer_css_page_size);
    }

    #[test]
    fn test_scale_bounds() {
        let mut request = ConversionRequest::from_content("x");
        request.scale = Some(2.5);
        assert!(request.print_params().is_err());
        request.scale = Some(0.05);
        assert!(request.print_params().is_err());
        request.scale = Some(0.0);
        assert_eq!(request.print_params().unwrap().scale, 1.0);
    }

    #[test]
    fn test_source_precedence() {
        assert!(matches!(
            ConversionRequest::default().source(),
            Err(ConversionError::MissingContent)
        ));

        let request = ConversionRequest {
            html_path: Some("a.html".into()),
            html_content: Some("<p></p>".into()),
            ..Default::default()
        };
        assert!(request.has_both_sources());
        assert_eq!(request.source().unwrap(), HtmlSource::File("a.html"));

        let request = ConversionRequest {
            html_path: Some(String::new()),
            html_content: Some("<p></p>".into()),
            ..Default::default()
        };
        assert_eq!(request.source().unwrap(), HtmlSource::Inline("<p></p>"));
    }

    #[test]
    fn test_timeout_and_wait_condition() {
        let mut request = ConversionRequest::from_content("x");
        assert_eq!(request.timeout_or(Duration::from_secs(30)), Duration::from_secs(30));
        request.timeout = Some(0);
        assert_eq!(request.timeout_or(Duration::from_secs(30)), Duration::from_secs(30));
        request.timeout = Some(45_000);
        assert_eq!(request.timeout_or(Duration::from_secs(30)), Duration::from_secs(45));

        assert_eq!(request.wait_until(), WaitUntil::Load);
        request.wait_for_network_idle = Some(true);
        assert_eq!(request.wait_until(), WaitUntil::NetworkIdle);
    }

    #[test]
    fn test_request_wire_names() {
        let request: ConversionRequest = serde_json::from_value(serde_json::json!({
            "htmlPath": "report.html",
            "format": "Tabloid",
            "preferCSSPageSize": true,
            "waitForNetworkIdle": true,
            "marginTop": "15mm",
            "timeout": 45000
        }))
        .unwrap();
        assert_eq!(request.html_path.as_deref(), Some("report.html"));
        assert_eq!(request.format, Some(PaperFormat::Tabloid));
        assert_eq!(request.prefer_css_page_size, Some(true));
        assert_eq!(request.wait_for_network_idle, Some(true));
        assert_eq!(request.margin_top.as_deref(), Some("15mm"));
        assert_eq!(request.timeout, Some(45_000));
    }

    #[test]
    fn test_lenient_format_and_timeout() {
        let request: ConversionRequest = serde_json::from_value(serde_json::json!({
            "htmlContent": "<p>x</p>",
            "format": "letter",
            "timeout": 1500.5
        }))
        .unwrap();
        assert_eq!(request.format, Some(PaperFormat::Letter));
        assert_eq!(request.timeout, Some(1501));

        let request: ConversionRequest = serde_json::from_value(serde_json::json!({
            "format": "",
            "timeout": -5
        }))
        .unwrap();
        assert!(request.format.is_none());
        assert_eq!(request.timeout_or(Duration::from_secs(30)), Duration::from_secs(30));

        let request: ConversionRequest = serde_json::from_value(serde_json::json!({
            "format": null,
            "timeout": null
        }))
        .unwrap();
        assert!(request.format.is_none());
        assert!(request.timeout.is_none());
    }

    #[test]
    fn test_relative_segments_are_folded() {
        let cwd = Path::new("/work");
        assert_eq!(
            absolutize(Path::new("./out/../a.pdf"), cwd),
            PathBuf::from("/work/a.pdf")
        );
        assert_eq!(
            absolutize(Path::new("../shared/./b.pdf"), cwd),
            PathBuf::from("/shared/b.pdf")
        );
        assert_eq!(
            absolutize(Path::new("/tmp/x/../y.pdf"), cwd),
            PathBuf::from("/tmp/y.pdf")
        );
    }

    #[test]
    fn test_output_path_resolution() {
        let cwd = Path::new("/work");
        let started = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);

        let path = resolve_output_path(None, cwd, started);
        assert!(path.is_absolute());
        assert_eq!(path.parent(), Some(cwd));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("output-2023-11-14T22-13-20-123Z.pdf")
        );

        let later = resolve_output_path(None, cwd, started + Duration::from_millis(5));
        assert_ne!(path, later);

        assert_eq!(
            resolve_output_path(Some("out/report.pdf"), cwd, started),
            PathBuf::from("/work/out/report.pdf")
        );
        assert_eq!(
            resolve_output_path(Some("/tmp/a.pdf"), cwd, started),
            PathBuf::from("/tmp/a.pdf")
        );
    }

    #[test]
    fn test_paper_format_from_str() {
        assert_eq!("letter".parse::<PaperFormat>().unwrap(), PaperFormat::Letter);
        assert_eq!("A3".parse::<PaperFormat>().unwrap(), PaperFormat::A3);
        assert!("B5".parse::<PaperFormat>().is_err());
    }
}
