//! HTML to PDF conversion pipeline
//!
//! [`PdfConverter`] runs one request end to end: validate the options, borrow
//! the shared browser, open a page of its own, load the HTML, wait until the
//! document is ready, print it to the output path and report the outcome.
//! Every error along the way turns into a [`ConversionResult::Failure`]; the
//! page is closed on every path.

use crate::{
    absolutize, format_bytes, resolve_output_path, BrowserEngine, BrowserManager, ChromeEngine,
    Config, ConversionError, ConversionRequest, ConversionResult, EngineBrowser, HtmlSource,
    Metrics, RenderingSurface,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;

/// Upper bound for closing a page once the conversion is over.
const SURFACE_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Converts HTML documents to PDF files using one shared headless browser.
///
/// # Examples
///
/// ```rust,no_run
/// use html2pdf_mcp::{Config, ConversionRequest, PdfConverter};
///
/// #[tokio::main]
/// async fn main() {
///     let converter = PdfConverter::new(Config::default());
///
///     let request = ConversionRequest {
///         output_path: Some("hello.pdf".to_string()),
///         ..ConversionRequest::from_content("<h1>Hello</h1>")
///     };
///     let result = converter.convert(&request).await;
///     println!("success: {}", result.is_success());
///
///     converter.cleanup().await;
/// }
/// ```
pub struct PdfConverter {
    manager: BrowserManager,
    config: Config,
    metrics: Arc<Metrics>,
}

impl PdfConverter {
    pub fn new(config: Config) -> Self {
        let engine = Arc::new(ChromeEngine::new(config.clone()));
        Self::with_engine(config, engine, Arc::new(Metrics::new()))
    }

    pub fn with_engine(config: Config, engine: Arc<dyn BrowserEngine>, metrics: Arc<Metrics>) -> Self {
        Self {
            manager: BrowserManager::new(engine, metrics.clone()),
            config,
            metrics,
        }
    }

    pub fn manager(&self) -> &BrowserManager {
        &self.manager
    }

    /// Run one conversion. Never fails; errors are reported in the result.
    pub async fn convert(&self, request: &ConversionRequest) -> ConversionResult {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("convert", %request_id);

        self.convert_inner(request).instrument(span).await
    }

    async fn convert_inner(&self, request: &ConversionRequest) -> ConversionResult {
        let started = Instant::now();
        let started_at = SystemTime::now();
        self.metrics.conversion_started();

        let mut surface = None;
        let outcome = self.run_pipeline(request, started_at, &mut surface).await;

        let result = match outcome {
            Ok(output_path) => {
                let file_size = match tokio::fs::metadata(&output_path).await {
                    Ok(meta) => Some(meta.len()),
                    Err(e) => {
                        debug!("Could not stat {}: {}", output_path.display(), e);
                        None
                    }
                };
                let processing_time = started.elapsed();

                info!(
                    path = %output_path.display(),
                    elapsed_ms = processing_time.as_millis() as u64,
                    size = %file_size.map(|b| format_bytes(b as usize)).unwrap_or_else(|| "unknown".into()),
                    "PDF generated"
                );
                self.metrics.record_success(processing_time, file_size);

                ConversionResult::Success {
                    output_path,
                    processing_time,
                    file_size,
                }
            }
            Err(error) => {
                let processing_time = started.elapsed();

                warn!(
                    kind = error.kind().as_str(),
                    elapsed_ms = processing_time.as_millis() as u64,
                    "Conversion failed: {}",
                    error
                );
                self.metrics
                    .record_failure(processing_time, error.kind(), error.is_timeout());

                ConversionResult::Failure {
                    error,
                    processing_time,
                }
            }
        };

        if let Some(surface) = surface {
            release_surface(surface).await;
        }

        result
    }

    async fn run_pipeline(
        &self,
        request: &ConversionRequest,
        started_at: SystemTime,
        surface_slot: &mut Option<Box<dyn RenderingSurface>>,
    ) -> Result<PathBuf, ConversionError> {
        let source = request.source()?;
        if request.has_both_sources() {
            warn!("Both htmlPath and htmlContent supplied, using htmlPath");
        }
        let print_params = request.print_params()?;
        let timeout = request.timeout_or(self.config.default_timeout());
        let cwd = std::env::current_dir()?;

        let browser = self.manager.acquire().await?;

        let deadline = tokio::time::Instant::now() + timeout;
        let surface = surface_slot.insert(open_surface_within(&browser, deadline, timeout).await?);

        let wait_until = request.wait_until();
        match source {
            HtmlSource::File(path) => {
                let html_path = absolutize(Path::new(path), &cwd);
                ensure_file_exists(&html_path).await?;

                let url = Url::from_file_path(&html_path).map_err(|_| {
                    ConversionError::InvalidInput(format!(
                        "cannot build file URL for {}",
                        html_path.display()
                    ))
                })?;
                debug!(%url, ?wait_until, "Loading HTML file");
                within(deadline, timeout, "navigation", surface.navigate(url.as_str(), wait_until)).await?;
            }
            HtmlSource::Inline(html) => {
                debug!(bytes = html.len(), ?wait_until, "Loading inline HTML");
                within(deadline, timeout, "setting content", surface.set_content(html, wait_until)).await?;
            }
        }

        within(
            deadline,
            timeout,
            "document readiness",
            surface.wait_for_document_complete(),
        )
        .await?;

        let output_path = resolve_output_path(request.output_path.as_deref(), &cwd, started_at);
        within(
            deadline,
            timeout,
            "PDF generation",
            surface.print_to_pdf(&print_params, &output_path),
        )
        .await?;

        Ok(output_path)
    }

    /// Close the shared browser. Intended for process shutdown.
    pub async fn cleanup(&self) {
        self.manager.teardown().await;
    }
}

/// Run `fut` unless `deadline` passes first.
async fn within<T>(
    deadline: tokio::time::Instant,
    timeout: Duration,
    stage: &'static str,
    fut: impl Future<Output = Result<T, ConversionError>>,
) -> Result<T, ConversionError> {
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| ConversionError::Timeout { stage, timeout })?
}

/// Open a page unless `deadline` passes first. A page that arrives after the
/// deadline is closed in the background instead of leaking in the browser.
async fn open_surface_within(
    browser: &Arc<dyn EngineBrowser>,
    deadline: tokio::time::Instant,
    timeout: Duration,
) -> Result<Box<dyn RenderingSurface>, ConversionError> {
    let browser = browser.clone();
    let mut opening = tokio::spawn(async move { browser.open_surface().await });

    match tokio::time::timeout_at(deadline, &mut opening).await {
        Ok(joined) => joined.map_err(|e| ConversionError::PageError(e.to_string()))?,
        Err(_) => {
            tokio::spawn(async move {
                if let Ok(Ok(surface)) = opening.await {
                    debug!("Closing page that opened after the deadline");
                    release_surface(surface).await;
                }
            });
            Err(ConversionError::Timeout {
                stage: "opening page",
                timeout,
            })
        }
    }
}

async fn ensure_file_exists(path: &Path) -> Result<(), ConversionError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(ConversionError::InvalidInput(format!(
            "{} is not a file",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ConversionError::HtmlNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Close a page, ignoring failures; the conversion outcome is already decided.
async fn release_surface(mut surface: Box<dyn RenderingSurface>) {
    match tokio::time::timeout(SURFACE_CLOSE_TIMEOUT, surface.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Ignoring page close error: {}", e),
        Err(_) => debug!("Page close timed out after {:?}", SURFACE_CLOSE_TIMEOUT),
    }
}
