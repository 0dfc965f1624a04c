use crate::{
    format_bytes, format_duration, run_server, Config, ConversionRequest, ConversionResult,
    PaperFormat, PdfConverter,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "html2pdf-mcp")]
#[command(about = "Convert HTML to PDF with headless Chrome, as an MCP server or from the shell")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Default conversion timeout in milliseconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the convert_html_to_pdf tool over stdio (default)
    Serve,

    /// Convert a single document and exit
    Convert {
        #[arg(short, long, help = "HTML file to convert", conflicts_with = "html")]
        input: Option<PathBuf>,

        #[arg(long, help = "Inline HTML markup to convert")]
        html: Option<String>,

        #[arg(short, long, help = "Output PDF path")]
        output: Option<PathBuf>,

        #[arg(long, help = "Paper format (A4, A3, Letter, Legal, Tabloid)")]
        format: Option<PaperFormat>,

        #[arg(long, help = "Use landscape orientation")]
        landscape: bool,

        #[arg(long, help = "Rendering scale between 0.1 and 2")]
        scale: Option<f64>,

        #[arg(long, help = "Margin applied to all four sides, e.g. 15mm")]
        margin: Option<String>,

        #[arg(long, help = "Wait for network activity to settle before printing")]
        wait_network_idle: bool,
    },

    /// Validate configuration
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub input: Option<PathBuf>,
    pub html: Option<String>,
    pub output: Option<PathBuf>,
    pub format: Option<PaperFormat>,
    pub landscape: bool,
    pub scale: Option<f64>,
    pub margin: Option<String>,
    pub wait_network_idle: bool,
}

impl ConvertOptions {
    pub fn to_request(&self) -> ConversionRequest {
        ConversionRequest {
            html_path: self.input.as_ref().map(|p| p.display().to_string()),
            html_content: self.html.clone(),
            output_path: self.output.as_ref().map(|p| p.display().to_string()),
            format: self.format,
            landscape: self.landscape.then_some(true),
            scale: self.scale,
            margin_top: self.margin.clone(),
            margin_bottom: self.margin.clone(),
            margin_left: self.margin.clone(),
            margin_right: self.margin.clone(),
            wait_for_network_idle: self.wait_network_idle.then_some(true),
            ..Default::default()
        }
    }
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(timeout) = self.timeout {
            config.default_timeout_ms = timeout;
        }
        if let Some(chrome_path) = &self.chrome_path {
            config.chrome_path = Some(chrome_path.clone());
        }
    }
}

pub struct CliRunner {
    pub config: Config,
    pub converter: Arc<PdfConverter>,
}

impl CliRunner {
    pub fn new(config: Config) -> Self {
        let converter = Arc::new(PdfConverter::new(config.clone()));
        Self { config, converter }
    }

    pub async fn run(&self, command: Option<Commands>) -> Result<(), Box<dyn std::error::Error>> {
        match command.unwrap_or(Commands::Serve) {
            Commands::Serve => run_server(self.converter.clone()).await,
            Commands::Convert {
                input,
                html,
                output,
                format,
                landscape,
                scale,
                margin,
                wait_network_idle,
            } => {
                self.run_convert(ConvertOptions {
                    input,
                    html,
                    output,
                    format,
                    landscape,
                    scale,
                    margin,
                    wait_network_idle,
                })
                .await
            }
            Commands::Validate { config } => self.validate_config(config).await,
        }
    }

    pub async fn run_convert(
        &self,
        options: ConvertOptions,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = options.output.as_ref().and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let request = options.to_request();
        match self.converter.convert(&request).await {
            ConversionResult::Success {
                output_path,
                processing_time,
                file_size,
            } => {
                info!("PDF saved to: {}", output_path.display());

                println!("PDF generated successfully:");
                println!("  Output: {}", output_path.display());
                println!("  Duration: {}", format_duration(processing_time));
                match file_size {
                    Some(bytes) => println!("  Size: {}", format_bytes(bytes as usize)),
                    None => println!("  Size: unknown"),
                }
                Ok(())
            }
            ConversionResult::Failure { error, .. } => {
                error!("Failed to convert: {}", error);
                Err(format!("Conversion failed: {error}").into())
            }
        }
    }

    pub async fn validate_config(
        &self,
        config_path: PathBuf,
    ) -> Result<(), Box<dyn std::error::Error>> {
        println!("Validating configuration: {}", config_path.display());

        let config_content = fs::read_to_string(&config_path).await?;
        let config: Config = serde_json::from_str(&config_content)?;
        crate::validate_config(&config)?;

        println!("Configuration is valid:");
        println!(
            "  Chrome path: {}",
            config.chrome_path.as_deref().unwrap_or("(auto-detect)")
        );
        println!("  Default timeout: {}ms", config.default_timeout_ms);
        println!("  Launch timeout: {:?}", config.launch_timeout);
        println!("  Network idle window: {:?}", config.network_idle_window);
        if !config.extra_browser_args.is_empty() {
            println!("  Extra browser args: {}", config.extra_browser_args.join(" "));
        }

        Ok(())
    }
}

/// Resolve when a shutdown is broadcast. A closed channel means no signal
/// handler is running, which is not a request to stop.
pub async fn shutdown_requested(shutdown_rx: &mut broadcast::Receiver<()>) {
    match shutdown_rx.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => {
            warn!("Shutdown channel closed; signals will not stop the process");
            std::future::pending::<()>().await
        }
    }
}

/// Log to stderr; stdout carries the MCP transport.
pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
