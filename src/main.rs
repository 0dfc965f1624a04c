use clap::Parser;
use html2pdf_mcp::{
    install_prometheus_exporter, setup_logging, shutdown_requested, validate_config, Cli, CliRunner,
    Config,
};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting html2pdf-mcp v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;

    // The recorder has to exist before the converter registers its metrics
    if let Some(addr) = config.metrics_listen {
        install_prometheus_exporter(addr)?;
    }

    let cli_runner = CliRunner::new(config);

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel(1);
    let _shutdown_handler = setup_shutdown_handler(shutdown_tx.clone());

    let result = tokio::select! {
        result = cli_runner.run(args.command) => {
            info!("Application completed");
            result
        }
        _ = shutdown_requested(&mut shutdown_rx) => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    info!("Shutting down...");
    cli_runner.converter.cleanup().await;

    if let Err(e) = result {
        error!("Application error: {}", e);
        std::process::exit(1);
    }

    info!("html2pdf-mcp stopped");
    Ok(())
}

async fn load_config(args: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content = tokio::fs::read_to_string(config_path).await?;
        serde_json::from_str(&config_content)?
    } else {
        Config::default()
    };

    args.apply_overrides(&mut config);
    validate_config(&config)?;

    info!("Configuration loaded successfully");
    info!("Default timeout: {}ms", config.default_timeout_ms);
    if let Some(chrome_path) = &config.chrome_path {
        info!("Chrome executable: {}", chrome_path);
    }

    Ok(config)
}

fn setup_shutdown_handler(
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let (mut sigint, mut sigterm) = match (
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
            signal::unix::signal(signal::unix::SignalKind::terminate()),
        ) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }

        let _ = shutdown_tx.send(());
    })
}
