// src/main.rs - printwatch entry point
use clap::Parser;
use tokio::sync::broadcast;

use printwatch::backend::{bambu::BambuBackend, prusa::PrusaBackend, PrinterBackend};
use printwatch::config::{BackendKind, FleetConfig};
use printwatch::monitor::Monitor;
use printwatch::notify::discord::{WebhookNotifier, WebhookStatusView};
use printwatch::notify::StaticDirectory;

#[derive(Parser, Debug)]
#[command(name = "printwatch", about = "Monitors a fleet of 3D printers and posts status updates")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(default_value = "printers.toml")]
    config: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::info!("Starting printwatch");
    tracing::info!("Loading configuration from: {}", args.config);

    let config = FleetConfig::load(&args.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", args.config, e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    tracing::info!(
        "Monitoring {} printer(s), refresh every {}s, title \"{}\"",
        config.printers.len(),
        config.refresh_interval_seconds,
        config.status_title
    );

    let mut backends: Vec<Box<dyn PrinterBackend>> = Vec::with_capacity(config.printers.len());
    for printer in &config.printers {
        match printer.backend {
            BackendKind::Prusa => {
                tracing::info!("Prusa printer {} at {}", printer.name, printer.host);
                backends.push(Box::new(PrusaBackend::new(printer)?));
            }
            BackendKind::Bambu => {
                backends.push(Box::new(BambuBackend::new(printer)));
            }
        }
    }

    // Open the long-lived push connections before the first pass.
    for backend in &backends {
        backend.start().await;
    }

    let notifier = WebhookNotifier::new(&config.discord.notification_webhook_url)?;
    let view = WebhookStatusView::new(&config.discord.status_webhook_url)?;
    let directory = StaticDirectory::new(&config.mentions);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let mut monitor = Monitor::new(
        config.status_title.clone(),
        config.refresh_interval_seconds,
        backends,
        Box::new(notifier),
        Box::new(view),
        Box::new(directory),
    );

    let monitor_handle = tokio::spawn(async move {
        monitor.run(shutdown_rx).await;
        monitor
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(());

    let monitor = monitor_handle.await?;
    for backend in monitor.backends() {
        backend.shutdown().await;
    }

    Ok(())
}
