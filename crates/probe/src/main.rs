//! Resource Handler Probe - Main Entry Point
//! Sends lines to a TCP service through a ResourceHandler and logs the replies

mod settings;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reshandler_core::{HandlerConfig, ResourceHandler, VERSION};
use reshandler_infra_tcp::{TcpLineOwner, TcpOptions};
use settings::ProbeSettings;

fn init_logging() -> Result<()> {
    let log_format =
        std::env::var("RESHANDLER_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("reshandler=info"))
        .context("Failed to create env filter")?;

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init(),
    }
    Ok(())
}

/// Send `count` probe lines, pausing `interval` between them
async fn run_probes(handler: &ResourceHandler<TcpLineOwner>, settings: &ProbeSettings) -> u32 {
    let mut failures = 0;
    for seq in 1..=settings.count {
        match handler.call("send_line", json!([settings.line])).await {
            Ok(reply) => info!(seq, reply = %reply, "Probe reply"),
            Err(e) => {
                failures += 1;
                warn!(seq, error = %e, kind = %e.kind(), "Probe failed");
            }
        }
        if seq < settings.count {
            tokio::time::sleep(settings.interval).await;
        }
    }
    failures
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    init_logging()?;
    info!("Resource Handler probe v{} starting...", VERSION);

    // 2. Configuration
    let settings = ProbeSettings::from_env()?;
    info!(
        target_addr = %settings.target,
        strategy = %settings.strategy,
        count = settings.count,
        interval_ms = settings.interval.as_millis() as u64,
        "Probe configured"
    );

    // 3. Wiring
    let handler = ResourceHandler::with_config(
        TcpLineOwner::new(),
        TcpOptions::new(settings.target.clone()),
        HandlerConfig::new("tcp-probe").with_strategy(settings.strategy),
    );

    // 4. Probe until done or interrupted
    tokio::select! {
        failures = run_probes(&handler, &settings) => {
            info!(sent = settings.count, failures, "Probing finished");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Shutdown signal received");
        }
    }

    // 5. Release the connection
    if let Err(e) = handler.destroy().await {
        error!(error = %e, "Handler destroy failed");
        return Err(e).context("Failed to destroy resource handler");
    }

    info!("Shutdown complete.");
    Ok(())
}
