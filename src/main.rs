//! lanternd - Lantern IRC daemon.

use anyhow::{Context as _, anyhow};
use lanternd::config::{Config, LogFormat};
use lanternd::network::Gateway;
use lanternd::security::password::hash_password;
use lanternd::state::{Server, ShutdownKind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Time given to connection tasks to flush their closing lines.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let first = args.next();

    // `lanternd --hash <password>` prints an Argon2 hash for config files.
    if first.as_deref() == Some("--hash") {
        let password = args.next().context("usage: lanternd --hash <password>")?;
        let hash = hash_password(&password).map_err(|e| anyhow!("hashing failed: {e}"))?;
        println!("{hash}");
        return Ok(());
    }

    let config_path = PathBuf::from(first.unwrap_or_else(|| "config.toml".to_string()));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    init_tracing(config.logging.format);

    loop {
        info!(
            server = %config.server.name,
            network = %config.server.network,
            sid = %config.server.sid,
            "Starting lanternd"
        );
        let server = Server::new(config, Some(config_path.clone()))?;
        let gateway = Gateway::bind(Arc::clone(&server)).await?;
        let shutdown = server.subscribe_shutdown();

        tokio::select! {
            result = gateway.run() => result?,
            _ = tokio::signal::ctrl_c() => {
                server.shutdown(ShutdownKind::Die, "Terminated");
            }
        }
        let kind = shutdown.borrow().as_ref().map(|s| s.kind);
        tokio::time::sleep(DRAIN_GRACE).await;

        match kind {
            Some(ShutdownKind::Restart) => {
                info!("Restarting");
                config = match Config::load(&config_path) {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        error!(error = %e, "Configuration invalid, keeping the previous one");
                        (*server.config()).clone()
                    }
                };
            }
            _ => {
                info!("Shutdown complete");
                return Ok(());
            }
        }
    }
}
