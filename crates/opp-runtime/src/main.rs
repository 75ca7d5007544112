use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use opp_runtime::{OppRuntime, RuntimeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = RuntimeConfig::from_env()?;
    if config.avs.rounds == 0 {
        info!("Agents run until Ctrl+C");
    }

    let runtime = OppRuntime::new(config)?;
    let report = runtime
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    for agent in &report.agents {
        info!(
            device = %agent.device,
            rounds = agent.rounds,
            changed = agent.changed,
            unchanged = agent.unchanged,
            missing = agent.missing,
            toggles = agent.toggles,
            "Agent summary"
        );
    }
    info!(notifications = report.notifications_total(), "Shutdown complete");

    Ok(())
}
