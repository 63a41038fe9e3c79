//! Deploy control service binary.
//!
//! Serves worker registration and promotion queries.

use tracing::info;
use tracing_subscriber::EnvFilter;

use deploy_control::{ControlConfig, ControlService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("deploy_control=info".parse()?),
        )
        .init();

    info!("deploy control service starting");

    let config = ControlConfig::load()?;

    info!(
        listen_addr = %config.server.listen_addr,
        database = %config.database.target(),
        label = %config.promotion.label,
        "configuration loaded"
    );

    ControlService::new(config).run().await?;

    Ok(())
}
