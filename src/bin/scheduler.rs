use std::time::Duration;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use leadflow::{bootstrap, config::AppConfig, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "scheduler",
        database_url = %config.redacted_database_url(),
        interval_secs = config.scheduler_interval_secs,
        batch_size = config.scheduler_batch_size,
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let interval = Duration::from_secs(config.scheduler_interval_secs);
    let wiring = bootstrap::wire(&config, pool)?;

    tokio::select! {
        _ = wiring.scheduler.run(interval) => {}
        _ = signal::ctrl_c() => {
            tracing::info!("scheduler received shutdown signal");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
