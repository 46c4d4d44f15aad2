use anyhow::Result;
use logship::{signals, Config, Shipper};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logship=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting logshipd");

    let config = Config::load().await?;
    let shipper = Shipper::from_env();
    signals::install(&shipper, config.stop_timeout())?;

    let mut started = 0usize;
    for job in config.jobs.clone() {
        let name = job.name.clone();
        match shipper.start(job.into_spec()).await {
            Ok(()) => started += 1,
            Err(e) => error!(job = %name, "failed to start configured job: {e}"),
        }
    }
    info!(started, "logshipd running");

    // Termination arrives via the signal handlers, which flush, stop all
    // jobs, and re-deliver the signal.
    std::future::pending::<()>().await;
    Ok(())
}
