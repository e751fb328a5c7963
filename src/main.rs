use std::sync::Arc;

use tracing::{error, info, warn};

use riftsync::config::Config;
use riftsync::db::{self, Repository};
use riftsync::error::AppError;
use riftsync::jobs::{JobQueue, Scheduler, SyncJobHandler};
use riftsync::logging;
use riftsync::riot::RiotClient;
use riftsync::sync::ProfileSynchronizer;

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init() {
        eprintln!("failed to initialize logging: {e}");
    }

    info!("🐙 Starting...");

    if let Err(e) = run().await {
        error!(error = ?e, "🐙 ❌ Fatal error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let pool = db::connect(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    let repo = Repository::new(pool);

    let mut riot = RiotClient::new(
        config.riot_api_key.clone(),
        config.riot_rate_limit_per_second,
        config.ddragon_base_url.clone(),
        config.ddragon_version.clone(),
    );
    if let Some(base_url) = &config.riot_api_base_url {
        riot = riot.with_base_url(base_url.clone());
    }
    riot.start_metrics_logging();

    let sync = ProfileSynchronizer::new(repo.clone(), Arc::new(riot), config.sync.clone());
    let queue = JobQueue::new(repo);
    let scheduler = Arc::new(Scheduler::new(
        queue.clone(),
        Arc::new(SyncJobHandler::new(sync)),
        config.scheduler.clone(),
    ));

    let worker = scheduler.clone().start();
    scheduler.start_metrics_logging();

    for seed in &config.seed_accounts {
        match queue
            .submit_full_sync(&seed.game_name, &seed.tag_line, seed.region)
            .await
        {
            Ok(ack) => info!(
                job_id = ack.job_id,
                deduplicated = ack.deduplicated,
                riot_id = %format!("{}#{}", seed.game_name, seed.tag_line),
                region = %seed.region,
                "🐙 Seed account submitted"
            ),
            Err(e) => warn!(error = ?e, "🐙 ⚠️ Failed to submit seed account"),
        }
    }

    info!("🐙 Running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::Config(format!("failed to listen for shutdown signal: {e}")))?;

    info!("🐙 Shutting down");
    worker.abort();
    Ok(())
}
