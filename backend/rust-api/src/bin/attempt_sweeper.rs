use tracing_subscriber::fmt::init;

use kambaz_api::{
    config::Config,
    services::{attempt_service::AttemptService, attempt_sweeper::AttemptSweeper, AppState},
};

/// Standalone sweeper for deployments that run the API with `QUIZ_SWEEPER_INTERVAL_SECS=0`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::load()?;

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri).await?;
    let redis_client = redis::Client::open(config.redis_uri.clone())?;

    let interval = config.quiz.sweeper_interval_secs;
    let app_state = AppState::new(config, mongo_client, redis_client).await?;

    let sweeper = AttemptSweeper::new(AttemptService::new(&app_state), interval);
    sweeper.run().await;

    Ok(())
}
