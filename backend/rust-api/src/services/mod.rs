use crate::config::Config;
use crate::middlewares::auth::JwtService;
use mongodb::{
    bson::doc,
    options::IndexOptions,
    Client as MongoClient, Database, IndexModel,
};
use redis::aio::ConnectionManager;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
    pub jwt: JwtService,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        let jwt = JwtService::new(&config.jwt_secret);

        Ok(Self {
            config,
            mongo,
            redis,
            jwt,
        })
    }
}

/// Unique keys the services rely on
pub async fn ensure_indexes(mongo: &Database) -> anyhow::Result<()> {
    let unique = || IndexOptions::builder().unique(true).build();

    mongo
        .collection::<mongodb::bson::Document>("users")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    mongo
        .collection::<mongodb::bson::Document>("enrollments")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user": 1, "course": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    mongo
        .collection::<mongodb::bson::Document>("quiz_attempts")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user": 1, "quiz": 1, "attemptNumber": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    mongo
        .collection::<mongodb::bson::Document>("refresh_tokens")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "tokenHash": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    tracing::info!("MongoDB indexes ensured");
    Ok(())
}

pub mod admin_seed;
pub mod assignment_service;
pub mod attempt_service;
pub mod attempt_sweeper;
pub mod auth_service;
pub mod course_service;
pub mod enrollment_service;
pub mod grading;
pub mod module_service;
pub mod question_service;
pub mod quiz_service;
pub mod user_service;
