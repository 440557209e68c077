use axum_extra::extract::cookie::SameSite;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "dev-secret-only-for-local-testing";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_uri: String,
    pub jwt_secret: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub bind_addr: String,
    pub cookie: CookieConfig,
    pub quiz: QuizConfig,
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub secure: bool,
    pub same_site: String,
}

impl CookieConfig {
    pub fn parse_same_site(&self) -> SameSite {
        match self.same_site.to_ascii_lowercase().as_str() {
            "strict" => SameSite::Strict,
            "none" => SameSite::None,
            _ => SameSite::Lax,
        }
    }
}

/// Timing knobs for the quiz-taking flow
#[derive(Debug, Clone, Deserialize)]
pub struct QuizConfig {
    /// Seconds after the deadline during which a submit still keeps its answers
    pub submit_grace_seconds: i64,
    /// Lifetime of a staff preview attempt that has no time limit
    pub preview_ttl_seconds: u64,
    pub sweeper_interval_secs: u64,
}

/// Optional admin account created on startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedConfig {
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), local .env as fallback
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml, overridden by APP__SECTION__KEY variables
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = string_setting(
            &settings,
            "database.mongo_uri",
            "MONGO_URI",
            "mongodb://localhost:27017",
        );
        let mongo_database =
            string_setting(&settings, "database.mongo_database", "MONGO_DATABASE", "kambaz");
        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                match env::var("REDIS_PASSWORD") {
                    Ok(password) => format!("redis://:{}@{}:{}/0", password, host, port),
                    Err(_) => format!("redis://{}:{}/0", host, port),
                }
            });

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ));
            }
            Err(_) => {
                tracing::warn!("Using default JWT secret (dev mode only)");
                DEV_JWT_SECRET.to_string()
            }
        };

        let access_token_ttl_seconds = parsed_setting(
            &settings,
            "auth.access_token_ttl_seconds",
            "JWT_ACCESS_TOKEN_TTL_SECONDS",
            3600,
        );
        let refresh_token_ttl_seconds = parsed_setting(
            &settings,
            "auth.refresh_token_ttl_seconds",
            "JWT_REFRESH_TOKEN_TTL_SECONDS",
            2_592_000,
        );

        let bind_addr = string_setting(&settings, "server.bind_addr", "BIND_ADDR", "0.0.0.0:4000");

        let cookie = CookieConfig {
            secure: parsed_setting(&settings, "cookie.secure", "COOKIE_SECURE", app_env == "prod"),
            same_site: string_setting(&settings, "cookie.same_site", "COOKIE_SAME_SITE", "lax"),
        };

        let quiz = QuizConfig {
            submit_grace_seconds: parsed_setting(
                &settings,
                "quiz.submit_grace_seconds",
                "QUIZ_SUBMIT_GRACE_SECONDS",
                5,
            ),
            preview_ttl_seconds: parsed_setting(
                &settings,
                "quiz.preview_ttl_seconds",
                "QUIZ_PREVIEW_TTL_SECONDS",
                7200,
            ),
            sweeper_interval_secs: parsed_setting(
                &settings,
                "quiz.sweeper_interval_secs",
                "QUIZ_SWEEPER_INTERVAL_SECS",
                30,
            ),
        };

        let seed = SeedConfig {
            admin_username: settings
                .get_string("seed.admin_username")
                .or_else(|_| env::var("ADMIN_USERNAME"))
                .ok()
                .filter(|v| !v.is_empty()),
            admin_password: settings
                .get_string("seed.admin_password")
                .or_else(|_| env::var("ADMIN_PASSWORD"))
                .ok()
                .filter(|v| !v.is_empty()),
        };

        Ok(Config {
            mongo_uri,
            mongo_database,
            redis_uri,
            jwt_secret,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            bind_addr,
            cookie,
            quiz,
            seed,
        })
    }
}

fn string_setting(settings: &config::Config, key: &str, env_key: &str, default: &str) -> String {
    settings
        .get_string(key)
        .or_else(|_| env::var(env_key))
        .unwrap_or_else(|_| default.to_string())
}

fn parsed_setting<T: FromStr>(settings: &config::Config, key: &str, env_key: &str, default: T) -> T {
    settings
        .get_string(key)
        .or_else(|_| env::var(env_key))
        .ok()
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(default)
}
