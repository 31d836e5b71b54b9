#[macro_use]
extern crate rocket;

mod ai;
mod api;
mod auth;
mod config;
mod courses;
mod env;
mod error;
mod models;
mod state;
mod store;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::sync::Arc;

use ai::{ChatCompletionClient, ContentGenerator, CourseSynthesizer};
use api::{
    api_generate_course, api_get_course, api_list_courses, api_list_published_courses,
    bad_request, health, internal_error, not_found, unprocessable_entity,
};
use auth::{SupabaseAuth, unauthorized_api};
use config::{AppConfig, ConfigError, StoreBackend};
use courses::GenerationPolicy;
use error::AppError;
use rocket::{Build, Rocket};
use state::AppState;
use store::{CourseStore, SqliteStore, SupabaseStore};
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Environment error: {0}")]
    Env(#[from] dotenvy::Error),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let environment = env::load_environment()?;
    init_tracing()?;
    environment.log();

    let config = AppConfig::from_env()?;
    let state = build_state(&config).await?;

    let _ = init_rocket(state).launch().await?;
    Ok(())
}

async fn build_state(config: &AppConfig) -> Result<AppState, Error> {
    let http = reqwest::Client::builder().build()?;

    let store: Arc<dyn CourseStore> = match config.store_backend {
        StoreBackend::Supabase => {
            let anon_key = config
                .supabase_anon_key
                .as_deref()
                .ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?;
            Arc::new(SupabaseStore::new(http.clone(), &config.supabase_url, anon_key))
        }
        StoreBackend::Sqlite => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            Arc::new(SqliteStore::connect(database_url).await?)
        }
    };

    let auth = Arc::new(SupabaseAuth::new(
        http.clone(),
        &config.supabase_url,
        &config.supabase_service_key,
    ));

    let synthesizer = match ChatCompletionClient::from_config(http, &config.ai) {
        Some(client) => {
            info!(
                provider = client.provider().name(),
                model = client.model(),
                endpoint = client.endpoint(),
                "AI generator configured"
            );
            CourseSynthesizer::new(Some(Arc::new(client) as Arc<dyn ContentGenerator>))
        }
        None => {
            warn!("AI_API_KEY not set, courses will be generated from mock data");
            CourseSynthesizer::mock_only()
        }
    };

    Ok(AppState {
        store,
        auth,
        synthesizer,
        policy: GenerationPolicy {
            rollback_on_failure: config.rollback_on_failure,
        },
    })
}

pub fn init_rocket(state: AppState) -> Rocket<Build> {
    info!("Starting coursecraft");

    rocket::build()
        .manage(state)
        .mount(
            "/",
            routes![
                api_list_courses,
                api_list_published_courses,
                api_get_course,
                api_generate_course,
                health,
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized_api,
                not_found,
                unprocessable_entity,
                internal_error
            ],
        )
        .attach(TelemetryFairing)
}
