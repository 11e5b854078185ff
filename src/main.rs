// src/main.rs
use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::info;
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::AppConfig;
use crate::handlers::{health_check, predict};
use crate::models::LabelSet;
use crate::services::{DiagnosisPipeline, MistralService, OnnxClassifier};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<DiagnosisPipeline>,
    max_upload_bytes: usize,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting leafdoc service...");

    let config = AppConfig::from_env()?;
    info!("Loaded configuration: {:?}", config);

    // Model state is loaded before binding so a bad checkpoint never serves traffic.
    let manifest = std::fs::read_to_string(&config.labels_path).with_context(|| {
        format!(
            "failed to read label manifest {}",
            config.labels_path.display()
        )
    })?;
    let labels = Arc::new(LabelSet::from_manifest_json(&manifest)?);
    info!(
        "Label set: {}",
        labels
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let classifier = Arc::new(OnnxClassifier::load(&config.model_path, labels.len())?);
    let explainer = Arc::new(MistralService::new(&config)?);
    let pipeline = DiagnosisPipeline::new(classifier, labels, explainer, config.crop_name.clone());

    let app_state = AppState {
        pipeline: Arc::new(pipeline),
        max_upload_bytes: config.max_upload_bytes,
    };

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .route("/predict", web::post().to(predict))
            .route("/health", web::get().to(health_check))
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("failed to bind {}", config.bind_addr))?
    .run()
    .await?;

    Ok(())
}
