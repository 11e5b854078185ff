// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

const CLASSIFICATION_FAILED: &str = "The classifier could not process this image";

#[derive(Error, Debug)]
pub enum LeafError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Explanation error: {0}")]
    Explanation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),
}

impl LeafError {
    fn category(&self) -> &'static str {
        match self {
            LeafError::Validation(_) => "Validation error",
            LeafError::Decode(_) => "Invalid image",
            LeafError::Classification(_) => "Classification error",
            LeafError::Explanation(_) => "Explanation unavailable",
            LeafError::Config(_) => "Configuration error",
            LeafError::ModelLoad(_) => "Model error",
        }
    }
}

impl ResponseError for LeafError {
    fn status_code(&self) -> StatusCode {
        match self {
            LeafError::Validation(_) | LeafError::Decode(_) => StatusCode::BAD_REQUEST,
            LeafError::Explanation(_) => StatusCode::BAD_GATEWAY,
            LeafError::Classification(_) | LeafError::Config(_) | LeafError::ModelLoad(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Inference internals stay in the server log; handlers warn with the full error.
        let message = match self {
            LeafError::Classification(_) => CLASSIFICATION_FAILED.to_string(),
            _ => self.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.category(),
            "message": message
        }))
    }
}
