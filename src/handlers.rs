// src/handlers.rs
use crate::{AppState, errors::LeafError};
use actix_multipart::{Field, Multipart};
use actix_web::{HttpResponse, web};
use bytes::BytesMut;
use futures_util::TryStreamExt;
use log::{info, warn};
use uuid::Uuid;

const FILE_FIELD: &str = "file";

pub async fn predict(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, LeafError> {
    let request_id = Uuid::new_v4();

    let upload = read_upload(&mut payload, data.max_upload_bytes).await?;
    info!("[{}] received upload of {} bytes", request_id, upload.len());

    let response = data
        .pipeline
        .handle_request(request_id, upload)
        .await
        .inspect_err(|e| warn!("[{}] prediction failed: {}", request_id, e))?;

    Ok(HttpResponse::Ok().json(&response))
}

pub async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "leafdoc",
        "version": env!("CARGO_PKG_VERSION"),
        "classes": data.pipeline.labels().len()
    }))
}

/// Returns the part named `file`, or else the first part that carries a filename.
async fn read_upload(payload: &mut Multipart, limit: usize) -> Result<Vec<u8>, LeafError> {
    let mut fallback = None;

    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        let disposition = field.content_disposition();
        let is_file_field = disposition.get_name() == Some(FILE_FIELD);
        let has_filename = disposition.get_filename().is_some();

        if is_file_field {
            return read_field(&mut field, limit).await;
        }
        if has_filename && fallback.is_none() {
            fallback = Some(read_field(&mut field, limit).await?);
        } else {
            while field.try_next().await.map_err(malformed)?.is_some() {}
        }
    }

    fallback.ok_or_else(|| {
        LeafError::Validation(format!(
            "No file uploaded; send the image in a '{}' form field",
            FILE_FIELD
        ))
    })
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, LeafError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        if buf.len() + chunk.len() > limit {
            return Err(LeafError::Validation(format!(
                "Upload exceeds the {} byte limit",
                limit
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.to_vec())
}

fn malformed(e: actix_multipart::MultipartError) -> LeafError {
    LeafError::Validation(format!("Malformed multipart body: {}", e))
}
