// src/services/pipeline.rs
use crate::errors::LeafError;
use crate::models::{
    ChatMessage, ChatPrompt, ChatRole, ClassLabel, LabelSet, Prediction, PredictionResponse,
};
use crate::services::{Classifier, ExplanationService, ImageProcessor};
use actix_web::web;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

const SYSTEM_PROMPT: &str = "You are an expert plant disease assistant.";

/// Per-request decode, classify, explain sequence. Shared read-only across requests.
pub struct DiagnosisPipeline {
    image_processor: ImageProcessor,
    classifier: Arc<dyn Classifier>,
    labels: Arc<LabelSet>,
    explainer: Arc<dyn ExplanationService>,
    crop_name: String,
}

impl DiagnosisPipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        labels: Arc<LabelSet>,
        explainer: Arc<dyn ExplanationService>,
        crop_name: String,
    ) -> Self {
        Self {
            image_processor: ImageProcessor::new(),
            classifier,
            labels,
            explainer,
            crop_name,
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub async fn handle_request(
        &self,
        request_id: Uuid,
        upload: Vec<u8>,
    ) -> Result<PredictionResponse, LeafError> {
        let prediction = self.decode_and_classify(upload).await?;
        info!(
            "[{}] predicted '{}' (index {}, confidence {:.3})",
            request_id, prediction.label, prediction.index, prediction.confidence
        );

        let prompt = build_prompt(&prediction.label, &self.crop_name);
        let explanation = self.explainer.explain(&prompt).await?;
        info!(
            "[{}] explanation received ({} chars)",
            request_id,
            explanation.len()
        );

        Ok(PredictionResponse {
            prediction: prediction.label,
            explanation,
        })
    }

    /// Decoding and inference are both CPU-bound, so they share one blocking task.
    async fn decode_and_classify(&self, upload: Vec<u8>) -> Result<Prediction, LeafError> {
        let processor = self.image_processor;
        let classifier = Arc::clone(&self.classifier);
        let score = web::block(move || {
            let image = processor.decode(&upload)?;
            drop(upload);
            classifier.classify(&image)
        })
        .await
        .map_err(|e| LeafError::Classification(format!("Inference task failed: {}", e)))??;

        let label = self.labels.resolve(score.index)?.clone();
        Ok(Prediction {
            label,
            index: score.index,
            confidence: score.confidence,
        })
    }
}

pub fn build_prompt(label: &ClassLabel, crop_name: &str) -> ChatPrompt {
    ChatPrompt {
        messages: vec![
            ChatMessage {
                role: ChatRole::System,
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: ChatRole::User,
                content: format!(
                    "The model predicted {} disease on {} leaves. Explain this disease and its possible treatments simply.",
                    label, crop_name
                ),
            },
        ],
    }
}
