// src/services/mod.rs
pub mod classifier;
pub mod image_processor;
pub mod llm_service;
pub mod pipeline;

pub use classifier::{Classifier, OnnxClassifier};
pub use image_processor::ImageProcessor;
pub use llm_service::{ExplanationService, MistralService};
pub use pipeline::DiagnosisPipeline;
