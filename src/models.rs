// src/models.rs
use crate::errors::LeafError;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Side length of the square input the classifier was trained on.
pub const INPUT_SIZE: u32 = 224;

/// A 224x224 RGB pixel grid ready for classification.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: RgbImage,
}

impl DecodedImage {
    pub fn new(pixels: RgbImage) -> Result<Self, LeafError> {
        if pixels.dimensions() != (INPUT_SIZE, INPUT_SIZE) {
            return Err(LeafError::Decode(format!(
                "expected {}x{} pixels, got {}x{}",
                INPUT_SIZE,
                INPUT_SIZE,
                pixels.width(),
                pixels.height()
            )));
        }
        Ok(Self { pixels })
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

/// One disease category name from the label set loaded at startup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ClassLabel(String);

impl ClassLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Label manifest shipped next to the model weights.
#[derive(Debug, Deserialize)]
struct LabelManifest {
    classes: Vec<String>,
}

/// Ordered class names, indexed by classifier output position.
#[derive(Debug, Clone)]
pub struct LabelSet {
    labels: Vec<ClassLabel>,
}

impl LabelSet {
    pub fn new(names: Vec<String>) -> Result<Self, LeafError> {
        if names.is_empty() {
            return Err(LeafError::ModelLoad("label set is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for name in &names {
            if name.trim().is_empty() {
                return Err(LeafError::ModelLoad("label set contains a blank name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(LeafError::ModelLoad(format!("duplicate label '{}'", name)));
            }
        }

        Ok(Self {
            labels: names.into_iter().map(ClassLabel).collect(),
        })
    }

    pub fn from_manifest_json(json: &str) -> Result<Self, LeafError> {
        let manifest: LabelManifest = serde_json::from_str(json)
            .map_err(|e| LeafError::ModelLoad(format!("Invalid label manifest: {}", e)))?;
        Self::new(manifest.classes)
    }

    /// Maps a classifier output index to its label, rejecting anything out of range.
    pub fn resolve(&self, index: usize) -> Result<&ClassLabel, LeafError> {
        self.labels.get(index).ok_or_else(|| {
            LeafError::Classification(format!(
                "classifier returned index {} but only {} classes are known",
                index,
                self.labels.len()
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassLabel> {
        self.labels.iter()
    }
}

/// Raw classifier output before it is checked against the label set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScore {
    pub index: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub label: ClassLabel,
    pub index: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Role-tagged messages sent to the explanation provider.
#[derive(Debug, Clone, Serialize)]
pub struct ChatPrompt {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub prediction: ClassLabel,
    pub explanation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kiwi_labels() -> LabelSet {
        LabelSet::from_manifest_json(
            r#"{"classes": ["Healthy", "Phaeoroniaceae", "Pseudomonas", "Sunburn"]}"#,
        )
        .unwrap()
    }

    #[test]
    fn resolves_indices_inside_the_label_set() {
        let labels = kiwi_labels();
        assert_eq!(labels.len(), 4);
        assert_eq!(labels.resolve(1).unwrap().as_str(), "Phaeoroniaceae");
        assert_eq!(labels.resolve(3).unwrap().as_str(), "Sunburn");
    }

    #[test]
    fn out_of_range_index_is_a_classification_error() {
        let labels = kiwi_labels();
        let err = labels.resolve(4).unwrap_err();
        assert!(matches!(err, LeafError::Classification(_)));
        assert!(labels.resolve(usize::MAX).is_err());
    }

    #[test]
    fn rejects_empty_and_duplicate_manifests() {
        assert!(matches!(
            LabelSet::from_manifest_json(r#"{"classes": []}"#),
            Err(LeafError::ModelLoad(_))
        ));
        assert!(matches!(
            LabelSet::from_manifest_json(r#"{"classes": ["Sunburn", "Sunburn"]}"#),
            Err(LeafError::ModelLoad(_))
        ));
        assert!(matches!(
            LabelSet::from_manifest_json(r#"{"classes": ["Sunburn", "  "]}"#),
            Err(LeafError::ModelLoad(_))
        ));
        assert!(LabelSet::from_manifest_json("[\"Sunburn\"]").is_err());
    }

    #[test]
    fn decoded_image_must_be_input_sized() {
        assert!(DecodedImage::new(RgbImage::new(INPUT_SIZE, INPUT_SIZE)).is_ok());
        assert!(matches!(
            DecodedImage::new(RgbImage::new(10, 10)),
            Err(LeafError::Decode(_))
        ));
    }

    #[test]
    fn response_serializes_to_prediction_and_explanation() {
        let labels = kiwi_labels();
        let response = PredictionResponse {
            prediction: labels.resolve(1).unwrap().clone(),
            explanation: "This is a fungal condition...".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({
                "prediction": "Phaeoroniaceae",
                "explanation": "This is a fungal condition..."
            })
        );
    }

    #[test]
    fn chat_roles_serialize_lowercase() {
        let msg = ChatMessage {
            role: ChatRole::System,
            content: "hi".to_string(),
        };
        assert_eq!(serde_json::to_value(&msg).unwrap()["role"], "system");
    }
}
