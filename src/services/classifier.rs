// src/services/classifier.rs
use crate::errors::LeafError;
use crate::models::{ClassScore, DecodedImage, INPUT_SIZE};
use image::RgbImage;
use log::info;
use std::path::Path;
use tract_onnx::prelude::*;

// ViTImageProcessor defaults for google/vit-base-patch16-224.
const MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const STD: [f32; 3] = [0.5, 0.5, 0.5];

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Maps a decoded image to a class index. Implementations must be deterministic.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &DecodedImage) -> Result<ClassScore, LeafError>;
}

pub struct OnnxClassifier {
    model: OnnxPlan,
}

impl OnnxClassifier {
    /// Loads and optimizes the model, then checks it emits one logit per known class.
    pub fn load(path: &Path, num_classes: usize) -> Result<Self, LeafError> {
        let side = INPUT_SIZE as usize;
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| {
                LeafError::ModelLoad(format!("Failed to load ONNX model {}: {}", path.display(), e))
            })?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .map_err(|e| LeafError::ModelLoad(format!("Unexpected model input: {}", e)))?
            .into_optimized()
            .map_err(|e| LeafError::ModelLoad(format!("Failed to optimize ONNX model: {}", e)))?
            .into_runnable()
            .map_err(|e| LeafError::ModelLoad(format!("Failed to make model runnable: {}", e)))?;

        let classifier = Self { model };

        let probe = DecodedImage::new(RgbImage::new(INPUT_SIZE, INPUT_SIZE))?;
        let outputs = classifier
            .logits(&probe)
            .map_err(|e| LeafError::ModelLoad(format!("Probe inference failed: {}", e)))?;
        if outputs.len() != num_classes {
            return Err(LeafError::ModelLoad(format!(
                "model emits {} logits but the label set has {} classes",
                outputs.len(),
                num_classes
            )));
        }

        info!(
            "Loaded classifier from {} ({} classes)",
            path.display(),
            num_classes
        );
        Ok(classifier)
    }

    fn logits(&self, image: &DecodedImage) -> Result<Vec<f32>, LeafError> {
        let side = INPUT_SIZE as usize;
        let tensor: Tensor =
            tract_ndarray::Array4::from_shape_vec((1, 3, side, side), to_chw(image))
                .map_err(|e| LeafError::Classification(format!("Bad input tensor: {}", e)))?
                .into();

        let result = self
            .model
            .run(tvec!(tensor.into()))
            .map_err(|e| LeafError::Classification(format!("Model inference failed: {}", e)))?;

        let output = result
            .first()
            .ok_or_else(|| LeafError::Classification("model produced no outputs".to_string()))?
            .to_array_view::<f32>()
            .map_err(|e| LeafError::Classification(format!("Unexpected output type: {}", e)))?;

        Ok(output.iter().copied().collect())
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, image: &DecodedImage) -> Result<ClassScore, LeafError> {
        let logits = self.logits(image)?;
        top_class(&logits)
    }
}

/// Normalized planar tensor data: all red values, then green, then blue.
pub fn to_chw(image: &DecodedImage) -> Vec<f32> {
    let pixels = image.pixels();
    let plane = (pixels.width() * pixels.height()) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (i, pixel) in pixels.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }

    data
}

/// Argmax over logits with its softmax probability. Non-finite logits are an error.
pub fn top_class(logits: &[f32]) -> Result<ClassScore, LeafError> {
    if let Some(pos) = logits.iter().position(|l| !l.is_finite()) {
        return Err(LeafError::Classification(format!(
            "model produced a non-finite logit at index {}",
            pos
        )));
    }

    let (index, &best) = logits
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .ok_or_else(|| LeafError::Classification("model produced no logits".to_string()))?;

    let denom: f32 = logits.iter().map(|l| (l - best).exp()).sum();

    Ok(ClassScore {
        index,
        confidence: 1.0 / denom,
    })
}
