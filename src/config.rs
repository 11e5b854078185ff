// src/config.rs
use crate::errors::LeafError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.mistral.ai/v1/chat/completions";
const DEFAULT_MODEL: &str = "mistral-medium";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MODEL_PATH: &str = "models/kiwi_vit_aug.onnx";
const DEFAULT_LABELS_PATH: &str = "models/kiwi_vit_aug.classes.json";
const DEFAULT_CROP: &str = "kiwi";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub api_url: String,
    pub llm_model: String,
    pub explanation_timeout: Duration,
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub crop_name: String,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
}

// Keeps the API key out of logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_url", &self.api_url)
            .field("llm_model", &self.llm_model)
            .field("explanation_timeout", &self.explanation_timeout)
            .field("model_path", &self.model_path)
            .field("labels_path", &self.labels_path)
            .field("crop_name", &self.crop_name)
            .field("bind_addr", &self.bind_addr)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, LeafError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LeafError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("MISTRAL_API_KEY")
            .ok_or_else(|| LeafError::Config("MISTRAL_API_KEY must be set".to_string()))?;

        let timeout_secs: u64 = parse_or(
            get("EXPLANATION_TIMEOUT_SECS"),
            "EXPLANATION_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(LeafError::Config(
                "EXPLANATION_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let max_upload_bytes: usize =
            parse_or(get("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        if max_upload_bytes == 0 {
            return Err(LeafError::Config(
                "MAX_UPLOAD_BYTES must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            api_url: get("MISTRAL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            llm_model: get("MISTRAL_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            explanation_timeout: Duration::from_secs(timeout_secs),
            model_path: get("MODEL_PATH")
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string())
                .into(),
            labels_path: get("LABELS_PATH")
                .unwrap_or_else(|| DEFAULT_LABELS_PATH.to_string())
                .into(),
            crop_name: get("CROP_NAME").unwrap_or_else(|| DEFAULT_CROP.to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            max_upload_bytes,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, LeafError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| LeafError::Config(format!("{} has an invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = AppConfig::from_lookup(lookup(&[("MISTRAL_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.llm_model, "mistral-medium");
        assert_eq!(config.explanation_timeout, Duration::from_secs(30));
        assert_eq!(config.crop_name, "kiwi");
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, LeafError::Config(_)));

        let blank = AppConfig::from_lookup(lookup(&[("MISTRAL_API_KEY", "  ")]));
        assert!(blank.is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("MISTRAL_API_KEY", "sk-test"),
            ("EXPLANATION_TIMEOUT_SECS", "5"),
            ("MAX_UPLOAD_BYTES", "2048"),
            ("CROP_NAME", "grape"),
            ("MODEL_PATH", "/srv/model.onnx"),
        ]))
        .unwrap();
        assert_eq!(config.explanation_timeout, Duration::from_secs(5));
        assert_eq!(config.max_upload_bytes, 2048);
        assert_eq!(config.crop_name, "grape");
        assert_eq!(config.model_path, PathBuf::from("/srv/model.onnx"));
    }

    #[test]
    fn zero_or_garbage_numbers_are_rejected() {
        for (key, value) in [
            ("EXPLANATION_TIMEOUT_SECS", "0"),
            ("EXPLANATION_TIMEOUT_SECS", "soon"),
            ("MAX_UPLOAD_BYTES", "0"),
            ("MAX_UPLOAD_BYTES", "-1"),
        ] {
            let result =
                AppConfig::from_lookup(lookup(&[("MISTRAL_API_KEY", "sk-test"), (key, value)]));
            assert!(matches!(result, Err(LeafError::Config(_))), "{}={}", key, value);
        }
    }

    #[test]
    fn debug_output_hides_the_api_key() {
        let config = AppConfig::from_lookup(lookup(&[("MISTRAL_API_KEY", "sk-secret")])).unwrap();
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }
}
