//! Runtime configuration, read from environment variables.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_WIKI_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_MODEL_FILE: &str = "flower_classifier.onnx";
pub const LABELS_FILE: &str = "labels.json";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Wikipedia `api.php` endpoint
    pub wiki_endpoint: String,
    /// Directory holding the ONNX model and `labels.json`.
    /// `None` means the bundled `models/` resource directory.
    pub model_dir: Option<PathBuf>,
    /// File name of the ONNX model inside `model_dir`
    pub model_file: String,
    /// Square input size expected by the model
    pub crop_size: u32,
    /// Try GPU execution providers before the CPU one
    pub use_gpu: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            wiki_endpoint: DEFAULT_WIKI_ENDPOINT.to_string(),
            model_dir: None,
            model_file: DEFAULT_MODEL_FILE.to_string(),
            crop_size: 224,
            use_gpu: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            wiki_endpoint: lookup("WHAT_FLOWER_WIKI_ENDPOINT")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.wiki_endpoint),
            model_dir: lookup("WHAT_FLOWER_MODEL_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            model_file: lookup("WHAT_FLOWER_MODEL_FILE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.model_file),
            crop_size: lookup("WHAT_FLOWER_CROP_SIZE")
                .and_then(|v| v.parse().ok())
                .filter(|&v: &u32| v > 0)
                .unwrap_or(defaults.crop_size),
            use_gpu: lookup("WHAT_FLOWER_USE_GPU")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.use_gpu),
        }
    }

    /// Model directory, falling back to the given resource directory.
    pub fn resolve_model_dir(&self, resource_dir: PathBuf) -> PathBuf {
        self.model_dir
            .clone()
            .unwrap_or_else(|| resource_dir.join("models"))
    }
}
