use crate::config::{AppConfig, LABELS_FILE};
use crate::error::AppError;
use crate::models::classify_types::{ModelStatus, Prediction};
use crate::services::classifier::inference;
use crate::services::classifier::Classifier;
use image::DynamicImage;
use ort::session::Session;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub type OnnxSession = Session;

/// The bundled flower classifier: an ONNX Runtime session plus its label table.
pub struct FlowerModel {
    session: OnnxSession,
    labels: Vec<String>,
    crop_size: u32,
}

impl FlowerModel {
    pub fn load(model_dir: &Path, config: &AppConfig) -> Result<Self, AppError> {
        let labels = load_labels(&model_dir.join(LABELS_FILE))?;
        let session = build_session(&model_dir.join(&config.model_file), config.use_gpu)?;
        info!(
            labels = labels.len(),
            model = %model_dir.join(&config.model_file).display(),
            "Flower classifier loaded"
        );
        Ok(Self {
            session,
            labels,
            crop_size: config.crop_size,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Classifier for FlowerModel {
    fn classify(&mut self, image: &DynamicImage) -> Result<Vec<Prediction>, AppError> {
        let tensor = inference::preprocess_image(image, self.crop_size)?;
        let predictions = inference::run_inference(&mut self.session, tensor, &self.labels)?;
        if let Some(top) = predictions.first() {
            debug!(label = %top.class_name, confidence = top.confidence, "Classified image");
        }
        Ok(predictions)
    }
}

/// Shared handle to the loaded model, kept in Tauri state.
#[derive(Clone)]
pub struct ModelManager {
    pub model_dir: PathBuf,
    model: Arc<Mutex<FlowerModel>>,
}

impl ModelManager {
    pub fn new(model_dir: PathBuf, model: FlowerModel) -> Self {
        Self {
            model_dir,
            model: Arc::new(Mutex::new(model)),
        }
    }

    pub fn get_model_lock(&self) -> Arc<Mutex<FlowerModel>> {
        self.model.clone()
    }

    pub fn status(&self) -> ModelStatus {
        match self.model.lock() {
            Ok(model) => ModelStatus {
                ready: true,
                model_dir: self.model_dir.display().to_string(),
                labels: model.labels().len(),
                error: None,
            },
            Err(e) => ModelStatus {
                ready: false,
                model_dir: self.model_dir.display().to_string(),
                labels: 0,
                error: Some(format!("Model lock poisoned: {}", e)),
            },
        }
    }
}

/// Reads labels from a config file's `id2label` map, ordered by class index.
pub fn load_labels(config_path: &Path) -> Result<Vec<String>, AppError> {
    let config_content = std::fs::read_to_string(config_path).map_err(|e| AppError {
        message: format!("Failed to read labels file {}: {}", config_path.display(), e),
    })?;
    parse_labels(&config_content)
}

pub fn parse_labels(content: &str) -> Result<Vec<String>, AppError> {
    let config: serde_json::Value = serde_json::from_str(content).map_err(|e| AppError {
        message: format!("Failed to parse labels JSON: {}", e),
    })?;

    let id2label = config["id2label"].as_object().ok_or_else(|| AppError {
        message: "Labels file missing id2label field".to_string(),
    })?;

    let mut labels: Vec<(usize, String)> = id2label
        .iter()
        .map(|(k, v)| {
            let idx = k.parse::<usize>().map_err(|_| AppError {
                message: format!("Invalid class index in id2label: {}", k),
            })?;
            let label = v.as_str().unwrap_or("unknown").to_string();
            Ok((idx, label))
        })
        .collect::<Result<_, AppError>>()?;
    labels.sort_by_key(|(idx, _)| *idx);

    if labels.is_empty() {
        return Err("Labels file has no classes".into());
    }

    Ok(labels.into_iter().map(|(_, label)| label).collect())
}

fn build_session(model_path: &Path, use_gpu: bool) -> Result<OnnxSession, AppError> {
    if !model_path.exists() {
        return Err(format!("Model file not found: {}", model_path.display()).into());
    }

    let _ = ort::init().with_name("what-flower").commit();

    let mut builder = Session::builder()
        .map_err(|e| AppError { message: format!("Failed to create session builder: {}", e) })?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
        .map_err(|e| AppError { message: format!("Failed to set optimization level: {}", e) })?;

    if use_gpu {
        builder = builder
            .with_execution_providers([
                ort::execution_providers::DirectMLExecutionProvider::default().build(),
                ort::execution_providers::CoreMLExecutionProvider::default().build(),
                ort::execution_providers::CUDAExecutionProvider::default().build(),
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])
            .map_err(|e| AppError { message: format!("Failed to register GPU execution providers: {}", e) })?;
    } else {
        builder = builder
            .with_execution_providers([ort::execution_providers::CPUExecutionProvider::default().build()])
            .map_err(|e| AppError { message: format!("Failed to register CPU execution provider: {}", e) })?;
    }

    builder.commit_from_file(model_path).map_err(|e| AppError {
        message: format!("Failed to load ONNX model: {}", e),
    })
}
