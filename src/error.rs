use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error returned across the Tauri command boundary.
#[derive(Debug, Serialize)]
pub struct AppError {
    pub message: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError {
            message: err.to_string(),
        }
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError {
            message: err.to_string(),
        }
    }
}

impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        AppError {
            message: err.to_string(),
        }
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError { message: msg }
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError {
            message: msg.to_string(),
        }
    }
}

/// Failures of the Wikipedia lookup. None of these reach the user; the
/// pipeline logs them and leaves the display as it was.
#[derive(Debug, Error)]
pub enum WikiError {
    #[error("Wikipedia request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Wikipedia returned HTTP {0}")]
    Status(u16),

    #[error("Wikipedia response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Outcome of a failed identification run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Model or image failures the app cannot recover from.
    #[error("{0}")]
    Fatal(AppError),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Fatal(e) => e,
        }
    }
}
