pub mod inference;
pub mod model_manager;

use crate::error::AppError;
use crate::models::classify_types::Prediction;
use image::DynamicImage;

/// Maps an image to predictions ordered by descending confidence.
pub trait Classifier {
    fn classify(&mut self, image: &DynamicImage) -> Result<Vec<Prediction>, AppError>;
}
