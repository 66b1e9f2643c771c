use crate::error::AppError;
use crate::models::classify_types::Prediction;
use crate::services::classifier::model_manager::OnnxSession;
use image::DynamicImage;
use ndarray::Array4;
use ort::value::Value;

const CROP_PCT: f32 = 0.875;

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

pub fn preprocess_image(img: &DynamicImage, crop_size: u32) -> Result<Array4<f32>, AppError> {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err("Cannot classify an empty image".into());
    }

    // Resize shortest edge to ceil(crop_size / crop_pct), then center crop
    let resize_size = (crop_size as f32 / CROP_PCT).ceil() as u32;
    let (new_w, new_h) = if w < h {
        (resize_size, ((h as f32 / w as f32) * resize_size as f32).round() as u32)
    } else {
        (((w as f32 / h as f32) * resize_size as f32).round() as u32, resize_size)
    };
    let resized = img.resize_exact(new_w, new_h, image::imageops::FilterType::Triangle);

    let crop_x = (new_w.saturating_sub(crop_size)) / 2;
    let crop_y = (new_h.saturating_sub(crop_size)) / 2;
    let cropped = resized.crop_imm(crop_x, crop_y, crop_size, crop_size);
    let rgb = cropped.to_rgb8();

    // HWC u8 -> normalized CHW f32
    let hw = (crop_size * crop_size) as usize;
    let mut data = vec![0f32; 3 * hw];
    for (i, pixel) in rgb.as_raw().chunks_exact(3).enumerate() {
        data[i] = (pixel[0] as f32 / 255.0 - MEAN[0]) / STD[0];
        data[hw + i] = (pixel[1] as f32 / 255.0 - MEAN[1]) / STD[1];
        data[2 * hw + i] = (pixel[2] as f32 / 255.0 - MEAN[2]) / STD[2];
    }

    Array4::from_shape_vec((1, 3, crop_size as usize, crop_size as usize), data).map_err(|e| {
        AppError {
            message: format!("Failed to create tensor: {}", e),
        }
    })
}

pub fn run_inference(
    session: &mut OnnxSession,
    input: Array4<f32>,
    labels: &[String],
) -> Result<Vec<Prediction>, AppError> {
    let input_name = session.inputs()[0].name().to_string();

    let input_tensor = Value::from_array(input).map_err(|e| AppError {
        message: format!("Failed to create tensor value: {}", e),
    })?;

    let outputs = session
        .run(ort::inputs![input_name.as_str() => input_tensor])
        .map_err(|e| AppError {
            message: format!("Inference failed: {}", e),
        })?;

    let output_value = outputs.values().next().ok_or_else(|| AppError {
        message: "Model produced no outputs".to_string(),
    })?;

    let (_, data) = output_value
        .try_extract_tensor::<f32>()
        .map_err(|e| AppError {
            message: format!("Failed to extract output tensor: {}", e),
        })?;

    Ok(rank_predictions(data, labels))
}

/// Softmax over the logits, then confidence-descending order.
pub fn rank_predictions(logits: &[f32], labels: &[String]) -> Vec<Prediction> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();

    let mut indexed: Vec<(usize, f32)> = logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .enumerate()
        .collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    indexed
        .into_iter()
        .map(|(idx, confidence)| Prediction {
            class_name: labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", idx)),
            confidence,
        })
        .collect()
}

/// Label of the best prediction, capitalized. No confidence threshold.
pub fn top_label(predictions: &[Prediction]) -> Option<String> {
    predictions.first().map(|p| capitalize(&p.class_name))
}

/// Upper-cases the first letter of every word and lower-cases the rest.
/// Whitespace and hyphens start a new word.
pub fn capitalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start = true;
    for c in text.chars() {
        if word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        word_start = c.is_whitespace() || c == '-';
    }
    out
}
