use crate::error::AppError;
use crate::models::display_types::ImageEdit;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageReader};
use std::io::{Cursor, Read};
use std::path::Path;

const DISPLAY_QUALITY: u8 = 85;
/// Longest edge of the image sent to the webview.
const DISPLAY_MAX_EDGE: u32 = 1024;

/// Opens a picked photo, honours its EXIF orientation and applies the editing step.
pub fn load_picked_image(path: &Path, edit: Option<ImageEdit>) -> Result<DynamicImage, AppError> {
    let mut img = ImageReader::open(path)
        .map_err(|e| AppError {
            message: format!("Failed to open image {}: {}", path.display(), e),
        })?
        .with_guessed_format()
        .map_err(|e| AppError {
            message: format!("Failed to read image {}: {}", path.display(), e),
        })?
        .decode()
        .map_err(|e| AppError {
            message: format!("Failed to decode image {}: {}", path.display(), e),
        })?;

    img.apply_orientation(read_orientation(path));
    apply_edit(img, edit.unwrap_or_default())
}

pub fn apply_edit(img: DynamicImage, edit: ImageEdit) -> Result<DynamicImage, AppError> {
    let (w, h) = (img.width(), img.height());
    let (x, y, cw, ch) = match edit {
        ImageEdit::SquareCenter => {
            let side = w.min(h);
            ((w - side) / 2, (h - side) / 2, side, side)
        }
        ImageEdit::Crop { x, y, width, height } => {
            let x = x.min(w);
            let y = y.min(h);
            (x, y, width.min(w - x), height.min(h - y))
        }
    };

    if cw == 0 || ch == 0 {
        return Err(format!("Crop {}x{} at ({}, {}) is empty for a {}x{} image", cw, ch, x, y, w, h).into());
    }

    Ok(img.crop_imm(x, y, cw, ch))
}

/// Encodes the image as a JPEG data URI for the webview.
pub fn to_data_url(img: &DynamicImage) -> Result<String, AppError> {
    let display = if img.width() > DISPLAY_MAX_EDGE || img.height() > DISPLAY_MAX_EDGE {
        img.resize(DISPLAY_MAX_EDGE, DISPLAY_MAX_EDGE, image::imageops::FilterType::Triangle)
    } else {
        img.clone()
    };

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, DISPLAY_QUALITY);
    DynamicImage::ImageRgb8(display.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| AppError {
            message: format!("Failed to encode image: {}", e),
        })?;

    let b64 = base64::engine::general_purpose::STANDARD.encode(buffer.into_inner());
    Ok(format!("data:image/jpeg;base64,{}", b64))
}

/// EXIF orientation of the file, `NoTransforms` when absent or invalid.
fn read_orientation(path: &Path) -> Orientation {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return Orientation::NoTransforms,
    };

    // First 128KB covers the EXIF header of most files
    let mut header_buf = Vec::with_capacity(128 * 1024);
    if file.take(128 * 1024).read_to_end(&mut header_buf).is_err() {
        return Orientation::NoTransforms;
    }

    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(&header_buf)) {
        Ok(e) => e,
        Err(_) => return Orientation::NoTransforms,
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .and_then(|v| u8::try_from(v).ok())
        .and_then(Orientation::from_exif)
        .unwrap_or(Orientation::NoTransforms)
}
