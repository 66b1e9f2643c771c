use crate::error::AppError;
use crate::models::display_types::{DisplayState, DisplayUpdate, ImageEdit};
use crate::services::classifier::model_manager::FlowerModel;
use crate::services::image_service;
use crate::services::pipeline::Pipeline;
use crate::services::presenter::DisplaySink;
use std::path::PathBuf;
use tauri::{AppHandle, Emitter, State};
use tracing::error;

pub const DISPLAY_EVENT: &str = "display-updated";

/// Forwards presenter updates to the webview.
pub struct TauriSink(pub AppHandle);

impl DisplaySink for TauriSink {
    fn display(&self, update: &DisplayUpdate) {
        let _ = self.0.emit(DISPLAY_EVENT, update);
    }
}

/// Identifies the flower in a picked photo and looks it up on Wikipedia.
///
/// Intermediate states arrive as `display-updated` events; the returned value
/// is the screen once this selection is done (or superseded).
#[tauri::command]
pub async fn identify_flower(
    app: AppHandle,
    pipeline: State<'_, Pipeline<FlowerModel>>,
    path: String,
    edit: Option<ImageEdit>,
) -> Result<DisplayState, AppError> {
    // Taken before any image work so the latest pick always wins
    let token = pipeline.presenter().next_token();

    let path = PathBuf::from(path);
    let image = tokio::task::spawn_blocking(move || image_service::load_picked_image(&path, edit))
        .await
        .map_err(|e| AppError {
            message: format!("Task join failed: {}", e),
        })?;

    let image = match image {
        Ok(image) => image,
        Err(e) => {
            error!(error = %e, "Converting the picked image failed");
            app.exit(1);
            return Err(e);
        }
    };

    if let Err(e) = pipeline.identify(token, image).await {
        error!(error = %e, "Flower classification failed");
        app.exit(1);
        return Err(e.into());
    }

    Ok(pipeline.presenter().snapshot())
}

#[tauri::command]
pub fn get_display_state(pipeline: State<'_, Pipeline<FlowerModel>>) -> DisplayState {
    pipeline.presenter().snapshot()
}
