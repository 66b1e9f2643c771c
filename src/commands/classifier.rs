use crate::error::AppError;
use crate::models::classify_types::ModelStatus;
use crate::services::classifier::model_manager::ModelManager;
use tauri::State;

#[tauri::command]
pub async fn get_model_status(model_manager: State<'_, ModelManager>) -> Result<ModelStatus, AppError> {
    Ok(model_manager.status())
}
