mod commands;
mod config;
mod error;
mod logging;
mod models;
mod services;

use commands::flower::TauriSink;
use config::AppConfig;
use services::classifier::model_manager::{FlowerModel, ModelManager};
use services::pipeline::Pipeline;
use services::presenter::Presenter;
use services::thumbnail_service::ThumbnailCache;
use services::wiki_service::WikiClient;
use std::sync::Arc;
use tauri::Manager;
use tracing::info;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    logging::init_tracing();
    let config = AppConfig::from_env();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_window_state::Builder::default().build())
        .setup(move |app| {
            let resource_dir = app.path().resource_dir()?;
            let model_dir = config.resolve_model_dir(resource_dir);

            // Without the model the app has nothing to do
            let model = FlowerModel::load(&model_dir, &config)?;
            let model_manager = ModelManager::new(model_dir, model);

            let cache_dir = app.path().app_cache_dir()?;
            let thumbnails = ThumbnailCache::new(cache_dir.join("thumbnails"));

            let pipeline = Pipeline::new(
                model_manager.get_model_lock(),
                Arc::new(WikiClient::new(config.wiki_endpoint.clone())),
                Arc::new(thumbnails),
                Presenter::new(Arc::new(TauriSink(app.handle().clone()))),
            );

            app.manage(model_manager);
            app.manage(pipeline);
            info!(endpoint = %config.wiki_endpoint, "What Flower ready");

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::flower::identify_flower,
            commands::flower::get_display_state,
            commands::classifier::get_model_status,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
