pub mod classifier;
pub mod image_service;
pub mod pipeline;
pub mod presenter;
pub mod thumbnail_service;
pub mod wiki_service;
