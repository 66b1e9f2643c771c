use crate::error::{AppError, PipelineError};
use crate::models::display_types::SelectionToken;
use crate::services::classifier::{inference, Classifier};
use crate::services::image_service;
use crate::services::presenter::Presenter;
use crate::services::thumbnail_service::ThumbnailLoader;
use crate::services::wiki_service::Encyclopedia;
use image::DynamicImage;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Picked image -> classification -> Wikipedia lookup -> screen.
pub struct Pipeline<C> {
    classifier: Arc<Mutex<C>>,
    encyclopedia: Arc<dyn Encyclopedia>,
    thumbnails: Arc<dyn ThumbnailLoader>,
    presenter: Presenter,
}

impl<C> Clone for Pipeline<C> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            encyclopedia: self.encyclopedia.clone(),
            thumbnails: self.thumbnails.clone(),
            presenter: self.presenter.clone(),
        }
    }
}

impl<C: Classifier + Send + 'static> Pipeline<C> {
    pub fn new(
        classifier: Arc<Mutex<C>>,
        encyclopedia: Arc<dyn Encyclopedia>,
        thumbnails: Arc<dyn ThumbnailLoader>,
        presenter: Presenter,
    ) -> Self {
        Self {
            classifier,
            encyclopedia,
            thumbnails,
            presenter,
        }
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    /// Runs one selection to completion. `token` comes from
    /// [`Presenter::next_token`] at the moment the user picked the image.
    ///
    /// Only image and model failures are errors. Lookup failures, non-matching
    /// pages and thumbnail failures are logged and leave the screen as it is.
    pub async fn identify(
        &self,
        token: SelectionToken,
        image: DynamicImage,
    ) -> Result<SelectionToken, PipelineError> {
        let (image, data_url) = tokio::task::spawn_blocking(move || {
            let data_url = image_service::to_data_url(&image)?;
            Ok::<_, AppError>((image, data_url))
        })
        .await
        .map_err(|e| {
            PipelineError::Fatal(AppError {
                message: format!("Image encoding task failed: {}", e),
            })
        })?
        .map_err(PipelineError::Fatal)?;

        if !self.presenter.begin_selection(token, data_url) {
            return Ok(token);
        }

        let label = self.classify(image).await?;
        info!(token = token.0, %label, "Identified flower");
        if !self.presenter.show_provisional_title(token, &label) {
            return Ok(token);
        }

        let summary = match self.encyclopedia.fetch_summary(&label).await {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                debug!(%label, "No Wikipedia page in response");
                return Ok(token);
            }
            Err(e) => {
                warn!(%label, error = %e, "Wikipedia lookup failed");
                return Ok(token);
            }
        };

        if !self.presenter.show_summary(token, &summary) {
            return Ok(token);
        }

        if let Some(url) = summary.thumbnail_url.as_deref() {
            if !self.presenter.is_current(token) {
                return Ok(token);
            }
            match self.thumbnails.load(url).await {
                Ok(data_url) => {
                    self.presenter.show_thumbnail(token, data_url);
                }
                Err(e) => warn!(%url, error = %e, "Thumbnail load failed"),
            }
        }

        Ok(token)
    }

    async fn classify(&self, image: DynamicImage) -> Result<String, PipelineError> {
        let classifier = self.classifier.clone();
        let predictions = tokio::task::spawn_blocking(move || {
            let mut guard = classifier.lock().map_err(|e| AppError {
                message: format!("Classifier lock poisoned: {}", e),
            })?;
            guard.classify(&image)
        })
        .await
        .map_err(|e| {
            PipelineError::Fatal(AppError {
                message: format!("Classification task failed: {}", e),
            })
        })?
        .map_err(PipelineError::Fatal)?;

        inference::top_label(&predictions)
            .ok_or_else(|| PipelineError::Fatal("Model failed to process image: no results".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WikiError;
    use crate::models::classify_types::Prediction;
    use crate::models::display_types::DisplayState;
    use crate::models::wiki_types::PageSummary;
    use crate::services::presenter::RecordingSink;
    use crate::services::wiki_service::{parse_summary, WikiClient};
    use async_trait::async_trait;
    use base64::Engine;
    use image::{Rgb, RgbImage};
    use serde_json::{json, Value};

    struct FixedClassifier(Vec<(&'static str, f32)>);

    impl Classifier for FixedClassifier {
        fn classify(&mut self, _image: &DynamicImage) -> Result<Vec<Prediction>, AppError> {
            Ok(self
                .0
                .iter()
                .map(|(name, confidence)| Prediction {
                    class_name: name.to_string(),
                    confidence: *confidence,
                })
                .collect())
        }
    }

    struct BrokenClassifier;

    impl Classifier for BrokenClassifier {
        fn classify(&mut self, _image: &DynamicImage) -> Result<Vec<Prediction>, AppError> {
            Err("Inference failed: bad input".into())
        }
    }

    /// Answers every lookup with the same JSON body and records the titles.
    struct CannedWiki {
        response: Value,
        titles: Mutex<Vec<String>>,
    }

    impl CannedWiki {
        fn new(response: Value) -> Self {
            Self {
                response,
                titles: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Encyclopedia for CannedWiki {
        async fn fetch_summary(&self, title: &str) -> Result<Option<PageSummary>, WikiError> {
            self.titles.lock().unwrap().push(title.to_string());
            Ok(parse_summary(&self.response))
        }
    }

    #[derive(Default)]
    struct RecordingThumbnails {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ThumbnailLoader for RecordingThumbnails {
        async fn load(&self, url: &str) -> Result<String, AppError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(format!("data:image/png;base64,{}", url.len()))
        }
    }

    fn flower() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([220, 30, 60])))
    }

    fn rose_response() -> Value {
        json!({
            "query": {
                "pageids": ["123"],
                "pages": {
                    "123": {
                        "title": "Rose",
                        "extract": "A rose is...",
                        "thumbnail": {"source": "http://x/y.png"}
                    }
                }
            }
        })
    }

    fn pipeline<C: Classifier + Send + 'static>(
        classifier: C,
        wiki: Arc<dyn Encyclopedia>,
        thumbnails: Arc<RecordingThumbnails>,
    ) -> Pipeline<C> {
        let presenter = Presenter::new(Arc::new(RecordingSink::default()));
        Pipeline::new(Arc::new(Mutex::new(classifier)), wiki, thumbnails, presenter)
    }

    async fn identify_next<C: Classifier + Send + 'static>(
        pipeline: &Pipeline<C>,
        image: DynamicImage,
    ) -> Result<SelectionToken, PipelineError> {
        let token = pipeline.presenter().next_token();
        pipeline.identify(token, image).await
    }

    fn shown_width(state: &DisplayState) -> u32 {
        let url = state.image.as_deref().unwrap();
        let b64 = url.strip_prefix("data:image/jpeg;base64,").unwrap();
        let bytes = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
        image::load_from_memory(&bytes).unwrap().width()
    }

    fn only_image(state: &DisplayState) -> bool {
        state.image.is_some()
            && state.body.is_none()
            && state.thumbnail.is_none()
            && state.article_url.is_none()
    }

    #[tokio::test]
    async fn test_full_lookup_updates_screen() {
        let wiki = Arc::new(CannedWiki::new(rose_response()));
        let thumbs = Arc::new(RecordingThumbnails::default());
        let pipeline = pipeline(FixedClassifier(vec![("rose", 0.93), ("tulip", 0.04)]), wiki.clone(), thumbs.clone());

        identify_next(&pipeline, flower()).await.unwrap();

        let state = pipeline.presenter().snapshot();
        assert_eq!(state.title.as_deref(), Some("Rose"));
        assert_eq!(state.body.as_deref(), Some("A rose is..."));
        assert_eq!(*thumbs.urls.lock().unwrap(), vec!["http://x/y.png".to_string()]);
        assert!(state.thumbnail.is_some());
        // Label capitalized before becoming the query key
        assert_eq!(*wiki.titles.lock().unwrap(), vec!["Rose".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_pageids_leaves_provisional_title_only() {
        let wiki = Arc::new(CannedWiki::new(json!({"batchcomplete": "", "query": {}})));
        let thumbs = Arc::new(RecordingThumbnails::default());
        let pipeline = pipeline(FixedClassifier(vec![("lotus", 0.4)]), wiki, thumbs.clone());

        identify_next(&pipeline, flower()).await.unwrap();

        let state = pipeline.presenter().snapshot();
        assert_eq!(state.title.as_deref(), Some("Lotus"));
        assert!(only_image(&state));
        assert!(thumbs.urls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_is_swallowed() {
        let wiki = Arc::new(WikiClient::new("http://127.0.0.1:1/w/api.php"));
        let thumbs = Arc::new(RecordingThumbnails::default());
        let pipeline = pipeline(FixedClassifier(vec![("rose", 0.9)]), wiki, thumbs);

        let result = identify_next(&pipeline, flower()).await;
        assert!(result.is_ok());

        let state = pipeline.presenter().snapshot();
        assert_eq!(state.title.as_deref(), Some("Rose"));
        assert!(only_image(&state));
    }

    #[tokio::test]
    async fn test_no_thumbnail_leaves_thumbnail_unset() {
        let response = json!({
            "query": {"pageids": ["5"], "pages": {"5": {"title": "Lotus", "extract": "Lotus is..."}}}
        });
        let thumbs = Arc::new(RecordingThumbnails::default());
        let pipeline = pipeline(FixedClassifier(vec![("lotus", 0.8)]), Arc::new(CannedWiki::new(response)), thumbs.clone());

        identify_next(&pipeline, flower()).await.unwrap();

        let state = pipeline.presenter().snapshot();
        assert_eq!(state.body.as_deref(), Some("Lotus is..."));
        assert!(state.thumbnail.is_none());
        assert!(thumbs.urls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_input_twice_gives_same_screen() {
        let thumbs = Arc::new(RecordingThumbnails::default());
        let pipeline = pipeline(
            FixedClassifier(vec![("rose", 0.93)]),
            Arc::new(CannedWiki::new(rose_response())),
            thumbs,
        );

        let first_token = identify_next(&pipeline, flower()).await.unwrap();
        let first = pipeline.presenter().snapshot();
        let second_token = identify_next(&pipeline, flower()).await.unwrap();
        let second = pipeline.presenter().snapshot();

        assert_eq!(first, second);
        assert!(second_token > first_token);
    }

    #[tokio::test]
    async fn test_inference_failure_is_fatal() {
        let thumbs = Arc::new(RecordingThumbnails::default());
        let pipeline = pipeline(BrokenClassifier, Arc::new(CannedWiki::new(rose_response())), thumbs);
        let result = identify_next(&pipeline, flower()).await;
        assert!(matches!(result, Err(PipelineError::Fatal(_))));
    }

    #[tokio::test]
    async fn test_empty_results_are_fatal() {
        let thumbs = Arc::new(RecordingThumbnails::default());
        let pipeline = pipeline(FixedClassifier(vec![]), Arc::new(CannedWiki::new(rose_response())), thumbs);
        let result = identify_next(&pipeline, flower()).await;
        assert!(matches!(result, Err(PipelineError::Fatal(_))));
    }

    /// Holds the lookup open until released, so a newer selection can start.
    struct GatedWiki {
        gate: tokio::sync::Notify,
        response: Value,
    }

    #[async_trait]
    impl Encyclopedia for GatedWiki {
        async fn fetch_summary(&self, _title: &str) -> Result<Option<PageSummary>, WikiError> {
            self.gate.notified().await;
            Ok(parse_summary(&self.response))
        }
    }

    #[tokio::test]
    async fn test_stale_lookup_does_not_overwrite_newer_selection() {
        let wiki = Arc::new(GatedWiki {
            gate: tokio::sync::Notify::new(),
            response: rose_response(),
        });
        let thumbs = Arc::new(RecordingThumbnails::default());
        let pipeline = pipeline(FixedClassifier(vec![("rose", 0.9)]), wiki.clone(), thumbs.clone());

        let stale = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { identify_next(&pipeline, flower()).await })
        };
        // Wait until the first run has shown its provisional title
        while pipeline.presenter().snapshot().title.is_none() {
            tokio::task::yield_now().await;
        }

        let newer = pipeline.presenter().next_token();
        assert!(pipeline.presenter().begin_selection(newer, "data:newer".into()));
        wiki.gate.notify_one();
        stale.await.unwrap().unwrap();

        assert!(pipeline.presenter().is_current(newer));
        let state = pipeline.presenter().snapshot();
        assert_eq!(state.image.as_deref(), Some("data:newer"));
        assert!(state.title.is_none());
        assert!(state.body.is_none());
        assert!(thumbs.urls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_later_pick_wins_even_if_earlier_image_is_slower() {
        let thumbs = Arc::new(RecordingThumbnails::default());
        let pipeline = pipeline(
            FixedClassifier(vec![("rose", 0.9)]),
            Arc::new(CannedWiki::new(rose_response())),
            thumbs,
        );

        // Tokens are taken in pick order, before any image work starts
        let large_token = pipeline.presenter().next_token();
        let small_token = pipeline.presenter().next_token();
        assert!(small_token > large_token);

        let large = {
            let pipeline = pipeline.clone();
            let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1500, 1500, Rgb([10, 120, 40])));
            tokio::spawn(async move { pipeline.identify(large_token, image).await })
        };
        let small = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([220, 30, 60])));
        pipeline.identify(small_token, small).await.unwrap();
        large.await.unwrap().unwrap();

        assert!(pipeline.presenter().is_current(small_token));
        let state = pipeline.presenter().snapshot();
        assert_eq!(shown_width(&state), 8);
        assert_eq!(state.title.as_deref(), Some("Rose"));
    }
}
