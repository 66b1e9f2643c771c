//! Screen state and the rules for changing it.
//!
//! Every image selection gets a new [`SelectionToken`]. Updates carry the token
//! of the selection that produced them and are dropped once a newer selection
//! has started, so a slow lookup can never overwrite a newer result.

use crate::models::display_types::{DisplayState, DisplayUpdate, SelectionToken};
use crate::models::wiki_types::PageSummary;
use crate::services::classifier::inference::capitalize;
use crate::services::wiki_service::article_url;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Receives the full state after each accepted change.
pub trait DisplaySink: Send + Sync {
    fn display(&self, update: &DisplayUpdate);
}

struct Screen {
    generation: u64,
    state: DisplayState,
}

#[derive(Clone)]
pub struct Presenter {
    screen: Arc<Mutex<Screen>>,
    sink: Arc<dyn DisplaySink>,
}

impl Presenter {
    pub fn new(sink: Arc<dyn DisplaySink>) -> Self {
        Self {
            screen: Arc::new(Mutex::new(Screen {
                generation: 0,
                state: DisplayState::default(),
            })),
            sink,
        }
    }

    /// Reserves the token for a selection the user just made. Every earlier
    /// selection is stale from here on, even before this one has an image.
    pub fn next_token(&self) -> SelectionToken {
        let mut screen = self.lock();
        screen.generation += 1;
        SelectionToken(screen.generation)
    }

    /// Replaces the screen with one showing only the picked image.
    pub fn begin_selection(&self, token: SelectionToken, image: String) -> bool {
        self.apply(token, |state| {
            *state = DisplayState {
                image: Some(image),
                ..DisplayState::default()
            };
        })
    }

    /// Shows the classifier's label before the lookup completes.
    pub fn show_provisional_title(&self, token: SelectionToken, label: &str) -> bool {
        self.apply(token, |state| {
            state.title = Some(label.to_string());
        })
    }

    pub fn show_summary(&self, token: SelectionToken, summary: &PageSummary) -> bool {
        self.apply(token, |state| {
            state.title = Some(capitalize(&summary.title));
            state.body = Some(summary.extract.clone());
            state.article_url = Some(article_url(&summary.title));
        })
    }

    pub fn show_thumbnail(&self, token: SelectionToken, data_url: String) -> bool {
        self.apply(token, |state| {
            state.thumbnail = Some(data_url);
        })
    }

    pub fn is_current(&self, token: SelectionToken) -> bool {
        self.lock().generation == token.0
    }

    pub fn snapshot(&self) -> DisplayState {
        self.lock().state.clone()
    }

    fn apply(&self, token: SelectionToken, change: impl FnOnce(&mut DisplayState)) -> bool {
        let update = {
            let mut screen = self.lock();
            if screen.generation != token.0 {
                debug!(
                    stale = token.0,
                    current = screen.generation,
                    "Discarding update from a superseded selection"
                );
                return false;
            }
            change(&mut screen.state);
            DisplayUpdate {
                token,
                state: screen.state.clone(),
            }
        };
        self.sink.display(&update);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Screen> {
        // State stays consistent even if a sink panicked mid-update
        self.screen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sink that records every update, for tests.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    pub updates: Mutex<Vec<DisplayUpdate>>,
}

#[cfg(test)]
impl DisplaySink for RecordingSink {
    fn display(&self, update: &DisplayUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }
}
