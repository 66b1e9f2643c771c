use serde::{Deserialize, Serialize};

/// Everything the single screen shows. Each field is a ready-to-render value;
/// images are data URLs.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub image: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub thumbnail: Option<String>,
    pub article_url: Option<String>,
}

/// Generation number handed out per image selection.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionToken(pub u64);

/// Payload of the `display-updated` event.
#[derive(Debug, Serialize, Clone)]
pub struct DisplayUpdate {
    pub token: SelectionToken,
    pub state: DisplayState,
}

/// Editing step applied to a picked photo before it is shown and classified.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImageEdit {
    /// Largest centered square.
    #[default]
    SquareCenter,
    Crop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

