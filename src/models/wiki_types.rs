use serde::Serialize;

/// Introductory summary of one Wikipedia page.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PageSummary {
    pub title: String,
    pub extract: String,
    pub thumbnail_url: Option<String>,
}
