pub mod classify_types;
pub mod display_types;
pub mod wiki_types;
