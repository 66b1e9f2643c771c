pub mod classifier;
pub mod flower;
