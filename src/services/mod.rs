pub mod aggregation;
pub mod providers;
pub mod recommendations;
pub mod report;
pub mod scoring;

pub use recommendations::{RecommendationService, RunOptions};
