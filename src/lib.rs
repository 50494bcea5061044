pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod reference;
pub mod report;
pub mod routing;
pub mod similarity;
pub mod sorter;

// Re-export vision types for convenience
pub use photosort_vision::{FaceVector, ModelPaths, Pipeline};

pub use classifier::{classify, ClassificationResult};
pub use detector::FaceDetector;
pub use error::SortError;
pub use reference::ReferenceIndex;
pub use report::Report;
pub use routing::{decide, Outcome, RoutingRecord};
pub use sorter::Sorter;
