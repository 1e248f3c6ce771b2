pub mod classifier;
mod image_service;
pub mod mapper;

pub use classifier::{ClassifierPolicy, Operation};
pub use image_service::{DEFAULT_CALL_TIMEOUT, ImageService};
