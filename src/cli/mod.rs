pub mod image;
pub mod report;
pub mod setup;

pub use image::ImageCommand;
pub use report::{exit_code, report_error};
pub use setup::ConfigCommand;
