pub mod config;
pub mod podman_adapter;
pub mod telemetry;

pub use podman_adapter::{EngineEndpoint, PodmanAdapter};
pub use telemetry::TracingTracer;
