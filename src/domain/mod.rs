mod context;
mod error;
mod image;
pub mod native;
pub mod traits;

pub use context::{CallContext, CancelHandle};
pub use error::{EngineError, ErrorKind, ImageError, TraceError};
pub use image::{HistoryLayer, ImageDetail, ImagePullRequest, ImageSummary};
pub use traits::{
    CredentialsProvider, ImageEngine, PullOptions, RegistryCredentials, Span, SpanGuard,
    SpanOutcome, Tracer,
};
