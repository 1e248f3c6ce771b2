//! Maps engine failures onto the four `ErrorKind`s.

use crate::domain::{EngineError, ErrorKind, ImageError, TraceError};
use serde::Deserialize;
use std::fmt;

/// Lifecycle operation a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    List,
    Inspect,
    Delete,
    History,
}

impl Operation {
    /// Span name for the operation
    pub fn span_name(self) -> &'static str {
        match self {
            Self::Create => "create-image",
            Self::List => "list-image",
            Self::Inspect => "inspect-image",
            Self::Delete => "delete-image",
            Self::History => "image-history",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.span_name())
    }
}

/// Which kinds are reported separately instead of folded into the defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ClassifierPolicy {
    /// Report missing images as not-found instead of the operation's default kind
    #[serde(default)]
    pub split_not_found: bool,
    /// Report rejected registry credentials on pull as unauthorized
    #[serde(default)]
    pub split_unauthorized: bool,
}

const BAD_REFERENCE_MARKERS: &[&str] = &[
    "invalid reference format",
    "manifest unknown",
    "name unknown",
    "unknown tag",
    "statuscode: 404",
    "no image found in manifest list",
    "does not match the specified platform",
    "unsupported platform",
    "repository name must",
];

const NOT_FOUND_MARKERS: &[&str] = &["no such image", "image not known", "not found"];

const UNAUTHORIZED_MARKERS: &[&str] = &[
    "unauthorized",
    "authentication required",
    "incorrect username or password",
    "access denied",
    "denied:",
];

/// Classify an engine failure raised while running `operation`
pub fn classify(
    operation: Operation,
    err: &EngineError,
    policy: &ClassifierPolicy,
) -> ImageError {
    let message = err.to_string();

    let kind = match err {
        EngineError::Failed { message: text, .. } => {
            classify_engine_report(operation, &text.to_lowercase(), policy)
        }
        EngineError::Spawn { .. }
        | EngineError::Decode { .. }
        | EngineError::Timeout { .. }
        | EngineError::Cancelled => ErrorKind::InternalFailure,
    };

    ImageError::new(kind, message)
}

/// Span creation failures surface as malformed-request whatever their cause
pub fn classify_trace(err: &TraceError) -> ImageError {
    ImageError::MalformedRequest(err.to_string())
}

fn classify_engine_report(
    operation: Operation,
    text: &str,
    policy: &ClassifierPolicy,
) -> ErrorKind {
    match operation {
        Operation::Create => {
            if text.lines().any(names_bad_reference) {
                ErrorKind::MalformedRequest
            } else if policy.split_unauthorized && contains_any(text, UNAUTHORIZED_MARKERS) {
                ErrorKind::Unauthorized
            } else {
                ErrorKind::InternalFailure
            }
        }
        Operation::List => ErrorKind::InternalFailure,
        Operation::Inspect | Operation::History => {
            if policy.split_not_found && contains_any(text, NOT_FOUND_MARKERS) {
                ErrorKind::NotFound
            } else {
                ErrorKind::InternalFailure
            }
        }
        Operation::Delete => {
            if policy.split_not_found && contains_any(text, NOT_FOUND_MARKERS) {
                ErrorKind::NotFound
            } else {
                ErrorKind::MalformedRequest
            }
        }
    }
}

/// One registry's answer rejecting the reference itself. Multi-registry pulls report one
/// line per registry, so a sibling line's auth failure must not mask it.
fn names_bad_reference(line: &str) -> bool {
    contains_any(line, BAD_REFERENCE_MARKERS) && !contains_any(line, UNAUTHORIZED_MARKERS)
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}
