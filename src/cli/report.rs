use crate::domain::{ErrorKind, ImageError};
use serde_json::json;

/// Process exit code for a failed command
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ImageError>().map(ImageError::kind) {
        Some(ErrorKind::MalformedRequest) => 2,
        Some(ErrorKind::Unauthorized) => 3,
        Some(ErrorKind::NotFound) => 4,
        Some(ErrorKind::InternalFailure) | None => 1,
    }
}

/// Classified failures go to stderr as JSON, anything else as plain text
pub fn render_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ImageError>() {
        Some(image_err) => json!({
            "kind": image_err.kind(),
            "message": image_err.message(),
        })
        .to_string(),
        None => format!("Erro: {err:#}"),
    }
}

pub fn report_error(err: &anyhow::Error) {
    eprintln!("{}", render_error(err));
}
