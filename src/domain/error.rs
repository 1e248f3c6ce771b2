use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Closed set of failure kinds the lifecycle operations report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    MalformedRequest,
    Unauthorized,
    NotFound,
    InternalFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRequest => write!(f, "malformed-request"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "not-found"),
            Self::InternalFailure => write!(f, "internal-failure"),
        }
    }
}

/// Error returned by `ImageService`; always carries the underlying engine text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("requisição inválida: {0}")]
    MalformedRequest(String),
    #[error("não autorizado: {0}")]
    Unauthorized(String),
    #[error("não encontrado: {0}")]
    NotFound(String),
    #[error("falha interna: {0}")]
    Internal(String),
}

impl ImageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::MalformedRequest => Self::MalformedRequest(message),
            ErrorKind::Unauthorized => Self::Unauthorized(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::InternalFailure => Self::Internal(message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedRequest(_) => ErrorKind::MalformedRequest,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Internal(_) => ErrorKind::InternalFailure,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::MalformedRequest(m)
            | Self::Unauthorized(m)
            | Self::NotFound(m)
            | Self::Internal(m) => m,
        }
    }
}

/// Failure raised by an engine client before classification
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("falha ao executar {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{message}")]
    Failed { status: Option<i32>, message: String },
    #[error("não foi possível decodificar {what}: {message}")]
    Decode { what: &'static str, message: String },
    #[error("chamada ao engine expirou após {after:?}")]
    Timeout { after: Duration },
    #[error("chamada ao engine cancelada")]
    Cancelled,
}

impl EngineError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            status: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    #[error("atributo de span inválido {key}: {reason}")]
    InvalidAttribute { key: &'static str, reason: String },
    #[error("tracer indisponível: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_constructor() {
        for kind in [
            ErrorKind::MalformedRequest,
            ErrorKind::Unauthorized,
            ErrorKind::NotFound,
            ErrorKind::InternalFailure,
        ] {
            let err = ImageError::new(kind, "boom");
            assert_eq!(err.kind(), kind);
            assert_eq!(err.message(), "boom");
        }
    }

    #[test]
    fn display_keeps_engine_text() {
        let err = ImageError::MalformedRequest("No such image: x".into());
        assert_eq!(err.to_string(), "requisição inválida: No such image: x");
    }

    #[test]
    fn kind_serializes_like_display() {
        let value = serde_json::to_value(ErrorKind::InternalFailure).unwrap();
        assert_eq!(value, "internal-failure");

        for kind in [
            ErrorKind::MalformedRequest,
            ErrorKind::Unauthorized,
            ErrorKind::NotFound,
            ErrorKind::InternalFailure,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.to_string());
        }
    }
}
