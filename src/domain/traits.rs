use super::native::{NativeHistoryLayer, NativeImage, NativeImageDetail};
use super::{CallContext, EngineError, ErrorKind, TraceError};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt::Debug;

/// Username/password/email used for every registry pull
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryCredentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub email: String,
}

impl RegistryCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: Some(SecretString::new(password.into())),
            email: email.into(),
        }
    }

    /// Anonymous pulls carry no username
    pub fn is_anonymous(&self) -> bool {
        self.username.trim().is_empty()
    }

    pub fn password(&self) -> &str {
        self.password
            .as_ref()
            .map(|p| p.expose_secret().as_str())
            .unwrap_or("")
    }
}

/// Pull parameters handed to the engine
#[derive(Debug, Clone, Copy)]
pub struct PullOptions<'a> {
    pub repository: &'a str,
    pub tag: &'a str,
    pub platform: &'a str,
}

impl PullOptions<'_> {
    /// Reference as the engine understands it: `repo:tag`, `repo@digest` or bare `repo`
    pub fn reference(&self) -> String {
        let tag = self.tag.trim();
        if tag.is_empty() {
            return self.repository.to_string();
        }

        if is_digest(tag) {
            format!("{}@{}", self.repository, tag)
        } else {
            format!("{}:{}", self.repository, tag)
        }
    }
}

fn is_digest(tag: &str) -> bool {
    match tag.split_once(':') {
        Some((algo, hex)) => {
            !algo.is_empty()
                && algo.chars().all(|c| c.is_ascii_alphanumeric())
                && hex.len() >= 32
                && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

/// Image operations a container engine must provide
pub trait ImageEngine: Send + Sync + Debug {
    /// Pull an image from its registry into the local store
    fn pull(
        &self,
        ctx: &CallContext,
        options: &PullOptions<'_>,
        auth: &RegistryCredentials,
    ) -> Result<(), EngineError>;

    /// List local images, intermediate layers included when `include_all` is set
    fn list_images(
        &self,
        ctx: &CallContext,
        include_all: bool,
    ) -> Result<Vec<NativeImage>, EngineError>;

    /// Inspect one image by id or tag
    fn inspect_image(
        &self,
        ctx: &CallContext,
        id: &str,
    ) -> Result<NativeImageDetail, EngineError>;

    /// Remove an image from the local store
    fn remove_image(&self, ctx: &CallContext, id: &str) -> Result<(), EngineError>;

    /// Build history of an image, newest layer first
    fn image_history(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> Result<Vec<NativeHistoryLayer>, EngineError>;
}

/// Where pull credentials come from
pub trait CredentialsProvider: Send + Sync + Debug {
    fn registry_credentials(&self) -> RegistryCredentials;
}

/// How a traced operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanOutcome {
    Ok,
    Failed(ErrorKind),
}

/// An open span; must be ended exactly once
pub trait Span {
    fn record_outcome(&mut self, outcome: SpanOutcome);
    fn end(&mut self);
}

/// Factory for spans bracketing a single operation
pub trait Tracer: Send + Sync + Debug {
    fn start_span(
        &self,
        name: &'static str,
        attributes: &[(&'static str, &str)],
    ) -> Result<Box<dyn Span>, TraceError>;
}

/// Ends the wrapped span when dropped
pub struct SpanGuard {
    span: Box<dyn Span>,
}

impl SpanGuard {
    pub fn new(span: Box<dyn Span>) -> Self {
        Self { span }
    }

    pub fn record_outcome(&mut self, outcome: SpanOutcome) {
        self.span.record_outcome(outcome);
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.span.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_credentials_are_anonymous() {
        let creds = RegistryCredentials::default();
        assert!(creds.is_anonymous());
        assert_eq!(creds.password(), "");
    }

    #[test]
    fn debug_output_redacts_password() {
        let creds = RegistryCredentials::new("dev", "hunter2", "dev@example.com");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert_eq!(creds.password(), "hunter2");
    }

    #[test]
    fn deserializes_from_toml() {
        let creds: RegistryCredentials = toml::from_str(
            r#"
username = "dev"
password = "s3cret"
"#,
        )
        .unwrap();
        assert_eq!(creds.username, "dev");
        assert_eq!(creds.password(), "s3cret");
        assert!(creds.email.is_empty());
    }
}
