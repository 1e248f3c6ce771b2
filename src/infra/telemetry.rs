use crate::domain::{Span, SpanOutcome, TraceError, Tracer};
use anyhow::{Result, anyhow};
use std::time::Instant;
use tracing::field::{Empty, display};
use tracing::span::EnteredSpan;
use tracing::{debug, info_span};
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default_directive = if verbose {
        "imagebox=debug"
    } else {
        "imagebox=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("instalando subscriber de logs: {e}"))
}

/// `Tracer` backed by the `tracing` crate
#[derive(Debug, Clone)]
pub struct TracingTracer {
    scope: &'static str,
}

impl TracingTracer {
    pub fn new(scope: &'static str) -> Self {
        Self { scope }
    }
}

impl Default for TracingTracer {
    fn default() -> Self {
        Self::new("image-lifecycle")
    }
}

impl Tracer for TracingTracer {
    fn start_span(
        &self,
        name: &'static str,
        attributes: &[(&'static str, &str)],
    ) -> Result<Box<dyn Span>, TraceError> {
        for (key, value) in attributes {
            validate_attribute(key, value)?;
        }

        let rendered = attributes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");

        let span = info_span!(
            "image_op",
            operation = name,
            scope = self.scope,
            attributes = %rendered,
            outcome = Empty,
            elapsed_ms = Empty,
        );

        Ok(Box::new(TracingSpan {
            name,
            entered: Some(span.entered()),
            started: Instant::now(),
        }))
    }
}

fn validate_attribute(key: &'static str, value: &str) -> Result<(), TraceError> {
    if value.trim().is_empty() {
        return Err(TraceError::InvalidAttribute {
            key,
            reason: "valor vazio".into(),
        });
    }

    if value.chars().any(char::is_control) {
        return Err(TraceError::InvalidAttribute {
            key,
            reason: "valor contém caracteres de controle".into(),
        });
    }

    Ok(())
}

struct TracingSpan {
    name: &'static str,
    entered: Option<EnteredSpan>,
    started: Instant,
}

impl Span for TracingSpan {
    fn record_outcome(&mut self, outcome: SpanOutcome) {
        if let Some(span) = &self.entered {
            match outcome {
                SpanOutcome::Ok => span.record("outcome", "ok"),
                SpanOutcome::Failed(kind) => span.record("outcome", display(kind)),
            };
        }
    }

    fn end(&mut self) {
        let Some(span) = self.entered.take() else {
            return;
        };

        let elapsed = self.started.elapsed();
        span.record("elapsed_ms", elapsed.as_millis() as u64);
        debug!("{} finalizado em {:?}", self.name, elapsed);
        drop(span);
    }
}
