use super::classifier::{ClassifierPolicy, Operation, classify, classify_trace};
use super::mapper;
use crate::domain::{
    CallContext, CredentialsProvider, EngineError, HistoryLayer, ImageDetail, ImageEngine,
    ImageError, ImagePullRequest, ImageSummary, SpanGuard, SpanOutcome, Tracer,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const REF_ATTRIBUTE: &str = "image.ref";

/// Bound applied to every engine call unless `with_call_timeout` says otherwise
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Pull, list, inspect, delete and history of images on a container engine.
///
/// Holds no state of its own; every call goes straight to the engine inside a
/// span, bounded by the caller's context and by the per-call timeout, whichever
/// fires first.
pub struct ImageService {
    engine: Arc<dyn ImageEngine>,
    tracer: Arc<dyn Tracer>,
    credentials: Arc<dyn CredentialsProvider>,
    policy: ClassifierPolicy,
    call_timeout: Duration,
}

impl ImageService {
    pub fn new(
        engine: Arc<dyn ImageEngine>,
        tracer: Arc<dyn Tracer>,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self {
            engine,
            tracer,
            credentials,
            policy: ClassifierPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: ClassifierPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Upper bound applied to every engine call on top of the caller's context
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn policy(&self) -> ClassifierPolicy {
        self.policy
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Pull `request` from its registry with the configured credentials
    pub fn create(&self, ctx: &CallContext, request: &ImagePullRequest) -> Result<(), ImageError> {
        let mut attributes = Vec::new();
        if !request.repository.trim().is_empty() {
            attributes.push(("image.repository", request.repository.as_str()));
        }
        if !request.tag.trim().is_empty() {
            attributes.push(("image.tag", request.tag.as_str()));
        }

        let auth = self.credentials.registry_credentials();
        info!("Baixando imagem {}...", request.reference());

        self.traced(Operation::Create, &attributes, ctx, |ctx| {
            self.engine.pull(ctx, &request.options(), &auth)
        })?;

        info!("Imagem {} disponível", request.reference());
        Ok(())
    }

    /// Every image in the local store, intermediate layers included
    pub fn list(&self, ctx: &CallContext) -> Result<Vec<ImageSummary>, ImageError> {
        let images = self.traced(Operation::List, &[], ctx, |ctx| {
            self.engine.list_images(ctx, true).map(mapper::to_summaries)
        })?;

        debug!("{} imagem(ns) encontrada(s)", images.len());
        Ok(images)
    }

    pub fn inspect(&self, ctx: &CallContext, id: &str) -> Result<ImageDetail, ImageError> {
        self.traced(Operation::Inspect, &[(REF_ATTRIBUTE, id)], ctx, |ctx| {
            self.engine
                .inspect_image(ctx, id)
                .map(|native| mapper::to_detail(id, native))
        })
    }

    pub fn delete(&self, ctx: &CallContext, id: &str) -> Result<(), ImageError> {
        info!("Removendo imagem {}...", id);
        self.traced(Operation::Delete, &[(REF_ATTRIBUTE, id)], ctx, |ctx| {
            self.engine.remove_image(ctx, id)
        })
    }

    /// Layers of `name`, newest first
    pub fn history(&self, ctx: &CallContext, name: &str) -> Result<Vec<HistoryLayer>, ImageError> {
        self.traced(Operation::History, &[(REF_ATTRIBUTE, name)], ctx, |ctx| {
            self.engine
                .image_history(ctx, name)
                .map(mapper::to_history)
        })
    }

    /// Opens the span, bounds the context and classifies any engine failure.
    /// The span is closed by `SpanGuard` on every return path.
    fn traced<T, F>(
        &self,
        operation: Operation,
        attributes: &[(&'static str, &str)],
        ctx: &CallContext,
        call: F,
    ) -> Result<T, ImageError>
    where
        F: FnOnce(&CallContext) -> Result<T, EngineError>,
    {
        let span = self
            .tracer
            .start_span(operation.span_name(), attributes)
            .map_err(|e| {
                warn!("Não foi possível abrir span {}: {}", operation, e);
                classify_trace(&e)
            })?;
        let mut guard = SpanGuard::new(span);

        let ctx = ctx.child_with_timeout(self.call_timeout);

        match call(&ctx) {
            Ok(value) => {
                guard.record_outcome(SpanOutcome::Ok);
                Ok(value)
            }
            Err(err) => {
                let classified = classify(operation, &err, &self.policy);
                warn!("{} falhou ({}): {}", operation, classified.kind(), err);
                guard.record_outcome(SpanOutcome::Failed(classified.kind()));
                Err(classified)
            }
        }
    }
}
