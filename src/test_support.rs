use crate::domain::native::{NativeHistoryLayer, NativeImage, NativeImageDetail, NativeTimestamp};
use crate::domain::{
    CallContext, EngineError, ImageEngine, PullOptions, RegistryCredentials, Span, SpanOutcome,
    TraceError, Tracer,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct MockImage {
    pub summary: NativeImage,
    pub detail: NativeImageDetail,
    pub history: Vec<NativeHistoryLayer>,
    pub in_use: bool,
}

#[derive(Debug, Clone)]
pub enum MockFailure {
    /// Engine ran and reported this message
    Reported(String),
    /// Engine binary could not be reached
    Unreachable,
    /// Engine answered with output that does not decode
    Garbage,
}

/// In-memory engine: a local image store plus a set of pullable references
#[derive(Debug)]
pub struct MockEngine {
    images: RwLock<Vec<MockImage>>,
    registry: RwLock<HashSet<String>>,
    commands: RwLock<Vec<String>>,
    pulls: RwLock<Vec<(String, String)>>,
    fail_on: RwLock<HashMap<String, MockFailure>>,
    delay: RwLock<Option<Duration>>,
    last_remaining: RwLock<Option<Duration>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            images: RwLock::new(Vec::new()),
            registry: RwLock::new(HashSet::new()),
            commands: RwLock::new(Vec::new()),
            pulls: RwLock::new(Vec::new()),
            fail_on: RwLock::new(HashMap::new()),
            delay: RwLock::new(None),
            last_remaining: RwLock::new(None),
        }
    }

    /// Adds a local image with a single base layer
    pub fn add_image(&self, id: &str, tags: &[&str]) {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let created = 1_700_000_000;

        self.images.write().unwrap().push(MockImage {
            summary: NativeImage {
                id: id.to_string(),
                repo_tags: (!tags.is_empty()).then(|| tags.clone()),
                created: Some(NativeTimestamp::Unix(created)),
                size: Some(1024),
                virtual_size: Some(1024),
                labels: None,
            },
            detail: NativeImageDetail {
                id: id.to_string(),
                repo_tags: (!tags.is_empty()).then(|| tags.clone()),
                created: Some(NativeTimestamp::Text("2023-11-14T22:13:20Z".to_string())),
                container: None,
                os: Some("linux".to_string()),
                architecture: Some("amd64".to_string()),
                size: Some(1024),
                virtual_size: Some(1024),
                author: None,
                docker_version: Some("4.9.3".to_string()),
            },
            history: vec![NativeHistoryLayer {
                id: id.to_string(),
                created: Some(NativeTimestamp::Unix(created)),
                created_by: Some("/bin/sh -c #(nop) ADD file:rootfs in /".to_string()),
                comment: None,
                size: Some(1024),
                tags: (!tags.is_empty()).then(|| tags.clone()),
            }],
            in_use: false,
        });
    }

    pub fn set_history(&self, id: &str, layers: Vec<NativeHistoryLayer>) {
        self.with_image_mut(id, |image| image.history = layers);
    }

    pub fn mark_in_use(&self, id: &str) {
        self.with_image_mut(id, |image| image.in_use = true);
    }

    /// Makes `reference` (e.g. `alpine:3.18`) pullable
    pub fn publish(&self, reference: &str) {
        self.registry.write().unwrap().insert(reference.to_string());
    }

    pub fn set_fail_on(&self, operation: &str, failure: MockFailure) {
        self.fail_on
            .write()
            .unwrap()
            .insert(operation.to_string(), failure);
    }

    /// Every call sleeps this long, waking early when its context fires
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write().unwrap() = Some(delay);
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.commands.read().unwrap().clone()
    }

    /// `(reference, username)` of every pull that reached the engine
    pub fn pulls(&self) -> Vec<(String, String)> {
        self.pulls.read().unwrap().clone()
    }

    /// Time left on the context of the most recent call, `None` when it had no deadline
    pub fn last_remaining(&self) -> Option<Duration> {
        *self.last_remaining.read().unwrap()
    }

    pub fn image_count(&self) -> usize {
        self.images.read().unwrap().len()
    }

    fn record_command(&self, cmd: &str) {
        self.commands.write().unwrap().push(cmd.to_string());
    }

    fn enter(&self, ctx: &CallContext, operation: &str) -> Result<(), EngineError> {
        *self.last_remaining.write().unwrap() = ctx.remaining();
        ctx.check()?;

        if let Some(delay) = *self.delay.read().unwrap() {
            let until = Instant::now() + delay;
            while Instant::now() < until {
                ctx.check()?;
                thread::sleep(Duration::from_millis(5));
            }
        }

        match self.fail_on.read().unwrap().get(operation) {
            Some(MockFailure::Reported(message)) => Err(EngineError::failed(message.clone())),
            Some(MockFailure::Unreachable) => Err(EngineError::Spawn {
                program: "mock-engine".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "recusado"),
            }),
            Some(MockFailure::Garbage) => Err(EngineError::Decode {
                what: "resposta do mock",
                message: "expected value at line 1 column 1".to_string(),
            }),
            None => Ok(()),
        }
    }

    fn matches(image: &MockImage, reference: &str) -> bool {
        if reference.is_empty() {
            return false;
        }

        image.summary.id == reference
            || image.summary.id.trim_start_matches("sha256:").starts_with(reference)
            || image.summary.repo_tags.as_ref().is_some_and(|tags| {
                tags.iter()
                    .any(|t| t == reference || *t == format!("{reference}:latest"))
            })
    }

    fn find<T>(&self, reference: &str, f: impl FnOnce(&MockImage) -> T) -> Option<T> {
        self.images
            .read()
            .unwrap()
            .iter()
            .find(|image| Self::matches(image, reference))
            .map(f)
    }

    fn with_image_mut(&self, reference: &str, f: impl FnOnce(&mut MockImage)) {
        let mut images = self.images.write().unwrap();
        if let Some(image) = images.iter_mut().find(|image| Self::matches(image, reference)) {
            f(image);
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageEngine for MockEngine {
    fn pull(
        &self,
        ctx: &CallContext,
        options: &PullOptions<'_>,
        auth: &RegistryCredentials,
    ) -> Result<(), EngineError> {
        let reference = options.reference();
        self.record_command(&format!("pull:{}", reference));
        self.enter(ctx, "pull")?;

        self.pulls
            .write()
            .unwrap()
            .push((reference.clone(), auth.username.clone()));

        if !self.registry.read().unwrap().contains(&reference) {
            return Err(EngineError::failed(format!(
                "initializing source docker://{reference}: reading manifest: manifest unknown"
            )));
        }

        if self.find(&reference, |_| ()).is_none() {
            let id = format!("sha256:{:064x}", self.image_count() + 1);
            self.add_image(&id, &[reference.as_str()]);
        }

        Ok(())
    }

    fn list_images(
        &self,
        ctx: &CallContext,
        include_all: bool,
    ) -> Result<Vec<NativeImage>, EngineError> {
        self.record_command(if include_all { "list:all" } else { "list" });
        self.enter(ctx, "list")?;

        Ok(self
            .images
            .read()
            .unwrap()
            .iter()
            .map(|image| image.summary.clone())
            .collect())
    }

    fn inspect_image(
        &self,
        ctx: &CallContext,
        id: &str,
    ) -> Result<NativeImageDetail, EngineError> {
        self.record_command(&format!("inspect:{}", id));
        self.enter(ctx, "inspect")?;

        self.find(id, |image| image.detail.clone())
            .ok_or_else(|| EngineError::failed(format!("{id}: image not known")))
    }

    fn remove_image(&self, ctx: &CallContext, id: &str) -> Result<(), EngineError> {
        self.record_command(&format!("remove:{}", id));
        self.enter(ctx, "remove")?;

        let mut images = self.images.write().unwrap();
        let Some(index) = images.iter().position(|image| Self::matches(image, id)) else {
            return Err(EngineError::failed(format!("No such image: {id}")));
        };

        if images[index].in_use {
            return Err(EngineError::Failed {
                status: Some(2),
                message: format!(
                    "image used by {}: image is in use by a container",
                    images[index].summary.id
                ),
            });
        }

        images.remove(index);
        Ok(())
    }

    fn image_history(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> Result<Vec<NativeHistoryLayer>, EngineError> {
        self.record_command(&format!("history:{}", name));
        self.enter(ctx, "history")?;

        self.find(name, |image| image.history.clone())
            .ok_or_else(|| EngineError::failed(format!("{name}: image not known")))
    }
}

/// What a `RecordingTracer` saw for one span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRecord {
    pub name: &'static str,
    pub attributes: Vec<(String, String)>,
    pub outcome: Option<SpanOutcome>,
    pub ended: u32,
}

/// Tracer that keeps every span it opened, optionally refusing to open new ones
#[derive(Debug, Default)]
pub struct RecordingTracer {
    spans: Arc<RwLock<Vec<SpanRecord>>>,
    failing: RwLock<bool>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.write().unwrap() = failing;
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.read().unwrap().clone()
    }
}

impl Tracer for RecordingTracer {
    fn start_span(
        &self,
        name: &'static str,
        attributes: &[(&'static str, &str)],
    ) -> Result<Box<dyn Span>, TraceError> {
        if *self.failing.read().unwrap() {
            return Err(TraceError::Unavailable("tracer de teste desligado".to_string()));
        }

        let mut spans = self.spans.write().unwrap();
        spans.push(SpanRecord {
            name,
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            outcome: None,
            ended: 0,
        });

        Ok(Box::new(RecordingSpan {
            spans: self.spans.clone(),
            index: spans.len() - 1,
        }))
    }
}

struct RecordingSpan {
    spans: Arc<RwLock<Vec<SpanRecord>>>,
    index: usize,
}

impl Span for RecordingSpan {
    fn record_outcome(&mut self, outcome: SpanOutcome) {
        self.spans.write().unwrap()[self.index].outcome = Some(outcome);
    }

    fn end(&mut self) {
        self.spans.write().unwrap()[self.index].ended += 1;
    }
}

