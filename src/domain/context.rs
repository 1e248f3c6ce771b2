use super::EngineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared cancellation flag; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deadline and cancellation carried through every engine call
#[derive(Debug, Clone)]
pub struct CallContext {
    started: Instant,
    deadline: Option<Instant>,
    cancel: CancelHandle,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}

impl CallContext {
    /// No deadline, never cancelled unless the handle is fired
    pub fn background() -> Self {
        Self {
            started: Instant::now(),
            deadline: None,
            cancel: CancelHandle::default(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started.checked_add(timeout),
            cancel: CancelHandle::default(),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            started: Instant::now(),
            deadline: Some(deadline),
            cancel: CancelHandle::default(),
        }
    }

    /// Same cancel handle, deadline narrowed to `timeout` from now if that is sooner
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let started = Instant::now();
        let candidate = started.checked_add(timeout);
        let deadline = match (self.deadline, candidate) {
            (Some(parent), Some(child)) => Some(parent.min(child)),
            (parent, child) => parent.or(child),
        };

        Self {
            started,
            deadline,
            cancel: self.cancel.clone(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Errors once the context is cancelled or past its deadline
    pub fn check(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout {
                    after: deadline.saturating_duration_since(self.started),
                });
            }
        }

        Ok(())
    }
}
