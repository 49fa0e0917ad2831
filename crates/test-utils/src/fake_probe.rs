use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use launchpad::exec::{BackgroundProcess, BoxFuture};
use launchpad::readiness::{Readiness, ReadinessProbe};

/// A probe that answers immediately with a scripted result and counts how
/// often it was asked.
pub struct FakeProbe {
    result: Readiness,
    calls: Arc<AtomicUsize>,
}

impl FakeProbe {
    pub fn ready() -> Self {
        Self::answering(Readiness::Ready)
    }

    pub fn not_ready(reason: &str) -> Self {
        Self::answering(Readiness::NotReady(reason.to_string()))
    }

    fn answering(result: Readiness) -> Self {
        Self {
            result,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter; stays valid after the probe is moved into an
    /// orchestrator.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ReadinessProbe for FakeProbe {
    fn describe(&self) -> String {
        "fake probe".to_string()
    }

    fn await_ready<'a>(&'a self, _process: &'a mut BackgroundProcess) -> BoxFuture<'a, Readiness> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.result.clone();
        Box::pin(async move { result })
    }
}
