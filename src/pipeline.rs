//! The sealed, runnable pipeline.

use std::time::Duration;

use tracing::info;

use crate::error::Error;
use crate::graph::Component;
use crate::runtime::{BusEvent, PipelineState, Runtime};

/// A fully validated graph bound to its runtime.
///
/// Produced by [`Verzug::assemble`](crate::Verzug::assemble). The pipeline
/// owns the runtime and the whole node tree; its topology is immutable.
/// Lifecycle is Created -> Playing -> Stopped, driven either manually via
/// [`play`](Self::play)/[`stop`](Self::stop) or by a
/// [`PlaybackController`](crate::PlaybackController).
pub struct Pipeline<R: Runtime> {
    runtime: R,
    root: Component,
    state: PipelineState,
}

impl<R: Runtime> Pipeline<R> {
    pub(crate) fn new(runtime: R, root: Component, state: PipelineState) -> Self {
        Self {
            runtime,
            root,
            state,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Name of the root component.
    pub fn root_name(&self) -> &str {
        self.root.name()
    }

    /// Access the runtime, e.g. for introspection in tests.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Mutable access to the runtime.
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Start data flow.
    pub fn play(&mut self) -> Result<(), Error> {
        self.runtime.set_state(PipelineState::Playing)?;
        self.state = PipelineState::Playing;
        info!(root = self.root.name(), "pipeline playing");
        Ok(())
    }

    /// Stop data flow and release runtime resources. Terminal.
    ///
    /// The pipeline is considered Stopped even if the runtime reports a
    /// failure during the transition; the error is still propagated so the
    /// caller can log it.
    pub fn stop(&mut self) -> Result<(), Error> {
        if self.state == PipelineState::Stopped {
            return Ok(());
        }
        self.state = PipelineState::Stopped;
        let result = self.runtime.set_state(PipelineState::Stopped);
        info!(root = self.root.name(), "pipeline stopped");
        result.map_err(Error::Runtime)
    }

    /// Wait up to `timeout` for the next bus event.
    pub fn poll(&mut self, timeout: Duration) -> Option<BusEvent> {
        self.runtime.poll(timeout)
    }

    /// Tear the pipeline apart and hand the runtime back to the embedder.
    pub fn into_runtime(mut self) -> R {
        let _ = self.stop();
        self.runtime
    }
}
