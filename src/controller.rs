//! Run-to-completion playback control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Error;
use crate::pipeline::Pipeline;
use crate::runtime::{BusEvent, Runtime};

/// Why a run ended.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TerminationReason {
    /// Every source finished and all buffered audio was delivered.
    EndOfStream,
    /// The runtime reported a failure; the detail string is the runtime's.
    Error(String),
    /// An external interrupt was observed between polls.
    ///
    /// This is a normal termination, distinct from [`Error`]
    /// (user cancelled vs. pipeline failed).
    ///
    /// [`Error`]: TerminationReason::Error
    Interrupted,
}

/// A cloneable cancellation flag.
///
/// The controller checks it between polls; the embedding application wires
/// its own signal handling (Ctrl-C, a UI button) to [`trigger`]. Triggering
/// is sticky.
///
/// [`trigger`]: Interrupt::trigger
///
/// # Example
///
/// ```
/// use verzug::Interrupt;
///
/// let interrupt = Interrupt::new();
/// let handle = interrupt.clone();
/// handle.trigger();
/// assert!(interrupt.is_triggered());
/// ```
#[derive(Clone, Default, Debug)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// A fresh, untriggered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives a pipeline from Created through Playing to Stopped.
///
/// [`run`](Self::run) starts the pipeline, then loops on bounded-timeout
/// bus polls until the runtime reports end-of-stream or an error, or the
/// interrupt fires. The pipeline is always stopped before `run` returns -
/// cleanup does not depend on how the run ended.
pub struct PlaybackController {
    poll_timeout: Duration,
    interrupt: Interrupt,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackController {
    /// Default poll timeout per loop iteration.
    pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(500);

    /// A controller with the default poll timeout and a fresh interrupt.
    pub fn new() -> Self {
        Self {
            poll_timeout: Self::DEFAULT_POLL_TIMEOUT,
            interrupt: Interrupt::new(),
        }
    }

    /// Override the per-iteration poll timeout.
    ///
    /// This bounds how long a cancellation can go unnoticed.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Use an externally owned interrupt flag.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// A handle to this controller's interrupt flag.
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Run the pipeline to completion.
    ///
    /// Returns the reason the run ended. Bus events other than end-of-stream
    /// and errors are logged and ignored. Whatever happens, the pipeline is
    /// transitioned to Stopped before this returns.
    ///
    /// # Errors
    ///
    /// [`Error::Runtime`] if the pipeline fails to start at all.
    pub fn run<R: Runtime>(&self, pipeline: &mut Pipeline<R>) -> Result<TerminationReason, Error> {
        if let Err(err) = pipeline.play() {
            if let Err(stop_err) = pipeline.stop() {
                warn!(error = %stop_err, "cleanup after failed start also failed");
            }
            return Err(err);
        }

        let reason = loop {
            if self.interrupt.is_triggered() {
                break TerminationReason::Interrupted;
            }
            match pipeline.poll(self.poll_timeout) {
                Some(BusEvent::EndOfStream) => break TerminationReason::EndOfStream,
                Some(BusEvent::Error(detail)) => break TerminationReason::Error(detail),
                Some(event) => debug!(?event, "ignoring bus event"),
                None => {}
            }
        };

        if let Err(err) = pipeline.stop() {
            warn!(error = %err, "failed to stop pipeline cleanly");
        }
        debug!(?reason, "run finished");
        Ok(reason)
    }
}
