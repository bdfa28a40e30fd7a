//! Processing elements of the [`BlockRuntime`](crate::BlockRuntime).
//!
//! Elements are organized into three categories:
//!
//! ## Sources ([`source`])
//!
//! Produce audio with no inputs:
//! - [`TestTone`] - sine oscillator, optionally bounded in stream time
//! - [`DeviceSource`] - reads from a ring buffer fed by the embedder
//!
//! ## Effects ([`effect`])
//!
//! Process audio (inputs -> outputs):
//! - [`DelayQueue`] - withholds output until a minimum duration has buffered
//! - [`Mixer`] - sums all linked inputs
//!
//! ## Sinks ([`sink`])
//!
//! Consume audio with no outputs:
//! - [`CollectSink`] - accumulates samples for inspection after a run
//! - [`FileSink`] - writes raw little-endian f32 samples to a file
//! - [`CpalSink`] - plays to a system device (requires the `cpal_sink`
//!   feature)

pub mod effect;
pub mod sink;
pub mod source;

pub use effect::{DelayQueue, Mixer, Regime};
pub use sink::{CollectSink, FileSink};
pub use source::{DeviceSource, TestTone};

#[cfg(feature = "cpal_sink")]
pub use sink::CpalSink;

use dasp_graph::{Buffer, Input};

/// One block of processing plus the lifecycle hooks the engine needs.
///
/// The `process` signature matches `dasp_graph::Node`; the extra methods
/// let the engine detect end-of-stream, collect faults for the bus, and
/// flush on shutdown.
pub(crate) trait BlockElement {
    /// Process one block: read `inputs`, fill `output`.
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]);

    /// Whether this element will never contribute audio again.
    ///
    /// Sources report exhaustion, delay queues report being drained;
    /// everything else is always finished.
    fn finished(&self) -> bool {
        true
    }

    /// Take a pending fault, to be posted on the bus as an error.
    fn poll_fault(&mut self) -> Option<String> {
        None
    }

    /// Called once when the pipeline stops.
    fn shutdown(&mut self) {}
}

/// A do-nothing terminal the engine pulls toward, so one traversal per
/// block covers every sink and every otherwise unconsumed output.
pub(crate) struct Finalizer;

impl BlockElement for Finalizer {
    fn process(&mut self, _inputs: &[Input], _output: &mut [Buffer]) {}
}

/// The closed set of elements a [`BlockRuntime`](crate::BlockRuntime) graph
/// is made of.
pub(crate) enum ElementNode {
    TestTone(TestTone),
    DeviceSource(DeviceSource),
    DelayQueue(DelayQueue),
    Mixer(Mixer),
    Collect(CollectSink),
    File(FileSink),
    #[cfg(feature = "cpal_sink")]
    Cpal(CpalSink),
    Finalizer(Finalizer),
}

impl ElementNode {
    pub(crate) fn is_source(&self) -> bool {
        matches!(self, ElementNode::TestTone(_) | ElementNode::DeviceSource(_))
    }

    pub(crate) fn as_delay_queue(&self) -> Option<&DelayQueue> {
        match self {
            ElementNode::DelayQueue(queue) => Some(queue),
            _ => None,
        }
    }

    pub(crate) fn as_delay_queue_mut(&mut self) -> Option<&mut DelayQueue> {
        match self {
            ElementNode::DelayQueue(queue) => Some(queue),
            _ => None,
        }
    }

    pub(crate) fn as_collect(&self) -> Option<&CollectSink> {
        match self {
            ElementNode::Collect(sink) => Some(sink),
            _ => None,
        }
    }
}

impl BlockElement for ElementNode {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        match self {
            ElementNode::TestTone(e) => e.process(inputs, output),
            ElementNode::DeviceSource(e) => e.process(inputs, output),
            ElementNode::DelayQueue(e) => e.process(inputs, output),
            ElementNode::Mixer(e) => e.process(inputs, output),
            ElementNode::Collect(e) => e.process(inputs, output),
            ElementNode::File(e) => e.process(inputs, output),
            #[cfg(feature = "cpal_sink")]
            ElementNode::Cpal(e) => e.process(inputs, output),
            ElementNode::Finalizer(e) => e.process(inputs, output),
        }
    }

    fn finished(&self) -> bool {
        match self {
            ElementNode::TestTone(e) => e.finished(),
            ElementNode::DeviceSource(e) => e.finished(),
            ElementNode::DelayQueue(e) => e.finished(),
            ElementNode::Mixer(e) => e.finished(),
            ElementNode::Collect(e) => e.finished(),
            ElementNode::File(e) => e.finished(),
            #[cfg(feature = "cpal_sink")]
            ElementNode::Cpal(e) => e.finished(),
            ElementNode::Finalizer(e) => e.finished(),
        }
    }

    fn poll_fault(&mut self) -> Option<String> {
        match self {
            ElementNode::TestTone(e) => e.poll_fault(),
            ElementNode::DeviceSource(e) => e.poll_fault(),
            ElementNode::DelayQueue(e) => e.poll_fault(),
            ElementNode::Mixer(e) => e.poll_fault(),
            ElementNode::Collect(e) => e.poll_fault(),
            ElementNode::File(e) => e.poll_fault(),
            #[cfg(feature = "cpal_sink")]
            ElementNode::Cpal(e) => e.poll_fault(),
            ElementNode::Finalizer(e) => e.poll_fault(),
        }
    }

    fn shutdown(&mut self) {
        match self {
            ElementNode::TestTone(e) => e.shutdown(),
            ElementNode::DeviceSource(e) => e.shutdown(),
            ElementNode::DelayQueue(e) => e.shutdown(),
            ElementNode::Mixer(e) => e.shutdown(),
            ElementNode::Collect(e) => e.shutdown(),
            ElementNode::File(e) => e.shutdown(),
            #[cfg(feature = "cpal_sink")]
            ElementNode::Cpal(e) => e.shutdown(),
            ElementNode::Finalizer(e) => e.shutdown(),
        }
    }
}

impl dasp_graph::Node for ElementNode {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        BlockElement::process(self, inputs, output);
    }
}
