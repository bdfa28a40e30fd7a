//! The media runtime boundary.
//!
//! Graph construction and playback control never touch samples directly;
//! everything that allocates buffers, schedules audio threads, and moves data
//! happens behind the [`Runtime`] trait. The embedding application owns the
//! runtime's initialization and teardown and injects an instance into
//! [`Verzug::new`](crate::Verzug::new).
//!
//! [`BlockRuntime`](crate::BlockRuntime) is the crate's own synchronous
//! reference implementation; anything driving a real media framework can
//! implement the trait instead.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LinkError, RuntimeError};
use crate::node::NodeKind;

/// Opaque handle to an element owned by a runtime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ElementId(pub(crate) u64);

/// Opaque handle to a port on a runtime element.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PortId(pub(crate) u64);

/// Which way data flows through a port.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PortDirection {
    /// Data flows into the element.
    Input,
    /// Data flows out of the element.
    Output,
}

/// Lifecycle states shared by the pipeline and the runtime underneath it.
///
/// There is deliberately no Paused state at this layer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PipelineState {
    /// Graph fully linked, nothing running yet.
    Created,
    /// The runtime is actively moving data.
    Playing,
    /// Terminal; resources released.
    Stopped,
}

/// A typed element property.
///
/// This is the closed-set replacement for the stringly-typed key/value maps
/// the original framework used: a property that does not exist cannot be
/// spelled, and a property applied to the wrong element kind is rejected by
/// the runtime with [`RuntimeError::InvalidProperty`].
#[derive(Clone, Debug)]
pub enum Property {
    /// Device name for a device-backed source.
    Device(String),
    /// Oscillator frequency in Hz for a test source.
    Frequency(f32),
    /// Bound the test source's output to this much stream time.
    StreamDuration(Duration),
    /// Minimum buffered duration before a delay queue starts emitting.
    MinFillDuration(Duration),
    /// Output path for a file sink.
    Location(PathBuf),
}

/// Asynchronous status notification from the runtime.
///
/// The playback controller reacts to [`EndOfStream`](BusEvent::EndOfStream)
/// and [`Error`](BusEvent::Error); everything else is logged and ignored.
#[derive(Clone, Debug)]
pub enum BusEvent {
    /// All finite sources are exhausted and every buffer has drained.
    EndOfStream,
    /// The runtime hit an unrecoverable failure while playing.
    Error(String),
    /// A recoverable oddity worth logging.
    Warning(String),
    /// The runtime finished a lifecycle transition.
    StateChanged(PipelineState),
}

/// The external media runtime this crate assembles graphs on top of.
///
/// All methods are synchronous; the runtime is free to own real-time threads
/// internally (a device callback, for instance) but the control surface is
/// single-threaded. Element and port handles stay valid until the runtime
/// itself is dropped - discarding a failed build on the caller's side leaves
/// already-created elements behind, which is expected.
pub trait Runtime {
    /// Create an element of the given kind.
    fn create_element(&mut self, kind: NodeKind, name: &str) -> Result<ElementId, RuntimeError>;

    /// Apply a typed property to an element.
    ///
    /// Binding failures for device-backed sources surface here, when the
    /// [`Property::Device`] value is applied.
    fn set_property(&mut self, element: ElementId, property: Property)
        -> Result<(), RuntimeError>;

    /// The element's static input port, if it has one.
    ///
    /// Sources have none. Elements with dynamic inputs (mixers) also return
    /// `None` here; use [`request_input_port`](Runtime::request_input_port).
    fn input_port(&self, element: ElementId) -> Option<PortId>;

    /// The element's static output port, if it has one. Sinks have none.
    fn output_port(&self, element: ElementId) -> Option<PortId>;

    /// Allocate a fresh input port on an element with dynamic inputs.
    ///
    /// Fails with [`RuntimeError::PortsExhausted`] once the element's
    /// capacity is reached.
    fn request_input_port(&mut self, element: ElementId) -> Result<PortId, RuntimeError>;

    /// Link an output port to an input port.
    fn link(&mut self, from: PortId, to: PortId) -> Result<(), LinkError>;

    /// Drive the whole element graph through a lifecycle transition.
    fn set_state(&mut self, state: PipelineState) -> Result<(), RuntimeError>;

    /// Wait up to `timeout` for the next bus event.
    ///
    /// Returns `None` on timeout. Pending events are delivered before any new
    /// processing happens, so polling with a zero timeout drains the bus.
    fn poll(&mut self, timeout: Duration) -> Option<BusEvent>;
}
