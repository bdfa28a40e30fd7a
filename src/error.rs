//! Error types for graph construction and playback.
//!
//! Construction errors ([`Error`]) are fatal to the call that produced them;
//! callers are expected to discard the failed build rather than retry
//! piecemeal. Failures inside a running pipeline are not errors at this
//! level - they surface as the run's
//! [`TerminationReason`](crate::TerminationReason).

/// Fatal errors raised while building or launching a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The runtime does not recognize the requested node type.
    #[error("unsupported node type: {kind}")]
    UnsupportedNodeType {
        /// Label of the rejected node type.
        kind: String,
    },

    /// A node was configured with an invalid value.
    #[error("invalid configuration for '{node}': {reason}")]
    Configuration {
        /// Name of the misconfigured node, or the composer that rejected it.
        node: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// A device-backed source could not bind to the requested device.
    #[error("device unavailable: {name}")]
    DeviceUnavailable {
        /// Name of the device that could not be bound.
        name: String,
    },

    /// Two ports could not be linked.
    #[error("cannot link '{from}' -> '{to}': {reason}")]
    IncompatiblePorts {
        /// Name of the upstream component.
        from: String,
        /// Name of the downstream component.
        to: String,
        /// Why the link was refused.
        reason: String,
    },

    /// A mixer ran out of input ports.
    #[error("mixer '{mixer}' cannot allocate another input port")]
    TooManyInputs {
        /// Name of the exhausted mixer node.
        mixer: String,
    },

    /// The assembled graph has a dangling port.
    #[error("incomplete graph: {reason}")]
    IncompleteGraph {
        /// Which node and port are left dangling.
        reason: String,
    },

    /// The runtime reported a failure outside the cases above.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Failures reported by a [`Runtime`](crate::Runtime) implementation.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime cannot create elements of this kind.
    #[error("element kind not supported by this runtime: {kind}")]
    UnsupportedKind {
        /// Label of the unsupported kind.
        kind: String,
    },

    /// No device with this name is known to the runtime.
    #[error("unknown device: {name}")]
    UnknownDevice {
        /// The requested device name.
        name: String,
    },

    /// The element cannot allocate any more input ports.
    #[error("no more input ports available on this element")]
    PortsExhausted,

    /// A property was applied to an element kind it does not belong to.
    #[error("property does not apply to this element: {property}")]
    InvalidProperty {
        /// Debug rendering of the rejected property.
        property: String,
    },

    /// The requested lifecycle transition is not legal from the current state.
    #[error("invalid state transition: {reason}")]
    InvalidState {
        /// Which transition was attempted.
        reason: String,
    },

    /// An opaque backend failure.
    #[error("{0}")]
    Backend(String),
}

/// Reasons a [`Runtime`](crate::Runtime) may refuse to link two ports.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The output port already feeds another input.
    #[error("output port is already linked")]
    OutputTaken,

    /// The input port is already fed by another output.
    #[error("input port is already linked")]
    InputTaken,

    /// The ports carry different media types.
    #[error("port media types do not match")]
    TypeMismatch,

    /// A link must go from an output port to an input port.
    #[error("an output port must link to an input port")]
    DirectionMismatch,

    /// One of the ports does not belong to this runtime.
    #[error("unknown port")]
    UnknownPort,
}
