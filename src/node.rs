//! Node kinds, typed configuration, and the owned node handle.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;
use crate::runtime::{ElementId, PortId, Property};

/// Unique identifier for a node within a build.
///
/// Allocated from a monotonic counter; node identity is not derived from
/// content and carries no meaning beyond uniqueness.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) u64);

/// The closed set of node types a graph can be built from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    /// Captures audio from a named device.
    SourceDevice,
    /// Generates a test tone.
    SourceTest,
    /// Withholds output until a configured duration has buffered.
    DelayQueue,
    /// Sums any number of inputs into one output.
    Mixer,
    /// Plays to whatever output the runtime considers best.
    SinkAuto,
    /// Writes samples to a file.
    SinkFile,
}

impl NodeKind {
    /// Sources have no input port.
    pub fn is_source(self) -> bool {
        matches!(self, NodeKind::SourceDevice | NodeKind::SourceTest)
    }

    /// Sinks have no output port.
    pub fn is_sink(self) -> bool {
        matches!(self, NodeKind::SinkAuto | NodeKind::SinkFile)
    }

    /// Mixers allocate input ports on demand instead of exposing a static one.
    pub fn has_dynamic_inputs(self) -> bool {
        matches!(self, NodeKind::Mixer)
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            NodeKind::SourceDevice => "source-device",
            NodeKind::SourceTest => "source-test",
            NodeKind::DelayQueue => "delay-queue",
            NodeKind::Mixer => "mixer",
            NodeKind::SinkAuto => "sink-auto",
            NodeKind::SinkFile => "sink-file",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Typed, per-kind node configuration.
///
/// Each kind carries exactly the fields that apply to it, so a config key
/// that does not exist for a kind cannot be written down. Values are
/// validated when the node is created.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use verzug::NodeSpec;
///
/// let tone = NodeSpec::test_tone(440.0);
/// let queue = NodeSpec::delay_queue(Duration::from_millis(200));
/// let sink = NodeSpec::auto_sink();
/// ```
#[derive(Clone, Debug)]
pub enum NodeSpec {
    /// A device-backed audio source.
    SourceDevice {
        /// Name of the device to bind.
        device: String,
    },
    /// A generated test tone.
    SourceTest {
        /// Oscillator frequency in Hz.
        frequency: f32,
        /// Stop producing after this much stream time; `None` runs forever.
        duration: Option<Duration>,
    },
    /// A buffering queue realizing a fixed time offset.
    DelayQueue {
        /// Output is withheld until this much audio has buffered.
        min_fill: Duration,
    },
    /// A summing mixer with dynamically allocated inputs.
    Mixer,
    /// An automatically selected audio output.
    SinkAuto,
    /// A file-backed sink.
    SinkFile {
        /// Path the sink writes to.
        location: PathBuf,
    },
}

impl NodeSpec {
    /// Source bound to the named capture device.
    pub fn device_source(device: impl Into<String>) -> Self {
        NodeSpec::SourceDevice {
            device: device.into(),
        }
    }

    /// Unbounded test tone at `frequency` Hz.
    pub fn test_tone(frequency: f32) -> Self {
        NodeSpec::SourceTest {
            frequency,
            duration: None,
        }
    }

    /// Test tone that ends after `duration` of stream time.
    pub fn test_tone_for(frequency: f32, duration: Duration) -> Self {
        NodeSpec::SourceTest {
            frequency,
            duration: Some(duration),
        }
    }

    /// Delay queue that withholds output until `min_fill` has buffered.
    ///
    /// A zero duration is a pass-through.
    pub fn delay_queue(min_fill: Duration) -> Self {
        NodeSpec::DelayQueue { min_fill }
    }

    /// Summing mixer.
    pub fn mixer() -> Self {
        NodeSpec::Mixer
    }

    /// Automatically selected output sink.
    pub fn auto_sink() -> Self {
        NodeSpec::SinkAuto
    }

    /// Sink writing raw samples to `location`.
    pub fn file_sink(location: impl Into<PathBuf>) -> Self {
        NodeSpec::SinkFile {
            location: location.into(),
        }
    }

    /// The node kind this spec configures.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeSpec::SourceDevice { .. } => NodeKind::SourceDevice,
            NodeSpec::SourceTest { .. } => NodeKind::SourceTest,
            NodeSpec::DelayQueue { .. } => NodeKind::DelayQueue,
            NodeSpec::Mixer => NodeKind::Mixer,
            NodeSpec::SinkAuto => NodeKind::SinkAuto,
            NodeSpec::SinkFile { .. } => NodeKind::SinkFile,
        }
    }

    /// Check configured values. Keys are already right by construction.
    pub(crate) fn validate(&self, node: &str) -> Result<(), Error> {
        let fail = |reason: &str| {
            Err(Error::Configuration {
                node: node.to_string(),
                reason: reason.to_string(),
            })
        };
        match self {
            NodeSpec::SourceDevice { device } if device.is_empty() => {
                fail("device name is empty")
            }
            NodeSpec::SourceTest { frequency, .. } if !frequency.is_finite() => {
                fail("frequency is not finite")
            }
            NodeSpec::SourceTest { frequency, .. } if *frequency <= 0.0 => {
                fail("frequency must be positive")
            }
            NodeSpec::SinkFile { location } if location.as_os_str().is_empty() => {
                fail("file location is empty")
            }
            _ => Ok(()),
        }
    }

    /// The properties to apply to a freshly created element.
    pub(crate) fn properties(&self) -> Vec<Property> {
        match self {
            NodeSpec::SourceDevice { device } => vec![Property::Device(device.clone())],
            NodeSpec::SourceTest {
                frequency,
                duration,
            } => {
                let mut props = vec![Property::Frequency(*frequency)];
                if let Some(duration) = duration {
                    props.push(Property::StreamDuration(*duration));
                }
                props
            }
            NodeSpec::DelayQueue { min_fill } => vec![Property::MinFillDuration(*min_fill)],
            NodeSpec::Mixer | NodeSpec::SinkAuto => Vec::new(),
            NodeSpec::SinkFile { location } => vec![Property::Location(location.clone())],
        }
    }
}

/// A port on a specific node, addressable for linking.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PortTarget {
    pub(crate) node: NodeId,
    pub(crate) port: PortId,
}

impl PortTarget {
    /// The node the port belongs to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The runtime port handle.
    pub fn port(&self) -> PortId {
        self.port
    }
}

/// An owned handle to a created node.
///
/// Returned by [`Verzug::add`](crate::Verzug::add). Nodes are owned values:
/// passing one to [`chain`](crate::Verzug::chain) or
/// [`mix`](crate::Verzug::mix) moves it into the resulting composite, so a
/// node can never belong to two containers at once.
#[derive(Debug)]
pub struct AudioNode {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) element: ElementId,
    /// Static input port; `None` for sources and for mixers (dynamic inputs).
    pub(crate) input: Option<PortId>,
    /// Static output port; `None` for sinks.
    pub(crate) output: Option<PortId>,
}

impl AudioNode {
    /// The node's unique id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub(crate) fn input_target(&self) -> Option<PortTarget> {
        self.input.map(|port| PortTarget {
            node: self.id,
            port,
        })
    }

    pub(crate) fn output_target(&self) -> Option<PortTarget> {
        self.output.map(|port| PortTarget {
            node: self.id,
            port,
        })
    }
}
