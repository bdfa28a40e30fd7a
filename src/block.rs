//! Synchronous, block-based reference implementation of [`Runtime`].
//!
//! `BlockRuntime` exists so graphs built with this crate can be exercised
//! end-to-end without an external media framework: mono `f32` audio, fixed
//! 64-sample blocks, one pull of the whole element graph per block. It is
//! not a real-time engine; with a device sink (`cpal_sink` feature) the ring
//! buffer's backpressure paces it to wall-clock, otherwise it runs as fast
//! as it is polled.
//!
//! Elements are described up front (create, set properties, link) and the
//! processing graph is instantiated when the runtime transitions to Playing.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use dasp_graph::{NodeData, Processor};
use hashbrown::{HashMap, HashSet};
use petgraph::graph::NodeIndex;
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, warn};

use crate::error::{LinkError, RuntimeError};
use crate::node::NodeKind;
use crate::nodes::{
    BlockElement, CollectSink, DelayQueue, DeviceSource, ElementNode, FileSink, Finalizer, Mixer,
    Regime, TestTone,
};
use crate::runtime::{
    BusEvent, ElementId, PipelineState, PortDirection, PortId, Property, Runtime,
};

#[cfg(feature = "cpal_sink")]
use crate::nodes::CpalSink;

type EngineGraph = petgraph::graph::Graph<NodeData<ElementNode>, ()>;

/// Samples per processing block (dasp_graph's buffer length).
const BLOCK: usize = 64;

/// Input ports a mixer can hand out before reporting exhaustion.
pub(crate) const MIXER_INPUT_CAPACITY: usize = 16;

/// Everything known about an element before the engine is built.
struct ElementEntry {
    kind: NodeKind,
    name: String,
    device: Option<String>,
    frequency: f32,
    stream_duration: Option<Duration>,
    min_fill: Duration,
    location: Option<PathBuf>,
    /// Static input port, or the requested ports of a mixer.
    input_ports: Vec<PortId>,
    output_port: Option<PortId>,
}

struct PortEntry {
    element: ElementId,
    direction: PortDirection,
}

/// The instantiated processing graph, built at the Playing transition.
struct Engine {
    graph: EngineGraph,
    processor: Processor<EngineGraph>,
    finalizer: NodeIndex,
    /// Element order preserved from creation.
    nodes: Vec<(ElementId, NodeIndex)>,
    sources_done: bool,
}

impl Engine {
    fn process_block(&mut self, bus: &mut VecDeque<BusEvent>) {
        self.processor.process(&mut self.graph, self.finalizer);

        for &(_, idx) in &self.nodes {
            if let Some(fault) = self.graph[idx].node.poll_fault() {
                bus.push_back(BusEvent::Error(fault));
            }
        }

        // Once every source is exhausted, cut queue intake so buffered
        // audio drains instead of being topped up with silence forever.
        if !self.sources_done {
            let mut any_source = false;
            let mut all_done = true;
            for &(_, idx) in &self.nodes {
                let node = &self.graph[idx].node;
                if node.is_source() {
                    any_source = true;
                    all_done &= node.finished();
                }
            }
            if any_source && all_done {
                self.sources_done = true;
                for &(_, idx) in &self.nodes {
                    if let Some(queue) = self.graph[idx].node.as_delay_queue_mut() {
                        queue.set_input_done();
                    }
                }
                debug!("all sources exhausted, draining queues");
            }
        }
    }

    fn finished(&self) -> bool {
        self.sources_done
            && self
                .nodes
                .iter()
                .all(|&(_, idx)| self.graph[idx].node.finished())
    }

    fn shutdown(&mut self, bus: &mut VecDeque<BusEvent>) {
        for &(_, idx) in &self.nodes {
            let node = &mut self.graph[idx].node;
            node.shutdown();
            if let Some(fault) = node.poll_fault() {
                // The run is already over; a flush failure is only a warning.
                bus.push_back(BusEvent::Warning(fault));
            }
        }
    }
}

/// The crate's own [`Runtime`]: a deterministic block engine.
///
/// # Example
///
/// ```
/// use verzug::{BlockRuntime, NodeSpec, PlaybackController, TerminationReason, Verzug};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), verzug::Error> {
/// let mut graph = Verzug::new(BlockRuntime::new());
/// let tone = graph.add(NodeSpec::test_tone_for(440.0, Duration::from_millis(20)))?;
/// let sink = graph.add(NodeSpec::auto_sink())?;
/// let path = graph.chain([tone, sink])?;
/// let mut pipeline = graph.assemble(path)?;
///
/// let reason = PlaybackController::new().run(&mut pipeline)?;
/// assert_eq!(reason, TerminationReason::EndOfStream);
/// # Ok(())
/// # }
/// ```
///
/// # Devices
///
/// Capture devices are virtual: [`register_device`](Self::register_device)
/// returns a ring-buffer producer the embedder (or a test) feeds samples
/// into. A `source-device` node binding an unregistered name fails. Dropping
/// the producer signals end-of-capture.
pub struct BlockRuntime {
    sample_rate: u32,
    /// Registered capture devices; the consumer is handed to the source
    /// element when the engine is built.
    devices: HashMap<String, Option<Consumer<f32>>>,
    elements: HashMap<ElementId, ElementEntry>,
    /// Creation order, for deterministic engine construction.
    order: Vec<ElementId>,
    ports: HashMap<PortId, PortEntry>,
    links: Vec<(PortId, PortId)>,
    linked_outputs: HashSet<PortId>,
    linked_inputs: HashSet<PortId>,
    next_element: u64,
    next_port: u64,
    state: PipelineState,
    bus: VecDeque<BusEvent>,
    engine: Option<Engine>,
    eos_posted: bool,
}

impl Default for BlockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRuntime {
    /// A runtime at the default 48 kHz sample rate.
    pub fn new() -> Self {
        Self::with_sample_rate(48_000)
    }

    /// A runtime at an explicit sample rate.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            devices: HashMap::new(),
            elements: HashMap::new(),
            order: Vec::new(),
            ports: HashMap::new(),
            links: Vec::new(),
            linked_outputs: HashSet::new(),
            linked_inputs: HashSet::new(),
            next_element: 0,
            next_port: 0,
            state: PipelineState::Created,
            bus: VecDeque::new(),
            engine: None,
            eos_posted: false,
        }
    }

    /// The engine sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Register a virtual capture device and get the producer that feeds it.
    ///
    /// `capacity` is in samples. Dropping the returned producer marks the
    /// device's stream as ended.
    pub fn register_device(
        &mut self,
        name: impl Into<String>,
        capacity: usize,
    ) -> Producer<f32> {
        let (producer, consumer) = RingBuffer::new(capacity.max(BLOCK));
        self.devices.insert(name.into(), Some(consumer));
        producer
    }

    /// Push an event onto the bus, ahead of anything the engine produces.
    ///
    /// Meant for tests and embedders simulating runtime conditions.
    pub fn inject_event(&mut self, event: BusEvent) {
        self.bus.push_back(event);
    }

    /// Process up to `blocks` blocks without consuming bus events.
    ///
    /// Does nothing unless the runtime is Playing. Useful for stepping a
    /// pipeline deterministically in tests.
    pub fn step(&mut self, blocks: u64) {
        if self.state != PipelineState::Playing {
            return;
        }
        if let Some(event) = self.pump(blocks) {
            self.bus.push_front(event);
        }
    }

    /// Names of all created elements, in creation order.
    pub fn element_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|id| self.elements.get(id))
            .map(|entry| entry.name.as_str())
            .collect()
    }

    /// How many input ports an element currently has.
    pub fn input_port_count(&self, name: &str) -> Option<usize> {
        self.entry_by_name(name).map(|entry| entry.input_ports.len())
    }

    /// How many links have been established.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Samples received by the named collecting sink.
    ///
    /// Only meaningful once the engine exists (after the Playing
    /// transition); `sink-auto` nodes resolve to a collecting sink when no
    /// real output device is in play.
    pub fn collected(&self, name: &str) -> Option<&[f32]> {
        self.engine_node(name)?.as_collect().map(CollectSink::samples)
    }

    /// The named delay queue's current regime.
    pub fn queue_regime(&self, name: &str) -> Option<Regime> {
        self.engine_node(name)?.as_delay_queue().map(DelayQueue::regime)
    }

    fn entry_by_name(&self, name: &str) -> Option<&ElementEntry> {
        self.elements.values().find(|entry| entry.name == name)
    }

    fn id_by_name(&self, name: &str) -> Option<ElementId> {
        self.elements
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(id, _)| *id)
    }

    fn engine_node(&self, name: &str) -> Option<&ElementNode> {
        let id = self.id_by_name(name)?;
        let engine = self.engine.as_ref()?;
        let &(_, idx) = engine.nodes.iter().find(|(element, _)| *element == id)?;
        Some(&engine.graph[idx].node)
    }

    fn alloc_port(&mut self, element: ElementId, direction: PortDirection) -> PortId {
        let port = PortId(self.next_port);
        self.next_port += 1;
        self.ports.insert(port, PortEntry { element, direction });
        port
    }

    fn samples(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * f64::from(self.sample_rate)).round() as u64
    }

    /// Instantiate one element from its description.
    fn instantiate(&mut self, id: ElementId) -> Result<ElementNode, RuntimeError> {
        let entry = &self.elements[&id];
        match entry.kind {
            NodeKind::SourceTest => Ok(ElementNode::TestTone(TestTone::new(
                self.sample_rate,
                entry.frequency,
                entry.stream_duration,
            ))),
            NodeKind::SourceDevice => {
                let device = entry.device.clone().ok_or_else(|| {
                    RuntimeError::Backend("device source has no device bound".to_string())
                })?;
                let consumer = self
                    .devices
                    .get_mut(&device)
                    .ok_or(RuntimeError::UnknownDevice { name: device.clone() })?
                    .take();
                if consumer.is_none() {
                    warn!(device = %device, "device feed already taken, source will be silent");
                }
                Ok(ElementNode::DeviceSource(DeviceSource::new(consumer)))
            }
            NodeKind::DelayQueue => Ok(ElementNode::DelayQueue(DelayQueue::new(
                self.samples(entry.min_fill),
            ))),
            NodeKind::Mixer => Ok(ElementNode::Mixer(Mixer::new())),
            NodeKind::SinkAuto => {
                #[cfg(feature = "cpal_sink")]
                {
                    match CpalSink::open_default(self.sample_rate) {
                        Ok(sink) => return Ok(ElementNode::Cpal(sink)),
                        Err(err) => {
                            warn!(error = %err, "no usable output device, collecting instead")
                        }
                    }
                }
                Ok(ElementNode::Collect(CollectSink::new()))
            }
            NodeKind::SinkFile => {
                let location = entry.location.clone().ok_or_else(|| {
                    RuntimeError::Backend("file sink has no location set".to_string())
                })?;
                FileSink::create(&location)
                    .map(ElementNode::File)
                    .map_err(|err| {
                        RuntimeError::Backend(format!(
                            "cannot open {}: {err}",
                            location.display()
                        ))
                    })
            }
        }
    }

    fn build_engine(&mut self) -> Result<Engine, RuntimeError> {
        let mut graph = EngineGraph::with_capacity(64, 64);
        let processor = Processor::with_capacity(64);
        let mut nodes = Vec::with_capacity(self.order.len());
        let mut index_of: HashMap<ElementId, NodeIndex> = HashMap::new();

        let order = self.order.clone();
        for &id in &order {
            let element = self.instantiate(id)?;
            let idx = graph.add_node(NodeData::new1(element));
            index_of.insert(id, idx);
            nodes.push((id, idx));
        }

        for &(from, to) in &self.links {
            let from_element = self.ports[&from].element;
            let to_element = self.ports[&to].element;
            graph.add_edge(index_of[&from_element], index_of[&to_element], ());
        }

        // The finalizer consumes every sink and every unconsumed output, so
        // a single pull per block covers the whole graph.
        let finalizer = graph.add_node(NodeData::new1(ElementNode::Finalizer(Finalizer)));
        for &id in &order {
            let entry = &self.elements[&id];
            let consumed = entry
                .output_port
                .map(|port| self.linked_outputs.contains(&port))
                .unwrap_or(false);
            if !consumed {
                graph.add_edge(index_of[&id], finalizer, ());
            }
        }

        debug!(
            elements = order.len(),
            links = self.links.len(),
            "engine built"
        );

        Ok(Engine {
            graph,
            processor,
            finalizer,
            nodes,
            sources_done: false,
        })
    }

    /// Process up to `blocks` blocks, stopping early on a bus event.
    fn pump(&mut self, blocks: u64) -> Option<BusEvent> {
        let engine = self.engine.as_mut()?;
        for _ in 0..blocks {
            engine.process_block(&mut self.bus);
            if !self.eos_posted && engine.finished() {
                self.eos_posted = true;
                self.bus.push_back(BusEvent::EndOfStream);
                debug!("end of stream");
            }
            if let Some(event) = self.bus.pop_front() {
                return Some(event);
            }
        }
        None
    }
}

impl Runtime for BlockRuntime {
    fn create_element(&mut self, kind: NodeKind, name: &str) -> Result<ElementId, RuntimeError> {
        if self.state != PipelineState::Created {
            return Err(RuntimeError::InvalidState {
                reason: format!("cannot create elements while {:?}", self.state),
            });
        }

        let id = ElementId(self.next_element);
        self.next_element += 1;

        let input_ports = if kind.is_source() || kind.has_dynamic_inputs() {
            Vec::new()
        } else {
            vec![self.alloc_port(id, PortDirection::Input)]
        };
        let output_port = if kind.is_sink() {
            None
        } else {
            Some(self.alloc_port(id, PortDirection::Output))
        };

        self.elements.insert(
            id,
            ElementEntry {
                kind,
                name: name.to_string(),
                device: None,
                frequency: 440.0,
                stream_duration: None,
                min_fill: Duration::ZERO,
                location: None,
                input_ports,
                output_port,
            },
        );
        self.order.push(id);
        Ok(id)
    }

    fn set_property(
        &mut self,
        element: ElementId,
        property: Property,
    ) -> Result<(), RuntimeError> {
        // Device existence is checked at bind time, so factories learn about
        // a bad device name before anything plays.
        if let Property::Device(name) = &property {
            if !self.devices.contains_key(name) {
                return Err(RuntimeError::UnknownDevice { name: name.clone() });
            }
        }

        let entry = self
            .elements
            .get_mut(&element)
            .ok_or_else(|| RuntimeError::Backend("unknown element".to_string()))?;

        match (entry.kind, property) {
            (NodeKind::SourceDevice, Property::Device(name)) => entry.device = Some(name),
            (NodeKind::SourceTest, Property::Frequency(frequency)) => {
                entry.frequency = frequency
            }
            (NodeKind::SourceTest, Property::StreamDuration(duration)) => {
                entry.stream_duration = Some(duration)
            }
            (NodeKind::DelayQueue, Property::MinFillDuration(duration)) => {
                entry.min_fill = duration
            }
            (NodeKind::SinkFile, Property::Location(path)) => entry.location = Some(path),
            (_, property) => {
                return Err(RuntimeError::InvalidProperty {
                    property: format!("{property:?}"),
                })
            }
        }
        Ok(())
    }

    fn input_port(&self, element: ElementId) -> Option<PortId> {
        let entry = self.elements.get(&element)?;
        if entry.kind.has_dynamic_inputs() {
            return None;
        }
        entry.input_ports.first().copied()
    }

    fn output_port(&self, element: ElementId) -> Option<PortId> {
        self.elements.get(&element)?.output_port
    }

    fn request_input_port(&mut self, element: ElementId) -> Result<PortId, RuntimeError> {
        let entry = self
            .elements
            .get_mut(&element)
            .ok_or_else(|| RuntimeError::Backend("unknown element".to_string()))?;
        if !entry.kind.has_dynamic_inputs() {
            return Err(RuntimeError::Backend(
                "element has no requestable input ports".to_string(),
            ));
        }
        if entry.input_ports.len() >= MIXER_INPUT_CAPACITY {
            return Err(RuntimeError::PortsExhausted);
        }
        let port = PortId(self.next_port);
        self.next_port += 1;
        self.ports.insert(
            port,
            PortEntry {
                element,
                direction: PortDirection::Input,
            },
        );
        entry.input_ports.push(port);
        Ok(port)
    }

    fn link(&mut self, from: PortId, to: PortId) -> Result<(), LinkError> {
        let from_entry = self.ports.get(&from).ok_or(LinkError::UnknownPort)?;
        let to_entry = self.ports.get(&to).ok_or(LinkError::UnknownPort)?;

        if from_entry.direction != PortDirection::Output
            || to_entry.direction != PortDirection::Input
        {
            return Err(LinkError::DirectionMismatch);
        }
        if self.linked_outputs.contains(&from) {
            return Err(LinkError::OutputTaken);
        }
        if self.linked_inputs.contains(&to) {
            return Err(LinkError::InputTaken);
        }

        self.linked_outputs.insert(from);
        self.linked_inputs.insert(to);
        self.links.push((from, to));
        Ok(())
    }

    fn set_state(&mut self, state: PipelineState) -> Result<(), RuntimeError> {
        match (self.state, state) {
            (PipelineState::Created, PipelineState::Playing) => {
                self.engine = Some(self.build_engine()?);
                self.state = PipelineState::Playing;
                self.bus
                    .push_back(BusEvent::StateChanged(PipelineState::Playing));
                debug!("runtime playing");
                Ok(())
            }
            (PipelineState::Created | PipelineState::Playing, PipelineState::Stopped) => {
                if let Some(engine) = &mut self.engine {
                    engine.shutdown(&mut self.bus);
                }
                self.state = PipelineState::Stopped;
                self.bus
                    .push_back(BusEvent::StateChanged(PipelineState::Stopped));
                debug!("runtime stopped");
                Ok(())
            }
            (PipelineState::Stopped, PipelineState::Stopped) => Ok(()),
            (current, requested) => Err(RuntimeError::InvalidState {
                reason: format!("{current:?} -> {requested:?}"),
            }),
        }
    }

    fn poll(&mut self, timeout: Duration) -> Option<BusEvent> {
        if let Some(event) = self.bus.pop_front() {
            return Some(event);
        }
        if self.state != PipelineState::Playing || timeout.is_zero() {
            return None;
        }
        let blocks = ((timeout.as_secs_f64() * f64::from(self.sample_rate) / BLOCK as f64).ceil()
            as u64)
            .max(1);
        self.pump(blocks)
    }
}
