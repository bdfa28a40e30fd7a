//! High-level graph building API.

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use tracing::debug;

use crate::error::{Error, RuntimeError};
use crate::graph::{Component, Composite};
use crate::node::{AudioNode, NodeId, NodeSpec, PortTarget};
use crate::pipeline::Pipeline;
use crate::runtime::{PipelineState, PortId, Runtime};

/// The graph builder - creates nodes and composes them into a pipeline.
///
/// `Verzug` wraps an injected [`Runtime`] and drives it through graph
/// assembly:
///
/// 1. Create nodes with [`add`](Self::add) - returns an owned [`AudioNode`]
/// 2. Compose them with [`chain`](Self::chain) and [`mix`](Self::mix)
/// 3. Seal the graph with [`assemble`](Self::assemble) - returns a runnable
///    [`Pipeline`]
///
/// Composers take ownership of what they are given, so a node or composite
/// can only ever sit in one container. `assemble` consumes the builder
/// itself: once a pipeline exists its topology cannot change.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use verzug::{BlockRuntime, NodeSpec, Verzug};
///
/// # fn main() -> Result<(), verzug::Error> {
/// let mut graph = Verzug::new(BlockRuntime::new());
///
/// let tone = graph.add(NodeSpec::test_tone_for(440.0, Duration::from_millis(50)))?;
/// let queue = graph.add(NodeSpec::delay_queue(Duration::from_millis(10)))?;
/// let sink = graph.add(NodeSpec::auto_sink())?;
///
/// let path = graph.chain([tone, queue, sink])?;
/// let pipeline = graph.assemble(path)?;
/// # let _ = pipeline;
/// # Ok(())
/// # }
/// ```
///
/// # Failed builds
///
/// Construction errors abort the failing call immediately. Elements already
/// created inside the runtime stay behind; callers are expected to discard
/// the whole build (drop the builder) rather than patch around the error.
pub struct Verzug<R: Runtime> {
    runtime: R,
    next_id: u64,
    /// Output ports with an established link.
    linked_outputs: HashSet<PortId>,
    /// Input ports with an established link.
    linked_inputs: HashSet<PortId>,
    /// Dynamically requested input ports, per mixer node.
    requested_inputs: HashMap<NodeId, Vec<PortId>>,
}

impl<R: Runtime> Verzug<R> {
    /// Wrap an injected runtime.
    ///
    /// The runtime's process-wide initialization (if it needs any) is the
    /// embedding application's business; it happens before this call.
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            next_id: 0,
            linked_outputs: HashSet::new(),
            linked_inputs: HashSet::new(),
            requested_inputs: HashMap::new(),
        }
    }

    /// Access the wrapped runtime.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Mutable access to the wrapped runtime.
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Create a node from a spec, with a generated `kind-counter` name.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] for invalid spec values
    /// - [`Error::UnsupportedNodeType`] if the runtime rejects the kind
    /// - [`Error::DeviceUnavailable`] if a device source cannot bind
    pub fn add(&mut self, spec: NodeSpec) -> Result<AudioNode, Error> {
        let name = format!("{}-{}", spec.kind(), self.next_id);
        self.add_named(spec, name)
    }

    /// Create a node with an explicit name.
    ///
    /// Names only matter for logs and runtime introspection; uniqueness of
    /// identity comes from the internal counter.
    pub fn add_named(&mut self, spec: NodeSpec, name: impl Into<String>) -> Result<AudioNode, Error> {
        let name = name.into();
        spec.validate(&name)?;

        let kind = spec.kind();
        let element = self
            .runtime
            .create_element(kind, &name)
            .map_err(|err| match err {
                RuntimeError::UnsupportedKind { kind } => Error::UnsupportedNodeType { kind },
                other => Error::Runtime(other),
            })?;

        for property in spec.properties() {
            self.runtime
                .set_property(element, property)
                .map_err(|err| match err {
                    RuntimeError::UnknownDevice { name } => Error::DeviceUnavailable { name },
                    other => Error::Runtime(other),
                })?;
        }

        let input = if kind.is_source() || kind.has_dynamic_inputs() {
            None
        } else {
            self.runtime.input_port(element)
        };
        let output = if kind.is_sink() {
            None
        } else {
            self.runtime.output_port(element)
        };

        let id = NodeId(self.next_id);
        self.next_id += 1;
        debug!(%kind, name = %name, "created node");

        Ok(AudioNode {
            id,
            name,
            kind,
            element,
            input,
            output,
        })
    }

    /// Link a sequence of components end-to-end into one composite.
    ///
    /// Takes ownership of all parts in order and links each part's output to
    /// the next part's input. The composite's virtual input is the first
    /// part's input (absent when it is a source) and its virtual output is
    /// the last part's output (absent when it is a sink). A single-part
    /// chain is legal and simply passes that part's ports through.
    ///
    /// # Errors
    ///
    /// [`Error::IncompatiblePorts`] if any internal link cannot be
    /// established; the whole composite is abandoned, nothing is handed back.
    pub fn chain<I>(&mut self, parts: I) -> Result<Composite, Error>
    where
        I: IntoIterator,
        I::Item: Into<Component>,
    {
        let parts: Vec<Component> = parts.into_iter().map(Into::into).collect();
        if parts.is_empty() {
            return Err(Error::Configuration {
                node: "chain".to_string(),
                reason: "a chain needs at least one component".to_string(),
            });
        }

        for (upstream, downstream) in parts.iter().tuple_windows() {
            let from = self.output_of(upstream)?;
            let to = self.input_of(downstream)?;
            self.link_ports(from, to, upstream.name(), downstream.name())?;
        }

        // The head's input is ghosted as the chain's own input. A mixer head
        // has no static input, so one port is requested for the ghost.
        let virtual_input = match &parts[0] {
            Component::Node(node) if node.kind.has_dynamic_inputs() => {
                Some(self.request_mixer_port(node)?)
            }
            part => part.virtual_input(),
        };
        let virtual_output = parts[parts.len() - 1].virtual_output();

        let name = format!("chain-{}", self.next_id);
        self.next_id += 1;
        debug!(
            name = %name,
            parts = parts.len(),
            "chained components"
        );

        Ok(Composite {
            name,
            children: parts,
            virtual_input,
            virtual_output,
        })
    }

    /// Fan a set of components into one summing mixer node.
    ///
    /// Creates a mixer, then - in the given order, which is preserved - draws
    /// a fresh input port from it for every component and links the
    /// component's output into that port. The composite's virtual output is
    /// the mixer's output; there is no virtual input.
    ///
    /// This is for genuine summation of several live branches. Wiring a
    /// single output into a fixed input is just a link inside
    /// [`chain`](Self::chain), no mixer needed.
    ///
    /// # Errors
    ///
    /// - [`Error::TooManyInputs`] once the mixer's port capacity is exhausted
    /// - [`Error::IncompatiblePorts`] if a component has no free output
    pub fn mix<I>(&mut self, parts: I) -> Result<Composite, Error>
    where
        I: IntoIterator,
        I::Item: Into<Component>,
    {
        let parts: Vec<Component> = parts.into_iter().map(Into::into).collect();
        if parts.is_empty() {
            return Err(Error::Configuration {
                node: "mix".to_string(),
                reason: "a mix needs at least one component".to_string(),
            });
        }

        let mixer = self.add(NodeSpec::mixer())?;

        for part in &parts {
            let from = self.output_of(part)?;
            let port = self
                .runtime
                .request_input_port(mixer.element)
                .map_err(|err| match err {
                    RuntimeError::PortsExhausted => Error::TooManyInputs {
                        mixer: mixer.name.clone(),
                    },
                    other => Error::Runtime(other),
                })?;
            self.requested_inputs
                .entry(mixer.id)
                .or_default()
                .push(port);
            let to = PortTarget {
                node: mixer.id,
                port,
            };
            self.link_ports(from, to, part.name(), &mixer.name)?;
        }

        let virtual_output = mixer.output_target();
        let name = format!("mix-{}", self.next_id);
        self.next_id += 1;
        debug!(name = %name, inputs = parts.len(), "mixed components");

        let mut children = parts;
        children.push(Component::Node(mixer));

        Ok(Composite {
            name,
            children,
            virtual_input: None,
            virtual_output,
        })
    }

    /// Seal a graph into a runnable [`Pipeline`].
    ///
    /// Validates completeness over the whole ownership tree: every non-source
    /// node must have its input linked, and every non-sink node's output must
    /// be linked or exposed as the root's virtual output. The builder is
    /// consumed; the pipeline's topology is immutable from here on.
    ///
    /// # Errors
    ///
    /// [`Error::IncompleteGraph`] naming the dangling node; no pipeline is
    /// created.
    pub fn assemble(self, root: impl Into<Component>) -> Result<Pipeline<R>, Error> {
        let root = root.into();
        let exposed_output = root.virtual_output().map(|target| target.port);

        let mut dangling: Option<String> = None;
        root.visit_nodes(&mut |node| {
            if dangling.is_some() {
                return;
            }
            dangling = self.check_node(node, exposed_output);
        });

        if let Some(reason) = dangling {
            return Err(Error::IncompleteGraph { reason });
        }

        debug!(root = root.name(), "assembled pipeline");
        Ok(Pipeline::new(self.runtime, root, PipelineState::Created))
    }

    /// One node's completeness check; returns a description of the first
    /// dangling port, if any.
    fn check_node(&self, node: &AudioNode, exposed_output: Option<PortId>) -> Option<String> {
        if node.kind.has_dynamic_inputs() {
            let ports = self
                .requested_inputs
                .get(&node.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if ports.is_empty() {
                return Some(format!("mixer '{}' has no inputs", node.name));
            }
            if ports.iter().any(|port| !self.linked_inputs.contains(port)) {
                return Some(format!(
                    "mixer '{}' has an allocated but unlinked input port",
                    node.name
                ));
            }
        } else if !node.kind.is_source() {
            match node.input {
                Some(port) if self.linked_inputs.contains(&port) => {}
                _ => return Some(format!("'{}' has an unlinked input port", node.name)),
            }
        }

        if !node.kind.is_sink() {
            match node.output {
                Some(port)
                    if self.linked_outputs.contains(&port) || exposed_output == Some(port) => {}
                _ => return Some(format!("'{}' has an unlinked output port", node.name)),
            }
        }

        None
    }

    /// Resolve where a link out of `part` leaves from.
    fn output_of(&self, part: &Component) -> Result<PortTarget, Error> {
        part.virtual_output().ok_or_else(|| Error::IncompatiblePorts {
            from: part.name().to_string(),
            to: String::new(),
            reason: "component has no output port".to_string(),
        })
    }

    /// Resolve where a link into `part` arrives, requesting a mixer port
    /// when the target has dynamic inputs.
    fn input_of(&mut self, part: &Component) -> Result<PortTarget, Error> {
        if let Component::Node(node) = part {
            if node.kind.has_dynamic_inputs() {
                return self.request_mixer_port(node);
            }
        }
        part.virtual_input().ok_or_else(|| Error::IncompatiblePorts {
            from: String::new(),
            to: part.name().to_string(),
            reason: "component has no input port".to_string(),
        })
    }

    fn request_mixer_port(&mut self, node: &AudioNode) -> Result<PortTarget, Error> {
        let port = self
            .runtime
            .request_input_port(node.element)
            .map_err(|err| match err {
                RuntimeError::PortsExhausted => Error::TooManyInputs {
                    mixer: node.name.clone(),
                },
                other => Error::Runtime(other),
            })?;
        self.requested_inputs.entry(node.id).or_default().push(port);
        Ok(PortTarget {
            node: node.id,
            port,
        })
    }

    /// Establish one output -> input link, with double-link protection on
    /// both sides.
    fn link_ports(
        &mut self,
        from: PortTarget,
        to: PortTarget,
        from_name: &str,
        to_name: &str,
    ) -> Result<(), Error> {
        let incompatible = |reason: String| Error::IncompatiblePorts {
            from: from_name.to_string(),
            to: to_name.to_string(),
            reason,
        };

        if self.linked_outputs.contains(&from.port) {
            return Err(incompatible("output port is already linked".to_string()));
        }
        if self.linked_inputs.contains(&to.port) {
            return Err(incompatible("input port is already linked".to_string()));
        }

        self.runtime
            .link(from.port, to.port)
            .map_err(|err| incompatible(err.to_string()))?;

        self.linked_outputs.insert(from.port);
        self.linked_inputs.insert(to.port);
        debug!(from = from_name, to = to_name, "linked");
        Ok(())
    }
}
