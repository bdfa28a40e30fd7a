//! Audio signal-routing graphs with delay-aligned branches.
//!
//! `verzug` composes elementary audio nodes - sources, delay queues, mixers,
//! sinks - into a pipeline with deterministic topology, then drives that
//! pipeline through a monitored run-to-completion loop. The actual sample
//! pushing is delegated to a [`Runtime`] injected by the embedding
//! application; [`BlockRuntime`] is the built-in synchronous one.
//!
//! The original motivation: take two copies of a signal, delay one through a
//! queue with a minimum-fill threshold, and sum both at a mixer, so the
//! branches arrive deliberately offset in time.
//!
//! ```
//! use std::time::Duration;
//! use verzug::{BlockRuntime, NodeSpec, PlaybackController, TerminationReason, Verzug};
//!
//! # fn main() -> Result<(), verzug::Error> {
//! let mut graph = Verzug::new(BlockRuntime::new());
//!
//! let tone_a = graph.add(NodeSpec::test_tone_for(440.0, Duration::from_millis(20)))?;
//! let queue_a = graph.add(NodeSpec::delay_queue(Duration::ZERO))?;
//! let direct = graph.chain([tone_a, queue_a])?;
//!
//! let tone_b = graph.add(NodeSpec::test_tone_for(440.0, Duration::from_millis(20)))?;
//! let queue_b = graph.add(NodeSpec::delay_queue(Duration::from_millis(5)))?;
//! let delayed = graph.chain([tone_b, queue_b])?;
//!
//! let mixed = graph.mix([direct, delayed])?;
//! let sink = graph.add(NodeSpec::auto_sink())?;
//! let root = graph.chain::<Vec<verzug::Component>>(vec![mixed.into(), sink.into()])?;
//!
//! let mut pipeline = graph.assemble(root)?;
//! let reason = PlaybackController::new().run(&mut pipeline)?;
//! assert_eq!(reason, TerminationReason::EndOfStream);
//! # Ok(())
//! # }
//! ```
//!
//! # Design notes
//!
//! - Nodes and composites are *owned values*: composing them moves them into
//!   their container, so nothing can sit in two containers at once.
//! - Graph construction is single-threaded and synchronous; once
//!   [`Verzug::assemble`] succeeds the topology is immutable.
//! - The playback loop blocks in bounded-timeout polls and observes an
//!   [`Interrupt`] between polls; cancellation is cooperative.

#![warn(missing_docs)]

mod block;
mod controller;
mod error;
mod graph;
mod node;
pub mod nodes;
mod pipeline;
mod runtime;
mod verzug;

#[cfg(feature = "cpal_sink")]
mod device;

pub use block::BlockRuntime;
pub use controller::{Interrupt, PlaybackController, TerminationReason};
pub use error::{Error, LinkError, RuntimeError};
pub use graph::{Component, Composite};
pub use node::{AudioNode, NodeId, NodeKind, NodeSpec, PortTarget};
pub use nodes::Regime;
pub use pipeline::Pipeline;
pub use runtime::{
    BusEvent, ElementId, PipelineState, PortDirection, PortId, Property, Runtime,
};
pub use verzug::Verzug;

#[cfg(feature = "cpal_sink")]
pub use device::CpalDevice;
