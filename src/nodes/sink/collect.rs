use dasp_graph::{Buffer, Input};

use crate::nodes::BlockElement;

/// Accumulates everything it receives, for inspection after a run.
///
/// This is the sink `sink-auto` resolves to when no real output device is
/// in play, and the workhorse of the integration tests.
pub struct CollectSink {
    samples: Vec<f32>,
}

impl CollectSink {
    pub(crate) fn new() -> Self {
        CollectSink {
            samples: Vec::new(),
        }
    }

    /// Everything received so far.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl BlockElement for CollectSink {
    fn process(&mut self, inputs: &[Input], _output: &mut [Buffer]) {
        // A sink has exactly one linked input.
        if let Some(input) = inputs.first() {
            if let Some(buffer) = input.buffers().first() {
                self.samples.extend_from_slice(buffer);
            }
        }
    }
}
