use dasp_graph::node::Sum;
use dasp_graph::{Buffer, Input, Node};

use crate::nodes::BlockElement;

/// Sums every linked input into one output, sample by sample.
///
/// Inputs are weighted equally; this genuinely mixes, it does not pick one
/// input or concatenate.
pub struct Mixer {
    sum: Sum,
}

impl Mixer {
    pub(crate) fn new() -> Self {
        Mixer { sum: Sum }
    }
}

impl BlockElement for Mixer {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        Node::process(&mut self.sum, inputs, output);
    }
}
