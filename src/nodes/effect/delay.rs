use std::collections::VecDeque;

use dasp_graph::{Buffer, Input};
use tracing::debug;

use crate::nodes::BlockElement;

/// The two observable regimes of a [`DelayQueue`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Regime {
    /// Buffered duration is still below the fill threshold; nothing comes
    /// out.
    Filling,
    /// The threshold has been reached; data flows with a constant latency of
    /// the configured duration. The queue never returns to Filling.
    Flowing,
}

/// Buffering queue that realizes a fixed time offset.
///
/// Input is absorbed unboundedly; output is withheld until the configured
/// minimum duration has accumulated, after which every sample leaves exactly
/// `delay` sample positions after it arrived. Two branches merged at a mixer
/// - one through a queue with delay `d`, one direct - therefore arrive with
/// a relative offset of exactly `d`.
///
/// The threshold is fixed at construction.
pub struct DelayQueue {
    /// Delay in samples.
    delay: u64,
    buf: VecDeque<f32>,
    /// Absolute output sample position.
    position: u64,
    flowing: bool,
    /// Set by the engine once every source is exhausted; stops intake so the
    /// queue can drain.
    input_done: bool,
}

impl DelayQueue {
    pub(crate) fn new(delay_samples: u64) -> Self {
        DelayQueue {
            delay: delay_samples,
            buf: VecDeque::new(),
            position: 0,
            flowing: delay_samples == 0,
            input_done: false,
        }
    }

    /// Current regime. Flowing is sticky.
    pub fn regime(&self) -> Regime {
        if self.flowing {
            Regime::Flowing
        } else {
            Regime::Filling
        }
    }

    /// Samples currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Stop absorbing input so the buffered remainder can drain.
    ///
    /// Upstream elements keep producing silence after end-of-stream; without
    /// this cut-off the queue would refill forever and the pipeline could
    /// never report completion.
    pub(crate) fn set_input_done(&mut self) {
        self.input_done = true;
    }
}

impl BlockElement for DelayQueue {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        if !self.input_done {
            // One upstream link; anything beyond the first input is not ours.
            if let Some(input) = inputs.first() {
                if let Some(buffer) = input.buffers().first() {
                    self.buf.extend(buffer.iter().copied());
                }
            }
        }

        if !self.flowing && self.buf.len() as u64 >= self.delay {
            self.flowing = true;
            debug!(delay = self.delay, "delay queue reached fill threshold");
        }

        let Some((first, rest)) = output.split_first_mut() else {
            return;
        };
        for sample in first.iter_mut() {
            *sample = if self.position >= self.delay {
                self.buf.pop_front().unwrap_or(0.0)
            } else {
                0.0
            };
            self.position += 1;
        }
        for buffer in rest {
            buffer.copy_from_slice(first);
        }
    }

    fn finished(&self) -> bool {
        self.input_done && self.buf.is_empty()
    }
}
