use dasp_graph::{Buffer, Input};
use rtrb::Consumer;
use tracing::trace;

use crate::nodes::BlockElement;

/// Source reading samples from a ring buffer fed by the embedder.
///
/// Underruns produce silence rather than stalling the engine. The source
/// reports itself finished once the feeding producer has been dropped and
/// the ring is empty - dropping the producer is how an embedder signals
/// end-of-capture.
pub struct DeviceSource {
    consumer: Option<Consumer<f32>>,
    underruns: u64,
}

impl DeviceSource {
    pub(crate) fn new(consumer: Option<Consumer<f32>>) -> Self {
        DeviceSource {
            consumer,
            underruns: 0,
        }
    }
}

impl BlockElement for DeviceSource {
    fn process(&mut self, _inputs: &[Input], output: &mut [Buffer]) {
        let Some((first, rest)) = output.split_first_mut() else {
            return;
        };
        let mut underrun = 0u32;
        for sample in first.iter_mut() {
            *sample = match self.consumer.as_mut().and_then(|c| c.pop().ok()) {
                Some(v) => v,
                None => {
                    underrun += 1;
                    0.0
                }
            };
        }
        if underrun > 0 {
            self.underruns += u64::from(underrun);
            trace!(
                samples = underrun,
                total = self.underruns,
                "device source underrun, emitting silence"
            );
        }
        for buffer in rest {
            buffer.copy_from_slice(first);
        }
    }

    fn finished(&self) -> bool {
        match &self.consumer {
            Some(consumer) => consumer.is_abandoned() && consumer.slots() == 0,
            // A device that was bound but never fed counts as silent forever,
            // not as finished.
            None => false,
        }
    }
}
