use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use dasp_graph::{Buffer, Input};
use rtrb::{Producer, RingBuffer};
use tracing::{debug, warn};

use crate::device::CpalDevice;
use crate::nodes::BlockElement;

/// How long to wait on a full ring before giving up on a block.
const BACKPRESSURE_LIMIT: Duration = Duration::from_secs(1);

/// Plays received samples on a system output device.
///
/// Samples go through a lock-free ring into the device callback; the mono
/// stream is duplicated across the device's channels. When the ring is full
/// the sink blocks, which paces the whole engine to wall-clock time.
pub struct CpalSink {
    _stream: cpal::Stream,
    producer: Producer<f32>,
    fault: Option<String>,
}

impl CpalSink {
    /// Open the default output device at the engine's sample rate.
    pub(crate) fn open_default(sample_rate: u32) -> Result<Self, String> {
        let device = CpalDevice::default_output()
            .ok_or_else(|| "no default output device".to_string())?;
        Self::open(&device, sample_rate)
    }

    pub(crate) fn open(device: &CpalDevice, sample_rate: u32) -> Result<Self, String> {
        let mut config = device.stream_config(sample_rate)?;
        config.buffer_size = cpal::BufferSize::Default;
        let channels = config.channels as usize;

        // Roughly a quarter second of slack between engine and callback.
        let (producer, mut consumer) = RingBuffer::<f32>::new((sample_rate as usize / 4).max(512));

        let stream = device
            .raw_device()
            .build_output_stream::<f32, _, _>(
                &config,
                move |data, _| {
                    for frame in data.chunks_mut(channels) {
                        let v = consumer.pop().unwrap_or(0.0);
                        for slot in frame.iter_mut() {
                            *slot = v;
                        }
                    }
                },
                move |err| {
                    warn!(error = %err, "output stream error");
                },
                None,
            )
            .map_err(|err| err.to_string())?;
        stream.play().map_err(|err| err.to_string())?;
        debug!(device = device.name(), "cpal sink opened");

        Ok(CpalSink {
            _stream: stream,
            producer,
            fault: None,
        })
    }
}

impl BlockElement for CpalSink {
    fn process(&mut self, inputs: &[Input], _output: &mut [Buffer]) {
        let Some(buffer) = inputs.first().and_then(|input| input.buffers().first()) else {
            return;
        };
        let deadline = Instant::now() + BACKPRESSURE_LIMIT;
        for &sample in buffer.iter() {
            loop {
                match self.producer.push(sample) {
                    Ok(()) => break,
                    Err(_) if Instant::now() < deadline => {
                        // Ring full: the device callback is behind us. Wait.
                        std::thread::sleep(Duration::from_micros(500));
                    }
                    Err(_) => {
                        self.fault = Some("output device stopped consuming audio".to_string());
                        return;
                    }
                }
            }
        }
    }

    fn poll_fault(&mut self) -> Option<String> {
        self.fault.take()
    }
}
