use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use dasp_graph::{Buffer, Input};
use tracing::debug;

use crate::nodes::BlockElement;

/// Writes received samples to a file as raw little-endian `f32`.
///
/// Container formats are somebody else's job; this dumps the stream. A
/// write failure is held as a fault for the engine to post on the bus, after
/// which the sink discards further input.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    fault: Option<String>,
}

impl FileSink {
    pub(crate) fn create(path: &Path) -> std::io::Result<Self> {
        let writer = BufWriter::new(File::create(path)?);
        debug!(path = %path.display(), "file sink opened");
        Ok(FileSink {
            path: path.to_path_buf(),
            writer: Some(writer),
            fault: None,
        })
    }

    fn write_samples(&mut self, samples: &[f32]) {
        let Some(writer) = &mut self.writer else {
            return;
        };
        for sample in samples {
            if let Err(err) = writer.write_all(&sample.to_le_bytes()) {
                self.fault = Some(format!(
                    "file sink write failed: {}: {err}",
                    self.path.display()
                ));
                self.writer = None;
                return;
            }
        }
    }
}

impl BlockElement for FileSink {
    fn process(&mut self, inputs: &[Input], _output: &mut [Buffer]) {
        if let Some(input) = inputs.first() {
            if let Some(buffer) = input.buffers().first() {
                self.write_samples(buffer);
            }
        }
    }

    fn poll_fault(&mut self) -> Option<String> {
        self.fault.take()
    }

    fn shutdown(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.flush() {
                self.fault = Some(format!(
                    "file sink flush failed: {}: {err}",
                    self.path.display()
                ));
            }
        }
    }
}
