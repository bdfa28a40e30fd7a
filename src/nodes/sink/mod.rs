//! Sink elements: consume audio, no outputs.

mod collect;
mod file;

pub use collect::CollectSink;
pub use file::FileSink;

#[cfg(feature = "cpal_sink")]
mod cpal;

#[cfg(feature = "cpal_sink")]
pub use self::cpal::CpalSink;
