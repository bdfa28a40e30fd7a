//! Effect elements: inputs in, outputs out.

mod delay;
mod mixer;

pub use delay::{DelayQueue, Regime};
pub use mixer::Mixer;
