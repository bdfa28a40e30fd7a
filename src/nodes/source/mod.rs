//! Source elements: produce audio, no inputs.

mod device;

pub use device::DeviceSource;
pub use test::TestTone;
