/// Graphics device module - the backend seam and its vocabulary types

pub mod graphics_device;
pub mod sync;
pub mod buffer;
pub mod image;
pub mod descriptor;
pub mod pipeline;
pub mod rendering;

pub use graphics_device::*;
pub use sync::*;
pub use buffer::*;
pub use image::*;
pub use descriptor::*;
pub use pipeline::*;
pub use rendering::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
