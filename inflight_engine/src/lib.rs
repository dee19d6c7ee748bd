/*!
# Inflight Engine

Host-side resource lifetime and command submission core for an explicit GPU API.

The crate keeps CPU recording ahead of the GPU by rotating N frame slots.
Each slot owns its command pools, staging memory and descriptor pools, which
are reclaimed wholesale once the slot's completion fence proves the GPU is
done with them. Backends plug in through the [`inflight::GraphicsDevice`]
trait; the Vulkan backend lives in `inflight_engine_vulkan`.

## Architecture

- **DeviceContext**: frame rotation, fence waits and resource factories
- **FrameContext**: per-slot recyclers, staging allocators, descriptor pools and zombie lists
- **CommandRecorder**: command buffer wrapper with uploads and a batched barrier builder
- **ObjectPool**: dense storage with stable indices for backend handle tables
*/

// Internal modules
mod error;
mod engine;
mod config;
mod graphics_device;
mod frame;
mod device_context;
mod utils;
pub mod log;

// Main inflight namespace module
pub mod inflight {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging facade
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::{Config, AsyncComputePolicy, MAX_FRAMES_IN_FLIGHT};

    // Frame rotation
    pub use crate::device_context::{DeviceContext, DeviceBuffer, DeviceImage, DeviceDescriptorWrite};

    // Backend seam
    pub use crate::graphics_device::{GraphicsDevice, DeviceHandle, QueueType};

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Device vocabulary: handles, descriptions, barriers
    pub mod render {
        pub use crate::graphics_device::*;
    }

    // Per-frame recording and transient allocation
    pub mod frame {
        pub use crate::frame::*;
    }

    // Storage helpers
    pub mod memory {
        pub use crate::utils::ObjectPool;
    }
}
