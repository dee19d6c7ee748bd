/*!
# Inflight Engine - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` trait from `inflight_engine`.

Built on `ash` for the Vulkan bindings and `gpu-allocator` for memory
management. Requires Vulkan 1.3 (synchronization2 and dynamic rendering).
The device is headless: presentation is left to the application.

```no_run
use std::sync::Arc;
use inflight_engine::inflight::{Config, DeviceContext};
use inflight_engine_vulkan::VulkanGraphicsDevice;

let config = Config::default();
let device = Arc::new(VulkanGraphicsDevice::new(&config)?);
let mut context = DeviceContext::new(device, &config)?;

context.begin_frame()?;
// record and submit, signaling context.frame_fence()
context.end_frame();
# Ok::<(), inflight_engine::inflight::Error>(())
```
*/

mod debug;
mod vulkan_conversions;
mod vulkan_device;
mod vulkan_graphics_device;

pub use vulkan_device::{VulkanGraphicsDevice, VulkanMemory};

// Validation layer reporting
pub use debug::{DebugConfig, DebugSeverity, ValidationStats, validation_stats, print_validation_stats_report};
