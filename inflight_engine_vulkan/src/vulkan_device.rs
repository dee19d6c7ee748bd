/// Vulkan graphics device - headless bootstrap and object ownership
///
/// Owns the instance, the logical device, one queue per queue type and the
/// gpu-allocator allocator. Buffers and images hand out a `VulkanMemory`
/// index into an allocation table; the owned `Allocation` stays here until
/// the resource is destroyed.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::MemoryLocation;
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use inflight_engine::inflight::{Config, Error, QueueType, Result};
use inflight_engine::inflight::memory::ObjectPool;
use inflight_engine::{engine_debug, engine_error, engine_info, engine_warn};

use crate::debug::{self, DebugConfig};

/// Handle to a memory allocation owned by a [`VulkanGraphicsDevice`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VulkanMemory(pub(crate) usize);

/// Queue family chosen for each queue type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueFamilies {
    pub graphics: u32,
    pub compute: u32,
    pub transfer: u32,
}

impl QueueFamilies {
    /// Pick one family per queue type
    ///
    /// Compute prefers a family without graphics, transfer one with neither
    /// graphics nor compute. Both fall back to the graphics family.
    pub(crate) fn select(families: &[vk::QueueFamilyProperties]) -> Option<Self> {
        let find = |required: vk::QueueFlags, excluded: vk::QueueFlags| {
            families
                .iter()
                .position(|family| {
                    family.queue_count > 0
                        && family.queue_flags.contains(required)
                        && !family.queue_flags.intersects(excluded)
                })
                .map(|index| index as u32)
        };

        let graphics = find(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, vk::QueueFlags::empty())?;
        let compute = find(vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS).unwrap_or(graphics);
        let transfer = find(vk::QueueFlags::TRANSFER, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
            .unwrap_or(graphics);

        Some(Self { graphics, compute, transfer })
    }

    /// Distinct family indices, graphics first
    pub(crate) fn unique(&self) -> Vec<u32> {
        let mut families = vec![self.graphics];
        for family in [self.compute, self.transfer] {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }

    pub(crate) fn get(&self, queue: QueueType) -> u32 {
        match queue {
            QueueType::Graphics => self.graphics,
            QueueType::Compute => self.compute,
            QueueType::Transfer => self.transfer,
        }
    }
}

/// Vulkan implementation of `GraphicsDevice`
pub struct VulkanGraphicsDevice {
    _entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device_name: String,
    pub(crate) device: ash::Device,

    pub(crate) queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    compute_queue: vk::Queue,
    transfer_queue: vk::Queue,
    /// Serializes queue access (queues may be shared between queue types)
    submit_lock: Mutex<()>,

    /// Dropped before the device is destroyed
    allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,
    /// Owned allocations indexed by `VulkanMemory`
    allocations: Mutex<ObjectPool<Allocation>>,

    debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanGraphicsDevice {
    /// Create a headless device (no surface, no swapchain)
    pub fn new(config: &Config) -> Result<Self> {
        Self::new_with_debug(config, DebugConfig::default())
    }

    /// Create a headless device with an explicit debug messenger setup
    ///
    /// Validation is only enabled when `config.enable_validation` is set and
    /// the crate is built with the `vulkan-validation` feature.
    pub fn new_with_debug(config: &Config, debug_config: DebugConfig) -> Result<Self> {
        let enable_validation = config.enable_validation && cfg!(feature = "vulkan-validation");

        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!("inflight::vulkan", "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|_| Error::InitializationFailed("application name contains a NUL byte".to_string()))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Inflight")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let validation_layer = c"VK_LAYER_KHRONOS_validation";
            let enable_validation = enable_validation && Self::has_instance_layer(&entry, validation_layer);

            let mut extension_names = Vec::new();
            let mut layer_names = Vec::new();
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(validation_layer.as_ptr());
            }

            let instance_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&instance_info, None).map_err(|e| {
                engine_error!("inflight::vulkan", "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            let (debug_utils_loader, debug_messenger) = if enable_validation {
                match Self::create_debug_messenger(&entry, &instance, debug_config) {
                    Ok((loader, messenger)) => (Some(loader), Some(messenger)),
                    Err(err) => {
                        instance.destroy_instance(None);
                        return Err(err);
                    }
                }
            } else {
                (None, None)
            };

            let destroy_instance = || {
                if let (Some(loader), Some(messenger)) = (&debug_utils_loader, debug_messenger) {
                    debug::cleanup_debug_config();
                    loader.destroy_debug_utils_messenger(messenger, None);
                }
                instance.destroy_instance(None);
            };

            let (physical_device, device_name) = match Self::pick_physical_device(&instance) {
                Ok(picked) => picked,
                Err(err) => {
                    destroy_instance();
                    return Err(err);
                }
            };

            let family_properties = instance.get_physical_device_queue_family_properties(physical_device);
            let Some(queue_families) = QueueFamilies::select(&family_properties) else {
                destroy_instance();
                engine_error!("inflight::vulkan", "No graphics queue family found on {}", device_name);
                return Err(Error::InitializationFailed("No graphics queue family found".to_string()));
            };

            let device = match Self::create_logical_device(&instance, physical_device, &queue_families, config) {
                Ok(device) => device,
                Err(err) => {
                    destroy_instance();
                    return Err(err);
                }
            };

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: config.enable_ray_tracing,
                allocation_sizes: Default::default(),
            });
            let allocator = match allocator {
                Ok(allocator) => allocator,
                Err(e) => {
                    device.destroy_device(None);
                    destroy_instance();
                    engine_error!("inflight::vulkan", "Failed to create GPU allocator: {:?}", e);
                    return Err(Error::InitializationFailed(format!("Failed to create allocator: {:?}", e)));
                }
            };

            let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
            let compute_queue = device.get_device_queue(queue_families.compute, 0);
            let transfer_queue = device.get_device_queue(queue_families.transfer, 0);

            engine_info!(
                "inflight::vulkan",
                "Vulkan device '{}' created (graphics family {}, compute family {}, transfer family {}, validation {})",
                device_name,
                queue_families.graphics,
                queue_families.compute,
                queue_families.transfer,
                enable_validation
            );

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                device_name,
                device,
                queue_families,
                graphics_queue,
                compute_queue,
                transfer_queue,
                submit_lock: Mutex::new(()),
                allocator: ManuallyDrop::new(Arc::new(Mutex::new(allocator))),
                allocations: Mutex::new(ObjectPool::new()),
                debug_utils_loader,
                debug_messenger,
            })
        }
    }

    unsafe fn has_instance_layer(entry: &ash::Entry, name: &CStr) -> bool {
        let available = entry
            .enumerate_instance_layer_properties()
            .map(|layers| layers.iter().any(|layer| layer.layer_name_as_c_str().map_or(false, |layer_name| layer_name == name)))
            .unwrap_or(false);
        if !available {
            engine_warn!(
                "inflight::vulkan",
                "Validation requested but {:?} is not installed; continuing without it",
                name
            );
        }
        available
    }

    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        debug_config: DebugConfig,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        debug::init_debug_config(debug_config);

        let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(debug_config.severity.to_vk())
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug::vulkan_debug_callback));

        let messenger = loader.create_debug_utils_messenger(&info, None).map_err(|e| {
            engine_error!("inflight::vulkan", "Failed to create debug messenger: {:?}", e);
            Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
        })?;

        Ok((loader, messenger))
    }

    /// First discrete GPU supporting Vulkan 1.3, else the first 1.3 device
    unsafe fn pick_physical_device(instance: &ash::Instance) -> Result<(vk::PhysicalDevice, String)> {
        let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
            engine_error!("inflight::vulkan", "Failed to enumerate physical devices: {:?}", e);
            Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
        })?;

        let candidates: Vec<(vk::PhysicalDevice, vk::PhysicalDeviceProperties)> = physical_devices
            .into_iter()
            .map(|pd| (pd, instance.get_physical_device_properties(pd)))
            .filter(|(_, props)| props.api_version >= vk::API_VERSION_1_3)
            .collect();

        let (physical_device, properties) = candidates
            .iter()
            .find(|(_, props)| props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU)
            .or_else(|| candidates.first())
            .copied()
            .ok_or_else(|| {
                engine_error!("inflight::vulkan", "No Vulkan 1.3 capable GPU found");
                Error::InitializationFailed("No Vulkan 1.3 capable GPU found".to_string())
            })?;

        let name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok((physical_device, name))
    }

    unsafe fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_families: &QueueFamilies,
        config: &Config,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let mut extension_names = Vec::new();
        if config.enable_ray_tracing {
            extension_names.push(ash::khr::acceleration_structure::NAME.as_ptr());
            extension_names.push(ash::khr::deferred_host_operations::NAME.as_ptr());
        }

        // Multi-draw and count-buffer indirect draws are optional hardware features
        let supported = instance.get_physical_device_features(physical_device);
        let mut supported12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut supported2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut supported12);
        instance.get_physical_device_features2(physical_device, &mut supported2);
        let draw_indirect_count = supported12.draw_indirect_count == vk::TRUE;
        if !draw_indirect_count {
            engine_warn!("inflight::vulkan", "drawIndirectCount unsupported, count-buffer draws are unavailable");
        }

        let features = vk::PhysicalDeviceFeatures::default()
            .multi_draw_indirect(supported.multi_draw_indirect == vk::TRUE);
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
            .synchronization2(true)
            .dynamic_rendering(true);
        let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
            .buffer_device_address(config.enable_ray_tracing)
            .draw_indirect_count(draw_indirect_count);
        let mut acceleration_structure_features =
            vk::PhysicalDeviceAccelerationStructureFeaturesKHR::default().acceleration_structure(true);

        let mut device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features)
            .push_next(&mut features13)
            .push_next(&mut features12);
        if config.enable_ray_tracing {
            device_info = device_info.push_next(&mut acceleration_structure_features);
        }

        instance.create_device(physical_device, &device_info, None).map_err(|e| {
            engine_error!("inflight::vulkan", "Failed to create logical device: {:?}", e);
            Error::InitializationFailed(format!("Failed to create device: {:?}", e))
        })
    }

    // ===== ACCESSORS =====

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Shared gpu-allocator instance
    pub fn allocator(&self) -> &Arc<Mutex<Allocator>> {
        &self.allocator
    }

    pub fn queue(&self, queue: QueueType) -> vk::Queue {
        match queue {
            QueueType::Graphics => self.graphics_queue,
            QueueType::Compute => self.compute_queue,
            QueueType::Transfer => self.transfer_queue,
        }
    }

    /// Number of buffer and image allocations currently alive
    pub fn live_allocation_count(&self) -> usize {
        self.allocations.lock().map(|pool| pool.len()).unwrap_or(0)
    }

    // ===== MEMORY =====

    pub(crate) fn lock_submit(&self) -> Result<MutexGuard<'_, ()>> {
        self.submit_lock
            .lock()
            .map_err(|_| Error::BackendError("queue submit lock poisoned".to_string()))
    }

    /// Allocate memory for `requirements` and store it in the allocation table
    pub(crate) fn allocate_memory(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<VulkanMemory> {
        let allocation = {
            let mut allocator = self
                .allocator
                .lock()
                .map_err(|_| Error::BackendError("GPU allocator lock poisoned".to_string()))?;
            allocator
                .allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location,
                    linear,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|e| {
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!(
                        "inflight::vulkan",
                        "Out of GPU memory for {} (required: {:.2} MB): {:?}",
                        name,
                        size_mb,
                        e
                    );
                    Error::OutOfMemory
                })?
        };

        match self.allocations.lock() {
            Ok(mut allocations) => Ok(VulkanMemory(allocations.emplace(allocation))),
            Err(_) => {
                if let Ok(mut allocator) = self.allocator.lock() {
                    allocator.free(allocation).ok();
                }
                Err(Error::BackendError("allocation table lock poisoned".to_string()))
            }
        }
    }

    /// Run `f` on the allocation behind `memory`
    pub(crate) fn with_allocation<T>(&self, memory: VulkanMemory, f: impl FnOnce(&Allocation) -> T) -> Result<T> {
        let allocations = self
            .allocations
            .lock()
            .map_err(|_| Error::BackendError("allocation table lock poisoned".to_string()))?;
        allocations
            .get(memory.0)
            .map(f)
            .ok_or_else(|| Error::InvalidResource(format!("unknown memory handle {:?}", memory)))
    }

    /// Release the allocation behind `memory`
    pub(crate) fn free_memory(&self, memory: VulkanMemory) {
        let allocation = match self.allocations.lock() {
            Ok(mut allocations) if allocations.contains(memory.0) => allocations.remove(memory.0),
            Ok(_) => {
                engine_warn!("inflight::vulkan", "Freeing unknown memory handle {:?}", memory);
                return;
            }
            Err(_) => return,
        };

        // Don't panic if the lock fails, the owning resource is gone either way
        if let Ok(mut allocator) = self.allocator.lock() {
            if let Err(e) = allocator.free(allocation) {
                engine_warn!("inflight::vulkan", "Failed to free GPU allocation: {:?}", e);
            }
        }
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Free allocations leaked by the application
            let leaked: Vec<Allocation> = match self.allocations.get_mut() {
                Ok(allocations) => allocations.drain().collect(),
                Err(poisoned) => poisoned.into_inner().drain().collect(),
            };
            if !leaked.is_empty() {
                engine_warn!("inflight::vulkan", "{} GPU allocation(s) still alive at device teardown", leaked.len());
                if let Ok(mut allocator) = self.allocator.lock() {
                    for allocation in leaked {
                        allocator.free(allocation).ok();
                    }
                }
            }

            // 2. Drop the allocator: its memory blocks must go before the device
            ManuallyDrop::drop(&mut self.allocator);

            // 3. Silence the callback, then destroy the messenger before the instance
            debug::cleanup_debug_config();
            if let (Some(loader), Some(messenger)) = (&self.debug_utils_loader, self.debug_messenger) {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            // 4. Device, then instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }

        engine_debug!("inflight::vulkan", "Vulkan device destroyed");
    }
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;
