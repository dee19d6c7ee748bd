//! Device context configuration

use crate::error::{Error, Result};
use crate::graphics_device::{DescriptorPoolSize, DescriptorType};

/// Upper bound on frames in flight; sizes every rotation-bound array
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Which queue family the async-compute recorder pool records for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncComputePolicy {
    /// Use the device's compute family (graphics family if it has none)
    DedicatedQueue,
    /// Always record async compute for the graphics family
    SharedWithGraphics,
}

/// Device context configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Number of rotation slots (N)
    pub max_frames_in_flight: usize,
    /// Capacity of every transient descriptor pool
    pub transient_descriptor_pool_sizes: Vec<DescriptorPoolSize>,
    /// Sets per transient descriptor pool
    pub transient_descriptor_sets_per_pool: u32,
    pub async_compute: AsyncComputePolicy,
    /// Adds acceleration structures to the transient pool table
    pub enable_ray_tracing: bool,
}

impl Config {
    /// Pool capacity table used when none is given
    pub fn default_transient_pool_sizes(enable_ray_tracing: bool) -> Vec<DescriptorPoolSize> {
        let mut sizes = vec![
            DescriptorPoolSize::new(DescriptorType::Sampler, 64),
            DescriptorPoolSize::new(DescriptorType::SampledImage, 512),
            DescriptorPoolSize::new(DescriptorType::StorageImage, 512),
            DescriptorPoolSize::new(DescriptorType::UniformTexelBuffer, 512),
            DescriptorPoolSize::new(DescriptorType::StorageTexelBuffer, 512),
            DescriptorPoolSize::new(DescriptorType::UniformBuffer, 512),
            DescriptorPoolSize::new(DescriptorType::StorageBuffer, 512),
            DescriptorPoolSize::new(DescriptorType::UniformBufferDynamic, 512),
            DescriptorPoolSize::new(DescriptorType::StorageBufferDynamic, 512),
        ];
        if enable_ray_tracing {
            sizes.push(DescriptorPoolSize::new(DescriptorType::AccelerationStructure, 512));
        }
        sizes
    }

    /// Check ranges before any device object is created
    pub fn validate(&self) -> Result<()> {
        if self.max_frames_in_flight == 0 || self.max_frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(Error::InitializationFailed(format!(
                "max_frames_in_flight must be in 1..={}, got {}",
                MAX_FRAMES_IN_FLIGHT, self.max_frames_in_flight
            )));
        }
        if self.transient_descriptor_pool_sizes.is_empty() {
            return Err(Error::InitializationFailed(
                "transient descriptor pool table is empty".to_string(),
            ));
        }
        if let Some(size) = self.transient_descriptor_pool_sizes.iter().find(|s| s.count == 0) {
            return Err(Error::InitializationFailed(format!(
                "transient descriptor pool entry {:?} has zero capacity",
                size.ty
            )));
        }
        if self.transient_descriptor_sets_per_pool == 0 {
            return Err(Error::InitializationFailed(
                "transient_descriptor_sets_per_pool must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Inflight Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            max_frames_in_flight: 2,
            transient_descriptor_pool_sizes: Self::default_transient_pool_sizes(false),
            transient_descriptor_sets_per_pool: 1024,
            async_compute: AsyncComputePolicy::DedicatedQueue,
            enable_ray_tracing: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
