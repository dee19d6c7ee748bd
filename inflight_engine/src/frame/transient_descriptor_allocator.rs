/// Transient descriptor set allocator
///
/// Hands out descriptor sets that live until the next `reset`. Sets are
/// never freed one by one: when the active pool runs dry it is parked and a
/// fresh (or previously reset) pool takes over. `reset` resets every pool,
/// invalidating every set allocated since the previous reset.

use std::sync::Arc;

use crate::{engine_debug, engine_error};
use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, DescriptorPoolSize};

pub struct TransientDescriptorSetAllocator<D: GraphicsDevice> {
    device: Arc<D>,
    pool_sizes: Vec<DescriptorPoolSize>,
    sets_per_pool: u32,
    /// Pool new sets come from
    active: D::DescriptorPool,
    /// Exhausted pools whose sets are still in use this cycle
    recycled: Vec<D::DescriptorPool>,
    /// Reset pools waiting to become active
    available: Vec<D::DescriptorPool>,
}

impl<D: GraphicsDevice> TransientDescriptorSetAllocator<D> {
    /// Create the allocator and its first pool
    pub fn new(device: Arc<D>, pool_sizes: &[DescriptorPoolSize], sets_per_pool: u32) -> Result<Self> {
        let active = device.create_descriptor_pool(pool_sizes, sets_per_pool)?;
        Ok(Self {
            device,
            pool_sizes: pool_sizes.to_vec(),
            sets_per_pool,
            active,
            recycled: Vec::new(),
            available: Vec::new(),
        })
    }

    /// Allocate one set valid until the next reset
    ///
    /// Pool exhaustion is handled by switching pools and retrying once. A
    /// second failure means one set does not fit an empty pool, which is a
    /// capacity misconfiguration.
    pub fn get_set(&mut self, layout: D::DescriptorSetLayout) -> Result<D::DescriptorSet> {
        match self.device.allocate_descriptor_set(self.active, layout) {
            Ok(set) => return Ok(set),
            Err(err) if err.is_pool_exhaustion() => {}
            Err(err) => return Err(err),
        }

        self.switch_pool()?;

        match self.device.allocate_descriptor_set(self.active, layout) {
            Ok(set) => Ok(set),
            Err(err) => {
                engine_error!(
                    "inflight::TransientDescriptorSetAllocator",
                    "Descriptor set allocation failed on a fresh pool ({}); pool capacity is too small for layout {:?}",
                    err,
                    layout
                );
                Err(Error::InvalidResource(format!(
                    "descriptor set for layout {:?} does not fit an empty transient pool: {}",
                    layout, err
                )))
            }
        }
    }

    /// Reset every pool and make them all available again
    pub fn reset(&mut self) -> Result<()> {
        self.available.append(&mut self.recycled);
        self.device.reset_descriptor_pool(self.active)?;
        for &pool in &self.available {
            self.device.reset_descriptor_pool(pool)?;
        }
        Ok(())
    }

    /// Number of pools owned (active + recycled + available)
    pub fn pool_count(&self) -> usize {
        1 + self.recycled.len() + self.available.len()
    }

    pub fn recycled_pool_count(&self) -> usize {
        self.recycled.len()
    }

    pub fn available_pool_count(&self) -> usize {
        self.available.len()
    }

    fn switch_pool(&mut self) -> Result<()> {
        let next = match self.available.pop() {
            Some(pool) => pool,
            None => {
                let pool = self.device.create_descriptor_pool(&self.pool_sizes, self.sets_per_pool)?;
                engine_debug!(
                    "inflight::TransientDescriptorSetAllocator",
                    "Created transient descriptor pool {:?} ({} pools total)",
                    pool,
                    self.pool_count() + 1
                );
                pool
            }
        };
        let exhausted = std::mem::replace(&mut self.active, next);
        self.recycled.push(exhausted);
        Ok(())
    }
}

impl<D: GraphicsDevice> Drop for TransientDescriptorSetAllocator<D> {
    fn drop(&mut self) {
        self.device.destroy_descriptor_pool(self.active);
        for pool in self.recycled.drain(..).chain(self.available.drain(..)) {
            self.device.destroy_descriptor_pool(pool);
        }
    }
}

#[cfg(test)]
#[path = "transient_descriptor_allocator_tests.rs"]
mod tests;
