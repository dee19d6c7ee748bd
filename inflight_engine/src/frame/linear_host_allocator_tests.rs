use super::*;
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, MockKind};

fn create_allocator() -> (Arc<MockGraphicsDevice>, LinearHostAllocator<MockGraphicsDevice>) {
    let device = Arc::new(MockGraphicsDevice::new());
    let allocator = LinearHostAllocator::new(device.clone());
    (device, allocator)
}

// ============================================================================
// LinearHostAllocator
// ============================================================================

#[test]
fn test_allocations_have_requested_size_and_distinct_buffers() {
    let (device, mut allocator) = create_allocator();

    let a = allocator.allocate_buffer(64, 0).unwrap();
    assert_eq!(a.size(), 64);
    let a_handle = a.buffer();
    a.write(0, &[0xAA; 64]).unwrap();

    let b = allocator.allocate_buffer(16, 0).unwrap();
    assert_eq!(b.size(), 16);
    let b_handle = b.buffer();
    b.write(0, &[0xBB; 16]).unwrap();

    assert_ne!(a_handle, b_handle);
    // Writing b did not touch a
    assert_eq!(device.buffer_bytes(a_handle), vec![0xAA; 64]);
    assert_eq!(device.buffer_bytes(b_handle), vec![0xBB; 16]);
    assert_eq!(allocator.allocation_count(), 2);
    assert_eq!(allocator.allocated_bytes(), 80);
}

#[test]
fn test_write_at_offset() {
    let (device, mut allocator) = create_allocator();
    let buffer = allocator.allocate_buffer(8, 0).unwrap();

    buffer.write(4, &[1, 2, 3, 4]).unwrap();

    assert_eq!(device.buffer_bytes(buffer.buffer()), vec![0, 0, 0, 0, 1, 2, 3, 4]);
}

#[test]
fn test_write_pod() {
    let (device, mut allocator) = create_allocator();
    let buffer = allocator.allocate_buffer(8, 0).unwrap();

    buffer.write_pod(0, &[0x0403_0201u32, 0x0807_0605u32]).unwrap();

    assert_eq!(device.buffer_bytes(buffer.buffer()), vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn test_write_out_of_bounds_is_rejected() {
    let (_device, mut allocator) = create_allocator();
    let buffer = allocator.allocate_buffer(8, 0).unwrap();

    assert!(matches!(buffer.write(6, &[0; 4]), Err(Error::InvalidResource(_))));
    assert!(matches!(buffer.write(u64::MAX, &[0; 1]), Err(Error::InvalidResource(_))));
    // Exactly filling the buffer is fine
    assert!(buffer.write(4, &[0; 4]).is_ok());
}

#[test]
fn test_zero_size_allocation_fails() {
    let (device, mut allocator) = create_allocator();
    assert!(allocator.allocate_buffer(0, 0).is_err());
    assert_eq!(allocator.allocation_count(), 0);
    assert_eq!(device.live_count(MockKind::Buffer), 0);
}

#[test]
fn test_reset_destroys_every_buffer() {
    let (device, mut allocator) = create_allocator();
    let first = allocator.allocate_buffer(32, 0).unwrap().buffer();
    let second = allocator.allocate_buffer(32, 0).unwrap().buffer();

    allocator.reset();

    assert!(!device.is_alive(first));
    assert!(!device.is_alive(second));
    assert_eq!(allocator.allocation_count(), 0);
    assert_eq!(allocator.allocated_bytes(), 0);
    assert_eq!(device.live_count(MockKind::Memory), 0);
}

#[test]
fn test_allocation_after_reset_is_a_new_buffer() {
    let (_device, mut allocator) = create_allocator();
    let before = allocator.allocate_buffer(32, 0).unwrap().buffer();
    allocator.reset();
    let after = allocator.allocate_buffer(32, 0).unwrap().buffer();
    assert_ne!(before, after);
}

#[test]
fn test_drop_destroys_buffers() {
    let (device, mut allocator) = create_allocator();
    allocator.allocate_buffer(32, 0).unwrap();
    drop(allocator);
    assert_eq!(device.live_count(MockKind::Buffer), 0);
}

// ============================================================================
// LinearHostAllocatorProvider
// ============================================================================

#[test]
fn test_provider_hands_out_independent_allocators() {
    let device = Arc::new(MockGraphicsDevice::new());
    let mut provider = LinearHostAllocatorProvider::new(device.clone());

    let a = provider.create_allocator();
    let b = provider.create_allocator();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(provider.allocator_count(), 2);

    a.lock().unwrap().allocate_buffer(16, 0).unwrap();
    assert_eq!(a.lock().unwrap().allocation_count(), 1);
    assert_eq!(b.lock().unwrap().allocation_count(), 0);
}

#[test]
fn test_provider_reset_destroys_all_allocations() {
    let device = Arc::new(MockGraphicsDevice::new());
    let mut provider = LinearHostAllocatorProvider::new(device.clone());

    for _ in 0..3 {
        let allocator = provider.create_allocator();
        allocator.lock().unwrap().allocate_buffer(16, 0).unwrap();
        allocator.lock().unwrap().allocate_buffer(16, 0).unwrap();
    }
    assert_eq!(device.live_count(MockKind::Buffer), 6);

    provider.reset();

    assert_eq!(provider.allocator_count(), 0);
    assert_eq!(device.live_count(MockKind::Buffer), 0);
}

#[test]
fn test_allocator_held_past_reset_is_empty() {
    let device = Arc::new(MockGraphicsDevice::new());
    let mut provider = LinearHostAllocatorProvider::new(device.clone());

    let held = provider.create_allocator();
    held.lock().unwrap().allocate_buffer(16, 0).unwrap();
    provider.reset();

    assert_eq!(held.lock().unwrap().allocation_count(), 0);
    // Dropping the stale handle destroys nothing twice
    drop(held);
    assert_eq!(device.live_count(MockKind::Buffer), 0);
}

#[test]
fn test_provider_drop_destroys_allocations() {
    let device = Arc::new(MockGraphicsDevice::new());
    let mut provider = LinearHostAllocatorProvider::new(device.clone());
    provider.create_allocator().lock().unwrap().allocate_buffer(16, 0).unwrap();

    drop(provider);

    assert_eq!(device.live_count(MockKind::Buffer), 0);
}
