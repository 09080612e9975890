use std::marker::PhantomData;

use wgpu::{Buffer, BufferUsages, Device, Queue};

/// Elements a buffer starts with before its first growth.
pub const INITIAL_CAPACITY: usize = 1024;

/// Capacity after growing `current` to hold `needed` elements: doubled, or
/// `needed` if that is larger.
pub fn grown_capacity(current: usize, needed: usize) -> usize {
    if needed <= current {
        current
    } else {
        (current * 2).max(needed)
    }
}

/// A GPU buffer reused across frames, reallocated only when a frame needs
/// more room than it has.
pub struct GrowableBuffer<T> {
    buffer: Buffer,
    capacity: usize,
    usage: BufferUsages,
    label: &'static str,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> GrowableBuffer<T> {
    pub fn new(device: &Device, label: &'static str, usage: BufferUsages) -> Self {
        let usage = usage | BufferUsages::COPY_DST;
        Self {
            buffer: create::<T>(device, label, usage, INITIAL_CAPACITY),
            capacity: INITIAL_CAPACITY,
            usage,
            label,
            _marker: PhantomData,
        }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Capacity in elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Upload `data` at offset 0, growing first if needed. Returns true when
    /// the buffer was reallocated.
    pub fn write(&mut self, device: &Device, queue: &Queue, data: &[T]) -> bool {
        let grew = self.ensure_capacity(device, data.len());
        if !data.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(data));
        }
        grew
    }

    fn ensure_capacity(&mut self, device: &Device, count: usize) -> bool {
        let new_capacity = grown_capacity(self.capacity, count);
        if new_capacity == self.capacity {
            return false;
        }
        log::debug!(
            "{} grown from {} to {} elements",
            self.label,
            self.capacity,
            new_capacity
        );
        self.buffer = create::<T>(device, self.label, self.usage, new_capacity);
        self.capacity = new_capacity;
        true
    }
}

fn create<T>(device: &Device, label: &'static str, usage: BufferUsages, capacity: usize) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (capacity * std::mem::size_of::<T>()) as u64,
        usage,
        mapped_at_creation: false,
    })
}
