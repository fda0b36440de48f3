//! Per-frame linear allocators for short-lived GPU data.
//!
//! A [`LinearPool`] owns one device buffer split into one region per frame in
//! flight. Frame `N` bump-allocates from region `N % frames`, so data written
//! for frame `N + 1` never overwrites what the GPU may still read for frame
//! `N`. At the frame boundary the used bytes of the region are uploaded through
//! the frame's prologue stream and the cursor moves on to the next region.
//!
//! ```text
//! buffer: [ region 0 ][ region 1 ]        frames_in_flight = 2
//!           ^cursor                        frame 0, 2, 4 ...
//!                       ^cursor            frame 1, 3, 5 ...
//! ```
//!
//! Allocation is lock-free: a slice is claimed with an atomic compare-exchange
//! on the cursor, so jobs can allocate concurrently. Writing the slice contents
//! goes through a short-held lock on the CPU staging copy.
//!
//! Every slice carries the pool generation it was allocated in. The generation
//! advances at every frame boundary, so a slice from a past frame is rejected
//! by [`LinearPool::write`] and reported by [`LinearPool::is_valid`].

use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::backend::GpuDevice;
use crate::error::{CapacityError, DeviceError, HandleError};
use crate::stream::DrawStream;
use crate::types::{BufferDescriptor, BufferFlags, BufferHandle};

/// A frame-scoped region of a transient pool's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransientSlice {
    pub buffer: BufferHandle,
    /// Byte offset inside `buffer`.
    pub offset: u32,
    pub size: u32,
    pub generation: u32,
}

/// Construction parameters of a [`LinearPool`].
#[derive(Debug, Clone, Copy)]
pub struct LinearPoolDesc {
    pub name: &'static str,
    /// Total buffer size, shared by all regions.
    pub size: u32,
    pub frames_in_flight: u32,
    pub alignment: u32,
    pub flags: BufferFlags,
}

/// Lock-free bump allocator over a per-frame region of one device buffer.
#[derive(Debug)]
pub struct LinearPool {
    name: &'static str,
    buffer: BufferHandle,
    region_size: u32,
    regions: u32,
    alignment: u32,
    cursor: AtomicU32,
    region: AtomicU32,
    generation: AtomicU32,
    staging: Mutex<Vec<u8>>,
}

impl LinearPool {
    /// Create the pool and its device buffer.
    pub fn new(device: &dyn GpuDevice, desc: LinearPoolDesc) -> Result<Self, DeviceError> {
        if !desc.alignment.is_power_of_two() {
            return Err(DeviceError::InvalidParameter(format!(
                "alignment must be a power of 2, got {}",
                desc.alignment
            )));
        }
        if desc.frames_in_flight == 0 {
            return Err(DeviceError::InvalidParameter(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }

        let region_size = align_down(desc.size / desc.frames_in_flight, desc.alignment);
        if region_size == 0 {
            return Err(DeviceError::InvalidParameter(format!(
                "{} pool of {} bytes is too small for {} frames",
                desc.name, desc.size, desc.frames_in_flight
            )));
        }

        let descriptor = BufferDescriptor::new(region_size * desc.frames_in_flight, desc.flags)
            .with_label(desc.name);
        let buffer = device.create_buffer(&descriptor, None)?;

        log::debug!(
            "Created {} pool: {} regions of {} bytes",
            desc.name,
            desc.frames_in_flight,
            region_size
        );

        Ok(Self {
            name: desc.name,
            buffer,
            region_size,
            regions: desc.frames_in_flight,
            alignment: desc.alignment,
            cursor: AtomicU32::new(0),
            region: AtomicU32::new(0),
            generation: AtomicU32::new(0),
            staging: Mutex::new(vec![0; region_size as usize]),
        })
    }

    /// Claim `size` bytes for the current frame.
    ///
    /// Safe to call from any thread.
    pub fn alloc(&self, size: u32) -> Result<TransientSlice, CapacityError> {
        let mut current = self.cursor.load(Ordering::Relaxed);
        let offset = loop {
            let offset = align_up(current, self.alignment);
            let end = offset as u64 + size as u64;
            if end > self.region_size as u64 {
                return Err(CapacityError::TransientPoolExhausted {
                    pool: self.name,
                    requested: size,
                    remaining: self.region_size.saturating_sub(current),
                });
            }

            match self.cursor.compare_exchange_weak(
                current,
                end as u32,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break offset,
                Err(actual) => current = actual,
            }
        };

        Ok(TransientSlice {
            buffer: self.buffer,
            offset: self.region_base() + offset,
            size,
            generation: self.generation.load(Ordering::Acquire),
        })
    }

    /// Claim a slice and fill it with `data`.
    pub fn alloc_with_data(&self, data: &[u8]) -> Result<TransientSlice, CapacityError> {
        let slice = self.alloc(data.len() as u32)?;
        let local = (slice.offset - self.region_base()) as usize;
        self.staging.lock()[local..local + data.len()].copy_from_slice(data);
        Ok(slice)
    }

    /// Write into a slice of the current frame.
    pub fn write(&self, slice: &TransientSlice, offset: u32, data: &[u8]) -> Result<(), HandleError> {
        let current = self.generation();
        if slice.generation != current {
            return Err(HandleError::StaleTransientSlice {
                slice: slice.generation,
                current,
            });
        }
        if offset as u64 + data.len() as u64 > slice.size as u64 {
            return Err(HandleError::TransientWriteOutOfBounds {
                offset,
                len: data.len() as u32,
                size: slice.size,
            });
        }

        let local = (slice.offset - self.region_base() + offset) as usize;
        self.staging.lock()[local..local + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Whether `slice` was allocated in the current frame.
    pub fn is_valid(&self, slice: &TransientSlice) -> bool {
        slice.buffer == self.buffer && slice.generation == self.generation()
    }

    /// Record the upload of this frame's used bytes into `stream`.
    pub fn upload(&self, stream: &mut DrawStream) -> Result<(), CapacityError> {
        let used = self.used();
        if used == 0 {
            return Ok(());
        }
        let staging = self.staging.lock();
        stream.update_buffer(self.buffer, self.region_base(), &staging[..used as usize])
    }

    /// Move to the next frame's region and invalidate all outstanding slices.
    ///
    /// Must not race with [`alloc`](Self::alloc): the renderer calls it only
    /// after every job of the frame has finished.
    pub fn next_frame(&self) {
        let used = self.cursor.swap(0, Ordering::AcqRel) as usize;
        self.staging.lock()[..used].fill(0);

        let region = (self.region.load(Ordering::Relaxed) + 1) % self.regions;
        self.region.store(region, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Destroy the device buffer.
    pub fn destroy(&self, device: &dyn GpuDevice) {
        device.destroy_buffer(self.buffer);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Bytes claimed in the current frame, including alignment padding.
    pub fn used(&self) -> u32 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Bytes available to each frame.
    pub fn region_size(&self) -> u32 {
        self.region_size
    }

    fn region_base(&self) -> u32 {
        self.region.load(Ordering::Acquire) * self.region_size
    }
}

/// Per-frame pool for uniform blocks.
#[derive(Debug)]
pub struct UniformPool(LinearPool);

impl UniformPool {
    /// Uniform buffer offset alignment required by most GPUs.
    pub const ALIGNMENT: u32 = 256;

    pub fn new(device: &dyn GpuDevice, size: u32, frames_in_flight: u32) -> Result<Self, DeviceError> {
        LinearPool::new(
            device,
            LinearPoolDesc {
                name: "uniform",
                size,
                frames_in_flight,
                alignment: Self::ALIGNMENT,
                flags: BufferFlags::UNIFORM_BUFFER,
            },
        )
        .map(Self)
    }
}

impl Deref for UniformPool {
    type Target = LinearPool;

    fn deref(&self) -> &LinearPool {
        &self.0
    }
}

/// Per-frame pool for vertex, index and shader-storage scratch data.
#[derive(Debug)]
pub struct TransientPool(LinearPool);

impl TransientPool {
    pub const ALIGNMENT: u32 = 16;

    pub fn new(device: &dyn GpuDevice, size: u32, frames_in_flight: u32) -> Result<Self, DeviceError> {
        LinearPool::new(
            device,
            LinearPoolDesc {
                name: "transient",
                size,
                frames_in_flight,
                alignment: Self::ALIGNMENT,
                flags: BufferFlags::SHADER_BUFFER,
            },
        )
        .map(Self)
    }
}

impl Deref for TransientPool {
    type Target = LinearPool;

    fn deref(&self) -> &LinearPool {
        &self.0
    }
}

#[inline]
fn align_up(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) & !(alignment - 1)
}

#[inline]
fn align_down(value: u32, alignment: u32) -> u32 {
    value & !(alignment - 1)
}
