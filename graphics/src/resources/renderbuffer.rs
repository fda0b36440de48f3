//! Frame-scoped virtual render targets.
//!
//! A [`RenderBufferHandle`] names a render target for the current frame only.
//! The pool maps every live handle to a physical device texture. Physical
//! textures are shared between handles whose lifetimes do not overlap:
//!
//! - `create` reuses the lowest-index free physical texture whose
//!   `(format, size, flags)` is exactly equal to the request (first fit by
//!   descriptor equality), and only asks the device for a new texture when
//!   none matches.
//! - `release` makes the physical texture available again immediately. Reuse
//!   later in the same frame is safe because the commands recorded against the
//!   old handle execute before those recorded against the new one.
//! - At the frame boundary every handle still alive is reported and released,
//!   and physical textures left unused for the retention window are destroyed.
//!
//! Handles pack a 24-bit slot index with the slot's 8-bit generation, so a
//! released handle is rejected even after its slot has been reissued.

use kiln_core::pool::IndexPool;

use crate::backend::GpuDevice;
use crate::error::{CapacityError, GraphicsError, HandleError};
use crate::types::{Extent2d, TextureDescriptor, TextureFlags, TextureFormat, TextureHandle};

const INDEX_BITS: u32 = 24;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// Maximum number of simultaneously live renderbuffer handles.
pub const MAX_RENDERBUFFERS: u32 = 4096;

/// Frame-scoped handle to a virtual render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderBufferHandle(u32);

/// "No attachment".
pub const INVALID_RENDERBUFFER: RenderBufferHandle = RenderBufferHandle(0xFFFF_FFFF);

static_assertions::assert_eq_size!(RenderBufferHandle, u32);
static_assertions::const_assert!(MAX_RENDERBUFFERS < INDEX_MASK);

impl RenderBufferHandle {
    fn pack(index: u32, generation: u8) -> Self {
        Self(index | (generation as u32) << INDEX_BITS)
    }

    fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    fn generation(self) -> u8 {
        (self.0 >> INDEX_BITS) as u8
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != INVALID_RENDERBUFFER
    }
}

impl Default for RenderBufferHandle {
    fn default() -> Self {
        INVALID_RENDERBUFFER
    }
}

/// Request for a render target.
///
/// `debug_name` labels the physical texture when one is created; it never
/// affects which texture is reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderBufferDesc {
    pub size: Extent2d,
    pub format: TextureFormat,
    pub flags: TextureFlags,
    pub debug_name: Option<String>,
}

impl RenderBufferDesc {
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            size: Extent2d::new(width, height),
            format,
            flags: TextureFlags::default(),
            debug_name: None,
        }
    }

    pub fn with_flags(mut self, flags: TextureFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_debug_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    fn key(&self) -> PhysicalKey {
        PhysicalKey {
            format: self.format,
            size: self.size,
            flags: self.flags,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PhysicalKey {
    format: TextureFormat,
    size: Extent2d,
    flags: TextureFlags,
}

#[derive(Debug)]
struct PhysicalTexture {
    key: PhysicalKey,
    texture: TextureHandle,
    in_use: bool,
    last_used_frame: u64,
}

/// Allocator of renderbuffer handles over aliased physical textures.
#[derive(Debug)]
pub struct RenderBufferPool {
    handles: IndexPool,
    /// Physical texture index per handle slot.
    slots: Vec<Option<usize>>,
    physical: Vec<PhysicalTexture>,
    frame: u64,
    retention_frames: u64,
}

impl RenderBufferPool {
    pub fn new(retention_frames: u64) -> Self {
        Self {
            handles: IndexPool::new(MAX_RENDERBUFFERS),
            slots: Vec::new(),
            physical: Vec::new(),
            frame: 0,
            retention_frames,
        }
    }

    /// Create a render target for the current frame.
    pub fn create(
        &mut self,
        device: &dyn GpuDevice,
        desc: &RenderBufferDesc,
    ) -> Result<RenderBufferHandle, GraphicsError> {
        let index = self
            .handles
            .alloc()
            .ok_or(CapacityError::RenderbuffersExhausted {
                capacity: MAX_RENDERBUFFERS,
            })?;

        let physical = match self.find_free(desc.key()) {
            Some(physical) => {
                log::debug!(
                    "Renderbuffer {:?} aliases physical texture {}",
                    desc.debug_name,
                    physical
                );
                physical
            }
            None => match self.create_physical(device, desc) {
                Ok(physical) => physical,
                Err(e) => {
                    self.handles.free(index);
                    return Err(e);
                }
            },
        };

        let entry = &mut self.physical[physical];
        entry.in_use = true;
        entry.last_used_frame = self.frame;

        let slot = index as usize;
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, None);
        }
        self.slots[slot] = Some(physical);

        Ok(RenderBufferHandle::pack(index, self.handles.generation(index)))
    }

    /// Release a render target; its physical texture becomes reusable.
    pub fn release(&mut self, handle: RenderBufferHandle) -> Result<(), HandleError> {
        let physical = self.resolve(handle)?;
        let entry = &mut self.physical[physical];
        entry.in_use = false;
        entry.last_used_frame = self.frame;

        self.slots[handle.index() as usize] = None;
        self.handles.free(handle.index());
        Ok(())
    }

    /// Physical texture behind a live handle.
    pub fn to_texture(&self, handle: RenderBufferHandle) -> Result<TextureHandle, HandleError> {
        self.resolve(handle).map(|physical| self.physical[physical].texture)
    }

    /// Close the frame: force-release leaked handles and retire idle textures.
    ///
    /// Returns the number of handles that were still alive.
    pub fn end_frame(&mut self, device: &dyn GpuDevice) -> usize {
        let leaked: Vec<u32> = self.handles.iter_live().collect();
        for &index in &leaked {
            log::warn!(
                "Renderbuffer slot {} not released before frame end, releasing",
                index
            );
            if let Some(physical) = self.slots[index as usize].take() {
                let entry = &mut self.physical[physical];
                entry.in_use = false;
                entry.last_used_frame = self.frame;
            }
            self.handles.free(index);
        }

        // No handle is alive here, so physical indices may shift.
        let frame = self.frame;
        let retention = self.retention_frames;
        self.physical.retain(|entry| {
            let idle = !entry.in_use && frame - entry.last_used_frame >= retention;
            if idle {
                log::debug!("Destroying idle renderbuffer texture {:?}", entry.texture);
                device.destroy_texture(entry.texture);
            }
            !idle
        });

        self.frame += 1;
        leaked.len()
    }

    /// Destroy every physical texture.
    pub fn destroy_all(&mut self, device: &dyn GpuDevice) {
        for entry in self.physical.drain(..) {
            device.destroy_texture(entry.texture);
        }
        self.slots.clear();
        self.handles = IndexPool::new(MAX_RENDERBUFFERS);
    }

    /// Number of live handles.
    pub fn live_count(&self) -> u32 {
        self.handles.live_count()
    }

    /// Number of physical textures currently owned.
    pub fn physical_count(&self) -> usize {
        self.physical.len()
    }

    fn resolve(&self, handle: RenderBufferHandle) -> Result<usize, HandleError> {
        let index = handle.index();
        if !handle.is_valid()
            || !self.handles.is_live(index)
            || self.handles.generation(index) != handle.generation()
        {
            return Err(HandleError::StaleRenderbuffer(handle.raw()));
        }
        self.slots[index as usize].ok_or(HandleError::StaleRenderbuffer(handle.raw()))
    }

    fn find_free(&self, key: PhysicalKey) -> Option<usize> {
        self.physical
            .iter()
            .position(|entry| !entry.in_use && entry.key == key)
    }

    fn create_physical(
        &mut self,
        device: &dyn GpuDevice,
        desc: &RenderBufferDesc,
    ) -> Result<usize, GraphicsError> {
        let mut descriptor = TextureDescriptor::new_2d(
            desc.size.width,
            desc.size.height,
            desc.format,
            desc.flags,
        );
        if let Some(name) = &desc.debug_name {
            descriptor = descriptor.with_label(name.clone());
        }

        let texture = device.create_texture(&descriptor, None)?;
        log::debug!(
            "Created renderbuffer texture {:?} {}x{} {:?}",
            desc.debug_name,
            desc.size.width,
            desc.size.height,
            desc.format
        );

        self.physical.push(PhysicalTexture {
            key: desc.key(),
            texture,
            in_use: false,
            last_used_frame: self.frame,
        });
        Ok(self.physical.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;
    use std::collections::HashSet;

    fn color(w: u32, h: u32) -> RenderBufferDesc {
        RenderBufferDesc::new(w, h, TextureFormat::Rgba16Float)
    }

    #[test]
    fn test_live_handles_never_collide() {
        let device = DummyDevice::new();
        let mut pool = RenderBufferPool::new(3);
        let mut live = HashSet::new();

        for step in 0..64u32 {
            let handle = pool.create(&device, &color(64, 64)).unwrap();
            assert!(live.insert(handle), "handle reused while alive");
            if step % 3 == 0 {
                let victim = *live.iter().next().unwrap();
                live.remove(&victim);
                pool.release(victim).unwrap();
            }
        }
        assert_eq!(pool.live_count() as usize, live.len());
    }

    #[test]
    fn test_release_then_create_aliases_texture() {
        let device = DummyDevice::new();
        let mut pool = RenderBufferPool::new(3);

        let a = pool.create(&device, &color(128, 128).with_debug_name("a")).unwrap();
        let texture = pool.to_texture(a).unwrap();
        pool.release(a).unwrap();

        // Debug name does not affect reuse
        let b = pool.create(&device, &color(128, 128).with_debug_name("b")).unwrap();
        assert_eq!(pool.to_texture(b).unwrap(), texture);
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn test_mismatched_descriptor_gets_new_texture() {
        let device = DummyDevice::new();
        let mut pool = RenderBufferPool::new(3);

        let a = pool.create(&device, &color(128, 128)).unwrap();
        pool.release(a).unwrap();

        let depth = RenderBufferDesc::new(128, 128, TextureFormat::Depth32Float);
        let b = pool.create(&device, &depth).unwrap();
        let c = pool.create(&device, &color(64, 64)).unwrap();

        assert_eq!(pool.physical_count(), 3);
        assert_ne!(pool.to_texture(b).unwrap(), pool.to_texture(c).unwrap());
    }

    #[test]
    fn test_first_fit_picks_lowest_index() {
        let device = DummyDevice::new();
        let mut pool = RenderBufferPool::new(3);

        let a = pool.create(&device, &color(32, 32)).unwrap();
        let b = pool.create(&device, &color(32, 32)).unwrap();
        let ta = pool.to_texture(a).unwrap();
        pool.release(b).unwrap();
        pool.release(a).unwrap();

        let c = pool.create(&device, &color(32, 32)).unwrap();
        assert_eq!(pool.to_texture(c).unwrap(), ta);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let device = DummyDevice::new();
        let mut pool = RenderBufferPool::new(3);

        let a = pool.create(&device, &color(8, 8)).unwrap();
        pool.release(a).unwrap();
        let b = pool.create(&device, &color(8, 8)).unwrap();

        // Same slot, different generation
        assert_ne!(a, b);
        assert_eq!(pool.to_texture(a), Err(HandleError::StaleRenderbuffer(a.raw())));
        assert_eq!(pool.release(a), Err(HandleError::StaleRenderbuffer(a.raw())));
        assert!(pool.to_texture(INVALID_RENDERBUFFER).is_err());
    }

    #[test]
    fn test_end_frame_releases_leaks() {
        let device = DummyDevice::new();
        let mut pool = RenderBufferPool::new(3);

        let a = pool.create(&device, &color(8, 8)).unwrap();
        pool.create(&device, &color(8, 8)).unwrap();

        assert_eq!(pool.end_frame(&device), 2);
        assert_eq!(pool.live_count(), 0);
        assert!(pool.to_texture(a).is_err());
        // Textures survive for reuse next frame
        assert_eq!(device.live_textures(), 2);
    }

    #[test]
    fn test_idle_textures_retired() {
        let device = DummyDevice::new();
        let mut pool = RenderBufferPool::new(2);

        let a = pool.create(&device, &color(8, 8)).unwrap();
        pool.release(a).unwrap();

        pool.end_frame(&device); // frame 0: used this frame
        pool.end_frame(&device); // frame 1: idle 1 frame
        assert_eq!(device.live_textures(), 1);
        pool.end_frame(&device); // frame 2: idle 2 frames
        assert_eq!(device.live_textures(), 0);
        assert_eq!(pool.physical_count(), 0);
    }

    #[test]
    fn test_reused_texture_stays_alive() {
        let device = DummyDevice::new();
        let mut pool = RenderBufferPool::new(1);

        for _ in 0..5 {
            let a = pool.create(&device, &color(8, 8)).unwrap();
            pool.release(a).unwrap();
            pool.end_frame(&device);
        }
        assert_eq!(device.destroyed_textures().len(), 0);
    }

    #[test]
    fn test_handle_packing() {
        let handle = RenderBufferHandle::pack(5, 3);
        assert_eq!(handle.index(), 5);
        assert_eq!(handle.generation(), 3);
        assert!(handle.is_valid());
        assert!(!INVALID_RENDERBUFFER.is_valid());
    }
}
