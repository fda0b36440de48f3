//! Material constants packed into one shared uniform buffer.
//!
//! Each material owns a region of the buffer addressed by a [`MaterialIndex`].
//! Regions are rounded up to a power-of-two size class (at least
//! [`MIN_CLASS_SIZE`] bytes). Destroyed regions go onto the free list of their
//! class and are handed out again before the buffer's high-water mark grows.
//!
//! Writes land in a CPU shadow of the buffer; the dirty byte range is uploaded
//! once per frame through the frame prologue stream.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::ops::Range;

use kiln_core::pool::IndexPool;

use crate::backend::GpuDevice;
use crate::error::{CapacityError, DeviceError, HandleError};
use crate::stream::DrawStream;
use crate::types::{BufferDescriptor, BufferFlags, BufferHandle};

/// Smallest region size handed out.
pub const MIN_CLASS_SIZE: u32 = 16;

/// Handle to a material constants region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialIndex(u32);

impl MaterialIndex {
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone)]
struct MaterialSlot {
    offset: u32,
    /// Bytes requested by the caller; writes are bounded by this.
    size: u32,
    class: usize,
    /// Content hash for deduplicated constants; `None` for instances.
    hash: Option<u64>,
    refs: u32,
}

/// Size-class allocator over the shared material uniform buffer.
#[derive(Debug)]
pub struct MaterialConstants {
    buffer: BufferHandle,
    capacity: u32,
    high_water: u32,
    /// Free region offsets per size class.
    free_lists: Vec<Vec<u32>>,
    indices: IndexPool,
    slots: Vec<Option<MaterialSlot>>,
    by_hash: HashMap<u64, MaterialIndex>,
    shadow: Vec<u8>,
    dirty: Option<Range<u32>>,
}

impl MaterialConstants {
    pub fn new(device: &dyn GpuDevice, capacity: u32) -> Result<Self, DeviceError> {
        let descriptor = BufferDescriptor::new(capacity, BufferFlags::UNIFORM_BUFFER)
            .with_label("material_constants");
        let buffer = device.create_buffer(&descriptor, None)?;

        Ok(Self {
            buffer,
            capacity,
            high_water: 0,
            free_lists: Vec::new(),
            indices: IndexPool::new(capacity / MIN_CLASS_SIZE),
            slots: Vec::new(),
            by_hash: HashMap::new(),
            shadow: vec![0; capacity as usize],
            dirty: None,
        })
    }

    /// Reserve a region for `data`, sharing it with identical constants.
    pub fn create_constants(&mut self, data: &[u8]) -> Result<MaterialIndex, CapacityError> {
        let hash = content_hash(data);
        if let Some(&index) = self.by_hash.get(&hash)
            && let Some(slot) = self.slots[index.0 as usize].as_mut()
            && self.shadow[slot.offset as usize..(slot.offset + slot.size) as usize] == *data
        {
            slot.refs += 1;
            return Ok(index);
        }

        let index = self.allocate(data, Some(hash))?;
        self.by_hash.insert(hash, index);
        Ok(index)
    }

    /// Reserve a fresh region for `data`, never shared.
    pub fn create_instance(&mut self, data: &[u8]) -> Result<MaterialIndex, CapacityError> {
        self.allocate(data, None)
    }

    /// Write `data` at byte `offset` inside the region of `index`.
    ///
    /// A deduplicated region stops being shared by content from here on.
    pub fn update(&mut self, index: MaterialIndex, offset: u32, data: &[u8]) -> Result<(), HandleError> {
        let slot = self.slot(index)?;
        let len = u32::try_from(data.len()).unwrap_or(u32::MAX);
        if offset as u64 + len as u64 > slot.size as u64 {
            return Err(HandleError::MaterialWriteOutOfBounds {
                offset,
                len,
                reserved: slot.size,
            });
        }

        let start = slot.offset + offset;
        if let Some(hash) = slot.hash.take() {
            self.by_hash.remove(&hash);
        }
        self.write(start, data);
        Ok(())
    }

    /// Drop one reference; the region is recycled when none remain.
    pub fn destroy(&mut self, index: MaterialIndex) -> Result<(), HandleError> {
        let slot = self.slot(index)?;
        slot.refs -= 1;
        if slot.refs > 0 {
            return Ok(());
        }

        let (offset, class, hash) = (slot.offset, slot.class, slot.hash);
        if let Some(hash) = hash {
            self.by_hash.remove(&hash);
        }
        self.free_lists[class].push(offset);
        self.slots[index.0 as usize] = None;
        self.indices.free(index.0);
        Ok(())
    }

    /// Byte offset of a live region inside the uniform buffer.
    pub fn offset(&self, index: MaterialIndex) -> Option<u32> {
        self.slots
            .get(index.0 as usize)
            .and_then(Option::as_ref)
            .map(|slot| slot.offset)
    }

    /// Record the upload of everything written since the last upload.
    pub fn upload(&mut self, stream: &mut DrawStream) -> Result<(), CapacityError> {
        if let Some(range) = self.dirty.take() {
            log::trace!("Uploading material constants {:?}", range);
            stream.update_buffer(
                self.buffer,
                range.start,
                &self.shadow[range.start as usize..range.end as usize],
            )?;
        }
        Ok(())
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn live_count(&self) -> u32 {
        self.indices.live_count()
    }

    /// Bytes of the buffer ever handed out.
    pub fn high_water(&self) -> u32 {
        self.high_water
    }

    pub fn destroy_buffer(&self, device: &dyn GpuDevice) {
        device.destroy_buffer(self.buffer);
    }

    fn allocate(&mut self, data: &[u8], hash: Option<u64>) -> Result<MaterialIndex, CapacityError> {
        let size = data.len() as u32;
        let exhausted = CapacityError::MaterialBufferExhausted { requested: size };

        let (class, class_size) = size_class(size);
        if self.free_lists.len() <= class {
            self.free_lists.resize_with(class + 1, Vec::new);
        }

        let offset = match self.free_lists[class].pop() {
            Some(offset) => offset,
            None => {
                if self.high_water as u64 + class_size as u64 > self.capacity as u64 {
                    return Err(exhausted);
                }
                let offset = self.high_water;
                self.high_water += class_size;
                offset
            }
        };

        let Some(index) = self.indices.alloc() else {
            self.free_lists[class].push(offset);
            return Err(exhausted);
        };

        let slot = index as usize;
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, None);
        }
        self.slots[slot] = Some(MaterialSlot {
            offset,
            size,
            class,
            hash,
            refs: 1,
        });

        self.write(offset, data);
        Ok(MaterialIndex(index))
    }

    fn slot(&mut self, index: MaterialIndex) -> Result<&mut MaterialSlot, HandleError> {
        self.slots
            .get_mut(index.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(HandleError::InvalidMaterial(index.0))
    }

    fn write(&mut self, offset: u32, data: &[u8]) {
        let end = offset + data.len() as u32;
        self.shadow[offset as usize..end as usize].copy_from_slice(data);

        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(offset)..range.end.max(end),
            None => offset..end,
        });
    }
}

/// Size class index and size for a request of `size` bytes.
fn size_class(size: u32) -> (usize, u32) {
    let class_size = size.max(MIN_CLASS_SIZE).next_power_of_two();
    let class = (class_size.trailing_zeros() - MIN_CLASS_SIZE.trailing_zeros()) as usize;
    (class, class_size)
}

fn content_hash(data: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;

    fn arena(capacity: u32) -> (DummyDevice, MaterialConstants) {
        let device = DummyDevice::new();
        let constants = MaterialConstants::new(&device, capacity).unwrap();
        (device, constants)
    }

    #[test]
    fn test_size_classes() {
        assert_eq!(size_class(1), (0, 16));
        assert_eq!(size_class(16), (0, 16));
        assert_eq!(size_class(17), (1, 32));
        assert_eq!(size_class(100), (3, 128));
    }

    #[test]
    fn test_identical_constants_are_shared() {
        let (_device, mut constants) = arena(1024);
        let a = constants.create_constants(&[1; 20]).unwrap();
        let b = constants.create_constants(&[1; 20]).unwrap();
        let c = constants.create_constants(&[2; 20]).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(constants.live_count(), 2);

        // Shared region survives one destroy
        constants.destroy(a).unwrap();
        assert!(constants.offset(b).is_some());
        constants.destroy(b).unwrap();
        assert!(constants.offset(b).is_none());
    }

    #[test]
    fn test_instances_are_never_shared() {
        let (_device, mut constants) = arena(1024);
        let a = constants.create_instance(&[1; 16]).unwrap();
        let b = constants.create_instance(&[1; 16]).unwrap();
        assert_ne!(constants.offset(a), constants.offset(b));
    }

    #[test]
    fn test_freed_region_reused_by_same_class() {
        let (_device, mut constants) = arena(1024);
        let a = constants.create_instance(&[0; 24]).unwrap();
        let offset = constants.offset(a).unwrap();
        constants.destroy(a).unwrap();

        let high_water = constants.high_water();
        let b = constants.create_instance(&[0; 30]).unwrap();
        assert_eq!(constants.offset(b), Some(offset));
        assert_eq!(constants.high_water(), high_water);
    }

    #[test]
    fn test_update_bounds() {
        let (_device, mut constants) = arena(1024);
        let a = constants.create_instance(&[0; 12]).unwrap();

        assert!(constants.update(a, 8, &[1, 2, 3, 4]).is_ok());
        assert_eq!(
            constants.update(a, 10, &[1, 2, 3, 4]),
            Err(HandleError::MaterialWriteOutOfBounds {
                offset: 10,
                len: 4,
                reserved: 12
            })
        );
    }

    #[test]
    fn test_updated_constants_no_longer_deduplicated() {
        let (_device, mut constants) = arena(1024);
        let a = constants.create_constants(&[5; 16]).unwrap();
        constants.update(a, 0, &[6]).unwrap();

        let b = constants.create_constants(&[5; 16]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_destroyed_index_rejected() {
        let (_device, mut constants) = arena(1024);
        let a = constants.create_instance(&[0; 4]).unwrap();
        constants.destroy(a).unwrap();
        assert_eq!(constants.destroy(a), Err(HandleError::InvalidMaterial(a.raw())));
        assert!(constants.update(a, 0, &[1]).is_err());
    }

    #[test]
    fn test_exhaustion() {
        let (_device, mut constants) = arena(64);
        constants.create_instance(&[0; 64]).unwrap();
        assert_eq!(
            constants.create_instance(&[0; 1]),
            Err(CapacityError::MaterialBufferExhausted { requested: 1 })
        );
    }

    #[test]
    fn test_upload_dirty_range() {
        let (device, mut constants) = arena(256);
        let _a = constants.create_instance(&[1; 16]).unwrap();
        let b = constants.create_instance(&[2; 16]).unwrap();
        constants.update(b, 4, &[9, 9]).unwrap();

        let mut stream = DrawStream::new();
        constants.upload(&mut stream).unwrap();
        let merged = stream.finalize().unwrap();
        assert_eq!(merged.len(), 1);
        device.execute(&merged).unwrap();

        let contents = device.buffer_contents(constants.buffer()).unwrap();
        assert_eq!(&contents[0..4], &[1; 4]);
        assert_eq!(&contents[16..22], &[2, 2, 2, 2, 9, 9]);

        // Nothing left to upload
        let mut stream = DrawStream::new();
        constants.upload(&mut stream).unwrap();
        assert!(stream.finalize().unwrap().is_empty());
    }
}
