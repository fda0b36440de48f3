//! Dummy GPU device for testing and development.
//!
//! This device doesn't perform actual GPU operations. It hands out sequential
//! handles, keeps CPU copies of buffer contents, applies buffer uploads
//! to them on execute, and records every executed frame so tests can
//! inspect exactly what reached the device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::DeviceError;
use crate::stream::{DrawCommand, MergedStream};
use crate::types::{
    BufferDescriptor, BufferHandle, ProgramDesc, ProgramHandle, TextureDescriptor, TextureHandle,
};

use super::GpuDevice;

#[derive(Debug, Default)]
struct DummyState {
    buffers: HashMap<BufferHandle, Vec<u8>>,
    textures: HashMap<TextureHandle, TextureDescriptor>,
    programs: Vec<ProgramDesc>,
    destroyed_buffers: Vec<BufferHandle>,
    destroyed_textures: Vec<TextureHandle>,
    executed: Vec<Vec<DrawCommand>>,
    invalid_references: usize,
}

/// Dummy GPU device.
#[derive(Debug, Default)]
pub struct DummyDevice {
    next_handle: AtomicU32,
    state: Mutex<DummyState>,
    execute_delay: Option<Duration>,
}

impl DummyDevice {
    /// Create a new dummy device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` in every `execute`, to simulate a slow GPU.
    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }

    fn next_raw(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of frames executed so far.
    pub fn executed_frames(&self) -> usize {
        self.state.lock().executed.len()
    }

    /// Commands of an executed frame, in execution order.
    pub fn executed_commands(&self, frame: usize) -> Option<Vec<DrawCommand>> {
        self.state.lock().executed.get(frame).cloned()
    }

    /// Current CPU copy of a live buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer).cloned()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.state.lock().textures.len()
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<TextureDescriptor> {
        self.state.lock().textures.get(&texture).cloned()
    }

    pub fn destroyed_textures(&self) -> Vec<TextureHandle> {
        self.state.lock().destroyed_textures.clone()
    }

    pub fn destroyed_buffers(&self) -> Vec<BufferHandle> {
        self.state.lock().destroyed_buffers.clone()
    }

    /// Number of programs compiled.
    pub fn programs_compiled(&self) -> usize {
        self.state.lock().programs.len()
    }

    /// Commands executed so far that referenced a resource which was not live.
    pub fn invalid_references(&self) -> usize {
        self.state.lock().invalid_references
    }
}

impl GpuDevice for DummyDevice {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        data: Option<&[u8]>,
    ) -> Result<BufferHandle, DeviceError> {
        log::trace!(
            "DummyDevice: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );

        let mut contents = vec![0u8; descriptor.size as usize];
        if let Some(data) = data {
            if data.len() > contents.len() {
                return Err(DeviceError::InvalidParameter(format!(
                    "initial data ({} bytes) larger than buffer ({} bytes)",
                    data.len(),
                    descriptor.size
                )));
            }
            contents[..data.len()].copy_from_slice(data);
        }

        let handle = BufferHandle::from_raw(self.next_raw());
        self.state.lock().buffers.insert(handle, contents);
        Ok(handle)
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        log::trace!("DummyDevice: destroying buffer {:?}", buffer);
        let mut state = self.state.lock();
        if state.buffers.remove(&buffer).is_some() {
            state.destroyed_buffers.push(buffer);
        }
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<TextureHandle, DeviceError> {
        log::trace!(
            "DummyDevice: creating texture {:?} ({}x{}x{} {:?})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.depth,
            descriptor.format
        );

        if descriptor.size.width == 0 || descriptor.size.height == 0 {
            return Err(DeviceError::InvalidParameter(
                "texture size must be non-zero".into(),
            ));
        }
        if let Some(data) = data {
            if data.len() as u64 > descriptor.byte_size() {
                return Err(DeviceError::InvalidParameter(
                    "initial data larger than texture".into(),
                ));
            }
        }

        let handle = TextureHandle::from_raw(self.next_raw());
        self.state.lock().textures.insert(handle, descriptor.clone());
        Ok(handle)
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        log::trace!("DummyDevice: destroying texture {:?}", texture);
        let mut state = self.state.lock();
        if state.textures.remove(&texture).is_some() {
            state.destroyed_textures.push(texture);
        }
    }

    fn create_program(&self, descriptor: &ProgramDesc) -> Result<ProgramHandle, DeviceError> {
        log::trace!("DummyDevice: compiling program {:?}", descriptor.name);
        let handle = ProgramHandle::from_raw(self.next_raw());
        self.state.lock().programs.push(descriptor.clone());
        Ok(handle)
    }

    fn execute(&self, stream: &MergedStream) -> Result<(), DeviceError> {
        log::trace!("DummyDevice: executing {} commands", stream.len());

        if let Some(delay) = self.execute_delay {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock();
        let mut commands = Vec::with_capacity(stream.len());
        let mut invalid = 0;

        for recorded in stream.iter() {
            if let Some((buffer, offset, bytes)) = recorded.buffer_upload() {
                match state.buffers.get_mut(&buffer) {
                    Some(contents) => {
                        let start = offset as usize;
                        let end = start + bytes.len();
                        if end > contents.len() {
                            return Err(DeviceError::InvalidParameter(format!(
                                "buffer update {start}..{end} out of bounds ({} bytes)",
                                contents.len()
                            )));
                        }
                        contents[start..end].copy_from_slice(bytes);
                    }
                    None => invalid += 1,
                }
            }
            match *recorded.command {
                DrawCommand::BindTexture { texture, .. } => {
                    if !state.textures.contains_key(&texture) {
                        invalid += 1;
                    }
                }
                DrawCommand::SetFramebuffer {
                    attachments,
                    count,
                    depth,
                    ..
                } => {
                    let referenced = attachments[..count as usize]
                        .iter()
                        .chain(std::iter::once(&depth))
                        .filter(|t| t.is_valid());
                    invalid += referenced
                        .filter(|t| !state.textures.contains_key(*t))
                        .count();
                }
                DrawCommand::BindUniformBuffer { buffer, .. }
                | DrawCommand::BindVertexBuffer { buffer, .. }
                | DrawCommand::BindIndexBuffer { buffer, .. } => {
                    if !state.buffers.contains_key(&buffer) {
                        invalid += 1;
                    }
                }
                _ => {}
            }
            commands.push(*recorded.command);
        }

        state.invalid_references += invalid;
        state.executed.push(commands);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::DrawStream;
    use crate::types::{BufferFlags, TextureFlags, TextureFormat};

    #[test]
    fn test_handles_are_unique() {
        let device = DummyDevice::new();
        let a = device
            .create_buffer(&BufferDescriptor::new(16, BufferFlags::empty()), None)
            .unwrap();
        let t = device
            .create_texture(
                &TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm, TextureFlags::default()),
                None,
            )
            .unwrap();
        assert_ne!(a.raw(), t.raw());
        assert_eq!(device.live_buffers(), 1);
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn test_execute_applies_buffer_updates() {
        let device = DummyDevice::new();
        let buffer = device
            .create_buffer(&BufferDescriptor::new(8, BufferFlags::UNIFORM_BUFFER), None)
            .unwrap();

        let mut stream = DrawStream::new();
        stream.update_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        device.execute(&stream.finalize().unwrap()).unwrap();

        assert_eq!(device.buffer_contents(buffer).unwrap(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(device.executed_frames(), 1);
    }

    #[test]
    fn test_out_of_bounds_update_fails() {
        let device = DummyDevice::new();
        let buffer = device
            .create_buffer(&BufferDescriptor::new(4, BufferFlags::empty()), None)
            .unwrap();

        let mut stream = DrawStream::new();
        stream.update_buffer(buffer, 2, &[0; 4]).unwrap();
        assert!(device.execute(&stream.finalize().unwrap()).is_err());
    }

    #[test]
    fn test_destroyed_texture_reference_is_counted() {
        let device = DummyDevice::new();
        let texture = device
            .create_texture(
                &TextureDescriptor::new_2d(4, 4, TextureFormat::R8Unorm, TextureFlags::default()),
                None,
            )
            .unwrap();
        device.destroy_texture(texture);

        let mut stream = DrawStream::new();
        stream.bind_texture(0, texture);
        device.execute(&stream.finalize().unwrap()).unwrap();

        assert_eq!(device.invalid_references(), 1);
        assert_eq!(device.destroyed_textures(), vec![texture]);
    }

    #[test]
    fn test_zero_sized_texture_rejected() {
        let device = DummyDevice::new();
        let result = device.create_texture(
            &TextureDescriptor::new_2d(0, 4, TextureFormat::R8Unorm, TextureFlags::default()),
            None,
        );
        assert!(matches!(result, Err(DeviceError::InvalidParameter(_))));
    }
}
