//! The renderer: owner of the frame loop and every per-frame resource.
//!
//! A frame moves through three phases on the logic thread:
//!
//! 1. **Setup** - after [`Renderer::wait_can_setup`], systems record into the
//!    root [`DrawStream`] and push recording jobs.
//! 2. **Command setup** - [`Renderer::wait_for_command_setup`] blocks until
//!    every pushed job has finished recording.
//! 3. **Submit** - [`Renderer::frame`] merges the frame's streams, hands them
//!    to the execution side and advances the frame counter.
//!
//! Execution of frame N overlaps setup of frames N+1 .. N+F-1, where F is the
//! configured number of frames in flight.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytemuck::Pod;

use crate::backend::GpuDevice;
use crate::config::{CapacityPolicy, ExecutionMode, RendererConfig};
use crate::error::{CapacityError, DeviceError, GraphicsError, HandleError};
use crate::jobs::{InlineExecutor, JobExecutor, JobSystem, WorkerPool};
use crate::plugin::{Pipeline, PipelineId, PluginList, PluginSnapshot, RenderPlugin};
use crate::profiling::{frame_mark, profile_function, profile_plot, profile_scope};
use crate::resources::{
    INVALID_RENDERBUFFER, MaterialConstants, MaterialIndex, NameTable, RenderBufferDesc,
    RenderBufferHandle, RenderBufferPool, SemanticDefines, SortKey, SortKeyPool, TransientPool,
    TransientSlice, UniformPool,
};
use crate::scheduler::{Fence, FramePacket, FramePipeline, FrameSubmitter, RenderThread};
use crate::stream::{DrawStream, MemRef, MergedStream, ScratchSpan};
use crate::types::{
    AttributeSemantic, BufferDescriptor, BufferFlags, BufferHandle, FramebufferFlags, ProgramDesc,
    ProgramHandle, TextureDescriptor, TextureFlags, TextureFormat, TextureHandle, Viewport,
};

/// A device object whose destruction waits for in-flight frames.
#[derive(Debug, Clone, Copy)]
enum Retired {
    Buffer(BufferHandle),
    Texture(TextureHandle),
}

/// Frame-pipelined render command scheduler.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kiln_graphics::backend::DummyDevice;
/// use kiln_graphics::{Renderer, RendererConfig};
///
/// let device = Arc::new(DummyDevice::new());
/// let mut renderer = Renderer::new(device.clone(), RendererConfig::default()).unwrap();
///
/// renderer.wait_can_setup();
/// renderer.push_job(Some("triangle"), |stream| stream.draw_arrays(0, 3));
/// renderer.frame();
///
/// assert_eq!(renderer.frame_number(), 1);
/// assert_eq!(device.executed_frames(), 1);
/// ```
pub struct Renderer {
    config: RendererConfig,
    device: Arc<dyn GpuDevice>,
    jobs: JobSystem,
    // Worker threads stay alive as long as the renderer
    _workers: Option<Arc<WorkerPool>>,

    stream: DrawStream,
    end_frame_stream: DrawStream,
    pipeline: FramePipeline,
    submitter: FrameSubmitter,
    setup_open: bool,
    frame_number: u64,

    renderbuffers: RenderBufferPool,
    sort_keys: SortKeyPool,
    shader_defines: NameTable,
    layers: NameTable,
    semantic_defines: SemanticDefines,
    materials: MaterialConstants,
    uniform_pool: Arc<UniformPool>,
    transient_pool: Arc<TransientPool>,
    /// Bytes of owned upload memory not yet released.
    live_memory: Arc<AtomicUsize>,
    programs: HashMap<ProgramDesc, ProgramHandle>,

    /// Destroyed during the current setup; retired with this frame's fence.
    pending_destroy: Vec<Retired>,
    retired: VecDeque<(Fence, Vec<Retired>)>,

    plugins: PluginList,
    next_pipeline_id: u64,
    lod_multiplier: f32,
    builtin_taa: bool,
}

impl Renderer {
    /// Create a renderer over `device`, spawning worker threads and the render
    /// thread as configured.
    pub fn new(device: Arc<dyn GpuDevice>, config: RendererConfig) -> Result<Self, GraphicsError> {
        config.validate().map_err(GraphicsError::InvalidConfig)?;

        if config.worker_threads == 0 {
            return Self::build(device, config, Arc::new(InlineExecutor), None);
        }

        let workers = Arc::new(
            WorkerPool::new(config.worker_threads).map_err(|e| GraphicsError::ThreadSpawn(e.to_string()))?,
        );
        let executor: Arc<dyn JobExecutor> = workers.clone();
        Self::build(device, config, executor, Some(workers))
    }

    /// Create a renderer whose jobs run on `executor`.
    pub fn with_executor(
        device: Arc<dyn GpuDevice>,
        config: RendererConfig,
        executor: Arc<dyn JobExecutor>,
    ) -> Result<Self, GraphicsError> {
        config.validate().map_err(GraphicsError::InvalidConfig)?;
        Self::build(device, config, executor, None)
    }

    fn build(
        device: Arc<dyn GpuDevice>,
        config: RendererConfig,
        executor: Arc<dyn JobExecutor>,
        workers: Option<Arc<WorkerPool>>,
    ) -> Result<Self, GraphicsError> {
        let frames = config.frames_in_flight as u32;
        let uniform_pool = Arc::new(UniformPool::new(device.as_ref(), config.uniform_pool_size, frames)?);
        let transient_pool = Arc::new(TransientPool::new(
            device.as_ref(),
            config.transient_pool_size,
            frames,
        )?);
        let materials = MaterialConstants::new(device.as_ref(), config.material_buffer_size)?;

        let submitter = match config.execution {
            ExecutionMode::Inline => FrameSubmitter::Inline(device.clone()),
            ExecutionMode::RenderThread => FrameSubmitter::Threaded(
                RenderThread::spawn(device.clone()).map_err(|e| GraphicsError::ThreadSpawn(e.to_string()))?,
            ),
        };

        let retention = config
            .renderbuffer_retention_frames
            .max(config.frames_in_flight as u64);

        log::info!(
            "Renderer created on `{}` ({} frames in flight, {:?} execution, {} job workers)",
            device.name(),
            config.frames_in_flight,
            config.execution,
            workers.as_ref().map_or(0, |pool| pool.num_threads())
        );

        Ok(Self {
            jobs: JobSystem::new(executor),
            _workers: workers,
            stream: DrawStream::new(),
            end_frame_stream: DrawStream::new(),
            pipeline: FramePipeline::new(config.frames_in_flight),
            submitter,
            setup_open: false,
            frame_number: 0,
            renderbuffers: RenderBufferPool::new(retention),
            sort_keys: SortKeyPool::new(config.max_sort_keys),
            shader_defines: NameTable::shader_defines(),
            layers: NameTable::layers(),
            semantic_defines: SemanticDefines::new(),
            materials,
            uniform_pool,
            transient_pool,
            live_memory: Arc::new(AtomicUsize::new(0)),
            programs: HashMap::new(),
            pending_destroy: Vec::new(),
            retired: VecDeque::new(),
            plugins: PluginList::new(),
            next_pipeline_id: 0,
            lod_multiplier: 1.0,
            builtin_taa: false,
            config,
            device,
        })
    }

    // ------------------------------------------------------------------
    // Frame loop
    // ------------------------------------------------------------------

    /// Block until setup of the next frame may start.
    ///
    /// Waits for the frame `frames_in_flight` frames back to finish
    /// executing, so its transient memory can be reused. Idempotent within
    /// one frame.
    pub fn wait_can_setup(&mut self) {
        if self.setup_open {
            return;
        }
        profile_scope!("wait_can_setup");
        self.pipeline.begin_frame();
        self.setup_open = true;
    }

    /// Block until every job pushed so far has finished recording.
    pub fn wait_for_command_setup(&self) {
        profile_scope!("wait_for_command_setup");
        self.jobs.wait_idle();
    }

    /// Block until the most recently submitted frame has executed.
    pub fn wait_for_render(&self) {
        profile_scope!("wait_for_render");
        if let Some(fence) = self.pipeline.last_fence() {
            fence.wait();
        }
    }

    /// Merge and submit the current frame, then start the next one.
    ///
    /// The submitted stream is, in order: the frame prologue (material,
    /// uniform and transient uploads), the root stream with every sub-stream
    /// spliced in place, and the end-of-frame stream.
    ///
    /// # Panics
    ///
    /// Panics if a stream of this frame is malformed (unbalanced profile
    /// blocks, or a sub-stream handle kept beyond its job).
    pub fn frame(&mut self) {
        profile_function!();

        self.wait_can_setup();

        let plugins = self.plugins.begin_dispatch();
        for plugin in plugins.iter() {
            plugin.frame(self);
        }
        drop(plugins);

        self.wait_for_command_setup();

        let leaked = self.renderbuffers.end_frame(self.device.as_ref());
        if leaked > 0 {
            log::warn!("Frame {}: {} renderbuffer(s) not released", self.frame_number, leaked);
        }

        let merged = match self.merge_frame() {
            Ok(merged) => merged,
            Err(err) => {
                log::error!("Frame {} cannot be submitted: {}", self.frame_number, err);
                panic!("frame {} cannot be submitted: {err}", self.frame_number);
            }
        };
        profile_plot!("frame_commands", merged.len() as f64);

        let fence = Fence::new_unsignaled();
        let pending = std::mem::take(&mut self.pending_destroy);
        if !pending.is_empty() {
            self.retired.push_back((fence.clone(), pending));
        }

        self.submitter.submit(FramePacket {
            frame_number: self.frame_number,
            stream: merged,
            fence: fence.clone(),
        });
        self.pipeline.end_frame(fence);

        self.uniform_pool.next_frame();
        self.transient_pool.next_frame();
        self.collect_retired();

        self.frame_number += 1;
        self.setup_open = false;
        frame_mark!();
    }

    fn merge_frame(&mut self) -> Result<MergedStream, GraphicsError> {
        profile_scope!("merge_frame");

        let mut prologue = DrawStream::new();
        self.materials.upload(&mut prologue)?;
        self.uniform_pool.upload(&mut prologue)?;
        self.transient_pool.upload(&mut prologue)?;

        let root = std::mem::take(&mut self.stream);
        let end = std::mem::take(&mut self.end_frame_stream);

        let mut merged = prologue.finalize()?;
        merged.append(root.finalize()?);
        merged.append(end.finalize()?);
        Ok(merged)
    }

    /// Destroy retired objects whose frames have executed.
    fn collect_retired(&mut self) {
        while self.retired.front().is_some_and(|(fence, _)| fence.is_signaled()) {
            if let Some((_, objects)) = self.retired.pop_front() {
                self.destroy_now(objects);
            }
        }
    }

    fn destroy_now(&self, objects: Vec<Retired>) {
        for object in objects {
            match object {
                Retired::Buffer(buffer) => self.device.destroy_buffer(buffer),
                Retired::Texture(texture) => self.device.destroy_texture(texture),
            }
        }
    }

    /// Number of frames submitted so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn frames_in_flight(&self) -> usize {
        self.config.frames_in_flight
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    // ------------------------------------------------------------------
    // Streams and jobs
    // ------------------------------------------------------------------

    /// The root stream of the frame being set up.
    pub fn draw_stream(&mut self) -> &mut DrawStream {
        &mut self.stream
    }

    /// Stream submitted after the root stream, for end-of-frame work such as
    /// readbacks and UI.
    pub fn end_frame_draw_stream(&mut self) -> &mut DrawStream {
        &mut self.end_frame_stream
    }

    /// Record `f` into a sub-stream spliced at the current end of the root
    /// stream, possibly on a worker thread.
    pub fn push_job<F>(&mut self, name: Option<&'static str>, f: F)
    where
        F: FnOnce(&mut DrawStream) + Send + 'static,
    {
        self.jobs.push(&mut self.stream, name, f);
    }

    pub fn jobs(&self) -> &JobSystem {
        &self.jobs
    }

    pub fn begin_profile_block(&mut self, name: &'static str, link: i64, stats: bool) {
        self.stream.begin_profile_block(name, link, stats);
    }

    pub fn end_profile_block(&mut self) {
        self.stream.end_profile_block();
    }

    // ------------------------------------------------------------------
    // Renderbuffers
    // ------------------------------------------------------------------

    /// Create a frame-scoped render target.
    ///
    /// Returns [`INVALID_RENDERBUFFER`] when the handle table is full and the
    /// capacity policy is [`CapacityPolicy::Degrade`].
    pub fn create_renderbuffer(&mut self, desc: &RenderBufferDesc) -> Result<RenderBufferHandle, DeviceError> {
        match self.renderbuffers.create(self.device.as_ref(), desc) {
            Ok(handle) => Ok(handle),
            Err(GraphicsError::Capacity(err)) => Ok(self.capacity_failure(err, INVALID_RENDERBUFFER)),
            Err(GraphicsError::Device(err)) => Err(err),
            Err(err) => Err(DeviceError::ResourceCreationFailed(err.to_string())),
        }
    }

    pub fn release_renderbuffer(&mut self, handle: RenderBufferHandle) -> Result<(), HandleError> {
        self.renderbuffers.release(handle)
    }

    pub fn to_texture(&self, handle: RenderBufferHandle) -> Result<TextureHandle, HandleError> {
        self.renderbuffers.to_texture(handle)
    }

    /// Bind renderbuffers as the framebuffer of the root stream.
    ///
    /// An invalid `depth` binds no depth attachment.
    pub fn set_render_targets(
        &mut self,
        color: &[RenderBufferHandle],
        depth: RenderBufferHandle,
        flags: FramebufferFlags,
    ) -> Result<(), HandleError> {
        let color = color
            .iter()
            .map(|&handle| self.renderbuffers.to_texture(handle))
            .collect::<Result<Vec<_>, _>>()?;
        let depth = if depth.is_valid() {
            self.renderbuffers.to_texture(depth)?
        } else {
            TextureHandle::INVALID
        };
        self.stream.set_framebuffer(&color, depth, flags);
        Ok(())
    }

    pub fn renderbuffers(&self) -> &RenderBufferPool {
        &self.renderbuffers
    }

    // ------------------------------------------------------------------
    // Sort keys, defines and layers
    // ------------------------------------------------------------------

    /// Allocate a unique sort key, seeded by `hash`.
    ///
    /// Returns [`SortKey::INVALID`] when the pool is full and the capacity
    /// policy is [`CapacityPolicy::Degrade`].
    pub fn alloc_sort_key(&mut self, hash: u64) -> SortKey {
        match self.sort_keys.alloc(hash) {
            Ok(key) => key,
            Err(err) => self.capacity_failure(err, SortKey::INVALID),
        }
    }

    /// Return a key to the pool. [`SortKey::INVALID`] is ignored.
    pub fn free_sort_key(&mut self, key: SortKey) {
        if key.is_valid() {
            self.sort_keys.free(key);
        }
    }

    /// One past the largest sort key value handed out so far.
    pub fn max_sort_key(&self) -> u32 {
        self.sort_keys.max_sort_key()
    }

    /// Index of a shader define, assigned on first use.
    ///
    /// # Panics
    ///
    /// Panics when the define table is full.
    pub fn shader_define_index(&mut self, name: &str) -> u8 {
        match self.shader_defines.index_of(name) {
            Ok(index) => index,
            Err(err) => {
                log::error!("{}", err);
                panic!("{err}");
            }
        }
    }

    pub fn shader_define(&self, index: u8) -> Option<&str> {
        self.shader_defines.name(index)
    }

    pub fn shader_defines_count(&self) -> usize {
        self.shader_defines.len()
    }

    /// Index of a layer, assigned on first use.
    ///
    /// # Panics
    ///
    /// Panics when the layer table is full.
    pub fn layer_index(&mut self, name: &str) -> u8 {
        match self.layers.index_of(name) {
            Ok(index) => index,
            Err(err) => {
                log::error!("{}", err);
                panic!("{err}");
            }
        }
    }

    pub fn layer_name(&self, index: u8) -> Option<&str> {
        self.layers.name(index)
    }

    pub fn layers_count(&self) -> usize {
        self.layers.len()
    }

    /// `#define` block announcing the vertex attributes a program receives.
    pub fn semantic_defines(&mut self, attributes: &[AttributeSemantic]) -> &str {
        self.semantic_defines.get(attributes)
    }

    // ------------------------------------------------------------------
    // Materials
    // ------------------------------------------------------------------

    /// Store material constants, sharing the region with identical ones.
    pub fn create_material_constants(&mut self, data: &[f32]) -> Option<MaterialIndex> {
        match self.materials.create_constants(bytemuck::cast_slice(data)) {
            Ok(index) => Some(index),
            Err(err) => self.capacity_failure(err, None),
        }
    }

    /// Store per-instance material constants that are never shared.
    pub fn create_material_instance(&mut self, data: &[f32]) -> Option<MaterialIndex> {
        match self.materials.create_instance(bytemuck::cast_slice(data)) {
            Ok(index) => Some(index),
            Err(err) => self.capacity_failure(err, None),
        }
    }

    /// Overwrite constants starting at byte `offset` inside the region.
    pub fn update_material_constants(
        &mut self,
        index: MaterialIndex,
        data: &[f32],
        offset: u32,
    ) -> Result<(), HandleError> {
        self.materials.update(index, offset, bytemuck::cast_slice(data))
    }

    pub fn destroy_material_constants(&mut self, index: MaterialIndex) -> Result<(), HandleError> {
        self.materials.destroy(index)
    }

    /// Byte offset of a material's constants in the material uniform buffer.
    pub fn material_offset(&self, index: MaterialIndex) -> Option<u32> {
        self.materials.offset(index)
    }

    pub fn material_uniform_buffer(&self) -> BufferHandle {
        self.materials.buffer()
    }

    // ------------------------------------------------------------------
    // Per-frame pools
    // ------------------------------------------------------------------

    /// Uniform pool shared with recording jobs.
    pub fn uniform_pool(&self) -> &Arc<UniformPool> {
        &self.uniform_pool
    }

    /// Transient pool shared with recording jobs.
    pub fn transient_pool(&self) -> &Arc<TransientPool> {
        &self.transient_pool
    }

    /// Copy `value` into this frame's uniform memory.
    pub fn alloc_uniform<T: Pod>(&self, value: &T) -> Option<TransientSlice> {
        match self.uniform_pool.alloc_with_data(bytemuck::bytes_of(value)) {
            Ok(slice) => Some(slice),
            Err(err) => self.capacity_failure(err, None),
        }
    }

    /// Reserve `size` bytes of this frame's transient memory.
    pub fn alloc_transient(&self, size: u32) -> Option<TransientSlice> {
        match self.transient_pool.alloc(size) {
            Ok(slice) => Some(slice),
            Err(err) => self.capacity_failure(err, None),
        }
    }

    // ------------------------------------------------------------------
    // Upload memory
    // ------------------------------------------------------------------

    /// Reserve `size` bytes from the current frame's allocator.
    ///
    /// The bytes belong to the root stream and are released together with it
    /// once the frame has executed.
    pub fn frame_alloc(&mut self, size: u32) -> Option<ScratchSpan> {
        match self.stream.user_alloc(size) {
            Ok(span) => Some(span),
            Err(err) => self.capacity_failure(err, None),
        }
    }

    /// Allocate `size` zeroed bytes of upload memory.
    pub fn allocate(&self, size: u32) -> MemRef {
        MemRef::owned(vec![0; size as usize].into_boxed_slice(), &self.live_memory)
    }

    /// Copy `data` into new upload memory.
    pub fn copy(&self, data: &[u8]) -> MemRef {
        MemRef::owned(data.into(), &self.live_memory)
    }

    /// Release upload memory that was never handed to an upload.
    pub fn free(&self, memory: MemRef) {
        log::trace!("Freeing {} bytes of upload memory", memory.len());
        drop(memory);
    }

    /// Bytes of upload memory allocated through this renderer that are still
    /// alive, including memory waiting for its frame to execute.
    pub fn live_memory(&self) -> usize {
        self.live_memory.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Device objects
    // ------------------------------------------------------------------

    pub fn create_buffer(
        &self,
        size: u32,
        flags: BufferFlags,
        data: Option<&[u8]>,
        debug_name: &str,
    ) -> Result<BufferHandle, DeviceError> {
        let descriptor = BufferDescriptor::new(size, flags).with_label(debug_name);
        self.device.create_buffer(&descriptor, data)
    }

    /// Create a buffer sized to `memory` and upload it with the current frame.
    ///
    /// `memory` stays alive until the frame being set up has executed.
    pub fn create_buffer_from(
        &mut self,
        memory: MemRef,
        flags: BufferFlags,
        debug_name: &str,
    ) -> Result<BufferHandle, DeviceError> {
        let size = u32::try_from(memory.len()).map_err(|_| {
            DeviceError::InvalidParameter(format!("buffer of {} bytes too large", memory.len()))
        })?;
        let buffer = self.create_buffer(size, flags, None, debug_name)?;
        self.stream.upload_memory(buffer, 0, memory);
        Ok(buffer)
    }

    /// Destroy `buffer` once every frame submitted so far, and the one being
    /// set up, has executed.
    pub fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.pending_destroy.push(Retired::Buffer(buffer));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_texture(
        &self,
        width: u32,
        height: u32,
        depth: u32,
        format: TextureFormat,
        flags: TextureFlags,
        data: Option<&[u8]>,
        debug_name: &str,
    ) -> Result<TextureHandle, DeviceError> {
        let descriptor = TextureDescriptor::new_2d(width, height, format, flags)
            .with_depth(depth)
            .with_label(debug_name);
        self.device.create_texture(&descriptor, data)
    }

    /// Destroy `texture` once every frame that may reference it has executed.
    pub fn destroy_texture(&mut self, texture: TextureHandle) {
        self.pending_destroy.push(Retired::Texture(texture));
    }

    /// Compile `desc`, or return the program compiled earlier for an equal
    /// descriptor.
    pub fn queue_shader_compile(&mut self, desc: &ProgramDesc) -> Result<ProgramHandle, DeviceError> {
        if let Some(&program) = self.programs.get(desc) {
            return Ok(program);
        }
        let program = self.device.create_program(desc)?;
        log::debug!("Compiled program `{}` ({:?})", desc.name, program);
        self.programs.insert(desc.clone(), program);
        Ok(program)
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn lod_multiplier(&self) -> f32 {
        self.lod_multiplier
    }

    pub fn set_lod_multiplier(&mut self, multiplier: f32) {
        self.lod_multiplier = multiplier;
    }

    /// Let pipelines run their built-in TAA when no plugin claims
    /// anti-aliasing.
    pub fn enable_builtin_taa(&mut self, enable: bool) {
        self.builtin_taa = enable;
    }

    pub fn is_builtin_taa_enabled(&self) -> bool {
        self.builtin_taa
    }

    // ------------------------------------------------------------------
    // Plugins and pipelines
    // ------------------------------------------------------------------

    /// Register a plugin after every existing one.
    ///
    /// # Panics
    ///
    /// Panics when called from inside a plugin hook.
    pub fn add_plugin(&mut self, plugin: Arc<dyn RenderPlugin>) {
        self.plugins.add(plugin);
    }

    /// Unregister a plugin. Returns `false` if it was not registered.
    ///
    /// # Panics
    ///
    /// Panics when called from inside a plugin hook.
    pub fn remove_plugin(&mut self, plugin: &Arc<dyn RenderPlugin>) -> bool {
        self.plugins.remove(plugin)
    }

    pub fn plugins(&self) -> PluginSnapshot {
        self.plugins.snapshot()
    }

    pub(crate) fn plugin_list(&self) -> &PluginList {
        &self.plugins
    }

    pub fn create_pipeline(&mut self, name: impl Into<String>, viewport: Viewport) -> Pipeline {
        let id = PipelineId(self.next_pipeline_id);
        self.next_pipeline_id += 1;
        let pipeline = Pipeline::new(id, name.into(), viewport);
        log::debug!("Created pipeline `{}` ({:?})", pipeline.name(), id);
        pipeline
    }

    /// Destroy `pipeline`, notifying every plugin.
    pub fn destroy_pipeline(&mut self, pipeline: Pipeline) {
        for plugin in self.plugins.begin_dispatch().iter() {
            plugin.pipeline_destroyed(&pipeline);
        }
        log::debug!("Destroyed pipeline `{}`", pipeline.name());
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn capacity_failure<T>(&self, err: CapacityError, fallback: T) -> T {
        match self.config.capacity_policy {
            CapacityPolicy::Fatal => {
                log::error!("{}", err);
                panic!("{err}");
            }
            CapacityPolicy::Degrade => {
                log::warn!("{}", err);
                fallback
            }
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.jobs.wait_idle();
        self.pipeline.wait_idle();

        for (_, objects) in std::mem::take(&mut self.retired) {
            self.destroy_now(objects);
        }
        let pending = std::mem::take(&mut self.pending_destroy);
        self.destroy_now(pending);

        let device = self.device.as_ref();
        self.renderbuffers.destroy_all(device);
        self.materials.destroy_buffer(device);
        self.uniform_pool.destroy(device);
        self.transient_pool.destroy(device);

        log::info!("Renderer shut down after {} frames", self.frame_number);
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("device", &self.device.name())
            .field("frame_number", &self.frame_number)
            .field("submitter", &self.submitter)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
