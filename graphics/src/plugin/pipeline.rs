//! Per-viewport pipelines and the context handed to plugin hooks.

use crate::error::{DeviceError, HandleError};
use crate::profiling::profile_function;
use crate::renderer::Renderer;
use crate::resources::{INVALID_RENDERBUFFER, RenderBufferDesc, RenderBufferHandle};
use crate::stream::DrawStream;
use crate::types::{
    ClearFlags, FramebufferFlags, ProgramDesc, ProgramHandle, TextureFormat, TextureHandle, Viewport,
};

use super::{dispatch_all, dispatch_chain, dispatch_exclusive};

/// Identifier of a pipeline, unique per renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(pub(crate) u64);

impl PipelineId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Deferred-shading targets produced by the geometry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBuffer {
    pub albedo: RenderBufferHandle,
    pub normal: RenderBufferHandle,
    pub material: RenderBufferHandle,
    pub depth: RenderBufferHandle,
}

impl GBuffer {
    pub fn color_targets(&self) -> [RenderBufferHandle; 3] {
        [self.albedo, self.normal, self.material]
    }
}

impl Default for GBuffer {
    fn default() -> Self {
        Self {
            albedo: INVALID_RENDERBUFFER,
            normal: INVALID_RENDERBUFFER,
            material: INVALID_RENDERBUFFER,
            depth: INVALID_RENDERBUFFER,
        }
    }
}

/// The passes a pipeline runs itself, around the plugin stages.
///
/// `antialias`, `tonemap` and `debug_output` only run when no plugin claims
/// the matching exclusive stage.
pub trait BuiltinPasses {
    /// Fill the gbuffer. Runs before any plugin stage.
    fn geometry(&mut self, ctx: &mut PipelineContext<'_>) -> GBuffer;

    /// Resolve the gbuffer into an HDR target.
    fn lighting(&mut self, gbuffer: &GBuffer, ctx: &mut PipelineContext<'_>) -> RenderBufferHandle;

    /// Temporal anti-aliasing; only called when the renderer has built-in
    /// TAA enabled.
    fn antialias(
        &mut self,
        _gbuffer: &GBuffer,
        input: RenderBufferHandle,
        _ctx: &mut PipelineContext<'_>,
    ) -> RenderBufferHandle {
        input
    }

    fn tonemap(&mut self, input: RenderBufferHandle, ctx: &mut PipelineContext<'_>) -> RenderBufferHandle;

    fn debug_output(&mut self, _input: RenderBufferHandle, _ctx: &mut PipelineContext<'_>) {}
}

/// A viewport's render pipeline.
///
/// Created by [`Renderer::create_pipeline`] and destroyed with
/// [`Renderer::destroy_pipeline`], which notifies every plugin.
#[derive(Debug)]
pub struct Pipeline {
    id: PipelineId,
    name: String,
    viewport: Viewport,
    debug_output: bool,
    frames_rendered: u64,
}

impl Pipeline {
    pub(crate) fn new(id: PipelineId, name: String, viewport: Viewport) -> Self {
        Self {
            id,
            name,
            viewport,
            debug_output: false,
            frames_rendered: 0,
        }
    }

    pub fn id(&self) -> PipelineId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Enable the debug output stage.
    pub fn set_debug_output(&mut self, enabled: bool) {
        self.debug_output = enabled;
    }

    pub fn is_debug_output_enabled(&self) -> bool {
        self.debug_output
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Record this pipeline's frame into the renderer's root draw stream.
    ///
    /// Runs the built-in passes and dispatches every plugin stage in
    /// [`PluginStage`](super::PluginStage) order. Intermediate renderbuffers
    /// created through the context are released before returning; the
    /// returned output is owned by the caller, who must release it before the
    /// renderer's next frame ends.
    pub fn render(&mut self, renderer: &mut Renderer, builtins: &mut dyn BuiltinPasses) -> RenderBufferHandle {
        profile_function!();

        let dispatch = renderer.plugin_list().begin_dispatch();
        let plugins = &dispatch[..];
        let mut ctx = PipelineContext::new(renderer, self);

        ctx.stream().begin_profile_block("pipeline", 0, false);
        let viewport = ctx.viewport();
        ctx.stream().viewport(viewport);

        let gbuffer = builtins.geometry(&mut ctx);
        dispatch_all(plugins, |p| p.render_opaque(&mut ctx));
        dispatch_all(plugins, |p| p.render_transparent(&mut ctx));
        dispatch_all(plugins, |p| p.render_before_light_pass(&gbuffer, &mut ctx));

        let hdr = builtins.lighting(&gbuffer, &mut ctx);
        let hdr = dispatch_chain(plugins, hdr, |p, input| {
            p.render_before_transparent(&gbuffer, input, &mut ctx)
        });
        let hdr = dispatch_chain(plugins, hdr, |p, input| {
            p.render_before_tonemap(&gbuffer, input, &mut ctx)
        });

        let claimed_aa = dispatch_exclusive(plugins, |p| {
            let output = p.render_aa(&gbuffer, hdr, &mut ctx);
            output.is_valid().then_some(output)
        });
        let hdr = match claimed_aa {
            Some(output) => output,
            None if ctx.renderer().is_builtin_taa_enabled() => builtins.antialias(&gbuffer, hdr, &mut ctx),
            None => hdr,
        };

        let claimed_tonemap = dispatch_exclusive(plugins, |p| {
            let mut output = INVALID_RENDERBUFFER;
            p.tonemap(hdr, &mut output, &mut ctx).then_some(output)
        });
        let ldr = match claimed_tonemap {
            Some(output) => output,
            None => builtins.tonemap(hdr, &mut ctx),
        };
        let ldr = dispatch_chain(plugins, ldr, |p, input| {
            p.render_after_tonemap(&gbuffer, input, &mut ctx)
        });

        if ctx.pipeline().is_debug_output_enabled()
            && dispatch_exclusive(plugins, |p| p.debug_output(ldr, &mut ctx).then_some(())).is_none()
        {
            builtins.debug_output(ldr, &mut ctx);
        }

        dispatch_all(plugins, |p| p.render_ui(&mut ctx));
        dispatch_all(plugins, |p| p.debug_ui(&mut ctx));

        ctx.stream().end_profile_block();
        ctx.release_targets_except(ldr);

        drop(dispatch);
        self.frames_rendered += 1;
        ldr
    }
}

/// What plugin hooks and built-in passes record through.
///
/// Borrows the renderer for the duration of one pipeline's setup. Targets
/// created through [`create_renderbuffer`](Self::create_renderbuffer) are
/// frame-scoped to the pipeline run and released when it finishes.
pub struct PipelineContext<'a> {
    renderer: &'a mut Renderer,
    pipeline: &'a Pipeline,
    targets: Vec<RenderBufferHandle>,
}

impl<'a> PipelineContext<'a> {
    pub(crate) fn new(renderer: &'a mut Renderer, pipeline: &'a Pipeline) -> Self {
        Self {
            renderer,
            pipeline,
            targets: Vec::new(),
        }
    }

    pub fn renderer(&mut self) -> &mut Renderer {
        self.renderer
    }

    pub fn pipeline(&self) -> &Pipeline {
        self.pipeline
    }

    pub fn viewport(&self) -> Viewport {
        self.pipeline.viewport
    }

    /// The renderer's root draw stream.
    pub fn stream(&mut self) -> &mut DrawStream {
        self.renderer.draw_stream()
    }

    /// Record `f` asynchronously at the current position of the root stream.
    pub fn push_job<F>(&mut self, name: Option<&'static str>, f: F)
    where
        F: FnOnce(&mut DrawStream) + Send + 'static,
    {
        self.renderer.push_job(name, f);
    }

    /// Create a renderbuffer released when the pipeline run ends.
    pub fn create_renderbuffer(&mut self, desc: &RenderBufferDesc) -> Result<RenderBufferHandle, DeviceError> {
        let handle = self.renderer.create_renderbuffer(desc)?;
        if handle.is_valid() {
            self.targets.push(handle);
        }
        Ok(handle)
    }

    /// Create a renderbuffer the size of the pipeline's viewport.
    pub fn create_viewport_target(
        &mut self,
        format: TextureFormat,
        debug_name: &str,
    ) -> Result<RenderBufferHandle, DeviceError> {
        let viewport = self.viewport();
        let desc = RenderBufferDesc::new(viewport.width, viewport.height, format)
            .with_debug_name(format!("{}/{}", self.pipeline.name, debug_name));
        self.create_renderbuffer(&desc)
    }

    pub fn release_renderbuffer(&mut self, handle: RenderBufferHandle) -> Result<(), HandleError> {
        self.targets.retain(|&h| h != handle);
        self.renderer.release_renderbuffer(handle)
    }

    pub fn to_texture(&self, handle: RenderBufferHandle) -> Result<TextureHandle, HandleError> {
        self.renderer.to_texture(handle)
    }

    pub fn set_render_targets(
        &mut self,
        color: &[RenderBufferHandle],
        depth: RenderBufferHandle,
        flags: FramebufferFlags,
    ) -> Result<(), HandleError> {
        self.renderer.set_render_targets(color, depth, flags)
    }

    fn release_targets_except(&mut self, keep: RenderBufferHandle) {
        for handle in std::mem::take(&mut self.targets) {
            if handle == keep {
                continue;
            }
            // Plugins may have released their own targets already
            if let Err(err) = self.renderer.release_renderbuffer(handle) {
                log::trace!("Pipeline `{}` target already released: {}", self.pipeline.name, err);
            }
        }
    }
}

/// Programs used by [`DeferredPasses`].
#[derive(Debug, Clone, Copy)]
struct DeferredPrograms {
    lighting: ProgramHandle,
    taa: ProgramHandle,
    tonemap: ProgramHandle,
    debug: ProgramHandle,
}

/// Default built-in passes: gbuffer fill, fullscreen lighting, TAA,
/// tonemapping and a debug visualization.
#[derive(Debug)]
pub struct DeferredPasses {
    programs: DeferredPrograms,
    clear_color: [f32; 4],
}

impl DeferredPasses {
    /// Queue compilation of the built-in programs.
    pub fn new(renderer: &mut Renderer) -> Result<Self, DeviceError> {
        let mut compile = |name: &str| {
            renderer.queue_shader_compile(&ProgramDesc::new(
                name,
                format!("{name}.vert"),
                format!("{name}.frag"),
            ))
        };

        let programs = DeferredPrograms {
            lighting: compile("builtin/lighting")?,
            taa: compile("builtin/taa")?,
            tonemap: compile("builtin/tonemap")?,
            debug: compile("builtin/debug_output")?,
        };

        Ok(Self {
            programs,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        })
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    fn target(ctx: &mut PipelineContext<'_>, format: TextureFormat, name: &str) -> RenderBufferHandle {
        match ctx.create_viewport_target(format, name) {
            Ok(handle) => handle,
            Err(err) => {
                log::error!("Failed to create `{}` target: {}", name, err);
                INVALID_RENDERBUFFER
            }
        }
    }

    /// Draw a fullscreen triangle with `program`, sampling `inputs`, into a
    /// new target.
    fn fullscreen(
        ctx: &mut PipelineContext<'_>,
        program: ProgramHandle,
        inputs: &[RenderBufferHandle],
        format: TextureFormat,
        name: &str,
    ) -> RenderBufferHandle {
        let target = Self::target(ctx, format, name);
        if !target.is_valid() {
            return target;
        }

        if let Err(err) = ctx.set_render_targets(&[target], INVALID_RENDERBUFFER, FramebufferFlags::empty()) {
            log::error!("Pass `{}` cannot bind its target: {}", name, err);
            return target;
        }
        ctx.stream().use_program(program);
        for (slot, &input) in inputs.iter().enumerate() {
            match ctx.to_texture(input) {
                Ok(texture) => ctx.stream().bind_texture(slot as u32, texture),
                Err(err) => log::warn!("Pass `{}` input {} unavailable: {}", name, slot, err),
            }
        }
        ctx.stream().draw_arrays(0, 3);
        target
    }
}

impl BuiltinPasses for DeferredPasses {
    fn geometry(&mut self, ctx: &mut PipelineContext<'_>) -> GBuffer {
        let gbuffer = GBuffer {
            albedo: Self::target(ctx, TextureFormat::Rgba8Unorm, "gbuffer_albedo"),
            normal: Self::target(ctx, TextureFormat::Rgba16Float, "gbuffer_normal"),
            material: Self::target(ctx, TextureFormat::Rgba8Unorm, "gbuffer_material"),
            depth: Self::target(ctx, TextureFormat::Depth32Float, "gbuffer_depth"),
        };

        match ctx.set_render_targets(&gbuffer.color_targets(), gbuffer.depth, FramebufferFlags::empty()) {
            Ok(()) => ctx.stream().clear(ClearFlags::ALL, self.clear_color, 0.0),
            Err(err) => log::error!("Cannot bind gbuffer: {}", err),
        }
        gbuffer
    }

    fn lighting(&mut self, gbuffer: &GBuffer, ctx: &mut PipelineContext<'_>) -> RenderBufferHandle {
        let mut inputs = gbuffer.color_targets().to_vec();
        inputs.push(gbuffer.depth);
        Self::fullscreen(ctx, self.programs.lighting, &inputs, TextureFormat::Rgba16Float, "hdr")
    }

    fn antialias(
        &mut self,
        gbuffer: &GBuffer,
        input: RenderBufferHandle,
        ctx: &mut PipelineContext<'_>,
    ) -> RenderBufferHandle {
        Self::fullscreen(
            ctx,
            self.programs.taa,
            &[input, gbuffer.depth],
            TextureFormat::Rgba16Float,
            "taa",
        )
    }

    fn tonemap(&mut self, input: RenderBufferHandle, ctx: &mut PipelineContext<'_>) -> RenderBufferHandle {
        Self::fullscreen(ctx, self.programs.tonemap, &[input], TextureFormat::Rgba8Unorm, "ldr")
    }

    fn debug_output(&mut self, input: RenderBufferHandle, ctx: &mut PipelineContext<'_>) {
        if ctx.set_render_targets(&[input], INVALID_RENDERBUFFER, FramebufferFlags::empty()).is_ok() {
            ctx.stream().use_program(self.programs.debug);
            ctx.stream().draw_arrays(0, 3);
        }
    }
}
