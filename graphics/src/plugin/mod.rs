//! Render plugins: user extensions invoked at fixed pipeline stages.
//!
//! Plugins are registered on the [`Renderer`] and called, in registration
//! order, by every [`Pipeline`] while it records a frame. Most stages call
//! every plugin. The exclusive stages ([`PluginStage::is_exclusive`]) stop at
//! the first plugin that claims them, and fall back to the pipeline's built-in
//! pass when none does.
//!
//! Dispatch iterates over a snapshot of the plugin list. Adding or removing a
//! plugin from inside a hook is a programming error and panics.

mod pipeline;

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use pipeline::{BuiltinPasses, DeferredPasses, GBuffer, Pipeline, PipelineContext, PipelineId};

use crate::renderer::Renderer;
use crate::resources::{INVALID_RENDERBUFFER, RenderBufferHandle};

/// Stages at which a pipeline calls into plugins, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginStage {
    Opaque,
    Transparent,
    BeforeLightPass,
    BeforeTransparent,
    BeforeTonemap,
    Aa,
    Tonemap,
    AfterTonemap,
    DebugOutput,
    Ui,
}

impl PluginStage {
    /// All stages in the order a pipeline dispatches them.
    pub const ALL: [PluginStage; 10] = [
        Self::Opaque,
        Self::Transparent,
        Self::BeforeLightPass,
        Self::BeforeTransparent,
        Self::BeforeTonemap,
        Self::Aa,
        Self::Tonemap,
        Self::AfterTonemap,
        Self::DebugOutput,
        Self::Ui,
    ];

    /// Whether at most one plugin handles this stage per invocation.
    pub fn is_exclusive(self) -> bool {
        matches!(self, Self::Aa | Self::Tonemap | Self::DebugOutput)
    }
}

/// Extension hooks called by the renderer and its pipelines.
///
/// All methods have default implementations that do nothing (or pass their
/// input through), so a plugin only overrides the stages it cares about.
/// Hooks take `&self`: plugins are shared across pipelines and frames, and
/// keep mutable state behind their own locks.
///
/// # Lifecycle
///
/// 1. [`frame`](Self::frame) - once per renderer frame, before submission
/// 2. For every pipeline rendered during setup, the stage hooks in
///    [`PluginStage`] order
/// 3. [`pipeline_destroyed`](Self::pipeline_destroyed) - when a pipeline goes away
///
/// # Example
///
/// ```
/// use kiln_graphics::plugin::{PipelineContext, RenderPlugin};
///
/// struct Outline;
///
/// impl RenderPlugin for Outline {
///     fn render_opaque(&self, ctx: &mut PipelineContext<'_>) {
///         ctx.stream().draw_arrays(0, 3);
///     }
/// }
/// ```
pub trait RenderPlugin: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn render_opaque(&self, _ctx: &mut PipelineContext<'_>) {}

    fn render_transparent(&self, _ctx: &mut PipelineContext<'_>) {}

    /// Called once the gbuffer is complete, before lighting resolves it.
    fn render_before_light_pass(&self, _gbuffer: &GBuffer, _ctx: &mut PipelineContext<'_>) {}

    /// Chained: receives the previous plugin's output, returns its own.
    fn render_before_transparent(
        &self,
        _gbuffer: &GBuffer,
        input: RenderBufferHandle,
        _ctx: &mut PipelineContext<'_>,
    ) -> RenderBufferHandle {
        input
    }

    /// Chained: receives the previous plugin's output, returns its own.
    fn render_before_tonemap(
        &self,
        _gbuffer: &GBuffer,
        input: RenderBufferHandle,
        _ctx: &mut PipelineContext<'_>,
    ) -> RenderBufferHandle {
        input
    }

    /// Exclusive. Return a valid handle to claim anti-aliasing.
    fn render_aa(
        &self,
        _gbuffer: &GBuffer,
        _input: RenderBufferHandle,
        _ctx: &mut PipelineContext<'_>,
    ) -> RenderBufferHandle {
        INVALID_RENDERBUFFER
    }

    /// Exclusive. Write the tonemapped target to `output` and return `true`
    /// to claim tonemapping.
    fn tonemap(
        &self,
        _input: RenderBufferHandle,
        _output: &mut RenderBufferHandle,
        _ctx: &mut PipelineContext<'_>,
    ) -> bool {
        false
    }

    /// Chained: receives the previous plugin's output, returns its own.
    fn render_after_tonemap(
        &self,
        _gbuffer: &GBuffer,
        input: RenderBufferHandle,
        _ctx: &mut PipelineContext<'_>,
    ) -> RenderBufferHandle {
        input
    }

    /// Exclusive. Return `true` to claim the debug visualization.
    fn debug_output(&self, _input: RenderBufferHandle, _ctx: &mut PipelineContext<'_>) -> bool {
        false
    }

    fn render_ui(&self, _ctx: &mut PipelineContext<'_>) {}

    fn debug_ui(&self, _ctx: &mut PipelineContext<'_>) {}

    fn pipeline_destroyed(&self, _pipeline: &Pipeline) {}

    /// Called once per frame, before the frame's streams are merged.
    fn frame(&self, _renderer: &mut Renderer) {}
}

/// Snapshot of registered plugins, shared with in-progress dispatches.
pub type PluginSnapshot = Arc<[Arc<dyn RenderPlugin>]>;

/// Registration-ordered plugin list.
pub struct PluginList {
    plugins: PluginSnapshot,
    /// Open dispatches; shared with their [`Dispatch`] guards.
    dispatch_depth: Arc<AtomicUsize>,
}

impl PluginList {
    pub fn new() -> Self {
        Self {
            plugins: Arc::from(Vec::new()),
            dispatch_depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register `plugin` after all existing ones.
    ///
    /// # Panics
    ///
    /// Panics if called while plugins are being dispatched.
    pub fn add(&mut self, plugin: Arc<dyn RenderPlugin>) {
        assert!(
            !self.is_dispatching(),
            "cannot add plugin `{}` while plugins are being dispatched",
            plugin.name()
        );
        log::debug!("Registered render plugin `{}`", plugin.name());
        let mut plugins = self.plugins.to_vec();
        plugins.push(plugin);
        self.plugins = plugins.into();
    }

    /// Unregister `plugin`, matched by identity. Returns `false` if it was not
    /// registered.
    ///
    /// # Panics
    ///
    /// Panics if called while plugins are being dispatched.
    pub fn remove(&mut self, plugin: &Arc<dyn RenderPlugin>) -> bool {
        assert!(
            !self.is_dispatching(),
            "cannot remove plugin `{}` while plugins are being dispatched",
            plugin.name()
        );
        let Some(position) = self.plugins.iter().position(|p| same_plugin(p, plugin)) else {
            return false;
        };
        let mut plugins = self.plugins.to_vec();
        plugins.remove(position);
        self.plugins = plugins.into();
        log::debug!("Unregistered render plugin `{}`", plugin.name());
        true
    }

    pub fn snapshot(&self) -> PluginSnapshot {
        Arc::clone(&self.plugins)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatch_depth.load(Ordering::Acquire) > 0
    }

    /// Enter a dispatch. The list is frozen until the returned guard is
    /// dropped, which also happens when a hook unwinds.
    pub(crate) fn begin_dispatch(&self) -> Dispatch {
        self.dispatch_depth.fetch_add(1, Ordering::AcqRel);
        Dispatch {
            plugins: self.snapshot(),
            depth: Arc::clone(&self.dispatch_depth),
        }
    }
}

/// An open dispatch over a plugin snapshot.
pub(crate) struct Dispatch {
    plugins: PluginSnapshot,
    depth: Arc<AtomicUsize>,
}

impl Deref for Dispatch {
    type Target = [Arc<dyn RenderPlugin>];

    fn deref(&self) -> &Self::Target {
        &self.plugins
    }
}

impl Drop for Dispatch {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Default for PluginList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name()))
            .finish()
    }
}

fn same_plugin(a: &Arc<dyn RenderPlugin>, b: &Arc<dyn RenderPlugin>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Call `f` on every plugin in order.
pub(crate) fn dispatch_all<P: ?Sized>(plugins: &[Arc<P>], mut f: impl FnMut(&P)) {
    for plugin in plugins {
        f(plugin.as_ref());
    }
}

/// Thread `value` through every plugin in order.
pub(crate) fn dispatch_chain<P: ?Sized, T>(
    plugins: &[Arc<P>],
    value: T,
    mut f: impl FnMut(&P, T) -> T,
) -> T {
    plugins
        .iter()
        .fold(value, |value, plugin| f(plugin.as_ref(), value))
}

/// Call plugins in order until one claims the stage; later plugins are not
/// called.
pub(crate) fn dispatch_exclusive<P: ?Sized, T>(
    plugins: &[Arc<P>],
    mut f: impl FnMut(&P) -> Option<T>,
) -> Option<T> {
    plugins.iter().find_map(|plugin| f(plugin.as_ref()))
}
