//! Plugin dispatch integration tests.

mod common;

use std::sync::Arc;

use common::{Mode, create_renderer, executed};
use kiln_graphics::plugin::{BuiltinPasses, DeferredPasses, GBuffer, PipelineContext};
use kiln_graphics::{
    DrawCommand, INVALID_RENDERBUFFER, Pipeline, RenderBufferHandle, RenderPlugin, Renderer,
    TextureFormat, Viewport,
};
use parking_lot::Mutex;
use rstest::rstest;

type Log = Arc<Mutex<Vec<String>>>;

/// Plugin that records every hook it receives.
#[derive(Default)]
struct Recorder {
    tag: &'static str,
    claim_aa: bool,
    claim_tonemap: bool,
    log: Log,
}

impl Recorder {
    fn new(tag: &'static str, log: &Log) -> Self {
        Self {
            tag,
            log: Arc::clone(log),
            ..Default::default()
        }
    }

    fn claiming_aa(mut self) -> Self {
        self.claim_aa = true;
        self
    }

    fn claiming_tonemap(mut self) -> Self {
        self.claim_tonemap = true;
        self
    }

    fn note(&self, stage: &str) {
        self.log.lock().push(format!("{}:{}", self.tag, stage));
    }
}

impl RenderPlugin for Recorder {
    fn render_opaque(&self, _ctx: &mut PipelineContext<'_>) {
        self.note("opaque");
    }

    fn render_transparent(&self, _ctx: &mut PipelineContext<'_>) {
        self.note("transparent");
    }

    fn render_before_light_pass(&self, _gbuffer: &GBuffer, _ctx: &mut PipelineContext<'_>) {
        self.note("before_light_pass");
    }

    fn render_before_tonemap(
        &self,
        _gbuffer: &GBuffer,
        input: RenderBufferHandle,
        _ctx: &mut PipelineContext<'_>,
    ) -> RenderBufferHandle {
        self.note("before_tonemap");
        input
    }

    fn render_aa(
        &self,
        _gbuffer: &GBuffer,
        _input: RenderBufferHandle,
        ctx: &mut PipelineContext<'_>,
    ) -> RenderBufferHandle {
        self.note("aa");
        if !self.claim_aa {
            return INVALID_RENDERBUFFER;
        }
        ctx.create_viewport_target(TextureFormat::Rgba16Float, self.tag)
            .unwrap()
    }

    fn tonemap(
        &self,
        _input: RenderBufferHandle,
        output: &mut RenderBufferHandle,
        ctx: &mut PipelineContext<'_>,
    ) -> bool {
        self.note("tonemap");
        if self.claim_tonemap {
            *output = ctx
                .create_viewport_target(TextureFormat::Rgba8Unorm, self.tag)
                .unwrap();
        }
        self.claim_tonemap
    }

    fn render_ui(&self, _ctx: &mut PipelineContext<'_>) {
        self.note("ui");
    }

    fn pipeline_destroyed(&self, pipeline: &Pipeline) {
        self.note(&format!("destroyed {}", pipeline.name()));
    }

    fn frame(&self, _renderer: &mut Renderer) {
        self.note("frame");
    }
}

/// Built-in passes that only count what they are asked to do.
#[derive(Default)]
struct CountingPasses {
    antialias: usize,
    tonemap: usize,
}

impl BuiltinPasses for CountingPasses {
    fn geometry(&mut self, ctx: &mut PipelineContext<'_>) -> GBuffer {
        GBuffer {
            depth: ctx
                .create_viewport_target(TextureFormat::Depth32Float, "depth")
                .unwrap(),
            ..GBuffer::default()
        }
    }

    fn lighting(&mut self, _gbuffer: &GBuffer, ctx: &mut PipelineContext<'_>) -> RenderBufferHandle {
        ctx.create_viewport_target(TextureFormat::Rgba16Float, "hdr")
            .unwrap()
    }

    fn antialias(
        &mut self,
        _gbuffer: &GBuffer,
        input: RenderBufferHandle,
        _ctx: &mut PipelineContext<'_>,
    ) -> RenderBufferHandle {
        self.antialias += 1;
        input
    }

    fn tonemap(&mut self, _input: RenderBufferHandle, ctx: &mut PipelineContext<'_>) -> RenderBufferHandle {
        self.tonemap += 1;
        ctx.create_viewport_target(TextureFormat::Rgba8Unorm, "ldr")
            .unwrap()
    }
}

fn entries(log: &Log, stage: &str) -> Vec<String> {
    let suffix = format!(":{stage}");
    log.lock()
        .iter()
        .filter(|entry| entry.ends_with(&suffix))
        .cloned()
        .collect()
}

fn render_once(renderer: &mut Renderer, builtins: &mut dyn BuiltinPasses) {
    let mut pipeline = renderer.create_pipeline("main", Viewport::new(0, 0, 32, 32));
    let output = pipeline.render(renderer, builtins);
    renderer.release_renderbuffer(output).unwrap();
    renderer.destroy_pipeline(pipeline);
}

#[rstest]
#[case::p1_first(&["p1", "p2"], "p1")]
#[case::p2_first(&["p2", "p1"], "p2")]
fn test_exclusive_aa_first_registered_wins(#[case] order: &[&'static str], #[case] winner: &str) {
    let (_device, mut renderer) = create_renderer(Mode::Inline);
    let log = Log::default();
    for &tag in order {
        renderer.add_plugin(Arc::new(Recorder::new(tag, &log).claiming_aa()));
    }

    let mut builtins = CountingPasses::default();
    render_once(&mut renderer, &mut builtins);

    assert_eq!(entries(&log, "aa"), [format!("{winner}:aa")]);
}

#[test]
fn test_declining_plugins_fall_through_to_builtin() {
    let (_device, mut renderer) = create_renderer(Mode::Inline);
    let log = Log::default();
    renderer.add_plugin(Arc::new(Recorder::new("p1", &log)));
    renderer.add_plugin(Arc::new(Recorder::new("p2", &log)));
    renderer.enable_builtin_taa(true);

    let mut builtins = CountingPasses::default();
    render_once(&mut renderer, &mut builtins);

    // Every plugin was asked, none claimed
    assert_eq!(entries(&log, "aa"), ["p1:aa", "p2:aa"]);
    assert_eq!(entries(&log, "tonemap"), ["p1:tonemap", "p2:tonemap"]);
    assert_eq!(builtins.antialias, 1);
    assert_eq!(builtins.tonemap, 1);
}

#[test]
fn test_builtin_taa_only_when_enabled() {
    let (_device, mut renderer) = create_renderer(Mode::Inline);
    let mut builtins = CountingPasses::default();

    render_once(&mut renderer, &mut builtins);
    assert_eq!(builtins.antialias, 0);

    renderer.enable_builtin_taa(true);
    render_once(&mut renderer, &mut builtins);
    assert_eq!(builtins.antialias, 1);
}

#[test]
fn test_claimed_tonemap_skips_builtin() {
    let (_device, mut renderer) = create_renderer(Mode::Inline);
    let log = Log::default();
    renderer.add_plugin(Arc::new(Recorder::new("p1", &log)));
    renderer.add_plugin(Arc::new(Recorder::new("p2", &log).claiming_tonemap()));
    renderer.add_plugin(Arc::new(Recorder::new("p3", &log).claiming_tonemap()));

    let mut builtins = CountingPasses::default();
    render_once(&mut renderer, &mut builtins);

    assert_eq!(entries(&log, "tonemap"), ["p1:tonemap", "p2:tonemap"]);
    assert_eq!(builtins.tonemap, 0);
}

#[test]
fn test_non_exclusive_stages_reach_every_plugin_in_order() {
    let (_device, mut renderer) = create_renderer(Mode::Inline);
    let log = Log::default();
    for tag in ["a", "b", "c"] {
        renderer.add_plugin(Arc::new(Recorder::new(tag, &log)));
    }

    let mut builtins = CountingPasses::default();
    render_once(&mut renderer, &mut builtins);

    for stage in ["opaque", "transparent", "before_light_pass", "before_tonemap", "ui"] {
        let expected: Vec<String> = ["a", "b", "c"].iter().map(|t| format!("{t}:{stage}")).collect();
        assert_eq!(entries(&log, stage), expected, "stage {stage}");
    }

    // Stage order for one plugin
    let a: Vec<String> = log
        .lock()
        .iter()
        .filter(|e| e.starts_with("a:"))
        .cloned()
        .collect();
    assert_eq!(
        a,
        [
            "a:opaque",
            "a:transparent",
            "a:before_light_pass",
            "a:before_tonemap",
            "a:aa",
            "a:tonemap",
            "a:ui",
            "a:destroyed main",
        ]
    );
}

#[test]
fn test_frame_hook_called_once_per_frame() {
    let (_device, mut renderer) = create_renderer(Mode::Inline);
    let log = Log::default();
    let plugin: Arc<dyn RenderPlugin> = Arc::new(Recorder::new("p", &log));
    renderer.add_plugin(Arc::clone(&plugin));

    renderer.frame();
    renderer.frame();
    assert_eq!(entries(&log, "frame").len(), 2);

    assert!(renderer.remove_plugin(&plugin));
    renderer.frame();
    assert_eq!(entries(&log, "frame").len(), 2);
}

struct Intruder;

impl RenderPlugin for Intruder {
    fn render_opaque(&self, ctx: &mut PipelineContext<'_>) {
        ctx.renderer().add_plugin(Arc::new(Intruder));
    }
}

#[test]
#[should_panic(expected = "while plugins are being dispatched")]
fn test_adding_plugin_during_dispatch_panics() {
    let (_device, mut renderer) = create_renderer(Mode::Inline);
    renderer.add_plugin(Arc::new(Intruder));
    render_once(&mut renderer, &mut CountingPasses::default());
}

struct Faulty;

impl RenderPlugin for Faulty {
    fn render_transparent(&self, _ctx: &mut PipelineContext<'_>) {
        panic!("transparent pass failed");
    }
}

#[test]
fn test_plugins_editable_after_hook_panics() {
    let (_device, mut renderer) = create_renderer(Mode::Inline);
    let faulty: Arc<dyn RenderPlugin> = Arc::new(Faulty);
    renderer.add_plugin(Arc::clone(&faulty));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        render_once(&mut renderer, &mut CountingPasses::default());
    }));
    assert!(result.is_err());

    assert!(renderer.remove_plugin(&faulty));
    renderer.add_plugin(Arc::new(Recorder::new("after", &Log::default())));
    assert_eq!(renderer.plugins().len(), 1);
}

#[test]
fn test_deferred_passes_leave_no_leaks() {
    let (device, mut renderer) = create_renderer(Mode::Inline);
    renderer.enable_builtin_taa(true);
    let mut builtins = DeferredPasses::new(&mut renderer).unwrap();

    let mut pipeline = renderer.create_pipeline("scene", Viewport::new(0, 0, 64, 64));
    pipeline.set_debug_output(true);
    let output = pipeline.render(&mut renderer, &mut builtins);
    assert!(output.is_valid());
    assert_eq!(renderer.renderbuffers().live_count(), 1);
    renderer.release_renderbuffer(output).unwrap();
    renderer.frame();

    let commands = executed(&device, &renderer, 0);
    let draws = commands
        .iter()
        .filter(|c| matches!(c, DrawCommand::DrawArrays { .. }))
        .count();
    // lighting, taa, tonemap, debug output
    assert_eq!(draws, 4);
    assert_eq!(device.invalid_references(), 0);
    assert_eq!(pipeline.frames_rendered(), 1);
}
