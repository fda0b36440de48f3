//! Common utilities for renderer integration tests.
//!
//! Every test runs against the [`DummyDevice`], which records executed
//! frames so the merged command order can be inspected.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use kiln_graphics::{DrawCommand, DummyDevice, ExecutionMode, Renderer, RendererConfig};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Threading setups the frame loop is exercised under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Jobs and execution on the test thread.
    Inline,
    /// Inline jobs, execution on the render thread.
    RenderThread,
    /// Jobs on worker threads, execution on the render thread.
    Workers,
}

impl Mode {
    pub fn config(self) -> RendererConfig {
        let config = RendererConfig::default();
        match self {
            Mode::Inline => config,
            Mode::RenderThread => config.with_execution(ExecutionMode::RenderThread),
            Mode::Workers => config
                .with_execution(ExecutionMode::RenderThread)
                .with_worker_threads(4),
        }
    }
}

pub fn create_renderer(mode: Mode) -> (Arc<DummyDevice>, Renderer) {
    create_renderer_with(DummyDevice::new(), mode.config())
}

pub fn create_renderer_with(device: DummyDevice, config: RendererConfig) -> (Arc<DummyDevice>, Renderer) {
    init_logging();
    let device = Arc::new(device);
    let renderer = Renderer::new(device.clone(), config).expect("renderer creation");
    (device, renderer)
}

/// Device that takes `millis` to execute every frame.
pub fn slow_device(millis: u64) -> DummyDevice {
    DummyDevice::new().with_execute_delay(Duration::from_millis(millis))
}

/// The `first` field of every `DrawArrays`, in execution order.
pub fn draw_markers(commands: &[DrawCommand]) -> Vec<u32> {
    commands
        .iter()
        .filter_map(|command| match command {
            DrawCommand::DrawArrays { first, .. } => Some(*first),
            _ => None,
        })
        .collect()
}

/// Commands of executed frame `frame`, waiting for it if necessary.
pub fn executed(device: &DummyDevice, renderer: &Renderer, frame: usize) -> Vec<DrawCommand> {
    renderer.wait_for_render();
    device
        .executed_commands(frame)
        .unwrap_or_else(|| panic!("frame {frame} was not executed"))
}
