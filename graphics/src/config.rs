//! Renderer configuration.

/// What happens when a fixed-capacity pool runs out.
///
/// The shader-define and layer tables ignore this and always fail hard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapacityPolicy {
    /// Log an error and panic.
    #[default]
    Fatal,
    /// Log a warning and hand out a sentinel (`SortKey::INVALID`,
    /// `INVALID_RENDERBUFFER`, `None`).
    Degrade,
}

/// Where merged frames are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// On the logic thread, inside `Renderer::frame`.
    #[default]
    Inline,
    /// On a dedicated render thread, overlapped with the next frame's setup.
    RenderThread,
}

/// Construction parameters of a [`Renderer`](crate::Renderer).
///
/// # Example
///
/// ```
/// use kiln_graphics::config::{CapacityPolicy, ExecutionMode, RendererConfig};
///
/// let config = RendererConfig::default()
///     .with_frames_in_flight(3)
///     .with_execution(ExecutionMode::RenderThread)
///     .with_capacity_policy(CapacityPolicy::Degrade);
/// assert_eq!(config.frames_in_flight, 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Frames whose execution may overlap later setup. At least 1.
    pub frames_in_flight: usize,
    pub max_sort_keys: u32,
    /// Total bytes of the uniform pool buffer, split across frames in flight.
    pub uniform_pool_size: u32,
    /// Total bytes of the transient pool buffer, split across frames in flight.
    pub transient_pool_size: u32,
    pub material_buffer_size: u32,
    pub capacity_policy: CapacityPolicy,
    pub execution: ExecutionMode,
    /// Frames an unused physical renderbuffer texture survives.
    ///
    /// Raised to `frames_in_flight` if smaller.
    pub renderbuffer_retention_frames: u64,
    /// Worker threads for recording jobs; 0 runs jobs inline.
    pub worker_threads: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            max_sort_keys: 4096,
            uniform_pool_size: 1024 * 1024,
            transient_pool_size: 8 * 1024 * 1024,
            material_buffer_size: 256 * 1024,
            capacity_policy: CapacityPolicy::Fatal,
            execution: ExecutionMode::Inline,
            renderbuffer_retention_frames: 3,
            worker_threads: 0,
        }
    }
}

impl RendererConfig {
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    pub fn with_max_sort_keys(mut self, max: u32) -> Self {
        self.max_sort_keys = max;
        self
    }

    pub fn with_uniform_pool_size(mut self, size: u32) -> Self {
        self.uniform_pool_size = size;
        self
    }

    pub fn with_transient_pool_size(mut self, size: u32) -> Self {
        self.transient_pool_size = size;
        self
    }

    pub fn with_material_buffer_size(mut self, size: u32) -> Self {
        self.material_buffer_size = size;
        self
    }

    pub fn with_capacity_policy(mut self, policy: CapacityPolicy) -> Self {
        self.capacity_policy = policy;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_renderbuffer_retention_frames(mut self, frames: u64) -> Self {
        self.renderbuffer_retention_frames = frames;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Check the values a renderer cannot start with.
    pub fn validate(&self) -> Result<(), String> {
        if self.frames_in_flight == 0 {
            return Err("frames_in_flight must be at least 1".to_string());
        }
        if self.material_buffer_size == 0 {
            return Err("material_buffer_size must be non-zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.max_sort_keys, 4096);
        assert_eq!(config.capacity_policy, CapacityPolicy::Fatal);
        assert_eq!(config.execution, ExecutionMode::Inline);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_frames_rejected() {
        let config = RendererConfig::default().with_frames_in_flight(0);
        assert!(config.validate().is_err());
    }
}
