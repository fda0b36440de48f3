//! Frame scheduling and hand-off to the execution phase.
//!
//! Frames go through three overlapping phases:
//!
//! ```text
//! Frame 0: [setup] [merge+submit] ──────────────────────────────►
//!                                 [execute frame 0] ────────────►
//!
//! Frame 1:         [setup ........] [merge+submit] ─────────────►
//!                                                  [execute F1] ►
//!
//! Frame 2:                 [wait F0] [setup ........] [merge+submit]
//! ```
//!
//! - [`FramePipeline`] tracks one [`Fence`] per frame slot and bounds how far
//!   setup may run ahead of execution.
//! - [`FramePacket`] carries one finalized frame to the execution side.
//! - [`FrameSubmitter`] executes packets either inline on the submitting
//!   thread or on a dedicated [`RenderThread`].

mod pipeline;
mod sync;

pub use pipeline::FramePipeline;
pub use sync::Fence;

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::backend::GpuDevice;
use crate::profiling::{profile_scope, set_thread_name};
use crate::stream::MergedStream;

/// One finalized frame travelling to the execution phase.
#[derive(Debug)]
pub struct FramePacket {
    pub frame_number: u64,
    pub stream: MergedStream,
    /// Signaled once `stream` has been executed.
    pub fence: Fence,
}

impl FramePacket {
    /// Execute the packet on `device` and signal its fence.
    ///
    /// The fence is signaled even when execution fails, so a device error
    /// never deadlocks the logic thread.
    fn execute(self, device: &dyn GpuDevice) {
        profile_scope!("execute_frame");

        if let Err(e) = device.execute(&self.stream) {
            log::error!("Frame {} failed to execute: {}", self.frame_number, e);
        }
        log::trace!(
            "Executed frame {} ({} commands)",
            self.frame_number,
            self.stream.len()
        );

        self.release();
    }

    /// Drop the stream, then signal the fence, so waiters never observe a
    /// completed frame whose memory is still alive.
    fn release(self) {
        let Self { stream, fence, .. } = self;
        drop(stream);
        fence.signal();
    }
}

/// Dedicated thread that executes submitted frames in order.
///
/// Packets travel over an unbounded channel; backpressure comes from the
/// [`FramePipeline`] fences, never from the queue. Dropping the render thread
/// closes the queue, lets it drain, and joins the thread.
pub struct RenderThread {
    sender: Option<Sender<FramePacket>>,
    thread: Option<JoinHandle<()>>,
}

impl RenderThread {
    /// Spawn the render thread.
    pub fn spawn(device: Arc<dyn GpuDevice>) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<FramePacket>();

        let thread = std::thread::Builder::new()
            .name("kiln-render".to_string())
            .spawn(move || {
                set_thread_name!("kiln-render");
                log::debug!("Render thread started");

                while let Ok(packet) = receiver.recv() {
                    packet.execute(device.as_ref());
                }

                log::debug!("Render thread stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    /// Queue a frame for execution.
    pub fn submit(&self, packet: FramePacket) {
        let Some(sender) = &self.sender else {
            packet.release();
            return;
        };

        if let Err(e) = sender.send(packet) {
            // Receiver gone: the thread died. Release whoever waits on the frame.
            log::error!("Render thread is not running, dropping frame");
            e.into_inner().release();
        }
    }
}

impl std::fmt::Debug for RenderThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderThread")
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        // Closing the channel ends the receive loop once the queue is drained
        self.sender = None;

        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::error!("Render thread panicked");
        }
    }
}

/// Where finalized frames are executed.
pub enum FrameSubmitter {
    /// Execute on the submitting thread, inside `Renderer::frame`.
    Inline(Arc<dyn GpuDevice>),
    /// Execute on a dedicated render thread.
    Threaded(RenderThread),
}

impl FrameSubmitter {
    pub fn submit(&self, packet: FramePacket) {
        match self {
            Self::Inline(device) => packet.execute(device.as_ref()),
            Self::Threaded(thread) => thread.submit(packet),
        }
    }
}

impl std::fmt::Debug for FrameSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline(device) => write!(f, "FrameSubmitter::Inline({})", device.name()),
            Self::Threaded(thread) => write!(f, "FrameSubmitter::Threaded({thread:?})"),
        }
    }
}
