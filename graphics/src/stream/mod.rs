//! Draw streams: ordered, appendable command sequences with splice-in sub-streams.
//!
//! A [`DrawStream`] records [`DrawCommand`]s in program order. Work that should
//! be recorded elsewhere (typically on a worker thread) gets its own
//! [`Substream`], created with [`DrawStream::create_substream`]. The sub-stream
//! is logically spliced at the parent's write position *at the moment it was
//! created*: everything the parent records afterwards lands after the
//! sub-stream's content, however late the sub-stream is actually filled.
//!
//! ```text
//! parent:  [a b] ──create_substream──► [c d]
//!                       │
//! sub:                  └── [x y]          (recorded later, on a worker)
//!
//! merged:  a b x y c d
//! ```
//!
//! # Finalize
//!
//! [`DrawStream::finalize`] consumes the stream, validates it, and merges every
//! sub-stream depth-first in creation order into one [`MergedStream`]. Merging
//! moves whole command runs and scratch arenas; it never copies individual
//! commands, so the cost is proportional to the number of sub-streams.
//!
//! # Example
//!
//! ```
//! use kiln_graphics::stream::{DrawCommand, DrawStream};
//!
//! let mut stream = DrawStream::new();
//! stream.draw_arrays(0, 3);
//!
//! let sub = stream.create_substream();
//! stream.draw_arrays(6, 3);
//!
//! sub.record(|s| s.draw_arrays(3, 3));
//!
//! let merged = stream.finalize().unwrap();
//! let firsts: Vec<u32> = merged
//!     .commands()
//!     .map(|c| match c {
//!         DrawCommand::DrawArrays { first, .. } => *first,
//!         _ => unreachable!(),
//!     })
//!     .collect();
//! assert_eq!(firsts, vec![0, 3, 6]);
//! ```

mod command;
mod memory;
mod merged;
mod scratch;

pub use command::{DrawCommand, MAX_COLOR_ATTACHMENTS};
pub use memory::{MemRef, MemorySlot};
pub use merged::{MergedStream, RecordedCommand};
pub use scratch::{SCRATCH_ALIGNMENT, ScratchArena, ScratchSpan};

use std::ops::Range;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{CapacityError, StreamError};
use crate::types::{
    BufferHandle, ClearFlags, FramebufferFlags, ProgramHandle, TextureHandle, Viewport,
};

/// One piece of a stream's logical sequence.
#[derive(Debug)]
enum Segment {
    /// A closed run of the stream's own commands.
    Commands(Range<usize>),
    /// A child stream spliced at this position.
    Substream(Substream),
}

/// An ordered sequence of recorded GPU commands.
///
/// # Thread Safety
///
/// `DrawStream` is `Send` but not shared: a stream is recorded by one thread at
/// a time. Parallel recording goes through [`Substream`]s, each owned by a
/// single job.
#[derive(Debug, Default)]
pub struct DrawStream {
    commands: Vec<DrawCommand>,
    segments: Vec<Segment>,
    /// Start of the run not yet closed by a sub-stream split.
    run_start: usize,
    scratch: ScratchArena,
    /// Upload memory released together with the merged stream.
    memory: Vec<MemRef>,
    /// Names of currently open profile blocks, innermost last.
    profile_stack: Vec<&'static str>,
    unmatched_ends: usize,
}

impl DrawStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty stream with room for `capacity` direct commands.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Append a command.
    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    /// Number of commands recorded directly into this stream.
    ///
    /// Sub-stream content is not counted.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing was recorded directly and no sub-stream exists.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.segments.is_empty()
    }

    /// Number of direct children.
    pub fn substream_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Substream(_)))
            .count()
    }

    /// Create a child stream spliced at the current write position.
    ///
    /// Commands appended to `self` after this call are ordered after the
    /// sub-stream's content in the merged result.
    pub fn create_substream(&mut self) -> Substream {
        let end = self.commands.len();
        if end > self.run_start {
            self.segments.push(Segment::Commands(self.run_start..end));
        }
        self.run_start = end;

        let substream = Substream::new();
        self.segments.push(Segment::Substream(substream.clone()));
        substream
    }

    // ------------------------------------------------------------------
    // User allocations
    // ------------------------------------------------------------------

    /// Reserve `size` bytes of scratch memory owned by this stream.
    pub fn user_alloc(&mut self, size: u32) -> Result<ScratchSpan, CapacityError> {
        self.scratch.alloc(size)
    }

    /// Copy `data` into scratch memory owned by this stream.
    pub fn user_copy(&mut self, data: &[u8]) -> Result<ScratchSpan, CapacityError> {
        self.scratch.copy(data)
    }

    /// Read a scratch allocation made on this stream.
    pub fn user_data(&self, span: ScratchSpan) -> &[u8] {
        self.scratch.get(span)
    }

    /// Write into a scratch allocation made on this stream.
    pub fn user_data_mut(&mut self, span: ScratchSpan) -> &mut [u8] {
        self.scratch.get_mut(span)
    }

    // ------------------------------------------------------------------
    // Profiling
    // ------------------------------------------------------------------

    /// Open a named profile block.
    ///
    /// Must be balanced by [`end_profile_block`](Self::end_profile_block) on the
    /// same stream before finalize.
    pub fn begin_profile_block(&mut self, name: &'static str, link: i64, stats: bool) {
        self.profile_stack.push(name);
        self.push(DrawCommand::BeginProfileBlock { name, link, stats });
    }

    /// Close the innermost profile block.
    pub fn end_profile_block(&mut self) {
        if self.profile_stack.pop().is_none() {
            log::error!("end_profile_block without matching begin_profile_block");
            self.unmatched_ends += 1;
            return;
        }
        self.push(DrawCommand::EndProfileBlock);
    }

    /// Number of currently open profile blocks.
    pub fn open_profile_blocks(&self) -> usize {
        self.profile_stack.len()
    }

    /// Check that this stream (not its children) is well-formed.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.unmatched_ends > 0 {
            return Err(StreamError::UnmatchedEndProfileBlock);
        }
        if let Some(&innermost) = self.profile_stack.last() {
            return Err(StreamError::UnbalancedProfileBlocks {
                open: self.profile_stack.len(),
                innermost,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Finalize
    // ------------------------------------------------------------------

    /// Validate and merge this stream and all its sub-streams.
    ///
    /// Sub-streams are merged depth-first, in creation order, at their
    /// splice positions.
    ///
    /// # Errors
    ///
    /// Fails if any stream in the tree has unbalanced profile blocks, or if a
    /// sub-stream handle is still held elsewhere (its job has not finished).
    pub fn finalize(self) -> Result<MergedStream, StreamError> {
        let mut merged = MergedStream::default();
        self.merge_into(&mut merged)?;
        log::trace!(
            "Finalized draw stream: {} commands in {} runs",
            merged.len(),
            merged.run_count()
        );
        Ok(merged)
    }

    fn merge_into(self, out: &mut MergedStream) -> Result<(), StreamError> {
        self.validate()?;

        let Self {
            commands,
            segments,
            run_start,
            scratch,
            memory,
            ..
        } = self;

        let tail = run_start..commands.len();
        let part = out.push_part(commands, scratch, memory);

        for segment in segments {
            match segment {
                Segment::Commands(range) => out.push_run(part, range),
                Segment::Substream(substream) => substream.into_stream()?.merge_into(out)?,
            }
        }

        if !tail.is_empty() {
            out.push_run(part, tail);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Recording helpers
    // ------------------------------------------------------------------

    /// Bind color attachments and an optional depth attachment
    /// ([`TextureHandle::INVALID`] for none).
    pub fn set_framebuffer(
        &mut self,
        color: &[TextureHandle],
        depth: TextureHandle,
        flags: FramebufferFlags,
    ) {
        self.push(DrawCommand::framebuffer(color, depth, flags));
    }

    /// Set the viewport for subsequent draws.
    pub fn viewport(&mut self, viewport: Viewport) {
        self.push(DrawCommand::Viewport(viewport));
    }

    /// Clear the attachments selected by `flags` of the bound framebuffer.
    /// Stencil is cleared to 0.
    pub fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32) {
        self.push(DrawCommand::Clear {
            flags,
            color,
            depth,
            stencil: 0,
        });
    }

    /// Make `program` current for subsequent draws and dispatches.
    pub fn use_program(&mut self, program: ProgramHandle) {
        self.push(DrawCommand::UseProgram(program));
    }

    /// Bind `size` bytes of `buffer` starting at `offset` to uniform `slot`.
    pub fn bind_uniform_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u32, size: u32) {
        self.push(DrawCommand::BindUniformBuffer {
            slot,
            buffer,
            offset,
            size,
        });
    }

    /// Bind `buffer` to vertex input `slot`.
    pub fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u32, stride: u32) {
        self.push(DrawCommand::BindVertexBuffer {
            slot,
            buffer,
            offset,
            stride,
        });
    }

    /// Bind the index buffer used by [`draw_indexed`](Self::draw_indexed).
    pub fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u32) {
        self.push(DrawCommand::BindIndexBuffer { buffer, offset });
    }

    /// Bind `texture` to sampler `slot`.
    pub fn bind_texture(&mut self, slot: u32, texture: TextureHandle) {
        self.push(DrawCommand::BindTexture { slot, texture });
    }

    /// Draw `count` vertices starting at vertex `first`.
    pub fn draw_arrays(&mut self, first: u32, count: u32) {
        self.push(DrawCommand::DrawArrays { first, count });
    }

    /// Draw `count` indices starting at index `first`, `instances` times.
    pub fn draw_indexed(&mut self, first: u32, count: u32, instances: u32) {
        self.push(DrawCommand::DrawIndexed {
            first,
            count,
            instances,
        });
    }

    /// Dispatch the current compute program over `x * y * z` groups.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.push(DrawCommand::Dispatch { x, y, z });
    }

    /// Copy `data` into stream scratch memory and record an upload of it to
    /// `buffer` at byte `offset`.
    pub fn update_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u32,
        data: &[u8],
    ) -> Result<(), CapacityError> {
        let data = self.user_copy(data)?;
        self.push(DrawCommand::UpdateBuffer {
            buffer,
            offset,
            data,
        });
        Ok(())
    }

    /// Take ownership of `memory` and record an upload of it to `buffer` at
    /// byte `offset`. The memory is released when the merged stream is dropped.
    pub fn upload_memory(&mut self, buffer: BufferHandle, offset: u32, memory: MemRef) {
        let slot = MemorySlot(self.memory.len() as u32);
        self.memory.push(memory);
        self.push(DrawCommand::UploadMemory {
            buffer,
            offset,
            memory: slot,
        });
    }
}

/// Handle to a child [`DrawStream`] that can be recorded from another thread.
///
/// Cloning the handle does not create a new stream. The parent keeps one clone
/// until finalize; every other clone must be dropped by then.
#[derive(Debug, Clone)]
pub struct Substream {
    cell: Arc<Mutex<DrawStream>>,
}

impl Substream {
    fn new() -> Self {
        Self {
            cell: Arc::new(Mutex::new(DrawStream::new())),
        }
    }

    /// Record into the sub-stream.
    pub fn record<R>(&self, f: impl FnOnce(&mut DrawStream) -> R) -> R {
        let mut stream = self.cell.lock();
        f(&mut stream)
    }

    /// Lock the sub-stream for recording.
    pub fn lock(&self) -> MutexGuard<'_, DrawStream> {
        self.cell.lock()
    }

    fn into_stream(self) -> Result<DrawStream, StreamError> {
        Arc::try_unwrap(self.cell)
            .map(Mutex::into_inner)
            .map_err(|_| StreamError::SubstreamStillRecording)
    }
}
