//! The flat result of finalizing a draw stream tree.

use std::ops::Range;

use crate::types::BufferHandle;

use super::{DrawCommand, MemRef, MemorySlot, ScratchArena, ScratchSpan};

/// Commands and memory taken over from one source stream.
#[derive(Debug)]
struct Part {
    commands: Vec<DrawCommand>,
    scratch: ScratchArena,
    memory: Vec<MemRef>,
}

/// A finalized, read-only command sequence ready for execution.
///
/// The sequence is stored as ordered runs over the command buffers of the
/// original streams, so no command was copied during the merge. Iteration
/// yields every command in final order together with the scratch arena its
/// [`ScratchSpan`]s refer to.
#[derive(Debug, Default)]
pub struct MergedStream {
    parts: Vec<Part>,
    runs: Vec<(usize, Range<usize>)>,
    len: usize,
}

impl MergedStream {
    pub(super) fn push_part(
        &mut self,
        commands: Vec<DrawCommand>,
        scratch: ScratchArena,
        memory: Vec<MemRef>,
    ) -> usize {
        self.parts.push(Part {
            commands,
            scratch,
            memory,
        });
        self.parts.len() - 1
    }

    pub(super) fn push_run(&mut self, part: usize, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        self.len += range.len();

        // Coalesce with the previous run when it is contiguous in the same part
        if let Some((last_part, last)) = self.runs.last_mut() {
            if *last_part == part && last.end == range.start {
                last.end = range.end;
                return;
            }
        }
        self.runs.push((part, range));
    }

    /// Total number of commands.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of contiguous runs the commands are stored in.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Iterate over commands with their scratch context, in execution order.
    pub fn iter(&self) -> impl Iterator<Item = RecordedCommand<'_>> + '_ {
        self.runs.iter().flat_map(move |(part, range)| {
            let part = &self.parts[*part];
            part.commands[range.clone()]
                .iter()
                .map(move |command| RecordedCommand {
                    command,
                    scratch: &part.scratch,
                    memory: &part.memory,
                })
        })
    }

    /// Iterate over commands only, in execution order.
    pub fn commands(&self) -> impl Iterator<Item = &DrawCommand> + '_ {
        self.iter().map(|rc| rc.command)
    }

    /// Append another merged stream after this one.
    pub fn append(&mut self, other: MergedStream) {
        let base = self.parts.len();
        self.parts.extend(other.parts);
        for (part, range) in other.runs {
            self.push_run(base + part, range);
        }
    }
}

/// A command in a [`MergedStream`] plus the memory it refers to.
#[derive(Debug, Clone, Copy)]
pub struct RecordedCommand<'a> {
    pub command: &'a DrawCommand,
    pub scratch: &'a ScratchArena,
    pub memory: &'a [MemRef],
}

impl<'a> RecordedCommand<'a> {
    /// Resolve a scratch span carried by this command.
    pub fn data(&self, span: ScratchSpan) -> &'a [u8] {
        self.scratch.get(span)
    }

    /// Resolve a memory block carried by this command.
    pub fn memory(&self, slot: MemorySlot) -> &'a [u8] {
        &self.memory[slot.0 as usize]
    }

    /// Destination and bytes of a buffer upload, from scratch or owned memory.
    pub fn buffer_upload(&self) -> Option<(BufferHandle, u32, &'a [u8])> {
        match *self.command {
            DrawCommand::UpdateBuffer {
                buffer,
                offset,
                data,
            } => Some((buffer, offset, self.data(data))),
            DrawCommand::UploadMemory {
                buffer,
                offset,
                memory,
            } => Some((buffer, offset, self.memory(memory))),
            _ => None,
        }
    }
}
