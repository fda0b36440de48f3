//! Frame slots for multiple frames in flight.

use super::Fence;

/// Bounds how far frame setup may run ahead of execution.
///
/// Frame `n` occupies slot `n % frames_in_flight`. Starting frame `n` waits
/// for the fence of frame `n - frames_in_flight`, the previous occupant of
/// the slot.
///
/// ```text
/// frames_in_flight = 2
///
/// Slot 0: [Frame 0] ──► [Frame 2] ──► [Frame 4] ──►
/// Slot 1: [Frame 1] ──► [Frame 3] ──► [Frame 5] ──►
/// ```
///
/// Owned by the [`Renderer`](crate::Renderer) and driven from the logic
/// thread only.
#[derive(Debug)]
pub struct FramePipeline {
    slots: Box<[Option<Fence>]>,
    /// Number of frames ended so far; also the next frame's number.
    frames_ended: u64,
}

impl FramePipeline {
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is 0.
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "frames_in_flight must be at least 1");
        Self {
            slots: vec![None; frames_in_flight].into_boxed_slice(),
            frames_ended: 0,
        }
    }

    fn slot_of(&self, frame: u64) -> usize {
        (frame % self.slots.len() as u64) as usize
    }

    /// Block until the slot of the next frame has finished executing.
    pub fn begin_frame(&self) {
        let slot = self.slot_of(self.frames_ended);
        if let Some(fence) = &self.slots[slot] {
            log::trace!("Frame {} waits for slot {}", self.frames_ended, slot);
            fence.wait();
        }
    }

    /// Hand the slot of the current frame to `fence` and move to the next.
    pub fn end_frame(&mut self, fence: Fence) {
        let slot = self.slot_of(self.frames_ended);
        self.slots[slot] = Some(fence);
        self.frames_ended += 1;
    }

    /// Fence of the most recently ended frame, if any.
    pub fn last_fence(&self) -> Option<&Fence> {
        let last = self.frames_ended.checked_sub(1)?;
        self.slots[self.slot_of(last)].as_ref()
    }

    /// Block until every submitted frame has executed.
    pub fn wait_idle(&self) {
        for fence in self.slots.iter().flatten() {
            fence.wait();
        }
    }
}
