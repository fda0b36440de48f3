//! Frame completion fences.
//!
//! A [`Fence`] is signaled by the execution side once a frame's merged stream
//! has been executed, and waited on by the logic thread before it reuses that
//! frame's resources. A fence is signaled exactly once and never reset.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct FenceState {
    signaled: Mutex<bool>,
    cond: Condvar,
}

/// CPU-side completion signal for one frame of execution.
///
/// Cloning a fence shares its state, so the execution side can keep one clone
/// while the [`FramePipeline`](super::FramePipeline) holds another.
///
/// # Example
///
/// ```
/// use kiln_graphics::scheduler::Fence;
///
/// let fence = Fence::new_unsignaled();
/// let gpu_side = fence.clone();
/// std::thread::spawn(move || gpu_side.signal());
///
/// fence.wait();
/// assert!(fence.is_signaled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Fence {
    state: Arc<FenceState>,
}

impl Fence {
    pub fn new_unsignaled() -> Self {
        Self::default()
    }

    /// A fence for work that is already complete.
    pub fn new_signaled() -> Self {
        let fence = Self::default();
        fence.signal();
        fence
    }

    pub fn is_signaled(&self) -> bool {
        *self.state.signaled.lock()
    }

    /// Block until the fence is signaled.
    pub fn wait(&self) {
        let mut signaled = self.state.signaled.lock();
        while !*signaled {
            self.state.cond.wait(&mut signaled);
        }
    }

    /// Signal the fence and wake every waiter.
    pub fn signal(&self) {
        *self.state.signaled.lock() = true;
        self.state.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_new_fences() {
        assert!(!Fence::new_unsignaled().is_signaled());

        let done = Fence::new_signaled();
        assert!(done.is_signaled());
        done.wait();
    }

    #[test]
    fn test_wait_returns_after_signal_from_other_thread() {
        let fence = Fence::new_unsignaled();
        let signaler = fence.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            signaler.signal();
        });

        fence.wait();
        assert!(fence.is_signaled());
    }

    #[test]
    fn test_clone_shares_state() {
        let a = Fence::new_unsignaled();
        let b = a.clone();
        a.signal();
        assert!(b.is_signaled());
    }

    #[test]
    fn test_every_waiter_released() {
        let fence = Fence::new_unsignaled();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let f = fence.clone();
                thread::spawn(move || f.wait())
            })
            .collect();

        fence.signal();
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }
}
