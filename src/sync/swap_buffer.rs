//! Triple-buffered single-producer single-consumer handoff.
//!
//! The control thread publishes scene snapshots through this controller; the
//! prepare threads consume them. Three slots guarantee the producer never
//! waits for the consumer in the steady state: one slot may be held by the
//! writer, one by the reader, and the third is always available.
//!
//! # Contracts
//!
//! - [`SwapBufferController::try_write`] returns a locked slot distinct from
//!   the slot the reader currently holds, or `None`. It prefers the stalest
//!   slot so the freshest published data survives as long as possible.
//! - [`SwapBufferController::try_read`] returns the freshest fully-written
//!   slot the reader has not yet consumed. With *read-repeat* enabled it may
//!   re-return the previously consumed slot when nothing newer is available
//!   (the sound pipeline uses this to keep mixing during emit stalls).
//! - Both calls are non-blocking; callers decide how to react to `None`.
//! - Lock release is scoped: guards release on every exit path.

use parking_lot::{Mutex, MutexGuard};

/// Number of slots. Fixed: the whole point of the controller is the
/// three-slot rotation.
pub const SLOT_COUNT: usize = 3;

#[derive(Debug, Default)]
struct State {
    /// Sequence number of the last completed write per slot; 0 = never written.
    written: [u64; SLOT_COUNT],
    next_seq: u64,
    writing: Option<usize>,
    reading: Option<usize>,
    /// Slot most recently consumed by the reader and the sequence it carried.
    consumed: Option<usize>,
    consumed_seq: u64,
}

/// Index-level triple-buffer controller.
///
/// Tracks which slot is being written, which is being read, and which holds
/// the freshest completed write. The data itself lives in [`SwapBuffers`] or
/// in caller-owned storage indexed by the locks handed out here.
pub struct SwapBufferController {
    state: Mutex<State>,
    repeated_reads: bool,
}

impl SwapBufferController {
    #[must_use]
    pub fn new(repeated_reads: bool) -> Self {
        Self {
            state: Mutex::new(State {
                next_seq: 1,
                ..State::default()
            }),
            repeated_reads,
        }
    }

    /// Attempts to lock a slot for writing.
    ///
    /// Returns `None` only if every candidate slot is held, which cannot
    /// happen under the one-writer one-reader discipline.
    pub fn try_write(&self) -> Option<WriteLock<'_>> {
        let mut state = self.state.lock();
        if state.writing.is_some() {
            return None;
        }
        let reading = state.reading;
        // Prefer the stalest slot; never touch the slot the reader holds.
        let index = (0..SLOT_COUNT)
            .filter(|&i| Some(i) != reading)
            .min_by_key(|&i| state.written[i])?;
        state.writing = Some(index);
        drop(state);
        Some(WriteLock {
            controller: self,
            index,
        })
    }

    /// Attempts to lock the freshest unconsumed slot for reading.
    pub fn try_read(&self) -> Option<ReadLock<'_>> {
        let mut state = self.state.lock();
        if state.reading.is_some() {
            return None;
        }
        let writing = state.writing;
        let fresh = (0..SLOT_COUNT)
            .filter(|&i| Some(i) != writing)
            .filter(|&i| state.written[i] > state.consumed_seq)
            .max_by_key(|&i| state.written[i]);
        let index = match fresh {
            Some(i) => i,
            None if self.repeated_reads => {
                // Re-read the previous slot if it still holds the same data.
                let prev = state.consumed?;
                if Some(prev) == writing || state.written[prev] != state.consumed_seq {
                    return None;
                }
                prev
            }
            None => return None,
        };
        state.reading = Some(index);
        drop(state);
        Some(ReadLock {
            controller: self,
            index,
        })
    }
}

/// Write lock on one slot. Publishing happens on drop.
pub struct WriteLock<'a> {
    controller: &'a SwapBufferController,
    index: usize,
}

impl WriteLock<'_> {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for WriteLock<'_> {
    fn drop(&mut self) {
        let mut state = self.controller.state.lock();
        state.writing = None;
        state.written[self.index] = state.next_seq;
        state.next_seq += 1;
    }
}

/// Read lock on one slot. The slot is marked consumed on drop.
pub struct ReadLock<'a> {
    controller: &'a SwapBufferController,
    index: usize,
}

impl ReadLock<'_> {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for ReadLock<'_> {
    fn drop(&mut self) {
        let mut state = self.controller.state.lock();
        state.reading = None;
        state.consumed = Some(self.index);
        state.consumed_seq = state.written[self.index];
    }
}

// ─── Typed storage ────────────────────────────────────────────────────────────

/// Controller plus the three slots of data it arbitrates.
///
/// The per-slot mutexes never contend: the controller guarantees a slot is
/// handed to at most one side at a time. They exist so the container is
/// `Sync` without unsafe code.
pub struct SwapBuffers<T> {
    controller: SwapBufferController,
    slots: [Mutex<T>; SLOT_COUNT],
}

impl<T: Default> SwapBuffers<T> {
    #[must_use]
    pub fn new(repeated_reads: bool) -> Self {
        Self {
            controller: SwapBufferController::new(repeated_reads),
            slots: [
                Mutex::new(T::default()),
                Mutex::new(T::default()),
                Mutex::new(T::default()),
            ],
        }
    }
}

impl<T> SwapBuffers<T> {
    /// Locks a slot for writing; `None` means the tick should be dropped.
    pub fn write(&self) -> Option<SwapWriteGuard<'_, T>> {
        let lock = self.controller.try_write()?;
        let data = self.slots[lock.index()].lock();
        Some(SwapWriteGuard { _lock: lock, data })
    }

    /// Locks the freshest slot for reading; `None` means nothing new.
    pub fn read(&self) -> Option<SwapReadGuard<'_, T>> {
        let lock = self.controller.try_read()?;
        let data = self.slots[lock.index()].lock();
        Some(SwapReadGuard { _lock: lock, data })
    }
}

pub struct SwapWriteGuard<'a, T> {
    _lock: WriteLock<'a>,
    data: MutexGuard<'a, T>,
}

impl<T> std::ops::Deref for SwapWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::DerefMut for SwapWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

pub struct SwapReadGuard<'a, T> {
    _lock: ReadLock<'a>,
    data: MutexGuard<'a, T>,
}

impl<T> std::ops::Deref for SwapReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_avoids_reader_slot() {
        let ctrl = SwapBufferController::new(false);
        // Publish into two slots so the reader has something to hold.
        drop(ctrl.try_write().unwrap());
        drop(ctrl.try_write().unwrap());
        let read = ctrl.try_read().unwrap();
        let held = read.index();
        for _ in 0..100 {
            let write = ctrl.try_write().expect("writer must never block");
            assert_ne!(write.index(), held);
        }
    }

    #[test]
    fn reader_sees_freshest_write() {
        let ctrl = SwapBufferController::new(false);
        let a = ctrl.try_write().unwrap().index();
        let b = ctrl.try_write().unwrap().index();
        assert_ne!(a, b);
        // Freshest completed write is b.
        assert_eq!(ctrl.try_read().unwrap().index(), b);
        // Nothing newer afterwards.
        assert!(ctrl.try_read().is_none());
    }

    #[test]
    fn read_repeat_returns_previous_slot() {
        let ctrl = SwapBufferController::new(true);
        drop(ctrl.try_write().unwrap());
        let first = ctrl.try_read().unwrap().index();
        let again = ctrl.try_read().expect("repeat read should succeed");
        assert_eq!(again.index(), first);
    }

    #[test]
    fn no_repeat_without_flag() {
        let ctrl = SwapBufferController::new(false);
        drop(ctrl.try_write().unwrap());
        drop(ctrl.try_read().unwrap());
        assert!(ctrl.try_read().is_none());
    }
}
