//! Counting semaphore and the prepare/dispatch ping-pong helper.

use parking_lot::{Condvar, Mutex};

/// A minimal counting semaphore.
///
/// The graphics pipeline uses two of these as binary semaphores: prepare
/// acquires A and releases B, dispatch acquires B and releases A, so the two
/// stages never process the same frame concurrently but overlap on adjacent
/// frames.
pub struct Semaphore {
    count: Mutex<u32>,
    cond: Condvar,
}

impl Semaphore {
    #[must_use]
    pub fn new(initial: u32) -> Self {
        Self {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    /// Blocks until a permit is available.
    pub fn acquire(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cond.wait(&mut count);
        }
        *count -= 1;
    }

    pub fn release(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.cond.notify_one();
    }
}

/// Acquires one semaphore on construction and releases the other on drop.
///
/// Scoped so the release happens on every exit path, including panics
/// unwinding out of a pipeline stage.
pub struct ScopedSemaphores<'a> {
    release: &'a Semaphore,
}

impl<'a> ScopedSemaphores<'a> {
    pub fn new(acquire: &'a Semaphore, release: &'a Semaphore) -> Self {
        acquire.acquire();
        Self { release }
    }
}

impl Drop for ScopedSemaphores<'_> {
    fn drop(&mut self) {
        self.release.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn ping_pong_alternates() {
        let a = Arc::new(Semaphore::new(1));
        let b = Arc::new(Semaphore::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let t = {
            let (a, b, order) = (a.clone(), b.clone(), order.clone());
            std::thread::spawn(move || {
                for i in 0..3 {
                    let _guard = ScopedSemaphores::new(&b, &a);
                    order.lock().push(format!("dispatch{i}"));
                }
            })
        };
        for i in 0..3 {
            let _guard = ScopedSemaphores::new(&a, &b);
            order.lock().push(format!("prepare{i}"));
        }
        t.join().unwrap();

        let order = order.lock();
        assert_eq!(
            *order,
            vec![
                "prepare0", "dispatch0", "prepare1", "dispatch1", "prepare2", "dispatch2"
            ]
        );
    }
}
