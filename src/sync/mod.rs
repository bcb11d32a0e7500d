//! Scheduling and cross-thread handoff primitives.
//!
//! Everything the four pipeline threads use to coordinate lives here:
//! the triple-buffered snapshot handoff ([`swap_buffer`]), the binary
//! semaphores serializing prepare against dispatch ([`semaphore`]), the
//! fixed-period task scheduler driving the control and sound threads
//! ([`scheduler`]), and the interpolation timing corrector ([`timing`]).

pub mod scheduler;
pub mod semaphore;
pub mod swap_buffer;
pub mod timing;

pub use scheduler::{ScheduleKind, Scheduler};
pub use semaphore::{ScopedSemaphores, Semaphore};
pub use swap_buffer::{SwapBufferController, SwapBuffers};
pub use timing::{interpolation_factor, InterpolationTimingCorrector};
