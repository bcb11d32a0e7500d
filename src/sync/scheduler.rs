//! Fixed-period cooperative task scheduler.
//!
//! Each pipeline thread that runs periodic work owns one scheduler: the
//! control thread drives the update and input tasks, the sound thread drives
//! the sound tick. Tasks run on the owning thread only; the scheduler sleeps
//! between due times and exits at the next task boundary once stopped.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::utils::EngineClock;

/// How a schedule advances after running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    /// Maintains a steady nominal timeline: the next due time is the previous
    /// one plus the period, and the action receives the *nominal* tick time.
    /// Falls back to resynchronizing when more than [`MAX_STEADY_LAG`] periods
    /// behind.
    SteadyPeriodic,
    /// Free-running: the next due time is measured from completion.
    FreePeriodic,
}

/// Bound on steady catch-up before resynchronizing to the wall clock.
const MAX_STEADY_LAG: u64 = 4;

type Action<'a> = Box<dyn FnMut(u64) + 'a>;

struct ScheduleState<'a> {
    name: &'static str,
    kind: ScheduleKind,
    period_us: u64,
    next_due: u64,
    action: Action<'a>,
}

/// Handle used by actions to stop the scheduler they run under.
#[derive(Clone, Default)]
pub struct SchedulerStop(Rc<Cell<bool>>);

impl SchedulerStop {
    pub fn stop(&self) {
        self.0.set(true);
    }
}

pub struct Scheduler<'a> {
    clock: EngineClock,
    schedules: Vec<ScheduleState<'a>>,
    stop: SchedulerStop,
}

impl<'a> Scheduler<'a> {
    #[must_use]
    pub fn new(clock: EngineClock) -> Self {
        Self {
            clock,
            schedules: Vec::new(),
            stop: SchedulerStop::default(),
        }
    }

    /// The stop handle; actions capture a clone to end the loop.
    #[must_use]
    pub fn stop_handle(&self) -> SchedulerStop {
        self.stop.clone()
    }

    /// Registers a periodic task. The action receives the schedule time of
    /// the tick in microseconds.
    pub fn add(
        &mut self,
        name: &'static str,
        kind: ScheduleKind,
        period_us: u64,
        action: impl FnMut(u64) + 'a,
    ) {
        assert!(period_us > 0, "schedule period must be positive");
        let now = self.clock.now_us();
        self.schedules.push(ScheduleState {
            name,
            kind,
            period_us,
            next_due: now + period_us,
            action: Box::new(action),
        });
    }

    /// Runs until an action calls [`SchedulerStop::stop`].
    ///
    /// Tasks are cooperative: a long-running action delays its peers. The
    /// stop flag is observed at every task boundary.
    pub fn run(&mut self) {
        assert!(!self.schedules.is_empty(), "scheduler has no tasks");
        while !self.stop.0.get() {
            let (index, due) = self
                .schedules
                .iter()
                .enumerate()
                .map(|(i, s)| (i, s.next_due))
                .min_by_key(|&(_, due)| due)
                .expect("at least one schedule");

            let now = self.clock.now_us();
            if due > now {
                std::thread::sleep(Duration::from_micros(due - now));
            }
            if self.stop.0.get() {
                break;
            }

            let schedule = &mut self.schedules[index];
            let tick_time = schedule.next_due;
            (schedule.action)(tick_time);

            let now = self.clock.now_us();
            match schedule.kind {
                ScheduleKind::SteadyPeriodic => {
                    schedule.next_due += schedule.period_us;
                    if now.saturating_sub(schedule.next_due)
                        > MAX_STEADY_LAG * schedule.period_us
                    {
                        log::debug!(
                            "schedule {} fell behind, resynchronizing",
                            schedule.name
                        );
                        schedule.next_due = now + schedule.period_us;
                    }
                }
                ScheduleKind::FreePeriodic => {
                    schedule.next_due = now + schedule.period_us;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_schedule_reports_nominal_times() {
        let clock = EngineClock::new();
        let mut scheduler = Scheduler::new(clock);
        let stop = scheduler.stop_handle();
        let times = Rc::new(std::cell::RefCell::new(Vec::new()));
        {
            let times = times.clone();
            scheduler.add("test", ScheduleKind::SteadyPeriodic, 1_000, move |t| {
                times.borrow_mut().push(t);
                if times.borrow().len() == 5 {
                    stop.stop();
                }
            });
        }
        scheduler.run();
        let times = times.borrow();
        assert_eq!(times.len(), 5);
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], 1_000, "nominal timeline must be steady");
        }
    }

    #[test]
    fn stop_exits_at_task_boundary() {
        let mut scheduler = Scheduler::new(EngineClock::new());
        let stop = scheduler.stop_handle();
        let mut runs = 0;
        scheduler.add("once", ScheduleKind::FreePeriodic, 100, move |_| {
            runs += 1;
            assert_eq!(runs, 1);
            stop.stop();
        });
        scheduler.run();
    }
}
