//! The priority/deadline real-time scheduler (spec §3.1, §4.6).
use core::marker::PhantomData;
use core::ptr::NonNull;

use arrayvec::ArrayVec;

use rtfiber_core::fail::{fail, FailReason};
use rtfiber_core::hooks::Clock;
use rtfiber_core::signal::CoSignal;
use rtfiber_core::time::{TickRep, TimePoint};

use crate::logger::{Logger, NullLogger};
use crate::task::{ExecutionWindow, Schedule, TaskBase, TaskId};
use crate::utils::binary_heap::{BinaryHeap, BinaryHeapCtx};

type TaskRef<U, const MAX: u128, const NUM: u64, const DEN: u64> =
    NonNull<dyn TaskBase<U, MAX, NUM, DEN>>;

/// Orders the running queue so `heap_pop` always returns the most urgent
/// task: a deadline-based task (spec §3.1's `PRIORITY_MAX` sentinel) always
/// outranks a priority-only one, deadline-based tasks are ordered by
/// ascending deadline, and priority-only tasks by descending priority number
/// (spec §3.1/§4.5: "higher integer = higher priority"; spec §8.3's S6:
/// "deadline outranks priority").
struct RunningOrder;

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64>
    BinaryHeapCtx<TaskRef<U, MAX, NUM, DEN>> for RunningOrder
{
    fn lt(&mut self, x: &TaskRef<U, MAX, NUM, DEN>, y: &TaskRef<U, MAX, NUM, DEN>) -> bool {
        // Safety: every `TaskRef` in a queue came from `Scheduler::add`,
        // which only accepts `&'static dyn TaskBase`.
        let (xc, yc) = unsafe { (x.as_ref().control(), y.as_ref().control()) };
        match (xc.is_deadline_based(), yc.is_deadline_based()) {
            (true, true) => xc.schedule().deadline < yc.schedule().deadline,
            (true, false) => true,
            (false, true) => false,
            (false, false) => xc.effective_priority() > yc.effective_priority(),
        }
    }
}

/// The cooperative real-time scheduler: an unordered `waiting` collection
/// (tasks not yet ready, whether by ready-time or by an unresolved
/// awaitable) and a `running` priority queue (tasks eligible to run now),
/// both bounded at compile time — spec §3.1's two-collection design, with
/// the "awaiting" collection folded into `waiting` since both are scanned
/// by the same readiness check on every [`Scheduler::spin`] (spec §4.6).
pub struct Scheduler<
    C,
    U,
    const MAX: u128,
    const NUM: u64,
    const DEN: u64,
    const NWAIT: usize,
    const NRUN: usize,
    L = NullLogger,
> where
    U: TickRep,
    C: Clock<Instant = TimePoint<U, MAX, NUM, DEN>>,
    L: Logger<U, MAX, NUM, DEN>,
{
    waiting: ArrayVec<TaskRef<U, MAX, NUM, DEN>, NWAIT>,
    running: ArrayVec<TaskRef<U, MAX, NUM, DEN>, NRUN>,
    next_id: TaskId,
    logger: L,
    _clock: PhantomData<fn() -> C>,
}

impl<C, U, const MAX: u128, const NUM: u64, const DEN: u64, const NWAIT: usize, const NRUN: usize, L>
    Scheduler<C, U, MAX, NUM, DEN, NWAIT, NRUN, L>
where
    U: TickRep,
    C: Clock<Instant = TimePoint<U, MAX, NUM, DEN>>,
    L: Logger<U, MAX, NUM, DEN>,
{
    pub fn new(logger: L) -> Self {
        Self {
            waiting: ArrayVec::new(),
            running: ArrayVec::new(),
            next_id: 0,
            logger,
            _clock: PhantomData,
        }
    }

    /// Admits `task`, assigning it a fresh [`TaskId`] and placing it in the
    /// waiting collection (spec §4.6's admission step).
    ///
    /// Tasks are referenced, not owned: the caller (typically a `static`)
    /// keeps the task alive for as long as the scheduler runs, matching
    /// spec §4.6's "indexed by raw pointer" task-ownership note.
    ///
    /// # Panics (fatal, via [`rtfiber_core::fail::fail`])
    ///
    /// If the waiting collection is already at capacity — admission into a
    /// full scheduler is a precondition violation, not a recoverable error.
    pub fn add(&mut self, task: &'static dyn TaskBase<U, MAX, NUM, DEN>) -> TaskId {
        if self.waiting.len() >= NWAIT {
            fail(FailReason::QueueFull);
        }
        self.next_id += 1;
        let id = self.next_id;
        task.control().set_id(id);
        self.logger.task_admitted(id, task.control().name());
        self.waiting.push(NonNull::from(task));
        id
    }

    /// The number of tasks not currently eligible to run.
    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    /// The number of tasks currently eligible to run.
    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    /// One iteration of the dispatch loop (spec §4.6): promotes every
    /// waiting task that has become eligible, then dispatches the single
    /// most urgent running task. If nothing is eligible, calls
    /// [`Clock::sleep_until`] with the earliest upcoming ready-time instead
    /// of dispatching (the default implementation busy-waits by returning
    /// immediately, so a host that calls `spin` in a hot loop gets the same
    /// behavior either way).
    pub fn spin(&mut self, now: TimePoint<U, MAX, NUM, DEN>) {
        self.promote(now);

        if self.running.is_empty() {
            if let Some(next_ready) = self.earliest_waiting_ready() {
                C::sleep_until(next_ready);
            }
            return;
        }

        self.dispatch(now);
    }

    fn promote(&mut self, now: TimePoint<U, MAX, NUM, DEN>) {
        let mut i = 0;
        while i < self.waiting.len() {
            // Safety: see `RunningOrder::lt`.
            let ctrl = unsafe { self.waiting[i].as_ref() }.control();
            let ready = ctrl.immediately_ready()
                || (!ctrl.signal().is_await() && ctrl.schedule().ready <= now)
                || (ctrl.signal().is_await()
                    && ctrl.leaf_hook().map(|h| h.is_ready()).unwrap_or(false));

            if !ready {
                i += 1;
                continue;
            }

            let task_ref = self.waiting.swap_remove(i);
            // Safety: see `RunningOrder::lt`.
            let ctrl = unsafe { task_ref.as_ref() }.control();
            ctrl.set_immediately_ready(false);
            ctrl.set_leaf_hook(None);
            self.logger.task_promoted(ctrl.id());

            if self.running.len() >= NRUN {
                fail(FailReason::QueueFull);
            }
            self.running.heap_push(task_ref, RunningOrder);
        }
    }

    fn earliest_waiting_ready(&self) -> Option<TimePoint<U, MAX, NUM, DEN>> {
        self.waiting
            .iter()
            // Safety: see `RunningOrder::lt`.
            .map(|t| unsafe { t.as_ref() }.control())
            .filter(|ctrl| !ctrl.signal().is_await())
            .map(|ctrl| ctrl.schedule().ready)
            .min()
    }

    fn dispatch(&mut self, now: TimePoint<U, MAX, NUM, DEN>) {
        let Some(task_ref) = self.running.heap_pop(RunningOrder) else {
            return;
        };
        // Safety: see `RunningOrder::lt`.
        let task = unsafe { task_ref.as_ref() };
        let ctrl = task.control();
        let id = ctrl.id();

        let prev_schedule = ctrl.schedule();

        // Spec §4.5's missed-deadline hook: checked against the deadline a
        // task was popped with, before it ever runs again, so a `false`
        // answer drops it without resuming (spec §8.3's S7).
        if ctrl.is_deadline_based() && now > prev_schedule.deadline {
            let overrun = now - prev_schedule.deadline;
            self.logger
                .deadline_missed(id, overrun.ticks().get().as_u128());
            if !task.missed_deadline(overrun) {
                self.logger.task_exited(id, crate::error::Exit::MissedDeadline);
                return;
            }
        }

        self.logger.task_dispatched(id);

        match task.resume(now) {
            Some(exit) => {
                self.logger.task_exited(id, exit);
            }
            None => {
                let exec = ExecutionWindow { start: now, end: now };
                ctrl.set_execution(exec);

                let new_schedule = match ctrl.signal() {
                    CoSignal::Await => prev_schedule,
                    CoSignal::None | CoSignal::NextCycle => task.next_schedule(prev_schedule, exec),
                    CoSignal::ImplicitDelay(d) => {
                        let width = prev_schedule.deadline - prev_schedule.ready;
                        let ready = exec.end + d;
                        Schedule {
                            ready,
                            deadline: ready + width,
                        }
                    }
                    CoSignal::ExplicitDelay { ready, deadline } => Schedule {
                        ready: exec.end + ready,
                        deadline: exec.end + deadline,
                    },
                };
                ctrl.set_schedule(new_schedule);

                // Spec §10.2's `priority_boost` feature: a priority-scheduled
                // task (deadline-based tasks are already always dispatched
                // first, so boosting one would be a no-op) that overran its
                // own window gets a chance to raise its own urgency for next
                // time.
                #[cfg(feature = "priority_boost")]
                if !ctrl.is_deadline_based() && exec.end > prev_schedule.deadline {
                    let overrun = exec.end - prev_schedule.deadline;
                    ctrl.set_priority_boost(task.priority_boost(overrun));
                }

                if self.waiting.len() >= NWAIT {
                    fail(FailReason::QueueFull);
                }
                self.waiting.push(task_ref);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::{CoCx, CoPoll, CoroutineBody};
    #[cfg(feature = "priority_boost")]
    use crate::task::Priority;
    use crate::task::Task;
    use rtfiber_core::time::Duration;

    type U = u32;
    const MAXT: u128 = u32::MAX as u128;
    const NUM: u64 = 1;
    const DEN: u64 = 1_000;
    type TP = TimePoint<U, MAXT, NUM, DEN>;
    type Dur = Duration<U, MAXT, NUM, DEN>;

    struct TestClock;
    impl Clock for TestClock {
        type Instant = TP;
        fn now() -> TP {
            TP::ZERO
        }
    }

    /// Runs forever, yielding `NextCycle` on every tick — a stand-in for a
    /// periodic background task.
    struct Forever;
    impl CoroutineBody<U, MAXT, NUM, DEN> for Forever {
        type Output = ();
        fn resume(&mut self, cx: &mut CoCx<'_, U, MAXT, NUM, DEN>) -> CoPoll<()> {
            cx.raise(CoSignal::NextCycle);
            CoPoll::Pending
        }
    }

    fn ticks(n: u32) -> TP {
        use rtfiber_core::time::Tick;
        TP::from_duration_since_epoch(Dur::from_ticks(Tick::new(n)))
    }

    /// S5 from spec §8.3: a task with a future ready-time is not dispatched
    /// before it, and is dispatched once `now` reaches it.
    #[test]
    fn s5_promotion_waits_for_ready_time() {
        static TASK: Task<Forever, 64, U, MAXT, NUM, DEN> = Task::with_priority_and_ready("late", 1, TP::ZERO);
        TASK.init(Forever);
        // Re-point the task's schedule so it isn't ready until tick 10.
        TASK.control().set_schedule(Schedule {
            ready: ticks(10),
            deadline: ticks(10),
        });

        let mut sched: Scheduler<TestClock, U, MAXT, NUM, DEN, 4, 4> = Scheduler::new(NullLogger);
        sched.add(&TASK);

        sched.spin(ticks(5));
        assert_eq!(sched.running_len(), 0);
        assert_eq!(sched.waiting_len(), 1);

        sched.spin(ticks(10));
        assert_eq!(sched.running_len(), 0); // dispatched and requeued within the same spin
        assert_eq!(sched.waiting_len(), 1);
    }

    /// S6 from spec §8.3: a deadline-based task is dispatched ahead of a
    /// numerically "higher priority number" priority-only task, regardless
    /// of queue order.
    #[test]
    fn s6_deadline_outranks_priority() {
        static BACKGROUND: Task<Forever, 64, U, MAXT, NUM, DEN> = Task::with_priority("bg", 0);
        static URGENT: Task<Forever, 64, U, MAXT, NUM, DEN> =
            Task::with_deadline("rt", TP::ZERO, TP::ZERO);
        BACKGROUND.init(Forever);
        URGENT.init(Forever);

        let mut sched: Scheduler<TestClock, U, MAXT, NUM, DEN, 4, 4> = Scheduler::new(NullLogger);
        sched.add(&BACKGROUND);
        sched.add(&URGENT);

        sched.promote(TP::ZERO);
        let popped = sched.running.heap_pop(RunningOrder).unwrap();
        // Safety: test-local, both tasks outlive this scope.
        let id = unsafe { popped.as_ref() }.control().id();
        assert_eq!(id, URGENT.control().id());
    }

    /// S7 from spec §8.3 (the `false` branch): a task whose `missed_deadline`
    /// policy declines the overrun is dropped by the scheduler without ever
    /// being resumed.
    #[test]
    fn s7_missed_deadline_false_drops_without_resuming() {
        use crate::task::TaskPolicy;
        use rtfiber_core::time::Duration as Dur2;

        struct NeverTolerate;
        impl TaskPolicy<U, MAXT, NUM, DEN> for NeverTolerate {
            fn missed_deadline(_overrun: Dur2<U, MAXT, NUM, DEN>) -> bool {
                false
            }
        }

        struct PanicsIfResumed;
        impl CoroutineBody<U, MAXT, NUM, DEN> for PanicsIfResumed {
            type Output = ();
            fn resume(&mut self, _cx: &mut CoCx<'_, U, MAXT, NUM, DEN>) -> CoPoll<()> {
                panic!("task with a declined missed deadline must not be resumed");
            }
        }

        static TASK: Task<PanicsIfResumed, 64, U, MAXT, NUM, DEN, NeverTolerate> =
            Task::with_deadline("rt", TP::ZERO, TP::ZERO);
        TASK.init(PanicsIfResumed);

        let mut sched: Scheduler<TestClock, U, MAXT, NUM, DEN, 4, 4> = Scheduler::new(NullLogger);
        sched.add(&TASK);

        sched.spin(ticks(50));

        assert_eq!(sched.running_len(), 0);
        assert_eq!(sched.waiting_len(), 0);
    }

    /// S7 from spec §8.3: overrunning a deadline is reported through the
    /// logger when `missed_deadline` says so.
    #[test]
    fn s7_missed_deadline_is_logged() {
        struct Recording {
            missed: core::cell::Cell<Option<(TaskId, u128)>>,
        }
        impl Logger<U, MAXT, NUM, DEN> for Recording {
            fn deadline_missed(&self, id: TaskId, overrun_ticks: u128) {
                self.missed.set(Some((id, overrun_ticks)));
            }
        }

        static TASK: Task<Forever, 64, U, MAXT, NUM, DEN> =
            Task::with_deadline("rt", TP::ZERO, TP::ZERO);
        TASK.init(Forever);

        let logger = Recording {
            missed: core::cell::Cell::new(None),
        };
        let mut sched: Scheduler<TestClock, U, MAXT, NUM, DEN, 4, 4, Recording> =
            Scheduler::new(logger);
        let id = sched.add(&TASK);

        // Deadline is tick 0; resuming at tick 50 overruns it by 50 ticks.
        sched.spin(ticks(50));

        let (reported_id, overrun) = sched.logger.missed.get().expect("deadline_missed not logged");
        assert_eq!(reported_id, id);
        assert_eq!(overrun, 50);
    }

    /// Spec §10.2's `priority_boost` feature: a priority-scheduled task
    /// that overruns its own window's deadline gets a higher (more urgent)
    /// `effective_priority()` than a same-`priority()` task that hasn't,
    /// once its policy's `priority_boost` hook raises it.
    #[cfg(feature = "priority_boost")]
    #[test]
    fn priority_boost_raises_effective_priority_after_overrun() {
        use crate::task::TaskPolicy;

        struct AlwaysBoost;
        impl TaskPolicy<U, MAXT, NUM, DEN> for AlwaysBoost {
            fn priority_boost(_overrun: Dur) -> Priority {
                3
            }
        }

        static SLOW: Task<Forever, 64, U, MAXT, NUM, DEN, AlwaysBoost> =
            Task::with_priority_and_ready("slow", 5, TP::ZERO);
        SLOW.init(Forever);
        // A window whose deadline is already in the past by construction,
        // so the very first resume overruns it.
        SLOW.control().set_schedule(Schedule {
            ready: TP::ZERO,
            deadline: TP::ZERO,
        });

        assert_eq!(SLOW.control().effective_priority(), 5);

        let mut sched: Scheduler<TestClock, U, MAXT, NUM, DEN, 4, 4> = Scheduler::new(NullLogger);
        sched.add(&SLOW);
        sched.spin(ticks(10));

        assert_eq!(SLOW.control().effective_priority(), 8);
        assert_eq!(SLOW.control().priority(), 5);
    }
}
