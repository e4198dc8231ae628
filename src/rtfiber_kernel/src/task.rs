//! Tasks: a coroutine's root frame plus the scheduling metadata the
//! scheduler needs regardless of what the coroutine actually does (spec
//! §3.1, §4.5).
use core::cell::Cell;
use core::mem::MaybeUninit;

use rtfiber_core::alloc::StackAllocator;
use rtfiber_core::awaitable::LeafHook;
use rtfiber_core::signal::CoSignal;
use rtfiber_core::time::{Duration, TickRep, TimePoint};

use crate::coroutine::{CoCx, CoroutineBody, ErasedCoroutine, FrameAllocatorScope};
use crate::error::Exit;

/// Higher numeric value means more urgent (spec §3.1/§4.5: "higher integer =
/// higher priority"); [`PRIORITY_MAX`] is reserved as the deadline-based
/// sentinel rather than a legal priority value.
pub type Priority = u8;

/// The sentinel priority marking a task as deadline-based rather than
/// priority-only (spec §3.1's "P_MAX sentinel").
pub const PRIORITY_MAX: Priority = Priority::MAX;

/// Uniquely identifies a task once it has been admitted to a scheduler.
/// `0` means "not yet admitted".
pub type TaskId = u32;

/// A task's next-run window: when it becomes eligible to run, and (for
/// deadline-based tasks) by when it must.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    pub ready: TimePoint<U, MAX, NUM, DEN>,
    pub deadline: TimePoint<U, MAX, NUM, DEN>,
}

/// The wall-clock span of one `resume` call, recorded for
/// [`TaskBase::missed_deadline`] and for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionWindow<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    pub start: TimePoint<U, MAX, NUM, DEN>,
    pub end: TimePoint<U, MAX, NUM, DEN>,
}

/// The scheduling metadata common to every task regardless of its
/// coroutine body type — what [`crate::scheduler::Scheduler`] actually
/// operates on.
///
/// Exposed through interior mutability because the scheduler only ever
/// holds shared references to tasks (it indexes them by pointer, not by
/// ownership — see spec §4.6's task-ownership note).
pub struct TaskControl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    id: Cell<TaskId>,
    name: &'static str,
    priority: Priority,
    schedule: Cell<Schedule<U, MAX, NUM, DEN>>,
    execution: Cell<ExecutionWindow<U, MAX, NUM, DEN>>,
    signal: Cell<CoSignal<U, MAX, NUM, DEN>>,
    immediately_ready: Cell<bool>,
    leaf_hook: Cell<Option<LeafHook>>,
    #[cfg(feature = "priority_boost")]
    boost: Cell<Priority>,
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> TaskControl<U, MAX, NUM, DEN> {
    pub const fn new(
        name: &'static str,
        priority: Priority,
        schedule: Schedule<U, MAX, NUM, DEN>,
        immediately_ready: bool,
    ) -> Self {
        Self {
            id: Cell::new(0),
            name,
            priority,
            schedule: Cell::new(schedule),
            execution: Cell::new(ExecutionWindow {
                start: TimePoint::ZERO,
                end: TimePoint::ZERO,
            }),
            signal: Cell::new(CoSignal::None),
            immediately_ready: Cell::new(immediately_ready),
            leaf_hook: Cell::new(None),
            #[cfg(feature = "priority_boost")]
            boost: Cell::new(0),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id.get()
    }

    pub(crate) fn set_id(&self, id: TaskId) {
        self.id.set(id);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// The priority [`crate::scheduler::Scheduler`]'s running-queue
    /// ordering actually reads (spec §10.2's `priority_boost` feature).
    ///
    /// With `priority_boost` off this is always [`Self::priority`]. With it
    /// on, a task whose [`TaskPolicy::priority_boost`] hook has raised its
    /// urgency after overrunning its own (priority-scheduled) window reads
    /// a higher number here than [`Self::priority`] returns — higher being
    /// more urgent, per this module's priority convention.
    #[cfg(feature = "priority_boost")]
    pub fn effective_priority(&self) -> Priority {
        self.priority.saturating_add(self.boost.get())
    }
    #[cfg(not(feature = "priority_boost"))]
    pub fn effective_priority(&self) -> Priority {
        self.priority
    }

    /// Sets the amount added to [`Self::priority`] by
    /// [`Self::effective_priority`]. Only meaningful under the
    /// `priority_boost` feature.
    #[cfg(feature = "priority_boost")]
    pub(crate) fn set_priority_boost(&self, boost: Priority) {
        self.boost.set(boost);
    }

    /// Whether this task is scheduled by deadline rather than by priority
    /// (spec §3.1: the `PRIORITY_MAX` sentinel).
    pub fn is_deadline_based(&self) -> bool {
        self.priority == PRIORITY_MAX
    }

    pub fn schedule(&self) -> Schedule<U, MAX, NUM, DEN> {
        self.schedule.get()
    }

    pub fn set_schedule(&self, schedule: Schedule<U, MAX, NUM, DEN>) {
        self.schedule.set(schedule);
    }

    pub fn execution(&self) -> ExecutionWindow<U, MAX, NUM, DEN> {
        self.execution.get()
    }

    pub(crate) fn set_execution(&self, window: ExecutionWindow<U, MAX, NUM, DEN>) {
        self.execution.set(window);
    }

    pub fn signal(&self) -> CoSignal<U, MAX, NUM, DEN> {
        self.signal.get()
    }

    pub(crate) fn set_signal(&self, signal: CoSignal<U, MAX, NUM, DEN>) {
        self.signal.set(signal);
    }

    /// Reads the current signal and resets it to `None` — spec §4.5 step 5,
    /// "reads and clears the task's signal".
    pub(crate) fn take_signal(&self) -> CoSignal<U, MAX, NUM, DEN> {
        let s = self.signal.get();
        self.signal.set(CoSignal::None);
        s
    }

    /// Set by a task's own logic (e.g. an interrupt handler satisfying an
    /// awaitable) to request dispatch ahead of the normal ready-time check.
    pub fn immediately_ready(&self) -> bool {
        self.immediately_ready.get()
    }

    pub fn set_immediately_ready(&self, ready: bool) {
        self.immediately_ready.set(ready);
    }

    pub fn leaf_hook(&self) -> Option<LeafHook> {
        self.leaf_hook.get()
    }

    pub(crate) fn set_leaf_hook(&self, hook: Option<LeafHook>) {
        self.leaf_hook.set(hook);
    }
}

/// Per-task scheduling policy a concrete [`Task`] may override (spec
/// §4.5's missed-deadline hook and `next_schedule`).
///
/// A zero-sized marker type selected as `Task`'s `P` parameter, the same
/// way [`crate::scheduler::Scheduler`]'s `L` parameter selects a
/// [`crate::logger::Logger`] — not a method on [`CoroutineBody`] itself,
/// since the body is erased into the frame arena the instant
/// [`Task::init`] runs and isn't reachable again from [`TaskBase`].
pub trait TaskPolicy<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    /// See [`TaskBase::missed_deadline`]'s default.
    fn missed_deadline(_overrun: Duration<U, MAX, NUM, DEN>) -> bool {
        true
    }

    /// See [`TaskBase::next_schedule`]'s default.
    fn next_schedule(
        prev: Schedule<U, MAX, NUM, DEN>,
        exec: ExecutionWindow<U, MAX, NUM, DEN>,
    ) -> Schedule<U, MAX, NUM, DEN> {
        let width = prev.deadline - prev.ready;
        Schedule {
            ready: exec.end,
            deadline: exec.end + width,
        }
    }

    /// How much to subtract from a priority-scheduled task's priority
    /// number after it overran its own window's `deadline` (spec §10.2's
    /// `priority_boost` feature). The default never boosts.
    #[cfg(feature = "priority_boost")]
    fn priority_boost(_overrun: Duration<U, MAX, NUM, DEN>) -> Priority {
        0
    }
}

/// The policy every [`Task`] uses unless constructed with a different `P`:
/// always report a missed deadline, and preserve the previous window's
/// width when computing the next one.
pub struct DefaultPolicy;

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> TaskPolicy<U, MAX, NUM, DEN>
    for DefaultPolicy
{
}

/// The object-safe interface [`crate::scheduler::Scheduler`] uses to
/// operate on a task without knowing its concrete coroutine body type
/// (spec §3.1's `TaskBase`/`Task` split).
pub trait TaskBase<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    /// The task's scheduling metadata.
    fn control(&self) -> &TaskControl<U, MAX, NUM, DEN>;

    /// Resumes the task's leaf coroutine chain for one step, recording
    /// `now` as this resume's start time.
    ///
    /// Returns `Some(exit)` once the root coroutine has completed
    /// (normally or via an internal fault); `None` means the task
    /// suspended again and [`TaskControl::signal`] describes why.
    fn resume(&self, now: TimePoint<U, MAX, NUM, DEN>) -> Option<Exit>;

    /// Whether exceeding `deadline` by this task's most recent execution
    /// window should count as a missed deadline. The default is "always" —
    /// a task can override this to tolerate occasional overruns.
    fn missed_deadline(&self, _overrun: Duration<U, MAX, NUM, DEN>) -> bool {
        true
    }

    /// Computes the next `{ready, deadline}` window after a `NextCycle` or
    /// `ImplicitDelay` signal, given the previous window and this resume's
    /// execution window. The default preserves the previous window's width,
    /// anchored at `exec.end` — spec §4.6's `ImplicitDelay` dispatch
    /// reaction.
    fn next_schedule(
        &self,
        prev: Schedule<U, MAX, NUM, DEN>,
        exec: ExecutionWindow<U, MAX, NUM, DEN>,
    ) -> Schedule<U, MAX, NUM, DEN> {
        let width = prev.deadline - prev.ready;
        Schedule {
            ready: exec.end,
            deadline: exec.end + width,
        }
    }

    /// See [`TaskPolicy::priority_boost`].
    #[cfg(feature = "priority_boost")]
    fn priority_boost(&self, _overrun: Duration<U, MAX, NUM, DEN>) -> Priority {
        0
    }
}

/// A task: a coroutine body, its own frame arena, and the scheduling
/// metadata [`TaskBase`] exposes.
///
/// Must be constructed with [`Task::new`] and then [`Task::init`]ed exactly
/// once, in its final resting place (a `static`, or a stack frame that
/// outlives the scheduler's use of it) — [`Task::init`] arena-allocates the
/// root coroutine's frame, and that allocation's address is only valid for
/// as long as `self.allocator` doesn't move.
pub struct Task<
    Body,
    const N: usize,
    U: TickRep,
    const MAX: u128,
    const NUM: u64,
    const DEN: u64,
    P = DefaultPolicy,
> where
    Body: CoroutineBody<U, MAX, NUM, DEN>,
    P: TaskPolicy<U, MAX, NUM, DEN>,
{
    control: TaskControl<U, MAX, NUM, DEN>,
    allocator: StackAllocator<N>,
    root: Cell<Option<ErasedCoroutine<U, MAX, NUM, DEN>>>,
    _policy: core::marker::PhantomData<fn() -> P>,
}

impl<Body, const N: usize, U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64, P>
    Task<Body, N, U, MAX, NUM, DEN, P>
where
    Body: CoroutineBody<U, MAX, NUM, DEN>,
    P: TaskPolicy<U, MAX, NUM, DEN>,
{
    const fn new(
        name: &'static str,
        priority: Priority,
        schedule: Schedule<U, MAX, NUM, DEN>,
        immediately_ready: bool,
    ) -> Self {
        Self {
            control: TaskControl::new(name, priority, schedule, immediately_ready),
            allocator: StackAllocator::new(),
            root: Cell::new(None),
            _policy: core::marker::PhantomData,
        }
    }

    /// A priority-only task, ready from the moment it's constructed (spec
    /// §4.5's "priority-only" constructor: `immediately_ready = true`,
    /// bypassing the ready-time check on first admission).
    pub const fn with_priority(name: &'static str, priority: Priority) -> Self {
        Self::new(
            name,
            priority,
            Schedule {
                ready: TimePoint::ZERO,
                deadline: TimePoint::ZERO,
            },
            true,
        )
    }

    /// A priority-only task that doesn't become eligible until `ready` (spec
    /// §4.5's "priority + ready time" constructor: `immediately_ready =
    /// false`).
    pub const fn with_priority_and_ready(
        name: &'static str,
        priority: Priority,
        ready: TimePoint<U, MAX, NUM, DEN>,
    ) -> Self {
        Self::new(name, priority, Schedule { ready, deadline: ready }, false)
    }

    /// A deadline-based task: always dispatched ahead of every
    /// priority-only task, ordered against other deadline-based tasks by
    /// `deadline` (spec §8.3's S6).
    pub const fn with_deadline(
        name: &'static str,
        ready: TimePoint<U, MAX, NUM, DEN>,
        deadline: TimePoint<U, MAX, NUM, DEN>,
    ) -> Self {
        Self::new(name, PRIORITY_MAX, Schedule { ready, deadline }, false)
    }

    /// A deadline-based task expressed relative to `now`.
    pub fn with_deadline_relative(
        name: &'static str,
        now: TimePoint<U, MAX, NUM, DEN>,
        ready_in: Duration<U, MAX, NUM, DEN>,
        deadline_in: Duration<U, MAX, NUM, DEN>,
    ) -> Self {
        Self::with_deadline(name, now + ready_in, now + deadline_in)
    }

    /// Arena-allocates `body` as the root coroutine frame. Must be called
    /// exactly once, after `self` has reached its final address.
    pub fn init(&self, body: Body) {
        let _scope = FrameAllocatorScope::enter(&self.allocator);
        self.root.set(Some(ErasedCoroutine::spawn(body)));
    }

    /// The task's own frame arena, for diagnostics (spec §8.3's S4 checks
    /// `allocated_size()` directly).
    pub fn allocator(&self) -> &StackAllocator<N> {
        &self.allocator
    }
}

impl<Body, const N: usize, U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64, P>
    TaskBase<U, MAX, NUM, DEN> for Task<Body, N, U, MAX, NUM, DEN, P>
where
    Body: CoroutineBody<U, MAX, NUM, DEN>,
    P: TaskPolicy<U, MAX, NUM, DEN>,
{
    fn control(&self) -> &TaskControl<U, MAX, NUM, DEN> {
        &self.control
    }

    fn resume(&self, now: TimePoint<U, MAX, NUM, DEN>) -> Option<Exit> {
        let _scope = FrameAllocatorScope::enter(&self.allocator);
        self.control.set_execution(ExecutionWindow { start: now, end: now });
        self.control.take_signal();
        self.control.set_leaf_hook(None);

        let root = self
            .root
            .get()
            .expect("Task::resume called before init() or after completion");

        let mut cx = CoCx::new(&self.control);
        let mut out = MaybeUninit::<Body::Output>::uninit();
        let out_ptr: *mut () = out.as_mut_ptr().cast();

        // Safety: `out_ptr` is sized/aligned for `Body::Output`, the type
        // `root` was built with in `Task::init`. Under `std`, a panicking
        // `resume` is caught rather than left to unwind past the task
        // boundary (spec §4.4's failure semantics); without it, a fault
        // propagates to the host's own panic handler, per spec §9's
        // "exceptions as policy, not mechanism".
        #[cfg(feature = "std")]
        let resumed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unsafe {
            root.resume_into(&mut cx, out_ptr)
        }));
        #[cfg(not(feature = "std"))]
        let resumed: Result<bool, ()> = Ok(unsafe { root.resume_into(&mut cx, out_ptr) });

        match resumed {
            Ok(true) => {
                // Safety: `resume_into` returned `true`, so `out` was written.
                unsafe { out.assume_init_drop() };
                root.destroy();
                self.root.set(None);
                Some(Exit::Completed)
            }
            Ok(false) => None,
            Err(_payload) => {
                // Tears down leaf -> parent -> ... -> root: `root.destroy()`
                // drops the body in place, and every still-live `ChildHandle`
                // nested inside it frees its own frame the same way on drop,
                // innermost first, which is exactly the LIFO order the
                // frame arena requires (spec §4.4 step 1).
                root.destroy();
                self.root.set(None);
                Some(Exit::Failed)
            }
        }
    }

    fn missed_deadline(&self, overrun: Duration<U, MAX, NUM, DEN>) -> bool {
        P::missed_deadline(overrun)
    }

    fn next_schedule(
        &self,
        prev: Schedule<U, MAX, NUM, DEN>,
        exec: ExecutionWindow<U, MAX, NUM, DEN>,
    ) -> Schedule<U, MAX, NUM, DEN> {
        P::next_schedule(prev, exec)
    }

    #[cfg(feature = "priority_boost")]
    fn priority_boost(&self, overrun: Duration<U, MAX, NUM, DEN>) -> Priority {
        P::priority_boost(overrun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::CoPoll;

    type U = u32;
    const MAXT: u128 = u32::MAX as u128;
    const NUM: u64 = 1;
    const DEN: u64 = 1_000;

    struct Once;
    impl CoroutineBody<U, MAXT, NUM, DEN> for Once {
        type Output = u32;
        fn resume(&mut self, _cx: &mut CoCx<'_, U, MAXT, NUM, DEN>) -> CoPoll<u32> {
            CoPoll::Done(7)
        }
    }

    #[test]
    fn root_frame_allocated_on_init_and_freed_on_completion() {
        let task: Task<Once, 64, U, MAXT, NUM, DEN> = Task::with_priority("once", 1);
        assert_eq!(task.allocator().allocated_size(), 0);
        task.init(Once);
        assert!(task.allocator().allocated_size() > 0);

        let exit = task.resume(TimePoint::ZERO);
        assert_eq!(exit, Some(Exit::Completed));
        assert_eq!(task.allocator().allocated_size(), 0);
    }

    #[cfg(feature = "std")]
    struct Panics;
    #[cfg(feature = "std")]
    impl CoroutineBody<U, MAXT, NUM, DEN> for Panics {
        type Output = u32;
        fn resume(&mut self, _cx: &mut CoCx<'_, U, MAXT, NUM, DEN>) -> CoPoll<u32> {
            panic!("boom")
        }
    }

    /// Spec §4.4's failure semantics: a panicking coroutine is caught at
    /// the task boundary, reported as `Exit::Failed`, and its frame arena
    /// ends up fully unwound rather than leaked.
    #[cfg(feature = "std")]
    #[test]
    fn panicking_coroutine_exits_failed_and_frees_its_frame() {
        let task: Task<Panics, 64, U, MAXT, NUM, DEN> = Task::with_priority("boom", 1);
        task.init(Panics);
        assert!(task.allocator().allocated_size() > 0);

        let exit = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| task.resume(TimePoint::ZERO)))
            .expect("Task::resume itself must not unwind past its own boundary");
        assert_eq!(exit, Some(Exit::Failed));
        assert_eq!(task.allocator().allocated_size(), 0);
    }

    #[test]
    fn deadline_sentinel_marks_deadline_based_tasks() {
        let t: Task<Once, 64, U, MAXT, NUM, DEN> =
            Task::with_deadline("rt", TimePoint::ZERO, TimePoint::ZERO);
        assert!(t.control().is_deadline_based());
        let p: Task<Once, 64, U, MAXT, NUM, DEN> = Task::with_priority("bg", 5);
        assert!(!p.control().is_deadline_based());
    }
}
