//! The logger contract (spec §11.1): a small set of scheduler-lifecycle
//! events a host can observe without the scheduler itself depending on any
//! particular sink.
//!
//! Modeled the way the rest of this runtime models its other host hooks —
//! a trait with object-unsafe-free, infallible methods and a no-op default
//! implementation — rather than pulling `log`'s string-formatting machinery
//! into the hot dispatch path by default. A host that already links `log`
//! can opt into [`LogFacadeLogger`] via the `log_bridge` feature instead of
//! writing its own.
use core::cell::RefCell;
use core::fmt;

use rtfiber_core::time::TickRep;

use crate::task::TaskId;

/// Scheduler lifecycle events a [`Logger`] is notified of.
///
/// Every method takes `&self` (not `&mut self`): a logger is typically a
/// zero-sized marker type or a thin wrapper over a lock-free sink, since it
/// may be invoked from inside the scheduler's dispatch loop.
pub trait Logger<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    /// A task was admitted to the scheduler and assigned `id`.
    fn task_admitted(&self, id: TaskId, name: &str) {
        let _ = (id, name);
    }

    /// `id` was promoted from the waiting queue to the running queue.
    fn task_promoted(&self, id: TaskId) {
        let _ = id;
    }

    /// `id` was dispatched (its `resume` was called).
    fn task_dispatched(&self, id: TaskId) {
        let _ = id;
    }

    /// `id` exceeded its deadline by `overrun` ticks and
    /// [`crate::task::TaskBase::missed_deadline`] said this should be
    /// reported.
    fn deadline_missed(&self, id: TaskId, overrun_ticks: u128) {
        let _ = (id, overrun_ticks);
    }

    /// `id`'s root coroutine finished, successfully or otherwise.
    fn task_exited(&self, id: TaskId, exit: crate::error::Exit) {
        let _ = (id, exit);
    }
}

/// A [`Logger`] that discards every event — the default for a build that
/// doesn't care to observe scheduler internals.
#[derive(Clone, Copy, Default)]
pub struct NullLogger;

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> Logger<U, MAX, NUM, DEN>
    for NullLogger
{
}

/// Bridges [`Logger`] onto the [`log`] facade, gated behind the
/// `log_bridge` feature. Useful when developing against a host build that
/// already initializes a `log` backend (`env_logger` in this crate's own
/// tests, for instance).
#[cfg(feature = "log_bridge")]
#[derive(Clone, Copy, Default)]
pub struct LogFacadeLogger;

#[cfg(feature = "log_bridge")]
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> Logger<U, MAX, NUM, DEN>
    for LogFacadeLogger
{
    fn task_admitted(&self, id: TaskId, name: &str) {
        log::debug!("task {id} ({name}) admitted");
    }

    fn task_promoted(&self, id: TaskId) {
        log::trace!("task {id} promoted to running");
    }

    fn task_dispatched(&self, id: TaskId) {
        log::trace!("task {id} dispatched");
    }

    fn deadline_missed(&self, id: TaskId, overrun_ticks: u128) {
        log::warn!("task {id} missed its deadline by {overrun_ticks} ticks");
    }

    fn task_exited(&self, id: TaskId, exit: crate::error::Exit) {
        log::debug!("task {id} exited: {exit}");
    }
}

/// Writes one formatted line per event through a `W: core::fmt::Write`
/// sink (spec §6.2: "the output logger writes a formatted line per
/// event"). Matches the rest of this runtime's preference for `core::fmt`
/// directly over pulling in a formatting crate for `no_std` output, the
/// way the teacher's own UART/RTT loggers under its `*_support_*` and
/// `*_test_driver` crates write straight through a `fmt::Write` impl
/// rather than a logging framework.
///
/// A write error from `sink` is discarded rather than propagated — a
/// logger has nowhere to report its own failure to, the same way the
/// teacher's own trace writers treat a full UART FIFO as best-effort.
pub struct OutputLogger<W, C = ()> {
    sink: RefCell<W>,
    _clock: core::marker::PhantomData<fn() -> C>,
}

impl<W: fmt::Write> OutputLogger<W, ()> {
    /// A logger with no host-time annotation.
    pub fn new(sink: W) -> Self {
        Self {
            sink: RefCell::new(sink),
            _clock: core::marker::PhantomData,
        }
    }
}

#[cfg(feature = "system_time")]
impl<W: fmt::Write, C: rtfiber_core::hooks::Clock> OutputLogger<W, C>
where
    C::Instant: fmt::Debug,
{
    /// A logger that additionally renders `C::now()` next to every
    /// tick-based timestamp (spec §10.2's `system_time` feature) —
    /// meaningful only when `C`'s clock is itself wall-clock-derived.
    pub fn with_clock(sink: W) -> Self {
        Self {
            sink: RefCell::new(sink),
            _clock: core::marker::PhantomData,
        }
    }
}

impl<W: fmt::Write, U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64>
    Logger<U, MAX, NUM, DEN> for OutputLogger<W, ()>
{
    fn task_admitted(&self, id: TaskId, name: &str) {
        let _ = writeln!(*self.sink.borrow_mut(), "[admit] task {id} ({name})");
    }
    fn task_promoted(&self, id: TaskId) {
        let _ = writeln!(*self.sink.borrow_mut(), "[promote] task {id} -> running");
    }
    fn task_dispatched(&self, id: TaskId) {
        let _ = writeln!(*self.sink.borrow_mut(), "[dispatch] task {id}");
    }
    fn deadline_missed(&self, id: TaskId, overrun_ticks: u128) {
        let _ = writeln!(
            *self.sink.borrow_mut(),
            "[deadline] task {id} overran by {overrun_ticks} ticks"
        );
    }
    fn task_exited(&self, id: TaskId, exit: crate::error::Exit) {
        let _ = writeln!(*self.sink.borrow_mut(), "[exit] task {id}: {exit}");
    }
}

#[cfg(feature = "system_time")]
impl<
        W: fmt::Write,
        C: rtfiber_core::hooks::Clock,
        U: TickRep,
        const MAX: u128,
        const NUM: u64,
        const DEN: u64,
    > Logger<U, MAX, NUM, DEN> for OutputLogger<W, C>
where
    C::Instant: fmt::Debug,
{
    fn task_admitted(&self, id: TaskId, name: &str) {
        let _ = writeln!(
            *self.sink.borrow_mut(),
            "[admit] task {id} ({name}) @ {:?}",
            C::now()
        );
    }
    fn task_promoted(&self, id: TaskId) {
        let _ = writeln!(
            *self.sink.borrow_mut(),
            "[promote] task {id} -> running @ {:?}",
            C::now()
        );
    }
    fn task_dispatched(&self, id: TaskId) {
        let _ = writeln!(*self.sink.borrow_mut(), "[dispatch] task {id} @ {:?}", C::now());
    }
    fn deadline_missed(&self, id: TaskId, overrun_ticks: u128) {
        let _ = writeln!(
            *self.sink.borrow_mut(),
            "[deadline] task {id} overran by {overrun_ticks} ticks @ {:?}",
            C::now()
        );
    }
    fn task_exited(&self, id: TaskId, exit: crate::error::Exit) {
        let _ = writeln!(
            *self.sink.borrow_mut(),
            "[exit] task {id}: {exit} @ {:?}",
            C::now()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recording {
        admitted: core::cell::Cell<u32>,
    }

    impl Logger<u32, { u32::MAX as u128 }, 1, 1000> for Recording {
        fn task_admitted(&self, _id: TaskId, _name: &str) {
            self.admitted.set(self.admitted.get() + 1);
        }
    }

    #[test]
    fn default_methods_are_inert() {
        let logger = NullLogger;
        Logger::<u32, { u32::MAX as u128 }, 1, 1000>::task_admitted(&logger, 1, "t");
        Logger::<u32, { u32::MAX as u128 }, 1, 1000>::deadline_missed(&logger, 1, 5);
    }

    #[test]
    fn override_is_observed() {
        let logger = Recording {
            admitted: core::cell::Cell::new(0),
        };
        logger.task_admitted(1, "t");
        logger.task_admitted(2, "u");
        assert_eq!(logger.admitted.get(), 2);
    }

    #[test]
    fn output_logger_writes_one_line_per_event() {
        let logger: OutputLogger<std::string::String> = OutputLogger::new(std::string::String::new());
        Logger::<u32, { u32::MAX as u128 }, 1, 1000>::task_admitted(&logger, 3, "pump");
        Logger::<u32, { u32::MAX as u128 }, 1, 1000>::task_exited(&logger, 3, crate::error::Exit::Completed);
        let lines = logger.sink.borrow();
        assert!(lines.contains("task 3 (pump)"));
        assert!(lines.contains("task 3: completed"));
    }
}
