//! The tagged directive a suspended coroutine hands back to the scheduler
//! (spec §3.4).
use core::fmt;

use crate::time::{Duration, TickRep};
use crate::utils::Init;

/// What a coroutine was doing when it last returned control to the
/// scheduler.
///
/// Raised by an awaitable (`Await`) or by one of the two native scheduling
/// directives (`NextCycle`, `*Delay`), and read-and-cleared by the
/// scheduler once per resume (spec §4.5's resume protocol, step 5).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CoSignal<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    /// The coroutine hasn't suspended at all — either it hasn't run yet, or
    /// its last resume ran to completion without raising anything.
    None,
    /// The leaf coroutine is blocked on an awaitable whose readiness the
    /// scheduler must poll (or whose completion an interrupt observes)
    /// before the task can run again.
    Await,
    /// The coroutine yielded cooperatively and wants to run again as soon
    /// as every other ready task has had a turn; the task's
    /// `next_schedule` hook computes the new `{ready, deadline}`.
    NextCycle,
    /// The coroutine wants to sleep for `_0`, preserving the width of its
    /// current `[ready, deadline)` window (spec §4.6's `ImplicitDelay`
    /// dispatch reaction).
    ImplicitDelay(Duration<U, MAX, NUM, DEN>),
    /// The coroutine wants to sleep until `ready` and be due by `deadline`.
    ExplicitDelay {
        ready: Duration<U, MAX, NUM, DEN>,
        deadline: Duration<U, MAX, NUM, DEN>,
    },
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> CoSignal<U, MAX, NUM, DEN> {
    /// Whether this signal means "blocked on an external awaitable", as
    /// opposed to a native scheduling directive or no signal at all.
    #[inline]
    pub fn is_await(&self) -> bool {
        matches!(self, Self::Await)
    }

    /// Whether the coroutine raised nothing, i.e. its last resume either
    /// ran to completion or hasn't happened yet.
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> Init
    for CoSignal<U, MAX, NUM, DEN>
{
    const INIT: Self = Self::None;
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> fmt::Debug
    for CoSignal<U, MAX, NUM, DEN>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "CoSignal::None"),
            Self::Await => write!(f, "CoSignal::Await"),
            Self::NextCycle => write!(f, "CoSignal::NextCycle"),
            Self::ImplicitDelay(d) => write!(f, "CoSignal::ImplicitDelay({d:?})"),
            Self::ExplicitDelay { ready, deadline } => {
                write!(f, "CoSignal::ExplicitDelay({ready:?}, {deadline:?})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Tick;

    type D = Duration<u32, { u32::MAX as u128 }, 1, 1000>;

    #[test]
    fn default_is_none() {
        let s: CoSignal<u32, { u32::MAX as u128 }, 1, 1000> = CoSignal::INIT;
        assert!(s.is_none());
    }

    #[test]
    fn await_is_recognized() {
        let s: CoSignal<u32, { u32::MAX as u128 }, 1, 1000> = CoSignal::Await;
        assert!(s.is_await());
        assert!(!s.is_none());
    }

    #[test]
    fn implicit_delay_carries_duration() {
        let d = D::from_ticks(Tick::new(42));
        let s = CoSignal::<u32, { u32::MAX as u128 }, 1, 1000>::ImplicitDelay(d);
        match s {
            CoSignal::ImplicitDelay(got) => assert_eq!(got, d),
            _ => panic!("expected ImplicitDelay"),
        }
    }
}
