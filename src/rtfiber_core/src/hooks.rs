//! Host-provided hooks (spec §6.1): the clock, the optional low-power sleep
//! hook, and the DMA-ish `memcpy` helpers that `rtfiber` never requires but
//! exposes so a host can use the same vocabulary everywhere.
use crate::future::Promise;

/// The one hook every host must supply: a monotonic, overflow-wrapping
/// clock.
///
/// `Clock::Instant` is typically a [`crate::time::TimePoint`] instantiated
/// for the host's tick width and RTC frequency. It's an associated type
/// rather than a type parameter threaded through every scheduler method so
/// that a program links against exactly one clock type, chosen once.
pub trait Clock {
    /// The type `now()` returns; usually a
    /// [`crate::time::TimePoint`] instantiation.
    type Instant: Copy + Ord;

    /// The current time.
    fn now() -> Self::Instant;

    /// Optionally parks the host until `deadline`, instead of busy-waiting
    /// through [`Scheduler::spin`](https://docs.rs/rtfiber_kernel).
    ///
    /// The default does nothing: the scheduler's dispatch loop simply spins
    /// until the deadline passes, matching spec §4.6's "default is a no-op
    /// (busy-wait through spin)".
    #[inline]
    fn sleep_until(_deadline: Self::Instant) {}
}

/// A nesting-safe interrupt-disable/enable bracket (spec §5's "Interrupt-safe
/// critical sections": "increment counter; disable on 0→1 transition;
/// symmetric on the way down").
///
/// Built on the [`critical-section`](critical_section) crate rather than a
/// hand-rolled disable/enable pair: it's the ecosystem's standard `no_std`
/// abstraction over "disable interrupts on this target", already nesting-safe
/// and already has backends for Cortex-M, AVR, RISC-V, and a host-process
/// stand-in for tests, so there's no reason to reimplement it here. A host
/// selects a backend with `critical_section::set_impl!` in its own crate;
/// `rtfiber_core` only ever calls [`critical_section::acquire`] and
/// [`critical_section::release`].
pub struct InterruptGuard {
    state: critical_section::RestoreState,
}

impl InterruptGuard {
    /// Disables interrupts (or, if already inside a critical section,
    /// leaves them disabled and records the restore point for this nested
    /// entry).
    #[inline]
    pub fn acquire() -> Self {
        // Safety: released exactly once, by `Drop`, in the reverse order
        // guaranteed by holding `self` for the guard's whole lifetime.
        let state = unsafe { critical_section::acquire() };
        Self { state }
    }
}

impl Drop for InterruptGuard {
    #[inline]
    fn drop(&mut self) {
        // Safety: `self.state` came from the matching `acquire` above and
        // hasn't been released yet.
        unsafe { critical_section::release(self.state) }
    }
}

/// Runs `f` with interrupts disabled, matching spec §6.1's
/// `disable_interrupts`/`enable_interrupts` hook pair.
#[inline]
pub fn with_interrupts_disabled<R>(f: impl FnOnce() -> R) -> R {
    let _guard = InterruptGuard::acquire();
    f()
}

/// Copies `src` into `dst`. The default is a synchronous byte copy, as spec
/// §6.1 prescribes; a host with an idle DMA channel may supply a faster
/// implementation.
///
/// # Safety
///
/// `dst` and `src` must be valid for `count` bytes each and must not
/// overlap.
#[inline]
pub unsafe fn memcpy(dst: *mut u8, src: *const u8, count: usize) {
    // Safety: forwarded from the caller's own obligations.
    unsafe { core::ptr::copy_nonoverlapping(src, dst, count) }
}

/// Copies `src` into `dst`, then fulfills `promise` — the default
/// "`async_memcpy`" is just a synchronous `memcpy` followed by
/// `set_value(())`, so that code written against the async interface works
/// unchanged on hosts without a real DMA engine (spec §6.1).
///
/// # Safety
///
/// Same obligations as [`memcpy`].
#[inline]
pub unsafe fn async_memcpy(dst: *mut u8, src: *const u8, count: usize, mut promise: Promise<'_, ()>) {
    // Safety: forwarded from the caller's own obligations.
    unsafe { memcpy(dst, src, count) };
    promise.set_value(());
}
