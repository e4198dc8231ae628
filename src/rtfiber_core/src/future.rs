//! A single-producer single-consumer value channel (spec §3.3, §4.3).
//!
//! Spec §3.3 describes `Future`/`Promise` as a pair of endpoints that each
//! hold a raw back-pointer to the other, re-pointed on every move. That
//! topology exists in the source because the channel's storage lives
//! inside whichever of the two endpoints was constructed first, with no
//! third object anywhere. In Rust, letting two objects each hold a raw,
//! patched-on-move pointer to each other is exactly the kind of aliasing
//! Rust exists to rule out, and spec §9's own open question flags this
//! path as underspecified in the source besides. This crate uses a single
//! shared [`Channel`] that both endpoints borrow instead: moving a
//! [`Future`] or [`Promise`] is then an ordinary Rust move of a borrow,
//! which needs no back-pointer patching at all, and the "detached"
//! observation spec §3.3 calls for falls out of each endpoint's own
//! `Option<&Channel<T>>` going to `None` once it has nothing further to do.
use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

use crate::awaitable::Awaitable;

#[cfg(not(feature = "single_core"))]
use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "single_core")]
use crate::hooks::InterruptGuard;

/// The three (plus one, internal-only) states a [`Channel`] passes through
/// (spec §3.3's state machine).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChannelState {
    /// Both endpoints are live; no value has been set yet.
    Busy,
    /// The promise delivered a value; the future may read it once.
    HasValue,
    /// The promise was dropped before delivering a value.
    BrokenPromise,
    /// The future already read the one value it's entitled to. Not a
    /// spec-named state — folded into "detached" at the API surface,
    /// kept distinct internally so a second read is caught rather than
    /// silently returning stale bytes.
    Taken,
}

/// The shared storage behind a [`Future`]/[`Promise`] pair.
///
/// Constructed once, then [`split`](Channel::split) into the two
/// endpoints that borrow it for as long as either is alive.
pub struct Channel<T> {
    state: UnsafeCell<ChannelState>,
    value: UnsafeCell<MaybeUninit<T>>,
    #[cfg(not(feature = "single_core"))]
    future_lock: AtomicBool,
    #[cfg(not(feature = "single_core"))]
    promise_lock: AtomicBool,
}

// Safety: every access to `state`/`value` goes through `enter_as_future`/
// `enter_as_promise`, which establish mutual exclusion either via a single
// interrupt-disable critical section (`single_core`) or the dual-lock
// protocol below. `T: Send` is all that's required to move a value from
// the promise's context to the future's.
unsafe impl<T: Send> Sync for Channel<T> {}

impl<T> Channel<T> {
    /// An empty, `Busy` channel.
    pub const fn new() -> Self {
        Self {
            state: UnsafeCell::new(ChannelState::Busy),
            value: UnsafeCell::new(MaybeUninit::uninit()),
            #[cfg(not(feature = "single_core"))]
            future_lock: AtomicBool::new(false),
            #[cfg(not(feature = "single_core"))]
            promise_lock: AtomicBool::new(false),
        }
    }

    /// Splits the channel into its two endpoints. Call this exactly once
    /// per `Channel`; calling it again would hand out a second live
    /// `Future`/`Promise` over state that's no longer `Busy` from their
    /// point of view.
    pub fn split(&self) -> (Future<'_, T>, Promise<'_, T>) {
        (Future { channel: Some(self) }, Promise { channel: Some(self) })
    }

    #[cfg(feature = "single_core")]
    #[inline]
    fn enter(&self) -> InterruptGuard {
        InterruptGuard::acquire()
    }

    #[cfg(not(feature = "single_core"))]
    #[inline]
    fn enter_as_future(&self) -> DualLockGuard<'_, T> {
        // Forced spin: the future holds the weaker invariant (it's purely
        // a reader), so it's allowed to simply wait for both locks.
        while self.future_lock.swap(true, Ordering::Acquire) {
            core::hint::spin_loop();
        }
        while self.promise_lock.swap(true, Ordering::Acquire) {
            core::hint::spin_loop();
        }
        DualLockGuard { channel: self }
    }

    #[cfg(not(feature = "single_core"))]
    #[inline]
    fn enter_as_promise(&self) -> DualLockGuard<'_, T> {
        // Fair retry: back off and retry instead of force-spinning on the
        // peer lock, which is what prevents the two sides from livelocking
        // against each other while both try to acquire both locks.
        loop {
            while self.promise_lock.swap(true, Ordering::Acquire) {
                core::hint::spin_loop();
            }
            if !self.future_lock.swap(true, Ordering::Acquire) {
                return DualLockGuard { channel: self };
            }
            self.promise_lock.store(false, Ordering::Release);
            core::hint::spin_loop();
        }
    }

    #[inline]
    fn state(&self) -> ChannelState {
        // Safety: called only while holding the channel's critical section.
        unsafe { *self.state.get() }
    }

    #[inline]
    fn set_state(&self, s: ChannelState) {
        // Safety: called only while holding the channel's critical section.
        unsafe { *self.state.get() = s };
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(feature = "single_core"))]
struct DualLockGuard<'a, T> {
    channel: &'a Channel<T>,
}

#[cfg(not(feature = "single_core"))]
impl<T> Drop for DualLockGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.channel.promise_lock.store(false, Ordering::Release);
        self.channel.future_lock.store(false, Ordering::Release);
    }
}

/// The reading half of a [`Channel`].
pub struct Future<'a, T> {
    channel: Option<&'a Channel<T>>,
}

impl<'a, T> Future<'a, T> {
    /// `true` iff the channel is no longer `Busy` — a value is ready to be
    /// read, or the promise was dropped without setting one.
    pub fn is_ready(&self) -> bool {
        match self.channel {
            None => true,
            Some(c) => {
                #[cfg(feature = "single_core")]
                let _g = c.enter();
                #[cfg(not(feature = "single_core"))]
                let _g = c.enter_as_future();
                c.state() != ChannelState::Busy
            }
        }
    }

    /// Alias for [`Self::is_ready`], matching spec §4.3's await-interface
    /// naming.
    #[inline]
    pub fn await_ready(&self) -> bool {
        self.is_ready()
    }

    /// The channel's current state, for tests/diagnostics (spec §8.3's S3
    /// checks `future.state() == BrokenPromise`).
    pub fn state(&self) -> ChannelState {
        match self.channel {
            None => ChannelState::Taken,
            Some(c) => {
                #[cfg(feature = "single_core")]
                let _g = c.enter();
                #[cfg(not(feature = "single_core"))]
                let _g = c.enter_as_future();
                c.state()
            }
        }
    }

    /// Reads the value if one is ready, detaching this `Future` either way
    /// once the channel has left `Busy`.
    ///
    /// Returns `Some(value)` on `HasValue`, `None` on `BrokenPromise` (spec
    /// §4.3's await-resume contract: "Futures never raise; they return a
    /// variant"). Calling this while still `Busy` returns `None` without
    /// detaching — the caller is expected to have checked [`Self::is_ready`]
    /// first, the same way polling any other awaitable works.
    pub fn await_resume(&mut self) -> Option<T> {
        let channel = self.channel?;
        #[cfg(feature = "single_core")]
        let _g = channel.enter();
        #[cfg(not(feature = "single_core"))]
        let _g = channel.enter_as_future();

        match channel.state() {
            ChannelState::Busy => None,
            ChannelState::BrokenPromise => {
                channel.set_state(ChannelState::Taken);
                self.channel = None;
                None
            }
            ChannelState::HasValue => {
                // Safety: `HasValue` is only reachable after `Promise::set_value`
                // initialized `value`, and this is the one read `HasValue`
                // permits before transitioning to `Taken`.
                let value = unsafe { channel.value.get().read().assume_init() };
                channel.set_state(ChannelState::Taken);
                self.channel = None;
                Some(value)
            }
            ChannelState::Taken => None,
        }
    }
}

impl<T> Awaitable for Future<'_, T> {
    fn is_ready(&self) -> bool {
        Future::is_ready(self)
    }
}

/// The writing half of a [`Channel`].
pub struct Promise<'a, T> {
    channel: Option<&'a Channel<T>>,
}

impl<'a, T> Promise<'a, T> {
    /// Delivers `value`, transitioning the channel to `HasValue`.
    ///
    /// # Panics
    ///
    /// Panics if this promise already set a value, or was already dropped
    /// (the caller is holding a stale handle) — spec §4.3: "Double
    /// `set_value` is a caller error and fails loudly."
    pub fn set_value(&mut self, value: T) {
        let channel = self
            .channel
            .expect("Promise::set_value called on a detached promise");
        #[cfg(feature = "single_core")]
        let _g = channel.enter();
        #[cfg(not(feature = "single_core"))]
        let _g = channel.enter_as_promise();

        assert!(
            channel.state() == ChannelState::Busy,
            "Promise::set_value called twice"
        );
        // Safety: the channel is `Busy`, so `value` is still uninitialized
        // and exclusively ours to write under the critical section.
        unsafe { (*channel.value.get()).write(value) };
        channel.set_state(ChannelState::HasValue);
        // `self.channel` stays attached (rather than being cleared here) so
        // a second `set_value` call on the same handle still reaches the
        // `Busy` check above instead of the detached-handle message; `Drop`
        // is what actually detaches, and it's a no-op once the state has
        // left `Busy`.
    }

    /// Whether this handle hasn't yet set a value and the channel hasn't
    /// otherwise left `Busy`. Mirrors the future-side [`Future::is_ready`]
    /// query for symmetry.
    pub fn is_future_live(&self) -> bool {
        match self.channel {
            None => false,
            Some(c) => {
                #[cfg(feature = "single_core")]
                let _g = c.enter();
                #[cfg(not(feature = "single_core"))]
                let _g = c.enter_as_promise();
                c.state() == ChannelState::Busy
            }
        }
    }
}

impl<T> Drop for Promise<'_, T> {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            #[cfg(feature = "single_core")]
            let _g = channel.enter();
            #[cfg(not(feature = "single_core"))]
            let _g = channel.enter_as_promise();

            if channel.state() == ChannelState::Busy {
                channel.set_state(ChannelState::BrokenPromise);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s2_future_promise_happy_path() {
        let chan = Channel::<u32>::new();
        let (mut future, mut promise) = chan.split();
        assert!(!future.is_ready());
        promise.set_value(42);
        assert!(future.await_ready());
        assert_eq!(future.await_resume(), Some(42));
    }

    #[test]
    fn s3_broken_promise() {
        let chan = Channel::<u32>::new();
        let (mut future, promise) = chan.split();
        drop(promise);
        assert_eq!(future.state(), ChannelState::BrokenPromise);
        assert_eq!(future.await_resume(), None);
    }

    #[test]
    #[should_panic(expected = "twice")]
    fn double_set_value_panics() {
        let chan = Channel::<u32>::new();
        let (_future, mut promise) = chan.split();
        promise.set_value(1);
        promise.set_value(2);
    }

    #[test]
    fn read_after_detach_is_none() {
        let chan = Channel::<u32>::new();
        let (mut future, mut promise) = chan.split();
        promise.set_value(7);
        assert_eq!(future.await_resume(), Some(7));
        assert_eq!(future.await_resume(), None);
    }

    #[test]
    fn not_yet_ready_resume_returns_none_without_detaching() {
        let chan = Channel::<u32>::new();
        let (mut future, mut promise) = chan.split();
        assert_eq!(future.await_resume(), None);
        assert!(!future.is_ready());
        promise.set_value(9);
        assert_eq!(future.await_resume(), Some(9));
    }
}
