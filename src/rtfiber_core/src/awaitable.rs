//! The minimal protocol any value type needs to satisfy to be awaited from
//! inside a coroutine (spec §4.4's "generic awaitables").
//!
//! Deliberately not an inheritance contract: spec §9 calls for exactly this
//! — "do not require awaitables to implement an inheritance contract".
//! `rtfiber_kernel`'s coroutine adapter stores an `Awaitable` behind a type-
//! erased `(obj_ptr, is_ready_fn)` pair (spec §3.5) rather than a trait
//! object, so the trait itself only needs one method.
pub trait Awaitable {
    /// Whether this awaitable has reached a value and the coroutine that
    /// registered it may be resumed.
    fn is_ready(&self) -> bool;
}

use core::ptr::NonNull;

/// A type-erased `(obj_ptr, is_ready_fn)` pair (spec §3.5): what a
/// suspended leaf coroutine registers on its task so the scheduler can
/// poll readiness without knowing the awaitable's concrete type.
///
/// Built from a live `&A` reference, so the pointer inside is valid for as
/// long as the awaitable it was built from is — which for a coroutine's
/// local awaitable is exactly as long as the coroutine's own frame, i.e.
/// until the leaf either completes or is torn down.
#[derive(Clone, Copy)]
pub struct LeafHook {
    obj: NonNull<()>,
    is_ready_fn: unsafe fn(NonNull<()>) -> bool,
}

impl LeafHook {
    /// Captures `obj` behind its `Awaitable::is_ready` vtable slot.
    pub fn new<A: Awaitable>(obj: &A) -> Self {
        unsafe fn is_ready_erased<A: Awaitable>(obj: NonNull<()>) -> bool {
            // Safety: `obj` was produced from a live `&A` by `LeafHook::new`
            // and the hook does not outlive that reference (see the type's
            // doc comment).
            unsafe { (*obj.cast::<A>().as_ptr()).is_ready() }
        }
        Self {
            obj: NonNull::from(obj).cast(),
            is_ready_fn: is_ready_erased::<A>,
        }
    }

    /// Polls the wrapped awaitable's readiness.
    pub fn is_ready(&self) -> bool {
        // Safety: see `LeafHook::new`'s doc comment.
        unsafe { (self.is_ready_fn)(self.obj) }
    }
}
