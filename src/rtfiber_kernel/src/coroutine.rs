//! The coroutine engine (spec §3.5, §4.4, §9's design note).
//!
//! There's no stable generator syntax to lower onto, so a "coroutine" here
//! is a hand-written state machine: a type implementing [`CoroutineBody`]
//! whose `resume` method matches on its own internal state field and
//! returns [`CoPoll::Pending`] each time it has nothing further to do this
//! tick. That's the same desugaring `async fn` performs automatically;
//! written by hand, it needs no `Pin` at all, because nothing here is
//! self-referential across an `.await` point the way a compiler-generated
//! future can be.
//!
//! Nesting is ordinary Rust recursion: a body that wants to run a child
//! coroutine to completion allocates it from the task's frame arena via
//! [`ChildHandle::spawn`], and calls [`ChildHandle::poll`] from its own
//! `resume` on every tick until it reports `Done`. Spec §4.4's "leaf
//! pointer" and "parent back-pointer" bookkeeping falls out of this for
//! free: the leaf is whatever frame the call stack is currently inside,
//! and returning from a completed child's frame *is* "the parent becomes
//! the new leaf". The frame arena is still a real, exercised allocator —
//! every [`ChildHandle::spawn`] reserves bytes from it, and every
//! completion (or teardown) gives them back in LIFO order — it's only the
//! *resumption* bookkeeping the source needed that recursion subsumes.
use core::alloc::Layout;
use core::cell::Cell;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use rtfiber_core::alloc::FrameAllocator;
use rtfiber_core::awaitable::{Awaitable, LeafHook};
use rtfiber_core::signal::CoSignal;
use rtfiber_core::time::TickRep;

use crate::task::TaskControl;

/// What a [`CoroutineBody::resume`] call reports back to its caller.
pub enum CoPoll<T> {
    /// No further progress is possible this tick.
    Pending,
    /// The coroutine ran to completion, producing `T`.
    Done(T),
}

/// A hand-written coroutine state machine — the reimplementation spec §9
/// calls for in place of compiler-generated generator frames.
///
/// Implementors are expected to hold their own `enum` of "where am I"
/// states and match on it in `resume`; see [`crate::coroutine::ChildHandle`]
/// for how a nested coroutine is driven from a parent's own state machine.
pub trait CoroutineBody<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    /// What this coroutine produces once it completes.
    type Output;

    /// Advances the coroutine by one step.
    fn resume(&mut self, cx: &mut CoCx<'_, U, MAX, NUM, DEN>) -> CoPoll<Self::Output>;
}

/// What a coroutine body sees while it's running: a handle onto its
/// owning task's [`TaskControl`], through which it raises signals and
/// registers the awaitable it's blocked on.
pub struct CoCx<'a, U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    control: &'a TaskControl<U, MAX, NUM, DEN>,
}

impl<'a, U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> CoCx<'a, U, MAX, NUM, DEN> {
    pub(crate) fn new(control: &'a TaskControl<U, MAX, NUM, DEN>) -> Self {
        Self { control }
    }

    /// Raises `signal` on the owning task, overwriting whatever was there
    /// (spec §4.5 step 5 reads and clears exactly one signal per resume,
    /// so only the last one raised in a tick is ever observed).
    #[inline]
    pub fn raise(&mut self, signal: CoSignal<U, MAX, NUM, DEN>) {
        self.control.set_signal(signal);
    }

    /// Polls a generic [`Awaitable`]: if it's already ready, resolves
    /// immediately without touching the task's signal; otherwise registers
    /// it as the task's leaf hook and raises [`CoSignal::Await`] (spec
    /// §4.4's "generic awaitables").
    pub fn poll_awaitable<A: Awaitable>(&mut self, obj: &A) -> CoPoll<()> {
        if obj.is_ready() {
            CoPoll::Done(())
        } else {
            self.control.set_leaf_hook(Some(LeafHook::new(obj)));
            self.raise(CoSignal::Await);
            CoPoll::Pending
        }
    }

    /// Polls an [`rtfiber_core::future::Future`], returning its resolved
    /// value (or `None` for a broken promise) once ready.
    pub fn poll_future<T>(
        &mut self,
        future: &mut rtfiber_core::future::Future<'_, T>,
    ) -> CoPoll<Option<T>> {
        if future.is_ready() {
            CoPoll::Done(future.await_resume())
        } else {
            self.control.set_leaf_hook(Some(LeafHook::new(future)));
            self.raise(CoSignal::Await);
            CoPoll::Pending
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) struct ErasedCoroutine<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    data: NonNull<()>,
    layout: Layout,
    // Resumes the body at `data`; on completion, writes its `Output` into
    // `out` (uninitialized storage of the right size/align, supplied by
    // the statically-typed caller) and returns `true`.
    resume_fn: unsafe fn(NonNull<()>, &mut CoCx<'_, U, MAX, NUM, DEN>, out: *mut ()) -> bool,
    destroy_fn: unsafe fn(NonNull<()>),
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> ErasedCoroutine<U, MAX, NUM, DEN> {
    pub(crate) fn spawn<B>(body: B) -> Self
    where
        B: CoroutineBody<U, MAX, NUM, DEN>,
    {
        let layout = Layout::new::<B>();
        let allocator = current_frame_allocator();
        // Safety: `allocator` is the enclosing task's own arena for the
        // whole duration of its `resume` call, which is the only place
        // this function runs (see `FrameAllocatorScope`).
        let ptr = unsafe { allocator.as_ref() }.allocate(layout.size(), layout.align());
        // Safety: `ptr` is freshly allocated, sized and aligned for `B`.
        unsafe { ptr.cast::<B>().as_ptr().write(body) };

        unsafe fn resume_erased<
            U: TickRep,
            const MAX: u128,
            const NUM: u64,
            const DEN: u64,
            B: CoroutineBody<U, MAX, NUM, DEN>,
        >(
            data: NonNull<()>,
            cx: &mut CoCx<'_, U, MAX, NUM, DEN>,
            out: *mut (),
        ) -> bool {
            // Safety: `data` was produced by `spawn::<B>` above and is
            // live until `destroy_erased::<B>` runs.
            let body = unsafe { &mut *data.cast::<B>().as_ptr() };
            match body.resume(cx) {
                CoPoll::Pending => false,
                CoPoll::Done(value) => {
                    // Safety: `out` was supplied by `ChildHandle::poll`,
                    // sized for `B::Output`.
                    unsafe { out.cast::<B::Output>().write(value) };
                    true
                }
            }
        }

        unsafe fn destroy_erased<B>(data: NonNull<()>) {
            // Safety: `data` is a live, initialized `B` not yet destroyed.
            unsafe { core::ptr::drop_in_place(data.cast::<B>().as_ptr()) };
        }

        Self {
            data: ptr,
            layout,
            resume_fn: resume_erased::<U, MAX, NUM, DEN, B>,
            destroy_fn: destroy_erased::<B>,
        }
    }

    /// Resumes the wrapped body. On completion, writes its output into
    /// `out` (which must be valid for the monomorphized `Output` type this
    /// node was built with) and returns `true`.
    pub(crate) unsafe fn resume_into(
        &self,
        cx: &mut CoCx<'_, U, MAX, NUM, DEN>,
        out: *mut (),
    ) -> bool {
        // Safety: forwarded from this function's own obligations.
        unsafe { (self.resume_fn)(self.data, cx, out) }
    }

    /// Drops the body in place and returns its frame to the current
    /// frame allocator. Must only be called while a [`FrameAllocatorScope`]
    /// for the owning task is active, and only on the topmost still-live
    /// frame (the LIFO invariant spec §4.2 requires).
    pub(crate) fn destroy(self) {
        // Safety: forwarded from `Self::destroy`'s own doc obligations.
        unsafe { (self.destroy_fn)(self.data) };
        let allocator = current_frame_allocator();
        // Safety: see above.
        unsafe { allocator.as_ref() }.deallocate(self.data, self.layout.size());
    }
}

/// A nested coroutine spawned from inside another's `resume` method (spec
/// §4.4's nesting protocol).
///
/// Stored as a field of the parent's own state enum — polling it from the
/// matching `resume` arm on every tick is how the parent "awaits" it.
pub struct ChildHandle<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64, R> {
    node: Option<ErasedCoroutine<U, MAX, NUM, DEN>>,
    _output: core::marker::PhantomData<R>,
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64, R> ChildHandle<U, MAX, NUM, DEN, R> {
    /// Allocates `body` from the task's frame arena and begins tracking it.
    ///
    /// Must be called from inside a [`CoroutineBody::resume`] — i.e. while
    /// the owning task's [`FrameAllocatorScope`] is active.
    pub fn spawn<B>(body: B) -> Self
    where
        B: CoroutineBody<U, MAX, NUM, DEN, Output = R>,
    {
        Self {
            node: Some(ErasedCoroutine::spawn(body)),
            _output: core::marker::PhantomData,
        }
    }

    /// Advances the child by one step. Once it completes, its frame is
    /// destroyed and reclaimed before this call returns.
    ///
    /// # Panics
    ///
    /// Panics if called again after already reporting `Done`.
    pub fn poll(&mut self, cx: &mut CoCx<'_, U, MAX, NUM, DEN>) -> CoPoll<R> {
        let node = self.node.as_mut().expect("ChildHandle polled after completion");
        let mut out = MaybeUninit::<R>::uninit();
        // Safety: `out` is sized and aligned for `R`, which is exactly
        // what `node.resume_fn` was monomorphized to write on completion.
        let done = unsafe { (node.resume_fn)(node.data, cx, out.as_mut_ptr().cast()) };
        if done {
            let node = self.node.take().unwrap();
            node.destroy();
            // Safety: `resume_fn` initialized `out` along the `true` path.
            CoPoll::Done(unsafe { out.assume_init() })
        } else {
            CoPoll::Pending
        }
    }

    /// Whether the child has already completed (and been destroyed).
    pub fn is_done(&self) -> bool {
        self.node.is_none()
    }
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64, R> Drop
    for ChildHandle<U, MAX, NUM, DEN, R>
{
    fn drop(&mut self) {
        if let Some(node) = self.node.take() {
            // A still-live child being dropped means its parent is being
            // torn down without having polled it to completion — the task
            // error-handling path (spec §4.4's "destroys leaf -> parent ->
            // ... -> root") and final task teardown both run inside a
            // `FrameAllocatorScope`, so this is safe there too.
            node.destroy();
        }
    }
}

struct FrameAllocatorCell(Cell<Option<NonNull<dyn FrameAllocator>>>);
// Safety: the runtime is single-threaded; this cell is only ever touched
// from the one thread driving the scheduler.
unsafe impl Sync for FrameAllocatorCell {}

static CURRENT_FRAME_ALLOCATOR: FrameAllocatorCell = FrameAllocatorCell(Cell::new(None));

/// Scopes the process-wide "current frame allocator" pointer to a task's
/// own arena for the duration of one `resume` call (spec §4.4: "the only
/// mutable process-wide state in the runtime").
///
/// Every coroutine (de)allocation inside that call — the root's own
/// teardown, and any [`ChildHandle::spawn`]/completion along the way —
/// reads this pointer rather than having the allocator threaded through
/// every `CoCx` call, mirroring the source's file-scope pointer.
pub struct FrameAllocatorScope {
    previous: Option<NonNull<dyn FrameAllocator>>,
}

impl FrameAllocatorScope {
    /// Points the current-allocator slot at `allocator` for as long as the
    /// returned guard lives, restoring whatever was there before on drop
    /// (nesting-safe, though this runtime never actually nests scopes —
    /// one task's `resume` always runs to completion before another's
    /// begins).
    pub fn enter(allocator: &dyn FrameAllocator) -> Self {
        let previous = CURRENT_FRAME_ALLOCATOR.0.get();
        CURRENT_FRAME_ALLOCATOR.0.set(Some(NonNull::from(allocator)));
        Self { previous }
    }
}

impl Drop for FrameAllocatorScope {
    fn drop(&mut self) {
        CURRENT_FRAME_ALLOCATOR.0.set(self.previous);
    }
}

pub(crate) fn current_frame_allocator() -> NonNull<dyn FrameAllocator> {
    CURRENT_FRAME_ALLOCATOR
        .0
        .get()
        .expect("coroutine (de)allocation outside a Task::resume call")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Schedule, TaskControl};
    use rtfiber_core::alloc::StackAllocator;
    use rtfiber_core::time::TimePoint;

    type U = u32;
    const MAXT: u128 = u32::MAX as u128;
    const NUM: u64 = 1;
    const DEN: u64 = 1_000;

    fn control() -> TaskControl<U, MAXT, NUM, DEN> {
        TaskControl::new(
            "test",
            0,
            Schedule {
                ready: TimePoint::ZERO,
                deadline: TimePoint::ZERO,
            },
            true,
        )
    }

    enum CountToThree {
        Start,
        Counting(u32),
    }

    impl CoroutineBody<U, MAXT, NUM, DEN> for CountToThree {
        type Output = u32;
        fn resume(&mut self, cx: &mut CoCx<'_, U, MAXT, NUM, DEN>) -> CoPoll<u32> {
            loop {
                match *self {
                    CountToThree::Start => {
                        *self = CountToThree::Counting(0);
                    }
                    CountToThree::Counting(n) if n < 2 => {
                        *self = CountToThree::Counting(n + 1);
                        cx.raise(CoSignal::NextCycle);
                        return CoPoll::Pending;
                    }
                    CountToThree::Counting(n) => return CoPoll::Done(n),
                }
            }
        }
    }

    /// S4 from spec §8.3: a nested coroutine's frame is allocated while it
    /// runs and reclaimed the instant it completes, leaving only the root's.
    #[test]
    fn s4_nested_coroutine_frame_lifecycle() {
        enum Parent {
            Init,
            Waiting(ChildHandle<U, MAXT, NUM, DEN, u32>),
            Done,
        }

        impl CoroutineBody<U, MAXT, NUM, DEN> for Parent {
            type Output = u32;
            fn resume(&mut self, cx: &mut CoCx<'_, U, MAXT, NUM, DEN>) -> CoPoll<u32> {
                loop {
                    match self {
                        Parent::Init => {
                            *self = Parent::Waiting(ChildHandle::spawn(CountToThree::Start));
                        }
                        Parent::Waiting(child) => match child.poll(cx) {
                            CoPoll::Pending => return CoPoll::Pending,
                            CoPoll::Done(value) => {
                                *self = Parent::Done;
                                return CoPoll::Done(value * 10);
                            }
                        },
                        Parent::Done => unreachable!(),
                    }
                }
            }
        }

        let allocator: StackAllocator<64> = StackAllocator::new();
        let ctrl = control();
        let mut parent = Parent::Init;

        let _scope = FrameAllocatorScope::enter(&allocator);
        let root_baseline = allocator.allocated_size();

        loop {
            let mut cx = CoCx::new(&ctrl);
            match parent.resume(&mut cx) {
                CoPoll::Pending => {
                    assert!(allocator.allocated_size() > root_baseline);
                    assert_eq!(ctrl.take_signal(), CoSignal::NextCycle);
                }
                CoPoll::Done(value) => {
                    assert_eq!(value, 20);
                    assert_eq!(allocator.allocated_size(), root_baseline);
                    break;
                }
            }
        }
    }

    #[test]
    fn awaiting_a_future_registers_leaf_hook_and_raises_await() {
        let ctrl = control();
        let chan = rtfiber_core::future::Channel::<u32>::new();
        let (mut future, mut promise) = chan.split();

        let mut cx = CoCx::new(&ctrl);
        assert!(matches!(cx.poll_future(&mut future), CoPoll::Pending));
        assert!(ctrl.signal().is_await());
        assert!(ctrl.leaf_hook().is_some());

        promise.set_value(5);
        assert!(matches!(cx.poll_future(&mut future), CoPoll::Done(Some(5))));
    }
}
