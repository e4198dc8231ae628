//! A hole in a slice, used to avoid the double write performed by a naive swap-based sift.
use core::mem::ManuallyDrop;
use core::ptr;

/// Represents a hole in a slice, i.e., an index without a value.
///
/// It's constructed by taking the value out of `data[pos]`, leaving that
/// slot logically uninitialized until the hole is dropped, at which point
/// whatever element currently sits in `elt` is written back to wherever
/// `pos` has ended up.
pub(super) struct Hole<'a, T: 'a> {
    data: &'a mut [T],
    elt: ManuallyDrop<T>,
    pos: usize,
}

impl<'a, T> Hole<'a, T> {
    /// Creates a new `Hole` at `pos`.
    ///
    /// # Safety
    ///
    /// `pos` must point to an element within `data`.
    #[inline]
    pub unsafe fn new(data: &'a mut [T], pos: usize) -> Self {
        debug_assert!(pos < data.len());
        // Safety: guaranteed by caller.
        let elt = unsafe { ptr::read(&data[pos]) };
        Hole {
            data,
            elt: ManuallyDrop::new(elt),
            pos,
        }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn element(&self) -> &T {
        &self.elt
    }

    #[inline]
    pub fn element_mut(&mut self) -> &mut T {
        &mut self.elt
    }

    /// # Safety
    ///
    /// `index` must be a valid index into the original slice, and must not
    /// equal `self.pos()`.
    #[inline]
    pub unsafe fn get(&self, index: usize) -> &T {
        debug_assert!(index != self.pos);
        // Safety: guaranteed by caller.
        unsafe { self.data.get_unchecked(index) }
    }

    /// # Safety
    ///
    /// Same as [`Self::get`].
    #[inline]
    pub unsafe fn get_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index != self.pos);
        // Safety: guaranteed by caller.
        unsafe { self.data.get_unchecked_mut(index) }
    }

    /// Moves the hole to `index`, copying whatever element currently lives
    /// there into the hole's previous position.
    ///
    /// # Safety
    ///
    /// `index` must be a valid index into the original slice, and must not
    /// equal `self.pos()`.
    #[inline]
    pub unsafe fn move_to(&mut self, index: usize) {
        debug_assert!(index != self.pos);
        unsafe {
            let ptr = self.data.as_mut_ptr();
            let index_ptr: *const _ = ptr.add(index);
            let hole_ptr = ptr.add(self.pos);
            ptr::copy_nonoverlapping(index_ptr, hole_ptr, 1);
        }
        self.pos = index;
    }
}

impl<T> Drop for Hole<'_, T> {
    #[inline]
    fn drop(&mut self) {
        // Fill the hole again with the value that now belongs there.
        unsafe {
            let pos = self.pos;
            ptr::copy_nonoverlapping(&*self.elt, self.data.get_unchecked_mut(pos), 1);
        }
    }
}
