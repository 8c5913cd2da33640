//! Ownership of native resources.
//!
//! A [`NativeHandle`] owns exactly one pointer handed out by a native
//! allocation call together with the destructor for that resource kind.
//! Release happens exactly once: the stored pointer is atomically swapped with
//! null, and only the caller that observed the non-null value runs the
//! destructor. Explicit [`NativeHandle::free`] and the drop path race through
//! the same swap, so neither can double free.
//!
//! Typed wrappers in [`typed`] share one `NativeHandle` behind an `Arc`;
//! cloning a wrapper shares ownership, it never duplicates it.

pub mod registrar;
pub mod typed;

pub use registrar::{RegistrarStats, stats};
pub use typed::*;

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::liveness::BorrowedPtr;
use registrar::Cleanup;

/// Destructor for one native resource kind.
pub type ReleaseFn<T> = unsafe fn(*mut T);

/// Sole owner of one native pointer.
pub struct NativeHandle<T> {
    ptr: AtomicPtr<T>,
    release: ReleaseFn<T>,
    kind: &'static str,
    cleanup: Cleanup,
}

// The pointer is only dereferenced by the engine, and release is guarded by
// the atomic swap.
unsafe impl<T> Send for NativeHandle<T> {}
unsafe impl<T> Sync for NativeHandle<T> {}

impl<T> NativeHandle<T> {
    /// Take ownership of `ptr`. Returns `None` for a null pointer: the
    /// allocation that produced it already failed and reported why.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live allocation that nothing else will release,
    /// and `release` must be the destructor matching its kind.
    pub unsafe fn new(ptr: *mut T, release: ReleaseFn<T>, kind: &'static str) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        Some(Self {
            ptr: AtomicPtr::new(ptr),
            release,
            kind,
            cleanup: Cleanup::register(kind),
        })
    }

    /// Borrow the live pointer.
    ///
    /// # Panics
    ///
    /// Panics if the handle was already freed. Continuing would hand a
    /// dangling pointer to the engine.
    pub fn get(&self) -> BorrowedPtr<'_, T> {
        match self.try_get() {
            Some(ptr) => ptr,
            None => panic!("cannot use freed {} handle", self.kind),
        }
    }

    /// Borrow the live pointer, or `None` once freed.
    pub fn try_get(&self) -> Option<BorrowedPtr<'_, T>> {
        NonNull::new(self.ptr.load(Ordering::Acquire)).map(BorrowedPtr::new)
    }

    /// Release the native resource. Any number of calls from any number of
    /// threads release it exactly once.
    pub fn free(&self) {
        self.cleanup.stop();
        if self.release_once() {
            tracing::trace!(kind = self.kind, "freed native handle");
        }
    }

    pub fn is_freed(&self) -> bool {
        self.ptr.load(Ordering::Acquire).is_null()
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    fn release_once(&self) -> bool {
        let old = self.ptr.swap(ptr::null_mut(), Ordering::AcqRel);
        if old.is_null() {
            return false;
        }
        unsafe { (self.release)(old) };
        true
    }
}

impl<T> Drop for NativeHandle<T> {
    fn drop(&mut self) {
        if !self.cleanup.fire() {
            return;
        }
        // A panicking destructor leaks the resource instead of unwinding out
        // of drop.
        match catch_unwind(AssertUnwindSafe(|| self.release_once())) {
            Ok(true) => {
                registrar::record_finalized();
                tracing::debug!(kind = self.kind, "released unreachable native handle");
            }
            Ok(false) => {}
            Err(_) => {
                registrar::record_panicked();
                tracing::warn!(kind = self.kind, "native release panicked during drop");
            }
        }
    }
}

impl<T> fmt::Debug for NativeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &self.kind)
            .field("ptr", &self.ptr.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    /// Stand-in native resource that counts how often it was released.
    pub(crate) struct FakeResource {
        released: AtomicUsize,
    }

    impl FakeResource {
        pub(crate) fn leak() -> &'static FakeResource {
            Box::leak(Box::new(FakeResource {
                released: AtomicUsize::new(0),
            }))
        }

        pub(crate) fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }

        pub(crate) fn handle(&'static self) -> NativeHandle<FakeResource> {
            let ptr = self as *const FakeResource as *mut FakeResource;
            unsafe { NativeHandle::new(ptr, release_fake, "fake") }.expect("non-null resource")
        }
    }

    unsafe fn release_fake(ptr: *mut FakeResource) {
        unsafe { (*ptr).released.fetch_add(1, Ordering::SeqCst) };
    }

    unsafe fn release_panics(_ptr: *mut FakeResource) {
        panic!("destructor failure");
    }

    #[test]
    fn test_null_pointer_yields_no_handle() {
        let handle = unsafe { NativeHandle::<FakeResource>::new(ptr::null_mut(), release_fake, "fake") };
        assert!(handle.is_none());
    }

    #[test]
    fn test_repeated_free_releases_once() {
        let resource = FakeResource::leak();
        let handle = resource.handle();
        for _ in 0..5 {
            handle.free();
        }
        assert_eq!(resource.released(), 1);
        assert!(handle.is_freed());
    }

    fn race_free(threads: usize) {
        let resource = FakeResource::leak();
        let handle = Arc::new(resource.handle());
        let barrier = Arc::new(Barrier::new(threads));
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                let handle = Arc::clone(&handle);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    handle.free();
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker panicked");
        }
        drop(handle);
        assert_eq!(resource.released(), 1, "released more than once with {threads} threads");
    }

    #[test]
    fn test_concurrent_free_releases_once() {
        for threads in [2, 8, 64] {
            race_free(threads);
        }
    }

    #[test]
    #[should_panic(expected = "cannot use freed fake handle")]
    fn test_get_after_free_panics() {
        let handle = FakeResource::leak().handle();
        handle.free();
        let _ = handle.get();
    }

    #[test]
    fn test_try_get_after_free() {
        let handle = FakeResource::leak().handle();
        assert!(handle.try_get().is_some());
        handle.free();
        assert!(handle.try_get().is_none());
    }

    #[test]
    fn test_free_then_drop_releases_once() {
        let resource = FakeResource::leak();
        let handle = resource.handle();
        handle.free();
        drop(handle);
        assert_eq!(resource.released(), 1);
    }

    #[test]
    fn test_drop_without_free_releases() {
        let resource = FakeResource::leak();
        let before = stats().finalized;
        drop(resource.handle());
        assert_eq!(resource.released(), 1);
        assert!(stats().finalized > before);
    }

    #[test]
    fn test_independent_handles() {
        let first = FakeResource::leak();
        let second = FakeResource::leak();
        let a = first.handle();
        let b = second.handle();
        a.free();
        assert_eq!(b.get().as_ptr(), second as *const FakeResource as *mut FakeResource);
        assert_eq!(second.released(), 0);
        drop(b);
        assert_eq!(first.released(), 1);
        assert_eq!(second.released(), 1);
    }

    #[test]
    fn test_panicking_release_is_swallowed_on_drop() {
        let resource = FakeResource::leak();
        let ptr = resource as *const FakeResource as *mut FakeResource;
        let before = stats().panicked;
        let handle = unsafe { NativeHandle::new(ptr, release_panics, "fake") }.expect("handle");
        drop(handle);
        assert!(stats().panicked > before);
    }
}
