//! Keeping memory alive while the engine holds raw pointers into it.
//!
//! Three situations are covered:
//!
//! - A handle's pointer is only handed out as a [`BorrowedPtr`], which borrows
//!   the owning handle for as long as the pointer expression is in use. An
//!   owner cannot be dropped while a call built from its pointer is running.
//! - Bulk data lives in a [`SharedBuffer`]. For the duration of a native call
//!   the buffer is pinned by an owned write guard, so no other clone can
//!   reallocate or observe it half written, and dropping every other clone
//!   does not free the storage.
//! - Asynchronous calls move their guards into an [`InFlight`] record that
//!   the engine returns through the completion callback. The guards are
//!   released only when the callback fires. Handles kept alive by the record
//!   are passed to [`release_later`], so the last native free never runs on
//!   an engine thread.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::NonNull;
use std::sync::mpsc;
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RawRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use parking_lot::lock_api::ArcRwLockWriteGuard;

use crate::sys;
use crate::types::CellType;

/// A live native pointer borrowed from its owning handle.
#[derive(Clone, Copy)]
pub struct BorrowedPtr<'a, T> {
    ptr: NonNull<T>,
    _owner: PhantomData<&'a T>,
}

impl<T> BorrowedPtr<'_, T> {
    pub(crate) fn new(ptr: NonNull<T>) -> Self {
        Self {
            ptr,
            _owner: PhantomData,
        }
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> fmt::Debug for BorrowedPtr<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BorrowedPtr({:p})", self.ptr)
    }
}

/// Growable cell storage shared between the caller and the engine.
///
/// Clones share the same storage. A query that registers the buffer keeps a
/// clone, so results can be read from any other clone once the query is done.
pub struct SharedBuffer<T> {
    inner: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for SharedBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: CellType> SharedBuffer<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(values)),
        }
    }

    /// Buffer of `len` zeroed cells, typically used as read destination.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![T::default(); len])
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until no native call holds the buffer, then read it.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.inner.write()
    }

    /// Copy of the first `len` cells, clamped to the buffer length.
    pub fn to_vec(&self, len: usize) -> Vec<T> {
        let values = self.inner.read();
        values[..len.min(values.len())].to_vec()
    }

    /// Number of strong references, including those held by pending calls.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Identity of the shared storage, equal across clones.
    pub(crate) fn storage_id(&self) -> usize {
        Arc::as_ptr(&self.inner).cast::<()>() as usize
    }

    pub(crate) fn pin(&self) -> PinnedField {
        let mut guard: ArcRwLockWriteGuard<RawRwLock, Vec<T>> = self.inner.write_arc();
        let ptr = guard.as_mut_ptr().cast::<sys::c_void>();
        let bytes = (guard.len() * mem::size_of::<T>()) as u64;
        PinnedField {
            _guard: Box::new(guard),
            ptr,
            bytes,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Some(values) => f.debug_tuple("SharedBuffer").field(&*values).finish(),
            None => f.write_str("SharedBuffer(<pinned>)"),
        }
    }
}

/// Exclusive pin on a buffer's storage for the extent of a native call.
pub(crate) struct PinnedField {
    _guard: Box<dyn Send>,
    ptr: *mut sys::c_void,
    bytes: u64,
}

// The pointer targets storage owned by the guard moved alongside it.
unsafe impl Send for PinnedField {}

impl PinnedField {
    pub(crate) fn as_ptr(&self) -> *mut sys::c_void {
        self.ptr
    }

    /// Capacity of the pinned storage in bytes.
    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// One-shot completion flag shared between a pending call and its waiter.
#[derive(Default)]
pub(crate) struct Completion {
    done: Mutex<bool>,
    signal: Condvar,
}

impl Completion {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn complete(&self) {
        *self.done.lock() = true;
        self.signal.notify_all();
    }

    pub(crate) fn is_complete(&self) -> bool {
        *self.done.lock()
    }

    pub(crate) fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.signal.wait(&mut done);
        }
    }

    /// Wait at most `timeout`; returns whether the call completed.
    pub(crate) fn wait_for(&self, timeout: Duration) -> bool {
        let mut done = self.done.lock();
        if !*done {
            self.signal.wait_for(&mut done, timeout);
        }
        *done
    }
}

/// Everything an asynchronous native call needs kept alive until completion.
pub(crate) struct InFlight {
    on_complete: Option<Box<dyn FnOnce() + Send>>,
    completion: Arc<Completion>,
}

impl InFlight {
    /// `on_complete` owns the keep-alive state and runs when the engine
    /// reports completion; dropping it releases the state.
    pub(crate) fn new(on_complete: impl FnOnce() + Send + 'static, completion: Arc<Completion>) -> Box<Self> {
        Box::new(Self {
            on_complete: Some(Box::new(on_complete)),
            completion,
        })
    }

    /// Hand the record to the engine as callback data.
    pub(crate) fn into_raw(self: Box<Self>) -> *mut sys::c_void {
        Box::into_raw(self).cast()
    }

    /// Take back a record the engine rejected; its callback will never fire.
    ///
    /// # Safety
    ///
    /// `data` must come from [`InFlight::into_raw`] and not have been passed
    /// to [`complete_in_flight`].
    pub(crate) unsafe fn reclaim(data: *mut sys::c_void) -> Box<Self> {
        unsafe { Box::from_raw(data.cast::<Self>()) }
    }

    fn finish(mut self: Box<Self>) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete();
        }
        // Waiters are woken only after the guards are gone.
        self.completion.complete();
    }
}

/// Completion callback handed to the engine for asynchronous submissions.
pub(crate) unsafe extern "C" fn complete_in_flight(data: *mut sys::c_void) {
    if data.is_null() {
        return;
    }
    let in_flight = unsafe { InFlight::reclaim(data) };
    let completion = Arc::clone(&in_flight.completion);
    if catch_unwind(AssertUnwindSafe(move || in_flight.finish())).is_err() {
        tracing::warn!("completion handler panicked");
        completion.complete();
    }
}

enum ReleaseJob {
    Drop(Box<dyn Send>),
    #[cfg(test)]
    Flush(mpsc::Sender<()>),
}

static RELEASER: LazyLock<Option<mpsc::Sender<ReleaseJob>>> = LazyLock::new(|| {
    let (sender, receiver) = mpsc::channel::<ReleaseJob>();
    let spawned = thread::Builder::new()
        .name("tiledb-release".to_string())
        .spawn(move || {
            for job in receiver {
                match job {
                    ReleaseJob::Drop(value) => drop(value),
                    #[cfg(test)]
                    ReleaseJob::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });
    match spawned {
        Ok(_) => Some(sender),
        Err(err) => {
            tracing::warn!(%err, "failed to start release thread, releasing on the caller");
            None
        }
    }
});

/// Drop `value` on the crate's release thread.
///
/// Completion callbacks run on engine threads, and the engine must not free a
/// context or query from one of its own workers. Anything a callback would
/// otherwise drop last goes through here.
pub(crate) fn release_later(value: impl Send + 'static) {
    let job = ReleaseJob::Drop(Box::new(value));
    match RELEASER.as_ref() {
        Some(sender) => {
            if let Err(mpsc::SendError(job)) = sender.send(job) {
                drop(job);
            }
        }
        None => drop(job),
    }
}

/// Block until every release queued before this call has run.
#[cfg(test)]
pub(crate) fn flush_releases() {
    let Some(sender) = RELEASER.as_ref() else {
        return;
    };
    let (ack, done) = mpsc::channel();
    if sender.send(ReleaseJob::Flush(ack)).is_ok() {
        let _ = done.recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_pin_blocks_other_writers() {
        let buffer = SharedBuffer::new(vec![1i32, 2, 3]);
        let pin = buffer.pin();
        assert_eq!(pin.bytes(), 12);
        assert!(buffer.inner.try_write().is_none());
        drop(pin);
        assert!(buffer.inner.try_write().is_some());
    }

    #[test]
    fn test_pin_outlives_every_clone() {
        let buffer = SharedBuffer::new(vec![7u8; 16]);
        let pin = buffer.pin();
        drop(buffer);
        let bytes = unsafe { std::slice::from_raw_parts(pin.as_ptr().cast::<u8>(), 16) };
        assert!(bytes.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_in_flight_releases_before_waking() {
        let buffer = SharedBuffer::new(vec![0u64; 4]);
        let pin = buffer.pin();
        let completion = Completion::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let data = InFlight::new(
            move || {
                flag.store(true, Ordering::SeqCst);
                drop(pin);
            },
            Arc::clone(&completion),
        )
        .into_raw();

        let sent = SendData(data);
        let engine = thread::spawn(move || {
            let sent = sent;
            unsafe { complete_in_flight(sent.0) };
        });
        completion.wait();
        assert!(ran.load(Ordering::SeqCst));
        assert!(buffer.inner.try_write().is_some());
        engine.join().expect("engine thread");
    }

    #[test]
    fn test_wait_for_times_out() {
        let completion = Completion::new();
        assert!(!completion.wait_for(Duration::from_millis(10)));
        completion.complete();
        assert!(completion.wait_for(Duration::from_millis(10)));
        assert!(completion.is_complete());
    }

    #[test]
    fn test_panicking_completion_still_wakes_waiter() {
        let buffer = SharedBuffer::new(vec![0i32; 2]);
        let pin = buffer.pin();
        let completion = Completion::new();
        let data = InFlight::new(
            move || {
                let _pin = pin;
                panic!("completion handler failed");
            },
            Arc::clone(&completion),
        )
        .into_raw();

        let sent = SendData(data);
        let engine = thread::spawn(move || {
            let sent = sent;
            unsafe { complete_in_flight(sent.0) };
        });
        assert!(completion.wait_for(Duration::from_secs(5)));
        engine.join().expect("callback must not unwind into the engine");
        assert!(buffer.inner.try_write().is_some());
    }

    #[test]
    fn test_release_later_drops_off_caller_thread() {
        struct ReportsThread(mpsc::Sender<Option<String>>);
        impl Drop for ReportsThread {
            fn drop(&mut self) {
                let name = thread::current().name().map(str::to_string);
                let _ = self.0.send(name);
            }
        }
        let (tx, rx) = mpsc::channel();
        release_later(ReportsThread(tx));
        flush_releases();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("tiledb-release"));
    }

    struct SendData(*mut sys::c_void);
    unsafe impl Send for SendData {}
}
