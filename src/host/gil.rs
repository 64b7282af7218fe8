//! Scoped access to the host interpreter lock
//!
//! Every reference-count change on a host object, every call into the host
//! error system and every loop marked as GIL-requiring runs while a
//! [`GilGuard`] is alive. The lock is re-entrant on the owning thread, so
//! nested guards are cheap and never deadlock against themselves.

use std::marker::PhantomData;

/// RAII guard holding the interpreter lock
///
/// Released when dropped, on every exit path. Not `Send`: the lock must be
/// released by the thread that acquired it.
#[must_use = "the interpreter lock is released as soon as the guard is dropped"]
pub struct GilGuard {
    _inner: backend::Guard,
    _not_send: PhantomData<*const ()>,
}

impl GilGuard {
    /// Block until the interpreter lock is held by the current thread
    pub fn acquire() -> Self {
        let inner = backend::acquire();
        tracing::trace!("interpreter lock acquired");
        Self {
            _inner: inner,
            _not_send: PhantomData,
        }
    }
}

/// Whether the current thread holds the interpreter lock
pub fn is_held() -> bool {
    backend::is_held()
}

#[cfg(not(feature = "python"))]
mod backend {
    use parking_lot::{ReentrantMutex, ReentrantMutexGuard, const_reentrant_mutex};
    use std::cell::Cell;

    static INTERPRETER_LOCK: ReentrantMutex<()> = const_reentrant_mutex(());

    thread_local! {
        static DEPTH: Cell<usize> = const { Cell::new(0) };
    }

    pub(super) struct Guard {
        _lock: ReentrantMutexGuard<'static, ()>,
    }

    pub(super) fn acquire() -> Guard {
        let lock = INTERPRETER_LOCK.lock();
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        Guard { _lock: lock }
    }

    impl Drop for Guard {
        fn drop(&mut self) {
            // Runs before `_lock` unlocks.
            DEPTH.with(|depth| depth.set(depth.get() - 1));
        }
    }

    pub(super) fn is_held() -> bool {
        DEPTH.with(|depth| depth.get() > 0)
    }
}

#[cfg(feature = "python")]
mod backend {
    use pyo3::ffi;

    pub(super) struct Guard(ffi::PyGILState_STATE);

    pub(super) fn acquire() -> Guard {
        // SAFETY: the interpreter is initialized before any host object
        // reaches the bridge.
        Guard(unsafe { ffi::PyGILState_Ensure() })
    }

    impl Drop for Guard {
        fn drop(&mut self) {
            // SAFETY: paired with the PyGILState_Ensure in `acquire` on the
            // same thread (the guard is not Send).
            unsafe { ffi::PyGILState_Release(self.0) }
        }
    }

    pub(super) fn is_held() -> bool {
        unsafe { ffi::PyGILState_Check() == 1 }
    }
}

#[cfg(all(test, not(feature = "python")))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_guard_is_reentrant_and_scoped() {
        assert!(!is_held());
        {
            let _outer = GilGuard::acquire();
            assert!(is_held());
            {
                let _inner = GilGuard::acquire();
                assert!(is_held());
            }
            assert!(is_held());
        }
        assert!(!is_held());
    }

    #[test]
    fn test_guard_excludes_other_threads() {
        let guard = GilGuard::acquire();
        let entered = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&entered);
        let handle = std::thread::spawn(move || {
            let _gil = GilGuard::acquire();
            flag.store(true, Ordering::SeqCst);
            is_held()
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!entered.load(Ordering::SeqCst));
        drop(guard);
        assert!(handle.join().unwrap());
        assert!(entered.load(Ordering::SeqCst));
    }
}
