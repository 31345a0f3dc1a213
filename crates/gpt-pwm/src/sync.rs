//! Locking primitives used by channels and the shared clock selector.
//!
//! Provides a `Mutex` wrapper over `parking_lot` whose acquisition can be
//! abandoned when the caller raises an [`Interrupt`], mirroring an
//! interruptible semaphore wait in a character-device driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub use std::sync::Arc;

use crate::error::{PwmError, PwmResult};

pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;

/// How long a blocked waiter sleeps before re-checking its interrupt token.
const INTERRUPT_POLL: Duration = Duration::from_millis(2);

/// Caller-owned interruption flag, cloned into whatever delivers the signal.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks any lock wait made with this token to give up.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Re-arms the token after the caller has handled an interruption.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Mutual exclusion with optional interruptible acquisition.
///
/// `parking_lot` locks do not poison, so a panic in one holder never turns
/// every later acquisition into an error.
#[derive(Debug, Default)]
pub struct Mutex<T> {
    inner: parking_lot::Mutex<T>,
}

impl<T> Mutex<T> {
    /// Creates a new mutex protecting the given value.
    pub fn new(value: T) -> Self {
        Self {
            inner: parking_lot::Mutex::new(value),
        }
    }

    /// Acquires the mutex, blocking until it becomes available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    /// Acquires the mutex unless `interrupt` is raised while waiting.
    ///
    /// An uncontended lock is taken even if the token is already raised; the
    /// token is only consulted once the caller would otherwise block.
    pub fn lock_interruptible(&self, interrupt: &Interrupt) -> PwmResult<MutexGuard<'_, T>> {
        loop {
            if let Some(guard) = self.inner.try_lock_for(INTERRUPT_POLL) {
                return Ok(guard);
            }
            if interrupt.is_raised() {
                return Err(PwmError::Interrupted);
            }
        }
    }

    /// Returns true if another caller currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}
