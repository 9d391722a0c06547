/*!
 * Kernel Spin Lock
 *
 * Mutual exclusion for kernel data, built on `parking_lot::Mutex` and tied
 * to the simulated interrupt state: holding any `SpinLock` keeps interrupts
 * disabled on the holding thread, and the nesting level is what the
 * scheduler checks before a context transfer.
 */

use super::intr;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// Named kernel lock
pub struct SpinLock<T> {
    name: &'static str,
    inner: Mutex<T>,
}

impl<T> SpinLock<T> {
    pub fn new(value: T, name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(value),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquire the lock, disabling interrupts first
    pub fn lock(&self) -> SpinGuard<'_, T> {
        intr::push_off();
        SpinGuard {
            lock: self,
            guard: ManuallyDrop::new(self.inner.lock()),
        }
    }

    /// Acquire the lock unless it stays held for longer than `timeout`
    pub fn try_lock_for(&self, timeout: Duration) -> Option<SpinGuard<'_, T>> {
        intr::push_off();
        match self.inner.try_lock_for(timeout) {
            Some(guard) => Some(SpinGuard {
                lock: self,
                guard: ManuallyDrop::new(guard),
            }),
            None => {
                intr::pop_off();
                None
            }
        }
    }
}

/// RAII guard for a held `SpinLock`
pub struct SpinGuard<'a, T> {
    lock: &'a SpinLock<T>,
    guard: ManuallyDrop<MutexGuard<'a, T>>,
}

impl<'a, T> SpinGuard<'a, T> {
    /// Release the lock and hand back the lock itself so it can be re-taken later
    pub fn unlock(guard: Self) -> &'a SpinLock<T> {
        let lock = guard.lock;
        drop(guard);
        lock
    }

    /// Block on `condvar`, releasing the lock while parked
    pub fn wait(&mut self, condvar: &Condvar) {
        condvar.wait(&mut self.guard);
    }

    /// Like `wait`, bounded by `timeout`; returns true when the wait timed out
    pub fn wait_for(&mut self, condvar: &Condvar, timeout: Duration) -> bool {
        condvar.wait_for(&mut self.guard, timeout).timed_out()
    }
}

impl<T> Deref for SpinGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for SpinGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the guard is dropped exactly once, here, and never touched again.
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        intr::pop_off();
    }
}
