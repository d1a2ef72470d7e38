// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Local blocking primitives behind each cross-core mutex.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[derive(Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: u32,
}

/// A lock that the holding thread may take again.
#[derive(Default)]
pub struct LocalLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl LocalLock {
    /// Block until the current thread holds the lock.
    pub fn lock(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    return;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    return;
                }
                Some(_) => {
                    state = self
                        .released
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Release one level. Returns false if the current thread is not the
    /// holder.
    #[must_use]
    pub fn unlock(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.owner != Some(me) {
            return false;
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
        true
    }

    /// Nesting depth of the current holder (0 if free).
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .depth
    }
}

/// A broadcast event signalled from interrupt context.
///
/// Waiters take a ticket before dropping the lock they checked state under,
/// so a broadcast that lands in between is not lost.
#[derive(Default)]
pub struct WakeEvent {
    generation: Mutex<u64>,
    cond: Condvar,
    broadcasts: AtomicU64,
}

impl WakeEvent {
    /// Current generation, to be passed to [`WakeEvent::wait_since`].
    #[must_use]
    pub fn ticket(&self) -> u64 {
        *self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until a broadcast newer than `ticket` or until `timeout`.
    ///
    /// Returns true if woken by a broadcast.
    pub fn wait_since(&self, ticket: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *generation == ticket {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            generation = self
                .cond
                .wait_timeout(generation, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Wake every current waiter.
    pub fn broadcast(&self) {
        let mut generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *generation = generation.wrapping_add(1);
        self.broadcasts.fetch_add(1, Ordering::SeqCst);
        self.cond.notify_all();
    }

    /// Number of broadcasts so far.
    #[must_use]
    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use std::sync::Arc;

    use super::*;

    #[test]
    fn local_lock_is_reentrant() {
        let lock = LocalLock::default();
        lock.lock();
        lock.lock();
        assert_eq!(lock.depth(), 2);
        assert!(lock.unlock());
        assert!(lock.unlock());
        assert_eq!(lock.depth(), 0);
        assert!(!lock.unlock());
    }

    #[test]
    fn local_lock_excludes_other_threads() {
        let lock = Arc::new(LocalLock::default());
        lock.lock();
        let other = Arc::clone(&lock);
        let handle = thread::spawn(move || other.unlock());
        assert!(!handle.join().unwrap());

        let waiter = Arc::clone(&lock);
        let handle = thread::spawn(move || {
            waiter.lock();
            assert!(waiter.unlock());
        });
        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());
        assert!(lock.unlock());
        handle.join().unwrap();
    }

    #[test]
    fn wake_event_times_out() {
        let event = WakeEvent::default();
        let ticket = event.ticket();
        assert!(!event.wait_since(ticket, Duration::from_millis(5)));
    }

    #[test]
    fn broadcast_before_wait_is_not_lost() {
        let event = WakeEvent::default();
        let ticket = event.ticket();
        event.broadcast();
        assert!(event.wait_since(ticket, Duration::from_secs(5)));
        assert_eq!(event.broadcast_count(), 1);
    }

    #[test]
    fn broadcast_wakes_all_waiters() {
        let event = Arc::new(WakeEvent::default());
        let ticket = event.ticket();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let event = Arc::clone(&event);
                thread::spawn(move || event.wait_since(ticket, Duration::from_secs(5)))
            })
            .collect();
        thread::sleep(Duration::from_millis(10));
        event.broadcast();
        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
    }
}
