//! Lock state machine, inactivity tracking and state-change fan-out.
//!
//! `LockState` is the single source of truth for what the engine may do:
//! the decrypted session exists only inside `Unlocked`, so replacing the
//! state with `Locked` drops the session and wipes its key.
//!
//! The auto-lock timer tracks user activity separately from the state so
//! the background thread can check it without touching the vault lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::errors::{Result, VaultError};

use super::store::VaultStore;

// ── Lock state ─────────────────────────────────────────────────────

pub enum LockState {
    /// No container exists yet.
    Uninitialized,
    /// A container exists; nothing is decrypted.
    Locked,
    /// The session holds the data key and the decrypted payload.
    Unlocked(Box<VaultStore>),
}

impl LockState {
    pub fn is_initialized(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }

    pub fn is_locked(&self) -> bool {
        !matches!(self, Self::Unlocked(_))
    }

    /// The session, or the error that gates every non-unlock operation.
    pub fn session(&self) -> Result<&VaultStore> {
        match self {
            Self::Unlocked(store) => Ok(store.as_ref()),
            Self::Locked => Err(VaultError::AppIsLocked),
            Self::Uninitialized => Err(VaultError::AppNotInitialized),
        }
    }

    pub fn session_mut(&mut self) -> Result<&mut VaultStore> {
        match self {
            Self::Unlocked(store) => Ok(store.as_mut()),
            Self::Locked => Err(VaultError::AppIsLocked),
            Self::Uninitialized => Err(VaultError::AppNotInitialized),
        }
    }

    /// Gate for the unlock path itself.
    pub fn check_unlockable(&self) -> Result<()> {
        match self {
            Self::Uninitialized => Err(VaultError::MasterKeyNotInitialized),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("Uninitialized"),
            Self::Locked => f.write_str("Locked"),
            Self::Unlocked(_) => f.write_str("Unlocked(..)"),
        }
    }
}

// ── Notifications ──────────────────────────────────────────────────

/// Why the vault was locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockReason {
    Explicit,
    Timeout,
    Shutdown,
}

/// Pushed to subscribers on every state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StateChange {
    Initialized,
    Unlocked,
    Locked { reason: LockReason },
}

/// Subscriber list.  Disconnected receivers are pruned on send.
#[derive(Default)]
pub struct Subscribers {
    senders: Mutex<Vec<Sender<StateChange>>>,
}

impl Subscribers {
    pub fn subscribe(&self) -> Receiver<StateChange> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut senders) = self.senders.lock() {
            senders.push(tx);
        }
        rx
    }

    pub fn notify(&self, change: StateChange) {
        if let Ok(mut senders) = self.senders.lock() {
            senders.retain(|tx| tx.send(change).is_ok());
        }
    }
}

// ── Auto-lock timer ────────────────────────────────────────────────

/// How often the background thread checks for inactivity.
pub const TIMER_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Last activity, shared between callers and the timer thread.
pub struct ActivityClock {
    last_activity: Mutex<Instant>,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self {
            last_activity: Mutex::new(Instant::now()),
        }
    }
}

impl ActivityClock {
    /// Record user activity (resets the inactivity countdown).
    pub fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.idle_for() >= timeout
    }
}

/// Handle to a running timer thread.  Cancelling only sets a flag; the
/// thread notices on its next tick and exits.
pub struct AutoLockTimer {
    pub timeout: Duration,
    cancel: Arc<AtomicBool>,
}

impl AutoLockTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag the thread reads to know it should stop.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Drop for AutoLockTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn gating_errors_follow_state() {
        assert!(matches!(
            LockState::Uninitialized.session(),
            Err(VaultError::AppNotInitialized)
        ));
        assert!(matches!(
            LockState::Locked.session(),
            Err(VaultError::AppIsLocked)
        ));
        assert!(matches!(
            LockState::Uninitialized.check_unlockable(),
            Err(VaultError::MasterKeyNotInitialized)
        ));
        assert!(LockState::Locked.check_unlockable().is_ok());
    }

    #[test]
    fn subscribers_receive_and_dead_ones_are_pruned() {
        let subs = Subscribers::default();
        let live = subs.subscribe();
        drop(subs.subscribe());

        subs.notify(StateChange::Unlocked);
        assert_eq!(live.try_recv().unwrap(), StateChange::Unlocked);
        assert_eq!(subs.senders.lock().unwrap().len(), 1);
    }

    #[test]
    fn activity_resets_idle_time() {
        let clock = ActivityClock::default();
        thread::sleep(Duration::from_millis(30));
        assert!(clock.is_expired(Duration::from_millis(20)));
        clock.touch();
        assert!(!clock.is_expired(Duration::from_secs(5)));
    }

    #[test]
    fn dropping_timer_sets_cancel() {
        let timer = AutoLockTimer::new(Duration::from_secs(1));
        let flag = timer.cancel_flag();
        drop(timer);
        assert!(flag.load(Ordering::Relaxed));
    }
}
