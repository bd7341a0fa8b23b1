//! Advisory (user-level) lock manager.
//!
//! Named locks are exclusive, keyed on `(namespace, name)` and owned by a
//! session id. Waiters queue in FIFO order. A waiting session re-checks its
//! kill flag at least once per poll interval so a killed session never stays
//! parked until its full timeout.

use super::kill::KillSwitch;
use log::{debug, info};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Maximum length of a lock name, in characters.
pub const MAX_LOCK_NAME_LEN: usize = 64;

/// Separate name spaces sharing one lock manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockNamespace {
    /// Locks taken by `GET_LOCK`.
    UserLevel,
    /// Locks taken on behalf of server plugins.
    LockingService,
}

/// Identifier of a named lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub namespace: LockNamespace,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("Incorrect user-level lock name '{0}'.")]
    WrongName(String),
}

impl LockKey {
    /// Validates a user-level lock name. Names are case-insensitive.
    pub fn user_level(name: &str) -> Result<Self, LockError> {
        if name.is_empty() || name.chars().count() > MAX_LOCK_NAME_LEN {
            return Err(LockError::WrongName(name.to_string()));
        }
        Ok(Self {
            namespace: LockNamespace::UserLevel,
            name: name.to_lowercase(),
        })
    }
}

/// Result of an acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Granted,
    Timeout,
    Killed,
}

/// Result of a release attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// The lock is free or owned by another session.
    NotHeld,
}

#[derive(Debug)]
struct LockInfo {
    owner: Option<u32>,
    /// Sessions waiting for the lock, oldest first.
    waiters: VecDeque<u32>,
    cv: Arc<Condvar>,
}

impl LockInfo {
    fn new() -> Self {
        Self {
            owner: None,
            waiters: VecDeque::new(),
            cv: Arc::new(Condvar::new()),
        }
    }

    /// The lock is free and `session` is first in line for it.
    fn grantable_to(&self, session: u32) -> bool {
        self.owner.is_none() && self.waiters.front() == Some(&session)
    }
}

/// Drops `session` from the wait queue of `key`, removing the entry when it
/// is left free and unwanted.
fn abandon(locks: &mut HashMap<LockKey, LockInfo>, key: &LockKey, session: u32) {
    let Some(info) = locks.get_mut(key) else {
        return;
    };
    info.waiters.retain(|w| *w != session);
    if info.owner.is_none() {
        if info.waiters.is_empty() {
            locks.remove(key);
        } else {
            info.cv.notify_all();
        }
    }
}

/// Process-wide table of named advisory locks.
pub struct UserLockManager {
    locks: Mutex<HashMap<LockKey, LockInfo>>,
    poll_interval: Duration,
}

impl UserLockManager {
    /// Creates a manager that re-checks kill flags every 100ms while waiting.
    pub fn new() -> Self {
        Self::with_poll_interval(Duration::from_millis(100))
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Acquires `key` for `session`, waiting up to `timeout`.
    ///
    /// Acquiring a lock the session already owns succeeds immediately; the
    /// caller keeps its own reference count.
    pub fn acquire(
        &self,
        key: &LockKey,
        session: u32,
        timeout: Duration,
        kill: &KillSwitch,
    ) -> AcquireOutcome {
        let deadline = Instant::now().checked_add(timeout);
        let mut locks = self.locks.lock();

        let cv = {
            let info = locks.entry(key.clone()).or_insert_with(LockInfo::new);
            if info.owner == Some(session) {
                return AcquireOutcome::Granted;
            }
            if info.owner.is_none() && info.waiters.is_empty() {
                info.owner = Some(session);
                debug!("session {} acquired lock '{}'", session, key.name);
                return AcquireOutcome::Granted;
            }
            info.waiters.push_back(session);
            Arc::clone(&info.cv)
        };

        loop {
            let Some(info) = locks.get_mut(key) else {
                // Entries with waiters are never removed.
                return AcquireOutcome::Timeout;
            };
            if info.grantable_to(session) {
                info.waiters.pop_front();
                info.owner = Some(session);
                debug!("session {} acquired lock '{}' after waiting", session, key.name);
                return AcquireOutcome::Granted;
            }
            if kill.is_killed() {
                abandon(&mut locks, key, session);
                info!("session {} killed while waiting for lock '{}'", session, key.name);
                return AcquireOutcome::Killed;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        abandon(&mut locks, key, session);
                        debug!("session {} timed out waiting for lock '{}'", session, key.name);
                        return AcquireOutcome::Timeout;
                    }
                    (deadline - now).min(self.poll_interval)
                }
                None => self.poll_interval,
            };
            cv.wait_for(&mut locks, slice);
        }
    }

    /// Releases `key` if `session` owns it and wakes the next waiter.
    pub fn release(&self, key: &LockKey, session: u32) -> ReleaseOutcome {
        let mut locks = self.locks.lock();
        let Some(info) = locks.get_mut(key) else {
            return ReleaseOutcome::NotHeld;
        };
        if info.owner != Some(session) {
            return ReleaseOutcome::NotHeld;
        }
        info.owner = None;
        if info.waiters.is_empty() {
            locks.remove(key);
        } else {
            info.cv.notify_all();
        }
        debug!("session {} released lock '{}'", session, key.name);
        ReleaseOutcome::Released
    }

    /// Session currently owning `key`, if any.
    pub fn query_owner(&self, key: &LockKey) -> Option<u32> {
        self.locks.lock().get(key).and_then(|info| info.owner)
    }

    /// Releases every lock owned by `session`, returning how many were held.
    pub fn release_all(&self, session: u32) -> usize {
        let mut locks = self.locks.lock();
        let mut released = 0;
        locks.retain(|_, info| {
            if info.owner != Some(session) {
                return true;
            }
            released += 1;
            info.owner = None;
            info.cv.notify_all();
            !info.waiters.is_empty()
        });
        released
    }

    /// Number of locks currently owned by some session.
    pub fn held_count(&self) -> usize {
        self.locks
            .lock()
            .values()
            .filter(|info| info.owner.is_some())
            .count()
    }
}

impl Default for UserLockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn key(name: &str) -> LockKey {
        LockKey::user_level(name).unwrap()
    }

    #[test]
    fn test_lock_name_validation() {
        assert!(LockKey::user_level("").is_err());
        assert!(LockKey::user_level(&"x".repeat(65)).is_err());
        assert_eq!(key("MyLock").name, "mylock");
        assert_eq!(
            LockKey::user_level("").unwrap_err().to_string(),
            "Incorrect user-level lock name ''."
        );
    }

    #[test]
    fn test_basic_acquire_release() {
        let manager = UserLockManager::new();
        let kill = KillSwitch::new();

        assert_eq!(manager.acquire(&key("a"), 1, Duration::ZERO, &kill), AcquireOutcome::Granted);
        assert_eq!(manager.query_owner(&key("a")), Some(1));
        assert_eq!(manager.acquire(&key("a"), 1, Duration::ZERO, &kill), AcquireOutcome::Granted);

        assert_eq!(manager.release(&key("a"), 2), ReleaseOutcome::NotHeld);
        assert_eq!(manager.release(&key("a"), 1), ReleaseOutcome::Released);
        assert_eq!(manager.query_owner(&key("a")), None);
        assert_eq!(manager.release(&key("a"), 1), ReleaseOutcome::NotHeld);
    }

    #[test]
    fn test_zero_timeout_does_not_block() {
        let manager = UserLockManager::new();
        let kill = KillSwitch::new();
        manager.acquire(&key("busy"), 1, Duration::ZERO, &kill);

        let start = Instant::now();
        assert_eq!(
            manager.acquire(&key("busy"), 2, Duration::ZERO, &kill),
            AcquireOutcome::Timeout
        );
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(manager.query_owner(&key("busy")), Some(1));
    }

    #[test]
    fn test_waiter_is_granted_on_release() {
        let manager = Arc::new(UserLockManager::new());
        let barrier = Arc::new(Barrier::new(2));
        let kill = KillSwitch::new();
        manager.acquire(&key("handoff"), 1, Duration::ZERO, &kill);

        let waiter = {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let kill = KillSwitch::new();
                barrier.wait();
                manager.acquire(&key("handoff"), 2, Duration::from_secs(5), &kill)
            })
        };

        barrier.wait();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(manager.release(&key("handoff"), 1), ReleaseOutcome::Released);
        assert_eq!(waiter.join().unwrap(), AcquireOutcome::Granted);
        assert_eq!(manager.query_owner(&key("handoff")), Some(2));
    }

    #[test]
    fn test_kill_interrupts_wait() {
        let manager = Arc::new(UserLockManager::with_poll_interval(Duration::from_millis(10)));
        let kill = KillSwitch::new();
        manager.acquire(&key("k"), 1, Duration::ZERO, &kill);

        let victim_kill = KillSwitch::new();
        let waiter = {
            let manager = Arc::clone(&manager);
            let victim_kill = victim_kill.clone();
            thread::spawn(move || manager.acquire(&key("k"), 2, Duration::from_secs(30), &victim_kill))
        };

        thread::sleep(Duration::from_millis(30));
        let start = Instant::now();
        victim_kill.kill();
        assert_eq!(waiter.join().unwrap(), AcquireOutcome::Killed);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(manager.query_owner(&key("k")), Some(1));
    }

    #[test]
    fn test_release_all() {
        let manager = UserLockManager::new();
        let kill = KillSwitch::new();
        manager.acquire(&key("x"), 7, Duration::ZERO, &kill);
        manager.acquire(&key("y"), 7, Duration::ZERO, &kill);
        manager.acquire(&key("z"), 8, Duration::ZERO, &kill);

        assert_eq!(manager.release_all(7), 2);
        assert_eq!(manager.held_count(), 1);
        assert_eq!(manager.query_owner(&key("x")), None);
    }
}
