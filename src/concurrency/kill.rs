//! Session kill flag and interruptible waits.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct KillState {
    killed: AtomicBool,
    lock: Mutex<()>,
    cv: Condvar,
}

/// Shared handle to a session's kill flag.
///
/// Clones observe the same flag, so another thread can kill a session that
/// is blocked in [`KillSwitch::wait`] or in a lock wait.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch {
    inner: Arc<KillState>,
}

/// How an interruptible wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration passed.
    Elapsed,
    /// The kill flag was raised.
    Interrupted,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag and wakes every waiter.
    pub fn kill(&self) {
        self.inner.killed.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock();
        self.inner.cv.notify_all();
    }

    pub fn is_killed(&self) -> bool {
        self.inner.killed.load(Ordering::SeqCst)
    }

    /// Clears the flag, e.g. after the killed statement has been aborted.
    pub fn reset(&self) {
        self.inner.killed.store(false, Ordering::SeqCst);
    }

    /// Sleeps for `duration` unless killed first, re-checking the flag at
    /// least every `poll` interval.
    pub fn wait(&self, duration: Duration, poll: Duration) -> WaitOutcome {
        let deadline = Instant::now().checked_add(duration);
        let poll = poll.max(Duration::from_millis(1));
        let mut guard = self.inner.lock.lock();
        loop {
            if self.is_killed() {
                return WaitOutcome::Interrupted;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WaitOutcome::Elapsed;
                    }
                    (deadline - now).min(poll)
                }
                None => poll,
            };
            self.inner.cv.wait_for(&mut guard, slice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_elapses() {
        let kill = KillSwitch::new();
        let start = Instant::now();
        assert_eq!(
            kill.wait(Duration::from_millis(30), Duration::from_millis(5)),
            WaitOutcome::Elapsed
        );
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_kill_interrupts_wait() {
        let kill = KillSwitch::new();
        let sleeper = {
            let kill = kill.clone();
            thread::spawn(move || kill.wait(Duration::from_secs(60), Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        kill.kill();
        assert_eq!(sleeper.join().unwrap(), WaitOutcome::Interrupted);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_reset() {
        let kill = KillSwitch::new();
        kill.kill();
        assert!(kill.is_killed());
        assert_eq!(kill.wait(Duration::from_secs(1), Duration::from_millis(1)), WaitOutcome::Interrupted);
        kill.reset();
        assert!(!kill.is_killed());
    }
}
