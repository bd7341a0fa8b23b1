//! Concurrency primitives behind the blocking and shared-state functions.
//!
//! This module provides:
//! - Named advisory locks shared by all sessions
//! - Session kill flags and interruptible waits
//! - The `RAND()` generator state
//! - The `UUID_SHORT()` counter

pub mod kill;
pub mod random;
pub mod user_lock;
pub mod uuid_short;

pub use kill::{KillSwitch, WaitOutcome};
pub use random::{RandSeed, RandSeedEvent, RandState};
pub use user_lock::{
    AcquireOutcome, LockError, LockKey, LockNamespace, ReleaseOutcome, UserLockManager,
};
pub use uuid_short::UuidShortGenerator;
