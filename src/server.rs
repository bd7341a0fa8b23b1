//! Process-wide state shared by all sessions.

use crate::concurrency::{UserLockManager, UuidShortGenerator};
use crate::expression::udf::FunctionRegistry;
use crate::session::{Session, SessionConfig};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Server-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Identity of this server in a fleet; the low byte feeds `UUID_SHORT()`.
    pub server_id: u32,
    /// Startup time, seconds since the epoch.
    pub start_time: u64,
    /// Longest a blocked advisory-lock waiter goes without checking its
    /// kill flag.
    pub kill_poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            server_id: 1,
            start_time,
            kill_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Shared collaborators of the scalar functions: the advisory lock
/// manager, the `UUID_SHORT()` counter and the plugin registry.
pub struct ServerContext {
    config: ServerConfig,
    user_locks: UserLockManager,
    uuid_short: UuidShortGenerator,
    functions: FunctionRegistry,
    next_session_id: AtomicU32,
}

impl ServerContext {
    /// Builds the shared state at server startup.
    pub fn init(config: ServerConfig) -> Arc<Self> {
        info!(
            "server {} starting (start time {})",
            config.server_id, config.start_time
        );
        Arc::new(Self {
            user_locks: UserLockManager::with_poll_interval(config.kill_poll_interval),
            uuid_short: UuidShortGenerator::new(config.server_id, config.start_time),
            functions: FunctionRegistry::new(),
            next_session_id: AtomicU32::new(1),
            config,
        })
    }

    /// Opens a session with a fresh connection id.
    pub fn new_session(self: &Arc<Self>, config: SessionConfig) -> Session {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        Session::new(id, config, Arc::clone(self))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn user_locks(&self) -> &UserLockManager {
        &self.user_locks
    }

    pub fn uuid_short(&self) -> &UuidShortGenerator {
        &self.uuid_short
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Shuts the shared state down. Sessions still alive at this point
    /// keep their locks until they are dropped.
    pub fn teardown(&self) {
        let held = self.user_locks.held_count();
        if held > 0 {
            warn!("server teardown with {} advisory lock(s) still held", held);
        }
        let plugins = self.functions.len();
        self.functions.clear();
        info!(
            "server {} stopped ({} plugin function(s) unregistered)",
            self.config.server_id, plugins
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let server = ServerContext::init(ServerConfig::default());
        let a = server.new_session(SessionConfig::default());
        let b = server.new_session(SessionConfig::default());
        assert_ne!(a.id(), b.id());
        assert!(Arc::ptr_eq(a.server(), &server));
    }

    #[test]
    fn test_uuid_short_uses_server_identity() {
        let server = ServerContext::init(ServerConfig {
            server_id: 0x1_07,
            start_time: 1000,
            kill_poll_interval: Duration::from_millis(10),
        });
        let id = server.uuid_short().next();
        assert_eq!(id >> 56, 7);
        assert_eq!((id >> 24) & 0xFFFF_FFFF, 1000);
    }

    #[test]
    fn test_teardown() {
        let server = ServerContext::init(ServerConfig::default());
        server.teardown();
        assert_eq!(server.functions().len(), 0);
    }
}
