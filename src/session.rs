//! Session context threaded through type resolution and evaluation.

pub mod diagnostics;

pub use diagnostics::{ConditionCode, Diagnostics, Level, Warning};

use crate::charset::CollationId;
use crate::concurrency::{
    AcquireOutcome, KillSwitch, LockError, LockKey, RandSeed, RandSeedEvent, RandState,
    ReleaseOutcome,
};
use crate::expression::{ExpressionError, ExpressionResult};
use crate::server::ServerContext;
use crate::value::ConversionNote;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::BitOr;
use std::sync::Arc;
use std::time::Duration;

/// Session SQL mode flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SqlMode(u32);

impl SqlMode {
    pub const NONE: SqlMode = SqlMode(0);
    /// Division and modulo by zero raise an error instead of a warning.
    pub const ERROR_FOR_DIVISION_BY_ZERO: SqlMode = SqlMode(1 << 0);
    /// `-` on two unsigned operands produces a signed result.
    pub const NO_UNSIGNED_SUBTRACTION: SqlMode = SqlMode(1 << 1);
    /// Numeric overflow raises an error instead of a warning.
    pub const STRICT: SqlMode = SqlMode(1 << 2);

    pub fn contains(&self, other: SqlMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: SqlMode) {
        self.0 |= other.0;
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl BitOr for SqlMode {
    type Output = SqlMode;

    fn bitor(self, rhs: SqlMode) -> SqlMode {
        SqlMode(self.0 | rhs.0)
    }
}

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub sql_mode: SqlMode,
    /// Extra fractional digits produced by `/`.
    pub div_precision_increment: u8,
    /// Deepest expression tree accepted by type resolution.
    pub max_expression_depth: usize,
    /// Collation of string literals without an explicit one.
    #[serde(skip)]
    pub collation: CollationId,
}

impl SessionConfig {
    pub const MAX_DIV_PRECISION_INCREMENT: u8 = 30;

    pub fn with_sql_mode(mut self, mode: SqlMode) -> Self {
        self.sql_mode.insert(mode);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sql_mode: SqlMode::NONE,
            div_precision_increment: 4,
            max_expression_depth: 1024,
            collation: CollationId::default(),
        }
    }
}

/// Per-connection state consulted by expression nodes.
///
/// A session is owned by one thread; only its [`KillSwitch`] is shared so
/// another thread can interrupt it.
pub struct Session {
    id: u32,
    config: SessionConfig,
    diagnostics: Diagnostics,
    kill: KillSwitch,
    rand: RandState,
    rand_seed_event: Option<RandSeedEvent>,
    /// Advisory locks held, with re-entrant acquisition counts.
    user_locks: HashMap<LockKey, u32>,
    server: Arc<ServerContext>,
}

impl Session {
    pub(crate) fn new(id: u32, config: SessionConfig, server: Arc<ServerContext>) -> Self {
        let mut config = config;
        config.div_precision_increment = config
            .div_precision_increment
            .min(SessionConfig::MAX_DIV_PRECISION_INCREMENT);
        Session {
            id,
            config,
            diagnostics: Diagnostics::new(),
            kill: KillSwitch::new(),
            rand: RandState::from_entropy(id),
            rand_seed_event: None,
            user_locks: HashMap::new(),
            server,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn sql_mode(&self) -> SqlMode {
        self.config.sql_mode
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn server(&self) -> &Arc<ServerContext> {
        &self.server
    }

    /// Handle that other threads can use to kill this session.
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    pub fn is_killed(&self) -> bool {
        self.kill.is_killed()
    }

    /// Clears per-statement state: diagnostics, the recorded random seed
    /// and a kill flag left over from an aborted statement.
    pub fn begin_statement(&mut self) {
        self.diagnostics.clear();
        self.rand_seed_event = None;
        self.kill.reset();
    }

    pub fn push_warning(&mut self, code: ConditionCode, message: impl Into<String>) {
        self.diagnostics.push(Level::Warning, code, message);
    }

    pub fn push_note(&mut self, code: ConditionCode, message: impl Into<String>) {
        self.diagnostics.push(Level::Note, code, message);
    }

    /// Reports a division by zero: an error with
    /// `ERROR_FOR_DIVISION_BY_ZERO`, a warning otherwise.
    pub fn signal_division_by_zero(&mut self) -> ExpressionResult<()> {
        if self.config.sql_mode.contains(SqlMode::ERROR_FOR_DIVISION_BY_ZERO) {
            return Err(ExpressionError::DivisionByZero);
        }
        self.push_warning(ConditionCode::DivisionByZero, "Division by 0");
        Ok(())
    }

    /// Reports a numeric overflow: an error in strict mode, a warning
    /// otherwise.
    pub fn signal_overflow(
        &mut self,
        type_name: &'static str,
        expression: String,
    ) -> ExpressionResult<()> {
        if self.config.sql_mode.contains(SqlMode::STRICT) {
            return Err(ExpressionError::NumericOutOfRange {
                type_name,
                expression,
            });
        }
        self.push_warning(
            ConditionCode::DataOutOfRange,
            format!("{} value is out of range in '{}'", type_name, expression),
        );
        Ok(())
    }

    /// Reports a lossy implicit conversion. Never fatal.
    pub fn report_conversion(&mut self, note: ConversionNote) {
        let code = match note {
            ConversionNote::Truncated { .. } => ConditionCode::TruncatedWrongValue,
            ConversionNote::OutOfRange { .. } => ConditionCode::WarnDataOutOfRange,
        };
        self.push_warning(code, note.to_string());
    }

    /// The session random generator used by unseeded `RAND()`.
    pub fn rand_state(&mut self) -> &mut RandState {
        &mut self.rand
    }

    /// Remembers the session seeds the first time a statement resolves an
    /// unseeded `RAND()`.
    pub fn record_rand_seed(&mut self) {
        if self.rand_seed_event.is_none() {
            self.rand_seed_event = Some(RandSeedEvent {
                seed: self.rand.seed(),
            });
        }
    }

    pub fn take_rand_seed_event(&mut self) -> Option<RandSeedEvent> {
        self.rand_seed_event.take()
    }

    /// Replays seeds recorded by another session.
    pub fn restore_rand_seed(&mut self, seed: RandSeed) {
        self.rand = RandState::restore(seed);
    }

    /// Acquires the advisory lock `name`, re-entrantly.
    pub fn get_user_lock(
        &mut self,
        name: &str,
        timeout: Duration,
    ) -> Result<AcquireOutcome, LockError> {
        let key = LockKey::user_level(name)?;
        if let Some(count) = self.user_locks.get_mut(&key) {
            *count += 1;
            return Ok(AcquireOutcome::Granted);
        }
        let outcome = self
            .server
            .user_locks()
            .acquire(&key, self.id, timeout, &self.kill);
        if outcome == AcquireOutcome::Granted {
            self.user_locks.insert(key, 1);
        }
        Ok(outcome)
    }

    /// Drops one reference to the advisory lock `name`.
    ///
    /// `Some(true)` when this session held it, `Some(false)` when another
    /// session does, `None` when nobody holds it.
    pub fn release_user_lock(&mut self, name: &str) -> Result<Option<bool>, LockError> {
        let key = LockKey::user_level(name)?;
        if let Some(count) = self.user_locks.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.user_locks.remove(&key);
                if self.server.user_locks().release(&key, self.id) == ReleaseOutcome::NotHeld {
                    warn!("session {} lost advisory lock '{}'", self.id, key.name);
                }
            }
            return Ok(Some(true));
        }
        Ok(self
            .server
            .user_locks()
            .query_owner(&key)
            .map(|_| false))
    }

    /// Session holding the advisory lock `name`, if any.
    pub fn user_lock_owner(&self, name: &str) -> Result<Option<u32>, LockError> {
        let key = LockKey::user_level(name)?;
        Ok(self.server.user_locks().query_owner(&key))
    }

    /// Releases every advisory lock of this session, returning the number
    /// of references dropped.
    pub fn release_all_user_locks(&mut self) -> u64 {
        let mut released = 0u64;
        for (key, count) in self.user_locks.drain() {
            self.server.user_locks().release(&key, self.id);
            released += count as u64;
        }
        released
    }

    /// Re-entrant acquisition count of `name` in this session.
    pub fn user_lock_count(&self, name: &str) -> u32 {
        LockKey::user_level(name)
            .ok()
            .and_then(|key| self.user_locks.get(&key).copied())
            .unwrap_or(0)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let released = self.release_all_user_locks();
        if released > 0 {
            debug!(
                "session {} ended holding {} advisory lock reference(s)",
                self.id, released
            );
        }
    }
}
