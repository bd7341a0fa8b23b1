//! Per-statement diagnostics area.

use std::fmt;

/// Severity of a reported condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Note,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Note => "Note",
            Level::Warning => "Warning",
            Level::Error => "Error",
        }
    }
}

/// Condition codes raised by scalar evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionCode {
    /// Advisory notes, e.g. sign reinterpretation in casts
    Unknown,
    /// Wrong arguments to a function (negative timeout, NULL count)
    WrongArguments,
    /// Out-of-range value clamped on conversion
    WarnDataOutOfRange,
    /// String or number truncated on conversion
    TruncatedWrongValue,
    DivisionByZero,
    /// Arithmetic overflow
    DataOutOfRange,
    /// Invalid argument for a logarithm
    InvalidLogarithm,
}

impl ConditionCode {
    pub fn code(&self) -> u16 {
        match self {
            ConditionCode::Unknown => 1105,
            ConditionCode::WrongArguments => 1210,
            ConditionCode::WarnDataOutOfRange => 1264,
            ConditionCode::TruncatedWrongValue => 1292,
            ConditionCode::DivisionByZero => 1365,
            ConditionCode::DataOutOfRange => 1690,
            ConditionCode::InvalidLogarithm => 3020,
        }
    }
}

/// One entry of the diagnostics area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub level: Level,
    pub code: ConditionCode,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.level.as_str(),
            self.code.code(),
            self.message
        )
    }
}

/// Conditions accumulated while a statement runs.
///
/// Keeps at most `limit` entries but counts every condition, like
/// `SHOW WARNINGS` versus `@@warning_count`.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    entries: Vec<Warning>,
    total: usize,
    limit: usize,
}

impl Diagnostics {
    pub const DEFAULT_LIMIT: usize = 64;

    pub fn new() -> Self {
        Self::with_limit(Self::DEFAULT_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            total: 0,
            limit,
        }
    }

    pub fn push(&mut self, level: Level, code: ConditionCode, message: impl Into<String>) {
        self.total += 1;
        if self.entries.len() < self.limit {
            self.entries.push(Warning {
                level,
                code,
                message: message.into(),
            });
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.entries
    }

    /// Number of conditions raised, including the ones not kept.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries.iter().filter(|w| w.level == level).count()
    }

    pub fn last(&self) -> Option<&Warning> {
        self.entries.last()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total = 0;
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_display() {
        let mut diag = Diagnostics::new();
        diag.push(Level::Warning, ConditionCode::DivisionByZero, "Division by 0");
        diag.push(Level::Note, ConditionCode::Unknown, "Cast to unsigned");

        assert_eq!(diag.total(), 2);
        assert_eq!(diag.count(Level::Warning), 1);
        assert_eq!(
            diag.warnings()[0].to_string(),
            "Warning (1365): Division by 0"
        );
        assert_eq!(diag.last().map(|w| w.level), Some(Level::Note));
    }

    #[test]
    fn test_limit_keeps_counting() {
        let mut diag = Diagnostics::with_limit(2);
        for _ in 0..5 {
            diag.push(Level::Warning, ConditionCode::DataOutOfRange, "overflow");
        }
        assert_eq!(diag.warnings().len(), 2);
        assert_eq!(diag.total(), 5);

        diag.clear();
        assert!(diag.is_empty());
        assert!(diag.warnings().is_empty());
    }
}
