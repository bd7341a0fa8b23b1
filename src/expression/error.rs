//! Error types for type resolution and evaluation.

use crate::concurrency::LockError;
use thiserror::Error;

/// Errors that abort preparing or executing a statement.
///
/// Row-scoped numeric problems are normally reported as warnings in the
/// session diagnostics; they only surface here when strict mode promotes
/// them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// The expression tree is nested deeper than the session allows
    #[error("Thread stack overrun: expression nesting exceeds {limit} levels")]
    StackOverrun { limit: usize },

    /// Row operand where a scalar is expected, or rows of different arity
    #[error("Operand should contain {expected} column(s)")]
    OperandColumns { expected: usize },

    /// Wrong number of function arguments
    #[error("Incorrect parameter count in the call to native function '{function}'")]
    ArgumentCount { function: String, actual: usize },

    /// Invalid function name
    #[error("FUNCTION {name} does not exist")]
    UnknownFunction { name: String },

    /// The plugin rejected its arguments at initialization
    #[error("Can't initialize function '{name}'; {message}")]
    UdfInit { name: String, message: String },

    /// Invalid CAST target or literal
    #[error("{message}")]
    InvalidArgument { message: String },

    /// Column index out of bounds
    #[error("Column index {index} out of bounds for row with {row_size} columns")]
    ColumnIndexOutOfBounds { index: usize, row_size: usize },

    /// Engine slot not supplied by the caller
    #[error("No value bound for {kind} slot {index}")]
    UnboundSlot { kind: &'static str, index: usize },

    /// Evaluation requested before type resolution
    #[error("Expression '{expression}' evaluated before fix_fields")]
    NotFixed { expression: String },

    /// Division by zero in strict mode
    #[error("Division by 0")]
    DivisionByZero,

    /// Numeric overflow in strict mode
    #[error("{type_name} value is out of range in '{expression}'")]
    NumericOutOfRange {
        type_name: &'static str,
        expression: String,
    },

    /// The statement was killed while evaluating
    #[error("Query execution was interrupted")]
    Interrupted,

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Result type for expression operations
pub type ExpressionResult<T> = Result<T, ExpressionError>;
