//! Typed scalar expressions for query execution.
//!
//! This module provides:
//! - The expression node ([`Item`]) and its resolved type attributes
//! - One-time, bottom-up type resolution (`fix_fields`)
//! - Row-by-row evaluation with SQL-mode dependent warnings and errors
//! - Arithmetic, comparison, math, string, cast and session functions
//! - A bridge to externally registered scalar functions

pub mod error;
pub mod eval;
pub mod function;
pub mod item;
pub mod udf;

mod arith;
mod cast;
mod compare;
mod math;
mod min_max;
mod misc;
mod resolve;
mod string;

pub use compare::CmpType;
pub use error::{ExpressionError, ExpressionResult};
pub use eval::EvalContext;
pub use function::{
    ArithOp, BitOp, CastTarget, CompareOp, Function, LogicOp, MathFunc, MinMaxOp, MiscFunc,
    StrFunc,
};
pub use item::{Args, Item, ItemFlags, ItemKind, SlotKind, TypeAttributes};
pub use udf::{FunctionRegistry, ScalarFunction, UdfCall};
