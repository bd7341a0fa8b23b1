//! One-time, bottom-up type resolution.

use super::error::{ExpressionError, ExpressionResult};
use super::function::{Function, LogicOp};
use super::item::{Item, ItemKind, Node, TypeAttributes};
use super::{arith, cast, compare, math, min_max, misc, string, udf};
use crate::session::Session;
use log::{debug, trace};

impl Item {
    /// Resolves the types of the tree. Calling it again on a resolved node
    /// is a no-op.
    pub fn fix_fields(&mut self, session: &mut Session) -> ExpressionResult<()> {
        self.fix_at_depth(session, 0)
    }

    fn fix_at_depth(&mut self, session: &mut Session, depth: usize) -> ExpressionResult<()> {
        if self.fixed {
            return Ok(());
        }
        let limit = session.config().max_expression_depth;
        if depth >= limit {
            return Err(ExpressionError::StackOverrun { limit });
        }

        let mut flags = self.flags;
        let mut nullable = false;
        let mut constant = true;
        for arg in self.args.iter_mut() {
            arg.fix_at_depth(session, depth + 1)?;
            flags = flags.union(arg.flags);
            nullable |= arg.attrs.nullable;
            constant &= arg.constant;
        }
        self.check_arg_count()?;
        self.check_arg_cols()?;

        match &self.kind {
            ItemKind::Func(function) if !function.is_deterministic() => {
                flags.nondeterministic = true;
            }
            ItemKind::Udf(call) if !call.is_deterministic() => flags.nondeterministic = true,
            _ => {}
        }
        self.flags = flags;
        self.constant = match &self.kind {
            ItemKind::Literal { .. } => true,
            ItemKind::Column { .. } | ItemKind::Slot { .. } => false,
            _ => constant && !flags.nondeterministic,
        };

        self.fix_length_and_dec(session, nullable)?;
        self.fixed = true;
        if let ItemKind::Func(function) = &self.kind {
            debug!(
                "{} resolved to {}{}",
                function.name(),
                self.attrs.result_type,
                if self.attrs.unsigned { " unsigned" } else { "" }
            );
        }
        trace!(
            "resolved {} as {} (len {}, dec {}, unsigned {})",
            self,
            self.attrs.result_type,
            self.attrs.max_length,
            self.attrs.decimals,
            self.attrs.unsigned
        );
        Ok(())
    }

    fn check_arg_count(&self) -> ExpressionResult<()> {
        let ItemKind::Func(function) = &self.kind else {
            return Ok(());
        };
        let (min, max) = function.arg_count();
        let n = self.args.len();
        if n < min || max.is_some_and(|max| n > max) {
            return Err(ExpressionError::ArgumentCount {
                function: function.name().to_string(),
                actual: n,
            });
        }
        Ok(())
    }

    /// Rows are only accepted by comparisons, with equal arity on both sides.
    fn check_arg_cols(&self) -> ExpressionResult<()> {
        match &self.kind {
            ItemKind::Row => Ok(()),
            ItemKind::Func(Function::Compare(_)) => same_shape(&self.args[0], &self.args[1]),
            ItemKind::Func(Function::Logic(LogicOp::IsNull | LogicOp::IsNotNull)) => Ok(()),
            _ => {
                for arg in self.args.iter() {
                    if arg.cols() != 1 {
                        return Err(ExpressionError::OperandColumns { expected: 1 });
                    }
                }
                Ok(())
            }
        }
    }

    fn fix_length_and_dec(&mut self, session: &mut Session, nullable: bool) -> ExpressionResult<()> {
        let Item {
            kind,
            args,
            attrs,
            state,
            ..
        } = self;
        match kind {
            ItemKind::Literal { value, collation } => {
                *attrs = TypeAttributes::of_value(
                    value,
                    collation.unwrap_or(session.config().collation),
                );
                Ok(())
            }
            ItemKind::Column { .. } | ItemKind::Slot { .. } => Ok(()),
            ItemKind::Row => {
                attrs.nullable = nullable;
                Ok(())
            }
            ItemKind::Udf(call) => {
                attrs.nullable = nullable;
                udf::resolve(call, Node { args, attrs, state }, session)
            }
            ItemKind::Func(function) => {
                let function = *function;
                attrs.nullable = nullable;
                let node = Node { args, attrs, state };
                match function {
                    Function::Arith(op) => arith::resolve(op, node, session)?,
                    Function::Compare(op) => compare::resolve_compare(op, node, session)?,
                    Function::Logic(op) => compare::resolve_logic(op, node, session)?,
                    Function::Math(f) => math::resolve(f, node, session)?,
                    Function::Bit(op) => math::resolve_bit(op, node, session)?,
                    Function::Str(f) => string::resolve(f, node, session)?,
                    Function::MinMax(op) => min_max::resolve(op, node, session)?,
                    Function::Cast(target) => cast::resolve(target, node, session)?,
                    Function::Misc(f) => misc::resolve(f, node, session)?,
                }
                Ok(())
            }
        }
    }
}

/// Checks that two comparison operands have the same row structure.
fn same_shape(left: &Item, right: &Item) -> ExpressionResult<()> {
    if left.cols() != right.cols() {
        return Err(ExpressionError::OperandColumns {
            expected: left.cols(),
        });
    }
    if left.cols() > 1 {
        for i in 0..left.cols() {
            same_shape(left.element(i), right.element(i))?;
        }
    } else if left.element(0).cols() != 1 || right.element(0).cols() != 1 {
        return Err(ExpressionError::OperandColumns { expected: 1 });
    }
    Ok(())
}
