//! Evaluation of resolved expressions against a row.
//!
//! Each node produces its native domain through the per-family
//! evaluators; the `eval_*` views below derive every other domain from it.

use super::error::{ExpressionError, ExpressionResult};
use super::function::Function;
use super::item::{Item, ItemKind, Node};
use super::{arith, cast, compare, math, min_max, misc, string, udf};
use crate::decimal::{Decimal, RoundMode, MAX_SCALE};
use crate::overflow::IntOperand;
use crate::session::{ConditionCode, Session};
use crate::value::{ResultType, Temporal, Value};

/// Everything a node may consult while evaluating: the session, the
/// current row and the values of engine slots.
pub struct EvalContext<'a> {
    pub session: &'a mut Session,
    row: &'a [Value],
    slots: &'a [Value],
}

impl<'a> EvalContext<'a> {
    /// Context without a current row, e.g. for constant folding.
    pub fn new(session: &'a mut Session) -> Self {
        Self {
            session,
            row: &[],
            slots: &[],
        }
    }

    pub fn with_row(session: &'a mut Session, row: &'a [Value]) -> Self {
        Self {
            session,
            row,
            slots: &[],
        }
    }

    pub fn with_slots(mut self, slots: &'a [Value]) -> Self {
        self.slots = slots;
        self
    }

    pub fn row(&self) -> &[Value] {
        self.row
    }
}

/// Rounds a DECIMAL to `decimals` fractional digits, half away from zero.
pub(crate) fn round_to_scale(value: Decimal, decimals: u8) -> Decimal {
    let decimals = decimals.min(MAX_SCALE);
    if value.scale() <= decimals {
        return value;
    }
    let mut rounded = Decimal::ZERO;
    value.round(decimals as i32, RoundMode::HalfUp, &mut rounded);
    rounded
}

impl Item {
    /// Evaluates the node in its native domain.
    pub fn eval(&mut self, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
        let value = self.eval_native(ctx)?;
        Ok(match value {
            Value::Decimal(d) => Value::Decimal(round_to_scale(d, self.attrs.decimals)),
            other => other,
        })
    }

    fn eval_native(&mut self, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
        if !self.fixed {
            return Err(ExpressionError::NotFixed {
                expression: self.to_string(),
            });
        }
        let Item {
            kind,
            args,
            attrs,
            state,
            ..
        } = self;
        let value = match kind {
            ItemKind::Literal { value, .. } => value.clone(),
            ItemKind::Column { index, .. } => ctx.row.get(*index).cloned().ok_or(
                ExpressionError::ColumnIndexOutOfBounds {
                    index: *index,
                    row_size: ctx.row.len(),
                },
            )?,
            ItemKind::Slot { kind, index } => {
                ctx.slots
                    .get(*index)
                    .cloned()
                    .ok_or(ExpressionError::UnboundSlot {
                        kind: kind.as_str(),
                        index: *index,
                    })?
            }
            ItemKind::Row => return Err(ExpressionError::OperandColumns { expected: 1 }),
            ItemKind::Udf(call) => udf::evaluate(call, Node { args, attrs, state }, ctx)?,
            ItemKind::Func(function) => {
                let node = Node { args, attrs, state };
                match *function {
                    Function::Arith(op) => arith::evaluate(op, node, ctx)?,
                    Function::Compare(op) => compare::evaluate_compare(op, node, ctx)?,
                    Function::Logic(op) => compare::evaluate_logic(op, node, ctx)?,
                    Function::Math(f) => math::evaluate(f, node, ctx)?,
                    Function::Bit(op) => math::evaluate_bit(op, node, ctx)?,
                    Function::Str(f) => string::evaluate(f, node, ctx)?,
                    Function::MinMax(op) => min_max::evaluate(op, node, ctx)?,
                    Function::Cast(target) => cast::evaluate(target, node, ctx)?,
                    Function::Misc(f) => misc::evaluate(f, node, ctx)?,
                }
            }
        };
        self.null_value = value.is_null();
        Ok(value)
    }

    /// Integer view, read with the node's signedness.
    pub fn eval_int(&mut self, ctx: &mut EvalContext<'_>) -> ExpressionResult<Option<i64>> {
        let value = self.eval_native(ctx)?;
        if value.is_null() {
            return Ok(None);
        }
        let (v, note) = value.to_int(self.attrs.unsigned);
        if let Some(note) = note {
            ctx.session.report_conversion(note);
        }
        Ok(Some(v))
    }

    pub(crate) fn eval_int_operand(
        &mut self,
        ctx: &mut EvalContext<'_>,
    ) -> ExpressionResult<Option<IntOperand>> {
        let unsigned = self.attrs.unsigned;
        Ok(self.eval_int(ctx)?.map(|value| IntOperand { value, unsigned }))
    }

    pub fn eval_real(&mut self, ctx: &mut EvalContext<'_>) -> ExpressionResult<Option<f64>> {
        let value = self.eval_native(ctx)?;
        if value.is_null() {
            return Ok(None);
        }
        let (v, note) = value.to_real();
        if let Some(note) = note {
            ctx.session.report_conversion(note);
        }
        Ok(Some(v))
    }

    pub fn eval_decimal(&mut self, ctx: &mut EvalContext<'_>) -> ExpressionResult<Option<Decimal>> {
        let value = self.eval_native(ctx)?;
        if value.is_null() {
            return Ok(None);
        }
        let (v, note) = value.to_decimal();
        if let Some(note) = note {
            ctx.session.report_conversion(note);
        }
        Ok(Some(match value {
            Value::Decimal(_) => round_to_scale(v, self.attrs.decimals),
            _ => v,
        }))
    }

    pub fn eval_str(&mut self, ctx: &mut EvalContext<'_>) -> ExpressionResult<Option<String>> {
        let value = self.eval_native(ctx)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(value.to_text(self.attrs.decimals)))
    }

    /// Temporal view. Values that are not valid dates or times are NULL
    /// with a warning.
    pub fn eval_temporal(&mut self, ctx: &mut EvalContext<'_>) -> ExpressionResult<Option<Temporal>> {
        let value = self.eval_native(ctx)?;
        if value.is_null() {
            return Ok(None);
        }
        match value.to_temporal() {
            Some(t) => Ok(Some(t)),
            None => {
                ctx.session.push_warning(
                    ConditionCode::TruncatedWrongValue,
                    format!("Incorrect datetime value: '{}'", value.to_text(self.attrs.decimals)),
                );
                self.null_value = true;
                Ok(None)
            }
        }
    }

    /// Truth value: non-zero is true.
    pub fn eval_bool(&mut self, ctx: &mut EvalContext<'_>) -> ExpressionResult<Option<bool>> {
        match self.attrs.result_type {
            ResultType::Int => Ok(self.eval_int(ctx)?.map(|v| v != 0)),
            ResultType::Decimal => Ok(self.eval_decimal(ctx)?.map(|d| !d.is_zero())),
            _ => Ok(self.eval_real(ctx)?.map(|v| v != 0.0)),
        }
    }
}
