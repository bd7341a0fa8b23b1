//! CAST(x AS SIGNED | UNSIGNED | DECIMAL(p,s) | DOUBLE).

use super::error::{ExpressionError, ExpressionResult};
use super::eval::EvalContext;
use super::function::CastTarget;
use super::item::{Node, TypeAttributes};
use crate::decimal::{Decimal, RoundMode, MAX_PRECISION, MAX_SCALE};
use crate::session::{ConditionCode, Session};
use crate::value::{Value, NOT_FIXED_DEC};
use std::cmp::Ordering;

/// Precision of `DECIMAL` without an explicit one.
const DEFAULT_DECIMAL_PRECISION: u8 = 10;

fn decimal_shape(precision: u8, scale: u8) -> ExpressionResult<(u8, u8)> {
    let precision = if precision == 0 {
        DEFAULT_DECIMAL_PRECISION
    } else {
        precision
    };
    if precision > MAX_PRECISION {
        return Err(ExpressionError::InvalidArgument {
            message: format!(
                "Too-big precision {} specified for 'cast'. Maximum is {}.",
                precision, MAX_PRECISION
            ),
        });
    }
    if scale > MAX_SCALE {
        return Err(ExpressionError::InvalidArgument {
            message: format!(
                "Too big scale {} specified for 'cast'. Maximum is {}.",
                scale, MAX_SCALE
            ),
        });
    }
    if scale > precision {
        return Err(ExpressionError::InvalidArgument {
            message: "For float(M,D), double(M,D) or decimal(M,D), M must be >= D (column 'cast')."
                .to_string(),
        });
    }
    Ok((precision, scale))
}

pub(super) fn resolve(target: CastTarget, node: Node<'_>, _session: &mut Session) -> ExpressionResult<()> {
    let attrs = match target {
        CastTarget::Signed => TypeAttributes::bigint(false),
        CastTarget::Unsigned => TypeAttributes::bigint(true),
        CastTarget::Decimal { precision, scale } => {
            let (precision, scale) = decimal_shape(precision, scale)?;
            TypeAttributes::decimal(precision, scale, false)
        }
        CastTarget::Double => TypeAttributes::real(NOT_FIXED_DEC),
    };
    *node.attrs = attrs.nullable(node.attrs.nullable);
    Ok(())
}

/// Whether the value is below zero, before any conversion.
fn is_negative(value: &Value) -> bool {
    match value {
        Value::Int(v) => *v < 0,
        Value::Real(v) => *v < 0.0,
        Value::Decimal(d) => d.is_negative(),
        Value::String(s) => s.trim_start().starts_with('-'),
        Value::Null | Value::UInt(_) | Value::Temporal(_) => false,
    }
}

pub(super) fn evaluate(
    target: CastTarget,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    let arg = &mut node.args[0];
    match target {
        CastTarget::Signed | CastTarget::Unsigned => {
            let value = arg.eval(ctx)?;
            if value.is_null() {
                return Ok(Value::Null);
            }
            let negative = is_negative(&value);
            let unsigned = target == CastTarget::Unsigned;
            let (pattern, note) = value.to_int(unsigned && !negative);
            if let Some(note) = note {
                ctx.session.report_conversion(note);
            }
            if unsigned {
                if negative && pattern < 0 {
                    ctx.session.push_note(
                        ConditionCode::Unknown,
                        "Cast to unsigned converted negative integer to it's positive complement",
                    );
                }
                Ok(Value::UInt(pattern as u64))
            } else {
                if !negative && pattern < 0 {
                    ctx.session.push_note(
                        ConditionCode::Unknown,
                        "Cast to signed converted positive out-of-range integer to negative",
                    );
                }
                Ok(Value::Int(pattern))
            }
        }
        CastTarget::Decimal { .. } => {
            let Some(d) = arg.eval_decimal(ctx)? else {
                return Ok(Value::Null);
            };
            let (precision, scale) = (node.attrs.precision, node.attrs.decimals);
            let mut rounded = Decimal::ZERO;
            d.round(scale as i32, RoundMode::HalfUp, &mut rounded);
            let max = Decimal::max_value(precision, scale);
            if rounded.abs().compare(&max) == Ordering::Greater {
                ctx.session.push_warning(
                    ConditionCode::WarnDataOutOfRange,
                    format!(
                        "Out of range value for column 'cast({} as decimal({},{}))' at row 1",
                        arg, precision, scale
                    ),
                );
                rounded = if rounded.is_negative() { max.negate() } else { max };
            }
            Ok(Value::Decimal(rounded))
        }
        CastTarget::Double => Ok(arg.eval_real(ctx)?.map_or(Value::Null, Value::Real)),
    }
}
