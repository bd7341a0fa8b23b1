//! Numeric functions and bit operators.

use super::error::ExpressionResult;
use super::eval::EvalContext;
use super::function::{BitOp, Function, MathFunc};
use super::item::{int_value, Args, Item, Node, TypeAttributes};
use crate::decimal::{Decimal, DecimalStatus, RoundMode, MAX_PRECISION, MAX_SCALE};
use crate::overflow::check_float;
use crate::session::{ConditionCode, Session, SqlMode};
use crate::value::{ResultType, Value, NOT_FIXED_DEC};

/// Integer digits from which CEILING/FLOOR of a DECIMAL stays DECIMAL.
const CEIL_DECIMAL_INT_PART: u8 = 18;

/// Integer precision from which ROUND/TRUNCATE of an INT become DECIMAL.
const ROUND_INT_PRECISION: u8 = 19;

fn describe(f: MathFunc, args: &Args) -> String {
    let list: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    format!("{}({})", Function::Math(f).name(), list.join(","))
}

/// Requested number of decimals of ROUND/TRUNCATE; an unsigned count
/// beyond `i64::MAX` saturates.
fn read_decimals(item: &mut Item, ctx: &mut EvalContext<'_>) -> ExpressionResult<Option<i64>> {
    let unsigned = item.attrs.unsigned;
    Ok(item
        .eval_int(ctx)?
        .map(|d| if unsigned && d < 0 { i64::MAX } else { d }))
}

pub(super) fn resolve(f: MathFunc, node: Node<'_>, session: &mut Session) -> ExpressionResult<()> {
    let nullable = node.attrs.nullable;
    let attrs = match f {
        MathFunc::Ceiling | MathFunc::Floor => {
            let a = node.args[0].attrs;
            match a.numeric_context() {
                ResultType::Int => TypeAttributes::int(a.precision.max(1), a.unsigned),
                ResultType::Decimal => {
                    let int_part = a.decimal_int_part() + (a.decimal_scale() > 0) as u8;
                    if int_part >= CEIL_DECIMAL_INT_PART {
                        TypeAttributes::decimal(int_part, 0, a.unsigned)
                    } else {
                        TypeAttributes::int(int_part.max(1), a.unsigned)
                    }
                }
                _ => TypeAttributes::real(0),
            }
        }
        MathFunc::Round | MathFunc::Truncate => {
            return resolve_round(f == MathFunc::Truncate, node, session);
        }
        MathFunc::Sign => TypeAttributes::int(1, false),
        MathFunc::Pi => TypeAttributes::real(6),
        MathFunc::Sin | MathFunc::Cos | MathFunc::Atan | MathFunc::Degrees | MathFunc::Radians => {
            TypeAttributes::real(NOT_FIXED_DEC)
        }
        _ => TypeAttributes::real(NOT_FIXED_DEC).nullable(true),
    };
    *node.attrs = attrs.nullable(nullable || attrs.nullable);
    Ok(())
}

fn resolve_round(truncate: bool, node: Node<'_>, session: &mut Session) -> ExpressionResult<()> {
    let a = node.args[0].attrs;
    let nullable = node.attrs.nullable;
    let decimals = match node.args.get_mut(1) {
        None => Some(0),
        Some(arg) if arg.constant => {
            let mut ctx = EvalContext::new(session);
            Some(read_decimals(arg, &mut ctx)?.unwrap_or(0))
        }
        Some(_) => None,
    };

    let attrs = match decimals {
        None if a.numeric_context() == ResultType::Decimal => {
            TypeAttributes::decimal(a.decimal_precision(), a.decimal_scale(), a.unsigned)
        }
        None => TypeAttributes::real(NOT_FIXED_DEC),
        Some(dec) => {
            let wanted = dec.clamp(0, NOT_FIXED_DEC as i64) as u8;
            let context = a.numeric_context();
            if context == ResultType::Real {
                TypeAttributes::real(wanted)
            } else if context == ResultType::Int
                && ((wanted == 0 && truncate) || a.decimal_precision() < ROUND_INT_PRECISION)
            {
                let can_grow = !truncate && dec < 0 && !a.unsigned;
                TypeAttributes::int(a.precision.max(1) + can_grow as u8, a.unsigned)
            } else {
                let scale = wanted.min(MAX_SCALE);
                let delta = a.decimal_scale() as i32 - scale as i32;
                let grow = (delta > 0 && !truncate) as i32;
                let precision = (a.decimal_precision() as i32 - delta + grow)
                    .clamp(scale.max(1) as i32, MAX_PRECISION as i32);
                TypeAttributes::decimal(precision as u8, scale, a.unsigned)
            }
        }
    };
    *node.attrs = attrs.nullable(nullable);
    Ok(())
}

pub(super) fn evaluate(
    f: MathFunc,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    match f {
        MathFunc::Ceiling | MathFunc::Floor => return evaluate_ceil_floor(f, node, ctx),
        MathFunc::Round | MathFunc::Truncate => return evaluate_round(f, node, ctx),
        MathFunc::Pi => return Ok(Value::Real(std::f64::consts::PI)),
        _ => {}
    }

    let Some(x) = node.args[0].eval_real(ctx)? else {
        return Ok(Value::Null);
    };
    let second = match node.args.get_mut(1) {
        Some(arg) => match arg.eval_real(ctx)? {
            Some(y) => Some(y),
            None => return Ok(Value::Null),
        },
        None => None,
    };

    let value = match f {
        MathFunc::Sign => return Ok(Value::Int(if x > 0.0 { 1 } else if x < 0.0 { -1 } else { 0 })),
        MathFunc::Ln => match log_of(x, ctx)? {
            Some(v) => v,
            None => return Ok(Value::Null),
        },
        MathFunc::Log => match second {
            None => match log_of(x, ctx)? {
                Some(v) => v,
                None => return Ok(Value::Null),
            },
            Some(y) => {
                let (Some(base), Some(v)) = (log_of(x, ctx)?, log_of(y, ctx)?) else {
                    return Ok(Value::Null);
                };
                if base == 0.0 {
                    ctx.session.signal_division_by_zero()?;
                    return Ok(Value::Null);
                }
                v / base
            }
        },
        MathFunc::Log2 => match log_of(x, ctx)? {
            Some(_) => x.log2(),
            None => return Ok(Value::Null),
        },
        MathFunc::Log10 => match log_of(x, ctx)? {
            Some(_) => x.log10(),
            None => return Ok(Value::Null),
        },
        MathFunc::Exp => x.exp(),
        MathFunc::Sqrt if x < 0.0 => return Ok(Value::Null),
        MathFunc::Sqrt => x.sqrt(),
        MathFunc::Pow => x.powf(second.unwrap_or(1.0)),
        MathFunc::Acos | MathFunc::Asin if !(-1.0..=1.0).contains(&x) => return Ok(Value::Null),
        MathFunc::Acos => x.acos(),
        MathFunc::Asin => x.asin(),
        MathFunc::Atan => match second {
            Some(y) => x.atan2(y),
            None => x.atan(),
        },
        MathFunc::Cos => x.cos(),
        MathFunc::Sin => x.sin(),
        MathFunc::Tan => x.tan(),
        MathFunc::Cot => 1.0 / x.tan(),
        MathFunc::Degrees => x.to_degrees(),
        MathFunc::Radians => x.to_radians(),
        MathFunc::Ceiling
        | MathFunc::Floor
        | MathFunc::Round
        | MathFunc::Truncate
        | MathFunc::Pi => unreachable!("handled above"),
    };

    match check_float(value) {
        Ok(v) => Ok(Value::Real(v)),
        Err(_) => {
            ctx.session.signal_overflow("DOUBLE", describe(f, node.args))?;
            Ok(Value::Null)
        }
    }
}

/// Natural logarithm; arguments outside the domain are NULL and signalled
/// like a division by zero.
fn log_of(x: f64, ctx: &mut EvalContext<'_>) -> ExpressionResult<Option<f64>> {
    if x > 0.0 {
        return Ok(Some(x.ln()));
    }
    if ctx.session.sql_mode().contains(SqlMode::ERROR_FOR_DIVISION_BY_ZERO) {
        ctx.session.signal_division_by_zero()?;
    } else {
        ctx.session
            .push_warning(ConditionCode::InvalidLogarithm, "Invalid argument for logarithm");
    }
    Ok(None)
}

fn evaluate_ceil_floor(
    f: MathFunc,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    let arg = &mut node.args[0];
    match arg.attrs.numeric_context() {
        ResultType::Int => Ok(match arg.eval_int(ctx)? {
            Some(v) => int_value(v, node.attrs.unsigned),
            None => Value::Null,
        }),
        ResultType::Decimal => {
            let Some(d) = arg.eval_decimal(ctx)? else {
                return Ok(Value::Null);
            };
            let mut whole = Decimal::ZERO;
            if f == MathFunc::Ceiling {
                d.ceiling(&mut whole);
            } else {
                d.floor(&mut whole);
            }
            if node.attrs.result_type == ResultType::Decimal {
                return Ok(Value::Decimal(whole));
            }
            let (v, status) = whole.to_i64(node.attrs.unsigned, RoundMode::Truncate);
            debug_assert_eq!(status, DecimalStatus::Ok, "integer part exceeds BIGINT");
            Ok(int_value(v, node.attrs.unsigned))
        }
        _ => Ok(match arg.eval_real(ctx)? {
            Some(x) if f == MathFunc::Ceiling => Value::Real(x.ceil()),
            Some(x) => Value::Real(x.floor()),
            None => Value::Null,
        }),
    }
}

/// Rounds a double at `dec` digits; ties go to the even neighbour.
fn round_real(value: f64, dec: i64, truncate: bool) -> f64 {
    let factor = 10f64.powi(dec.unsigned_abs().min(400) as i32);
    if dec < 0 && factor.is_infinite() {
        return 0.0;
    }
    let (scaled, unscale): (f64, fn(f64, f64) -> f64) = if dec < 0 {
        (value / factor, |v, f| v * f)
    } else {
        (value * factor, |v, f| v / f)
    };
    if dec >= 0 && scaled.is_infinite() {
        return value;
    }
    let whole = match (truncate, value >= 0.0) {
        (true, true) => scaled.floor(),
        (true, false) => scaled.ceil(),
        (false, _) => scaled.round_ties_even(),
    };
    unscale(whole, factor)
}

/// Rounds an integer at a negative digit position.
fn round_int(value: i128, dec: i64, truncate: bool) -> i128 {
    if dec >= 0 {
        return value;
    }
    if dec < -20 {
        return 0;
    }
    let factor = 10i128.pow(dec.unsigned_abs() as u32);
    let magnitude = value.abs();
    let rounded = if truncate {
        magnitude / factor * factor
    } else {
        (magnitude + factor / 2) / factor * factor
    };
    if value < 0 {
        -rounded
    } else {
        rounded
    }
}

fn evaluate_round(f: MathFunc, node: Node<'_>, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
    let truncate = f == MathFunc::Truncate;
    let dec = match node.args.get_mut(1) {
        Some(arg) => match read_decimals(arg, ctx)? {
            Some(dec) => dec,
            None => return Ok(Value::Null),
        },
        None => 0,
    };

    match node.attrs.result_type {
        ResultType::Int => {
            let Some(v) = node.args[0].eval_int_operand(ctx)? else {
                return Ok(Value::Null);
            };
            let rounded = round_int(v.to_i128(), dec, truncate);
            let unsigned = node.attrs.unsigned;
            let fits = if unsigned {
                (0..=u64::MAX as i128).contains(&rounded)
            } else {
                (i64::MIN as i128..=i64::MAX as i128).contains(&rounded)
            };
            if fits {
                return Ok(int_value(rounded as i64, unsigned));
            }
            let name = if unsigned { "BIGINT UNSIGNED" } else { "BIGINT" };
            ctx.session.signal_overflow(name, describe(f, node.args))?;
            Ok(Value::Null)
        }
        ResultType::Decimal => {
            let Some(d) = node.args[0].eval_decimal(ctx)? else {
                return Ok(Value::Null);
            };
            let mode = if truncate { RoundMode::Truncate } else { RoundMode::HalfUp };
            let scale = dec.clamp(-(MAX_PRECISION as i64), MAX_SCALE as i64) as i32;
            let mut rounded = Decimal::ZERO;
            match d.round(scale, mode, &mut rounded) {
                DecimalStatus::Overflow => {
                    ctx.session.signal_overflow("DECIMAL", describe(f, node.args))?;
                    Ok(Value::Null)
                }
                _ => Ok(Value::Decimal(rounded)),
            }
        }
        _ => Ok(match node.args[0].eval_real(ctx)? {
            Some(x) => Value::Real(round_real(x, dec, truncate)),
            None => Value::Null,
        }),
    }
}

pub(super) fn resolve_bit(op: BitOp, node: Node<'_>, _session: &mut Session) -> ExpressionResult<()> {
    let attrs = match op {
        BitOp::Count => TypeAttributes::int(2, false),
        _ => TypeAttributes::bigint(true),
    };
    *node.attrs = attrs.nullable(node.attrs.nullable);
    Ok(())
}

fn bits(item: &mut Item, ctx: &mut EvalContext<'_>) -> ExpressionResult<Option<u64>> {
    Ok(item.eval_int(ctx)?.map(|v| v as u64))
}

pub(super) fn evaluate_bit(
    op: BitOp,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    let Some(a) = bits(&mut node.args[0], ctx)? else {
        return Ok(Value::Null);
    };
    let b = match node.args.get_mut(1) {
        Some(arg) => match bits(arg, ctx)? {
            Some(b) => b,
            None => return Ok(Value::Null),
        },
        None => 0,
    };
    Ok(match op {
        BitOp::Not => Value::UInt(!a),
        BitOp::Count => Value::Int(a.count_ones() as i64),
        BitOp::ShiftLeft => Value::UInt(if b < 64 { a << b } else { 0 }),
        BitOp::ShiftRight => Value::UInt(if b < 64 { a >> b } else { 0 }),
        BitOp::And => Value::UInt(a & b),
        BitOp::Or => Value::UInt(a | b),
        BitOp::Xor => Value::UInt(a ^ b),
    })
}
