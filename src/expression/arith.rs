//! Arithmetic operators.
//!
//! Operands are promoted to a common domain at resolution: REAL if either
//! side is REAL or a string, else DECIMAL if either side is DECIMAL or a
//! temporal with fractional seconds, else INT. Integer arithmetic checks
//! for overflow before producing a value; an overflowing row is NULL with a
//! warning, or an error in strict mode.

use super::error::ExpressionResult;
use super::eval::EvalContext;
use super::function::ArithOp;
use super::item::{int_value, pair, Item, Node, TypeAttributes};
use crate::decimal::{Decimal, DecimalStatus, RoundMode, MAX_PRECISION, MAX_SCALE};
use crate::overflow::{self, fit_integer, IntOperand, IntOverflow};
use crate::session::{Session, SqlMode};
use crate::value::{ResultType, Value, NOT_FIXED_DEC};

/// Widest display precision of an integer result.
const MAX_INT_PRECISION: u8 = 20;

/// Domain both operands are converted to.
pub(crate) fn numeric_domain(a: &TypeAttributes, b: &TypeAttributes) -> ResultType {
    match (a.numeric_context(), b.numeric_context()) {
        (ResultType::Real, _) | (_, ResultType::Real) => ResultType::Real,
        (ResultType::Decimal, _) | (_, ResultType::Decimal) => ResultType::Decimal,
        _ => ResultType::Int,
    }
}

fn real_decimals(a: &TypeAttributes, b: &TypeAttributes, extra: u8) -> u8 {
    a.decimals
        .max(b.decimals)
        .saturating_add(extra)
        .min(NOT_FIXED_DEC)
}

pub(super) fn resolve(op: ArithOp, node: Node<'_>, session: &mut Session) -> ExpressionResult<()> {
    match op {
        ArithOp::Neg => return resolve_neg(node, session),
        ArithOp::Abs => {
            let a = node.args[0].attrs;
            let attrs = match a.numeric_context() {
                ResultType::Int => TypeAttributes::int(a.precision.max(1), a.unsigned),
                ResultType::Decimal => {
                    TypeAttributes::decimal(a.decimal_precision(), a.decimal_scale(), a.unsigned)
                }
                _ => TypeAttributes::real(a.decimals),
            };
            *node.attrs = attrs.nullable(node.attrs.nullable);
            return Ok(());
        }
        _ => {}
    }

    let (a, b) = (node.args[0].attrs, node.args[1].attrs);
    let domain = numeric_domain(&a, &b);
    let nullable = node.attrs.nullable
        || matches!(op, ArithOp::Div | ArithOp::IntDiv | ArithOp::Mod);
    let unsigned_or = a.unsigned || b.unsigned;
    let unsigned_and = a.unsigned && b.unsigned;

    let attrs = match (op, domain) {
        (ArithOp::IntDiv, _) => {
            let precision = a.decimal_int_part().clamp(1, MAX_INT_PRECISION);
            TypeAttributes::int(precision, unsigned_or)
        }
        (ArithOp::Div, ResultType::Real) => {
            TypeAttributes::real(real_decimals(&a, &b, session.config().div_precision_increment))
        }
        (ArithOp::Div, _) => {
            let incr = session.config().div_precision_increment;
            node.state.div_increment = incr;
            let precision = (a.decimal_precision() as u32 + b.decimal_scale() as u32 + incr as u32)
                .min(MAX_PRECISION as u32) as u8;
            let scale = (a.decimal_scale() + incr).min(MAX_SCALE);
            TypeAttributes::decimal(precision.max(scale), scale, unsigned_and)
        }
        (_, ResultType::Real) => TypeAttributes::real(real_decimals(&a, &b, 0)),
        (ArithOp::Mod, ResultType::Decimal) => {
            let scale = a.decimal_scale().max(b.decimal_scale());
            let precision = a.decimal_precision().max(b.decimal_precision());
            TypeAttributes::decimal(precision.max(scale), scale, a.unsigned)
        }
        (ArithOp::Mod, _) => {
            TypeAttributes::int(a.precision.max(b.precision).max(1), a.unsigned)
        }
        (ArithOp::Mul, ResultType::Decimal) => {
            let scale = (a.decimal_scale() + b.decimal_scale()).min(MAX_SCALE);
            let precision = (a.decimal_precision() as u32 + b.decimal_precision() as u32)
                .min(MAX_PRECISION as u32) as u8;
            TypeAttributes::decimal(precision.max(scale), scale, unsigned_and)
        }
        (ArithOp::Mul, _) => {
            let precision = (a.precision as u32 + b.precision as u32).min(MAX_INT_PRECISION as u32);
            TypeAttributes::int(precision as u8, unsigned_or)
        }
        (_, ResultType::Decimal) => {
            let scale = a.decimal_scale().max(b.decimal_scale()).min(MAX_SCALE);
            let int_part = a.decimal_int_part().max(b.decimal_int_part());
            let precision = (int_part as u32 + 1 + scale as u32).min(MAX_PRECISION as u32) as u8;
            let unsigned = unsigned_and && !no_unsigned_subtraction(op, session);
            TypeAttributes::decimal(precision, scale, unsigned)
        }
        _ => {
            let int_part = a.decimal_int_part().max(b.decimal_int_part());
            let precision = (int_part + 1).min(MAX_INT_PRECISION);
            let unsigned = match op {
                ArithOp::Minus => unsigned_and && !no_unsigned_subtraction(op, session),
                _ => unsigned_or,
            };
            TypeAttributes::int(precision, unsigned)
        }
    };
    *node.attrs = attrs.nullable(nullable);
    Ok(())
}

fn no_unsigned_subtraction(op: ArithOp, session: &Session) -> bool {
    op == ArithOp::Minus && session.sql_mode().contains(SqlMode::NO_UNSIGNED_SUBTRACTION)
}

fn resolve_neg(node: Node<'_>, session: &mut Session) -> ExpressionResult<()> {
    let a = node.args[0].attrs;
    let mut attrs = match a.numeric_context() {
        ResultType::Int => {
            let mut promote = false;
            if node.args[0].constant {
                let mut ctx = EvalContext::new(session);
                if let Some(v) = node.args[0].eval_int_operand(&mut ctx)? {
                    promote = if v.unsigned {
                        v.magnitude() > 1u64 << 63
                    } else {
                        v.value == i64::MIN
                    };
                }
            }
            if promote {
                TypeAttributes::decimal(a.precision.max(19), 0, false)
            } else {
                TypeAttributes::int(a.precision.max(1), false)
            }
        }
        ResultType::Decimal => {
            TypeAttributes::decimal(a.decimal_precision(), a.decimal_scale(), false)
        }
        _ => TypeAttributes::real(a.decimals),
    };
    attrs.max_length = a.max_length + 1;
    *node.attrs = attrs.nullable(node.attrs.nullable);
    Ok(())
}

fn overflow_name(result_type: ResultType, unsigned: bool) -> &'static str {
    match (result_type, unsigned) {
        (ResultType::Int, true) => "BIGINT UNSIGNED",
        (ResultType::Int, false) => "BIGINT",
        (ResultType::Decimal, _) => "DECIMAL",
        _ => "DOUBLE",
    }
}

fn describe(op: ArithOp, args: &[Box<Item>]) -> String {
    match op {
        ArithOp::Neg => format!("-{}", args[0]),
        ArithOp::Abs => format!("abs({})", args[0]),
        _ => format!("({} {} {})", args[0], op.symbol(), args[1]),
    }
}

/// Signals an overflow of this node and yields its NULL result.
fn overflow(
    op: ArithOp,
    node: &Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    let name = overflow_name(node.attrs.result_type, node.attrs.unsigned);
    ctx.session.signal_overflow(name, describe(op, node.args))?;
    Ok(Value::Null)
}

fn division_by_zero(ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
    ctx.session.signal_division_by_zero()?;
    Ok(Value::Null)
}

pub(super) fn evaluate(
    op: ArithOp,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    match op {
        ArithOp::Neg | ArithOp::Abs => evaluate_unary(op, node, ctx),
        ArithOp::IntDiv => {
            let (a, b) = (node.args[0].attrs, node.args[1].attrs);
            if numeric_domain(&a, &b) == ResultType::Int {
                evaluate_int(op, node, ctx)
            } else {
                evaluate_int_div_decimal(node, ctx)
            }
        }
        _ => match node.attrs.result_type {
            ResultType::Int => evaluate_int(op, node, ctx),
            ResultType::Decimal => evaluate_decimal(op, node, ctx),
            _ => evaluate_real(op, node, ctx),
        },
    }
}

fn evaluate_int(op: ArithOp, node: Node<'_>, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
    let unsigned = node.attrs.unsigned;
    let (left, right) = pair(node.args);
    let Some(a) = left.eval_int_operand(ctx)? else {
        return Ok(Value::Null);
    };
    let Some(b) = right.eval_int_operand(ctx)? else {
        return Ok(Value::Null);
    };

    let exact: Result<IntOperand, IntOverflow> = match op {
        ArithOp::Plus => overflow::add(a, b),
        ArithOp::Minus => overflow::sub(a, b),
        ArithOp::Mul => overflow::mul(a, b),
        ArithOp::IntDiv => match overflow::int_div(a, b) {
            Some(result) => result,
            None => return division_by_zero(ctx),
        },
        ArithOp::Mod => match overflow::int_mod(a, b) {
            Some(rem) => return Ok(int_value(rem, unsigned)),
            None => return division_by_zero(ctx),
        },
        _ => unreachable!("not an integer operator: {:?}", op),
    };
    match exact.and_then(|result| fit_integer(result, unsigned)) {
        Ok(value) => Ok(int_value(value, unsigned)),
        Err(IntOverflow) => overflow(op, &node, ctx),
    }
}

/// `DIV` with a non-integer operand: exact decimal division truncated to
/// an integer.
fn evaluate_int_div_decimal(node: Node<'_>, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
    let unsigned = node.attrs.unsigned;
    let (left, right) = pair(node.args);
    let Some(a) = left.eval_decimal(ctx)? else {
        return Ok(Value::Null);
    };
    let Some(b) = right.eval_decimal(ctx)? else {
        return Ok(Value::Null);
    };
    let mut quotient = Decimal::ZERO;
    match a.div(&b, &mut quotient, 0) {
        DecimalStatus::DivZero => return division_by_zero(ctx),
        status if status.is_fatal() => return Ok(Value::Null),
        _ => {}
    }
    match quotient.to_i64(unsigned, RoundMode::Truncate) {
        (value, DecimalStatus::Ok) => Ok(int_value(value, unsigned)),
        _ => overflow(ArithOp::IntDiv, &node, ctx),
    }
}

fn evaluate_decimal(
    op: ArithOp,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    let incr = node.state.div_increment;
    let (left, right) = pair(node.args);
    let Some(a) = left.eval_decimal(ctx)? else {
        return Ok(Value::Null);
    };
    let Some(b) = right.eval_decimal(ctx)? else {
        return Ok(Value::Null);
    };

    let mut result = Decimal::ZERO;
    let status = match op {
        ArithOp::Plus => a.add(&b, &mut result),
        ArithOp::Minus => a.sub(&b, &mut result),
        ArithOp::Mul => a.mul(&b, &mut result),
        ArithOp::Div => a.div(&b, &mut result, incr),
        ArithOp::Mod => a.modulo(&b, &mut result),
        _ => unreachable!("not a decimal operator: {:?}", op),
    };
    match status {
        DecimalStatus::DivZero => division_by_zero(ctx),
        DecimalStatus::Overflow => overflow(op, &node, ctx),
        DecimalStatus::BadNumber => Ok(Value::Null),
        _ if node.attrs.unsigned && result.is_negative() => overflow(op, &node, ctx),
        _ => Ok(Value::Decimal(result)),
    }
}

fn evaluate_real(op: ArithOp, node: Node<'_>, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
    let (left, right) = pair(node.args);
    let Some(a) = left.eval_real(ctx)? else {
        return Ok(Value::Null);
    };
    let Some(b) = right.eval_real(ctx)? else {
        return Ok(Value::Null);
    };
    let value = match op {
        ArithOp::Plus => a + b,
        ArithOp::Minus => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div | ArithOp::Mod if b == 0.0 => return division_by_zero(ctx),
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
        _ => unreachable!("not a real operator: {:?}", op),
    };
    match overflow::check_float(value) {
        Ok(value) => Ok(Value::Real(value)),
        Err(_) => overflow(op, &node, ctx),
    }
}

fn evaluate_unary(op: ArithOp, node: Node<'_>, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
    match node.attrs.result_type {
        ResultType::Int => {
            let Some(v) = node.args[0].eval_int_operand(ctx)? else {
                return Ok(Value::Null);
            };
            let keep_sign = op == ArithOp::Abs && !v.is_negative();
            if keep_sign {
                return Ok(int_value(v.value, node.attrs.unsigned));
            }
            // Both negation and abs of a negative value flip the sign.
            let flipped = -v.to_i128();
            match i64::try_from(flipped) {
                Ok(value) => Ok(int_value(value, node.attrs.unsigned)),
                Err(_) if flipped >= 0 && node.attrs.unsigned => {
                    Ok(Value::UInt(flipped as u64))
                }
                Err(_) => overflow(op, &node, ctx),
            }
        }
        ResultType::Decimal => {
            let Some(d) = node.args[0].eval_decimal(ctx)? else {
                return Ok(Value::Null);
            };
            Ok(Value::Decimal(match op {
                ArithOp::Abs => d.abs(),
                _ => d.negate(),
            }))
        }
        _ => {
            let Some(v) = node.args[0].eval_real(ctx)? else {
                return Ok(Value::Null);
            };
            Ok(Value::Real(match op {
                ArithOp::Abs => v.abs(),
                _ => -v,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::function::CastTarget;
    use crate::server::{ServerConfig, ServerContext};
    use crate::expression::ExpressionError;
    use crate::session::{ConditionCode, SessionConfig};

    fn session_with(mode: SqlMode) -> Session {
        ServerContext::init(ServerConfig::default())
            .new_session(SessionConfig::default().with_sql_mode(mode))
    }

    fn eval(item: &mut Item, session: &mut Session) -> ExpressionResult<Value> {
        item.fix_fields(session)?;
        let mut ctx = EvalContext::new(session);
        item.eval(&mut ctx)
    }

    fn unsigned(v: u64) -> Item {
        Item::cast(Item::uint(v), CastTarget::Unsigned)
    }

    #[test]
    fn test_type_promotion() {
        let mut session = session_with(SqlMode::NONE);

        let mut item = Item::plus(Item::int(1), Item::int(1));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Int(2));
        assert_eq!(item.result_type(), ResultType::Int);
        assert!(!item.attrs().unsigned);

        let mut item = Item::plus(Item::int(1), Item::real(1.5));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Real(2.5));
        assert_eq!(item.result_type(), ResultType::Real);

        let mut item = Item::plus(
            Item::int(1),
            Item::cast(Item::int(1), CastTarget::Decimal { precision: 5, scale: 2 }),
        );
        assert_eq!(
            eval(&mut item, &mut session).unwrap().to_string(),
            "2.00"
        );
        assert_eq!(item.result_type(), ResultType::Decimal);
        assert_eq!(item.attrs().decimals, 2);
        assert_eq!(item.attrs().precision, 6);

        let mut item = Item::plus(Item::int(1), Item::string("2"));
        eval(&mut item, &mut session).unwrap();
        assert_eq!(item.result_type(), ResultType::Real);
    }

    #[test]
    fn test_integer_overflow_warns() {
        let mut session = session_with(SqlMode::NONE);
        let mut item = Item::plus(Item::int(i64::MAX), Item::int(1));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Null);
        let warning = &session.diagnostics().warnings()[0];
        assert_eq!(warning.code, ConditionCode::DataOutOfRange);
        assert_eq!(
            warning.message,
            "BIGINT value is out of range in '(9223372036854775807 + 1)'"
        );

        let mut strict = session_with(SqlMode::STRICT);
        let mut item = Item::mul(Item::int(i64::MAX), Item::int(2));
        assert!(matches!(
            eval(&mut item, &mut strict),
            Err(ExpressionError::NumericOutOfRange { type_name: "BIGINT", .. })
        ));
    }

    #[test]
    fn test_unsigned_arithmetic() {
        let mut session = session_with(SqlMode::NONE);
        let mut item = Item::plus(unsigned(u64::MAX - 1), Item::int(1));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::UInt(u64::MAX));
        assert!(item.attrs().unsigned);

        let mut item = Item::minus(unsigned(1), unsigned(2));
        assert!(item.fix_fields(&mut session).is_ok());
        assert!(item.attrs().unsigned);
        let mut ctx = EvalContext::new(&mut session);
        assert_eq!(item.eval(&mut ctx).unwrap(), Value::Null);
        assert_eq!(
            session.diagnostics().last().unwrap().message,
            "BIGINT UNSIGNED value is out of range in '(cast(1 as unsigned) - cast(2 as unsigned))'"
        );

        let mut relaxed = session_with(SqlMode::NO_UNSIGNED_SUBTRACTION);
        let mut item = Item::minus(unsigned(1), unsigned(2));
        assert_eq!(eval(&mut item, &mut relaxed).unwrap(), Value::Int(-1));
        assert!(!item.attrs().unsigned);
    }

    #[test]
    fn test_division() {
        let mut session = session_with(SqlMode::NONE);
        let mut item = Item::div(Item::int(2), Item::int(3));
        assert_eq!(eval(&mut item, &mut session).unwrap().to_string(), "0.6667");
        assert_eq!(item.result_type(), ResultType::Decimal);
        assert_eq!(item.attrs().decimals, 4);
        assert!(item.attrs().nullable);

        let mut item = Item::div(Item::real(1.0), Item::real(4.0));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Real(0.25));
    }

    #[test]
    fn test_division_by_zero() {
        let mut session = session_with(SqlMode::NONE);
        for mut item in [
            Item::div(Item::int(5), Item::int(0)),
            Item::int_div(Item::int(5), Item::int(0)),
            Item::modulo(Item::int(5), Item::int(0)),
            Item::div(Item::real(5.0), Item::real(0.0)),
        ] {
            assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Null);
        }
        assert_eq!(session.diagnostics().count(crate::session::Level::Warning), 4);

        let mut strict = session_with(SqlMode::ERROR_FOR_DIVISION_BY_ZERO);
        let mut item = Item::div(Item::int(5), Item::int(0));
        assert_eq!(
            eval(&mut item, &mut strict),
            Err(ExpressionError::DivisionByZero)
        );
    }

    #[test]
    fn test_int_div_and_mod() {
        let mut session = session_with(SqlMode::NONE);
        let mut item = Item::int_div(Item::int(-7), Item::int(2));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Int(-3));

        let mut item = Item::int_div(Item::int(i64::MIN), Item::int(-1));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Null);

        let mut item = Item::int_div(Item::decimal("7.9").unwrap(), Item::int(2));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Int(3));
        assert_eq!(item.result_type(), ResultType::Int);

        let mut item = Item::modulo(Item::int(-7), Item::int(3));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Int(-1));

        let mut item = Item::modulo(Item::decimal("7.5").unwrap(), Item::int(2));
        assert_eq!(eval(&mut item, &mut session).unwrap().to_string(), "1.5");
    }

    #[test]
    fn test_negation_boundary() {
        let mut session = session_with(SqlMode::NONE);
        let mut item = Item::neg(Item::int(i64::MIN));
        assert_eq!(
            eval(&mut item, &mut session).unwrap().to_string(),
            "9223372036854775808"
        );
        assert_eq!(item.result_type(), ResultType::Decimal);

        let mut item = Item::neg(Item::int(5));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Int(-5));
        assert_eq!(item.result_type(), ResultType::Int);
        assert_eq!(item.attrs().max_length, 2);

        let mut item = Item::neg(unsigned(u64::MAX));
        eval(&mut item, &mut session).unwrap();
        assert_eq!(item.result_type(), ResultType::Decimal);
    }

    #[test]
    fn test_negation_overflow_at_runtime() {
        use crate::expression::item::TypeAttributes;
        let mut session = session_with(SqlMode::NONE);
        let mut item = Item::neg(Item::column(0, "a", TypeAttributes::bigint(false)));
        item.fix_fields(&mut session).unwrap();
        assert_eq!(item.result_type(), ResultType::Int);

        let row = vec![Value::Int(i64::MIN)];
        let mut ctx = EvalContext::with_row(&mut session, &row);
        assert_eq!(item.eval(&mut ctx).unwrap(), Value::Null);
        assert_eq!(session.diagnostics().total(), 1);
    }

    #[test]
    fn test_abs() {
        let mut session = session_with(SqlMode::NONE);
        let mut item = Item::abs(Item::int(-3));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Int(3));

        let mut item = Item::abs(Item::int(i64::MIN));
        assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Null);

        let mut item = Item::abs(Item::decimal("-1.50").unwrap());
        assert_eq!(eval(&mut item, &mut session).unwrap().to_string(), "1.50");
    }

    #[test]
    fn test_null_propagation_has_no_warning() {
        let mut session = session_with(SqlMode::NONE);
        for op in [ArithOp::Plus, ArithOp::Minus, ArithOp::Mul, ArithOp::Div, ArithOp::IntDiv, ArithOp::Mod] {
            let mut item = Item::arith(op, Item::null(), Item::int(0));
            assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Null);
            let mut item = Item::arith(op, Item::int(i64::MAX), Item::null());
            assert_eq!(eval(&mut item, &mut session).unwrap(), Value::Null);
        }
        assert!(session.diagnostics().is_empty());
    }
}
