//! GREATEST and LEAST.

use super::compare::CmpType;
use super::error::ExpressionResult;
use super::eval::EvalContext;
use super::function::MinMaxOp;
use super::item::{int_value, Item, Node, TypeAttributes};
use crate::charset::CollationId;
use crate::decimal::{MAX_PRECISION, MAX_SCALE};
use crate::session::Session;
use crate::value::{ResultType, TemporalKind, Value, NOT_FIXED_DEC};
use std::cmp::Ordering;

/// Result attributes and comparison domain of GREATEST/LEAST over `args`.
fn aggregate(args: &[Box<Item>]) -> (TypeAttributes, CmpType) {
    let all = |rt: ResultType| args.iter().all(|a| a.attrs.result_type == rt);

    if all(ResultType::Temporal) {
        let kind = args
            .iter()
            .map(|a| a.attrs.temporal.unwrap_or(TemporalKind::DateTime))
            .reduce(TemporalKind::merge)
            .unwrap_or(TemporalKind::DateTime);
        let fsp = args.iter().map(|a| a.attrs.decimals).max().unwrap_or(0);
        return (TypeAttributes::temporal(kind, fsp), CmpType::Temporal(kind));
    }
    if all(ResultType::String) {
        let collation = args
            .iter()
            .map(|a| a.attrs.collation)
            .reduce(CollationId::aggregate)
            .unwrap_or_default();
        let len = args.iter().map(|a| a.attrs.max_length).max().unwrap_or(0);
        return (TypeAttributes::string(len, collation), CmpType::String(collation));
    }

    let mut domain = ResultType::Int;
    for arg in args.iter() {
        domain = match (domain, arg.attrs.numeric_context()) {
            (ResultType::Real, _) | (_, ResultType::Real) => ResultType::Real,
            (ResultType::Decimal, _) | (_, ResultType::Decimal) => ResultType::Decimal,
            _ => ResultType::Int,
        };
    }
    let unsigned = args.iter().all(|a| a.attrs.unsigned);
    let mixed_sign = domain == ResultType::Int && !unsigned && args.iter().any(|a| a.attrs.unsigned);
    if mixed_sign {
        domain = ResultType::Decimal;
    }

    match domain {
        ResultType::Int => {
            let precision = args.iter().map(|a| a.attrs.precision).max().unwrap_or(1);
            (TypeAttributes::int(precision.max(1), unsigned), CmpType::Int)
        }
        ResultType::Decimal => {
            let scale = args
                .iter()
                .map(|a| a.attrs.decimal_scale())
                .max()
                .unwrap_or(0)
                .min(MAX_SCALE);
            let int_part = args
                .iter()
                .map(|a| a.attrs.decimal_int_part())
                .max()
                .unwrap_or(1);
            let precision = (int_part as u32 + scale as u32).min(MAX_PRECISION as u32) as u8;
            (TypeAttributes::decimal(precision, scale, unsigned), CmpType::Decimal)
        }
        _ => {
            let decimals = args
                .iter()
                .map(|a| a.attrs.decimals)
                .max()
                .unwrap_or(NOT_FIXED_DEC)
                .min(NOT_FIXED_DEC);
            (TypeAttributes::real(decimals), CmpType::Real)
        }
    }
}

pub(super) fn resolve(_op: MinMaxOp, node: Node<'_>, _session: &mut Session) -> ExpressionResult<()> {
    let (attrs, cmp) = aggregate(node.args);
    node.state.cmp = Some(cmp);
    *node.attrs = attrs.nullable(node.attrs.nullable);
    Ok(())
}

/// Picks the extreme of the values `fetch` yields; any NULL makes the
/// result NULL and ties keep the earlier argument.
fn pick<T>(
    op: MinMaxOp,
    args: &mut [Box<Item>],
    ctx: &mut EvalContext<'_>,
    mut fetch: impl FnMut(&mut Item, &mut EvalContext<'_>) -> ExpressionResult<Option<T>>,
    order: impl Fn(&T, &T) -> Ordering,
) -> ExpressionResult<Option<T>> {
    let wanted = match op {
        MinMaxOp::Greatest => Ordering::Greater,
        MinMaxOp::Least => Ordering::Less,
    };
    let mut best: Option<T> = None;
    for arg in args.iter_mut() {
        let Some(value) = fetch(&mut **arg, ctx)? else {
            return Ok(None);
        };
        best = match best {
            Some(current) if order(&value, &current) != wanted => Some(current),
            _ => Some(value),
        };
    }
    Ok(best)
}

pub(super) fn evaluate(
    op: MinMaxOp,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    let cmp = node.state.cmp.unwrap_or(CmpType::Real);
    let args = node.args.as_mut_slice();
    Ok(match cmp {
        CmpType::Int => {
            let best = pick(op, args, ctx, |i, c| i.eval_int_operand(c), |x, y| {
                x.to_i128().cmp(&y.to_i128())
            })?;
            best.map_or(Value::Null, |v| int_value(v.value, node.attrs.unsigned))
        }
        CmpType::Decimal => pick(op, args, ctx, |i, c| i.eval_decimal(c), |x, y| x.compare(y))?
            .map_or(Value::Null, Value::Decimal),
        CmpType::String(collation) => {
            let collation = collation.collation();
            pick(op, args, ctx, |i, c| i.eval_str(c), |x, y| collation.compare(x, y))?
                .map_or(Value::Null, Value::String)
        }
        CmpType::Temporal(kind) => pick(
            op,
            args,
            ctx,
            |i, c| Ok(i.eval_temporal(c)?.map(|t| t.to_kind(kind))),
            |x, y| x.compare(y),
        )?
        .map_or(Value::Null, Value::Temporal),
        CmpType::Real | CmpType::Row => pick(op, args, ctx, |i, c| i.eval_real(c), |x, y| {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        })?
        .map_or(Value::Null, Value::Real),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::function::CastTarget;
    use crate::server::{ServerConfig, ServerContext};
    use crate::session::SessionConfig;
    use crate::value::Temporal;

    fn session() -> Session {
        ServerContext::init(ServerConfig::default()).new_session(SessionConfig::default())
    }

    fn eval(item: &mut Item, session: &mut Session) -> Value {
        item.fix_fields(session).unwrap();
        let mut ctx = EvalContext::new(session);
        item.eval(&mut ctx).unwrap()
    }

    #[test]
    fn test_integer_extremes() {
        let mut s = session();
        let mut item = Item::greatest(vec![Item::int(3), Item::int(9), Item::int(-2)]);
        assert_eq!(eval(&mut item, &mut s), Value::Int(9));
        assert_eq!(item.result_type(), ResultType::Int);

        let mut item = Item::least(vec![Item::int(3), Item::int(9), Item::int(-2)]);
        assert_eq!(eval(&mut item, &mut s), Value::Int(-2));
    }

    #[test]
    fn test_mixed_signedness_promotes_to_decimal() {
        let mut s = session();
        let mut item = Item::greatest(vec![
            Item::int(1),
            Item::cast(Item::uint(u64::MAX), CastTarget::Unsigned),
        ]);
        assert_eq!(eval(&mut item, &mut s).to_string(), "18446744073709551615");
        assert_eq!(item.result_type(), ResultType::Decimal);
    }

    #[test]
    fn test_mixed_numeric_domains() {
        let mut s = session();
        let mut item = Item::least(vec![Item::int(2), Item::decimal("1.5").unwrap()]);
        assert_eq!(eval(&mut item, &mut s).to_string(), "1.5");
        assert_eq!(item.result_type(), ResultType::Decimal);

        let mut item = Item::greatest(vec![Item::int(2), Item::real(2.5)]);
        assert_eq!(eval(&mut item, &mut s), Value::Real(2.5));
    }

    #[test]
    fn test_null_argument() {
        let mut s = session();
        let mut item = Item::greatest(vec![Item::int(1), Item::null(), Item::int(3)]);
        assert_eq!(eval(&mut item, &mut s), Value::Null);
        assert!(item.attrs().nullable);
    }

    #[test]
    fn test_strings_use_collation_and_keep_first_tie() {
        let mut s = session();
        let mut item = Item::greatest(vec![Item::string("abc"), Item::string("ABC"), Item::string("ab")]);
        assert_eq!(eval(&mut item, &mut s), Value::String("abc".to_string()));
        assert_eq!(item.result_type(), ResultType::String);
    }

    #[test]
    fn test_temporal_kinds_merge() {
        let mut s = session();
        let date = Temporal::date(2024, 5, 1).unwrap();
        let datetime = Temporal::datetime(2024, 5, 1, 0, 0, 1, 0).unwrap();
        let mut item = Item::greatest(vec![Item::temporal(date), Item::temporal(datetime)]);
        let value = eval(&mut item, &mut s);
        assert_eq!(item.result_type(), ResultType::Temporal);
        assert_eq!(item.attrs().temporal, Some(TemporalKind::DateTime));
        assert_eq!(value, Value::Temporal(datetime));

        let mut item = Item::least(vec![Item::temporal(date), Item::temporal(datetime)]);
        assert_eq!(eval(&mut item, &mut s), Value::Temporal(date.to_kind(TemporalKind::DateTime)));
    }
}
