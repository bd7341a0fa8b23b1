//! String inspection functions.
//!
//! Positions are 1-based character positions and 0 means "not found".

use super::compare::CmpType;
use super::error::ExpressionResult;
use super::eval::EvalContext;
use super::function::StrFunc;
use super::item::{Item, Node, TypeAttributes};
use crate::charset::CollationId;
use crate::session::Session;
use crate::value::{ResultType, Value};
use std::cmp::Ordering;

/// Collation the string arguments are compared with; non-string
/// arguments do not take part.
fn string_collation<'a>(items: impl Iterator<Item = &'a Item>) -> CollationId {
    items
        .filter(|item| item.attrs.result_type == ResultType::String)
        .map(|item| item.attrs.collation)
        .reduce(CollationId::aggregate)
        .unwrap_or(CollationId::Binary)
}

/// Comparison domain shared by every FIELD argument, decided by the first.
fn field_cmp_type(args: &[Box<Item>]) -> CmpType {
    if args[0].attrs.result_type == ResultType::String {
        return CmpType::String(string_collation(args.iter().map(|a| &**a)));
    }
    let contexts = args.iter().map(|a| a.attrs.numeric_context());
    let mut cmp = CmpType::Int;
    for context in contexts {
        cmp = match (cmp, context) {
            (_, ResultType::Real) | (CmpType::Real, _) => CmpType::Real,
            (_, ResultType::Decimal) | (CmpType::Decimal, _) => CmpType::Decimal,
            (cmp, _) => cmp,
        };
    }
    cmp
}

pub(super) fn resolve(f: StrFunc, node: Node<'_>, _session: &mut Session) -> ExpressionResult<()> {
    let nullable = node.attrs.nullable;
    let attrs = match f {
        StrFunc::Length | StrFunc::CharLength => TypeAttributes::int(10, false).nullable(nullable),
        StrFunc::Ascii => TypeAttributes::int(3, false).nullable(nullable),
        StrFunc::Ord => TypeAttributes::int(10, false).nullable(nullable),
        StrFunc::Locate => TypeAttributes::int(11, false).nullable(nullable),
        StrFunc::Field => {
            node.state.cmp = Some(field_cmp_type(node.args));
            TypeAttributes::int(3, false)
        }
        StrFunc::FindInSet => TypeAttributes::int(3, false).nullable(nullable),
    };
    *node.attrs = attrs;
    Ok(())
}

pub(super) fn evaluate(
    f: StrFunc,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    match f {
        StrFunc::Field => return evaluate_field(node, ctx),
        StrFunc::Locate => return evaluate_locate(node, ctx),
        StrFunc::FindInSet => return evaluate_find_in_set(node, ctx),
        _ => {}
    }

    let collation = node.args[0].attrs.collation;
    let Some(s) = node.args[0].eval_str(ctx)? else {
        return Ok(Value::Null);
    };
    let n = match f {
        StrFunc::Length => s.len() as i64,
        StrFunc::CharLength => collation.collation().char_length(&s) as i64,
        StrFunc::Ascii => s.bytes().next().map_or(0, i64::from),
        StrFunc::Ord => {
            // A multi-byte first character folds its bytes big-endian.
            let len = collation.collation().first_char_len(&s);
            s.as_bytes()[..len]
                .iter()
                .fold(0i64, |n, b| (n << 8) | i64::from(*b))
        }
        StrFunc::Locate | StrFunc::Field | StrFunc::FindInSet => unreachable!("handled above"),
    };
    Ok(Value::Int(n))
}

fn evaluate_locate(node: Node<'_>, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
    let collation = string_collation(node.args.iter().take(2).map(|a| &**a));
    let Some(needle) = node.args[0].eval_str(ctx)? else {
        return Ok(Value::Null);
    };
    let Some(haystack) = node.args[1].eval_str(ctx)? else {
        return Ok(Value::Null);
    };
    let start = match node.args.get_mut(2) {
        Some(arg) => match arg.eval_int_operand(ctx)? {
            Some(pos) => pos.to_i128() - 1,
            None => return Ok(Value::Null),
        },
        None => 0,
    };

    let collation = collation.collation();
    if start < 0 || start > collation.char_length(&haystack) as i128 {
        return Ok(Value::Int(0));
    }
    let start = start as usize;
    if needle.is_empty() {
        return Ok(Value::Int(start as i64 + 1));
    }
    Ok(Value::Int(
        collation
            .find_substring(&haystack, &needle, start)
            .map_or(0, |pos| pos as i64 + 1),
    ))
}

/// 1-based position of the first argument after `first` equal to it;
/// NULL arguments never match.
fn position<T>(
    first: &mut Item,
    rest: &mut [Box<Item>],
    ctx: &mut EvalContext<'_>,
    mut fetch: impl FnMut(&mut Item, &mut EvalContext<'_>) -> ExpressionResult<Option<T>>,
    equal: impl Fn(&T, &T) -> bool,
) -> ExpressionResult<i64> {
    let Some(x) = fetch(first, ctx)? else {
        return Ok(0);
    };
    for (i, arg) in rest.iter_mut().enumerate() {
        if let Some(y) = fetch(&mut **arg, ctx)? {
            if equal(&x, &y) {
                return Ok(i as i64 + 1);
            }
        }
    }
    Ok(0)
}

fn evaluate_field(node: Node<'_>, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
    let cmp = node.state.cmp.unwrap_or(CmpType::Real);
    let (first, rest) = node.args.split_at_mut(1);
    let first = &mut *first[0];
    let found = match cmp {
        CmpType::String(collation) => {
            let collation = collation.collation();
            position(first, rest, ctx, |i, c| i.eval_str(c), |x, y| {
                collation.compare(x, y) == Ordering::Equal
            })?
        }
        CmpType::Int => position(first, rest, ctx, |i, c| i.eval_int_operand(c), |x, y| {
            x.to_i128() == y.to_i128()
        })?,
        CmpType::Decimal => position(first, rest, ctx, |i, c| i.eval_decimal(c), |x, y| {
            x.compare(y) == Ordering::Equal
        })?,
        _ => position(first, rest, ctx, |i, c| i.eval_real(c), |x, y| x == y)?,
    };
    Ok(Value::Int(found))
}

fn evaluate_find_in_set(node: Node<'_>, ctx: &mut EvalContext<'_>) -> ExpressionResult<Value> {
    let collation = string_collation(node.args.iter().map(|a| &**a)).collation();
    let Some(needle) = node.args[0].eval_str(ctx)? else {
        return Ok(Value::Null);
    };
    let Some(list) = node.args[1].eval_str(ctx)? else {
        return Ok(Value::Null);
    };
    if needle.contains(',') || list.is_empty() {
        return Ok(Value::Int(0));
    }
    Ok(Value::Int(
        list.split(',')
            .position(|element| collation.compare(element, &needle) == Ordering::Equal)
            .map_or(0, |pos| pos as i64 + 1),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{ServerConfig, ServerContext};
    use crate::session::SessionConfig;

    fn session() -> Session {
        ServerContext::init(ServerConfig::default()).new_session(SessionConfig::default())
    }

    fn eval(name: &str, args: Vec<Item>, session: &mut Session) -> Value {
        let mut item = Item::call(name, args).unwrap();
        item.fix_fields(session).unwrap();
        let mut ctx = EvalContext::new(session);
        item.eval(&mut ctx).unwrap()
    }

    #[test]
    fn test_lengths() {
        let mut s = session();
        assert_eq!(eval("length", vec![Item::string("héllo")], &mut s), Value::Int(6));
        assert_eq!(eval("char_length", vec![Item::string("héllo")], &mut s), Value::Int(5));
        assert_eq!(
            eval(
                "char_length",
                vec![Item::string_with_collation("héllo", CollationId::Binary)],
                &mut s
            ),
            Value::Int(6)
        );
        assert_eq!(eval("length", vec![Item::int(-12)], &mut s), Value::Int(3));
        assert_eq!(eval("length", vec![Item::null()], &mut s), Value::Null);
    }

    #[test]
    fn test_ascii_and_ord() {
        let mut s = session();
        assert_eq!(eval("ascii", vec![Item::string("A")], &mut s), Value::Int(65));
        assert_eq!(eval("ascii", vec![Item::string("")], &mut s), Value::Int(0));
        assert_eq!(eval("ord", vec![Item::string("ñ")], &mut s), Value::Int(0xC3B1));
        assert_eq!(eval("ord", vec![Item::string("a")], &mut s), Value::Int(97));
    }

    #[test]
    fn test_locate() {
        let mut s = session();
        let locate = |args: Vec<Item>, s: &mut Session| eval("locate", args, s);
        assert_eq!(
            locate(vec![Item::string("bar"), Item::string("foobarbar")], &mut s),
            Value::Int(4)
        );
        assert_eq!(
            locate(
                vec![Item::string("bar"), Item::string("foobarbar"), Item::int(5)],
                &mut s
            ),
            Value::Int(7)
        );
        assert_eq!(
            locate(vec![Item::string("BAR"), Item::string("foobar")], &mut s),
            Value::Int(4)
        );
        assert_eq!(
            locate(vec![Item::string("x"), Item::string("abc"), Item::int(0)], &mut s),
            Value::Int(0)
        );
        assert_eq!(
            locate(vec![Item::string(""), Item::string("abc"), Item::int(2)], &mut s),
            Value::Int(2)
        );
        assert_eq!(
            locate(vec![Item::string("a"), Item::string("abc"), Item::int(9)], &mut s),
            Value::Int(0)
        );
    }

    #[test]
    fn test_field() {
        let mut s = session();
        let args = vec![
            Item::string("b"),
            Item::string("a"),
            Item::string("B"),
            Item::string("c"),
        ];
        assert_eq!(eval("field", args, &mut s), Value::Int(2));

        let args = vec![Item::int(3), Item::int(1), Item::null(), Item::decimal("3.0").unwrap()];
        assert_eq!(eval("field", args, &mut s), Value::Int(3));

        let mut item = Item::call("field", vec![Item::null(), Item::null()]).unwrap();
        item.fix_fields(&mut s).unwrap();
        assert!(!item.attrs().nullable);
        let mut ctx = EvalContext::new(&mut s);
        assert_eq!(item.eval(&mut ctx).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_find_in_set() {
        let mut s = session();
        assert_eq!(
            eval("find_in_set", vec![Item::string("b"), Item::string("a,b,c")], &mut s),
            Value::Int(2)
        );
        assert_eq!(
            eval("find_in_set", vec![Item::string("a,b"), Item::string("a,b,c")], &mut s),
            Value::Int(0)
        );
        assert_eq!(
            eval("find_in_set", vec![Item::string("x"), Item::string("")], &mut s),
            Value::Int(0)
        );
        assert_eq!(
            eval("find_in_set", vec![Item::null(), Item::string("a")], &mut s),
            Value::Null
        );
    }
}
