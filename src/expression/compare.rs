//! Comparison operators and three-valued logic.

use super::error::ExpressionResult;
use super::eval::EvalContext;
use super::function::{CompareOp, LogicOp};
use super::item::{pair, Item, ItemKind, Node, TypeAttributes};
use crate::charset::CollationId;
use crate::session::Session;
use crate::value::{ResultType, TemporalKind, Value};
use std::cmp::Ordering;

/// Domain two operands are compared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpType {
    Int,
    Decimal,
    Real,
    String(CollationId),
    Temporal(TemporalKind),
    /// Element-wise comparison of row constructors.
    Row,
}

/// Comparison domain for two scalar operands.
///
/// Strings compare as strings, temporals against temporals or strings
/// compare chronologically, and anything else numerically in the narrowest
/// exact domain holding both sides.
pub fn cmp_type(a: &TypeAttributes, b: &TypeAttributes) -> CmpType {
    use ResultType::*;
    match (a.result_type, b.result_type) {
        (Temporal, Temporal) => CmpType::Temporal(temporal_kind(a).merge(temporal_kind(b))),
        (Temporal, String) => CmpType::Temporal(temporal_kind(a)),
        (String, Temporal) => CmpType::Temporal(temporal_kind(b)),
        (String, String) => CmpType::String(a.collation.aggregate(b.collation)),
        _ => match (a.numeric_context(), b.numeric_context()) {
            (Int, Int) => CmpType::Int,
            (Int | Decimal, Int | Decimal) => CmpType::Decimal,
            _ => CmpType::Real,
        },
    }
}

fn temporal_kind(attrs: &TypeAttributes) -> TemporalKind {
    attrs.temporal.unwrap_or(TemporalKind::DateTime)
}

/// Evaluates both operands through `fetch`. Unless `eager`, a NULL left
/// operand leaves the right one unevaluated.
fn fetch_pair<T>(
    a: &mut Item,
    b: &mut Item,
    ctx: &mut EvalContext<'_>,
    eager: bool,
    mut fetch: impl FnMut(&mut Item, &mut EvalContext<'_>) -> ExpressionResult<Option<T>>,
) -> ExpressionResult<Option<(T, T)>> {
    let x = fetch(a, ctx)?;
    if x.is_none() && !eager {
        return Ok(None);
    }
    let y = fetch(b, ctx)?;
    Ok(x.zip(y))
}

/// Orders two scalar operands in domain `cmp`; `None` if either is NULL.
pub(crate) fn compare_items(
    cmp: CmpType,
    a: &mut Item,
    b: &mut Item,
    ctx: &mut EvalContext<'_>,
    eager: bool,
) -> ExpressionResult<Option<Ordering>> {
    Ok(match cmp {
        CmpType::Int => fetch_pair(a, b, ctx, eager, |i, c| i.eval_int_operand(c))?
            .map(|(x, y)| x.to_i128().cmp(&y.to_i128())),
        CmpType::Decimal => {
            fetch_pair(a, b, ctx, eager, |i, c| i.eval_decimal(c))?.map(|(x, y)| x.compare(&y))
        }
        CmpType::Real => fetch_pair(a, b, ctx, eager, |i, c| i.eval_real(c))?
            .map(|(x, y)| x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
        CmpType::String(collation) => fetch_pair(a, b, ctx, eager, |i, c| i.eval_str(c))?
            .map(|(x, y)| collation.collation().compare(&x, &y)),
        CmpType::Temporal(_) => fetch_pair(a, b, ctx, eager, |i, c| i.eval_temporal(c))?
            .map(|(x, y)| x.compare(&y)),
        CmpType::Row => {
            let cmp = cmp_type(&a.attrs, &b.attrs);
            return compare_items(cmp, a, b, ctx, eager);
        }
    })
}

fn holds(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq | CompareOp::NullSafeEq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
    }
}

fn is_row(item: &Item) -> bool {
    matches!(item.kind, ItemKind::Row)
}

/// Equality of two operands of the same shape. A definite difference in
/// any element beats a NULL in another.
fn equal(
    a: &mut Item,
    b: &mut Item,
    ctx: &mut EvalContext<'_>,
    null_safe: bool,
) -> ExpressionResult<Option<bool>> {
    if !is_row(a) && !is_row(b) {
        let cmp = cmp_type(&a.attrs, &b.attrs);
        let ord = compare_items(cmp, a, b, ctx, null_safe)?;
        return Ok(match ord {
            Some(ord) => Some(ord == Ordering::Equal),
            None if null_safe => Some(a.null_value && b.null_value),
            None => None,
        });
    }
    let mut saw_null = false;
    for i in 0..a.cols() {
        match equal(a.element_mut(i), b.element_mut(i), ctx, null_safe)? {
            Some(false) => return Ok(Some(false)),
            None => saw_null = true,
            Some(true) => {}
        }
    }
    Ok(if saw_null { None } else { Some(true) })
}

/// Lexicographic order of two operands of the same shape.
fn order(
    a: &mut Item,
    b: &mut Item,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Option<Ordering>> {
    if !is_row(a) && !is_row(b) {
        let cmp = cmp_type(&a.attrs, &b.attrs);
        return compare_items(cmp, a, b, ctx, false);
    }
    for i in 0..a.cols() {
        match order(a.element_mut(i), b.element_mut(i), ctx)? {
            None => return Ok(None),
            Some(Ordering::Equal) => {}
            decided => return Ok(decided),
        }
    }
    Ok(Some(Ordering::Equal))
}

pub(super) fn resolve_compare(
    op: CompareOp,
    node: Node<'_>,
    _session: &mut Session,
) -> ExpressionResult<()> {
    let (left, right) = (&node.args[0], &node.args[1]);
    node.state.cmp = Some(if is_row(left) || is_row(right) {
        CmpType::Row
    } else {
        cmp_type(&left.attrs, &right.attrs)
    });
    let nullable = node.attrs.nullable && op != CompareOp::NullSafeEq;
    *node.attrs = TypeAttributes::int(1, false).nullable(nullable);
    Ok(())
}

pub(super) fn evaluate_compare(
    op: CompareOp,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    let cmp = node.state.cmp.unwrap_or(CmpType::Row);
    let (left, right) = pair(node.args);
    let truth = match (cmp, op) {
        (CmpType::Row, CompareOp::Eq) => equal(left, right, ctx, false)?,
        (CmpType::Row, CompareOp::NullSafeEq) => equal(left, right, ctx, true)?,
        (CmpType::Row, CompareOp::Ne) => equal(left, right, ctx, false)?.map(|eq| !eq),
        (CmpType::Row, _) => order(left, right, ctx)?.map(|ord| holds(op, ord)),
        (_, CompareOp::NullSafeEq) => {
            let ord = compare_items(cmp, left, right, ctx, true)?;
            Some(match ord {
                Some(ord) => ord == Ordering::Equal,
                None => left.null_value && right.null_value,
            })
        }
        _ => compare_items(cmp, left, right, ctx, false)?.map(|ord| holds(op, ord)),
    };
    Ok(truth.map_or(Value::Null, |t| Value::Int(t as i64)))
}

pub(super) fn resolve_logic(
    op: LogicOp,
    node: Node<'_>,
    _session: &mut Session,
) -> ExpressionResult<()> {
    let nullable = match op {
        LogicOp::IsNull | LogicOp::IsNotNull => false,
        _ => node.attrs.nullable,
    };
    *node.attrs = TypeAttributes::int(1, false).nullable(nullable);
    Ok(())
}

fn is_null(item: &mut Item, ctx: &mut EvalContext<'_>) -> ExpressionResult<bool> {
    if is_row(item) {
        for i in 0..item.cols() {
            if !is_null(item.element_mut(i), ctx)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }
    Ok(item.eval(ctx)?.is_null())
}

pub(super) fn evaluate_logic(
    op: LogicOp,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    let truth = match op {
        LogicOp::And | LogicOp::Or => {
            let (left, right) = pair(node.args);
            // The right operand is skipped once the left one decides.
            let decisive = op == LogicOp::Or;
            match left.eval_bool(ctx)? {
                Some(v) if v == decisive => Some(decisive),
                Some(_) => right.eval_bool(ctx)?,
                None => match right.eval_bool(ctx)? {
                    Some(v) if v == decisive => Some(decisive),
                    _ => None,
                },
            }
        }
        LogicOp::Xor => {
            let (left, right) = pair(node.args);
            match left.eval_bool(ctx)? {
                Some(a) => right.eval_bool(ctx)?.map(|b| a != b),
                None => None,
            }
        }
        LogicOp::Not => node.args[0].eval_bool(ctx)?.map(|v| !v),
        LogicOp::IsNull => Some(is_null(&mut node.args[0], ctx)?),
        LogicOp::IsNotNull => Some(!is_null(&mut node.args[0], ctx)?),
    };
    Ok(truth.map_or(Value::Null, |t| Value::Int(t as i64)))
}
