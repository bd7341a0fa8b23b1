//! Expression tree nodes.

use super::compare::CmpType;
use super::error::{ExpressionError, ExpressionResult};
use super::function::{
    ArithOp, BitOp, CastTarget, CompareOp, Function, LogicOp, MathFunc, MinMaxOp,
};
use super::udf::UdfCall;
use crate::charset::CollationId;
use crate::concurrency::RandState;
use crate::decimal::{Decimal, DecimalStatus, MAX_PRECISION};
use crate::value::{float_length, ResultType, Temporal, TemporalKind, Value, NOT_FIXED_DEC};
use smallvec::SmallVec;
use std::fmt;

/// Children of a node; up to two are stored inline.
pub type Args = SmallVec<[Box<Item>; 2]>;

/// Display width of a DECIMAL(precision, scale).
pub fn precision_to_length(precision: u8, scale: u8, unsigned: bool) -> u32 {
    precision as u32 + (scale > 0) as u32 + (!unsigned && precision > 0) as u32
}

/// Result metadata computed by type resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeAttributes {
    pub result_type: ResultType,
    /// Kind of TEMPORAL results.
    pub temporal: Option<TemporalKind>,
    /// Display width in characters.
    pub max_length: u32,
    /// Total digits of INT and DECIMAL results.
    pub precision: u8,
    /// Fractional digits; `NOT_FIXED_DEC` for REAL results without a fixed scale.
    pub decimals: u8,
    pub unsigned: bool,
    pub nullable: bool,
    pub collation: CollationId,
}

impl TypeAttributes {
    pub fn int(precision: u8, unsigned: bool) -> Self {
        Self {
            result_type: ResultType::Int,
            temporal: None,
            max_length: precision as u32 + (!unsigned) as u32,
            precision,
            decimals: 0,
            unsigned,
            nullable: false,
            collation: CollationId::Binary,
        }
    }

    /// A full 64-bit integer.
    pub fn bigint(unsigned: bool) -> Self {
        Self::int(if unsigned { 20 } else { 19 }, unsigned)
    }

    pub fn real(decimals: u8) -> Self {
        Self {
            result_type: ResultType::Real,
            temporal: None,
            max_length: float_length(decimals),
            precision: 0,
            decimals,
            unsigned: false,
            nullable: false,
            collation: CollationId::Binary,
        }
    }

    pub fn decimal(precision: u8, scale: u8, unsigned: bool) -> Self {
        let precision = precision.clamp(1, MAX_PRECISION);
        Self {
            result_type: ResultType::Decimal,
            temporal: None,
            max_length: precision_to_length(precision, scale, unsigned),
            precision,
            decimals: scale,
            unsigned,
            nullable: false,
            collation: CollationId::Binary,
        }
    }

    pub fn string(max_length: u32, collation: CollationId) -> Self {
        Self {
            result_type: ResultType::String,
            temporal: None,
            max_length,
            precision: 0,
            decimals: NOT_FIXED_DEC,
            unsigned: false,
            nullable: false,
            collation,
        }
    }

    pub fn temporal(kind: TemporalKind, fsp: u8) -> Self {
        let fsp = if kind == TemporalKind::Date { 0 } else { fsp.min(6) };
        Self {
            result_type: ResultType::Temporal,
            temporal: Some(kind),
            max_length: kind.max_length() + if fsp > 0 { fsp as u32 + 1 } else { 0 },
            precision: 0,
            decimals: fsp,
            unsigned: false,
            nullable: false,
            collation: CollationId::Binary,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Attributes of a literal value.
    pub fn of_value(value: &Value, collation: CollationId) -> Self {
        match value {
            Value::Null => Self::int(1, false).nullable(true),
            Value::Int(v) => {
                let digits = v.unsigned_abs().checked_ilog10().unwrap_or(0) as u8 + 1;
                let mut attrs = Self::int(digits, false);
                attrs.max_length = digits as u32 + (*v < 0) as u32;
                attrs
            }
            Value::UInt(v) => Self::int(v.checked_ilog10().unwrap_or(0) as u8 + 1, true),
            Value::Real(_) => Self::real(NOT_FIXED_DEC),
            Value::Decimal(d) => {
                let mut attrs = Self::decimal(d.precision().max(d.scale()), d.scale(), false);
                attrs.max_length = precision_to_length(attrs.precision, attrs.decimals, !d.is_negative());
                attrs
            }
            Value::String(s) => Self::string(s.chars().count() as u32, collation),
            Value::Temporal(t) => Self::temporal(t.kind(), if t.micros() > 0 { 6 } else { 0 }),
        }
    }

    /// Digits needed to show the value as a DECIMAL.
    pub fn decimal_precision(&self) -> u8 {
        match self.result_type {
            ResultType::Int | ResultType::Decimal => self.precision.min(MAX_PRECISION),
            ResultType::Temporal => {
                let kind = self.temporal.unwrap_or(TemporalKind::DateTime);
                kind.int_digits() + self.decimals.min(6)
            }
            ResultType::Real | ResultType::String => {
                self.max_length.min(MAX_PRECISION as u32) as u8
            }
        }
    }

    /// Scale as a DECIMAL; REAL values without a fixed scale count as 0.
    pub fn decimal_scale(&self) -> u8 {
        if self.decimals >= NOT_FIXED_DEC {
            0
        } else {
            self.decimals
        }
    }

    /// Digits left of the point when shown as a DECIMAL.
    pub fn decimal_int_part(&self) -> u8 {
        self.decimal_precision().saturating_sub(self.decimal_scale())
    }

    /// Domain used when the value takes part in arithmetic.
    pub fn numeric_context(&self) -> ResultType {
        match self.result_type {
            ResultType::String => ResultType::Real,
            ResultType::Temporal if self.decimals > 0 => ResultType::Decimal,
            ResultType::Temporal => ResultType::Int,
            other => other,
        }
    }
}

/// Summary of what a subtree contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemFlags {
    pub aggregate: bool,
    pub window: bool,
    pub subquery: bool,
    pub nondeterministic: bool,
}

impl ItemFlags {
    pub fn union(self, other: ItemFlags) -> ItemFlags {
        ItemFlags {
            aggregate: self.aggregate || other.aggregate,
            window: self.window || other.window,
            subquery: self.subquery || other.subquery,
            nondeterministic: self.nondeterministic || other.nondeterministic,
        }
    }
}

/// Value computed by the surrounding engine and bound at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Aggregate,
    Window,
    Subquery,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Aggregate => "aggregate",
            SlotKind::Window => "window",
            SlotKind::Subquery => "subquery",
        }
    }
}

#[derive(Debug)]
pub enum ItemKind {
    Literal {
        value: Value,
        /// `None` takes the session collation at resolution.
        collation: Option<CollationId>,
    },
    Column {
        index: usize,
        name: String,
    },
    Slot {
        kind: SlotKind,
        index: usize,
    },
    /// Row constructor `(a, b, ...)`
    Row,
    Func(Function),
    Udf(UdfCall),
}

/// Per-node state kept between evaluations.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeState {
    /// Comparison type chosen at resolution.
    pub cmp: Option<CmpType>,
    /// Fractional digits `/` adds, captured from the session.
    pub div_increment: u8,
    /// Generator of `RAND(seed)`.
    pub rand: Option<RandState>,
    pub rand_seeded: bool,
}

/// Borrowed parts of a node handed to the per-family code.
pub(crate) struct Node<'a> {
    pub args: &'a mut Args,
    pub attrs: &'a mut TypeAttributes,
    pub state: &'a mut NodeState,
}

/// A node of a scalar expression tree.
///
/// Built by the caller, resolved once with [`Item::fix_fields`] and then
/// evaluated any number of times. Every node answers all of the `eval_*`
/// views; [`Item::eval`] returns its native domain.
#[derive(Debug)]
pub struct Item {
    pub(crate) kind: ItemKind,
    pub(crate) args: Args,
    pub(crate) attrs: TypeAttributes,
    pub(crate) flags: ItemFlags,
    pub(crate) state: NodeState,
    pub(crate) constant: bool,
    pub(crate) fixed: bool,
    pub(crate) null_value: bool,
}

impl Item {
    fn new(kind: ItemKind, args: Vec<Item>, attrs: TypeAttributes) -> Item {
        Item {
            kind,
            args: args.into_iter().map(Box::new).collect(),
            attrs,
            flags: ItemFlags::default(),
            state: NodeState::default(),
            constant: false,
            fixed: false,
            null_value: false,
        }
    }

    pub fn literal(value: Value) -> Item {
        let attrs = TypeAttributes::of_value(&value, CollationId::default());
        Item::new(
            ItemKind::Literal {
                value,
                collation: None,
            },
            Vec::new(),
            attrs,
        )
    }

    pub fn null() -> Item {
        Item::literal(Value::Null)
    }

    pub fn int(value: i64) -> Item {
        Item::literal(Value::Int(value))
    }

    pub fn uint(value: u64) -> Item {
        Item::literal(Value::UInt(value))
    }

    pub fn real(value: f64) -> Item {
        Item::literal(Value::Real(value))
    }

    /// Exact numeric literal such as `1.50`.
    pub fn decimal(text: &str) -> ExpressionResult<Item> {
        match Decimal::parse(text) {
            (d, DecimalStatus::Ok) => Ok(Item::literal(Value::Decimal(d))),
            _ => Err(ExpressionError::InvalidArgument {
                message: format!("Invalid decimal literal '{}'", text),
            }),
        }
    }

    pub fn string(text: &str) -> Item {
        Item::literal(Value::String(text.to_string()))
    }

    pub fn string_with_collation(text: &str, collation: CollationId) -> Item {
        let value = Value::String(text.to_string());
        let attrs = TypeAttributes::of_value(&value, collation);
        Item::new(
            ItemKind::Literal {
                value,
                collation: Some(collation),
            },
            Vec::new(),
            attrs,
        )
    }

    pub fn temporal(value: Temporal) -> Item {
        Item::literal(Value::Temporal(value))
    }

    /// Reference to column `index` of the evaluated row, of declared type `attrs`.
    pub fn column(index: usize, name: &str, attrs: TypeAttributes) -> Item {
        Item::new(
            ItemKind::Column {
                index,
                name: name.to_string(),
            },
            Vec::new(),
            attrs,
        )
    }

    /// Pre-computed aggregate, window or subquery result.
    pub fn slot(kind: SlotKind, index: usize, attrs: TypeAttributes) -> Item {
        let mut item = Item::new(ItemKind::Slot { kind, index }, Vec::new(), attrs);
        match kind {
            SlotKind::Aggregate => item.flags.aggregate = true,
            SlotKind::Window => item.flags.window = true,
            SlotKind::Subquery => item.flags.subquery = true,
        }
        item
    }

    pub fn row(items: Vec<Item>) -> Item {
        Item::new(ItemKind::Row, items, TypeAttributes::int(1, false))
    }

    pub fn func(function: Function, args: Vec<Item>) -> Item {
        Item::new(ItemKind::Func(function), args, TypeAttributes::int(1, false))
    }

    /// Builds a function called by name, e.g. `LOCATE`.
    pub fn call(name: &str, args: Vec<Item>) -> ExpressionResult<Item> {
        match Function::from_name(name) {
            Some(function) => Ok(Item::func(function, args)),
            None => Err(ExpressionError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }

    pub fn udf(call: UdfCall, args: Vec<Item>) -> Item {
        Item::new(ItemKind::Udf(call), args, TypeAttributes::string(0, CollationId::Binary))
    }

    pub fn arith(op: ArithOp, left: Item, right: Item) -> Item {
        Item::func(Function::Arith(op), vec![left, right])
    }

    pub fn plus(left: Item, right: Item) -> Item {
        Item::arith(ArithOp::Plus, left, right)
    }

    pub fn minus(left: Item, right: Item) -> Item {
        Item::arith(ArithOp::Minus, left, right)
    }

    pub fn mul(left: Item, right: Item) -> Item {
        Item::arith(ArithOp::Mul, left, right)
    }

    pub fn div(left: Item, right: Item) -> Item {
        Item::arith(ArithOp::Div, left, right)
    }

    pub fn int_div(left: Item, right: Item) -> Item {
        Item::arith(ArithOp::IntDiv, left, right)
    }

    pub fn modulo(left: Item, right: Item) -> Item {
        Item::arith(ArithOp::Mod, left, right)
    }

    pub fn neg(arg: Item) -> Item {
        Item::func(Function::Arith(ArithOp::Neg), vec![arg])
    }

    pub fn abs(arg: Item) -> Item {
        Item::func(Function::Arith(ArithOp::Abs), vec![arg])
    }

    pub fn compare(op: CompareOp, left: Item, right: Item) -> Item {
        Item::func(Function::Compare(op), vec![left, right])
    }

    pub fn logic(op: LogicOp, args: Vec<Item>) -> Item {
        Item::func(Function::Logic(op), args)
    }

    pub fn and(left: Item, right: Item) -> Item {
        Item::logic(LogicOp::And, vec![left, right])
    }

    pub fn or(left: Item, right: Item) -> Item {
        Item::logic(LogicOp::Or, vec![left, right])
    }

    pub fn not(arg: Item) -> Item {
        Item::logic(LogicOp::Not, vec![arg])
    }

    pub fn is_null(arg: Item) -> Item {
        Item::logic(LogicOp::IsNull, vec![arg])
    }

    pub fn math(function: MathFunc, args: Vec<Item>) -> Item {
        Item::func(Function::Math(function), args)
    }

    pub fn round(arg: Item, decimals: Item) -> Item {
        Item::math(MathFunc::Round, vec![arg, decimals])
    }

    pub fn truncate(arg: Item, decimals: Item) -> Item {
        Item::math(MathFunc::Truncate, vec![arg, decimals])
    }

    pub fn bit(op: BitOp, args: Vec<Item>) -> Item {
        Item::func(Function::Bit(op), args)
    }

    pub fn greatest(args: Vec<Item>) -> Item {
        Item::func(Function::MinMax(MinMaxOp::Greatest), args)
    }

    pub fn least(args: Vec<Item>) -> Item {
        Item::func(Function::MinMax(MinMaxOp::Least), args)
    }

    pub fn cast(arg: Item, target: CastTarget) -> Item {
        Item::func(Function::Cast(target), vec![arg])
    }

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    pub fn args(&self) -> impl Iterator<Item = &Item> {
        self.args.iter().map(|a| a.as_ref())
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn attrs(&self) -> &TypeAttributes {
        &self.attrs
    }

    pub fn result_type(&self) -> ResultType {
        self.attrs.result_type
    }

    pub fn flags(&self) -> ItemFlags {
        self.flags
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Whether the last evaluation produced NULL.
    pub fn null_value(&self) -> bool {
        self.null_value
    }

    /// True for subtrees without column references or volatile functions.
    pub fn is_const(&self) -> bool {
        self.constant
    }

    /// Number of columns; 1 for everything but row constructors.
    pub fn cols(&self) -> usize {
        match self.kind {
            ItemKind::Row => self.args.len(),
            _ => 1,
        }
    }

    pub(crate) fn element(&self, i: usize) -> &Item {
        match self.kind {
            ItemKind::Row => &self.args[i],
            _ => self,
        }
    }

    pub(crate) fn element_mut(&mut self, i: usize) -> &mut Item {
        match self.kind {
            ItemKind::Row => &mut *self.args[i],
            _ => self,
        }
    }

    /// Per-execution cleanup: tears down plugin functions and forgets
    /// seeds and latched errors, keeping the resolved types.
    pub fn cleanup(&mut self) {
        for arg in self.args.iter_mut() {
            arg.cleanup();
        }
        if let ItemKind::Udf(call) = &mut self.kind {
            call.cleanup();
        }
        self.state.rand_seeded = false;
        self.null_value = false;
    }

    /// Returns the tree to the unresolved state for re-preparation.
    pub fn reset(&mut self) {
        self.cleanup();
        for arg in self.args.iter_mut() {
            arg.reset();
        }
        if let ItemKind::Udf(call) = &mut self.kind {
            call.reset();
        }
        self.state = NodeState::default();
        if !matches!(self.kind, ItemKind::Slot { .. } | ItemKind::Column { .. }) {
            self.flags = ItemFlags::default();
        }
        self.fixed = false;
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, args: &Args) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", arg)?;
    }
    Ok(())
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = &self.args;
        match &self.kind {
            ItemKind::Literal { value, .. } => write!(f, "{}", value),
            ItemKind::Column { name, .. } => write!(f, "`{}`", name),
            ItemKind::Slot { kind, index } => write!(f, "<{} {}>", kind.as_str(), index),
            ItemKind::Row => {
                write!(f, "(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ItemKind::Udf(call) => {
                write!(f, "{}(", call.name())?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ItemKind::Func(function) => match function {
                Function::Arith(ArithOp::Neg) => write!(f, "-{}", args[0]),
                Function::Arith(ArithOp::Abs) => write!(f, "abs({})", args[0]),
                Function::Arith(op) => write!(f, "({} {} {})", args[0], op.symbol(), args[1]),
                Function::Compare(op) => write!(f, "({} {} {})", args[0], op.symbol(), args[1]),
                Function::Logic(LogicOp::Not) => write!(f, "(not({}))", args[0]),
                Function::Logic(LogicOp::IsNull) => write!(f, "({} is null)", args[0]),
                Function::Logic(LogicOp::IsNotNull) => write!(f, "({} is not null)", args[0]),
                Function::Logic(_) => {
                    write!(f, "({} {} {})", args[0], function.name(), args[1])
                }
                Function::Bit(BitOp::Not) => write!(f, "~({})", args[0]),
                Function::Bit(BitOp::Count) => write!(f, "bit_count({})", args[0]),
                Function::Bit(op) => write!(f, "({} {} {})", args[0], op.symbol(), args[1]),
                Function::Cast(target) => {
                    write!(f, "cast({} as ", args[0])?;
                    match target {
                        CastTarget::Signed => write!(f, "signed)"),
                        CastTarget::Unsigned => write!(f, "unsigned)"),
                        CastTarget::Decimal { precision, scale } => {
                            write!(f, "decimal({},{}))", precision, scale)
                        }
                        CastTarget::Double => write!(f, "double)"),
                    }
                }
                _ => {
                    write!(f, "{}(", function.name())?;
                    write_list(f, args)?;
                    write!(f, ")")
                }
            },
        }
    }
}

/// The two operands of a binary node.
pub(crate) fn pair(args: &mut Args) -> (&mut Item, &mut Item) {
    let (left, right) = args.split_at_mut(1);
    (&mut *left[0], &mut *right[0])
}

/// An INT value read with the node's signedness.
pub(crate) fn int_value(value: i64, unsigned: bool) -> Value {
    if unsigned {
        Value::UInt(value as u64)
    } else {
        Value::Int(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::function::MiscFunc;

    #[test]
    fn test_literal_attributes() {
        let attrs = *Item::int(-123).attrs();
        assert_eq!(attrs.result_type, ResultType::Int);
        assert_eq!(attrs.precision, 3);
        assert_eq!(attrs.max_length, 4);
        assert!(!attrs.unsigned);

        let attrs = *Item::uint(u64::MAX).attrs();
        assert_eq!(attrs.precision, 20);
        assert!(attrs.unsigned);

        let attrs = *Item::decimal("-12.50").unwrap().attrs();
        assert_eq!(attrs.result_type, ResultType::Decimal);
        assert_eq!((attrs.precision, attrs.decimals), (4, 2));
        assert_eq!(attrs.max_length, 6);

        let attrs = *Item::real(1.5).attrs();
        assert_eq!(attrs.decimals, NOT_FIXED_DEC);
        assert!(Item::null().attrs().nullable);
    }

    #[test]
    fn test_decimal_precision_views() {
        let attrs = TypeAttributes::decimal(10, 3, false);
        assert_eq!(attrs.decimal_int_part(), 7);
        assert_eq!(attrs.max_length, 12);

        let real = TypeAttributes::real(NOT_FIXED_DEC);
        assert_eq!(real.decimal_scale(), 0);
        assert_eq!(real.numeric_context(), ResultType::Real);

        let time = TypeAttributes::temporal(TemporalKind::DateTime, 2);
        assert_eq!(time.decimal_precision(), 16);
        assert_eq!(time.numeric_context(), ResultType::Decimal);
        let date = TypeAttributes::temporal(TemporalKind::Date, 3);
        assert_eq!(date.numeric_context(), ResultType::Int);
    }

    #[test]
    fn test_print() {
        let expr = Item::plus(
            Item::column(0, "a", TypeAttributes::bigint(false)),
            Item::mul(Item::int(2), Item::string("x'y")),
        );
        assert_eq!(expr.to_string(), "(`a` + (2 * 'x''y'))");

        let expr = Item::cast(
            Item::neg(Item::int(1)),
            CastTarget::Decimal {
                precision: 5,
                scale: 2,
            },
        );
        assert_eq!(expr.to_string(), "cast(-1 as decimal(5,2))");

        let expr = Item::call("locate", vec![Item::string("b"), Item::string("abc")]).unwrap();
        assert_eq!(expr.to_string(), "locate('b','abc')");

        let expr = Item::func(Function::Misc(MiscFunc::Rand), vec![]);
        assert_eq!(expr.to_string(), "rand()");
        assert!(Item::call("nope", vec![]).is_err());
    }

    #[test]
    fn test_row_columns() {
        let row = Item::row(vec![Item::int(1), Item::int(2)]);
        assert_eq!(row.cols(), 2);
        assert_eq!(row.element(1).to_string(), "2");
        assert_eq!(Item::int(5).cols(), 1);
    }
}
