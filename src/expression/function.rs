//! Built-in operators and scalar functions.

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Plus,
    Minus,
    Mul,
    Div,
    /// Integer division, `DIV`
    IntDiv,
    Mod,
    Neg,
    Abs,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Plus => "+",
            ArithOp::Minus | ArithOp::Neg => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::IntDiv => "DIV",
            ArithOp::Mod => "%",
            ArithOp::Abs => "abs",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Null-safe equality, `<=>`
    NullSafeEq,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::NullSafeEq => "<=>",
        }
    }
}

/// Boolean connectives and NULL tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    And,
    Or,
    Xor,
    Not,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathFunc {
    Ceiling,
    Floor,
    Round,
    Truncate,
    Sign,
    Ln,
    Log,
    Log2,
    Log10,
    Exp,
    Sqrt,
    Pow,
    Acos,
    Asin,
    Atan,
    Cos,
    Sin,
    Tan,
    Cot,
    Degrees,
    Radians,
    Pi,
}

/// Bitwise operators on 64-bit unsigned integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitOp {
    Not,
    ShiftLeft,
    ShiftRight,
    And,
    Or,
    Xor,
    Count,
}

impl BitOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BitOp::Not => "~",
            BitOp::ShiftLeft => "<<",
            BitOp::ShiftRight => ">>",
            BitOp::And => "&",
            BitOp::Or => "|",
            BitOp::Xor => "^",
            BitOp::Count => "bit_count",
        }
    }
}

/// String inspection functions returning integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrFunc {
    Length,
    CharLength,
    Ascii,
    Ord,
    Locate,
    Field,
    FindInSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinMaxOp {
    Greatest,
    Least,
}

/// Target of a numeric `CAST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastTarget {
    Signed,
    Unsigned,
    Decimal { precision: u8, scale: u8 },
    Double,
}

/// Functions with side effects or session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiscFunc {
    ConnectionId,
    LastValue,
    Benchmark,
    Rand,
    GetLock,
    ReleaseLock,
    IsFreeLock,
    IsUsedLock,
    ReleaseAllLocks,
    UuidShort,
    Sleep,
}

/// A built-in function or operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Arith(ArithOp),
    Compare(CompareOp),
    Logic(LogicOp),
    Math(MathFunc),
    Bit(BitOp),
    Str(StrFunc),
    MinMax(MinMaxOp),
    Cast(CastTarget),
    Misc(MiscFunc),
}

const NAMES: &[(&str, Function)] = &[
    ("abs", Function::Arith(ArithOp::Abs)),
    ("ceil", Function::Math(MathFunc::Ceiling)),
    ("ceiling", Function::Math(MathFunc::Ceiling)),
    ("floor", Function::Math(MathFunc::Floor)),
    ("round", Function::Math(MathFunc::Round)),
    ("truncate", Function::Math(MathFunc::Truncate)),
    ("sign", Function::Math(MathFunc::Sign)),
    ("ln", Function::Math(MathFunc::Ln)),
    ("log", Function::Math(MathFunc::Log)),
    ("log2", Function::Math(MathFunc::Log2)),
    ("log10", Function::Math(MathFunc::Log10)),
    ("exp", Function::Math(MathFunc::Exp)),
    ("sqrt", Function::Math(MathFunc::Sqrt)),
    ("pow", Function::Math(MathFunc::Pow)),
    ("power", Function::Math(MathFunc::Pow)),
    ("acos", Function::Math(MathFunc::Acos)),
    ("asin", Function::Math(MathFunc::Asin)),
    ("atan", Function::Math(MathFunc::Atan)),
    ("atan2", Function::Math(MathFunc::Atan)),
    ("cos", Function::Math(MathFunc::Cos)),
    ("sin", Function::Math(MathFunc::Sin)),
    ("tan", Function::Math(MathFunc::Tan)),
    ("cot", Function::Math(MathFunc::Cot)),
    ("degrees", Function::Math(MathFunc::Degrees)),
    ("radians", Function::Math(MathFunc::Radians)),
    ("pi", Function::Math(MathFunc::Pi)),
    ("bit_count", Function::Bit(BitOp::Count)),
    ("length", Function::Str(StrFunc::Length)),
    ("octet_length", Function::Str(StrFunc::Length)),
    ("char_length", Function::Str(StrFunc::CharLength)),
    ("character_length", Function::Str(StrFunc::CharLength)),
    ("ascii", Function::Str(StrFunc::Ascii)),
    ("ord", Function::Str(StrFunc::Ord)),
    ("locate", Function::Str(StrFunc::Locate)),
    ("field", Function::Str(StrFunc::Field)),
    ("find_in_set", Function::Str(StrFunc::FindInSet)),
    ("greatest", Function::MinMax(MinMaxOp::Greatest)),
    ("least", Function::MinMax(MinMaxOp::Least)),
    ("connection_id", Function::Misc(MiscFunc::ConnectionId)),
    ("last_value", Function::Misc(MiscFunc::LastValue)),
    ("benchmark", Function::Misc(MiscFunc::Benchmark)),
    ("rand", Function::Misc(MiscFunc::Rand)),
    ("get_lock", Function::Misc(MiscFunc::GetLock)),
    ("release_lock", Function::Misc(MiscFunc::ReleaseLock)),
    ("is_free_lock", Function::Misc(MiscFunc::IsFreeLock)),
    ("is_used_lock", Function::Misc(MiscFunc::IsUsedLock)),
    ("release_all_locks", Function::Misc(MiscFunc::ReleaseAllLocks)),
    ("uuid_short", Function::Misc(MiscFunc::UuidShort)),
    ("sleep", Function::Misc(MiscFunc::Sleep)),
];

impl Function {
    /// Looks up a function called by name, case-insensitively.
    ///
    /// Operators and casts have their own syntax and are not found here.
    pub fn from_name(name: &str) -> Option<Function> {
        let lower = name.to_ascii_lowercase();
        NAMES
            .iter()
            .find(|(n, _)| *n == lower)
            .map(|(_, f)| *f)
    }

    /// Name used in diagnostics and when printing function-call syntax.
    pub fn name(&self) -> &'static str {
        match self {
            Function::Arith(ArithOp::Plus) => "+",
            Function::Arith(ArithOp::Minus) => "-",
            Function::Arith(ArithOp::Neg) => "-",
            Function::Arith(ArithOp::Mul) => "*",
            Function::Arith(ArithOp::Div) => "/",
            Function::Arith(ArithOp::IntDiv) => "DIV",
            Function::Arith(ArithOp::Mod) => "%",
            Function::Compare(op) => op.symbol(),
            Function::Logic(LogicOp::And) => "and",
            Function::Logic(LogicOp::Or) => "or",
            Function::Logic(LogicOp::Xor) => "xor",
            Function::Logic(LogicOp::Not) => "not",
            Function::Logic(LogicOp::IsNull) => "isnull",
            Function::Logic(LogicOp::IsNotNull) => "isnotnull",
            Function::Bit(op) if *op != BitOp::Count => op.symbol(),
            Function::Cast(_) => "cast",
            Function::Math(MathFunc::Atan) => "atan",
            _ => NAMES
                .iter()
                .find(|(_, f)| f == self)
                .map(|(n, _)| *n)
                .unwrap_or("?"),
        }
    }

    /// Accepted argument counts as `(min, max)`; `None` is unbounded.
    pub fn arg_count(&self) -> (usize, Option<usize>) {
        match self {
            Function::Arith(ArithOp::Neg | ArithOp::Abs) => (1, Some(1)),
            Function::Arith(_) => (2, Some(2)),
            Function::Compare(_) => (2, Some(2)),
            Function::Logic(LogicOp::Not | LogicOp::IsNull | LogicOp::IsNotNull) => (1, Some(1)),
            Function::Logic(_) => (2, Some(2)),
            Function::Math(MathFunc::Pi) => (0, Some(0)),
            Function::Math(MathFunc::Round | MathFunc::Log | MathFunc::Atan) => (1, Some(2)),
            Function::Math(MathFunc::Truncate | MathFunc::Pow) => (2, Some(2)),
            Function::Math(_) => (1, Some(1)),
            Function::Bit(BitOp::Not | BitOp::Count) => (1, Some(1)),
            Function::Bit(_) => (2, Some(2)),
            Function::Str(StrFunc::Locate) => (2, Some(3)),
            Function::Str(StrFunc::Field) => (2, None),
            Function::Str(StrFunc::FindInSet) => (2, Some(2)),
            Function::Str(_) => (1, Some(1)),
            Function::MinMax(_) => (2, None),
            Function::Cast(_) => (1, Some(1)),
            Function::Misc(MiscFunc::ConnectionId | MiscFunc::ReleaseAllLocks | MiscFunc::UuidShort) => {
                (0, Some(0))
            }
            Function::Misc(MiscFunc::LastValue) => (1, None),
            Function::Misc(MiscFunc::Benchmark | MiscFunc::GetLock) => (2, Some(2)),
            Function::Misc(MiscFunc::Rand) => (0, Some(1)),
            Function::Misc(_) => (1, Some(1)),
        }
    }

    /// False for functions whose result may differ between two calls with
    /// the same arguments, or that have side effects.
    pub fn is_deterministic(&self) -> bool {
        !matches!(
            self,
            Function::Misc(
                MiscFunc::Benchmark
                    | MiscFunc::Rand
                    | MiscFunc::GetLock
                    | MiscFunc::ReleaseLock
                    | MiscFunc::IsFreeLock
                    | MiscFunc::IsUsedLock
                    | MiscFunc::ReleaseAllLocks
                    | MiscFunc::UuidShort
                    | MiscFunc::Sleep
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(Function::from_name("LOCATE"), Some(Function::Str(StrFunc::Locate)));
        assert_eq!(Function::from_name("Power"), Some(Function::Math(MathFunc::Pow)));
        assert_eq!(Function::from_name("no_such_fn"), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(Function::Math(MathFunc::Ceiling).name(), "ceil");
        assert_eq!(Function::Str(StrFunc::Length).name(), "length");
        assert_eq!(Function::Bit(BitOp::ShiftLeft).name(), "<<");
        assert_eq!(Function::Bit(BitOp::Count).name(), "bit_count");
        assert_eq!(Function::Misc(MiscFunc::GetLock).name(), "get_lock");
    }

    #[test]
    fn test_arg_count() {
        assert_eq!(Function::Str(StrFunc::Locate).arg_count(), (2, Some(3)));
        assert_eq!(Function::MinMax(MinMaxOp::Least).arg_count(), (2, None));
        assert_eq!(Function::Misc(MiscFunc::Rand).arg_count(), (0, Some(1)));
    }

    #[test]
    fn test_determinism() {
        assert!(Function::Arith(ArithOp::Plus).is_deterministic());
        assert!(!Function::Misc(MiscFunc::Rand).is_deterministic());
        assert!(!Function::Misc(MiscFunc::Sleep).is_deterministic());
    }
}
