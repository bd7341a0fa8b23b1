//! Bridge between expression nodes and externally registered scalar
//! functions.
//!
//! A plugin implements [`ScalarFunction`]. The bridging node marshals its
//! arguments into [`UdfArg`]s before every call and turns the returned
//! [`UdfValue`] back into a [`Value`] of the domain the plugin declared at
//! initialization.

use super::error::{ExpressionError, ExpressionResult};
use super::eval::EvalContext;
use super::item::{Item, Node, TypeAttributes};
use crate::charset::Charset;
use crate::decimal::{Decimal, MAX_PRECISION};
use crate::session::Session;
use crate::value::{format_real, ResultType, Value, NOT_FIXED_DEC};
use dashmap::DashMap;
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// One argument as seen by a plugin.
#[derive(Debug, Clone, PartialEq)]
pub enum UdfArg {
    Null,
    Str { bytes: Vec<u8>, charset: Charset },
    Int(i64),
    UInt(u64),
    Real(f64),
    /// Decimal in its canonical text form.
    Decimal(String),
}

/// Metadata of one argument passed to [`ScalarFunction::init`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArgInfo {
    pub result_type: ResultType,
    pub max_length: u32,
    pub nullable: bool,
    /// Value of a constant argument; `None` for anything row dependent.
    pub value: Option<UdfArg>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InitArgs {
    pub args: Vec<ArgInfo>,
}

/// What a plugin declares about its result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitOutput {
    /// One of INT, REAL, DECIMAL or STRING.
    pub result_type: ResultType,
    pub max_length: u32,
    pub nullable: bool,
    pub decimals: u8,
}

impl InitOutput {
    pub fn new(result_type: ResultType) -> Self {
        Self {
            result_type,
            max_length: 0,
            nullable: true,
            decimals: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UdfValue {
    Str(String),
    Int(i64),
    Real(f64),
    Decimal(String),
}

/// Outcome of one per-row call.
#[derive(Debug, Clone, PartialEq)]
pub enum UdfResult {
    Value(UdfValue),
    Null,
    /// The plugin failed; the node yields NULL until the next execution.
    Error,
}

/// An externally provided scalar function.
pub trait ScalarFunction: Send {
    fn name(&self) -> &str;

    /// Validates the arguments and declares the result. An `Err` message
    /// aborts preparing the statement.
    fn init(&mut self, args: &InitArgs) -> Result<InitOutput, String>;

    fn evaluate(&mut self, args: &[UdfArg]) -> UdfResult;

    fn deinit(&mut self) {}

    fn deterministic(&self) -> bool {
        true
    }
}

/// A plugin instance owned by one expression node.
pub struct UdfCall {
    name: String,
    function: Box<dyn ScalarFunction>,
    init_args: Option<InitArgs>,
    output: Option<InitOutput>,
    initialized: bool,
    failed: bool,
}

impl UdfCall {
    pub fn new(name: &str, function: Box<dyn ScalarFunction>) -> Self {
        Self {
            name: name.to_lowercase(),
            function,
            init_args: None,
            output: None,
            initialized: false,
            failed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_deterministic(&self) -> bool {
        self.function.deterministic()
    }

    fn init(&mut self, args: &InitArgs) -> Result<InitOutput, String> {
        let output = self.function.init(args)?;
        self.initialized = true;
        debug!("plugin function {} initialized as {}", self.name, output.result_type);
        Ok(output)
    }

    /// Ends the current execution: tears the plugin down and clears a
    /// latched failure. The next evaluation initializes it again.
    pub fn cleanup(&mut self) {
        if self.initialized {
            self.function.deinit();
            self.initialized = false;
            debug!("plugin function {} deinitialized", self.name);
        }
        self.failed = false;
    }

    pub fn reset(&mut self) {
        self.cleanup();
        self.init_args = None;
        self.output = None;
    }
}

impl Drop for UdfCall {
    fn drop(&mut self) {
        if self.initialized {
            self.function.deinit();
        }
    }
}

impl fmt::Debug for UdfCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdfCall")
            .field("name", &self.name)
            .field("output", &self.output)
            .field("initialized", &self.initialized)
            .field("failed", &self.failed)
            .finish()
    }
}

pub type FunctionFactory = Arc<dyn Fn() -> Box<dyn ScalarFunction> + Send + Sync>;

/// Process-wide table of plugin functions, keyed by lowercase name.
#[derive(Default)]
pub struct FunctionRegistry {
    factories: DashMap<String, FunctionFactory>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`, returning false when it replaced an existing
    /// registration.
    pub fn register<F>(&self, name: &str, factory: F) -> bool
    where
        F: Fn() -> Box<dyn ScalarFunction> + Send + Sync + 'static,
    {
        debug!("registering plugin function {}", name);
        self.factories
            .insert(name.to_lowercase(), Arc::new(factory))
            .is_none()
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.factories.remove(&name.to_lowercase()).is_some()
    }

    /// A fresh plugin instance for one expression node.
    pub fn create(&self, name: &str) -> ExpressionResult<UdfCall> {
        let factory = self
            .factories
            .get(&name.to_lowercase())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ExpressionError::UnknownFunction {
                name: name.to_string(),
            })?;
        Ok(UdfCall::new(name, factory()))
    }

    /// Builds a node calling the plugin function `name`.
    pub fn call(&self, name: &str, args: Vec<Item>) -> ExpressionResult<Item> {
        Ok(Item::udf(self.create(name)?, args))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn clear(&self) {
        self.factories.clear();
    }
}

/// Converts an argument to the representation plugins receive.
fn marshal(item: &mut Item, ctx: &mut EvalContext<'_>) -> ExpressionResult<UdfArg> {
    let arg = match item.attrs.result_type {
        ResultType::Int => {
            let unsigned = item.attrs.unsigned;
            item.eval_int(ctx)?.map(|v| {
                if unsigned {
                    UdfArg::UInt(v as u64)
                } else {
                    UdfArg::Int(v)
                }
            })
        }
        ResultType::Real => item.eval_real(ctx)?.map(UdfArg::Real),
        ResultType::Decimal => item
            .eval_decimal(ctx)?
            .map(|d| UdfArg::Decimal(d.to_string())),
        ResultType::String | ResultType::Temporal => {
            let charset = item.attrs.collation.collation().charset();
            item.eval_str(ctx)?.map(|s| UdfArg::Str {
                bytes: s.into_bytes(),
                charset,
            })
        }
    };
    Ok(arg.unwrap_or(UdfArg::Null))
}

fn output_attrs(output: &InitOutput, session: &Session) -> TypeAttributes {
    let mut attrs = match output.result_type {
        ResultType::Int => TypeAttributes::bigint(false),
        ResultType::Decimal => {
            let precision = output
                .max_length
                .clamp(output.decimals as u32 + 1, MAX_PRECISION as u32) as u8;
            TypeAttributes::decimal(precision, output.decimals, false)
        }
        ResultType::String | ResultType::Temporal => {
            TypeAttributes::string(output.max_length, session.config().collation)
        }
        ResultType::Real => TypeAttributes::real(output.decimals),
    };
    if output.max_length > 0 {
        attrs.max_length = output.max_length;
    }
    attrs.nullable(output.nullable)
}

pub(super) fn resolve(call: &mut UdfCall, node: Node<'_>, session: &mut Session) -> ExpressionResult<()> {
    let mut args = Vec::with_capacity(node.args.len());
    {
        let mut ctx = EvalContext::new(session);
        for arg in node.args.iter_mut() {
            let value = if arg.constant {
                Some(marshal(arg, &mut ctx)?)
            } else {
                None
            };
            args.push(ArgInfo {
                result_type: arg.attrs.result_type,
                max_length: arg.attrs.max_length,
                nullable: arg.attrs.nullable,
                value,
            });
        }
    }
    let init_args = InitArgs { args };
    let output = call.init(&init_args).map_err(|message| {
        warn!("plugin function {} failed to initialize: {}", call.name, message);
        ExpressionError::UdfInit {
            name: call.name.clone(),
            message,
        }
    })?;
    if output.result_type == ResultType::Temporal {
        return Err(ExpressionError::UdfInit {
            name: call.name.clone(),
            message: "unsupported result type".to_string(),
        });
    }
    *node.attrs = output_attrs(&output, session);
    call.init_args = Some(init_args);
    call.output = Some(output);
    Ok(())
}

/// Converts a plugin result to the declared domain.
fn unmarshal(value: UdfValue, result_type: ResultType, ctx: &mut EvalContext<'_>) -> Value {
    let value = match value {
        UdfValue::Str(s) => Value::String(s),
        UdfValue::Int(v) => Value::Int(v),
        UdfValue::Real(v) => Value::Real(v),
        UdfValue::Decimal(text) => match text.parse::<Decimal>() {
            Ok(d) => Value::Decimal(d),
            Err(_) => return Value::Null,
        },
    };
    let (converted, note) = match result_type {
        ResultType::Int => {
            let (v, note) = value.to_int(false);
            (Value::Int(v), note)
        }
        ResultType::Real => {
            let (v, note) = value.to_real();
            (Value::Real(v), note)
        }
        ResultType::Decimal => {
            let (d, note) = value.to_decimal();
            (Value::Decimal(d), note)
        }
        ResultType::String | ResultType::Temporal => {
            let text = match value {
                Value::String(s) => s,
                Value::Real(v) => format_real(v, NOT_FIXED_DEC),
                other => other.to_text(0),
            };
            (Value::String(text), None)
        }
    };
    if let Some(note) = note {
        ctx.session.report_conversion(note);
    }
    converted
}

pub(super) fn evaluate(
    call: &mut UdfCall,
    node: Node<'_>,
    ctx: &mut EvalContext<'_>,
) -> ExpressionResult<Value> {
    if call.failed {
        return Ok(Value::Null);
    }
    let Some(output) = call.output else {
        return Err(ExpressionError::NotFixed {
            expression: call.name.clone(),
        });
    };
    if !call.initialized {
        let init_args = call.init_args.take().unwrap_or_default();
        let reinit = call.init(&init_args);
        call.init_args = Some(init_args);
        if let Err(message) = reinit {
            warn!("plugin function {} failed to initialize: {}", call.name, message);
            call.failed = true;
            return Ok(Value::Null);
        }
    }

    let mut args = Vec::with_capacity(node.args.len());
    for arg in node.args.iter_mut() {
        args.push(marshal(arg, ctx)?);
    }
    Ok(match call.function.evaluate(&args) {
        UdfResult::Value(value) => unmarshal(value, output.result_type, ctx),
        UdfResult::Null => Value::Null,
        UdfResult::Error => {
            debug!("plugin function {} reported an error", call.name);
            call.failed = true;
            Value::Null
        }
    })
}
