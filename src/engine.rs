use crate::compiler::{CompileError, Compiler};
use crate::language::errors::SyntaxErrors;
use crate::language::parser::{parse_chunk, parse_expression};
use crate::runtime::environment::{ExecContext, GlobalEnvironment};
use crate::runtime::error::RuntimeError;
use crate::runtime::value::Value;
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Syntax(#[from] SyntaxErrors),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("Cannot convert `{found}` to {expected}")]
    Conversion {
        expected: &'static str,
        found: String,
    },
}

pub struct ScriptEngine {
    globals: GlobalEnvironment,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self {
            globals: GlobalEnvironment::new(),
        }
    }

    pub fn set_global(&mut self, name: &str, value: impl IntoValue) {
        self.globals.set(name, value.into_value());
    }

    pub fn global(&self, name: &str) -> Value {
        self.globals.get(name)
    }

    pub fn execute(&mut self, source: &str) -> Result<(), EngineError> {
        let chunk = parse_chunk(source)?;
        let root = Compiler::new().compile_chunk(&chunk)?;
        debug!("executing script ({} byte(s))", source.len());
        let mut ctx = ExecContext::new(&mut self.globals);
        root.eval(&mut ctx)?;
        Ok(())
    }

    pub fn evaluate<T: FromValue>(&mut self, source: &str) -> Result<T, EngineError> {
        let expr = parse_expression(source)?;
        let root = Compiler::new().compile_expression(&expr)?;
        debug!("evaluating expression ({} byte(s))", source.len());
        let mut ctx = ExecContext::new(&mut self.globals);
        let value = root.eval(&mut ctx)?;
        T::from_value(value).map_err(|value| EngineError::Conversion {
            expected: T::EXPECTED,
            found: value.type_name(),
        })
    }
}

// Conversion of an evaluation result into a host type. Returns the original
// value on mismatch so the error can name what was actually produced.
pub trait FromValue: Sized {
    const EXPECTED: &'static str;

    fn from_value(value: Value) -> Result<Self, Value>;
}

impl FromValue for Value {
    const EXPECTED: &'static str = "value";

    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value)
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(other),
        }
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(other),
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            other => Err(other),
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Str(v) => Ok(v),
            other => Err(other),
        }
    }
}

pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Int(self as i64)
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_string())
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}
