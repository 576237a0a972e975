use crate::runtime::environment::Frame;
use crate::runtime::exec::Node;
use crate::runtime::host::{ClassDescriptor, HostFunction, HostObject};
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Function(Rc<FunctionValue>),
    HostFn(Rc<HostFunction>),
    Host(Rc<dyn HostObject>),
}

impl Value {
    pub fn host<T: HostObject + 'static>(object: T) -> Value {
        Value::Host(Rc::new(object))
    }

    pub fn host_fn(function: HostFunction) -> Value {
        Value::HostFn(Rc::new(function))
    }

    pub fn as_bool(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_host(&self) -> Option<&Rc<dyn HostObject>> {
        match self {
            Value::Host(object) => Some(object),
            _ => None,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Function(_) => "function".to_string(),
            Value::HostFn(function) => format!("function `{}`", function.name()),
            Value::Host(object) => object.descriptor().name().to_string(),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        match self {
            Value::Nil => TypeKey::Nil,
            Value::Bool(_) => TypeKey::Bool,
            Value::Int(_) => TypeKey::Int,
            Value::Float(_) => TypeKey::Float,
            Value::Str(_) => TypeKey::Str,
            Value::Function(_) => TypeKey::Function,
            Value::HostFn(function) => TypeKey::HostFn(Rc::as_ptr(function) as *const ()),
            Value::Host(object) => TypeKey::Host(class_id(&object.descriptor())),
        }
    }
}

// Identity of the runtime type a call-site resolution was computed from. Host
// objects are keyed by class, host functions by the overload bag itself since
// each carries its own candidate set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKey {
    Nil,
    Bool,
    Int,
    Float,
    Str,
    Function,
    HostFn(*const ()),
    Host(*const ()),
}

fn class_id(descriptor: &Rc<ClassDescriptor>) -> *const () {
    Rc::as_ptr(descriptor) as *const ()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Function(_) => write!(f, "function"),
            Value::HostFn(function) => write!(f, "function `{}`", function.name()),
            Value::Host(object) => write!(f, "{}", object.descriptor().name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Function(_) => write!(f, "Function"),
            Value::HostFn(function) => write!(f, "HostFn({})", function.name()),
            Value::Host(object) => write!(f, "Host({})", object.descriptor().name()),
        }
    }
}

pub struct FunctionValue {
    pub params: Vec<String>,
    pub body: Rc<Node>,
    pub captured: Vec<Rc<Frame>>,
}
