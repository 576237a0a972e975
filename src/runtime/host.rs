use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::Value;
use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

pub trait HostObject: Any {
    fn descriptor(&self) -> Rc<ClassDescriptor>;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Any,
    Bool,
    Int,
    Float,
    Str,
    Host,
}

impl ParamKind {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::Any => true,
            ParamKind::Bool => matches!(value, Value::Bool(_)),
            ParamKind::Int => matches!(value, Value::Int(_)),
            // Ints widen implicitly, floats never narrow.
            ParamKind::Float => matches!(value, Value::Int(_) | Value::Float(_)),
            ParamKind::Str => matches!(value, Value::Str(_)),
            ParamKind::Host => matches!(value, Value::Host(_)),
        }
    }

    pub fn convert(&self, value: Value) -> RuntimeResult<Value> {
        match (self, value) {
            (ParamKind::Float, Value::Int(v)) => Ok(Value::Float(v as f64)),
            (kind, value) if kind.accepts(&value) => Ok(value),
            (kind, value) => Err(RuntimeError::TypeMismatch {
                message: format!(
                    "Cannot convert `{}` to {}",
                    value.type_name(),
                    kind.describe()
                ),
            }),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ParamKind::Any => "any value",
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Str => "string",
            ParamKind::Host => "host object",
        }
    }
}

type GetterFn = Box<dyn Fn(&dyn HostObject) -> RuntimeResult<Value>>;
type SetterFn = Box<dyn Fn(&dyn HostObject, Value) -> RuntimeResult<()>>;
type MethodFn = Box<dyn Fn(&dyn HostObject, Vec<Value>) -> RuntimeResult<Value>>;
type FreeFn = Box<dyn Fn(Vec<Value>) -> RuntimeResult<Value>>;

pub struct Property {
    getter: Option<GetterFn>,
    setter: Option<SetterFn>,
    kind: ParamKind,
}

impl Property {
    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn get(&self, target: &dyn HostObject) -> RuntimeResult<Value> {
        match &self.getter {
            Some(getter) => getter(target),
            None => Err(RuntimeError::TypeMismatch {
                message: "Property is write-only".to_string(),
            }),
        }
    }

    pub fn set(&self, target: &dyn HostObject, value: Value) -> RuntimeResult<()> {
        let setter = self.setter.as_ref().ok_or_else(|| RuntimeError::TypeMismatch {
            message: "Property is read-only".to_string(),
        })?;
        let converted = self.kind.convert(value)?;
        setter(target, converted)
    }
}

pub trait OverloadShape {
    fn params(&self) -> &[ParamKind];
    fn is_variadic(&self) -> bool;

    fn matches_exact(&self, args: &[Value]) -> bool {
        !self.is_variadic()
            && self.params().len() == args.len()
            && self
                .params()
                .iter()
                .zip(args)
                .all(|(kind, arg)| kind.accepts(arg))
    }

    fn matches_variadic(&self, args: &[Value]) -> bool {
        self.is_variadic()
            && self.params().len() <= args.len()
            && self
                .params()
                .iter()
                .zip(args)
                .all(|(kind, arg)| kind.accepts(arg))
    }
}

pub struct MethodOverload {
    params: Vec<ParamKind>,
    variadic: bool,
    invoke: MethodFn,
}

impl MethodOverload {
    pub fn invoke(&self, target: &dyn HostObject, args: Vec<Value>) -> RuntimeResult<Value> {
        let args = convert_fixed(&self.params, args)?;
        (self.invoke)(target, args)
    }
}

impl OverloadShape for MethodOverload {
    fn params(&self) -> &[ParamKind] {
        &self.params
    }

    fn is_variadic(&self) -> bool {
        self.variadic
    }
}

pub struct ClassDescriptor {
    name: String,
    properties: HashMap<String, Rc<Property>>,
    methods: HashMap<String, Vec<Rc<MethodOverload>>>,
}

impl ClassDescriptor {
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            properties: HashMap::new(),
            methods: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self, name: &str) -> Option<&Rc<Property>> {
        self.properties.get(name)
    }

    pub fn overloads(&self, name: &str) -> Option<&[Rc<MethodOverload>]> {
        self.methods.get(name).map(|list| list.as_slice())
    }
}

pub struct ClassBuilder {
    name: String,
    properties: HashMap<String, Property>,
    methods: HashMap<String, Vec<Rc<MethodOverload>>>,
}

impl ClassBuilder {
    pub fn getter<T, F>(mut self, name: &str, f: F) -> Self
    where
        T: HostObject + 'static,
        F: Fn(&T) -> Value + 'static,
    {
        self.entry(name).getter = Some(Box::new(move |obj: &dyn HostObject| {
            Ok(f(downcast::<T>(obj)?))
        }));
        self
    }

    pub fn setter<T, F>(mut self, name: &str, kind: ParamKind, f: F) -> Self
    where
        T: HostObject + 'static,
        F: Fn(&T, Value) + 'static,
    {
        let entry = self.entry(name);
        entry.kind = kind;
        entry.setter = Some(Box::new(move |obj: &dyn HostObject, value: Value| {
            f(downcast::<T>(obj)?, value);
            Ok(())
        }));
        self
    }

    pub fn method<T, F>(mut self, name: &str, params: &[ParamKind], f: F) -> Self
    where
        T: HostObject + 'static,
        F: Fn(&T, Vec<Value>) -> Value + 'static,
    {
        self.push_method(name, params, false, f);
        self
    }

    pub fn variadic_method<T, F>(mut self, name: &str, fixed: &[ParamKind], f: F) -> Self
    where
        T: HostObject + 'static,
        F: Fn(&T, Vec<Value>) -> Value + 'static,
    {
        self.push_method(name, fixed, true, f);
        self
    }

    pub fn build(self) -> Rc<ClassDescriptor> {
        Rc::new(ClassDescriptor {
            name: self.name,
            properties: self
                .properties
                .into_iter()
                .map(|(name, property)| (name, Rc::new(property)))
                .collect(),
            methods: self.methods,
        })
    }

    fn entry(&mut self, name: &str) -> &mut Property {
        self.properties
            .entry(name.to_string())
            .or_insert_with(|| Property {
                getter: None,
                setter: None,
                kind: ParamKind::Any,
            })
    }

    fn push_method<T, F>(&mut self, name: &str, params: &[ParamKind], variadic: bool, f: F)
    where
        T: HostObject + 'static,
        F: Fn(&T, Vec<Value>) -> Value + 'static,
    {
        let overload = MethodOverload {
            params: params.to_vec(),
            variadic,
            invoke: Box::new(move |obj: &dyn HostObject, args: Vec<Value>| {
                Ok(f(downcast::<T>(obj)?, args))
            }),
        };
        self.methods
            .entry(name.to_string())
            .or_default()
            .push(Rc::new(overload));
    }
}

pub struct HostFunction {
    name: String,
    overloads: Vec<Rc<FunctionOverload>>,
}

impl HostFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    pub fn overload<F>(mut self, params: &[ParamKind], f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Value + 'static,
    {
        self.push_overload(params, false, f);
        self
    }

    pub fn variadic_overload<F>(mut self, fixed: &[ParamKind], f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Value + 'static,
    {
        self.push_overload(fixed, true, f);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn overloads(&self) -> &[Rc<FunctionOverload>] {
        &self.overloads
    }

    fn push_overload<F>(&mut self, params: &[ParamKind], variadic: bool, f: F)
    where
        F: Fn(Vec<Value>) -> Value + 'static,
    {
        self.overloads.push(Rc::new(FunctionOverload {
            params: params.to_vec(),
            variadic,
            invoke: Box::new(move |args| Ok(f(args))),
        }));
    }
}

pub struct FunctionOverload {
    params: Vec<ParamKind>,
    variadic: bool,
    invoke: FreeFn,
}

impl FunctionOverload {
    pub fn invoke(&self, args: Vec<Value>) -> RuntimeResult<Value> {
        let args = convert_fixed(&self.params, args)?;
        (self.invoke)(args)
    }
}

impl OverloadShape for FunctionOverload {
    fn params(&self) -> &[ParamKind] {
        &self.params
    }

    fn is_variadic(&self) -> bool {
        self.variadic
    }
}

fn convert_fixed(params: &[ParamKind], args: Vec<Value>) -> RuntimeResult<Vec<Value>> {
    let mut converted = Vec::with_capacity(args.len());
    for (index, arg) in args.into_iter().enumerate() {
        match params.get(index) {
            Some(kind) => converted.push(kind.convert(arg)?),
            None => converted.push(arg),
        }
    }
    Ok(converted)
}

fn downcast<T: HostObject + 'static>(obj: &dyn HostObject) -> RuntimeResult<&T> {
    obj.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| RuntimeError::TypeMismatch {
            message: format!(
                "Descriptor for `{}` applied to a different host type",
                obj.descriptor().name()
            ),
        })
}
