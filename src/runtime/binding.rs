use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::host::{
    FunctionOverload, HostFunction, MethodOverload, OverloadShape, Property,
};
use crate::runtime::value::{TypeKey, Value};
use log::trace;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
}

impl OpKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            OpKind::Add => "+",
            OpKind::Sub => "-",
            OpKind::Mul => "*",
            OpKind::Div => "/",
            OpKind::Lt => "<",
            OpKind::LtEq => "<=",
            OpKind::Gt => ">",
            OpKind::GtEq => ">=",
            OpKind::Eq => "==",
            OpKind::NotEq => "~=",
        }
    }
}

// One cache per compiled operation node. The last successful resolution is
// kept together with the type key it was computed from; a different key on a
// later execution re-resolves and replaces it.
pub struct CallSite<B> {
    cache: RefCell<Option<(SiteKey, B)>>,
}

impl<B: Clone> CallSite<B> {
    pub fn new() -> Self {
        Self {
            cache: RefCell::new(None),
        }
    }

    fn lookup(&self, key: &SiteKey) -> Option<B> {
        match &*self.cache.borrow() {
            Some((cached, binding)) if cached == key => Some(binding.clone()),
            _ => None,
        }
    }

    fn store(&self, key: SiteKey, binding: B) {
        *self.cache.borrow_mut() = Some((key, binding));
    }
}

impl<B: Clone> Default for CallSite<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> std::fmt::Debug for CallSite<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSite").finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteKey(Vec<TypeKey>);

impl SiteKey {
    fn one(key: TypeKey) -> Self {
        Self(vec![key])
    }

    fn pair(left: TypeKey, right: TypeKey) -> Self {
        Self(vec![left, right])
    }

    fn call(head: TypeKey, args: &[Value]) -> Self {
        let mut keys = Vec::with_capacity(args.len() + 1);
        keys.push(head);
        keys.extend(args.iter().map(Value::type_key));
        Self(keys)
    }
}

pub type MemberSite = CallSite<MemberBinding>;
pub type MethodSite = CallSite<MethodBinding>;
pub type InvokeSite = CallSite<CallBinding>;
pub type BinarySite = CallSite<BinaryFn>;

#[derive(Clone)]
pub enum MemberBinding {
    HostProperty(Rc<Property>),
    StrLength,
}

#[derive(Clone)]
pub enum MethodBinding {
    Host(Rc<MethodOverload>),
    Primitive(PrimitiveMethod),
}

#[derive(Clone, Copy, Debug)]
pub enum PrimitiveMethod {
    ToString,
    ToUpper,
    ToLower,
}

#[derive(Clone)]
pub enum CallBinding {
    Host(Rc<FunctionOverload>),
}

pub type BinaryFn = fn(&Value, &Value) -> RuntimeResult<Value>;

pub fn member_get(target: &Value, name: &str, site: &MemberSite) -> RuntimeResult<Value> {
    let key = SiteKey::one(target.type_key());
    if let Some(binding) = site.lookup(&key) {
        return apply_member_get(&binding, target, name);
    }
    trace!("resolving member `{name}` on `{}`", target.type_name());
    let binding = resolve_member_get(target, name)?;
    site.store(key, binding.clone());
    apply_member_get(&binding, target, name)
}

fn resolve_member_get(target: &Value, name: &str) -> RuntimeResult<MemberBinding> {
    match target {
        Value::Host(object) => {
            let descriptor = object.descriptor();
            match descriptor.property(name) {
                Some(property) if property.is_readable() => {
                    Ok(MemberBinding::HostProperty(property.clone()))
                }
                _ => Err(no_such_member(target, name)),
            }
        }
        Value::Str(_) if name == "Length" => Ok(MemberBinding::StrLength),
        _ => Err(no_such_member(target, name)),
    }
}

fn apply_member_get(binding: &MemberBinding, target: &Value, name: &str) -> RuntimeResult<Value> {
    match (binding, target) {
        (MemberBinding::HostProperty(property), Value::Host(object)) => {
            property.get(object.as_ref())
        }
        (MemberBinding::StrLength, Value::Str(text)) => {
            Ok(Value::Int(text.chars().count() as i64))
        }
        _ => Err(no_such_member(target, name)),
    }
}

pub fn member_set(
    target: &Value,
    name: &str,
    value: Value,
    site: &MemberSite,
) -> RuntimeResult<()> {
    let key = SiteKey::one(target.type_key());
    if let Some(binding) = site.lookup(&key) {
        return apply_member_set(&binding, target, name, value);
    }
    trace!("resolving member set `{name}` on `{}`", target.type_name());
    let binding = resolve_member_set(target, name)?;
    site.store(key, binding.clone());
    apply_member_set(&binding, target, name, value)
}

fn resolve_member_set(target: &Value, name: &str) -> RuntimeResult<MemberBinding> {
    match target {
        Value::Host(object) => {
            let descriptor = object.descriptor();
            match descriptor.property(name) {
                Some(property) if property.is_writable() => {
                    Ok(MemberBinding::HostProperty(property.clone()))
                }
                _ => Err(no_such_member(target, name)),
            }
        }
        _ => Err(no_such_member(target, name)),
    }
}

fn apply_member_set(
    binding: &MemberBinding,
    target: &Value,
    name: &str,
    value: Value,
) -> RuntimeResult<()> {
    match (binding, target) {
        (MemberBinding::HostProperty(property), Value::Host(object)) => {
            property.set(object.as_ref(), value)
        }
        _ => Err(no_such_member(target, name)),
    }
}

pub fn invoke_method(
    target: &Value,
    name: &str,
    args: Vec<Value>,
    site: &MethodSite,
) -> RuntimeResult<Value> {
    let key = SiteKey::call(target.type_key(), &args);
    if let Some(binding) = site.lookup(&key) {
        return apply_method(&binding, target, name, args);
    }
    trace!(
        "resolving method `{name}` on `{}` with {} argument(s)",
        target.type_name(),
        args.len()
    );
    let binding = resolve_method(target, name, &args)?;
    site.store(key, binding.clone());
    apply_method(&binding, target, name, args)
}

fn resolve_method(target: &Value, name: &str, args: &[Value]) -> RuntimeResult<MethodBinding> {
    match target {
        Value::Host(object) => {
            let descriptor = object.descriptor();
            let overloads = descriptor
                .overloads(name)
                .ok_or_else(|| no_such_member(target, name))?;
            select_overload(overloads, args)
                .map(MethodBinding::Host)
                .ok_or_else(|| RuntimeError::NoMatchingOverload {
                    name: name.to_string(),
                    argc: args.len(),
                })
        }
        // Function values expose no members.
        Value::Function(_) | Value::HostFn(_) => Err(no_such_member(target, name)),
        primitive => primitive_method(primitive, name, args),
    }
}

fn primitive_method(target: &Value, name: &str, args: &[Value]) -> RuntimeResult<MethodBinding> {
    let method = match (target, name) {
        (Value::Str(_), "ToUpper") => PrimitiveMethod::ToUpper,
        (Value::Str(_), "ToLower") => PrimitiveMethod::ToLower,
        (Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_), "ToString") => {
            PrimitiveMethod::ToString
        }
        _ => return Err(no_such_member(target, name)),
    };
    if !args.is_empty() {
        return Err(RuntimeError::NoMatchingOverload {
            name: name.to_string(),
            argc: args.len(),
        });
    }
    Ok(MethodBinding::Primitive(method))
}

fn apply_method(
    binding: &MethodBinding,
    target: &Value,
    name: &str,
    args: Vec<Value>,
) -> RuntimeResult<Value> {
    match (binding, target) {
        (MethodBinding::Host(overload), Value::Host(object)) => {
            overload.invoke(object.as_ref(), args)
        }
        (MethodBinding::Primitive(PrimitiveMethod::ToString), value) => {
            Ok(Value::Str(value.to_string()))
        }
        (MethodBinding::Primitive(PrimitiveMethod::ToUpper), Value::Str(text)) => {
            Ok(Value::Str(text.to_uppercase()))
        }
        (MethodBinding::Primitive(PrimitiveMethod::ToLower), Value::Str(text)) => {
            Ok(Value::Str(text.to_lowercase()))
        }
        _ => Err(no_such_member(target, name)),
    }
}

pub fn invoke_host_fn(
    function: &Rc<HostFunction>,
    args: Vec<Value>,
    site: &InvokeSite,
) -> RuntimeResult<Value> {
    let key = SiteKey::call(TypeKey::HostFn(Rc::as_ptr(function) as *const ()), &args);
    if let Some(CallBinding::Host(overload)) = site.lookup(&key) {
        return overload.invoke(args);
    }
    trace!(
        "resolving call to `{}` with {} argument(s)",
        function.name(),
        args.len()
    );
    let overload = select_overload(function.overloads(), &args).ok_or_else(|| {
        RuntimeError::NoMatchingOverload {
            name: function.name().to_string(),
            argc: args.len(),
        }
    })?;
    site.store(key, CallBinding::Host(overload.clone()));
    overload.invoke(args)
}

// Exact fixed-arity match wins; otherwise the variadic candidate with the
// longest compatible fixed prefix.
fn select_overload<O: OverloadShape>(overloads: &[Rc<O>], args: &[Value]) -> Option<Rc<O>> {
    if let Some(exact) = overloads.iter().find(|overload| overload.matches_exact(args)) {
        return Some(exact.clone());
    }
    overloads
        .iter()
        .filter(|overload| overload.matches_variadic(args))
        .max_by_key(|overload| overload.params().len())
        .cloned()
}

pub fn binary_op(
    kind: OpKind,
    left: &Value,
    right: &Value,
    site: &BinarySite,
) -> RuntimeResult<Value> {
    let key = SiteKey::pair(left.type_key(), right.type_key());
    if let Some(op) = site.lookup(&key) {
        return op(left, right);
    }
    trace!(
        "resolving `{}` for `{}` and `{}`",
        kind.symbol(),
        left.type_name(),
        right.type_name()
    );
    let op = resolve_binary(kind, left, right)?;
    site.store(key, op);
    op(left, right)
}

fn resolve_binary(kind: OpKind, left: &Value, right: &Value) -> RuntimeResult<BinaryFn> {
    use OpKind::*;
    let both_int = matches!((left, right), (Value::Int(_), Value::Int(_)));
    let numeric = left.as_float().is_some() && right.as_float().is_some();
    let both_str = matches!((left, right), (Value::Str(_), Value::Str(_)));

    let op: BinaryFn = match kind {
        Add if both_int => int_add,
        Add if numeric => float_add,
        Add if both_str => str_concat,
        Sub if both_int => int_sub,
        Sub if numeric => float_sub,
        Mul if both_int => int_mul,
        Mul if numeric => float_mul,
        // Division always yields a float, even for two ints.
        Div if numeric => float_div,
        Lt if numeric => cmp_lt,
        LtEq if numeric => cmp_lt_eq,
        Gt if numeric => cmp_gt,
        GtEq if numeric => cmp_gt_eq,
        // Equality never fails: incompatible kinds simply compare unequal.
        Eq => eq_values,
        NotEq => not_eq_values,
        _ => {
            return Err(RuntimeError::InvalidOperandType {
                message: format!(
                    "Operator `{}` is not defined for `{}` and `{}`",
                    kind.symbol(),
                    left.type_name(),
                    right.type_name()
                ),
            })
        }
    };
    Ok(op)
}

fn operand_error(op: &str, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::InvalidOperandType {
        message: format!(
            "Operator `{op}` is not defined for `{}` and `{}`",
            left.type_name(),
            right.type_name()
        ),
    }
}

fn int_add(left: &Value, right: &Value) -> RuntimeResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        _ => Err(operand_error("+", left, right)),
    }
}

fn int_sub(left: &Value, right: &Value) -> RuntimeResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
        _ => Err(operand_error("-", left, right)),
    }
}

fn int_mul(left: &Value, right: &Value) -> RuntimeResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
        _ => Err(operand_error("*", left, right)),
    }
}

fn float_add(left: &Value, right: &Value) -> RuntimeResult<Value> {
    float_apply(left, right, "+", |a, b| a + b)
}

fn float_sub(left: &Value, right: &Value) -> RuntimeResult<Value> {
    float_apply(left, right, "-", |a, b| a - b)
}

fn float_mul(left: &Value, right: &Value) -> RuntimeResult<Value> {
    float_apply(left, right, "*", |a, b| a * b)
}

fn float_div(left: &Value, right: &Value) -> RuntimeResult<Value> {
    float_apply(left, right, "/", |a, b| a / b)
}

fn float_apply(
    left: &Value,
    right: &Value,
    op: &str,
    apply: fn(f64, f64) -> f64,
) -> RuntimeResult<Value> {
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => Ok(Value::Float(apply(a, b))),
        _ => Err(operand_error(op, left, right)),
    }
}

fn str_concat(left: &Value, right: &Value) -> RuntimeResult<Value> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        _ => Err(operand_error("+", left, right)),
    }
}

fn cmp_lt(left: &Value, right: &Value) -> RuntimeResult<Value> {
    cmp_apply(left, right, "<", |a, b| a < b)
}

fn cmp_lt_eq(left: &Value, right: &Value) -> RuntimeResult<Value> {
    cmp_apply(left, right, "<=", |a, b| a <= b)
}

fn cmp_gt(left: &Value, right: &Value) -> RuntimeResult<Value> {
    cmp_apply(left, right, ">", |a, b| a > b)
}

fn cmp_gt_eq(left: &Value, right: &Value) -> RuntimeResult<Value> {
    cmp_apply(left, right, ">=", |a, b| a >= b)
}

fn cmp_apply(
    left: &Value,
    right: &Value,
    op: &str,
    apply: fn(f64, f64) -> bool,
) -> RuntimeResult<Value> {
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => Ok(Value::Bool(apply(a, b))),
        _ => Err(operand_error(op, left, right)),
    }
}

fn eq_values(left: &Value, right: &Value) -> RuntimeResult<Value> {
    Ok(Value::Bool(values_equal(left, right)))
}

fn not_eq_values(left: &Value, right: &Value) -> RuntimeResult<Value> {
    Ok(Value::Bool(!values_equal(left, right)))
}

pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::HostFn(a), Value::HostFn(b)) => Rc::ptr_eq(a, b),
        (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

fn no_such_member(target: &Value, name: &str) -> RuntimeError {
    RuntimeError::NoSuchMember {
        type_name: target.type_name(),
        name: name.to_string(),
    }
}
