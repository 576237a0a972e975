use crate::compiler::scopes::LocalCoord;
use crate::runtime::binding::{self, BinarySite, InvokeSite, MemberSite, MethodSite, OpKind};
use crate::runtime::environment::{ExecContext, Frame, GlobalEnvironment};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::{FunctionValue, Value};
use std::rc::Rc;

#[derive(Debug)]
pub enum Node {
    Constant(Value),
    LocalRef(LocalCoord),
    GlobalRef(String),
    AssignLocal {
        target: LocalCoord,
        value: Box<Node>,
    },
    AssignGlobal {
        name: String,
        value: Box<Node>,
    },
    Block {
        slot_count: usize,
        nodes: Vec<Node>,
    },
    Conditional {
        arms: Vec<(Node, Node)>,
        else_body: Option<Box<Node>>,
    },
    ShortCircuit {
        kind: LogicalKind,
        left: Box<Node>,
        right: Box<Node>,
    },
    BinaryOp {
        kind: OpKind,
        left: Box<Node>,
        right: Box<Node>,
        site: BinarySite,
    },
    UnaryOp {
        kind: UnaryKind,
        operand: Box<Node>,
    },
    BoolCoerce(Box<Node>),
    MemberGet {
        target: Box<Node>,
        name: String,
        site: MemberSite,
    },
    MemberSet {
        target: Box<Node>,
        name: String,
        value: Box<Node>,
        site: MemberSite,
    },
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
        site: InvokeSite,
    },
    MethodCall {
        target: Box<Node>,
        name: String,
        args: Vec<Node>,
        site: MethodSite,
    },
    FunctionLiteral {
        params: Vec<String>,
        body: Rc<Node>,
    },
}

#[derive(Clone, Copy, Debug)]
pub enum LogicalKind {
    And,
    Or,
}

#[derive(Clone, Copy, Debug)]
pub enum UnaryKind {
    Neg,
    Not,
}

impl Node {
    pub fn eval(&self, ctx: &mut ExecContext<'_>) -> RuntimeResult<Value> {
        match self {
            Node::Constant(value) => Ok(value.clone()),
            Node::LocalRef(coord) => Ok(ctx.local(*coord).borrow().clone()),
            Node::GlobalRef(name) => Ok(ctx.globals.get(name)),
            Node::AssignLocal { target, value } => {
                let value = value.eval(ctx)?;
                *ctx.local(*target).borrow_mut() = value.clone();
                Ok(value)
            }
            Node::AssignGlobal { name, value } => {
                let value = value.eval(ctx)?;
                ctx.globals.set(name, value.clone());
                Ok(value)
            }
            Node::Block { slot_count, nodes } => {
                ctx.push_frame(Frame::new(*slot_count));
                let mut result = Ok(Value::Nil);
                for node in nodes {
                    result = node.eval(ctx);
                    if result.is_err() {
                        break;
                    }
                }
                ctx.pop_frame();
                result
            }
            Node::Conditional { arms, else_body } => {
                for (condition, body) in arms {
                    if condition.eval(ctx)?.as_bool() {
                        return body.eval(ctx);
                    }
                }
                match else_body {
                    Some(body) => body.eval(ctx),
                    None => Ok(Value::Nil),
                }
            }
            Node::ShortCircuit { kind, left, right } => {
                let left_value = left.eval(ctx)?;
                match (kind, left_value.as_bool()) {
                    (LogicalKind::And, true) | (LogicalKind::Or, false) => right.eval(ctx),
                    _ => Ok(left_value),
                }
            }
            Node::BinaryOp {
                kind,
                left,
                right,
                site,
            } => {
                let lhs = left.eval(ctx)?;
                let rhs = right.eval(ctx)?;
                binding::binary_op(*kind, &lhs, &rhs, site)
            }
            Node::UnaryOp { kind, operand } => {
                let value = operand.eval(ctx)?;
                match kind {
                    UnaryKind::Neg => match value {
                        Value::Int(v) => Ok(Value::Int(-v)),
                        Value::Float(v) => Ok(Value::Float(-v)),
                        other => Err(RuntimeError::InvalidOperandType {
                            message: format!(
                                "Unary `-` expects a number, found `{}`",
                                other.type_name()
                            ),
                        }),
                    },
                    UnaryKind::Not => Ok(Value::Bool(!value.as_bool())),
                }
            }
            Node::BoolCoerce(operand) => Ok(Value::Bool(operand.eval(ctx)?.as_bool())),
            Node::MemberGet { target, name, site } => {
                let target = target.eval(ctx)?;
                binding::member_get(&target, name, site)
            }
            Node::MemberSet {
                target,
                name,
                value,
                site,
            } => {
                let target_value = target.eval(ctx)?;
                let value = value.eval(ctx)?;
                binding::member_set(&target_value, name, value.clone(), site)?;
                Ok(value)
            }
            Node::Call { callee, args, site } => {
                let callee = callee.eval(ctx)?;
                let arg_values = eval_args(args, ctx)?;
                match callee {
                    Value::Function(function) => {
                        call_function(&function, arg_values, ctx.globals)
                    }
                    Value::HostFn(function) => {
                        binding::invoke_host_fn(&function, arg_values, site)
                    }
                    other => Err(RuntimeError::InvalidOperandType {
                        message: format!("`{}` is not callable", other.type_name()),
                    }),
                }
            }
            Node::MethodCall {
                target,
                name,
                args,
                site,
            } => {
                let target = target.eval(ctx)?;
                let arg_values = eval_args(args, ctx)?;
                binding::invoke_method(&target, name, arg_values, site)
            }
            Node::FunctionLiteral { params, body } => {
                Ok(Value::Function(Rc::new(FunctionValue {
                    params: params.clone(),
                    body: body.clone(),
                    captured: ctx.capture(),
                })))
            }
        }
    }
}

fn eval_args(args: &[Node], ctx: &mut ExecContext<'_>) -> RuntimeResult<Vec<Value>> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(arg.eval(ctx)?);
    }
    Ok(values)
}

// Arguments bind positionally into fresh slots: missing ones stay nil, extras
// are dropped. Fresh cells per call keep recursion and re-entrancy safe.
pub fn call_function(
    function: &FunctionValue,
    args: Vec<Value>,
    globals: &mut GlobalEnvironment,
) -> RuntimeResult<Value> {
    let frame = Frame::new(function.params.len());
    for (index, value) in args.into_iter().take(function.params.len()).enumerate() {
        *frame.slot(index).borrow_mut() = value;
    }
    let mut ctx = ExecContext::with_frames(globals, function.captured.clone());
    ctx.push_frame(frame);
    function.body.eval(&mut ctx)
}
