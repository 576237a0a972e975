pub mod scopes;

use crate::language::ast::*;
use crate::language::token::TokenKind;
use crate::runtime::binding::{BinarySite, InvokeSite, MemberSite, MethodSite, OpKind};
use crate::runtime::exec::{LogicalKind, Node, UnaryKind};
use crate::runtime::value::Value;
use log::debug;
use scopes::{LocalCoord, NameRef, ScopeStack};
use std::rc::Rc;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Invalid {kind} literal `{text}`")]
    InvalidNumberLiteral { text: String, kind: &'static str },
    #[error("Unsupported construct: {message}")]
    UnsupportedConstruct { message: String },
    #[error("Unknown operator {token}")]
    UnknownOperator { token: String },
}

pub struct Compiler {
    scopes: ScopeStack,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            scopes: ScopeStack::new(),
        }
    }

    pub fn compile_chunk(&mut self, chunk: &Chunk) -> CompileResult<Node> {
        debug!(
            "compiling chunk with {} top-level statement(s)",
            chunk.block.stats.len()
        );
        self.compile_block(&chunk.block)
    }

    pub fn compile_expression(&mut self, expr: &Expr) -> CompileResult<Node> {
        debug!("compiling single expression");
        self.compile_expr(expr)
    }

    fn compile_block(&mut self, block: &Block) -> CompileResult<Node> {
        self.scopes.enter_scope();
        let mut nodes = Vec::new();
        for stat in &block.stats {
            self.compile_stat(stat, &mut nodes)?;
        }
        let slot_count = self.scopes.exit_scope();
        Ok(Node::Block { slot_count, nodes })
    }

    fn compile_stat(&mut self, stat: &Stat, nodes: &mut Vec<Node>) -> CompileResult<()> {
        match stat {
            Stat::Local(local) => self.compile_local(local, nodes),
            Stat::Assign(assign) => self.compile_assign(assign, nodes),
            Stat::Call(expr) => {
                nodes.push(self.compile_expr(expr)?);
                Ok(())
            }
            Stat::If(stat) => {
                let mut arms = Vec::with_capacity(stat.arms.len());
                for arm in &stat.arms {
                    let condition = Node::BoolCoerce(Box::new(self.compile_expr(&arm.condition)?));
                    let body = self.compile_block(&arm.block)?;
                    arms.push((condition, body));
                }
                let else_body = match &stat.else_block {
                    Some(block) => Some(Box::new(self.compile_block(block)?)),
                    None => None,
                };
                nodes.push(Node::Conditional { arms, else_body });
                Ok(())
            }
            Stat::Function(stat) => {
                let function = self.compile_function(&stat.body)?;
                nodes.push(self.compile_name_assignment(&stat.name, function));
                Ok(())
            }
        }
    }

    // Slots come into existence before the initializers compile, so inside
    // `local x = x` the initializer resolves to the fresh (still nil) slot.
    fn compile_local(&mut self, local: &LocalStat, nodes: &mut Vec<Node>) -> CompileResult<()> {
        let coords: Vec<LocalCoord> = local
            .names
            .iter()
            .map(|name| LocalCoord {
                depth: 0,
                slot: self.scopes.declare_local(&name.text),
            })
            .collect();

        let mut values = Vec::with_capacity(local.values.len());
        for value in &local.values {
            values.push(self.compile_expr(value)?);
        }
        // Surplus initializers are compiled, then dropped.
        values.truncate(coords.len());

        let mut values = values.into_iter();
        for coord in coords {
            let value = values.next().unwrap_or(Node::Constant(Value::Nil));
            nodes.push(Node::AssignLocal {
                target: coord,
                value: Box::new(value),
            });
        }
        Ok(())
    }

    fn compile_assign(&mut self, assign: &AssignStat, nodes: &mut Vec<Node>) -> CompileResult<()> {
        let mut values = Vec::with_capacity(assign.values.len());
        for value in &assign.values {
            values.push(self.compile_expr(value)?);
        }
        values.truncate(assign.targets.len());

        let mut values = values.into_iter();
        for target in &assign.targets {
            let value = values.next().unwrap_or(Node::Constant(Value::Nil));
            let node = self.compile_assign_target(target, value)?;
            nodes.push(node);
        }
        Ok(())
    }

    fn compile_assign_target(&mut self, target: &Expr, value: Node) -> CompileResult<Node> {
        match target {
            Expr::Name(name) => Ok(self.compile_name_assignment(name, value)),
            Expr::Member { base, name, .. } => Ok(Node::MemberSet {
                target: Box::new(self.compile_expr(base)?),
                name: name.text.clone(),
                value: Box::new(value),
                site: MemberSite::new(),
            }),
            other => Err(CompileError::UnsupportedConstruct {
                message: format!("Cannot assign to {}", describe_expr(other)),
            }),
        }
    }

    fn compile_name_assignment(&mut self, name: &Name, value: Node) -> Node {
        match self.scopes.resolve(&name.text) {
            NameRef::Local(coord) => Node::AssignLocal {
                target: coord,
                value: Box::new(value),
            },
            NameRef::Global(name) => Node::AssignGlobal {
                name,
                value: Box::new(value),
            },
        }
    }

    fn compile_expr(&mut self, expr: &Expr) -> CompileResult<Node> {
        match expr {
            Expr::Nil(_) => Ok(Node::Constant(Value::Nil)),
            Expr::True(_) => Ok(Node::Constant(Value::Bool(true))),
            Expr::False(_) => Ok(Node::Constant(Value::Bool(false))),
            Expr::Number { text, float, .. } => compile_number(text, *float),
            Expr::Str { value, .. } => Ok(Node::Constant(Value::Str(value.clone()))),
            Expr::Name(name) => Ok(match self.scopes.resolve(&name.text) {
                NameRef::Local(coord) => Node::LocalRef(coord),
                NameRef::Global(name) => Node::GlobalRef(name),
            }),
            Expr::Paren { expr, .. } => self.compile_expr(expr),
            Expr::Function(body) => self.compile_function(body),
            Expr::Member { base, name, .. } => Ok(Node::MemberGet {
                target: Box::new(self.compile_expr(base)?),
                name: name.text.clone(),
                site: MemberSite::new(),
            }),
            Expr::Call { callee, args, .. } => Ok(Node::Call {
                callee: Box::new(self.compile_expr(callee)?),
                args: self.compile_args(args)?,
                site: InvokeSite::new(),
            }),
            Expr::MethodCall {
                target, name, args, ..
            } => Ok(Node::MethodCall {
                target: Box::new(self.compile_expr(target)?),
                name: name.text.clone(),
                args: self.compile_args(args)?,
                site: MethodSite::new(),
            }),
            Expr::Binary {
                op, left, right, ..
            } => {
                let left = Box::new(self.compile_expr(left)?);
                let right = Box::new(self.compile_expr(right)?);
                match &op.kind {
                    TokenKind::And => Ok(Node::ShortCircuit {
                        kind: LogicalKind::And,
                        left,
                        right,
                    }),
                    TokenKind::Or => Ok(Node::ShortCircuit {
                        kind: LogicalKind::Or,
                        left,
                        right,
                    }),
                    other => Ok(Node::BinaryOp {
                        kind: binary_op_kind(other)?,
                        left,
                        right,
                        site: BinarySite::new(),
                    }),
                }
            }
            Expr::Unary { op, expr, .. } => {
                let operand = self.compile_expr(expr)?;
                match &op.kind {
                    TokenKind::Minus => Ok(Node::UnaryOp {
                        kind: UnaryKind::Neg,
                        operand: Box::new(operand),
                    }),
                    TokenKind::Not => Ok(Node::UnaryOp {
                        kind: UnaryKind::Not,
                        operand: Box::new(Node::BoolCoerce(Box::new(operand))),
                    }),
                    other => Err(CompileError::UnknownOperator {
                        token: other.describe(),
                    }),
                }
            }
        }
    }

    fn compile_args(&mut self, args: &[Expr]) -> CompileResult<Vec<Node>> {
        args.iter().map(|arg| self.compile_expr(arg)).collect()
    }

    fn compile_function(&mut self, body: &FunctionBody) -> CompileResult<Node> {
        self.scopes.enter_scope();
        for param in &body.params {
            self.scopes.declare_local(&param.text);
        }
        let block = self.compile_block(&body.block)?;
        self.scopes.exit_scope();
        Ok(Node::FunctionLiteral {
            params: body.params.iter().map(|name| name.text.clone()).collect(),
            body: Rc::new(block),
        })
    }
}

fn compile_number(text: &str, float: bool) -> CompileResult<Node> {
    if float {
        let value = text
            .parse::<f64>()
            .map_err(|_| CompileError::InvalidNumberLiteral {
                text: text.to_string(),
                kind: "float",
            })?;
        Ok(Node::Constant(Value::Float(value)))
    } else {
        let value = text
            .parse::<i64>()
            .map_err(|_| CompileError::InvalidNumberLiteral {
                text: text.to_string(),
                kind: "integer",
            })?;
        Ok(Node::Constant(Value::Int(value)))
    }
}

fn binary_op_kind(token: &TokenKind) -> CompileResult<OpKind> {
    match token {
        TokenKind::Plus => Ok(OpKind::Add),
        TokenKind::Minus => Ok(OpKind::Sub),
        TokenKind::Star => Ok(OpKind::Mul),
        TokenKind::Slash => Ok(OpKind::Div),
        TokenKind::Gt => Ok(OpKind::Gt),
        TokenKind::GtEq => Ok(OpKind::GtEq),
        TokenKind::Lt => Ok(OpKind::Lt),
        TokenKind::LtEq => Ok(OpKind::LtEq),
        TokenKind::EqEq => Ok(OpKind::Eq),
        TokenKind::NotEq => Ok(OpKind::NotEq),
        other => Err(CompileError::UnknownOperator {
            token: other.describe(),
        }),
    }
}

fn describe_expr(expr: &Expr) -> &'static str {
    match expr {
        Expr::Call { .. } | Expr::MethodCall { .. } => "a call result",
        Expr::Paren { .. } => "a parenthesized expression",
        _ => "this expression",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::{parse_chunk, parse_expression};
    use crate::runtime::binding::values_equal;
    use crate::runtime::environment::{ExecContext, GlobalEnvironment};

    fn eval_chunk(source: &str, globals: &mut GlobalEnvironment) -> Value {
        let chunk = parse_chunk(source).expect("parse");
        let root = Compiler::new().compile_chunk(&chunk).expect("compile");
        let mut ctx = ExecContext::new(globals);
        root.eval(&mut ctx).expect("eval")
    }

    fn eval_expr(source: &str) -> Value {
        let expr = parse_expression(source).expect("parse");
        let root = Compiler::new().compile_expression(&expr).expect("compile");
        let mut globals = GlobalEnvironment::new();
        let mut ctx = ExecContext::new(&mut globals);
        root.eval(&mut ctx).expect("eval")
    }

    #[test]
    fn literals_preserve_numeric_kind() {
        assert!(values_equal(&eval_expr("42"), &Value::Int(42)));
        assert!(values_equal(&eval_expr("42.0"), &Value::Float(42.0)));
    }

    #[test]
    fn oversized_integer_literal_is_a_compile_error() {
        let expr = parse_expression("99999999999999999999999").expect("parse");
        let err = Compiler::new()
            .compile_expression(&expr)
            .expect_err("should fail");
        assert!(matches!(err, CompileError::InvalidNumberLiteral { .. }));
    }

    #[test]
    fn compile_errors_precede_execution() {
        let mut globals = GlobalEnvironment::new();
        globals.set("x", Value::Int(1));
        let chunk = parse_chunk("x = 2 y = 99999999999999999999999").expect("parse");
        let err = Compiler::new()
            .compile_chunk(&chunk)
            .expect_err("should fail");
        assert!(matches!(err, CompileError::InvalidNumberLiteral { .. }));
        // nothing ran, the earlier assignment included
        assert!(values_equal(&globals.get("x"), &Value::Int(1)));
    }

    #[test]
    fn local_shadows_global_of_the_same_name() {
        let mut globals = GlobalEnvironment::new();
        globals.set("x", Value::Int(1));
        eval_chunk("local x = 2 result = x", &mut globals);
        assert!(values_equal(&globals.get("result"), &Value::Int(2)));
        assert!(values_equal(&globals.get("x"), &Value::Int(1)));
    }

    #[test]
    fn local_initializer_sees_the_fresh_slot_not_the_outer_binding() {
        let mut globals = GlobalEnvironment::new();
        globals.set("x", Value::Int(7));
        eval_chunk("local x = x result = x", &mut globals);
        assert!(globals.get("result").is_nil());
    }

    #[test]
    fn assignment_to_unresolved_name_creates_a_global() {
        let mut globals = GlobalEnvironment::new();
        eval_chunk("fresh = 5", &mut globals);
        assert!(values_equal(&globals.get("fresh"), &Value::Int(5)));
    }

    #[test]
    fn surplus_assignment_targets_become_nil() {
        let mut globals = GlobalEnvironment::new();
        eval_chunk("a, b = 1", &mut globals);
        assert!(values_equal(&globals.get("a"), &Value::Int(1)));
        assert!(globals.get("b").is_nil());
    }

    #[test]
    fn surplus_assignment_values_are_dropped() {
        let mut globals = GlobalEnvironment::new();
        eval_chunk("a, b = 1, 2, 3", &mut globals);
        assert!(values_equal(&globals.get("a"), &Value::Int(1)));
        assert!(values_equal(&globals.get("b"), &Value::Int(2)));
    }
}
