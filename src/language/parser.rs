use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
};

pub fn parse_chunk(source: &str) -> Result<Chunk, SyntaxErrors> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let block = parser.parse_block().map_err(single)?;
    parser
        .expect(TokenKind::Eof, "Expected end of input")
        .map_err(single)?;
    Ok(Chunk { block })
}

pub fn parse_expression(source: &str) -> Result<Expr, SyntaxErrors> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr().map_err(single)?;
    parser
        .expect(TokenKind::Eof, "Expected end of expression")
        .map_err(single)?;
    Ok(expr)
}

fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxErrors> {
    lex(source).map_err(|errors| {
        SyntaxErrors::new(
            errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect(),
        )
    })
}

fn single(error: SyntaxError) -> SyntaxErrors {
    SyntaxErrors::new(vec![error])
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        let start = self.current_span().start;
        let mut stats = Vec::new();

        while !self.block_ended() {
            if self.matches(TokenKind::Semi) {
                continue;
            }
            stats.push(self.parse_statement()?);
        }

        let end = stats
            .last()
            .map(stat_span_end)
            .unwrap_or(self.current_span().start);
        Ok(Block {
            stats,
            span: Span::new(start, end.max(start)),
        })
    }

    fn block_ended(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Eof | TokenKind::End | TokenKind::Elseif | TokenKind::Else
        )
    }

    fn parse_statement(&mut self) -> Result<Stat, SyntaxError> {
        if self.check(TokenKind::Local) {
            return self.parse_local().map(Stat::Local);
        }
        if self.check(TokenKind::Function) {
            return self.parse_function_stat().map(Stat::Function);
        }
        if self.check(TokenKind::If) {
            return self.parse_if().map(Stat::If);
        }
        self.parse_expr_statement()
    }

    fn parse_local(&mut self) -> Result<LocalStat, SyntaxError> {
        let start = self.expect(TokenKind::Local, "Expected 'local'")?.span.start;
        let mut names = vec![self.expect_name("Expected variable name after 'local'")?];
        while self.matches(TokenKind::Comma) {
            names.push(self.expect_name("Expected variable name after ','")?);
        }

        let mut values = Vec::new();
        if self.matches(TokenKind::Assign) {
            values = self.parse_expr_list()?;
        }

        let end = values
            .last()
            .map(|expr| expr.span().end)
            .unwrap_or_else(|| names.last().map(|name| name.span.end).unwrap_or(start));
        Ok(LocalStat {
            names,
            values,
            span: Span::new(start, end),
        })
    }

    fn parse_function_stat(&mut self) -> Result<FunctionStat, SyntaxError> {
        let start = self
            .expect(TokenKind::Function, "Expected 'function'")?
            .span
            .start;
        let name = self.expect_name("Expected function name")?;
        let body = self.parse_function_body(start)?;
        let end = body.span.end;
        Ok(FunctionStat {
            name,
            body,
            span: Span::new(start, end),
        })
    }

    fn parse_if(&mut self) -> Result<IfStat, SyntaxError> {
        let start = self.expect(TokenKind::If, "Expected 'if'")?.span.start;
        let mut arms = Vec::new();

        let condition = self.parse_expr()?;
        self.expect(TokenKind::Then, "Expected 'then' after condition")?;
        arms.push(IfArm {
            condition,
            block: self.parse_block()?,
        });

        while self.matches(TokenKind::Elseif) {
            let condition = self.parse_expr()?;
            self.expect(TokenKind::Then, "Expected 'then' after condition")?;
            arms.push(IfArm {
                condition,
                block: self.parse_block()?,
            });
        }

        let else_block = if self.matches(TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };

        let end = self
            .expect(TokenKind::End, "Expected 'end' to close 'if'")?
            .span
            .end;
        Ok(IfStat {
            arms,
            else_block,
            span: Span::new(start, end),
        })
    }

    fn parse_expr_statement(&mut self) -> Result<Stat, SyntaxError> {
        let first = self.parse_suffixed()?;

        if self.check(TokenKind::Comma) || self.check(TokenKind::Assign) {
            let start = first.span().start;
            let mut targets = vec![first];
            while self.matches(TokenKind::Comma) {
                targets.push(self.parse_suffixed()?);
            }
            for target in &targets {
                if !matches!(target, Expr::Name(_) | Expr::Member { .. }) {
                    return Err(SyntaxError::new(
                        "Cannot assign to this expression",
                        target.span(),
                    ));
                }
            }
            self.expect(TokenKind::Assign, "Expected '=' in assignment")?;
            let values = self.parse_expr_list()?;
            let end = values
                .last()
                .map(|expr| expr.span().end)
                .unwrap_or(start);
            return Ok(Stat::Assign(AssignStat {
                targets,
                values,
                span: Span::new(start, end),
            }));
        }

        match first {
            call @ (Expr::Call { .. } | Expr::MethodCall { .. }) => Ok(Stat::Call(call)),
            other => Err(SyntaxError::new("Expected statement", other.span())
                .with_help("Only calls and assignments can stand alone".to_string())),
        }
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut values = vec![self.parse_expr()?];
        while self.matches(TokenKind::Comma) {
            values.push(self.parse_expr()?);
        }
        Ok(values)
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::Or) {
            let op = self.advance();
            let right = self.parse_and()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_comparison()?;
        while self.check(TokenKind::And) {
            let op = self.advance();
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_additive()?;
        while matches!(
            self.current().kind,
            TokenKind::Gt
                | TokenKind::GtEq
                | TokenKind::Lt
                | TokenKind::LtEq
                | TokenKind::EqEq
                | TokenKind::NotEq
        ) {
            let op = self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        while matches!(self.current().kind, TokenKind::Plus | TokenKind::Minus) {
            let op = self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;
        while matches!(self.current().kind, TokenKind::Star | TokenKind::Slash) {
            let op = self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        if matches!(self.current().kind, TokenKind::Minus | TokenKind::Not) {
            let op = self.advance();
            let expr = self.parse_unary()?;
            let span = Span::new(op.span.start, expr.span().end);
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
                span,
            });
        }
        self.parse_suffixed()
    }

    fn parse_suffixed(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_name("Expected member name after '.'")?;
                    let span = Span::new(expr.span().start, name.span.end);
                    expr = Expr::Member {
                        base: Box::new(expr),
                        name,
                        span,
                    };
                }
                TokenKind::Colon => {
                    self.advance();
                    let name = self.expect_name("Expected method name after ':'")?;
                    let (args, end) = self.parse_args()?;
                    let span = Span::new(expr.span().start, end);
                    expr = Expr::MethodCall {
                        target: Box::new(expr),
                        name,
                        args,
                        span,
                    };
                }
                TokenKind::LParen => {
                    let (args, end) = self.parse_args()?;
                    let span = Span::new(expr.span().start, end);
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<(Vec<Expr>, usize), SyntaxError> {
        self.expect(TokenKind::LParen, "Expected '(' to open argument list")?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            args = self.parse_expr_list()?;
        }
        let end = self
            .expect(TokenKind::RParen, "Expected ')' to close argument list")?
            .span
            .end;
        Ok((args, end))
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::Nil(token.span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::True(token.span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::False(token.span))
            }
            TokenKind::Number { text, float } => {
                self.advance();
                Ok(Expr::Number {
                    text,
                    float,
                    span: token.span,
                })
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::Str {
                    value,
                    span: token.span,
                })
            }
            TokenKind::Name(text) => {
                self.advance();
                Ok(Expr::Name(Name {
                    text,
                    span: token.span,
                }))
            }
            TokenKind::Function => {
                let start = self.advance().span.start;
                let body = self.parse_function_body(start)?;
                Ok(Expr::Function(body))
            }
            TokenKind::LParen => {
                let start = self.advance().span.start;
                let expr = self.parse_expr()?;
                let end = self
                    .expect(TokenKind::RParen, "Expected ')' to close expression")?
                    .span
                    .end;
                Ok(Expr::Paren {
                    expr: Box::new(expr),
                    span: Span::new(start, end),
                })
            }
            other => Err(SyntaxError::new(
                format!("Expected expression, found {}", other.describe()),
                token.span,
            )),
        }
    }

    fn parse_function_body(&mut self, start: usize) -> Result<FunctionBody, SyntaxError> {
        self.expect(TokenKind::LParen, "Expected '(' after 'function'")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            params.push(self.expect_name("Expected parameter name")?);
            while self.matches(TokenKind::Comma) {
                params.push(self.expect_name("Expected parameter name after ','")?);
            }
        }
        self.expect(TokenKind::RParen, "Expected ')' after parameters")?;
        let block = self.parse_block()?;
        let end = self
            .expect(TokenKind::End, "Expected 'end' to close function")?
            .span
            .end;
        Ok(FunctionBody {
            params,
            block,
            span: Span::new(start, end),
        })
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(SyntaxError::new(
                format!("{}, found {}", message, self.current().kind.describe()),
                self.current_span(),
            ))
        }
    }

    fn expect_name(&mut self, message: &str) -> Result<Name, SyntaxError> {
        match self.current().kind.clone() {
            TokenKind::Name(text) => {
                let span = self.advance().span;
                Ok(Name { text, span })
            }
            other => Err(SyntaxError::new(
                format!("{}, found {}", message, other.describe()),
                self.current_span(),
            )),
        }
    }
}

fn binary(op: Token, left: Expr, right: Expr) -> Expr {
    let span = Span::new(left.span().start, right.span().end);
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    }
}

fn stat_span_end(stat: &Stat) -> usize {
    match stat {
        Stat::Assign(assign) => assign.span.end,
        Stat::Local(local) => local.span.end,
        Stat::Call(expr) => expr.span().end,
        Stat::If(stat) => stat.span.end,
        Stat::Function(stat) => stat.span.end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_access_then_call_stay_separate() {
        let expr = parse_expression("obj.Property:ToString()").expect("parse");
        match expr {
            Expr::MethodCall { target, name, .. } => {
                assert_eq!(name.text, "ToString");
                assert!(matches!(*target, Expr::Member { .. }));
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn chained_method_calls_nest_left_to_right() {
        let expr = parse_expression("r:GetSelf():GetSelf()").expect("parse");
        match expr {
            Expr::MethodCall { target, name, .. } => {
                assert_eq!(name.text, "GetSelf");
                assert!(matches!(*target, Expr::MethodCall { .. }));
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn multi_target_assignment() {
        let chunk = parse_chunk("a, b = 1, 2").expect("parse");
        match &chunk.block.stats[0] {
            Stat::Assign(assign) => {
                assert_eq!(assign.targets.len(), 2);
                assert_eq!(assign.values.len(), 2);
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn if_elseif_else_chain() {
        let chunk = parse_chunk("if a then b() elseif c then d() else e() end").expect("parse");
        match &chunk.block.stats[0] {
            Stat::If(stat) => {
                assert_eq!(stat.arms.len(), 2);
                assert!(stat.else_block.is_some());
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn local_without_initializer() {
        let chunk = parse_chunk("local a, b").expect("parse");
        match &chunk.block.stats[0] {
            Stat::Local(local) => {
                assert_eq!(local.names.len(), 2);
                assert!(local.values.is_empty());
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn bare_expression_is_not_a_statement() {
        let errors = parse_chunk("1 + 2").expect_err("should fail");
        assert!(errors.errors[0].message.contains("Expected statement"));
    }

    #[test]
    fn mixed_suffix_chain() {
        let expr = parse_expression("a.b:c(1).d(2)").expect("parse");
        assert!(matches!(expr, Expr::Call { .. }));
    }

    #[test]
    fn precedence_puts_or_above_comparison() {
        let expr = parse_expression("1 < 2 or false").expect("parse");
        match expr {
            Expr::Binary { op, .. } => assert_eq!(op.kind, TokenKind::Or),
            other => panic!("unexpected expression: {:?}", other),
        }
    }
}
