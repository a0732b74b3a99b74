//! Recursive descent parser implementation

use vesper_ast::*;
use vesper_lexer::{Token, TokenKind};

use crate::ParseError;

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
        }
    }

    // === Utilities ===

    fn current(&self) -> &Token {
        // preprocess() always leaves the EOF token in place
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> TokenKind {
        self.current().kind
    }

    fn peek_ahead(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(kind.describe()))
        }
    }

    fn error_here(&self, expected: &str) -> ParseError {
        let token = self.current();
        if token.kind == TokenKind::Error {
            ParseError::InvalidToken {
                text: token.text(self.source).to_string(),
                span: token.span,
            }
        } else {
            ParseError::unexpected(expected, token.kind, token.span)
        }
    }

    fn ident(&mut self) -> Result<(String, Span), ParseError> {
        let token = self.consume(TokenKind::Ident)?;
        Ok((token.text(self.source).to_string(), token.span))
    }

    fn span(&self) -> Span {
        self.current().span
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(start.start, self.prev_end().max(start.end))
    }

    // === File ===

    pub fn parse_file(&mut self, defines: Vec<String>) -> Result<SourceFile, ParseError> {
        let mut usings = Vec::new();
        while self.at(TokenKind::Using) {
            usings.push(self.parse_using()?);
        }

        let item = self.parse_item()?;

        if !self.at(TokenKind::Eof) {
            return Err(self.error_here("end of file"));
        }

        Ok(SourceFile {
            defines,
            usings,
            item,
        })
    }

    fn parse_using(&mut self) -> Result<UsingDecl, ParseError> {
        let start = self.span();
        self.consume(TokenKind::Using)?;
        let (mut path, _) = self.ident()?;
        while self.eat(TokenKind::Dot) {
            let (segment, _) = self.ident()?;
            path.push('.');
            path.push_str(&segment);
        }
        self.consume(TokenKind::Semicolon)?;
        Ok(UsingDecl {
            path,
            span: self.span_from(start),
        })
    }

    fn parse_item(&mut self) -> Result<ClassItem, ParseError> {
        let start = self.span();
        let kind = match self.peek() {
            TokenKind::Behaviour => ItemKind::Behaviour,
            TokenKind::Initializer => ItemKind::Initializer,
            _ => return Err(self.error_here("'behaviour'")),
        };
        self.advance();

        let (name, _) = self.ident()?;
        self.consume(TokenKind::LBrace)?;

        let mut members = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            members.push(self.parse_member()?);
        }
        self.consume(TokenKind::RBrace)?;

        Ok(ClassItem {
            kind,
            name,
            members,
            span: self.span_from(start),
        })
    }

    // === Members ===

    fn parse_member(&mut self) -> Result<Member, ParseError> {
        let start = self.span();
        let attributes = self.parse_attributes()?;

        let mut visibility = None;
        let mut is_const = false;
        loop {
            match self.peek() {
                TokenKind::Public => {
                    self.advance();
                    visibility = Some(Visibility::Public);
                }
                TokenKind::Private => {
                    self.advance();
                    visibility = Some(Visibility::Private);
                }
                TokenKind::Const => {
                    self.advance();
                    is_const = true;
                }
                _ => break,
            }
        }

        match self.peek() {
            TokenKind::Fn => {
                self.advance();
                let (name, _) = self.ident()?;
                self.consume(TokenKind::LParen)?;
                self.consume(TokenKind::RParen)?;
                let body = self.parse_block()?;
                Ok(Member::Method(MethodDecl {
                    name,
                    visibility,
                    body,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Ident => {
                let ty = self.parse_type()?;
                let mut declarators = vec![self.parse_declarator()?];
                while self.eat(TokenKind::Comma) {
                    declarators.push(self.parse_declarator()?);
                }
                self.consume(TokenKind::Semicolon)?;
                Ok(Member::Field(FieldDecl {
                    attributes,
                    visibility,
                    is_const,
                    ty,
                    declarators,
                    span: self.span_from(start),
                }))
            }
            TokenKind::Error => Err(self.error_here("member")),
            _ => Err(ParseError::ExpectedMember { span: self.span() }),
        }
    }

    fn parse_attributes(&mut self) -> Result<Vec<Attribute>, ParseError> {
        let mut attributes = Vec::new();
        while self.at(TokenKind::LBracket) {
            let start = self.span();
            self.advance();
            let (name, _) = self.ident()?;
            let arg = if self.eat(TokenKind::LParen) {
                let (arg, _) = self.ident()?;
                self.consume(TokenKind::RParen)?;
                Some(arg)
            } else {
                None
            };
            self.consume(TokenKind::RBracket)?;
            attributes.push(Attribute {
                name,
                arg,
                span: self.span_from(start),
            });
        }
        Ok(attributes)
    }

    fn parse_declarator(&mut self) -> Result<VarDeclarator, ParseError> {
        let (name, start) = self.ident()?;
        let initializer = if self.eat(TokenKind::Eq) {
            let expr = self.parse_expr()?;
            let text = expr.span.text(self.source).to_string();
            Some(Initializer { expr, text })
        } else {
            None
        };
        Ok(VarDeclarator {
            name,
            initializer,
            span: self.span_from(start),
        })
    }

    fn parse_type(&mut self) -> Result<TypeRef, ParseError> {
        let (name, start) = self.ident()?;
        let mut rank = 0;
        while self.at(TokenKind::LBracket) && self.peek_ahead(1) == TokenKind::RBracket {
            self.advance();
            self.advance();
            rank += 1;
        }
        Ok(TypeRef::new(name, rank, self.span_from(start)))
    }

    // === Statements ===

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let start = self.span();
        self.consume(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        self.consume(TokenKind::RBrace)?;
        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    fn starts_local(&self) -> bool {
        self.at(TokenKind::Ident)
            && (self.peek_ahead(1) == TokenKind::Ident
                || (self.peek_ahead(1) == TokenKind::LBracket
                    && self.peek_ahead(2) == TokenKind::RBracket))
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();

        let kind = if self.eat(TokenKind::Return) {
            StmtKind::Return
        } else if self.starts_local() {
            let ty = self.parse_type()?;
            let (name, _) = self.ident()?;
            let init = if self.eat(TokenKind::Eq) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            StmtKind::Local { ty, name, init }
        } else {
            let expr = self.parse_expr()?;
            if self.eat(TokenKind::Eq) {
                let value = self.parse_expr()?;
                StmtKind::Assign {
                    target: expr,
                    value,
                }
            } else {
                StmtKind::Expr(expr)
            }
        };

        self.consume(TokenKind::Semicolon)?;
        Ok(Stmt {
            kind,
            span: self.span_from(start),
        })
    }

    // === Expressions ===

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(0)
    }

    fn binary_op(kind: TokenKind) -> Option<(BinaryOp, u8)> {
        let op = match kind {
            TokenKind::OrOr => (BinaryOp::Or, 1),
            TokenKind::AndAnd => (BinaryOp::And, 2),
            TokenKind::EqEq => (BinaryOp::Eq, 3),
            TokenKind::NotEq => (BinaryOp::NotEq, 3),
            TokenKind::Lt => (BinaryOp::Lt, 4),
            TokenKind::LtEq => (BinaryOp::LtEq, 4),
            TokenKind::Gt => (BinaryOp::Gt, 4),
            TokenKind::GtEq => (BinaryOp::GtEq, 4),
            TokenKind::Plus => (BinaryOp::Add, 5),
            TokenKind::Minus => (BinaryOp::Sub, 5),
            TokenKind::Star => (BinaryOp::Mul, 6),
            TokenKind::Slash => (BinaryOp::Div, 6),
            TokenKind::Percent => (BinaryOp::Rem, 6),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        while let Some((op, prec)) = Self::binary_op(self.peek()) {
            if prec <= min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec)?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let (name, name_span) = self.ident()?;
                    let span = expr.span.merge(name_span);
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            name,
                        },
                        span,
                    );
                }
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_args(TokenKind::RParen)?;
                    let span = self.span_from(expr.span);
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.consume(TokenKind::RBracket)?;
                    let span = self.span_from(expr.span);
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Comma-separated expressions up to and including `close`
    fn parse_args(&mut self, close: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
            // trailing comma
            if self.at(close) {
                break;
            }
        }
        self.consume(close)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        let text = token.text(self.source);

        let kind = match token.kind {
            TokenKind::Int => {
                self.advance();
                let n = text.parse::<i64>().map_err(|_| ParseError::InvalidLiteral {
                    text: text.to_string(),
                    span: token.span,
                })?;
                ExprKind::Literal(Literal::Int(n))
            }
            TokenKind::Float => {
                self.advance();
                let f = text.parse::<f64>().map_err(|_| ParseError::InvalidLiteral {
                    text: text.to_string(),
                    span: token.span,
                })?;
                ExprKind::Literal(Literal::Float(f))
            }
            TokenKind::String => {
                self.advance();
                ExprKind::Literal(Literal::String(unescape(&text[1..text.len() - 1])))
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Literal(Literal::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Literal(Literal::Bool(false))
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Literal(Literal::Null)
            }
            TokenKind::Ident => {
                self.advance();
                ExprKind::Ident(text.to_string())
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                return Ok(Expr::new(inner.kind, self.span_from(token.span)));
            }
            TokenKind::New => return self.parse_new(),
            TokenKind::Error => return Err(self.error_here("expression")),
            _ => return Err(ParseError::InvalidExpression { span: token.span }),
        };

        Ok(Expr::new(kind, token.span))
    }

    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        self.consume(TokenKind::New)?;
        let (name, name_span) = self.ident()?;

        if self.eat(TokenKind::LParen) {
            self.consume(TokenKind::RParen)?;
            let ty = TypeRef::new(name, 0, name_span);
            return Ok(Expr::new(ExprKind::NewObject { ty }, self.span_from(start)));
        }

        if !self.at(TokenKind::LBracket) {
            return Err(self.error_here("'(' or '['"));
        }

        if self.peek_ahead(1) == TokenKind::RBracket {
            // new T[]...[] { items }
            let mut rank = 0;
            while self.at(TokenKind::LBracket) && self.peek_ahead(1) == TokenKind::RBracket {
                self.advance();
                self.advance();
                rank += 1;
            }
            let ty = TypeRef::new(name, rank, self.span_from(name_span));
            self.consume(TokenKind::LBrace)?;
            let items = self.parse_args(TokenKind::RBrace)?;
            return Ok(Expr::new(
                ExprKind::NewArray {
                    ty,
                    size: None,
                    items: Some(items),
                },
                self.span_from(start),
            ));
        }

        // new T[size][]...
        self.advance();
        let size = self.parse_expr()?;
        self.consume(TokenKind::RBracket)?;
        let mut rank = 1;
        while self.at(TokenKind::LBracket) && self.peek_ahead(1) == TokenKind::RBracket {
            self.advance();
            self.advance();
            rank += 1;
        }
        let ty = TypeRef::new(name, rank, self.span_from(name_span));
        Ok(Expr::new(
            ExprKind::NewArray {
                ty,
                size: Some(Box::new(size)),
                items: None,
            },
            self.span_from(start),
        ))
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
