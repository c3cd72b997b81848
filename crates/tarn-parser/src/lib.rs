use smol_str::SmolStr;
use tarn_ast::*;
use tarn_lexer::{lex, Span, Token};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.span.start, self.span.end, self.message)
    }
}

pub fn parse(source: &str) -> (SourceFile, Vec<ParseError>) {
    let (tokens, lex_errors) = lex(source);
    let mut parser = Parser::new(tokens);
    let mut errors: Vec<ParseError> = lex_errors
        .into_iter()
        .map(|e| ParseError {
            message: e.message,
            span: e.span,
        })
        .collect();
    parser.parse_file();
    errors.append(&mut parser.errors);
    (parser.file, errors)
}

/// Operator precedence, keyed by the operator's first character so custom
/// operators slot in without a fixity declaration. All left-associative.
fn precedence(op: &str) -> u8 {
    match op.as_bytes().first() {
        Some(b'*') | Some(b'/') => 70,
        Some(b'+') | Some(b'-') => 60,
        Some(b'^') | Some(b'~') => 50,
        Some(b'<') | Some(b'>') | Some(b'=') | Some(b'!') => 40,
        Some(b'&') => 30,
        Some(b'|') => 20,
        _ => 50,
    }
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    file: SourceFile,
    errors: Vec<ParseError>,
}

impl Parser {
    fn new(tokens: Vec<(Token, Span)>) -> Self {
        Self {
            tokens,
            pos: 0,
            file: SourceFile::new(),
            errors: Vec::new(),
        }
    }

    // ── Token helpers ─────────────────────────────────────────────

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or_else(|| {
                self.tokens
                    .last()
                    .map(|(_, s)| Span::point(s.end))
                    .unwrap_or(Span::new(0, 0))
            })
    }

    fn prev_span(&self) -> Span {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|(_, s)| *s)
            .unwrap_or(Span::new(0, 0))
    }

    fn advance(&mut self) -> (Token, Span) {
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        tok
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn check_op(&self, text: &str) -> bool {
        matches!(self.peek(), Some(Token::Op(op)) if op.as_str() == text)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Option<Span> {
        if self.check(expected) {
            let (_, span) = self.advance();
            Some(span)
        } else {
            let span = self.peek_span();
            self.error(
                format!("expected {:?}, found {:?}", expected, self.peek()),
                span,
            );
            None
        }
    }

    fn expect_upper(&mut self) -> Option<(SmolStr, Span)> {
        if let Some(Token::Upper(_)) = self.peek() {
            let (tok, span) = self.advance();
            if let Token::Upper(name) = tok {
                return Some((name, span));
            }
        }
        let span = self.peek_span();
        self.error(
            format!("expected a capitalized name, found {:?}", self.peek()),
            span,
        );
        None
    }

    fn expect_lower(&mut self) -> Option<(SmolStr, Span)> {
        if let Some(Token::Lower(_)) = self.peek() {
            let (tok, span) = self.advance();
            if let Token::Lower(name) = tok {
                return Some((name, span));
            }
        }
        let span = self.peek_span();
        self.error(format!("expected a name, found {:?}", self.peek()), span);
        None
    }

    fn error(&mut self, message: String, span: Span) {
        self.errors.push(ParseError { message, span });
    }

    /// Skip to the end of the current logical line, stepping over any
    /// nested blocks. Does not consume a closing `BlockEnd` of the
    /// enclosing block.
    fn recover_to_fold_end(&mut self) {
        let mut depth = 0usize;
        while !self.at_end() {
            match self.peek() {
                Some(Token::BlockStart) => {
                    depth += 1;
                    self.advance();
                }
                Some(Token::BlockEnd) => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                Some(Token::LineFoldEnd) if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ── Allocators ────────────────────────────────────────────────

    fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.file.exprs.alloc(Expr { kind, span })
    }

    fn alloc_pattern(&mut self, kind: PatternKind, span: Span) -> PatternId {
        self.file.patterns.alloc(Pattern { kind, span })
    }

    fn alloc_type(&mut self, kind: TypeExprKind, span: Span) -> TypeExprId {
        self.file.type_exprs.alloc(TypeExpr { kind, span })
    }

    fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        self.file.stmts.alloc(Stmt { kind, span })
    }

    fn alloc_decl(&mut self, kind: DeclKind, span: Span) -> DeclId {
        self.file.decls.alloc(Decl { kind, span })
    }

    // ── File ──────────────────────────────────────────────────────

    fn parse_file(&mut self) {
        while !self.at_end() {
            if let Some(item) = self.parse_item() {
                self.file.items.push(item);
            }
        }
    }

    fn parse_item(&mut self) -> Option<Item> {
        match self.peek() {
            Some(Token::Module) => self.parse_module().map(Item::Decl),
            Some(Token::Struct) => self.parse_struct().map(Item::Decl),
            Some(Token::Enum) => self.parse_enum().map(Item::Decl),
            Some(Token::Type) => self.parse_alias().map(Item::Decl),
            Some(Token::Let) => self.parse_let().map(Item::Decl),
            Some(Token::LineFoldEnd) | Some(Token::BlockEnd) => {
                let span = self.peek_span();
                self.error("unexpected end of block".into(), span);
                self.advance();
                None
            }
            Some(_) => self.parse_stmt().map(Item::Stmt),
            None => None,
        }
    }

    // ── Declarations ──────────────────────────────────────────────

    fn parse_module(&mut self) -> Option<DeclId> {
        let start = self.peek_span();
        self.advance(); // module
        let (name, name_span) = self.expect_upper().or_else(|| {
            self.recover_to_fold_end();
            None
        })?;
        self.expect(&Token::LineFoldEnd)?;
        self.expect(&Token::BlockStart)?;
        let mut items = Vec::new();
        while !self.at_end() && !self.check(&Token::BlockEnd) {
            if let Some(item) = self.parse_item() {
                items.push(item);
            }
        }
        let end = self.peek_span();
        self.expect(&Token::BlockEnd);
        Some(self.alloc_decl(
            DeclKind::Module {
                name,
                name_span,
                items,
            },
            start.merge(end),
        ))
    }

    fn parse_struct(&mut self) -> Option<DeclId> {
        let start = self.peek_span();
        self.advance(); // struct
        let Some((name, name_span)) = self.expect_upper() else {
            self.recover_to_fold_end();
            return None;
        };
        if self.expect(&Token::Assign).is_none() || self.expect(&Token::LBrace).is_none() {
            self.recover_to_fold_end();
            return None;
        }
        let mut fields = Vec::new();
        while !self.at_end() && !self.check(&Token::RBrace) {
            let Some((field, field_span)) = self.expect_lower() else {
                self.recover_to_fold_end();
                return None;
            };
            fields.push(StructField {
                name: field,
                span: field_span,
            });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace);
        let end = self.prev_span();
        self.expect(&Token::LineFoldEnd);
        Some(self.alloc_decl(
            DeclKind::Struct {
                name,
                name_span,
                fields,
            },
            start.merge(end),
        ))
    }

    fn parse_enum(&mut self) -> Option<DeclId> {
        let start = self.peek_span();
        self.advance(); // enum
        let Some((name, name_span)) = self.expect_upper() else {
            self.recover_to_fold_end();
            return None;
        };
        if self.expect(&Token::Assign).is_none() {
            self.recover_to_fold_end();
            return None;
        }
        let mut members = Vec::new();
        loop {
            let Some((member, member_span)) = self.expect_upper() else {
                self.recover_to_fold_end();
                return None;
            };
            members.push(EnumMember {
                name: member,
                span: member_span,
            });
            if !self.eat(&Token::Bar) {
                break;
            }
        }
        let end = self.prev_span();
        self.expect(&Token::LineFoldEnd);
        Some(self.alloc_decl(
            DeclKind::Enum {
                name,
                name_span,
                members,
            },
            start.merge(end),
        ))
    }

    fn parse_alias(&mut self) -> Option<DeclId> {
        let start = self.peek_span();
        self.advance(); // type
        let Some((name, name_span)) = self.expect_upper() else {
            self.recover_to_fold_end();
            return None;
        };
        if self.expect(&Token::Assign).is_none() {
            self.recover_to_fold_end();
            return None;
        }
        let Some(aliased) = self.parse_type_expr() else {
            self.recover_to_fold_end();
            return None;
        };
        let end = self.prev_span();
        self.expect(&Token::LineFoldEnd);
        Some(self.alloc_decl(
            DeclKind::TypeAlias {
                name,
                name_span,
                aliased,
            },
            start.merge(end),
        ))
    }

    fn parse_let(&mut self) -> Option<DeclId> {
        let start = self.peek_span();
        self.advance(); // let

        let Some(pattern) = self.parse_let_pattern() else {
            self.recover_to_fold_end();
            return None;
        };

        let mut params = Vec::new();
        while let Some(Token::Lower(_)) = self.peek() {
            let (tok, span) = self.advance();
            if let Token::Lower(name) = tok {
                params.push(self.file.params.alloc(Param { name, span }));
            }
        }

        let type_assert = if self.eat(&Token::Colon) {
            match self.parse_type_expr() {
                Some(ty) => Some(ty),
                None => {
                    self.recover_to_fold_end();
                    return None;
                }
            }
        } else {
            None
        };

        let body = if self.eat(&Token::Assign) {
            if self.check(&Token::LineFoldEnd) {
                // `=` at end of line: an indented statement block follows.
                self.advance();
                if self.expect(&Token::BlockStart).is_none() {
                    return None;
                }
                let mut stmts = Vec::new();
                while !self.at_end() && !self.check(&Token::BlockEnd) {
                    if let Some(stmt) = self.parse_stmt() {
                        stmts.push(stmt);
                    }
                }
                self.expect(&Token::BlockEnd);
                Some(LetBody::Block(stmts))
            } else {
                let Some(expr) = self.parse_expr() else {
                    self.recover_to_fold_end();
                    return None;
                };
                self.expect(&Token::LineFoldEnd);
                Some(LetBody::Expr(expr))
            }
        } else {
            self.expect(&Token::LineFoldEnd);
            None
        };

        let end = self.prev_span();
        Some(self.alloc_decl(
            DeclKind::Let(LetDecl {
                pattern,
                params,
                type_assert,
                body,
            }),
            start.merge(end),
        ))
    }

    // ── Patterns ──────────────────────────────────────────────────

    fn parse_let_pattern(&mut self) -> Option<PatternId> {
        self.parse_pattern()
    }

    fn parse_pattern(&mut self) -> Option<PatternId> {
        match self.peek() {
            Some(Token::Lower(_)) => {
                let (tok, span) = self.advance();
                if let Token::Lower(name) = tok {
                    Some(self.alloc_pattern(PatternKind::Bind(name), span))
                } else {
                    None
                }
            }
            Some(Token::LParen) => {
                let start = self.peek_span();
                self.advance();
                if let Some(Token::Op(_)) = self.peek() {
                    let (tok, _) = self.advance();
                    let end = self.peek_span();
                    self.expect(&Token::RParen)?;
                    if let Token::Op(op) = tok {
                        return Some(
                            self.alloc_pattern(PatternKind::WrappedOperator(op), start.merge(end)),
                        );
                    }
                    None
                } else {
                    let span = self.peek_span();
                    self.error("expected an operator inside parentheses".into(), span);
                    None
                }
            }
            Some(Token::LBrace) => self.parse_struct_pattern(),
            _ => {
                let span = self.peek_span();
                self.error(format!("expected a pattern, found {:?}", self.peek()), span);
                None
            }
        }
    }

    fn parse_struct_pattern(&mut self) -> Option<PatternId> {
        let start = self.peek_span();
        self.advance(); // {
        let mut elems = Vec::new();
        while !self.at_end() && !self.check(&Token::RBrace) {
            match self.peek() {
                Some(Token::DotDot) => {
                    let (_, span) = self.advance();
                    let pattern = if self.check(&Token::Comma) || self.check(&Token::RBrace) {
                        None
                    } else {
                        Some(self.parse_pattern()?)
                    };
                    let end = self.prev_span();
                    elems.push(StructPatternElem::Variadic {
                        pattern,
                        span: span.merge(end),
                    });
                }
                Some(Token::Lower(_)) => {
                    let (tok, span) = self.advance();
                    let Token::Lower(name) = tok else {
                        unreachable!()
                    };
                    if self.eat(&Token::Colon) {
                        let pattern = self.parse_pattern()?;
                        elems.push(StructPatternElem::Field {
                            name,
                            name_span: span,
                            pattern,
                        });
                    } else {
                        elems.push(StructPatternElem::Punned { name, span });
                    }
                }
                _ => {
                    let span = self.peek_span();
                    self.error(
                        format!("expected a field pattern, found {:?}", self.peek()),
                        span,
                    );
                    return None;
                }
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        let end = self.peek_span();
        self.expect(&Token::RBrace)?;
        Some(self.alloc_pattern(PatternKind::Struct { elems }, start.merge(end)))
    }

    // ── Statements ────────────────────────────────────────────────

    fn parse_stmt(&mut self) -> Option<StmtId> {
        match self.peek() {
            Some(Token::If) => self.parse_if(),
            Some(Token::Return) => {
                let start = self.peek_span();
                self.advance();
                let expr = if self.check(&Token::LineFoldEnd) {
                    None
                } else {
                    match self.parse_expr() {
                        Some(expr) => Some(expr),
                        None => {
                            self.recover_to_fold_end();
                            return None;
                        }
                    }
                };
                let end = self.prev_span();
                self.expect(&Token::LineFoldEnd);
                Some(self.alloc_stmt(StmtKind::Return(expr), start.merge(end)))
            }
            Some(Token::Let) => {
                let decl = self.parse_let()?;
                let span = self.file.decls[decl].span;
                Some(self.alloc_stmt(StmtKind::Let(decl), span))
            }
            Some(Token::LineFoldEnd) | Some(Token::BlockEnd) | Some(Token::BlockStart) => {
                let span = self.peek_span();
                self.error("unexpected token in block".into(), span);
                self.advance();
                None
            }
            _ => {
                let start = self.peek_span();
                let Some(expr) = self.parse_expr() else {
                    self.recover_to_fold_end();
                    return None;
                };
                let end = self.prev_span();
                self.expect(&Token::LineFoldEnd);
                Some(self.alloc_stmt(StmtKind::Expr(expr), start.merge(end)))
            }
        }
    }

    fn parse_if(&mut self) -> Option<StmtId> {
        let start = self.peek_span();
        let mut cases = Vec::new();

        self.advance(); // if
        cases.push(self.parse_if_case(true)?);

        while self.check(&Token::Elif) {
            self.advance();
            cases.push(self.parse_if_case(true)?);
        }

        if self.check(&Token::Else) {
            self.advance();
            cases.push(self.parse_if_case(false)?);
        }

        let end = self.prev_span();
        Some(self.alloc_stmt(StmtKind::If { cases }, start.merge(end)))
    }

    /// Parse one `if`/`elif`/`else` arm: optional test, then an indented
    /// body block. The introducing keyword has already been consumed.
    fn parse_if_case(&mut self, with_test: bool) -> Option<IfCase> {
        let start = self.peek_span();
        let test = if with_test {
            match self.parse_expr() {
                Some(expr) => Some(expr),
                None => {
                    self.recover_to_fold_end();
                    return None;
                }
            }
        } else {
            None
        };
        self.expect(&Token::LineFoldEnd)?;
        self.expect(&Token::BlockStart)?;
        let mut body = Vec::new();
        while !self.at_end() && !self.check(&Token::BlockEnd) {
            if let Some(stmt) = self.parse_stmt() {
                body.push(stmt);
            }
        }
        let end = self.peek_span();
        self.expect(&Token::BlockEnd);
        Some(IfCase {
            test,
            body,
            span: start.merge(end),
        })
    }

    // ── Expressions ───────────────────────────────────────────────

    fn parse_expr(&mut self) -> Option<ExprId> {
        self.parse_infix(0)
    }

    fn parse_infix(&mut self, min_prec: u8) -> Option<ExprId> {
        let mut lhs = self.parse_app()?;
        while let Some(Token::Op(op)) = self.peek() {
            let prec = precedence(op);
            if prec < min_prec {
                break;
            }
            let (tok, op_span) = self.advance();
            let Token::Op(op) = tok else { unreachable!() };
            let rhs = self.parse_infix(prec + 1)?;
            let span = self.file.exprs[lhs].span.merge(self.file.exprs[rhs].span);
            lhs = self.alloc_expr(
                ExprKind::Infix {
                    lhs,
                    op,
                    op_span,
                    rhs,
                },
                span,
            );
        }
        Some(lhs)
    }

    fn at_atom_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Int(_))
                | Some(Token::Str(_))
                | Some(Token::Lower(_))
                | Some(Token::Upper(_))
                | Some(Token::LParen)
        )
    }

    fn parse_app(&mut self) -> Option<ExprId> {
        // A capitalized head is a data-constructor application.
        if let Some(Token::Upper(_)) = self.peek() {
            let (tok, name_span) = self.advance();
            let Token::Upper(name) = tok else {
                unreachable!()
            };
            let mut args = Vec::new();
            let mut span = name_span;
            while self.at_atom_start() {
                let arg = self.parse_atom()?;
                span = span.merge(self.file.exprs[arg].span);
                args.push(arg);
            }
            return Some(self.alloc_expr(
                ExprKind::NamedTuple {
                    name,
                    name_span,
                    args,
                },
                span,
            ));
        }

        let callee = self.parse_atom()?;
        let mut args = Vec::new();
        let mut span = self.file.exprs[callee].span;
        while self.at_atom_start() {
            let arg = self.parse_atom()?;
            span = span.merge(self.file.exprs[arg].span);
            args.push(arg);
        }
        if args.is_empty() {
            Some(callee)
        } else {
            Some(self.alloc_expr(ExprKind::Call { callee, args }, span))
        }
    }

    fn parse_atom(&mut self) -> Option<ExprId> {
        match self.peek() {
            Some(Token::Int(_)) => {
                let (tok, span) = self.advance();
                let Token::Int(value) = tok else {
                    unreachable!()
                };
                Some(self.alloc_expr(ExprKind::Int(value), span))
            }
            Some(Token::Str(_)) => {
                let (tok, span) = self.advance();
                let Token::Str(value) = tok else {
                    unreachable!()
                };
                Some(self.alloc_expr(ExprKind::Str(value), span))
            }
            Some(Token::Lower(_)) => {
                let (tok, span) = self.advance();
                let Token::Lower(name) = tok else {
                    unreachable!()
                };
                Some(self.alloc_expr(ExprKind::Reference(name), span))
            }
            Some(Token::Upper(_)) => {
                let (tok, span) = self.advance();
                let Token::Upper(name) = tok else {
                    unreachable!()
                };
                Some(self.alloc_expr(
                    ExprKind::NamedTuple {
                        name,
                        name_span: span,
                        args: Vec::new(),
                    },
                    span,
                ))
            }
            Some(Token::LParen) => {
                let start = self.peek_span();
                self.advance();
                // `(+)` is a reference to an operator by name.
                if let (Some(Token::Op(_)), Some(Token::RParen)) =
                    (self.peek(), self.peek_nth(1))
                {
                    let (tok, _) = self.advance();
                    let (_, end) = self.advance();
                    let Token::Op(op) = tok else { unreachable!() };
                    return Some(self.alloc_expr(ExprKind::Reference(op), start.merge(end)));
                }
                let inner = self.parse_expr()?;
                let end = self.peek_span();
                self.expect(&Token::RParen)?;
                Some(self.alloc_expr(ExprKind::Nested(inner), start.merge(end)))
            }
            _ => {
                let span = self.peek_span();
                self.error(
                    format!("expected an expression, found {:?}", self.peek()),
                    span,
                );
                None
            }
        }
    }

    // ── Type expressions ──────────────────────────────────────────

    fn parse_type_expr(&mut self) -> Option<TypeExprId> {
        if self.check(&Token::LParen) {
            return self.parse_type_paren();
        }
        let prim = self.parse_type_prim()?;
        if self.check_op("->") {
            self.advance();
            let result = self.parse_type_expr()?;
            let span = self.file.type_exprs[prim]
                .span
                .merge(self.file.type_exprs[result].span);
            return Some(self.alloc_type(
                TypeExprKind::Arrow {
                    params: vec![prim],
                    result,
                },
                span,
            ));
        }
        Some(prim)
    }

    /// Parse a parenthesized type: grouping, a tuple, or the parameter
    /// list of a multi-parameter arrow.
    fn parse_type_paren(&mut self) -> Option<TypeExprId> {
        let start = self.peek_span();
        self.advance(); // (
        let mut elems = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                elems.push(self.parse_type_expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let end = self.peek_span();
        self.expect(&Token::RParen)?;
        let span = start.merge(end);

        if self.check_op("->") {
            self.advance();
            let result = self.parse_type_expr()?;
            let span = span.merge(self.file.type_exprs[result].span);
            return Some(self.alloc_type(
                TypeExprKind::Arrow {
                    params: elems,
                    result,
                },
                span,
            ));
        }
        if elems.len() == 1 {
            return Some(elems[0]);
        }
        Some(self.alloc_type(TypeExprKind::Tuple(elems), span))
    }

    fn parse_type_prim(&mut self) -> Option<TypeExprId> {
        match self.peek() {
            Some(Token::Upper(_)) => {
                let (tok, span) = self.advance();
                let Token::Upper(name) = tok else {
                    unreachable!()
                };
                let mut args = Vec::new();
                let mut full = span;
                loop {
                    match self.peek() {
                        Some(Token::Upper(_)) => {
                            let (tok, arg_span) = self.advance();
                            let Token::Upper(arg) = tok else {
                                unreachable!()
                            };
                            full = full.merge(arg_span);
                            args.push(self.alloc_type(
                                TypeExprKind::Named {
                                    name: arg,
                                    args: Vec::new(),
                                },
                                arg_span,
                            ));
                        }
                        Some(Token::Lower(_)) => {
                            let (tok, arg_span) = self.advance();
                            let Token::Lower(arg) = tok else {
                                unreachable!()
                            };
                            full = full.merge(arg_span);
                            args.push(self.alloc_type(TypeExprKind::Var(arg), arg_span));
                        }
                        Some(Token::LParen) => {
                            let arg = self.parse_type_paren()?;
                            full = full.merge(self.file.type_exprs[arg].span);
                            args.push(arg);
                        }
                        _ => break,
                    }
                }
                Some(self.alloc_type(TypeExprKind::Named { name, args }, full))
            }
            Some(Token::Lower(_)) => {
                let (tok, span) = self.advance();
                let Token::Lower(name) = tok else {
                    unreachable!()
                };
                Some(self.alloc_type(TypeExprKind::Var(name), span))
            }
            _ => {
                let span = self.peek_span();
                self.error(format!("expected a type, found {:?}", self.peek()), span);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> SourceFile {
        let (file, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
        file
    }

    fn only_let(file: &SourceFile) -> &LetDecl {
        assert_eq!(file.items.len(), 1);
        let Item::Decl(id) = file.items[0] else {
            panic!("expected a declaration")
        };
        match &file.decls[id].kind {
            DeclKind::Let(decl) => decl,
            other => panic!("expected let, got {:?}", other),
        }
    }

    #[test]
    fn let_with_expr_body() {
        let file = parse_ok("let a = 1");
        let decl = only_let(&file);
        assert!(matches!(decl.body, Some(LetBody::Expr(_))));
        assert!(decl.params.is_empty());
    }

    #[test]
    fn let_with_params() {
        let file = parse_ok("let add x y = x + y");
        let decl = only_let(&file);
        assert_eq!(decl.params.len(), 2);
        let Some(LetBody::Expr(body)) = decl.body else {
            panic!("expected expression body")
        };
        assert!(matches!(file.exprs[body].kind, ExprKind::Infix { .. }));
    }

    #[test]
    fn let_with_block_body() {
        let file = parse_ok("let f x =\n  return x\n");
        let decl = only_let(&file);
        let Some(LetBody::Block(stmts)) = &decl.body else {
            panic!("expected block body")
        };
        assert_eq!(stmts.len(), 1);
        assert!(matches!(
            file.stmts[stmts[0]].kind,
            StmtKind::Return(Some(_))
        ));
    }

    #[test]
    fn let_with_type_assert() {
        let file = parse_ok("let h : Int -> Int = h");
        let decl = only_let(&file);
        let assert = decl.type_assert.expect("type assert");
        assert!(matches!(
            file.type_exprs[assert].kind,
            TypeExprKind::Arrow { .. }
        ));
    }

    #[test]
    fn assert_only_declaration() {
        let file = parse_ok("let dist : (Int, Int) -> Int");
        let decl = only_let(&file);
        assert!(decl.body.is_none());
        let assert = decl.type_assert.expect("type assert");
        let TypeExprKind::Arrow { params, .. } = &file.type_exprs[assert].kind else {
            panic!("expected arrow type")
        };
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn wrapped_operator_declaration() {
        let file = parse_ok("let (<+>) a b = a + b");
        let decl = only_let(&file);
        assert!(matches!(
            file.patterns[decl.pattern].kind,
            PatternKind::WrappedOperator(ref op) if op == "<+>"
        ));
    }

    #[test]
    fn struct_pattern_let() {
        let file = parse_ok("let { x, y: inner, .. } = p");
        let decl = only_let(&file);
        let PatternKind::Struct { elems } = &file.patterns[decl.pattern].kind else {
            panic!("expected struct pattern")
        };
        assert_eq!(elems.len(), 3);
        assert!(matches!(elems[0], StructPatternElem::Punned { .. }));
        assert!(matches!(elems[1], StructPatternElem::Field { .. }));
        assert!(matches!(
            elems[2],
            StructPatternElem::Variadic { pattern: None, .. }
        ));
    }

    #[test]
    fn application_is_n_ary() {
        let file = parse_ok("let r = f 1 2");
        let decl = only_let(&file);
        let Some(LetBody::Expr(body)) = decl.body else {
            panic!()
        };
        let ExprKind::Call { args, .. } = &file.exprs[body].kind else {
            panic!("expected call")
        };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn constructor_application() {
        let file = parse_ok("let p = Point 1 2");
        let decl = only_let(&file);
        let Some(LetBody::Expr(body)) = decl.body else {
            panic!()
        };
        let ExprKind::NamedTuple { name, args, .. } = &file.exprs[body].kind else {
            panic!("expected constructor application")
        };
        assert_eq!(name, "Point");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn precedence_mul_binds_tighter() {
        let file = parse_ok("let a = 1 + 2 * 3");
        let decl = only_let(&file);
        let Some(LetBody::Expr(body)) = decl.body else {
            panic!()
        };
        let ExprKind::Infix { op, rhs, .. } = &file.exprs[body].kind else {
            panic!("expected infix")
        };
        assert_eq!(op, "+");
        assert!(matches!(
            file.exprs[*rhs].kind,
            ExprKind::Infix { ref op, .. } if op == "*"
        ));
    }

    #[test]
    fn custom_operator_precedence_by_first_char() {
        // `<+>` starts with `<`, so it binds looser than `*`.
        let file = parse_ok("let a = 1 <+> 2 * 3");
        let decl = only_let(&file);
        let Some(LetBody::Expr(body)) = decl.body else {
            panic!()
        };
        let ExprKind::Infix { op, .. } = &file.exprs[body].kind else {
            panic!("expected infix")
        };
        assert_eq!(op, "<+>");
    }

    #[test]
    fn operator_reference_atom() {
        let file = parse_ok("let plus = (+)");
        let decl = only_let(&file);
        let Some(LetBody::Expr(body)) = decl.body else {
            panic!()
        };
        assert!(matches!(
            file.exprs[body].kind,
            ExprKind::Reference(ref name) if name == "+"
        ));
    }

    #[test]
    fn if_elif_else_chain() {
        let file = parse_ok(
            "let f n =\n  if n == 0\n    return 1\n  elif n == 1\n    return 2\n  else\n    return 3\n",
        );
        let decl = only_let(&file);
        let Some(LetBody::Block(stmts)) = &decl.body else {
            panic!()
        };
        let StmtKind::If { cases } = &file.stmts[stmts[0]].kind else {
            panic!("expected if statement")
        };
        assert_eq!(cases.len(), 3);
        assert!(cases[0].test.is_some());
        assert!(cases[1].test.is_some());
        assert!(cases[2].test.is_none());
    }

    #[test]
    fn module_with_items() {
        let file = parse_ok("module Geo\n  struct Point = { x, y }\n  enum Axis = X | Y\n");
        assert_eq!(file.items.len(), 1);
        let Item::Decl(id) = file.items[0] else {
            panic!()
        };
        let DeclKind::Module { name, items, .. } = &file.decls[id].kind else {
            panic!("expected module")
        };
        assert_eq!(name, "Geo");
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn type_alias() {
        let file = parse_ok("type Id = Int");
        let Item::Decl(id) = file.items[0] else {
            panic!()
        };
        assert!(matches!(
            file.decls[id].kind,
            DeclKind::TypeAlias { ref name, .. } if name == "Id"
        ));
    }

    #[test]
    fn nested_let_statement() {
        let file = parse_ok("let f x =\n  let y = x\n  return y\n");
        let decl = only_let(&file);
        let Some(LetBody::Block(stmts)) = &decl.body else {
            panic!()
        };
        assert_eq!(stmts.len(), 2);
        assert!(matches!(file.stmts[stmts[0]].kind, StmtKind::Let(_)));
    }

    #[test]
    fn top_level_statement() {
        let file = parse_ok("f 1\n");
        assert_eq!(file.items.len(), 1);
        assert!(matches!(file.items[0], Item::Stmt(_)));
    }

    #[test]
    fn error_recovery_continues() {
        let (file, errors) = parse("let = 1\nlet b = 2\n");
        assert!(!errors.is_empty());
        // The second declaration still parses.
        assert_eq!(file.items.len(), 1);
    }
}
