//! Parser for Jua
//!
//! Statements are parsed by recursive descent, binary operators by
//! precedence climbing. Enclosure tokens already hold their contents, so
//! every `()`, `[]` and `{}` is parsed by a sub-parser over a `TokenList`
//! that must be fully consumed.

use crate::ast::{
    Block, Case, DeclarationItem, DeclarationList, Declarable, Expr, FunctionLiteral,
    ObjectPattern, PatternProp, PropKey, Stmt, Target,
};
use crate::error::{ErrorKind, JuaError, Result};
use crate::lexer::{unexpected, Lexer, TokenList, TokenStream};
use crate::operator::{BinaryOp, UnaryOp};
use crate::stack::ensure_sufficient_stack;
use crate::token::{is_keyword, Span, Token, TokenKind};
use std::rc::Rc;
use tracing::debug;

/// Parse a whole source unit into the function literal that runs it
pub fn parse_program(source: &str, name: &str) -> Result<Rc<FunctionLiteral>> {
    let mut parser = Parser::for_unit(Lexer::new(source), name);
    let statements = parser.parse_statements()?;
    debug!(unit = name, statements = statements.len(), "parsed");
    let params = DeclarationList {
        items: Vec::new(),
        span: Span::default(),
    };
    let body = Block::new(statements);
    Ok(Rc::new(FunctionLiteral::new(
        Some(Rc::from(name)),
        params,
        body,
        Span::new(0, source.len(), 1, 1),
        parser.unit.clone(),
    )?))
}

/// Parse a single expression, failing on trailing input
pub fn parse_expression(source: &str) -> Result<Expr> {
    let mut parser = Parser::new(Lexer::new(source));
    let expr = parser.parse_expr()?;
    parser.stream.expect_end()?;
    Ok(expr)
}

/// What may follow a primary expression
enum Tail {
    Dot,
    OptionalDot,
    Colon,
    Paren,
    Bracket,
    Brace,
    Str,
}

/// The parser state
pub struct Parser<S: TokenStream> {
    stream: S,
    /// Name of the source unit, recorded on every function literal
    unit: Rc<str>,
}

impl<S: TokenStream> Parser<S> {
    pub fn new(stream: S) -> Self {
        Self::for_unit(stream, "")
    }

    pub fn for_unit(stream: S, unit: &str) -> Self {
        Self {
            stream,
            unit: Rc::from(unit),
        }
    }

    /// Parser over the contents of an enclosure
    fn sub(&self, tokens: Vec<Token>, span: Span) -> Parser<TokenList> {
        Parser {
            stream: TokenList::new(tokens, span),
            unit: self.unit.clone(),
        }
    }

    // ==================== Statements ====================

    /// Statements until the stream runs out; `;` may separate them
    pub fn parse_statements(&mut self) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.stream.at_end()? {
            if self.stream.skip_separator(";")? {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        ensure_sufficient_stack(|| self.parse_statement_inner())
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt> {
        let keyword = match self.stream.peek_token()? {
            Some(Token {
                kind: TokenKind::Word(w),
                ..
            }) if is_keyword(w) => Some(w.clone()),
            _ => None,
        };

        match keyword.as_deref() {
            Some("let") => self.let_statement(),
            Some("fun") => self.fun_statement(),
            Some("return") => self.return_statement(),
            Some("break") => {
                let span = self.stream.read()?.span;
                Ok(Stmt::Break { span })
            }
            Some("continue") => {
                let span = self.stream.read()?.span;
                Ok(Stmt::Continue { span })
            }
            Some("if") => self.if_statement(),
            Some("while") => self.while_statement(),
            Some("for") => self.for_statement(),
            Some("switch") => self.switch_statement(),
            _ => Ok(Stmt::Expr {
                expr: self.parse_expr()?,
            }),
        }
    }

    fn let_statement(&mut self) -> Result<Stmt> {
        let span = self.stream.read()?.span; // consume 'let'
        let mut items = Vec::new();
        loop {
            let mut item = self.parse_declaration_item()?;
            // a bare `let x` binds null
            if item.default.is_none() {
                item.default = Some(Expr::Null {
                    span: item.target.span(),
                });
            }
            items.push(item);
            if !self.stream.skip_separator(",")? {
                break;
            }
        }
        Ok(Stmt::Let {
            list: DeclarationList { items, span },
            span,
        })
    }

    /// `fun name(...) {...}` declares; `fun(...)` starts an expression
    fn fun_statement(&mut self) -> Result<Stmt> {
        let span = self.stream.read()?.span; // consume 'fun'
        let name = self
            .stream
            .peek_token()?
            .and_then(Token::as_name)
            .map(Rc::<str>::from);

        match name {
            Some(name) => {
                let name_span = self.stream.read()?.span;
                let func = self.parse_func(Some(name.clone()), span)?;
                let item = DeclarationItem {
                    target: Declarable::Name {
                        name,
                        span: name_span,
                    },
                    default: Some(Expr::Function {
                        func: Rc::new(func),
                        span,
                    }),
                };
                Ok(Stmt::Let {
                    list: DeclarationList {
                        items: vec![item],
                        span,
                    },
                    span,
                })
            }
            None => {
                let head = Expr::Function {
                    func: Rc::new(self.parse_func(None, span)?),
                    span,
                };
                let head = self.parse_tail(head)?;
                Ok(Stmt::Expr {
                    expr: self.parse_expr_rest(head)?,
                })
            }
        }
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let span = self.stream.read()?.span; // consume 'return'
        let bare = match self.stream.peek_token()? {
            None => true,
            Some(token) => {
                token.is_separator(";") || token.is_word("else") || token.is_word("case")
            }
        };
        let value = if bare { None } else { Some(self.parse_expr()?) };
        Ok(Stmt::Return { value, span })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let span = self.stream.read()?.span; // consume 'if'
        let condition = self.parse_cond()?;
        let then_block = self.parse_block_or_statement()?;
        let else_block = if self.stream.peek_word("else")? {
            self.stream.read()?;
            Some(self.parse_block_or_statement()?)
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_block,
            else_block,
            span,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        let span = self.stream.read()?.span; // consume 'while'
        let condition = self.parse_cond()?;
        let body = self.parse_block_or_statement()?;
        Ok(Stmt::While {
            condition,
            body,
            span,
        })
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        let span = self.stream.read()?.span; // consume 'for'
        let token = self.stream.read()?;
        let TokenKind::Paren(tokens) = token.kind else {
            return Err(expected("(", &token));
        };
        let mut head = self.sub(tokens, token.span);
        let target = head.parse_declarable()?;
        head.stream.expect_word("in")?;
        let iterable = head.parse_expr()?;
        head.stream.expect_end()?;
        let body = self.parse_block_or_statement()?;
        Ok(Stmt::For {
            target,
            iterable,
            body,
            span,
        })
    }

    fn switch_statement(&mut self) -> Result<Stmt> {
        let span = self.stream.read()?.span; // consume 'switch'
        let subject = self.parse_paren_expr()?;
        let token = self.stream.read()?;
        let TokenKind::Brace(tokens) = token.kind else {
            return Err(expected("{", &token));
        };

        let mut body = self.sub(tokens, token.span);
        let mut cases = Vec::new();
        let mut default = None;
        while !body.stream.at_end()? {
            let token = body.stream.read()?;
            if token.is_word("case") {
                let list = body.stream.read()?;
                let TokenKind::Paren(tokens) = list.kind else {
                    return Err(expected("(", &list));
                };
                let values = self.sub(tokens, list.span).comma_separated(Parser::parse_expr)?;
                if values.is_empty() {
                    return Err(JuaError::syntax(
                        ErrorKind::Syntax("case without values".into()),
                        list.span,
                    ));
                }
                cases.push(Case {
                    values,
                    body: body.parse_block_or_statement()?,
                });
            } else if token.is_word("else") {
                default = Some(body.parse_block_or_statement()?);
                body.stream.expect_end()?;
            } else {
                return Err(unexpected(&token));
            }
        }

        if cases.is_empty() {
            return Err(JuaError::syntax(
                ErrorKind::Syntax("switch without case".into()),
                span,
            ));
        }
        Ok(Stmt::Switch {
            subject,
            cases,
            default,
            span,
        })
    }

    /// `(expr)` or `!(expr)`
    fn parse_cond(&mut self) -> Result<Expr> {
        let negated = self
            .stream
            .peek_token()?
            .is_some_and(|t| t.kind == TokenKind::Operator("!"));
        if negated {
            let span = self.stream.read()?.span;
            let operand = self.parse_paren_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_paren_expr()
    }

    fn parse_paren_expr(&mut self) -> Result<Expr> {
        let token = self.stream.read()?;
        let TokenKind::Paren(tokens) = token.kind else {
            return Err(expected("(", &token));
        };
        let mut inner = self.sub(tokens, token.span);
        let expr = inner.parse_expr()?;
        inner.stream.expect_end()?;
        Ok(expr)
    }

    /// A braced block, or a single statement wrapped as one
    fn parse_block_or_statement(&mut self) -> Result<Block> {
        let braced = matches!(
            self.stream.peek_token()?,
            Some(Token {
                kind: TokenKind::Brace(_),
                ..
            })
        );
        if braced {
            let token = self.stream.read()?;
            if let TokenKind::Brace(tokens) = token.kind {
                return Ok(Block::new(self.sub(tokens, token.span).parse_statements()?));
            }
        }
        Ok(Block::new(vec![self.parse_statement()?]))
    }

    // ==================== Declarations ====================

    fn parse_declaration_item(&mut self) -> Result<DeclarationItem> {
        let target = self.parse_declarable()?;
        let mut item = DeclarationItem {
            target,
            default: None,
        };
        if self.stream.skip_separator("?")? {
            item.add_default();
        } else if self.stream.skip_separator("=")? {
            item.default = Some(self.parse_expr()?);
        }
        Ok(item)
    }

    fn parse_declarable(&mut self) -> Result<Declarable> {
        let token = self.stream.read()?;
        let span = token.span;
        match token.kind {
            TokenKind::Word(w) if !is_keyword(&w) => Ok(Declarable::Name {
                name: w.into(),
                span,
            }),
            TokenKind::Bracket(tokens) => Ok(Declarable::List(DeclarationList {
                items: self.sub(tokens, span).comma_separated(Parser::parse_declaration_item)?,
                span,
            })),
            TokenKind::Brace(tokens) => Ok(Declarable::Object(
                self.sub(tokens, span).parse_object_pattern(span)?,
            )),
            other => Err(JuaError::syntax(
                ErrorKind::UnexpectedToken(other.to_string()),
                span,
            )),
        }
    }

    fn parse_object_pattern(&mut self, span: Span) -> Result<ObjectPattern> {
        let props = self.comma_separated(Parser::parse_pattern_prop)?;
        if props.is_empty() {
            return Err(JuaError::syntax(
                ErrorKind::Syntax("empty object pattern".into()),
                span,
            ));
        }
        Ok(ObjectPattern { props, span })
    }

    /// `key`, `key as target`, `[expr] as target`, each with `?` or `= default`
    fn parse_pattern_prop(&mut self) -> Result<PatternProp> {
        let token = self.stream.read()?;
        let span = token.span;
        let (key, target) = match token.kind {
            TokenKind::Word(w) => {
                let target = if self.stream.peek_word("as")? {
                    self.stream.read()?;
                    self.parse_declarable()?
                } else if is_keyword(&w) {
                    return Err(JuaError::syntax(ErrorKind::UnexpectedToken(w), span));
                } else {
                    Declarable::Name {
                        name: w.as_str().into(),
                        span,
                    }
                };
                (PropKey::Name(w.into()), target)
            }
            TokenKind::Str(s) | TokenKind::RawStr(s) => {
                self.stream.expect_word("as")?;
                (PropKey::Name(s.into()), self.parse_declarable()?)
            }
            TokenKind::Bracket(tokens) => {
                let mut inner = self.sub(tokens, span);
                let key = inner.parse_expr()?;
                inner.stream.expect_end()?;
                self.stream.expect_word("as")?;
                (PropKey::Computed(key), self.parse_declarable()?)
            }
            other => {
                return Err(JuaError::syntax(
                    ErrorKind::UnexpectedToken(other.to_string()),
                    span,
                ))
            }
        };

        let mut prop = PatternProp {
            key,
            target,
            default: None,
        };
        if self.stream.skip_separator("?")? {
            prop.add_default();
        } else if self.stream.skip_separator("=")? {
            prop.default = Some(self.parse_expr()?);
        }
        Ok(prop)
    }

    /// Parameter list and body; the leading `fun` or method name is consumed
    fn parse_func(&mut self, name: Option<Rc<str>>, span: Span) -> Result<FunctionLiteral> {
        let token = self.stream.read()?;
        let TokenKind::Paren(tokens) = token.kind else {
            return Err(expected("(", &token));
        };
        let params = DeclarationList {
            items: self.sub(tokens, token.span).comma_separated(Parser::parse_declaration_item)?,
            span: token.span,
        };

        let body = if self.stream.skip_separator("=")? {
            let value = self.parse_expr()?;
            let at = value.span();
            Block::new(vec![Stmt::Return {
                value: Some(value),
                span: at,
            }])
        } else {
            let token = self.stream.read()?;
            let TokenKind::Brace(tokens) = token.kind else {
                return Err(expected("{", &token));
            };
            Block::new(self.sub(tokens, token.span).parse_statements()?)
        };

        FunctionLiteral::new(name, params, body, span, self.unit.clone())
    }

    // ==================== Expressions ====================

    pub fn parse_expr(&mut self) -> Result<Expr> {
        ensure_sufficient_stack(|| self.parse_expr_inner())
    }

    fn parse_expr_inner(&mut self) -> Result<Expr> {
        let enclosure = matches!(
            self.stream.peek_token()?,
            Some(Token {
                kind: TokenKind::Bracket(_) | TokenKind::Brace(_),
                ..
            })
        );
        if !enclosure {
            let head = self.parse_primary()?;
            return self.parse_expr_rest(head);
        }

        let token = self.stream.read()?;
        let span = token.span;
        if self.stream.peek_separator("=")? {
            // destructuring assignment
            let pattern = match token.kind {
                TokenKind::Bracket(tokens) => Declarable::List(DeclarationList {
                    items: self.sub(tokens, span)
                        .comma_separated(Parser::parse_declaration_item)?,
                    span,
                }),
                TokenKind::Brace(tokens) => {
                    Declarable::Object(self.sub(tokens, span).parse_object_pattern(span)?)
                }
                other => {
                    return Err(JuaError::syntax(
                        ErrorKind::UnexpectedToken(other.to_string()),
                        span,
                    ))
                }
            };
            self.stream.read()?; // consume '='
            let value = self.parse_expr()?;
            return Ok(Expr::Assign {
                target: Box::new(Target::Pattern(pattern)),
                op: None,
                value: Box::new(value),
                span,
            });
        }

        let head = self.enclosure_literal(token)?;
        let head = self.parse_tail(head)?;
        self.parse_expr_rest(head)
    }

    /// Assignment or a binary chain after an already parsed head
    fn parse_expr_rest(&mut self, head: Expr) -> Result<Expr> {
        let assigner = self.stream.peek_token()?.and_then(Token::assigner);
        let Some(assigner) = assigner else {
            return self.parse_binary(head);
        };

        let token = self.stream.read()?;
        let target = into_target(head, token.span)?;
        let op = if assigner == "=" {
            None
        } else {
            BinaryOp::from_assigner(assigner)
        };
        let value = self.parse_expr()?;
        let span = token.span;
        Ok(Expr::Assign {
            target: Box::new(target),
            op,
            value: Box::new(value),
            span,
        })
    }

    /// Precedence climbing: fold while the pending operator binds at least
    /// as tightly as the incoming one, so equal priorities group left.
    fn parse_binary(&mut self, head: Expr) -> Result<Expr> {
        let mut operands = vec![head];
        let mut operators: Vec<BinaryOp> = Vec::new();

        loop {
            let incoming = self
                .stream
                .peek_token()?
                .and_then(Token::binary_symbol)
                .and_then(BinaryOp::from_symbol);
            let Some(op) = incoming else { break };
            self.stream.read()?;

            while let Some(&top) = operators.last() {
                if top.priority() < op.priority() {
                    break;
                }
                operators.pop();
                reduce(&mut operands, top);
            }
            operators.push(op);
            operands.push(self.parse_primary()?);
        }

        while let Some(op) = operators.pop() {
            reduce(&mut operands, op);
        }
        operands
            .pop()
            .ok_or_else(|| JuaError::syntax(ErrorKind::UnexpectedEnd, self.stream.end_span()))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        ensure_sufficient_stack(|| self.parse_primary_inner())
    }

    fn parse_primary_inner(&mut self) -> Result<Expr> {
        let token = self.stream.read()?;
        let span = token.span;

        let expr = match token.kind {
            TokenKind::Number(value) => Expr::Number { value, span },
            TokenKind::Str(s) | TokenKind::RawStr(s) => Expr::String {
                value: s.into(),
                span,
            },
            TokenKind::Template(fragments, splices) => self.template(fragments, splices, span)?,
            TokenKind::Paren(tokens) => {
                let mut inner = self.sub(tokens, span);
                let expr = inner.parse_expr()?;
                inner.stream.expect_end()?;
                expr
            }
            kind @ (TokenKind::Bracket(_) | TokenKind::Brace(_)) => {
                self.enclosure_literal(Token::new(kind, span))?
            }
            TokenKind::Operator(symbol) => {
                let Some(op) = UnaryOp::from_symbol(symbol) else {
                    return Err(JuaError::syntax(
                        ErrorKind::UnexpectedToken(symbol.to_string()),
                        span,
                    ));
                };
                let operand = self.parse_primary()?;
                return Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                    span,
                });
            }
            TokenKind::Word(w) => match w.as_str() {
                "true" => Expr::Bool { value: true, span },
                "false" => Expr::Bool { value: false, span },
                "null" => Expr::Null { span },
                "local" => Expr::Local { span },
                "fun" => Expr::Function {
                    func: Rc::new(self.parse_func(None, span)?),
                    span,
                },
                "if" => {
                    let condition = self.parse_cond()?;
                    let then_expr = self.parse_expr()?;
                    self.stream.expect_word("else")?;
                    let else_expr = self.parse_expr()?;
                    Expr::Ternary {
                        condition: Box::new(condition),
                        then_expr: Box::new(then_expr),
                        else_expr: Box::new(else_expr),
                        span,
                    }
                }
                name if !is_keyword(name) => Expr::Ident {
                    name: name.into(),
                    span,
                },
                _ => return Err(JuaError::syntax(ErrorKind::UnexpectedToken(w), span)),
            },
            other => {
                return Err(JuaError::syntax(
                    ErrorKind::UnexpectedToken(other.to_string()),
                    span,
                ))
            }
        };

        self.parse_tail(expr)
    }

    /// Postfix tails, left to right
    fn parse_tail(&mut self, mut expr: Expr) -> Result<Expr> {
        loop {
            let tail = match self.stream.peek_token()? {
                Some(token) => match &token.kind {
                    TokenKind::Separator(".") => Tail::Dot,
                    TokenKind::Separator("?.") => Tail::OptionalDot,
                    TokenKind::Separator(":") => Tail::Colon,
                    TokenKind::Paren(_) => Tail::Paren,
                    TokenKind::Bracket(_) => Tail::Bracket,
                    TokenKind::Brace(_) => Tail::Brace,
                    TokenKind::Str(_) | TokenKind::RawStr(_) | TokenKind::Template(..) => Tail::Str,
                    _ => break,
                },
                None => break,
            };
            let start = expr.span();

            expr = match tail {
                Tail::Dot | Tail::OptionalDot => {
                    self.stream.read()?;
                    let (name, end) = self.property_name()?;
                    Expr::Prop {
                        object: Box::new(expr),
                        name,
                        optional: matches!(tail, Tail::OptionalDot),
                        span: join(start, end),
                    }
                }
                Tail::Colon => {
                    self.stream.read()?;
                    let (name, end) = self.property_name()?;
                    Expr::Method {
                        object: Box::new(expr),
                        name,
                        span: join(start, end),
                    }
                }
                Tail::Paren => {
                    let token = self.stream.read()?;
                    let TokenKind::Paren(tokens) = token.kind else {
                        return Err(unexpected(&token));
                    };
                    let trailing = matches!(
                        self.stream.peek_token()?,
                        Some(Token {
                            kind: TokenKind::Brace(_),
                            ..
                        })
                    );
                    let args = if trailing {
                        // f(a, b) { ... } passes fun(a, b) { ... }
                        let params = DeclarationList {
                            items: self.sub(tokens, token.span)
                                .comma_separated(Parser::parse_declaration_item)?,
                            span: token.span,
                        };
                        vec![self.trailing_function(params, token.span)?]
                    } else {
                        self.sub(tokens, token.span).comma_separated(Parser::parse_expr)?
                    };
                    Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span: join(start, token.span),
                    }
                }
                Tail::Bracket => {
                    let token = self.stream.read()?;
                    let TokenKind::Bracket(tokens) = token.kind else {
                        return Err(unexpected(&token));
                    };
                    let mut inner = self.sub(tokens, token.span);
                    let index = inner.parse_expr()?;
                    inner.stream.expect_end()?;
                    Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        span: join(start, token.span),
                    }
                }
                Tail::Brace => {
                    let at = self.stream.peek_token()?.map(|t| t.span).unwrap_or(start);
                    let params = DeclarationList {
                        items: Vec::new(),
                        span: at,
                    };
                    let func = self.trailing_function(params, at)?;
                    Expr::Call {
                        callee: Box::new(expr),
                        args: vec![func],
                        span: join(start, at),
                    }
                }
                Tail::Str => {
                    // f 'text' passes the whole following expression
                    let arg = self.parse_expr()?;
                    let end = arg.span();
                    Expr::Call {
                        callee: Box::new(expr),
                        args: vec![arg],
                        span: join(start, end),
                    }
                }
            };
        }
        Ok(expr)
    }

    /// Function whose body is the next brace token
    fn trailing_function(&mut self, params: DeclarationList, span: Span) -> Result<Expr> {
        let token = self.stream.read()?;
        let TokenKind::Brace(tokens) = token.kind else {
            return Err(expected("{", &token));
        };
        let body = Block::new(self.sub(tokens, token.span).parse_statements()?);
        Ok(Expr::Function {
            func: Rc::new(FunctionLiteral::new(None, params, body, span, self.unit.clone())?),
            span,
        })
    }

    /// Any word may follow `.`, `?.` or `:`
    fn property_name(&mut self) -> Result<(Rc<str>, Span)> {
        let token = self.stream.read()?;
        match token.kind {
            TokenKind::Word(w) => Ok((w.into(), token.span)),
            other => Err(JuaError::syntax(
                ErrorKind::ExpectedToken("property name".into(), other.to_string()),
                token.span,
            )),
        }
    }

    fn template(&mut self, fragments: Vec<String>, splices: Vec<Token>, span: Span) -> Result<Expr> {
        let mut parts = Vec::with_capacity(splices.len());
        for splice in splices {
            let at = splice.span;
            match splice.kind {
                TokenKind::Word(name) => parts.push(Expr::Ident {
                    name: name.into(),
                    span: at,
                }),
                TokenKind::Brace(tokens) => {
                    let mut inner = self.sub(tokens, at);
                    let expr = inner.parse_expr()?;
                    inner.stream.expect_end()?;
                    parts.push(expr);
                }
                other => {
                    return Err(JuaError::syntax(
                        ErrorKind::UnexpectedToken(other.to_string()),
                        at,
                    ))
                }
            }
        }
        Ok(Expr::Template {
            fragments: fragments.into_iter().map(Rc::from).collect(),
            parts,
            span,
        })
    }

    /// Array or object literal from an enclosure token
    fn enclosure_literal(&mut self, token: Token) -> Result<Expr> {
        let span = token.span;
        match token.kind {
            TokenKind::Bracket(tokens) => Ok(Expr::Array {
                items: self.sub(tokens, span).comma_separated(Parser::parse_expr)?,
                span,
            }),
            TokenKind::Brace(tokens) => Ok(Expr::Object {
                entries: self.sub(tokens, span).comma_separated(Parser::parse_prop)?,
                span,
            }),
            other => Err(JuaError::syntax(
                ErrorKind::UnexpectedToken(other.to_string()),
                span,
            )),
        }
    }

    /// One object literal entry
    fn parse_prop(&mut self) -> Result<(PropKey, Expr)> {
        let token = self.stream.read()?;
        let span = token.span;
        match token.kind {
            TokenKind::Word(w) => {
                if self.skip_key_separator()? {
                    return Ok((PropKey::Name(w.into()), self.parse_expr()?));
                }
                if self.peek_paren()? {
                    let name: Rc<str> = w.into();
                    let func = self.parse_func(Some(name.clone()), span)?;
                    return Ok((
                        PropKey::Name(name),
                        Expr::Function {
                            func: Rc::new(func),
                            span,
                        },
                    ));
                }
                if is_keyword(&w) {
                    return Err(JuaError::syntax(ErrorKind::UnexpectedToken(w), span));
                }
                let name: Rc<str> = w.into();
                Ok((PropKey::Name(name.clone()), Expr::Ident { name, span }))
            }
            TokenKind::Str(s) | TokenKind::RawStr(s) => {
                if !self.skip_key_separator()? {
                    let next = self.stream.read()?;
                    return Err(expected(":", &next));
                }
                Ok((PropKey::Name(s.into()), self.parse_expr()?))
            }
            TokenKind::Bracket(tokens) => {
                let mut inner = self.sub(tokens, span);
                let key = inner.parse_expr()?;
                inner.stream.expect_end()?;
                if self.peek_paren()? {
                    let func = self.parse_func(None, span)?;
                    return Ok((
                        PropKey::Computed(key),
                        Expr::Function {
                            func: Rc::new(func),
                            span,
                        },
                    ));
                }
                if !self.skip_key_separator()? {
                    let next = self.stream.read()?;
                    return Err(expected("=", &next));
                }
                Ok((PropKey::Computed(key), self.parse_expr()?))
            }
            other => Err(JuaError::syntax(
                ErrorKind::UnexpectedToken(other.to_string()),
                span,
            )),
        }
    }

    fn skip_key_separator(&mut self) -> Result<bool> {
        Ok(self.stream.skip_separator(":")? || self.stream.skip_separator("=")?)
    }

    fn peek_paren(&mut self) -> Result<bool> {
        Ok(matches!(
            self.stream.peek_token()?,
            Some(Token {
                kind: TokenKind::Paren(_),
                ..
            })
        ))
    }

    // ==================== Helpers ====================

    /// Items separated by commas up to the end of the stream; a trailing
    /// comma is allowed.
    fn comma_separated<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while !self.stream.at_end()? {
            items.push(item(self)?);
            if !self.stream.skip_separator(",")? {
                self.stream.expect_end()?;
                break;
            }
        }
        Ok(items)
    }
}

fn expected(what: &str, token: &Token) -> JuaError {
    JuaError::syntax(
        ErrorKind::ExpectedToken(what.to_string(), token.to_string()),
        token.span,
    )
}

fn join(start: Span, end: Span) -> Span {
    Span::new(start.start, end.end.max(start.end), start.line, start.column)
}

fn reduce(operands: &mut Vec<Expr>, op: BinaryOp) {
    let (Some(right), Some(left)) = (operands.pop(), operands.pop()) else {
        return;
    };
    let span = join(left.span(), right.span());
    operands.push(Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
        span,
    });
}

fn into_target(mut expr: Expr, at: Span) -> Result<Target> {
    match &mut expr {
        Expr::Ident { name, span } => Ok(Target::Ident {
            name: name.clone(),
            span: *span,
        }),
        Expr::Prop {
            object,
            name,
            optional: false,
            span,
        } => Ok(Target::Prop {
            object: object.take(),
            name: name.clone(),
            span: *span,
        }),
        Expr::Index {
            object,
            index,
            span,
        } => Ok(Target::Index {
            object: object.take(),
            index: index.take(),
            span: *span,
        }),
        _ => Err(JuaError::syntax(ErrorKind::InvalidAssignmentTarget, at)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Stmt> {
        parse_program(source, "test").unwrap().body.statements.clone()
    }

    fn parse_error(source: &str) -> ErrorKind {
        parse_program(source, "test").unwrap_err().kind
    }

    fn expr(source: &str) -> Expr {
        parse_expression(source).unwrap()
    }

    #[test]
    fn test_let_statement() {
        let statements = parse("let x = 42, y");
        assert_eq!(statements.len(), 1);
        match &statements[0] {
            Stmt::Let { list, .. } => {
                assert_eq!(list.items.len(), 2);
                assert!(matches!(list.items[0].default, Some(Expr::Number { value, .. }) if value == 42.0));
                assert!(matches!(list.items[1].default, Some(Expr::Null { .. })));
            }
            _ => panic!("expected let statement"),
        }
    }

    #[test]
    fn test_fun_statement() {
        let statements = parse("fun add(a, b) { return a + b; }");
        match &statements[0] {
            Stmt::Let { list, .. } => match &list.items[0].default {
                Some(Expr::Function { func, .. }) => {
                    assert_eq!(func.name.as_deref(), Some("add"));
                    assert_eq!(func.params.items.len(), 2);
                }
                _ => panic!("expected function literal"),
            },
            _ => panic!("expected let statement"),
        }
    }

    #[test]
    fn test_precedence() {
        // 2 + 3 * 4 groups the product
        match &expr("2 + 3 * 4") {
            Expr::Binary { op, right, .. } => {
                assert_eq!(*op, BinaryOp::Add);
                assert!(matches!(**right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            _ => panic!("expected binary expression"),
        }
        // equal priority groups left
        match &expr("10 - 4 - 3") {
            Expr::Binary { op, left, .. } => {
                assert_eq!(*op, BinaryOp::Sub);
                assert!(matches!(**left, Expr::Binary { op: BinaryOp::Sub, .. }));
            }
            _ => panic!("expected binary expression"),
        }
    }

    #[test]
    fn test_unary_binds_to_primary() {
        match &expr("-a.b + 1") {
            Expr::Binary { left, .. } => match &**left {
                Expr::Unary { op, operand, .. } => {
                    assert_eq!(*op, UnaryOp::Neg);
                    assert!(matches!(**operand, Expr::Prop { .. }));
                }
                _ => panic!("expected unary"),
            },
            _ => panic!("expected binary expression"),
        }
    }

    #[test]
    fn test_compound_assignment() {
        match &expr("a.b += 2") {
            Expr::Assign { target, op, .. } => {
                assert_eq!(*op, Some(BinaryOp::Add));
                assert!(matches!(**target, Target::Prop { .. }));
            }
            _ => panic!("expected assignment"),
        }
    }

    #[test]
    fn test_invalid_target() {
        assert_eq!(parse_error("1 = 2"), ErrorKind::InvalidAssignmentTarget);
        assert_eq!(parse_error("a?.b = 2"), ErrorKind::InvalidAssignmentTarget);
        assert_eq!(parse_error("[a, b] += 1"), ErrorKind::InvalidAssignmentTarget);
    }

    #[test]
    fn test_destructuring_assignment() {
        match &expr("{x, y as [a, b]?} = point") {
            Expr::Assign { target, .. } => match &**target {
                Target::Pattern(Declarable::Object(pattern)) => {
                    assert_eq!(pattern.props.len(), 2);
                    assert!(pattern.props[0].default.is_none());
                    assert!(pattern.props[1].default.is_some());
                    assert!(matches!(pattern.props[1].target, Declarable::List(_)));
                }
                _ => panic!("expected object pattern"),
            },
            _ => panic!("expected assignment"),
        }
    }

    #[test]
    fn test_object_literal_forms() {
        match &expr("{ a: 1, b = 2, c, m(x) { return x; }, [k]: 3, 'q r': 4 }") {
            Expr::Object { entries, .. } => {
                assert_eq!(entries.len(), 6);
                assert!(matches!(&entries[2].1, Expr::Ident { name, .. } if &**name == "c"));
                assert!(matches!(&entries[3].1, Expr::Function { .. }));
                assert!(matches!(&entries[4].0, PropKey::Computed(_)));
                assert!(matches!(&entries[5].0, PropKey::Name(k) if &**k == "q r"));
            }
            _ => panic!("expected object literal"),
        }
    }

    #[test]
    fn test_tails() {
        match &expr("obj?.list[0]:push(1)") {
            Expr::Call { callee, args, .. } => {
                assert_eq!(args.len(), 1);
                match &**callee {
                    Expr::Method { object, name, .. } => {
                        assert_eq!(&**name, "push");
                        assert!(matches!(**object, Expr::Index { .. }));
                    }
                    _ => panic!("expected method"),
                }
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_trailing_functions() {
        match &expr("each(items) (item) { print(item); }") {
            Expr::Call { callee, args, .. } => {
                assert!(matches!(**callee, Expr::Call { .. }));
                match &args[0] {
                    Expr::Function { func, .. } => assert_eq!(func.params.items.len(), 1),
                    _ => panic!("expected function argument"),
                }
            }
            _ => panic!("expected call"),
        }
        match &expr("later { return 1; }") {
            Expr::Call { args, .. } => assert!(matches!(&args[0], Expr::Function { .. })),
            _ => panic!("expected call"),
        }
        match &expr("print 'a' + 'b'") {
            Expr::Call { args, .. } => assert!(matches!(&args[0], Expr::Binary { .. })),
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_ternary() {
        assert!(matches!(expr("if (a) 1 else 2"), Expr::Ternary { .. }));
    }

    #[test]
    fn test_template_parts() {
        match &expr(r#""sum: ${a + b}, name: $name""#) {
            Expr::Template { fragments, parts, .. } => {
                assert_eq!(fragments.len(), 3);
                assert!(matches!(parts[0], Expr::Binary { .. }));
                assert!(matches!(&parts[1], Expr::Ident { name, .. } if &**name == "name"));
            }
            _ => panic!("expected template"),
        }
    }

    #[test]
    fn test_control_statements() {
        let statements = parse(
            "if (!(x)) y = 1 else { y = 2; }
             while (i < 3) { i += 1; if (i == 2) continue; }
             for ([k, v] in pairs) print(k)
             switch (x) { case(1, 2) { y = 0; } else { y = 3; } }",
        );
        assert_eq!(statements.len(), 4);
        match &statements[0] {
            Stmt::If { condition, else_block, .. } => {
                assert!(matches!(condition, Expr::Unary { op: UnaryOp::Not, .. }));
                assert!(else_block.is_some());
            }
            _ => panic!("expected if statement"),
        }
        assert!(matches!(&statements[2], Stmt::For { target: Declarable::List(_), .. }));
        match &statements[3] {
            Stmt::Switch { cases, default, .. } => {
                assert_eq!(cases[0].values.len(), 2);
                assert!(default.is_some());
            }
            _ => panic!("expected switch statement"),
        }
    }

    #[test]
    fn test_stray_break() {
        assert_eq!(parse_error("fun f() { break; }"), ErrorKind::StrayJump("break"));
        assert_eq!(
            parse_error("fun f() { if (a) { continue; } }"),
            ErrorKind::StrayJump("continue")
        );
        assert_eq!(parse_error("break"), ErrorKind::StrayJump("break"));
        assert!(parse_program("while (a) { switch (b) { case(1) break } }", "t").is_ok());
    }

    #[test]
    fn test_switch_errors() {
        assert!(matches!(parse_error("switch (a) { }"), ErrorKind::Syntax(_)));
        assert!(matches!(parse_error("switch (a) { case() {} }"), ErrorKind::Syntax(_)));
    }

    #[test]
    fn test_bare_return() {
        let func = parse_program("fun f() { return; }", "t").unwrap();
        match &func.body.statements[0] {
            Stmt::Let { list, .. } => match &list.items[0].default {
                Some(Expr::Function { func, .. }) => {
                    assert!(matches!(func.body.statements[0], Stmt::Return { value: None, .. }));
                }
                _ => panic!("expected function"),
            },
            _ => panic!("expected let"),
        }
    }

    #[test]
    fn test_expression_body() {
        match &expr("fun(x) = x * 2") {
            Expr::Function { func, .. } => {
                assert!(matches!(func.body.statements[0], Stmt::Return { value: Some(_), .. }));
            }
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_syntax_error_position() {
        let err = parse_program("let a = 1\nlet = 2", "t").unwrap_err();
        let span = err.span.unwrap();
        assert_eq!(span.line, 2);
        assert_eq!(span.column, 5);
    }
}
