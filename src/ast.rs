//! Abstract Syntax Tree definitions for Jua
//!
//! Nodes are immutable once built and can be evaluated any number of times
//! against different scopes.

use crate::error::{ErrorKind, JuaError, Result};
use crate::operator::{BinaryOp, UnaryOp};
use crate::token::Span;
use std::rc::Rc;

/// Expression nodes
#[derive(Debug, Clone)]
pub enum Expr {
    /// Number literal: 42, 0x1F
    Number { value: f64, span: Span },

    /// String literal: 'hello', `raw`
    String { value: Rc<str>, span: Span },

    /// Template: "a $b ${c}"; one more fragment than parts
    Template {
        fragments: Vec<Rc<str>>,
        parts: Vec<Expr>,
        span: Span,
    },

    /// Boolean literal: true, false
    Bool { value: bool, span: Span },

    Null { span: Span },

    /// `local`: the current scope as an object
    Local { span: Span },

    /// Variable reference: foo
    Ident { name: Rc<str>, span: Span },

    /// Property access: obj.prop, obj?.prop
    Prop {
        object: Box<Expr>,
        name: Rc<str>,
        optional: bool,
        span: Span,
    },

    /// Bound method: obj:name
    Method {
        object: Box<Expr>,
        name: Rc<str>,
        span: Span,
    },

    /// Unary operation: -x, !y
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },

    /// Binary operation: a + b, x && y
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },

    /// Conditional expression: if (c) a else b
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: Span,
    },

    /// Function call: foo(a, b)
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },

    /// Subscript: items[i]
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },

    /// Object literal: { a: 1, b, [k]: v, m() {} }
    Object {
        entries: Vec<(PropKey, Expr)>,
        span: Span,
    },

    /// Array literal: [1, 2, 3]
    Array { items: Vec<Expr>, span: Span },

    /// Function literal: fun(a, b) { ... }
    Function { func: Rc<FunctionLiteral>, span: Span },

    /// Assignment, plain or compound: a = 1, a.b += 2, [x, y] = pair
    Assign {
        target: Box<Target>,
        op: Option<BinaryOp>,
        value: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number { span, .. }
            | Expr::String { span, .. }
            | Expr::Template { span, .. }
            | Expr::Bool { span, .. }
            | Expr::Null { span }
            | Expr::Local { span }
            | Expr::Ident { span, .. }
            | Expr::Prop { span, .. }
            | Expr::Method { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. }
            | Expr::Object { span, .. }
            | Expr::Array { span, .. }
            | Expr::Function { span, .. }
            | Expr::Assign { span, .. } => *span,
        }
    }
}

/// Key of an object literal entry or object pattern
#[derive(Debug, Clone)]
pub enum PropKey {
    Name(Rc<str>),
    /// `[expr]`, must evaluate to a string
    Computed(Expr),
}

/// Left side of an assignment
#[derive(Debug, Clone)]
pub enum Target {
    Ident { name: Rc<str>, span: Span },
    Prop { object: Expr, name: Rc<str>, span: Span },
    Index { object: Expr, index: Expr, span: Span },
    /// Destructuring; only valid with plain `=`
    Pattern(Declarable),
}

/// Anything a value can be bound to
#[derive(Debug, Clone)]
pub enum Declarable {
    Name { name: Rc<str>, span: Span },
    /// Positional: [a, b = 1]
    List(DeclarationList),
    /// Keyed: { a, b as c, d = 1, e? }
    Object(ObjectPattern),
}

impl Declarable {
    pub fn span(&self) -> Span {
        match self {
            Declarable::Name { span, .. } => *span,
            Declarable::List(list) => list.span,
            Declarable::Object(pattern) => pattern.span,
        }
    }

    /// `?` suffix: missing values become null, recursively through keyed patterns
    pub fn add_default(&mut self) {
        if let Declarable::Object(pattern) = self {
            for prop in &mut pattern.props {
                prop.add_default();
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeclarationItem {
    pub target: Declarable,
    pub default: Option<Expr>,
}

impl DeclarationItem {
    pub fn add_default(&mut self) {
        if self.default.is_none() {
            self.default = Some(Expr::Null {
                span: self.target.span(),
            });
        }
        self.target.add_default();
    }
}

/// Comma-separated declarations: parameters, `let` lists, `[a, b]` patterns
#[derive(Debug, Clone)]
pub struct DeclarationList {
    pub items: Vec<DeclarationItem>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct PatternProp {
    pub key: PropKey,
    pub target: Declarable,
    pub default: Option<Expr>,
}

impl PatternProp {
    pub fn add_default(&mut self) {
        if self.default.is_none() {
            self.default = Some(Expr::Null {
                span: self.target.span(),
            });
        }
        self.target.add_default();
    }
}

#[derive(Debug, Clone)]
pub struct ObjectPattern {
    pub props: Vec<PatternProp>,
    pub span: Span,
}

/// Statement nodes
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Expression statement
    Expr { expr: Expr },

    /// Declaration: let a, [b, c] = pair, { d } = obj
    Let { list: DeclarationList, span: Span },

    /// Return statement: return expr
    Return { value: Option<Expr>, span: Span },

    Break { span: Span },

    Continue { span: Span },

    /// If statement: if (cond) { } else { }
    If {
        condition: Expr,
        then_block: Block,
        else_block: Option<Block>,
        span: Span,
    },

    /// Switch: switch (x) { case(1, 2) { } else { } }
    Switch {
        subject: Expr,
        cases: Vec<Case>,
        default: Option<Block>,
        span: Span,
    },

    /// While loop: while (cond) { }
    While {
        condition: Expr,
        body: Block,
        span: Span,
    },

    /// For loop: for (x in iter) { }
    For {
        target: Declarable,
        iterable: Expr,
        body: Block,
        span: Span,
    },
}

#[derive(Debug, Clone)]
pub struct Case {
    pub values: Vec<Expr>,
    pub body: Block,
}

/// Statements run in order. A `break` or `continue` that no loop inside the
/// block consumes is recorded as pending, and propagates to enclosing
/// blocks through `if` and `switch`.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub pending_break: Option<Span>,
    pub pending_continue: Option<Span>,
}

impl Block {
    pub fn new(statements: Vec<Stmt>) -> Self {
        let mut block = Block {
            statements,
            pending_break: None,
            pending_continue: None,
        };
        let mut pending = Vec::new();
        for stmt in &block.statements {
            match stmt {
                Stmt::Break { span } => pending.push((true, *span)),
                Stmt::Continue { span } => pending.push((false, *span)),
                Stmt::If {
                    then_block,
                    else_block,
                    ..
                } => {
                    pending.extend(then_block.pending());
                    if let Some(else_block) = else_block {
                        pending.extend(else_block.pending());
                    }
                }
                Stmt::Switch { cases, default, .. } => {
                    for case in cases {
                        pending.extend(case.body.pending());
                    }
                    if let Some(default) = default {
                        pending.extend(default.pending());
                    }
                }
                _ => {}
            }
        }
        for (is_break, span) in pending {
            let slot = if is_break {
                &mut block.pending_break
            } else {
                &mut block.pending_continue
            };
            slot.get_or_insert(span);
        }
        block
    }

    fn pending(&self) -> impl Iterator<Item = (bool, Span)> {
        self.pending_break
            .map(|span| (true, span))
            .into_iter()
            .chain(self.pending_continue.map(|span| (false, span)))
    }
}

/// A function literal; also the body of every module
#[derive(Debug)]
pub struct FunctionLiteral {
    pub name: Option<Rc<str>>,
    pub params: DeclarationList,
    pub body: Block,
    pub span: Span,
    /// Source unit the literal was parsed from
    pub unit: Rc<str>,
}

impl FunctionLiteral {
    /// Fails when the body would let a `break` or `continue` escape
    pub fn new(
        name: Option<Rc<str>>,
        params: DeclarationList,
        body: Block,
        span: Span,
        unit: Rc<str>,
    ) -> Result<Self> {
        if let Some(at) = body.pending_break {
            return Err(JuaError::syntax(ErrorKind::StrayJump("break"), at));
        }
        if let Some(at) = body.pending_continue {
            return Err(JuaError::syntax(ErrorKind::StrayJump("continue"), at));
        }
        Ok(Self {
            name,
            params,
            body,
            span,
            unit,
        })
    }
}

// ==================== Teardown ====================

/// Subtree detached from a node being freed
enum Detached {
    Expr(Expr),
    Block(Block),
}

/// Free detached subtrees from a heap worklist. Operator and tail chains
/// nest one level per term, deeper than the derived drop could recurse.
fn free(mut pending: Vec<Detached>) {
    while let Some(node) = pending.pop() {
        match node {
            Detached::Expr(mut expr) => expr.detach_children(&mut pending),
            Detached::Block(mut block) => block.detach_statements(&mut pending),
        }
    }
}

fn take(slot: &mut Expr) -> Detached {
    Detached::Expr(slot.take())
}

impl Expr {
    /// Move the node out, leaving `null` at the same span
    pub fn take(&mut self) -> Expr {
        let span = self.span();
        std::mem::replace(self, Expr::Null { span })
    }

    fn detach_children(&mut self, out: &mut Vec<Detached>) {
        match self {
            Expr::Template { parts, .. } | Expr::Array { items: parts, .. } => {
                out.extend(parts.drain(..).map(Detached::Expr));
            }
            Expr::Prop { object, .. }
            | Expr::Method { object, .. }
            | Expr::Unary {
                operand: object, ..
            } => out.push(take(object)),
            Expr::Binary { left, right, .. }
            | Expr::Index {
                object: left,
                index: right,
                ..
            } => {
                out.push(take(left));
                out.push(take(right));
            }
            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                out.push(take(condition));
                out.push(take(then_expr));
                out.push(take(else_expr));
            }
            Expr::Call { callee, args, .. } => {
                out.push(take(callee));
                out.extend(args.drain(..).map(Detached::Expr));
            }
            Expr::Object { entries, .. } => {
                for (key, value) in entries.drain(..) {
                    if let PropKey::Computed(key) = key {
                        out.push(Detached::Expr(key));
                    }
                    out.push(Detached::Expr(value));
                }
            }
            Expr::Function { func, .. } => {
                // shared literals stay alive in their closures
                if let Some(literal) = Rc::get_mut(func) {
                    out.push(Detached::Block(std::mem::take(&mut literal.body)));
                }
            }
            Expr::Assign { target, value, .. } => {
                out.push(take(value));
                match &mut **target {
                    Target::Prop { object, .. } => out.push(take(object)),
                    Target::Index { object, index, .. } => {
                        out.push(take(object));
                        out.push(take(index));
                    }
                    Target::Ident { .. } | Target::Pattern(_) => {}
                }
            }
            Expr::Number { .. }
            | Expr::String { .. }
            | Expr::Bool { .. }
            | Expr::Null { .. }
            | Expr::Local { .. }
            | Expr::Ident { .. } => {}
        }
    }
}

impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_children(&mut pending);
        if !pending.is_empty() {
            free(pending);
        }
    }
}

impl Block {
    fn detach_statements(&mut self, out: &mut Vec<Detached>) {
        for stmt in self.statements.drain(..) {
            match stmt {
                Stmt::Expr { expr } => out.push(Detached::Expr(expr)),
                Stmt::Let { list, .. } => {
                    out.extend(
                        list.items
                            .into_iter()
                            .filter_map(|item| item.default)
                            .map(Detached::Expr),
                    );
                }
                Stmt::Return { value, .. } => out.extend(value.map(Detached::Expr)),
                Stmt::If {
                    condition,
                    then_block,
                    else_block,
                    ..
                } => {
                    out.push(Detached::Expr(condition));
                    out.push(Detached::Block(then_block));
                    out.extend(else_block.map(Detached::Block));
                }
                Stmt::Switch {
                    subject,
                    cases,
                    default,
                    ..
                } => {
                    out.push(Detached::Expr(subject));
                    for case in cases {
                        out.extend(case.values.into_iter().map(Detached::Expr));
                        out.push(Detached::Block(case.body));
                    }
                    out.extend(default.map(Detached::Block));
                }
                Stmt::While {
                    condition, body, ..
                } => {
                    out.push(Detached::Expr(condition));
                    out.push(Detached::Block(body));
                }
                Stmt::For { iterable, body, .. } => {
                    out.push(Detached::Expr(iterable));
                    out.push(Detached::Block(body));
                }
                Stmt::Break { .. } | Stmt::Continue { .. } => {}
            }
        }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_statements(&mut pending);
        if !pending.is_empty() {
            free(pending);
        }
    }
}
