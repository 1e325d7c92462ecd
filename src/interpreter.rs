//! Tree-walking evaluator for Jua
//!
//! Expressions implement `calc(scope) -> Value`, statements implement
//! `exec(scope, controller)`. A pending `return`, `break` or `continue`
//! travels in the `Controller` owned by the innermost function call; errors
//! travel as `Err` up to the nearest `try` or to the top-level runner.

use crate::ast::{
    Block, DeclarationList, Declarable, Expr, ObjectPattern, PropKey, Stmt, Target,
};
use crate::error::{ErrorKind, JuaError, Result};
use crate::operator::{apply_binary, apply_unary, BinaryOp};
use crate::scope::Scope;
use crate::stack::ensure_sufficient_stack;
use crate::token::Span;
use crate::value::{FuncRef, ObjRef, ObjectKind, ScriptFunction, Value};
use std::cell::Cell;
use std::rc::Rc;
use tracing::trace;

/// Nested calls allowed before a `RangeError` unless configured otherwise
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
    static MAX_CALL_DEPTH: Cell<usize> = const { Cell::new(DEFAULT_MAX_CALL_DEPTH) };
}

/// Run `f` under the nesting limit `limit`; the previous limit comes back
/// afterwards, so interpreters with different limits can share a thread.
pub fn with_call_limit<T>(limit: usize, f: impl FnOnce() -> T) -> T {
    let previous = MAX_CALL_DEPTH.with(|max| max.replace(limit));
    let _restore = LimitGuard(previous);
    f()
}

pub fn call_depth() -> usize {
    CALL_DEPTH.with(Cell::get)
}

struct LimitGuard(usize);

impl Drop for LimitGuard {
    fn drop(&mut self) {
        MAX_CALL_DEPTH.with(|max| max.set(self.0));
    }
}

struct DepthGuard(usize);

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(self.0));
    }
}

/// Count one call level around `f`
pub(crate) fn enter_call<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    let depth = call_depth();
    if depth >= MAX_CALL_DEPTH.with(Cell::get) {
        return Err(ErrorKind::StackOverflow.into());
    }
    CALL_DEPTH.with(|d| d.set(depth + 1));
    let _guard = DepthGuard(depth);
    ensure_sufficient_stack(f)
}

/// Pending control-flow signal of one function activation
#[derive(Debug, Default)]
pub struct Controller {
    pub returning: Option<Value>,
    pub breaking: bool,
    pub continuing: bool,
}

impl Controller {
    pub fn is_pending(&self) -> bool {
        self.returning.is_some() || self.breaking || self.continuing
    }

    /// Finish one loop iteration; true when the loop must stop
    fn end_iteration(&mut self) -> bool {
        self.continuing = false;
        if self.breaking {
            self.breaking = false;
            return true;
        }
        self.returning.is_some()
    }
}

/// Run a script function: child scope of the captured one, parameters
/// bound through the declaration protocol, then the body.
pub(crate) fn call_script(func: &ScriptFunction, args: Vec<Value>) -> Result<Value> {
    let literal = &func.literal;
    trace!(
        function = literal.name.as_deref().unwrap_or("<anonymous>"),
        depth = call_depth(),
        args = args.len(),
        "call"
    );
    let scope = func.env.child();
    let result = bind_list(&literal.params, args, &scope, Binding::Declare).and_then(|()| {
        let mut ctl = Controller::default();
        literal.body.exec(&scope, &mut ctl)?;
        Ok(ctl.returning.take().unwrap_or(Value::Null))
    });
    result.map_err(|e| e.in_unit(&literal.unit))
}

// ==================== Statements ====================

impl Block {
    pub fn exec(&self, scope: &Scope, ctl: &mut Controller) -> Result<()> {
        for stmt in &self.statements {
            stmt.exec(scope, ctl)?;
            if ctl.is_pending() {
                break;
            }
        }
        Ok(())
    }
}

impl Stmt {
    pub fn exec(&self, scope: &Scope, ctl: &mut Controller) -> Result<()> {
        ensure_sufficient_stack(|| self.execute(scope, ctl))
    }

    fn execute(&self, scope: &Scope, ctl: &mut Controller) -> Result<()> {
        match self {
            Stmt::Expr { expr } => {
                expr.calc(scope)?;
            }
            Stmt::Let { list, .. } => {
                bind_list(list, Vec::new(), scope, Binding::Declare)?;
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => expr.calc(scope)?,
                    None => Value::Null,
                };
                ctl.returning = Some(value);
            }
            Stmt::Break { .. } => ctl.breaking = true,
            Stmt::Continue { .. } => ctl.continuing = true,
            Stmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                if condition.calc(scope)?.is_truthy() {
                    then_block.exec(&scope.child(), ctl)?;
                } else if let Some(else_block) = else_block {
                    else_block.exec(&scope.child(), ctl)?;
                }
            }
            Stmt::Switch {
                subject,
                cases,
                default,
                span,
            } => {
                let subject = subject.calc(scope)?;
                for case in cases {
                    for value in &case.values {
                        let candidate = value.calc(scope)?;
                        if subject.equals(&candidate).map_err(|e| e.at(*span))? {
                            return case.body.exec(&scope.child(), ctl);
                        }
                    }
                }
                if let Some(default) = default {
                    default.exec(&scope.child(), ctl)?;
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                while condition.calc(scope)?.is_truthy() {
                    body.exec(&scope.child(), ctl)?;
                    if ctl.end_iteration() {
                        break;
                    }
                }
            }
            Stmt::For {
                target,
                iterable,
                body,
                span,
            } => {
                let iterable = iterable.calc(scope)?;
                let mut iter = ValueIter::new(iterable).map_err(|e| e.at(*span))?;
                while let Some(value) = iter.next_value().map_err(|e| e.at(*span))? {
                    let inner = scope.child();
                    bind(target, value, &inner, Binding::Declare)?;
                    body.exec(&inner, ctl)?;
                    if ctl.end_iteration() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

// ==================== Expressions ====================

impl Expr {
    pub fn calc(&self, scope: &Scope) -> Result<Value> {
        ensure_sufficient_stack(|| self.eval(scope))
    }

    fn eval(&self, scope: &Scope) -> Result<Value> {
        match self {
            Expr::Number { value, .. } => Ok(Value::Number(*value)),
            Expr::String { value, .. } => Ok(Value::String(value.clone())),
            Expr::Template {
                fragments, parts, ..
            } => {
                let mut out = String::new();
                for (i, fragment) in fragments.iter().enumerate() {
                    out.push_str(fragment);
                    if let Some(part) = parts.get(i) {
                        out.push_str(&part.calc(scope)?.to_display()?);
                    }
                }
                Ok(Value::string(out))
            }
            Expr::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expr::Null { .. } => Ok(Value::Null),
            Expr::Local { .. } => Ok(Value::Object(scope.object().clone())),
            Expr::Ident { name, span } => scope.lookup(name).map_err(|e| e.at(*span)),
            Expr::Prop {
                object,
                name,
                optional,
                span,
            } => {
                let target = object.calc(scope)?;
                match target.get_prop(name) {
                    Some(value) => Ok(value),
                    None if *optional => Ok(Value::Null),
                    None => Err(JuaError::new(ErrorKind::UndefinedProperty(name.to_string()), Some(*span))
                        .with_value(target)),
                }
            }
            Expr::Method { object, name, span } => {
                let target = object.calc(scope)?;
                let method = method_of(&target, name, *span)?;
                Ok(Value::native(name, move |args| {
                    let mut full = Vec::with_capacity(args.len() + 1);
                    full.push(target.clone());
                    full.append(args);
                    method.call(full)
                }))
            }
            Expr::Unary { op, operand, span } => {
                let value = operand.calc(scope)?;
                apply_unary(*op, &value).map_err(|e| e.at(*span))
            }
            Expr::Binary {
                left,
                op,
                right,
                span,
            } => {
                let left = left.calc(scope)?;
                match op {
                    BinaryOp::And if !left.is_truthy() => Ok(left),
                    BinaryOp::Or if left.is_truthy() => Ok(left),
                    BinaryOp::And | BinaryOp::Or => right.calc(scope),
                    _ => {
                        let right = right.calc(scope)?;
                        apply_binary(*op, &left, &right).map_err(|e| e.at(*span))
                    }
                }
            }
            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                if condition.calc(scope)?.is_truthy() {
                    then_expr.calc(scope)
                } else {
                    else_expr.calc(scope)
                }
            }
            Expr::Call { callee, args, span } => {
                let (function, mut values) = match &**callee {
                    // obj:name(...) passes obj first
                    Expr::Method { object, name, span } => {
                        let target = object.calc(scope)?;
                        let method = method_of(&target, name, *span)?;
                        (method, vec![target])
                    }
                    other => (other.calc(scope)?, Vec::with_capacity(args.len())),
                };
                for arg in args {
                    values.push(arg.calc(scope)?);
                }
                function.call(values).map_err(|e| e.at(*span))
            }
            Expr::Index {
                object,
                index,
                span,
            } => {
                let target = object.calc(scope)?;
                let key = index.calc(scope)?;
                target.get_item(&key).map_err(|e| e.at(*span))
            }
            Expr::Object { entries, .. } => {
                let obj = ObjRef::new(None);
                for (key, value) in entries {
                    let key = prop_key(key, scope)?;
                    obj.set_own(&key, value.calc(scope)?);
                }
                Ok(Value::Object(obj))
            }
            Expr::Array { items, .. } => {
                let values = items
                    .iter()
                    .map(|item| item.calc(scope))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::array(values))
            }
            Expr::Function { func, .. } => {
                Ok(Value::Function(FuncRef::script(scope.clone(), func.clone())))
            }
            Expr::Assign {
                target,
                op,
                value,
                span,
            } => assign(target, *op, value, scope).map_err(|e| e.at(*span)),
        }
    }
}

fn method_of(target: &Value, name: &str, span: Span) -> Result<Value> {
    target.get_prop(name).ok_or_else(|| {
        JuaError::new(ErrorKind::UndefinedProperty(name.to_string()), Some(span))
            .with_value(target.clone())
    })
}

fn prop_key(key: &PropKey, scope: &Scope) -> Result<Rc<str>> {
    match key {
        PropKey::Name(name) => Ok(name.clone()),
        PropKey::Computed(expr) => match expr.calc(scope)? {
            Value::String(s) => Ok(s),
            other => Err(JuaError::type_error("property key must be a string")
                .at(expr.span())
                .with_value(other)),
        },
    }
}

// ==================== Assignment ====================

/// A resolved assignment target; object and key are evaluated once
enum Place {
    Var(Rc<str>),
    Prop(Value, Rc<str>),
    Item(Value, Value),
}

impl Place {
    fn resolve(target: &Target, scope: &Scope) -> Result<Self> {
        match target {
            Target::Ident { name, .. } => Ok(Place::Var(name.clone())),
            Target::Prop { object, name, .. } => Ok(Place::Prop(object.calc(scope)?, name.clone())),
            Target::Index { object, index, .. } => {
                Ok(Place::Item(object.calc(scope)?, index.calc(scope)?))
            }
            Target::Pattern(_) => Err(ErrorKind::InvalidAssignmentTarget.into()),
        }
    }

    fn get(&self, scope: &Scope) -> Result<Value> {
        match self {
            Place::Var(name) => scope.lookup(name),
            Place::Prop(object, name) => object.get_prop(name).ok_or_else(|| {
                JuaError::new(ErrorKind::UndefinedProperty(name.to_string()), None)
                    .with_value(object.clone())
            }),
            Place::Item(object, key) => object.get_item(key),
        }
    }

    fn set(&self, scope: &Scope, value: Value) -> Result<()> {
        match self {
            Place::Var(name) => scope.assign(name, value),
            Place::Prop(object, name) => object.set_prop(name, value),
            Place::Item(object, key) => object.set_item(key, value),
        }
    }
}

fn assign(target: &Target, op: Option<BinaryOp>, value: &Expr, scope: &Scope) -> Result<Value> {
    if let Target::Pattern(pattern) = target {
        let value = value.calc(scope)?;
        bind(pattern, value.clone(), scope, Binding::Assign)?;
        return Ok(value);
    }

    let place = Place::resolve(target, scope)?;
    let result = match op {
        None => value.calc(scope)?,
        Some(op) => {
            let current = place.get(scope)?;
            match op {
                // a short-circuited `&&=` / `||=` leaves the target alone
                BinaryOp::And if !current.is_truthy() => return Ok(current),
                BinaryOp::Or if current.is_truthy() => return Ok(current),
                BinaryOp::And | BinaryOp::Or => value.calc(scope)?,
                op => apply_binary(op, &current, &value.calc(scope)?)?,
            }
        }
    };
    place.set(scope, result.clone())?;
    Ok(result)
}

// ==================== Declarations ====================

/// Whether names are created in the current scope or rebound where declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Declare,
    Assign,
}

pub fn bind(target: &Declarable, value: Value, scope: &Scope, mode: Binding) -> Result<()> {
    match target {
        Declarable::Name { name, span } => match mode {
            Binding::Declare => {
                scope.declare(name, value);
                Ok(())
            }
            Binding::Assign => scope.assign(name, value).map_err(|e| e.at(*span)),
        },
        Declarable::List(list) => {
            let items = match &value {
                Value::Object(obj) => obj.items().map(|items| items.borrow().clone()),
                _ => None,
            };
            match items {
                Some(items) => bind_list(list, items, scope, mode),
                None => Err(JuaError::type_error(format!(
                    "cannot destructure {} as a list",
                    value.type_name()
                ))
                .at(list.span)
                .with_value(value)),
            }
        }
        Declarable::Object(pattern) => bind_object(pattern, &value, scope, mode),
    }
}

/// Bind positional values. A missing value takes the item's default,
/// evaluated in `scope` after the items before it are bound.
pub fn bind_list(
    list: &DeclarationList,
    values: Vec<Value>,
    scope: &Scope,
    mode: Binding,
) -> Result<()> {
    let mut values = values.into_iter();
    for (i, item) in list.items.iter().enumerate() {
        let value = match (values.next(), &item.default) {
            (Some(value), _) => value,
            (None, Some(default)) => default.calc(scope)?,
            (None, None) => {
                let what = match &item.target {
                    Declarable::Name { name, .. } => name.to_string(),
                    _ => format!("#{}", i + 1),
                };
                return Err(JuaError::new(
                    ErrorKind::MissingArgument(what),
                    Some(item.target.span()),
                ));
            }
        };
        bind(&item.target, value, scope, mode)?;
    }
    Ok(())
}

fn bind_object(pattern: &ObjectPattern, value: &Value, scope: &Scope, mode: Binding) -> Result<()> {
    for prop in &pattern.props {
        let key = prop_key(&prop.key, scope)?;
        let found = match value.get_prop(&key) {
            Some(found) => found,
            None => match &prop.default {
                Some(default) => default.calc(scope)?,
                None => {
                    return Err(JuaError::reference(format!("cannot read property '{}'", key))
                        .at(prop.target.span())
                        .with_value(value.clone()))
                }
            },
        };
        bind(&prop.target, found, scope, mode)?;
    }
    Ok(())
}

// ==================== Iteration ====================

/// Source of values for `for (x in target)`
pub enum ValueIter {
    /// `next(target, key)` found on the prototype
    Custom {
        target: Value,
        next: FuncRef,
        key: Value,
    },
    /// Live view: items pushed during the loop are visited
    Items { array: ObjRef, index: usize },
    Bytes { buffer: ObjRef, index: usize },
    /// Own keys, snapshotted when the loop starts
    Keys(std::vec::IntoIter<Rc<str>>),
}

impl ValueIter {
    pub fn new(target: Value) -> Result<Self> {
        if let Some(next) = target.meta_method("next") {
            return Ok(ValueIter::Custom {
                target,
                next,
                key: Value::Null,
            });
        }
        match &target {
            Value::Object(obj) => Ok(match obj.kind() {
                ObjectKind::Array(_) => ValueIter::Items {
                    array: obj.clone(),
                    index: 0,
                },
                ObjectKind::Buffer(_) => ValueIter::Bytes {
                    buffer: obj.clone(),
                    index: 0,
                },
                _ => ValueIter::Keys(obj.keys().into_iter()),
            }),
            other => Err(JuaError::type_error(format!("{} is not iterable", other.type_name()))
                .with_value(other.clone())),
        }
    }

    pub fn next_value(&mut self) -> Result<Option<Value>> {
        match self {
            ValueIter::Custom { target, next, key } => {
                let result = next.call(vec![target.clone(), key.clone()])?;
                let Value::Object(step) = &result else {
                    return Err(JuaError::type_error("iterator result must be an object")
                        .with_value(result.clone()));
                };
                match step.get_own("done") {
                    Some(Value::Bool(true)) => return Ok(None),
                    Some(Value::Bool(false)) => {}
                    _ => {
                        return Err(JuaError::type_error("iterator result needs a boolean 'done'")
                            .with_value(result.clone()))
                    }
                }
                *key = step.get_own("key").unwrap_or(Value::Null);
                Ok(Some(step.get_own("value").unwrap_or(Value::Null)))
            }
            ValueIter::Items { array, index } => {
                let item = array
                    .items()
                    .and_then(|items| items.borrow().get(*index).cloned());
                *index += 1;
                Ok(item)
            }
            ValueIter::Bytes { buffer, index } => {
                let byte = buffer
                    .bytes()
                    .and_then(|bytes| bytes.borrow().get(*index).copied());
                *index += 1;
                Ok(byte.map(|b| Value::Number(f64::from(b))))
            }
            ValueIter::Keys(keys) => Ok(keys.next().map(Value::String)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_expression, parse_program};

    fn eval(source: &str) -> Value {
        let func = parse_program(source, "test").unwrap();
        let scope = Scope::global();
        let mut ctl = Controller::default();
        func.body.exec(&scope, &mut ctl).unwrap();
        ctl.returning.unwrap_or(Value::Null)
    }

    fn calc(source: &str) -> Result<Value> {
        parse_expression(source)?.calc(&Scope::global())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(calc("2 + 3 * 4").unwrap(), Value::Number(14.0));
        assert_eq!(calc("2 * 3 + 4").unwrap(), Value::Number(10.0));
        assert_eq!(calc("2 ^ 3 ^ 2").unwrap(), Value::Number(64.0));
    }

    #[test]
    fn test_short_circuit() {
        assert_eq!(calc("false && missing").unwrap(), Value::Bool(false));
        assert_eq!(calc("true || missing").unwrap(), Value::Bool(true));
        assert_eq!(calc("null || 'x'").unwrap(), Value::string("x"));
    }

    #[test]
    fn test_loop_signals() {
        let result = eval(
            "let total = 0
             let i = 0
             while (true) {
                 i += 1
                 if (i > 10) break
                 if (i % 2 == 0) continue
                 total += i
             }
             return total",
        );
        assert_eq!(result, Value::Number(25.0));
    }

    #[test]
    fn test_return_stops_loop() {
        let result = eval(
            "fun find() { let i = 0; while (true) { i += 1; if (i == 3) return i; } }
             return find()",
        );
        assert_eq!(result, Value::Number(3.0));
    }

    #[test]
    fn test_declaration_defaults() {
        let result = eval(
            "fun f(a, b = a * 2) = b
             return f(4)",
        );
        assert_eq!(result, Value::Number(8.0));
    }

    #[test]
    fn test_missing_argument() {
        let func = parse_program("fun f(a) = a\nf()", "test").unwrap();
        let err = func
            .body
            .exec(&Scope::global(), &mut Controller::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingArgument("a".into()));
    }

    #[test]
    fn test_depth_limit() {
        let func = parse_program("fun f(n) = f(n + 1)\nf(0)", "test").unwrap();
        let err = with_call_limit(20, || {
            func.body
                .exec(&Scope::global(), &mut Controller::default())
                .unwrap_err()
        });
        assert_eq!(err.kind, ErrorKind::StackOverflow);
        assert_eq!(call_depth(), 0);
        assert_eq!(MAX_CALL_DEPTH.with(Cell::get), DEFAULT_MAX_CALL_DEPTH);
    }

    #[test]
    fn test_call_limits_nest() {
        let inner = with_call_limit(50, || with_call_limit(7, || MAX_CALL_DEPTH.with(Cell::get)));
        assert_eq!(inner, 7);
        let outer = with_call_limit(50, || {
            with_call_limit(7, || ());
            MAX_CALL_DEPTH.with(Cell::get)
        });
        assert_eq!(outer, 50);
    }

    #[test]
    fn test_deep_recursion_under_default_limit() {
        let result = eval(
            "fun sum(n) = if (n == 0) 0 else n + sum(n - 1)
             return sum(3000)",
        );
        assert_eq!(result, Value::Number(4_501_500.0));
    }
}
