//! Operators and their priorities
//!
//! Built-in behaviour covers numbers and strings. Everything else goes to a
//! metamethod found on the operand's prototype.

use crate::error::{JuaError, Result};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "-" => Some(UnaryOp::Neg),
            "!" => Some(UnaryOp::Not),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Pow,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Range,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Is,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "^" => BinaryOp::Pow,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            ".." => BinaryOp::Range,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "in" => BinaryOp::In,
            "is" => BinaryOp::Is,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }

    /// Operator behind a compound assigner such as `+=`
    pub fn from_assigner(assigner: &str) -> Option<Self> {
        assigner.strip_suffix('=').and_then(Self::from_symbol)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Pow => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Range => "..",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::Is => "is",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Higher binds tighter
    pub fn priority(self) -> u8 {
        match self {
            BinaryOp::Pow => 13,
            BinaryOp::Mul | BinaryOp::Div => 12,
            BinaryOp::Mod => 11,
            BinaryOp::Add | BinaryOp::Sub => 10,
            BinaryOp::Range => 8,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::In | BinaryOp::Is => 6,
            BinaryOp::Eq | BinaryOp::Ne => 5,
            BinaryOp::And => 4,
            BinaryOp::Or => 3,
        }
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    fn metamethod(self) -> &'static str {
        match self {
            BinaryOp::Pow => "__pow",
            BinaryOp::Mul => "__mul",
            BinaryOp::Div => "__div",
            BinaryOp::Mod => "__mod",
            BinaryOp::Add => "__add",
            BinaryOp::Sub => "__sub",
            BinaryOp::Range => "range",
            BinaryOp::Lt | BinaryOp::Ge => "__lt",
            BinaryOp::Le | BinaryOp::Gt => "__le",
            BinaryOp::Eq | BinaryOp::Ne => "__eq",
            BinaryOp::In => "hasItem",
            BinaryOp::Is | BinaryOp::And | BinaryOp::Or => "",
        }
    }
}

pub fn apply_unary(op: UnaryOp, value: &Value) -> Result<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Neg => match value {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => match other.meta_method("__unm") {
                Some(f) => f.call(vec![other.clone()]),
                None => Err(JuaError::type_error(format!("cannot negate {}", other.type_name()))
                    .with_value(other.clone())),
            },
        },
    }
}

/// Apply an operator whose operands are both evaluated. `&&` and `||` are
/// handled by the evaluator so their right side can be skipped.
pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    use BinaryOp::*;

    match op {
        Add | Sub | Mul | Div | Mod | Pow => arithmetic(op, left, right),
        Lt | Le => compare(op, left, right),
        Gt | Ge => {
            let inverse = if op == Gt { Le } else { Lt };
            let result = compare(inverse, left, right)?;
            Ok(Value::Bool(!result.is_truthy()))
        }
        Eq => Ok(Value::Bool(left.equals(right)?)),
        Ne => Ok(Value::Bool(!left.equals(right)?)),
        Range => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(crate::builtins::range(*a, *b)),
            _ => binary_meta(op, left, right, false),
        },
        In => Ok(Value::Bool(right.has_item(left)?)),
        Is => Ok(Value::Bool(left.is_instance_of(right))),
        And | Or => Err(JuaError::type_error(format!(
            "'{}' must be evaluated lazily",
            op.symbol()
        ))),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let n = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Mod => a % b,
                _ => a.powf(*b),
            };
            Ok(Value::Number(n))
        }
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::string(joined))
        }
        _ => binary_meta(op, left, right, true),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let strict = op == BinaryOp::Lt;
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(if strict { a < b } else { a <= b })),
        (Value::String(a), Value::String(b)) => Ok(Value::Bool(if strict { a < b } else { a <= b })),
        _ => binary_meta(op, left, right, false),
    }
}

/// Dispatch to the left operand's metamethod, then optionally the right's.
/// Either way the call receives `(left, right)`.
fn binary_meta(op: BinaryOp, left: &Value, right: &Value, try_right: bool) -> Result<Value> {
    let name = op.metamethod();
    let method = left
        .meta_method(name)
        .or_else(|| if try_right { right.meta_method(name) } else { None });
    match method {
        Some(f) => f.call(vec![left.clone(), right.clone()]),
        None => Err(JuaError::type_error(format!(
            "unsupported operand types for '{}': {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
        .with_value(left.clone())),
    }
}
