//! Error types for Jua
//!
//! Every failure, from a stray character to a script-level `throw`, travels
//! through one `JuaError` so a native `try` boundary can catch any of them.

use crate::token::Span;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Error kinds in Jua
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Lexer errors
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unterminated {0}")]
    Unterminated(&'static str),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("missing '{0}'")]
    MissingClose(char),
    #[error("invalid character after '$': '{0}'")]
    InvalidSplice(char),
    #[error("brackets nested deeper than {0}")]
    NestingTooDeep(usize),

    // Parser errors
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("expected '{0}', got '{1}'")]
    ExpectedToken(String, String),
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("'{0}' outside of a loop")]
    StrayJump(&'static str),
    #[error("{0}")]
    Syntax(String),

    // Runtime errors
    #[error("variable '{0}' is not declared")]
    UndeclaredVariable(String),
    #[error("no property: {0}")]
    UndefinedProperty(String),
    #[error("missing argument: {0}")]
    MissingArgument(String),
    #[error("{0}")]
    Reference(String),
    #[error("{0}")]
    Type(String),
    #[error("{0}")]
    Range(String),
    #[error("stack overflow")]
    StackOverflow,
    /// Raised by the script through `throw`; the message is the display form
    /// of the thrown object, which travels as the attached value.
    #[error("{0}")]
    Thrown(String),

    // Module errors
    #[error("module not found: {0}")]
    ModuleNotFound(String),
}

impl ErrorKind {
    /// Script-visible error name
    pub fn category(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedCharacter(_)
            | ErrorKind::Unterminated(_)
            | ErrorKind::InvalidNumber(_)
            | ErrorKind::MissingClose(_)
            | ErrorKind::InvalidSplice(_)
            | ErrorKind::NestingTooDeep(_)
            | ErrorKind::UnexpectedToken(_)
            | ErrorKind::ExpectedToken(..)
            | ErrorKind::UnexpectedEnd
            | ErrorKind::InvalidAssignmentTarget
            | ErrorKind::StrayJump(_)
            | ErrorKind::Syntax(_) => "SyntaxError",
            ErrorKind::UndeclaredVariable(_)
            | ErrorKind::UndefinedProperty(_)
            | ErrorKind::Reference(_) => "ReferenceError",
            ErrorKind::MissingArgument(_) | ErrorKind::Type(_) => "TypeError",
            ErrorKind::Range(_) | ErrorKind::StackOverflow => "RangeError",
            ErrorKind::Thrown(_) | ErrorKind::ModuleNotFound(_) => "Error",
        }
    }

    pub fn is_syntax(&self) -> bool {
        self.category() == "SyntaxError"
    }
}

/// A Jua error with location information
#[derive(Debug, Clone)]
pub struct JuaError {
    pub kind: ErrorKind,
    pub span: Option<Span>,
    /// Source unit `span` points into
    pub unit: Option<Rc<str>>,
    pub source_line: Option<String>,
    /// Value attached for debugging, or the object raised by `throw`
    pub value: Option<Value>,
}

impl JuaError {
    pub fn new(kind: ErrorKind, span: Option<Span>) -> Self {
        Self {
            kind,
            span,
            unit: None,
            source_line: None,
            value: None,
        }
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type(msg.into()), None)
    }

    pub fn reference(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Reference(msg.into()), None)
    }

    pub fn range(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Range(msg.into()), None)
    }

    pub fn syntax(kind: ErrorKind, span: Span) -> Self {
        Self::new(kind, Some(span))
    }

    /// Error raised by script code carrying the thrown object
    pub fn thrown(value: Value, message: String) -> Self {
        Self::new(ErrorKind::Thrown(message), None).with_value(value)
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Attach a location unless a more precise one is already known
    pub fn at(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    /// Name the unit the location belongs to; the innermost unit wins
    pub fn in_unit(mut self, unit: &Rc<str>) -> Self {
        if self.span.is_some() && self.unit.is_none() {
            self.unit = Some(unit.clone());
        }
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        if self.source_line.is_some() {
            return self;
        }
        if let Some(span) = &self.span {
            if span.line > 0 {
                self.source_line = source.lines().nth(span.line - 1).map(str::to_string);
            }
        }
        self
    }

    pub fn category(&self) -> &'static str {
        self.kind.category()
    }

    /// Script-side view of the error: the thrown object itself, or a fresh
    /// `Error` instance named after the category.
    pub fn to_value(&self) -> Value {
        crate::builtins::error_object(self)
    }

    /// Message as it reaches the stderr sink: the plain message, the message
    /// plus the attached value, or a syntax error with its position.
    pub fn debug_string(&self) -> String {
        if let ErrorKind::Thrown(msg) = &self.kind {
            return msg.clone();
        }
        let mut out = format!("{}: {}", self.category(), self.kind);
        if self.kind.is_syntax() {
            if let Some(span) = &self.span {
                out.push_str(&format!(" (line {}, column {}, offset {})", span.line, span.column, span.start));
            }
        }
        if let Some(value) = &self.value {
            out.push_str("\n\twith value: ");
            out.push_str(&value.safe_string());
        }
        out
    }
}

impl fmt::Display for JuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            ErrorKind::Thrown(msg) => msg.clone(),
            kind => format!("{}: {}", self.category(), kind),
        };
        if let Some(span) = &self.span {
            write!(f, "[line {}:{}] {}", span.line, span.column, message)?;
        } else {
            write!(f, "{}", message)?;
        }
        if let (Some(value), false) = (&self.value, matches!(self.kind, ErrorKind::Thrown(_))) {
            write!(f, "\n\twith value: {}", value.safe_string())?;
        }
        if let (Some(span), Some(line)) = (&self.span, &self.source_line) {
            write!(f, "\n  | {}", line)?;
            write!(f, "\n  | {}^", " ".repeat(span.column.saturating_sub(1)))?;
        }
        Ok(())
    }
}

impl std::error::Error for JuaError {}

impl From<ErrorKind> for JuaError {
    fn from(kind: ErrorKind) -> Self {
        JuaError::new(kind, None)
    }
}

/// Result type for Jua operations
pub type Result<T> = std::result::Result<T, JuaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(ErrorKind::UnexpectedEnd.category(), "SyntaxError");
        assert_eq!(ErrorKind::UndeclaredVariable("x".into()).category(), "ReferenceError");
        assert_eq!(ErrorKind::StackOverflow.category(), "RangeError");
        assert_eq!(ErrorKind::Type("bad".into()).category(), "TypeError");
    }

    #[test]
    fn test_debug_string_with_value() {
        let err = JuaError::type_error("cannot add").with_value(Value::Number(1.5));
        assert_eq!(err.debug_string(), "TypeError: cannot add\n\twith value: 1.5");
    }

    #[test]
    fn test_syntax_position() {
        let err = JuaError::syntax(ErrorKind::UnexpectedEnd, Span::new(4, 4, 2, 3));
        assert_eq!(
            err.debug_string(),
            "SyntaxError: unexpected end of input (line 2, column 3, offset 4)"
        );
    }

    #[test]
    fn test_with_source_caret() {
        let err = JuaError::reference("oops").at(Span::new(6, 7, 2, 3));
        let shown = err.with_source("let a\nb + c\n").to_string();
        assert!(shown.contains("[line 2:3] ReferenceError: oops"));
        assert!(shown.contains("  | b + c"));
        assert!(shown.ends_with("  |   ^"));
    }

    #[test]
    fn test_in_unit_keeps_innermost() {
        let inner: Rc<str> = Rc::from("lib");
        let outer: Rc<str> = Rc::from("main");
        let unplaced = JuaError::reference("oops").in_unit(&inner);
        assert_eq!(unplaced.unit, None);
        let err = JuaError::reference("oops")
            .at(Span::new(0, 1, 1, 1))
            .in_unit(&inner)
            .in_unit(&outer);
        assert_eq!(err.unit.as_deref(), Some("lib"));
    }
}
