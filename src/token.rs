//! Token definitions for Jua
//!
//! Brackets never appear as standalone tokens. The lexer reads everything
//! between a matching pair eagerly and hands the parser a single enclosure
//! token holding the nested token list.

use std::fmt;

/// Location in source code for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self { start, end, line, column }
    }
}

/// Token types in Jua
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword
    Word(String),
    Number(f64),
    /// `'...'` with escapes already resolved
    Str(String),
    /// `` `...` `` taken verbatim
    RawStr(String),
    /// `"..."`: literal fragments interleaved with splices.
    /// A splice is either a `Word` (from `$name`) or a `Brace` (from `${...}`),
    /// and there is always exactly one more fragment than splices.
    Template(Vec<String>, Vec<Token>),
    Separator(&'static str),
    /// Unary or binary operator symbol. Whether `-` is negation or
    /// subtraction is decided by the parser from its position.
    Operator(&'static str),
    Paren(Vec<Token>),
    Bracket(Vec<Token>),
    Brace(Vec<Token>),
}

/// A token with its location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_separator(&self, sep: &str) -> bool {
        matches!(self.kind, TokenKind::Separator(s) if s == sep)
    }

    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w == word)
    }

    /// A word that is not reserved
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) if !is_keyword(w) => Some(w.as_str()),
            _ => None,
        }
    }

    /// The operator text if this token can sit between two operands.
    /// `in` and `is` are words but behave as binary operators.
    pub fn binary_symbol(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Operator(op) if BINARY_OPERATORS.contains(op) => Some(*op),
            TokenKind::Word(w) if w == "in" || w == "is" => Some(w.as_str()),
            _ => None,
        }
    }

    pub fn assigner(&self) -> Option<&'static str> {
        match self.kind {
            TokenKind::Separator(s) if ASSIGNERS.contains(&s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Word(w) => write!(f, "{}", w),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::Str(s) => write!(f, "'{}'", s),
            TokenKind::RawStr(s) => write!(f, "`{}`", s),
            TokenKind::Template(..) => write!(f, "\"...\""),
            TokenKind::Separator(s) | TokenKind::Operator(s) => write!(f, "{}", s),
            TokenKind::Paren(_) => write!(f, "(...)"),
            TokenKind::Bracket(_) => write!(f, "[...]"),
            TokenKind::Brace(_) => write!(f, "{{...}}"),
        }
    }
}

pub const KEYWORDS: &[&str] = &[
    "as", "break", "case", "continue", "else", "false", "for", "fun", "if", "in", "is", "let",
    "local", "null", "return", "switch", "true", "while",
];

pub const ASSIGNERS: &[&str] = &["=", "+=", "-=", "*=", "/=", "&&=", "||="];

pub const SEPARATORS: &[&str] = &[
    "(", ")", "[", "]", "{", "}", ".", ",", ":", ";", "?", "?.", "=", "+=", "-=", "*=", "/=",
    "&&=", "||=",
];

pub const UNARY_OPERATORS: &[&str] = &["-", "!"];

pub const BINARY_OPERATORS: &[&str] = &[
    "^", "*", "/", "%", "+", "-", "..", "<", "<=", ">", ">=", "==", "!=", "&&", "||",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Look up a symbol by its exact text. Separators win over operators,
/// so `=` is an assigner and never an operator.
pub fn lookup_symbol(text: &str) -> Option<TokenKind> {
    if let Some(sep) = SEPARATORS.iter().find(|s| **s == text) {
        return Some(TokenKind::Separator(*sep));
    }
    UNARY_OPERATORS
        .iter()
        .chain(BINARY_OPERATORS.iter())
        .find(|s| **s == text)
        .map(|op| TokenKind::Operator(*op))
}

/// Characters that can start a symbol
pub fn is_symbol_char(c: char) -> bool {
    SEPARATORS
        .iter()
        .chain(UNARY_OPERATORS.iter())
        .chain(BINARY_OPERATORS.iter())
        .any(|s| s.starts_with(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        assert_eq!(lookup_symbol("&&="), Some(TokenKind::Separator("&&=")));
        assert_eq!(lookup_symbol("&&"), Some(TokenKind::Operator("&&")));
        assert_eq!(lookup_symbol("-"), Some(TokenKind::Operator("-")));
        assert_eq!(lookup_symbol("?."), Some(TokenKind::Separator("?.")));
        assert_eq!(lookup_symbol("&"), None);
    }

    #[test]
    fn test_keywords() {
        assert!(is_keyword("fun"));
        assert!(is_keyword("local"));
        assert!(!is_keyword("print"));
    }

    #[test]
    fn test_binary_words() {
        let tok = Token::new(TokenKind::Word("in".into()), Span::default());
        assert_eq!(tok.binary_symbol(), Some("in"));
        assert_eq!(tok.as_name(), None);
    }
}
