//! Lexer for Jua
//!
//! `Lexer` reads source text lazily with one token of lookahead. Bracket
//! pairs are read eagerly into enclosure tokens, and the parser walks their
//! contents through `TokenList`. Both sides implement `TokenStream`.

use crate::error::{ErrorKind, JuaError, Result};
use crate::stack::ensure_sufficient_stack;
use crate::token::{is_symbol_char, lookup_symbol, Span, Token, TokenKind};
use std::iter::Peekable;
use std::str::CharIndices;

/// A source of tokens with single-token lookahead
pub trait TokenStream {
    /// Next token, or `None` once the input is exhausted
    fn next_token(&mut self) -> Result<Option<Token>>;

    /// Look at the next token without consuming it
    fn peek_token(&mut self) -> Result<Option<&Token>>;

    /// Location reported for errors about missing input
    fn end_span(&self) -> Span;

    /// Next token, failing at end of input
    fn read(&mut self) -> Result<Token> {
        match self.next_token()? {
            Some(token) => Ok(token),
            None => Err(JuaError::syntax(ErrorKind::UnexpectedEnd, self.end_span())),
        }
    }

    fn at_end(&mut self) -> Result<bool> {
        Ok(self.peek_token()?.is_none())
    }

    fn peek_separator(&mut self, sep: &str) -> Result<bool> {
        Ok(self.peek_token()?.is_some_and(|t| t.is_separator(sep)))
    }

    fn peek_word(&mut self, word: &str) -> Result<bool> {
        Ok(self.peek_token()?.is_some_and(|t| t.is_word(word)))
    }

    /// Consume the separator if it is next
    fn skip_separator(&mut self, sep: &str) -> Result<bool> {
        if self.peek_separator(sep)? {
            self.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_separator(&mut self, sep: &str) -> Result<Token> {
        let token = self.read()?;
        if token.is_separator(sep) {
            Ok(token)
        } else {
            Err(JuaError::syntax(
                ErrorKind::ExpectedToken(sep.to_string(), token.to_string()),
                token.span,
            ))
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<Token> {
        let token = self.read()?;
        if token.is_word(word) {
            Ok(token)
        } else {
            Err(JuaError::syntax(
                ErrorKind::ExpectedToken(word.to_string(), token.to_string()),
                token.span,
            ))
        }
    }

    /// Fail unless every token has been consumed
    fn expect_end(&mut self) -> Result<()> {
        match self.next_token()? {
            None => Ok(()),
            Some(token) => Err(unexpected(&token)),
        }
    }
}

pub fn unexpected(token: &Token) -> JuaError {
    JuaError::syntax(ErrorKind::UnexpectedToken(token.to_string()), token.span)
}

/// Deepest allowed nesting of `()`, `[]` and `{}`, template splices included
pub const MAX_NESTING: usize = 1024;

/// The lexer state
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    column: usize,
    cache: Option<Token>,
    /// Enclosures currently open
    depth: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer from source code
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
            cache: None,
            depth: 0,
        }
    }

    /// Tokenize the entire source
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn scan_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace_and_comments()?;

        let Some(ch) = self.peek_char() else {
            return Ok(None);
        };
        let open = self.here();

        let kind = match ch {
            '\'' => {
                self.advance();
                self.scan_string(open)?
            }
            '"' => {
                self.advance();
                self.scan_template(open)?
            }
            '`' => {
                self.advance();
                self.scan_raw_string(open)?
            }
            c if c.is_ascii_digit() => self.scan_number(open)?,
            c if c.is_ascii_alphabetic() || c == '_' => TokenKind::Word(self.scan_identifier()),
            c if is_symbol_char(c) => self.scan_symbol(open)?,
            c => {
                self.advance();
                return Err(JuaError::syntax(ErrorKind::UnexpectedCharacter(c), open));
            }
        };

        Ok(Some(Token::new(kind, self.span_from(open))))
    }

    /// Advance and return the current character
    fn advance(&mut self) -> Option<char> {
        let (pos, ch) = self.chars.next()?;
        self.current_pos = pos + ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Peek at the next character without advancing
    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn rest(&self) -> &'a str {
        &self.source[self.current_pos..]
    }

    fn peek_byte_is_digit(&self, offset: usize) -> bool {
        self.rest()
            .as_bytes()
            .get(offset)
            .is_some_and(u8::is_ascii_digit)
    }

    fn here(&self) -> Span {
        Span::new(self.current_pos, self.current_pos, self.line, self.column)
    }

    fn span_from(&self, open: Span) -> Span {
        Span::new(open.start, self.current_pos, open.line, open.column)
    }

    /// Skip whitespace and both comment forms
    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.rest().starts_with("//") => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.rest().starts_with("/*") => {
                    let open = self.here();
                    self.advance();
                    self.advance();
                    // first `*/` closes, no nesting
                    loop {
                        if self.rest().starts_with("*/") {
                            self.advance();
                            self.advance();
                            break;
                        }
                        if self.advance().is_none() {
                            return Err(JuaError::syntax(ErrorKind::Unterminated("comment"), open));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Longest match: three characters, then two, then one
    fn scan_symbol(&mut self, open: Span) -> Result<TokenKind> {
        for len in [3, 2] {
            if let Some(kind) = self.rest().get(..len).and_then(lookup_symbol) {
                for _ in 0..len {
                    self.advance();
                }
                return Ok(kind);
            }
        }

        let Some(c) = self.advance() else {
            return Err(JuaError::syntax(ErrorKind::UnexpectedEnd, open));
        };
        match c {
            '(' => Ok(TokenKind::Paren(self.scan_enclosure(')', open)?)),
            '[' => Ok(TokenKind::Bracket(self.scan_enclosure(']', open)?)),
            '{' => Ok(TokenKind::Brace(self.scan_enclosure('}', open)?)),
            _ => {
                let mut buf = [0u8; 4];
                lookup_symbol(c.encode_utf8(&mut buf))
                    .ok_or_else(|| JuaError::syntax(ErrorKind::UnexpectedCharacter(c), open))
            }
        }
    }

    /// Read tokens up to and including `close`
    fn scan_enclosure(&mut self, close: char, open: Span) -> Result<Vec<Token>> {
        if self.depth >= MAX_NESTING {
            return Err(JuaError::syntax(ErrorKind::NestingTooDeep(MAX_NESTING), open));
        }
        self.depth += 1;
        let tokens = ensure_sufficient_stack(|| self.scan_enclosed(close, open));
        self.depth -= 1;
        tokens
    }

    fn scan_enclosed(&mut self, close: char, open: Span) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;
            match self.peek_char() {
                None => return Err(JuaError::syntax(ErrorKind::MissingClose(close), open)),
                Some(c) if c == close => {
                    self.advance();
                    return Ok(tokens);
                }
                Some(_) => {
                    if let Some(token) = self.scan_token()? {
                        tokens.push(token);
                    }
                }
            }
        }
    }

    fn scan_number(&mut self, open: Span) -> Result<TokenKind> {
        let source = self.source;
        let start = self.current_pos;

        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.advance();
            self.advance();
            let digits_start = self.current_pos;
            while matches!(self.peek_char(), Some(c) if c.is_ascii_hexdigit()) {
                self.advance();
            }
            let digits = &source[digits_start..self.current_pos];
            return u64::from_str_radix(digits, 16)
                .map(|n| TokenKind::Number(n as f64))
                .map_err(|_| {
                    JuaError::syntax(
                        ErrorKind::InvalidNumber(source[start..self.current_pos].to_string()),
                        open,
                    )
                });
        }

        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        // `1..5` is a range, not a fraction
        if self.peek_char() == Some('.') && self.peek_byte_is_digit(1) {
            self.advance();
            while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        if matches!(self.peek_char(), Some('e' | 'E')) {
            let sign = matches!(self.rest().as_bytes().get(1), Some(b'+' | b'-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_byte_is_digit(digit_at) {
                for _ in 0..digit_at {
                    self.advance();
                }
                while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = &source[start..self.current_pos];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| JuaError::syntax(ErrorKind::InvalidNumber(text.to_string()), open))
    }

    fn scan_identifier(&mut self) -> String {
        let source = self.source;
        let start = self.current_pos;
        while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        source[start..self.current_pos].to_string()
    }

    /// Single-quoted string, opening quote already consumed
    fn scan_string(&mut self, open: Span) -> Result<TokenKind> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(JuaError::syntax(ErrorKind::Unterminated("string"), open))
                }
                Some('\'') => return Ok(TokenKind::Str(value)),
                Some('\\') => {
                    if let Some(c) = self.scan_escape(open)? {
                        value.push(c);
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn scan_raw_string(&mut self, open: Span) -> Result<TokenKind> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(JuaError::syntax(ErrorKind::Unterminated("raw string"), open)),
                Some('`') => return Ok(TokenKind::RawStr(value)),
                Some(c) => value.push(c),
            }
        }
    }

    /// Double-quoted template, opening quote already consumed
    fn scan_template(&mut self, open: Span) -> Result<TokenKind> {
        let mut fragments = Vec::new();
        let mut splices = Vec::new();
        let mut current = String::new();
        loop {
            match self.advance() {
                None => return Err(JuaError::syntax(ErrorKind::Unterminated("string"), open)),
                Some('"') => {
                    fragments.push(current);
                    return Ok(TokenKind::Template(fragments, splices));
                }
                Some('\\') => {
                    if let Some(c) = self.scan_escape(open)? {
                        current.push(c);
                    }
                }
                Some('$') => {
                    let mark = self.here();
                    let splice = match self.peek_char() {
                        Some('{') => {
                            self.advance();
                            TokenKind::Brace(self.scan_enclosure('}', mark)?)
                        }
                        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                            TokenKind::Word(self.scan_identifier())
                        }
                        Some(c) => return Err(JuaError::syntax(ErrorKind::InvalidSplice(c), mark)),
                        None => return Err(JuaError::syntax(ErrorKind::Unterminated("string"), open)),
                    };
                    fragments.push(std::mem::take(&mut current));
                    splices.push(Token::new(splice, self.span_from(mark)));
                }
                Some(c) => current.push(c),
            }
        }
    }

    /// Escape sequence after a backslash. A backslash before a newline
    /// continues the literal on the next line.
    fn scan_escape(&mut self, open: Span) -> Result<Option<char>> {
        let Some(c) = self.advance() else {
            return Err(JuaError::syntax(ErrorKind::Unterminated("string"), open));
        };
        let resolved = match c {
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\x0b',
            '0' => '\0',
            'x' => {
                let byte = self
                    .rest()
                    .get(..2)
                    .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| {
                        JuaError::syntax(ErrorKind::Syntax("invalid \\x escape".into()), self.here())
                    })?;
                self.advance();
                self.advance();
                char::from(byte)
            }
            '\n' => return Ok(None),
            other => other,
        };
        Ok(Some(resolved))
    }
}

impl TokenStream for Lexer<'_> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.cache.take() {
            return Ok(Some(token));
        }
        self.scan_token()
    }

    fn peek_token(&mut self) -> Result<Option<&Token>> {
        if self.cache.is_none() {
            self.cache = self.scan_token()?;
        }
        Ok(self.cache.as_ref())
    }

    fn end_span(&self) -> Span {
        self.here()
    }
}

/// The pre-scanned contents of an enclosure
pub struct TokenList {
    tokens: Peekable<std::vec::IntoIter<Token>>,
    end: Span,
}

impl TokenList {
    pub fn new(tokens: Vec<Token>, end: Span) -> Self {
        Self {
            tokens: tokens.into_iter().peekable(),
            end,
        }
    }
}

impl TokenStream for TokenList {
    fn next_token(&mut self) -> Result<Option<Token>> {
        Ok(self.tokens.next())
    }

    fn peek_token(&mut self) -> Result<Option<&Token>> {
        Ok(self.tokens.peek())
    }

    fn end_span(&self) -> Span {
        self.end
    }
}
