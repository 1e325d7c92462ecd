//! Jua - a small prototype-based scripting language
//!
//! Source is lexed into tokens whose brackets already enclose their
//! contents, parsed into an AST and evaluated directly by walking it.

pub mod token;
pub mod lexer;
pub mod parser;
pub mod ast;
pub mod operator;
pub mod value;
pub mod scope;
pub mod interpreter;
pub mod builtins;
pub mod host;
pub mod config;
pub mod runtime;
pub mod error;
pub mod stack;

pub use config::Config;
pub use error::{ErrorKind, JuaError, Result};
pub use host::{BufferHost, FsHost, Host};
pub use lexer::Lexer;
pub use parser::{parse_expression, parse_program, Parser};
pub use runtime::Interpreter;
pub use scope::Scope;
pub use value::{ObjRef, Value};

/// Convenience function to run Jua code with a fresh interpreter
pub fn run(source: &str) -> Result<Value> {
    Interpreter::new().eval(source, "main")
}

/// Version of the Jua language
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
