//! Interpreter configuration

use crate::interpreter::DEFAULT_MAX_CALL_DEPTH;
use std::path::PathBuf;
use tracing::warn;

/// Directory searched by `require`
pub const PATH_VAR: &str = "JUA_PATH";
/// Nested call limit
pub const MAX_DEPTH_VAR: &str = "JUA_MAX_DEPTH";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Nested calls allowed before a `RangeError`
    pub max_call_depth: usize,
    pub module_root: PathBuf,
    /// File extension of module sources, without the dot
    pub module_extension: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            module_root: PathBuf::from("."),
            module_extension: "jua".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` finds; bad values are logged
    /// and ignored.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        if let Some(path) = lookup(PATH_VAR) {
            if path.trim().is_empty() {
                warn!(var = PATH_VAR, "empty module path, using default");
            } else {
                config.module_root = PathBuf::from(path);
            }
        }
        if let Some(depth) = lookup(MAX_DEPTH_VAR) {
            match depth.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_call_depth = n,
                _ => warn!(var = MAX_DEPTH_VAR, value = %depth, "invalid call depth, using default"),
            }
        }
        config
    }

    pub fn with_module_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.module_root = root.into();
        self
    }
}
