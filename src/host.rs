//! Host services for the interpreter
//!
//! The interpreter never touches the file system or the process streams
//! directly: module sources, printed lines and uncaught errors all go
//! through a `Host`.

use crate::error::{ErrorKind, JuaError, Result};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub trait Host {
    /// Source text of the module called `name`
    fn find_module(&self, name: &str) -> Result<String>;

    /// One printed line, without its newline
    fn stdout(&self, line: &str);

    /// An error nothing in the script caught
    fn stderr(&self, err: &JuaError);
}

/// Modules from `<root>/<name>.<extension>`, output to the process streams
pub struct FsHost {
    root: PathBuf,
    extension: String,
}

impl FsHost {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        FsHost {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn module_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, self.extension))
    }
}

impl Default for FsHost {
    fn default() -> Self {
        FsHost::new(".", "jua")
    }
}

impl Host for FsHost {
    fn find_module(&self, name: &str) -> Result<String> {
        let path = self.module_path(name);
        fs::read_to_string(&path).map_err(|e| {
            debug!(module = name, path = %path.display(), error = %e, "module lookup failed");
            JuaError::new(ErrorKind::ModuleNotFound(name.to_string()), None)
        })
    }

    fn stdout(&self, line: &str) {
        println!("{}", line);
    }

    fn stderr(&self, err: &JuaError) {
        eprintln!("{}", err);
    }
}

/// Captures output and errors and serves modules from memory
#[derive(Default)]
pub struct BufferHost {
    output: RefCell<String>,
    errors: RefCell<Vec<String>>,
    modules: RefCell<FxHashMap<String, String>>,
}

impl BufferHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, name: &str, source: &str) -> Self {
        self.add_module(name, source);
        self
    }

    pub fn add_module(&self, name: &str, source: &str) {
        self.modules
            .borrow_mut()
            .insert(name.to_string(), source.to_string());
    }

    /// Everything printed so far, one line per `print`
    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    /// Uncaught errors in debug form
    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    pub fn clear(&self) {
        self.output.borrow_mut().clear();
        self.errors.borrow_mut().clear();
    }
}

impl Host for BufferHost {
    fn find_module(&self, name: &str) -> Result<String> {
        self.modules
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| JuaError::new(ErrorKind::ModuleNotFound(name.to_string()), None))
    }

    fn stdout(&self, line: &str) {
        let mut out = self.output.borrow_mut();
        out.push_str(line);
        out.push('\n');
    }

    fn stderr(&self, err: &JuaError) {
        self.errors.borrow_mut().push(err.debug_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_host_captures() {
        let host = BufferHost::new().with_module("util", "return 1");
        host.stdout("a\tb");
        host.stdout("c");
        assert_eq!(host.output(), "a\tb\nc\n");
        assert_eq!(host.find_module("util").unwrap(), "return 1");
        let err = host.find_module("nope").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ModuleNotFound("nope".into()));

        host.stderr(&JuaError::type_error("bad"));
        assert_eq!(host.errors(), vec!["TypeError: bad".to_string()]);
        host.clear();
        assert!(host.output().is_empty());
    }

    #[test]
    fn test_fs_host_path() {
        let host = FsHost::new("lib", "jua");
        assert_eq!(host.module_path("math2"), PathBuf::from("lib").join("math2.jua"));
    }
}
