//! Interpreter front end: global scope, host and module cache

use crate::ast::Stmt;
use crate::builtins::{install_globals, math_module};
use crate::config::Config;
use crate::error::{JuaError, Result};
use crate::host::{FsHost, Host};
use crate::interpreter::{with_call_limit, Controller};
use crate::parser::parse_program;
use crate::scope::Scope;
use crate::value::{FuncRef, Value};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, instrument};

/// State shared by everything one interpreter runs. Natives that need the
/// host hold it weakly.
pub struct Realm {
    global: Scope,
    host: Rc<dyn Host>,
    modules: RefCell<FxHashMap<String, Value>>,
    /// Source text of every unit evaluated so far, for error excerpts
    sources: RefCell<FxHashMap<Rc<str>, Rc<str>>>,
    max_call_depth: usize,
}

impl Realm {
    pub fn global(&self) -> &Scope {
        &self.global
    }

    pub fn host(&self) -> &dyn Host {
        &*self.host
    }

    /// Evaluate module `name` once; later calls return the cached exports.
    /// Import cycles are not detected and end in a stack overflow error.
    pub fn require(&self, name: &str) -> Result<Value> {
        if let Some(exports) = self.modules.borrow().get(name) {
            return Ok(exports.clone());
        }
        let source = self.host.find_module(name)?;
        debug!(module = name, bytes = source.len(), "loading module");
        let exports = self.eval(&source, name)?;
        self.modules
            .borrow_mut()
            .insert(name.to_string(), exports.clone());
        Ok(exports)
    }

    /// Run a source unit as a function whose scope is a child of the global one
    fn eval(&self, source: &str, name: &str) -> Result<Value> {
        let unit: Rc<str> = Rc::from(name);
        self.sources
            .borrow_mut()
            .insert(unit.clone(), Rc::from(source));
        let literal = parse_program(source, name).map_err(|e| e.in_unit(&unit))?;
        with_call_limit(self.max_call_depth, || {
            FuncRef::script(self.global.clone(), literal).call(Vec::new())
        })
    }

    /// Fill in the source line from the unit the error points into
    pub fn locate(&self, err: JuaError) -> JuaError {
        let source = err
            .unit
            .as_ref()
            .and_then(|unit| self.sources.borrow().get(unit).cloned());
        match source {
            Some(source) => err.with_source(&source),
            None => err,
        }
    }
}

pub struct Interpreter {
    realm: Rc<Realm>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Modules resolved on the file system under `config.module_root`
    pub fn with_config(config: Config) -> Self {
        let host = Rc::new(FsHost::new(
            config.module_root.clone(),
            config.module_extension.clone(),
        ));
        Self::with_host_and_config(host, config)
    }

    pub fn with_host(host: Rc<dyn Host>) -> Self {
        Self::with_host_and_config(host, Config::default())
    }

    pub fn with_host_and_config(host: Rc<dyn Host>, config: Config) -> Self {
        let mut modules = FxHashMap::default();
        modules.insert("math".to_string(), math_module());
        let realm = Rc::new(Realm {
            global: Scope::global(),
            host,
            modules: RefCell::new(modules),
            sources: RefCell::new(FxHashMap::default()),
            max_call_depth: config.max_call_depth,
        });
        install_globals(&realm);
        Interpreter { realm }
    }

    pub fn global(&self) -> &Scope {
        self.realm.global()
    }

    /// Bind a value in the global scope
    pub fn register(&self, name: &str, value: Value) {
        self.realm.global().declare(name, value);
    }

    pub fn register_native(
        &self,
        name: &str,
        func: impl Fn(&mut Vec<Value>) -> Result<Value> + 'static,
    ) {
        self.register(name, Value::native(name, func));
    }

    /// Evaluate a source unit and return its top-level `return` value
    #[instrument(level = "debug", skip(self, source))]
    pub fn eval(&self, source: &str, name: &str) -> Result<Value> {
        self.realm.eval(source, name).map_err(|e| self.realm.locate(e))
    }

    /// Evaluate directly in the global scope so declarations persist. A
    /// line that is one expression yields its value.
    pub fn eval_line(&self, line: &str) -> Result<Value> {
        let literal = parse_program(line, "<repl>")?;
        let global = self.realm.global();
        with_call_limit(self.realm.max_call_depth, || {
            if let [Stmt::Expr { expr }] = literal.body.statements.as_slice() {
                return expr.calc(global);
            }
            let mut ctl = Controller::default();
            literal.body.exec(global, &mut ctl)?;
            Ok(ctl.returning.take().unwrap_or(Value::Null))
        })
    }

    /// Evaluate, reporting any error to the host; true on success
    pub fn run(&self, source: &str, name: &str) -> bool {
        match self.eval(source, name) {
            Ok(_) => true,
            Err(e) => {
                self.realm.host().stderr(&e);
                false
            }
        }
    }

    /// Load a module through the host, reporting any error to the host
    pub fn run_module(&self, name: &str) -> bool {
        match self.require(name) {
            Ok(_) => true,
            Err(e) => {
                self.realm.host().stderr(&e);
                false
            }
        }
    }

    pub fn require(&self, name: &str) -> Result<Value> {
        with_call_limit(self.realm.max_call_depth, || self.realm.require(name))
            .map_err(|e| self.realm.locate(e))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    // Globals and cached modules hold closures over the global scope
    fn drop(&mut self) {
        let modules = std::mem::take(&mut *self.realm.modules.borrow_mut());
        drop(modules);
        self.realm.global().object().clear();
    }
}
