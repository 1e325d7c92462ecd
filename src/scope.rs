//! Lexical scopes for Jua
//!
//! A scope is an ordinary object whose lookup continues in its parent
//! scope, so scripts can see it through `local` and `_G` like any object.

use crate::error::{ErrorKind, JuaError, Result};
use crate::value::{ObjRef, ObjectKind, Value};

/// Variable environment with lexical scoping
#[derive(Clone)]
pub struct Scope(ObjRef);

impl Scope {
    /// Create a new root scope
    pub fn global() -> Self {
        Scope(ObjRef::scope(None))
    }

    /// Create a child scope of `self`
    pub fn child(&self) -> Self {
        Scope(ObjRef::scope(Some(self.0.clone())))
    }

    /// Wrap an object if it is a scope
    pub fn from_object(obj: &ObjRef) -> Option<Self> {
        match obj.kind() {
            ObjectKind::Scope(_) => Some(Scope(obj.clone())),
            _ => None,
        }
    }

    pub fn object(&self) -> &ObjRef {
        &self.0
    }

    pub fn parent(&self) -> Option<Scope> {
        match self.0.kind() {
            ObjectKind::Scope(Some(parent)) => Some(Scope(parent.clone())),
            _ => None,
        }
    }

    /// Create or overwrite a binding in this scope
    pub fn declare(&self, name: &str, value: Value) {
        self.0.set_own(name, value);
    }

    pub fn lookup(&self, name: &str) -> Result<Value> {
        self.0
            .get_prop(name)
            .ok_or_else(|| JuaError::new(ErrorKind::UndeclaredVariable(name.to_string()), None))
    }

    /// Rebind `name` in the nearest scope that declares it
    pub fn assign(&self, name: &str, value: Value) -> Result<()> {
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            if scope.0.has_own(name) {
                scope.declare(name, value);
                return Ok(());
            }
            current = scope.parent();
        }
        Err(JuaError::reference(format!("Undeclared variable: {}", name)))
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        self.0.ptr_eq(&other.0)
    }
}
