//! Runtime value types for Jua
//!
//! `Value` is a closed sum over the six language types. Objects and
//! functions are shared through `Rc`; every object carries an optional
//! prototype, and objects are further tagged as plain, array, buffer or
//! scope. Cross-type behaviour is decided here: built-in first, then a
//! metamethod looked up on the prototype.

use crate::ast::FunctionLiteral;
use crate::builtins::intrinsics;
use crate::error::{ErrorKind, JuaError, Result};
use crate::scope::Scope;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Hop limit when walking prototype, `super` or scope chains
const MAX_CHAIN: usize = 10_000;

/// Runtime values in Jua
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjRef),
    Function(FuncRef),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Object(ObjRef::array(items))
    }

    pub fn native(
        name: &str,
        func: impl Fn(&mut Vec<Value>) -> Result<Value> + 'static,
    ) -> Self {
        Value::Function(FuncRef::native(name, func))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Prototype used for inherited properties and metamethods
    pub fn proto(&self) -> Option<ObjRef> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(intrinsics().boolean.clone()),
            Value::Number(_) => Some(intrinsics().number.clone()),
            Value::String(_) => Some(intrinsics().string.clone()),
            Value::Function(_) => Some(intrinsics().function.clone()),
            Value::Object(obj) => obj.proto(),
        }
    }

    pub fn get_own(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.get_own(key),
            _ => None,
        }
    }

    /// Own property first, then the inheritance chain
    pub fn get_prop(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.get_prop(key),
            _ => self.inherit_prop(key),
        }
    }

    /// Skip own properties and look the key up where inheritance leads
    pub fn inherit_prop(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.inherit_prop(key),
            // primitives have no own `super`, so a class-tagged prototype ends the chain
            _ => {
                let proto = self.proto()?;
                if proto.is_class_tag() {
                    None
                } else {
                    proto.get_prop(key)
                }
            }
        }
    }

    pub fn set_prop(&self, key: &str, value: Value) -> Result<()> {
        match self {
            Value::Object(obj) => {
                obj.set_own(key, value);
                Ok(())
            }
            other => Err(JuaError::type_error(format!(
                "cannot set property '{}' on {}",
                key,
                other.type_name()
            ))),
        }
    }

    /// A function stored under `name` on the prototype, never the instance
    pub fn meta_method(&self, name: &str) -> Option<FuncRef> {
        match self.proto()?.get_prop(name)? {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Identity for objects and functions, value equality for primitives
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// `==`: `__eq` on the left operand when it has one, identity otherwise
    pub fn equals(&self, other: &Value) -> Result<bool> {
        match self {
            Value::Object(_) | Value::Function(_) => match self.meta_method("__eq") {
                Some(f) => Ok(f.call(vec![self.clone(), other.clone()])?.is_truthy()),
                None => Ok(self.identical(other)),
            },
            _ => Ok(self.identical(other)),
        }
    }

    /// `is`: the prototype is `klass` or a class deriving from it through `super`
    pub fn is_instance_of(&self, klass: &Value) -> bool {
        let Value::Object(klass) = klass else {
            return false;
        };
        match self.proto() {
            Some(proto) => proto.ptr_eq(klass) || proto.is_subclass_of(klass),
            None => false,
        }
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        match self {
            Value::Function(f) => f.call(args),
            other => match other.meta_method("__call") {
                Some(f) => {
                    let mut full = Vec::with_capacity(args.len() + 1);
                    full.push(other.clone());
                    full.extend(args);
                    f.call(full)
                }
                None => Err(JuaError::type_error(format!("{} is not callable", other.type_name()))
                    .with_value(other.clone())),
            },
        }
    }

    pub fn get_item(&self, key: &Value) -> Result<Value> {
        if let Value::Number(n) = key {
            match self {
                Value::Object(obj) => match &obj.0.kind {
                    ObjectKind::Array(items) => {
                        let items = items.borrow();
                        let i = wrap_index(*n, items.len())?;
                        return Ok(items[i].clone());
                    }
                    ObjectKind::Buffer(bytes) => {
                        let bytes = bytes.borrow();
                        let i = wrap_index(*n, bytes.len())?;
                        return Ok(Value::Number(f64::from(bytes[i])));
                    }
                    _ => {}
                },
                Value::String(s) => {
                    let i = wrap_index(*n, s.chars().count())?;
                    return s
                        .chars()
                        .nth(i)
                        .map(|c| Value::string(c.to_string()))
                        .ok_or_else(|| JuaError::range("string index out of range"));
                }
                _ => {}
            }
        }
        if let Some(f) = self.meta_method("getItem") {
            return f.call(vec![self.clone(), key.clone()]);
        }
        match (self, key) {
            (Value::Object(obj), Value::String(k)) => obj
                .get_prop(k)
                .ok_or_else(|| JuaError::new(ErrorKind::UndefinedProperty(k.to_string()), None)),
            _ => Err(JuaError::type_error(format!(
                "cannot index {} with {}",
                self.type_name(),
                key.type_name()
            ))),
        }
    }

    pub fn set_item(&self, key: &Value, value: Value) -> Result<()> {
        if let (Value::Object(obj), Value::Number(n)) = (self, key) {
            match &obj.0.kind {
                ObjectKind::Array(items) => {
                    let old = {
                        let mut items = items.borrow_mut();
                        let i = wrap_index(*n, items.len())?;
                        std::mem::replace(&mut items[i], value)
                    };
                    drop(old);
                    return Ok(());
                }
                ObjectKind::Buffer(bytes) => {
                    let Value::Number(byte) = value else {
                        return Err(JuaError::type_error("buffer items must be numbers")
                            .with_value(value));
                    };
                    let mut bytes = bytes.borrow_mut();
                    let i = wrap_index(*n, bytes.len())?;
                    bytes[i] = to_byte(byte);
                    return Ok(());
                }
                _ => {}
            }
        }
        if let Some(f) = self.meta_method("setItem") {
            f.call(vec![self.clone(), key.clone(), value])?;
            return Ok(());
        }
        match (self, key) {
            (Value::Object(obj), Value::String(k)) => {
                obj.set_own(k, value);
                Ok(())
            }
            _ => Err(JuaError::type_error(format!(
                "cannot set item of {} with {}",
                self.type_name(),
                key.type_name()
            ))),
        }
    }

    /// Membership test behind `key in self`
    pub fn has_item(&self, key: &Value) -> Result<bool> {
        match self {
            Value::String(s) => {
                return Ok(match key {
                    Value::String(k) => s.contains(&**k),
                    _ => false,
                })
            }
            Value::Object(obj) => {
                if let ObjectKind::Array(items) = &obj.0.kind {
                    let snapshot = items.borrow().clone();
                    for item in &snapshot {
                        if item.equals(key)? {
                            return Ok(true);
                        }
                    }
                    return Ok(false);
                }
            }
            _ => {}
        }
        if let Some(f) = self.meta_method("hasItem") {
            return Ok(f.call(vec![self.clone(), key.clone()])?.is_truthy());
        }
        match (self, key) {
            (Value::Object(obj), Value::String(k)) => Ok(obj.get_prop(k).is_some()),
            _ => Err(JuaError::type_error(format!(
                "cannot test {} membership in {}",
                key.type_name(),
                self.type_name()
            ))),
        }
    }

    /// Conversion used by `print`, templates and `String(...)`.
    /// Objects go through their `toString` metamethod when it yields a string.
    pub fn to_display(&self) -> Result<String> {
        if let Value::Object(_) = self {
            if let Some(f) = self.meta_method("toString") {
                if let Value::String(s) = f.call(vec![self.clone()])? {
                    return Ok(s.to_string());
                }
            }
        }
        Ok(self.safe_string())
    }

    /// Display form that never runs script code
    pub fn safe_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Function(f) => match f.name() {
                Some(name) => format!("<function {}>", name),
                None => "<function>".to_string(),
            },
            Value::Object(obj) => match &obj.0.kind {
                ObjectKind::Array(items) => format!("<array({})>", items.borrow().len()),
                ObjectKind::Buffer(bytes) => format!("<buffer({})>", bytes.borrow().len()),
                _ => {
                    let keys = obj.keys();
                    if keys.is_empty() {
                        "{}".to_string()
                    } else {
                        format!("{{{}}}", keys.join(", "))
                    }
                }
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.safe_string())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.identical(other)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<ObjRef> for Value {
    fn from(obj: ObjRef) -> Self {
        Value::Object(obj)
    }
}

/// Number display without a trailing `.0` for integers
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// Single-quoted literal that lexes back to `s`
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32))
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Resolve a possibly negative index against `len`
pub fn wrap_index(n: f64, len: usize) -> Result<usize> {
    let size = len as f64;
    let mut i = n.round();
    if i < 0.0 {
        i += size;
    }
    if i >= 0.0 && i < size {
        Ok(i as usize)
    } else {
        Err(JuaError::range(format!(
            "index {} out of range for length {}",
            format_number(n),
            len
        )))
    }
}

/// Byte stored for a number written into a buffer, wrapping modulo 256
pub fn to_byte(n: f64) -> u8 {
    if n.is_finite() {
        (n.trunc() as i64).rem_euclid(256) as u8
    } else {
        0
    }
}

// ==================== Objects ====================

/// String-keyed properties kept in insertion order
#[derive(Default)]
struct PropMap {
    index: FxHashMap<Rc<str>, usize>,
    entries: Vec<(Rc<str>, Value)>,
}

impl PropMap {
    fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
        if let Some(&i) = self.index.get(key) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        let key: Rc<str> = Rc::from(key);
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.index.remove(key)?;
        let (_, value) = self.entries.remove(i);
        for (k, _) in &self.entries[i..] {
            if let Some(slot) = self.index.get_mut(k) {
                *slot -= 1;
            }
        }
        Some(value)
    }
}

pub enum ObjectKind {
    Plain,
    Array(RefCell<Vec<Value>>),
    /// Fixed length, never resized
    Buffer(RefCell<Box<[u8]>>),
    /// Lexical environment; the parent never changes
    Scope(Option<ObjRef>),
}

pub struct Object {
    proto: RefCell<Option<ObjRef>>,
    props: RefCell<PropMap>,
    kind: ObjectKind,
}

/// Shared handle to an object
#[derive(Clone)]
pub struct ObjRef(Rc<Object>);

impl ObjRef {
    pub fn new(proto: Option<ObjRef>) -> Self {
        Self::with_kind(proto, ObjectKind::Plain)
    }

    pub fn with_kind(proto: Option<ObjRef>, kind: ObjectKind) -> Self {
        ObjRef(Rc::new(Object {
            proto: RefCell::new(proto),
            props: RefCell::new(PropMap::default()),
            kind,
        }))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Self::with_kind(
            Some(intrinsics().array.clone()),
            ObjectKind::Array(RefCell::new(items)),
        )
    }

    pub fn buffer(len: usize) -> Self {
        let buffer = Self::with_kind(
            Some(intrinsics().buffer.clone()),
            ObjectKind::Buffer(RefCell::new(vec![0u8; len].into_boxed_slice())),
        );
        buffer.set_own("length", Value::Number(len as f64));
        buffer
    }

    pub fn scope(parent: Option<ObjRef>) -> Self {
        Self::with_kind(None, ObjectKind::Scope(parent))
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.0.kind
    }

    pub fn ptr_eq(&self, other: &ObjRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn proto(&self) -> Option<ObjRef> {
        self.0.proto.borrow().clone()
    }

    /// Replace the prototype, refusing to close a loop
    pub fn set_proto(&self, proto: Option<ObjRef>) -> Result<()> {
        let mut current = proto.clone();
        let mut hops = 0;
        while let Some(obj) = current {
            if obj.ptr_eq(self) {
                return Err(JuaError::type_error("prototype chain would form a cycle"));
            }
            hops += 1;
            if hops > MAX_CHAIN {
                return Err(JuaError::range("prototype chain too long"));
            }
            current = obj.proto();
        }
        let old = self.0.proto.replace(proto);
        drop(old);
        Ok(())
    }

    pub fn get_own(&self, key: &str) -> Option<Value> {
        self.0.props.borrow().get(key).cloned()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.props.borrow().get(key).is_some()
    }

    pub fn set_own(&self, key: &str, value: Value) {
        let old = self.0.props.borrow_mut().insert(key, value);
        drop(old);
    }

    pub fn delete(&self, key: &str) -> Option<Value> {
        self.0.props.borrow_mut().remove(key)
    }

    /// Own keys in insertion order
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.0
            .props
            .borrow()
            .entries
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        self.0.props.borrow().entries.clone()
    }

    /// Drop every own property
    pub fn clear(&self) {
        let old = std::mem::take(&mut *self.0.props.borrow_mut());
        drop(old);
    }

    pub fn is_class_tag(&self) -> bool {
        matches!(self.get_own("__class"), Some(Value::Bool(true)))
    }

    pub fn get_prop(&self, key: &str) -> Option<Value> {
        let mut current = self.clone();
        for _ in 0..MAX_CHAIN {
            if let Some(value) = current.get_own(key) {
                return Some(value);
            }
            current = current.inherit_from()?;
        }
        None
    }

    pub fn inherit_prop(&self, key: &str) -> Option<Value> {
        self.inherit_from()?.get_prop(key)
    }

    /// Where lookup continues once own properties miss: the parent for a
    /// scope, `super` when the prototype is class-tagged, else the prototype.
    fn inherit_from(&self) -> Option<ObjRef> {
        if let ObjectKind::Scope(parent) = &self.0.kind {
            return parent.clone();
        }
        let proto = self.proto()?;
        if proto.is_class_tag() {
            match self.get_own("super") {
                Some(Value::Object(base)) => Some(base),
                _ => None,
            }
        } else {
            Some(proto)
        }
    }

    fn is_subclass_of(&self, klass: &ObjRef) -> bool {
        let mut current = self.clone();
        for _ in 0..MAX_CHAIN {
            match current.proto() {
                Some(proto) if proto.is_class_tag() => {}
                _ => return false,
            }
            let Some(Value::Object(base)) = current.get_own("super") else {
                return false;
            };
            if base.ptr_eq(klass) {
                return true;
            }
            current = base;
        }
        false
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0.kind, ObjectKind::Array(_))
    }

    /// Items of an array object
    pub fn items(&self) -> Option<&RefCell<Vec<Value>>> {
        match &self.0.kind {
            ObjectKind::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Bytes of a buffer object
    pub fn bytes(&self) -> Option<&RefCell<Box<[u8]>>> {
        match &self.0.kind {
            ObjectKind::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.clone()).safe_string())
    }
}

// ==================== Functions ====================

pub type NativeFn = dyn Fn(&mut Vec<Value>) -> Result<Value>;

/// Function defined in script code, closing over its defining scope
pub struct ScriptFunction {
    pub env: Scope,
    pub literal: Rc<FunctionLiteral>,
}

/// Host function called through the same contract as script functions
pub struct NativeFunction {
    pub name: String,
    func: Box<NativeFn>,
}

pub enum Function {
    Script(ScriptFunction),
    Native(NativeFunction),
}

#[derive(Clone)]
pub struct FuncRef(Rc<Function>);

impl FuncRef {
    pub fn script(env: Scope, literal: Rc<FunctionLiteral>) -> Self {
        FuncRef(Rc::new(Function::Script(ScriptFunction { env, literal })))
    }

    pub fn native(name: &str, func: impl Fn(&mut Vec<Value>) -> Result<Value> + 'static) -> Self {
        FuncRef(Rc::new(Function::Native(NativeFunction {
            name: name.to_string(),
            func: Box::new(func),
        })))
    }

    pub fn function(&self) -> &Function {
        &self.0
    }

    pub fn name(&self) -> Option<&str> {
        match &*self.0 {
            Function::Script(f) => f.literal.name.as_deref(),
            Function::Native(n) if !n.name.is_empty() => Some(&n.name),
            Function::Native(_) => None,
        }
    }

    pub fn ptr_eq(&self, other: &FuncRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Uniform call contract; a missing result is `null`
    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        crate::interpreter::enter_call(|| match &*self.0 {
            Function::Script(f) => crate::interpreter::call_script(f, args),
            Function::Native(n) => {
                let mut args = args;
                (n.func)(&mut args)
            }
        })
    }
}

impl fmt::Debug for FuncRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Function(self.clone()).safe_string())
    }
}
