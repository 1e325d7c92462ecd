//! Native library for Jua
//!
//! Prototypes of the built-in types live in a per-thread `Intrinsics`
//! table so primitives can find their methods without an interpreter.
//! Globals that need the host (`print`, `require`, `useNS`) are installed
//! per interpreter and reach it through a weak handle.

use crate::error::{ErrorKind, JuaError, Result};
use crate::interpreter::ValueIter;
use crate::operator::{apply_binary, BinaryOp};
use crate::runtime::Realm;
use crate::scope::Scope;
use crate::value::{format_number, wrap_index, ObjRef, Value};
use std::rc::{Rc, Weak};

/// Prototype objects shared by every interpreter on a thread
pub struct Intrinsics {
    /// Tagged `__class`; calling a class allocates an instance
    pub class: ObjRef,
    pub object: ObjRef,
    pub number: ObjRef,
    pub string: ObjRef,
    pub boolean: ObjRef,
    pub function: ObjRef,
    pub array: ObjRef,
    pub buffer: ObjRef,
    pub range: ObjRef,
    pub error: ObjRef,
    pub try_result: ObjRef,
}

thread_local! {
    static INTRINSICS: Rc<Intrinsics> = Rc::new(Intrinsics::build());
}

pub fn intrinsics() -> Rc<Intrinsics> {
    INTRINSICS.with(Rc::clone)
}

impl Intrinsics {
    // Must not create arrays, buffers or primitive lookups: those read the
    // table that is being built.
    fn build() -> Self {
        let class = ObjRef::new(None);
        class.set_own("__class", Value::Bool(true));
        class.set_own("__call", Value::native("new", obj_new));

        let object = ObjRef::new(Some(class.clone()));
        define(&object, "new", obj_new);
        define(&object, "get", object_get);
        define(&object, "set", object_set);
        define(&object, "del", object_del);
        define(&object, "hasOwn", object_has_own);
        define(&object, "keys", object_keys);
        define(&object, "setProto", object_set_proto);
        define(&object, "getProto", object_get_proto);

        let number = build_class("Number", number_ctor);
        define(&number, "toString", number_to_string);
        define(&number, "isInt", number_is_int);
        define(&number, "range", number_range);

        let string = build_class("String", string_ctor);
        define(&string, "len", string_len);
        define(&string, "slice", string_slice);
        define(&string, "upper", string_upper);
        define(&string, "lower", string_lower);

        let array = build_class("Array", array_ctor);
        define(&array, "of", array_of);
        define(&array, "len", array_len);
        define(&array, "push", array_push);
        define(&array, "join", array_join);
        define(&array, "toString", array_to_string);

        let buffer = build_class("Buffer", buffer_ctor);
        define(&buffer, "len", buffer_len);
        define(&buffer, "read", buffer_read);
        define(&buffer, "write", buffer_write);
        define(&buffer, "clear", buffer_clear);

        let range = ObjRef::new(Some(class.clone()));
        define(&range, "next", range_next);

        let error = ObjRef::new(Some(class.clone()));
        define(&error, "init", error_init);
        error.set_own("name", Value::string("Error"));
        define(&error, "toString", error_to_string);

        let try_result = ObjRef::new(None);
        define(&try_result, "catch", try_catch);

        Intrinsics {
            class,
            object,
            number,
            string,
            boolean: ObjRef::new(None),
            function: ObjRef::new(None),
            array,
            buffer,
            range,
            error,
            try_result,
        }
    }
}

fn define(obj: &ObjRef, name: &str, func: fn(&mut Vec<Value>) -> Result<Value>) {
    obj.set_own(name, Value::native(name, func));
}

/// Prototype whose class tag carries a constructor; the class itself is
/// dropped from the arguments.
fn build_class(name: &str, ctor: fn(&mut Vec<Value>) -> Result<Value>) -> ObjRef {
    let meta = ObjRef::new(None);
    meta.set_own("__class", Value::Bool(true));
    meta.set_own(
        "__call",
        Value::native(name, move |args| {
            if !args.is_empty() {
                args.remove(0);
            }
            ctor(args)
        }),
    );
    ObjRef::new(Some(meta))
}

// ==================== Argument helpers ====================

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Null)
}

fn expect_object(value: &Value, what: &str) -> Result<ObjRef> {
    match value {
        Value::Object(obj) => Ok(obj.clone()),
        other => Err(JuaError::type_error(format!("{} expects an object", what))
            .with_value(other.clone())),
    }
}

fn expect_string(value: &Value, what: &str) -> Result<Rc<str>> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(JuaError::type_error(format!("{} expects a string", what))
            .with_value(other.clone())),
    }
}

fn expect_number(value: &Value, what: &str) -> Result<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(JuaError::type_error(format!("{} expects a number", what))
            .with_value(other.clone())),
    }
}

fn expect_array(value: &Value, what: &str) -> Result<ObjRef> {
    match value {
        Value::Object(obj) if obj.is_array() => Ok(obj.clone()),
        other => Err(JuaError::type_error(format!("{} expects an array", what))
            .with_value(other.clone())),
    }
}

fn expect_buffer(value: &Value, what: &str) -> Result<ObjRef> {
    match value {
        Value::Object(obj) if obj.bytes().is_some() => Ok(obj.clone()),
        other => Err(JuaError::type_error(format!("{} expects a buffer", what))
            .with_value(other.clone())),
    }
}

/// `[start, end)` over `len` items; negative positions count from the end
/// and both ends are clamped.
fn slice_bounds(len: usize, start: &Value, end: &Value) -> Result<(usize, usize)> {
    let clamp = |value: &Value, fallback: usize| -> Result<usize> {
        match value {
            Value::Null => Ok(fallback),
            other => {
                let n = expect_number(other, "slice")?.trunc();
                let n = if n < 0.0 { n + len as f64 } else { n };
                Ok(n.clamp(0.0, len as f64) as usize)
            }
        }
    };
    let start = clamp(start, 0)?;
    let end = clamp(end, len)?;
    Ok((start, end.max(start)))
}

// ==================== Object ====================

/// Allocate an instance of `proto` and run its `init`
fn obj_new(args: &mut Vec<Value>) -> Result<Value> {
    if args.is_empty() {
        return Err(JuaError::new(ErrorKind::MissingArgument("prototype".into()), None));
    }
    let proto = expect_object(&args.remove(0), "new")?;
    let obj = Value::Object(ObjRef::new(Some(proto.clone())));
    if let Some(init @ Value::Function(_)) = proto.get_prop("init") {
        let mut init_args = Vec::with_capacity(args.len() + 1);
        init_args.push(obj.clone());
        init_args.append(args);
        init.call(init_args)?;
    }
    Ok(obj)
}

fn object_get(args: &mut Vec<Value>) -> Result<Value> {
    let target = arg(args, 0);
    let key = expect_string(&arg(args, 1), "Object.get")?;
    let found = match arg(args, 2).as_str() {
        Some("own") => target.get_own(&key),
        Some("inherit") => target.inherit_prop(&key),
        _ => target.get_prop(&key),
    };
    Ok(found.unwrap_or(Value::Null))
}

fn object_set(args: &mut Vec<Value>) -> Result<Value> {
    let key = expect_string(&arg(args, 1), "Object.set")?;
    arg(args, 0).set_prop(&key, arg(args, 2))?;
    Ok(Value::Null)
}

fn object_del(args: &mut Vec<Value>) -> Result<Value> {
    let obj = expect_object(&arg(args, 0), "Object.del")?;
    let key = expect_string(&arg(args, 1), "Object.del")?;
    obj.delete(&key);
    Ok(Value::Null)
}

fn object_has_own(args: &mut Vec<Value>) -> Result<Value> {
    let key = expect_string(&arg(args, 1), "Object.hasOwn")?;
    Ok(Value::Bool(match arg(args, 0) {
        Value::Object(obj) => obj.has_own(&key),
        _ => false,
    }))
}

fn object_keys(args: &mut Vec<Value>) -> Result<Value> {
    let obj = expect_object(&arg(args, 0), "Object.keys")?;
    Ok(Value::array(obj.keys().into_iter().map(Value::String).collect()))
}

fn object_set_proto(args: &mut Vec<Value>) -> Result<Value> {
    let obj = expect_object(&arg(args, 0), "Object.setProto")?;
    let proto = match arg(args, 1) {
        Value::Object(proto) => Some(proto),
        _ => None,
    };
    obj.set_proto(proto)?;
    Ok(Value::Null)
}

fn object_get_proto(args: &mut Vec<Value>) -> Result<Value> {
    Ok(arg(args, 0).proto().map(Value::Object).unwrap_or(Value::Null))
}

// ==================== Number ====================

fn number_ctor(args: &mut Vec<Value>) -> Result<Value> {
    Ok(Value::Number(match arg(args, 0) {
        Value::Number(n) => n,
        Value::String(s) => parse_number(&s),
        Value::Null | Value::Bool(false) => 0.0,
        Value::Bool(true) => 1.0,
        _ => f64::NAN,
    }))
}

/// Lenient conversion: blank is zero, `0x` is hex, anything else unparsable is NaN
fn parse_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    match text {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if text.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => text.parse().unwrap_or(f64::NAN),
    }
}

fn number_to_string(args: &mut Vec<Value>) -> Result<Value> {
    let n = expect_number(&arg(args, 0), "Number.toString")?;
    let radix = match arg(args, 1) {
        Value::Null => 10,
        other => expect_number(&other, "Number.toString")? as u32,
    };
    if !(2..=36).contains(&radix) {
        return Err(JuaError::range(format!("radix must be between 2 and 36, got {}", radix)));
    }
    if radix == 10 || !n.is_finite() {
        return Ok(Value::string(format_number(n)));
    }
    if n.fract() != 0.0 {
        return Err(JuaError::range("only integers can be written in another radix")
            .with_value(Value::Number(n)));
    }

    let mut magnitude = n.abs() as u64;
    let mut digits = Vec::new();
    loop {
        let digit = (magnitude % u64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('?'));
        magnitude /= u64::from(radix);
        if magnitude == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    Ok(Value::string(digits.iter().rev().collect::<String>()))
}

fn number_is_int(args: &mut Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(matches!(
        arg(args, 0),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0
    )))
}

fn number_range(args: &mut Vec<Value>) -> Result<Value> {
    let start = expect_number(&arg(args, 0), "Number.range")?;
    let end = expect_number(&arg(args, 1), "Number.range")?;
    Ok(range(start, end))
}

/// `start..end`: iterates `start`, `start + 1`, ... while below `end`
pub fn range(start: f64, end: f64) -> Value {
    let obj = ObjRef::new(Some(intrinsics().range.clone()));
    obj.set_own("start", Value::Number(start));
    obj.set_own("end", Value::Number(end));
    Value::Object(obj)
}

fn range_next(args: &mut Vec<Value>) -> Result<Value> {
    let target = arg(args, 0);
    let key = match arg(args, 1) {
        key @ Value::Number(_) => apply_binary(BinaryOp::Add, &key, &Value::Number(1.0))?,
        _ => target.get_prop("start").unwrap_or(Value::Null),
    };
    let end = target.get_prop("end").unwrap_or(Value::Null);
    let more = apply_binary(BinaryOp::Lt, &key, &end)?.is_truthy();
    Ok(Value::Object(step(key.clone(), key, !more)))
}

/// Iteration result `{key, value, done}`
fn step(key: Value, value: Value, done: bool) -> ObjRef {
    let obj = ObjRef::new(None);
    obj.set_own("key", key);
    obj.set_own("value", value);
    obj.set_own("done", Value::Bool(done));
    obj
}

// ==================== String ====================

fn string_ctor(args: &mut Vec<Value>) -> Result<Value> {
    match args.first() {
        None => Ok(Value::string("")),
        Some(s @ Value::String(_)) => Ok(s.clone()),
        Some(other) => Ok(Value::string(other.to_display()?)),
    }
}

fn string_len(args: &mut Vec<Value>) -> Result<Value> {
    let s = expect_string(&arg(args, 0), "String.len")?;
    Ok(Value::Number(s.chars().count() as f64))
}

fn string_slice(args: &mut Vec<Value>) -> Result<Value> {
    let s = expect_string(&arg(args, 0), "String.slice")?;
    let (start, end) = slice_bounds(s.chars().count(), &arg(args, 1), &arg(args, 2))?;
    Ok(Value::string(s.chars().skip(start).take(end - start).collect::<String>()))
}

fn string_upper(args: &mut Vec<Value>) -> Result<Value> {
    let s = expect_string(&arg(args, 0), "String.upper")?;
    Ok(Value::string(s.to_uppercase()))
}

fn string_lower(args: &mut Vec<Value>) -> Result<Value> {
    let s = expect_string(&arg(args, 0), "String.lower")?;
    Ok(Value::string(s.to_lowercase()))
}

// ==================== Array ====================

fn array_ctor(args: &mut Vec<Value>) -> Result<Value> {
    let mut items = Vec::new();
    if let Some(source) = args.first() {
        let mut iter = ValueIter::new(source.clone())?;
        while let Some(item) = iter.next_value()? {
            items.push(item);
        }
    }
    Ok(Value::array(items))
}

fn array_of(args: &mut Vec<Value>) -> Result<Value> {
    Ok(Value::array(std::mem::take(args)))
}

fn array_len(args: &mut Vec<Value>) -> Result<Value> {
    let array = expect_array(&arg(args, 0), "Array.len")?;
    let len = array.items().map_or(0, |items| items.borrow().len());
    Ok(Value::Number(len as f64))
}

fn array_push(args: &mut Vec<Value>) -> Result<Value> {
    let array = expect_array(&arg(args, 0), "Array.push")?;
    let len = match array.items() {
        Some(items) => {
            let mut items = items.borrow_mut();
            items.extend(args.drain(1..));
            items.len()
        }
        None => 0,
    };
    Ok(Value::Number(len as f64))
}

/// Join the display forms of anything iterable
fn join(source: &Value, separator: &str) -> Result<String> {
    let mut iter = ValueIter::new(source.clone())?;
    let mut out = String::new();
    let mut first = true;
    while let Some(item) = iter.next_value()? {
        if !first {
            out.push_str(separator);
        }
        first = false;
        out.push_str(&item.to_display()?);
    }
    Ok(out)
}

fn array_join(args: &mut Vec<Value>) -> Result<Value> {
    let separator = match arg(args, 1) {
        Value::Null => Rc::from(", "),
        other => expect_string(&other, "Array.join")?,
    };
    Ok(Value::string(join(&arg(args, 0), &separator)?))
}

fn array_to_string(args: &mut Vec<Value>) -> Result<Value> {
    Ok(Value::string(format!("[{}]", join(&arg(args, 0), ", ")?)))
}

// ==================== Buffer ====================

fn buffer_ctor(args: &mut Vec<Value>) -> Result<Value> {
    let len = expect_number(&arg(args, 0), "Buffer")?;
    if !(len >= 0.0 && len.fract() == 0.0 && len <= u32::MAX as f64) {
        return Err(JuaError::range("invalid buffer length").with_value(Value::Number(len)));
    }
    Ok(Value::Object(ObjRef::buffer(len as usize)))
}

fn buffer_len(args: &mut Vec<Value>) -> Result<Value> {
    Ok(arg(args, 0).get_prop("length").unwrap_or(Value::Null))
}

/// Bytes `[start, end)` as a string of code points below 256
fn buffer_read(args: &mut Vec<Value>) -> Result<Value> {
    let buffer = expect_buffer(&arg(args, 0), "Buffer.read")?;
    let Some(bytes) = buffer.bytes() else {
        return Ok(Value::Null);
    };
    let bytes = bytes.borrow();
    let (start, end) = slice_bounds(bytes.len(), &arg(args, 1), &arg(args, 2))?;
    Ok(Value::string(bytes[start..end].iter().map(|&b| char::from(b)).collect::<String>()))
}

fn buffer_write(args: &mut Vec<Value>) -> Result<Value> {
    let buffer = expect_buffer(&arg(args, 0), "Buffer.write")?;
    let data = expect_string(&arg(args, 1), "Buffer.write")?;
    let Some(bytes) = buffer.bytes() else {
        return Ok(Value::Null);
    };
    let mut bytes = bytes.borrow_mut();
    let pos = match arg(args, 2) {
        Value::Null => 0,
        other => wrap_index(expect_number(&other, "Buffer.write")?, bytes.len())?,
    };
    let encoded = data
        .chars()
        .map(|c| u8::try_from(u32::from(c)))
        .collect::<std::result::Result<Vec<u8>, _>>()
        .map_err(|_| JuaError::range("character does not fit in a byte"))?;
    if pos + encoded.len() > bytes.len() {
        return Err(JuaError::range("write out of range"));
    }
    bytes[pos..pos + encoded.len()].copy_from_slice(&encoded);
    Ok(Value::Null)
}

fn buffer_clear(args: &mut Vec<Value>) -> Result<Value> {
    let buffer = expect_buffer(&arg(args, 0), "Buffer.clear")?;
    if let Some(bytes) = buffer.bytes() {
        bytes.borrow_mut().fill(0);
    }
    Ok(Value::Null)
}

// ==================== Error ====================

fn error_init(args: &mut Vec<Value>) -> Result<Value> {
    let this = expect_object(&arg(args, 0), "Error.init")?;
    let message = match args.get(1) {
        None => String::new(),
        Some(Value::String(s)) => s.to_string(),
        Some(other) => other.to_display()?,
    };
    this.set_own("message", Value::string(message));
    this.set_own("stack", Value::Null);
    Ok(Value::Null)
}

fn error_to_string(args: &mut Vec<Value>) -> Result<Value> {
    let this = arg(args, 0);
    let name = match this.get_prop("name") {
        Some(name) => name.to_display()?,
        None => "Unknown Error".to_string(),
    };
    let message = match this.get_prop("message") {
        Some(message) => message.to_display()?,
        None => String::new(),
    };
    Ok(Value::string(if message.is_empty() {
        name
    } else {
        format!("{}: {}", name, message)
    }))
}

/// Script view of an error: the thrown object itself, or a fresh `Error`
/// named after the category.
pub fn error_object(err: &JuaError) -> Value {
    if let (ErrorKind::Thrown(_), Some(value)) = (&err.kind, &err.value) {
        return value.clone();
    }
    let obj = ObjRef::new(Some(intrinsics().error.clone()));
    obj.set_own("name", Value::string(err.category()));
    obj.set_own("message", Value::string(err.kind.to_string()));
    obj.set_own("stack", Value::Null);
    Value::Object(obj)
}

fn try_catch(args: &mut Vec<Value>) -> Result<Value> {
    let this = expect_object(&arg(args, 0), "catch")?;
    if matches!(this.get_own("status"), Some(Value::Bool(true))) {
        return Ok(Value::Null);
    }
    match arg(args, 1) {
        callback @ Value::Function(_) => {
            let error = this.get_own("error").unwrap_or(Value::Null);
            callback.call(vec![error])?;
            Ok(Value::Null)
        }
        other => Err(JuaError::type_error("catch expects a function").with_value(other)),
    }
}

// ==================== Globals ====================

fn type_of(args: &mut Vec<Value>) -> Result<Value> {
    match args.first() {
        Some(value) => Ok(Value::string(value.type_name())),
        None => Err(JuaError::new(ErrorKind::MissingArgument("value".into()), None)),
    }
}

fn throw(args: &mut Vec<Value>) -> Result<Value> {
    let error = match arg(args, 0) {
        Value::String(message) => {
            let obj = Value::Object(ObjRef::new(Some(intrinsics().error.clone())));
            error_init(&mut vec![obj.clone(), Value::String(message)])?;
            obj
        }
        value if value.is_instance_of(&Value::Object(intrinsics().error.clone())) => value,
        other => {
            return Err(JuaError::type_error("throw() expects error or string").with_value(other))
        }
    };
    let message = error.to_display().unwrap_or_else(|_| error.safe_string());
    Err(JuaError::thrown(error, message))
}

fn try_call(args: &mut Vec<Value>) -> Result<Value> {
    if args.is_empty() {
        return Err(JuaError::new(ErrorKind::MissingArgument("function".into()), None));
    }
    let callee = args.remove(0);
    let result = ObjRef::new(Some(intrinsics().try_result.clone()));
    match callee.call(std::mem::take(args)) {
        Ok(value) => {
            result.set_own("status", Value::Bool(true));
            result.set_own("value", value);
        }
        Err(err) => {
            result.set_own("status", Value::Bool(false));
            result.set_own("error", err.to_value());
        }
    }
    Ok(Value::Object(result))
}

fn make_class(args: &mut Vec<Value>) -> Result<Value> {
    let proto = expect_object(&arg(args, 0), "class()")?;
    proto.set_proto(Some(intrinsics().class.clone()))?;
    Ok(Value::Object(proto))
}

fn realm_of(realm: &Weak<Realm>) -> Result<Rc<Realm>> {
    realm
        .upgrade()
        .ok_or_else(|| JuaError::reference("interpreter is no longer running"))
}

/// Register the global bindings of one interpreter
pub fn install_globals(realm: &Rc<Realm>) {
    let global = realm.global();
    let core = intrinsics();

    global.declare("_G", Value::Object(global.object().clone()));
    global.declare("Object", Value::Object(core.object.clone()));
    global.declare("Number", Value::Object(core.number.clone()));
    global.declare("String", Value::Object(core.string.clone()));
    global.declare("Boolean", Value::Object(core.boolean.clone()));
    global.declare("Function", Value::Object(core.function.clone()));
    global.declare("Array", Value::Object(core.array.clone()));
    global.declare("Buffer", Value::Object(core.buffer.clone()));
    global.declare("Error", Value::Object(core.error.clone()));

    global.declare("type", Value::native("type", type_of));
    global.declare("throw", Value::native("throw", throw));
    global.declare("try", Value::native("try", try_call));
    global.declare("class", Value::native("class", make_class));

    let weak = Rc::downgrade(realm);
    global.declare(
        "print",
        Value::native("print", move |args| {
            let realm = realm_of(&weak)?;
            let parts = args
                .iter()
                .map(Value::to_display)
                .collect::<Result<Vec<_>>>()?;
            realm.host().stdout(&parts.join("\t"));
            Ok(Value::Null)
        }),
    );

    let weak = Rc::downgrade(realm);
    global.declare(
        "require",
        Value::native("require", move |args| {
            let name = expect_string(&arg(args, 0), "require()")?;
            realm_of(&weak)?.require(&name)
        }),
    );

    let weak = Rc::downgrade(realm);
    global.declare(
        "useNS",
        Value::native("useNS", move |args| {
            let scope = match arg(args, 0) {
                Value::Object(obj) => Scope::from_object(&obj),
                _ => None,
            }
            .ok_or_else(|| JuaError::type_error("useNS() expects a scope"))?;
            let ns = match arg(args, 1) {
                Value::String(name) => realm_of(&weak)?.require(&name)?,
                other => other,
            };
            let Value::Object(ns) = ns else {
                return Err(JuaError::type_error(
                    "useNS() expects an object or the name of a module exporting one",
                )
                .with_value(ns));
            };
            for (key, value) in ns.entries() {
                scope.declare(&key, value);
            }
            Ok(Value::Null)
        }),
    );
}

// ==================== math module ====================

fn math_fn(name: &str, f: fn(f64) -> f64) -> Value {
    let label = format!("math.{}", name);
    Value::native(name, move |args| {
        Ok(Value::Number(f(expect_number(&arg(args, 0), &label)?)))
    })
}

/// Exports of the built-in `math` module
pub fn math_module() -> Value {
    let math = ObjRef::new(None);
    math.set_own("E", Value::Number(std::f64::consts::E));
    math.set_own("PI", Value::Number(std::f64::consts::PI));

    let unary: [(&str, fn(f64) -> f64); 14] = [
        ("abs", f64::abs),
        ("acos", f64::acos),
        ("asin", f64::asin),
        ("atan", f64::atan),
        ("ceil", f64::ceil),
        ("cos", f64::cos),
        ("exp", f64::exp),
        ("floor", f64::floor),
        ("log", f64::ln),
        // halves round up, as in most scripting languages
        ("round", |n| (n + 0.5).floor()),
        ("sin", f64::sin),
        ("sqrt", f64::sqrt),
        ("tan", f64::tan),
        ("trunc", f64::trunc),
    ];
    for (name, f) in unary {
        math.set_own(name, math_fn(name, f));
    }

    math.set_own(
        "atan2",
        Value::native("atan2", |args| {
            let y = expect_number(&arg(args, 0), "math.atan2")?;
            let x = expect_number(&arg(args, 1), "math.atan2")?;
            Ok(Value::Number(y.atan2(x)))
        }),
    );
    math.set_own(
        "pow",
        Value::native("pow", |args| {
            let base = expect_number(&arg(args, 0), "math.pow")?;
            let exp = expect_number(&arg(args, 1), "math.pow")?;
            Ok(Value::Number(base.powf(exp)))
        }),
    );
    math.set_own(
        "max",
        Value::native("max", |args| {
            args.iter().try_fold(f64::NEG_INFINITY, |acc, v| {
                expect_number(v, "math.max").map(|n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) })
            })
            .map(Value::Number)
        }),
    );
    math.set_own(
        "min",
        Value::native("min", |args| {
            args.iter().try_fold(f64::INFINITY, |acc, v| {
                expect_number(v, "math.min").map(|n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) })
            })
            .map(Value::Number)
        }),
    );
    Value::Object(math)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&mut Vec<Value>) -> Result<Value>, args: Vec<Value>) -> Result<Value> {
        let mut args = args;
        f(&mut args)
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 42 "), 42.0);
        assert_eq!(parse_number("0x1F"), 31.0);
        assert_eq!(parse_number(""), 0.0);
        assert!(parse_number("abc").is_nan());
        assert!(parse_number("inf").is_nan());
        assert_eq!(parse_number("1e3"), 1000.0);
    }

    #[test]
    fn test_radix() {
        let hex = call(number_to_string, vec![Value::Number(255.0), Value::Number(16.0)]).unwrap();
        assert_eq!(hex, Value::string("ff"));
        let bin = call(number_to_string, vec![Value::Number(-5.0), Value::Number(2.0)]).unwrap();
        assert_eq!(bin, Value::string("-101"));
        assert!(call(number_to_string, vec![Value::Number(1.5), Value::Number(2.0)]).is_err());
    }

    #[test]
    fn test_slice_bounds() {
        let len = 5;
        assert_eq!(slice_bounds(len, &Value::Null, &Value::Null).unwrap(), (0, 5));
        assert_eq!(slice_bounds(len, &Value::Number(-2.0), &Value::Null).unwrap(), (3, 5));
        assert_eq!(slice_bounds(len, &Value::Number(4.0), &Value::Number(2.0)).unwrap(), (4, 4));
        assert_eq!(slice_bounds(len, &Value::Number(1.0), &Value::Number(99.0)).unwrap(), (1, 5));
    }

    #[test]
    fn test_range_steps() {
        let r = range(1.0, 3.0);
        let first = call(range_next, vec![r.clone(), Value::Null]).unwrap();
        assert_eq!(first.get_own("value"), Some(Value::Number(1.0)));
        assert_eq!(first.get_own("done"), Some(Value::Bool(false)));
        let last = call(range_next, vec![r, Value::Number(2.0)]).unwrap();
        assert_eq!(last.get_own("done"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_error_object_for_runtime_error() {
        let err = JuaError::type_error("bad operand");
        let obj = error_object(&err);
        assert_eq!(obj.get_own("name"), Some(Value::string("TypeError")));
        assert_eq!(obj.to_display().unwrap(), "TypeError: bad operand");
        assert!(obj.is_instance_of(&Value::Object(intrinsics().error.clone())));
    }

    #[test]
    fn test_buffer_write_read() {
        let buf = Value::Object(ObjRef::buffer(4));
        call(buffer_write, vec![buf.clone(), Value::string("hi"), Value::Number(1.0)]).unwrap();
        let text = call(buffer_read, vec![buf.clone(), Value::Number(1.0), Value::Number(3.0)]).unwrap();
        assert_eq!(text, Value::string("hi"));
        let err = call(buffer_write, vec![buf, Value::string("abcde")]).unwrap_err();
        assert_eq!(err.category(), "RangeError");
    }
}
