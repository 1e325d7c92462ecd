use jua::{run, Value};
use pretty_assertions::assert_eq;

fn eval(source: &str) -> Value {
    run(source).expect("Execution failed")
}

fn number(source: &str) -> f64 {
    match eval(source) {
        Value::Number(n) => n,
        other => panic!("Expected number, got {:?}", other),
    }
}

#[test]
fn test_precedence() {
    assert_eq!(number("return 2 + 3 * 4"), 14.0);
    assert_eq!(number("return 2 * 3 + 4"), 10.0);
    assert_eq!(number("return (2 + 3) * 4"), 20.0);
    assert_eq!(number("return 10 - 4 - 3"), 3.0);
    assert_eq!(number("return 2 ^ 10 / 4"), 256.0);
    assert_eq!(number("return 7 % 3 + 1"), 2.0);
}

#[test]
fn test_number_literals() {
    assert_eq!(number("return 0x1F"), 31.0);
    assert_eq!(number("return 1.5e3"), 1500.0);
    assert_eq!(number("return -0xff"), -255.0);
}

#[test]
fn test_short_circuit() {
    assert_eq!(eval("return false && undefinedName"), Value::Bool(false));
    assert_eq!(eval("return true || undefinedName"), Value::Bool(true));
    assert_eq!(eval("return null || 'fallback'"), Value::string("fallback"));
    assert_eq!(eval("return 1 && 2"), Value::Number(2.0));
}

#[test]
fn test_comparisons() {
    assert_eq!(eval("return 'abc' < 'abd'"), Value::Bool(true));
    assert_eq!(eval("return 3 >= 3"), Value::Bool(true));
    assert_eq!(eval("return 2 > 3"), Value::Bool(false));
    assert_eq!(eval("return 1 == '1'"), Value::Bool(false));
    assert_eq!(eval("return [1] == [1]"), Value::Bool(false));
    assert_eq!(eval("let a = [1]; return a == a"), Value::Bool(true));
    assert_eq!(eval("return !0"), Value::Bool(true));
}

#[test]
fn test_membership() {
    assert_eq!(eval("return 'ell' in 'hello'"), Value::Bool(true));
    assert_eq!(eval("return 2 in [1, 2, 3]"), Value::Bool(true));
    assert_eq!(eval("return 'a' in {a: 1}"), Value::Bool(true));
    assert_eq!(eval("return 'b' in {a: 1}"), Value::Bool(false));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("return 'a' + 'b'"), Value::string("ab"));
    let err = run("return 'a' + 1").unwrap_err();
    assert_eq!(err.category(), "TypeError");
}

#[test]
fn test_templates() {
    let source = r#"
        let name = 'jua'
        return "hi $name, ${1 + 2} and ${[1, 2]}"
    "#;
    assert_eq!(eval(source), Value::string("hi jua, 3 and [1, 2]"));
}

#[test]
fn test_compound_assignment() {
    assert_eq!(number("let a = 1; a += 2; a *= 3; a -= 1; a /= 4; return a"), 2.0);
    assert_eq!(number("let a = null; a ||= 5; a &&= a + 1; return a"), 6.0);
    assert_eq!(number("let o = {n: 1}; o.n += 4; return o.n"), 5.0);
    assert_eq!(number("let xs = [1, 2]; xs[-1] *= 10; return xs[1]"), 20.0);
}

#[test]
fn test_short_circuit_assignment_skips_target() {
    // the undeclared name is never assigned, so no error is raised
    assert_eq!(eval("let a = 0; a &&= missing; return a"), Value::Number(0.0));
}

#[test]
fn test_ternary() {
    assert_eq!(eval("return if (1 < 2) 'yes' else 'no'"), Value::string("yes"));
    assert_eq!(eval("return if (!(1 < 2)) 'yes' else 'no'"), Value::string("no"));
}

#[test]
fn test_unary_metamethod() {
    let source = r#"
        let V = class({ init(self, n) { self.n = n }, __unm(self) = V(-self.n) })
        return (-V(4)).n
    "#;
    assert_eq!(number(source), -4.0);
}

#[test]
fn test_binary_metamethod_on_right_operand() {
    let source = r#"
        let Money = class({
            init(self, cents) { self.cents = cents },
            __mul(a, b) = if (type(a) == 'number') Money(a * b.cents) else Money(a.cents * b),
        })
        return (3 * Money(25)).cents + (Money(10) * 2).cents
    "#;
    assert_eq!(number(source), 95.0);
}

#[test]
fn test_destructuring_assignment() {
    let source = r#"
        let a = 1, b = 2;
        [a, b] = [b, a]
        let x, why;
        {x, y as why = 'd'} = {x: 'x'}
        return "$a$b$x$why"
    "#;
    assert_eq!(eval(source), Value::string("21xd"));
}

#[test]
fn test_optional_property() {
    assert_eq!(eval("let o = {}; return o?.missing"), Value::Null);
    let err = run("let o = {}; return o.missing").unwrap_err();
    assert_eq!(err.category(), "ReferenceError");
}

#[test]
fn test_number_display() {
    assert_eq!(eval("return String(1 / 0)"), Value::string("Infinity"));
    assert_eq!(eval("return String(3.0)"), Value::string("3"));
    assert_eq!(eval("return String(0.5)"), Value::string("0.5"));
    assert_eq!(eval("return String(-0)"), Value::string("0"));
}
