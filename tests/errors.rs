use jua::{parse_expression, run, BufferHost, Config, ErrorKind, Interpreter, Value};
use pretty_assertions::assert_eq;
use std::rc::Rc;

fn session() -> (Rc<BufferHost>, Interpreter) {
    let host = Rc::new(BufferHost::new());
    let interp = Interpreter::with_host(host.clone());
    (host, interp)
}

fn output(source: &str) -> String {
    let (host, interp) = session();
    assert!(interp.run(source, "test"), "script failed: {:?}", host.errors());
    host.output()
}

#[test]
fn test_try_success() {
    let source = r#"
        let r = try(fun(a, b) = a + b, 2, 3)
        print(r.status, r.value)
        print(r:catch(fun(e) { print('unreachable') }))
    "#;
    assert_eq!(output(source), "true\t5\nnull\n");
}

#[test]
fn test_try_catch_thrown_string() {
    let source = r#"
        let r = try(fun() { throw('bad input') })
        print(r.status)
        r:catch(fun(e) { print(e.message, e.name, e) })
    "#;
    assert_eq!(output(source), "false\nbad input\tError\tError: bad input\n");
}

#[test]
fn test_runtime_errors_become_error_objects() {
    let source = r#"
        print(try(fun() = missing).error.name)
        print(try(fun() = [1][5]).error.name)
        print(try(fun() = null()).error.name)
        print(try(fun() = 1 + '1').error is Error)
    "#;
    assert_eq!(output(source), "ReferenceError\nRangeError\nTypeError\ntrue\n");
}

#[test]
fn test_custom_error_class() {
    let source = r#"
        let NotFound = class({ super: Error, name: 'NotFound' })
        let r = try(fun() { throw(NotFound('missing.txt')) })
        print(r.error is NotFound, r.error is Error)
        print(r.error)
        print(Error())
    "#;
    assert_eq!(output(source), "true\ttrue\nNotFound: missing.txt\nError\n");
}

#[test]
fn test_throw_rejects_other_values() {
    let source = r#"
        let r = try(throw, 42)
        print(r.error.name, r.error.message)
    "#;
    assert_eq!(output(source), "TypeError\tthrow() expects error or string\n");
}

#[test]
fn test_catch_requires_function() {
    let source = r#"
        let r = try(throw, 'x')
        print(try(r.catch, r, 5).error.name)
    "#;
    assert_eq!(output(source), "TypeError\n");
}

#[test]
fn test_uncaught_error_goes_to_stderr() {
    let (host, interp) = session();
    assert!(!interp.run("print('before')\nthrow('boom')\nprint('after')", "test"));
    assert_eq!(host.output(), "before\n");
    assert_eq!(host.errors(), vec!["Error: boom".to_string()]);
}

#[test]
fn test_error_with_value() {
    let (host, interp) = session();
    assert!(!interp.run("let o = {a: 1}\nreturn o + 1", "test"));
    let errors = host.errors();
    assert!(errors[0].starts_with("TypeError: unsupported operand types for '+'"));
    assert!(errors[0].ends_with("\n\twith value: {a}"));
}

#[test]
fn test_syntax_error_prevents_execution() {
    let (host, interp) = session();
    assert!(!interp.run("print('a')\nlet = 1", "test"));
    assert_eq!(host.output(), "");
    let errors = host.errors();
    assert!(errors[0].starts_with("SyntaxError"));
    assert!(errors[0].contains("line 2, column 5"));
}

#[test]
fn test_error_display_points_at_source() {
    let source = "let x = 1\nreturn x + nope";
    let err = run(source).unwrap_err().with_source(source);
    assert_eq!(err.kind, ErrorKind::UndeclaredVariable("nope".into()));
    let shown = err.to_string();
    assert!(shown.starts_with("[line 2:12] ReferenceError"), "{}", shown);
    assert!(shown.contains("  | return x + nope"));
}

#[test]
fn test_runaway_recursion_is_range_error() {
    let config = Config {
        max_call_depth: 64,
        ..Config::default()
    };
    let host = Rc::new(BufferHost::new());
    let interp = Interpreter::with_host_and_config(host.clone(), config);
    let result = interp.eval("fun down(n) = down(n + 1)\nreturn try(down, 0).error.message", "test");
    assert_eq!(result.expect("Execution failed"), Value::string("stack overflow"));
    assert!(!interp.run("fun f() = f()\nf()", "test"));
    assert_eq!(host.errors(), vec!["RangeError: stack overflow".to_string()]);
}

#[test]
fn test_type_builtin() {
    let source = r#"
        print(type(null), type(true), type(1), type('s'))
        print(type({}), type([]), type(print), type(fun() = 1))
        print(try(type).error.name)
    "#;
    assert_eq!(
        output(source),
        "null\tboolean\tnumber\tstring\nobject\tobject\tfunction\tfunction\nTypeError\n"
    );
}

#[test]
fn test_deeply_nested_parens() {
    let depth = 1000;
    let source = format!("print({}1{})", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(output(&source), "1\n");
}

#[test]
fn test_nesting_past_limit_is_syntax_error() {
    let (host, interp) = session();
    let source = format!("print({}1{})", "[".repeat(5000), "]".repeat(5000));
    assert!(!interp.run(&source, "test"));
    let errors = host.errors();
    assert!(errors[0].starts_with("SyntaxError"), "{:?}", errors);
    assert!(errors[0].contains("nested deeper than 1024"), "{:?}", errors);
}

#[test]
fn test_long_unary_chain() {
    let source = format!("print({}1)", "- ".repeat(20_000));
    assert_eq!(output(&source), "1\n");
}

#[test]
fn test_long_operator_chain() {
    let terms = 20_000;
    let chain = format!("0{}", " + 1".repeat(terms));
    let (_host, interp) = session();
    let result = interp.eval(&format!("return {}", chain), "test");
    assert_eq!(result.expect("Execution failed"), Value::Number(terms as f64));
}

#[test]
fn test_long_operator_chain_drops() {
    let chain = format!("0{}", " + 1".repeat(100_000));
    let expr = parse_expression(&chain).expect("Parse failed");
    drop(expr);
}

#[test]
fn test_recursion_under_default_limit() {
    let source = r#"
        fun sum(n) = if (n == 0) 0 else n + sum(n - 1)
        print(sum(500))
        print(sum(5000))
    "#;
    assert_eq!(output(source), "125250\n12502500\n");
}

#[test]
fn test_call_limit_is_per_interpreter() {
    let source = "fun down(n) = if (n == 0) 'done' else down(n - 1)\nreturn down(100)";
    let tight = Interpreter::with_host_and_config(
        Rc::new(BufferHost::new()),
        Config {
            max_call_depth: 64,
            ..Config::default()
        },
    );
    let (_host, roomy) = session();
    for _ in 0..2 {
        let err = tight.eval(source, "tight").unwrap_err();
        assert_eq!(err.kind, ErrorKind::StackOverflow);
        assert_eq!(roomy.eval(source, "roomy").expect("Execution failed"), Value::string("done"));
    }
}
