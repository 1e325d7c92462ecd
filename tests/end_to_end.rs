use jua::{BufferHost, Interpreter, Value};
use pretty_assertions::assert_eq;
use std::rc::Rc;

fn output(source: &str) -> String {
    let host = Rc::new(BufferHost::new());
    let interp = Interpreter::with_host(host.clone());
    assert!(interp.run(source, "test"), "script failed: {:?}", host.errors());
    host.output()
}

#[test]
fn test_print_sum() {
    assert_eq!(output("let a = 1; let b = a + 2; print(b);"), "3\n");
}

#[test]
fn test_print_function_result() {
    assert_eq!(output("fun add(a, b) { return a + b; } print(add(2,3));"), "5\n");
}

#[test]
fn test_print_formats() {
    assert_eq!(output("print('a', 1, true, null)\nprint()"), "a\t1\ttrue\tnull\n\n");
    assert_eq!(output("print({x: 1, y: 2}, [1, [2, 3]])"), "{x, y}\t[1, [2, 3]]\n");
}

#[test]
fn test_string_library() {
    let source = r#"
        print(String.upper('abc'), 'hello':slice(1, 3), 'hello':slice(-3), String.len('héllo'))
        print(String(12), String(), String([1]), 'MiXed':lower())
    "#;
    assert_eq!(output(source), "ABC\tel\tllo\t5\n12\t\t[1]\tmixed\n");
}

#[test]
fn test_number_library() {
    let source = r#"
        print(Number('0x1F'), Number(' 2.5 '), Number(true), Number(null), Number('abc'))
        print(Number.toString(255, 16), (7):toString(2), Number.isInt(2.5), Number.isInt(4))
        let r = Number.range(0, 3)
        print(Array(r))
    "#;
    assert_eq!(
        output(source),
        "31\t2.5\t1\t0\tNaN\nff\t111\tfalse\ttrue\n[0, 1, 2]\n"
    );
}

#[test]
fn test_array_library() {
    let source = r#"
        let a = Array.of(1, 2)
        print(a:push(3), Array.len(a), a[-1], 2 in a)
        print(a:join('-'), Array(Buffer(2)), Array({k: 1}))
        let [first, second] = a
        print(first + second)
    "#;
    assert_eq!(output(source), "3\t3\t3\ttrue\n1-2-3\t[0, 0]\t[k]\n3\n");
}

#[test]
fn test_buffer_library() {
    let source = r#"
        let b = Buffer(4)
        b:write('hi', 1)
        print(b[1], b:read(1, 3), Buffer.len(b), b.length)
        b:clear()
        print(b[1])
        print(try(Buffer, -1).error.name, try(b.write, b, 'toolong').error.name)
    "#;
    assert_eq!(output(source), "104\thi\t4\t4\n0\nRangeError\tRangeError\n");
}

#[test]
fn test_globals_and_local() {
    let source = r#"
        print(_G.print == print, type(local), Object.hasOwn(local, 'x'))
        let x = 1
        print(Object.hasOwn(local, 'x'))
    "#;
    assert_eq!(output(source), "true\tobject\tfalse\ntrue\n");
}

#[test]
fn test_host_registered_native() {
    let host = Rc::new(BufferHost::new());
    let interp = Interpreter::with_host(host.clone());
    interp.register("VERSION", Value::string("1.0"));
    interp.register_native("sum", |args| {
        let mut total = 0.0;
        for arg in args.iter() {
            if let Value::Number(n) = arg {
                total += n;
            }
        }
        Ok(Value::Number(total))
    });
    assert!(interp.run("print(VERSION, sum(1, 2, 3))", "test"));
    assert_eq!(host.output(), "1.0\t6\n");
}

#[test]
fn test_repl_lines_share_globals() {
    let host = Rc::new(BufferHost::new());
    let interp = Interpreter::with_host(host.clone());
    assert_eq!(interp.eval_line("let count = 1").unwrap(), Value::Null);
    assert_eq!(interp.eval_line("fun bump() { count += 1 }").unwrap(), Value::Null);
    interp.eval_line("bump()").unwrap();
    assert_eq!(interp.eval_line("count").unwrap(), Value::Number(2.0));
    assert!(interp.eval_line("nope").is_err());
}
