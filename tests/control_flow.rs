use jua::{run, BufferHost, Interpreter, Value};
use pretty_assertions::assert_eq;
use std::rc::Rc;

fn output(source: &str) -> String {
    let host = Rc::new(BufferHost::new());
    let interp = Interpreter::with_host(host.clone());
    assert!(interp.run(source, "test"), "script failed: {:?}", host.errors());
    host.output()
}

#[test]
fn test_if_else_chain() {
    let source = r#"
        fun sign(n) {
            if (n < 0) return 'negative'
            else if (n == 0) return 'zero'
            else return 'positive'
        }
        print(sign(-3), sign(0), sign(8))
    "#;
    assert_eq!(output(source), "negative\tzero\tpositive\n");
}

#[test]
fn test_negated_condition() {
    let source = r#"
        let n = 0
        while !(n >= 3) n += 1
        return n
    "#;
    assert_eq!(run(source).expect("Execution failed"), Value::Number(3.0));
}

#[test]
fn test_while_break_continue() {
    let source = r#"
        let i = 0
        let odd = []
        while (true) {
            i += 1
            if (i > 7) break
            if (i % 2 == 0) continue
            odd:push(i)
        }
        print(odd)
    "#;
    assert_eq!(output(source), "[1, 3, 5, 7]\n");
}

#[test]
fn test_break_leaves_innermost_loop() {
    let source = r#"
        let out = []
        for (i in 0..3) {
            for (j in 0..3) {
                if (j == 1) break
                out:push("$i$j")
            }
        }
        print(out:join(' '))
    "#;
    assert_eq!(output(source), "00 10 20\n");
}

#[test]
fn test_return_unwinds_loops() {
    let source = r#"
        fun find(items, wanted) {
            for (item in items) {
                while (true) {
                    if (item == wanted) return 'found'
                    break
                }
            }
            return 'missing'
        }
        print(find([1, 2, 3], 2), find([1], 5))
    "#;
    assert_eq!(output(source), "found\tmissing\n");
}

#[test]
fn test_switch() {
    let source = r#"
        fun classify(n) {
            switch (n) {
                case(1, 2) { return 'small' }
                case(3) return 'three'
                else { return 'big' }
            }
        }
        print(classify(2), classify(3), classify(10))
    "#;
    assert_eq!(output(source), "small\tthree\tbig\n");
}

#[test]
fn test_break_inside_switch_leaves_loop() {
    let source = r#"
        let seen = []
        for (n in [1, 2, 3, 4]) {
            switch (n) {
                case(3) break
                else seen:push(n)
            }
        }
        print(seen)
    "#;
    assert_eq!(output(source), "[1, 2]\n");
}

#[test]
fn test_for_visits_array_in_order() {
    let source = r#"
        for (v in [10, 20, 30]) print(v)
    "#;
    assert_eq!(output(source), "10\n20\n30\n");
}

#[test]
fn test_for_over_object_keys_and_strings() {
    let source = r#"
        for (k in {b: 1, a: 2}) print(k)
        for ([k, v] in [['x', 1], ['y', 2]]) print("$k=$v")
    "#;
    assert_eq!(output(source), "b\na\nx=1\ny=2\n");
}

#[test]
fn test_for_over_buffer() {
    let source = r#"
        let b = Buffer(3)
        b[0] = 65
        b[-1] = 300
        for (byte in b) print(byte)
    "#;
    assert_eq!(output(source), "65\n0\n44\n");
}

#[test]
fn test_range_iteration() {
    let source = r#"
        let sum = 0
        for (i in 1..5) sum += i
        for (i in 3..3) sum += 100
        return sum
    "#;
    assert_eq!(run(source).expect("Execution failed"), Value::Number(10.0));
}

#[test]
fn test_custom_iterator() {
    let source = r#"
        let keys = []
        let Countdown = class({
            init(self, n) { self.n = n },
            next(self, key) {
                keys:push(key)
                let k = if (key == null) self.n else key - 1
                return { key: k, value: k * 10, done: k <= 0 }
            },
        })
        for (v in Countdown(3)) print(v)
        print(keys)
    "#;
    assert_eq!(output(source), "30\n20\n10\n[null, 3, 2, 1]\n");
}

#[test]
fn test_iterator_needs_boolean_done() {
    let source = r#"
        let bad = class({ next(self, key) = { value: 1 } })
        for (v in Object.new(bad)) print(v)
    "#;
    let err = run(source).unwrap_err();
    assert_eq!(err.category(), "TypeError");
}

#[test]
fn test_not_iterable() {
    let err = run("for (x in 42) print(x)").unwrap_err();
    assert_eq!(err.category(), "TypeError");
}

#[test]
fn test_stray_jumps_are_syntax_errors() {
    for source in ["fun f() { break }", "fun f() { if (x) { continue } }", "break"] {
        let err = run(source).unwrap_err();
        assert_eq!(err.category(), "SyntaxError", "{}", source);
    }
}

#[test]
fn test_top_level_return_value() {
    assert_eq!(run("return").expect("Execution failed"), Value::Null);
    assert_eq!(run("let a = 1; return a; a = 2").expect("Execution failed"), Value::Number(1.0));
}
