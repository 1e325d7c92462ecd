use jua::{BufferHost, Interpreter};
use pretty_assertions::assert_eq;
use std::rc::Rc;

fn output(source: &str) -> String {
    let host = Rc::new(BufferHost::new());
    let interp = Interpreter::with_host(host.clone());
    assert!(interp.run(source, "test"), "script failed: {:?}", host.errors());
    host.output()
}

const POINT: &str = r#"
    let Point = class({
        init(self, x, y) {
            self.x = x
            self.y = y
        },
        __add(a, b) = Point(a.x + b.x, a.y + b.y),
        __eq(a, b) = a.x == b.x && a.y == b.y,
        toString(self) = "(${self.x}, ${self.y})",
    })
"#;

#[test]
fn test_class_instances() {
    let source = format!("{}{}", POINT, r#"
        let p = Point(1, 2)
        print(p.x, p.y)
        print(p)
        print(type(p), p is Point)
    "#);
    assert_eq!(output(&source), "1\t2\n(1, 2)\nobject\ttrue\n");
}

#[test]
fn test_metamethods() {
    let source = format!("{}{}", POINT, r#"
        print(Point(1, 2) + Point(3, 4))
        print(Point(1, 2) == Point(1, 2), Point(1, 2) != Point(2, 1))
        print("at ${Point(0, 0)}")
    "#);
    assert_eq!(output(&source), "(4, 6)\ntrue\ttrue\nat (0, 0)\n");
}

#[test]
fn test_missing_metamethod_is_type_error() {
    let source = r#"
        let r = try(fun() = {a: 1} + 1)
        print(r.status, r.error.name)
    "#;
    assert_eq!(output(source), "false\tTypeError\n");
}

#[test]
fn test_inheritance_through_super() {
    let source = r#"
        let Animal = class({
            init(self, name) { self.name = name },
            speak(self) = "${self.name} makes a sound",
            kind: 'animal',
        })
        let Dog = class({
            super: Animal,
            speak(self) = "${self.name} barks",
        })
        let d = Dog('Rex')
        print(d:speak())
        print(Animal.speak(d))
        print(d.kind)
        print(d is Dog, d is Animal, d is Error)
    "#;
    assert_eq!(
        output(source),
        "Rex barks\nRex makes a sound\nanimal\ntrue\ttrue\tfalse\n"
    );
}

#[test]
fn test_item_metamethods() {
    let source = r#"
        let Scaled = class({
            init(self, n) { self.n = n },
            getItem(self, i) = i * self.n,
            setItem(self, i, v) { self.last = "$i=$v" },
            hasItem(self, v) = v % self.n == 0,
        })
        let s = Scaled(3)
        print(s[4])
        s[1] = 'x'
        print(s.last)
        print(9 in s, 10 in s)
    "#;
    assert_eq!(output(source), "12\n1=x\ntrue\tfalse\n");
}

#[test]
fn test_prototype_natives() {
    let source = r#"
        let base = { greet(self) = "hi ${self.name}" }
        let o = { name: 'o' }
        Object.setProto(o, base)
        print(o:greet())
        print(Object.hasOwn(o, 'greet'), Object.get(o, 'greet', 'own'))
        print(Object.getProto(o) == base)
        print(Object.keys({b: 1, a: 2}))
        Object.del(o, 'name')
        print(Object.hasOwn(o, 'name'))
        let r = try(Object.setProto, base, o)
        print(r.error.name)
    "#;
    assert_eq!(
        output(source),
        "hi o\nfalse\tnull\ntrue\n[b, a]\nfalse\nTypeError\n"
    );
}

#[test]
fn test_object_new_runs_init() {
    let source = r#"
        let Counter = { init(self, start) { self.value = start } }
        let c = Object.new(Counter, 5)
        print(c.value, c is Counter)
    "#;
    assert_eq!(output(source), "5\ttrue\n");
}

#[test]
fn test_primitive_methods() {
    let source = r#"
        Number.double = fun(n) = n * 2
        print((21):double())
        print('hello':slice(1, 3), 'abc':upper())
        Object.del(Number, 'double')
    "#;
    assert_eq!(output(source), "42\nel\tABC\n");
}
