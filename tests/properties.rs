use jua::ast::Expr;
use jua::parse_expression;
use jua::value::quote;
use proptest::prelude::*;

proptest! {
    #[test]
    fn hex_literals_round_trip(n in any::<u32>()) {
        let literal = format!("0x{:X}", n);
        match &parse_expression(&literal) {
            Ok(Expr::Number { value, .. }) => prop_assert_eq!(*value, f64::from(n)),
            other => prop_assert!(false, "unexpected parse of {}: {:?}", literal, other),
        }
    }

    #[test]
    fn quoted_strings_round_trip(s in any::<String>()) {
        let literal = quote(&s);
        match &parse_expression(&literal) {
            Ok(Expr::String { value, .. }) => prop_assert_eq!(&**value, s.as_str()),
            other => prop_assert!(false, "unexpected parse of {}: {:?}", literal, other),
        }
    }

    #[test]
    fn integer_display_has_no_fraction(n in -1_000_000i64..1_000_000) {
        let shown = jua::value::format_number(n as f64);
        prop_assert_eq!(shown, n.to_string());
    }
}
