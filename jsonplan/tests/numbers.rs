use jsonplan::{JsonErrorKind, Malformed, Reflect, from_str};
use jsonplan_testhelpers::test;

#[derive(Debug, Default, PartialEq, Reflect)]
struct Ints {
    a: i8,
    b: u8,
    c: i64,
    d: u64,
    e: u16,
}

#[derive(Debug, Default, PartialEq, Reflect)]
struct Floats {
    single: f32,
    double: f64,
}

fn out_of_range(json: &str) -> Option<&'static str> {
    match from_str::<Ints>(json).unwrap_err().kind {
        JsonErrorKind::MalformedInput(Malformed::NumberOutOfRange { target }) => Some(target),
        _ => None,
    }
}

#[test]
fn integer_boundaries() {
    let ints: Ints = from_str(
        r#"{"a":-128,"b":255,"c":-9223372036854775808,"d":18446744073709551615,"e":65535}"#,
    )
    .unwrap();
    assert_eq!(
        ints,
        Ints {
            a: i8::MIN,
            b: u8::MAX,
            c: i64::MIN,
            d: u64::MAX,
            e: u16::MAX,
        }
    );

    assert_eq!(out_of_range(r#"{"a":128}"#), Some("i8"));
    assert_eq!(out_of_range(r#"{"a":-129}"#), Some("i8"));
    assert_eq!(out_of_range(r#"{"b":256}"#), Some("u8"));
    assert_eq!(out_of_range(r#"{"b":-1}"#), Some("u8"));
    assert_eq!(out_of_range(r#"{"c":9223372036854775808}"#), Some("i64"));
    assert_eq!(out_of_range(r#"{"d":18446744073709551616}"#), Some("u64"));
    assert_eq!(out_of_range(r#"{"e":65536}"#), Some("u16"));
}

#[test]
fn out_of_range_points_at_the_number() {
    let err = from_str::<Ints>(r#"{"b": 300}"#).unwrap_err();
    assert_eq!(err.offset, Some(6));
    assert_eq!(err.window.as_deref(), Some("300}"));
}

#[test]
fn integers_reject_fractions_and_exponents() {
    for json in [r#"{"c":1.5}"#, r#"{"c":1e3}"#, r#"{"c":1.0}"#] {
        let err = from_str::<Ints>(json).unwrap_err();
        assert_eq!(
            err.kind,
            JsonErrorKind::MalformedInput(Malformed::InvalidNumber),
            "{json}"
        );
    }
}

#[test]
fn malformed_numbers() {
    for json in [
        r#"{"double":01}"#,
        r#"{"double":-}"#,
        r#"{"double":+1}"#,
        r#"{"double":.5}"#,
        r#"{"double":1.}"#,
        r#"{"double":1e}"#,
    ] {
        assert!(from_str::<Floats>(json).is_err(), "{json} should fail");
    }
}

#[test]
fn floats_parse_exactly() {
    let f: Floats = from_str(r#"{"single":3.4028235e38,"double":1.7976931348623157e308}"#).unwrap();
    assert_eq!(f.single, f32::MAX);
    assert_eq!(f.double, f64::MAX);

    let f: Floats = from_str(r#"{"single":1e-45,"double":5e-324}"#).unwrap();
    assert_eq!(f.single, f32::from_bits(1));
    assert_eq!(f.double, f64::from_bits(1));

    let f: Floats = from_str(r#"{"single":0.1,"double":0.30000000000000004}"#).unwrap();
    assert_eq!(f.single, 0.1);
    assert_eq!(f.double, 0.1 + 0.2);

    let f: Floats = from_str(r#"{"double":-0}"#).unwrap();
    assert!(f.double.is_sign_negative());

    let f: Floats = from_str(r#"{"double":12345678901234567890123}"#).unwrap();
    assert_eq!(f.double, 12345678901234567890123.0);
}

#[test]
fn floats_accept_integer_literals() {
    let f: Floats = from_str(r#"{"single":7,"double":-42}"#).unwrap();
    assert_eq!(f, Floats { single: 7.0, double: -42.0 });
}

#[test]
fn float_overflow_is_out_of_range() {
    let err = from_str::<Floats>(r#"{"double":1e400}"#).unwrap_err();
    assert_eq!(
        err.kind,
        JsonErrorKind::MalformedInput(Malformed::NumberOutOfRange { target: "f64" })
    );
    assert_eq!(err.offset, Some(10));

    let err = from_str::<Floats>(r#"{"single":-3.5e38}"#).unwrap_err();
    assert_eq!(
        err.kind,
        JsonErrorKind::MalformedInput(Malformed::NumberOutOfRange { target: "f32" })
    );

    let err = from_str::<jsonplan::Value>("[1,2e999]").unwrap_err();
    assert_eq!(err.offset, Some(3));

    let f: Floats = from_str(r#"{"single":1e-60,"double":1e-400}"#).unwrap();
    assert_eq!((f.single, f.double), (0.0, 0.0));
}
