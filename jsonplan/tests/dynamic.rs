use std::collections::HashMap;

use indexmap::IndexMap;
use jsonplan::{JsonErrorKind, MAX_DEPTH, Malformed, Object, Reflect, Value, from_str, to_string};
use jsonplan_testhelpers::test;

#[derive(Debug, Default, PartialEq, Reflect)]
struct Envelope {
    kind: String,
    payload: Value,
    headers: HashMap<String, Value>,
}

#[test]
fn any_value_decodes() {
    let env: Envelope = from_str(
        r#"{"kind":"k","payload":{"a":[1,2.5,-3e2],"b":{"c":null,"d":true},"e":"s"}}"#,
    )
    .unwrap();
    let payload = env.payload.as_object().unwrap();
    assert_eq!(
        payload["a"],
        Value::Array(vec![
            Value::Number(1.0),
            Value::Number(2.5),
            Value::Number(-300.0)
        ])
    );
    assert!(payload["b"].get("c").unwrap().is_null());
    assert_eq!(payload["b"].get("d").and_then(Value::as_bool), Some(true));
    assert_eq!(payload["e"].as_str(), Some("s"));
}

#[test]
fn objects_keep_input_order() {
    let v: Value = from_str(r#"{"z":1,"a":2,"m":[]}"#).unwrap();
    let keys: Vec<&str> = v.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, ["z", "a", "m"]);
    assert_eq!(to_string(&v).unwrap(), r#"{"z":1,"a":2,"m":[]}"#);
}

#[test]
fn null_replaces_dynamic_values() {
    let mut env = Envelope {
        payload: Value::Bool(true),
        ..Envelope::default()
    };
    jsonplan::from_slice_into(br#"{"payload":null}"#, &mut env).unwrap();
    assert_eq!(env.payload, Value::Null);
}

#[test]
fn nested_values_roundtrip() {
    let mut inner = Object::new();
    inner.insert("x".into(), Value::String("quote\"d".into()));
    inner.insert("y".into(), Value::Array(vec![Value::Null, Value::Bool(false)]));
    let env = Envelope {
        kind: "t".into(),
        payload: Value::Object(inner),
        headers: [("h".to_string(), Value::Number(0.5))].into_iter().collect(),
    };
    let json = to_string(&env).unwrap();
    assert_eq!(
        json,
        r#"{"kind":"t","payload":{"x":"quote\"d","y":[null,false]},"headers":{"h":0.5}}"#
    );
    assert_eq!(from_str::<Envelope>(&json).unwrap(), env);
}

#[test]
fn top_level_values() {
    let v: Value = from_str(r#"[1,"two",{"three":3}]"#).unwrap();
    assert_eq!(v.as_array().map(<[Value]>::len), Some(3));
    assert_eq!(to_string(&v).unwrap(), r#"[1,"two",{"three":3}]"#);

    let v: Value = from_str("  42 ").unwrap();
    assert_eq!(v.as_f64(), Some(42.0));
}

#[test]
fn indexmap_preserves_order() {
    let map: IndexMap<String, u32> = from_str(r#"{"b":2,"a":1,"c":3}"#).unwrap();
    assert_eq!(map.keys().collect::<Vec<_>>(), ["b", "a", "c"]);
    assert_eq!(to_string(&map).unwrap(), r#"{"b":2,"a":1,"c":3}"#);
}

#[test]
fn map_keys_are_unescaped() {
    let map: HashMap<String, Vec<i32>> = from_str(r#"{"a\tb":[1],"é":[]}"#).unwrap();
    assert_eq!(map["a\tb"], [1]);
    assert!(map["é"].is_empty());
    assert!(to_string(&map).unwrap().contains(r#""a\tb":[1]"#));
}

#[test]
fn failed_map_entries_are_dropped() {
    let err = from_str::<HashMap<String, Vec<String>>>(r#"{"a":["x"],"b":["y",2]}"#).unwrap_err();
    assert_eq!(err.code(), "jsonplan::malformed_input");
    // the pooled arena is clean for the next call
    let ok: HashMap<String, Vec<String>> = from_str(r#"{"c":["z"]}"#).unwrap();
    assert_eq!(ok.len(), 1);
}

fn nested_arrays(depth: usize) -> String {
    "[".repeat(depth) + &"]".repeat(depth)
}

#[test]
fn nesting_up_to_the_limit_decodes() {
    let input = nested_arrays(MAX_DEPTH);
    let mut v: Value = from_str(&input).unwrap();
    let mut depth = 1;
    while let Value::Array(items) = v {
        match items.into_iter().next() {
            Some(inner) => {
                depth += 1;
                v = inner;
            }
            None => break,
        }
    }
    assert_eq!(depth, MAX_DEPTH);
    assert_eq!(to_string(&from_str::<Value>(&input).unwrap()).unwrap(), input);

    let objects = r#"{"a":"#.repeat(MAX_DEPTH - 1) + "{}" + &"}".repeat(MAX_DEPTH - 1);
    assert!(from_str::<Value>(&objects).is_ok());
}

#[test]
fn nesting_past_the_limit_is_an_error() {
    let err = from_str::<Value>(&nested_arrays(MAX_DEPTH + 1)).unwrap_err();
    assert_eq!(err.kind, JsonErrorKind::MalformedInput(Malformed::DepthLimit));
    assert_eq!(err.offset, Some(MAX_DEPTH));

    for depth in [2_000, 200_000] {
        let err = from_str::<Value>(&nested_arrays(depth)).unwrap_err();
        assert_eq!(err.kind, JsonErrorKind::MalformedInput(Malformed::DepthLimit));
    }

    let mixed = r#"{"k":"#.repeat(MAX_DEPTH) + "[]" + &"}".repeat(MAX_DEPTH);
    let err = from_str::<Envelope>(&format!(r#"{{"kind":"k","payload":{mixed}}}"#)).unwrap_err();
    assert_eq!(err.kind, JsonErrorKind::MalformedInput(Malformed::DepthLimit));
}
