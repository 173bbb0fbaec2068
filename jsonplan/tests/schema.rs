use std::collections::HashMap;

use jsonplan::{Kind, Reflect, Schema, schema_of};
use jsonplan_testhelpers::test;

static_assertions::assert_impl_all!(Schema: Send, Sync);
static_assertions::assert_impl_all!(jsonplan::SchemaCache: Send, Sync);

#[derive(Debug, Default, Reflect)]
struct Inner {
    x: Option<i32>,
}

#[derive(Debug, Default, Reflect)]
struct Outer {
    #[json("ID,string")]
    id: u64,
    inner: Option<Box<Inner>>,
    list: Vec<Inner>,
    map: HashMap<String, Option<u8>>,
    raw: Vec<u8>,
}

#[test]
fn schemas_are_built_once() {
    let a = schema_of::<Outer>().unwrap();
    let b = schema_of::<Outer>().unwrap();
    assert!(core::ptr::eq(a, b));
}

#[test]
fn nodes_describe_their_fields() {
    let root = schema_of::<Outer>().unwrap().root();
    assert_eq!(root.kind(), Kind::Record);
    assert_eq!(root.children().len(), 5);

    let id = root.child_by_name("ID").unwrap();
    assert_eq!(id.kind(), Kind::Uint);
    assert!(id.string_tagged());
    assert_eq!(id.size(), 8);
    assert!(root.child_by_name("id").is_none());

    let inner = root.child_by_name("inner").unwrap();
    assert_eq!(inner.kind(), Kind::Record);
    assert_eq!(inner.pointer_depth(), 2);

    assert_eq!(root.child_by_name("list").unwrap().kind(), Kind::Slice);
    assert_eq!(root.child_by_name("map").unwrap().kind(), Kind::Map);
    assert_eq!(root.child_by_name("raw").unwrap().kind(), Kind::Bytes);
}

#[test]
fn pool_plan_covers_the_subtree() {
    let plan = schema_of::<Outer>().unwrap().pool_plan();
    // inner's Option, Inner.x below it, the list element's x and the map value
    assert!(plan.slot_bytes > 0);
    assert!(plan.slice_elem_bytes > 0);
    assert!(!plan.dynamic);
}

#[test]
fn size_hint_follows_outputs() {
    let schema = schema_of::<Outer>().unwrap();
    let big = Outer {
        raw: vec![0; 4096],
        ..Outer::default()
    };
    let json = jsonplan::to_vec(&big).unwrap();
    assert!(schema.size_hint() >= json.len());
}
