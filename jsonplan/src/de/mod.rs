//! Parser: walks input bytes against a schema, writing into raw memory.
//!
//! Each JSON production has its own small state machine. Values land
//! directly at their field's address; `Option` contents are built in an
//! arena pointer slot and moved in once complete, slice and map elements
//! are collected in arena frames and installed in one go. On error, arena
//! contents of the failed call are dropped and the destination keeps
//! whatever complete values were already written.

mod cursor;
mod number;

use alloc::string::String;
use core::mem::ManuallyDrop;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonplan_core::{ListDef, MapDef, Object, PtrMut, Value};

use crate::arena::{Arena, Frame};
use crate::error::{MAX_DEPTH, Malformed, Result};
use crate::schema::{CodecOp, FieldSchema, Hop, Kind, Layer, Schema};
use cursor::Cursor;

/// Decodes `input` into the value at `dest`, which must be of the schema's
/// type.
pub(crate) fn decode(schema: &Schema, arena: &mut Arena, input: &[u8], dest: PtrMut) -> Result<()> {
    arena.prepare(schema);
    let mut de = Decoder {
        cur: Cursor::new(input),
        arena,
        depth: 0,
    };
    de.root(schema.root(), dest)?;
    de.cur.finish()
}

struct Decoder<'i, 'a> {
    cur: Cursor<'i>,
    arena: &'a mut Arena,
    /// Open arrays and objects inside the current dynamic value.
    depth: usize,
}

impl Decoder<'_, '_> {
    fn root(&mut self, node: &'static FieldSchema, dest: PtrMut) -> Result<()> {
        let open = match node.kind() {
            Kind::Record | Kind::Map => Some((b'{', "`{`")),
            Kind::Slice => Some((b'[', "`[`")),
            _ => None,
        };
        if let Some((open, expected)) = open
            && self.cur.peek_or_eof(expected)? != open
        {
            return Err(self.cur.unexpected(expected));
        }
        self.field(node, dest)
    }

    /// Decodes into the field at `ptr`, going through its wrappers.
    #[inline]
    fn field(&mut self, node: &'static FieldSchema, ptr: PtrMut) -> Result<()> {
        if node.layers.is_empty() {
            self.base(node, ptr)
        } else {
            self.layers(node, node.layers, ptr)
        }
    }

    fn layers(
        &mut self,
        node: &'static FieldSchema,
        layers: &'static [Layer],
        ptr: PtrMut,
    ) -> Result<()> {
        let Some((layer, rest)) = layers.split_first() else {
            return self.base(node, ptr);
        };
        match layer {
            Layer::Boxed(def) => {
                let inner = unsafe { (def.vtable.borrow_mut)(ptr) };
                self.layers(node, rest, inner)
            }
            Layer::Optional(def) => {
                if self.cur.eat_null()? {
                    unsafe { (def.vtable.set_none)(ptr) };
                    return Ok(());
                }
                if let Some(inner) = unsafe { (def.vtable.get_mut)(ptr) } {
                    return self.layers(node, rest, inner);
                }
                let mut frame = self.arena.slots.begin(def.t);
                let slot = self.arena.slots.push_default(&mut frame);
                match self.layers(node, rest, slot) {
                    Ok(()) => {
                        // SAFETY: the slot holds a complete value, which moves out here
                        unsafe { (def.vtable.put_some)(ptr, slot) };
                        self.arena.slots.finish(frame);
                        Ok(())
                    }
                    Err(err) => {
                        self.arena.slots.abort(frame);
                        Err(err)
                    }
                }
            }
        }
    }

    /// Decodes the unwrapped value of `node` at `ptr`.
    fn base(&mut self, node: &'static FieldSchema, ptr: PtrMut) -> Result<()> {
        if let CodecOp::Dynamic = node.op {
            let value = self.value()?;
            unsafe { *ptr.as_mut::<Value>() = value };
            return Ok(());
        }
        if self.cur.eat_null()? {
            return Ok(());
        }

        let quoted = node.string_tagged && self.cur.eat(b'"');
        // SAFETY (all arms): `ptr` addresses a live value of the type the op was built for
        unsafe {
            match node.op {
                CodecOp::Bool => *ptr.as_mut::<bool>() = self.cur.bool()?,
                CodecOp::I8 => *ptr.as_mut::<i8>() = self.signed("i8")?,
                CodecOp::I16 => *ptr.as_mut::<i16>() = self.signed("i16")?,
                CodecOp::I32 => *ptr.as_mut::<i32>() = self.signed("i32")?,
                CodecOp::I64 => *ptr.as_mut::<i64>() = self.signed("i64")?,
                CodecOp::Isize => *ptr.as_mut::<isize>() = self.signed("isize")?,
                CodecOp::U8 => *ptr.as_mut::<u8>() = self.unsigned("u8")?,
                CodecOp::U16 => *ptr.as_mut::<u16>() = self.unsigned("u16")?,
                CodecOp::U32 => *ptr.as_mut::<u32>() = self.unsigned("u32")?,
                CodecOp::U64 => *ptr.as_mut::<u64>() = self.unsigned("u64")?,
                CodecOp::Usize => *ptr.as_mut::<usize>() = self.unsigned("usize")?,
                CodecOp::F32 => {
                    let (n, text) = self.cur.number()?;
                    *ptr.as_mut::<f32>() =
                        n.to_f32(text).map_err(|r| self.cur.number_error(&n, r))?;
                }
                CodecOp::F64 => {
                    let (n, text) = self.cur.number()?;
                    *ptr.as_mut::<f64>() =
                        n.to_f64(text).map_err(|r| self.cur.number_error(&n, r))?;
                }
                CodecOp::String => {
                    let s = self.cur.str(&mut self.arena.key)?;
                    let target = ptr.as_mut::<String>();
                    target.clear();
                    target.push_str(s);
                }
                CodecOp::Bytes(_) => self.bytes(ptr.as_mut::<alloc::vec::Vec<u8>>())?,
                CodecOp::Record => self.record(node, ptr)?,
                CodecOp::Slice(def) => self.slice(node, def, ptr)?,
                CodecOp::Map(def) => self.map(node, def, ptr)?,
                CodecOp::Dynamic => {}
            }
        }
        if quoted {
            self.cur.expect(b'"', "`\"`")?;
        }
        Ok(())
    }

    fn signed<T: TryFrom<i64>>(&mut self, target: &'static str) -> Result<T> {
        let (n, _) = self.cur.number()?;
        let v = n.to_i64(target).map_err(|r| self.cur.number_error(&n, r))?;
        T::try_from(v)
            .map_err(|_| self.cur.number_error(&n, Malformed::NumberOutOfRange { target }))
    }

    fn unsigned<T: TryFrom<u64>>(&mut self, target: &'static str) -> Result<T> {
        let (n, _) = self.cur.number()?;
        let v = n.to_u64(target).map_err(|r| self.cur.number_error(&n, r))?;
        T::try_from(v)
            .map_err(|_| self.cur.number_error(&n, Malformed::NumberOutOfRange { target }))
    }

    fn bytes(&mut self, target: &mut alloc::vec::Vec<u8>) -> Result<()> {
        self.cur.peek();
        let start = self.cur.pos();
        let text = self.cur.str(&mut self.arena.key)?;
        target.clear();
        if STANDARD.decode_vec(text, target).is_err() {
            return Err(self.cur.error_at(Malformed::InvalidBase64, start));
        }
        Ok(())
    }

    fn record(&mut self, node: &'static FieldSchema, base: PtrMut) -> Result<()> {
        self.cur.expect(b'{', "`{`")?;
        if self.cur.eat(b'}') {
            return Ok(());
        }
        loop {
            let key = self.cur.key(&mut self.arena.key)?;
            let child = node.lookup(key);
            self.cur.expect(b':', "`:`")?;
            match child {
                Some(child) => {
                    let owner = if child.has_hops() {
                        vivify_hops(child.hops, base)
                    } else {
                        base
                    };
                    // SAFETY: offsets were taken from the owner's layout
                    self.field(child, unsafe { owner.field(child.offset) })?;
                }
                None => self.cur.skip_value()?,
            }
            if !self.cur.comma_or(b'}', "`,` or `}`")? {
                return Ok(());
            }
        }
    }

    fn slice(&mut self, node: &'static FieldSchema, def: ListDef, ptr: PtrMut) -> Result<()> {
        self.cur.expect(b'[', "`[`")?;
        let elem = &node.children[0];
        let mut frame = self.arena.elems.begin(def.t);
        match self.elements(elem, &mut frame) {
            Ok(()) => {
                let elems = self.arena.elems.elements(&frame);
                // SAFETY: the frame holds `len` complete elements, which move out here
                unsafe { (def.vtable.install)(ptr, elems, frame.len()) };
                self.arena.elems.finish(frame);
                Ok(())
            }
            Err(err) => {
                self.arena.elems.abort(frame);
                Err(err)
            }
        }
    }

    fn elements(&mut self, elem: &'static FieldSchema, frame: &mut Frame) -> Result<()> {
        if self.cur.eat(b']') {
            return Ok(());
        }
        loop {
            let slot = self.arena.elems.push_default(frame);
            self.field(elem, slot)?;
            if !self.cur.comma_or(b']', "`,` or `]`")? {
                return Ok(());
            }
        }
    }

    fn map(&mut self, node: &'static FieldSchema, def: MapDef, ptr: PtrMut) -> Result<()> {
        self.cur.expect(b'{', "`{`")?;
        let elem = &node.children[0];
        let keys_start = self.arena.keys.len();
        let mut frame = self.arena.elems.begin(def.v);
        if let Err(err) = self.entries(elem, &mut frame) {
            self.arena.elems.abort(frame);
            self.arena.keys.truncate(keys_start);
            return Err(err);
        }

        let arena = &mut *self.arena;
        // SAFETY: the map is live; keys and values are complete and move out one by one
        unsafe {
            (def.vtable.reserve)(ptr, frame.len());
            for (i, key) in arena.keys.drain(keys_start..).enumerate() {
                let mut key = ManuallyDrop::new(key);
                (def.vtable.insert)(
                    ptr,
                    PtrMut::from_mut(&mut *key),
                    arena.elems.element(&frame, i),
                );
            }
        }
        arena.elems.finish(frame);
        Ok(())
    }

    fn entries(&mut self, elem: &'static FieldSchema, frame: &mut Frame) -> Result<()> {
        if self.cur.eat(b'}') {
            return Ok(());
        }
        loop {
            let key = String::from(self.cur.str(&mut self.arena.key)?);
            self.arena.keys.push(key);
            self.cur.expect(b':', "`:`")?;
            let slot = self.arena.elems.push_default(frame);
            self.field(elem, slot)?;
            if !self.cur.comma_or(b'}', "`,` or `}`")? {
                return Ok(());
            }
        }
    }

    /// Decodes any value; arrays and objects are collected on the arena's
    /// stacks before being built, at most [`MAX_DEPTH`] levels deep.
    fn value(&mut self) -> Result<Value> {
        match self.cur.peek_or_eof("a value")? {
            b'n' => {
                self.cur.eat_null()?;
                Ok(Value::Null)
            }
            b't' | b'f' => Ok(Value::Bool(self.cur.bool()?)),
            b'"' => Ok(Value::String(self.cur.str(&mut self.arena.key)?.into())),
            b'-' | b'0'..=b'9' => {
                let (n, text) = self.cur.number()?;
                let v = n.to_f64(text).map_err(|r| self.cur.number_error(&n, r))?;
                Ok(Value::Number(v))
            }
            open @ (b'[' | b'{') => {
                if self.depth == MAX_DEPTH {
                    return Err(self.cur.error_at(Malformed::DepthLimit, self.cur.pos()));
                }
                self.depth += 1;
                let value = if open == b'[' {
                    self.array()
                } else {
                    self.object()
                };
                self.depth -= 1;
                value
            }
            _ => Err(self.cur.unexpected("a value")),
        }
    }

    fn array(&mut self) -> Result<Value> {
        self.cur.expect(b'[', "`[`")?;
        let start = self.arena.values.len();
        if !self.cur.eat(b']') {
            loop {
                let v = self.value()?;
                self.arena.values.push(v);
                if !self.cur.comma_or(b']', "`,` or `]`")? {
                    break;
                }
            }
        }
        Ok(Value::Array(self.arena.values.drain(start..).collect()))
    }

    fn object(&mut self) -> Result<Value> {
        self.cur.expect(b'{', "`{`")?;
        let keys_start = self.arena.keys.len();
        let values_start = self.arena.values.len();
        if !self.cur.eat(b'}') {
            loop {
                let key = String::from(self.cur.str(&mut self.arena.key)?);
                self.arena.keys.push(key);
                self.cur.expect(b':', "`:`")?;
                let v = self.value()?;
                self.arena.values.push(v);
                if !self.cur.comma_or(b'}', "`,` or `}`")? {
                    break;
                }
            }
        }
        let arena = &mut *self.arena;
        let mut object = Object::with_capacity(arena.values.len() - values_start);
        object.extend(
            arena
                .keys
                .drain(keys_start..)
                .zip(arena.values.drain(values_start..)),
        );
        Ok(Value::Object(object))
    }
}

/// Follows embed hops from `base`, filling in empty `Option`s on the way.
fn vivify_hops(hops: &[Hop], mut base: PtrMut) -> PtrMut {
    for hop in hops {
        // SAFETY: hop offsets come from the owner's layout
        base = unsafe { base.field(hop.offset) };
        for layer in hop.layers {
            base = match layer {
                Layer::Optional(def) => unsafe { (def.vtable.vivify)(base) },
                Layer::Boxed(def) => unsafe { (def.vtable.borrow_mut)(base) },
            };
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::cache::SchemaCache;
    use crate::Reflect;
    use jsonplan_testhelpers::test;

    #[derive(Debug, Default, PartialEq, Reflect)]
    #[json(crate = crate)]
    struct Item {
        name: String,
        qty: Option<u32>,
        tags: Vec<String>,
    }

    #[derive(Debug, Default, PartialEq, Reflect)]
    #[json(crate = crate)]
    struct Order {
        items: Vec<Item>,
        notes: Option<Option<Box<String>>>,
        attrs: HashMap<String, Vec<u8>>,
    }

    fn decode_with(arena: &mut Arena, input: &str) -> Result<Order> {
        let schema = SchemaCache::global().get_or_build(Order::SHAPE)?;
        let mut order = Order::default();
        decode(schema, arena, input.as_bytes(), PtrMut::from_mut(&mut order))?;
        Ok(order)
    }

    #[test]
    fn scratch_is_released_after_success() {
        let mut arena = Arena::new();
        let order = decode_with(
            &mut arena,
            r#"{"items":[{"name":"a","qty":2,"tags":["x","y"]},{"name":"b","qty":null}],
                "notes":"n","attrs":{"k":"AQI="}}"#,
        )
        .unwrap();
        assert!(arena.is_idle());
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].qty, Some(2));
        assert_eq!(order.items[0].tags, ["x", "y"]);
        assert_eq!(order.items[1].qty, None);
        assert_eq!(order.notes, Some(Some(Box::new("n".into()))));
        assert_eq!(order.attrs["k"], [1, 2]);
    }

    #[test]
    fn frames_are_unwound_on_error() {
        let mut arena = Arena::new();
        let err = decode_with(
            &mut arena,
            r#"{"items":[{"name":"a","tags":["x", 1]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "jsonplan::malformed_input");
        assert!(arena.slots.is_idle());
        assert!(arena.elems.is_idle());

        let err = decode_with(&mut arena, r#"{"attrs":{"a":"AQI=","b":"!!"}}"#).unwrap_err();
        assert_eq!(
            err.kind,
            crate::error::JsonErrorKind::MalformedInput(Malformed::InvalidBase64)
        );
        assert!(arena.is_idle());
    }

    #[test]
    fn arenas_are_reusable() {
        let mut arena = Arena::new();
        for i in 0..3 {
            let input = format!(r#"{{"items":[{{"name":"{i}"}}]}}"#);
            let order = decode_with(&mut arena, &input).unwrap();
            assert_eq!(order.items[0].name, i.to_string());
            assert!(arena.is_idle());
        }
    }

    #[test]
    fn root_must_open_with_the_right_bracket() {
        let mut arena = Arena::new();
        let err = decode_with(&mut arena, "[]").unwrap_err();
        assert_eq!(
            err.kind,
            crate::error::JsonErrorKind::MalformedInput(Malformed::UnexpectedByte {
                got: b'[',
                expected: "`{`"
            })
        );
        let err = decode_with(&mut arena, "  ").unwrap_err();
        assert_eq!(err.offset, Some(2));
    }
}
