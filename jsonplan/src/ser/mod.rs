//! Serializer: replays a schema against a value and appends JSON.

mod escape;
mod hint;

pub use hint::SizeHint;

use alloc::vec::Vec;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonplan_core::{PtrConst, Value};

use crate::schema::{CodecOp, FieldSchema, Hop, Layer, Schema};
use escape::write_str;

/// Extra bytes reserved per remaining slice element beyond the first
/// element's size.
const SLICE_SLACK: usize = 16;

/// Appends the JSON for the value at `value` (of the schema's type).
pub(crate) fn encode(schema: &Schema, value: PtrConst, out: &mut Vec<u8>) {
    Encoder { out }.field(schema.root(), value);
}

struct Encoder<'o> {
    out: &'o mut Vec<u8>,
}

impl Encoder<'_> {
    /// Encodes the field at `ptr`, following its wrappers.
    fn field(&mut self, node: &FieldSchema, mut ptr: PtrConst) {
        for layer in node.layers {
            ptr = match layer {
                Layer::Optional(def) => match unsafe { (def.vtable.get)(ptr) } {
                    Some(inner) => inner,
                    None => {
                        self.out.extend_from_slice(b"null");
                        return;
                    }
                },
                Layer::Boxed(def) => unsafe { (def.vtable.borrow)(ptr) },
            };
        }
        self.base(node, ptr);
    }

    fn base(&mut self, node: &FieldSchema, ptr: PtrConst) {
        let quoted = node.string_tagged;
        // SAFETY (all arms): `ptr` addresses a live value of the type the op was built for
        unsafe {
            match node.op {
                CodecOp::Bool => {
                    let v: &[u8] = if *ptr.get::<bool>() { b"true" } else { b"false" };
                    self.scalar(v, quoted);
                }
                CodecOp::I8 => self.int(*ptr.get::<i8>(), quoted),
                CodecOp::I16 => self.int(*ptr.get::<i16>(), quoted),
                CodecOp::I32 => self.int(*ptr.get::<i32>(), quoted),
                CodecOp::I64 => self.int(*ptr.get::<i64>(), quoted),
                CodecOp::Isize => self.int(*ptr.get::<isize>(), quoted),
                CodecOp::U8 => self.int(*ptr.get::<u8>(), quoted),
                CodecOp::U16 => self.int(*ptr.get::<u16>(), quoted),
                CodecOp::U32 => self.int(*ptr.get::<u32>(), quoted),
                CodecOp::U64 => self.int(*ptr.get::<u64>(), quoted),
                CodecOp::Usize => self.int(*ptr.get::<usize>(), quoted),
                CodecOp::F32 => {
                    let v = *ptr.get::<f32>();
                    if v.is_finite() {
                        self.float(ryu::Buffer::new().format_finite(v), quoted);
                    } else {
                        self.out.extend_from_slice(b"null");
                    }
                }
                CodecOp::F64 => {
                    let v = *ptr.get::<f64>();
                    if v.is_finite() {
                        self.float(ryu::Buffer::new().format_finite(v), quoted);
                    } else {
                        self.out.extend_from_slice(b"null");
                    }
                }
                CodecOp::String => write_str(self.out, ptr.get::<alloc::string::String>()),
                CodecOp::Bytes(def) => {
                    let len = (def.vtable.len)(ptr);
                    let data = (def.vtable.as_ptr)(ptr).as_byte_ptr();
                    let bytes = core::slice::from_raw_parts(data, len);
                    self.bytes(bytes);
                }
                CodecOp::Record => self.record(node, ptr),
                CodecOp::Slice(def) => {
                    let len = (def.vtable.len)(ptr);
                    let data = (def.vtable.as_ptr)(ptr);
                    self.slice(&node.children[0], data, def.t.layout.size(), len);
                }
                CodecOp::Map(def) => {
                    let elem = &node.children[0];
                    self.out.push(b'{');
                    let start = self.out.len();
                    (def.vtable.for_each)(ptr, &mut |k, v| {
                        write_str(self.out, k.get::<alloc::string::String>());
                        self.out.push(b':');
                        self.field(elem, v);
                        self.out.push(b',');
                    });
                    self.close(start, b'}');
                }
                CodecOp::Dynamic => self.dynamic(ptr.get::<Value>()),
            }
        }
    }

    fn record(&mut self, node: &FieldSchema, base: PtrConst) {
        self.out.push(b'{');
        let start = self.out.len();
        for child in node.children {
            let Some(owner) = resolve_hops(child.hops, base) else {
                continue;
            };
            // SAFETY: offsets were taken from the owner's layout
            let ptr = unsafe { owner.field(child.offset) };
            if child.omit_empty && is_empty(child, ptr) {
                continue;
            }
            self.out.extend_from_slice(&child.encoded_key);
            self.field(child, ptr);
            self.out.push(b',');
        }
        self.close(start, b'}');
    }

    /// Encodes the first element, then reserves room for the rest based on
    /// its size.
    fn slice(&mut self, elem: &FieldSchema, data: PtrConst, stride: usize, len: usize) {
        self.out.push(b'[');
        if len == 0 {
            self.out.push(b']');
            return;
        }
        let before = self.out.len();
        self.field(elem, data);
        let per = self.out.len() - before;
        if len > 1 {
            self.out
                .reserve((per + 1 + SLICE_SLACK).saturating_mul(len - 1));
        }
        for i in 1..len {
            self.out.push(b',');
            // SAFETY: i < len
            self.field(elem, unsafe { data.field(i * stride) });
        }
        self.out.push(b']');
    }

    fn dynamic(&mut self, value: &Value) {
        match value {
            Value::Null => self.out.extend_from_slice(b"null"),
            Value::Bool(true) => self.out.extend_from_slice(b"true"),
            Value::Bool(false) => self.out.extend_from_slice(b"false"),
            Value::Number(n) if n.is_finite() => {
                self.float(ryu::Buffer::new().format_finite(*n), false);
            }
            Value::Number(_) => self.out.extend_from_slice(b"null"),
            Value::String(s) => write_str(self.out, s),
            Value::Array(items) => {
                self.out.push(b'[');
                let start = self.out.len();
                for item in items {
                    self.dynamic(item);
                    self.out.push(b',');
                }
                self.close(start, b']');
            }
            Value::Object(map) => {
                self.out.push(b'{');
                let start = self.out.len();
                for (k, v) in map {
                    write_str(self.out, k);
                    self.out.push(b':');
                    self.dynamic(v);
                    self.out.push(b',');
                }
                self.close(start, b'}');
            }
        }
    }

    /// Turns the trailing `,` into `close`, or appends `close` when nothing
    /// was written since `start`.
    #[inline]
    fn close(&mut self, start: usize, close: u8) {
        if self.out.len() > start {
            if let Some(last) = self.out.last_mut() {
                *last = close;
            }
        } else {
            self.out.push(close);
        }
    }

    /// Standard base64, padded, in quotes.
    fn bytes(&mut self, bytes: &[u8]) {
        self.out.push(b'"');
        let start = self.out.len();
        let len = base64::encoded_len(bytes.len(), true).unwrap_or(0);
        self.out.resize(start + len, 0);
        let written = STANDARD
            .encode_slice(bytes, &mut self.out[start..])
            .unwrap_or(0);
        self.out.truncate(start + written);
        self.out.push(b'"');
    }

    #[inline]
    fn scalar(&mut self, text: &[u8], quoted: bool) {
        if quoted {
            self.out.push(b'"');
            self.out.extend_from_slice(text);
            self.out.push(b'"');
        } else {
            self.out.extend_from_slice(text);
        }
    }

    #[inline]
    fn int(&mut self, v: impl itoa::Integer, quoted: bool) {
        let mut buf = itoa::Buffer::new();
        self.scalar(buf.format(v).as_bytes(), quoted);
    }

    #[inline]
    fn float(&mut self, text: &str, quoted: bool) {
        let text = text.strip_suffix(".0").unwrap_or(text);
        self.scalar(text.as_bytes(), quoted);
    }
}

/// Follows embed hops from `base`; `None` when an `Option` on the way is
/// empty.
fn resolve_hops(hops: &[Hop], mut base: PtrConst) -> Option<PtrConst> {
    for hop in hops {
        // SAFETY: hop offsets come from the owner's layout
        base = unsafe { base.field(hop.offset) };
        for layer in hop.layers {
            base = match layer {
                Layer::Optional(def) => unsafe { (def.vtable.get)(base) }?,
                Layer::Boxed(def) => unsafe { (def.vtable.borrow)(base) },
            };
        }
    }
    Some(base)
}

/// Whether `omitempty` drops the field at `ptr`.
fn is_empty(node: &FieldSchema, ptr: PtrConst) -> bool {
    match node.layers.first() {
        Some(Layer::Optional(def)) => return !unsafe { (def.vtable.is_some)(ptr) },
        Some(Layer::Boxed(_)) => return false,
        None => {}
    }
    // SAFETY (all arms): `ptr` addresses a live value of the type the op was built for
    unsafe {
        match node.op {
            CodecOp::Bool => !*ptr.get::<bool>(),
            CodecOp::I8 => *ptr.get::<i8>() == 0,
            CodecOp::I16 => *ptr.get::<i16>() == 0,
            CodecOp::I32 => *ptr.get::<i32>() == 0,
            CodecOp::I64 => *ptr.get::<i64>() == 0,
            CodecOp::Isize => *ptr.get::<isize>() == 0,
            CodecOp::U8 => *ptr.get::<u8>() == 0,
            CodecOp::U16 => *ptr.get::<u16>() == 0,
            CodecOp::U32 => *ptr.get::<u32>() == 0,
            CodecOp::U64 => *ptr.get::<u64>() == 0,
            CodecOp::Usize => *ptr.get::<usize>() == 0,
            CodecOp::F32 => *ptr.get::<f32>() == 0.0,
            CodecOp::F64 => *ptr.get::<f64>() == 0.0,
            CodecOp::String => ptr.get::<alloc::string::String>().is_empty(),
            CodecOp::Bytes(def) | CodecOp::Slice(def) => (def.vtable.len)(ptr) == 0,
            CodecOp::Map(def) => (def.vtable.len)(ptr) == 0,
            CodecOp::Record => false,
            CodecOp::Dynamic => ptr.get::<Value>().is_null(),
        }
    }
}
