//! Compiled per-type codec plans.
//!
//! A [`Schema`] is built once per destination type and is immutable from
//! then on. It is a tree of [`FieldSchema`] nodes: a record node has one
//! child per (possibly embedded) field, slices and maps have a single
//! synthetic child describing their elements. Every node knows where its
//! value lives relative to its owner, which wrappers (`Option`, `Box`) sit
//! in front of the value, and which [`CodecOp`] reads and writes it.

mod builder;

pub(crate) use builder::build_root;

use alloc::boxed::Box;
use core::ptr::NonNull;
use std::collections::HashMap;

use jsonplan_core::{ListDef, MapDef, OptionDef, PointerDef, Shape};

use crate::arena::BatchObj;
use crate::ser::SizeHint;
use crate::trie::KeyTrie;

/// What a node holds once its wrappers are stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// `bool`
    Bool,
    /// Signed integer of any width
    Int,
    /// Unsigned integer of any width
    Uint,
    /// `f32` or `f64`
    Float,
    /// `String`
    String,
    /// `Vec<u8>`, carried as base64
    Bytes,
    /// A declared record
    Record,
    /// `Vec<T>`
    Slice,
    /// A `String`-keyed map
    Map,
    /// [`jsonplan_core::Value`]
    Dynamic,
}

/// How a node's base value is decoded and encoded.
#[derive(Debug, Clone, Copy)]
pub enum CodecOp {
    /// `bool`
    Bool,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `isize`
    Isize,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `usize`
    Usize,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `String`
    String,
    /// `Vec<u8>` as base64
    Bytes(ListDef),
    /// fields are the node's children
    Record,
    /// elements are described by the node's single child
    Slice(ListDef),
    /// values are described by the node's single child
    Map(MapDef),
    /// [`jsonplan_core::Value`]
    Dynamic,
}

impl CodecOp {
    /// The kind this operation handles.
    pub fn kind(&self) -> Kind {
        match self {
            CodecOp::Bool => Kind::Bool,
            CodecOp::I8 | CodecOp::I16 | CodecOp::I32 | CodecOp::I64 | CodecOp::Isize => Kind::Int,
            CodecOp::U8 | CodecOp::U16 | CodecOp::U32 | CodecOp::U64 | CodecOp::Usize => {
                Kind::Uint
            }
            CodecOp::F32 | CodecOp::F64 => Kind::Float,
            CodecOp::String => Kind::String,
            CodecOp::Bytes(_) => Kind::Bytes,
            CodecOp::Record => Kind::Record,
            CodecOp::Slice(_) => Kind::Slice,
            CodecOp::Map(_) => Kind::Map,
            CodecOp::Dynamic => Kind::Dynamic,
        }
    }

    /// Whether the `string` tag option applies.
    pub(crate) fn is_quotable(&self) -> bool {
        matches!(self.kind(), Kind::Bool | Kind::Int | Kind::Uint | Kind::Float)
    }
}

/// One wrapper between a field's address and its base value.
#[derive(Debug, Clone, Copy)]
pub enum Layer {
    /// `Option<_>`: may be absent; decode materializes it in a pointer slot
    Optional(OptionDef),
    /// `Box<_>`: always present, followed in place
    Boxed(PointerDef),
}

/// One step from an owner to the record an embedded field was spliced
/// from: go `offset` bytes in, then through `layers`.
#[derive(Debug, Clone, Copy)]
pub struct Hop {
    pub(crate) offset: usize,
    pub(crate) layers: &'static [Layer],
}

/// Scratch a subtree needs per decode call, summed bottom-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolPlan {
    /// Bytes of pointer slots (values of `Option` layers), one of each.
    pub slot_bytes: usize,
    /// Largest alignment among those slots.
    pub slot_align: usize,
    /// Bytes of one element of every slice and map in the subtree.
    pub slice_elem_bytes: usize,
    /// Whether dynamic values occur.
    pub dynamic: bool,
}

impl PoolPlan {
    pub(crate) fn add(&mut self, other: &PoolPlan) {
        self.slot_bytes += other.slot_bytes;
        self.slot_align = self.slot_align.max(other.slot_align);
        self.slice_elem_bytes += other.slice_elem_bytes;
        self.dynamic |= other.dynamic;
    }
}

/// A compiled node.
pub struct FieldSchema {
    pub(crate) name: &'static str,
    /// `"name":`, ready to be copied into output.
    pub(crate) encoded_key: Box<[u8]>,
    pub(crate) op: CodecOp,
    pub(crate) offset: usize,
    pub(crate) size: usize,
    pub(crate) layers: &'static [Layer],
    pub(crate) hops: &'static [Hop],
    pub(crate) string_tagged: bool,
    pub(crate) omit_empty: bool,
    pub(crate) children: &'static [FieldSchema],
    pub(crate) by_name: HashMap<&'static str, usize>,
    pub(crate) trie: Option<KeyTrie>,
    pub(crate) pool_plan: PoolPlan,
    pub(crate) shape: &'static Shape,
}

impl FieldSchema {
    /// JSON key; empty for roots and element nodes.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Kind of the base value.
    pub fn kind(&self) -> Kind {
        self.op.kind()
    }

    /// The bound operation.
    pub fn op(&self) -> CodecOp {
        self.op
    }

    /// Byte offset within the owner (after any embed hops).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size in bytes of the field as declared.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of `Option`/`Box` wrappers in front of the base value.
    pub fn pointer_depth(&self) -> usize {
        self.layers.len()
    }

    /// Whether the `string` tag option is set.
    pub fn string_tagged(&self) -> bool {
        self.string_tagged
    }

    /// Whether the `omitempty` tag option is set.
    pub fn omit_empty(&self) -> bool {
        self.omit_empty
    }

    /// Fields of a record, or the element node of a slice or map.
    pub fn children(&self) -> &'static [FieldSchema] {
        self.children
    }

    /// Declared shape of the field.
    pub fn shape(&self) -> &'static Shape {
        self.shape
    }

    /// Scratch this subtree needs per call.
    pub fn pool_plan(&self) -> PoolPlan {
        self.pool_plan
    }

    /// Child with the given JSON key, by hash lookup.
    pub fn child_by_name(&self, name: &str) -> Option<&'static FieldSchema> {
        self.by_name.get(name).map(|&i| &self.children[i])
    }

    /// Child for a raw key that ends with its closing quote, as the parser
    /// sees it. Uses the trie when one could be built.
    #[inline]
    pub fn lookup(&self, raw_key: &[u8]) -> Option<&'static FieldSchema> {
        let idx = match &self.trie {
            Some(trie) => trie.lookup(raw_key),
            None => {
                let (&b'"', name) = raw_key.split_last()? else {
                    return None;
                };
                let name = core::str::from_utf8(name).ok()?;
                self.by_name.get(name).copied()
            }
        };
        idx.map(|i| &self.children[i])
    }

    /// Whether the node is reached through an embedded `Option`/`Box`.
    pub(crate) fn has_hops(&self) -> bool {
        !self.hops.is_empty()
    }
}

impl core::fmt::Debug for FieldSchema {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FieldSchema")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("offset", &self.offset)
            .field("pointer_depth", &self.pointer_depth())
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// The compiled plan for one destination type.
pub struct Schema {
    pub(crate) root: &'static FieldSchema,
    pub(crate) slot_blocks: Option<BatchObj>,
    pub(crate) hint: SizeHint,
}

impl Schema {
    /// The root node.
    pub fn root(&self) -> &'static FieldSchema {
        self.root
    }

    /// Scratch a decode of this type needs.
    pub fn pool_plan(&self) -> PoolPlan {
        self.root.pool_plan
    }

    /// Current output size estimate for encoding.
    pub fn size_hint(&self) -> usize {
        self.hint.get()
    }

    /// A fresh block sized to the pool plan's pointer slots.
    pub(crate) fn slot_block(&self) -> Option<NonNull<u8>> {
        self.slot_blocks.as_ref().map(BatchObj::alloc)
    }
}

impl core::fmt::Debug for Schema {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Schema")
            .field("root", &self.root)
            .field("plan", &self.pool_plan())
            .finish_non_exhaustive()
    }
}
