use alloc::alloc::Layout;
use alloc::vec::Vec;
use core::any::TypeId;
use std::collections::{HashMap, HashSet};

use jsonplan_core::{Def, ScalarType, Shape, StructDef};

use super::{CodecOp, FieldSchema, Hop, Layer, PoolPlan, Schema};
use crate::arena::{Batch, BatchObj};
use crate::error::{JsonError, JsonErrorKind, Result};
use crate::ser::SizeHint;
use crate::tag::parse_tag;
use crate::trie::{KeyTrie, TrieError};

static NODES: Batch<FieldSchema> = Batch::new();
static LAYERS: Batch<Layer> = Batch::new();
static HOPS: Batch<Hop> = Batch::new();

/// Slot blocks handed out per chunk of a schema's slot batch.
const SLOT_BLOCKS_PER_CHUNK: usize = 64;

/// Compiles the schema for a destination of `shape`.
pub(crate) fn build_root(shape: &'static Shape) -> Result<Schema> {
    if !matches!(
        shape.def,
        Def::Struct(_) | Def::Map(_) | Def::List(_) | Def::Dynamic
    ) {
        return Err(JsonError::new(JsonErrorKind::DestinationNotSettable {
            type_name: (shape.type_name)(),
        }));
    }

    let mut builder = Builder::default();
    let root = builder.node(shape, "", 0, false, false)?;
    let plan = root.pool_plan;
    debug!(
        ty = shape.type_identifier,
        fields = root.children.len(),
        slot_bytes = plan.slot_bytes,
        elem_bytes = plan.slice_elem_bytes,
        "schema built"
    );

    let slot_blocks = (plan.slot_bytes > 0)
        .then(|| {
            Layout::from_size_align(plan.slot_bytes, plan.slot_align.max(16))
                .ok()
                .map(|layout| BatchObj::new(layout.pad_to_align(), SLOT_BLOCKS_PER_CHUNK))
        })
        .flatten();

    Ok(Schema {
        root: NODES.alloc(root),
        slot_blocks,
        hint: SizeHint::new(),
    })
}

#[derive(Default)]
struct Builder {
    /// Records currently being compiled, outermost first.
    ancestors: Vec<TypeId>,
}

impl Builder {
    fn node(
        &mut self,
        shape: &'static Shape,
        name: &'static str,
        offset: usize,
        string_tagged: bool,
        omit_empty: bool,
    ) -> Result<FieldSchema> {
        let mut plan = PoolPlan::default();
        let (layers, base) = strip_layers(shape);
        for layer in &layers {
            if let Layer::Optional(def) = layer {
                plan.slot_bytes += def.t.layout.size();
                plan.slot_align = plan.slot_align.max(def.t.layout.align());
            }
        }

        let mut children: Vec<FieldSchema> = Vec::new();
        let op = match base.def {
            Def::Scalar(scalar) => scalar_op(scalar),
            Def::List(def) if def.t.is::<u8>() => CodecOp::Bytes(def),
            Def::List(def) => {
                children.push(self.node(def.t, "", 0, false, false)?);
                plan.slice_elem_bytes += def.t.layout.size();
                CodecOp::Slice(def)
            }
            Def::Map(def) => {
                if !def.k.is::<alloc::string::String>() {
                    return Err(unsupported(base, "map keys must be String"));
                }
                children.push(self.node(def.v, "", 0, false, false)?);
                plan.slice_elem_bytes += def.v.layout.size();
                CodecOp::Map(def)
            }
            Def::Struct(def) => {
                children = self.record(base, def)?;
                CodecOp::Record
            }
            Def::Dynamic => {
                plan.dynamic = true;
                CodecOp::Dynamic
            }
            Def::Opaque | Def::Option(_) | Def::Pointer(_) => {
                return Err(unsupported(base, "no JSON representation"));
            }
        };

        for child in &children {
            plan.add(&child.pool_plan);
        }

        let (by_name, trie) = if matches!(op, CodecOp::Record) {
            index_children(base, &children)?
        } else {
            (HashMap::new(), None)
        };

        let mut encoded_key = Vec::with_capacity(name.len() + 3);
        encoded_key.push(b'"');
        encoded_key.extend_from_slice(name.as_bytes());
        encoded_key.extend_from_slice(b"\":");

        Ok(FieldSchema {
            name,
            encoded_key: encoded_key.into_boxed_slice(),
            op,
            offset,
            size: shape.layout.size(),
            layers: if layers.is_empty() {
                &[]
            } else {
                LAYERS.alloc_slice(layers)
            },
            hops: &[],
            string_tagged: string_tagged && op.is_quotable(),
            omit_empty,
            children: if children.is_empty() {
                &[]
            } else {
                NODES.alloc_slice(children)
            },
            by_name,
            trie,
            pool_plan: plan,
            shape,
        })
    }

    /// Compiles the fields of a record, splicing in embedded ones.
    fn record(&mut self, shape: &'static Shape, def: StructDef) -> Result<Vec<FieldSchema>> {
        let id = shape.type_id();
        if self.ancestors.contains(&id) {
            return Err(JsonError::new(JsonErrorKind::CyclicType {
                type_name: (shape.type_name)(),
            }));
        }
        self.ancestors.push(id);
        let fields = self.fields(shape, def);
        self.ancestors.pop();
        fields
    }

    fn fields(&mut self, shape: &'static Shape, def: StructDef) -> Result<Vec<FieldSchema>> {
        // (node, declared directly on this record)
        let mut entries: Vec<(FieldSchema, bool)> = Vec::with_capacity(def.fields.len());

        for field in def.fields {
            let tag = parse_tag(field.tag, field.name);
            if tag.ignore {
                continue;
            }
            let field_shape = field.shape();

            if field.embedded {
                let (layers, inner) = strip_layers(field_shape);
                let Def::Struct(inner_def) = inner.def else {
                    return Err(unsupported(field_shape, "only records can be embedded"));
                };
                let layers: &'static [Layer] = if layers.is_empty() {
                    &[]
                } else {
                    LAYERS.alloc_slice(layers)
                };
                for mut child in self.record(inner, inner_def)? {
                    rebase(&mut child, field.offset, layers);
                    entries.push((child, false));
                }
                continue;
            }

            if tag
                .name
                .bytes()
                .any(|b| b == b'"' || b == b'\\' || b < 0x20)
            {
                return Err(unsupported(shape, "field name needs escaping"));
            }
            entries.push((
                self.node(
                    field_shape,
                    tag.name,
                    field.offset,
                    tag.string,
                    tag.omit_empty,
                )?,
                true,
            ));
        }

        let mut direct: HashSet<&'static str> = HashSet::new();
        for (node, is_direct) in &entries {
            if *is_direct && !direct.insert(node.name) {
                return Err(duplicate(shape, node.name));
            }
        }
        let mut promoted: HashSet<&'static str> = HashSet::new();
        let mut out = Vec::with_capacity(entries.len());
        for (node, is_direct) in entries {
            if !is_direct {
                if direct.contains(node.name) {
                    trace!(key = node.name, "embedded field shadowed");
                    continue;
                }
                if !promoted.insert(node.name) {
                    return Err(duplicate(shape, node.name));
                }
            }
            out.push(node);
        }
        Ok(out)
    }
}

/// Peels `Option`/`Box` wrappers off `shape`.
fn strip_layers(shape: &'static Shape) -> (Vec<Layer>, &'static Shape) {
    let mut layers = Vec::new();
    let mut base = shape;
    loop {
        match base.def {
            Def::Option(def) => {
                layers.push(Layer::Optional(def));
                base = def.t;
            }
            Def::Pointer(def) => {
                layers.push(Layer::Boxed(def));
                base = def.pointee;
            }
            _ => return (layers, base),
        }
    }
}

/// Moves a node spliced out of an embedded record at `offset` (reached
/// through `layers`) into the coordinates of the embedding record.
fn rebase(node: &mut FieldSchema, offset: usize, layers: &'static [Layer]) {
    if layers.is_empty() {
        if node.hops.is_empty() {
            node.offset += offset;
        } else {
            let mut hops = node.hops.to_vec();
            hops[0].offset += offset;
            node.hops = HOPS.alloc_slice(hops);
        }
        return;
    }
    let mut hops = Vec::with_capacity(node.hops.len() + 1);
    hops.push(Hop { offset, layers });
    hops.extend_from_slice(node.hops);
    node.hops = HOPS.alloc_slice(hops);
}

fn index_children(
    shape: &'static Shape,
    children: &[FieldSchema],
) -> Result<(HashMap<&'static str, usize>, Option<KeyTrie>)> {
    let by_name: HashMap<&'static str, usize> = children
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name, i))
        .collect();
    let trie = match KeyTrie::build(children.iter().map(|c| c.name)) {
        Ok(trie) => Some(trie),
        Err(TrieError::Duplicate(key)) => return Err(duplicate(shape, &key)),
        Err(_err) => {
            debug!(ty = shape.type_identifier, error = %_err, "no trie, falling back to hashing");
            None
        }
    };
    Ok((by_name, trie))
}

fn scalar_op(scalar: ScalarType) -> CodecOp {
    match scalar {
        ScalarType::Bool => CodecOp::Bool,
        ScalarType::I8 => CodecOp::I8,
        ScalarType::I16 => CodecOp::I16,
        ScalarType::I32 => CodecOp::I32,
        ScalarType::I64 => CodecOp::I64,
        ScalarType::Isize => CodecOp::Isize,
        ScalarType::U8 => CodecOp::U8,
        ScalarType::U16 => CodecOp::U16,
        ScalarType::U32 => CodecOp::U32,
        ScalarType::U64 => CodecOp::U64,
        ScalarType::Usize => CodecOp::Usize,
        ScalarType::F32 => CodecOp::F32,
        ScalarType::F64 => CodecOp::F64,
        ScalarType::String => CodecOp::String,
    }
}

fn unsupported(shape: &'static Shape, reason: &'static str) -> JsonError {
    JsonError::new(JsonErrorKind::UnsupportedType {
        type_name: (shape.type_name)(),
        reason,
    })
}

fn duplicate(shape: &'static Shape, key: &str) -> JsonError {
    JsonError::new(JsonErrorKind::DuplicateKey {
        type_name: (shape.type_name)(),
        key: key.into(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use crate::schema::Kind;
    use jsonplan_core::Value;

    use crate::Reflect;
    use jsonplan_testhelpers::test;

    #[derive(Debug, Default, Reflect)]
    #[json(crate = crate)]
    struct Audit {
        created: u64,
        #[json("author")]
        by: String,
    }

    #[derive(Debug, Default, Reflect)]
    #[json(crate = crate)]
    struct Extra {
        note: String,
        id: u32,
    }

    #[derive(Debug, Default, Reflect)]
    #[json(crate = crate)]
    struct Doc {
        #[json("id,string")]
        id: u64,
        #[json("title,omitempty")]
        title: Option<Box<String>>,
        tags: Vec<String>,
        blob: Vec<u8>,
        meta: HashMap<String, Value>,
        #[json(embed)]
        audit: Audit,
        #[json(embed)]
        extra: Option<Extra>,
        #[json("-")]
        skipped: u8,
        #[json("list,string")]
        list: Vec<Audit>,
    }

    #[test]
    fn fields_compile_to_nodes() {
        let schema = build_root(Doc::SHAPE).unwrap();
        let root = schema.root();
        assert_eq!(root.kind(), Kind::Record);
        let names: Vec<_> = root.children().iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            ["id", "title", "tags", "blob", "meta", "created", "author", "note", "list"]
        );

        let id = root.child_by_name("id").unwrap();
        assert!(id.string_tagged());
        assert_eq!(id.kind(), Kind::Uint);

        let title = root.lookup(b"title\"").unwrap();
        assert_eq!(title.pointer_depth(), 2);
        assert!(title.omit_empty());

        assert_eq!(root.child_by_name("blob").unwrap().kind(), Kind::Bytes);
        let meta = root.child_by_name("meta").unwrap();
        assert_eq!(meta.kind(), Kind::Map);
        assert_eq!(meta.children()[0].kind(), Kind::Dynamic);

        // `string` only applies to scalars
        assert!(!root.child_by_name("list").unwrap().string_tagged());
        assert!(root.lookup(b"skipped\"").is_none());
    }

    #[test]
    fn embedded_fields_are_rebased() {
        let schema = build_root(Doc::SHAPE).unwrap();
        let root = schema.root();
        let created = root.child_by_name("created").unwrap();
        assert_eq!(
            created.offset(),
            core::mem::offset_of!(Doc, audit) + core::mem::offset_of!(Audit, created)
        );
        assert!(!created.has_hops());

        let note = root.child_by_name("note").unwrap();
        assert_eq!(note.hops.len(), 1);
        assert_eq!(note.hops[0].offset, core::mem::offset_of!(Doc, extra));
        assert_eq!(note.offset(), core::mem::offset_of!(Extra, note));
    }

    #[test]
    fn direct_fields_shadow_embedded_ones() {
        // Extra::id is hidden by Doc::id
        let schema = build_root(Doc::SHAPE).unwrap();
        let id = schema.root().child_by_name("id").unwrap();
        assert_eq!(id.offset(), core::mem::offset_of!(Doc, id));
    }

    #[derive(Default, Reflect)]
    #[json(crate = crate)]
    struct Clash {
        #[json("x")]
        a: u8,
        #[json("x")]
        b: u8,
    }

    #[derive(Default, Reflect)]
    #[json(crate = crate)]
    struct Twice {
        #[json(embed)]
        one: Audit,
        #[json(embed)]
        two: Audit,
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = build_root(Clash::SHAPE).unwrap_err();
        assert!(matches!(err.kind, JsonErrorKind::DuplicateKey { ref key, .. } if key == "x"));
        let err = build_root(Twice::SHAPE).unwrap_err();
        assert_eq!(err.code(), "jsonplan::duplicate_key");
    }

    #[derive(Default, Reflect)]
    #[json(crate = crate)]
    struct Node {
        value: i32,
        next: Option<Box<Node>>,
    }

    #[derive(Default, Reflect)]
    #[json(crate = crate)]
    struct Ping {
        pong: Vec<Pong>,
    }

    #[derive(Default, Reflect)]
    #[json(crate = crate)]
    struct Pong {
        ping: Option<Ping>,
    }

    #[test]
    fn cycles_are_rejected() {
        let err = build_root(Node::SHAPE).unwrap_err();
        assert!(matches!(err.kind, JsonErrorKind::CyclicType { .. }));
        let err = build_root(Ping::SHAPE).unwrap_err();
        assert_eq!(err.code(), "jsonplan::cyclic_type");
    }

    #[derive(Default, Reflect)]
    #[json(crate = crate)]
    struct Shared {
        a: Audit,
        b: Audit,
        c: Vec<Audit>,
    }

    #[test]
    fn repeated_siblings_are_not_cycles() {
        assert!(build_root(Shared::SHAPE).is_ok());
    }

    #[derive(Default, Reflect)]
    #[json(crate = crate)]
    struct BadMap {
        m: BTreeMap<u32, String>,
    }

    #[derive(Default, Reflect)]
    #[json(crate = crate)]
    struct BadLeaf {
        unit: (),
    }

    #[derive(Default, Reflect)]
    #[json(crate = crate)]
    struct BadName {
        #[json("quo\"te")]
        a: u8,
    }

    #[test]
    fn unsupported_types_are_reported() {
        for shape in [BadMap::SHAPE, BadLeaf::SHAPE, BadName::SHAPE] {
            let err = build_root(shape).unwrap_err();
            assert_eq!(err.code(), "jsonplan::unsupported_type", "{shape}");
        }
    }

    #[test]
    fn roots_must_be_containers() {
        let err = build_root(u32::SHAPE).unwrap_err();
        assert_eq!(err.code(), "jsonplan::destination_not_settable");
        let err = build_root(Option::<Doc>::SHAPE).unwrap_err();
        assert_eq!(err.code(), "jsonplan::destination_not_settable");
        assert!(build_root(Vec::<Value>::SHAPE).is_ok());
        assert!(build_root(Value::SHAPE).is_ok());
        assert!(build_root(HashMap::<String, u8>::SHAPE).is_ok());
    }

    #[derive(Default, Reflect)]
    #[json(crate = crate)]
    struct Planned {
        a: Option<u64>,
        b: Option<Option<u32>>,
        c: Vec<u16>,
        d: Value,
    }

    #[test]
    fn pool_plan_sums_the_subtree() {
        let schema = build_root(Planned::SHAPE).unwrap();
        let plan = schema.pool_plan();
        assert_eq!(
            plan.slot_bytes,
            size_of::<u64>() + size_of::<Option<u32>>() + size_of::<u32>()
        );
        assert_eq!(plan.slot_align, 8);
        assert_eq!(plan.slice_elem_bytes, size_of::<u16>());
        assert!(plan.dynamic);
        assert!(schema.slot_blocks.is_some());
    }
}
