//! Per-kind definitions and their vtables.

use crate::{PtrConst, PtrMut, Shape};

/// The kind of a [`Shape`], and the type-specific operations it supports.
#[derive(Clone, Copy, Debug)]
pub enum Def {
    /// A leaf value.
    Scalar(ScalarType),
    /// A record with named fields.
    Struct(StructDef),
    /// A growable sequence (`Vec<T>`).
    List(ListDef),
    /// A keyed collection (`HashMap`, `BTreeMap`, `IndexMap`).
    Map(MapDef),
    /// `Option<T>`.
    Option(OptionDef),
    /// An owning pointer (`Box<T>`).
    Pointer(PointerDef),
    /// An open value whose kind is decided by the data itself.
    Dynamic,
    /// Reflectable, but nothing the codec knows how to handle.
    Opaque,
}

/// Leaf value kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
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
}

/// Fields of a record, in declaration order.
#[derive(Clone, Copy, Debug)]
pub struct StructDef {
    /// The fields.
    pub fields: &'static [Field],
}

/// One field of a record.
#[derive(Clone, Copy)]
pub struct Field {
    /// The Rust identifier.
    pub name: &'static str,

    /// Raw tag string, in the `name[,string][,omitempty]` mini-language.
    /// Empty when the field carries no tag.
    pub tag: &'static str,

    /// Byte offset within the owning record.
    pub offset: usize,

    /// The field's shape. Resolved lazily so that self-referential records
    /// can be declared at all.
    pub shape: fn() -> &'static Shape,

    /// Whether the field is an embedded record whose fields are promoted
    /// into the owner.
    pub embedded: bool,
}

impl Field {
    /// Returns the field's shape.
    #[inline]
    pub fn shape(&self) -> &'static Shape {
        (self.shape)()
    }
}

impl core::fmt::Debug for Field {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("offset", &self.offset)
            .field("embedded", &self.embedded)
            .finish_non_exhaustive()
    }
}

/// Number of elements in a list.
///
/// # Safety
///
/// The pointer must point to an initialized list of the def's type.
pub type ListLenFn = unsafe fn(list: PtrConst) -> usize;

/// Pointer to the first element of a list (dangling when empty).
///
/// # Safety
///
/// The pointer must point to an initialized list of the def's type.
pub type ListAsPtrFn = unsafe fn(list: PtrConst) -> PtrConst;

/// Replaces the list's contents with `len` elements moved bitwise out of
/// `elems`. Existing capacity is reused when it suffices.
///
/// # Safety
///
/// `list` must point to an initialized list, `elems` to `len` contiguous
/// initialized elements which the caller must treat as moved-from.
pub type ListInstallFn = unsafe fn(list: PtrMut, elems: PtrMut, len: usize);

/// Virtual table for a list
#[derive(Clone, Copy, Debug)]
pub struct ListVTable {
    /// cf. [`ListLenFn`]
    pub len: ListLenFn,
    /// cf. [`ListAsPtrFn`]
    pub as_ptr: ListAsPtrFn,
    /// cf. [`ListInstallFn`]
    pub install: ListInstallFn,
}

/// Describes a list and its element shape.
#[derive(Clone, Copy, Debug)]
pub struct ListDef {
    /// vtable for interacting with the list
    pub vtable: &'static ListVTable,
    /// shape of the items in the list
    pub t: &'static Shape,
}

impl ListDef {
    /// Const ctor.
    pub const fn new(vtable: &'static ListVTable, t: &'static Shape) -> Self {
        Self { vtable, t }
    }

    /// Returns the shape of the items in the list
    pub const fn t(&self) -> &'static Shape {
        self.t
    }
}

/// Number of entries in a map.
///
/// # Safety
///
/// The pointer must point to an initialized map of the def's type.
pub type MapLenFn = unsafe fn(map: PtrConst) -> usize;

/// Reserves room for `additional` entries.
///
/// # Safety
///
/// The pointer must point to an initialized map of the def's type.
pub type MapReserveFn = unsafe fn(map: PtrMut, additional: usize);

/// Inserts an entry, moving key and value out of their pointers.
///
/// # Safety
///
/// `key` and `value` must point to initialized values of the def's key and
/// value types; both are moved-from afterwards.
pub type MapInsertFn = unsafe fn(map: PtrMut, key: PtrMut, value: PtrMut);

/// Visits every entry in the map's own iteration order.
///
/// # Safety
///
/// The pointer must point to an initialized map of the def's type.
pub type MapForEachFn = unsafe fn(map: PtrConst, f: &mut dyn FnMut(PtrConst, PtrConst));

/// Virtual table for a map
#[derive(Clone, Copy, Debug)]
pub struct MapVTable {
    /// cf. [`MapLenFn`]
    pub len: MapLenFn,
    /// cf. [`MapReserveFn`]
    pub reserve: MapReserveFn,
    /// cf. [`MapInsertFn`]
    pub insert: MapInsertFn,
    /// cf. [`MapForEachFn`]
    pub for_each: MapForEachFn,
}

/// Describes a map and its key and value shapes.
#[derive(Clone, Copy, Debug)]
pub struct MapDef {
    /// vtable for interacting with the map
    pub vtable: &'static MapVTable,
    /// shape of the keys
    pub k: &'static Shape,
    /// shape of the values
    pub v: &'static Shape,
}

impl MapDef {
    /// Const ctor.
    pub const fn new(vtable: &'static MapVTable, k: &'static Shape, v: &'static Shape) -> Self {
        Self { vtable, k, v }
    }
}

/// Check if an option contains a value
///
/// # Safety
///
/// The `option` parameter must point to aligned, initialized memory of the correct type.
pub type OptionIsSomeFn = unsafe fn(option: PtrConst) -> bool;

/// Get the value contained in an option, if present
///
/// # Safety
///
/// The `option` parameter must point to aligned, initialized memory of the correct type.
pub type OptionGetFn = unsafe fn(option: PtrConst) -> Option<PtrConst>;

/// Get mutable access to the value contained in an option, if present
///
/// # Safety
///
/// The `option` parameter must point to aligned, initialized memory of the correct type.
pub type OptionGetMutFn = unsafe fn(option: PtrMut) -> Option<PtrMut>;

/// Set an option to `None`, dropping any previous value
///
/// # Safety
///
/// The `option` parameter must point to aligned, initialized memory of the correct type.
pub type OptionSetNoneFn = unsafe fn(option: PtrMut);

/// Set an option to `Some`, moving `value` in and dropping any previous value
///
/// # Safety
///
/// `option` must point to an initialized option; `value` to an initialized
/// inner value that the caller treats as moved-from afterwards.
pub type OptionPutSomeFn = unsafe fn(option: PtrMut, value: PtrMut);

/// Make the option `Some(Default::default())` if it is `None`, and return
/// a pointer to the inner value
///
/// # Safety
///
/// The `option` parameter must point to aligned, initialized memory of the correct type.
pub type OptionVivifyFn = unsafe fn(option: PtrMut) -> PtrMut;

/// Virtual table for `Option<T>`
#[derive(Clone, Copy, Debug)]
pub struct OptionVTable {
    /// cf. [`OptionIsSomeFn`]
    pub is_some: OptionIsSomeFn,
    /// cf. [`OptionGetFn`]
    pub get: OptionGetFn,
    /// cf. [`OptionGetMutFn`]
    pub get_mut: OptionGetMutFn,
    /// cf. [`OptionSetNoneFn`]
    pub set_none: OptionSetNoneFn,
    /// cf. [`OptionPutSomeFn`]
    pub put_some: OptionPutSomeFn,
    /// cf. [`OptionVivifyFn`]
    pub vivify: OptionVivifyFn,
}

/// Describes an Option — including a vtable to query and alter its state,
/// and the inner shape (the `T` in `Option<T>`).
#[derive(Clone, Copy, Debug)]
pub struct OptionDef {
    /// vtable for interacting with the option
    pub vtable: &'static OptionVTable,
    /// shape of the inner type of the option
    pub t: &'static Shape,
}

impl OptionDef {
    /// Const ctor.
    pub const fn new(vtable: &'static OptionVTable, t: &'static Shape) -> Self {
        Self { vtable, t }
    }
}

/// Borrow the pointee.
///
/// # Safety
///
/// The pointer must point to an initialized smart pointer of the def's type.
pub type PointerBorrowFn = unsafe fn(pointer: PtrConst) -> PtrConst;

/// Borrow the pointee mutably.
///
/// # Safety
///
/// The pointer must point to an initialized smart pointer of the def's type.
pub type PointerBorrowMutFn = unsafe fn(pointer: PtrMut) -> PtrMut;

/// Virtual table for an owning pointer
#[derive(Clone, Copy, Debug)]
pub struct PointerVTable {
    /// cf. [`PointerBorrowFn`]
    pub borrow: PointerBorrowFn,
    /// cf. [`PointerBorrowMutFn`]
    pub borrow_mut: PointerBorrowMutFn,
}

/// Describes an owning pointer and its pointee.
#[derive(Clone, Copy, Debug)]
pub struct PointerDef {
    /// vtable for interacting with the pointer
    pub vtable: &'static PointerVTable,
    /// shape of the pointee
    pub pointee: &'static Shape,
}

impl PointerDef {
    /// Const ctor.
    pub const fn new(vtable: &'static PointerVTable, pointee: &'static Shape) -> Self {
        Self { vtable, pointee }
    }
}
