use core::alloc::Layout;
use core::any::TypeId;
use core::fmt;

use crate::{Def, PtrMut, PtrUninit};

/// Describes a type's memory layout and how the codec may treat it.
///
/// Shapes are `'static` and built at compile time through [`crate::Reflect`].
#[derive(Clone, Copy)]
pub struct Shape {
    /// Short, human readable identifier (`"u32"`, `"Vec"`, `"User"`).
    pub type_identifier: &'static str,

    /// Fully qualified type name, for diagnostics.
    pub type_name: fn() -> &'static str,

    /// Size and alignment.
    pub layout: Layout,

    /// Type identity, used as the schema cache key and for cycle detection.
    pub type_id: fn() -> TypeId,

    /// What kind of value this is.
    pub def: Def,

    /// Lifecycle functions.
    pub vtable: &'static ValueVTable,
}

impl Shape {
    /// Const ctor.
    pub const fn new<T: 'static>(
        type_identifier: &'static str,
        def: Def,
        vtable: &'static ValueVTable,
    ) -> Self {
        Self {
            type_identifier,
            type_name: core::any::type_name::<T>,
            layout: Layout::new::<T>(),
            type_id: TypeId::of::<T>,
            def,
            vtable,
        }
    }

    /// Returns the [`TypeId`] of the described type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Returns true if `self` describes `T`.
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }

    /// Returns true if values of this shape run code when dropped.
    #[inline]
    pub const fn needs_drop(&self) -> bool {
        self.vtable.needs_drop
    }

    /// Drops the value at `ptr` in place.
    ///
    /// # Safety
    /// `ptr` must point to an initialized value of this shape, which is
    /// logically uninitialized afterwards.
    #[inline]
    pub unsafe fn call_drop_in_place(&self, ptr: PtrMut) {
        unsafe { (self.vtable.drop_in_place)(ptr) }
    }

    /// Writes this shape's default value at `ptr`.
    ///
    /// # Safety
    /// `ptr` must be valid for writes of this shape's layout and aligned.
    #[inline]
    pub unsafe fn call_default_in_place(&self, ptr: PtrUninit) -> PtrMut {
        unsafe { (self.vtable.default_in_place)(ptr) }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("type_identifier", &self.type_identifier)
            .field("layout", &self.layout)
            .field("def", &self.def)
            .finish()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str((self.type_name)())
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

impl Eq for Shape {}

/// Drops a value in place.
///
/// # Safety
///
/// The pointer must point to an initialized value of the shape's type.
pub type DropInPlaceFn = unsafe fn(value: PtrMut);

/// Writes the type's `Default` value into uninitialized storage.
///
/// # Safety
///
/// The pointer must be valid for writes of the shape's layout and aligned.
pub type DefaultInPlaceFn = unsafe fn(target: PtrUninit) -> PtrMut;

/// Lifecycle vtable shared by every shape.
#[derive(Clone, Copy, Debug)]
pub struct ValueVTable {
    /// cf. [`DropInPlaceFn`]
    pub drop_in_place: DropInPlaceFn,
    /// cf. [`DefaultInPlaceFn`]
    pub default_in_place: DefaultInPlaceFn,
    /// Whether dropping runs any code.
    pub needs_drop: bool,
}

impl ValueVTable {
    /// Builds the vtable for `T`.
    pub const fn of<T: Default>() -> Self {
        Self {
            drop_in_place: drop_in_place::<T>,
            default_in_place: default_in_place::<T>,
            needs_drop: core::mem::needs_drop::<T>(),
        }
    }
}

unsafe fn drop_in_place<T>(value: PtrMut) {
    unsafe { core::ptr::drop_in_place(value.as_mut_ptr::<T>()) }
}

unsafe fn default_in_place<T: Default>(target: PtrUninit) -> PtrMut {
    unsafe { target.put(T::default()) }
}
