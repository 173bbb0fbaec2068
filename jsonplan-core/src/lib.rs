#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]
#![doc = include_str!("../README.md")]

extern crate alloc;

mod derive;
pub use derive::*;

mod ptr;
pub use ptr::*;

mod shape;
pub use shape::*;

mod def;
pub use def::*;

mod value;
pub use value::*;

mod impls;

/// Types whose memory layout the codec can plan against.
///
/// # Safety
///
/// [`Reflect::SHAPE`] must describe `Self` exactly: layout, field offsets,
/// and vtables that really operate on `Self`. The codec reads and writes
/// raw memory based on it. Use `#[derive(Reflect)]` from `jsonplan-macros`
/// rather than implementing this by hand.
pub unsafe trait Reflect: Default + Sized + 'static {
    /// The shape of this type.
    const SHAPE: &'static Shape;
}
