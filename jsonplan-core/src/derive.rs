use crate::{Reflect, Shape};

/// Returns `T`'s shape; `#[derive(Reflect)]` uses it as the lazy shape
/// accessor of record fields.
#[doc(hidden)]
pub fn shape_of<T: Reflect>() -> &'static Shape {
    T::SHAPE
}
