#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

extern crate alloc;

/// Trace-level logging macro that forwards to `tracing::trace!` when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {
        ::tracing::trace!($($arg)*)
    };
}

/// Trace-level logging macro (no-op when `tracing` feature is disabled).
#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Debug-level logging macro that forwards to `tracing::debug!` when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {
        ::tracing::debug!($($arg)*)
    };
}

/// Debug-level logging macro (no-op when `tracing` feature is disabled).
#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[allow(unused_imports)]
pub(crate) use debug;
#[allow(unused_imports)]
pub(crate) use trace;

pub mod arena;
mod cache;
mod de;
mod error;
pub mod schema;
mod ser;
mod tag;
pub mod trie;

pub use cache::SchemaCache;
pub use error::{ERROR_WINDOW, JsonError, JsonErrorKind, MAX_DEPTH, Malformed, Result};
pub use jsonplan_core::{Object, Reflect, Value};
pub use jsonplan_macros::Reflect;

// Paths used by `#[derive(Reflect)]`
#[doc(hidden)]
pub use jsonplan_core::{Def, Field, Shape, StructDef, ValueVTable, shape_of};
pub use schema::{FieldSchema, Kind, PoolPlan, Schema};
pub use ser::SizeHint;
pub use tag::{Tag, parse_tag};

use alloc::string::String;
use alloc::vec::Vec;

use jsonplan_core::{PtrConst, PtrMut};

/// Returns the compiled schema for `T`, building it on first use.
///
/// The schema is shared by every call for `T` for the rest of the process.
pub fn schema_of<T: Reflect>() -> Result<&'static Schema> {
    SchemaCache::global().get_or_build(T::SHAPE)
}

/// Deserialize a value from JSON bytes.
///
/// `T` must be a record, a `String`-keyed map, a `Vec`, or [`Value`].
///
/// ```
/// #[derive(Debug, Default, PartialEq, jsonplan::Reflect)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// let p: Point = jsonplan::from_slice(br#"{"x":1,"y":-2}"#).unwrap();
/// assert_eq!(p, Point { x: 1, y: -2 });
/// ```
pub fn from_slice<T: Reflect>(input: &[u8]) -> Result<T> {
    let mut value = T::default();
    from_slice_into(input, &mut value)?;
    Ok(value)
}

/// Deserialize a value from a JSON string.
pub fn from_str<T: Reflect>(input: &str) -> Result<T> {
    from_slice(input.as_bytes())
}

/// Deserialize into an existing value.
///
/// Fields present in the input overwrite the destination, absent ones keep
/// their value, and storage already held by `Some`s, strings and maps is
/// reused. If decoding fails, `dest` is left holding whatever fields were
/// completely decoded before the error.
pub fn from_slice_into<T: Reflect>(input: &[u8], dest: &mut T) -> Result<()> {
    let schema = schema_of::<T>()?;
    arena::pool::with_arena(|arena| de::decode(schema, arena, input, PtrMut::from_mut(dest)))
}

/// Serialize a value to JSON bytes.
pub fn to_vec<T: Reflect>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    to_writer_vec(value, &mut out)?;
    Ok(out)
}

/// Serialize a value to a JSON string.
///
/// ```
/// #[derive(Default, jsonplan::Reflect)]
/// struct Tagged {
///     #[json("id,string")]
///     id: u64,
///     #[json("note,omitempty")]
///     note: Option<String>,
/// }
///
/// let json = jsonplan::to_string(&Tagged { id: 7, note: None }).unwrap();
/// assert_eq!(json, r#"{"id":"7"}"#);
/// ```
pub fn to_string<T: Reflect>(value: &T) -> Result<String> {
    let bytes = to_vec(value)?;
    // SAFETY: the serializer only writes UTF-8
    Ok(unsafe { String::from_utf8_unchecked(bytes) })
}

/// Serialize a value, appending to `out`.
///
/// The buffer is grown up front to the size remembered from earlier
/// outputs of the same type.
pub fn to_writer_vec<T: Reflect>(value: &T, out: &mut Vec<u8>) -> Result<()> {
    let schema = schema_of::<T>()?;
    let start = out.len();
    out.reserve(schema.hint.get());
    ser::encode(schema, PtrConst::from_ref(value), out);
    schema.hint.observe(out.len() - start);
    trace!(
        ty = T::SHAPE.type_identifier,
        len = out.len() - start,
        "encoded"
    );
    Ok(())
}
