#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

mod derive;

/// Implements `Reflect` for a struct with named fields.
///
/// Field attributes:
///
/// - `#[json("name,string,omitempty")]`: the field's tag (`"-"` skips the
///   field in both directions)
/// - `#[json(embed)]`: promote the fields of a (possibly `Option`/`Box`
///   wrapped) record into the owner
///
/// Container attribute `#[json(crate = path)]` names the crate the
/// reflection types are reached through; it defaults to `::jsonplan`.
#[proc_macro_derive(Reflect, attributes(json))]
pub fn reflect(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    derive::reflect(input.into()).into()
}
