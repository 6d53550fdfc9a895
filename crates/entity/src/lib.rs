//! # Helios Entity Model
//!
//! Typed records with forward-compatible unknown-key preservation.
//!
//! ## Overview
//!
//! - **Records** ([`Record`]) are plain structs whose bindable members are
//!   registered at compile time with `#[derive(Record)]`. Each member maps to a
//!   wire name (the member name, or a `#[wire(rename = "...")]` override) and
//!   may be marked `#[wire(immutable)]`.
//! - **Field catalogs** ([`FieldCatalog`]) are the per-type tables of those
//!   members, built once and cached in a [`CatalogRegistry`].
//! - **Entities** ([`Entity`]) hold one record instance plus an ordered bag of
//!   keys the record does not declare, so content from newer wire versions
//!   survives a parse/serialize round trip.
//! - **Namespace dictionaries** ([`NamespaceDictionary`]) resolve the alias
//!   prefixes used by XML wire names.
//!
//! Codecs for XML/Atom and JSON/JSON-C live in `helios-wire`.
//!
//! ## Example
//!
//! ```ignore
//! use helios_entity::{Entity, Record, Value};
//!
//! #[derive(Clone, Debug, Default, Record)]
//! struct Photo {
//!     title: Option<String>,
//!     width: Option<i64>,
//!     #[wire(rename = "@etag", immutable)]
//!     etag: Option<String>,
//! }
//!
//! let mut photo = Entity::<Photo>::new();
//! photo.set("title", "Sunset")?;
//! photo.set("camera", "Nikon")?; // not declared: kept in the unknown bag
//! assert_eq!(photo.get("camera"), Some(Value::from("Nikon")));
//! ```

extern crate self as helios_entity;

pub mod catalog;
pub mod entity;
pub mod error;
pub mod field;
pub mod namespace;
pub mod record;
pub mod value;

pub use catalog::{CatalogRegistry, FieldCatalog};
pub use entity::{AnyEntity, DynamicEntity, Entity, Iter};
pub use error::{DataError, ValueError};
pub use field::{EntityFactory, FieldDescriptor, FieldShape, FieldValue, TypeTag};
pub use namespace::{
    ATOM_NAMESPACE, GDATA_NAMESPACE, NamespaceDictionary, NamespaceDictionaryBuilder,
    OPENSEARCH_NAMESPACE,
};
pub use record::{Dynamic, Record};
pub use value::Value;

pub use helios_entity_macro::Record;
