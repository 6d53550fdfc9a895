//! # Helios Wire Codecs
//!
//! XML/Atom and JSON/JSON-C serialization for `helios-entity` records.
//!
//! ## Features
//!
//! - **XML/Atom**: a namespace-aware streaming parser and writer built on
//!   `quick-xml`. Aliased names (`gd:rating`), attributes (`@etag`) and text
//!   content (`text()`) map onto entity keys. Enabled by the `xml` feature.
//! - **JSON and JSON-C**: `serde_json` based, with JSON-C payloads wrapped in a
//!   `{"data": ...}` envelope.
//! - **Feeds**: iterators over feed entries, with feed-level keys kept as
//!   metadata. XML feeds are read lazily from the underlying reader.
//! - **Multi-kind feeds**: entries dispatched to record types by a
//!   discriminator field ([`MultiKindParser`]).
//! - **Partial updates**: field-level diffs and PATCH bodies
//!   ([`PartialUpdate`]).
//!
//! Unknown keys survive every round trip: content a record does not declare is
//! kept in the entity's unknown bag and written back out after the declared
//! fields.
//!
//! ## Examples
//!
//! ```ignore
//! use helios_entity::{Entity, NamespaceDictionary, Record};
//! use helios_wire::{CodecConfig, from_json_str, to_json_string};
//! use helios_wire::xml::{from_xml_str, to_xml_string};
//!
//! #[derive(Clone, Debug, Default, Record)]
//! struct Photo {
//!     title: Option<String>,
//!     #[wire(rename = "@etag", immutable)]
//!     etag: Option<String>,
//! }
//!
//! let dictionary = NamespaceDictionary::atom();
//! let photo: Entity<Photo> = from_xml_str(xml, &dictionary)?;
//! let json = to_json_string(&photo, &CodecConfig::default().jsonc())?;
//! let back: Entity<Photo> = from_json_str(&json, &CodecConfig::default().jsonc())?;
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod json;
pub mod multikind;
pub mod patch;

#[cfg(feature = "xml")]
pub mod xml;

pub use config::{CodecConfig, JsonFlavor};
pub use error::{Result, SerdeError};
pub use format::{Codec, Feed, KindFeed, WireFormat};
pub use json::{
    JsonFeedReader, fill_from_json_value, from_json_reader, from_json_reader_in, from_json_str,
    from_json_value, to_json_string, to_json_vec, to_json_writer,
};
pub use multikind::{JsonKindFeed, MultiKindParser};
pub use patch::{FieldMask, PartialUpdate, diff};

#[cfg(feature = "xml")]
pub use multikind::XmlKindFeed;
