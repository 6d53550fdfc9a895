//! Declarative field registration for record types.
//!
//! A record is a plain Rust struct whose bindable members are described once,
//! at compile time, by `#[derive(Record)]`:
//!
//! ```ignore
//! use helios_entity::{Entity, Record};
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
//! ```
//!
//! Field indices passed to [`Record::read_field`] and [`Record::write_field`]
//! are positions in the vector returned by [`Record::fields`].

use std::fmt;

use crate::error::ValueError;
use crate::field::FieldDescriptor;
use crate::value::Value;

/// A record type with declared, wire-bound fields.
pub trait Record: Default + Clone + fmt::Debug + Send + Sync + 'static {
    /// Name used in diagnostics and type tags.
    const TYPE_NAME: &'static str;

    /// Descriptors for every bindable member, in declaration order.
    fn fields() -> Vec<FieldDescriptor>;

    /// Reads the member at `index`.
    fn read_field(&self, index: usize) -> Value;

    /// Writes the member at `index`, converting from the dynamic value.
    fn write_field(&mut self, index: usize, value: Value) -> Result<(), ValueError>;
}

/// A record with no declared fields.
///
/// `Entity<Dynamic>` keeps every key in its unknown bag; codecs use it to
/// capture wire content that no declared field claims.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dynamic;

impl Record for Dynamic {
    const TYPE_NAME: &'static str = "Dynamic";

    fn fields() -> Vec<FieldDescriptor> {
        Vec::new()
    }

    fn read_field(&self, _index: usize) -> Value {
        Value::Null
    }

    fn write_field(&mut self, index: usize, _value: Value) -> Result<(), ValueError> {
        Err(ValueError::new("no declared fields", format!("index {}", index)))
    }
}
