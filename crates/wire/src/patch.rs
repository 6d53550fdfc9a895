//! Partial-update payloads.
//!
//! [`diff`] compares two entities of the same record type field by field and
//! returns the wire names of the changed declared leaf fields together with
//! an entity holding only their new values. [`PartialUpdate`] wraps that
//! result with optional identity entries (an ETag, an id) and serializes it
//! as a PATCH body.
//!
//! Structured and collection fields are not diffed: if one of them changed,
//! [`diff`] fails with [`SerdeError::UnsupportedDiff`] so the caller can send
//! a full update instead. Immutable fields and unknown keys are never part
//! of a diff.

use std::fmt;

use helios_entity::{AnyEntity, Entity, Record, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::config::CodecConfig;
use crate::error::{Result, SerdeError};
use crate::json::to_json_string;

#[cfg(feature = "xml")]
use crate::xml::ser::XmlEmitter;
#[cfg(feature = "xml")]
use helios_entity::NamespaceDictionary;

/// Ordered set of changed wire names.
///
/// Displays as the comma-joined list used in `fields` attributes and query
/// parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMask {
    fields: Vec<String>,
}

impl FieldMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-joined mask, ignoring blanks and repeats.
    pub fn parse(mask: &str) -> Self {
        let mut parsed = Self::new();
        for field in mask.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            parsed.insert(field);
        }
        parsed
    }

    /// Adds `field` unless already present. Returns whether it was added.
    pub fn insert(&mut self, field: impl Into<String>) -> bool {
        let field = field.into();
        if self.contains(&field) {
            return false;
        }
        self.fields.push(field);
        true
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fields.join(","))
    }
}

/// Computes the changed declared leaf fields between `original` and
/// `patched`.
pub fn diff<T: Record>(original: &Entity<T>, patched: &Entity<T>) -> Result<(FieldMask, Entity<T>)> {
    let mut mask = FieldMask::new();
    let mut payload = patched.empty_like();

    for (index, field) in original.catalog_ref().fields().iter().enumerate() {
        if field.immutable {
            continue;
        }
        let before = original.read_declared(index);
        let after = patched.read_declared(index);
        if before == after {
            continue;
        }
        if !field.leaf || field.collection {
            return Err(SerdeError::UnsupportedDiff {
                field: field.wire_name.to_string(),
            });
        }
        payload.write_declared(index, after)?;
        mask.insert(field.wire_name);
    }

    debug!(type_name = T::TYPE_NAME, mask = %mask, "Computed partial update");
    Ok((mask, payload))
}

/// A PATCH body: changed fields, their mask and identity entries.
#[derive(Debug, Clone)]
pub struct PartialUpdate<T: Record> {
    mask: FieldMask,
    payload: Entity<T>,
    identity: Vec<(String, Value)>,
}

impl<T: Record> PartialUpdate<T> {
    /// Builds the update from two versions of an entity. See [`diff`].
    pub fn from_diff(original: &Entity<T>, patched: &Entity<T>) -> Result<Self> {
        let (mask, payload) = diff(original, patched)?;
        Ok(Self {
            mask,
            payload,
            identity: Vec::new(),
        })
    }

    /// Adds an identity entry (such as `@gd:etag`) written ahead of the
    /// changed fields. Identity entries are not part of the mask.
    pub fn with_identity(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.identity.push((key.into(), value.into()));
        self
    }

    pub fn mask(&self) -> &FieldMask {
        &self.mask
    }

    pub fn payload(&self) -> &Entity<T> {
        &self.payload
    }

    pub fn identity(&self) -> &[(String, Value)] {
        &self.identity
    }

    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    /// Serializes the update as XML, with the mask in the
    /// `config.mask_attribute` attribute of the root element.
    #[cfg(feature = "xml")]
    pub fn to_xml_string(&self, dictionary: &NamespaceDictionary, config: &CodecConfig) -> Result<String> {
        let mut extra = Vec::with_capacity(self.identity.len() + 1);
        if !self.mask.is_empty() {
            extra.push((
                format!("@{}", config.mask_attribute),
                Value::String(self.mask.to_string()),
            ));
        }
        extra.extend(self.identity.iter().cloned());

        let mut buf = Vec::new();
        XmlEmitter::new(&mut buf, dictionary, config).write_document(
            &config.root_element,
            &self.payload,
            &extra,
        )?;
        String::from_utf8(buf).map_err(|e| SerdeError::Custom(format!("Invalid UTF-8: {}", e)))
    }

    /// Serializes the update as JSON (or JSON-C). The mask is not part of
    /// the body; send [`mask`](Self::mask) as the `fields` parameter.
    pub fn to_json_string(&self, config: &CodecConfig) -> Result<String> {
        to_json_string(&JsonBody(self), config)
    }
}

struct JsonBody<'a, T: Record>(&'a PartialUpdate<T>);

impl<T: Record> Serialize for JsonBody<'_, T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.0.identity {
            map.serialize_entry(key, value)?;
        }
        for (key, value) in self.0.payload.iter() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}
