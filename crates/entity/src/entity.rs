//! Hybrid typed/unknown entities.
//!
//! An [`Entity<T>`] pairs a typed record `T` (the direct-access segment) with
//! an ordered bag of keys that `T` does not declare. Every wire key resolves
//! to exactly one of the two: declared keys always go through the record's
//! field accessors, everything else through the bag.
//!
//! [`AnyEntity`] is the object-safe view of an entity used wherever the
//! concrete record type is not known statically: nested values, codecs and
//! multi-kind dispatch.
//!
//! Entities are not synchronized. Distinct entities may be read from many
//! threads at once (they only share their immutable catalog), but a single
//! entity must not be mutated concurrently.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::catalog::{CatalogRegistry, FieldCatalog};
use crate::error::{DataError, ValueError};
use crate::record::{Dynamic, Record};
use crate::value::Value;

/// An entity whose keys all live in the unknown bag.
pub type DynamicEntity = Entity<Dynamic>;

/// Object-safe access to an entity of any record type.
pub trait AnyEntity: fmt::Debug + Send + Sync + 'static {
    fn catalog(&self) -> &FieldCatalog;

    /// Reads the declared field at `index` (catalog order).
    fn read_declared(&self, index: usize) -> Value;

    /// Writes the declared field at `index` without the immutability check.
    ///
    /// This is the decoder's path: parsing must be able to populate immutable
    /// fields such as an ETag. Callers mutating an entity use [`AnyEntity::set`].
    fn write_declared(&mut self, index: usize, value: Value) -> Result<(), DataError>;

    fn unknown(&self) -> &IndexMap<String, Value>;

    fn unknown_mut(&mut self) -> &mut IndexMap<String, Value>;

    fn clone_box(&self) -> Box<dyn AnyEntity>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Converts `value` the way a write to the declared field at `index`
    /// would, returning what the field would then read back.
    fn coerce_declared(&self, index: usize, value: Value) -> Result<Value, DataError>;

    fn type_name(&self) -> &'static str {
        self.catalog().type_name()
    }

    /// Looks `key` up among declared fields first, then in the unknown bag.
    fn get(&self, key: &str) -> Option<Value> {
        match self.catalog().index_of(key) {
            Some(index) => Some(self.read_declared(index)).filter(|value| !value.is_null()),
            None => self.unknown().get(key).cloned(),
        }
    }

    fn contains_key(&self, key: &str) -> bool {
        match self.catalog().index_of(key) {
            Some(index) => !self.read_declared(index).is_null(),
            None => self.unknown().contains_key(key),
        }
    }

    /// Writes `key`.
    ///
    /// Declared immutable fields only accept a value that converts to their
    /// current one (a no-op); anything else fails with
    /// [`DataError::ImmutableFieldConflict`]. Unknown keys keep their original
    /// position when overwritten.
    fn set(&mut self, key: &str, value: Value) -> Result<(), DataError> {
        match self.catalog().index_of(key) {
            Some(index) => {
                let immutable = self.catalog().fields()[index].immutable;
                if immutable {
                    let unchanged = self
                        .coerce_declared(index, value)
                        .is_ok_and(|coerced| coerced == self.read_declared(index));
                    if unchanged {
                        return Ok(());
                    }
                    return Err(DataError::ImmutableFieldConflict {
                        field: key.to_string(),
                    });
                }
                self.write_declared(index, value)
            }
            None => {
                self.unknown_mut().insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    /// Stores a decoded value for `key`, bypassing the immutability check.
    fn hydrate(&mut self, key: &str, value: Value) -> Result<(), DataError> {
        match self.catalog().index_of(key) {
            Some(index) => self.write_declared(index, value),
            None => {
                self.unknown_mut().insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    /// Removes an unknown key or clears a mutable declared field.
    fn remove(&mut self, key: &str) -> Result<Option<Value>, DataError> {
        match self.catalog().index_of(key) {
            Some(index) => {
                let previous = self.read_declared(index);
                if previous.is_null() {
                    return Ok(None);
                }
                self.set(key, Value::Null)?;
                Ok(Some(previous))
            }
            None => Ok(self.unknown_mut().shift_remove(key)),
        }
    }

    /// Copies every present field and unknown key of `other` into `self`.
    ///
    /// Last write wins on collision. Keys of `self` absent from `other` are
    /// left alone, and immutable declared fields of `other` are not copied.
    fn merge(&mut self, other: &dyn AnyEntity) -> Result<(), DataError> {
        for (key, value) in Iter::new(other) {
            match self.catalog().describe(key) {
                Some(field) if field.immutable => continue,
                _ => self.set(key, value)?,
            }
        }
        Ok(())
    }

    /// Compares declared values and unknown keys of two entities.
    fn content_eq(&self, other: &dyn AnyEntity) -> bool {
        if self.type_name() != other.type_name() || self.catalog().len() != other.catalog().len() {
            return false;
        }
        (0..self.catalog().len()).all(|index| self.read_declared(index) == other.read_declared(index))
            && self.unknown().len() == other.unknown().len()
            && self
                .unknown()
                .iter()
                .zip(other.unknown())
                .all(|(a, b)| a == b)
    }
}

impl dyn AnyEntity {
    /// Iterates present keys; see [`Entity::iter`].
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Number of entries [`iter`](Self::iter) yields.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn downcast_ref<T: Record>(&self) -> Option<&Entity<T>> {
        self.as_any().downcast_ref::<Entity<T>>()
    }
}

/// A typed record plus its unknown keys.
pub struct Entity<T: Record> {
    catalog: Arc<FieldCatalog>,
    record: T,
    unknown: IndexMap<String, Value>,
}

impl<T: Record> Entity<T> {
    /// Creates an entity holding `T::default()`, with the catalog from the
    /// process-wide registry.
    pub fn new() -> Self {
        Self::from_record(T::default())
    }

    /// Creates an entity whose catalog comes from `registry`.
    pub fn new_in(registry: &CatalogRegistry) -> Self {
        Self::with_catalog(registry.catalog_of::<T>(), T::default())
    }

    pub fn from_record(record: T) -> Self {
        Self::with_catalog(CatalogRegistry::global().catalog_of::<T>(), record)
    }

    fn with_catalog(catalog: Arc<FieldCatalog>, record: T) -> Self {
        Self {
            catalog,
            record,
            unknown: IndexMap::new(),
        }
    }

    /// Creates an empty entity sharing this entity's catalog.
    pub fn empty_like(&self) -> Self {
        Self::with_catalog(Arc::clone(&self.catalog), T::default())
    }

    /// Rebuilds `source` (of any record type) as an `Entity<T>`.
    ///
    /// Every present declared field of `source`, immutable ones included,
    /// and every unknown key is resolved against `T`'s catalog, so keys
    /// declared by `T` land in typed fields and the rest in the unknown bag.
    pub fn absorb(source: &dyn AnyEntity) -> Result<Self, DataError> {
        Self::absorb_in(source, CatalogRegistry::global())
    }

    /// [`absorb`](Self::absorb) with the catalog taken from `registry`.
    pub fn absorb_in(source: &dyn AnyEntity, registry: &CatalogRegistry) -> Result<Self, DataError> {
        let mut entity = Self::new_in(registry);
        for (index, field) in source.catalog().fields().iter().enumerate() {
            let value = source.read_declared(index);
            if !value.is_null() {
                AnyEntity::hydrate(&mut entity, field.wire_name, value)?;
            }
        }
        for (key, value) in source.unknown() {
            AnyEntity::hydrate(&mut entity, key, value.clone())?;
        }
        Ok(entity)
    }

    pub fn record(&self) -> &T {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut T {
        &mut self.record
    }

    pub fn into_record(self) -> T {
        self.record
    }

    pub fn catalog_ref(&self) -> &Arc<FieldCatalog> {
        &self.catalog
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        AnyEntity::get(self, key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), DataError> {
        AnyEntity::set(self, key, value.into())
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, DataError> {
        AnyEntity::remove(self, key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        AnyEntity::contains_key(self, key)
    }

    pub fn merge(&mut self, other: &dyn AnyEntity) -> Result<(), DataError> {
        AnyEntity::merge(self, other)
    }

    /// Iterates `(key, value)` pairs: present mutable declared fields in
    /// catalog order, then unknown keys in insertion order.
    ///
    /// Each call starts a fresh cursor. Values are materialized one step at
    /// a time.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.unknown.keys().map(String::as_str)
    }
}

impl<T: Record> AnyEntity for Entity<T> {
    fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    fn read_declared(&self, index: usize) -> Value {
        self.catalog
            .slot(index)
            .map_or(Value::Null, |slot| self.record.read_field(slot))
    }

    fn write_declared(&mut self, index: usize, value: Value) -> Result<(), DataError> {
        let slot = self.catalog.slot(index).unwrap_or(usize::MAX);
        self.record.write_field(slot, value).map_err(|err: ValueError| {
            let field = self
                .catalog
                .field(index)
                .map_or("<unknown>", |field| field.wire_name);
            err.for_field(field)
        })
    }

    fn unknown(&self) -> &IndexMap<String, Value> {
        &self.unknown
    }

    fn unknown_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.unknown
    }

    fn clone_box(&self) -> Box<dyn AnyEntity> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn coerce_declared(&self, index: usize, value: Value) -> Result<Value, DataError> {
        let mut scratch = self.empty_like();
        scratch.write_declared(index, value)?;
        Ok(scratch.read_declared(index))
    }
}

impl<T: Record> Default for Entity<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Clone for Entity<T> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            record: self.record.clone(),
            unknown: self.unknown.clone(),
        }
    }
}

impl<T: Record> fmt::Debug for Entity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("record", &self.record)
            .field("unknown", &self.unknown)
            .finish()
    }
}

impl<T: Record> PartialEq for Entity<T> {
    fn eq(&self, other: &Self) -> bool {
        self.content_eq(other)
    }
}

impl<T: Record> Deref for Entity<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record
    }
}

impl<T: Record> From<T> for Entity<T> {
    fn from(record: T) -> Self {
        Self::from_record(record)
    }
}

impl<'a, T: Record> IntoIterator for &'a Entity<T> {
    type Item = (&'a str, Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Cursor over the present keys of an entity.
pub struct Iter<'a> {
    entity: &'a dyn AnyEntity,
    declared: usize,
    unknown: indexmap::map::Iter<'a, String, Value>,
}

impl<'a> Iter<'a> {
    fn new(entity: &'a dyn AnyEntity) -> Self {
        Self {
            entity,
            declared: 0,
            unknown: entity.unknown().iter(),
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, Value);

    fn next(&mut self) -> Option<Self::Item> {
        let entity = self.entity;
        let catalog = entity.catalog();
        while let Some(field) = catalog.field(self.declared) {
            let index = self.declared;
            self.declared += 1;
            if field.immutable {
                continue;
            }
            let value = entity.read_declared(index);
            if !value.is_null() {
                return Some((field.wire_name, value));
            }
        }
        self.unknown
            .next()
            .map(|(key, value)| (key.as_str(), value.clone()))
    }
}

impl Serialize for dyn AnyEntity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in self.iter() {
            if !value.is_null() {
                map.serialize_entry(key, &value)?;
            }
        }
        map.end()
    }
}

impl<T: Record> Serialize for Entity<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (self as &dyn AnyEntity).serialize(serializer)
    }
}
