//! Field catalogs and the catalog registry.
//!
//! A [`FieldCatalog`] is the immutable, ordered table of a record type's
//! declared fields keyed by wire name. Catalogs are built lazily, at most once
//! per type and registry, and shared as `Arc<FieldCatalog>` between every
//! entity of that type.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::field::FieldDescriptor;
use crate::record::Record;

/// Ordered wire-name → descriptor table for one record type.
#[derive(Debug)]
pub struct FieldCatalog {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    // Record member index of each catalog position. Differs from the
    // position only after a duplicate wire name was dropped.
    slots: Vec<usize>,
    index: HashMap<&'static str, usize>,
}

impl FieldCatalog {
    /// Builds the catalog for `T` without caching it.
    ///
    /// When two members share a wire name the first declaration wins and the
    /// later one is dropped from the catalog.
    pub fn build<T: Record>() -> Self {
        let mut fields = Vec::new();
        let mut slots = Vec::new();
        let mut index = HashMap::new();
        for (slot, field) in T::fields().into_iter().enumerate() {
            if index.contains_key(field.wire_name) {
                warn!(
                    type_name = T::TYPE_NAME,
                    wire_name = field.wire_name,
                    member = field.member,
                    "Duplicate wire name, keeping the first declaration"
                );
                continue;
            }
            index.insert(field.wire_name, fields.len());
            slots.push(slot);
            fields.push(field);
        }
        debug!(
            type_name = T::TYPE_NAME,
            fields = fields.len(),
            "Built field catalog"
        );
        Self {
            type_name: T::TYPE_NAME,
            fields,
            slots,
            index,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Wire names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.wire_name)
    }

    pub fn describe(&self, wire_name: &str) -> Option<&FieldDescriptor> {
        self.index_of(wire_name).map(|index| &self.fields[index])
    }

    /// Position of `wire_name` in declaration order.
    pub fn index_of(&self, wire_name: &str) -> Option<usize> {
        self.index.get(wire_name).copied()
    }

    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Index passed to [`Record::read_field`]/[`Record::write_field`] for the
    /// field at catalog position `index`.
    pub fn slot(&self, index: usize) -> Option<usize> {
        self.slots.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

static GLOBAL: Lazy<Arc<CatalogRegistry>> = Lazy::new(|| Arc::new(CatalogRegistry::new()));

/// Cache of field catalogs keyed by record type.
///
/// Reads take a shared lock; a miss builds the catalog outside the lock and
/// publishes it under the write lock, so concurrent first uses all observe
/// the same fully built `Arc<FieldCatalog>`.
#[derive(Debug, Default)]
pub struct CatalogRegistry {
    catalogs: RwLock<HashMap<TypeId, Arc<FieldCatalog>>>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`Entity::new`](crate::Entity::new).
    pub fn global() -> &'static CatalogRegistry {
        &GLOBAL
    }

    /// A shared handle to the process-wide registry, for holders that may
    /// also be given a private one.
    pub fn global_shared() -> Arc<CatalogRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Returns the catalog for `T`, building it on first use.
    pub fn catalog_of<T: Record>(&self) -> Arc<FieldCatalog> {
        let type_id = TypeId::of::<T>();
        if let Some(catalog) = self.catalogs.read().get(&type_id) {
            return Arc::clone(catalog);
        }

        let built = Arc::new(FieldCatalog::build::<T>());
        let mut catalogs = self.catalogs.write();
        Arc::clone(catalogs.entry(type_id).or_insert(built))
    }

    /// True once the catalog for `T` has been built in this registry.
    pub fn contains<T: Record>(&self) -> bool {
        self.catalogs.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of catalogs built so far.
    pub fn len(&self) -> usize {
        self.catalogs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.read().is_empty()
    }
}
