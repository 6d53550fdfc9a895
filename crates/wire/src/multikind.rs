//! Polymorphic feed parsing keyed by a discriminator field.
//!
//! A [`MultiKindParser`] maps discriminator values to concrete record types.
//! Each candidate type is registered once; its default instance must carry a
//! non-null value for the discriminator field, and that value must be unique
//! across candidates. Both checks happen at registration time.
//!
//! While parsing a feed, each entry's discriminator is read first and the
//! entry is parsed as the registered type, then converted into the caller's
//! variant type `E` (usually an enum with one variant per kind). Entities
//! are built with catalogs from the parser's [`CatalogRegistry`]. An entry
//! whose kind is missing or unregistered yields
//! [`SerdeError::UnrecognizedKind`] and ends the iteration; entries yielded
//! before it remain valid.
//!
//! ```ignore
//! enum Media {
//!     Photo(Entity<Photo>),
//!     Video(Entity<Video>),
//! }
//!
//! let parser = MultiKindParser::<Media>::new("kind")
//!     .register::<Photo>()?
//!     .register::<Video>()?;
//! for media in parser.parse_json(body, &CodecConfig::default())? {
//!     match media? { /* ... */ }
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::sync::Arc;

use helios_entity::{AnyEntity, CatalogRegistry, DynamicEntity, Entity, EntityFactory, Record};
use tracing::{debug, warn};

use crate::config::CodecConfig;
use crate::error::{Result, SerdeError};
use crate::json::{RawFeed, fill_from_json_value_in, read_raw_feed};

#[cfg(feature = "xml")]
use crate::xml::{de::child_text, feed::FeedCursor, utils::is_attribute_key};
#[cfg(feature = "xml")]
use helios_entity::NamespaceDictionary;

/// How to build and convert entries of one registered kind.
struct KindEntry<E> {
    type_name: &'static str,
    create: EntityFactory,
    convert: fn(Box<dyn AnyEntity>) -> Result<E>,
}

fn create_entity<T: Record>(registry: &CatalogRegistry) -> Box<dyn AnyEntity> {
    Box::new(Entity::<T>::new_in(registry))
}

fn convert_entity<T, E>(entity: Box<dyn AnyEntity>) -> Result<E>
where
    T: Record,
    E: From<Entity<T>>,
{
    entity
        .into_any()
        .downcast::<Entity<T>>()
        .map(|typed| E::from(*typed))
        .map_err(|_| SerdeError::Custom(format!("entry is not a {}", T::TYPE_NAME)))
}

/// Dispatch table from discriminator values to record types.
pub struct MultiKindParser<E> {
    discriminator: String,
    kinds: HashMap<String, KindEntry<E>>,
    registry: Arc<CatalogRegistry>,
}

impl<E> MultiKindParser<E> {
    /// Creates a parser dispatching on the wire key `discriminator`
    /// (`kind` for JSON, `@gd:kind` for an Atom attribute, ...).
    pub fn new(discriminator: impl Into<String>) -> Self {
        Self::new_in(discriminator, CatalogRegistry::global_shared())
    }

    /// Creates a parser whose entities take their catalogs from `registry`.
    pub fn new_in(discriminator: impl Into<String>, registry: Arc<CatalogRegistry>) -> Self {
        Self {
            discriminator: discriminator.into(),
            kinds: HashMap::new(),
            registry,
        }
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    /// Registers `T` under the discriminator value of its default instance.
    ///
    /// Fails with [`SerdeError::MissingDiscriminatorField`] when `T` does not
    /// declare the discriminator or its default is null, and with
    /// [`SerdeError::DuplicateKind`] when another type already claimed the
    /// same value.
    pub fn register<T>(mut self) -> Result<Self>
    where
        T: Record,
        E: From<Entity<T>>,
    {
        let prototype = Entity::<T>::new_in(&self.registry);
        let kind = prototype
            .catalog_ref()
            .describe(&self.discriminator)
            .and_then(|_| prototype.get(&self.discriminator))
            .and_then(|value| value.to_text())
            .ok_or_else(|| SerdeError::MissingDiscriminatorField {
                type_name: T::TYPE_NAME,
                discriminator: self.discriminator.clone(),
            })?;

        if let Some(existing) = self.kinds.get(&kind) {
            return Err(SerdeError::DuplicateKind {
                kind,
                first: existing.type_name,
                second: T::TYPE_NAME,
            });
        }

        debug!(kind = %kind, type_name = T::TYPE_NAME, "Registered kind");
        self.kinds.insert(
            kind,
            KindEntry {
                type_name: T::TYPE_NAME,
                create: create_entity::<T>,
                convert: convert_entity::<T, E>,
            },
        );
        Ok(self)
    }

    /// Registered discriminator values.
    pub fn kinds(&self) -> impl Iterator<Item = &str> + '_ {
        self.kinds.keys().map(String::as_str)
    }

    fn lookup(&self, kind: Option<String>, position: usize) -> Result<&KindEntry<E>> {
        match kind.as_deref().and_then(|kind| self.kinds.get(kind)) {
            Some(entry) => {
                debug!(kind = ?kind, type_name = entry.type_name, position, "Dispatching entry");
                Ok(entry)
            }
            None => {
                warn!(kind = ?kind, position, "Unrecognized kind, stopping feed");
                Err(SerdeError::UnrecognizedKind { kind, position })
            }
        }
    }

    /// Parses a JSON or JSON-C feed whose items are dispatched by kind.
    pub fn parse_json<R: Read>(&self, reader: R, config: &CodecConfig) -> Result<JsonKindFeed<'_, E>> {
        let RawFeed { metadata, items } = read_raw_feed(reader, config, &self.registry)?;
        Ok(JsonKindFeed {
            parser: self,
            metadata,
            items,
            position: 0,
            finished: false,
        })
    }

    /// Parses an Atom feed whose entries are dispatched by kind.
    ///
    /// An attribute discriminator (`@...`) is read from the entry's start
    /// tag. Any other discriminator names a child element: the entry body is
    /// buffered, the child's text selects the kind, and the buffered body is
    /// then parsed as the registered type exactly as a single-type feed
    /// would parse it.
    #[cfg(feature = "xml")]
    pub fn parse_xml<R: Read>(
        &self,
        reader: R,
        dictionary: &NamespaceDictionary,
        config: &CodecConfig,
    ) -> Result<XmlKindFeed<'_, E, R>> {
        Ok(XmlKindFeed {
            parser: self,
            cursor: FeedCursor::open(reader, dictionary, config, Arc::clone(&self.registry))?,
        })
    }
}

impl<E> Default for MultiKindParser<E> {
    fn default() -> Self {
        Self::new("kind")
    }
}

/// Runs a kind feed to its end, separating the entries produced from the
/// error that stopped it, if any.
fn drain<E>(feed: impl Iterator<Item = Result<E>>) -> (Vec<E>, Option<SerdeError>) {
    let mut entries = Vec::new();
    for entry in feed {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(err) => return (entries, Some(err)),
        }
    }
    (entries, None)
}

/// Entries of a JSON feed, dispatched by kind.
pub struct JsonKindFeed<'p, E> {
    parser: &'p MultiKindParser<E>,
    metadata: DynamicEntity,
    items: VecDeque<serde_json::Value>,
    position: usize,
    finished: bool,
}

impl<E> JsonKindFeed<'_, E> {
    /// Feed-level keys other than the items array.
    pub fn metadata(&self) -> &DynamicEntity {
        &self.metadata
    }

    /// Collects every entry up to the first error.
    pub fn collect_entries(self) -> (Vec<E>, Option<SerdeError>) {
        drain(self)
    }

    fn parse_item(&mut self, item: serde_json::Value) -> Result<E> {
        let position = self.position;
        self.position += 1;
        let kind = item.get(&self.parser.discriminator).and_then(|value| match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        let entry = self.parser.lookup(kind, position)?;
        let mut entity = (entry.create)(&self.parser.registry);
        fill_from_json_value_in(entity.as_mut(), item, &self.parser.registry)?;
        (entry.convert)(entity)
    }
}

impl<E> Iterator for JsonKindFeed<'_, E> {
    type Item = Result<E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.items.pop_front()?;
        let parsed = self.parse_item(item);
        if parsed.is_err() {
            self.finished = true;
            self.items.clear();
        }
        Some(parsed)
    }
}

/// Entries of an Atom feed, dispatched by kind.
#[cfg(feature = "xml")]
pub struct XmlKindFeed<'p, E, R: Read> {
    parser: &'p MultiKindParser<E>,
    cursor: FeedCursor<R>,
}

#[cfg(feature = "xml")]
impl<E, R: Read> XmlKindFeed<'_, E, R> {
    /// Feed-level keys seen so far.
    pub fn metadata(&self) -> &DynamicEntity {
        self.cursor.metadata()
    }

    /// Collects every entry up to the first error.
    pub fn collect_entries(self) -> (Vec<E>, Option<SerdeError>) {
        drain(self)
    }

    fn read_entry(&mut self) -> Result<Option<E>> {
        let Some((element, empty)) = self.cursor.next_entry()? else {
            return Ok(None);
        };
        let position = self.cursor.position - 1;
        let discriminator = self.parser.discriminator.as_str();

        let kind = if is_attribute_key(discriminator) {
            element.attribute(discriminator).map(str::to_string)
        } else {
            let nodes = self.cursor.parser.buffer_element(&element, empty)?;
            let kind = child_text(&nodes, discriminator);
            self.cursor.parser.replay(nodes);
            kind
        };
        let entry = self.parser.lookup(kind, position)?;
        let mut entity = (entry.create)(&self.parser.registry);
        self.cursor.parser.parse_into(entity.as_mut(), &element, empty)?;
        (entry.convert)(entity).map(Some)
    }
}

#[cfg(feature = "xml")]
impl<E, R: Read> Iterator for XmlKindFeed<'_, E, R> {
    type Item = Result<E>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(err) => {
                self.cursor.finished = true;
                Some(Err(err))
            }
        }
    }
}
