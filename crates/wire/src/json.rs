//! JSON and JSON-C codecs for entities.
//!
//! Serialization goes straight through `serde_json` using the `Serialize`
//! implementations of [`Entity`] and [`AnyEntity`]: object keys are wire
//! names, collection fields become arrays and nested entities become objects.
//!
//! Parsing is catalog-driven. Each object key is resolved against the target
//! entity's catalog; declared structured fields are parsed into an entity
//! built by the field's factory, and keys the catalog does not declare are
//! kept in the unknown bag (objects become [`DynamicEntity`] values).
//!
//! With [`JsonFlavor::JsonC`](crate::JsonFlavor::JsonC) the document is the
//! envelope `{"data": <entity-or-feed>}`. It is unwrapped on parse and added
//! on serialize.

use std::collections::VecDeque;
use std::fmt;
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::sync::Arc;

use helios_entity::{
    AnyEntity, CatalogRegistry, DynamicEntity, Entity, EntityFactory, Record, Value,
};
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, trace};

use crate::config::CodecConfig;
use crate::error::{Result, SerdeError};

/// Parses a single entity from a JSON string.
///
/// # Examples
///
/// ```ignore
/// use helios_wire::{CodecConfig, json::from_json_str};
///
/// let photo = from_json_str::<Photo>(r#"{"title": "Sunset"}"#, &CodecConfig::default())?;
/// ```
pub fn from_json_str<T: Record>(s: &str, config: &CodecConfig) -> Result<Entity<T>> {
    let mut de = serde_json::Deserializer::from_str(s);
    read_entity(&mut de, config, CatalogRegistry::global())
}

/// Parses a single entity from a JSON byte stream.
pub fn from_json_reader<T: Record, R: Read>(reader: R, config: &CodecConfig) -> Result<Entity<T>> {
    from_json_reader_in(reader, config, CatalogRegistry::global())
}

/// Parses a single entity from a JSON byte stream, building every catalog
/// (the entity's and its nested entities') in `registry`.
pub fn from_json_reader_in<T: Record, R: Read>(
    reader: R,
    config: &CodecConfig,
    registry: &CatalogRegistry,
) -> Result<Entity<T>> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    read_entity(&mut de, config, registry)
}

fn read_entity<'de, T, R>(
    de: &mut serde_json::Deserializer<R>,
    config: &CodecConfig,
    registry: &CatalogRegistry,
) -> Result<Entity<T>>
where
    T: Record,
    R: serde_json::de::Read<'de>,
{
    let mut entity = Entity::<T>::new_in(registry);
    read_document(&mut *de, &mut entity, config, registry)?;
    de.end()?;
    Ok(entity)
}

/// Parses an entity from an already decoded JSON object.
///
/// The value is the entity object itself; no JSON-C envelope is expected.
pub fn from_json_value<T: Record>(value: serde_json::Value) -> Result<Entity<T>> {
    from_json_value_in(value, CatalogRegistry::global())
}

pub(crate) fn from_json_value_in<T: Record>(
    value: serde_json::Value,
    registry: &CatalogRegistry,
) -> Result<Entity<T>> {
    let mut entity = Entity::<T>::new_in(registry);
    EntitySeed::new(&mut entity, registry).deserialize(value)?;
    Ok(entity)
}

/// Fills `entity` from a JSON object, keeping unknown keys.
pub fn fill_from_json_value(entity: &mut dyn AnyEntity, value: serde_json::Value) -> Result<()> {
    fill_from_json_value_in(entity, value, CatalogRegistry::global())
}

pub(crate) fn fill_from_json_value_in(
    entity: &mut dyn AnyEntity,
    value: serde_json::Value,
    registry: &CatalogRegistry,
) -> Result<()> {
    EntitySeed::new(entity, registry).deserialize(value)?;
    Ok(())
}

fn read_document<'de, D>(
    deserializer: D,
    entity: &mut dyn AnyEntity,
    config: &CodecConfig,
    registry: &CatalogRegistry,
) -> Result<()>
where
    D: de::Deserializer<'de, Error = serde_json::Error>,
{
    debug!(
        type_name = entity.type_name(),
        jsonc = config.is_jsonc(),
        "Parsing JSON entity"
    );
    if config.is_jsonc() {
        EnvelopeSeed(EntitySeed::new(entity, registry)).deserialize(deserializer)?;
    } else {
        EntitySeed::new(entity, registry).deserialize(deserializer)?;
    }
    Ok(())
}

/// Serializes an entity to a JSON string.
pub fn to_json_string<E>(entity: &E, config: &CodecConfig) -> Result<String>
where
    E: Serialize + ?Sized,
{
    let bytes = to_json_vec(entity, config)?;
    String::from_utf8(bytes).map_err(|e| SerdeError::Custom(format!("Invalid UTF-8: {}", e)))
}

/// Serializes an entity to JSON bytes.
pub fn to_json_vec<E>(entity: &E, config: &CodecConfig) -> Result<Vec<u8>>
where
    E: Serialize + ?Sized,
{
    let mut buf = Vec::new();
    to_json_writer(&mut buf, entity, config)?;
    Ok(buf)
}

/// Serializes an entity as JSON into `writer`.
pub fn to_json_writer<W, E>(writer: W, entity: &E, config: &CodecConfig) -> Result<()>
where
    W: Write,
    E: Serialize + ?Sized,
{
    match (config.is_jsonc(), config.pretty) {
        (true, true) => serde_json::to_writer_pretty(writer, &Envelope(entity))?,
        (true, false) => serde_json::to_writer(writer, &Envelope(entity))?,
        (false, true) => serde_json::to_writer_pretty(writer, entity)?,
        (false, false) => serde_json::to_writer(writer, entity)?,
    }
    Ok(())
}

/// `{"data": ...}` wrapper written around JSON-C payloads.
struct Envelope<'a, E: ?Sized>(&'a E);

impl<E: Serialize + ?Sized> Serialize for Envelope<'_, E> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("data", self.0)?;
        map.end()
    }
}

/// Applies `S` to the `data` member of a JSON-C envelope, skipping the
/// envelope's other members (`apiVersion`, `id`, ...).
struct EnvelopeSeed<S>(S);

impl<'de, S> DeserializeSeed<'de> for EnvelopeSeed<S>
where
    S: DeserializeSeed<'de>,
{
    type Value = S::Value;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<S::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_map(EnvelopeVisitor(Some(self.0)))
    }
}

struct EnvelopeVisitor<S>(Option<S>);

impl<'de, S> Visitor<'de> for EnvelopeVisitor<S>
where
    S: DeserializeSeed<'de>,
{
    type Value = S::Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON-C envelope object")
    }

    fn visit_map<A>(mut self, mut map: A) -> std::result::Result<S::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut data = None;
        while let Some(key) = map.next_key::<String>()? {
            match (key.as_str(), self.0.take()) {
                ("data", Some(seed)) => data = Some(map.next_value_seed(seed)?),
                ("data", None) => return Err(de::Error::duplicate_field("data")),
                (_, seed) => {
                    self.0 = seed;
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        data.ok_or_else(|| de::Error::missing_field("data"))
    }
}

/// Fills an existing entity from a JSON object.
pub(crate) struct EntitySeed<'a> {
    entity: &'a mut dyn AnyEntity,
    registry: &'a CatalogRegistry,
}

impl<'a> EntitySeed<'a> {
    pub(crate) fn new(entity: &'a mut dyn AnyEntity, registry: &'a CatalogRegistry) -> Self {
        Self { entity, registry }
    }
}

impl<'de> DeserializeSeed<'de> for EntitySeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for EntitySeed<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a JSON object for {}", self.entity.type_name())
    }

    fn visit_map<A>(self, map: A) -> std::result::Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        fill_entity(self.entity, map, self.registry)
    }
}

fn fill_entity<'de, A>(
    entity: &mut dyn AnyEntity,
    mut map: A,
    registry: &CatalogRegistry,
) -> std::result::Result<(), A::Error>
where
    A: MapAccess<'de>,
{
    while let Some(key) = map.next_key::<String>()? {
        let factory = match entity.catalog().describe(&key) {
            Some(field) => field.factory,
            None => {
                trace!(type_name = entity.type_name(), key = %key, "Keeping unknown JSON key");
                None
            }
        };
        let value = map.next_value_seed(ValueSeed { factory, registry })?;
        entity.hydrate(&key, value).map_err(de::Error::custom)?;
    }
    Ok(())
}

/// Decodes one JSON value into a [`Value`].
///
/// Objects become entities built by `factory`, or dynamic entities when no
/// factory applies; arrays become lists whose elements follow the same rule.
#[derive(Clone, Copy)]
struct ValueSeed<'r> {
    factory: Option<EntityFactory>,
    registry: &'r CatalogRegistry,
}

impl<'de> DeserializeSeed<'de> for ValueSeed<'_> {
    type Value = Value;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for ValueSeed<'_> {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> std::result::Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> std::result::Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Value, E>
    where
        E: de::Error,
    {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Integer))
    }

    fn visit_f64<E>(self, v: f64) -> std::result::Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> std::result::Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::String(v))
    }

    fn visit_unit<E>(self) -> std::result::Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> std::result::Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        self.deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element_seed(self)? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A>(self, map: A) -> std::result::Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entity: Box<dyn AnyEntity> = match self.factory {
            Some(factory) => factory(self.registry),
            None => Box::new(DynamicEntity::new_in(self.registry)),
        };
        fill_entity(entity.as_mut(), map, self.registry)?;
        Ok(Value::Entity(entity))
    }
}

/// A decoded feed object whose entries are not parsed yet.
pub(crate) struct RawFeed {
    pub(crate) metadata: DynamicEntity,
    pub(crate) items: VecDeque<serde_json::Value>,
}

/// Reads a feed document, keeping entries as raw JSON values so each one is
/// parsed only when it is requested.
pub(crate) fn read_raw_feed<R: Read>(
    reader: R,
    config: &CodecConfig,
    registry: &CatalogRegistry,
) -> Result<RawFeed> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    let seed = FeedSeed {
        items_key: &config.items_key,
        registry,
    };
    let feed = if config.is_jsonc() {
        EnvelopeSeed(seed).deserialize(&mut de)?
    } else {
        seed.deserialize(&mut de)?
    };
    de.end()?;
    debug!(entries = feed.items.len(), "Read JSON feed");
    Ok(feed)
}

struct FeedSeed<'a> {
    items_key: &'a str,
    registry: &'a CatalogRegistry,
}

impl<'de> DeserializeSeed<'de> for FeedSeed<'_> {
    type Value = RawFeed;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<RawFeed, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for FeedSeed<'_> {
    type Value = RawFeed;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON feed object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<RawFeed, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut feed = RawFeed {
            metadata: DynamicEntity::new_in(self.registry),
            items: VecDeque::new(),
        };
        while let Some(key) = map.next_key::<String>()? {
            if key == self.items_key {
                let items: Option<Vec<serde_json::Value>> = map.next_value()?;
                feed.items = items.unwrap_or_default().into();
            } else {
                let value = map.next_value_seed(ValueSeed {
                    factory: None,
                    registry: self.registry,
                })?;
                feed.metadata.hydrate(&key, value).map_err(de::Error::custom)?;
            }
        }
        Ok(feed)
    }
}

/// Iterator over the entries of a JSON or JSON-C feed.
///
/// The feed document is decoded when the reader is created; each entry is
/// converted into `Entity<T>` as it is yielded. Feed-level keys other than
/// the items array are available from [`metadata`](Self::metadata).
/// The iterator stops after the first error.
pub struct JsonFeedReader<T: Record> {
    metadata: DynamicEntity,
    items: VecDeque<serde_json::Value>,
    registry: Arc<CatalogRegistry>,
    failed: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> JsonFeedReader<T> {
    pub fn new<R: Read>(reader: R, config: &CodecConfig) -> Result<Self> {
        Self::new_in(reader, config, CatalogRegistry::global_shared())
    }

    /// Like [`new`](Self::new), with entry catalogs built in `registry`.
    pub fn new_in<R: Read>(reader: R, config: &CodecConfig, registry: Arc<CatalogRegistry>) -> Result<Self> {
        let RawFeed { metadata, items } = read_raw_feed(reader, config, &registry)?;
        Ok(Self {
            metadata,
            items,
            registry,
            failed: false,
            _marker: PhantomData,
        })
    }

    pub fn from_slice(bytes: &[u8], config: &CodecConfig) -> Result<Self> {
        Self::new(bytes, config)
    }

    /// Feed-level keys (`totalItems`, `startIndex`, ...).
    pub fn metadata(&self) -> &DynamicEntity {
        &self.metadata
    }

    /// Entries not yet yielded.
    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

impl<T: Record> Iterator for JsonFeedReader<T> {
    type Item = Result<Entity<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.items.pop_front()?;
        let parsed = from_json_value_in::<T>(item, &self.registry);
        if parsed.is_err() {
            self.failed = true;
            self.items.clear();
        }
        Some(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, helios_entity::Record)]
    struct Author {
        name: Option<String>,
    }

    #[derive(Clone, Debug, Default, helios_entity::Record)]
    struct Video {
        title: Option<String>,
        views: Option<i64>,
        author: Option<Entity<Author>>,
        tags: Vec<String>,
    }

    #[test]
    fn test_nested_and_collection_fields() {
        let json = r#"{"title":"Clip","author":{"name":"Ann","uri":"x"},"tags":["a","b"]}"#;
        let video = from_json_str::<Video>(json, &CodecConfig::default()).unwrap();
        let author = video.author.as_ref().unwrap();
        assert_eq!(author.name.as_deref(), Some("Ann"));
        assert_eq!(author.get("uri"), Some(Value::from("x")));
        assert_eq!(video.tags, vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_object_becomes_dynamic_entity() {
        let json = r#"{"player":{"default":"http://p"},"views":3}"#;
        let video = from_json_str::<Video>(json, &CodecConfig::default()).unwrap();
        let player = video.get("player").unwrap();
        let player = player.as_entity().unwrap();
        assert_eq!(player.type_name(), "Dynamic");
        assert_eq!(player.get("default"), Some(Value::from("http://p")));
    }

    #[test]
    fn test_envelope_ignores_sibling_members() {
        let json = r#"{"apiVersion":"2.1","data":{"title":"Clip"}}"#;
        let video = from_json_str::<Video>(json, &CodecConfig::default().jsonc()).unwrap();
        assert_eq!(video.title.as_deref(), Some("Clip"));
    }

    #[test]
    fn test_envelope_missing_data() {
        let err = from_json_str::<Video>(r#"{"apiVersion":"2.1"}"#, &CodecConfig::default().jsonc())
            .unwrap_err();
        assert!(err.is_malformed_wire_format());
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let err = from_json_str::<Video>(r#"{"views":"many"}"#, &CodecConfig::default()).unwrap_err();
        assert!(err.to_string().contains("views"));
    }
}
