//! Content-type boundary between the codecs and a transport.
//!
//! A transport hands the [`Codec`] a byte stream plus the content type it
//! arrived with (or the one it wants to send), and gets entities or feed
//! iterators back. Headers, retries and authentication stay with the
//! transport.
//!
//! | Content type | Format |
//! |--------------|--------|
//! | `application/atom+xml`, `application/xml`, `text/xml` | XML/Atom |
//! | `application/json` | JSON, in the configured flavor |
//! | `application/jsonc`, or any JSON type with `alt=jsonc` | JSON-C |

use std::borrow::Cow;
use std::io::{Read, Write};
use std::sync::Arc;

use helios_entity::{AnyEntity, CatalogRegistry, DynamicEntity, Entity, NamespaceDictionary, Record};
use tracing::debug;

use crate::config::{CodecConfig, JsonFlavor};
use crate::error::{Result, SerdeError};
use crate::json::{self, JsonFeedReader};
use crate::multikind::{JsonKindFeed, MultiKindParser};

#[cfg(feature = "xml")]
use crate::multikind::XmlKindFeed;
#[cfg(feature = "xml")]
use crate::xml::{self, FeedReader};

/// Wire formats selected by content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// XML/Atom
    Xml,
    /// JSON
    Json,
    /// JSON wrapped in a `{"data": ...}` envelope
    JsonC,
}

impl WireFormat {
    /// Returns the MIME type string for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            WireFormat::Xml => "application/atom+xml",
            WireFormat::Json => "application/json",
            WireFormat::JsonC => "application/jsonc",
        }
    }

    /// Parses a content type string, parameters included.
    ///
    /// Example: "application/json; alt=jsonc"
    pub fn parse(content_type: &str) -> Option<Self> {
        let mut parts = content_type.split(';').map(str::trim);
        let media_type = parts.next()?.to_ascii_lowercase();
        let jsonc_param = parts.any(|param| {
            param
                .split_once('=')
                .is_some_and(|(name, value)| name.trim().eq_ignore_ascii_case("alt") && value.trim() == "jsonc")
        });

        match media_type.as_str() {
            "application/atom+xml" | "application/xml" | "text/xml" => Some(WireFormat::Xml),
            "application/jsonc" => Some(WireFormat::JsonC),
            "application/json" if jsonc_param => Some(WireFormat::JsonC),
            "application/json" => Some(WireFormat::Json),
            _ => None,
        }
    }

    fn from_content_type(content_type: &str) -> Result<Self> {
        Self::parse(content_type).ok_or_else(|| SerdeError::UnsupportedContentType {
            content_type: content_type.to_string(),
        })
    }
}

/// Iterator over a single-type feed in either format.
pub enum Feed<T: Record, R: Read> {
    #[cfg(feature = "xml")]
    Xml(FeedReader<T, R>),
    Json(JsonFeedReader<T>),
    #[doc(hidden)]
    #[cfg(not(feature = "xml"))]
    _Reader(std::marker::PhantomData<R>),
}

impl<T: Record, R: Read> Feed<T, R> {
    /// Feed-level keys. For XML, only those read so far.
    pub fn metadata(&self) -> Option<&DynamicEntity> {
        match self {
            #[cfg(feature = "xml")]
            Feed::Xml(feed) => Some(feed.metadata()),
            Feed::Json(feed) => Some(feed.metadata()),
            #[cfg(not(feature = "xml"))]
            Feed::_Reader(_) => None,
        }
    }
}

impl<T: Record, R: Read> Iterator for Feed<T, R> {
    type Item = Result<Entity<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            #[cfg(feature = "xml")]
            Feed::Xml(feed) => feed.next(),
            Feed::Json(feed) => feed.next(),
            #[cfg(not(feature = "xml"))]
            Feed::_Reader(_) => None,
        }
    }
}

/// Iterator over a multi-kind feed in either format.
pub enum KindFeed<'p, E, R: Read> {
    #[cfg(feature = "xml")]
    Xml(XmlKindFeed<'p, E, R>),
    Json(JsonKindFeed<'p, E>),
    #[doc(hidden)]
    #[cfg(not(feature = "xml"))]
    _Reader(std::marker::PhantomData<R>),
}

impl<E, R: Read> KindFeed<'_, E, R> {
    /// Collects every entry up to the first error.
    pub fn collect_entries(self) -> (Vec<E>, Option<SerdeError>) {
        match self {
            #[cfg(feature = "xml")]
            KindFeed::Xml(feed) => feed.collect_entries(),
            KindFeed::Json(feed) => feed.collect_entries(),
            #[cfg(not(feature = "xml"))]
            KindFeed::_Reader(_) => (Vec::new(), None),
        }
    }
}

impl<E, R: Read> Iterator for KindFeed<'_, E, R> {
    type Item = Result<E>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            #[cfg(feature = "xml")]
            KindFeed::Xml(feed) => feed.next(),
            KindFeed::Json(feed) => feed.next(),
            #[cfg(not(feature = "xml"))]
            KindFeed::_Reader(_) => None,
        }
    }
}

/// Format dispatch by content type, sharing one dictionary, config and
/// catalog registry.
///
/// Entities parsed through a codec take their catalogs from its registry:
/// the process-wide one unless [`with_registry`](Self::with_registry) gave
/// it another.
///
/// # Examples
///
/// ```ignore
/// use helios_wire::Codec;
///
/// let codec = Codec::default();
/// let photo = codec.parse_from::<Photo, _>(body, "application/atom+xml")?;
/// let bytes = codec.serialize_to_vec(&photo, "application/json")?;
/// ```
#[derive(Debug, Clone)]
pub struct Codec {
    dictionary: NamespaceDictionary,
    config: CodecConfig,
    registry: Arc<CatalogRegistry>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(NamespaceDictionary::atom(), CodecConfig::default())
    }
}

impl Codec {
    pub fn new(dictionary: NamespaceDictionary, config: CodecConfig) -> Self {
        Self {
            dictionary,
            config,
            registry: CatalogRegistry::global_shared(),
        }
    }

    /// Uses `registry` for the catalogs of every entity this codec parses.
    pub fn with_registry(mut self, registry: Arc<CatalogRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &CatalogRegistry {
        &self.registry
    }

    pub fn dictionary(&self) -> &NamespaceDictionary {
        &self.dictionary
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn config_for(&self, format: WireFormat) -> Cow<'_, CodecConfig> {
        match format {
            WireFormat::JsonC if self.config.json_flavor != JsonFlavor::JsonC => {
                Cow::Owned(self.config.clone().jsonc())
            }
            _ => Cow::Borrowed(&self.config),
        }
    }

    #[cfg(not(feature = "xml"))]
    fn xml_disabled(content_type: &str) -> SerdeError {
        SerdeError::UnsupportedContentType {
            content_type: format!("{} (xml feature disabled)", content_type),
        }
    }

    /// Serializes `entity` in the format named by `content_type`.
    pub fn serialize_to<W: Write>(
        &self,
        writer: W,
        entity: &dyn AnyEntity,
        content_type: &str,
    ) -> Result<()> {
        let format = WireFormat::from_content_type(content_type)?;
        debug!(?format, type_name = entity.type_name(), "Serializing entity");
        let config = self.config_for(format);
        match format {
            #[cfg(feature = "xml")]
            WireFormat::Xml => xml::to_xml_writer(writer, entity, &self.dictionary, &config),
            #[cfg(not(feature = "xml"))]
            WireFormat::Xml => Err(Self::xml_disabled(content_type)),
            WireFormat::Json | WireFormat::JsonC => json::to_json_writer(writer, entity, &config),
        }
    }

    pub fn serialize_to_vec(&self, entity: &dyn AnyEntity, content_type: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize_to(&mut buf, entity, content_type)?;
        Ok(buf)
    }

    /// Parses one entity of type `T` from `reader`.
    pub fn parse_from<T: Record, R: Read>(&self, reader: R, content_type: &str) -> Result<Entity<T>> {
        let format = WireFormat::from_content_type(content_type)?;
        debug!(?format, type_name = T::TYPE_NAME, "Parsing entity");
        let config = self.config_for(format);
        match format {
            #[cfg(feature = "xml")]
            WireFormat::Xml => xml::from_xml_reader_in(reader, &self.dictionary, Arc::clone(&self.registry)),
            #[cfg(not(feature = "xml"))]
            WireFormat::Xml => Err(Self::xml_disabled(content_type)),
            WireFormat::Json | WireFormat::JsonC => json::from_json_reader_in(reader, &config, &self.registry),
        }
    }

    /// Opens a feed of `T` entries read from `reader`.
    pub fn parse_feed_from<T: Record, R: Read>(&self, reader: R, content_type: &str) -> Result<Feed<T, R>> {
        let format = WireFormat::from_content_type(content_type)?;
        let config = self.config_for(format);
        match format {
            #[cfg(feature = "xml")]
            WireFormat::Xml => Ok(Feed::Xml(FeedReader::new_in(
                reader,
                &self.dictionary,
                &config,
                Arc::clone(&self.registry),
            )?)),
            #[cfg(not(feature = "xml"))]
            WireFormat::Xml => Err(Self::xml_disabled(content_type)),
            WireFormat::Json | WireFormat::JsonC => Ok(Feed::Json(JsonFeedReader::new_in(
                reader,
                &config,
                Arc::clone(&self.registry),
            )?)),
        }
    }

    /// Opens a feed whose entries are dispatched by `parser`. Entries take
    /// their catalogs from the parser's registry.
    pub fn multi_kind_feed_from<'p, E, R: Read>(
        &self,
        parser: &'p MultiKindParser<E>,
        reader: R,
        content_type: &str,
    ) -> Result<KindFeed<'p, E, R>> {
        let format = WireFormat::from_content_type(content_type)?;
        let config = self.config_for(format);
        match format {
            #[cfg(feature = "xml")]
            WireFormat::Xml => Ok(KindFeed::Xml(parser.parse_xml(reader, &self.dictionary, &config)?)),
            #[cfg(not(feature = "xml"))]
            WireFormat::Xml => Err(Self::xml_disabled(content_type)),
            WireFormat::Json | WireFormat::JsonC => Ok(KindFeed::Json(parser.parse_json(reader, &config)?)),
        }
    }

    /// A multi-kind parser using this codec's configured discriminator and
    /// registry.
    pub fn multi_kind_parser<E>(&self) -> MultiKindParser<E> {
        MultiKindParser::new_in(self.config.discriminator.clone(), Arc::clone(&self.registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_types() {
        assert_eq!(WireFormat::parse("application/atom+xml"), Some(WireFormat::Xml));
        assert_eq!(WireFormat::parse("text/xml; charset=UTF-8"), Some(WireFormat::Xml));
        assert_eq!(WireFormat::parse("Application/JSON"), Some(WireFormat::Json));
        assert_eq!(WireFormat::parse("application/json; alt=jsonc"), Some(WireFormat::JsonC));
        assert_eq!(WireFormat::parse("application/jsonc"), Some(WireFormat::JsonC));
        assert_eq!(WireFormat::parse("text/html"), None);
    }

    #[test]
    fn test_unsupported_content_type() {
        let codec = Codec::default();
        let err = codec
            .parse_from::<helios_entity::Dynamic, _>("{}".as_bytes(), "text/plain")
            .unwrap_err();
        assert!(matches!(err, SerdeError::UnsupportedContentType { .. }));
        assert!(err.is_malformed_wire_format());
    }

    #[test]
    fn test_jsonc_content_type_wraps_payload() {
        let mut entity = DynamicEntity::new();
        entity.set("title", "x").unwrap();
        let codec = Codec::default();
        let plain = codec.serialize_to_vec(&entity, "application/json").unwrap();
        let jsonc = codec.serialize_to_vec(&entity, "application/json; alt=jsonc").unwrap();
        assert_eq!(plain, br#"{"title":"x"}"#);
        assert_eq!(jsonc, br#"{"data":{"title":"x"}}"#);
    }
}
