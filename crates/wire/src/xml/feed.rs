//! Atom feed reading.
//!
//! A feed is a root element (usually `<feed>`) whose entry children are
//! parsed one at a time as the caller iterates. Everything else on the feed
//! (root attributes, `<title>`, `<link>`, `<openSearch:totalResults>`, ...)
//! is collected into a metadata [`DynamicEntity`].

use std::io::{BufReader, Read};
use std::marker::PhantomData;
use std::sync::Arc;

use helios_entity::{
    AnyEntity, CatalogRegistry, DynamicEntity, Entity, NamespaceDictionary, Record, Value,
};
use tracing::{debug, trace};

use super::de::{Element, Node, XmlParser};
use crate::config::CodecConfig;
use crate::error::{Result, SerdeError};

/// Cursor over the entry elements of a feed document.
pub(crate) struct FeedCursor<R: Read> {
    pub(crate) parser: XmlParser<BufReader<R>>,
    entry_key: String,
    metadata: DynamicEntity,
    pub(crate) finished: bool,
    /// Entries handed out so far.
    pub(crate) position: usize,
}

impl<R: Read> FeedCursor<R> {
    pub(crate) fn open(
        reader: R,
        dictionary: &NamespaceDictionary,
        config: &CodecConfig,
        registry: Arc<CatalogRegistry>,
    ) -> Result<Self> {
        let mut metadata = DynamicEntity::new_in(&registry);
        let mut parser = XmlParser::new(BufReader::new(reader), dictionary.clone(), registry);
        let (root, empty) = parser.read_root()?;
        debug!(root = %root.key, entry = %config.entry_element, "Opened XML feed");

        for (key, value) in &root.attributes {
            metadata.hydrate(key, Value::String(value.clone()))?;
        }
        Ok(Self {
            parser,
            entry_key: config.entry_element.clone(),
            metadata,
            finished: empty,
            position: 0,
        })
    }

    /// Advances to the next entry start tag, collecting feed-level elements
    /// on the way. Returns `None` at the feed's end tag.
    pub(crate) fn next_entry(&mut self) -> Result<Option<(Element, bool)>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            match self.parser.next_node()? {
                Node::Element(element, empty) if element.key == self.entry_key => {
                    self.position += 1;
                    return Ok(Some((element, empty)));
                }
                Node::Element(element, empty) => {
                    trace!(key = %element.key, "Collecting feed metadata");
                    let value = self.parser.capture(&element, empty)?;
                    self.add_metadata(&element.key, value)?;
                }
                Node::Text(_) => continue,
                Node::End => {
                    self.finished = true;
                    return Ok(None);
                }
                Node::Eof => {
                    self.finished = true;
                    return Err(SerdeError::malformed("document ends inside the feed element"));
                }
            }
        }
    }

    fn add_metadata(&mut self, key: &str, value: Value) -> Result<()> {
        let combined = match self.metadata.get(key) {
            None => value,
            Some(Value::List(mut items)) => {
                items.push(value);
                Value::List(items)
            }
            Some(existing) => Value::List(vec![existing, value]),
        };
        self.metadata.hydrate(key, combined)?;
        Ok(())
    }

    pub(crate) fn metadata(&self) -> &DynamicEntity {
        &self.metadata
    }
}

/// Iterator over the entries of an Atom feed, parsed as `Entity<T>`.
///
/// Entries are parsed lazily as the iterator advances. Feed metadata that
/// appears after an entry is only visible once the iterator has reached it;
/// it is complete after the iterator is exhausted. The iterator stops after
/// the first error, and the underlying reader is dropped with the iterator.
///
/// # Examples
///
/// ```ignore
/// use helios_entity::NamespaceDictionary;
/// use helios_wire::{CodecConfig, xml::FeedReader};
///
/// let feed = FeedReader::<Photo, _>::new(file, &NamespaceDictionary::atom(), &CodecConfig::default())?;
/// for photo in feed {
///     println!("{:?}", photo?.title);
/// }
/// ```
pub struct FeedReader<T: Record, R: Read> {
    cursor: FeedCursor<R>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record, R: Read> FeedReader<T, R> {
    pub fn new(reader: R, dictionary: &NamespaceDictionary, config: &CodecConfig) -> Result<Self> {
        Self::new_in(reader, dictionary, config, CatalogRegistry::global_shared())
    }

    /// Like [`new`](Self::new), with entry catalogs built in `registry`.
    pub fn new_in(
        reader: R,
        dictionary: &NamespaceDictionary,
        config: &CodecConfig,
        registry: Arc<CatalogRegistry>,
    ) -> Result<Self> {
        Ok(Self {
            cursor: FeedCursor::open(reader, dictionary, config, registry)?,
            _marker: PhantomData,
        })
    }

    /// Feed-level keys seen so far.
    pub fn metadata(&self) -> &DynamicEntity {
        self.cursor.metadata()
    }

    fn read_entry(&mut self) -> Result<Option<Entity<T>>> {
        let Some((element, empty)) = self.cursor.next_entry()? else {
            return Ok(None);
        };
        let mut entity = Entity::<T>::new_in(self.cursor.parser.registry());
        self.cursor.parser.parse_into(&mut entity, &element, empty)?;
        Ok(Some(entity))
    }
}

impl<'a, T: Record> FeedReader<T, &'a [u8]> {
    pub fn from_str(xml: &'a str, dictionary: &NamespaceDictionary, config: &CodecConfig) -> Result<Self> {
        Self::new(xml.as_bytes(), dictionary, config)
    }
}

impl<T: Record, R: Read> Iterator for FeedReader<T, R> {
    type Item = Result<Entity<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_entry() {
            Ok(Some(entity)) => Some(Ok(entity)),
            Ok(None) => None,
            Err(err) => {
                self.cursor.finished = true;
                Some(Err(err))
            }
        }
    }
}
