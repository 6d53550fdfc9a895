//! Streaming, namespace-aware XML parsing into entities.
//!
//! The parser pulls events from a `quick_xml::NsReader`, resolves every
//! element and attribute name to a wire key through the
//! [`NamespaceDictionary`], and routes each key through the target entity's
//! catalog:
//!
//! - declared structured fields recurse into an entity built by the field's
//!   factory;
//! - declared collection fields accumulate one item per occurrence;
//! - declared leaf fields take the element text;
//! - anything else is captured whole (attributes, text, children) into the
//!   unknown bag, as a string for text-only elements and as a
//!   [`DynamicEntity`] otherwise.
//!
//! Each element is consumed up to its matching end tag before control
//! returns to the caller. Element nesting is limited to [`MAX_DEPTH`]
//! levels; deeper documents are rejected as malformed.

use std::collections::{HashSet, VecDeque};
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;

use helios_entity::{
    AnyEntity, CatalogRegistry, DynamicEntity, Entity, FieldDescriptor, NamespaceDictionary, Record,
    TypeTag, Value,
};
use indexmap::IndexMap;
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, trace};

use super::utils::{TEXT_KEY, qualify, resolve_reference};
use crate::error::{Result, SerdeError};

/// Deepest element nesting the parser accepts, root element included.
pub const MAX_DEPTH: usize = 128;

/// Parses a single entity from an XML string.
///
/// # Examples
///
/// ```ignore
/// use helios_entity::NamespaceDictionary;
/// use helios_wire::xml::from_xml_str;
///
/// let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom"><title>Sunset</title></entry>"#;
/// let photo = from_xml_str::<Photo>(xml, &NamespaceDictionary::atom())?;
/// ```
pub fn from_xml_str<T: Record>(xml: &str, dictionary: &NamespaceDictionary) -> Result<Entity<T>> {
    from_xml_buf_reader(xml.as_bytes(), dictionary, CatalogRegistry::global_shared())
}

/// Parses a single entity from an XML byte stream.
pub fn from_xml_reader<T: Record, R: Read>(
    reader: R,
    dictionary: &NamespaceDictionary,
) -> Result<Entity<T>> {
    from_xml_reader_in(reader, dictionary, CatalogRegistry::global_shared())
}

/// Parses a single entity from an XML byte stream, building every catalog
/// (the entity's and its nested entities') in `registry`.
pub fn from_xml_reader_in<T: Record, R: Read>(
    reader: R,
    dictionary: &NamespaceDictionary,
    registry: Arc<CatalogRegistry>,
) -> Result<Entity<T>> {
    from_xml_buf_reader(BufReader::new(reader), dictionary, registry)
}

fn from_xml_buf_reader<T: Record, R: BufRead>(
    reader: R,
    dictionary: &NamespaceDictionary,
    registry: Arc<CatalogRegistry>,
) -> Result<Entity<T>> {
    let mut parser = XmlParser::new(reader, dictionary.clone(), registry);
    let mut entity = Entity::<T>::new_in(parser.registry());
    let (root, empty) = parser.read_root()?;
    debug!(type_name = T::TYPE_NAME, root = %root.key, "Parsing XML entity");
    parser.parse_into(&mut entity, &root, empty)?;
    Ok(entity)
}

/// A start tag with its name and attributes resolved to wire keys.
#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) key: String,
    /// `(@key, value)` pairs in document order, namespace declarations excluded.
    pub(crate) attributes: Vec<(String, String)>,
}

impl Element {
    pub(crate) fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

pub(crate) enum Node {
    /// A start tag; `true` when it is self-closing.
    Element(Element, bool),
    Text(String),
    End,
    Eof,
}

/// Pull parser over one XML document.
pub(crate) struct XmlParser<R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    dictionary: NamespaceDictionary,
    registry: Arc<CatalogRegistry>,
    /// Elements currently open in `parse_into`.
    depth: usize,
    /// Buffered nodes handed out before reading further.
    pending: VecDeque<Node>,
}

impl<R: BufRead> XmlParser<R> {
    pub(crate) fn new(reader: R, dictionary: NamespaceDictionary, registry: Arc<CatalogRegistry>) -> Self {
        Self {
            reader: NsReader::from_reader(reader),
            buf: Vec::new(),
            dictionary,
            registry,
            depth: 0,
            pending: VecDeque::new(),
        }
    }

    pub(crate) fn registry(&self) -> &CatalogRegistry {
        &self.registry
    }

    /// Reads the next structural node, skipping comments, processing
    /// instructions and declarations. Entity references are resolved and
    /// reported as text.
    pub(crate) fn next_node(&mut self) -> Result<Node> {
        if let Some(node) = self.pending.pop_front() {
            return Ok(node);
        }
        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf)?;
            let node = match event {
                Event::Start(start) => {
                    Node::Element(resolve_element(&self.reader, &self.dictionary, &start)?, false)
                }
                Event::Empty(start) => {
                    Node::Element(resolve_element(&self.reader, &self.dictionary, &start)?, true)
                }
                Event::Text(text) => Node::Text(String::from_utf8_lossy(text.as_ref()).into_owned()),
                Event::CData(data) => Node::Text(String::from_utf8_lossy(&data).into_owned()),
                Event::GeneralRef(reference) => {
                    Node::Text(resolve_reference(&String::from_utf8_lossy(&reference))?)
                }
                Event::End(_) => Node::End,
                Event::Eof => Node::Eof,
                Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => continue,
            };
            return Ok(node);
        }
    }

    /// Skips the prolog and returns the document's root element.
    pub(crate) fn read_root(&mut self) -> Result<(Element, bool)> {
        loop {
            match self.next_node()? {
                Node::Element(element, empty) => return Ok((element, empty)),
                Node::Text(text) if text.trim().is_empty() => continue,
                Node::Text(_) => {
                    return Err(SerdeError::malformed("text content before the root element"));
                }
                Node::End => return Err(SerdeError::malformed("unexpected end tag before the root element")),
                Node::Eof => return Err(SerdeError::malformed("document has no root element")),
            }
        }
    }

    /// Reads the body of `element` up to and including its end tag without
    /// interpreting it. Hand the nodes back with [`replay`](Self::replay) to
    /// parse them.
    pub(crate) fn buffer_element(&mut self, element: &Element, empty: bool) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        if empty {
            return Ok(nodes);
        }
        let mut open = 0usize;
        loop {
            let node = self.next_node()?;
            match node {
                Node::Element(_, false) => {
                    open += 1;
                    if self.depth + open >= MAX_DEPTH {
                        return Err(too_deep(element));
                    }
                }
                Node::End if open == 0 => {
                    nodes.push(node);
                    return Ok(nodes);
                }
                Node::End => open -= 1,
                Node::Eof => {
                    return Err(SerdeError::malformed(format!(
                        "document ends inside <{}>",
                        element.key
                    )));
                }
                _ => {}
            }
            nodes.push(node);
        }
    }

    /// Queues `nodes` to be read before anything else.
    pub(crate) fn replay(&mut self, nodes: Vec<Node>) {
        for node in nodes.into_iter().rev() {
            self.pending.push_front(node);
        }
    }

    /// Fills `entity` from `element`, consuming everything up to its end tag.
    pub(crate) fn parse_into(
        &mut self,
        entity: &mut dyn AnyEntity,
        element: &Element,
        empty: bool,
    ) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(too_deep(element));
        }
        self.depth += 1;
        let result = self.parse_content(entity, element, empty);
        self.depth -= 1;
        result
    }

    fn parse_content(
        &mut self,
        entity: &mut dyn AnyEntity,
        element: &Element,
        empty: bool,
    ) -> Result<()> {
        for (key, value) in &element.attributes {
            entity.hydrate(key, Value::String(value.clone()))?;
        }
        if empty {
            return Ok(());
        }

        let mut text = String::new();
        let mut has_children = false;
        let mut seen = HashSet::new();
        let mut collections: IndexMap<usize, Vec<Value>> = IndexMap::new();
        let mut unknown: IndexMap<String, Vec<Value>> = IndexMap::new();

        loop {
            match self.next_node()? {
                Node::Element(child, child_empty) => {
                    has_children = true;
                    match resolve_child(entity, &child.key) {
                        Some(index) => {
                            let field = entity.catalog().fields()[index].clone();
                            let value = self.parse_field(&field, &child, child_empty)?;
                            if field.collection {
                                collections.entry(index).or_default().push(value);
                            } else if !seen.insert(index) {
                                return Err(SerdeError::malformed(format!(
                                    "element <{}> repeats but `{}` is not a collection",
                                    child.key, field.wire_name
                                )));
                            } else {
                                entity.write_declared(index, value)?;
                            }
                        }
                        None => {
                            trace!(
                                type_name = entity.type_name(),
                                key = %child.key,
                                "Capturing unknown XML element"
                            );
                            let value = self.capture(&child, child_empty)?;
                            unknown.entry(child.key).or_default().push(value);
                        }
                    }
                }
                Node::Text(chunk) => text.push_str(&chunk),
                Node::End => break,
                Node::Eof => {
                    return Err(SerdeError::malformed(format!(
                        "document ends inside <{}>",
                        element.key
                    )));
                }
            }
        }

        for (index, items) in collections {
            entity.write_declared(index, Value::List(items))?;
        }
        for (key, mut values) in unknown {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::List(values)
            };
            entity.hydrate(&key, value)?;
        }

        let text = if has_children { text.trim() } else { text.as_str() };
        if !text.is_empty() {
            entity.hydrate(TEXT_KEY, Value::String(text.to_string()))?;
        }
        Ok(())
    }

    fn parse_field(&mut self, field: &FieldDescriptor, child: &Element, empty: bool) -> Result<Value> {
        if let Some(factory) = field.factory {
            let mut nested = factory(&self.registry);
            self.parse_into(nested.as_mut(), child, empty)?;
            return Ok(Value::Entity(nested));
        }
        if !field.leaf {
            return self.capture(child, empty);
        }

        if !child.attributes.is_empty() {
            trace!(key = %child.key, "Dropping attributes of a leaf element");
        }
        let text = if empty { String::new() } else { self.read_leaf_text(child)? };
        if text.is_empty() && field.declared_type != TypeTag::String {
            return Ok(Value::Null);
        }
        Ok(Value::String(text))
    }

    fn read_leaf_text(&mut self, element: &Element) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_node()? {
                Node::Text(chunk) => text.push_str(&chunk),
                Node::End => return Ok(text),
                Node::Element(child, _) => {
                    return Err(SerdeError::malformed(format!(
                        "leaf element <{}> contains child element <{}>",
                        element.key, child.key
                    )));
                }
                Node::Eof => {
                    return Err(SerdeError::malformed(format!(
                        "document ends inside <{}>",
                        element.key
                    )));
                }
            }
        }
    }

    /// Captures an element no declared field claims.
    ///
    /// Elements with nothing but text become strings; everything else
    /// becomes a dynamic entity.
    pub(crate) fn capture(&mut self, element: &Element, empty: bool) -> Result<Value> {
        let mut dynamic = DynamicEntity::new_in(&self.registry);
        self.parse_into(&mut dynamic, element, empty)?;
        match dynamic.unknown_keys().count() {
            0 => Ok(Value::String(String::new())),
            1 if dynamic.contains_key(TEXT_KEY) => Ok(dynamic.get(TEXT_KEY).unwrap_or_default()),
            _ => Ok(Value::Entity(Box::new(dynamic))),
        }
    }
}

fn too_deep(element: &Element) -> SerdeError {
    SerdeError::malformed(format!(
        "nesting too deep: more than {} levels at <{}>",
        MAX_DEPTH, element.key
    ))
}

/// Text of the first direct child element keyed `key` among nodes returned
/// by [`XmlParser::buffer_element`]. A self-closing child reads as empty text.
pub(crate) fn child_text(nodes: &[Node], key: &str) -> Option<String> {
    let mut open = 0usize;
    let mut nodes = nodes.iter();
    while let Some(node) = nodes.next() {
        match node {
            Node::Element(child, empty) if open == 0 && child.key == key => {
                if *empty {
                    return Some(String::new());
                }
                let mut text = String::new();
                for node in nodes.by_ref() {
                    match node {
                        Node::Text(chunk) => text.push_str(chunk),
                        _ => break,
                    }
                }
                return Some(text);
            }
            Node::Element(_, false) => open += 1,
            Node::End if open == 0 => return None,
            Node::End => open -= 1,
            _ => {}
        }
    }
    None
}

/// Resolves a child element key against the entity's catalog.
///
/// An undeclared key whose attribute form (`@key`) is a declared
/// single-valued leaf fills that leaf.
fn resolve_child(entity: &dyn AnyEntity, key: &str) -> Option<usize> {
    let catalog = entity.catalog();
    catalog.index_of(key).or_else(|| {
        let index = catalog.index_of(&format!("@{}", key))?;
        let field = catalog.field(index)?;
        (field.leaf && !field.collection).then_some(index)
    })
}

fn resolve_element<R>(
    reader: &NsReader<R>,
    dictionary: &NamespaceDictionary,
    start: &BytesStart<'_>,
) -> Result<Element> {
    let (namespace, local) = reader.resolve_element(start.name());
    let key = qualify(dictionary, namespace, local.as_ref())?;

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| SerdeError::malformed(format!("invalid attribute on <{}>: {}", key, e)))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (namespace, local) = reader.resolve_attribute(attr.key);
        let name = qualify(dictionary, namespace, local.as_ref())?;
        let raw = String::from_utf8_lossy(&attr.value);
        let value = quick_xml::escape::unescape(&raw)
            .map_err(|e| SerdeError::malformed(format!("invalid attribute value for @{}: {}", name, e)))?;
        attributes.push((format!("@{}", name), value.into_owned()));
    }
    Ok(Element { key, attributes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, helios_entity::Record)]
    struct Link {
        #[wire(rename = "@rel")]
        rel: Option<String>,
        #[wire(rename = "@href")]
        href: Option<String>,
    }

    #[derive(Clone, Debug, Default, helios_entity::Record)]
    struct Item {
        title: Option<String>,
        count: Option<i64>,
        #[wire(rename = "link")]
        links: Vec<Entity<Link>>,
    }

    fn dictionary() -> NamespaceDictionary {
        NamespaceDictionary::builder().default_namespace("urn:a").build()
    }

    #[test]
    fn test_collection_of_structured_fields() {
        let xml = r#"<entry xmlns="urn:a"><link rel="self" href="/1"/><title>T</title><link rel="edit" href="/1/e"/></entry>"#;
        let item = from_xml_str::<Item>(xml, &dictionary()).unwrap();
        assert_eq!(item.links.len(), 2);
        assert_eq!(item.links[1].rel.as_deref(), Some("edit"));
        assert_eq!(item.title.as_deref(), Some("T"));
    }

    #[test]
    fn test_empty_leaf_element_is_null_for_numbers() {
        let xml = r#"<entry xmlns="urn:a"><count/><title/></entry>"#;
        let item = from_xml_str::<Item>(xml, &dictionary()).unwrap();
        assert_eq!(item.count, None);
        assert_eq!(item.title.as_deref(), Some(""));
    }

    #[test]
    fn test_leaf_with_child_elements_is_malformed() {
        let xml = r#"<entry xmlns="urn:a"><title><b>x</b></title></entry>"#;
        let err = from_xml_str::<Item>(xml, &dictionary()).unwrap_err();
        assert!(err.is_malformed_wire_format());
    }

    #[test]
    fn test_truncated_document() {
        let err = from_xml_str::<Item>(r#"<entry xmlns="urn:a"><title>T</title>"#, &dictionary())
            .unwrap_err();
        assert!(err.is_malformed_wire_format());
    }

    #[test]
    fn test_repeated_unknown_elements_become_list() {
        let xml = r#"<entry xmlns="urn:a"><tag>a</tag><tag>b</tag></entry>"#;
        let item = from_xml_str::<Item>(xml, &dictionary()).unwrap();
        assert_eq!(
            item.get("tag"),
            Some(Value::List(vec![Value::from("a"), Value::from("b")]))
        );
    }

    fn nested(levels: usize) -> String {
        format!(
            r#"<entry xmlns="urn:a">{}{}</entry>"#,
            "<x>".repeat(levels),
            "</x>".repeat(levels)
        )
    }

    #[test]
    fn test_nesting_within_limit() {
        let item = from_xml_str::<Item>(&nested(100), &dictionary()).unwrap();
        assert!(item.contains_key("x"));
    }

    #[test]
    fn test_deep_nesting_is_malformed() {
        let err = from_xml_str::<Item>(&nested(2_000), &dictionary()).unwrap_err();
        assert!(err.is_malformed_wire_format());
        assert!(err.to_string().contains("nesting too deep"));
    }

    #[test]
    fn test_buffered_element_replays() {
        let xml = r#"<entry xmlns="urn:a"><count>3</count><title>T</title><link rel="self"/></entry>"#;
        let mut parser = XmlParser::new(xml.as_bytes(), dictionary(), CatalogRegistry::global_shared());
        let (root, empty) = parser.read_root().unwrap();
        let nodes = parser.buffer_element(&root, empty).unwrap();
        assert_eq!(child_text(&nodes, "title").as_deref(), Some("T"));
        assert_eq!(child_text(&nodes, "link").as_deref(), Some(""));
        assert_eq!(child_text(&nodes, "rel"), None);

        parser.replay(nodes);
        let mut item = Entity::<Item>::new();
        parser.parse_into(&mut item, &root, empty).unwrap();
        assert_eq!(item.count, Some(3));
        assert_eq!(item.links.len(), 1);
    }

    #[test]
    fn test_character_references_in_text() {
        let xml = r#"<entry xmlns="urn:a"><title>A &amp; B &#x21;</title></entry>"#;
        let item = from_xml_str::<Item>(xml, &dictionary()).unwrap();
        assert_eq!(item.title.as_deref(), Some("A & B !"));
    }
}
