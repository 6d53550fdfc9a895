//! XML serialization of entities.
//!
//! The root element is written in the dictionary's default namespace and
//! declares every alias used anywhere in the tree. Each entity entry is then
//! written by key convention: `@name` as an attribute of the current element,
//! `text()` as its text content, anything else as a child element. Lists
//! repeat the child element once per item and nested entities recurse.

use std::collections::BTreeSet;
use std::io::Write;

use helios_entity::{AnyEntity, NamespaceDictionary, Value};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;

use super::utils::{TEXT_KEY, alias_of, is_attribute_key, strip_attribute_marker};
use crate::config::CodecConfig;
use crate::error::{Result, SerdeError};

/// Serializes an entity to an XML string under `config.root_element`.
///
/// # Examples
///
/// ```ignore
/// use helios_entity::NamespaceDictionary;
/// use helios_wire::{CodecConfig, xml::to_xml_string};
///
/// let xml = to_xml_string(&photo, &NamespaceDictionary::atom(), &CodecConfig::default())?;
/// ```
pub fn to_xml_string(
    entity: &dyn AnyEntity,
    dictionary: &NamespaceDictionary,
    config: &CodecConfig,
) -> Result<String> {
    let bytes = to_xml_vec(entity, dictionary, config)?;
    String::from_utf8(bytes).map_err(|e| SerdeError::Custom(format!("Invalid UTF-8: {}", e)))
}

/// Serializes an entity to XML bytes.
pub fn to_xml_vec(
    entity: &dyn AnyEntity,
    dictionary: &NamespaceDictionary,
    config: &CodecConfig,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    to_xml_writer(&mut buf, entity, dictionary, config)?;
    Ok(buf)
}

/// Serializes an entity as XML into `writer`.
pub fn to_xml_writer<W: Write>(
    writer: W,
    entity: &dyn AnyEntity,
    dictionary: &NamespaceDictionary,
    config: &CodecConfig,
) -> Result<()> {
    let mut emitter = XmlEmitter::new(writer, dictionary, config);
    emitter.write_document(&config.root_element, entity, &[])
}

/// Writes entity trees as XML events.
pub(crate) struct XmlEmitter<'a, W: Write> {
    writer: Writer<W>,
    dictionary: &'a NamespaceDictionary,
    xml_declaration: bool,
}

impl<'a, W: Write> XmlEmitter<'a, W> {
    pub(crate) fn new(writer: W, dictionary: &'a NamespaceDictionary, config: &CodecConfig) -> Self {
        let writer = if config.pretty {
            Writer::new_with_indent(writer, b' ', 2)
        } else {
            Writer::new(writer)
        };
        Self {
            writer,
            dictionary,
            xml_declaration: config.xml_declaration,
        }
    }

    /// Writes `entity` as a complete document rooted at `root`.
    ///
    /// `extra` entries are written on the root before the entity's own
    /// entries, following the same key conventions.
    pub(crate) fn write_document(
        &mut self,
        root: &str,
        entity: &dyn AnyEntity,
        extra: &[(String, Value)],
    ) -> Result<()> {
        debug!(type_name = entity.type_name(), root, "Serializing XML entity");

        let mut aliases = BTreeSet::new();
        for (key, value) in extra {
            collect_aliases(key, value, &mut aliases);
        }
        collect_entity_aliases(entity, &mut aliases);
        if let Some(alias) = alias_of(root) {
            aliases.insert(alias.to_string());
        }

        let mut declarations = Vec::new();
        if let Some(uri) = self.dictionary.default_namespace() {
            declarations.push(("xmlns".to_string(), uri.to_string()));
        }
        for alias in aliases {
            // `xml` is bound implicitly.
            if alias == "xml" {
                continue;
            }
            let uri = self.dictionary.uri_for_alias(&alias).ok_or_else(|| {
                SerdeError::malformed(format!("alias `{}` is not in the namespace dictionary", alias))
            })?;
            declarations.push((format!("xmlns:{}", alias), uri.to_string()));
        }

        if self.xml_declaration {
            self.writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        }

        let entries: Vec<(String, Value)> = extra
            .iter()
            .cloned()
            .chain(entity.iter().map(|(key, value)| (key.to_string(), value)))
            .collect();
        self.write_element(root, &declarations, &entries)
    }

    fn write_element(
        &mut self,
        name: &str,
        declarations: &[(String, String)],
        entries: &[(String, Value)],
    ) -> Result<()> {
        let mut start = BytesStart::new(name);
        for (attr, uri) in declarations {
            start.push_attribute((attr.as_str(), uri.as_str()));
        }

        let mut content = Vec::new();
        for (key, value) in entries {
            if value.is_null() {
                continue;
            }
            if is_attribute_key(key) {
                let text = value.to_text().ok_or_else(|| {
                    SerdeError::malformed(format!(
                        "attribute `{}` cannot hold a {} value",
                        key,
                        value.kind_name()
                    ))
                })?;
                start.push_attribute((strip_attribute_marker(key), text.as_str()));
            } else {
                content.push((key, value));
            }
        }

        if content.is_empty() {
            self.writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        self.writer.write_event(Event::Start(start))?;
        for (key, value) in content {
            if key == TEXT_KEY {
                let text = value.to_text().ok_or_else(|| {
                    SerdeError::malformed(format!("text content cannot be a {} value", value.kind_name()))
                })?;
                self.writer.write_event(Event::Text(BytesText::new(&text)))?;
            } else {
                self.write_value(key, value)?;
            }
        }
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn write_value(&mut self, key: &str, value: &Value) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            Value::List(items) => {
                for item in items {
                    self.write_value(key, item)?;
                }
                Ok(())
            }
            Value::Entity(entity) => {
                let entries: Vec<(String, Value)> = entity
                    .iter()
                    .map(|(key, value)| (key.to_string(), value))
                    .collect();
                self.write_element(key, &[], &entries)
            }
            leaf => {
                let text = leaf.to_text().unwrap_or_default();
                if text.is_empty() {
                    self.writer.write_event(Event::Empty(BytesStart::new(key)))?;
                } else {
                    self.writer.write_event(Event::Start(BytesStart::new(key)))?;
                    self.writer.write_event(Event::Text(BytesText::new(&text)))?;
                    self.writer.write_event(Event::End(BytesEnd::new(key)))?;
                }
                Ok(())
            }
        }
    }
}

fn collect_entity_aliases(entity: &dyn AnyEntity, aliases: &mut BTreeSet<String>) {
    for (key, value) in entity.iter() {
        collect_aliases(key, &value, aliases);
    }
}

fn collect_aliases(key: &str, value: &Value, aliases: &mut BTreeSet<String>) {
    if value.is_null() {
        return;
    }
    if let Some(alias) = alias_of(key) {
        aliases.insert(alias.to_string());
    }
    match value {
        Value::List(items) => {
            for item in items {
                collect_aliases(key, item, aliases);
            }
        }
        Value::Entity(entity) => collect_entity_aliases(entity.as_ref(), aliases),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_entity::DynamicEntity;

    #[test]
    fn test_attribute_text_and_children() {
        let mut link = DynamicEntity::new();
        link.set("@rel", "alternate").unwrap();
        link.set("@href", "http://example.com/").unwrap();

        let mut title = DynamicEntity::new();
        title.set("@type", "text").unwrap();
        title.set("text()", "A < B").unwrap();

        let mut entry = DynamicEntity::new();
        entry.set("title", title).unwrap();
        entry.set("link", link).unwrap();

        let dictionary = NamespaceDictionary::atom();
        let xml = to_xml_string(&entry, &dictionary, &CodecConfig::default()).unwrap();
        assert_eq!(
            xml,
            r#"<entry xmlns="http://www.w3.org/2005/Atom"><title type="text">A &lt; B</title><link rel="alternate" href="http://example.com/"/></entry>"#
        );
    }

    #[test]
    fn test_declares_only_used_aliases() {
        let mut entry = DynamicEntity::new();
        entry.set("@gd:etag", "W/\"1\"").unwrap();
        entry.set("title", "x").unwrap();

        let xml = to_xml_string(&entry, &NamespaceDictionary::atom(), &CodecConfig::default()).unwrap();
        assert!(xml.contains(r#"xmlns:gd="http://schemas.google.com/g/2005""#));
        assert!(!xml.contains("openSearch"));
        assert!(xml.contains(r#"gd:etag="W/&quot;1&quot;""#));
    }

    #[test]
    fn test_unknown_alias_is_rejected() {
        let mut entry = DynamicEntity::new();
        entry.set("yt:rating", 5).unwrap();
        let err = to_xml_string(&entry, &NamespaceDictionary::atom(), &CodecConfig::default())
            .unwrap_err();
        assert!(err.is_malformed_wire_format());
    }

    #[test]
    fn test_list_repeats_element_and_declaration() {
        let mut entry = DynamicEntity::new();
        entry
            .set("category", Value::List(vec!["a".into(), "b".into()]))
            .unwrap();
        let config = CodecConfig {
            xml_declaration: true,
            ..Default::default()
        };
        let dictionary = NamespaceDictionary::default();
        let xml = to_xml_string(&entry, &dictionary, &config).unwrap();
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="UTF-8"?><entry><category>a</category><category>b</category></entry>"#
        );
    }
}
