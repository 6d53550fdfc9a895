//! Wire-name conventions and namespace helpers for the XML codec.
//!
//! Keys of the form `@name` are attributes of the current element, the key
//! [`TEXT_KEY`] is the element's text content and every other key is a child
//! element. A key may carry a dictionary alias prefix (`gd:etag`,
//! `@gd:kind`); unprefixed keys live in the default namespace.

use helios_entity::NamespaceDictionary;
use quick_xml::name::ResolveResult;

use crate::error::{Result, SerdeError};

/// Key holding element text content.
pub const TEXT_KEY: &str = "text()";

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Checks whether a key is written as an attribute.
pub fn is_attribute_key(key: &str) -> bool {
    key.starts_with('@')
}

/// Strips the attribute marker from a key.
pub fn strip_attribute_marker(key: &str) -> &str {
    key.strip_prefix('@').unwrap_or(key)
}

/// Returns the alias prefix of a key, if any (`"gd"` for `@gd:etag`).
pub fn alias_of(key: &str) -> Option<&str> {
    strip_attribute_marker(key)
        .split_once(':')
        .map(|(alias, _)| alias)
}

/// Builds the key for a resolved XML name.
///
/// The namespace URI decides the alias; the prefix used in the document is
/// irrelevant. URIs the dictionary does not know are a wire-format error.
pub fn qualify(
    dictionary: &NamespaceDictionary,
    namespace: ResolveResult<'_>,
    local: &[u8],
) -> Result<String> {
    let local = String::from_utf8_lossy(local);
    match namespace {
        ResolveResult::Unbound => Ok(local.into_owned()),
        ResolveResult::Bound(ns) => {
            let uri = String::from_utf8_lossy(ns.as_ref());
            let alias = if uri == XML_NAMESPACE {
                Some("xml")
            } else {
                dictionary.alias_for_uri(&uri)
            };
            match alias {
                Some("") => Ok(local.into_owned()),
                Some(alias) => Ok(format!("{}:{}", alias, local)),
                None => Err(SerdeError::malformed(format!(
                    "namespace `{}` of <{}> is not in the namespace dictionary",
                    uri, local
                ))),
            }
        }
        ResolveResult::Unknown(prefix) => Err(SerdeError::malformed(format!(
            "undeclared namespace prefix `{}`",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

/// Resolves a character or predefined entity reference (`#x22`, `quot`).
pub fn resolve_reference(name: &str) -> Result<String> {
    if let Some(code) = name.strip_prefix('#') {
        let parsed = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => code.parse::<u32>(),
        };
        return parsed
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .ok_or_else(|| SerdeError::malformed(format!("invalid character reference `&{};`", name)));
    }
    quick_xml::escape::resolve_predefined_entity(name)
        .map(str::to_string)
        .ok_or_else(|| SerdeError::malformed(format!("unknown entity `&{};`", name)))
}
