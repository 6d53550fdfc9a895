//! Namespace dictionaries for XML/Atom documents.
//!
//! A [`NamespaceDictionary`] maps short aliases to namespace URIs and back.
//! Wire names use the aliases (`gd:etag`, `@gd:kind`); the URI is the identity,
//! so a document may bind the same URI under any prefix and still resolve to
//! the dictionary's alias. The empty alias `""` denotes the default namespace.

use std::collections::BTreeMap;

/// Atom syndication namespace (RFC 4287).
pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";

/// Google Data namespace, conventionally aliased `gd`.
pub const GDATA_NAMESPACE: &str = "http://schemas.google.com/g/2005";

/// OpenSearch namespace used for feed paging metadata.
pub const OPENSEARCH_NAMESPACE: &str = "http://a9.com/-/spec/opensearch/1.1/";

/// Immutable alias ↔ URI table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceDictionary {
    alias_to_uri: BTreeMap<String, String>,
    uri_to_alias: BTreeMap<String, String>,
}

impl NamespaceDictionary {
    pub fn builder() -> NamespaceDictionaryBuilder {
        NamespaceDictionaryBuilder::default()
    }

    /// Atom as the default namespace plus `gd` and `openSearch`.
    pub fn atom() -> Self {
        Self::builder()
            .default_namespace(ATOM_NAMESPACE)
            .alias("gd", GDATA_NAMESPACE)
            .alias("openSearch", OPENSEARCH_NAMESPACE)
            .build()
    }

    pub fn uri_for_alias(&self, alias: &str) -> Option<&str> {
        self.alias_to_uri.get(alias).map(String::as_str)
    }

    pub fn alias_for_uri(&self, uri: &str) -> Option<&str> {
        self.uri_to_alias.get(uri).map(String::as_str)
    }

    /// URI of the default (`""`) namespace, if one is declared.
    pub fn default_namespace(&self) -> Option<&str> {
        self.uri_for_alias("")
    }

    /// `(alias, uri)` pairs ordered by alias.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.alias_to_uri
            .iter()
            .map(|(alias, uri)| (alias.as_str(), uri.as_str()))
    }

    pub fn len(&self) -> usize {
        self.alias_to_uri.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alias_to_uri.is_empty()
    }
}

/// Builder for [`NamespaceDictionary`].
///
/// Re-binding an alias replaces its URI. When several aliases share one URI,
/// the first alias registered for it is the one the URI resolves back to.
#[derive(Debug, Default)]
pub struct NamespaceDictionaryBuilder {
    entries: Vec<(String, String)>,
}

impl NamespaceDictionaryBuilder {
    pub fn alias(mut self, alias: impl Into<String>, uri: impl Into<String>) -> Self {
        let alias = alias.into();
        let uri = uri.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == alias) {
            Some(entry) => entry.1 = uri,
            None => self.entries.push((alias, uri)),
        }
        self
    }

    pub fn default_namespace(self, uri: impl Into<String>) -> Self {
        self.alias("", uri)
    }

    pub fn build(self) -> NamespaceDictionary {
        let mut dictionary = NamespaceDictionary::default();
        for (alias, uri) in self.entries {
            dictionary
                .uri_to_alias
                .entry(uri.clone())
                .or_insert_with(|| alias.clone());
            dictionary.alias_to_uri.insert(alias, uri);
        }
        dictionary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bidirectional_lookup() {
        let dictionary = NamespaceDictionary::builder()
            .default_namespace(ATOM_NAMESPACE)
            .alias("g", "http://schemas.example.com/g/2005")
            .build();

        assert_eq!(dictionary.default_namespace(), Some(ATOM_NAMESPACE));
        assert_eq!(
            dictionary.uri_for_alias("g"),
            Some("http://schemas.example.com/g/2005")
        );
        assert_eq!(
            dictionary.alias_for_uri("http://schemas.example.com/g/2005"),
            Some("g")
        );
        assert_eq!(dictionary.alias_for_uri(ATOM_NAMESPACE), Some(""));
        assert_eq!(dictionary.alias_for_uri("urn:nothing"), None);
    }

    #[test]
    fn test_rebinding_alias_replaces_uri() {
        let dictionary = NamespaceDictionary::builder()
            .alias("x", "urn:one")
            .alias("x", "urn:two")
            .build();
        assert_eq!(dictionary.uri_for_alias("x"), Some("urn:two"));
        assert_eq!(dictionary.alias_for_uri("urn:one"), None);
        assert_eq!(dictionary.len(), 1);
    }

    #[test]
    fn test_shared_uri_resolves_to_first_alias() {
        let dictionary = NamespaceDictionary::builder()
            .alias("gd", GDATA_NAMESPACE)
            .alias("g", GDATA_NAMESPACE)
            .build();
        assert_eq!(dictionary.alias_for_uri(GDATA_NAMESPACE), Some("gd"));
        assert_eq!(dictionary.uri_for_alias("g"), Some(GDATA_NAMESPACE));
    }

    #[test]
    fn test_atom_preset() {
        let dictionary = NamespaceDictionary::atom();
        let aliases: Vec<_> = dictionary.iter().map(|(alias, _)| alias).collect();
        assert_eq!(aliases, vec!["", "gd", "openSearch"]);
    }
}
