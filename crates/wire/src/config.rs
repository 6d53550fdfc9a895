//! Codec configuration.
//!
//! | Field | Default | Description |
//! |-------|---------|-------------|
//! | `root_element` | entry | Root element of single-entity XML documents |
//! | `entry_element` | entry | Element name of feed entries |
//! | `items_key` | items | JSON array key holding feed entries |
//! | `json_flavor` | plain | `plain` or `jsonc` (`{"data": ...}` envelope) |
//! | `pretty` | false | Indent XML and pretty-print JSON |
//! | `xml_declaration` | false | Emit an XML declaration before the root |
//! | `mask_attribute` | fields | Root attribute carrying a partial-update mask |
//! | `discriminator` | kind | Discriminator key for multi-kind feeds |
//!
//! # Example
//!
//! ```ignore
//! use helios_wire::{CodecConfig, JsonFlavor};
//!
//! let config = CodecConfig {
//!     json_flavor: JsonFlavor::JsonC,
//!     pretty: true,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// JSON payload layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonFlavor {
    /// The entity or feed object is the whole document.
    #[default]
    Plain,
    /// The entity or feed object is wrapped as `{"data": ...}`.
    #[serde(rename = "jsonc")]
    JsonC,
}

/// Settings shared by the XML and JSON codecs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub root_element: String,
    pub entry_element: String,
    pub items_key: String,
    pub json_flavor: JsonFlavor,
    pub pretty: bool,
    pub xml_declaration: bool,
    pub mask_attribute: String,
    pub discriminator: String,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            root_element: "entry".to_string(),
            entry_element: "entry".to_string(),
            items_key: "items".to_string(),
            json_flavor: JsonFlavor::Plain,
            pretty: false,
            xml_declaration: false,
            mask_attribute: "fields".to_string(),
            discriminator: "kind".to_string(),
        }
    }
}

impl CodecConfig {
    /// Same settings with the JSON-C envelope enabled.
    pub fn jsonc(mut self) -> Self {
        self.json_flavor = JsonFlavor::JsonC;
        self
    }

    pub fn is_jsonc(&self) -> bool {
        self.json_flavor == JsonFlavor::JsonC
    }
}
