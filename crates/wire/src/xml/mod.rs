//! Namespace-aware XML/Atom codec.
//!
//! ## Key conventions
//!
//! | Wire key | XML |
//! |----------|-----|
//! | `title` | `<title>Sunset</title>` (default namespace) |
//! | `gd:rating` | `<gd:rating>4</gd:rating>` |
//! | `@etag` | `etag="..."` attribute on the current element |
//! | `@gd:kind` | `gd:kind="..."` attribute |
//! | `text()` | text content of the current element |
//!
//! Aliases come from a [`NamespaceDictionary`](helios_entity::NamespaceDictionary).
//! On parse, names are resolved by namespace URI, so a document may use any
//! prefix (or the default namespace) for a URI the dictionary knows.
//!
//! A child element whose key is not declared, but whose attribute form
//! (`@key`) is a declared leaf, fills that leaf:
//!
//! ```xml
//! <entry xmlns="a"><etag>&quot;123&quot;</etag></entry>
//! ```
//!
//! populates a field declared as `@etag`.

pub mod de;
pub mod feed;
pub mod ser;
pub mod utils;

pub use de::{MAX_DEPTH, from_xml_reader, from_xml_reader_in, from_xml_str};
pub use feed::FeedReader;
pub use ser::{to_xml_string, to_xml_vec, to_xml_writer};
pub use utils::TEXT_KEY;
