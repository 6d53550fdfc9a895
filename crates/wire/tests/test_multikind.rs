use helios_entity::{Entity, NamespaceDictionary, Record};
use helios_wire::{Codec, CodecConfig, MultiKindParser, Result, SerdeError};
use serde_json::json;

#[derive(Clone, Debug, Record)]
struct Album {
    kind: Option<String>,
    title: Option<String>,
}

impl Default for Album {
    fn default() -> Self {
        Self {
            kind: Some("a".to_string()),
            title: None,
        }
    }
}

#[derive(Clone, Debug, Record)]
struct Comment {
    kind: Option<String>,
    content: Option<String>,
}

impl Default for Comment {
    fn default() -> Self {
        Self {
            kind: Some("c".to_string()),
            content: None,
        }
    }
}

/// Declares `kind` but leaves it unset by default.
#[derive(Clone, Debug, Default, Record)]
struct Untagged {
    kind: Option<String>,
}

/// Second type claiming kind "a".
#[derive(Clone, Debug, Record)]
#[wire(type_name = "OtherAlbum")]
struct OtherAlbum {
    kind: Option<String>,
}

impl Default for OtherAlbum {
    fn default() -> Self {
        Self {
            kind: Some("a".to_string()),
        }
    }
}

#[derive(Clone, Debug, Record)]
struct Event {
    #[wire(rename = "@gd:kind")]
    kind: Option<String>,
    title: Option<String>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            kind: Some("http://schemas.google.com/g/2005#event".to_string()),
            title: None,
        }
    }
}

#[derive(Clone, Debug, Record)]
struct Photo {
    kind: Option<String>,
    title: Option<String>,
    width: Option<i64>,
    #[wire(rename = "@etag", immutable)]
    etag: Option<String>,
}

impl Default for Photo {
    fn default() -> Self {
        Self {
            kind: Some("p".to_string()),
            title: None,
            width: None,
            etag: None,
        }
    }
}

#[derive(Debug)]
enum Item {
    Album(Entity<Album>),
    Comment(Entity<Comment>),
    #[allow(dead_code)]
    Untagged(Entity<Untagged>),
    #[allow(dead_code)]
    OtherAlbum(Entity<OtherAlbum>),
    Event(Entity<Event>),
    Photo(Entity<Photo>),
}

impl From<Entity<Album>> for Item {
    fn from(entity: Entity<Album>) -> Self {
        Item::Album(entity)
    }
}

impl From<Entity<Comment>> for Item {
    fn from(entity: Entity<Comment>) -> Self {
        Item::Comment(entity)
    }
}

impl From<Entity<Untagged>> for Item {
    fn from(entity: Entity<Untagged>) -> Self {
        Item::Untagged(entity)
    }
}

impl From<Entity<OtherAlbum>> for Item {
    fn from(entity: Entity<OtherAlbum>) -> Self {
        Item::OtherAlbum(entity)
    }
}

impl From<Entity<Event>> for Item {
    fn from(entity: Entity<Event>) -> Self {
        Item::Event(entity)
    }
}

impl From<Entity<Photo>> for Item {
    fn from(entity: Entity<Photo>) -> Self {
        Item::Photo(entity)
    }
}

fn parser() -> Result<MultiKindParser<Item>> {
    MultiKindParser::new("kind")
        .register::<Album>()?
        .register::<Comment>()
}

fn variant(item: &Item) -> &'static str {
    match item {
        Item::Album(_) => "Album",
        Item::Comment(_) => "Comment",
        Item::Untagged(_) => "Untagged",
        Item::OtherAlbum(_) => "OtherAlbum",
        Item::Event(_) => "Event",
        Item::Photo(_) => "Photo",
    }
}

#[test]
fn test_dispatch_in_feed_order() -> Result<()> {
    let document = json!({
        "items": [
            {"kind": "a", "title": "Trip"},
            {"kind": "c", "content": "Nice"},
            {"kind": "a", "title": "Home", "location": "Paris"}
        ]
    })
    .to_string();
    let parser = parser()?;
    let items = parser
        .parse_json(document.as_bytes(), &CodecConfig::default())?
        .collect::<Result<Vec<_>>>()?;

    assert_eq!(
        items.iter().map(variant).collect::<Vec<_>>(),
        vec!["Album", "Comment", "Album"]
    );
    match &items[2] {
        Item::Album(album) => {
            assert_eq!(album.title.as_deref(), Some("Home"));
            assert!(album.contains_key("location"));
        }
        other => panic!("unexpected {:?}", other),
    }
    Ok(())
}

#[test]
fn test_unrecognized_kind_stops_with_partial_results() -> Result<()> {
    let document = json!({
        "items": [
            {"kind": "a"},
            {"kind": "z"},
            {"kind": "c"}
        ]
    })
    .to_string();
    let parser = parser()?;
    let (items, error) = parser
        .parse_json(document.as_bytes(), &CodecConfig::default())?
        .collect_entries();

    assert_eq!(items.len(), 1);
    assert!(matches!(
        error,
        Some(SerdeError::UnrecognizedKind { kind: Some(ref kind), position: 1 }) if kind == "z"
    ));
    Ok(())
}

#[test]
fn test_missing_discriminator_value() -> Result<()> {
    let document = json!({"items": [{"title": "no kind"}]}).to_string();
    let parser = parser()?;
    let (items, error) = parser
        .parse_json(document.as_bytes(), &CodecConfig::default())?
        .collect_entries();

    assert!(items.is_empty());
    assert!(matches!(error, Some(SerdeError::UnrecognizedKind { kind: None, position: 0 })));
    Ok(())
}

#[test]
fn test_registration_requires_default_kind() {
    let err = MultiKindParser::<Item>::new("kind")
        .register::<Untagged>()
        .err()
        .unwrap();
    assert!(matches!(
        err,
        SerdeError::MissingDiscriminatorField { type_name: "Untagged", .. }
    ));
}

#[test]
fn test_registration_rejects_duplicate_kind() -> Result<()> {
    let err = parser()?.register::<OtherAlbum>().err().unwrap();
    assert!(matches!(
        err,
        SerdeError::DuplicateKind { ref kind, first: "Album", second: "OtherAlbum" } if kind == "a"
    ));
    Ok(())
}

#[test]
fn test_xml_attribute_discriminator() -> Result<()> {
    let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005">
  <entry gd:kind="http://schemas.google.com/g/2005#event"><title>Meetup</title></entry>
  <entry gd:kind="http://schemas.google.com/g/2005#contact"><title>Ann</title></entry>
</feed>"#;
    let parser = MultiKindParser::<Item>::new("@gd:kind").register::<Event>()?;
    let mut feed = parser.parse_xml(
        xml.as_bytes(),
        &NamespaceDictionary::atom(),
        &CodecConfig::default(),
    )?;

    match feed.next().unwrap()? {
        Item::Event(event) => assert_eq!(event.title.as_deref(), Some("Meetup")),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        feed.next(),
        Some(Err(SerdeError::UnrecognizedKind { position: 1, .. }))
    ));
    assert!(feed.next().is_none());
    Ok(())
}

#[test]
fn test_xml_element_discriminator_through_codec() -> Result<()> {
    let xml = r#"<feed xmlns="urn:photos">
  <entry><kind>c</kind><content>First!</content></entry>
  <entry><kind>a</kind><title>Trip</title></entry>
</feed>"#;
    let dictionary = NamespaceDictionary::builder()
        .default_namespace("urn:photos")
        .build();
    let codec = Codec::new(dictionary, CodecConfig::default());
    let parser = codec.multi_kind_parser::<Item>().register::<Album>()?.register::<Comment>()?;

    let items = codec
        .multi_kind_feed_from(&parser, xml.as_bytes(), "application/atom+xml")?
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(items.iter().map(variant).collect::<Vec<_>>(), vec!["Comment", "Album"]);
    Ok(())
}

fn photo_feed(entries: &str) -> Result<(Vec<Item>, Option<SerdeError>)> {
    let xml = format!(r#"<feed xmlns="urn:photos">{}</feed>"#, entries);
    let dictionary = NamespaceDictionary::builder()
        .default_namespace("urn:photos")
        .build();
    let parser = MultiKindParser::<Item>::new("kind")
        .register::<Photo>()?
        .register::<Comment>()?;
    Ok(parser
        .parse_xml(xml.as_bytes(), &dictionary, &CodecConfig::default())?
        .collect_entries())
}

#[test]
fn test_element_discriminator_parses_as_registered_type() -> Result<()> {
    let (items, error) = photo_feed(
        r#"<entry><title>Dawn</title><kind>p</kind><width/><etag>&quot;123&quot;</etag></entry>
<entry><kind>c</kind><content>Nice</content></entry>"#,
    )?;
    assert!(error.is_none(), "{:?}", error);
    assert_eq!(items.iter().map(variant).collect::<Vec<_>>(), vec!["Photo", "Comment"]);

    match &items[0] {
        Item::Photo(photo) => {
            assert_eq!(photo.title.as_deref(), Some("Dawn"));
            assert_eq!(photo.width, None);
            assert_eq!(photo.etag.as_deref(), Some("\"123\""));
            assert!(photo.unknown_keys().next().is_none());
        }
        other => panic!("unexpected {:?}", other),
    }
    Ok(())
}

#[test]
fn test_element_discriminator_repeat_is_malformed() -> Result<()> {
    let (items, error) = photo_feed(
        r#"<entry><kind>p</kind><title>a</title></entry>
<entry><kind>p</kind><title>b</title><title>c</title></entry>
<entry><kind>p</kind></entry>"#,
    )?;
    assert_eq!(items.len(), 1);
    let error = error.unwrap();
    assert!(matches!(error, SerdeError::MalformedWireFormat { .. }), "{:?}", error);
    assert!(error.is_malformed_wire_format());
    Ok(())
}

#[test]
fn test_element_discriminator_missing() -> Result<()> {
    let (items, error) = photo_feed(r#"<entry><title>untyped</title></entry>"#)?;
    assert!(items.is_empty());
    assert!(matches!(error, Some(SerdeError::UnrecognizedKind { kind: None, position: 0 })));
    Ok(())
}
