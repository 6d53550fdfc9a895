use chrono::DateTime;
use helios_entity::{DynamicEntity, Entity, Record, Value};
use helios_wire::{CodecConfig, JsonFeedReader, Result, from_json_str, to_json_string};
use serde_json::json;

#[derive(Clone, Debug, Default, Record)]
struct Author {
    name: Option<String>,
}

#[derive(Clone, Debug, Default, Record)]
struct Video {
    id: Option<String>,
    title: Option<String>,
    #[wire(rename = "viewCount")]
    view_count: Option<i64>,
    uploaded: Option<DateTime<chrono::FixedOffset>>,
    author: Option<Entity<Author>>,
    tags: Vec<String>,
    #[wire(rename = "etag", immutable)]
    etag: Option<String>,
}

#[test]
fn test_plain_round_trip_keeps_unknown_keys() -> Result<()> {
    let document = json!({
        "id": "v1",
        "title": "Clip",
        "viewCount": 12,
        "uploaded": "2010-03-01T10:00:00+00:00",
        "author": {"name": "Ann", "uri": "http://example.com/ann"},
        "tags": ["music", "live"],
        "player": {"default": "http://example.com/p"},
        "accessControl": [true, false]
    })
    .to_string();

    let video = from_json_str::<Video>(&document, &CodecConfig::default())?;
    assert_eq!(video.view_count, Some(12));
    assert_eq!(
        video.uploaded,
        DateTime::parse_from_rfc3339("2010-03-01T10:00:00+00:00").ok()
    );
    assert_eq!(
        video.unknown_keys().collect::<Vec<_>>(),
        vec!["player", "accessControl"]
    );

    let written = to_json_string(&video, &CodecConfig::default())?;
    let reparsed = from_json_str::<Video>(&written, &CodecConfig::default())?;
    assert_eq!(reparsed, video);

    let keys: Vec<String> = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&written)?
        .keys()
        .cloned()
        .collect();
    assert_eq!(
        keys,
        vec!["id", "title", "viewCount", "uploaded", "author", "tags", "player", "accessControl"]
    );
    Ok(())
}

#[test]
fn test_jsonc_envelope() -> Result<()> {
    let config = CodecConfig::default().jsonc();
    let document = json!({"apiVersion": "2.0", "data": {"id": "v2", "title": "Wrapped"}}).to_string();

    let video = from_json_str::<Video>(&document, &config)?;
    assert_eq!(video.title.as_deref(), Some("Wrapped"));

    let written = to_json_string(&video, &config)?;
    assert_eq!(written, r#"{"data":{"id":"v2","title":"Wrapped"}}"#);
    Ok(())
}

#[test]
fn test_immutable_field_is_read_but_not_written() -> Result<()> {
    let video = from_json_str::<Video>(r#"{"etag":"W/\"7\"","title":"T"}"#, &CodecConfig::default())?;
    assert_eq!(video.etag.as_deref(), Some("W/\"7\""));
    assert_eq!(to_json_string(&video, &CodecConfig::default())?, r#"{"title":"T"}"#);
    Ok(())
}

#[test]
fn test_malformed_json() {
    let err = from_json_str::<Video>(r#"{"title": "#, &CodecConfig::default()).unwrap_err();
    assert!(err.is_malformed_wire_format());
}

#[test]
fn test_pretty_output() -> Result<()> {
    let mut entity = DynamicEntity::new();
    entity.set("title", "x")?;
    let config = CodecConfig {
        pretty: true,
        ..Default::default()
    };
    assert_eq!(to_json_string(&entity, &config)?, "{\n  \"title\": \"x\"\n}");
    Ok(())
}

#[test]
fn test_feed_reader_with_metadata() -> Result<()> {
    let document = json!({
        "data": {
            "totalItems": 3,
            "startIndex": 1,
            "items": [
                {"id": "a", "title": "First"},
                {"id": "b", "viewCount": 5},
                {"id": "c", "tags": ["x"]}
            ]
        }
    })
    .to_string();
    let config = CodecConfig::default().jsonc();

    let mut feed = JsonFeedReader::<Video>::from_slice(document.as_bytes(), &config)?;
    assert_eq!(feed.metadata().get("totalItems"), Some(Value::Integer(3)));
    assert_eq!(feed.remaining(), 3);

    let first = feed.next().unwrap()?;
    assert_eq!(first.title.as_deref(), Some("First"));
    let rest = feed.collect::<Result<Vec<_>>>()?;
    assert_eq!(rest[0].view_count, Some(5));
    assert_eq!(rest[1].tags, vec!["x"]);
    Ok(())
}

#[test]
fn test_feed_reader_stops_after_error() -> Result<()> {
    let document = json!({"items": [{"id": "a"}, {"viewCount": "lots"}, {"id": "c"}]}).to_string();
    let mut feed = JsonFeedReader::<Video>::from_slice(document.as_bytes(), &CodecConfig::default())?;

    assert!(feed.next().unwrap().is_ok());
    assert!(feed.next().unwrap().is_err());
    assert!(feed.next().is_none());
    Ok(())
}
