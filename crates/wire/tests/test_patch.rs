use helios_entity::{Entity, NamespaceDictionary, Record, Value};
use helios_wire::xml::from_xml_str;
use helios_wire::{CodecConfig, FieldMask, PartialUpdate, Result, diff};

#[derive(Clone, Debug, Default, Record)]
struct Video {
    title: Option<String>,
    views: Option<i64>,
    #[wire(rename = "gd:rating")]
    rating: Option<i64>,
    #[wire(rename = "@gd:etag", immutable)]
    etag: Option<String>,
}

fn original() -> Result<Entity<Video>> {
    let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005" gd:etag="W/&quot;9&quot;">
  <title>Clip</title>
  <views>10</views>
</entry>"#;
    from_xml_str::<Video>(xml, &NamespaceDictionary::atom())
}

#[test]
fn test_diff_reports_only_changed_leaves() -> Result<()> {
    let original = original()?;
    let mut patched = original.clone();
    patched.set("views", 20)?;

    let (mask, payload) = diff(&original, &patched)?;
    assert_eq!(mask, FieldMask::parse("views"));
    assert_eq!(payload.iter().collect::<Vec<_>>(), vec![("views", Value::Integer(20))]);
    Ok(())
}

#[test]
fn test_diff_of_identical_entities_is_empty() -> Result<()> {
    let original = original()?;
    let (mask, payload) = diff(&original, &original.clone())?;
    assert!(mask.is_empty());
    assert!(payload.is_empty());
    Ok(())
}

#[test]
fn test_xml_update_carries_mask_and_identity() -> Result<()> {
    let original = original()?;
    let mut patched = original.clone();
    patched.set("views", 20)?;
    patched.set("gd:rating", 4)?;

    let etag = original.etag.clone().unwrap_or_default();
    let update = PartialUpdate::from_diff(&original, &patched)?.with_identity("@gd:etag", etag);
    let xml = update.to_xml_string(&NamespaceDictionary::atom(), &CodecConfig::default())?;

    assert_eq!(
        xml,
        r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005" fields="views,gd:rating" gd:etag="W/&quot;9&quot;"><views>20</views><gd:rating>4</gd:rating></entry>"#
    );
    Ok(())
}

#[test]
fn test_empty_update_has_no_mask_attribute() -> Result<()> {
    let original = original()?;
    let update = PartialUpdate::from_diff(&original, &original)?;
    assert!(update.is_empty());

    let xml = update.to_xml_string(&NamespaceDictionary::atom(), &CodecConfig::default())?;
    assert_eq!(xml, r#"<entry xmlns="http://www.w3.org/2005/Atom"/>"#);
    Ok(())
}
