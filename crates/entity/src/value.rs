//! Dynamic values stored in entities.
//!
//! Every declared field is read and written through a [`Value`], and the
//! unknown-key bag of an entity holds values directly. Leaf variants cover the
//! scalar wire types (string, number, boolean, date-time); [`Value::List`]
//! carries repeated fields and [`Value::Entity`] carries nested structures.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::entity::{AnyEntity, Entity};
use crate::record::Record;

/// A dynamically typed field value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value. Serializers skip null entries.
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<FixedOffset>),
    /// Repeated values of a collection field, in wire order.
    List(Vec<Value>),
    /// A nested structure, typed or dynamic.
    Entity(Box<dyn AnyEntity>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for scalar variants (string, number, boolean, date-time).
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Value::Bool(_)
                | Value::Integer(_)
                | Value::Float(_)
                | Value::String(_)
                | Value::DateTime(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&dyn AnyEntity> {
        match self {
            Value::Entity(entity) => Some(entity.as_ref()),
            _ => None,
        }
    }

    /// Short name of the variant, used in conversion errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::DateTime(_) => "date-time",
            Value::List(_) => "list",
            Value::Entity(_) => "entity",
        }
    }

    /// Renders a leaf value as wire text.
    ///
    /// Returns `None` for null, list and entity values, which have no single
    /// textual form. Date-times are written as RFC 3339 with the original
    /// offset preserved.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Value::Integer(n) => Some(n.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::DateTime(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
            Value::Null | Value::List(_) | Value::Entity(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => a.content_eq(b.as_ref()),
            _ => false,
        }
    }
}

impl Clone for Box<dyn AnyEntity> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => {
                serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, false))
            }
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Entity(entity) => entity.as_ref().serialize(serializer),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::DateTime(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl<T: Record> From<Entity<T>> for Value {
    fn from(value: Entity<T>) -> Self {
        Value::Entity(Box::new(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_text_for_leaves() {
        assert_eq!(Value::from(true).to_text().as_deref(), Some("true"));
        assert_eq!(Value::from(800).to_text().as_deref(), Some("800"));
        assert_eq!(Value::from(1.5).to_text().as_deref(), Some("1.5"));
        assert_eq!(Value::from("Sunset").to_text().as_deref(), Some("Sunset"));
        assert_eq!(Value::Null.to_text(), None);
        assert_eq!(Value::List(vec![]).to_text(), None);
    }

    #[test]
    fn test_date_time_text_keeps_offset() {
        let dt = DateTime::parse_from_rfc3339("2010-05-04T13:30:00-07:00").unwrap();
        assert_eq!(
            Value::from(dt).to_text().as_deref(),
            Some("2010-05-04T13:30:00-07:00")
        );
    }

    #[test]
    fn test_equality_is_by_variant() {
        assert_eq!(Value::from(10), Value::Integer(10));
        assert_ne!(Value::from(10), Value::from("10"));
        assert_ne!(Value::Integer(1), Value::Float(1.0));
        assert_eq!(Value::from(None::<String>), Value::Null);
    }
}
