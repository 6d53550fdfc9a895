//! Field metadata and typed field conversion.
//!
//! [`FieldValue`] is implemented by every Rust type that may appear as a
//! declared record field. It reports the field's [`FieldShape`] (type tag,
//! collection flag, nested factory) and converts between the typed field and a
//! dynamic [`Value`]. The derive macro builds one [`FieldDescriptor`] per
//! declared field from these shapes.

use chrono::{DateTime, FixedOffset};

use crate::catalog::CatalogRegistry;
use crate::entity::{AnyEntity, Entity};
use crate::error::ValueError;
use crate::record::Record;
use crate::value::Value;

/// Creates an empty instance of a nested record type, its catalog taken
/// from the given registry.
pub type EntityFactory = fn(&CatalogRegistry) -> Box<dyn AnyEntity>;

/// Classification of a field's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    /// A nested record, named by its `Record::TYPE_NAME`.
    Record(&'static str),
    /// Any dynamic value.
    Any,
}

impl TypeTag {
    /// Scalars are leaves; nested records and dynamic values are not.
    pub fn is_leaf(&self) -> bool {
        !matches!(self, TypeTag::Record(_) | TypeTag::Any)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::Boolean => "boolean",
            TypeTag::DateTime => "date-time",
            TypeTag::Record(name) => name,
            TypeTag::Any => "any",
        }
    }
}

/// The wire shape of a field type.
#[derive(Debug, Clone, Copy)]
pub struct FieldShape {
    pub tag: TypeTag,
    pub collection: bool,
    /// Present when the element type is a nested record.
    pub factory: Option<EntityFactory>,
}

impl FieldShape {
    pub const fn leaf(tag: TypeTag) -> Self {
        Self {
            tag,
            collection: false,
            factory: None,
        }
    }
}

/// Metadata for one declared field of a record type.
///
/// Built once per record type when its catalog is first requested and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Name of the Rust member backing the field.
    pub member: &'static str,
    /// External key used on the wire.
    pub wire_name: &'static str,
    pub declared_type: TypeTag,
    pub collection: bool,
    pub leaf: bool,
    pub immutable: bool,
    pub factory: Option<EntityFactory>,
}

impl FieldDescriptor {
    /// Describes a field of Rust type `F`.
    pub fn new<F: FieldValue>(member: &'static str, wire_name: &'static str, immutable: bool) -> Self {
        let shape = F::shape();
        Self {
            member,
            wire_name,
            declared_type: shape.tag,
            collection: shape.collection,
            leaf: shape.tag.is_leaf(),
            immutable,
            factory: shape.factory,
        }
    }

    /// True when the field holds a nested structure rather than scalars.
    pub fn is_structured(&self) -> bool {
        self.factory.is_some()
    }
}

/// Conversion between a typed record field and a dynamic [`Value`].
pub trait FieldValue: Sized {
    fn shape() -> FieldShape;

    /// Reads the field. Absent values (`None`, empty collections) are `Null`.
    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, ValueError>;
}

fn mismatch(expected: &'static str, value: &Value) -> ValueError {
    match value {
        Value::String(s) => ValueError::new(expected, format!("string {:?}", s)),
        other => ValueError::new(expected, other.kind_name()),
    }
}

impl FieldValue for String {
    fn shape() -> FieldShape {
        FieldShape::leaf(TypeTag::String)
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(s) => Ok(s),
            Value::Null => Ok(String::new()),
            // JSON feeds routinely send numbers and booleans where a string is declared.
            other if other.is_leaf() => other
                .to_text()
                .ok_or_else(|| mismatch("string", &other)),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl FieldValue for bool {
    fn shape() -> FieldShape {
        FieldShape::leaf(TypeTag::Boolean)
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            Value::String(ref s) => match s.trim() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(mismatch("boolean", &value)),
            },
            other => Err(mismatch("boolean", &other)),
        }
    }
}

fn integer_from_value(value: Value) -> Result<i64, ValueError> {
    match value {
        Value::Integer(n) => Ok(n),
        Value::Null => Ok(0),
        Value::String(ref s) => s.trim().parse().map_err(|_| mismatch("integer", &value)),
        other => Err(mismatch("integer", &other)),
    }
}

macro_rules! integer_field_value {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                fn shape() -> FieldShape {
                    FieldShape::leaf(TypeTag::Integer)
                }

                fn to_value(&self) -> Value {
                    Value::Integer(*self as i64)
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let n = integer_from_value(value)?;
                    <$ty>::try_from(n).map_err(|_| {
                        ValueError::new(stringify!($ty), format!("out of range integer {}", n))
                    })
                }
            }
        )*
    };
}

integer_field_value!(i32, i64, u32);

impl FieldValue for u64 {
    fn shape() -> FieldShape {
        FieldShape::leaf(TypeTag::Integer)
    }

    fn to_value(&self) -> Value {
        // Values above i64::MAX only survive as floats.
        i64::try_from(*self).map_or(Value::Float(*self as f64), Value::Integer)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(ref s) => s.trim().parse().map_err(|_| mismatch("u64", &value)),
            other => {
                let n = integer_from_value(other)?;
                u64::try_from(n)
                    .map_err(|_| ValueError::new("u64", format!("out of range integer {}", n)))
            }
        }
    }
}

impl FieldValue for f64 {
    fn shape() -> FieldShape {
        FieldShape::leaf(TypeTag::Float)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Integer(n) => Ok(n as f64),
            Value::Null => Ok(0.0),
            Value::String(ref s) => s.trim().parse().map_err(|_| mismatch("float", &value)),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FieldValue for DateTime<FixedOffset> {
    fn shape() -> FieldShape {
        FieldShape::leaf(TypeTag::DateTime)
    }

    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            Value::String(ref s) => {
                DateTime::parse_from_rfc3339(s.trim()).map_err(|_| mismatch("date-time", &value))
            }
            other => Err(mismatch("date-time", &other)),
        }
    }
}

impl FieldValue for Value {
    fn shape() -> FieldShape {
        FieldShape::leaf(TypeTag::Any)
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn shape() -> FieldShape {
        T::shape()
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn shape() -> FieldShape {
        FieldShape {
            collection: true,
            ..T::shape()
        }
    }

    fn to_value(&self) -> Value {
        if self.is_empty() {
            Value::Null
        } else {
            Value::List(self.iter().map(FieldValue::to_value).collect())
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            single => T::from_value(single).map(|item| vec![item]),
        }
    }
}

fn new_entity<U: Record>(registry: &CatalogRegistry) -> Box<dyn AnyEntity> {
    Box::new(Entity::<U>::new_in(registry))
}

impl<U: Record> FieldValue for Entity<U> {
    fn shape() -> FieldShape {
        FieldShape {
            tag: TypeTag::Record(U::TYPE_NAME),
            collection: false,
            factory: Some(new_entity::<U> as EntityFactory),
        }
    }

    fn to_value(&self) -> Value {
        Value::Entity(Box::new(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(Entity::new()),
            Value::Entity(boxed) => {
                if boxed.as_any().is::<Entity<U>>() {
                    return boxed
                        .into_any()
                        .downcast::<Entity<U>>()
                        .map(|entity| *entity)
                        .map_err(|_| ValueError::new(U::TYPE_NAME, "entity"));
                }
                Entity::<U>::absorb(boxed.as_ref())
                    .map_err(|err| ValueError::new(U::TYPE_NAME, err.to_string()))
            }
            other => Err(mismatch(U::TYPE_NAME, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_coercion_from_text() {
        assert_eq!(i64::from_value(Value::from("800")), Ok(800));
        assert_eq!(bool::from_value(Value::from("true")), Ok(true));
        assert_eq!(f64::from_value(Value::from("2.5")), Ok(2.5));
        assert_eq!(String::from_value(Value::from(42)), Ok("42".to_string()));
    }

    #[test]
    fn test_leaf_coercion_failure() {
        let err = i64::from_value(Value::from("wide")).unwrap_err();
        assert_eq!(err.expected, "integer");
        assert_eq!(err.found, "string \"wide\"");
    }

    #[test]
    fn test_narrow_integer_range() {
        assert!(i32::from_value(Value::Integer(i64::MAX)).is_err());
        assert_eq!(u32::from_value(Value::Integer(7)), Ok(7));
        assert!(u32::from_value(Value::Integer(-1)).is_err());
    }

    #[test]
    fn test_option_and_vec_shapes() {
        let shape = <Option<Vec<String>>>::shape();
        assert!(shape.collection);
        assert_eq!(shape.tag, TypeTag::String);
        assert!(shape.factory.is_none());

        assert_eq!(Vec::<i64>::new().to_value(), Value::Null);
        assert_eq!(
            Vec::<i64>::from_value(Value::Integer(3)),
            Ok(vec![3]),
            "a single occurrence fills a one-element collection"
        );
        assert_eq!(Option::<i64>::from_value(Value::Null), Ok(None));
    }

    #[test]
    fn test_date_time_from_text() {
        let dt = DateTime::<FixedOffset>::from_value(Value::from("2011-01-02T03:04:05Z")).unwrap();
        assert_eq!(dt.timestamp(), 1_293_937_445);
    }
}
