//! Decoded values and named-field records.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value as Json;

use crate::error::{Result, SchemaError};
use crate::types::{Field, FieldType};

/// A value of some [`FieldType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Record(Record),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::UInt(v) => Some(v),
            Value::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Build a value of type `ty` from JSON.
    ///
    /// Integers accept numbers, booleans and `0x`-prefixed hex strings.
    /// Byte strings and byte lists accept a hex string or an array of
    /// numbers. Records take an object keyed by field name.
    pub fn from_json(ty: &FieldType, json: &Json) -> Result<Value> {
        match *ty {
            FieldType::Int { signed, .. } => int_from_json(signed, json),
            FieldType::LvBytes => match json {
                Json::String(text) => parse_hex(text).map(Value::Bytes),
                Json::Array(items) => items
                    .iter()
                    .map(|item| Value::from_json(&crate::types::U8, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
                other => Err(mismatch("hex string or byte array", other)),
            },
            FieldType::FixedList(_, elem) | FieldType::LvList(elem) => match json {
                Json::String(text) if matches!(elem, FieldType::Int { width: 1, .. }) => {
                    parse_hex(text).map(Value::Bytes)
                }
                Json::Array(items) => items
                    .iter()
                    .map(|item| Value::from_json(elem, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
                other => Err(mismatch("array", other)),
            },
            FieldType::WordList => match json {
                Json::Array(items) => items
                    .iter()
                    .map(|item| Value::from_json(&crate::types::U16, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
                other => Err(mismatch("array", other)),
            },
            FieldType::Struct(fields) => Record::from_json(fields, json).map(Value::Record),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::UInt(u64::from(v))
    }
}

macro_rules! impl_from_int {
    ($variant:ident, $wide:ty: $($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(<$wide>::from(v))
                }
            }
        )*
    };
}

impl_from_int!(UInt, u64: u8, u16, u32, u64);
impl_from_int!(Int, i64: i8, i16, i32, i64);

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::UInt(v) => serializer.serialize_u64(*v),
            Value::Bytes(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Record(record) => record.serialize(serializer),
        }
    }
}

/// Named fields in declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    /// Append a field, replacing any existing field with the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        self.get(name).and_then(Value::as_bytes)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record for `fields` from a JSON object.
    ///
    /// `null` is accepted for an empty field list. Unknown keys are rejected.
    pub fn from_json(fields: &[Field], json: &Json) -> Result<Record> {
        let object = match json {
            Json::Object(object) => object,
            Json::Null if fields.is_empty() => return Ok(Record::new()),
            other => return Err(mismatch("object", other)),
        };
        if let Some(key) = object
            .keys()
            .find(|key| !fields.iter().any(|field| field.name == key.as_str()))
        {
            return Err(SchemaError::UnknownField(key.clone()));
        }

        let mut record = Record::with_capacity(fields.len());
        for field in fields {
            let json = object
                .get(field.name)
                .ok_or(SchemaError::MissingField(field.name))?;
            record.push(field.name, Value::from_json(field.ty, json)?);
        }
        Ok(record)
    }

    /// Pair positional values with `fields`, in order.
    pub fn from_values(fields: &[Field], values: &[Value]) -> Option<Record> {
        if fields.len() != values.len() {
            return None;
        }
        let mut record = Record::with_capacity(fields.len());
        for (field, value) in fields.iter().zip(values) {
            record.push(field.name, value.clone());
        }
        Some(record)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn int_from_json(signed: bool, json: &Json) -> Result<Value> {
    match json {
        Json::Bool(v) => Ok(Value::from(*v)),
        Json::Number(number) => {
            if let Some(v) = number.as_u64() {
                return Ok(if signed {
                    i64::try_from(v).map(Value::Int).map_err(|_| SchemaError::OutOfRange {
                        value: i128::from(v),
                        type_name: "int64".to_string(),
                    })?
                } else {
                    Value::UInt(v)
                });
            }
            if let Some(v) = number.as_i64() {
                return Ok(Value::Int(v));
            }
            Err(mismatch("integer", json))
        }
        Json::String(text) => {
            let digits = text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
                .ok_or_else(|| mismatch("integer", json))?;
            u64::from_str_radix(digits, 16)
                .map(Value::UInt)
                .map_err(|_| mismatch("integer", json))
        }
        other => Err(mismatch("integer", other)),
    }
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(digits).map_err(|_| SchemaError::TypeMismatch {
        expected: "hex string",
        found: "string",
    })
}

fn mismatch(expected: &'static str, json: &Json) -> SchemaError {
    let found = match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    };
    SchemaError::TypeMismatch { expected, found }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{APS_FRAME, EUI64, EXTENDED_PAN_ID, I8, U16, U8};

    #[test]
    fn test_record_preserves_order() {
        let record = Record::new()
            .with("zeta", 1u8)
            .with("alpha", 2u8)
            .with("mid", 3u8);
        let names: Vec<_> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"zeta":1,"alpha":2,"mid":3}"#
        );
    }

    #[test]
    fn test_record_push_replaces() {
        let mut record = Record::new().with("a", 1u8);
        record.push("a", 9u8);
        assert_eq!(record.len(), 1);
        assert_eq!(record.get_u64("a"), Some(9));
    }

    #[test]
    fn test_bytes_serialize_as_hex() {
        let record = Record::new().with("message", vec![0xDEu8, 0xAD]);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({ "message": "dead" })
        );
    }

    #[test]
    fn test_int_from_json() {
        assert_eq!(Value::from_json(&U8, &json!(7)).unwrap(), Value::UInt(7));
        assert_eq!(Value::from_json(&I8, &json!(-3)).unwrap(), Value::Int(-3));
        assert_eq!(Value::from_json(&U8, &json!(true)).unwrap(), Value::UInt(1));
        assert_eq!(
            Value::from_json(&EUI64, &json!("0x00124b0001020304")).unwrap(),
            Value::UInt(0x0012_4b00_0102_0304)
        );
        assert!(Value::from_json(&U16, &json!("12")).is_err());
        assert!(Value::from_json(&U16, &json!(1.5)).is_err());
    }

    #[test]
    fn test_bytes_from_json() {
        assert_eq!(
            Value::from_json(&FieldType::LvBytes, &json!("01:02:ff")).unwrap(),
            Value::Bytes(vec![1, 2, 0xFF])
        );
        assert_eq!(
            Value::from_json(&EXTENDED_PAN_ID, &json!("dddddddddddddddd")).unwrap(),
            Value::Bytes(vec![0xDD; 8])
        );
        assert!(Value::from_json(&FieldType::LvBytes, &json!("zz")).is_err());
    }

    #[test]
    fn test_record_from_json() {
        let FieldType::Struct(fields) = APS_FRAME else {
            unreachable!()
        };
        let json = json!({
            "sequence": 1,
            "groupId": 0,
            "options": 0x0140,
            "destinationEndpoint": 1,
            "sourceEndpoint": 1,
            "clusterId": 6,
            "profileId": 0x0104,
        });
        let record = Record::from_json(fields, &json).unwrap();
        assert_eq!(record.iter().next().unwrap().0, "profileId");
        assert_eq!(record.get_u64("clusterId"), Some(6));

        let err = Record::from_json(fields, &json!({ "profileId": 1 })).unwrap_err();
        assert!(matches!(err, SchemaError::MissingField("clusterId")));
    }

    #[test]
    fn test_record_from_json_rejects_unknown_keys() {
        let err = Record::from_json(&[], &json!({ "bogus": 1 })).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownField(key) if key == "bogus"));
        assert!(Record::from_json(&[], &Json::Null).unwrap().is_empty());
    }

    #[test]
    fn test_from_values() {
        let FieldType::Struct(fields) = APS_FRAME else {
            unreachable!()
        };
        assert!(Record::from_values(fields, &[Value::UInt(1)]).is_none());
    }
}
