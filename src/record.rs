use crate::errors::*;

use indexmap::IndexMap;
use json::number::Number;
use json::JsonValue;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One flat row of a scene: column name to value, in column order.
pub type Record = IndexMap<String, Value>;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    Str(String),
}

impl Value {
    pub fn from_json(value: &JsonValue) -> ApiResult<Self> {
        let result = match value {
            JsonValue::Null => Self::Null,
            JsonValue::Boolean(b) => Self::Bool(*b),
            JsonValue::Number(n) => Self::Number(*n),
            JsonValue::Short(_) | JsonValue::String(_) => {
                Self::Str(value.as_str().unwrap_or_default().to_owned())
            }
            _ => return invalid_data_ae!("unsupported record value: {}", value.dump()),
        };
        Ok(result)
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Boolean(*b),
            Self::Number(n) => JsonValue::Number(*n),
            Self::Str(s) => JsonValue::from(s.as_str()),
        }
    }

    pub fn number<N: Into<Number>>(n: N) -> Self {
        Self::Number(n.into())
    }

    pub fn str<S: Into<String>>(s: S) -> Self {
        Self::Str(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value; numeric strings count as numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(f64::from(*n)),
            Self::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn from_f64(v: f64) -> Self {
        if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            Self::Number(Number::from(v as i64))
        } else {
            Self::Number(Number::from(v))
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(b1), Self::Bool(b2)) => b1 == b2,
            (Self::Number(n1), Self::Number(n2)) => {
                n1.is_zero() && n2.is_zero() || f64::from(*n1) == f64::from(*n2)
            }
            (Self::Str(s1), Self::Str(s2)) => s1 == s2,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => "".hash(state),
            Self::Bool(b) => b.hash(state),
            Self::Str(s) => s.hash(state),
            Self::Number(n) => {
                if n.is_zero() {
                    0u64.hash(state);
                } else {
                    f64::from(*n).to_bits().hash(state);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => fmt::Result::Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(Number::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(Number::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::from_f64(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

pub fn record_from_json(value: &JsonValue) -> ApiResult<Record> {
    guard!(let JsonValue::Object(object) = value else {
        return invalid_data_ae!("record must be an object: {}", value.dump());
    });
    let mut record = Record::with_capacity(object.len());
    for (key, v) in object.iter() {
        record.insert(key.to_owned(), Value::from_json(v)?);
    }
    Ok(record)
}

pub fn records_from_json(value: &JsonValue) -> ApiResult<Vec<Record>> {
    if !value.is_array() {
        return invalid_data_ae!("records must be an array");
    }
    value.members().map(record_from_json).collect()
}

pub fn record_to_json(record: &Record) -> JsonValue {
    let mut object = json::object::Object::with_capacity(record.len());
    for (key, value) in record.iter() {
        object.insert(key, value.to_json());
    }
    JsonValue::Object(object)
}

pub fn record<K, V, I>(pairs: I) -> Record
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[test]
fn test_value_eq_hash() {
    use std::collections::HashSet;

    let values = vec![
        Value::from(1i64),
        Value::from(1u64),
        Value::from(1.0f64),
        Value::from(1.5f64),
        Value::from("1"),
        Value::Null,
        Value::Bool(true),
    ];
    let set: HashSet<Value> = values.into_iter().collect();
    assert_eq!(set.len(), 5);
    assert_eq!(Value::from(2i64), Value::from(2.0f64));
    assert_ne!(Value::from("2"), Value::from(2i64));
}

#[test]
fn test_record_json() {
    let value = json::parse(r#"{"c1":"a","c2":1,"c3":null,"c4":true}"#).unwrap();
    let rec = record_from_json(&value).unwrap();
    assert_eq!(rec.keys().collect::<Vec<_>>(), vec!["c1", "c2", "c3", "c4"]);
    assert_eq!(rec["c2"].as_f64(), Some(1.0));
    assert_eq!(record_to_json(&rec).dump(), r#"{"c1":"a","c2":1,"c3":null,"c4":true}"#);
}
