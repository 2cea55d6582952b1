use crate::query::{FilterValue, SortDirection};

use indexmap::IndexMap;
use json::number::Number;
use json::JsonValue;
use std::fmt;

pub const DEFAULT_LIMIT: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum MangoValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// A regex object, only understood by the embedded store.
    Regex { pattern: String, flags: String },
    Array(Vec<MangoValue>),
    Object(IndexMap<String, MangoValue>),
}

impl MangoValue {
    pub fn object() -> Self {
        Self::Object(IndexMap::new())
    }

    pub fn entry<K: Into<String>>(key: K, value: MangoValue) -> Self {
        let mut map = IndexMap::with_capacity(1);
        map.insert(key.into(), value);
        Self::Object(map)
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, MangoValue>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, MangoValue>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// JSON has no regex type: `Regex` is written as the string `"/pattern/flags"`.
    /// Only the embedded store's adapter turns that back into a regex object;
    /// any other reader sees a plain string with the slashes and flags in it.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Boolean(*b),
            Self::Number(n) => number_to_json(*n),
            Self::Str(s) => JsonValue::from(s.as_str()),
            Self::Regex { .. } => JsonValue::from(self.to_string()),
            Self::Array(items) => JsonValue::Array(items.iter().map(|v| v.to_json()).collect()),
            Self::Object(map) => {
                let mut object = json::object::Object::with_capacity(map.len());
                for (key, value) in map.iter() {
                    object.insert(key, value.to_json());
                }
                JsonValue::Object(object)
            }
        }
    }
}

impl fmt::Display for MangoValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Regex { pattern, flags } => write!(f, "/{}/{}", pattern, flags),
            _ => write!(f, "{}", self.to_json().dump()),
        }
    }
}

impl From<&FilterValue> for MangoValue {
    fn from(value: &FilterValue) -> Self {
        match value {
            FilterValue::Scalar(s) => Self::Str(s.clone()),
            FilterValue::Number(n) => Self::Number(*n),
            FilterValue::Bool(b) => Self::Bool(*b),
            FilterValue::List(items) => Self::Array(items.iter().map(Self::from).collect()),
        }
    }
}

impl From<&str> for MangoValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<f64> for MangoValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

fn number_to_json(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        JsonValue::Number(Number::from(n as i64))
    } else {
        JsonValue::Number(Number::from(n))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MangoQuery {
    pub selector: MangoValue,
    pub fields: Option<Vec<String>>,
    pub sort: Option<Vec<(String, SortDirection)>>,
    pub skip: Option<usize>,
    pub limit: usize,
}

impl MangoQuery {
    pub fn to_json(&self) -> JsonValue {
        let mut object = json::object::Object::new();
        object.insert("selector", self.selector.to_json());
        if let Some(fields) = &self.fields {
            object.insert(
                "fields",
                JsonValue::Array(fields.iter().map(|f| JsonValue::from(f.as_str())).collect()),
            );
        }
        if let Some(sort) = &self.sort {
            let sort = sort
                .iter()
                .map(|(field, direction)| {
                    let mut entry = json::object::Object::with_capacity(1);
                    entry.insert(field, JsonValue::from(direction.name()));
                    JsonValue::Object(entry)
                })
                .collect();
            object.insert("sort", JsonValue::Array(sort));
        }
        if let Some(skip) = self.skip {
            object.insert("skip", JsonValue::from(skip));
        }
        object.insert("limit", JsonValue::from(self.limit));
        JsonValue::Object(object)
    }
}

impl fmt::Display for MangoQuery {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_json().dump())
    }
}

#[test]
fn test_query_to_json() {
    let query = MangoQuery {
        selector: MangoValue::entry("a", MangoValue::entry("$gt", MangoValue::Null)),
        fields: Some(vec!["_id".to_owned(), "a".to_owned()]),
        sort: Some(vec![("a".to_owned(), SortDirection::Desc)]),
        skip: Some(40),
        limit: 20,
    };
    assert_eq!(
        query.to_string(),
        r#"{"selector":{"a":{"$gt":null}},"fields":["_id","a"],"sort":[{"a":"desc"}],"skip":40,"limit":20}"#
    );
}

#[test]
fn test_numbers_and_regex() {
    let value = MangoValue::Array(vec![
        MangoValue::Number(3.0),
        MangoValue::Number(2.5),
        MangoValue::Regex {
            pattern: "(?=.*x.*)".to_owned(),
            flags: "i".to_owned(),
        },
    ]);
    assert_eq!(value.to_json().dump(), r#"[3,2.5,"/(?=.*x.*)/i"]"#);
}

#[test]
fn test_regex_stays_literal_in_query_output() {
    let query = MangoQuery {
        selector: MangoValue::entry(
            "a",
            MangoValue::entry(
                "$regex",
                MangoValue::Regex {
                    pattern: "(?=.*x.*)(?=.*y.*)".to_owned(),
                    flags: "i".to_owned(),
                },
            ),
        ),
        fields: None,
        sort: None,
        skip: None,
        limit: DEFAULT_LIMIT,
    };
    let dumped = json::parse(&query.to_string()).unwrap();
    assert_eq!(dumped["selector"]["a"]["$regex"].as_str(), Some("/(?=.*x.*)(?=.*y.*)/i"));
    assert_eq!(query.selector.to_string(), r#"{"a":{"$regex":"/(?=.*x.*)(?=.*y.*)/i"}}"#);
}
