use crate::column::{Column, DataType};
use crate::errors::*;
use crate::record::Record;

use json::JsonValue;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    Contains,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Empty,
    NotEmpty,
    AnyOf,
    NoneOf,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Self::Equal,
        Self::NotEqual,
        Self::Contains,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::Empty,
        Self::NotEmpty,
        Self::AnyOf,
        Self::NoneOf,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::Contains => "CONTAINS",
            Self::LessThan => "LESS_THAN",
            Self::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            Self::GreaterThan => "GREATER_THAN",
            Self::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            Self::Empty => "EMPTY",
            Self::NotEmpty => "NOT_EMPTY",
            Self::AnyOf => "ANY_OF",
            Self::NoneOf => "NONE_OF",
        }
    }

    pub fn is_value_less(&self) -> bool {
        matches!(self, Self::Empty | Self::NotEmpty)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::AnyOf | Self::NoneOf)
    }
}

impl FromStr for Operator {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        guard!(let Some(op) = Self::ALL.iter().find(|op| op.name() == s) else {
            return Err(ApiError::UnsupportedOperator(s.to_owned()));
        });
        Ok(*op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(String),
    Number(f64),
    Bool(bool),
    List(Vec<FilterValue>),
}

impl FilterValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Types a raw filter value for the target column.
    ///
    /// List operators parse comma separated strings into typed arrays,
    /// NUMBER and TIME columns get numeric scalars. Regex, existence and
    /// already typed values are left alone.
    pub fn coerce(self, operator: Operator, data_type: Option<DataType>) -> ApiResult<Self> {
        match (self, operator) {
            (Self::Scalar(s), op) if op.is_list() => parse_list_value(&s, data_type),
            (value, Operator::Contains) => Ok(value),
            (value, op) if op.is_value_less() || op.is_list() => Ok(value),
            (Self::Scalar(s), _) if data_type.map_or(false, |t| t.is_numeric()) => {
                Ok(Self::Number(s.trim().parse::<f64>()?))
            }
            (value, _) => Ok(value),
        }
    }

    fn from_json(value: &JsonValue) -> ApiResult<Option<Self>> {
        let result = match value {
            JsonValue::Null => return Ok(None),
            JsonValue::Boolean(b) => Self::Bool(*b),
            JsonValue::Number(n) => Self::Number(f64::from(*n)),
            JsonValue::Short(_) | JsonValue::String(_) => {
                Self::Scalar(value.as_str().unwrap_or_default().to_owned())
            }
            JsonValue::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items.iter() {
                    guard!(let Some(v) = Self::from_json(item)? else {
                        return invalid_data_ae!("null inside filter value list");
                    });
                    list.push(v);
                }
                Self::List(list)
            }
            _ => return invalid_data_ae!("unsupported filter value: {}", value.dump()),
        };
        Ok(Some(result))
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::Scalar(s.to_owned())
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

fn parse_list_value(list: &str, data_type: Option<DataType>) -> ApiResult<FilterValue> {
    let mut values = Vec::new();
    for token in list.split(',').map(str::trim) {
        let value = match data_type {
            Some(DataType::Number) | Some(DataType::Time) => {
                FilterValue::Number(token.parse::<f64>()?)
            }
            Some(DataType::Boolean) => FilterValue::Bool(matches!(
                token.to_lowercase().as_str(),
                "yes" | "true" | "1"
            )),
            _ => FilterValue::Scalar(token.to_owned()),
        };
        values.push(value);
    }
    Ok(FilterValue::List(values))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub name: String,
    pub operator: Operator,
    pub value: Option<FilterValue>,
    pub data_type: Option<DataType>,
}

impl PropertyFilter {
    pub fn new<S: Into<String>, V: Into<FilterValue>>(
        name: S,
        operator: Operator,
        value: V,
    ) -> Self {
        Self {
            name: name.into(),
            operator,
            value: Some(value.into()),
            data_type: None,
        }
    }

    pub fn without_value<S: Into<String>>(name: S, operator: Operator) -> Self {
        Self {
            name: name.into(),
            operator,
            value: None,
            data_type: None,
        }
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn is_applicable(&self) -> bool {
        if self.operator.is_value_less() {
            return true;
        }
        self.value.as_ref().map_or(false, |v| !v.is_empty())
    }

    fn from_json(value: &JsonValue) -> ApiResult<Self> {
        guard!(let Some(name) = value["name"].as_str() else {
            return invalid_data_ae!("property filter without name: {}", value.dump());
        });
        guard!(let Some(operator) = value["operator"].as_str() else {
            return invalid_data_ae!("property filter {} without operator", name);
        });
        let data_type = match value["dataType"].as_str() {
            Some(t) => Some(t.parse()?),
            None => None,
        };
        Ok(Self {
            name: name.to_owned(),
            operator: operator.parse()?,
            value: FilterValue::from_json(&value["value"])?,
            data_type,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueRangeFilter {
    pub name: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_excluding: bool,
    pub inverted: bool,
}

impl ValueRangeFilter {
    pub fn new<S: Into<String>>(name: S, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            max_excluding: false,
            inverted: false,
        }
    }

    pub fn max_excluding(mut self) -> Self {
        self.max_excluding = true;
        self
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub fn is_applicable(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn to_property_filters(&self) -> Vec<PropertyFilter> {
        let mut filters = Vec::with_capacity(2);
        if let Some(min) = self.min {
            filters.push(PropertyFilter::new(
                self.name.as_str(),
                Operator::GreaterThanOrEqual,
                min,
            ));
        }
        if let Some(max) = self.max {
            let operator = if self.max_excluding {
                Operator::LessThan
            } else {
                Operator::LessThanOrEqual
            };
            filters.push(PropertyFilter::new(self.name.as_str(), operator, max));
        }
        filters
    }

    fn from_json(value: &JsonValue) -> ApiResult<Self> {
        guard!(let Some(name) = value["name"].as_str() else {
            return invalid_data_ae!("value range filter without name: {}", value.dump());
        });
        Ok(Self {
            name: name.to_owned(),
            min: value["min"].as_f64(),
            max: value["max"].as_f64(),
            max_excluding: value["maxExcluding"].as_bool().unwrap_or(false),
            inverted: value["inverted"].as_bool().unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new<S: Into<String>>(field: S, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// `{active, direction}`; an empty direction means "not sorted".
    fn from_json(value: &JsonValue) -> ApiResult<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        guard!(let Some(field) = value["active"].as_str() else {
            return invalid_data_ae!("sort without active field: {}", value.dump());
        });
        let direction = match value["direction"].as_str().unwrap_or("") {
            "" => return Ok(None),
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            d => return invalid_data_ae!("unknown sort direction: {}", d),
        };
        Ok(Some(Self::new(field, direction)))
    }
}

/// Filter, sort and paging state of one data request.
///
/// A `Query` is handed across request boundaries by value (`clone`), so
/// changing paging or sort on one holder never leaks into another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub full_text_filter: Option<String>,
    pub property_filters: Vec<PropertyFilter>,
    pub value_range_filters: Vec<ValueRangeFilter>,
    pub sort: Option<Sort>,
    pub page_index: Option<usize>,
    pub rows_per_page: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_full_text_filter<S: Into<String>>(&mut self, filter: S) -> &mut Self {
        let filter = filter.into();
        self.full_text_filter = if filter.is_empty() { None } else { Some(filter) };
        self
    }

    pub fn add_property_filter(&mut self, filter: PropertyFilter) -> &mut Self {
        self.property_filters.push(filter);
        self
    }

    pub fn add_value_range_filter(&mut self, filter: ValueRangeFilter) -> &mut Self {
        self.value_range_filters.push(filter);
        self
    }

    pub fn clear_filters(&mut self) -> &mut Self {
        self.full_text_filter = None;
        self.property_filters.clear();
        self.value_range_filters.clear();
        self
    }

    pub fn set_sort(&mut self, sort: Option<Sort>) -> &mut Self {
        self.sort = sort;
        self
    }

    pub fn set_page(&mut self, page_index: usize, rows_per_page: usize) -> &mut Self {
        self.page_index = Some(page_index);
        self.rows_per_page = Some(rows_per_page);
        self
    }

    pub fn clear_page(&mut self) -> &mut Self {
        self.page_index = None;
        self.rows_per_page = None;
        self
    }

    pub fn full_text(&self) -> Option<&str> {
        self.full_text_filter.as_deref().filter(|f| !f.is_empty())
    }

    pub fn is_paged(&self) -> bool {
        self.rows_per_page.map_or(false, |r| r > 0)
    }

    pub fn has_filter(&self) -> bool {
        self.full_text().is_some()
            || self.property_filters.iter().any(|f| f.is_applicable())
            || self.value_range_filters.iter().any(|f| f.is_applicable())
    }

    /// Same full text, property and range filters; sort and paging are ignored.
    pub fn same_filters(&self, other: &Query) -> bool {
        self.full_text() == other.full_text()
            && self.property_filters == other.property_filters
            && self.value_range_filters == other.value_range_filters
    }

    pub fn from_json(value: &JsonValue) -> ApiResult<Self> {
        let mut query = Self::new();
        if let Some(full_text) = value["fullTextFilter"].as_str() {
            query.set_full_text_filter(full_text);
        }
        for filter in value["propertyFilters"].members() {
            query.add_property_filter(PropertyFilter::from_json(filter)?);
        }
        for filter in value["valueRangeFilters"].members() {
            query.add_value_range_filter(ValueRangeFilter::from_json(filter)?);
        }
        query.sort = Sort::from_json(&value["sort"])?;
        query.page_index = parse_paging_value(&value["pageIndex"]);
        query.rows_per_page = parse_paging_value(&value["rowsPerPage"]);
        Ok(query)
    }

    pub fn from_json_str(query_json: &str) -> ApiResult<Self> {
        Self::from_json(&json::parse(query_json)?)
    }
}

/// Negative values (the UI's `-1`) mean "unset".
fn parse_paging_value(value: &JsonValue) -> Option<usize> {
    value.as_i64().filter(|v| *v >= 0).map(|v| v as usize)
}

#[derive(Debug, Clone)]
pub struct Page {
    pub query: Query,
    pub entries: Vec<Record>,
    pub total_row_count: usize,
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub columns: Vec<Column>,
    pub query: Query,
}

impl QueryRequest {
    pub fn from_json_str(request_json: &str) -> ApiResult<Self> {
        let value = json::parse(request_json)?;
        Ok(Self {
            columns: Column::columns_from_json(&value["columns"])?,
            query: Query::from_json(&value["query"])?,
        })
    }
}

#[test]
fn test_operator_from_str() {
    for op in Operator::ALL.iter() {
        assert_eq!(op.name().parse::<Operator>().unwrap(), *op);
    }
    match "LIKE".parse::<Operator>() {
        Err(ApiError::UnsupportedOperator(op)) => assert_eq!(op, "LIKE"),
        r => panic!("unexpected: {:?}", r),
    }
}

#[test]
fn test_property_filter_applicable() {
    assert!(PropertyFilter::new("a", Operator::Equal, "b").is_applicable());
    assert!(!PropertyFilter::new("a", Operator::Equal, "").is_applicable());
    assert!(!PropertyFilter::without_value("a", Operator::Equal).is_applicable());
    assert!(PropertyFilter::without_value("a", Operator::Empty).is_applicable());
    assert!(PropertyFilter::new("a", Operator::NotEmpty, "").is_applicable());
}

#[test]
fn test_has_filter() {
    let mut query = Query::new();
    assert!(!query.has_filter());
    query.add_property_filter(PropertyFilter::new("a", Operator::Equal, ""));
    assert!(!query.has_filter());
    query.add_value_range_filter(ValueRangeFilter::new("n", None, None));
    assert!(!query.has_filter());
    query.set_full_text_filter("");
    assert!(!query.has_filter());
    query.add_value_range_filter(ValueRangeFilter::new("n", Some(1.0), None));
    assert!(query.has_filter());

    let mut query = Query::new();
    query.set_full_text_filter("abc");
    assert!(query.has_filter());
}

#[test]
fn test_coerce_scalar() {
    let v = FilterValue::from(" 12.5 ")
        .coerce(Operator::Equal, Some(DataType::Number))
        .unwrap();
    assert_eq!(v, FilterValue::Number(12.5));

    let v = FilterValue::from("12")
        .coerce(Operator::Contains, Some(DataType::Number))
        .unwrap();
    assert_eq!(v, FilterValue::from("12"));

    let v = FilterValue::from("12")
        .coerce(Operator::Equal, Some(DataType::Text))
        .unwrap();
    assert_eq!(v, FilterValue::from("12"));

    assert!(FilterValue::from("abc")
        .coerce(Operator::GreaterThan, Some(DataType::Time))
        .is_err());
}

#[test]
fn test_coerce_list() {
    let v = FilterValue::from("1, 2, 3")
        .coerce(Operator::AnyOf, Some(DataType::Number))
        .unwrap();
    assert_eq!(
        v,
        FilterValue::List(vec![
            FilterValue::Number(1.0),
            FilterValue::Number(2.0),
            FilterValue::Number(3.0)
        ])
    );

    let v = FilterValue::from("yes, no, TRUE, 1, 0")
        .coerce(Operator::NoneOf, Some(DataType::Boolean))
        .unwrap();
    assert_eq!(
        v,
        FilterValue::List(vec![
            true.into(),
            false.into(),
            true.into(),
            true.into(),
            false.into()
        ])
    );

    let v = FilterValue::from(" x ,y")
        .coerce(Operator::AnyOf, None)
        .unwrap();
    assert_eq!(v, FilterValue::List(vec!["x".into(), "y".into()]));

    match FilterValue::from("1, two").coerce(Operator::AnyOf, Some(DataType::Number)) {
        Err(ApiError::MalformedValue(msg)) => assert_eq!(msg, "invalid float literal"),
        r => panic!("unexpected: {:?}", r),
    }
}

#[test]
fn test_range_expansion() {
    let filters = ValueRangeFilter::new("n", Some(1.0), Some(5.0)).to_property_filters();
    assert_eq!(
        filters,
        vec![
            PropertyFilter::new("n", Operator::GreaterThanOrEqual, 1.0),
            PropertyFilter::new("n", Operator::LessThanOrEqual, 5.0),
        ]
    );
    let filters = ValueRangeFilter::new("n", None, Some(5.0))
        .max_excluding()
        .to_property_filters();
    assert_eq!(
        filters,
        vec![PropertyFilter::new("n", Operator::LessThan, 5.0)]
    );
}

#[test]
fn test_query_from_json() {
    let query = Query::from_json_str(
        r#"{
            "fullTextFilter": "abc",
            "propertyFilters": [
                {"name": "Amount", "operator": "GREATER_THAN", "value": "10", "dataType": "NUMBER"},
                {"name": "Host", "operator": "EMPTY"}
            ],
            "valueRangeFilters": [{"name": "Time", "min": 1, "max": 9, "maxExcluding": true}],
            "sort": {"active": "Host", "direction": "desc"},
            "pageIndex": 2,
            "rowsPerPage": 20
        }"#,
    )
    .unwrap();
    assert_eq!(query.full_text(), Some("abc"));
    assert_eq!(query.property_filters.len(), 2);
    assert_eq!(query.property_filters[0].data_type, Some(DataType::Number));
    assert_eq!(query.property_filters[1].value, None);
    assert_eq!(query.value_range_filters[0].max, Some(9.0));
    assert!(query.value_range_filters[0].max_excluding);
    assert_eq!(query.sort, Some(Sort::new("Host", SortDirection::Desc)));
    assert_eq!(query.page_index, Some(2));
    assert_eq!(query.rows_per_page, Some(20));
}

#[test]
fn test_query_from_json_unset_paging_and_sort() {
    let query = Query::from_json_str(
        r#"{"sort": {"active": "Host", "direction": ""}, "pageIndex": -1, "rowsPerPage": -1}"#,
    )
    .unwrap();
    assert_eq!(query.sort, None);
    assert_eq!(query.page_index, None);
    assert!(!query.is_paged());
}

#[test]
fn test_query_from_json_unknown_operator() {
    let r = Query::from_json_str(
        r#"{"propertyFilters": [{"name": "a", "operator": "LIKE", "value": "x"}]}"#,
    );
    match r {
        Err(ApiError::UnsupportedOperator(op)) => assert_eq!(op, "LIKE"),
        r => panic!("unexpected: {:?}", r),
    }
}

#[test]
fn test_clone_is_independent() {
    let mut original = Query::new();
    original.add_property_filter(PropertyFilter::new("a", Operator::Equal, "b"));
    let mut clone = original.clone();
    clone
        .add_property_filter(PropertyFilter::new("c", Operator::Equal, "d"))
        .set_page(3, 10);
    clone.property_filters[0].name = "z".to_owned();
    assert_eq!(original.property_filters.len(), 1);
    assert_eq!(original.property_filters[0].name, "a");
    assert_eq!(original.page_index, None);
}
