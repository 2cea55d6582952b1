use crate::errors::*;
use json::JsonValue;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Text,
    Number,
    Time,
    Boolean,
    Object,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Number => "NUMBER",
            Self::Time => "TIME",
            Self::Boolean => "BOOLEAN",
            Self::Object => "OBJECT",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Time)
    }
}

impl FromStr for DataType {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        let result = match s {
            "TEXT" => Self::Text,
            "NUMBER" => Self::Number,
            "TIME" => Self::Time,
            "BOOLEAN" => Self::Boolean,
            "OBJECT" => Self::Object,
            _ => return invalid_data_ae!("unknown data type: {}", s),
        };
        Ok(result)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 7] = [
        Self::Millisecond,
        Self::Second,
        Self::Minute,
        Self::Hour,
        Self::Day,
        Self::Month,
        Self::Year,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Millisecond => "MILLISECOND",
            Self::Second => "SECOND",
            Self::Minute => "MINUTE",
            Self::Hour => "HOUR",
            Self::Day => "DAY",
            Self::Month => "MONTH",
            Self::Year => "YEAR",
        }
    }

    /// Lower-case label used in renamed column headers, e.g. `Time (per day)`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Millisecond => "millisecond",
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        guard!(let Some(unit) = Self::ALL.iter().find(|u| u.name() == s) else {
            return invalid_data_ae!("unknown time unit: {}", s);
        });
        Ok(*unit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub grouping_time_unit: Option<TimeUnit>,
    pub indexed: bool,
}

impl Column {
    pub fn new<S: Into<String>>(name: S, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            grouping_time_unit: None,
            indexed: false,
        }
    }

    pub fn time<S: Into<String>>(name: S, unit: TimeUnit) -> Self {
        Self {
            grouping_time_unit: Some(unit),
            ..Self::new(name, DataType::Time)
        }
    }

    pub fn from_json(value: &JsonValue) -> ApiResult<Self> {
        guard!(let Some(name) = value["name"].as_str() else {
            return invalid_data_ae!("column without name: {}", value.dump());
        });
        guard!(let Some(data_type) = value["dataType"].as_str() else {
            return invalid_data_ae!("column {} without dataType", name);
        });
        let grouping_time_unit = match value["groupingTimeUnit"].as_str() {
            Some(unit) => Some(unit.parse()?),
            None => None,
        };
        Ok(Self {
            name: name.to_owned(),
            data_type: data_type.parse()?,
            grouping_time_unit,
            indexed: value["indexed"].as_bool().unwrap_or(false),
        })
    }

    pub fn columns_from_json(value: &JsonValue) -> ApiResult<Vec<Column>> {
        if !value.is_array() {
            return invalid_data_ae!("columns must be an array");
        }
        value.members().map(Self::from_json).collect()
    }
}

pub fn find_column<'a>(columns: &'a [Column], name: &str) -> Option<&'a Column> {
    columns.iter().find(|c| c.name == name)
}

#[test]
fn test_column_from_json() {
    let value = json::parse(
        r#"{"name":"Time","dataType":"TIME","groupingTimeUnit":"HOUR","indexed":true}"#,
    )
    .unwrap();
    let column = Column::from_json(&value).unwrap();
    assert_eq!(column.name, "Time");
    assert_eq!(column.data_type, DataType::Time);
    assert_eq!(column.grouping_time_unit, Some(TimeUnit::Hour));
    assert!(column.indexed);
}

#[test]
fn test_unknown_data_type() {
    let value = json::parse(r#"{"name":"x","dataType":"BLOB"}"#).unwrap();
    assert!(Column::from_json(&value).is_err());
}

#[test]
fn test_time_unit_roundtrip_names() {
    for unit in TimeUnit::ALL.iter() {
        assert_eq!(unit.name().parse::<TimeUnit>().unwrap(), *unit);
    }
}
