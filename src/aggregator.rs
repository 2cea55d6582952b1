use crate::column::{Column, DataType};
use crate::errors::*;
use crate::record::{Record, Value};
use crate::time_grouping::group_by_time_unit;

use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    Count,
    Avg,
    Median,
    Max,
    Min,
    Sum,
}

impl Aggregation {
    pub const ALL: [Aggregation; 6] = [
        Self::Count,
        Self::Avg,
        Self::Median,
        Self::Max,
        Self::Min,
        Self::Sum,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Avg => "AVG",
            Self::Median => "MEDIAN",
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Sum => "SUM",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Avg => "Average",
            Self::Median => "Median",
            Self::Max => "Max",
            Self::Min => "Min",
            Self::Sum => "Sum",
        }
    }
}

impl FromStr for Aggregation {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        guard!(let Some(agg) = Self::ALL.iter().find(|a| a.name() == s) else {
            return Err(ApiError::UnsupportedAggregation(s.to_owned()));
        });
        Ok(*agg)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregationContext {
    pub data_columns: Vec<Column>,
    pub group_by_columns: Vec<Column>,
    pub aggregations: Vec<Aggregation>,
}

impl AggregationContext {
    pub fn new(data_column: Column, aggregations: Vec<Aggregation>) -> Self {
        Self {
            data_columns: vec![data_column],
            group_by_columns: Vec::new(),
            aggregations,
        }
    }

    pub fn group_by(mut self, column: Column) -> Self {
        self.group_by_columns.push(column);
        self
    }
}

/// Groups `rows` and reduces the data column.
///
/// - A leading `Count` counts the distinct combinations of group-by values
///   and data value; each output row gets a `Count` field.
/// - Without group-by columns one row holds one field per aggregation.
/// - Otherwise one row per group: the group-by fields in declaration order,
///   followed by one field per aggregation.
///
/// TIME group-by columns are bucketed first and show up under their renamed
/// header. Groups are emitted in order of first appearance.
pub fn aggregate(mut rows: Vec<Record>, context: &AggregationContext) -> ApiResult<Vec<Record>> {
    let data_column = match context.data_columns.as_slice() {
        [column] => column,
        columns => {
            return invalid_data_ae!(
                "exactly one data column expected, got {}",
                columns.len()
            )
        }
    };
    guard!(let Some(first) = context.aggregations.first() else {
        return invalid_data_ae!("no aggregation requested");
    });

    let group_names: Vec<String> = context
        .group_by_columns
        .iter()
        .map(|column| {
            if column.data_type == DataType::Time {
                group_by_time_unit(column, &mut rows).name
            } else {
                column.name.clone()
            }
        })
        .collect();

    if *first == Aggregation::Count {
        let mut keys = group_names;
        keys.push(data_column.name.clone());
        return Ok(pivot(&rows, &keys, &data_column.name, &[Aggregation::Count]));
    }

    if group_names.is_empty() {
        let all: Vec<&Record> = rows.iter().collect();
        let mut result = Record::with_capacity(context.aggregations.len());
        append_aggregations(&mut result, &all, &data_column.name, &context.aggregations);
        return Ok(vec![result]);
    }

    Ok(pivot(
        &rows,
        &group_names,
        &data_column.name,
        &context.aggregations,
    ))
}

fn pivot(
    rows: &[Record],
    keys: &[String],
    data_name: &str,
    aggregations: &[Aggregation],
) -> Vec<Record> {
    let mut groups: IndexMap<Vec<Value>, Vec<&Record>> = IndexMap::new();
    for row in rows.iter() {
        let key = keys
            .iter()
            .map(|k| row.get(k).cloned().unwrap_or(Value::Null))
            .collect();
        groups.entry(key).or_insert_with(Vec::new).push(row);
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut result = Record::with_capacity(keys.len() + aggregations.len());
            for (name, value) in keys.iter().zip(key.into_iter()) {
                result.insert(name.clone(), value);
            }
            append_aggregations(&mut result, &members, data_name, aggregations);
            result
        })
        .collect()
}

fn append_aggregations(
    result: &mut Record,
    members: &[&Record],
    data_name: &str,
    aggregations: &[Aggregation],
) {
    let values: Vec<f64> = members
        .iter()
        .filter_map(|r| r.get(data_name).and_then(Value::as_f64))
        .collect();
    for aggregation in aggregations.iter() {
        result.insert(
            aggregation.label().to_owned(),
            reduce(*aggregation, &values, members.len()),
        );
    }
}

fn reduce(aggregation: Aggregation, values: &[f64], row_count: usize) -> Value {
    if aggregation == Aggregation::Count {
        return Value::from(row_count as u64);
    }
    if values.is_empty() {
        return match aggregation {
            Aggregation::Sum => Value::from(0i64),
            _ => Value::Null,
        };
    }
    let result = match aggregation {
        Aggregation::Count => row_count as f64,
        Aggregation::Avg => values.iter().sum::<f64>() / values.len() as f64,
        Aggregation::Median => median(values),
        Aggregation::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        Aggregation::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
        Aggregation::Sum => values.iter().sum(),
    };
    Value::from(result)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[test]
fn test_median() {
    assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    assert_eq!(median(&[7.0]), 7.0);
}

#[test]
fn test_aggregation_from_str() {
    for agg in Aggregation::ALL.iter() {
        assert_eq!(agg.name().parse::<Aggregation>().unwrap(), *agg);
    }
    let err = "MODE".parse::<Aggregation>().unwrap_err();
    assert_eq!(err.to_string(), "aggregation of type MODE is not yet implemented");
}

#[test]
fn test_reduce_empty_values() {
    assert_eq!(reduce(Aggregation::Max, &[], 3), Value::Null);
    assert_eq!(reduce(Aggregation::Sum, &[], 3), Value::from(0i64));
    assert_eq!(reduce(Aggregation::Count, &[], 3), Value::from(3u64));
}
