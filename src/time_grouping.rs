use crate::column::{Column, TimeUnit};
use crate::record::{Record, Value};

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike};

pub const EMPTY_VALUE: &str = "empty";

/// `<name> (per <unit>)`, or the plain name for millisecond grouping.
pub fn grouped_column_name(name: &str, unit: TimeUnit) -> String {
    match unit {
        TimeUnit::Millisecond => name.to_owned(),
        _ => format!("{} (per {})", name, unit.label()),
    }
}

/// Start of the local-time bucket holding `epoch_ms`.
pub fn bucket_start(epoch_ms: i64, unit: TimeUnit) -> Option<i64> {
    let local = Local.timestamp_millis_opt(epoch_ms).single()?.naive_local();
    let date = local.date();
    let truncated = match unit {
        TimeUnit::Millisecond => return Some(epoch_ms),
        TimeUnit::Second => local.with_nanosecond(0),
        TimeUnit::Minute => date.and_hms_opt(local.hour(), local.minute(), 0),
        TimeUnit::Hour => date.and_hms_opt(local.hour(), 0, 0),
        TimeUnit::Day => date.and_hms_opt(0, 0, 0),
        TimeUnit::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        TimeUnit::Year => {
            NaiveDate::from_ymd_opt(date.year(), 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        }
    }?;
    local_epoch_ms(&truncated)
}

fn local_epoch_ms(local: &NaiveDateTime) -> Option<i64> {
    // A bucket start inside a DST gap doesn't exist; the gap is at most an hour.
    Local
        .from_local_datetime(local)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(*local + Duration::hours(1))).earliest())
        .map(|dt| dt.timestamp_millis())
}

fn bucket_format(unit: TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Millisecond => "%Y-%m-%d %H:%M:%S%.3f",
        TimeUnit::Second => "%Y-%m-%d %H:%M:%S",
        TimeUnit::Minute => "%Y-%m-%d %H:%M",
        TimeUnit::Hour => "%Y-%m-%d %H:00",
        TimeUnit::Day => "%Y-%m-%d",
        TimeUnit::Month => "%Y-%m",
        TimeUnit::Year => "%Y",
    }
}

pub fn format_bucket(epoch_ms: i64, unit: TimeUnit) -> Option<String> {
    let start = bucket_start(epoch_ms, unit)?;
    let local = Local.timestamp_millis_opt(start).single()?;
    Some(local.format(bucket_format(unit)).to_string())
}

/// Replaces the values of a TIME column by the epoch start of their bucket
/// and returns the (renamed) column. Missing values stay missing.
///
/// Rows are left untouched when the column has no grouping unit or doesn't
/// occur in `rows`.
pub fn group_by_time_unit(column: &Column, rows: &mut [Record]) -> Column {
    guard!(let Some(unit) = grouping_unit(column, rows) else { return column.clone(); });
    rewrite_column(column, unit, rows, |value| match value {
        Some(v) => Some(bucket_value(v, unit)),
        None => None,
    })
}

pub fn group_by_formatted_time_unit(column: &Column, rows: &mut [Record]) -> Column {
    guard!(let Some(unit) = grouping_unit(column, rows) else { return column.clone(); });
    rewrite_column(column, unit, rows, |value| match value {
        None | Some(Value::Null) => Some(Value::str(EMPTY_VALUE)),
        Some(v) => Some(
            epoch_ms(v)
                .and_then(|ms| format_bucket(ms, unit))
                .map(Value::Str)
                .unwrap_or_else(|| v.clone()),
        ),
    })
}

fn grouping_unit(column: &Column, rows: &[Record]) -> Option<TimeUnit> {
    let unit = column.grouping_time_unit?;
    if rows.iter().any(|r| r.contains_key(&column.name)) {
        Some(unit)
    } else {
        None
    }
}

fn epoch_ms(value: &Value) -> Option<i64> {
    value.as_f64().map(|v| v as i64)
}

fn bucket_value(value: &Value, unit: TimeUnit) -> Value {
    epoch_ms(value)
        .and_then(|ms| bucket_start(ms, unit))
        .map(Value::from)
        .unwrap_or_else(|| value.clone())
}

fn rewrite_column<F>(column: &Column, unit: TimeUnit, rows: &mut [Record], map: F) -> Column
where
    F: Fn(Option<&Value>) -> Option<Value>,
{
    let new_name = grouped_column_name(&column.name, unit);
    for row in rows.iter_mut() {
        let mut mapped = map(row.get(&column.name));
        if row.contains_key(&column.name) {
            // rebuild to keep the column position under its new name
            *row = std::mem::take(row)
                .into_iter()
                .filter_map(|(k, v)| {
                    if k == column.name {
                        mapped.take().map(|m| (new_name.clone(), m))
                    } else {
                        Some((k, v))
                    }
                })
                .collect();
        } else if let Some(m) = mapped {
            row.insert(new_name.clone(), m);
        }
    }
    Column {
        name: new_name,
        ..column.clone()
    }
}

#[cfg(test)]
use crate::column::DataType;
#[cfg(test)]
use crate::record::record;

// 2021-03-14 15:09:26.535 UTC
#[cfg(test)]
const TS: i64 = 1_615_734_566_535;

#[cfg(test)]
fn local(ms: i64) -> NaiveDateTime {
    Local.timestamp_millis_opt(ms).unwrap().naive_local()
}

#[test]
fn test_day_bucket_is_local_midnight() {
    let start = bucket_start(TS, TimeUnit::Day).unwrap();
    let expected = Local
        .from_local_datetime(&local(TS).date().and_hms_opt(0, 0, 0).unwrap())
        .earliest()
        .unwrap()
        .timestamp_millis();
    assert_eq!(start, expected);
    assert!(start <= TS);
}

#[test]
fn test_bucket_fields_are_truncated() {
    let second = local(bucket_start(TS, TimeUnit::Second).unwrap());
    assert_eq!(second.nanosecond(), 0);
    assert_eq!(second.second(), local(TS).second());

    let hour = local(bucket_start(TS, TimeUnit::Hour).unwrap());
    assert_eq!((hour.minute(), hour.second()), (0, 0));
    assert_eq!(hour.hour(), local(TS).hour());

    let month = local(bucket_start(TS, TimeUnit::Month).unwrap());
    assert_eq!(month.day(), 1);
    assert_eq!(month.month(), local(TS).month());

    let year = local(bucket_start(TS, TimeUnit::Year).unwrap());
    assert_eq!((year.month(), year.day()), (1, 1));
    assert_eq!(year.year(), local(TS).year());
}

#[test]
fn test_group_by_day() {
    let column = Column::time("Time", TimeUnit::Day);
    let mut rows = vec![
        record(vec![("Time", Value::from(TS)), ("Host", Value::from("a"))]),
        record(vec![("Host", Value::from("b"))]),
        record(vec![("Time", Value::Null), ("Host", Value::from("c"))]),
    ];
    let grouped = group_by_time_unit(&column, &mut rows);
    assert_eq!(grouped.name, "Time (per day)");
    assert_eq!(grouped.data_type, DataType::Time);
    assert_eq!(
        rows[0].keys().collect::<Vec<_>>(),
        vec!["Time (per day)", "Host"]
    );
    assert_eq!(
        rows[0]["Time (per day)"],
        Value::from(bucket_start(TS, TimeUnit::Day).unwrap())
    );
    assert!(!rows[1].contains_key("Time (per day)"));
    assert_eq!(rows[2]["Time (per day)"], Value::Null);
}

#[test]
fn test_millisecond_is_identity() {
    let column = Column::time("Time", TimeUnit::Millisecond);
    let mut rows = vec![record(vec![("Time", Value::from(TS))])];
    let original = rows.clone();
    let grouped = group_by_time_unit(&column, &mut rows);
    assert_eq!(grouped, column);
    assert_eq!(rows, original);
}

#[test]
fn test_no_unit_or_absent_column_is_noop() {
    let mut rows = vec![record(vec![("Time", Value::from(TS))])];
    let original = rows.clone();

    let column = Column::new("Time", DataType::Time);
    assert_eq!(group_by_time_unit(&column, &mut rows), column);
    assert_eq!(rows, original);

    let column = Column::time("Other", TimeUnit::Hour);
    assert_eq!(group_by_formatted_time_unit(&column, &mut rows), column);
    assert_eq!(rows, original);
}

#[test]
fn test_formatted_grouping() {
    let column = Column::time("Time", TimeUnit::Month);
    let mut rows = vec![
        record(vec![("Time", Value::from(TS))]),
        record(vec![("Time", Value::Null)]),
        record(vec![("Host", Value::from("x"))]),
    ];
    let grouped = group_by_formatted_time_unit(&column, &mut rows);
    assert_eq!(grouped.name, "Time (per month)");
    let expected = Local.timestamp_millis_opt(TS).unwrap().format("%Y-%m").to_string();
    assert_eq!(rows[0]["Time (per month)"], Value::Str(expected));
    assert_eq!(rows[1]["Time (per month)"], Value::from(EMPTY_VALUE));
    assert_eq!(rows[2]["Time (per month)"], Value::from(EMPTY_VALUE));
}
