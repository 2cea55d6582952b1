use scene_query::aggregator::*;
use scene_query::backend::*;
use scene_query::column::*;
use scene_query::graph_data::*;
use scene_query::mango::*;
use scene_query::mango_builder::*;
use scene_query::operator_converter::*;
use scene_query::query::*;
use scene_query::query_converter::*;
use scene_query::record::*;
use scene_query::time_grouping::*;

use chrono::{DateTime, Local, TimeZone};
use json::JsonValue;

const LOG_COLUMNS: &str = r#"[
  {"name": "Level", "dataType": "TEXT"},
  {"name": "Data", "dataType": "TEXT"},
  {"name": "Host", "dataType": "TEXT"},
  {"name": "Path", "dataType": "TEXT"},
  {"name": "Size", "dataType": "NUMBER"},
  {"name": "Time", "dataType": "TIME", "groupingTimeUnit": "DAY"},
  {"name": "Cached", "dataType": "BOOLEAN"}
]"#;

const SEARCH_REQUEST: &str = r#"{
  "columns": [
    {"name": "Level", "dataType": "TEXT"},
    {"name": "Size", "dataType": "NUMBER"}
  ],
  "query": {
    "fullTextFilter": "timeout",
    "propertyFilters": [
      {"name": "Level", "operator": "NOT_EQUAL", "value": "DEBUG"},
      {"name": "Level", "operator": "NOT_EQUAL", "value": "TRACE"}
    ],
    "valueRangeFilters": [
      {"name": "Size", "min": 10, "max": 100, "maxExcluding": true}
    ],
    "sort": {"active": "Size", "direction": "desc"},
    "pageIndex": 2,
    "rowsPerPage": 25
  }
}"#;

const C1_C2_ROWS: &str = r#"[
  {"c1": "a", "c2": 1},
  {"c1": "a", "c2": 1},
  {"c1": "a", "c2": 2},
  {"c1": "b", "c2": 2},
  {"c1": "b", "c2": 3},
  {"c1": "b", "c2": 3}
]"#;

fn log_columns() -> Vec<Column> {
    Column::columns_from_json(&json::parse(LOG_COLUMNS).unwrap()).unwrap()
}

fn c1_c2_rows() -> Vec<Record> {
    records_from_json(&json::parse(C1_C2_ROWS).unwrap()).unwrap()
}

fn rows_to_json(rows: &[Record]) -> String {
    let mut result = JsonValue::new_array();
    for row in rows.iter() {
        result.push(record_to_json(row)).unwrap();
    }
    result.dump()
}

fn local_ms(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> i64 {
    Local
        .with_ymd_and_hms(y, mo, d, h, mi, 0)
        .earliest()
        .unwrap()
        .timestamp_millis()
}

fn couch() -> QueryConverter<'static> {
    QueryConverter::new(BackendKind::CouchDb.strategy())
}

fn pouch() -> QueryConverter<'static> {
    QueryConverter::new(BackendKind::PouchDb.strategy())
}

fn selector_of(converter: &QueryConverter, columns: &[Column], query: &Query) -> String {
    converter
        .to_mango(columns, query)
        .unwrap()
        .selector
        .to_string()
}

#[test]
fn test_every_operator_has_symbol() {
    for op in Operator::ALL.iter() {
        assert!(!to_mango_operator(*op).is_empty());
        assert_eq!(operator_name_to_mango(op.name()).unwrap(), to_mango_operator(*op));
    }
    let err = operator_name_to_mango("BETWEEN").unwrap_err();
    assert!(err.to_string().contains("BETWEEN"));
}

#[test]
fn test_single_equal_filter() {
    let query = MangoQueryBuilder::new(BackendKind::CouchDb.strategy())
        .where_field("a", Operator::Equal, Some("b".into()))
        .to_query();
    assert_eq!(
        query.to_string(),
        r#"{"selector":{"$and":[{"a":{"$eq":"b"}}]},"limit":1000000}"#
    );
}

#[test]
fn test_contains_per_backend() {
    let mut query = Query::new();
    query
        .add_property_filter(PropertyFilter::new("a", Operator::Contains, "x"))
        .add_property_filter(PropertyFilter::new("a", Operator::Contains, "y"));
    let columns = vec![Column::new("a", DataType::Text)];

    assert_eq!(
        selector_of(&pouch(), &columns, &query),
        r#"{"$and":[{"a":{"$regex":"/(?=.*x.*)(?=.*y.*)/i"}}]}"#
    );
    assert_eq!(
        selector_of(&couch(), &columns, &query),
        r#"{"$and":[{"a":{"$regex":"(?i).*x.*"}},{"a":{"$regex":"(?i).*y.*"}}]}"#
    );
}

#[test]
fn test_full_text_over_text_columns() {
    let mut query = Query::new();
    query.set_full_text_filter("abc");
    assert_eq!(
        selector_of(&couch(), &log_columns(), &query),
        r#"{"$or":[{"Level":{"$regex":"(?i).*abc.*"}},{"Data":{"$regex":"(?i).*abc.*"}},{"Host":{"$regex":"(?i).*abc.*"}},{"Path":{"$regex":"(?i).*abc.*"}}]}"#
    );
}

#[test]
fn test_any_of_coercion() {
    let columns = log_columns();
    let mut query = Query::new();
    query.add_property_filter(PropertyFilter::new("Size", Operator::AnyOf, "1, 2, 3"));
    assert_eq!(
        selector_of(&couch(), &columns, &query),
        r#"{"$and":[{"Size":{"$in":[1,2,3]}}]}"#
    );

    let mut query = Query::new();
    query.add_property_filter(PropertyFilter::new("Cached", Operator::AnyOf, "yes, no, yes"));
    assert_eq!(
        selector_of(&couch(), &columns, &query),
        r#"{"$and":[{"Cached":{"$in":[true,false,true]}}]}"#
    );
}

#[test]
fn test_malformed_number_is_rejected() {
    let mut query = Query::new();
    query.add_property_filter(PropertyFilter::new("Size", Operator::GreaterThan, "ten"));
    match couch().to_mango(&log_columns(), &query) {
        Err(scene_query::errors::ApiError::MalformedValue(_)) => {}
        r => panic!("unexpected: {:?}", r),
    }
}

#[test]
fn test_count_query_projects_ids_only() {
    let request = QueryRequest::from_json_str(SEARCH_REQUEST).unwrap();

    let pouch_count = pouch()
        .query_for_all_matching_ids(&request.columns, &request.query)
        .unwrap();
    assert_eq!(pouch_count.fields, Some(vec!["_id".to_owned()]));
    assert_eq!(pouch_count.sort, None);
    assert_eq!(pouch_count.skip, None);
    assert_eq!(pouch_count.limit, DEFAULT_LIMIT);

    let couch_count = couch()
        .query_for_all_matching_ids(&request.columns, &request.query)
        .unwrap();
    assert_eq!(couch_count.fields, Some(vec!["_id".to_owned()]));
    assert_eq!(
        couch_count.sort,
        Some(vec![("Size".to_owned(), SortDirection::Desc)])
    );
    assert_eq!(couch_count.skip, None);
    assert_eq!(couch_count.limit, DEFAULT_LIMIT);
}

#[test]
fn test_request_to_data_query() {
    let request = QueryRequest::from_json_str(SEARCH_REQUEST).unwrap();
    let mango = couch().to_mango(&request.columns, &request.query).unwrap();
    assert_eq!(
        mango.to_string(),
        concat!(
            r#"{"selector":{"$and":["#,
            r#"{"$or":[{"Level":{"$regex":"(?i).*timeout.*"}}]},"#,
            r#"{"Level":{"$ne":"DEBUG"}},{"Level":{"$ne":"TRACE"}},"#,
            r#"{"Size":{"$gte":10,"$lt":100}}]},"#,
            r#""fields":["_id","Level","Size","_bgColor","_fgColor"],"#,
            r#""sort":[{"Size":"desc"}],"skip":50,"limit":25}"#
        )
    );
}

#[test]
fn test_clone_renders_same_selector() {
    let request = QueryRequest::from_json_str(SEARCH_REQUEST).unwrap();
    let original = request.query;
    let mut copy = original.clone();
    assert_eq!(
        selector_of(&pouch(), &request.columns, &original),
        selector_of(&pouch(), &request.columns, &copy)
    );

    copy.add_property_filter(PropertyFilter::without_value("Size", Operator::Empty))
        .set_page(0, 10);
    assert_eq!(original.property_filters.len(), 2);
    assert_eq!(original.page_index, Some(2));
    assert_ne!(
        selector_of(&pouch(), &request.columns, &original),
        selector_of(&pouch(), &request.columns, &copy)
    );
}

#[test]
fn test_conversion_is_idempotent() {
    let request = QueryRequest::from_json_str(SEARCH_REQUEST).unwrap();
    for converter in [couch(), pouch()].iter() {
        let first = converter.to_mango(&request.columns, &request.query).unwrap();
        let second = converter.to_mango(&request.columns, &request.query).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_aggregate_min_by_group() {
    let context = AggregationContext::new(
        Column::new("c2", DataType::Number),
        vec![Aggregation::Min],
    )
    .group_by(Column::new("c1", DataType::Text));
    let result = aggregate(c1_c2_rows(), &context).unwrap();
    assert_eq!(
        rows_to_json(&result),
        r#"[{"c1":"a","Min":1},{"c1":"b","Min":2}]"#
    );
}

#[test]
fn test_aggregate_count_without_group() {
    let context = AggregationContext::new(
        Column::new("c1", DataType::Text),
        vec![Aggregation::Count],
    );
    let result = aggregate(c1_c2_rows(), &context).unwrap();
    assert_eq!(
        rows_to_json(&result),
        r#"[{"c1":"a","Count":3},{"c1":"b","Count":3}]"#
    );
}

const HOST_ROWS: &str = r#"[
  {"g": "x", "h": 1, "d": "a", "v": 4},
  {"g": "x", "h": 2, "d": "b", "v": 1},
  {"g": "x", "h": 1, "d": "a", "v": 2},
  {"g": "y", "h": 1, "v": 8}
]"#;

fn host_rows() -> Vec<Record> {
    records_from_json(&json::parse(HOST_ROWS).unwrap()).unwrap()
}

#[test]
fn test_aggregate_keeps_group_by_order() {
    let count = AggregationContext::new(
        Column::new("d", DataType::Text),
        vec![Aggregation::Count],
    )
    .group_by(Column::new("h", DataType::Number))
    .group_by(Column::new("g", DataType::Text));
    let result = aggregate(host_rows(), &count).unwrap();
    for row in result.iter() {
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["h", "g", "d", "Count"]);
    }
    assert_eq!(
        rows_to_json(&result),
        concat!(
            r#"[{"h":1,"g":"x","d":"a","Count":2},"#,
            r#"{"h":2,"g":"x","d":"b","Count":1},"#,
            r#"{"h":1,"g":"y","d":null,"Count":1}]"#
        )
    );

    let sum = AggregationContext::new(
        Column::new("v", DataType::Number),
        vec![Aggregation::Sum, Aggregation::Min],
    )
    .group_by(Column::new("h", DataType::Number))
    .group_by(Column::new("g", DataType::Text));
    let result = aggregate(host_rows(), &sum).unwrap();
    for row in result.iter() {
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["h", "g", "Sum", "Min"]);
    }
    assert_eq!(
        rows_to_json(&result),
        concat!(
            r#"[{"h":1,"g":"x","Sum":6,"Min":2},"#,
            r#"{"h":2,"g":"x","Sum":1,"Min":1},"#,
            r#"{"h":1,"g":"y","Sum":8,"Min":8}]"#
        )
    );
}

#[test]
fn test_aggregate_several_functions() {
    let context = AggregationContext::new(
        Column::new("c2", DataType::Number),
        vec![
            Aggregation::Sum,
            Aggregation::Avg,
            Aggregation::Median,
            Aggregation::Max,
        ],
    )
    .group_by(Column::new("c1", DataType::Text));
    let result = aggregate(c1_c2_rows(), &context).unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(
        result[0].keys().collect::<Vec<_>>(),
        vec!["c1", "Sum", "Average", "Median", "Max"]
    );
    let expected = [("a", 4.0, 4.0 / 3.0, 1.0, 2.0), ("b", 8.0, 8.0 / 3.0, 3.0, 3.0)];
    for (row, (c1, sum, avg, median, max)) in result.iter().zip(expected.iter()) {
        assert_eq!(row["c1"], Value::from(*c1));
        assert_eq!(row["Sum"].as_f64(), Some(*sum));
        assert!((row["Average"].as_f64().unwrap() - avg).abs() < 1e-9);
        assert_eq!(row["Median"].as_f64(), Some(*median));
        assert_eq!(row["Max"].as_f64(), Some(*max));
    }

    let context = AggregationContext::new(
        Column::new("c2", DataType::Number),
        vec![Aggregation::Max, Aggregation::Min],
    );
    let result = aggregate(c1_c2_rows(), &context).unwrap();
    assert_eq!(rows_to_json(&result), r#"[{"Max":3,"Min":1}]"#);
}

#[test]
fn test_aggregate_by_time_bucket() {
    let morning = local_ms(2021, 3, 14, 8, 30);
    let evening = local_ms(2021, 3, 14, 20, 15);
    let next_day = local_ms(2021, 3, 15, 9, 0);
    let rows = vec![
        record(vec![("Time", Value::from(morning)), ("Size", Value::from(10i64))]),
        record(vec![("Time", Value::from(evening)), ("Size", Value::from(30i64))]),
        record(vec![("Time", Value::from(next_day)), ("Size", Value::from(5i64))]),
    ];
    let context = AggregationContext::new(
        Column::new("Size", DataType::Number),
        vec![Aggregation::Sum],
    )
    .group_by(Column::time("Time", TimeUnit::Day));
    let result = aggregate(rows, &context).unwrap();

    let header = grouped_column_name("Time", TimeUnit::Day);
    let start_of_day = local_ms(2021, 3, 14, 0, 0);
    assert_eq!(result.len(), 2);
    assert_eq!(result[0][&header], Value::from(start_of_day));
    assert_eq!(result[0]["Sum"], Value::from(40i64));
    assert_eq!(result[1]["Sum"], Value::from(5i64));
}

#[test]
fn test_unsupported_aggregation_name() {
    let err = "PERCENTILE".parse::<Aggregation>().unwrap_err();
    assert_eq!(
        err.to_string(),
        "aggregation of type PERCENTILE is not yet implemented"
    );
}

#[test]
fn test_day_bucket_is_local_midnight() {
    let stamps = [1_615_734_566_535i64, 1_600_000_000_000, 1_577_836_799_999];
    for stamp in stamps.iter() {
        let bucket = bucket_start(*stamp, TimeUnit::Day).unwrap();
        let local: DateTime<Local> = Local.timestamp_millis_opt(*stamp).unwrap();
        let midnight = Local
            .from_local_datetime(&local.date_naive().and_hms_opt(0, 0, 0).unwrap())
            .earliest()
            .unwrap();
        assert_eq!(bucket, midnight.timestamp_millis());
    }
}

#[test]
fn test_millisecond_grouping_is_identity() {
    let column = Column::time("Time", TimeUnit::Millisecond);
    let mut rows = vec![record(vec![("Time", Value::from(1_615_734_566_535i64))])];
    let original = rows.clone();
    let grouped = group_by_time_unit(&column, &mut rows);
    assert_eq!(grouped, column);
    assert_eq!(rows, original);
}

#[test]
fn test_graph_over_time_buckets() {
    let rows = vec![
        record(vec![
            ("Time", Value::from(local_ms(2021, 3, 14, 1, 0))),
            ("Host", Value::from("h1")),
        ]),
        record(vec![
            ("Time", Value::from(local_ms(2021, 3, 14, 4, 0))),
            ("Host", Value::from("h2")),
        ]),
        record(vec![("Host", Value::from("h1"))]),
    ];
    let columns = vec![
        Column::time("Time", TimeUnit::Day),
        Column::new("Host", DataType::Text),
    ];
    let data = create_graph_data(rows, &columns);

    let top: Vec<String> = data
        .nodes
        .iter()
        .filter(|n| n.parent == Some(0))
        .map(|n| n.value.to_string())
        .collect();
    assert_eq!(top, vec!["2021-03-14".to_owned(), EMPTY_VALUE.to_owned()]);
    assert_eq!(data.nodes[0].count, 3);
    assert_eq!(data.nodes[1].count, 2);
    assert_eq!(data.nodes.len(), 6);
}
