use crate::backend::QuerySynthesisStrategy;
use crate::column::{find_column, Column, DataType};
use crate::errors::*;
use crate::mango::MangoQuery;
use crate::mango_builder::MangoQueryBuilder;
use crate::query::{Operator, PropertyFilter, Query};

pub const ID_FIELD: &str = "_id";

/// Row styling fields fetched along with paged table data.
pub const STYLE_FIELDS: [&str; 2] = ["_bgColor", "_fgColor"];

#[derive(Debug, Clone, Copy)]
pub struct QueryConverter<'s> {
    strategy: &'s dyn QuerySynthesisStrategy,
}

impl<'s> QueryConverter<'s> {
    pub fn new(strategy: &'s dyn QuerySynthesisStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &'s dyn QuerySynthesisStrategy {
        self.strategy
    }

    pub fn sort_omits_documents(&self, query: &Query) -> bool {
        self.strategy.omits_documents_missing_sort_field() && query.sort.is_some()
    }

    /// Selector-only query returning just identifiers, used to count matches.
    ///
    /// On a backend that drops documents without the sort field the sort is
    /// kept, so the count agrees with what the sorted pages will show.
    pub fn query_for_all_matching_ids(
        &self,
        columns: &[Column],
        query: &Query,
    ) -> ApiResult<MangoQuery> {
        let mut builder = self
            .populate(columns, query)?
            .fields(vec![ID_FIELD.to_owned()]);
        if self.sort_omits_documents(query) {
            builder = builder.sort(query.sort.clone());
        }
        Ok(builder.to_query())
    }

    pub fn to_mango(&self, columns: &[Column], query: &Query) -> ApiResult<MangoQuery> {
        let mut fields = Vec::with_capacity(columns.len() + 1 + STYLE_FIELDS.len());
        fields.push(ID_FIELD.to_owned());
        fields.extend(
            columns
                .iter()
                .filter(|c| c.name != ID_FIELD)
                .map(|c| c.name.clone()),
        );
        if query.is_paged() {
            fields.extend(STYLE_FIELDS.iter().map(|f| (*f).to_owned()));
        }
        let builder = self
            .populate(columns, query)?
            .fields(fields)
            .sort(query.sort.clone())
            .page(query.page_index, query.rows_per_page);
        Ok(builder.to_query())
    }

    fn populate(&self, columns: &[Column], query: &Query) -> ApiResult<MangoQueryBuilder<'s>> {
        let mut builder = MangoQueryBuilder::new(self.strategy);
        if let Some(phrase) = query.full_text() {
            let text_columns = columns
                .iter()
                .filter(|c| c.data_type == DataType::Text)
                .map(|c| c.name.clone())
                .collect();
            builder = builder.full_text_filter(phrase, text_columns);
        }
        for filter in query.property_filters.iter().filter(|f| f.is_applicable()) {
            builder = add_property_filter(builder, columns, filter)?;
        }
        for range in query
            .value_range_filters
            .iter()
            .filter(|r| r.is_applicable())
        {
            if range.inverted {
                builder = builder.inverted_range(
                    range.name.as_str(),
                    range.min,
                    range.max,
                    range.max_excluding,
                );
            } else {
                for filter in range.to_property_filters().iter() {
                    builder = add_property_filter(builder, columns, filter)?;
                }
            }
        }
        if !builder.has_selector_content() {
            builder = builder.where_field(ID_FIELD, Operator::NotEmpty, None);
        }
        Ok(builder)
    }
}

fn add_property_filter<'s>(
    builder: MangoQueryBuilder<'s>,
    columns: &[Column],
    filter: &PropertyFilter,
) -> ApiResult<MangoQueryBuilder<'s>> {
    let data_type = filter
        .data_type
        .or_else(|| find_column(columns, &filter.name).map(|c| c.data_type));
    let value = match filter.value.clone() {
        Some(v) => Some(v.coerce(filter.operator, data_type)?),
        None => None,
    };
    Ok(builder.where_field(filter.name.as_str(), filter.operator, value))
}

#[cfg(test)]
use crate::backend::{CouchDbStrategy, PouchDbStrategy};
#[cfg(test)]
use crate::query::{Sort, SortDirection, ValueRangeFilter};

#[cfg(test)]
fn columns() -> Vec<Column> {
    vec![
        Column::new("Level", DataType::Text),
        Column::new("Amount", DataType::Number),
    ]
}

#[test]
fn test_empty_query_gets_id_fallback() {
    let converter = QueryConverter::new(&CouchDbStrategy);
    let query = converter
        .query_for_all_matching_ids(&columns(), &Query::new())
        .unwrap();
    assert_eq!(
        query.to_string(),
        r#"{"selector":{"$and":[{"_id":{"$gt":null}}]},"fields":["_id"],"limit":1000000}"#
    );
}

#[test]
fn test_numeric_coercion_by_column() {
    let converter = QueryConverter::new(&CouchDbStrategy);
    let mut query = Query::new();
    query.add_property_filter(PropertyFilter::new("Amount", Operator::GreaterThan, "10"));
    query.add_property_filter(PropertyFilter::new("Level", Operator::Equal, "10"));
    let mango = converter.to_mango(&columns(), &query).unwrap();
    assert_eq!(
        mango.to_string(),
        r#"{"selector":{"$and":[{"Amount":{"$gt":10}},{"Level":{"$eq":"10"}}]},"fields":["_id","Level","Amount"],"limit":1000000}"#
    );
}

#[test]
fn test_non_applicable_filters_are_skipped() {
    let converter = QueryConverter::new(&CouchDbStrategy);
    let mut query = Query::new();
    query.add_property_filter(PropertyFilter::new("Level", Operator::Equal, ""));
    query.add_value_range_filter(ValueRangeFilter::new("Amount", None, None));
    let mango = converter.query_for_all_matching_ids(&columns(), &query).unwrap();
    assert_eq!(
        mango.selector.to_string(),
        r#"{"$and":[{"_id":{"$gt":null}}]}"#
    );
}

#[test]
fn test_paged_query_fields_and_sort() {
    let converter = QueryConverter::new(&PouchDbStrategy);
    let mut query = Query::new();
    query
        .set_sort(Some(Sort::new("Amount", SortDirection::Desc)))
        .set_page(1, 10);
    let mango = converter.to_mango(&columns(), &query).unwrap();
    assert_eq!(
        mango.to_string(),
        r#"{"selector":{"$and":[{"_id":{"$gt":null}},{"Amount":{"$gte":null}}]},"fields":["_id","Level","Amount","_bgColor","_fgColor"],"sort":[{"Amount":"desc"}],"skip":10,"limit":10}"#
    );
}

#[test]
fn test_count_query_keeps_sort_only_where_documents_are_omitted() {
    let mut query = Query::new();
    query
        .set_sort(Some(Sort::new("Amount", SortDirection::Asc)))
        .set_page(2, 10);

    let couch = QueryConverter::new(&CouchDbStrategy)
        .query_for_all_matching_ids(&columns(), &query)
        .unwrap();
    assert_eq!(couch.sort, Some(vec![("Amount".to_owned(), SortDirection::Asc)]));
    assert_eq!(couch.skip, None);
    assert_eq!(couch.limit, crate::mango::DEFAULT_LIMIT);

    let pouch = QueryConverter::new(&PouchDbStrategy)
        .query_for_all_matching_ids(&columns(), &query)
        .unwrap();
    assert_eq!(pouch.sort, None);
    assert_eq!(pouch.fields, Some(vec![ID_FIELD.to_owned()]));
}

#[test]
fn test_inverted_ranges() {
    let converter = QueryConverter::new(&CouchDbStrategy);
    let mut query = Query::new();
    query
        .add_value_range_filter(ValueRangeFilter::new("Amount", Some(1.0), Some(5.0)).inverted())
        .add_value_range_filter(
            ValueRangeFilter::new("Size", Some(2.0), Some(7.0))
                .max_excluding()
                .inverted(),
        );
    let mango = converter.query_for_all_matching_ids(&columns(), &query).unwrap();
    assert_eq!(
        mango.selector.to_string(),
        concat!(
            r#"{"$and":[{"$or":[{"Amount":{"$lt":1}},{"Amount":{"$gt":5}}]},"#,
            r#"{"$or":[{"Size":{"$lt":2}},{"Size":{"$gte":7}}]}]}"#
        )
    );

    let mut query = Query::new();
    query.add_value_range_filter(ValueRangeFilter::new("Amount", None, Some(5.0)).inverted());
    let mango = converter.to_mango(&columns(), &query).unwrap();
    assert_eq!(
        mango.selector.to_string(),
        r#"{"$and":[{"Amount":{"$gt":5}}]}"#
    );
}
