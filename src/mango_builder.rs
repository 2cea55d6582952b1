use crate::backend::QuerySynthesisStrategy;
use crate::mango::{MangoQuery, MangoValue, DEFAULT_LIMIT};
use crate::operator_converter::to_mango_operator;
use crate::query::{FilterValue, Operator, Sort};

use indexmap::{IndexMap, IndexSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineOperator {
    And,
    Or,
}

impl CombineOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::And => "$and",
            Self::Or => "$or",
        }
    }
}

impl Default for CombineOperator {
    fn default() -> Self {
        Self::And
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FieldFilter {
    name: String,
    operator: Operator,
    value: Option<FilterValue>,
}

#[derive(Debug, Clone, PartialEq)]
struct FullTextFilter {
    phrase: String,
    text_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct InvertedRange {
    name: String,
    min: Option<f64>,
    max: Option<f64>,
    max_excluding: bool,
}

/// Immutable description of a Mango query.
///
/// Every configuration call returns a new builder; `to_query` is pure, so a
/// builder can be rendered any number of times with the same result.
#[derive(Debug, Clone)]
pub struct MangoQueryBuilder<'s> {
    strategy: &'s dyn QuerySynthesisStrategy,
    combine: CombineOperator,
    full_text: Option<FullTextFilter>,
    filters: Vec<FieldFilter>,
    inverted_ranges: Vec<InvertedRange>,
    fields: Vec<String>,
    sort: Option<Sort>,
    page_index: Option<usize>,
    rows_per_page: Option<usize>,
}

impl<'s> MangoQueryBuilder<'s> {
    pub fn new(strategy: &'s dyn QuerySynthesisStrategy) -> Self {
        Self {
            strategy,
            combine: CombineOperator::default(),
            full_text: None,
            filters: Vec::new(),
            inverted_ranges: Vec::new(),
            fields: Vec::new(),
            sort: None,
            page_index: None,
            rows_per_page: None,
        }
    }

    pub fn combine_with(mut self, combine: CombineOperator) -> Self {
        self.combine = combine;
        self
    }

    pub fn full_text_filter<S: Into<String>>(mut self, phrase: S, text_columns: Vec<String>) -> Self {
        let phrase = phrase.into();
        self.full_text = if phrase.is_empty() || text_columns.is_empty() {
            None
        } else {
            Some(FullTextFilter {
                phrase,
                text_columns,
            })
        };
        self
    }

    /// Adds a filter; `value` must already be typed for the column.
    pub fn where_field<S: Into<String>>(
        mut self,
        name: S,
        operator: Operator,
        value: Option<FilterValue>,
    ) -> Self {
        self.filters.push(FieldFilter {
            name: name.into(),
            operator,
            value,
        });
        self
    }

    /// Matches values outside of `[min, max]` (or `[min, max)` when `max_excluding`).
    pub fn inverted_range<S: Into<String>>(
        mut self,
        name: S,
        min: Option<f64>,
        max: Option<f64>,
        max_excluding: bool,
    ) -> Self {
        self.inverted_ranges.push(InvertedRange {
            name: name.into(),
            min,
            max,
            max_excluding,
        });
        self
    }

    pub fn fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn sort(mut self, sort: Option<Sort>) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, page_index: Option<usize>, rows_per_page: Option<usize>) -> Self {
        self.page_index = page_index;
        self.rows_per_page = rows_per_page;
        self
    }

    pub fn has_selector_content(&self) -> bool {
        self.full_text.is_some()
            || !self.filters.is_empty()
            || self
                .inverted_ranges
                .iter()
                .any(|r| r.min.is_some() || r.max.is_some())
    }

    pub fn to_query(&self) -> MangoQuery {
        MangoQuery {
            selector: self.selector(),
            fields: if self.fields.is_empty() {
                None
            } else {
                Some(self.fields.clone())
            },
            sort: self
                .sort
                .as_ref()
                .map(|s| vec![(s.field.clone(), s.direction)]),
            skip: self.skip(),
            limit: self.rows_per_page.filter(|r| *r > 0).unwrap_or(DEFAULT_LIMIT),
        }
    }

    fn skip(&self) -> Option<usize> {
        match (self.page_index, self.rows_per_page) {
            (Some(index), Some(rows)) if index > 0 && rows > 0 => Some(index * rows),
            _ => None,
        }
    }

    fn selector(&self) -> MangoValue {
        let full_text = self.full_text_clause();
        let mut clauses = Vec::new();
        self.append_field_clauses(&mut clauses);
        self.append_inverted_range_clauses(&mut clauses);
        self.append_sort_field_clause(&mut clauses);

        match full_text {
            Some(full_text) if clauses.is_empty() => full_text,
            None if clauses.is_empty() => MangoValue::object(),
            full_text => {
                let mut all: Vec<MangoValue> = full_text.into_iter().collect();
                all.extend(clauses);
                MangoValue::entry(self.combine.symbol(), MangoValue::Array(all))
            }
        }
    }

    fn full_text_clause(&self) -> Option<MangoValue> {
        let full_text = self.full_text.as_ref()?;
        let alternatives = full_text
            .text_columns
            .iter()
            .map(|column| {
                let regex = self.strategy.contains_clause(&[full_text.phrase.as_str()]);
                MangoValue::entry(
                    column.as_str(),
                    MangoValue::entry(to_mango_operator(Operator::Contains), regex),
                )
            })
            .collect();
        Some(MangoValue::entry("$or", MangoValue::Array(alternatives)))
    }

    fn append_field_clauses(&self, clauses: &mut Vec<MangoValue>) {
        let merged_terms = self.merged_contains_terms();
        let mut merged_fields = IndexSet::new();

        for filter in self.filters.iter() {
            let value = match filter.operator {
                Operator::Contains if self.strategy.merges_contains_per_field() => {
                    if !merged_fields.insert(filter.name.as_str()) {
                        continue;
                    }
                    let terms: Vec<&str> = merged_terms
                        .get(filter.name.as_str())
                        .map(|t| t.iter().map(String::as_str).collect())
                        .unwrap_or_default();
                    self.strategy.contains_clause(&terms)
                }
                Operator::Contains => {
                    let term = contains_term(filter.value.as_ref());
                    self.strategy.contains_clause(&[term.as_str()])
                }
                Operator::Empty => MangoValue::Bool(false),
                Operator::NotEmpty => MangoValue::Null,
                _ => filter
                    .value
                    .as_ref()
                    .map(MangoValue::from)
                    .unwrap_or(MangoValue::Null),
            };
            add_field_clause(
                clauses,
                &filter.name,
                to_mango_operator(filter.operator),
                value,
            );
        }
    }

    fn merged_contains_terms(&self) -> IndexMap<&str, Vec<String>> {
        let mut terms: IndexMap<&str, Vec<String>> = IndexMap::new();
        for filter in self
            .filters
            .iter()
            .filter(|f| f.operator == Operator::Contains)
        {
            terms
                .entry(filter.name.as_str())
                .or_insert_with(Vec::new)
                .push(contains_term(filter.value.as_ref()));
        }
        terms
    }

    fn append_inverted_range_clauses(&self, clauses: &mut Vec<MangoValue>) {
        for range in self.inverted_ranges.iter() {
            let mut alternatives = Vec::with_capacity(2);
            if let Some(min) = range.min {
                alternatives.push(MangoValue::entry(
                    range.name.as_str(),
                    MangoValue::entry(to_mango_operator(Operator::LessThan), min.into()),
                ));
            }
            if let Some(max) = range.max {
                let operator = if range.max_excluding {
                    Operator::GreaterThanOrEqual
                } else {
                    Operator::GreaterThan
                };
                alternatives.push(MangoValue::entry(
                    range.name.as_str(),
                    MangoValue::entry(to_mango_operator(operator), max.into()),
                ));
            }
            match alternatives.len() {
                0 => (),
                1 => clauses.extend(alternatives),
                _ => clauses.push(MangoValue::entry("$or", MangoValue::Array(alternatives))),
            }
        }
    }

    fn append_sort_field_clause(&self, clauses: &mut Vec<MangoValue>) {
        if !self.strategy.requires_sort_field_in_selector() {
            return;
        }
        guard!(let Some(sort) = self.sort.as_ref() else { return; });
        let filtered = self.filters.iter().any(|f| f.name == sort.field)
            || self.inverted_ranges.iter().any(|r| r.name == sort.field);
        if !filtered {
            clauses.push(MangoValue::entry(
                sort.field.as_str(),
                MangoValue::entry(
                    to_mango_operator(Operator::GreaterThanOrEqual),
                    MangoValue::Null,
                ),
            ));
        }
    }
}

fn contains_term(value: Option<&FilterValue>) -> String {
    match value {
        Some(FilterValue::Scalar(s)) => s.clone(),
        Some(v) => MangoValue::from(v).to_string(),
        None => String::new(),
    }
}

/// Merges `{name: {symbol: value}}` into the first clause on `name` that has no
/// `symbol` yet, otherwise starts a new clause.
fn add_field_clause(clauses: &mut Vec<MangoValue>, name: &str, symbol: &str, value: MangoValue) {
    let target = clauses.iter_mut().find_map(|clause| {
        let conditions = clause.as_object_mut()?.get_mut(name)?.as_object_mut()?;
        if conditions.contains_key(symbol) {
            None
        } else {
            Some(conditions)
        }
    });
    match target {
        Some(conditions) => {
            conditions.insert(symbol.to_owned(), value);
        }
        None => clauses.push(MangoValue::entry(name, MangoValue::entry(symbol, value))),
    }
}

#[cfg(test)]
use crate::backend::{CouchDbStrategy, PouchDbStrategy};
#[cfg(test)]
use crate::query::SortDirection;

#[cfg(test)]
fn dump(builder: &MangoQueryBuilder) -> String {
    builder.to_query().to_string()
}

#[test]
fn test_single_equal() {
    let builder = MangoQueryBuilder::new(&CouchDbStrategy).where_field(
        "a",
        Operator::Equal,
        Some("b".into()),
    );
    assert_eq!(
        dump(&builder),
        r#"{"selector":{"$and":[{"a":{"$eq":"b"}}]},"limit":1000000}"#
    );
}

#[test]
fn test_same_field_merges_distinct_operators() {
    let builder = MangoQueryBuilder::new(&CouchDbStrategy)
        .where_field("n", Operator::GreaterThanOrEqual, Some(FilterValue::Number(1.0)))
        .where_field("n", Operator::LessThan, Some(FilterValue::Number(5.0)));
    assert_eq!(
        dump(&builder),
        r#"{"selector":{"$and":[{"n":{"$gte":1,"$lt":5}}]},"limit":1000000}"#
    );
}

#[test]
fn test_same_operator_starts_new_clause() {
    let builder = MangoQueryBuilder::new(&CouchDbStrategy)
        .where_field("a", Operator::NotEqual, Some("x".into()))
        .where_field("a", Operator::NotEqual, Some("y".into()))
        .where_field("a", Operator::GreaterThan, Some("m".into()));
    assert_eq!(
        dump(&builder),
        r#"{"selector":{"$and":[{"a":{"$ne":"x","$gt":"m"}},{"a":{"$ne":"y"}}]},"limit":1000000}"#
    );
}

#[test]
fn test_empty_and_not_empty() {
    let builder = MangoQueryBuilder::new(&CouchDbStrategy)
        .where_field("a", Operator::Empty, None)
        .where_field("b", Operator::NotEmpty, Some("ignored".into()));
    assert_eq!(
        dump(&builder),
        r#"{"selector":{"$and":[{"a":{"$exists":false}},{"b":{"$gt":null}}]},"limit":1000000}"#
    );
}

#[test]
fn test_or_combine() {
    let builder = MangoQueryBuilder::new(&CouchDbStrategy)
        .combine_with(CombineOperator::Or)
        .where_field("a", Operator::Equal, Some("x".into()))
        .where_field("b", Operator::Equal, Some("y".into()));
    assert_eq!(
        dump(&builder),
        r#"{"selector":{"$or":[{"a":{"$eq":"x"}},{"b":{"$eq":"y"}}]},"limit":1000000}"#
    );
}

#[test]
fn test_inverted_range() {
    let builder = MangoQueryBuilder::new(&CouchDbStrategy)
        .inverted_range("n", Some(1.0), Some(5.0), false)
        .inverted_range("m", None, Some(7.0), true);
    assert_eq!(
        dump(&builder),
        r#"{"selector":{"$and":[{"$or":[{"n":{"$lt":1}},{"n":{"$gt":5}}]},{"m":{"$gte":7}}]},"limit":1000000}"#
    );
}

#[test]
fn test_sort_field_injected_for_pouch_db() {
    let sort = Some(Sort::new("Host", SortDirection::Asc));
    let builder = MangoQueryBuilder::new(&PouchDbStrategy)
        .where_field("a", Operator::Equal, Some("x".into()))
        .sort(sort.clone());
    assert_eq!(
        dump(&builder),
        r#"{"selector":{"$and":[{"a":{"$eq":"x"}},{"Host":{"$gte":null}}]},"sort":[{"Host":"asc"}],"limit":1000000}"#
    );

    let builder = MangoQueryBuilder::new(&PouchDbStrategy)
        .where_field("Host", Operator::Equal, Some("x".into()))
        .sort(sort.clone());
    assert_eq!(
        dump(&builder),
        r#"{"selector":{"$and":[{"Host":{"$eq":"x"}}]},"sort":[{"Host":"asc"}],"limit":1000000}"#
    );

    let builder = MangoQueryBuilder::new(&CouchDbStrategy)
        .where_field("a", Operator::Equal, Some("x".into()))
        .sort(sort);
    assert_eq!(
        dump(&builder),
        r#"{"selector":{"$and":[{"a":{"$eq":"x"}}]},"sort":[{"Host":"asc"}],"limit":1000000}"#
    );
}

#[test]
fn test_paging() {
    let builder = MangoQueryBuilder::new(&CouchDbStrategy)
        .where_field("a", Operator::Equal, Some("x".into()))
        .page(Some(3), Some(20));
    let query = builder.to_query();
    assert_eq!(query.skip, Some(60));
    assert_eq!(query.limit, 20);

    let query = builder.clone().page(Some(0), Some(20)).to_query();
    assert_eq!(query.skip, None);
    assert_eq!(query.limit, 20);

    let query = builder.page(None, None).to_query();
    assert_eq!(query.skip, None);
    assert_eq!(query.limit, DEFAULT_LIMIT);
}

#[test]
fn test_render_is_repeatable() {
    let builder = MangoQueryBuilder::new(&PouchDbStrategy)
        .full_text_filter("abc", vec!["Level".to_owned()])
        .where_field("a", Operator::Contains, Some("x".into()))
        .where_field("a", Operator::Contains, Some("y".into()));
    assert_eq!(builder.to_query(), builder.to_query());
}

#[test]
fn test_no_content() {
    let builder = MangoQueryBuilder::new(&CouchDbStrategy);
    assert!(!builder.has_selector_content());
    assert_eq!(dump(&builder), r#"{"selector":{},"limit":1000000}"#);
    let builder = builder.inverted_range("n", None, None, false);
    assert!(!builder.has_selector_content());
}
