use crate::column::Column;
use crate::errors::*;
use crate::logger::SyncLogger;
use crate::mango::MangoQuery;
use crate::query::{Page, Query};
use crate::query_converter::QueryConverter;
use crate::record::Record;

pub const SORT_NOTICE: &str =
    "Rows without a value in the sorted column are hidden while the sort is active.";

#[derive(Debug, Clone)]
pub struct PagePlan {
    /// `None` when `reused_total` holds the previous page's count.
    pub count_query: Option<MangoQuery>,
    pub data_query: MangoQuery,
    pub reused_total: Option<usize>,
}

pub struct Pager<'s> {
    converter: QueryConverter<'s>,
    columns: Vec<Column>,
    log: SyncLogger,
}

impl<'s> Pager<'s> {
    pub fn new(converter: QueryConverter<'s>, columns: Vec<Column>, log: SyncLogger) -> Self {
        Self {
            converter,
            columns,
            log,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn plan(&self, previous: Option<&Page>, query: &Query) -> ApiResult<PagePlan> {
        let data_query = self.converter.to_mango(&self.columns, query)?;
        let reused_total = previous
            .filter(|p| can_reuse_total(p, query))
            .map(|p| p.total_row_count);

        let count_query = match reused_total {
            Some(total) => {
                debug!(self.log, "reusing total row count"; "total" => total);
                None
            }
            None => {
                let count_query = self
                    .converter
                    .query_for_all_matching_ids(&self.columns, query)?;
                debug!(self.log, "counting matching rows"; "query" => %count_query);
                Some(count_query)
            }
        };
        debug!(self.log, "page query"; "query" => %data_query);

        Ok(PagePlan {
            count_query,
            data_query,
            reused_total,
        })
    }

    pub fn complete(&self, query: &Query, entries: Vec<Record>, total_row_count: usize) -> Page {
        Page {
            query: query.clone(),
            entries,
            total_row_count,
        }
    }
}

/// Only filter and sort changes invalidate the count; paging doesn't.
fn can_reuse_total(previous: &Page, query: &Query) -> bool {
    previous.query.same_filters(query) && previous.query.sort == query.sort
}

pub trait NotificationSink {
    fn notify(&mut self, message: &str);
}

#[derive(Debug, Clone, Default)]
pub struct SortNoticeGate {
    suppressed: bool,
}

impl SortNoticeGate {
    pub fn new(suppressed: bool) -> Self {
        Self { suppressed }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Sends the notice if `query` sorts on a backend that drops documents
    /// missing the sort field. Returns whether the notice was sent.
    pub fn on_sort_applied(
        &self,
        converter: &QueryConverter,
        query: &Query,
        sink: &mut dyn NotificationSink,
    ) -> bool {
        if self.suppressed || !converter.sort_omits_documents(query) {
            return false;
        }
        sink.notify(SORT_NOTICE);
        true
    }

    pub fn remember_choice(&mut self) {
        self.suppressed = true;
    }
}

#[cfg(test)]
use crate::backend::BackendKind;
#[cfg(test)]
use crate::column::DataType;
#[cfg(test)]
use crate::query::{Operator, PropertyFilter, Sort, SortDirection};

#[cfg(test)]
#[derive(Default)]
struct Collect(Vec<String>);

#[cfg(test)]
impl NotificationSink for Collect {
    fn notify(&mut self, message: &str) {
        self.0.push(message.to_owned());
    }
}

#[cfg(test)]
fn pager(backend: BackendKind) -> Pager<'static> {
    Pager::new(
        QueryConverter::new(backend.strategy()),
        vec![
            Column::new("Level", DataType::Text),
            Column::new("Size", DataType::Number),
        ],
        SyncLogger::discard(),
    )
}

#[cfg(test)]
fn filtered_query() -> Query {
    let mut query = Query::new();
    query
        .add_property_filter(PropertyFilter::new("Level", Operator::Equal, "ERROR"))
        .set_page(0, 50);
    query
}

#[test]
fn test_first_page_counts() {
    let pager = pager(BackendKind::CouchDb);
    let plan = pager.plan(None, &filtered_query()).unwrap();
    assert!(plan.count_query.is_some());
    assert_eq!(plan.reused_total, None);
    assert_eq!(plan.data_query.limit, 50);
}

#[test]
fn test_next_page_reuses_total() {
    let pager = pager(BackendKind::CouchDb);
    let first = filtered_query();
    let page = pager.complete(&first, Vec::new(), 120);

    let mut next = first.clone();
    next.set_page(1, 50);
    let plan = pager.plan(Some(&page), &next).unwrap();
    assert!(plan.count_query.is_none());
    assert_eq!(plan.reused_total, Some(120));
    assert_eq!(plan.data_query.skip, Some(50));
    // the stored query is unaffected by paging the clone
    assert_eq!(page.query.page_index, Some(0));
}

#[test]
fn test_sort_or_filter_change_recounts() {
    let pager = pager(BackendKind::CouchDb);
    let first = filtered_query();
    let page = pager.complete(&first, Vec::new(), 120);

    let mut sorted = first.clone();
    sorted.set_sort(Some(Sort::new("Size", SortDirection::Desc)));
    let plan = pager.plan(Some(&page), &sorted).unwrap();
    assert!(plan.count_query.is_some());
    assert_eq!(plan.reused_total, None);

    let mut refiltered = first.clone();
    refiltered.add_property_filter(PropertyFilter::without_value("Size", Operator::NotEmpty));
    let plan = pager.plan(Some(&page), &refiltered).unwrap();
    assert!(plan.count_query.is_some());
}

#[test]
fn test_sort_notice_gate() {
    let mut sorted = Query::new();
    sorted.set_sort(Some(Sort::new("Size", SortDirection::Asc)));
    let couch = QueryConverter::new(BackendKind::CouchDb.strategy());
    let pouch = QueryConverter::new(BackendKind::PouchDb.strategy());

    let mut sink = Collect::default();
    let mut gate = SortNoticeGate::default();
    assert!(!gate.on_sort_applied(&couch, &Query::new(), &mut sink));
    assert!(!gate.on_sort_applied(&pouch, &sorted, &mut sink));
    assert!(gate.on_sort_applied(&couch, &sorted, &mut sink));
    assert_eq!(sink.0, vec![SORT_NOTICE.to_owned()]);

    gate.remember_choice();
    assert!(gate.is_suppressed());
    assert!(!gate.on_sort_applied(&couch, &sorted, &mut sink));
    assert_eq!(sink.0.len(), 1);
}
