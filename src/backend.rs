use crate::errors::*;
use crate::mango::MangoValue;

use std::fmt;
use std::str::FromStr;

/// The query capabilities that differ between the supported document stores.
pub trait QuerySynthesisStrategy: fmt::Debug {
    /// Value of a `$regex` clause matching fields that contain every term,
    /// case-insensitive.
    fn contains_clause(&self, terms: &[&str]) -> MangoValue;

    /// The store accepts only one regex per field, so all `CONTAINS` filters
    /// on a field must be folded into one clause.
    fn merges_contains_per_field(&self) -> bool;

    fn requires_sort_field_in_selector(&self) -> bool;

    /// Sorted results silently skip documents without the sort field.
    fn omits_documents_missing_sort_field(&self) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CouchDbStrategy;

impl QuerySynthesisStrategy for CouchDbStrategy {
    fn contains_clause(&self, terms: &[&str]) -> MangoValue {
        let pattern: String = terms.iter().map(|t| format!(".*{}.*", t)).collect();
        MangoValue::Str(format!("(?i){}", pattern))
    }

    fn merges_contains_per_field(&self) -> bool {
        false
    }

    fn requires_sort_field_in_selector(&self) -> bool {
        false
    }

    fn omits_documents_missing_sort_field(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PouchDbStrategy;

impl QuerySynthesisStrategy for PouchDbStrategy {
    fn contains_clause(&self, terms: &[&str]) -> MangoValue {
        MangoValue::Regex {
            pattern: terms.iter().map(|t| format!("(?=.*{}.*)", t)).collect(),
            flags: "i".to_owned(),
        }
    }

    fn merges_contains_per_field(&self) -> bool {
        true
    }

    fn requires_sort_field_in_selector(&self) -> bool {
        true
    }

    fn omits_documents_missing_sort_field(&self) -> bool {
        false
    }
}

static COUCH_DB: CouchDbStrategy = CouchDbStrategy;
static POUCH_DB: PouchDbStrategy = PouchDbStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    CouchDb,
    PouchDb,
}

impl BackendKind {
    pub fn strategy(&self) -> &'static dyn QuerySynthesisStrategy {
        match self {
            Self::CouchDb => &COUCH_DB,
            Self::PouchDb => &POUCH_DB,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CouchDb => "couchdb",
            Self::PouchDb => "pouchdb",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        match s.to_lowercase().as_str() {
            "couchdb" => Ok(Self::CouchDb),
            "pouchdb" => Ok(Self::PouchDb),
            _ => invalid_data_ae!("unknown backend: {}", s),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[test]
fn test_contains_clauses() {
    assert_eq!(
        CouchDbStrategy.contains_clause(&["x"]),
        MangoValue::Str("(?i).*x.*".to_owned())
    );
    assert_eq!(
        PouchDbStrategy.contains_clause(&["x", "y"]).to_string(),
        "/(?=.*x.*)(?=.*y.*)/i"
    );
}

#[test]
fn test_backend_kind() {
    assert_eq!("CouchDB".parse::<BackendKind>().unwrap(), BackendKind::CouchDb);
    assert!(BackendKind::PouchDb.strategy().requires_sort_field_in_selector());
    assert!(BackendKind::CouchDb.strategy().omits_documents_missing_sort_field());
    assert!("mysql".parse::<BackendKind>().is_err());
}
