//! The predicate-query model.
//!
//! Secondary lookups in this system run a predicate scan over stored JSON
//! documents instead of following a stored reference. A [`Query`] selects a
//! document kind, narrows by equality/range conditions over fields, and may
//! sort and paginate. The result is a point-in-time scan with optimistic
//! concurrency semantics; uniqueness invariants are enforced by the
//! application layer, not by the store.

use bytes::Bytes;
use serde_json::Value;

use healthgate_core::{DocKind, DocumentId};

/// A single field condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the given JSON value.
    Eq { field: String, value: Value },
    /// Numeric field is `>=` the bound.
    Gte { field: String, bound: i64 },
    /// Numeric field is `<=` the bound.
    Lte { field: String, bound: i64 },
}

impl Condition {
    /// The field this condition applies to.
    pub fn field(&self) -> &str {
        match self {
            Condition::Eq { field, .. } => field,
            Condition::Gte { field, .. } => field,
            Condition::Lte { field, .. } => field,
        }
    }

    /// Evaluate against a decoded document.
    pub fn matches(&self, document: &Value) -> bool {
        let found = document.get(self.field());
        match self {
            Condition::Eq { value, .. } => found == Some(value),
            Condition::Gte { bound, .. } => {
                matches!(found.and_then(Value::as_i64), Some(n) if n >= *bound)
            }
            Condition::Lte { bound, .. } => {
                matches!(found.and_then(Value::as_i64), Some(n) if n <= *bound)
            }
        }
    }
}

/// Sort specification over one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

/// Pagination: page size plus an opaque resumption bookmark issued by a
/// previous page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    pub limit: usize,
    pub bookmark: Option<String>,
}

impl Page {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            bookmark: None,
        }
    }

    pub fn resume(limit: usize, bookmark: impl Into<String>) -> Self {
        Self {
            limit,
            bookmark: Some(bookmark.into()),
        }
    }
}

/// A predicate query over documents of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub kind: DocKind,
    pub conditions: Vec<Condition>,
    pub sort: Option<Sort>,
    pub page: Option<Page>,
}

impl Query {
    pub fn kind(kind: DocKind) -> Self {
        Self {
            kind,
            conditions: Vec::new(),
            sort: None,
            page: None,
        }
    }

    /// Add an equality condition.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Add a `>=` condition over a numeric field.
    pub fn gte(mut self, field: impl Into<String>, bound: i64) -> Self {
        self.conditions.push(Condition::Gte {
            field: field.into(),
            bound,
        });
        self
    }

    /// Add a `<=` condition over a numeric field.
    pub fn lte(mut self, field: impl Into<String>, bound: i64) -> Self {
        self.conditions.push(Condition::Lte {
            field: field.into(),
            bound,
        });
        self
    }

    /// Sort results by a field, descending.
    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            descending: true,
        });
        self
    }

    /// Sort results by a field, ascending.
    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            descending: false,
        });
        self
    }

    /// Bound the result set.
    pub fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }
}

/// One matching document.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEntry {
    pub key: DocumentId,
    pub value: Bytes,
}

/// A page of query results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPage {
    pub entries: Vec<QueryEntry>,
    /// Present when more results remain; feed back via [`Page::resume`].
    pub bookmark: Option<String>,
}

impl QueryPage {
    /// Consume the page, keeping only the document bytes.
    pub fn into_values(self) -> Vec<Bytes> {
        self.entries.into_iter().map(|e| e.value).collect()
    }
}
