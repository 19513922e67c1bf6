use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// A value that can be indexed and filtered on in SQLite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl IndexValue {
    /// Render as the text form stored in the SQLite index table.
    pub fn as_sql_text(&self) -> String {
        match self {
            IndexValue::String(s) => s.clone(),
            IndexValue::Int(i) => i.to_string(),
            IndexValue::Bool(b) => b.to_string(),
        }
    }
}

/// Comparison operator for a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FilterOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
        }
    }
}

/// A single indexed-field comparison used by [`Store::list`](crate::Store::list).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: IndexValue,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: IndexValue) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value,
        }
    }
}

/// Contract a persisted type must satisfy to live in a [`Store`](crate::Store).
///
/// Implementors are plain data: the store only ever calls these accessor
/// methods, never mutates through the trait.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Stable unique identifier, unique within `collection_name()`.
    fn id(&self) -> &str;

    /// Last-modified timestamp in epoch milliseconds, used for log ordering
    /// and conflict detection on replay.
    fn updated_at(&self) -> i64;

    /// Name of the SQLite table / JSONL log file this record type lives in.
    fn collection_name() -> &'static str
    where
        Self: Sized;

    /// Fields to mirror into the SQLite index table for `list`/`Filter`
    /// queries. Keys become column names (created lazily on first write).
    fn indexed_fields(&self) -> HashMap<String, IndexValue>;
}
