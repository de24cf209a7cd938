//! Record store: the collaborator that reads and writes business records.
//!
//! ARCHITECTURE
//! ============
//! The board never talks to a backend directly. Everything goes through
//! the [`RecordStore`] trait so the transition engine, refresh and follow
//! services can run against the in-memory store in tests and against the
//! OData Web API in production.

pub mod memory;
pub mod webapi;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;
use crate::record::{Data, Record, normalize_id};

pub use memory::InMemoryRecordStore;
pub use webapi::WebApiRecordStore;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("{entity} record not found: {id}")]
    NotFound { entity: String, id: String },
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    #[error("record store config invalid: {0}")]
    Config(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request rejected: status {status}")]
    Rejected { status: u16, body: String },
    #[error("response decode failed: {0}")]
    Decode(String),
}

impl ErrorCode for RecordStoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "E_RECORD_NOT_FOUND",
            Self::UnknownEntity(_) => "E_UNKNOWN_ENTITY",
            Self::Config(_) => "E_STORE_CONFIG",
            Self::Transport(_) => "E_TRANSPORT",
            Self::Rejected { .. } => "E_REJECTED",
            Self::Decode(_) => "E_DECODE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Rejected { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// QUERY
// =============================================================================

/// `attribute ∈ values` filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub values: Vec<Value>,
}

/// What to fetch. Stores that understand `fetch_xml` may use it instead of
/// `columns` and `conditions`; conditions are always honoured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub fetch_xml: Option<String>,
    pub columns: Vec<String>,
    pub conditions: Vec<Condition>,
}

impl RecordQuery {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.columns.contains(&column) {
            self.columns.push(column);
        }
        self
    }

    #[must_use]
    pub fn with_condition(mut self, attribute: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition { attribute: attribute.into(), values });
        self
    }

    /// True when `record` satisfies every condition. Strings compare as ids.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| {
            record
                .get(&c.attribute)
                .is_some_and(|v| c.values.iter().any(|wanted| values_match(v, wanted)))
        })
    }
}

fn values_match(actual: &Value, wanted: &Value) -> bool {
    match (actual, wanted) {
        (Value::String(a), Value::String(b)) => normalize_id(a) == normalize_id(b),
        _ => actual == wanted,
    }
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the records of `entity` matching `query`, in store order.
    async fn fetch(&self, entity: &str, query: &RecordQuery) -> Result<Vec<Record>, RecordStoreError>;

    /// Apply a patch to one record.
    async fn update(&self, entity: &str, id: &str, patch: &Data) -> Result<(), RecordStoreError>;

    /// Create a record, returning its id.
    async fn create(&self, entity: &str, attributes: &Data) -> Result<String, RecordStoreError>;

    async fn delete(&self, entity: &str, id: &str) -> Result<(), RecordStoreError>;
}
