//! Record: an opaque attribute map fetched from the record store.
//!
//! DESIGN
//! ======
//! Records are never interpreted beyond a handful of well-known attributes
//! (primary id, primary name, separator, lookups). Each record is stamped
//! with a content fingerprint when it is built, so "did this tile's data
//! change" is a key-count plus one integer comparison instead of a walk over
//! every field. The fingerprint covers sorted key/value pairs, which makes it
//! agree with a per-key shallow comparison: same key set, same values.

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metadata::Metadata;

/// Flat attribute payload. Alias to reduce noise in signatures.
pub type Data = serde_json::Map<String, Value>;

/// Suffix marking a lookup write in a patch (`{lookup}@odata.bind`).
pub const BIND_SUFFIX: &str = "@odata.bind";

// =============================================================================
// RECORD
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Data", into = "Data")]
pub struct Record {
    fields: Data,
    fingerprint: u64,
}

impl Record {
    #[must_use]
    pub fn new(fields: Data) -> Self {
        let fingerprint = fingerprint(&fields);
        Self { fields, fingerprint }
    }

    /// Build a record from a JSON object. Non-object values yield an empty record.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map),
            _ => Self::new(Data::new()),
        }
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.fields.get(attribute)
    }

    #[must_use]
    pub fn fields(&self) -> &Data {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Normalized primary id of this record.
    #[must_use]
    pub fn id(&self, metadata: &Metadata) -> Option<String> {
        self.get(&metadata.primary_id_attribute)
            .and_then(Value::as_str)
            .map(normalize_id)
    }

    #[must_use]
    pub fn name(&self, metadata: &Metadata) -> Option<&str> {
        self.get(&metadata.primary_name_attribute).and_then(Value::as_str)
    }

    /// Integer value of an option-set attribute.
    #[must_use]
    pub fn option_value(&self, attribute: &str) -> Option<i64> {
        self.get(attribute).and_then(Value::as_i64)
    }

    /// Normalized id referenced by a lookup attribute (`_{lookup}_value`).
    #[must_use]
    pub fn lookup_id(&self, lookup: &str) -> Option<String> {
        self.get(&lookup_value_key(lookup))
            .and_then(Value::as_str)
            .map(normalize_id)
    }

    /// Shallow content equality: same key count and same fingerprint.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len() && self.fingerprint == other.fingerprint
    }

    /// Merge a patch into this record and restamp the fingerprint.
    pub fn merge(&mut self, patch: &Data) {
        for (key, value) in patch {
            self.fields.insert(key.clone(), value.clone());
        }
        self.fingerprint = fingerprint(&self.fields);
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl From<Data> for Record {
    fn from(fields: Data) -> Self {
        Self::new(fields)
    }
}

impl From<Record> for Data {
    fn from(record: Record) -> Self {
        record.fields
    }
}

fn fingerprint(fields: &Data) -> u64 {
    let mut hasher = DefaultHasher::new();
    fields.len().hash(&mut hasher);
    for (key, value) in fields {
        key.hash(&mut hasher);
        value.to_string().hash(&mut hasher);
    }
    hasher.finish()
}

// =============================================================================
// IDS AND LOOKUPS
// =============================================================================

/// Strip surrounding braces and lowercase so ids from different sources compare equal.
#[must_use]
pub fn normalize_id(raw: &str) -> String {
    raw.trim().trim_start_matches('{').trim_end_matches('}').to_ascii_lowercase()
}

/// Attribute name under which a lookup's referenced id is read.
#[must_use]
pub fn lookup_value_key(lookup: &str) -> String {
    format!("_{lookup}_value")
}

/// Patch entry that binds `lookup` to the record `id` in `collection`.
#[must_use]
pub fn lookup_bind(lookup: &str, collection: &str, id: &str) -> (String, Value) {
    (format!("{lookup}{BIND_SUFFIX}"), Value::String(format!("/{collection}({})", normalize_id(id))))
}

/// Split a bind entry into the lookup name and the referenced id.
///
/// `("oss_incidentid@odata.bind", "/incidents(abc)")` → `("oss_incidentid", "abc")`.
#[must_use]
pub fn parse_bind(key: &str, value: &Value) -> Option<(String, String)> {
    let lookup = key.strip_suffix(BIND_SUFFIX)?;
    let reference = value.as_str()?;
    let open = reference.rfind('(')?;
    let id = reference[open + 1..].strip_suffix(')')?;
    Some((lookup.to_string(), normalize_id(id)))
}

// =============================================================================
// MARKERS
// =============================================================================

/// Marks a record as followed by the current viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    /// Normalized id of the followed record.
    pub lookup_value: String,
}

/// Unread-update marker tied to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// Normalized id of the record the notification is about.
    pub lookup_value: String,
}

#[cfg(test)]
#[path = "record_test.rs"]
mod tests;
