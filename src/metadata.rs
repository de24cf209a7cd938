//! Entity metadata: primary attributes, separator attributes, option sets.
//!
//! The separator attribute is the option-set field whose value decides
//! which lane a record belongs to. Its options are ordered; that order is
//! the lane order on the board.

use serde::{Deserialize, Serialize};

/// Logical name of the two-part status attribute.
pub const STATUS_ATTRIBUTE: &str = "statuscode";

/// Logical name of the state attribute paired with [`STATUS_ATTRIBUTE`].
pub const STATE_ATTRIBUTE: &str = "statecode";

// =============================================================================
// OPTION SETS
// =============================================================================

/// One value of an option-set attribute. Each option becomes a lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneOption {
    pub value: i64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Paired `statecode` value when this option belongs to `statuscode`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<i64>,
}

impl LaneOption {
    #[must_use]
    pub fn new(value: i64, label: impl Into<String>) -> Self {
        Self { value, label: label.into(), color: None, state: None }
    }

    #[must_use]
    pub fn with_state(mut self, state: i64) -> Self {
        self.state = Some(state);
        self
    }
}

/// An option-set attribute descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub logical_name: String,
    #[serde(default)]
    pub option_set: Vec<LaneOption>,
}

impl Attribute {
    #[must_use]
    pub fn new(logical_name: impl Into<String>, option_set: Vec<LaneOption>) -> Self {
        Self { logical_name: logical_name.into(), option_set }
    }

    /// True when this is the two-part status attribute.
    #[must_use]
    pub fn is_status(&self) -> bool {
        self.logical_name == STATUS_ATTRIBUTE
    }

    #[must_use]
    pub fn option(&self, value: i64) -> Option<&LaneOption> {
        self.option_set.iter().find(|o| o.value == value)
    }
}

// =============================================================================
// ENTITY METADATA
// =============================================================================

/// Per-entity descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub logical_name: String,
    pub logical_collection_name: String,
    pub primary_id_attribute: String,
    pub primary_name_attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_collection_name: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Metadata {
    #[must_use]
    pub fn attribute(&self, logical_name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.logical_name == logical_name)
    }

    /// Label used for headings, falling back to the logical name.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.logical_name)
    }
}

#[cfg(test)]
#[path = "metadata_test.rs"]
mod tests;
