//! Saved views and card forms.
//!
//! A saved view pairs a fetch descriptor (`fetchXml`) with a column layout
//! (`layoutXml`). Selecting a view derives the columns shown on cards and
//! the linked entities joined into each row; both are read straight out of
//! the XML with `quick-xml`.
//!
//! ERROR HANDLING
//! ==============
//! Derivation is lenient: a malformed document keeps the elements read
//! before the error and logs a warning, so selecting a view never fails.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("malformed view xml at byte {position}: {message}")]
    Xml { position: u64, message: String },
}

impl ErrorCode for ViewError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Xml { .. } => "E_VIEW_XML",
        }
    }
}

// =============================================================================
// SAVED VIEWS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    pub id: String,
    pub name: String,
    #[serde(alias = "fetchxml")]
    pub fetch_xml: String,
    #[serde(alias = "layoutxml")]
    pub layout_xml: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkEntity {
    pub entity_name: String,
    pub alias: Option<String>,
}

/// Columns and joins derived from a [`SavedQuery`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewData {
    pub columns: Vec<String>,
    pub link_entities: Vec<LinkEntity>,
}

impl ViewData {
    /// Derive view data, keeping whatever parsed before any XML error.
    #[must_use]
    pub fn from_query(query: &SavedQuery) -> Self {
        let (columns, layout_err) = parse_layout_columns(&query.layout_xml);
        if let Some(e) = layout_err {
            warn!(view = %query.name, error = %e, code = e.error_code(), "layout xml truncated");
        }
        let (link_entities, fetch_err) = parse_link_entities(&query.fetch_xml);
        if let Some(e) = fetch_err {
            warn!(view = %query.name, error = %e, code = e.error_code(), "fetch xml truncated");
        }
        Self { columns, link_entities }
    }
}

/// Names of the `<cell name="...">` elements in a layout document.
#[must_use]
pub fn parse_layout_columns(layout_xml: &str) -> (Vec<String>, Option<ViewError>) {
    scan_elements(layout_xml, b"cell", |e| attribute(e, b"name"))
}

/// `<link-entity name="..." alias="...">` joins in a fetch document.
#[must_use]
pub fn parse_link_entities(fetch_xml: &str) -> (Vec<LinkEntity>, Option<ViewError>) {
    scan_elements(fetch_xml, b"link-entity", |e| {
        attribute(e, b"name").map(|entity_name| LinkEntity { entity_name, alias: attribute(e, b"alias") })
    })
}

fn scan_elements<T>(
    xml: &str,
    tag: &[u8],
    mut map: impl FnMut(&BytesStart<'_>) -> Option<T>,
) -> (Vec<T>, Option<ViewError>) {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                if e.local_name().as_ref() == tag {
                    if let Some(item) = map(&e) {
                        out.push(item);
                    }
                }
            }
            Ok(Event::Eof) => return (out, None),
            Ok(_) => {}
            Err(e) => {
                let err = ViewError::Xml { position: reader.buffer_position(), message: e.to_string() };
                return (out, Some(err));
            }
        }
    }
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

// =============================================================================
// CARD FORMS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRow {
    #[serde(default)]
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSection {
    #[serde(default)]
    pub rows: Vec<CardRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardLayout {
    #[serde(default)]
    pub header: CardSection,
    #[serde(default)]
    pub body: CardSection,
    #[serde(default)]
    pub footer: CardSection,
}

/// Card layout used to render tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardForm {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parsed: CardLayout,
}

impl CardForm {
    /// Every attribute referenced by the card, header to footer, without duplicates.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let sections = [&self.parsed.header, &self.parsed.body, &self.parsed.footer];
        for cell in sections.iter().flat_map(|s| &s.rows).flat_map(|r| &r.cells) {
            if !out.contains(cell) {
                out.push(cell.clone());
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
