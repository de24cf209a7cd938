//! Board configuration and the read-only config store.
//!
//! DESIGN
//! ======
//! A board is declared by a JSON definition: the entity configuration, the
//! metadata for each entity, and the saved views and card forms available
//! to them. [`ConfigStore`] validates the definition once at load and then
//! only hands out shared references; nothing mutates it afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ErrorCode;
use crate::metadata::{Attribute, Metadata};
use crate::view::{CardForm, SavedQuery};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read board definition {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse board definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no metadata for entity {0}")]
    MissingMetadata(String),
    #[error("entity {entity} has no option-set attribute {attribute}")]
    MissingSeparator { entity: String, attribute: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "E_CONFIG_IO",
            Self::Parse(_) => "E_CONFIG_PARSE",
            Self::MissingMetadata(_) => "E_MISSING_METADATA",
            Self::MissingSeparator { .. } => "E_MISSING_SEPARATOR",
        }
    }
}

// =============================================================================
// ENTITY CONFIG
// =============================================================================

/// Which of the two configured entities an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardSide {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenHandler {
    #[default]
    Inline,
    SideBySide,
    Modal,
    NewWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonIcon {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Extra tile menu entry wired to a registered button handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomButton {
    pub id: String,
    pub label: String,
    /// Handler id looked up in the handler registry.
    pub call_back: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<ButtonIcon>,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardEntity {
    pub logical_name: String,
    /// Logical name of the separator attribute.
    pub swim_lane_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_callback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_lookup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_lookup: Option<String>,
    #[serde(default = "default_true")]
    pub allow_transitions: bool,
    /// Inverted form of `allow_transitions` used by older definitions.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub prevent_transitions: bool,
    #[serde(default)]
    pub custom_buttons: Vec<CustomButton>,
    #[serde(default)]
    pub hidden_lanes: Vec<i64>,
    #[serde(default)]
    pub visible_lanes: Vec<i64>,
    /// Saved view id selected on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_view: Option<String>,
    /// Collect records matching no option into a trailing lane.
    #[serde(default)]
    pub fallback_lane: bool,
    #[serde(default)]
    pub hide_count_on_lane: bool,
    #[serde(default)]
    pub fit_lanes_to_screen_width: bool,
    #[serde(default)]
    pub default_open_handler: OpenHandler,
}

impl BoardEntity {
    #[must_use]
    pub fn new(logical_name: impl Into<String>, swim_lane_source: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            swim_lane_source: swim_lane_source.into(),
            transition_callback: None,
            notification_lookup: None,
            subscription_lookup: None,
            allow_transitions: true,
            prevent_transitions: false,
            custom_buttons: Vec::new(),
            hidden_lanes: Vec::new(),
            visible_lanes: Vec::new(),
            default_view: None,
            fallback_lane: false,
            hide_count_on_lane: false,
            fit_lanes_to_screen_width: false,
            default_open_handler: OpenHandler::Inline,
        }
    }

    /// Whether tiles of this entity may be dropped onto another lane.
    #[must_use]
    pub fn transitions_allowed(&self) -> bool {
        self.allow_transitions && !self.prevent_transitions
    }

    #[must_use]
    pub fn button(&self, id: &str) -> Option<&CustomButton> {
        self.custom_buttons.iter().find(|b| b.id == id)
    }
}

/// Related entity rendered nested inside primary tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryEntity {
    #[serde(flatten)]
    pub entity: BoardEntity,
    /// Lookup on the secondary entity pointing at its primary parent.
    pub parent_lookup: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    pub primary_entity: BoardEntity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_entity: Option<SecondaryEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_script_url: Option<String>,
}

impl BoardConfig {
    #[must_use]
    pub fn entity(&self, side: BoardSide) -> Option<&BoardEntity> {
        match side {
            BoardSide::Primary => Some(&self.primary_entity),
            BoardSide::Secondary => self.secondary_entity.as_ref().map(|s| &s.entity),
        }
    }
}

// =============================================================================
// DEFINITION FILE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityView {
    pub entity: String,
    #[serde(flatten)]
    pub query: SavedQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityForm {
    pub entity: String,
    #[serde(flatten)]
    pub form: CardForm,
}

/// On-disk shape of a board definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardDefinition {
    pub config: BoardConfig,
    pub metadata: Vec<Metadata>,
    #[serde(default)]
    pub views: Vec<EntityView>,
    #[serde(default)]
    pub forms: Vec<EntityForm>,
}

// =============================================================================
// CONFIG STORE
// =============================================================================

/// Immutable board configuration plus entity metadata.
#[derive(Debug)]
pub struct ConfigStore {
    config: Arc<BoardConfig>,
    metadata: HashMap<String, Arc<Metadata>>,
    views: Vec<EntityView>,
    forms: Vec<EntityForm>,
}

impl ConfigStore {
    /// Validate a definition and freeze it.
    ///
    /// # Errors
    ///
    /// Returns `MissingMetadata` or `MissingSeparator` when a configured entity
    /// has no metadata or its separator attribute is unknown.
    pub fn new(definition: BoardDefinition) -> Result<Self, ConfigError> {
        let metadata: HashMap<String, Arc<Metadata>> = definition
            .metadata
            .into_iter()
            .map(|m| (m.logical_name.clone(), Arc::new(m)))
            .collect();

        let entities = [BoardSide::Primary, BoardSide::Secondary]
            .into_iter()
            .filter_map(|side| definition.config.entity(side));
        for entity in entities {
            let meta = metadata
                .get(&entity.logical_name)
                .ok_or_else(|| ConfigError::MissingMetadata(entity.logical_name.clone()))?;
            if meta.attribute(&entity.swim_lane_source).is_none() {
                return Err(ConfigError::MissingSeparator {
                    entity: entity.logical_name.clone(),
                    attribute: entity.swim_lane_source.clone(),
                });
            }
        }

        info!(
            primary = %definition.config.primary_entity.logical_name,
            secondary = definition.config.secondary_entity.as_ref().map(|s| s.entity.logical_name.as_str()),
            views = definition.views.len(),
            forms = definition.forms.len(),
            "board configuration loaded"
        );

        Ok(Self { config: Arc::new(definition.config), metadata, views: definition.views, forms: definition.forms })
    }

    /// Parse and validate a JSON definition.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for invalid JSON, or a validation error from [`ConfigStore::new`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let definition: BoardDefinition = serde_json::from_str(json)?;
        Self::new(definition)
    }

    /// Read, parse and validate a JSON definition file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as [`ConfigStore::from_json`].
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn config(&self) -> &Arc<BoardConfig> {
        &self.config
    }

    #[must_use]
    pub fn entity(&self, side: BoardSide) -> Option<&BoardEntity> {
        self.config.entity(side)
    }

    #[must_use]
    pub fn parent_lookup(&self) -> Option<&str> {
        self.config.secondary_entity.as_ref().map(|s| s.parent_lookup.as_str())
    }

    #[must_use]
    pub fn metadata(&self, side: BoardSide) -> Option<&Arc<Metadata>> {
        self.entity(side).and_then(|e| self.metadata.get(&e.logical_name))
    }

    #[must_use]
    pub fn metadata_for(&self, logical_name: &str) -> Option<&Arc<Metadata>> {
        self.metadata.get(logical_name)
    }

    #[must_use]
    pub fn separator(&self, side: BoardSide) -> Option<&Attribute> {
        let entity = self.entity(side)?;
        self.metadata(side)?.attribute(&entity.swim_lane_source)
    }

    pub fn views(&self, side: BoardSide) -> impl Iterator<Item = &SavedQuery> {
        let name = self.entity(side).map(|e| e.logical_name.clone());
        self.views
            .iter()
            .filter(move |v| name.as_deref() == Some(v.entity.as_str()))
            .map(|v| &v.query)
    }

    /// The entity's configured default view, else its first view.
    #[must_use]
    pub fn default_view(&self, side: BoardSide) -> Option<&SavedQuery> {
        let wanted = self.entity(side)?.default_view.as_deref();
        let mut views = self.views(side).peekable();
        let first = views.peek().copied();
        match wanted {
            Some(id) => views.find(|v| v.id == id).or(first),
            None => first,
        }
    }

    #[must_use]
    pub fn default_form(&self, side: BoardSide) -> Option<&CardForm> {
        let name = &self.entity(side)?.logical_name;
        self.forms.iter().find(|f| &f.entity == name).map(|f| &f.form)
    }

    /// Entity logical name → collection name, for clients that address entity sets.
    #[must_use]
    pub fn collection_names(&self) -> HashMap<String, String> {
        self.metadata
            .values()
            .map(|m| (m.logical_name.clone(), m.logical_collection_name.clone()))
            .collect()
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
