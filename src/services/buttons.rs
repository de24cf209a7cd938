//! Tile actions: custom buttons, secondary create prefill and selection.

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::BoardSide;
use crate::error::ErrorCode;
use crate::hooks::{ButtonContext, HookError};
use crate::metadata::Metadata;
use crate::record::{Data, Record};
use crate::state::BoardContext;
use crate::store::{Action, SelectedRecord};

#[derive(Debug, thiserror::Error)]
pub enum ButtonError {
    #[error("no {0:?} entity configured")]
    EntityNotConfigured(BoardSide),
    #[error("button not found: {0}")]
    ButtonNotFound(String),
    #[error(transparent)]
    Hook(#[from] HookError),
}

impl ErrorCode for ButtonError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EntityNotConfigured(_) => "E_ENTITY_NOT_CONFIGURED",
            Self::ButtonNotFound(_) => "E_BUTTON_NOT_FOUND",
            Self::Hook(e) => e.error_code(),
        }
    }
}

// =============================================================================
// CUSTOM BUTTONS
// =============================================================================

/// Run the handler behind a tile's custom button.
///
/// # Errors
///
/// Returns `ButtonNotFound` when the entity has no such button,
/// `HandlerNotFound` when its callback is not registered, or the handler's
/// own error.
pub async fn invoke_button(
    ctx: &BoardContext,
    side: BoardSide,
    button_id: &str,
    record: Record,
) -> Result<(), ButtonError> {
    let entity = ctx.config.entity(side).ok_or(ButtonError::EntityNotConfigured(side))?;
    let button = entity
        .button(button_id)
        .ok_or_else(|| ButtonError::ButtonNotFound(button_id.to_string()))?;
    let handler = ctx.hooks.button(&button.call_back)?;

    info!(entity = %entity.logical_name, button = %button.id, callback = %button.call_back, "custom button");
    handler.on_click(ButtonContext { data: record, side, board: ctx.handle() }).await?;
    Ok(())
}

/// Fire-and-forget form of [`invoke_button`]; failures are logged.
pub fn spawn_button(ctx: BoardContext, side: BoardSide, button_id: String, record: Record) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = invoke_button(&ctx, side, &button_id, record).await {
            warn!(error = %e, code = e.error_code(), button = %button_id, "custom button failed");
        }
    })
}

// =============================================================================
// SECONDARY CREATE
// =============================================================================

/// Form prefill for creating a secondary record under `parent`.
///
/// `None` when the parent has no id.
#[must_use]
pub fn secondary_prefill(parent_lookup: &str, parent_metadata: &Metadata, parent: &Record) -> Option<Data> {
    let id = parent.id(parent_metadata)?;
    let mut prefill = Data::new();
    prefill.insert(parent_lookup.to_string(), Value::String(id));
    prefill.insert(format!("{parent_lookup}type"), Value::String(parent_metadata.logical_name.clone()));
    prefill.insert(
        format!("{parent_lookup}name"),
        parent.name(parent_metadata).map_or(Value::Null, |n| Value::String(n.to_string())),
    );
    Some(prefill)
}

// =============================================================================
// SELECTION
// =============================================================================

/// Show a record in the side panel.
pub fn select_record(ctx: &BoardContext, side: BoardSide, record: &Record) -> bool {
    let state = ctx.store.snapshot();
    let Some(metadata) = state.metadata(side).or_else(|| ctx.config.metadata(side)) else {
        return false;
    };
    let Some(id) = record.id(metadata) else {
        return false;
    };
    let selected = SelectedRecord {
        entity_type: metadata.logical_name.clone(),
        id,
        name: record.name(metadata).map(str::to_string),
    };
    ctx.store.dispatch(Action::SetSelectedRecord(Some(selected)))
}

pub fn clear_selection(ctx: &BoardContext) -> bool {
    ctx.store.dispatch(Action::SetSelectedRecord(None))
}

#[cfg(test)]
#[path = "buttons_test.rs"]
mod tests;
