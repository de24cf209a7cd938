//! Transition engine: turn a drag-drop into a record update.
//!
//! DESIGN
//! ======
//! A drop runs strictly in sequence: validate, guard, external hook, patch,
//! refresh. Each step can end the transition; the end state is reported as
//! a [`TransitionOutcome`] rather than an error, because the host has
//! nothing to do with a failed drop except leave the tile where it was.
//!
//! The work indicator is set before the update and cleared on every path
//! that set it or that ran a hook. Failures are logged with their error
//! code and never retried.
//!
//! Across drops nothing is ordered unless `single_flight` is enabled, in
//! which case a drop arriving while another is running returns `Busy`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{BoardEntity, BoardSide};
use crate::error::ErrorCode;
use crate::hooks::{HookError, TransitionContext};
use crate::metadata::{Attribute, LaneOption, STATE_ATTRIBUTE};
use crate::record::{Data, Record, normalize_id};
use crate::record_store::RecordStoreError;
use crate::services::refresh;
use crate::state::BoardContext;
use crate::store::Action;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no {0:?} entity configured")]
    EntityNotConfigured(BoardSide),
    #[error("separator metadata missing for {0}")]
    SeparatorMissing(String),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("record update failed: {0}")]
    Update(#[from] RecordStoreError),
}

impl ErrorCode for EngineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EntityNotConfigured(_) => "E_ENTITY_NOT_CONFIGURED",
            Self::SeparatorMissing(_) => "E_MISSING_SEPARATOR",
            Self::Hook(e) => e.error_code(),
            Self::Update(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Update(e) => e.retryable(),
            _ => false,
        }
    }
}

/// The tile being dragged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragItem {
    pub id: String,
    /// Option of the lane the tile was dragged from. `None` for the fallback lane.
    #[serde(default)]
    pub source_option: Option<LaneOption>,
}

/// Where the tile was released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropResult {
    #[serde(default)]
    pub option: Option<LaneOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Dropped outside a lane or onto its own lane.
    Noop,
    /// The entity does not allow transitions.
    Disallowed,
    /// Another transition is in flight and single-flight is on.
    Busy,
    /// The transition hook asked to skip the update.
    Prevented,
    /// The record was updated. `refreshed` is false when the follow-up refresh failed.
    Applied { refreshed: bool },
    Failed { code: &'static str },
}

// =============================================================================
// DROP
// =============================================================================

/// Handle a drop of `item` onto `drop`.
pub async fn on_drop(
    ctx: &BoardContext,
    side: BoardSide,
    item: DragItem,
    drop: Option<DropResult>,
) -> TransitionOutcome {
    let Some(target) = drop.and_then(|d| d.option) else {
        debug!(id = %item.id, "dropped outside a lane");
        return TransitionOutcome::Noop;
    };
    if item.source_option.as_ref().is_some_and(|source| source.value == target.value) {
        debug!(id = %item.id, lane = target.value, "dropped onto own lane");
        return TransitionOutcome::Noop;
    }

    let Some(entity) = ctx.config.entity(side) else {
        let err = EngineError::EntityNotConfigured(side);
        warn!(error = %err, code = err.error_code(), "transition rejected");
        return TransitionOutcome::Failed { code: err.error_code() };
    };
    if !entity.transitions_allowed() {
        debug!(entity = %entity.logical_name, "transitions disabled");
        return TransitionOutcome::Disallowed;
    }

    let _flight = if ctx.settings.single_flight {
        match ctx.transition_lock.clone().try_lock_owned() {
            Ok(guard) => Some(guard),
            Err(_) => {
                info!(id = %item.id, "transition already in flight");
                return TransitionOutcome::Busy;
            }
        }
    } else {
        None
    };

    match apply(ctx, side, entity, &item, target).await {
        Ok(outcome) => outcome,
        Err(e) => {
            ctx.store.dispatch(Action::SetWorkIndicator(false));
            warn!(
                error = %e,
                code = e.error_code(),
                retryable = e.retryable(),
                entity = %entity.logical_name,
                id = %item.id,
                "transition failed"
            );
            TransitionOutcome::Failed { code: e.error_code() }
        }
    }
}

/// Fire-and-forget form of [`on_drop`].
pub fn spawn_drop(
    ctx: BoardContext,
    side: BoardSide,
    item: DragItem,
    drop: Option<DropResult>,
) -> JoinHandle<TransitionOutcome> {
    tokio::spawn(async move { on_drop(&ctx, side, item, drop).await })
}

async fn apply(
    ctx: &BoardContext,
    side: BoardSide,
    entity: &BoardEntity,
    item: &DragItem,
    target: LaneOption,
) -> Result<TransitionOutcome, EngineError> {
    let separator = ctx
        .config
        .separator(side)
        .ok_or_else(|| EngineError::SeparatorMissing(entity.logical_name.clone()))?;
    let id = normalize_id(&item.id);

    if let Some(callback) = &entity.transition_callback {
        let hook = ctx.hooks.transition(callback)?;
        let data = dragged_record(ctx, side, &id);
        let outcome = hook
            .on_transition(TransitionContext { data, target: target.clone(), side, board: ctx.handle() })
            .await?;
        if outcome.prevent_default {
            ctx.store.dispatch(Action::SetWorkIndicator(false));
            info!(entity = %entity.logical_name, %id, callback = %callback, "transition prevented by hook");
            return Ok(TransitionOutcome::Prevented);
        }
    }

    ctx.store.dispatch(Action::SetWorkIndicator(true));
    let patch = transition_patch(separator, &target);
    ctx.records.update(&entity.logical_name, &id, &patch).await?;
    ctx.store.dispatch(Action::SetWorkIndicator(false));
    info!(entity = %entity.logical_name, %id, lane = target.value, "record transitioned");

    let refreshed = match refresh::refresh(ctx).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, code = e.error_code(), "refresh after transition failed");
            false
        }
    };
    Ok(TransitionOutcome::Applied { refreshed })
}

/// The record as it is on the board, or a stub carrying only its id.
fn dragged_record(ctx: &BoardContext, side: BoardSide, id: &str) -> Record {
    let state = ctx.store.snapshot();
    if let Some(record) = state.find_record(side, id) {
        return record.clone();
    }
    let mut fields = Data::new();
    if let Some(metadata) = ctx.config.metadata(side) {
        fields.insert(metadata.primary_id_attribute.clone(), Value::String(id.to_string()));
    }
    Record::new(fields)
}

/// Patch moving a record into the lane of `target`.
///
/// The status attribute is paired with its state: `statecode` follows the
/// option's state, or null when the option carries none.
#[must_use]
pub fn transition_patch(separator: &Attribute, target: &LaneOption) -> Data {
    let mut patch = Data::new();
    patch.insert(separator.logical_name.clone(), Value::from(target.value));
    if separator.is_status() {
        patch.insert(STATE_ATTRIBUTE.to_string(), target.state.map_or(Value::Null, Value::from));
    }
    patch
}

#[cfg(test)]
#[path = "transition_test.rs"]
mod tests;
