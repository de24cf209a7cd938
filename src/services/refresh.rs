//! Board loading and refresh.
//!
//! DESIGN
//! ======
//! `load_board` publishes the static part of the board (config, metadata,
//! default views and forms) and then runs a `refresh`. A refresh fetches
//! the primary records, partitions them into lanes, then fetches the
//! secondary records whose parent is on the board, and finally the
//! follow markers of both sides. Every stage is published as soon as it is
//! ready so the host can render incrementally.

use serde_json::Value;
use tracing::{debug, info};

use crate::config::BoardSide;
use crate::error::ErrorCode;
use crate::lanes::partition_for_entity;
use crate::record::{Record, lookup_value_key};
use crate::record_store::{RecordQuery, RecordStoreError};
use crate::services::follow;
use crate::state::BoardContext;
use crate::store::{Action, BoardState};

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("no {0:?} entity configured")]
    EntityNotConfigured(BoardSide),
    #[error("metadata missing for {0}")]
    MissingMetadata(String),
    #[error("fetch failed: {0}")]
    Fetch(#[from] RecordStoreError),
}

impl ErrorCode for RefreshError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EntityNotConfigured(_) => "E_ENTITY_NOT_CONFIGURED",
            Self::MissingMetadata(_) => "E_MISSING_METADATA",
            Self::Fetch(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// LOAD
// =============================================================================

/// Publish configuration, metadata, default views and forms, then refresh.
///
/// # Errors
///
/// Returns the first fetch error from [`refresh`].
pub async fn load_board(ctx: &BoardContext) -> Result<(), RefreshError> {
    let store = &ctx.store;
    store.dispatch(Action::SetConfig((**ctx.config.config()).clone()));

    for side in [BoardSide::Primary, BoardSide::Secondary] {
        if ctx.config.entity(side).is_none() {
            continue;
        }
        let metadata = ctx
            .config
            .metadata(side)
            .ok_or_else(|| RefreshError::MissingMetadata(format!("{side:?}")))?;
        let separator = ctx.config.separator(side).cloned();
        let view = ctx.config.default_view(side).cloned();
        let form = ctx.config.default_form(side).cloned();

        match side {
            BoardSide::Primary => {
                store.dispatch(Action::SetMetadata((**metadata).clone()));
                if let Some(separator) = separator {
                    store.dispatch(Action::SetSeparatorMetadata(separator));
                }
                if let Some(view) = view {
                    store.dispatch(Action::SetSelectedView(view));
                }
                if let Some(form) = form {
                    store.dispatch(Action::SetSelectedForm(form));
                }
            }
            BoardSide::Secondary => {
                store.dispatch(Action::SetSecondaryMetadata((**metadata).clone()));
                if let Some(separator) = separator {
                    store.dispatch(Action::SetSecondarySeparatorMetadata(separator));
                }
                if let Some(view) = view {
                    store.dispatch(Action::SetSelectedSecondaryView(view));
                }
                if let Some(form) = form {
                    store.dispatch(Action::SetSelectedSecondaryForm(form));
                }
            }
        }
    }

    refresh(ctx).await
}

// =============================================================================
// REFRESH
// =============================================================================

/// Re-fetch and re-partition both sides, then reload follow markers.
///
/// # Errors
///
/// Returns `Fetch` when the record store fails; lanes published before the
/// failing stage stay published.
pub async fn refresh(ctx: &BoardContext) -> Result<(), RefreshError> {
    let state = ctx.store.snapshot();

    let primary_ids = refresh_primary(ctx, &state).await?;
    if ctx.config.config().secondary_entity.is_some() {
        refresh_secondary(ctx, &state, &primary_ids).await?;
    }

    ctx.store.dispatch(Action::SetProgressText("Loading follow status".into()));
    follow::reload_markers(ctx, BoardSide::Primary).await?;
    if ctx.config.config().secondary_entity.is_some() {
        follow::reload_markers(ctx, BoardSide::Secondary).await?;
    }

    let count: usize = ctx.store.snapshot().board_data.iter().map(|l| l.data.len()).sum();
    ctx.store.dispatch(Action::SetProgressText(format!("{count} records loaded")));
    Ok(())
}

async fn refresh_primary(ctx: &BoardContext, state: &BoardState) -> Result<Vec<String>, RefreshError> {
    let side = BoardSide::Primary;
    let entity = ctx.config.entity(side).ok_or(RefreshError::EntityNotConfigured(side))?;
    let metadata = ctx
        .config
        .metadata(side)
        .ok_or_else(|| RefreshError::MissingMetadata(entity.logical_name.clone()))?;
    let separator = ctx
        .config
        .separator(side)
        .ok_or_else(|| RefreshError::MissingMetadata(entity.swim_lane_source.clone()))?;

    ctx.store.dispatch(Action::SetProgressText(format!("Loading {}", metadata.label())));
    let query = side_query(ctx, side, state);
    let records = ctx.records.fetch(&entity.logical_name, &query).await?;
    let ids: Vec<String> = records.iter().filter_map(|r| r.id(metadata)).collect();

    let lanes = partition_for_entity(&records, separator, entity);
    info!(entity = %entity.logical_name, records = records.len(), lanes = lanes.len(), "board data refreshed");
    ctx.store.dispatch(Action::SetBoardData(lanes));
    Ok(ids)
}

async fn refresh_secondary(ctx: &BoardContext, state: &BoardState, parent_ids: &[String]) -> Result<(), RefreshError> {
    let side = BoardSide::Secondary;
    let entity = ctx.config.entity(side).ok_or(RefreshError::EntityNotConfigured(side))?;
    let metadata = ctx
        .config
        .metadata(side)
        .ok_or_else(|| RefreshError::MissingMetadata(entity.logical_name.clone()))?;
    let separator = ctx
        .config
        .separator(side)
        .ok_or_else(|| RefreshError::MissingMetadata(entity.swim_lane_source.clone()))?;
    let parent_key = ctx.config.parent_lookup().map(lookup_value_key).unwrap_or_default();

    let records: Vec<Record> = if parent_ids.is_empty() {
        debug!(entity = %entity.logical_name, "no parents on the board, skipping secondary fetch");
        Vec::new()
    } else {
        ctx.store.dispatch(Action::SetProgressText(format!("Loading {}", metadata.label())));
        let values = parent_ids.iter().cloned().map(Value::String).collect();
        let query = side_query(ctx, side, state)
            .with_column(parent_key.clone())
            .with_condition(parent_key, values);
        ctx.records.fetch(&entity.logical_name, &query).await?
    };

    let lanes = partition_for_entity(&records, separator, entity);
    info!(entity = %entity.logical_name, records = records.len(), "secondary data refreshed");
    ctx.store.dispatch(Action::SetSecondaryData(lanes));
    Ok(())
}

/// Query for one side: the selected view's fetchXml and columns, the card
/// form's cells, plus the attributes the board itself needs.
fn side_query(ctx: &BoardContext, side: BoardSide, state: &BoardState) -> RecordQuery {
    let (view, view_data, form) = match side {
        BoardSide::Primary => (state.selected_view.as_ref(), &state.selected_view_data, state.selected_form.as_ref()),
        BoardSide::Secondary => (
            state.selected_secondary_view.as_ref(),
            &state.selected_secondary_view_data,
            state.selected_secondary_form.as_ref(),
        ),
    };

    let mut query = RecordQuery {
        fetch_xml: view.map(|v| v.fetch_xml.clone()).filter(|x| !x.trim().is_empty()),
        ..RecordQuery::default()
    };
    for column in &view_data.columns {
        query = query.with_column(column.clone());
    }
    for column in form.map(|f| f.columns()).unwrap_or_default() {
        query = query.with_column(column);
    }
    if let Some(metadata) = ctx.config.metadata(side) {
        query = query
            .with_column(metadata.primary_id_attribute.clone())
            .with_column(metadata.primary_name_attribute.clone());
    }
    if let Some(entity) = ctx.config.entity(side) {
        query = query.with_column(entity.swim_lane_source.clone());
    }
    query
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
