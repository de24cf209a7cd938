//! Follow service: subscriptions and notifications on board records.
//!
//! DESIGN
//! ======
//! Following a record creates an `oss_subscription` row whose lookup
//! points at the record; unread updates are `oss_notification` rows with
//! the same shape. Which lookup column links a marker to the record is
//! configured per entity (`subscriptionLookup`, `notificationLookup`).
//!
//! Every operation re-fetches the markers of the affected side and
//! dispatches them, so the board never shows locally guessed state.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BoardSide;
use crate::error::ErrorCode;
use crate::record::{Data, Notification, Record, Subscription, lookup_bind, lookup_value_key, normalize_id};
use crate::record_store::{RecordQuery, RecordStoreError};
use crate::state::BoardContext;
use crate::store::Action;

pub const SUBSCRIPTION_ENTITY: &str = "oss_subscription";
pub const NOTIFICATION_ENTITY: &str = "oss_notification";

#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    #[error("no {0:?} entity configured")]
    EntityNotConfigured(BoardSide),
    #[error("{entity} has no {kind} lookup configured")]
    LookupNotConfigured { entity: String, kind: &'static str },
    #[error(transparent)]
    RecordStore(#[from] RecordStoreError),
}

impl ErrorCode for FollowError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EntityNotConfigured(_) => "E_ENTITY_NOT_CONFIGURED",
            Self::LookupNotConfigured { .. } => "E_LOOKUP_NOT_CONFIGURED",
            Self::RecordStore(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::RecordStore(e) => e.retryable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Subscription,
    Notification,
}

impl Marker {
    fn entity(self) -> &'static str {
        match self {
            Self::Subscription => SUBSCRIPTION_ENTITY,
            Self::Notification => NOTIFICATION_ENTITY,
        }
    }

    fn kind(self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Notification => "notification",
        }
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Follow a record.
///
/// # Errors
///
/// Returns `LookupNotConfigured` when the side has no subscription lookup,
/// or the record store error. The work indicator is cleared either way.
pub async fn subscribe(ctx: &BoardContext, side: BoardSide, record_id: &str) -> Result<(), FollowError> {
    let lookup = marker_lookup(ctx, side, Marker::Subscription)?;
    let collection = ctx
        .config
        .metadata(side)
        .map(|m| m.logical_collection_name.clone())
        .ok_or(FollowError::EntityNotConfigured(side))?;

    ctx.store.dispatch(Action::SetWorkIndicator(true));
    let result = create_subscription(ctx, side, &lookup, &collection, record_id).await;
    finish(ctx, result)
}

/// Stop following a record: delete every subscription pointing at it.
///
/// # Errors
///
/// As [`subscribe`].
pub async fn unsubscribe(ctx: &BoardContext, side: BoardSide, record_id: &str) -> Result<(), FollowError> {
    delete_markers(ctx, side, Marker::Subscription, record_id).await
}

/// Mark a record's updates as read: delete its notifications.
///
/// # Errors
///
/// Returns `LookupNotConfigured` when the side has no notification lookup,
/// or the record store error.
pub async fn clear_notifications(ctx: &BoardContext, side: BoardSide, record_id: &str) -> Result<(), FollowError> {
    delete_markers(ctx, side, Marker::Notification, record_id).await
}

async fn delete_markers(ctx: &BoardContext, side: BoardSide, marker: Marker, record_id: &str) -> Result<(), FollowError> {
    let lookup = marker_lookup(ctx, side, marker)?;

    ctx.store.dispatch(Action::SetWorkIndicator(true));
    let result = remove_markers(ctx, side, marker, &lookup, record_id).await;
    finish(ctx, result)
}

async fn create_subscription(
    ctx: &BoardContext,
    side: BoardSide,
    lookup: &str,
    collection: &str,
    record_id: &str,
) -> Result<(), FollowError> {
    let (key, value) = lookup_bind(lookup, collection, record_id);
    let mut attributes = Data::new();
    attributes.insert(key, value);
    let id = ctx.records.create(SUBSCRIPTION_ENTITY, &attributes).await?;
    info!(subscription = %id, record = %normalize_id(record_id), "record followed");
    reload_markers(ctx, side).await?;
    Ok(())
}

async fn remove_markers(
    ctx: &BoardContext,
    side: BoardSide,
    marker: Marker,
    lookup: &str,
    record_id: &str,
) -> Result<(), FollowError> {
    let rows = fetch_markers(ctx, marker, lookup, &[normalize_id(record_id)]).await?;
    for (id, _) in &rows {
        ctx.records.delete(marker.entity(), id).await?;
    }
    info!(kind = marker.kind(), record = %normalize_id(record_id), deleted = rows.len(), "markers removed");
    reload_markers(ctx, side).await?;
    Ok(())
}

/// Clear the work indicator and log the failure, if any.
fn finish(ctx: &BoardContext, result: Result<(), FollowError>) -> Result<(), FollowError> {
    ctx.store.dispatch(Action::SetWorkIndicator(false));
    if let Err(e) = &result {
        warn!(error = %e, code = e.error_code(), "follow operation failed");
    }
    result
}

fn marker_lookup(ctx: &BoardContext, side: BoardSide, marker: Marker) -> Result<String, FollowError> {
    let entity = ctx.config.entity(side).ok_or(FollowError::EntityNotConfigured(side))?;
    let lookup = match marker {
        Marker::Subscription => entity.subscription_lookup.as_ref(),
        Marker::Notification => entity.notification_lookup.as_ref(),
    };
    lookup.cloned().ok_or_else(|| FollowError::LookupNotConfigured {
        entity: entity.logical_name.clone(),
        kind: marker.kind(),
    })
}

// =============================================================================
// MARKER FETCH
// =============================================================================

/// Re-fetch subscriptions and notifications for the records currently on
/// one side of the board and dispatch them. Sides without a lookup get an
/// empty list.
///
/// # Errors
///
/// Returns the record store error; nothing is dispatched for the failing marker.
pub async fn reload_markers(ctx: &BoardContext, side: BoardSide) -> Result<(), RecordStoreError> {
    let Some(entity) = ctx.config.entity(side) else {
        return Ok(());
    };
    let ids = board_ids(ctx, side);

    let subscriptions: Vec<Subscription> = match &entity.subscription_lookup {
        Some(lookup) => fetch_markers(ctx, Marker::Subscription, lookup, &ids)
            .await?
            .into_iter()
            .map(|(id, lookup_value)| Subscription { id, lookup_value })
            .collect(),
        None => Vec::new(),
    };
    let notifications: Vec<Notification> = match &entity.notification_lookup {
        Some(lookup) => fetch_markers(ctx, Marker::Notification, lookup, &ids)
            .await?
            .into_iter()
            .map(|(id, lookup_value)| Notification { id, lookup_value })
            .collect(),
        None => Vec::new(),
    };

    debug!(?side, subscriptions = subscriptions.len(), notifications = notifications.len(), "markers reloaded");
    match side {
        BoardSide::Primary => {
            ctx.store.dispatch(Action::SetSubscriptions(subscriptions));
            ctx.store.dispatch(Action::SetNotifications(notifications));
        }
        BoardSide::Secondary => {
            ctx.store.dispatch(Action::SetSecondarySubscriptions(subscriptions));
            ctx.store.dispatch(Action::SetSecondaryNotifications(notifications));
        }
    }
    Ok(())
}

/// Normalized ids of every record on one side of the board.
fn board_ids(ctx: &BoardContext, side: BoardSide) -> Vec<String> {
    let state = ctx.store.snapshot();
    let Some(metadata) = state.metadata(side).or_else(|| ctx.config.metadata(side)) else {
        return Vec::new();
    };
    state
        .lanes(side)
        .iter()
        .flat_map(|lane| &lane.data)
        .filter_map(|r| r.id(metadata))
        .collect()
}

/// `(marker id, record id)` pairs for markers pointing at any of `ids`.
async fn fetch_markers(
    ctx: &BoardContext,
    marker: Marker,
    lookup: &str,
    ids: &[String],
) -> Result<Vec<(String, String)>, RecordStoreError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let key = lookup_value_key(lookup);
    let id_attribute = ctx
        .config
        .metadata_for(marker.entity())
        .map_or_else(|| format!("{}id", marker.entity()), |m| m.primary_id_attribute.clone());
    let query = RecordQuery::all()
        .with_column(id_attribute.clone())
        .with_column(key.clone())
        .with_condition(key, ids.iter().cloned().map(Value::String).collect());

    let rows = ctx.records.fetch(marker.entity(), &query).await?;
    Ok(rows.iter().filter_map(|r| marker_pair(r, &id_attribute, lookup)).collect())
}

fn marker_pair(row: &Record, id_attribute: &str, lookup: &str) -> Option<(String, String)> {
    let id = row.get(id_attribute).and_then(Value::as_str).map(normalize_id)?;
    let lookup_value = row.lookup_id(lookup)?;
    Some((id, lookup_value))
}

#[cfg(test)]
#[path = "follow_test.rs"]
mod tests;
