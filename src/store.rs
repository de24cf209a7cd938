//! Board state store: the single writable state container.
//!
//! DESIGN
//! ======
//! `reduce` is a pure function from `(state, action)` to the next state.
//! [`BoardStore`] holds the current snapshot in a `tokio::sync::watch`
//! channel: `dispatch` is the only writer, any number of readers subscribe
//! and always see the latest snapshot. Services never hold a mutable
//! reference to the state; they do their I/O, then dispatch the result.
//!
//! Actions that cross a process or language boundary arrive as
//! `{ "type": ..., "payload": ... }`. Names outside the closed action set
//! fail fast with `UnknownAction` instead of being ignored.
//!
//! LIFECYCLE
//! =========
//! The store is created empty at mount. After `unmount` every dispatch is
//! discarded, so late async results cannot write into a dead board.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::config::{BoardConfig, BoardSide};
use crate::error::ErrorCode;
use crate::lanes::Lane;
use crate::metadata::{Attribute, Metadata};
use crate::record::{Notification, Record, Subscription};
use crate::view::{CardForm, SavedQuery, ViewData};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid payload for {action}: {message}")]
    InvalidPayload { action: String, message: String },
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownAction(_) => "E_UNKNOWN_ACTION",
            Self::InvalidPayload { .. } => "E_INVALID_PAYLOAD",
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Record shown in the side panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedRecord {
    pub entity_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pub config: Option<Arc<BoardConfig>>,
    pub metadata: Option<Arc<Metadata>>,
    pub secondary_metadata: Option<Arc<Metadata>>,
    pub separator_metadata: Option<Arc<Attribute>>,
    pub secondary_separator_metadata: Option<Arc<Attribute>>,
    pub selected_record: Option<SelectedRecord>,
    pub selected_view: Option<Arc<SavedQuery>>,
    pub selected_view_data: ViewData,
    pub selected_secondary_view: Option<Arc<SavedQuery>>,
    pub selected_secondary_view_data: ViewData,
    pub selected_form: Option<Arc<CardForm>>,
    pub selected_secondary_form: Option<Arc<CardForm>>,
    /// Lanes are shared between snapshots; only `SetBoardData` replaces them.
    pub board_data: Arc<Vec<Lane>>,
    pub secondary_data: Option<Arc<Vec<Lane>>>,
    pub subscriptions: Vec<Subscription>,
    pub notifications: Vec<Notification>,
    pub secondary_subscriptions: Vec<Subscription>,
    pub secondary_notifications: Vec<Notification>,
    /// Busy flag. Advisory: nothing rejects work while it is set.
    pub work_indicator: bool,
    pub progress_text: Option<String>,
}

impl BoardState {
    #[must_use]
    pub fn lanes(&self, side: BoardSide) -> &[Lane] {
        match side {
            BoardSide::Primary => &self.board_data,
            BoardSide::Secondary => self.secondary_data.as_deref().map_or(&[][..], Vec::as_slice),
        }
    }

    #[must_use]
    pub fn metadata(&self, side: BoardSide) -> Option<&Arc<Metadata>> {
        match side {
            BoardSide::Primary => self.metadata.as_ref(),
            BoardSide::Secondary => self.secondary_metadata.as_ref(),
        }
    }

    #[must_use]
    pub fn subscriptions(&self, side: BoardSide) -> &[Subscription] {
        match side {
            BoardSide::Primary => &self.subscriptions,
            BoardSide::Secondary => &self.secondary_subscriptions,
        }
    }

    #[must_use]
    pub fn notifications(&self, side: BoardSide) -> &[Notification] {
        match side {
            BoardSide::Primary => &self.notifications,
            BoardSide::Secondary => &self.secondary_notifications,
        }
    }

    /// Find a record on the board by normalized id.
    #[must_use]
    pub fn find_record(&self, side: BoardSide, id: &str) -> Option<&Record> {
        let metadata = self.metadata(side)?;
        self.lanes(side)
            .iter()
            .flat_map(|lane| &lane.data)
            .find(|r| r.id(metadata).as_deref() == Some(id))
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

/// Closed set of state transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Action {
    SetConfig(BoardConfig),
    SetMetadata(Metadata),
    SetSecondaryMetadata(Metadata),
    SetSeparatorMetadata(Attribute),
    SetSecondarySeparatorMetadata(Attribute),
    SetSelectedView(SavedQuery),
    SetSelectedSecondaryView(SavedQuery),
    SetSelectedForm(CardForm),
    SetSelectedSecondaryForm(CardForm),
    SetBoardData(Vec<Lane>),
    SetSecondaryData(Vec<Lane>),
    SetSelectedRecord(Option<SelectedRecord>),
    SetProgressText(String),
    SetSubscriptions(Vec<Subscription>),
    SetNotifications(Vec<Notification>),
    SetSecondarySubscriptions(Vec<Subscription>),
    SetSecondaryNotifications(Vec<Notification>),
    SetWorkIndicator(bool),
}

/// Every wire name accepted by [`Action::from_raw`].
pub const ACTION_NAMES: &[&str] = &[
    "setConfig",
    "setMetadata",
    "setSecondaryMetadata",
    "setSeparatorMetadata",
    "setSecondarySeparatorMetadata",
    "setSelectedView",
    "setSelectedSecondaryView",
    "setSelectedForm",
    "setSelectedSecondaryForm",
    "setBoardData",
    "setSecondaryData",
    "setSelectedRecord",
    "setProgressText",
    "setSubscriptions",
    "setNotifications",
    "setSecondarySubscriptions",
    "setSecondaryNotifications",
    "setWorkIndicator",
];

/// Action in its external `{ type, payload }` form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Action {
    /// Decode an external action.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAction` for names outside the action set and
    /// `InvalidPayload` when the payload does not match the action.
    pub fn from_raw(raw: RawAction) -> Result<Self, StoreError> {
        if !ACTION_NAMES.contains(&raw.kind.as_str()) {
            return Err(StoreError::UnknownAction(raw.kind));
        }
        let tagged = serde_json::json!({ "type": raw.kind, "payload": raw.payload });
        serde_json::from_value(tagged)
            .map_err(|e| StoreError::InvalidPayload { action: raw.kind, message: e.to_string() })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetConfig(_) => "setConfig",
            Self::SetMetadata(_) => "setMetadata",
            Self::SetSecondaryMetadata(_) => "setSecondaryMetadata",
            Self::SetSeparatorMetadata(_) => "setSeparatorMetadata",
            Self::SetSecondarySeparatorMetadata(_) => "setSecondarySeparatorMetadata",
            Self::SetSelectedView(_) => "setSelectedView",
            Self::SetSelectedSecondaryView(_) => "setSelectedSecondaryView",
            Self::SetSelectedForm(_) => "setSelectedForm",
            Self::SetSelectedSecondaryForm(_) => "setSelectedSecondaryForm",
            Self::SetBoardData(_) => "setBoardData",
            Self::SetSecondaryData(_) => "setSecondaryData",
            Self::SetSelectedRecord(_) => "setSelectedRecord",
            Self::SetProgressText(_) => "setProgressText",
            Self::SetSubscriptions(_) => "setSubscriptions",
            Self::SetNotifications(_) => "setNotifications",
            Self::SetSecondarySubscriptions(_) => "setSecondarySubscriptions",
            Self::SetSecondaryNotifications(_) => "setSecondaryNotifications",
            Self::SetWorkIndicator(_) => "setWorkIndicator",
        }
    }
}

/// Apply one action. Pure and total over [`Action`].
#[must_use]
pub fn reduce(state: &BoardState, action: Action) -> BoardState {
    let mut next = state.clone();
    match action {
        Action::SetConfig(config) => next.config = Some(Arc::new(config)),
        Action::SetMetadata(m) => next.metadata = Some(Arc::new(m)),
        Action::SetSecondaryMetadata(m) => next.secondary_metadata = Some(Arc::new(m)),
        Action::SetSeparatorMetadata(a) => next.separator_metadata = Some(Arc::new(a)),
        Action::SetSecondarySeparatorMetadata(a) => next.secondary_separator_metadata = Some(Arc::new(a)),
        Action::SetSelectedView(view) => {
            next.selected_view_data = ViewData::from_query(&view);
            next.selected_view = Some(Arc::new(view));
        }
        Action::SetSelectedSecondaryView(view) => {
            next.selected_secondary_view_data = ViewData::from_query(&view);
            next.selected_secondary_view = Some(Arc::new(view));
        }
        Action::SetSelectedForm(form) => next.selected_form = Some(Arc::new(form)),
        Action::SetSelectedSecondaryForm(form) => next.selected_secondary_form = Some(Arc::new(form)),
        Action::SetBoardData(lanes) => next.board_data = Arc::new(lanes),
        Action::SetSecondaryData(lanes) => next.secondary_data = Some(Arc::new(lanes)),
        Action::SetSelectedRecord(selected) => next.selected_record = selected,
        Action::SetProgressText(text) => next.progress_text = Some(text),
        Action::SetSubscriptions(s) => next.subscriptions = s,
        Action::SetNotifications(n) => next.notifications = n,
        Action::SetSecondarySubscriptions(s) => next.secondary_subscriptions = s,
        Action::SetSecondaryNotifications(n) => next.secondary_notifications = n,
        Action::SetWorkIndicator(working) => next.work_indicator = working,
    }
    next
}

// =============================================================================
// STORE
// =============================================================================

struct StoreInner {
    tx: watch::Sender<Arc<BoardState>>,
    mounted: AtomicBool,
}

/// Handle to the board state. Clones share the same state.
#[derive(Clone)]
pub struct BoardStore {
    inner: Arc<StoreInner>,
}

impl BoardStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(BoardState::default()));
        Self { inner: Arc::new(StoreInner { tx, mounted: AtomicBool::new(true) }) }
    }

    /// Apply an action to the latest state. Returns false when the board is
    /// unmounted and the action was discarded.
    pub fn dispatch(&self, action: Action) -> bool {
        if !self.is_mounted() {
            debug!(action = action.name(), "dispatch after unmount discarded");
            return false;
        }
        debug!(action = action.name(), "dispatch");
        self.inner.tx.send_modify(|current| {
            let next = reduce(current, action);
            *current = Arc::new(next);
        });
        true
    }

    /// Decode and apply an external action.
    ///
    /// # Errors
    ///
    /// Returns the decode error from [`Action::from_raw`]; state is untouched.
    pub fn dispatch_raw(&self, raw: RawAction) -> Result<bool, StoreError> {
        let action = Action::from_raw(raw)?;
        Ok(self.dispatch(action))
    }

    /// Latest state snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BoardState> {
        self.inner.tx.borrow().clone()
    }

    /// Receiver that observes every future snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardState>> {
        self.inner.tx.subscribe()
    }

    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }
}

impl Default for BoardStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
