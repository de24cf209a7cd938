//! Tile re-render gate.
//!
//! DESIGN
//! ======
//! A tile embeds the secondary lanes of its record, so recomputing one is
//! expensive. [`should_skip_rerender`] decides whether a tile's inputs are
//! unchanged: shared configuration is compared by identity, markers by
//! count, and records by content fingerprint. It is a cache heuristic, not
//! deep equality; two distinct records with equal fields are the same tile.
//!
//! [`TileTracker`] applies the gate to a whole board snapshot and reports
//! which tiles need recomputing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::BoardSide;
use crate::lanes::{Lane, lanes_for_parent};
use crate::metadata::{LaneOption, Metadata};
use crate::record::{Data, Notification, Record, Subscription};
use crate::store::BoardState;
use crate::view::CardForm;

/// Drag type of top-level tiles. Nested tiles use `tile_{parent id}`.
pub const TILE_DND_TYPE: &str = "tile";

/// Inputs that determine how one tile renders.
#[derive(Debug, Clone)]
pub struct TileProps {
    pub border_color: Option<String>,
    pub card_form: Option<Arc<CardForm>>,
    pub dnd_type: String,
    pub lane_option: Option<LaneOption>,
    pub metadata: Option<Arc<Metadata>>,
    pub search_text: String,
    pub style: Option<Arc<Data>>,
    pub notifications: Vec<Notification>,
    pub subscriptions: Vec<Subscription>,
    /// Secondary record id → its notifications.
    pub secondary_notifications: HashMap<String, Vec<Notification>>,
    /// Secondary record id → its subscriptions.
    pub secondary_subscriptions: HashMap<String, Vec<Subscription>>,
    pub secondary_data: Option<Vec<Lane>>,
    pub data: Record,
}

impl TileProps {
    /// Props of the tile showing `record` in the lane of `lane_option`.
    #[must_use]
    pub fn for_record(
        state: &BoardState,
        side: BoardSide,
        lane_option: Option<&LaneOption>,
        record: &Record,
        search_text: &str,
    ) -> Self {
        let metadata = state.metadata(side).cloned();
        let id = metadata.as_ref().and_then(|m| record.id(m)).unwrap_or_default();
        let (card_form, dnd_type) = match side {
            BoardSide::Primary => (state.selected_form.clone(), TILE_DND_TYPE.to_string()),
            BoardSide::Secondary => {
                let parent = parent_lookup(state).and_then(|lookup| record.lookup_id(lookup)).unwrap_or_default();
                (state.selected_secondary_form.clone(), nested_dnd_type(&parent))
            }
        };

        let mut props = Self {
            border_color: lane_option.and_then(|o| o.color.clone()),
            card_form,
            dnd_type,
            lane_option: lane_option.cloned(),
            metadata,
            search_text: search_text.to_string(),
            style: None,
            notifications: state
                .notifications(side)
                .iter()
                .filter(|n| n.lookup_value == id)
                .cloned()
                .collect(),
            subscriptions: state
                .subscriptions(side)
                .iter()
                .filter(|s| s.lookup_value == id)
                .cloned()
                .collect(),
            secondary_notifications: HashMap::new(),
            secondary_subscriptions: HashMap::new(),
            secondary_data: None,
            data: record.clone(),
        };

        if side == BoardSide::Primary {
            props.attach_secondary(state, &id);
        }
        props
    }

    fn attach_secondary(&mut self, state: &BoardState, parent_id: &str) {
        let (Some(parent_lookup), Some(lanes)) = (parent_lookup(state), state.secondary_data.as_deref()) else {
            return;
        };

        let nested = lanes_for_parent(lanes, parent_lookup, parent_id);
        let child_ids: HashSet<String> = match state.secondary_metadata.as_ref() {
            Some(metadata) => nested
                .iter()
                .flat_map(|lane| &lane.data)
                .filter_map(|r| r.id(metadata))
                .collect(),
            None => HashSet::new(),
        };

        for n in &state.secondary_notifications {
            if child_ids.contains(&n.lookup_value) {
                self.secondary_notifications.entry(n.lookup_value.clone()).or_default().push(n.clone());
            }
        }
        for s in &state.secondary_subscriptions {
            if child_ids.contains(&s.lookup_value) {
                self.secondary_subscriptions.entry(s.lookup_value.clone()).or_default().push(s.clone());
            }
        }
        self.secondary_data = Some(nested);
    }
}

fn parent_lookup(state: &BoardState) -> Option<&str> {
    state
        .config
        .as_ref()
        .and_then(|c| c.secondary_entity.as_ref())
        .map(|s| s.parent_lookup.as_str())
}

/// Drag type of tiles nested under `parent_id`, so they only drop into
/// the lanes of their own parent.
#[must_use]
pub fn nested_dnd_type(parent_id: &str) -> String {
    format!("{TILE_DND_TYPE}_{parent_id}")
}

// =============================================================================
// GATE
// =============================================================================

fn same_arc<T>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn flattened_len<T>(map: &HashMap<String, Vec<T>>) -> usize {
    map.values().map(Vec::len).sum()
}

fn same_lanes(a: &[Lane], b: &[Lane]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(la, lb)| {
            la.data.len() == lb.data.len() && la.data.iter().zip(&lb.data).all(|(ra, rb)| ra.same_content(rb))
        })
}

/// True when a tile rendered from `prev` can be reused for `next`.
#[must_use]
pub fn should_skip_rerender(prev: &TileProps, next: &TileProps) -> bool {
    if prev.border_color != next.border_color
        || !same_arc(prev.card_form.as_ref(), next.card_form.as_ref())
        || prev.dnd_type != next.dnd_type
        || prev.lane_option != next.lane_option
        || !same_arc(prev.metadata.as_ref(), next.metadata.as_ref())
        || prev.search_text != next.search_text
        || !same_arc(prev.style.as_ref(), next.style.as_ref())
    {
        return false;
    }

    if prev.notifications.len() != next.notifications.len()
        || prev.subscriptions.len() != next.subscriptions.len()
    {
        return false;
    }

    if flattened_len(&prev.secondary_notifications) != flattened_len(&next.secondary_notifications)
        || flattened_len(&prev.secondary_subscriptions) != flattened_len(&next.secondary_subscriptions)
    {
        return false;
    }

    let empty: &[Lane] = &[];
    if !same_lanes(
        prev.secondary_data.as_deref().unwrap_or(empty),
        next.secondary_data.as_deref().unwrap_or(empty),
    ) {
        return false;
    }

    prev.data.same_content(&next.data)
}

// =============================================================================
// TRACKER
// =============================================================================

/// Remembers the last props of every primary tile.
#[derive(Debug, Default)]
pub struct TileTracker {
    tiles: HashMap<String, TileProps>,
}

impl TileTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of the tiles that must be recomputed for `state`, in board order.
    /// Tiles no longer on the board are forgotten.
    pub fn diff(&mut self, state: &BoardState, search_text: &str) -> Vec<String> {
        let Some(metadata) = state.metadata.clone() else {
            self.tiles.clear();
            return Vec::new();
        };

        let mut changed = Vec::new();
        let mut next = HashMap::new();
        for lane in state.board_data.iter() {
            for record in &lane.data {
                let Some(id) = record.id(&metadata) else {
                    continue;
                };
                let props = TileProps::for_record(state, BoardSide::Primary, lane.option.as_ref(), record, search_text);
                let reuse = self.tiles.get(&id).is_some_and(|prev| should_skip_rerender(prev, &props));
                if !reuse {
                    changed.push(id.clone());
                }
                next.insert(id, props);
            }
        }
        self.tiles = next;
        changed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
