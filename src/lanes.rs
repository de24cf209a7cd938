//! Lane partitioning: group a flat record set into ordered lanes.
//!
//! DESIGN
//! ======
//! Lane order is the separator's option-set order filtered by the entity's
//! hidden/visible lists; input record order only decides the order inside a
//! lane. Partitioning is pure and allocation-bounded by the record count.

use serde::{Deserialize, Serialize};

use crate::config::BoardEntity;
use crate::metadata::{Attribute, LaneOption};
use crate::record::Record;

/// One column of the board. A lane without option is the fallback lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub option: Option<LaneOption>,
    pub data: Vec<Record>,
}

impl Lane {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.option.is_none()
    }

    /// Stable key for the lane, `"fallback"` for the option-less lane.
    #[must_use]
    pub fn key(&self) -> String {
        self.option.as_ref().map_or_else(|| "fallback".to_string(), |o| o.value.to_string())
    }
}

fn lane_is_shown(value: i64, hidden: &[i64], visible: &[i64]) -> bool {
    !hidden.contains(&value) && (visible.is_empty() || visible.contains(&value))
}

/// Partition records into one lane per shown option, in option order.
///
/// Records whose separator value matches no shown option are excluded.
#[must_use]
pub fn partition(records: &[Record], separator: &Attribute, hidden: &[i64], visible: &[i64]) -> Vec<Lane> {
    separator
        .option_set
        .iter()
        .filter(|option| lane_is_shown(option.value, hidden, visible))
        .map(|option| Lane {
            option: Some(option.clone()),
            data: records
                .iter()
                .filter(|r| r.option_value(&separator.logical_name) == Some(option.value))
                .cloned()
                .collect(),
        })
        .collect()
}

/// Partition with the entity's lane filters and optional fallback lane.
///
/// The fallback lane collects records whose separator value matches no option
/// of the set at all; records in hidden lanes stay hidden.
#[must_use]
pub fn partition_for_entity(records: &[Record], separator: &Attribute, entity: &BoardEntity) -> Vec<Lane> {
    let mut lanes = partition(records, separator, &entity.hidden_lanes, &entity.visible_lanes);
    if entity.fallback_lane {
        let data: Vec<Record> = records
            .iter()
            .filter(|r| {
                r.option_value(&separator.logical_name)
                    .and_then(|v| separator.option(v))
                    .is_none()
            })
            .cloned()
            .collect();
        lanes.push(Lane { option: None, data });
    }
    lanes
}

/// Secondary lanes nested in one primary tile: same lanes, data narrowed to
/// the records whose parent lookup points at `parent_id`.
#[must_use]
pub fn lanes_for_parent(lanes: &[Lane], parent_lookup: &str, parent_id: &str) -> Vec<Lane> {
    lanes
        .iter()
        .map(|lane| Lane {
            option: lane.option.clone(),
            data: lane
                .data
                .iter()
                .filter(|r| r.lookup_id(parent_lookup).as_deref() == Some(parent_id))
                .cloned()
                .collect(),
        })
        .collect()
}

#[cfg(test)]
#[path = "lanes_test.rs"]
mod tests;
