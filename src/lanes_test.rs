use super::*;
use serde_json::json;

fn status() -> Attribute {
    Attribute::new(
        "status",
        vec![LaneOption::new(1, "Open"), LaneOption::new(2, "Done"), LaneOption::new(3, "Parked")],
    )
}

fn rec(id: &str, status: i64) -> Record {
    Record::from_value(json!({"id": id, "status": status}))
}

fn ids(lane: &Lane) -> Vec<&str> {
    lane.data
        .iter()
        .map(|r| r.get("id").and_then(|v| v.as_str()).unwrap())
        .collect()
}

#[test]
fn two_records_two_lanes() {
    let attr = Attribute::new("status", vec![LaneOption::new(1, "Open"), LaneOption::new(2, "Done")]);
    let lanes = partition(&[rec("1", 1), rec("2", 2)], &attr, &[], &[]);
    assert_eq!(lanes.len(), 2);
    assert_eq!(lanes[0].option.as_ref().unwrap().label, "Open");
    assert_eq!(ids(&lanes[0]), vec!["1"]);
    assert_eq!(lanes[1].option.as_ref().unwrap().label, "Done");
    assert_eq!(ids(&lanes[1]), vec!["2"]);
}

#[test]
fn empty_lanes_are_kept() {
    let lanes = partition(&[rec("1", 1)], &status(), &[], &[]);
    assert_eq!(lanes.len(), 3);
    assert!(lanes[1].data.is_empty());
    assert!(lanes[2].data.is_empty());
}

#[test]
fn fetch_order_is_preserved_within_lane() {
    let lanes = partition(&[rec("b", 1), rec("a", 1), rec("c", 1)], &status(), &[], &[]);
    assert_eq!(ids(&lanes[0]), vec!["b", "a", "c"]);
}

#[test]
fn lane_order_ignores_record_order() {
    let forward = partition(&[rec("1", 3), rec("2", 1)], &status(), &[], &[]);
    let backward = partition(&[rec("2", 1), rec("1", 3)], &status(), &[], &[]);
    let keys = |lanes: &[Lane]| lanes.iter().map(Lane::key).collect::<Vec<_>>();
    assert_eq!(keys(&forward), vec!["1", "2", "3"]);
    assert_eq!(keys(&forward), keys(&backward));
}

#[test]
fn hidden_lanes_are_skipped_with_their_records() {
    let lanes = partition(&[rec("1", 1), rec("2", 2)], &status(), &[2], &[]);
    assert_eq!(lanes.iter().map(Lane::key).collect::<Vec<_>>(), vec!["1", "3"]);
    assert!(lanes.iter().all(|l| ids(l) != vec!["2"]));
}

#[test]
fn visible_list_restricts_lanes() {
    let lanes = partition(&[rec("1", 1), rec("2", 2), rec("3", 3)], &status(), &[], &[3, 1]);
    assert_eq!(lanes.iter().map(Lane::key).collect::<Vec<_>>(), vec!["1", "3"]);
}

#[test]
fn hidden_wins_over_visible() {
    let lanes = partition(&[], &status(), &[1], &[1, 2]);
    assert_eq!(lanes.iter().map(Lane::key).collect::<Vec<_>>(), vec!["2"]);
}

#[test]
fn every_record_lands_in_at_most_one_lane() {
    let records: Vec<Record> = (0..30).map(|i| rec(&i.to_string(), i % 5)).collect();
    let lanes = partition(&records, &status(), &[3], &[]);
    let placed: usize = lanes.iter().map(|l| l.data.len()).sum();
    let expected = records
        .iter()
        .filter(|r| matches!(r.option_value("status"), Some(1 | 2)))
        .count();
    assert_eq!(placed, expected);
}

#[test]
fn unmatched_records_are_dropped_without_fallback() {
    let entity = BoardEntity::new("task", "status");
    let lanes = partition_for_entity(&[rec("1", 9), rec("2", 1)], &status(), &entity);
    assert_eq!(lanes.len(), 3);
    assert_eq!(lanes.iter().map(|l| l.data.len()).sum::<usize>(), 1);
}

#[test]
fn fallback_lane_collects_unmatched_records() {
    let mut entity = BoardEntity::new("task", "status");
    entity.fallback_lane = true;
    entity.hidden_lanes = vec![2];
    let missing = Record::from_value(json!({"id": "4"}));
    let lanes = partition_for_entity(&[rec("1", 9), rec("2", 2), rec("3", 1), missing], &status(), &entity);
    let fallback = lanes.last().unwrap();
    assert!(fallback.is_fallback());
    assert_eq!(fallback.key(), "fallback");
    assert_eq!(ids(fallback), vec!["1", "4"]);
    // hidden lane records do not leak into the fallback lane
    assert!(lanes.iter().all(|l| !ids(l).contains(&"2")));
}

#[test]
fn lanes_for_parent_narrows_data() {
    let child = |id: &str, parent: &str, status: i64| {
        Record::from_value(json!({"id": id, "status": status, "_parentid_value": parent}))
    };
    let lanes = partition(
        &[child("a", "{P1}", 1), child("b", "p2", 1), child("c", "p1", 2)],
        &status(),
        &[],
        &[],
    );
    let nested = lanes_for_parent(&lanes, "parentid", "p1");
    assert_eq!(nested.len(), 3);
    assert_eq!(ids(&nested[0]), vec!["a"]);
    assert_eq!(ids(&nested[1]), vec!["c"]);
    assert!(nested[2].data.is_empty());
}
