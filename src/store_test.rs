use super::*;
use crate::metadata::LaneOption;
use crate::state::test_helpers;
use serde_json::json;

fn open_lane() -> Lane {
    Lane {
        option: Some(LaneOption::new(1, "Open")),
        data: vec![Record::from_value(json!({"incidentid": "1", "title": "a", "statuscode": 1}))],
    }
}

// =============================================================================
// reduce
// =============================================================================

#[test]
fn default_state_is_empty() {
    let state = BoardState::default();
    assert!(state.config.is_none());
    assert!(state.board_data.is_empty());
    assert!(state.secondary_data.is_none());
    assert!(!state.work_indicator);
    assert!(state.progress_text.is_none());
}

#[test]
fn set_board_data_replaces_lanes() {
    let state = reduce(&BoardState::default(), Action::SetBoardData(vec![open_lane()]));
    assert_eq!(state.board_data.len(), 1);
    let state = reduce(&state, Action::SetBoardData(vec![]));
    assert!(state.board_data.is_empty());
}

#[test]
fn reduce_leaves_previous_state_untouched() {
    let before = BoardState::default();
    let after = reduce(&before, Action::SetWorkIndicator(true));
    assert!(!before.work_indicator);
    assert!(after.work_indicator);
}

#[test]
fn unrelated_actions_share_lanes() {
    let state = reduce(&BoardState::default(), Action::SetBoardData(vec![open_lane()]));
    let state = reduce(&state, Action::SetSecondaryData(vec![open_lane()]));
    let next = reduce(&state, Action::SetWorkIndicator(true));
    let next = reduce(&next, Action::SetProgressText("1 records loaded".into()));
    assert!(Arc::ptr_eq(&state.board_data, &next.board_data));
    assert!(Arc::ptr_eq(state.secondary_data.as_ref().unwrap(), next.secondary_data.as_ref().unwrap()));

    let replaced = reduce(&next, Action::SetBoardData(vec![open_lane()]));
    assert!(!Arc::ptr_eq(&next.board_data, &replaced.board_data));
}

#[test]
fn set_selected_view_derives_view_data() {
    let view = SavedQuery {
        id: "v".into(),
        name: "Active".into(),
        fetch_xml: r#"<fetch><entity name="incident"><link-entity name="contact" alias="c" /></entity></fetch>"#.into(),
        layout_xml: r#"<grid><row><cell name="title" /><cell name="c.fullname" /></row></grid>"#.into(),
    };
    let state = reduce(&BoardState::default(), Action::SetSelectedView(view));
    assert_eq!(state.selected_view.as_ref().unwrap().name, "Active");
    assert_eq!(state.selected_view_data.columns, vec!["title", "c.fullname"]);
    assert_eq!(state.selected_view_data.link_entities[0].alias.as_deref(), Some("c"));
    assert!(state.selected_secondary_view.is_none());
}

#[test]
fn selected_record_set_and_cleared() {
    let selected = SelectedRecord { entity_type: "incident".into(), id: "1".into(), name: None };
    let state = reduce(&BoardState::default(), Action::SetSelectedRecord(Some(selected.clone())));
    assert_eq!(state.selected_record, Some(selected));
    let state = reduce(&state, Action::SetSelectedRecord(None));
    assert!(state.selected_record.is_none());
}

#[test]
fn secondary_markers_are_separate_from_primary() {
    let sub = Subscription { id: "s1".into(), lookup_value: "1".into() };
    let state = reduce(&BoardState::default(), Action::SetSecondarySubscriptions(vec![sub]));
    assert!(state.subscriptions(BoardSide::Primary).is_empty());
    assert_eq!(state.subscriptions(BoardSide::Secondary).len(), 1);
}

#[test]
fn metadata_replacement_changes_identity() {
    let meta = test_helpers::incident_metadata();
    let a = reduce(&BoardState::default(), Action::SetMetadata(meta.clone()));
    let b = reduce(&a, Action::SetMetadata(meta));
    assert!(!Arc::ptr_eq(a.metadata.as_ref().unwrap(), b.metadata.as_ref().unwrap()));
}

#[test]
fn find_record_uses_normalized_id() {
    let state = reduce(&BoardState::default(), Action::SetMetadata(test_helpers::incident_metadata()));
    let state = reduce(&state, Action::SetBoardData(vec![open_lane()]));
    assert!(state.find_record(BoardSide::Primary, "1").is_some());
    assert!(state.find_record(BoardSide::Primary, "2").is_none());
    assert!(state.find_record(BoardSide::Secondary, "1").is_none());
}

// =============================================================================
// raw actions
// =============================================================================

#[test]
fn raw_action_decodes_known_name() {
    let raw: RawAction = serde_json::from_value(json!({"type": "setProgressText", "payload": "Loading"})).unwrap();
    let action = Action::from_raw(raw).unwrap();
    assert_eq!(action.name(), "setProgressText");
}

#[test]
fn raw_action_without_payload_clears_selection() {
    let raw: RawAction = serde_json::from_value(json!({"type": "setSelectedRecord"})).unwrap();
    assert!(matches!(Action::from_raw(raw).unwrap(), Action::SetSelectedRecord(None)));
}

#[test]
fn unknown_action_fails_fast() {
    let raw = RawAction { kind: "setAppId".into(), payload: json!("x") };
    let err = Action::from_raw(raw).unwrap_err();
    assert!(matches!(err, StoreError::UnknownAction(ref name) if name == "setAppId"));
    assert_eq!(err.error_code(), "E_UNKNOWN_ACTION");
}

#[test]
fn bad_payload_is_rejected() {
    let raw = RawAction { kind: "setWorkIndicator".into(), payload: json!("yes") };
    assert!(matches!(Action::from_raw(raw), Err(StoreError::InvalidPayload { .. })));
}

#[test]
fn every_action_name_round_trips() {
    let actions = vec![
        Action::SetProgressText("x".into()),
        Action::SetWorkIndicator(true),
        Action::SetBoardData(vec![]),
        Action::SetSecondaryData(vec![]),
        Action::SetSelectedRecord(None),
        Action::SetSubscriptions(vec![]),
        Action::SetNotifications(vec![]),
        Action::SetSecondarySubscriptions(vec![]),
        Action::SetSecondaryNotifications(vec![]),
    ];
    for action in actions {
        let name = action.name();
        assert!(ACTION_NAMES.contains(&name));
        let raw: RawAction = serde_json::from_value(serde_json::to_value(&action).unwrap()).unwrap();
        assert_eq!(raw.kind, name);
        assert_eq!(Action::from_raw(raw).unwrap().name(), name);
    }
}

// =============================================================================
// BoardStore
// =============================================================================

#[test]
fn dispatch_updates_snapshot() {
    let store = BoardStore::new();
    assert!(store.dispatch(Action::SetProgressText("Loading".into())));
    assert_eq!(store.snapshot().progress_text.as_deref(), Some("Loading"));
}

#[test]
fn clones_share_state() {
    let store = BoardStore::new();
    let other = store.clone();
    other.dispatch(Action::SetWorkIndicator(true));
    assert!(store.snapshot().work_indicator);
}

#[test]
fn dispatch_raw_unknown_leaves_state() {
    let store = BoardStore::new();
    let before = store.snapshot();
    let result = store.dispatch_raw(RawAction { kind: "nope".into(), payload: json!(null) });
    assert!(result.is_err());
    assert!(Arc::ptr_eq(&before, &store.snapshot()));
}

#[test]
fn dispatch_after_unmount_is_discarded() {
    let store = BoardStore::new();
    store.unmount();
    assert!(!store.is_mounted());
    assert!(!store.dispatch(Action::SetWorkIndicator(true)));
    assert!(!store.snapshot().work_indicator);
}

#[tokio::test]
async fn subscribers_observe_dispatches() {
    let store = BoardStore::new();
    let mut rx = store.subscribe();
    store.dispatch(Action::SetProgressText("Fetching".into()));
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().progress_text.as_deref(), Some("Fetching"));
}
