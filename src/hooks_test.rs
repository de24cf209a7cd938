use super::*;
use crate::state::test_helpers;
use serde_json::json;

fn context_data() -> Record {
    Record::from_value(json!({"incidentid": "1", "statuscode": 1}))
}

#[test]
fn unknown_handler_is_explicit_error() {
    let registry = HandlerRegistry::new();
    let err = registry.transition("board.onMove").err().unwrap();
    assert!(matches!(err, HookError::HandlerNotFound(ref id) if id == "board.onMove"));
    assert_eq!(err.error_code(), "E_HANDLER_NOT_FOUND");
    assert!(registry.button("board.escalate").is_err());
}

#[test]
fn outcome_constructors() {
    assert!(HookOutcome::prevent().prevent_default);
    assert!(!HookOutcome::proceed().prevent_default);
    assert_eq!(HookOutcome::default(), HookOutcome::proceed());
}

#[tokio::test]
async fn closure_transition_hook_sees_target() {
    let registry = HandlerRegistry::new().on_transition("board.onMove", |ctx| async move {
        Ok(HookOutcome { prevent_default: ctx.target.value == 2 })
    });
    let (ctx, _) = test_helpers::test_context();
    let hook = registry.transition("board.onMove").unwrap();

    let to_done = TransitionContext {
        data: context_data(),
        target: LaneOption::new(2, "Done"),
        side: BoardSide::Primary,
        board: ctx.handle(),
    };
    assert!(hook.on_transition(to_done.clone()).await.unwrap().prevent_default);

    let to_open = TransitionContext { target: LaneOption::new(1, "Open"), ..to_done };
    assert!(!hook.on_transition(to_open).await.unwrap().prevent_default);
}

#[tokio::test]
async fn closure_button_hook_errors_propagate() {
    let registry = HandlerRegistry::new()
        .on_button("board.escalate", |_ctx| async { Err(HookError::Failed("no queue".into())) });
    let (ctx, _) = test_helpers::test_context();
    let hook = registry.button("board.escalate").unwrap();
    let result = hook
        .on_click(ButtonContext { data: context_data(), side: BoardSide::Primary, board: ctx.handle() })
        .await;
    assert!(matches!(result, Err(HookError::Failed(_))));
}

#[tokio::test]
async fn board_handle_exposes_board_capabilities() {
    let (ctx, records) = test_helpers::test_context();
    crate::services::refresh::load_board(&ctx).await.unwrap();
    let handle = ctx.handle();

    handle.set_work_indicator(true);
    assert!(handle.state().work_indicator);
    handle.set_work_indicator(false);
    assert!(!handle.state().work_indicator);

    handle
        .record_store()
        .update("incident", "1", &json!({"statuscode": 2}).as_object().unwrap().clone())
        .await
        .unwrap();
    handle.refresh().await.unwrap();
    let state = handle.state();
    assert_eq!(state.board_data[1].data.len(), 2);
    assert!(records.call_count() > 0);
}
