//! End-to-end scenarios through the public session API, with the provider
//! side played by hand-written events.

use serde_json::{json, Value};
use tensorlens_engine::history::DEFAULT_LIMIT;
use tensorlens_engine::{
    DimensionPath, EditAction, EditHistory, EngineError, PendingDiscard, SaveMark, SessionOptions,
    SidebarView, TensorSession,
};
use tensorlens_core::Shape;
use tensorlens_protocol::{CellChange, HostEvent, SlicePayload, ViewCommand};

fn event(value: Value) -> HostEvent {
    HostEvent::parse(&value.to_string()).unwrap()
}

fn open_model() -> TensorSession {
    let mut session = TensorSession::new("/data/model.npz", SessionOptions::default());
    let refresh = session.request_refresh().unwrap();
    session
        .handle_event(event(json!({
            "type": "tensorData",
            "requestId": refresh.request_id(),
            "data": {
                "tensors": [
                    {"key": "activations", "info": {"shape": [2, 3, 4, 5], "dtype": "float32", "size": 120}},
                    {"key": "kernel", "info": {"shape": [3, 3, 2], "dtype": "float32", "size": 18}},
                    {"key": "table", "info": {"shape": [2, 3], "dtype": "int64", "size": 6},
                     "preview": [["1", "2", "3"], ["4", "5", "6"]]}
                ],
                "totalSize": 1152
            }
        })))
        .unwrap();
    session
}

fn answer_slice(session: &mut TensorSession, cmd: &ViewCommand, data: Value) {
    session
        .handle_event(HostEvent::SliceData {
            data: SlicePayload::Values(data),
            request_id: cmd.request_id(),
        })
        .unwrap();
}

#[test]
fn rank4_walkthrough() {
    let mut nav = DimensionPath::new(Shape::new(vec![2, 3, 4, 5]).unwrap());
    nav.enter(1).unwrap();
    assert_eq!(nav.path(), &[1]);
    assert!(!nav.is_at_leaf_boundary());
    nav.enter(2).unwrap();
    assert_eq!(nav.path(), &[1, 2]);
    assert!(nav.is_at_leaf_boundary());
    assert_eq!(
        tensorlens_engine::build_slice_spec(nav.path(), nav.shape()).unwrap().to_string(),
        "1,2,:,:"
    );
    nav.back();
    assert_eq!(nav.path(), &[1]);
    nav.back();
    assert!(nav.path().is_empty());
}

#[test]
fn rank4_walkthrough_through_session() {
    let mut session = open_model();
    assert_eq!(session.selected_key(), Some("activations"));
    assert_eq!(session.navigate_into(1).unwrap(), None);

    let cmd = session.navigate_into(2).unwrap().unwrap();
    assert_eq!(
        cmd,
        ViewCommand::Slice {
            key: "activations".into(),
            slice: "1,2,:,:".into(),
            request_id: cmd.request_id(),
        }
    );
    let rows: Vec<Vec<f64>> = (0..4).map(|r| (0..5).map(|c| (r * 5 + c) as f64 + 0.5).collect()).collect();
    answer_slice(&mut session, &cmd, json!(rows));
    assert_eq!(session.grid().dims(), (4, 5));
    assert_eq!(session.grid().get(3, 4), Some("19.500000"));

    session.navigate_back();
    session.navigate_back();
    assert!(session.navigator().unwrap().path().is_empty());
}

#[test]
fn undo_redo_sequence() {
    let mut session = open_model();
    session.select_tensor("table").unwrap();

    session.edit_cell(0, 0, "9").unwrap();
    session.edit_cell(0, 1, "8").unwrap();
    session.edit_cell(0, 0, "7").unwrap();

    let third = session.undo().unwrap();
    assert_eq!(third, EditAction::new(0, 0, "9", "7"));
    assert_eq!(session.grid().get(0, 0), Some("9"));

    let second = session.undo().unwrap();
    assert_eq!(second, EditAction::new(0, 1, "2", "8"));
    assert_eq!(session.grid().get(0, 1), Some("2"));

    let redone = session.redo().unwrap();
    assert_eq!(redone.new_value, "8");
    assert_eq!(session.grid().get(0, 1), Some("8"));
    assert_eq!(session.history().history_index(), 1);
}

#[test]
fn eviction_keeps_latest_action_current() {
    let mut history = EditHistory::new();
    for i in 0..DEFAULT_LIMIT {
        history.record(EditAction::new(i, 0, "a", "b"));
    }
    let latest_before = history.current().unwrap().action.clone();
    assert_eq!(latest_before.row, DEFAULT_LIMIT - 1);

    history.record(EditAction::new(999, 0, "a", "b"));
    assert_eq!(history.len(), DEFAULT_LIMIT);
    assert_eq!(history.history_index(), DEFAULT_LIMIT as isize - 1);
    assert_eq!(history.current().unwrap().action.row, 999);
    // The previous latest is right behind the cursor.
    assert_eq!(history.undo().unwrap().row, 999);
    assert_eq!(history.undo().unwrap(), latest_before);
}

#[test]
fn failed_save_reverts_marks_and_keeps_history() {
    let mut session = open_model();
    session.select_tensor("table").unwrap();
    session.edit_cell(0, 0, "10").unwrap();
    session.edit_cell(1, 2, "60").unwrap();

    let cmd = session.save().unwrap();
    match &cmd {
        ViewCommand::SaveEdits { key, changes, .. } => {
            assert_eq!(key, "table");
            assert_eq!(
                changes,
                &vec![
                    CellChange { row: 1, col: 1, value: "10".into() },
                    CellChange { row: 2, col: 3, value: "60".into() },
                ]
            );
        }
        other => panic!("expected saveEdits, got {other:?}"),
    }

    let err = session
        .handle_event(event(json!({
            "type": "saveResponse",
            "success": false,
            "error": "disk full",
            "requestId": cmd.request_id()
        })))
        .unwrap_err();
    assert_eq!(err, EngineError::Source("save failed: disk full".into()));
    assert!(session.banner().is_some_and(|b| b.contains("disk full")));

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert!(history.entries().iter().all(|e| e.mark == SaveMark::Edited));
    assert_eq!(session.grid().get(0, 0), Some("10"));
    assert!(!session.is_saving());
}

#[test]
fn late_save_answer_for_superseded_request_is_ignored() {
    let mut session = open_model();
    session.select_tensor("table").unwrap();
    session.edit_cell(0, 0, "10").unwrap();
    let cmd = session.save().unwrap();

    session
        .handle_event(HostEvent::SaveResponse {
            success: true,
            modified: Some(1),
            message: None,
            error: None,
            request_id: cmd.request_id().map(|id| id + 100),
        })
        .unwrap();
    assert!(session.is_saving());
}

#[test]
fn selecting_another_tensor_resets_navigation() {
    let mut session = open_model();
    session.navigate_into(1).unwrap();
    session.navigate_into(0).unwrap();
    assert_eq!(session.navigator().unwrap().path(), &[1, 0]);

    session.select_tensor("kernel").unwrap();
    assert!(session.navigator().unwrap().path().is_empty());
    assert_eq!(session.current_depth(), 1);
    assert_eq!(session.view(), SidebarView::Dimensions);

    session.navigate_into(2).unwrap();
    session.select_tensor("table").unwrap();
    assert!(session.navigator().unwrap().path().is_empty());
    assert_eq!(session.current_depth(), 0);
}

#[test]
fn slice_for_previous_tensor_is_dropped() {
    let mut session = open_model();
    session.navigate_into(0).unwrap();
    let stale = session.navigate_into(0).unwrap().unwrap();

    session.select_tensor("table").unwrap();
    answer_slice(&mut session, &stale, json!([[0.0, 0.0]]));
    assert_eq!(session.grid().get(0, 0), Some("1"));
    assert_eq!(session.grid_source(), Some("preview"));
}

#[test]
fn precondition_failures_are_not_recoverable() {
    let err = tensorlens_engine::build_slice_spec(&[0], &Shape::new(vec![2, 3, 4, 5]).unwrap())
        .unwrap_err();
    assert!(!err.is_recoverable());
    assert!(err.to_string().starts_with("internal error"));
}

#[test]
fn switching_tensor_with_unsaved_edits_asks_first() {
    let mut session = open_model();
    session.select_tensor("table").unwrap();
    session.edit_cell(0, 0, "10").unwrap();

    assert_eq!(session.select_tensor("kernel").unwrap(), None);
    assert_eq!(session.pending(), Some(&PendingDiscard::Select { key: "kernel".into() }));
    assert_eq!(session.selected_key(), Some("table"));
    assert_eq!(session.grid().get(0, 0), Some("10"));
    assert!(session.status().contains("discard 1 unsaved edit(s)"));

    assert!(session.cancel());
    assert_eq!(session.history().pending_count(), 1);
    assert!(session.request_refresh().is_none());
    assert_eq!(session.pending(), Some(&PendingDiscard::Refresh));

    // Confirming runs the latest staged action.
    session.select_tensor("kernel").unwrap();
    assert_eq!(session.confirm().unwrap(), None);
    assert_eq!(session.selected_key(), Some("kernel"));
    assert!(session.history().is_empty());
    assert!(session.pending().is_none());
}

#[test]
fn slice_and_leaf_entry_are_staged_over_unsaved_edits() {
    let mut session = open_model();
    session.select_tensor("table").unwrap();
    session.edit_cell(1, 1, "50").unwrap();

    // Invalid expressions are still rejected straight away.
    assert!(session.apply_slice_expression("0,0,0").is_err());
    assert_eq!(session.apply_slice_expression("1, :").unwrap(), None);
    assert_eq!(session.pending(), Some(&PendingDiscard::Slice { expr: "1,:".into() }));

    let cmd = session.confirm().unwrap().unwrap();
    assert!(matches!(cmd, ViewCommand::Slice { ref slice, .. } if slice == "1,:"));
    answer_slice(&mut session, &cmd, json!([4, 5, 6]));
    assert!(session.history().is_empty());
}

#[test]
fn untokened_error_does_not_abandon_save() {
    let mut session = open_model();
    session.select_tensor("table").unwrap();
    session.edit_cell(0, 0, "10").unwrap();
    session.save().unwrap();

    assert!(session
        .handle_event(event(json!({"type": "error", "message": "search failed"})))
        .is_err());
    assert!(session.handle_message("{not json").is_err());
    assert!(session.is_saving());

    session
        .handle_event(event(json!({"type": "saveResponse", "success": true, "modified": 1})))
        .unwrap();
    assert!(!session.is_saving());
    assert_eq!(session.history().pending_count(), 0);
    assert!(session.history().entries().iter().all(|e| e.mark == SaveMark::Saved));
}

#[test]
fn filtered_listing_keeps_grid_and_history() {
    let mut session = open_model();
    session.select_tensor("table").unwrap();
    session.edit_cell(0, 2, "30").unwrap();

    let cmd = session.request_filter(None, None, Some("float32".into())).unwrap();
    session
        .handle_event(event(json!({
            "type": "filteredData",
            "requestId": cmd.request_id(),
            "data": {
                "tensors": [
                    {"key": "activations", "info": {"key": "activations", "shape": [2, 3, 4, 5], "dtype": "float32", "size": 120}},
                    {"key": "kernel", "info": {"key": "kernel", "shape": [3, 3, 2], "dtype": "float32", "size": 18}}
                ],
                "totalSize": 552
            }
        })))
        .unwrap();

    assert!(session.is_filtered());
    let keys: Vec<&str> = session.visible_tensors().iter().map(|t| t.key.as_str()).collect();
    assert_eq!(keys, vec!["activations", "kernel"]);
    assert_eq!(session.status(), "Filter matched 2 tensor(s)");
    assert_eq!(session.grid().dims(), (2, 3));
    assert_eq!(session.grid().get(0, 2), Some("30"));
    assert_eq!(session.history().pending_count(), 1);

    assert_eq!(session.filter_tensors("KER"), 1);
    assert!(session.clear_filter());
    assert_eq!(session.visible_tensors().len(), 1);
    assert_eq!(session.filter_tensors(""), 3);
}

#[test]
fn listing_with_scalar_loads_the_rest() {
    let mut session = TensorSession::new("/data/mixed.npz", SessionOptions::default());
    session
        .handle_event(event(json!({
            "type": "tensorData",
            "data": {
                "tensors": [
                    {"key": "a", "info": {"key": "a", "shape": [3, 4], "dtype": "float32", "size": 12,
                                          "min": 0.0, "max": 1.0, "mean": 0.5, "std": 0.25},
                     "preview": [[0, 0, 0, 0], [0, 0, 0, 0], [1, 1, 1, 1]]},
                    {"key": "s", "info": {"key": "s", "shape": [], "dtype": "float64", "size": 1},
                     "preview": [[2.5]]}
                ],
                "totalSize": 56
            }
        })))
        .unwrap();

    assert_eq!(session.tensors().len(), 1);
    assert_eq!(session.selected_key(), Some("a"));
    assert_eq!(session.status(), "Loaded 1 tensor(s), 56.00 B; skipped 1");
    let banner = session.banner().unwrap();
    assert!(banner.starts_with("Skipped 1 tensor(s): s ("), "{banner}");
}

#[test]
fn large_tensor_without_preview_is_not_fetched_whole() {
    let options = SessionOptions { max_preview_elements: 100, ..SessionOptions::default() };
    let mut session = TensorSession::new("/data/big.npy", options);
    session
        .handle_event(event(json!({
            "type": "tensorData",
            "data": {
                "tensors": [
                    {"key": "big", "info": {"shape": [50, 50], "dtype": "float32", "size": 2500,
                                            "min": -1.0, "max": 1.0, "mean": 0.0, "std": 0.5}},
                    {"key": "small", "info": {"shape": [10], "dtype": "int64", "size": 10}}
                ],
                "totalSize": 10080
            }
        })))
        .unwrap();

    assert_eq!(session.select_tensor("big").unwrap(), None);
    assert!(!session.is_loading());
    assert_eq!(
        session.status(),
        "big: 50 × 50 float32 (min -1, max 1, mean 0, std 0.500000) - too large to preview, enter a slice expression"
    );
    let cmd = session.apply_slice_expression("0,:").unwrap().unwrap();
    assert!(matches!(cmd, ViewCommand::Slice { ref slice, .. } if slice == "0,:"));

    assert!(session.select_tensor("small").unwrap().is_some());
}
