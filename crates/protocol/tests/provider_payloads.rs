//! Decode tests for payloads in the exact shape the Python provider builds.
//!
//! Unlike the golden vectors these are decode-only: the provider sends fields
//! the viewer ignores (`info.key`) so re-encoding would drift.

use serde_json::json;
use tensorlens_protocol::{
    ChartType, HostEvent, MatchPosition, SearchResultsPayload, SlicePayload, TensorListing,
};

fn event(value: serde_json::Value) -> HostEvent {
    let line = value.to_string();
    HostEvent::parse(&line).unwrap_or_else(|e| panic!("{e} - line: {line}"))
}

fn listing(value: serde_json::Value) -> TensorListing {
    match event(json!({"type": "tensorData", "data": value})) {
        HostEvent::TensorData { data, .. } => data,
        other => panic!("expected tensorData, got {}", other.name()),
    }
}

#[test]
fn test_npz_listing_with_stats_and_preview() {
    let data = listing(json!({
        "tensors": [
            {
                "key": "weights",
                "info": {
                    "key": "weights", "shape": [3, 4], "dtype": "float32", "size": 12,
                    "min": -1.0, "max": 2.5, "mean": 0.25, "std": 0.75
                },
                "preview": [[0.0, 1.0, 2.0, 2.5], [-1.0, 0.5, 0.25, 0.0], [1.0, 1.0, 1.0, 1.0]]
            },
            {
                "key": "labels",
                "info": {"key": "labels", "shape": [4], "dtype": "<U5", "size": 4},
                "preview": ["cat", "dog", "cat", "bird"]
            }
        ],
        "totalSize": 128
    }));
    assert_eq!(data.tensors.len(), 2);
    assert!(data.skipped.is_empty());
    assert_eq!(data.tensors[0].info.std, Some(0.75));
    assert_eq!(data.tensors[1].info.min, None);
    assert_eq!(data.tensors[1].info.dtype, "<U5");
}

#[test]
fn test_scalar_tensor_is_skipped_not_fatal() {
    let data = listing(json!({
        "tensors": [
            {"key": "a", "info": {"key": "a", "shape": [3, 4], "dtype": "int64", "size": 12}},
            {
                "key": "scalar",
                "info": {"key": "scalar", "shape": [], "dtype": "float64", "size": 1,
                         "min": 3.5, "max": 3.5, "mean": 3.5, "std": 0.0},
                "preview": [[3.5]]
            }
        ],
        "totalSize": 104
    }));
    assert_eq!(data.tensors.len(), 1);
    assert_eq!(data.skipped.len(), 1);
    assert_eq!(data.skipped[0].key.as_deref(), Some("scalar"));
}

#[test]
fn test_search_results_with_key_tuple_and_truncation_positions() {
    let msg = event(json!({
        "type": "searchResults",
        "data": [{
            "key": "weights",
            "matches": [
                {"position": "key", "value": "weights", "context": "Key name: weights"},
                {"position": "(0, 1)", "value": "1.0", "context": "Position (0, 1)"},
                {"position": "...", "value": "42 more matches", "context": "results truncated"}
            ],
            "totalMatches": 3
        }]
    }));
    match msg {
        HostEvent::SearchResults { data, request_id } => {
            assert_eq!(request_id, None);
            assert_eq!(data.match_count(), 3);
            let SearchResultsPayload::Tensor(results) = data else {
                panic!("expected tensor search results");
            };
            assert_eq!(results[0].matches[0].position, MatchPosition::Label("key".into()));
            assert_eq!(results[0].matches[2].position.to_string(), "...");
            assert_eq!(results[0].total_matches, Some(3));
        }
        other => panic!("expected searchResults, got {}", other.name()),
    }
}

#[test]
fn test_line_plot_series() {
    let msg = event(json!({
        "type": "plotData",
        "data": {
            "type": "line",
            "title": "Line - bias",
            "data": [{"name": "bias", "x": [0, 1, 2], "y": [0.5, -0.5, 1.5]}]
        }
    }));
    let HostEvent::PlotData { data, .. } = msg else { panic!("expected plotData") };
    assert_eq!(data.chart_type, Some(ChartType::Line));
    assert_eq!(data.data[0].x, Some(vec![0.0, 1.0, 2.0]));
    assert_eq!(data.data[0].y, Some(vec![0.5, -0.5, 1.5]));
    assert!(data.layout.is_none());
}

#[test]
fn test_heatmap_and_image_series_carry_only_z() {
    for chart in ["heatmap", "image"] {
        let msg = event(json!({
            "type": "plotData",
            "data": {
                "type": chart,
                "title": "Heatmap - weights",
                "data": [{"name": "weights", "z": [[1, 2], [3, 4]]}]
            }
        }));
        let HostEvent::PlotData { data, .. } = msg else { panic!("expected plotData") };
        assert_eq!(data.data[0].y, None);
        assert_eq!(data.data[0].z.as_ref().map(|z| z[1][0]), Some(3.0));
    }
}

#[test]
fn test_filtered_data_is_a_listing() {
    let msg = event(json!({
        "type": "filteredData",
        "data": {
            "tensors": [
                {"key": "w", "info": {"key": "w", "shape": [2, 2], "dtype": "float32", "size": 4},
                 "preview": [[1, 2], [3, 4]]}
            ],
            "totalSize": 16
        }
    }));
    let HostEvent::FilteredData { data, .. } = msg else { panic!("expected filteredData") };
    assert_eq!(data.tensors.len(), 1);
    assert_eq!(data.tensors[0].info.shape.dims(), &[2, 2]);
}

#[test]
fn test_save_response_success_and_failure() {
    let ok = event(json!({
        "type": "saveResponse", "success": true, "modified": 2, "message": "saved 2 changes"
    }));
    assert!(matches!(ok, HostEvent::SaveResponse { success: true, modified: Some(2), .. }));

    let failed = event(json!({
        "type": "saveResponse", "success": false, "error": "file is locked or read-only"
    }));
    match failed {
        HostEvent::SaveResponse { success, error, .. } => {
            assert!(!success);
            assert_eq!(error.as_deref(), Some("file is locked or read-only"));
        }
        other => panic!("expected saveResponse, got {}", other.name()),
    }
}

#[test]
fn test_slice_error_object() {
    let msg = event(json!({"type": "sliceData", "data": {"error": "too many indices for array"}}));
    assert!(matches!(msg, HostEvent::SliceData { data: SlicePayload::Failed { .. }, .. }));
}
