use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use canvas::doc::DocStore;
use gates::TransformType;
use tokio::time::timeout;

use super::*;
use crate::api::{ApiError, PlotUpdate};

// =========================================================================
// MockApi
// =========================================================================

#[derive(Default)]
struct MockApi {
    exp_file: ExpFile,
    requests: Mutex<Vec<PlotUpdateRequest>>,
    /// Response delay keyed by the root gate name in the saved tree.
    delays_ms: HashMap<String, u64>,
    fail_updates: bool,
}

impl MockApi {
    fn new(exp_file: ExpFile) -> Self {
        Self { exp_file, ..Self::default() }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> PlotUpdateRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl GateApi for MockApi {
    async fn fetch_exp_file(&self, _exp_file_id: &str, _gate_edit_session: &str) -> Result<ExpFile, ApiError> {
        Ok(self.exp_file.clone())
    }

    async fn update_gate_plot(&self, request: &PlotUpdateRequest) -> Result<PlotUpdate, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        let name = request.gates["name"].as_str().unwrap_or_default().to_string();
        if let Some(ms) = self.delays_ms.get(&name) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        if self.fail_updates {
            return Err(ApiError::Response { status: 500, body: "render failed".into() });
        }
        Ok(PlotUpdate { plot_key: Some(format!("plot-{name}")) })
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn exp_file(channels: &[&str], saved: Option<&str>) -> ExpFile {
    let channels: Vec<serde_json::Value> = channels
        .iter()
        .map(|c| serde_json::json!({"shortName": c, "name": format!("{c} long"), "id": 1, "range": 1024}))
        .collect();
    let gate = saved.map(|raw| serde_json::json!({"id": 9, "gateJson": raw}));
    serde_json::from_value(serde_json::json!({
        "id": 42,
        "title": "sample.fcs",
        "gate": gate,
        "channels": channels,
        "plotMargin": {"top": 0.1, "left": 0.1, "bottom": 0.1, "right": 0.1},
        "predefinedTransforms": [{"transformName": "asinh"}, {"transformName": "biex"}],
        "defaultTransforms": [
            {"channel": "CD3", "transformName": "lg", "transformType": "logicle",
             "parameterValues": {"t": 262144, "m": 4.5, "w": 0.5, "a": 0}}
        ],
        "autoTransforms": [{"channel": "CD4", "transformName": "auto-cd4"}],
        "gateEditSession": "sess-1"
    }))
    .unwrap()
}

fn launch(new_gate: bool) -> LaunchParams {
    LaunchParams { exp_file_id: "42".into(), gate_edit_session: "sess-1".into(), new_gate }
}

async fn next_event(rx: &mut broadcast::Receiver<GateEvent>) -> GateEvent {
    timeout(Duration::from_secs(5), rx.recv()).await.expect("event within timeout").expect("channel open")
}

async fn assert_quiet(rx: &mut broadcast::Receiver<GateEvent>) {
    let got = timeout(Duration::from_secs(1), rx.recv()).await;
    assert!(got.is_err(), "expected no event, got {got:?}");
}

/// Loaded session with the load's own refresh already delivered.
async fn loaded(api: MockApi) -> (GateSession, Arc<MockApi>, broadcast::Receiver<GateEvent>) {
    let api = Arc::new(api);
    let mut session = GateSession::new(api.clone(), SessionConfig::new("http://flowgate.test"));
    let mut rx = session.subscribe();
    session.load_gate(&launch(false)).await.unwrap();
    assert_eq!(next_event(&mut rx).await, GateEvent::Loaded);
    assert!(matches!(next_event(&mut rx).await, GateEvent::PlotRefreshed { .. }));
    (session, api, rx)
}

const SAVED: &str = r#"{"name":"Cells","customName":1,"x":"CD3","y":"CD4","points":[],"ployKey":"root-key",
    "children":[{"name":"T","customName":1,"x":"CD3","y":"CD8","plotKey":"t-key","gatingMethod":"dafi"}]}"#;

// =========================================================================
// load_gate
// =========================================================================

#[tokio::test(start_paused = true)]
async fn load_without_saved_tree_builds_default_gate() {
    let (session, api, _rx) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], None))).await;

    let gate = session.current_gate().unwrap();
    assert_eq!(gate.name, "CD3 vs. CD4");
    assert_eq!((gate.x.as_str(), gate.y.as_str()), ("CD3", "CD4"));
    assert_eq!(gate.points, gates::gate::default_points());
    assert_eq!(gate.points[1], Point::new(350.0 / 600.0, 250.0 / 600.0));
    assert_eq!(gate.x_transform.transform_type, TransformType::Logicle);
    assert_eq!(gate.y_transform, Transform::none());
    assert_eq!(session.current_gate_id().unwrap(), session.root_gate_id().unwrap());

    assert_eq!(api.request_count(), 1);
    let req = api.last_request();
    assert_eq!(req.exp_file, "42");
    assert_eq!(req.gate_edit_session, "sess-1");
    assert_eq!(req.gates["name"], "CD3 vs. CD4");
}

#[tokio::test(start_paused = true)]
async fn load_emits_loaded_then_plot_refreshed() {
    let api = Arc::new(MockApi::new(exp_file(&["CD3", "CD4"], None)));
    let mut session = GateSession::new(api, SessionConfig::new("http://flowgate.test"));
    let mut rx = session.subscribe();
    session.load_gate(&launch(false)).await.unwrap();

    assert_eq!(next_event(&mut rx).await, GateEvent::Loaded);
    match next_event(&mut rx).await {
        GateEvent::PlotRefreshed { plot_key, version } => {
            assert_eq!(plot_key, "plot-CD3 vs. CD4");
            assert!(version > 0);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn too_few_channels_are_padded() {
    let (session, ..) = loaded(MockApi::new(exp_file(&["CD3"], None))).await;
    assert_eq!(session.parameters().unwrap(), &["CD3", "FSC-A", "FSC-H"]);
    assert_eq!(session.parameters_display().unwrap(), &["CD3(CD3 long)"]);
    assert_eq!(session.current_gate().unwrap().name, "CD3 vs. FSC-A");
}

#[tokio::test(start_paused = true)]
async fn saved_tree_is_loaded() {
    let (session, ..) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], Some(SAVED)))).await;
    let tree = session.tree().unwrap();
    assert_eq!(tree.len(), 2);
    let root = session.current_gate().unwrap();
    assert_eq!(root.name, "Cells");
    assert_eq!(root.plot_key, "root-key");
    assert_eq!(session.predefined_transforms().unwrap(), &["asinh", "biex"]);
}

#[tokio::test(start_paused = true)]
async fn new_gate_flag_discards_saved_tree() {
    let api = Arc::new(MockApi::new(exp_file(&["CD3", "CD4"], Some(SAVED))));
    let mut session = GateSession::new(api, SessionConfig::new("http://flowgate.test"));
    session.load_gate(&launch(true)).await.unwrap();

    assert_eq!(session.tree().unwrap().len(), 1);
    assert_eq!(session.current_gate().unwrap().name, "CD3 vs. CD4");
}

#[tokio::test(start_paused = true)]
async fn malformed_saved_tree_fails_load() {
    let api = Arc::new(MockApi::new(exp_file(&["CD3", "CD4"], Some("{not json"))));
    let mut session = GateSession::new(api, SessionConfig::new("http://flowgate.test"));
    let err = session.load_gate(&launch(false)).await.unwrap_err();
    assert!(matches!(err, SessionError::Api(ApiError::Parse(_))));
    assert!(matches!(session.tree(), Err(SessionError::NotLoaded)));
}

#[tokio::test(start_paused = true)]
async fn operations_before_load_fail() {
    let mut session = GateSession::new(Arc::new(MockApi::default()), SessionConfig::new("http://x"));
    assert!(matches!(session.current_gate(), Err(SessionError::NotLoaded)));
    assert!(matches!(session.rename_current_gate("x"), Err(SessionError::NotLoaded)));
    assert!(matches!(session.add_gate(None, None), Err(SessionError::NotLoaded)));
}

// =========================================================================
// Transforms
// =========================================================================

#[tokio::test(start_paused = true)]
async fn default_and_auto_transform_lookup() {
    let (session, ..) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], None))).await;
    assert_eq!(session.default_transform("CD3").unwrap().predefined_name, "lg");
    assert_eq!(session.default_transform("CD4").unwrap(), Transform::none());
    assert_eq!(session.auto_transform("CD4").unwrap(), Transform::predefined("auto-cd4"));
    assert_eq!(session.auto_transform("CD3").unwrap(), Transform::none());
}

#[tokio::test(start_paused = true)]
async fn invalid_transform_is_rejected_without_event() {
    let (mut session, api, mut rx) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], None))).await;
    let before = session.current_gate().unwrap().x_transform.clone();

    let bad = Transform { transform_type: TransformType::Linear, t: -1.0, ..Transform::none() };
    let err = session.apply_transform(Axis::X, bad).unwrap_err();

    assert_eq!(err.rejected_messages(), Some(&["T must be positive.".to_string()][..]));
    assert_eq!(session.current_gate().unwrap().x_transform, before);
    assert_quiet(&mut rx).await;
    assert_eq!(api.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn valid_transform_saves_and_refreshes() {
    let (mut session, api, mut rx) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], None))).await;

    session.apply_transform(Axis::Y, Transform::predefined("unknown")).unwrap();

    assert_eq!(next_event(&mut rx).await, GateEvent::FieldChanged(GateField::Transform));
    assert!(matches!(next_event(&mut rx).await, GateEvent::PlotRefreshed { .. }));
    assert_eq!(session.current_gate().unwrap().y_transform.predefined_name, "asinh");
    assert_eq!(api.last_request().gates["yTransform"]["predefinedName"], "asinh");
}

// =========================================================================
// Events and refresh filtering
// =========================================================================

#[tokio::test(start_paused = true)]
async fn points_changes_do_not_trigger_refresh() {
    let (mut session, api, mut rx) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], None))).await;

    session.update_current_points(vec![Point::new(0.1, 0.1), Point::new(0.2, 0.1), Point::new(0.2, 0.2)]).unwrap();

    assert_eq!(next_event(&mut rx).await, GateEvent::PointsChanged);
    assert_quiet(&mut rx).await;
    assert_eq!(api.request_count(), 1);
    assert_eq!(session.current_gate().unwrap().points.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn rename_triggers_refresh_with_new_name() {
    let (mut session, api, mut rx) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], None))).await;

    session.rename_current_gate("Lymphocytes").unwrap();

    assert_eq!(next_event(&mut rx).await, GateEvent::FieldChanged(GateField::Name));
    match next_event(&mut rx).await {
        GateEvent::PlotRefreshed { plot_key, .. } => assert_eq!(plot_key, "plot-Lymphocytes"),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(api.last_request().gates["customName"], 1);
}

#[tokio::test(start_paused = true)]
async fn stale_refresh_response_is_dropped() {
    let mut api = MockApi::new(exp_file(&["CD3", "CD4"], None));
    api.delays_ms.insert("slow".into(), 500);
    api.delays_ms.insert("fast".into(), 10);
    let (mut session, api, mut rx) = loaded(api).await;

    session.rename_current_gate("slow").unwrap();
    session.rename_current_gate("fast").unwrap();

    assert_eq!(next_event(&mut rx).await, GateEvent::FieldChanged(GateField::Name));
    assert_eq!(next_event(&mut rx).await, GateEvent::FieldChanged(GateField::Name));
    match next_event(&mut rx).await {
        GateEvent::PlotRefreshed { plot_key, .. } => assert_eq!(plot_key, "plot-fast"),
        other => panic!("unexpected event {other:?}"),
    }
    assert_quiet(&mut rx).await;
    assert_eq!(api.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn remote_failure_is_not_retried() {
    let api = Arc::new(MockApi { fail_updates: true, ..MockApi::new(exp_file(&["CD3", "CD4"], None)) });
    let mut session = GateSession::new(api.clone(), SessionConfig::new("http://flowgate.test"));
    let mut rx = session.subscribe();
    session.load_gate(&launch(false)).await.unwrap();

    assert_eq!(next_event(&mut rx).await, GateEvent::Loaded);
    assert_quiet(&mut rx).await;
    assert_eq!(api.request_count(), 1);

    session.rename_current_gate("still editable").unwrap();
    assert_eq!(next_event(&mut rx).await, GateEvent::FieldChanged(GateField::Name));
}

// =========================================================================
// Selection and structure
// =========================================================================

#[tokio::test(start_paused = true)]
async fn selecting_same_gate_is_a_no_op() {
    let (mut session, api, mut rx) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], None))).await;
    let root = session.root_gate_id().unwrap();

    assert!(!session.set_current_gate(root).unwrap());
    assert_quiet(&mut rx).await;
    assert_eq!(api.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn add_select_and_remove_gate() {
    let (mut session, _api, mut rx) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], None))).await;
    let root = session.root_gate_id().unwrap();

    let child = session.add_gate(None, None).unwrap();
    assert_eq!(next_event(&mut rx).await, GateEvent::FieldChanged(GateField::Children));
    assert_eq!(session.tree().unwrap().parent(child), Some(root));
    assert_eq!(session.tree().unwrap().gate(child).unwrap().name, "CD3 vs. CD4");

    assert!(session.set_current_gate(child).unwrap());
    assert_eq!(session.current_gate_id().unwrap(), child);

    assert_eq!(session.remove_gate(child).unwrap(), Some(root));
    assert_eq!(session.current_gate_id().unwrap(), root);
    assert!(session.tree().unwrap().children(root).is_empty());

    assert_eq!(session.remove_gate(child).unwrap(), Some(root));
    assert_eq!(session.tree().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn selecting_unknown_gate_fails() {
    let (mut session, ..) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], None))).await;
    let child = session.add_gate(None, None).unwrap();
    session.remove_gate(child).unwrap();
    assert!(matches!(session.set_current_gate(child), Err(SessionError::Gate(GateError::UnknownGate(_)))));
}

// =========================================================================
// Editor wiring
// =========================================================================

#[tokio::test(start_paused = true)]
async fn editor_round_trips_current_points() {
    let (mut session, ..) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], None))).await;
    let before = session.current_gate().unwrap().points.clone();

    let (editor, actions) = session.open_editor(DocStore::new(), &CanvasConfig::default()).unwrap();
    assert_eq!(editor.graph().vertex_count(), 4);
    assert_eq!(editor.mode(), EditMode::FreeForm);

    session.apply_editor_actions(&actions).unwrap();
    let after = &session.current_gate().unwrap().points;
    assert_eq!(after.len(), before.len());
    for (a, b) in before.iter().zip(after) {
        assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);
    }
}

#[tokio::test(start_paused = true)]
async fn constrained_tree_opens_rectangle_editor() {
    let saved = r#"{"name":"root","x":"CD3","y":"CD4","gatingMethod":"dafi"}"#;
    let (session, ..) = loaded(MockApi::new(exp_file(&["CD3", "CD4"], Some(saved)))).await;
    assert_eq!(session.edit_mode().unwrap(), EditMode::Rectangle);

    let (editor, actions) = session.open_editor(DocStore::new(), &CanvasConfig::default()).unwrap();
    assert_eq!(editor.mode(), EditMode::Rectangle);
    assert_eq!(editor.graph().vertex_count(), 4);
    assert!(actions.iter().any(|a| matches!(a, Action::PointsChanged(p) if p.len() == 4)));
}

#[tokio::test(start_paused = true)]
async fn plot_url_uses_config_base() {
    let session = GateSession::new(Arc::new(MockApi::default()), SessionConfig::new("http://flowgate.test/"));
    assert_eq!(session.plot_url("k", 5), "http://flowgate.test/expFile/renderGatePlot?plotKey=k&v=5");
}
