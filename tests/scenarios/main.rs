use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mindcanvas::geometry::{ScreenPoint, ScreenSize, ScreenVector, WorldPoint, WorldVector};
use mindcanvas::oracle::PlaceholderOracle;
use mindcanvas::{
    CanvasApp, CanvasIntent, CanvasRuntime, ConnectionRejected, EventDisposition, Graph,
    InputEvent, InteractionMode, InteractionState, Modifiers, NodeId, NodeKind, OracleError,
    PointerButton, PointerCapture, PointerTarget, Suggestion, SuggestionOracle, VERSION, Viewport,
};

/// Drives a canvas through pointer events the way a host would, resolving
/// targets with the canvas's own hit testing.
struct TestHarness {
    app: CanvasApp,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            app: CanvasApp::with_rng_seed(ScreenSize::new(800.0, 600.0), 11),
        }
    }

    fn root(&self) -> NodeId {
        self.app
            .graph
            .nodes()
            .find(|node| node.kind == NodeKind::Root)
            .map(|node| node.id)
            .expect("canvas starts with a root")
    }

    fn add(&mut self, x: f32, y: f32, content: &str) -> NodeId {
        self.app
            .add_node(WorldPoint::new(x, y), NodeKind::Concept, content)
    }

    fn set_mode(&mut self, mode: InteractionMode) {
        self.app.apply_intents([CanvasIntent::SetMode { mode }]);
    }

    /// Screen point over the centre of a node.
    fn screen_of(&self, id: NodeId) -> ScreenPoint {
        let center = self.app.graph.get_node(id).expect("node exists").center();
        self.app.viewport().world_to_screen(center)
    }

    fn target_at(&self, position: ScreenPoint) -> PointerTarget {
        self.app
            .node_at_screen_point(position)
            .map_or(PointerTarget::Canvas, PointerTarget::Node)
    }

    fn press_at(&mut self, position: ScreenPoint, modifiers: Modifiers) -> EventDisposition {
        self.press_button_at(position, PointerButton::Primary, modifiers)
    }

    fn press_button_at(
        &mut self,
        position: ScreenPoint,
        button: PointerButton,
        modifiers: Modifiers,
    ) -> EventDisposition {
        let target = self.target_at(position);
        self.app.handle_input(InputEvent::PointerDown {
            position,
            button,
            target,
            modifiers,
        })
    }

    fn click_node(&mut self, id: NodeId, modifiers: Modifiers) {
        let position = self.screen_of(id);
        self.press_at(position, modifiers);
        self.release_at(position);
    }

    fn move_to(&mut self, position: ScreenPoint) {
        self.app.handle_input(InputEvent::PointerMove { position });
    }

    fn release_at(&mut self, position: ScreenPoint) -> EventDisposition {
        self.app.handle_input(InputEvent::PointerUp { position })
    }

    fn double_click_at(&mut self, position: ScreenPoint) {
        let target = self.target_at(position);
        self.app
            .handle_input(InputEvent::DoubleClick { position, target });
    }

    fn wheel(&mut self, position: ScreenPoint, delta: ScreenVector, modifiers: Modifiers) {
        let disposition = self.app.handle_input(InputEvent::Wheel {
            position,
            delta,
            modifiers,
        });
        assert!(disposition.prevent_default);
    }

    fn position(&self, id: NodeId) -> WorldPoint {
        self.app.graph.get_node(id).expect("node exists").position
    }
}

/// Scripted oracle that counts calls.
#[derive(Default)]
struct CountingOracle {
    expansions: AtomicUsize,
    labels: AtomicUsize,
}

#[async_trait]
impl SuggestionOracle for CountingOracle {
    async fn expand(
        &self,
        content: &str,
        _existing: &[String],
    ) -> Result<Vec<Suggestion>, OracleError> {
        self.expansions.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            Suggestion::concept(format!("{content} / why")),
            Suggestion::concept(format!("{content} / how")),
            Suggestion::concept(format!("{content} / when")),
        ])
    }

    async fn suggest_label(&self, _from: &str, _to: &str) -> Result<String, OracleError> {
        self.labels.fetch_add(1, Ordering::SeqCst);
        Ok("leads to".to_string())
    }
}

struct BrokenOracle;

#[async_trait]
impl SuggestionOracle for BrokenOracle {
    async fn expand(
        &self,
        _content: &str,
        _existing: &[String],
    ) -> Result<Vec<Suggestion>, OracleError> {
        Err(OracleError::Malformed("expected value at line 1".into()))
    }

    async fn suggest_label(&self, _from: &str, _to: &str) -> Result<String, OracleError> {
        Err(OracleError::HttpStatus(429))
    }
}

async fn settle(runtime: &mut CanvasRuntime) {
    tokio::time::timeout(Duration::from_secs(5), runtime.settle())
        .await
        .expect("oracle requests should resolve");
}

#[test]
fn scenarios_binary_smoke_runs() {
    assert!(!VERSION.is_empty());
}

#[test]
fn add_connection_then_reverse_duplicate_is_rejected() {
    let mut graph = Graph::new();
    let root = graph
        .add_node(WorldPoint::new(0.0, 0.0), NodeKind::Root, "Central Idea")
        .id;
    let idea = graph
        .add_node(WorldPoint::new(100.0, 0.0), NodeKind::Concept, "Idea")
        .id;

    let connection = graph.add_connection(root, idea, None).unwrap().clone();
    assert_eq!(connection.label, None);
    assert_eq!(graph.connection_count(), 1);

    assert_eq!(
        graph.add_connection(idea, root, None).unwrap_err(),
        ConnectionRejected::Duplicate(connection.id)
    );
    assert_eq!(graph.connection_count(), 1);
}

#[test]
fn zoom_at_keeps_world_point_under_cursor() {
    let mut viewport = Viewport::default();
    let anchor = ScreenPoint::new(100.0, 100.0);
    let before = viewport.screen_to_world(anchor);

    viewport.zoom_at(anchor, 0.5);

    assert_eq!(viewport.scale(), 1.5);
    assert_eq!(before, WorldPoint::new(100.0, 100.0));
    assert_eq!(viewport.screen_to_world(anchor), before);
}

#[test]
fn double_click_centres_new_node_on_click() {
    let mut harness = TestHarness::new();
    let click = harness
        .app
        .viewport()
        .world_to_screen(WorldPoint::new(500.0, 500.0));

    harness.double_click_at(click);

    let created = harness
        .app
        .graph
        .nodes()
        .find(|node| node.kind == NodeKind::Concept)
        .expect("double-click creates a node");
    assert_eq!(created.position, WorldPoint::new(390.0, 450.0));
    assert_eq!(created.content, "");
}

#[test]
fn double_click_on_node_creates_nothing() {
    let mut harness = TestHarness::new();
    let root = harness.root();
    let over_root = harness.screen_of(root);

    harness.double_click_at(over_root);

    assert_eq!(harness.app.graph.node_count(), 1);
}

#[test]
fn group_drag_moves_selected_nodes_together() {
    let mut harness = TestHarness::new();
    let a = harness.add(400.0, 0.0, "A");
    let b = harness.add(0.0, 300.0, "B");
    let c = harness.add(400.0, 300.0, "C");
    let d = harness.add(-400.0, 300.0, "D");
    harness.app.apply_intents([CanvasIntent::ZoomAt {
        anchor: ScreenPoint::new(0.0, 0.0),
        delta: 1.0,
    }]);
    assert_eq!(harness.app.viewport().scale(), 2.0);

    harness.click_node(a, Modifiers::default());
    harness.click_node(b, Modifiers::shift());
    harness.click_node(c, Modifiers::shift());
    assert_eq!(harness.app.selected_nodes.len(), 3);
    let before = [a, b, c, d].map(|id| harness.position(id));

    let start = harness.screen_of(a);
    let capture = harness.press_at(start, Modifiers::shift());
    assert_eq!(capture.capture, Some(PointerCapture::Acquire));
    assert_eq!(
        harness.app.interaction_state(),
        InteractionState::DraggingNode(a)
    );
    harness.move_to(start + ScreenVector::new(20.0, -10.0));
    harness.move_to(start + ScreenVector::new(60.0, 30.0));
    let release = harness.release_at(start + ScreenVector::new(60.0, 30.0));
    assert_eq!(release.capture, Some(PointerCapture::Release));

    let shift = WorldVector::new(30.0, 15.0);
    assert_eq!(harness.position(a), before[0] + shift);
    assert_eq!(harness.position(b), before[1] + shift);
    assert_eq!(harness.position(c), before[2] + shift);
    assert_eq!(harness.position(d), before[3]);
    assert_eq!(harness.app.interaction_state(), InteractionState::Idle);
}

#[test]
fn plain_click_on_selected_node_drags_only_that_node() {
    let mut harness = TestHarness::new();
    let a = harness.add(400.0, 0.0, "A");
    let b = harness.add(0.0, 300.0, "B");
    harness.click_node(a, Modifiers::default());
    harness.click_node(b, Modifiers::shift());
    let b_before = harness.position(b);

    let start = harness.screen_of(a);
    harness.press_at(start, Modifiers::default());
    harness.move_to(start + ScreenVector::new(10.0, 10.0));
    harness.release_at(start + ScreenVector::new(10.0, 10.0));

    assert_eq!(harness.app.selected_nodes.ordered(), &[a]);
    assert_eq!(harness.position(b), b_before);
}

#[test]
fn pan_gestures_accumulate_incrementally() {
    let mut harness = TestHarness::new();
    let root = harness.root();
    let offset = harness.app.viewport().offset();

    // Middle button pans even when pressed over a node.
    let over_root = harness.screen_of(root);
    harness.press_button_at(over_root, PointerButton::Middle, Modifiers::default());
    assert_eq!(
        harness.app.interaction_state(),
        InteractionState::PanningCanvas
    );
    harness.move_to(over_root + ScreenVector::new(5.0, 5.0));
    harness.move_to(over_root + ScreenVector::new(15.0, -5.0));
    harness.release_at(over_root + ScreenVector::new(15.0, -5.0));

    assert_eq!(
        harness.app.viewport().offset(),
        offset + ScreenVector::new(15.0, -5.0)
    );
    assert_eq!(harness.position(root), WorldPoint::origin());

    // Space-drag on empty canvas.
    let empty = ScreenPoint::new(20.0, 20.0);
    harness.press_at(empty, Modifiers::space());
    harness.move_to(empty + ScreenVector::new(-40.0, 0.0));
    harness.release_at(empty + ScreenVector::new(-40.0, 0.0));
    assert_eq!(
        harness.app.viewport().offset(),
        offset + ScreenVector::new(-25.0, -5.0)
    );
}

#[test]
fn wheel_zooms_with_modifier_and_pans_without() {
    let mut harness = TestHarness::new();
    let cursor = ScreenPoint::new(123.0, 321.0);
    let under_cursor = harness.app.viewport().screen_to_world(cursor);

    harness.wheel(cursor, ScreenVector::new(0.0, -500.0), Modifiers::ctrl());
    assert_eq!(harness.app.viewport().scale(), 1.5);
    let after = harness.app.viewport().screen_to_world(cursor);
    assert!((after.x - under_cursor.x).abs() < 1e-3);
    assert!((after.y - under_cursor.y).abs() < 1e-3);

    for _ in 0..20 {
        harness.wheel(cursor, ScreenVector::new(0.0, 2000.0), Modifiers::ctrl());
    }
    assert_eq!(harness.app.viewport().scale(), 0.1);

    let offset = harness.app.viewport().offset();
    harness.wheel(cursor, ScreenVector::new(12.0, -8.0), Modifiers::default());
    assert_eq!(
        harness.app.viewport().offset(),
        offset + ScreenVector::new(-12.0, 8.0)
    );
}

#[test]
fn connect_mode_creates_one_connection_and_rejects_duplicates() {
    let mut harness = TestHarness::new();
    let root = harness.root();
    let idea = harness.add(400.0, 0.0, "Idea");
    harness.set_mode(InteractionMode::Connect);

    harness.click_node(root, Modifiers::default());
    assert_eq!(
        harness.app.interaction_state(),
        InteractionState::AwaitingConnectionTarget(root)
    );
    harness.click_node(idea, Modifiers::default());
    assert_eq!(harness.app.graph.connection_count(), 1);
    assert_eq!(harness.app.interaction_state(), InteractionState::Idle);

    harness.click_node(idea, Modifiers::default());
    harness.click_node(root, Modifiers::default());
    assert_eq!(harness.app.graph.connection_count(), 1);
    assert_eq!(harness.app.interaction_state(), InteractionState::Idle);
    assert_eq!(harness.app.take_oracle_requests().len(), 1);
}

#[test]
fn canvas_press_aborts_pending_connection() {
    let mut harness = TestHarness::new();
    let root = harness.root();
    harness.set_mode(InteractionMode::Connect);
    harness.click_node(root, Modifiers::default());

    harness.press_at(ScreenPoint::new(5.0, 5.0), Modifiers::default());

    assert_eq!(harness.app.interaction_state(), InteractionState::Idle);
    assert!(harness.app.selected_nodes.is_empty());
}

#[test]
fn delete_cascades_to_connections_selection_and_pending_source() {
    let mut harness = TestHarness::new();
    let root = harness.root();
    let a = harness.add(400.0, 0.0, "A");
    let b = harness.add(0.0, 300.0, "B");
    harness.app.add_connection(root, a, None).unwrap();
    harness.app.add_connection(a, b, None).unwrap();
    harness.app.add_connection(b, root, None).unwrap();
    harness.click_node(a, Modifiers::default());
    harness.set_mode(InteractionMode::Connect);
    harness.click_node(b, Modifiers::shift());
    assert_eq!(
        harness.app.interaction_state(),
        InteractionState::AwaitingConnectionTarget(b)
    );

    harness
        .app
        .apply_intents([CanvasIntent::DeleteNode { id: b }]);

    assert_eq!(harness.app.interaction_state(), InteractionState::Idle);
    assert_eq!(harness.app.selected_nodes.ordered(), &[a]);

    assert_eq!(harness.app.graph.connection_count(), 1);
    assert!(
        harness
            .app
            .graph
            .connections()
            .all(|connection| connection.from != b && connection.to != b)
    );
    assert!(!harness.app.selected_nodes.contains(&b));
    let snapshot = harness.app.snapshot();
    assert!(snapshot.connections.iter().all(|view| view.to != b && view.from != b));
}

#[tokio::test]
async fn expand_while_busy_dispatches_nothing() {
    let oracle = Arc::new(CountingOracle::default());
    let mut runtime = CanvasRuntime::new(
        CanvasApp::with_rng_seed(ScreenSize::new(800.0, 600.0), 3),
        oracle.clone(),
    );
    let root = runtime
        .app()
        .graph
        .nodes()
        .next()
        .map(|node| node.id)
        .unwrap();

    runtime.apply_intents([CanvasIntent::ExpandNode { id: root }]);
    assert!(runtime.app().is_busy());
    assert_eq!(runtime.app().busy_message(), Some("Expanding thoughts..."));

    runtime.apply_intents([CanvasIntent::ExpandNode { id: root }]);
    assert_eq!(runtime.app().graph.node_count(), 1);

    settle(&mut runtime).await;

    assert_eq!(oracle.expansions.load(Ordering::SeqCst), 1);
    let app = runtime.shutdown().await;
    assert!(!app.is_busy());
    assert_eq!(app.graph.node_count(), 4);
    assert_eq!(app.graph.connection_count(), 3);
    for node in app.graph.nodes().filter(|node| node.id != root) {
        assert!(node.content.starts_with("Central Idea / "));
        let radius = (node.position - WorldPoint::origin()).length();
        assert!((radius - 350.0).abs() < 1e-2);
    }
}

#[tokio::test]
async fn connection_label_arrives_after_gesture() {
    let oracle = Arc::new(CountingOracle::default());
    let mut runtime = CanvasRuntime::new(CanvasApp::new_for_testing(), oracle.clone());
    let root = runtime.app().graph.nodes().next().unwrap().id;
    let idea = runtime
        .app_mut()
        .add_node(WorldPoint::new(400.0, 0.0), NodeKind::Concept, "Idea");
    runtime.apply_intents([
        CanvasIntent::SetMode {
            mode: InteractionMode::Connect,
        },
        CanvasIntent::CreateConnection {
            from: root,
            to: idea,
        },
    ]);
    assert!(runtime.app().is_busy());
    assert_eq!(runtime.app().busy_message(), None);

    settle(&mut runtime).await;

    let connection = runtime.app().graph.connection_between(root, idea).unwrap();
    assert_eq!(connection.label.as_deref(), Some("leads to"));
    assert_eq!(oracle.labels.load(Ordering::SeqCst), 1);
    runtime.shutdown().await;
}

#[tokio::test]
async fn late_label_for_deleted_node_is_discarded() {
    let mut runtime = CanvasRuntime::new(CanvasApp::new_for_testing(), Arc::new(PlaceholderOracle));
    let root = runtime.app().graph.nodes().next().unwrap().id;
    let idea = runtime
        .app_mut()
        .add_node(WorldPoint::new(400.0, 0.0), NodeKind::Concept, "Idea");
    runtime.apply_intents([CanvasIntent::CreateConnection {
        from: root,
        to: idea,
    }]);
    runtime.apply_intents([CanvasIntent::DeleteNode { id: idea }]);

    settle(&mut runtime).await;

    let app = runtime.shutdown().await;
    assert_eq!(app.graph.connection_count(), 0);
    assert!(!app.is_busy());
}

#[tokio::test]
async fn oracle_failures_only_clear_busy() {
    let mut runtime = CanvasRuntime::new(CanvasApp::new_for_testing(), Arc::new(BrokenOracle));
    let root = runtime.app().graph.nodes().next().unwrap().id;
    let idea = runtime
        .app_mut()
        .add_node(WorldPoint::new(400.0, 0.0), NodeKind::Concept, "Idea");

    runtime.apply_intents([CanvasIntent::CreateConnection {
        from: root,
        to: idea,
    }]);
    settle(&mut runtime).await;
    runtime.apply_intents([CanvasIntent::ExpandNode { id: root }]);
    settle(&mut runtime).await;

    let app = runtime.shutdown().await;
    assert!(!app.is_busy());
    assert_eq!(app.graph.node_count(), 2);
    assert_eq!(app.graph.connection_count(), 1);
    assert_eq!(
        app.graph.connection_between(root, idea).unwrap().label,
        None
    );
    assert_eq!(app.interaction_state(), InteractionState::Idle);
}

#[test]
fn pan_mode_drags_nodes_and_pans_empty_canvas() {
    let mut harness = TestHarness::new();
    let root = harness.root();
    harness.set_mode(InteractionMode::Pan);
    let offset = harness.app.viewport().offset();

    let start = harness.screen_of(root);
    harness.press_at(start, Modifiers::default());
    assert_eq!(
        harness.app.interaction_state(),
        InteractionState::DraggingNode(root)
    );
    harness.move_to(start + ScreenVector::new(40.0, 10.0));
    harness.release_at(start + ScreenVector::new(40.0, 10.0));
    assert_eq!(harness.position(root), WorldPoint::new(40.0, 10.0));
    assert_eq!(harness.app.viewport().offset(), offset);

    let empty = ScreenPoint::new(20.0, 20.0);
    harness.press_at(empty, Modifiers::default());
    assert_eq!(
        harness.app.interaction_state(),
        InteractionState::PanningCanvas
    );
    harness.move_to(empty + ScreenVector::new(0.0, 30.0));
    harness.release_at(empty + ScreenVector::new(0.0, 30.0));
    assert_eq!(
        harness.app.viewport().offset(),
        offset + ScreenVector::new(0.0, 30.0)
    );
}

#[test]
fn selected_node_is_raised_for_hits_and_paint() {
    let mut harness = TestHarness::new();
    let root = harness.root();
    let cover = harness.add(100.0, 50.0, "cover");
    let overlap = harness
        .app
        .viewport()
        .world_to_screen(WorldPoint::new(150.0, 75.0));
    assert_eq!(harness.target_at(overlap), PointerTarget::Node(cover));

    harness.app.apply_intents([CanvasIntent::SelectNode {
        id: root,
        multi: false,
    }]);

    assert_eq!(harness.target_at(overlap), PointerTarget::Node(root));
    let snapshot = harness.app.snapshot();
    assert_eq!(snapshot.nodes.last().map(|node| node.id), Some(root));

    harness.press_at(overlap, Modifiers::default());
    assert_eq!(
        harness.app.interaction_state(),
        InteractionState::DraggingNode(root)
    );
}

struct PanickingOracle;

#[async_trait]
impl SuggestionOracle for PanickingOracle {
    async fn expand(
        &self,
        _content: &str,
        _existing: &[String],
    ) -> Result<Vec<Suggestion>, OracleError> {
        panic!("oracle crashed")
    }

    async fn suggest_label(&self, _from: &str, _to: &str) -> Result<String, OracleError> {
        panic!("oracle crashed")
    }
}

#[tokio::test]
async fn crashing_oracle_never_leaves_canvas_busy() {
    let mut runtime =
        CanvasRuntime::new(CanvasApp::new_for_testing(), Arc::new(PanickingOracle));
    let root = runtime.app().graph.nodes().next().unwrap().id;
    let idea = runtime
        .app_mut()
        .add_node(WorldPoint::new(400.0, 0.0), NodeKind::Concept, "Idea");

    runtime.apply_intents([CanvasIntent::CreateConnection {
        from: root,
        to: idea,
    }]);
    settle(&mut runtime).await;
    runtime.apply_intents([CanvasIntent::ExpandNode { id: root }]);
    assert!(runtime.app().is_busy());
    settle(&mut runtime).await;

    assert!(!runtime.app().is_busy());
    assert_eq!(runtime.app().graph.node_count(), 2);
    assert_eq!(
        runtime.app().graph.connection_between(root, idea).unwrap().label,
        None
    );
    assert!(runtime.app_mut().expand_node(root));
    runtime.shutdown().await;
}

#[tokio::test]
async fn shutdown_hands_back_a_usable_canvas() {
    let oracle = Arc::new(CountingOracle::default());
    let mut runtime = CanvasRuntime::new(CanvasApp::new_for_testing(), oracle);
    let root = runtime.app().graph.nodes().next().unwrap().id;
    runtime.apply_intents([CanvasIntent::ExpandNode { id: root }]);

    let mut app = runtime.shutdown().await;

    assert!(!app.is_busy());
    assert!(app.expand_node(root));
}
