/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Application state management for the mind-map canvas.

use std::collections::{HashSet, VecDeque};
use std::f32::consts::PI;
use std::ops::Deref;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geometry::{
    self, ScreenPoint, ScreenSize, ScreenVector, WorldPoint, WorldSize, WorldVector,
};
use crate::graph::{ConnectionId, ConnectionRejected, Graph, NodeId, NodeKind};
use crate::input::{
    EventDisposition, InputEvent, InteractionContext, InteractionMode, InteractionState,
    PointerInteraction,
};
use crate::oracle::OracleRequest;
use crate::render::{NodeSpatialIndex, RenderSnapshot};
use crate::viewport::Viewport;

/// Distance from the source node at which expansion results are placed.
pub const EXPANSION_RADIUS: f32 = 350.0;

/// Busy message shown while an expansion is outstanding.
pub const EXPANDING_MESSAGE: &str = "Expanding thoughts...";

/// Content of the node every new canvas starts with.
pub const ROOT_CONTENT: &str = "Central Idea";

/// Canonical node-selection state.
///
/// This wraps the selected-node set with explicit metadata so consumers can
/// reason about selection changes deterministically. Clicks never remove a
/// node from the selection; only `remove` and `clear` do.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionState {
    nodes: HashSet<NodeId>,
    order: Vec<NodeId>,
    primary: Option<NodeId>,
    revision: u64,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic revision incremented whenever the selection changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Primary selected node (most recently selected).
    pub fn primary(&self) -> Option<NodeId> {
        self.primary
    }

    /// Selected nodes in the order they were selected.
    pub fn ordered(&self) -> &[NodeId] {
        &self.order
    }

    /// Replace the selection with `id`, or add `id` when `multi_select`.
    pub fn select(&mut self, id: NodeId, multi_select: bool) {
        if multi_select {
            if self.nodes.insert(id) {
                self.order.push(id);
                self.primary = Some(id);
                self.revision = self.revision.saturating_add(1);
            }
            return;
        }

        if self.nodes.len() == 1 && self.primary == Some(id) {
            return;
        }

        self.nodes.clear();
        self.order.clear();
        self.nodes.insert(id);
        self.order.push(id);
        self.primary = Some(id);
        self.revision = self.revision.saturating_add(1);
    }

    /// Drop a node from the selection. Returns whether it was selected.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if !self.nodes.remove(&id) {
            return false;
        }
        self.order.retain(|existing| *existing != id);
        self.primary = self.order.last().copied();
        self.revision = self.revision.saturating_add(1);
        true
    }

    pub fn clear(&mut self) {
        if self.nodes.is_empty() && self.primary.is_none() {
            return;
        }
        self.nodes.clear();
        self.order.clear();
        self.primary = None;
        self.revision = self.revision.saturating_add(1);
    }
}

impl Deref for SelectionState {
    type Target = HashSet<NodeId>;

    fn deref(&self) -> &Self::Target {
        &self.nodes
    }
}

/// Deterministic mutation intent boundary for canvas state updates.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasIntent {
    SetMode {
        mode: InteractionMode,
    },
    SetSurfaceSize {
        size: ScreenSize,
    },
    /// Create an empty concept node whose visual centre is `center`.
    CreateNodeAt {
        center: WorldPoint,
    },
    /// The "+ Idea" action: a new node at the centre of the surface.
    CreateNodeAtSurfaceCenter,
    UpdateNodeContent {
        id: NodeId,
        content: String,
    },
    DeleteNode {
        id: NodeId,
    },
    SelectNode {
        id: NodeId,
        multi: bool,
    },
    ClearSelection,
    TranslateNodes {
        ids: Vec<NodeId>,
        delta: WorldVector,
    },
    PanBy {
        delta: ScreenVector,
    },
    ZoomAt {
        anchor: ScreenPoint,
        delta: f32,
    },
    CreateConnection {
        from: NodeId,
        to: NodeId,
    },
    ExpandNode {
        id: NodeId,
    },
    /// Oracle answer for an expansion. Empty on failure.
    ExpansionResolved {
        source: NodeId,
        suggestions: Vec<String>,
    },
    /// Oracle answer for a connection label. `None` on failure.
    ConnectionLabelResolved {
        connection: ConnectionId,
        label: Option<String>,
    },
}

/// Outstanding oracle work, as seen by the busy indicator.
#[derive(Debug, Clone, Default)]
struct OracleActivity {
    in_flight: usize,
    expanding: bool,
}

impl OracleActivity {
    fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    fn finish(&mut self) {
        if self.in_flight == 0 {
            debug!("canvas: oracle resolution without an outstanding request");
        }
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

/// Main application state
pub struct CanvasApp {
    /// The node and connection store
    pub graph: Graph,

    /// Current pan/zoom transform
    viewport: Viewport,

    /// Currently selected nodes
    pub selected_nodes: SelectionState,

    mode: InteractionMode,

    interaction: PointerInteraction,

    /// Size of the viewing surface in pixels
    surface_size: ScreenSize,

    oracle_activity: OracleActivity,

    /// Requests waiting to be dispatched to the oracle
    pending_oracle_requests: VecDeque<OracleRequest>,

    /// Source of the randomized expansion start angle
    rng: StdRng,
}

impl CanvasApp {
    /// Create a canvas holding only the root idea, centred on the surface.
    pub fn new(surface_size: ScreenSize) -> Self {
        Self::with_rng(surface_size, StdRng::from_entropy())
    }

    /// Same as `new`, with a fixed seed for the expansion layout.
    pub fn with_rng_seed(surface_size: ScreenSize, seed: u64) -> Self {
        Self::with_rng(surface_size, StdRng::seed_from_u64(seed))
    }

    /// Create a new app for testing (800x600 surface, fixed seed)
    pub fn new_for_testing() -> Self {
        Self::with_rng_seed(ScreenSize::new(800.0, 600.0), 7)
    }

    fn with_rng(surface_size: ScreenSize, rng: StdRng) -> Self {
        let mut graph = Graph::new();
        let root = graph.add_node(WorldPoint::origin(), NodeKind::Root, ROOT_CONTENT).id;
        let mut root_center = WorldPoint::origin();
        if let Some(node) = graph.get_node_mut(root) {
            node.size = Some(WorldSize::new(
                geometry::DEFAULT_NODE_WIDTH,
                geometry::DEFAULT_NODE_HEIGHT,
            ));
            root_center = node.center();
        }

        Self {
            graph,
            viewport: Viewport::centered_on(root_center, surface_size),
            selected_nodes: SelectionState::new(),
            mode: InteractionMode::default(),
            interaction: PointerInteraction::new(),
            surface_size,
            oracle_activity: OracleActivity::default(),
            pending_oracle_requests: VecDeque::new(),
            rng,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn surface_size(&self) -> ScreenSize {
        self.surface_size
    }

    pub fn interaction(&self) -> &PointerInteraction {
        &self.interaction
    }

    pub fn interaction_state(&self) -> InteractionState {
        self.interaction.state()
    }

    /// True while any oracle request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.oracle_activity.is_busy()
    }

    /// Status text for the busy indicator, if any.
    pub fn busy_message(&self) -> Option<&'static str> {
        self.oracle_activity.expanding.then_some(EXPANDING_MESSAGE)
    }

    /// Number of oracle requests created but not yet resolved.
    pub fn oracle_requests_in_flight(&self) -> usize {
        self.oracle_activity.in_flight
    }

    /// Feed one device event through the pointer state machine and apply
    /// the resulting intents.
    pub fn handle_input(&mut self, event: InputEvent) -> EventDisposition {
        let ctx = InteractionContext {
            mode: self.mode,
            viewport: &self.viewport,
            selection: &self.selected_nodes,
        };
        let (intents, disposition) = self.interaction.handle(event, &ctx);
        self.apply_intents(intents);
        disposition
    }

    /// Apply a batch of intents deterministically in insertion order.
    pub fn apply_intents<I>(&mut self, intents: I)
    where
        I: IntoIterator<Item = CanvasIntent>,
    {
        for intent in intents {
            self.apply_intent(intent);
        }
    }

    fn apply_intent(&mut self, intent: CanvasIntent) {
        match intent {
            CanvasIntent::SetMode { mode } => {
                self.mode = mode;
                self.interaction.on_mode_changed(mode);
            },
            CanvasIntent::SetSurfaceSize { size } => self.surface_size = size,
            CanvasIntent::CreateNodeAt { center } => {
                self.create_node_centered_at(center);
            },
            CanvasIntent::CreateNodeAtSurfaceCenter => {
                let center = self.viewport.screen_to_world(self.surface_center());
                self.create_node_centered_at(center);
            },
            CanvasIntent::UpdateNodeContent { id, content } => {
                if !self.update_node_content(id, content) {
                    debug!("canvas: content update for missing {id}");
                }
            },
            CanvasIntent::DeleteNode { id } => {
                self.delete_node(id);
            },
            CanvasIntent::SelectNode { id, multi } => self.select_node(id, multi),
            CanvasIntent::ClearSelection => self.selected_nodes.clear(),
            CanvasIntent::TranslateNodes { ids, delta } => {
                for id in ids {
                    self.graph.translate_node(id, delta);
                }
            },
            CanvasIntent::PanBy { delta } => self.viewport.pan_by(delta),
            CanvasIntent::ZoomAt { anchor, delta } => self.viewport.zoom_at(anchor, delta),
            CanvasIntent::CreateConnection { from, to } => {
                self.create_connection(from, to);
            },
            CanvasIntent::ExpandNode { id } => {
                self.expand_node(id);
            },
            CanvasIntent::ExpansionResolved {
                source,
                suggestions,
            } => self.merge_expansion(source, suggestions),
            CanvasIntent::ConnectionLabelResolved { connection, label } => {
                self.oracle_activity.finish();
                if let Some(label) = label
                    && !self.graph.set_connection_label(connection, Some(label))
                {
                    debug!("canvas: label for removed {connection} discarded");
                }
            },
        }
    }

    /// Add a node to the store. Never touches the selection.
    pub fn add_node(
        &mut self,
        position: WorldPoint,
        kind: NodeKind,
        content: impl Into<String>,
    ) -> NodeId {
        self.graph.add_node(position, kind, content).id
    }

    pub fn update_node_content(&mut self, id: NodeId, content: impl Into<String>) -> bool {
        self.graph.update_node_content(id, content)
    }

    /// Remove a node, its connections, its selection entry, and any
    /// interaction state referring to it, all in one step.
    pub fn delete_node(&mut self, id: NodeId) -> bool {
        if self.graph.remove_node(id).is_none() {
            debug!("canvas: delete of missing {id} ignored");
            return false;
        }
        self.selected_nodes.remove(id);
        self.interaction.forget_node(id);
        true
    }

    pub fn select_node(&mut self, id: NodeId, multi_select: bool) {
        if !self.graph.contains_node(id) {
            debug!("canvas: select of missing {id} ignored");
            return;
        }
        self.selected_nodes.select(id, multi_select);
    }

    /// Connect two nodes without asking the oracle for a label.
    pub fn add_connection(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: Option<String>,
    ) -> Result<ConnectionId, ConnectionRejected> {
        self.graph
            .add_connection(from, to, label)
            .map(|connection| connection.id)
    }

    /// Connect two nodes and queue a label request for the new connection.
    ///
    /// Rejections (duplicate, self-loop, missing endpoint) are expected
    /// races and only logged.
    pub fn create_connection(&mut self, from: NodeId, to: NodeId) -> Option<ConnectionId> {
        match self.add_connection(from, to, None) {
            Ok(connection) => {
                self.request_connection_label(connection);
                Some(connection)
            },
            Err(rejected) => {
                debug!("canvas: connection {from} -> {to} rejected: {rejected}");
                None
            },
        }
    }

    /// Queue a label request for an existing connection. Never busy-gated.
    pub fn request_connection_label(&mut self, connection: ConnectionId) -> bool {
        let Some(request) = self.label_request(connection) else {
            debug!("canvas: label request for missing {connection} ignored");
            return false;
        };
        self.queue_oracle_request(request);
        true
    }

    fn label_request(&self, connection: ConnectionId) -> Option<OracleRequest> {
        let connection = self.graph.get_connection(connection)?;
        Some(OracleRequest::ConnectionLabel {
            connection: connection.id,
            from_content: self.graph.get_node(connection.from)?.content.clone(),
            to_content: self.graph.get_node(connection.to)?.content.clone(),
        })
    }

    /// Ask the oracle for related ideas around a node.
    ///
    /// Single-flight: returns `false` without queuing anything while any
    /// oracle request is outstanding, or when the node does not exist.
    pub fn expand_node(&mut self, id: NodeId) -> bool {
        if self.is_busy() {
            debug!("canvas: expansion of {id} rejected while busy");
            return false;
        }
        let Some(node) = self.graph.get_node(id) else {
            debug!("canvas: expansion of missing {id} ignored");
            return false;
        };
        let request = OracleRequest::Expand {
            source: id,
            content: node.content.clone(),
            existing: self.graph.contents(),
        };
        self.oracle_activity.expanding = true;
        self.queue_oracle_request(request);
        true
    }

    /// Hand queued oracle requests to whoever executes them. Each one must
    /// eventually come back as exactly one resolution intent.
    pub fn take_oracle_requests(&mut self) -> Vec<OracleRequest> {
        self.pending_oracle_requests.drain(..).collect()
    }

    /// Drop every outstanding oracle request, queued or dispatched. Their
    /// resolutions must never be applied afterwards.
    pub(crate) fn abandon_oracle_requests(&mut self) {
        if self.oracle_activity.in_flight > 0 {
            debug!(
                "canvas: abandoning {} oracle requests",
                self.oracle_activity.in_flight
            );
        }
        self.pending_oracle_requests.clear();
        self.oracle_activity = OracleActivity::default();
    }

    /// Topmost node under a screen point. Selected nodes are raised.
    pub fn node_at_screen_point(&self, point: ScreenPoint) -> Option<NodeId> {
        NodeSpatialIndex::build(&self.graph, &self.selected_nodes)
            .topmost_at(self.viewport.screen_to_world(point))
    }

    /// Read-only projection for the presentation layer.
    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot::build(self)
    }

    fn queue_oracle_request(&mut self, request: OracleRequest) {
        self.oracle_activity.in_flight += 1;
        self.pending_oracle_requests.push_back(request);
    }

    fn surface_center(&self) -> ScreenPoint {
        (self.surface_size.to_vector() / 2.0).to_point()
    }

    fn create_node_centered_at(&mut self, center: WorldPoint) -> NodeId {
        let position = center - geometry::default_node_size().to_vector() / 2.0;
        self.add_node(position, NodeKind::Concept, "")
    }

    /// Lay suggestions out on a circle around the source's position and add
    /// one node plus one source-to-node connection per suggestion.
    fn merge_expansion(&mut self, source: NodeId, suggestions: Vec<String>) {
        self.oracle_activity.finish();
        self.oracle_activity.expanding = false;
        if suggestions.is_empty() {
            return;
        }
        let Some(center) = self.graph.get_node(source).map(|node| node.position) else {
            debug!("canvas: expansion for removed {source} discarded");
            return;
        };

        let start_angle = self.rng.gen_range(0.0..PI);
        let positions =
            geometry::radial_positions(center, suggestions.len(), EXPANSION_RADIUS, start_angle);
        for (content, position) in suggestions.into_iter().zip(positions) {
            let id = self.add_node(position, NodeKind::Concept, content);
            if let Err(rejected) = self.graph.add_connection(source, id, None) {
                debug!("canvas: expansion link to {id} rejected: {rejected}");
            }
        }
    }
}
