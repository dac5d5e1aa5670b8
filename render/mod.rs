/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Read-only projection of canvas state for a presentation layer.
//!
//! A [`RenderSnapshot`] is a pure function of `CanvasApp` state: hosts
//! rebuild it after every change and draw from it, never from the live
//! store. Connections carry resolved endpoints so a snapshot never refers to
//! a node it does not contain.

use serde::Serialize;

use crate::app::CanvasApp;
use crate::geometry::{self, CubicBezier, WorldPoint, WorldSize};
use crate::graph::{ConnectionId, Node, NodeId, NodeKind};
use crate::input::{InteractionMode, InteractionState};
use crate::viewport::Viewport;

mod spatial_index;

pub use spatial_index::NodeSpatialIndex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub content: String,
    pub kind: NodeKind,
    /// Top-left corner in world space
    pub position: WorldPoint,
    /// Effective size (default size when the node has none)
    pub size: WorldSize,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionView {
    pub id: ConnectionId,
    pub from: NodeId,
    pub to: NodeId,
    /// Centre of the `from` node
    pub start: WorldPoint,
    /// Centre of the `to` node
    pub end: WorldPoint,
    pub path: CubicBezier,
    pub svg_path: String,
    pub label: Option<String>,
    pub label_anchor: WorldPoint,
}

/// Dashed line from the pending connection source to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreviewLine {
    pub from: WorldPoint,
    pub to: WorldPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSnapshot {
    /// Back to front: unselected, then selected, each in creation order
    pub nodes: Vec<NodeView>,
    pub connections: Vec<ConnectionView>,
    pub preview: Option<PreviewLine>,
    pub viewport: Viewport,
    /// Selection order, oldest first
    pub selection: Vec<NodeId>,
    pub mode: InteractionMode,
    pub interaction: InteractionState,
    pub pointer_captured: bool,
    pub busy: bool,
    pub busy_message: Option<String>,
}

impl RenderSnapshot {
    pub(crate) fn build(app: &CanvasApp) -> Self {
        let graph = &app.graph;
        let mut nodes: Vec<NodeView> = graph
            .nodes_in_paint_order()
            .into_iter()
            .map(|node| node_view(node, app.selected_nodes.contains(&node.id)))
            .collect();
        // Selected nodes are raised above the rest.
        nodes.sort_by_key(|node| node.selected);

        let connections = graph
            .connections()
            .filter_map(|connection| {
                let start = graph.get_node(connection.from)?.center();
                let end = graph.get_node(connection.to)?.center();
                let path = geometry::connection_path(start, end);
                Some(ConnectionView {
                    id: connection.id,
                    from: connection.from,
                    to: connection.to,
                    start,
                    end,
                    svg_path: path.to_svg_path(),
                    path,
                    label: connection.label.clone(),
                    label_anchor: geometry::label_anchor(start, end),
                })
            })
            .collect();

        let interaction = app.interaction();
        let preview = match app.mode() {
            InteractionMode::Connect => interaction
                .pending_source()
                .and_then(|source| graph.get_node(source))
                .map(|source| {
                    let from = source.center();
                    PreviewLine {
                        from,
                        to: interaction.cursor_world().unwrap_or(from),
                    }
                }),
            InteractionMode::Select | InteractionMode::Pan => None,
        };

        Self {
            nodes,
            connections,
            preview,
            viewport: *app.viewport(),
            selection: app.selected_nodes.ordered().to_vec(),
            mode: app.mode(),
            interaction: interaction.state(),
            pointer_captured: interaction.has_pointer_capture(),
            busy: app.is_busy(),
            busy_message: app.busy_message().map(str::to_string),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeView> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

fn node_view(node: &Node, selected: bool) -> NodeView {
    NodeView {
        id: node.id,
        content: node.content.clone(),
        kind: node.kind,
        position: node.position,
        size: node.effective_size(),
        selected,
    }
}
