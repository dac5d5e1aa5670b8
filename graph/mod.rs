/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Node and connection store for the mind map.
//!
//! Core structures:
//! - `Graph`: Main container backed by petgraph::StableGraph
//! - `Node`: A thought card with position, content, and kind
//! - `Connection`: A link between two nodes with an optional label
//!
//! Removing a node removes its incident connections in the same call, so no
//! reader can ever see a connection that points at a missing node.

use std::collections::HashMap;
use std::fmt;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{self, WorldPoint, WorldRect, WorldSize, WorldVector};

/// Stable node handle (petgraph NodeIndex, survives other deletions)
pub(crate) type NodeKey = NodeIndex;

/// Stable edge handle (petgraph EdgeIndex)
pub(crate) type EdgeKey = EdgeIndex;

/// Public node identity. Never reused, never changes after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Public connection identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection:{}", self.0)
    }
}

/// Variant tag of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// The central idea a map grows from (one expected, not enforced)
    Root,

    /// A regular thought
    #[default]
    Concept,

    /// Free-form note
    Note,

    /// Image card
    Image,
}

/// A thought card on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Stable node identity.
    pub id: NodeId,

    /// Text shown on the card
    pub content: String,

    /// Top-left corner in world space
    pub position: WorldPoint,

    pub kind: NodeKind,

    /// Explicit size; `None` means the default card size
    pub size: Option<WorldSize>,

    /// Creation order, used for paint order and hit-test priority.
    pub(crate) sequence: u64,
}

impl Node {
    pub fn effective_size(&self) -> WorldSize {
        self.size.unwrap_or_else(geometry::default_node_size)
    }

    pub fn center(&self) -> WorldPoint {
        geometry::node_center(self)
    }

    pub fn rect(&self) -> WorldRect {
        geometry::node_rect(self)
    }

    /// A node that belongs to no graph, for geometry tests.
    #[cfg(test)]
    pub(crate) fn detached(position: WorldPoint) -> Self {
        Self {
            id: NodeId::new(),
            content: String::new(),
            position,
            kind: NodeKind::Concept,
            size: None,
            sequence: 0,
        }
    }
}

/// A link between two nodes.
///
/// Direction (`from` → `to`) only matters for rendering; duplicate
/// detection treats the pair as unordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub from: NodeId,
    pub to: NodeId,
    /// Filled in asynchronously after creation
    pub label: Option<String>,
}

/// Why `add_connection` refused to create an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRejected {
    /// Both endpoints are the same node
    SelfLoop,
    /// The unordered pair is already connected
    Duplicate(ConnectionId),
    /// One of the endpoints is not in the graph
    MissingEndpoint(NodeId),
}

impl fmt::Display for ConnectionRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfLoop => write!(f, "self-loop connections are not allowed"),
            Self::Duplicate(existing) => write!(f, "pair already connected by {existing}"),
            Self::MissingEndpoint(id) => write!(f, "endpoint {id} does not exist"),
        }
    }
}

impl std::error::Error for ConnectionRejected {}

/// Main graph structure backed by petgraph::StableGraph
#[derive(Clone, Default)]
pub struct Graph {
    /// The underlying petgraph stable graph
    inner: StableGraph<Node, Connection, Directed>,

    /// Stable node id to index mapping.
    id_to_node: HashMap<NodeId, NodeKey>,

    /// Stable connection id to index mapping.
    id_to_edge: HashMap<ConnectionId, EdgeKey>,

    next_sequence: u64,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node with a fresh identity and append it to the map.
    pub fn add_node(
        &mut self,
        position: WorldPoint,
        kind: NodeKind,
        content: impl Into<String>,
    ) -> &Node {
        let id = NodeId::new();
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let key = self.inner.add_node(Node {
            id,
            content: content.into(),
            position,
            kind,
            size: None,
            sequence,
        });
        self.id_to_node.insert(id, key);
        &self.inner[key]
    }

    /// Replace the content of a node. Returns `false` if it does not exist.
    pub fn update_node_content(&mut self, id: NodeId, content: impl Into<String>) -> bool {
        match self.get_node_mut(id) {
            Some(node) => {
                node.content = content.into();
                true
            },
            None => false,
        }
    }

    /// Move a node by a world-space delta. Returns `false` if it does not exist.
    pub fn translate_node(&mut self, id: NodeId, delta: WorldVector) -> bool {
        match self.get_node_mut(id) {
            Some(node) => {
                node.position += delta;
                true
            },
            None => false,
        }
    }

    /// Remove a node and every connection that references it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let key = self.id_to_node.remove(&id)?;
        let incident: Vec<ConnectionId> = self
            .inner
            .edges_directed(key, Direction::Outgoing)
            .chain(self.inner.edges_directed(key, Direction::Incoming))
            .map(|edge| edge.weight().id)
            .collect();
        for connection in incident {
            self.id_to_edge.remove(&connection);
        }
        // StableGraph drops incident edges together with the node.
        self.inner.remove_node(key)
    }

    /// Connect two distinct, existing, not-yet-connected nodes.
    pub fn add_connection(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: Option<String>,
    ) -> Result<&Connection, ConnectionRejected> {
        if from == to {
            return Err(ConnectionRejected::SelfLoop);
        }
        let from_key = self
            .node_key(from)
            .ok_or(ConnectionRejected::MissingEndpoint(from))?;
        let to_key = self
            .node_key(to)
            .ok_or(ConnectionRejected::MissingEndpoint(to))?;
        if let Some((existing, _)) = self.inner.find_edge_undirected(from_key, to_key) {
            return Err(ConnectionRejected::Duplicate(self.inner[existing].id));
        }

        let id = ConnectionId::new();
        let key = self.inner.add_edge(
            from_key,
            to_key,
            Connection {
                id,
                from,
                to,
                label,
            },
        );
        self.id_to_edge.insert(id, key);
        Ok(&self.inner[key])
    }

    /// Set a connection's label. A connection that has since been removed
    /// is not an error; the call just reports `false`.
    pub fn set_connection_label(&mut self, id: ConnectionId, label: Option<String>) -> bool {
        let Some(key) = self.id_to_edge.get(&id).copied() else {
            return false;
        };
        match self.inner.edge_weight_mut(key) {
            Some(connection) => {
                connection.label = label;
                true
            },
            None => false,
        }
    }

    /// Get a node by id
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.inner.node_weight(self.node_key(id)?)
    }

    /// Get a mutable node by id
    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let key = self.node_key(id)?;
        self.inner.node_weight_mut(key)
    }

    pub fn get_connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.inner.edge_weight(*self.id_to_edge.get(&id)?)
    }

    /// Connection between two nodes in either direction.
    pub fn connection_between(&self, a: NodeId, b: NodeId) -> Option<&Connection> {
        let (edge, _) = self
            .inner
            .find_edge_undirected(self.node_key(a)?, self.node_key(b)?)?;
        self.inner.edge_weight(edge)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.id_to_node.contains_key(&id)
    }

    /// Iterate over all nodes (storage order)
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner.node_weights()
    }

    /// Nodes ordered oldest first, which is also back-to-front paint order.
    pub fn nodes_in_paint_order(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes().collect();
        nodes.sort_by_key(|node| node.sequence);
        nodes
    }

    /// Iterate over all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.inner.edge_weights()
    }

    /// Connections with `id` at either end.
    pub fn connections_touching(&self, id: NodeId) -> Vec<&Connection> {
        let Some(key) = self.node_key(id) else {
            return Vec::new();
        };
        self.inner
            .edges_directed(key, Direction::Outgoing)
            .chain(self.inner.edges_directed(key, Direction::Incoming))
            .map(|edge| edge.weight())
            .collect()
    }

    /// Contents of every node, oldest first.
    pub fn contents(&self) -> Vec<String> {
        self.nodes_in_paint_order()
            .into_iter()
            .map(|node| node.content.clone())
            .collect()
    }

    /// Count of nodes in the graph
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Count of connections in the graph
    pub fn connection_count(&self) -> usize {
        self.inner.edge_count()
    }

    fn node_key(&self, id: NodeId) -> Option<NodeKey> {
        self.id_to_node.get(&id).copied()
    }
}
