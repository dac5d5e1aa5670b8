/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Spatial index for node hit-testing.
//!
//! Nodes are indexed by their world-space bounds so pointer hit tests use an
//! R*-tree instead of a full O(n) node scan.

use std::collections::HashSet;

use rstar::{AABB, RTree, RTreeObject};

use crate::geometry::{WorldPoint, WorldRect};
use crate::graph::{Graph, NodeId};

/// A node entry stored in the R*-tree.
struct IndexedNode {
    envelope: AABB<[f32; 2]>,
    id: NodeId,
    /// Paint rank: selected nodes are raised, then creation order.
    rank: (bool, u64),
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn aabb(rect: &WorldRect) -> AABB<[f32; 2]> {
    AABB::from_corners([rect.min.x, rect.min.y], [rect.max.x, rect.max.y])
}

/// Spatial index mapping world-space positions to `NodeId`s.
///
/// Queries operate in world space; callers convert screen coordinates with
/// `Viewport::screen_to_world` first.
pub struct NodeSpatialIndex {
    tree: RTree<IndexedNode>,
}

impl NodeSpatialIndex {
    /// Build the index from every node's effective bounds.
    pub fn build(graph: &Graph, selected: &HashSet<NodeId>) -> Self {
        let entries: Vec<_> = graph
            .nodes()
            .map(|node| IndexedNode {
                envelope: aabb(&node.rect()),
                id: node.id,
                rank: (selected.contains(&node.id), node.sequence),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Topmost node whose bounds contain `point` (boundary inclusive).
    /// Selected nodes sit above unselected ones.
    pub fn topmost_at(&self, point: WorldPoint) -> Option<NodeId> {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([point.x, point.y]))
            .max_by_key(|entry| entry.rank)
            .map(|entry| entry.id)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
