/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Coordinate spaces and connector geometry for the canvas.
//!
//! Two euclid unit spaces are used throughout the crate:
//! - [`ScreenSpace`]: pixels of the viewing surface.
//! - [`WorldSpace`]: the unbounded logical plane node positions live in.
//!
//! The [`Viewport`] is the only thing that converts between them, so
//! mixing the two is a type error rather than a silent bug.

use std::f32::consts::TAU;

use euclid::{Box2D, Point2D, Size2D, Vector2D};
use serde::Serialize;

use crate::graph::Node;
use crate::viewport::Viewport;

/// Pixel space of the viewing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSpace;

/// Unbounded logical space in which node positions are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldSpace;

pub type ScreenPoint = Point2D<f32, ScreenSpace>;
pub type ScreenVector = Vector2D<f32, ScreenSpace>;
pub type ScreenSize = Size2D<f32, ScreenSpace>;
pub type WorldPoint = Point2D<f32, WorldSpace>;
pub type WorldVector = Vector2D<f32, WorldSpace>;
pub type WorldSize = Size2D<f32, WorldSpace>;
pub type WorldRect = Box2D<f32, WorldSpace>;

/// Width used for nodes that carry no explicit size.
pub const DEFAULT_NODE_WIDTH: f32 = 220.0;
/// Height used for nodes that carry no explicit size.
pub const DEFAULT_NODE_HEIGHT: f32 = 100.0;

/// Upper bound on connector control-point offset, in world units.
const MAX_CURVATURE: f32 = 150.0;

pub fn default_node_size() -> WorldSize {
    WorldSize::new(DEFAULT_NODE_WIDTH, DEFAULT_NODE_HEIGHT)
}

/// Map a screen point into world space: `(screen - offset) / scale`.
pub fn screen_to_world(screen: ScreenPoint, viewport: &Viewport) -> WorldPoint {
    (screen - viewport.offset()) / viewport.scale_factor()
}

/// Map a world point onto the surface: `world * scale + offset`.
///
/// Exact inverse of [`screen_to_world`] for every in-bounds scale.
pub fn world_to_screen(world: WorldPoint, viewport: &Viewport) -> ScreenPoint {
    world * viewport.scale_factor() + viewport.offset()
}

/// Visual centre of a node, using the default size when it has none.
pub fn node_center(node: &Node) -> WorldPoint {
    node.position + node.effective_size().to_vector() / 2.0
}

/// Axis-aligned bounds of a node in world space.
pub fn node_rect(node: &Node) -> WorldRect {
    WorldRect::from_origin_and_size(node.position, node.effective_size())
}

pub fn distance(p1: WorldPoint, p2: WorldPoint) -> f32 {
    p1.distance_to(p2)
}

/// Where a connection label sits: the chord midpoint between the endpoints.
pub fn label_anchor(start: WorldPoint, end: WorldPoint) -> WorldPoint {
    start.lerp(end, 0.5)
}

/// A cubic Bézier connector in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CubicBezier {
    pub start: WorldPoint,
    pub ctrl1: WorldPoint,
    pub ctrl2: WorldPoint,
    pub end: WorldPoint,
}

impl CubicBezier {
    /// Evaluate the curve at `t` in `[0, 1]`.
    pub fn point_at(&self, t: f32) -> WorldPoint {
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let c = 3.0 * mt * t * t;
        let d = t * t * t;
        WorldPoint::new(
            a * self.start.x + b * self.ctrl1.x + c * self.ctrl2.x + d * self.end.x,
            a * self.start.y + b * self.ctrl1.y + c * self.ctrl2.y + d * self.end.y,
        )
    }

    /// SVG path data (`M .. C ..`) for presentation layers that draw paths.
    pub fn to_svg_path(&self) -> String {
        format!(
            "M {} {} C {} {}, {} {}, {} {}",
            self.start.x,
            self.start.y,
            self.ctrl1.x,
            self.ctrl1.y,
            self.ctrl2.x,
            self.ctrl2.y,
            self.end.x,
            self.end.y
        )
    }
}

/// Curved connector between two anchor points.
///
/// Control points pull along the dominant axis of separation: vertically
/// when the horizontal gap is strictly smaller than the vertical one,
/// horizontally otherwise (ties go horizontal).
pub fn connection_path(start: WorldPoint, end: WorldPoint) -> CubicBezier {
    let curvature = (distance(start, end) * 0.5).min(MAX_CURVATURE);
    let horizontal_gap = (start.x - end.x).abs();
    let vertical_gap = (start.y - end.y).abs();

    let pull = if horizontal_gap < vertical_gap {
        WorldVector::new(0.0, curvature)
    } else {
        WorldVector::new(curvature, 0.0)
    };

    CubicBezier {
        start,
        ctrl1: start + pull,
        ctrl2: end - pull,
        end,
    }
}

/// `count` points evenly spaced on a circle, the first at `start_angle`.
pub fn radial_positions(
    center: WorldPoint,
    count: usize,
    radius: f32,
    start_angle: f32,
) -> Vec<WorldPoint> {
    if count == 0 {
        return Vec::new();
    }
    let step = TAU / count as f32;
    (0..count)
        .map(|index| {
            let angle = start_angle + step * index as f32;
            center + WorldVector::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}
