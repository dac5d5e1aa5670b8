/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Pan/zoom camera over the world plane.

use euclid::Scale;
use serde::Serialize;

use crate::geometry::{
    ScreenPoint, ScreenSize, ScreenSpace, ScreenVector, WorldPoint, WorldSpace, screen_to_world,
    world_to_screen,
};

pub const SCALE_MIN: f32 = 0.1;
pub const SCALE_MAX: f32 = 3.0;

/// Pan offset plus zoom scale.
///
/// Together they fully determine the affine map `screen = world * scale + offset`.
/// The scale is kept within [`SCALE_MIN`, `SCALE_MAX`] by every constructor
/// and mutator; the offset is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    offset: ScreenVector,
    scale: f32,
}

impl Viewport {
    pub fn new(offset: ScreenVector, scale: f32) -> Self {
        Self {
            offset,
            scale: Self::clamp_scale(scale),
        }
    }

    /// Viewport at scale 1 that puts `world` at the centre of a surface.
    pub fn centered_on(world: WorldPoint, surface: ScreenSize) -> Self {
        let center = surface.to_vector() / 2.0;
        Self::new(center - world.to_vector().cast_unit::<ScreenSpace>(), 1.0)
    }

    /// Clamp a scale value to the allowed range
    pub fn clamp_scale(scale: f32) -> f32 {
        if scale.is_nan() {
            return 1.0;
        }
        scale.clamp(SCALE_MIN, SCALE_MAX)
    }

    pub fn offset(&self) -> ScreenVector {
        self.offset
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn scale_factor(&self) -> Scale<f32, WorldSpace, ScreenSpace> {
        Scale::new(self.scale)
    }

    pub fn screen_to_world(&self, screen: ScreenPoint) -> WorldPoint {
        screen_to_world(screen, self)
    }

    pub fn world_to_screen(&self, world: WorldPoint) -> ScreenPoint {
        world_to_screen(world, self)
    }

    /// Shift the view by a screen-space delta. Never clamped.
    pub fn pan_by(&mut self, delta: ScreenVector) {
        self.offset += delta;
    }

    /// Change scale by `delta_scale` while keeping the world point under
    /// `anchor` fixed on screen.
    ///
    /// The anchor holds even when the delta saturates the clamp: the offset
    /// is always recomputed from the clamped scale.
    pub fn zoom_at(&mut self, anchor: ScreenPoint, delta_scale: f32) {
        if !delta_scale.is_finite() {
            return;
        }
        let new_scale = Self::clamp_scale(self.scale + delta_scale);
        let world = self.screen_to_world(anchor);
        self.offset =
            anchor.to_vector() - world.to_vector().cast_unit::<ScreenSpace>() * new_scale;
        self.scale = new_scale;
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: ScreenVector::zero(),
            scale: 1.0,
        }
    }
}
