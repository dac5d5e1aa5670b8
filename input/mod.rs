/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Pointer and wheel handling for the canvas.
//!
//! This module decouples input interpretation from state mutation: the
//! [`PointerInteraction`] state machine turns raw device events into
//! [`CanvasIntent`]s, and `CanvasApp::apply_intents` applies them. Hosts
//! forward every pointer/wheel event here and honour the returned
//! [`EventDisposition`] (suppress the platform default, capture or release
//! the pointer).

use serde::{Deserialize, Serialize};

use crate::app::{CanvasIntent, SelectionState};
use crate::geometry::{ScreenPoint, ScreenVector, WorldPoint, WorldSpace};
use crate::graph::NodeId;
use crate::viewport::Viewport;

/// Scale change per wheel delta unit while precision-zooming.
pub const WHEEL_ZOOM_SENSITIVITY: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
    /// The space bar is held (hand tool).
    pub space: bool,
}

impl Modifiers {
    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::default()
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::default()
        }
    }

    pub fn space() -> Self {
        Self {
            space: true,
            ..Self::default()
        }
    }

    /// Wheel events zoom instead of pan.
    pub fn precision_zoom(&self) -> bool {
        self.ctrl || self.meta
    }

    /// Node presses add to the selection instead of replacing it.
    pub fn multi_select(&self) -> bool {
        self.shift
    }
}

/// What the pointer landed on, as resolved by the host (or by
/// `CanvasApp::node_at_screen_point`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Canvas,
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown {
        position: ScreenPoint,
        button: PointerButton,
        target: PointerTarget,
        modifiers: Modifiers,
    },
    PointerMove {
        position: ScreenPoint,
    },
    PointerUp {
        position: ScreenPoint,
    },
    DoubleClick {
        position: ScreenPoint,
        target: PointerTarget,
    },
    Wheel {
        position: ScreenPoint,
        delta: ScreenVector,
        modifiers: Modifiers,
    },
}

/// Global tool mode. Decides how a press on a node is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    #[default]
    Select,
    Pan,
    Connect,
}

/// Observable interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "node", rename_all = "snake_case")]
pub enum InteractionState {
    Idle,
    PanningCanvas,
    DraggingNode(NodeId),
    AwaitingConnectionTarget(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerCapture {
    Acquire,
    Release,
}

/// What the host should do with the platform event after handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventDisposition {
    /// Suppress the platform's default scroll/zoom behaviour.
    pub prevent_default: bool,
    pub capture: Option<PointerCapture>,
}

impl EventDisposition {
    fn capture(capture: PointerCapture) -> Self {
        Self {
            prevent_default: false,
            capture: Some(capture),
        }
    }

    fn prevent_default() -> Self {
        Self {
            prevent_default: true,
            capture: None,
        }
    }
}

/// Read-only view of application state the state machine consults.
#[derive(Debug, Clone, Copy)]
pub struct InteractionContext<'a> {
    pub mode: InteractionMode,
    pub viewport: &'a Viewport,
    pub selection: &'a SelectionState,
}

/// The gesture currently owning the pointer. At most one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PointerGesture {
    #[default]
    None,
    Panning,
    Dragging(NodeId),
}

/// Pointer state machine: pan, drag, connect and wheel handling.
#[derive(Debug, Clone, Default)]
pub struct PointerInteraction {
    gesture: PointerGesture,
    pending_source: Option<NodeId>,
    last_pointer: Option<ScreenPoint>,
    cursor_world: Option<WorldPoint>,
}

impl PointerInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> InteractionState {
        match (self.gesture, self.pending_source) {
            (PointerGesture::Panning, _) => InteractionState::PanningCanvas,
            (PointerGesture::Dragging(id), _) => InteractionState::DraggingNode(id),
            (PointerGesture::None, Some(source)) => {
                InteractionState::AwaitingConnectionTarget(source)
            },
            (PointerGesture::None, None) => InteractionState::Idle,
        }
    }

    /// First endpoint picked in connect mode, if any.
    pub fn pending_source(&self) -> Option<NodeId> {
        self.pending_source
    }

    /// World position of the pointer at the last pointer event.
    pub fn cursor_world(&self) -> Option<WorldPoint> {
        self.cursor_world
    }

    /// Whether a pan or drag gesture currently holds the pointer.
    pub fn has_pointer_capture(&self) -> bool {
        self.gesture != PointerGesture::None
    }

    /// Leaving connect mode aborts a half-made connection.
    pub fn on_mode_changed(&mut self, mode: InteractionMode) {
        if mode != InteractionMode::Connect && self.pending_source.take().is_some() {
            log::debug!("canvas: pending connection aborted by mode change");
        }
    }

    /// Drop every reference to a node that no longer exists.
    pub fn forget_node(&mut self, id: NodeId) {
        if self.pending_source == Some(id) {
            self.pending_source = None;
        }
        if self.gesture == PointerGesture::Dragging(id) {
            self.gesture = PointerGesture::None;
        }
    }

    /// Interpret one device event. Intents must be applied before the next
    /// event is handled.
    pub fn handle(
        &mut self,
        event: InputEvent,
        ctx: &InteractionContext<'_>,
    ) -> (Vec<CanvasIntent>, EventDisposition) {
        match event {
            InputEvent::PointerDown {
                position,
                button,
                target,
                modifiers,
            } => self.on_pointer_down(position, button, target, modifiers, ctx),
            InputEvent::PointerMove { position } => {
                (self.on_pointer_move(position, ctx), EventDisposition::default())
            },
            InputEvent::PointerUp { position } => (Vec::new(), self.on_pointer_up(position, ctx)),
            InputEvent::DoubleClick { position, target } => {
                (self.on_double_click(position, target, ctx), EventDisposition::default())
            },
            InputEvent::Wheel {
                position,
                delta,
                modifiers,
            } => (
                Self::on_wheel(position, delta, modifiers),
                EventDisposition::prevent_default(),
            ),
        }
    }

    fn on_pointer_down(
        &mut self,
        position: ScreenPoint,
        button: PointerButton,
        target: PointerTarget,
        modifiers: Modifiers,
        ctx: &InteractionContext<'_>,
    ) -> (Vec<CanvasIntent>, EventDisposition) {
        if self.gesture != PointerGesture::None {
            log::debug!("canvas: pointer-down ignored, gesture {:?} active", self.gesture);
            return (Vec::new(), EventDisposition::default());
        }
        self.track_pointer(position, ctx);

        let pan_mode_on_canvas =
            ctx.mode == InteractionMode::Pan && target == PointerTarget::Canvas;
        if button == PointerButton::Middle || modifiers.space || pan_mode_on_canvas {
            self.gesture = PointerGesture::Panning;
            return (Vec::new(), EventDisposition::capture(PointerCapture::Acquire));
        }

        let id = match target {
            PointerTarget::Canvas => {
                self.pending_source = None;
                return (vec![CanvasIntent::ClearSelection], EventDisposition::default());
            },
            PointerTarget::Node(id) => id,
        };

        let mut intents = vec![CanvasIntent::SelectNode {
            id,
            multi: modifiers.multi_select(),
        }];

        if ctx.mode == InteractionMode::Connect {
            match self.pending_source.take() {
                None => self.pending_source = Some(id),
                Some(source) if source != id => {
                    intents.push(CanvasIntent::CreateConnection {
                        from: source,
                        to: id,
                    });
                },
                Some(_) => log::debug!("canvas: pending connection aborted on its source"),
            }
            return (intents, EventDisposition::default());
        }

        self.gesture = PointerGesture::Dragging(id);
        (intents, EventDisposition::capture(PointerCapture::Acquire))
    }

    fn on_pointer_move(
        &mut self,
        position: ScreenPoint,
        ctx: &InteractionContext<'_>,
    ) -> Vec<CanvasIntent> {
        let previous = self.track_pointer(position, ctx);
        let delta = previous.map_or(ScreenVector::zero(), |previous| position - previous);
        if delta == ScreenVector::zero() {
            return Vec::new();
        }

        match self.gesture {
            PointerGesture::None => Vec::new(),
            PointerGesture::Panning => vec![CanvasIntent::PanBy { delta }],
            PointerGesture::Dragging(id) => {
                let delta = (delta / ctx.viewport.scale()).cast_unit::<WorldSpace>();
                let ids = if ctx.selection.contains(&id) && ctx.selection.len() > 1 {
                    ctx.selection.ordered().to_vec()
                } else {
                    vec![id]
                };
                vec![CanvasIntent::TranslateNodes { ids, delta }]
            },
        }
    }

    fn on_pointer_up(
        &mut self,
        position: ScreenPoint,
        ctx: &InteractionContext<'_>,
    ) -> EventDisposition {
        self.track_pointer(position, ctx);
        match std::mem::take(&mut self.gesture) {
            PointerGesture::None => EventDisposition::default(),
            PointerGesture::Panning | PointerGesture::Dragging(_) => {
                EventDisposition::capture(PointerCapture::Release)
            },
        }
    }

    fn on_double_click(
        &mut self,
        position: ScreenPoint,
        target: PointerTarget,
        ctx: &InteractionContext<'_>,
    ) -> Vec<CanvasIntent> {
        match target {
            PointerTarget::Canvas => vec![CanvasIntent::CreateNodeAt {
                center: ctx.viewport.screen_to_world(position),
            }],
            PointerTarget::Node(_) => Vec::new(),
        }
    }

    fn on_wheel(anchor: ScreenPoint, delta: ScreenVector, modifiers: Modifiers) -> Vec<CanvasIntent> {
        if modifiers.precision_zoom() {
            vec![CanvasIntent::ZoomAt {
                anchor,
                delta: -delta.y * WHEEL_ZOOM_SENSITIVITY,
            }]
        } else {
            vec![CanvasIntent::PanBy { delta: -delta }]
        }
    }

    /// Record the pointer position, returning the previous one.
    fn track_pointer(
        &mut self,
        position: ScreenPoint,
        ctx: &InteractionContext<'_>,
    ) -> Option<ScreenPoint> {
        self.cursor_world = Some(ctx.viewport.screen_to_world(position));
        self.last_pointer.replace(position)
    }
}
