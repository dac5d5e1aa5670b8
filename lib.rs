/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Infinite pan/zoom mind-map canvas engine.
//!
//! The crate owns the viewport transform, the pointer state machine, the
//! node/connection store and the glue to an asynchronous suggestion oracle.
//! Drawing is left to the host, which reads a [`RenderSnapshot`] after every
//! change.

pub mod app;
pub mod config;
pub mod geometry;
pub mod graph;
pub mod input;
pub mod oracle;
pub mod render;
pub mod runtime;
pub mod viewport;

pub use app::{CanvasApp, CanvasIntent, SelectionState};
pub use config::{CanvasConfig, OracleConfig, build_oracle};
pub use graph::{Connection, ConnectionId, ConnectionRejected, Graph, Node, NodeId, NodeKind};
pub use input::{
    EventDisposition, InputEvent, InteractionMode, InteractionState, Modifiers, PointerButton,
    PointerCapture, PointerTarget,
};
pub use oracle::{OracleError, OracleRequest, Suggestion, SuggestionOracle};
pub use render::RenderSnapshot;
pub use runtime::{CanvasRuntime, OracleWorkers};
pub use viewport::Viewport;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
