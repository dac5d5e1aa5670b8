/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Suggestion oracle: the external AI collaborator that proposes new ideas
//! and connection labels.
//!
//! The canvas never calls an oracle directly. `CanvasApp` queues
//! [`OracleRequest`]s, the runtime executes them against a
//! [`SuggestionOracle`], and the answers come back as resolution intents.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::graph::{ConnectionId, NodeId};

mod gemini;

pub use gemini::GeminiOracle;

/// Kind tag of a suggested node. The only kind the oracle may propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionKind {
    #[serde(rename = "concept")]
    Concept,
}

/// One suggested idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Suggestion {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
}

impl Suggestion {
    pub fn concept(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: SuggestionKind::Concept,
        }
    }
}

#[derive(Debug)]
pub enum OracleError {
    /// The client could not be constructed.
    Setup(String),
    /// Transport failure (connect, timeout, body read).
    Network(String),
    HttpStatus(u16),
    /// The service answered without any text.
    EmptyResponse,
    /// The answer did not match the expected schema.
    Malformed(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup(reason) => write!(f, "oracle client setup failed: {reason}"),
            Self::Network(reason) => write!(f, "oracle request failed: {reason}"),
            Self::HttpStatus(status) => write!(f, "oracle returned HTTP {status}"),
            Self::EmptyResponse => write!(f, "oracle returned no text"),
            Self::Malformed(reason) => write!(f, "oracle response malformed: {reason}"),
        }
    }
}

impl std::error::Error for OracleError {}

/// Asynchronous content-generation collaborator.
#[async_trait]
pub trait SuggestionOracle: Send + Sync {
    /// Related ideas for `content`, avoiding everything in `existing`.
    async fn expand(&self, content: &str, existing: &[String])
    -> Result<Vec<Suggestion>, OracleError>;

    /// A short phrase linking `from` to `to`.
    async fn suggest_label(&self, from: &str, to: &str) -> Result<String, OracleError>;
}

/// Work queued by the canvas for the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleRequest {
    Expand {
        source: NodeId,
        content: String,
        existing: Vec<String>,
    },
    ConnectionLabel {
        connection: ConnectionId,
        from_content: String,
        to_content: String,
    },
}

/// Deterministic stand-in used when no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderOracle;

impl PlaceholderOracle {
    pub const EXPANSION: [&'static str; 2] = ["Missing API Key", "Check Environment"];
    pub const LABEL: &'static str = "connects to";
}

#[async_trait]
impl SuggestionOracle for PlaceholderOracle {
    async fn expand(
        &self,
        _content: &str,
        _existing: &[String],
    ) -> Result<Vec<Suggestion>, OracleError> {
        log::warn!("oracle: no API key configured, returning placeholder ideas");
        Ok(Self::EXPANSION.into_iter().map(Suggestion::concept).collect())
    }

    async fn suggest_label(&self, _from: &str, _to: &str) -> Result<String, OracleError> {
        Ok(Self::LABEL.to_string())
    }
}
