/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Oracle workers: async execution of queued oracle requests.
//!
//! Each dispatched [`OracleRequest`] runs as one supervised task that sends
//! exactly one resolution intent back through the channel, whatever the
//! oracle does. A task that panics is answered with an empty resolution
//! when it is reaped. The canvas stays synchronous: the caller drains
//! resolutions with [`OracleWorkers::drain_pending`] and applies them itself.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::app::CanvasIntent;
use crate::oracle::{OracleRequest, SuggestionOracle};

/// Capacity of the resolution channel.
const RESOLUTION_CHANNEL_CAPACITY: usize = 64;

/// Resolution intent with timing for diagnostics.
#[derive(Debug, Clone)]
pub(crate) struct QueuedResolution {
    pub(crate) intent: CanvasIntent,
    pub(crate) dispatched_at: Instant,
}

/// Owns:
/// - a resolution `mpsc` channel (capacity [`RESOLUTION_CHANNEL_CAPACITY`])
/// - a shared [`CancellationToken`] for shutdown
/// - a [`JoinSet`] supervising in-flight oracle calls
/// - the empty resolution owed for each task, in case it dies unanswered
pub struct OracleWorkers {
    resolution_tx: mpsc::Sender<QueuedResolution>,
    resolution_rx: mpsc::Receiver<QueuedResolution>,
    cancel: CancellationToken,
    workers: JoinSet<()>,
    unanswered: HashMap<task::Id, CanvasIntent>,
    failed: VecDeque<CanvasIntent>,
}

impl OracleWorkers {
    pub fn new() -> Self {
        let (resolution_tx, resolution_rx) = mpsc::channel(RESOLUTION_CHANNEL_CAPACITY);
        Self {
            resolution_tx,
            resolution_rx,
            cancel: CancellationToken::new(),
            workers: JoinSet::new(),
            unanswered: HashMap::new(),
            failed: VecDeque::new(),
        }
    }

    /// Run one request on a supervised task. Must be called from within a
    /// tokio runtime.
    pub fn dispatch(&mut self, request: OracleRequest, oracle: Arc<dyn SuggestionOracle>) {
        let cancel = self.cancel.clone();
        let tx = self.resolution_tx.clone();
        let dispatched_at = Instant::now();
        let fallback = empty_resolution(&request);
        let handle = self.workers.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("oracle_workers: request cancelled");
                }
                intent = resolve(oracle.as_ref(), request) => {
                    let queued = QueuedResolution { intent, dispatched_at };
                    if tx.send(queued).await.is_err() {
                        log::debug!("oracle_workers: resolution dropped, receiver closed");
                    }
                }
            }
        });
        self.unanswered.insert(handle.id(), fallback);
    }

    /// Drain all finished resolutions (non-blocking), oldest first.
    pub fn drain_pending(&mut self) -> Vec<CanvasIntent> {
        self.reap_finished();
        let mut intents = Vec::new();
        while let Ok(queued) = self.resolution_rx.try_recv() {
            log::debug!(
                "oracle_workers: resolution after {:?}",
                queued.dispatched_at.elapsed()
            );
            intents.push(queued.intent);
        }
        intents.extend(self.failed.drain(..));
        intents
    }

    /// Wait for the next resolution, including the empty one standing in
    /// for a task that panicked. `None` only if the channel closed.
    pub async fn next_resolution(&mut self) -> Option<CanvasIntent> {
        loop {
            if let Some(intent) = self.failed.pop_front() {
                return Some(intent);
            }
            let joined = tokio::select! {
                biased;
                queued = self.resolution_rx.recv() => {
                    return queued.map(|queued| queued.intent);
                }
                Some(joined) = self.workers.join_next_with_id() => joined,
            };
            self.record_exit(joined);
        }
    }

    /// Cancel all in-flight requests and await their tasks.
    ///
    /// Cancelled requests never produce a resolution.
    pub async fn shutdown(&mut self) {
        log::info!(
            "oracle_workers: shutdown requested, cancelling {} workers",
            self.worker_count()
        );
        self.cancel.cancel();
        while self.workers.join_next().await.is_some() {}
        self.unanswered.clear();
        self.failed.clear();
        log::info!("oracle_workers: all workers joined");
    }

    /// Number of tasks still supervised (finished tasks are reaped lazily).
    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.workers.try_join_next_with_id() {
            self.record_exit(joined);
        }
    }

    fn record_exit(&mut self, joined: Result<(task::Id, ()), JoinError>) {
        let id = match &joined {
            Ok((id, ())) => *id,
            Err(error) => error.id(),
        };
        let fallback = self.unanswered.remove(&id);
        if let Err(error) = joined {
            log::warn!("oracle_workers: worker task failed: {error}");
            if let Some(fallback) = fallback
                && error.is_panic()
            {
                self.failed.push_back(fallback);
            }
        }
    }
}

impl Default for OracleWorkers {
    fn default() -> Self {
        Self::new()
    }
}

/// The answer applied when a request gets no answer at all.
fn empty_resolution(request: &OracleRequest) -> CanvasIntent {
    match request {
        OracleRequest::Expand { source, .. } => CanvasIntent::ExpansionResolved {
            source: *source,
            suggestions: Vec::new(),
        },
        OracleRequest::ConnectionLabel { connection, .. } => {
            CanvasIntent::ConnectionLabelResolved {
                connection: *connection,
                label: None,
            }
        },
    }
}

/// Execute one request, mapping every failure to an empty answer.
pub(crate) async fn resolve(oracle: &dyn SuggestionOracle, request: OracleRequest) -> CanvasIntent {
    match request {
        OracleRequest::Expand {
            source,
            content,
            existing,
        } => {
            let suggestions = match oracle.expand(&content, &existing).await {
                Ok(suggestions) => suggestions
                    .into_iter()
                    .map(|suggestion| suggestion.content)
                    .collect(),
                Err(error) => {
                    log::warn!("oracle: expansion of {source} failed: {error}");
                    Vec::new()
                },
            };
            CanvasIntent::ExpansionResolved {
                source,
                suggestions,
            }
        },
        OracleRequest::ConnectionLabel {
            connection,
            from_content,
            to_content,
        } => {
            let label = match oracle.suggest_label(&from_content, &to_content).await {
                Ok(label) => Some(label.trim().to_string()).filter(|label| !label.is_empty()),
                Err(error) => {
                    log::warn!("oracle: label for {connection} failed: {error}");
                    None
                },
            };
            CanvasIntent::ConnectionLabelResolved { connection, label }
        },
    }
}
