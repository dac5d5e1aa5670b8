/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Event-loop glue between the synchronous canvas and the async oracle.
//!
//! All canvas mutation happens on the thread that owns [`CanvasRuntime`].
//! Oracle calls run on tokio tasks and only ever come back as resolution
//! intents applied by [`CanvasRuntime::pump`].

use std::sync::Arc;

use crate::app::{CanvasApp, CanvasIntent};
use crate::input::{EventDisposition, InputEvent};
use crate::oracle::SuggestionOracle;

mod oracle_workers;

pub use oracle_workers::OracleWorkers;

pub struct CanvasRuntime {
    app: CanvasApp,
    workers: OracleWorkers,
    oracle: Arc<dyn SuggestionOracle>,
}

impl CanvasRuntime {
    pub fn new(app: CanvasApp, oracle: Arc<dyn SuggestionOracle>) -> Self {
        Self {
            app,
            workers: OracleWorkers::new(),
            oracle,
        }
    }

    pub fn app(&self) -> &CanvasApp {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut CanvasApp {
        &mut self.app
    }

    /// Forward one device event to the canvas. Oracle work it queues is
    /// dispatched immediately.
    pub fn handle_input(&mut self, event: InputEvent) -> EventDisposition {
        let disposition = self.app.handle_input(event);
        self.dispatch_queued();
        disposition
    }

    pub fn apply_intents<I>(&mut self, intents: I)
    where
        I: IntoIterator<Item = CanvasIntent>,
    {
        self.app.apply_intents(intents);
        self.dispatch_queued();
    }

    /// Dispatch queued oracle requests, then apply every resolution that
    /// has arrived. Returns how many resolutions were applied.
    pub fn pump(&mut self) -> usize {
        self.dispatch_queued();
        let resolutions = self.workers.drain_pending();
        let applied = resolutions.len();
        self.apply_intents(resolutions);
        applied
    }

    /// Wait for the next resolution and apply it. Returns `false` when
    /// nothing is outstanding.
    pub async fn settle_one(&mut self) -> bool {
        self.dispatch_queued();
        if !self.app.is_busy() {
            return false;
        }
        match self.workers.next_resolution().await {
            Some(intent) => {
                self.apply_intents([intent]);
                true
            },
            None => false,
        }
    }

    /// Apply resolutions until no oracle request is outstanding.
    pub async fn settle(&mut self) {
        while self.settle_one().await {}
    }

    /// Cancel outstanding oracle work and hand back the canvas, idle and
    /// ready to accept new oracle requests.
    pub async fn shutdown(mut self) -> CanvasApp {
        self.workers.shutdown().await;
        self.app.abandon_oracle_requests();
        self.app
    }

    fn dispatch_queued(&mut self) {
        for request in self.app.take_oracle_requests() {
            self.workers.dispatch(request, Arc::clone(&self.oracle));
        }
    }
}
