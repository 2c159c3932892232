//! Event Emitter
//!
//! Stamps events with a per-run sequence number and pushes them to the
//! stream consumer. A consumer that goes away does not stop the run.

use tokio::sync::mpsc;
use tracing::debug;

use appweaver_core::{BuildEvent, BuildEventKind};

pub struct EventEmitter {
    run_id: String,
    tx: mpsc::Sender<BuildEvent>,
    next_seq: u64,
    receiver_dropped: bool,
}

impl EventEmitter {
    pub fn new(run_id: impl Into<String>, tx: mpsc::Sender<BuildEvent>) -> Self {
        Self {
            run_id: run_id.into(),
            tx,
            next_seq: 0,
            receiver_dropped: false,
        }
    }

    pub async fn emit(&mut self, kind: BuildEventKind) {
        let event = BuildEvent::new(self.next_seq, kind);
        self.next_seq += 1;
        if self.receiver_dropped {
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.receiver_dropped = true;
            debug!(run_id = %self.run_id, "event consumer gone; continuing without it");
        }
    }

    /// Events emitted so far, delivered or not.
    pub fn emitted(&self) -> u64 {
        self.next_seq
    }
}
