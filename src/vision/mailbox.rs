use tokio::sync::watch;

use crate::models::DetectionBatch;

/// Single-slot holder for the most recent detection batch of one session.
///
/// Each publish replaces the whole batch, so readers never observe a partial update.
#[derive(Clone)]
pub struct DetectionMailbox {
    tx: watch::Sender<DetectionBatch>,
}

impl DetectionMailbox {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DetectionBatch::empty());
        Self { tx }
    }

    pub fn publish(&self, batch: DetectionBatch) {
        self.tx.send_replace(batch);
    }

    pub fn latest(&self) -> DetectionBatch {
        self.tx.borrow().clone()
    }

    pub fn clear(&self) {
        self.tx.send_replace(DetectionBatch::empty());
    }

    pub fn subscribe(&self) -> watch::Receiver<DetectionBatch> {
        self.tx.subscribe()
    }
}

impl Default for DetectionMailbox {
    fn default() -> Self {
        Self::new()
    }
}
