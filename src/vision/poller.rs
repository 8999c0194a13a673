use std::future::Future;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::mailbox::DetectionMailbox;
use crate::models::DetectionBatch;

/// External camera + detector pipeline.
pub trait VisionSource: Send + Sync + 'static {
    fn detect(&self) -> impl Future<Output = Result<DetectionBatch>> + Send;
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

pub async fn detection_loop<V: VisionSource>(
    session_id: String,
    source: V,
    mailbox: DetectionMailbox,
    settings: PollSettings,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match tokio::time::timeout(settings.timeout, source.detect()).await {
                    Ok(Ok(batch)) => {
                        debug!(
                            "session {}: {} detection(s) received",
                            session_id,
                            batch.detections.len()
                        );
                        mailbox.publish(batch);
                    }
                    Ok(Err(err)) => warn!("session {}: detection failed: {err:#}", session_id),
                    Err(_) => warn!(
                        "session {}: detection timeout (> {}ms)",
                        session_id,
                        settings.timeout.as_millis()
                    ),
                }
            }
            _ = cancel_token.cancelled() => {
                info!("session {}: detection loop shutting down", session_id);
                break;
            }
        }
    }
}

/// Owns the one detection loop a session may run.
pub struct DetectionPoller {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl DetectionPoller {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start<V: VisionSource>(
        &mut self,
        session_id: String,
        source: V,
        mailbox: DetectionMailbox,
        settings: PollSettings,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("detection polling already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(detection_loop(
            session_id,
            source,
            mailbox,
            settings,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("detection loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for DetectionPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DetectionPoller {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}
