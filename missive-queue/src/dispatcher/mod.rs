//! Dispatcher orchestration
//!
//! The serve loop drives the queue on three independent timers (dispatch
//! ticks, cleanup passes and persistence snapshots) plus an enqueue nudge,
//! so fresh work does not wait out the remainder of a tick interval.

pub(crate) mod cleanup;
pub(crate) mod process;

use std::time::Duration;

use missive_common::Signal;
use tracing::{error, info, warn};

use crate::{error::QueueError, persistence, service::MailQueue};

impl MailQueue {
    /// Run the dispatcher until a shutdown signal arrives.
    ///
    /// Each dispatch tick fans out at most
    /// `min(batch_size, max_concurrent - active)` sends and waits for all
    /// of them to settle before returning to the loop, so in-flight work is
    /// always bounded and a shutdown observed at the loop head has nothing
    /// mid-air. A final snapshot is taken before exiting.
    ///
    /// # Errors
    ///
    /// Returns an error only when the final shutdown snapshot cannot be
    /// written; per-tick failures are logged and the loop keeps running.
    pub async fn serve(
        &self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), QueueError> {
        info!(
            process_interval_ms = self.config.process_interval_ms,
            cleanup_interval_secs = self.config.cleanup_interval_secs,
            persist_interval_secs = self.config.persist_interval_secs,
            "Mail queue dispatcher starting"
        );

        let mut process_timer =
            tokio::time::interval(Duration::from_millis(self.config.process_interval_ms.max(1)));
        let mut cleanup_timer =
            tokio::time::interval(Duration::from_secs(self.config.cleanup_interval_secs.max(1)));
        let mut persist_timer =
            tokio::time::interval(Duration::from_secs(self.config.persist_interval_secs.max(1)));

        // Skip the first tick of each timer to avoid immediate execution
        process_timer.tick().await;
        cleanup_timer.tick().await;
        persist_timer.tick().await;

        loop {
            tokio::select! {
                _ = process_timer.tick() => {
                    if let Err(e) = process::run_tick(self).await {
                        error!(error = %e, "Error processing delivery queue");
                    }
                }
                () = self.nudge.notified() => {
                    if let Err(e) = process::run_tick(self).await {
                        error!(error = %e, "Error processing delivery queue");
                    }
                }
                _ = cleanup_timer.tick() => {
                    cleanup::run(self);
                }
                _ = persist_timer.tick() => {
                    if let Err(e) = persistence::snapshot(
                        &self.queue,
                        self.store.as_ref(),
                        &self.config.persistence_key,
                    )
                    .await
                    {
                        warn!(error = %e, "Failed to persist queue snapshot");
                    }
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            info!("Mail queue dispatcher received shutdown signal");
                            persistence::snapshot(
                                &self.queue,
                                self.store.as_ref(),
                                &self.config.persistence_key,
                            )
                            .await?;
                            info!("Mail queue dispatcher shutdown complete");
                            break;
                        }
                        Err(e) => {
                            error!(error = %e, "Dispatcher shutdown channel error");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
