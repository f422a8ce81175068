use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use crate::pipeline::{PipelineController, PipelineResult};

/// Single-process control loop: one job end-to-end at a time, idling between
/// claims when the queue is empty.
pub struct SchedulerLoop {
    controller: PipelineController,
    poll_interval: Duration,
}

impl SchedulerLoop {
    pub fn new(controller: PipelineController, poll_interval: Duration) -> Self {
        Self {
            controller,
            poll_interval,
        }
    }

    pub fn controller(&self) -> &PipelineController {
        &self.controller
    }

    pub async fn run(&self) -> PipelineResult<()> {
        let recovered = self.controller.recover_stale_jobs().await?;
        if recovered > 0 {
            info!(recovered, "recovery sweep reset stale jobs");
        }
        loop {
            match self.controller.run_once().await {
                Ok(Some(report)) => {
                    info!(job = %report.job_id, succeeded = report.succeeded(), "job processed");
                }
                Ok(None) => sleep(self.poll_interval).await,
                Err(err) => {
                    error!(error = %err, "pipeline iteration failed");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }
}
