//! # Batch Optimizer
//!
//! Driver principale: elabora una lista ordinata di PDF, uno alla volta.
//!
//! ## Responsabilità:
//! - Esegue un `CompressionJob` per file, nell'ordine ricevuto
//! - Un file fallito non interrompe il batch
//! - Controlla il segnale di stop solo tra un file e l'altro
//! - Restituisce un `JobReport` per ogni file elaborato, nello stesso ordine

use crate::optimizer::task_optimizer::{CompressionOutcome, TaskOptimizer};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Outcome of one file of the batch
#[derive(Debug)]
pub struct JobReport {
    pub path: PathBuf,
    pub outcome: CompressionOutcome,
}

/// Sequential driver over a list of files
pub struct BatchOptimizer {
    task: TaskOptimizer,
    stop_receiver: Option<broadcast::Receiver<()>>,
}

impl BatchOptimizer {
    pub fn new(task: TaskOptimizer) -> Self {
        Self {
            task,
            stop_receiver: None,
        }
    }

    /// Batch that stops at the next file boundary once a value is sent on the channel
    pub fn with_cancellation(task: TaskOptimizer, stop_receiver: broadcast::Receiver<()>) -> Self {
        Self {
            task,
            stop_receiver: Some(stop_receiver),
        }
    }

    fn should_stop(&mut self) -> bool {
        if let Some(ref mut receiver) = self.stop_receiver {
            match receiver.try_recv() {
                Ok(_) => return true,
                Err(broadcast::error::TryRecvError::Empty) => return false,
                // Signal was sent but we missed it, treat as stop
                Err(broadcast::error::TryRecvError::Lagged(_)) => return true,
                Err(broadcast::error::TryRecvError::Closed) => return false,
            }
        }
        false
    }

    /// Processes `files` in order, calling `on_outcome` with each report's
    /// index as soon as it is available.
    pub fn run<F>(&mut self, files: &[PathBuf], mut on_outcome: F) -> Vec<JobReport>
    where
        F: FnMut(usize, &JobReport),
    {
        let mut reports = Vec::with_capacity(files.len());

        for (index, path) in files.iter().enumerate() {
            if self.should_stop() {
                warn!(
                    "Stop requested, {} of {} files left unprocessed",
                    files.len() - index,
                    files.len()
                );
                break;
            }

            debug!("[{}/{}] {}", index + 1, files.len(), path.display());
            let report = JobReport {
                path: path.clone(),
                outcome: self.task.process(path),
            };
            if let CompressionOutcome::Failed { error } = &report.outcome {
                info!("Failed: {}: {}", path.display(), error);
            }

            on_outcome(index, &report);
            reports.push(report);
        }

        reports
    }
}
