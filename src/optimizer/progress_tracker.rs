//! # Progress Tracking Module
//!
//! Unifica statistiche, progress bar e output JSON in un singolo tracker.
//! Riceve un `JobReport` per file dal batch e aggiorna tutto il resto.

use crate::{
    json_output::JsonMessage,
    optimizer::batch_optimizer::JobReport,
    optimizer::task_optimizer::CompressionOutcome,
    progress::{OptimizationStats, ProgressManager},
};

/// Tracker progress unificato
pub struct ProgressTracker {
    pub total_files: usize,
    current_file: usize,
    json_output: bool,
    stats: OptimizationStats,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    /// Crea un nuovo tracker; in modalità JSON la progress bar non viene disegnata
    pub fn new(total_files: usize, json_output: bool) -> Self {
        let progress_manager = if json_output {
            ProgressManager::hidden(total_files as u64)
        } else {
            ProgressManager::new(total_files as u64)
        };

        Self {
            total_files,
            current_file: 0,
            json_output,
            stats: OptimizationStats::new(),
            progress_manager,
        }
    }

    /// Gestisce completamento file con eventi JSON automatici
    pub fn handle_file_completion(&mut self, report: &JobReport) {
        self.current_file += 1;

        let name = report
            .path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();

        let message = match &report.outcome {
            CompressionOutcome::Compressed {
                original_size,
                new_size,
            } => {
                self.stats.add_compressed(*original_size, *new_size);
                format!(
                    "[OK] {}: {:.1}% saved",
                    name,
                    crate::file_manager::FileManager::calculate_reduction(*original_size, *new_size)
                )
            }
            CompressionOutcome::Skipped { size } => {
                self.stats.add_skipped(*size);
                format!("[SKIP] {}: below size threshold", name)
            }
            CompressionOutcome::KeptOriginal { size, reason } => {
                self.stats.add_kept(*size);
                format!("[KEEP] {}: {}", name, reason)
            }
            CompressionOutcome::Failed { error } => {
                self.stats.add_error();
                format!("[ERROR] {}: {}", name, error)
            }
        };

        if self.json_output {
            JsonMessage::file_complete(report).emit();
            JsonMessage::progress(self.current_file, self.total_files, &self.stats).emit();
        }
        self.progress_manager
            .update(&message, self.stats.total_bytes_saved());
    }

    /// Finalizza progress bar
    pub fn finish(&self) {
        self.progress_manager.finish(&self.stats.format_summary());
    }

    /// Statistiche per report finale
    pub fn stats(&self) -> &OptimizationStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompressError;
    use crate::optimizer::task_optimizer::KeepReason;
    use std::path::PathBuf;

    fn report(outcome: CompressionOutcome) -> JobReport {
        JobReport {
            path: PathBuf::from("/scans/file.pdf"),
            outcome,
        }
    }

    #[test]
    fn test_tracker_aggregates_outcomes() {
        let mut tracker = ProgressTracker::new(4, true);
        tracker.handle_file_completion(&report(CompressionOutcome::Compressed {
            original_size: 8_000_000,
            new_size: 6_000_000,
        }));
        tracker.handle_file_completion(&report(CompressionOutcome::Skipped { size: 1_000 }));
        tracker.handle_file_completion(&report(CompressionOutcome::KeptOriginal {
            size: 7_000_000,
            reason: KeepReason::NoImprovement,
        }));
        tracker.handle_file_completion(&report(CompressionOutcome::Failed {
            error: CompressError::Parse("truncated".to_string()),
        }));
        tracker.finish();

        let stats = tracker.stats();
        assert_eq!(stats.files_processed, 4);
        assert_eq!(stats.files_compressed, 1);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.files_kept, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total_bytes_saved(), 2_000_000);
    }
}
