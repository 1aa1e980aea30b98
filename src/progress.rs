//! # Batch Progress and Run Statistics
//!
//! Barra di avanzamento per i PDF della cartella e contatori della run.
//!
//! ## Responsabilità:
//! - Barra `indicatif` con un tick per PDF e i byte risparmiati finora come prefisso
//! - Spinner durante la scansione della cartella
//! - `OptimizationStats`: esiti per categoria, byte prima e dopo, riduzione complessiva
//!
//! ## Contatori:
//! - **files_processed**: PDF che hanno raggiunto uno stato finale
//! - **files_compressed**: File sostituiti con una versione più piccola
//! - **files_skipped**: File sotto la soglia minima (mai aperti)
//! - **files_kept**: File riscritti senza miglioramento (originale mantenuto)
//! - **errors**: Numero di job falliti
//! - **total_original_size** / **total_new_size**: Byte prima e dopo
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] 38.40 MB saved [==============>-------] 6/15 [OK] report.pdf: 45.2% saved
//! ```

use crate::file_manager::FileManager;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// One bar over the PDFs of a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn new(total_pdfs: u64) -> Self {
        let bar = ProgressBar::new(total_pdfs);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(concat!(
                    "{spinner:.green} [{elapsed_precise}] {prefix:>10} saved ",
                    "[{bar:30.cyan/blue}] {pos}/{len} {wide_msg}"
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.set_prefix(FileManager::format_size(0));
        bar.enable_steady_tick(Duration::from_millis(120));

        Self { bar }
    }

    /// A manager that draws nothing (JSON mode)
    pub fn hidden(total_pdfs: u64) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total_pdfs);
        Self { bar }
    }

    /// Advances by one PDF, showing its result and the running savings
    pub fn update(&self, message: &str, bytes_saved: u64) {
        self.bar.set_prefix(FileManager::format_size(bytes_saved));
        self.bar.set_message(message.to_string());
        self.bar.inc(1);
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Spinner shown while the folder is walked
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }
}

/// Per-outcome counters and byte totals of a run.
///
/// Failed jobs count towards `files_processed` only; their size is unknown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OptimizationStats {
    pub files_processed: usize,
    pub files_compressed: usize,
    pub files_skipped: usize,
    pub files_kept: usize,
    pub errors: usize,
    pub total_original_size: u64,
    pub total_new_size: u64,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_compressed(&mut self, original_size: u64, new_size: u64) {
        self.files_processed += 1;
        self.files_compressed += 1;
        self.total_original_size += original_size;
        self.total_new_size += new_size;
    }

    pub fn add_skipped(&mut self, size: u64) {
        self.files_processed += 1;
        self.files_skipped += 1;
        self.total_original_size += size;
        self.total_new_size += size;
    }

    pub fn add_kept(&mut self, size: u64) {
        self.files_processed += 1;
        self.files_kept += 1;
        self.total_original_size += size;
        self.total_new_size += size;
    }

    pub fn add_error(&mut self) {
        self.files_processed += 1;
        self.errors += 1;
    }

    pub fn total_bytes_saved(&self) -> u64 {
        self.total_original_size.saturating_sub(self.total_new_size)
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.total_original_size, self.total_new_size)
    }

    /// One-line summary for the end of the bar
    pub fn format_summary(&self) -> String {
        format!(
            "{} PDFs: {} compressed, {} under 5 MB, {} kept, {} failed | {} -> {} ({:.2}% saved)",
            self.files_processed,
            self.files_compressed,
            self.files_skipped,
            self.files_kept,
            self.errors,
            FileManager::format_size(self.total_original_size),
            FileManager::format_size(self.total_new_size),
            self.overall_reduction_percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let mut stats = OptimizationStats::new();
        stats.add_compressed(1000, 400);
        stats.add_skipped(100);
        stats.add_kept(900);
        stats.add_error();

        assert_eq!(stats.files_processed, 4);
        assert_eq!(stats.total_original_size, 2000);
        assert_eq!(stats.total_new_size, 1400);
        assert_eq!(stats.total_bytes_saved(), 600);
        assert!((stats.overall_reduction_percent() - 30.0).abs() < 1e-9);
        assert!(stats
            .format_summary()
            .starts_with("4 PDFs: 1 compressed, 1 under 5 MB, 1 kept, 1 failed"));
    }

    #[test]
    fn test_hidden_manager_counts() {
        let manager = ProgressManager::hidden(3);
        manager.update("[OK] a.pdf", 10);
        manager.update("[SKIP] b.pdf", 10);
        assert_eq!(manager.position(), 2);
    }
}
