//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per front end programmatici.
//!
//! ## Responsabilità:
//! - Emette messaggi JSON strutturati per eventi di progresso, uno per riga
//! - Traduce ogni `CompressionOutcome` in un evento `file_complete`
//! - Fornisce interfaccia standardizzata per comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio processo di compressione
//! - `file_complete`: Esito di un file
//! - `progress`: Progresso corrente (file processati, stats)
//! - `complete`: Fine processo con statistiche finali
//! - `error`: Errore generale

use crate::file_manager::FileManager;
use crate::optimizer::batch_optimizer::JobReport;
use crate::optimizer::task_optimizer::CompressionOutcome;
use crate::progress::OptimizationStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio del processo di compressione
    #[serde(rename = "start")]
    Start {
        input_dir: PathBuf,
        total_files: usize,
        config: JsonConfig,
    },

    /// Progresso corrente
    #[serde(rename = "progress")]
    Progress {
        current: usize,
        total: usize,
        percentage: f64,
        files_compressed: usize,
        files_skipped: usize,
        files_kept: usize,
        errors: usize,
        bytes_saved: u64,
    },

    /// Fine elaborazione di un file specifico
    #[serde(rename = "file_complete")]
    FileComplete {
        path: PathBuf,
        status: String,
        original_size: Option<u64>,
        new_size: Option<u64>,
        reduction_percent: f64,
        reason: Option<String>,
        error: Option<String>,
    },

    /// Processo completato
    #[serde(rename = "complete")]
    Complete {
        files_processed: usize,
        files_compressed: usize,
        files_skipped: usize,
        files_kept: usize,
        errors: usize,
        total_original_size: u64,
        total_new_size: u64,
        total_bytes_saved: u64,
        average_reduction: f64,
        duration_seconds: f64,
        cancelled: bool,
    },

    /// Errore generale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonConfig {
    pub image_quality: u8,
    pub max_dpi: u32,
    pub small_image_threshold: usize,
    pub lossy_flate_threshold: usize,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Crea un messaggio di inizio
    pub fn start(input_dir: PathBuf, total_files: usize, config: JsonConfig) -> Self {
        Self::Start {
            input_dir,
            total_files,
            config,
        }
    }

    /// Crea un messaggio di progresso
    pub fn progress(current: usize, total: usize, stats: &OptimizationStats) -> Self {
        let percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        Self::Progress {
            current,
            total,
            percentage,
            files_compressed: stats.files_compressed,
            files_skipped: stats.files_skipped,
            files_kept: stats.files_kept,
            errors: stats.errors,
            bytes_saved: stats.total_bytes_saved(),
        }
    }

    /// Crea un messaggio di completamento file
    pub fn file_complete(report: &JobReport) -> Self {
        let (original_size, new_size, reason, error) = match &report.outcome {
            CompressionOutcome::Compressed {
                original_size,
                new_size,
            } => (Some(*original_size), Some(*new_size), None, None),
            CompressionOutcome::Skipped { size } => {
                (Some(*size), Some(*size), Some("below_threshold".to_string()), None)
            }
            CompressionOutcome::KeptOriginal { size, reason } => (
                Some(*size),
                Some(*size),
                serde_json::to_value(reason)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string)),
                None,
            ),
            CompressionOutcome::Failed { error } => (None, None, None, Some(error.to_string())),
        };

        let reduction_percent = match (original_size, new_size) {
            (Some(original), Some(new)) => FileManager::calculate_reduction(original, new),
            _ => 0.0,
        };

        Self::FileComplete {
            path: report.path.clone(),
            status: report.outcome.status().to_string(),
            original_size,
            new_size,
            reduction_percent,
            reason,
            error,
        }
    }

    /// Crea un messaggio di completamento generale
    pub fn complete(stats: &OptimizationStats, duration_seconds: f64, cancelled: bool) -> Self {
        Self::Complete {
            files_processed: stats.files_processed,
            files_compressed: stats.files_compressed,
            files_skipped: stats.files_skipped,
            files_kept: stats.files_kept,
            errors: stats.errors,
            total_original_size: stats.total_original_size,
            total_new_size: stats.total_new_size,
            total_bytes_saved: stats.total_bytes_saved(),
            average_reduction: stats.overall_reduction_percent(),
            duration_seconds,
            cancelled,
        }
    }

    /// Crea un messaggio di errore
    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

/// Converti Config in JsonConfig
impl From<&crate::Config> for JsonConfig {
    fn from(config: &crate::Config) -> Self {
        Self {
            image_quality: config.image_quality,
            max_dpi: config.max_dpi,
            small_image_threshold: config.small_image_threshold,
            lossy_flate_threshold: config.lossy_flate_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompressError;
    use crate::optimizer::task_optimizer::KeepReason;
    use serde_json::Value;

    fn to_value(message: &JsonMessage) -> Value {
        serde_json::to_value(message).unwrap()
    }

    #[test]
    fn test_file_complete_compressed() {
        let report = JobReport {
            path: PathBuf::from("/scans/a.pdf"),
            outcome: CompressionOutcome::Compressed {
                original_size: 200,
                new_size: 50,
            },
        };
        let value = to_value(&JsonMessage::file_complete(&report));
        assert_eq!(value["type"], "file_complete");
        assert_eq!(value["status"], "compressed");
        assert_eq!(value["reduction_percent"], 75.0);
        assert!(value["error"].is_null());
    }

    #[test]
    fn test_file_complete_kept_and_failed() {
        let kept = JobReport {
            path: PathBuf::from("/scans/b.pdf"),
            outcome: CompressionOutcome::KeptOriginal {
                size: 10,
                reason: KeepReason::NoImprovement,
            },
        };
        let value = to_value(&JsonMessage::file_complete(&kept));
        assert_eq!(value["status"], "kept_original");
        assert_eq!(value["reason"], "no_improvement");

        let failed = JobReport {
            path: PathBuf::from("/scans/c.pdf"),
            outcome: CompressionOutcome::Failed {
                error: CompressError::Parse("bad xref".to_string()),
            },
        };
        let value = to_value(&JsonMessage::file_complete(&failed));
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "PDF parse error: bad xref");
        assert!(value["original_size"].is_null());
    }

    #[test]
    fn test_progress_percentage() {
        let mut stats = OptimizationStats::new();
        stats.add_compressed(100, 60);
        let value = to_value(&JsonMessage::progress(1, 4, &stats));
        assert_eq!(value["type"], "progress");
        assert_eq!(value["percentage"], 25.0);
        assert_eq!(value["bytes_saved"], 40);
    }
}
