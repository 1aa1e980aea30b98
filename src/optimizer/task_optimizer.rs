//! # Task Optimizer Module
//!
//! Worker per la compressione di un singolo PDF.
//! Separato dal driver batch per maggiore modularità.
//!
//! ## Macchina a stati del job:
//! `Pending → Validated → {Skipped | Rewriting} → {Committed | KeptOriginal | Failed}`
//!
//! ## Garanzie:
//! - La directory del file viene validata prima di qualsiasi lettura
//! - File sotto `MIN_FILE_SIZE` non vengono mai aperti
//! - Il file originale viene sostituito solo se il risultato è strettamente più piccolo,
//!   tramite rename atomico
//! - Su ogni esito diverso da `Compressed` il file su disco resta identico

use crate::{
    config::{Config, MIN_FILE_SIZE},
    error::CompressError,
    file_manager::FileManager,
    image_optimizer::ImageOptimizer,
    path_validator::Blocklist,
    pdf_rewriter::{PdfDocument, PdfRewriter},
};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Why a rewritten document was not committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepReason {
    /// The rewritten file is not strictly smaller
    NoImprovement,
    /// No image was large enough to be worth re-encoding; nothing was rewritten
    NoEligibleImages,
}

impl std::fmt::Display for KeepReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeepReason::NoImprovement => write!(f, "no improvement"),
            KeepReason::NoEligibleImages => write!(f, "no eligible images"),
        }
    }
}

/// Terminal result of one job
#[derive(Debug)]
pub enum CompressionOutcome {
    Compressed { original_size: u64, new_size: u64 },
    /// Below `MIN_FILE_SIZE`; the file was never opened
    Skipped { size: u64 },
    KeptOriginal { size: u64, reason: KeepReason },
    Failed { error: CompressError },
}

impl CompressionOutcome {
    /// Short machine-readable status
    pub fn status(&self) -> &'static str {
        match self {
            CompressionOutcome::Compressed { .. } => "compressed",
            CompressionOutcome::Skipped { .. } => "skipped",
            CompressionOutcome::KeptOriginal { .. } => "kept_original",
            CompressionOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CompressionOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobStage {
    Pending,
    Validated,
    Skipped,
    Rewriting,
    Committed,
    KeptOriginal,
    Failed,
}

/// One input file plus the configuration it is processed with
pub struct CompressionJob<'a> {
    path: PathBuf,
    config: &'a Config,
    stage: JobStage,
}

impl<'a> CompressionJob<'a> {
    pub fn new(path: impl Into<PathBuf>, config: &'a Config) -> Self {
        Self {
            path: path.into(),
            config,
            stage: JobStage::Pending,
        }
    }

    /// Runs the job to a terminal state
    pub fn run(self, blocklist: &Blocklist) -> CompressionOutcome {
        self.run_with(blocklist, |_| Ok(()))
    }

    /// Like [`CompressionJob::run`], calling `before_commit` with the written
    /// temporary file right before it replaces the original.
    pub fn run_with<F>(mut self, blocklist: &Blocklist, before_commit: F) -> CompressionOutcome
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        match self.execute(blocklist, before_commit) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.advance(JobStage::Failed);
                debug!("{}: {}", self.path.display(), error);
                CompressionOutcome::Failed { error }
            }
        }
    }

    fn advance(&mut self, next: JobStage) {
        debug!("{}: {:?} -> {:?}", self.path.display(), self.stage, next);
        self.stage = next;
    }

    fn execute<F>(
        &mut self,
        blocklist: &Blocklist,
        before_commit: F,
    ) -> Result<CompressionOutcome, CompressError>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let directory = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let classification = blocklist.classify(&directory)?;
        if !classification.is_allowed() {
            return Err(CompressError::PathBlocked {
                path: directory,
                classification,
            });
        }
        self.advance(JobStage::Validated);

        let size = fs::metadata(&self.path)?.len();
        if size < MIN_FILE_SIZE {
            self.advance(JobStage::Skipped);
            return Ok(CompressionOutcome::Skipped { size });
        }

        self.advance(JobStage::Rewriting);
        let original = fs::read(&self.path)?;
        let original_size = original.len() as u64;
        let mut document = PdfDocument::load_mem(&original)?;

        let rewriter = PdfRewriter::new(
            ImageOptimizer::from_config(self.config),
            self.config.small_image_threshold,
        );
        let rewritten = rewriter.rewrite(&mut document)?;

        let Some(bytes) = rewritten.bytes else {
            self.advance(JobStage::KeptOriginal);
            return Ok(CompressionOutcome::KeptOriginal {
                size: original_size,
                reason: KeepReason::NoEligibleImages,
            });
        };

        let new_size = bytes.len() as u64;
        if new_size >= original_size {
            debug!(
                "{}: rewritten {} >= original {}, discarding",
                self.path.display(),
                new_size,
                original_size
            );
            self.advance(JobStage::KeptOriginal);
            return Ok(CompressionOutcome::KeptOriginal {
                size: original_size,
                reason: KeepReason::NoImprovement,
            });
        }

        FileManager::write_atomically_with(&self.path, &bytes, before_commit)
            .map_err(CompressError::Write)?;
        self.advance(JobStage::Committed);

        info!(
            "{}: {} -> {} ({} of {} images re-encoded)",
            self.path.display(),
            FileManager::format_size(original_size),
            FileManager::format_size(new_size),
            rewritten.stats.replaced,
            rewritten.stats.images_found
        );
        Ok(CompressionOutcome::Compressed {
            original_size,
            new_size,
        })
    }
}

/// Processes files one at a time with a fixed configuration and blocklist
pub struct TaskOptimizer {
    pub config: Config,
    blocklist: Blocklist,
}

impl TaskOptimizer {
    pub fn new(config: Config, blocklist: Blocklist) -> Self {
        Self { config, blocklist }
    }

    /// Processa un singolo file
    pub fn process(&self, path: &Path) -> CompressionOutcome {
        CompressionJob::new(path, &self.config).run(&self.blocklist)
    }
}
