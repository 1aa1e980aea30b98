//! # Optimizer Module
//!
//! Modulo che separa le responsabilità in sottomoduli:
//! - `batch_optimizer`: Driver sequenziale della lista di file
//! - `task_optimizer`: Job di compressione per singolo file
//! - `progress_tracker`: Gestione progress unificata

pub mod batch_optimizer;
pub mod progress_tracker;
pub mod task_optimizer;

pub use batch_optimizer::{BatchOptimizer, JobReport};
pub use progress_tracker::ProgressTracker;
pub use task_optimizer::{CompressionJob, CompressionOutcome, KeepReason, TaskOptimizer};
