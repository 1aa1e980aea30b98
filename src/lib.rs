//! # PDF Space Optimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `path_validator`: Classificazione delle directory (blocklist a due livelli)
//! - `image_optimizer`: Ricompressione delle singole immagini raster
//! - `pdf_rewriter`: Grafo del PDF, DPI di posizionamento, sostituzione immagini
//! - `optimizer`: Job per singolo file, driver batch, progress
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom
//! - `file_manager`: Discovery PDF e commit atomico
//! - `progress` / `json_output`: Reporting
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use pdf_space_optimizer::{Blocklist, CompressionJob, Config};
//!
//! let config = Config::default();
//! let outcome = CompressionJob::new("/scans/report.pdf", &config).run(&Blocklist::for_host());
//! println!("{}", outcome.status());
//! ```

pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_optimizer;
pub mod json_output;
pub mod optimizer;
pub mod path_validator;
pub mod pdf_rewriter;
pub mod progress;

pub use config::{Config, MIN_FILE_SIZE};
pub use error::{CompressError, ImageError, PathValidationError};
pub use file_manager::FileManager;
pub use image_optimizer::{EmbeddedImage, ImageOptimizer, Optimization};
pub use optimizer::{
    BatchOptimizer, CompressionJob, CompressionOutcome, JobReport, KeepReason, TaskOptimizer,
};
pub use path_validator::{Blocklist, PathClassification, PathFlavor};
pub use pdf_rewriter::{PdfDocument, PdfRewriter, RewriteStats, RewrittenDocument};
