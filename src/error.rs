//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `CompressError` per gli errori a livello di documento/job
//! - Definisce `ImageError` per gli errori confinati a una singola immagine
//! - Definisce `PathValidationError` per i path che non si possono classificare
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori (job):
//! - `PathBlocked`: La directory del file è in una zona protetta
//! - `PathValidation`: Il path non è classificabile (es. relativo)
//! - `Parse`: PDF malformato, cifrato o non supportato
//! - `Write`: Errore I/O durante scrittura temporanea o rename
//! - `Io`: Altri errori I/O (lettura, metadata)
//!
//! ## Errori che NON sono errori:
//! - File sotto soglia → `CompressionOutcome::Skipped`
//! - Nessun miglioramento → `CompressionOutcome::KeptOriginal`
//!
//! ## Propagazione:
//! - `ImageError` viene recuperato dal rewriter: l'immagine resta invariata
//! - `CompressError` diventa l'esito terminale del job, il batch continua

use crate::path_validator::PathClassification;
use std::path::PathBuf;

/// Errors that terminate a single compression job
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("Path is blocked ({classification}): {path}")]
    PathBlocked {
        path: PathBuf,
        classification: PathClassification,
    },

    #[error("Path validation error: {0}")]
    PathValidation(#[from] PathValidationError),

    #[error("PDF parse error: {0}")]
    Parse(String),

    #[error("Write error: {0}")]
    Write(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for CompressError {
    fn from(err: lopdf::Error) -> Self {
        CompressError::Parse(err.to_string())
    }
}

/// Errors scoped to one embedded image; recovered by the rewriter
#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("Corrupt image stream: {0}")]
    Corrupt(String),

    #[error("Unsupported image stream: {0}")]
    Unsupported(String),

    #[error("Image decoding error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image encoding error: {0}")]
    Encode(String),
}

/// Errors raised before a path can be classified
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathValidationError {
    #[error("Relative path must be resolved before validation: {0}")]
    Relative(String),

    #[error("Path is empty")]
    Empty,
}
