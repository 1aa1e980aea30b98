//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di compressione
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `image_quality`: Qualità JPEG delle immagini fotografiche (50-100, default: 90)
//! - `max_dpi`: DPI massimo di posizionamento (50-600, default: 250)
//! - `small_image_threshold`: Immagini fino a questa dimensione restano invariate (default: 500 KB)
//! - `lossy_flate_threshold`: Immagini lossless 8-bit da questa dimensione possono passare
//!   a JPEG (default: 200 KB)
//! - `json_output`: Output JSON per uso programmatico (default: false)
//!
//! ## Soglia file:
//! - `MIN_FILE_SIZE` (5 MB) è fissa e non configurabile
//!
//! ## Esempio:
//! ```rust
//! use pdf_space_optimizer::Config;
//!
//! let config = Config {
//!     image_quality: 80,
//!     max_dpi: 200,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Files smaller than this are never opened for rewriting
pub const MIN_FILE_SIZE: u64 = 5 * 1024 * 1024;

pub const QUALITY_RANGE: std::ops::RangeInclusive<u8> = 50..=100;
pub const DPI_RANGE: std::ops::RangeInclusive<u32> = 50..=600;

/// Configuration for PDF compression
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JPEG quality for photographic images (50-100)
    pub image_quality: u8,
    /// Placement DPI above which images are downsampled (50-600)
    pub max_dpi: u32,
    /// Images stored in this many bytes or fewer are left alone
    pub small_image_threshold: usize,
    /// Lossless 8-bit gray/RGB images from this size may be moved to JPEG
    pub lossy_flate_threshold: usize,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_quality: 90,
            max_dpi: 250,
            small_image_threshold: 500_000,
            lossy_flate_threshold: 200_000,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !QUALITY_RANGE.contains(&self.image_quality) {
            return Err(anyhow::anyhow!(
                "Image quality must be between {} and {}",
                QUALITY_RANGE.start(),
                QUALITY_RANGE.end()
            ));
        }

        if !DPI_RANGE.contains(&self.max_dpi) {
            return Err(anyhow::anyhow!(
                "Max DPI must be between {} and {}",
                DPI_RANGE.start(),
                DPI_RANGE.end()
            ));
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
