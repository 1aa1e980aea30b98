//! # PDF Space Optimizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Validazione della cartella scelta con la blocklist
//! - Creazione della configurazione e avvio del batch
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (cartella, quality, max-dpi, config, json)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, `RUST_LOG` se presente)
//! 3. Carica la configurazione da file e applica gli override della CLI
//! 4. Valida la cartella e cerca i PDF
//! 5. Esegue il batch su un thread bloccante; Ctrl-C ferma al prossimo file
//!
//! ## Esempio di utilizzo:
//! ```bash
//! pdf-optimizer /path/to/scans --quality 85 --max-dpi 200 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pdf_space_optimizer::json_output::{JsonConfig, JsonMessage};
use pdf_space_optimizer::optimizer::ProgressTracker;
use pdf_space_optimizer::progress::{OptimizationStats, ProgressManager};
use pdf_space_optimizer::{BatchOptimizer, Blocklist, Config, FileManager, TaskOptimizer};

#[derive(Parser)]
#[command(name = "pdf-optimizer")]
#[command(about = "Shrink PDFs by recompressing their embedded images, in place")]
struct Args {
    /// Folder to scan recursively for PDF files
    folder: PathBuf,

    /// JPEG quality for photographic images (50-100) [default: 90]
    #[arg(short, long)]
    quality: Option<u8>,

    /// Maximum image resolution in DPI (50-600) [default: 250]
    #[arg(short = 'd', long)]
    max_dpi: Option<u32>,

    /// JSON configuration file; command line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to this file and continue
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Output progress and status as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs always go to stderr: stdout is reserved for JSON lines
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let json = args.json;
    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if json {
                let details = e.chain().nth(1).map(|cause| cause.to_string());
                JsonMessage::error(e.to_string(), details).emit();
            }
            Err(e)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    if let Some(quality) = args.quality {
        config.image_quality = quality;
    }
    if let Some(max_dpi) = args.max_dpi {
        config.max_dpi = max_dpi;
    }
    config.json_output |= args.json;
    config.validate()?;

    if let Some(path) = &args.save_config {
        config.save_to_file(path).await?;
        info!("Configuration saved to {}", path.display());
    }

    if !args.folder.is_dir() {
        return Err(anyhow::anyhow!(
            "Folder does not exist or is not a directory: {}",
            args.folder.display()
        ));
    }
    let folder = args.folder.canonicalize()?;

    let blocklist = Blocklist::for_host();
    let classification = blocklist.classify(&folder)?;
    if !classification.is_allowed() {
        return Err(anyhow::anyhow!(
            "{}: {}",
            folder.display(),
            classification.message()
        ));
    }

    let files = if config.json_output {
        FileManager::find_pdf_files(&folder)?
    } else {
        let spinner = ProgressManager::spinner(&format!("Scanning {}", folder.display()));
        let files = FileManager::find_pdf_files(&folder)?;
        spinner.finish_and_clear();
        files
    };

    let start_time = Instant::now();
    if config.json_output {
        JsonMessage::start(folder.clone(), files.len(), JsonConfig::from(&config)).emit();
    } else {
        info!("Starting PDF compression in: {}", folder.display());
        info!(
            "Image quality: {} | Max DPI: {}",
            config.image_quality, config.max_dpi
        );
        info!("Found {} PDF files to process", files.len());
    }

    if files.is_empty() {
        print_final_stats(&config, &OptimizationStats::new(), start_time, false);
        return Ok(());
    }

    let (stop_sender, stop_receiver) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current file");
            let _ = stop_sender.send(());
        }
    });

    let json_output = config.json_output;
    let task = TaskOptimizer::new(config.clone(), blocklist);
    let (stats, cancelled) = tokio::task::spawn_blocking(move || {
        let mut tracker = ProgressTracker::new(files.len(), json_output);
        let mut batch = BatchOptimizer::with_cancellation(task, stop_receiver);
        let reports = batch.run(&files, |_, report| tracker.handle_file_completion(report));
        tracker.finish();
        (tracker.stats().clone(), reports.len() < files.len())
    })
    .await?;

    print_final_stats(&config, &stats, start_time, cancelled);
    Ok(())
}

/// Stampa statistiche finali
fn print_final_stats(
    config: &Config,
    stats: &OptimizationStats,
    start_time: Instant,
    cancelled: bool,
) {
    let duration = start_time.elapsed().as_secs_f64();

    if config.json_output {
        JsonMessage::complete(stats, duration, cancelled).emit();
        return;
    }

    info!("=== Compression Complete ===");
    if cancelled {
        warn!("Run cancelled before all files were processed");
    }
    info!("Files processed: {}", stats.files_processed);
    info!("Files compressed: {}", stats.files_compressed);
    info!("Files skipped (under 5 MB): {}", stats.files_skipped);
    info!("Files kept (no improvement): {}", stats.files_kept);
    info!("Errors: {}", stats.errors);
    info!(
        "Size: {} -> {}",
        FileManager::format_size(stats.total_original_size),
        FileManager::format_size(stats.total_new_size)
    );
    info!(
        "Bytes saved: {} ({:.2}%)",
        FileManager::format_size(stats.total_bytes_saved()),
        stats.overall_reduction_percent()
    );
    info!("Elapsed: {:.1}s", duration);
}
