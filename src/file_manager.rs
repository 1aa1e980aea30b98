//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la discovery dei PDF.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva dei file PDF in una directory
//! - Commit atomico: file temporaneo nella stessa directory + rename sull'originale
//! - Utilità per calcoli dimensioni e percentuali
//! - Formattazione human-readable delle dimensioni
//!
//! ## Sicurezza operazioni:
//! - Il file temporaneo viene scritto, sincronizzato su disco e solo poi rinominato
//! - Dopo il rename anche la directory viene sincronizzata (Unix), così il nuovo
//!   nome sopravvive a un'interruzione di corrente
//! - In caso di errore il temporaneo viene rimosso e l'originale resta intatto
//! - I permessi dell'originale vengono copiati sul temporaneo prima del rename
//!
//! ## Esempio:
//! ```rust,no_run
//! use pdf_space_optimizer::FileManager;
//! use std::path::Path;
//!
//! let files = FileManager::find_pdf_files(Path::new("/path/to/scans"))?;
//! for file in files {
//!     println!("{}", file.display());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::Result;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Find all PDF files under a directory, sorted by path
    pub fn find_pdf_files(root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if Self::is_pdf(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Check if a file has a `.pdf` extension (any case)
    pub fn is_pdf(path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
    }

    /// Atomically replace `target` with `bytes`.
    ///
    /// Readers see either the old or the new content in full, never a partial write.
    pub fn write_atomically(target: &Path, bytes: &[u8]) -> io::Result<()> {
        Self::write_atomically_with(target, bytes, |_| Ok(()))
    }

    /// Like [`FileManager::write_atomically`], running `before_rename` on the
    /// fully written temporary file just before it is renamed over `target`.
    ///
    /// An error from the hook aborts the commit: the temporary file is removed
    /// and `target` is left untouched.
    pub fn write_atomically_with<F>(target: &Path, bytes: &[u8], before_rename: F) -> io::Result<()>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = tempfile::Builder::new()
            .prefix(".pdf-optimizer-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;

        if let Ok(metadata) = fs::metadata(target) {
            fs::set_permissions(temp.path(), metadata.permissions())?;
        }

        before_rename(temp.path())?;

        debug!("Renaming {} -> {}", temp.path().display(), target.display());
        temp.persist(target).map_err(|e| e.error)?;
        sync_directory(dir)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

/// Flushes a directory entry change (the rename) to disk
#[cfg(unix)]
fn sync_directory(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_calculate_reduction() {
        assert_eq!(FileManager::calculate_reduction(0, 10), 0.0);
        assert_eq!(FileManager::calculate_reduction(200, 50), 75.0);
        assert!(FileManager::calculate_reduction(100, 120) < 0.0);
    }

    #[test]
    fn test_find_pdf_files_recursive_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("b/nested")).unwrap();
        fs::write(root.join("b/nested/scan.PDF"), b"x").unwrap();
        fs::write(root.join("a.pdf"), b"x").unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();
        fs::write(root.join("pdf"), b"x").unwrap();

        let files = FileManager::find_pdf_files(root).unwrap();
        assert_eq!(files, vec![root.join("a.pdf"), root.join("b/nested/scan.PDF")]);
    }

    #[test]
    fn test_write_atomically_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("doc.pdf");
        fs::write(&target, b"original contents").unwrap();

        FileManager::write_atomically(&target, b"new").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert_eq!(entries(temp_dir.path()), vec!["doc.pdf"]);
    }

    #[test]
    fn test_failure_before_rename_leaves_original() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("doc.pdf");
        fs::write(&target, b"original contents").unwrap();

        let result = FileManager::write_atomically_with(&target, b"new", |temp| {
            assert_eq!(fs::read(temp).unwrap(), b"new");
            Err(io::Error::new(io::ErrorKind::Other, "simulated crash"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&target).unwrap(), b"original contents");
        assert_eq!(entries(temp_dir.path()), vec!["doc.pdf"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_synced_after_rename() {
        let temp_dir = TempDir::new().unwrap();
        assert!(sync_directory(temp_dir.path()).is_ok());
        assert!(sync_directory(&temp_dir.path().join("gone")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("doc.pdf");
        fs::write(&target, b"original").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o640)).unwrap();

        FileManager::write_atomically(&target, b"new").unwrap();

        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }
}
