//! # Path Safety Validator Module
//!
//! Questo modulo decide se una directory è sicura per la scrittura prima che
//! qualunque file venga toccato.
//!
//! ## Responsabilità:
//! - Normalizza i path (assoluti, senza `.`/`..`, separatori e maiuscole uniformi)
//! - Risolve symlink e junction verso il target reale prima della classificazione
//! - Confronta il path con una blocklist dichiarativa a due livelli
//!
//! ## Livelli di blocco:
//! - **Complete**: directory di sistema, programmi, cache interne al profilo,
//!   cestini e root di volume. Blocca la directory e *tutte* le sottodirectory.
//! - **RootOnly**: home dell'utente, cartelle personali (Desktop, Documents,
//!   Downloads, ...) e cartelle di sync cloud (prefisso `OneDrive`, `Dropbox`, ...).
//!   Blocca solo la cartella esatta, le sottocartelle sono permesse.
//!
//! ## Precedenza:
//! 1. Qualunque regola Complete che corrisponde (a qualsiasi profondità) vince
//! 2. Poi le regole RootOnly, solo su corrispondenza esatta
//! 3. Altrimenti `Allowed`
//!
//! Il matching è per segmenti di path, mai per sottostringa: una cartella
//! chiamata `MyDesktopStuff` non corrisponde alla regola `Desktop`.
//!
//! ## Esempio:
//! ```rust
//! use pdf_space_optimizer::path_validator::{Blocklist, PathClassification};
//!
//! let blocklist = Blocklist::windows(r"C:\Users\Alice");
//! assert_eq!(
//!     blocklist.classify_lexical(r"C:\Users\Alice\Downloads").unwrap(),
//!     PathClassification::BlockedRootOnly
//! );
//! ```

use crate::error::PathValidationError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Result of classifying a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathClassification {
    Allowed,
    BlockedCompletely,
    BlockedRootOnly,
}

impl PathClassification {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PathClassification::Allowed)
    }

    /// User-facing explanation of the classification
    pub fn message(&self) -> &'static str {
        match self {
            PathClassification::Allowed => "Folder can be processed.",
            PathClassification::BlockedCompletely => {
                "System directories and drive roots are not allowed."
            }
            PathClassification::BlockedRootOnly => {
                "Please select a specific subfolder (e.g. Downloads/MyProject)."
            }
        }
    }
}

impl fmt::Display for PathClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PathClassification::Allowed => "allowed",
            PathClassification::BlockedCompletely => "blocked completely",
            PathClassification::BlockedRootOnly => "blocked at root only",
        };
        f.write_str(label)
    }
}

/// Path syntax and case rules of a filesystem family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathFlavor {
    /// Drive letters or UNC shares, `\` or `/` separators, case-insensitive
    Windows,
    /// Case-insensitive POSIX paths (default macOS volumes)
    MacOs,
    /// Case-sensitive POSIX paths
    Posix,
}

impl PathFlavor {
    pub fn host() -> Self {
        if cfg!(windows) {
            PathFlavor::Windows
        } else if cfg!(target_os = "macos") {
            PathFlavor::MacOs
        } else {
            PathFlavor::Posix
        }
    }

    fn case_insensitive(&self) -> bool {
        !matches!(self, PathFlavor::Posix)
    }

    fn fold(&self, segment: &str) -> String {
        if self.case_insensitive() {
            segment.to_lowercase()
        } else {
            segment.to_string()
        }
    }
}

/// An absolute path reduced to a volume root plus clean segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    pub root: String,
    pub segments: Vec<String>,
}

impl NormalizedPath {
    /// Lexically normalize `raw` according to `flavor`.
    ///
    /// Relative and drive-relative inputs (`docs`, `C:docs`, `\docs`) are rejected.
    pub fn parse(raw: &str, flavor: PathFlavor) -> Result<Self, PathValidationError> {
        if raw.trim().is_empty() {
            return Err(PathValidationError::Empty);
        }

        let (root, rest) = match flavor {
            PathFlavor::Windows => split_windows_root(raw)?,
            PathFlavor::MacOs | PathFlavor::Posix => match raw.strip_prefix('/') {
                Some(rest) => ("/".to_string(), rest.to_string()),
                None => return Err(PathValidationError::Relative(raw.to_string())),
            },
        };

        let separators: &[char] = match flavor {
            PathFlavor::Windows => &['\\', '/'],
            _ => &['/'],
        };

        let mut segments: Vec<String> = Vec::new();
        for part in rest.split(separators) {
            match part {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                name => {
                    // Windows ignores trailing dots and spaces in names
                    let name = if flavor == PathFlavor::Windows {
                        name.trim_end_matches(['.', ' '])
                    } else {
                        name
                    };
                    if !name.is_empty() {
                        segments.push(flavor.fold(name));
                    }
                }
            }
        }

        Ok(Self { root, segments })
    }

    fn starts_with(&self, other: &NormalizedPath) -> bool {
        self.root == other.root
            && self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }
}

fn split_windows_root(raw: &str) -> Result<(String, String), PathValidationError> {
    let unified = raw.replace('/', "\\");
    let unified = if let Some(unc) = unified.strip_prefix(r"\\?\UNC\") {
        format!(r"\\{}", unc)
    } else if let Some(verbatim) = unified.strip_prefix(r"\\?\") {
        verbatim.to_string()
    } else {
        unified
    };

    if let Some(unc) = unified.strip_prefix(r"\\") {
        let mut parts = unc.split('\\').filter(|p| !p.is_empty());
        let (server, share) = match (parts.next(), parts.next()) {
            (Some(server), Some(share)) => (server, share),
            _ => return Err(PathValidationError::Relative(raw.to_string())),
        };
        let root = format!(r"\\{}\{}", server.to_lowercase(), share.to_lowercase());
        let rest = parts.collect::<Vec<_>>().join("\\");
        return Ok((root, rest));
    }

    let bytes = unified.as_bytes();
    let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if has_drive && bytes.get(2) == Some(&b'\\') {
        let root = unified[..2].to_lowercase();
        return Ok((root, unified[3..].to_string()));
    }

    Err(PathValidationError::Relative(raw.to_string()))
}

/// Restriction tier of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTier {
    /// Blocks the location and every descendant
    Complete,
    /// Blocks the exact location only
    RootOnly,
}

#[derive(Debug, Clone)]
enum RulePattern {
    /// A fixed directory
    Dir(NormalizedPath),
    /// Any child of `parent` whose name starts with `prefix`
    ChildNamePrefix { parent: NormalizedPath, prefix: String },
    /// A top-level folder of the given name on any volume
    OnAnyVolume(String),
    /// The bare root of any volume
    VolumeRoot,
}

/// One entry of the blocklist table
#[derive(Debug, Clone)]
pub struct BlockRule {
    pattern: RulePattern,
    tier: BlockTier,
}

impl BlockRule {
    /// Number of leading segments of `path` that make up the matched location,
    /// or `None` when the rule location is not `path` or one of its ancestors.
    fn anchor(&self, path: &NormalizedPath) -> Option<usize> {
        match &self.pattern {
            RulePattern::Dir(dir) => path.starts_with(dir).then_some(dir.segments.len()),
            RulePattern::ChildNamePrefix { parent, prefix } => {
                let depth = parent.segments.len();
                let child_matches = path.starts_with(parent)
                    && path
                        .segments
                        .get(depth)
                        .is_some_and(|name| name.starts_with(prefix.as_str()));
                child_matches.then_some(depth + 1)
            }
            RulePattern::OnAnyVolume(name) => {
                (path.segments.first() == Some(name)).then_some(1)
            }
            RulePattern::VolumeRoot => path.segments.is_empty().then_some(0),
        }
    }

    fn matches(&self, path: &NormalizedPath) -> bool {
        match (self.tier, self.anchor(path)) {
            (BlockTier::Complete, Some(_)) => true,
            (BlockTier::RootOnly, Some(depth)) => depth == path.segments.len(),
            (_, None) => false,
        }
    }
}

const WINDOWS_SYSTEM_DIRS: &[&str] = &[
    r"C:\Windows",
    r"C:\Program Files",
    r"C:\Program Files (x86)",
    r"C:\ProgramData",
];
const WINDOWS_ANY_VOLUME_DIRS: &[&str] = &["$Recycle.Bin", "System Volume Information"];
const WINDOWS_PROFILE_INTERNAL: &[&str] = &["AppData"];
const WINDOWS_PERSONAL_FOLDERS: &[&str] = &[
    "Desktop",
    "Documents",
    "Downloads",
    "Pictures",
    "Music",
    "Videos",
];

const UNIX_SYSTEM_DIRS: &[&str] = &[
    "/etc",
    "/bin",
    "/sbin",
    "/usr",
    "/var",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/lib",
    "/lib64",
    "/System",
    "/Library",
    "/Applications",
    "/private",
];
const UNIX_PROFILE_INTERNAL: &[&str] = &["Library", ".cache", ".Trash", ".local/share/Trash"];
const UNIX_PERSONAL_FOLDERS: &[&str] = &[
    "Desktop",
    "Documents",
    "Downloads",
    "Pictures",
    "Music",
    "Videos",
    "Movies",
];

const CLOUD_SYNC_PREFIXES: &[&str] = &["OneDrive", "Dropbox", "Google Drive", "iCloudDrive"];

/// Ordered two-tier blocklist
#[derive(Debug, Clone)]
pub struct Blocklist {
    flavor: PathFlavor,
    rules: Vec<BlockRule>,
}

impl Blocklist {
    /// A blocklist without rules; every absolute path is allowed
    pub fn empty(flavor: PathFlavor) -> Self {
        Self {
            flavor,
            rules: Vec::new(),
        }
    }

    /// Rules for the running platform, anchored at the current user's home
    pub fn for_host() -> Self {
        let home = dirs::home_dir().map(|home| home.to_string_lossy().into_owned());
        if home.is_none() {
            warn!("Could not find home directory, personal folder rules disabled");
        }

        match PathFlavor::host() {
            PathFlavor::Windows => Self::build_windows(home.as_deref()),
            flavor => Self::build_unix(home.as_deref(), flavor),
        }
    }

    /// Windows rules for a profile rooted at `home` (e.g. `C:\Users\Alice`)
    pub fn windows(home: &str) -> Self {
        Self::build_windows(Some(home))
    }

    /// Linux/macOS rules for a profile rooted at `home`
    pub fn unix(home: &str, flavor: PathFlavor) -> Self {
        Self::build_unix(Some(home), flavor)
    }

    fn build_windows(home: Option<&str>) -> Self {
        let mut blocklist = Self::empty(PathFlavor::Windows);
        blocklist.push(RulePattern::VolumeRoot, BlockTier::Complete);
        for dir in WINDOWS_SYSTEM_DIRS {
            blocklist.block_dir(dir, BlockTier::Complete);
        }
        for name in WINDOWS_ANY_VOLUME_DIRS {
            let name = PathFlavor::Windows.fold(name);
            blocklist.push(RulePattern::OnAnyVolume(name), BlockTier::Complete);
        }
        if let Some(home) = home {
            blocklist.push_profile(home, WINDOWS_PROFILE_INTERNAL, WINDOWS_PERSONAL_FOLDERS);
        }
        blocklist
    }

    fn build_unix(home: Option<&str>, flavor: PathFlavor) -> Self {
        let mut blocklist = Self::empty(flavor);
        blocklist.push(RulePattern::VolumeRoot, BlockTier::Complete);
        for dir in UNIX_SYSTEM_DIRS {
            blocklist.block_dir(dir, BlockTier::Complete);
        }
        if let Some(home) = home {
            blocklist.push_profile(home, UNIX_PROFILE_INTERNAL, UNIX_PERSONAL_FOLDERS);
        }
        blocklist
    }

    fn push_profile(&mut self, home: &str, internal: &[&str], personal: &[&str]) {
        let home_path = match NormalizedPath::parse(home, self.flavor) {
            Ok(path) => path,
            Err(e) => {
                warn!("Ignoring unusable home directory {}: {}", home, e);
                return;
            }
        };

        for dir in internal {
            self.push(
                RulePattern::Dir(join(&home_path, dir, self.flavor)),
                BlockTier::Complete,
            );
        }

        self.push(RulePattern::Dir(home_path.clone()), BlockTier::RootOnly);
        for dir in personal {
            self.push(
                RulePattern::Dir(join(&home_path, dir, self.flavor)),
                BlockTier::RootOnly,
            );
        }
        for prefix in CLOUD_SYNC_PREFIXES {
            self.push(
                RulePattern::ChildNamePrefix {
                    parent: home_path.clone(),
                    prefix: self.flavor.fold(prefix),
                },
                BlockTier::RootOnly,
            );
        }
    }

    /// Adds a fixed directory rule; malformed entries are logged and ignored
    pub fn block_dir(&mut self, dir: &str, tier: BlockTier) {
        match NormalizedPath::parse(dir, self.flavor) {
            Ok(path) => self.push(RulePattern::Dir(path), tier),
            Err(e) => warn!("Skipping malformed blocklist entry {}: {}", dir, e),
        }
    }

    fn push(&mut self, pattern: RulePattern, tier: BlockTier) {
        self.rules.push(BlockRule { pattern, tier });
    }

    /// Classify a directory on the real filesystem.
    ///
    /// Symbolic links and junctions are resolved first; the longest existing
    /// ancestor is canonicalized when the directory itself does not exist.
    pub fn classify(&self, path: &Path) -> Result<PathClassification, PathValidationError> {
        if path.as_os_str().is_empty() {
            return Err(PathValidationError::Empty);
        }
        if !path.is_absolute() {
            return Err(PathValidationError::Relative(path.display().to_string()));
        }

        let resolved = resolve_links(path);
        if resolved != path {
            debug!("Resolved {} -> {}", path.display(), resolved.display());
        }
        self.classify_lexical(&resolved.to_string_lossy())
    }

    /// Classify a path string without touching the filesystem
    pub fn classify_lexical(&self, raw: &str) -> Result<PathClassification, PathValidationError> {
        let path = NormalizedPath::parse(raw, self.flavor)?;
        Ok(self.classify_normalized(&path))
    }

    pub fn classify_normalized(&self, path: &NormalizedPath) -> PathClassification {
        let tiers = [
            (BlockTier::Complete, PathClassification::BlockedCompletely),
            (BlockTier::RootOnly, PathClassification::BlockedRootOnly),
        ];

        for (tier, classification) in tiers {
            if self
                .rules
                .iter()
                .filter(|rule| rule.tier == tier)
                .any(|rule| rule.matches(path))
            {
                return classification;
            }
        }

        PathClassification::Allowed
    }
}

/// Classify `path` against the host blocklist
pub fn classify(path: &Path) -> Result<PathClassification, PathValidationError> {
    Blocklist::for_host().classify(path)
}

fn join(base: &NormalizedPath, relative: &str, flavor: PathFlavor) -> NormalizedPath {
    let mut joined = base.clone();
    joined.segments.extend(
        relative
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .map(|s| flavor.fold(s)),
    );
    joined
}

fn resolve_links(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for name in tail.iter().rev() {
                resolved.push(name);
            }
            return resolved;
        }

        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}
