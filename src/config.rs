//! Configuration types for manga-import

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, str::FromStr, time::Duration};

/// Filesystem locations the engine reads from and writes to
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Canonical library root the reader consumes (default: "/manga")
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,

    /// Root the torrent client downloads into (default: "/downloads")
    ///
    /// Relative download paths reported by the client are resolved against it.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Parent of the per-pass temporary extraction directories
    #[serde(default = "default_extract_dir")]
    pub extract_dir: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library_dir: default_library_dir(),
            download_dir: default_download_dir(),
            extract_dir: default_extract_dir(),
        }
    }
}

/// Import pass behavior and the heuristics used to classify download content
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Delay between two scheduled import passes (default: 300s)
    #[serde(default = "default_pass_interval")]
    pub pass_interval: Duration,

    /// Upper bound for one external archiver invocation (default: 120s)
    #[serde(default = "default_archiver_timeout")]
    pub archiver_timeout: Duration,

    /// Two duplicate candidates whose page counts differ by at most this
    /// fraction of the larger count are considered the same size (default: 0.05)
    #[serde(default = "default_duplicate_tie_ratio")]
    pub duplicate_tie_ratio: f64,

    /// Largest gap between the two numbers of `NNN-MMM` that still counts as a
    /// two-page spread rather than sub-numbering (default: 2)
    #[serde(default = "default_spread_max_gap")]
    pub spread_max_gap: u64,

    /// Share of unparseable page names above which a volume is sorted purely
    /// by file name (default: 0.5)
    #[serde(default = "default_unparseable_fallback_ratio")]
    pub unparseable_fallback_ratio: f64,

    /// Extensions accepted as page images (without dots, case-insensitive)
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Extensions treated as archives (without dots, case-insensitive)
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,

    /// File names removed after extraction (case-insensitive)
    #[serde(default = "default_junk_file_names")]
    pub junk_file_names: Vec<String>,

    /// Directory names removed after extraction and never treated as volumes
    #[serde(default = "default_junk_dir_names")]
    pub junk_dir_names: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            pass_interval: default_pass_interval(),
            archiver_timeout: default_archiver_timeout(),
            duplicate_tie_ratio: default_duplicate_tie_ratio(),
            spread_max_gap: default_spread_max_gap(),
            unparseable_fallback_ratio: default_unparseable_fallback_ratio(),
            image_extensions: default_image_extensions(),
            archive_extensions: default_archive_extensions(),
            junk_file_names: default_junk_file_names(),
            junk_dir_names: default_junk_dir_names(),
        }
    }
}

/// External archiver binaries
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to bsdtar, used for .rar/.cbr (auto-detected if None)
    #[serde(default)]
    pub bsdtar_path: Option<PathBuf>,

    /// Path to 7z, used for .7z (auto-detected if None)
    #[serde(default)]
    pub sevenzip_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bsdtar_path: None,
            sevenzip_path: None,
            search_path: true,
        }
    }
}

/// Data storage
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./mangashelf.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for the import engine
///
/// Sub-configs are flattened for serialization, so the JSON format has no
/// nesting except for `persistence`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Library, download and extraction directories
    #[serde(flatten)]
    pub library: LibraryConfig,

    /// Pass scheduling and classification heuristics
    #[serde(flatten)]
    pub import: ImportConfig,

    /// External archiver paths
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first when present.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Recognized keys: `MANGA_DIR`, `DOWNLOAD_DIR`, `EXTRACT_DIR`,
    /// `IMPORT_INTERVAL` and `ARCHIVER_TIMEOUT` (seconds), `DUPLICATE_TIE_RATIO`,
    /// `SPREAD_MAX_GAP`, `DATABASE_PATH`, `BSDTAR_PATH`, `SEVENZIP_PATH`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(dir) = lookup("MANGA_DIR") {
            config.library.library_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("DOWNLOAD_DIR") {
            config.library.download_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("EXTRACT_DIR") {
            config.library.extract_dir = PathBuf::from(dir);
        }
        if let Some(secs) = parse_key::<u64, _>(&lookup, "IMPORT_INTERVAL")? {
            config.import.pass_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_key::<u64, _>(&lookup, "ARCHIVER_TIMEOUT")? {
            config.import.archiver_timeout = Duration::from_secs(secs);
        }
        if let Some(ratio) = parse_key::<f64, _>(&lookup, "DUPLICATE_TIE_RATIO")? {
            config.import.duplicate_tie_ratio = ratio;
        }
        if let Some(gap) = parse_key::<u64, _>(&lookup, "SPREAD_MAX_GAP")? {
            config.import.spread_max_gap = gap;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            config.persistence.database_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("BSDTAR_PATH") {
            config.tools.bsdtar_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("SEVENZIP_PATH") {
            config.tools.sevenzip_path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.import.pass_interval.is_zero() {
            return Err(Error::config(
                "pass interval must be greater than zero",
                "pass_interval",
            ));
        }
        if self.import.archiver_timeout.is_zero() {
            return Err(Error::config(
                "archiver timeout must be greater than zero",
                "archiver_timeout",
            ));
        }
        if !(0.0..1.0).contains(&self.import.duplicate_tie_ratio) {
            return Err(Error::config(
                "duplicate tie ratio must be within [0, 1)",
                "duplicate_tie_ratio",
            ));
        }
        if !(0.0..=1.0).contains(&self.import.unparseable_fallback_ratio) {
            return Err(Error::config(
                "unparseable fallback ratio must be within [0, 1]",
                "unparseable_fallback_ratio",
            ));
        }
        if self.import.image_extensions.is_empty() {
            return Err(Error::config(
                "at least one image extension is required",
                "image_extensions",
            ));
        }
        if self.import.archive_extensions.is_empty() {
            return Err(Error::config(
                "at least one archive extension is required",
                "archive_extensions",
            ));
        }
        Ok(())
    }
}

fn parse_key<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::config(format!("invalid value {raw:?}"), key)),
    }
}

fn default_library_dir() -> PathBuf {
    PathBuf::from("/manga")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("/downloads")
}

fn default_extract_dir() -> PathBuf {
    std::env::temp_dir().join("mangashelf-extract")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./mangashelf.db")
}

fn default_true() -> bool {
    true
}

fn default_pass_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_archiver_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_duplicate_tie_ratio() -> f64 {
    0.05
}

fn default_spread_max_gap() -> u64 {
    2
}

fn default_unparseable_fallback_ratio() -> f64 {
    0.5
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "webp", "gif", "avif"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_archive_extensions() -> Vec<String> {
    ["rar", "cbr", "zip", "cbz", "7z"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_junk_file_names() -> Vec<String> {
    ["thumbs.db", ".ds_store", "desktop.ini"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_junk_dir_names() -> Vec<String> {
    vec!["__macosx".to_string()]
}
