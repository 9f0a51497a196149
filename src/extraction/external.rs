use crate::config::ToolsConfig;
use crate::error::{Error, ImportError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// External archiver binaries found on this host
#[derive(Clone, Debug, Default)]
pub struct ArchiverTools {
    /// bsdtar, used for .rar/.cbr
    pub bsdtar: Option<PathBuf>,
    /// 7z, used for .7z
    pub sevenzip: Option<PathBuf>,
}

impl ArchiverTools {
    /// Resolve binaries from explicit paths, falling back to a PATH search
    pub fn discover(config: &ToolsConfig) -> Self {
        let find = |explicit: &Option<PathBuf>, names: &[&str]| -> Option<PathBuf> {
            if let Some(path) = explicit {
                return Some(path.clone());
            }
            if !config.search_path {
                return None;
            }
            names.iter().find_map(|name| which::which(name).ok())
        };

        let tools = Self {
            bsdtar: find(&config.bsdtar_path, &["bsdtar"]),
            sevenzip: find(&config.sevenzip_path, &["7z", "7zz", "7za"]),
        };
        debug!(bsdtar = ?tools.bsdtar, sevenzip = ?tools.sevenzip, "archiver binaries");
        tools
    }

    /// Tools that are never used; every archive goes through the in-process decoders
    pub fn none() -> Self {
        Self::default()
    }
}

/// `bsdtar -xf <archive> -C <dest>`
pub async fn extract_with_bsdtar(
    binary: &Path,
    archive: &Path,
    dest: &Path,
    timeout: Duration,
) -> Result<()> {
    let mut command = Command::new(binary);
    command.arg("-xf").arg(archive).arg("-C").arg(dest);
    run_archiver(command, "bsdtar", archive, dest, timeout).await
}

/// `7z x -o<dest> -y <archive>`
pub async fn extract_with_7z(
    binary: &Path,
    archive: &Path,
    dest: &Path,
    timeout: Duration,
) -> Result<()> {
    let mut out_flag = std::ffi::OsString::from("-o");
    out_flag.push(dest);
    let mut command = Command::new(binary);
    command.arg("x").arg(out_flag).arg("-y").arg(archive);
    run_archiver(command, "7z", archive, dest, timeout).await
}

/// Run one archiver process, killing it when `timeout` elapses
async fn run_archiver(
    mut command: Command,
    tool: &str,
    archive: &Path,
    dest: &Path,
    timeout: Duration,
) -> Result<()> {
    tokio::fs::create_dir_all(dest).await?;

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(?archive, ?dest, tool, "running external archiver");

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::Import(ImportError::ArchiverUnavailable {
                archive: archive.to_path_buf(),
                reason: format!("{tool} not found: {e}"),
            }));
        }
        Ok(Err(e)) => {
            return Err(Error::Import(ImportError::ExtractionFailed {
                archive: archive.to_path_buf(),
                reason: format!("failed to execute {tool}: {e}"),
            }));
        }
        Err(_) => {
            warn!(?archive, tool, timeout_secs = timeout.as_secs(), "archiver timed out");
            return Err(Error::Import(ImportError::ArchiverTimeout {
                archive: archive.to_path_buf(),
                timeout,
            }));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Import(ImportError::ExtractionFailed {
            archive: archive.to_path_buf(),
            reason: format!("{tool} exited with {}: {}", output.status, stderr.trim()),
        }));
    }

    Ok(())
}
