//! Headless browser download and cache management
//!
//! This module handles automatic downloading and caching of a pinned
//! Chrome-for-Testing `chrome-headless-shell` build for machines without a
//! Chromium installation. Builds are stored in the system's standard cache
//! directory and reused across runs.

use humansize::{DECIMAL, format_size};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors that can occur while locating or provisioning a browser
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// No browser was found and provisioning is disabled
    #[error("No browser found: {0}")]
    NotFound(String),

    /// A configured executable path does not exist
    #[error("Configured browser executable does not exist: {0}")]
    ExecutableMissing(PathBuf),

    /// No prebuilt headless shell exists for this platform
    #[error("No headless shell build available for this platform")]
    UnsupportedPlatform,

    /// Failed to determine cache directory location
    #[error("Failed to determine cache directory location")]
    CacheDirectoryNotFound,

    /// Failed to create or access cache directory
    #[error("Failed to create cache directory at {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to download the archive
    #[error("Failed to download browser from {url}: {source}")]
    DownloadFailed {
        url: String,
        source: reqwest::Error,
    },

    /// HTTP error during download
    #[error("HTTP error downloading browser: {0}")]
    HttpError(String),

    /// Failed to write to the cache
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The downloaded file is not a usable archive
    #[error("Invalid browser archive at {path}: {reason}")]
    InvalidArchive { path: PathBuf, reason: String },
}

/// Pinned Chrome-for-Testing version
pub const HEADLESS_SHELL_VERSION: &str = "131.0.6778.85";

/// Base URL for Chrome-for-Testing downloads
const DOWNLOAD_BASE_URL: &str = "https://storage.googleapis.com/chrome-for-testing-public";

/// Minimum expected size for the archive (in bytes)
/// This helps detect truncated downloads or error pages
const MIN_ARCHIVE_SIZE: u64 = 10 * 1024 * 1024;

/// Chrome-for-Testing platform identifier for the running system
fn platform() -> Option<&'static str> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => Some("linux64"),
        ("macos", "aarch64") => Some("mac-arm64"),
        ("macos", "x86_64") => Some("mac-x64"),
        ("windows", "x86_64") => Some("win64"),
        ("windows", "x86") => Some("win32"),
        _ => None,
    }
}

/// Download URL of the headless shell archive for a platform
fn archive_url(version: &str, platform: &str) -> String {
    format!(
        "{}/{}/{}/chrome-headless-shell-{}.zip",
        DOWNLOAD_BASE_URL, version, platform, platform
    )
}

/// Path of the executable inside an extracted archive
fn executable_path(install_dir: &Path, platform: &str) -> PathBuf {
    let binary = if platform.starts_with("win") {
        "chrome-headless-shell.exe"
    } else {
        "chrome-headless-shell"
    };
    install_dir
        .join(format!("chrome-headless-shell-{}", platform))
        .join(binary)
}

/// Ensures the pinned headless shell is available, downloading it if necessary
///
/// # Returns
///
/// The path to the cached browser executable
pub fn ensure_browser_available() -> Result<PathBuf, ProvisioningError> {
    let platform = platform().ok_or(ProvisioningError::UnsupportedPlatform)?;

    let install_dir = get_browser_cache_dir()?.join(HEADLESS_SHELL_VERSION);
    let executable = executable_path(&install_dir, platform);

    if executable.is_file() {
        return Ok(executable);
    }

    // Partial extraction from an earlier run - start over
    if install_dir.exists() {
        let _ = fs::remove_dir_all(&install_dir);
    }
    fs::create_dir_all(&install_dir).map_err(|e| ProvisioningError::DirectoryCreationFailed {
        path: install_dir.clone(),
        source: e,
    })?;

    let archive_path = install_dir.join("chrome-headless-shell.zip");
    download_archive(&archive_url(HEADLESS_SHELL_VERSION, platform), &archive_path)?;
    extract_archive(&archive_path, &install_dir)?;
    let _ = fs::remove_file(&archive_path);

    if !executable.is_file() {
        return Err(ProvisioningError::InvalidArchive {
            path: archive_path,
            reason: format!("archive did not contain {}", executable.display()),
        });
    }

    info!(executable = %executable.display(), "headless shell cached");

    Ok(executable)
}

/// Downloads the archive to `target_path`
///
/// The body is streamed to a `.tmp` file which is renamed into place once it
/// has been verified to be a zip archive of plausible size.
fn download_archive(url: &str, target_path: &Path) -> Result<(), ProvisioningError> {
    info!(%url, "downloading headless shell, this may take a few minutes");

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(600)) // 10 minute timeout
        .build()
        .map_err(|e| ProvisioningError::DownloadFailed {
            url: url.to_string(),
            source: e,
        })?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| ProvisioningError::DownloadFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !response.status().is_success() {
        return Err(ProvisioningError::HttpError(format!(
            "HTTP {} while downloading browser from {}",
            response.status(),
            url
        )));
    }

    let total_size = response.content_length();
    let temp_path = target_path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| ProvisioningError::WriteFailed {
        path: temp_path.clone(),
        source: e,
    })?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0; 64 * 1024];
    let mut last_progress_percent = 0;

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| ProvisioningError::WriteFailed {
                path: temp_path.clone(),
                source: e,
            })?;

        if bytes_read == 0 {
            break; // EOF
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| ProvisioningError::WriteFailed {
                path: temp_path.clone(),
                source: e,
            })?;

        downloaded += bytes_read as u64;

        // Log progress every 10%
        if let Some(total) = total_size.filter(|&t| t > 0) {
            let progress_percent = (downloaded * 100 / total) as u32;
            if progress_percent >= last_progress_percent + 10 {
                info!(
                    "download progress: {}% ({} of {})",
                    progress_percent,
                    format_size(downloaded, DECIMAL),
                    format_size(total, DECIMAL)
                );
                last_progress_percent = progress_percent;
            }
        }
    }

    drop(file);

    if let Err(reason) = verify_archive(&temp_path, downloaded) {
        let _ = fs::remove_file(&temp_path);
        return Err(ProvisioningError::InvalidArchive {
            path: target_path.to_path_buf(),
            reason,
        });
    }

    fs::rename(&temp_path, target_path).map_err(|e| ProvisioningError::WriteFailed {
        path: target_path.to_path_buf(),
        source: e,
    })?;

    info!("downloaded {}", format_size(downloaded, DECIMAL));

    Ok(())
}

/// Checks size and magic bytes of a downloaded archive
fn verify_archive(path: &Path, size: u64) -> Result<(), String> {
    if size < MIN_ARCHIVE_SIZE {
        return Err(format!(
            "downloaded file is too small ({}), expected at least {}",
            format_size(size, DECIMAL),
            format_size(MIN_ARCHIVE_SIZE, DECIMAL)
        ));
    }

    let mut header = [0u8; 8];
    fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut header))
        .map_err(|e| format!("unreadable download: {}", e))?;

    if !infer::archive::is_zip(&header) {
        return Err("downloaded file is not a zip archive".to_string());
    }

    Ok(())
}

/// Extracts every entry of the archive below `destination`
///
/// Entries with paths escaping the destination are skipped. Unix permission
/// bits stored in the archive are restored so that the shell and its helper
/// binaries stay executable.
fn extract_archive(archive_path: &Path, destination: &Path) -> Result<(), ProvisioningError> {
    let invalid = |reason: String| ProvisioningError::InvalidArchive {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = fs::File::open(archive_path).map_err(|e| ProvisioningError::WriteFailed {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| invalid(e.to_string()))?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| invalid(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out_path = destination.join(relative);
        let write_failed = |e: io::Error| ProvisioningError::WriteFailed {
            path: out_path.clone(),
            source: e,
        };

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(write_failed)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        let mut out = fs::File::create(&out_path).map_err(write_failed)?;
        io::copy(&mut entry, &mut out).map_err(write_failed)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777)).map_err(write_failed)?;
        }
    }

    Ok(())
}

/// Gets the cache directory for provisioned browsers
///
/// Returns the platform-specific cache directory path:
/// - Linux: ~/.cache/miruro-extractor/browser/
/// - macOS: ~/Library/Caches/io.miruro.miruro-extractor/browser/
/// - Windows: %LOCALAPPDATA%\miruro\miruro-extractor\cache\browser\
fn get_browser_cache_dir() -> Result<PathBuf, ProvisioningError> {
    let proj_dirs = directories::ProjectDirs::from("io", "miruro", "miruro-extractor")
        .ok_or(ProvisioningError::CacheDirectoryNotFound)?;

    let cache_dir = proj_dirs.cache_dir().join("browser");

    fs::create_dir_all(&cache_dir).map_err(|e| ProvisioningError::DirectoryCreationFailed {
        path: cache_dir.clone(),
        source: e,
    })?;

    Ok(cache_dir)
}
