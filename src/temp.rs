//! Temporary directory management module
//!
//! This module provides RAII-based temporary directories with automatic
//! cleanup. Each browser session gets its own throwaway profile directory so
//! that no cookies, cache or player state leak from one episode to the next.

use std::fs;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Guard for a temporary directory that is removed recursively on drop
#[derive(Debug)]
pub(crate) struct TempGuard {
    path: PathBuf,
}

impl TempGuard {
    /// Get the path to the temporary directory
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        // Silently ignore errors during cleanup
        let _ = fs::remove_dir_all(&self.path);
    }
}

impl Deref for TempGuard {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path()
    }
}

/// Creates a temporary directory and returns a guard that removes it on drop
///
/// The directory is created in the system's temporary directory with a
/// unique name generated using ULID (monotonic, sortable unique identifier).
///
/// # Examples
///
/// ```ignore
/// let profile = create_temp_dir("chrome_profile")?;
/// // Hand profile.path() to the browser as its user data directory
/// // Directory and contents are deleted when profile goes out of scope
/// ```
pub(crate) fn create_temp_dir(prefix: &str) -> io::Result<TempGuard> {
    let ulid = ulid::Ulid::new();
    let path = std::env::temp_dir().join(format!("{}_{}", prefix, ulid));

    fs::create_dir_all(&path)?;

    Ok(TempGuard { path })
}
