use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while writing the link report
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to create output directory {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("Failed to write report {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// An episode with its extracted video link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEpisode {
    pub episode: u32,
    pub url: String,
}

/// File name of the report for a title
pub fn report_file_name(media_id: u32) -> String {
    format!("miruro_{}_videos.txt", media_id)
}

/// Renders one `Episode <n>: <url>` line per resolved episode
pub fn format_report(episodes: &[ResolvedEpisode]) -> String {
    episodes
        .iter()
        .map(|e| format!("Episode {}: {}\n", e.episode, e.url))
        .collect()
}

/// Writes the report into `output_dir`, replacing any previous report
///
/// # Returns
///
/// The path of the written file
pub fn write_report(
    output_dir: &Path,
    media_id: u32,
    episodes: &[ResolvedEpisode],
) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(output_dir).map_err(|e| ReportError::DirectoryCreationFailed {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let path = output_dir.join(report_file_name(media_id));
    let temp_path = path.with_extension("txt.tmp");

    fs::write(&temp_path, format_report(episodes)).map_err(|e| ReportError::WriteFailed {
        path: temp_path.clone(),
        source: e,
    })?;

    fs::rename(&temp_path, &path).map_err(|e| ReportError::WriteFailed {
        path: path.clone(),
        source: e,
    })?;

    Ok(path)
}
