use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub fn app_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("app", "stillpoint", "stillpoint")
        .ok_or_else(|| anyhow!("cannot resolve project dirs"))
}

pub fn ensure_data_dir() -> Result<PathBuf> {
    let dirs = app_dirs()?;
    let data_dir = dirs.data_dir().to_path_buf();
    fs::create_dir_all(&data_dir).context("create data dir")?;
    Ok(data_dir)
}

pub fn logs_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// Splits `data:image/png;base64,AAAA` into its MIME type and payload.
/// Input without a header is returned as-is with no MIME type.
pub fn split_data_url(s: &str) -> (Option<&str>, &str) {
    let Some(rest) = s.strip_prefix("data:") else {
        return (None, s);
    };
    match rest.split_once(',') {
        Some((header, data)) => {
            let mime = header.split(';').next().filter(|m| !m.is_empty());
            (mime, data)
        }
        None => (None, s),
    }
}

pub fn data_url(mime: &str, b64: &str) -> String {
    format!("data:{mime};base64,{b64}")
}
