//! Shared folder access: listing, storage accounting and safe name resolution

use crate::types::FileEntry;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Errors raised by catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Name would escape the shared folder or is empty
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The folder whose regular files are offered to the LAN
#[derive(Debug, Clone)]
pub struct FileCatalog {
    root: PathBuf,
}

impl FileCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the shared folder if it does not exist yet
    pub async fn ensure_root(&self) -> Result<(), CatalogError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Maps a client-supplied name to a path inside the shared folder.
    ///
    /// Only plain names are accepted: no separators, no `.`/`..`, no NUL.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, CatalogError> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if invalid {
            return Err(CatalogError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Lists the regular files, sorted by name
    pub async fn list(&self) -> Result<Vec<FileEntry>, CatalogError> {
        self.ensure_root().await?;

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Removed between read_dir and stat
                Err(e) => {
                    debug!(path = ?entry.path(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let mtime = metadata
                .modified()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or(0);

            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                mtime,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Sums the sizes of all regular files
    pub async fn used_bytes(&self) -> Result<u64, CatalogError> {
        self.ensure_root().await?;

        let mut total = 0u64;
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => total += metadata.len(),
                Ok(_) => {}
                Err(e) => warn!(path = ?entry.path(), error = %e, "Skipping entry in size total"),
            }
        }
        Ok(total)
    }

    /// Opens a stored file for reading, with its length
    pub async fn open(&self, name: &str) -> Result<(fs::File, u64), CatalogError> {
        let path = self.resolve(name)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(CatalogError::NotFound(name.to_string()));
        }
        Ok((file, metadata.len()))
    }

    /// Creates (or truncates) a file for an upload
    pub async fn create(&self, name: &str) -> Result<fs::File, CatalogError> {
        let path = self.resolve(name)?;
        self.ensure_root().await?;
        Ok(fs::File::create(path).await?)
    }

    /// Removes a stored file
    pub async fn delete(&self, name: &str) -> Result<(), CatalogError> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(CatalogError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Reduces an uploaded file name to its final path component
pub fn upload_file_name(raw: &str) -> Option<&str> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Formats a byte count with binary units, e.g. `"1.50 KB"`
pub fn human_readable_size(bytes: u64) -> String {
    const STEP: f64 = 1024.0;

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    for unit in ["KB", "MB", "GB", "TB"] {
        value /= STEP;
        if value < STEP {
            return format!("{:.2} {}", value, unit);
        }
    }
    format!("{:.2} PB", value / STEP)
}
