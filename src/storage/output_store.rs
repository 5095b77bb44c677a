// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generated image storage
//!
//! Every generation is written under its own random id, so concurrent
//! requests never overwrite each other's output. The directory keeps at
//! most `max_files` images; the oldest are evicted first.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// URL prefix the stored files are served under
pub const OUTPUTS_ROUTE_PREFIX: &str = "/outputs";

const PNG_EXTENSION: &str = "png";

/// A saved output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOutput {
    pub id: Uuid,
    pub path: PathBuf,
}

impl StoredOutput {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, PNG_EXTENSION)
    }

    /// Relative URL clients fetch the image from
    pub fn url(&self) -> String {
        format!("{}/{}", OUTPUTS_ROUTE_PREFIX, self.file_name())
    }
}

/// Parse `<uuid>.png`; anything else (including path segments) is rejected
pub fn parse_file_name(name: &str) -> Option<Uuid> {
    let stem = name.strip_suffix(".png")?;
    Uuid::parse_str(stem).ok()
}

#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
    /// Retained images; 0 keeps everything
    max_files: usize,
}

impl OutputStore {
    /// Open (creating if needed) the output directory
    pub async fn open(dir: impl Into<PathBuf>, max_files: usize) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        info!("Output store at {} (max {} files)", dir.display(), max_files);
        Ok(Self { dir, max_files })
    }

    fn path_for(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{}.{}", id, PNG_EXTENSION))
    }

    /// Write PNG bytes under a fresh id
    pub async fn save_png(&self, png: &[u8]) -> Result<StoredOutput> {
        let id = Uuid::new_v4();
        let path = self.path_for(&id);
        let tmp = self.dir.join(format!("{}.tmp", id));

        let written = match tokio::fs::write(&tmp, png).await {
            Ok(()) => tokio::fs::rename(&tmp, &path)
                .await
                .with_context(|| format!("Failed to move output into {}", path.display())),
            Err(e) => Err(e).with_context(|| format!("Failed to write {}", tmp.display())),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        debug!("Stored output {} ({} bytes)", id, png.len());
        if let Err(e) = self.evict_oldest(&id).await {
            warn!("Output eviction failed: {:#}", e);
        }
        Ok(StoredOutput { id, path })
    }

    /// Ids of stored images, oldest first
    pub async fn list(&self) -> Result<Vec<Uuid>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        let mut outputs: Vec<(SystemTime, Uuid)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(parse_file_name) else {
                continue;
            };
            let modified = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            outputs.push((modified, id));
        }
        outputs.sort();
        Ok(outputs.into_iter().map(|(_, id)| id).collect())
    }

    /// Delete the oldest images beyond `max_files`, never `keep`
    async fn evict_oldest(&self, keep: &Uuid) -> Result<()> {
        if self.max_files == 0 {
            return Ok(());
        }
        let outputs = self.list().await?;
        let excess = outputs.len().saturating_sub(self.max_files);
        for id in outputs.iter().filter(|id| *id != keep).take(excess) {
            match tokio::fs::remove_file(self.path_for(id)).await {
                Ok(()) => debug!("Evicted output {}", id),
                // A concurrent save already evicted it
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).context(format!("Failed to evict output {}", id)),
            }
        }
        Ok(())
    }

    /// Read a stored output by file name; `None` if malformed or unknown
    pub async fn load(&self, file_name: &str) -> Result<Option<Vec<u8>>> {
        let Some(id) = parse_file_name(file_name) else {
            return Ok(None);
        };
        match tokio::fs::read(self.path_for(&id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(format!("Failed to read output {}", id)),
        }
    }
}
