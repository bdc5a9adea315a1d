use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::translation_service::TranslationUnit;

// @module: Durable progress tracking for the chunk pipeline

/// Durable record of pipeline progress.
///
/// Rewritten wholesale after every successfully completed chunk, so a crash
/// loses at most the in-flight chunk. Deleted only when every chunk is done.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckpointState {
    /// Completed chunk indices (serializes as a sorted array)
    #[serde(default)]
    pub completed_chunks: BTreeSet<usize>,

    /// Flat ordered list of accumulated translation units
    #[serde(default)]
    pub subtitles: Vec<TranslationUnit>,

    /// Total chunk count for the chunk size this state was built under
    #[serde(default)]
    pub total_chunks: usize,

    /// Cached terminology context, derived from content, not chunking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,

    /// Chunk size that produced this state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
}

impl CheckpointState {
    /// Derive the checkpoint path from the JSON output path
    /// (`out.json` -> `out_checkpoint.json`)
    pub fn derive_path(json_output: &Path) -> PathBuf {
        let stem = json_output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        json_output.with_file_name(format!("{}_checkpoint.json", stem))
    }

    /// Load a checkpoint from disk.
    ///
    /// A missing file or any corruption (unparseable JSON, wrong shape) is
    /// treated as "no checkpoint": the job restarts from empty progress,
    /// never raising to the caller.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!("No checkpoint at {}", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Self>(&content) {
                Ok(state) => {
                    info!(
                        "Checkpoint found: {}/{} chunks completed, resuming",
                        state.completed_chunks.len(),
                        state.total_chunks
                    );
                    state
                }
                Err(e) => {
                    warn!("Checkpoint file corrupted, starting fresh: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Checkpoint file unreadable, starting fresh: {}", e);
                Self::default()
            }
        }
    }

    /// Persist the checkpoint atomically: write to a temporary file in the
    /// same directory, then rename over the target. A crash mid-write never
    /// corrupts an existing checkpoint.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize checkpoint")?;

        let tmp = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new_in("."),
        }
        .context("Failed to create temporary checkpoint file")?;

        fs::write(tmp.path(), json).context("Failed to write temporary checkpoint file")?;
        tmp.persist(path)
            .map_err(|e| anyhow::anyhow!("Failed to replace checkpoint {}: {}", path.display(), e))?;

        Ok(())
    }

    /// Delete the checkpoint file if it exists
    pub fn delete(path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove checkpoint: {}", path.display()))?;
        }
        Ok(())
    }

    /// Whether every chunk is completed
    pub fn is_complete(&self) -> bool {
        self.total_chunks > 0 && self.completed_chunks.len() == self.total_chunks
    }

    /// Discard chunk progress while preserving the cached terminology.
    /// Keywords are derived from content, not chunking, so they survive.
    pub fn reset_progress(&mut self) {
        self.completed_chunks.clear();
        self.subtitles.clear();
        self.total_chunks = 0;
        self.chunk_size = None;
    }

    /// Reconcile loaded state against the current run's chunking. A mismatch
    /// in total chunk count or chunk size invalidates chunk progress only.
    pub fn align_to(&mut self, total_chunks: usize, chunk_size: usize) {
        let stale_total = self.total_chunks != 0 && self.total_chunks != total_chunks;
        let stale_size = self.chunk_size.is_some_and(|s| s != chunk_size);

        if stale_total || stale_size {
            warn!(
                "Chunking changed (stored {} chunks of {:?}, now {} chunks of {}), resetting progress",
                self.total_chunks, self.chunk_size, total_chunks, chunk_size
            );
            self.reset_progress();
        }

        self.total_chunks = total_chunks;
        self.chunk_size = Some(chunk_size);
    }
}
