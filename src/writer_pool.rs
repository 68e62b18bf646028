//! Multi-writer pool (spec 4.2): N simultaneously-open append-only shard
//! sinks, staged under a `_staging` directory and promoted atomically.
//!
//! Grounded directly on the teacher's `partition::PartitionWriters`: same
//! staging-dir-then-atomic-rename shape, same per-writer mutex, same
//! `finalize()` contract. The difference is what selects the writer index —
//! here it's `hash::shard_of` on the caller-supplied key rather than an
//! in-struct `ahash` hasher, so that partitioning and any later re-partitioning
//! agree on shard placement. Opening N files is fronted by `fdlimit`'s soft
//! limit raise, which the teacher's single-process Reddit corpus workload
//! never needed at this scale.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::error::DiskJoinError;
use crate::fdlimit::FdLimitGuard;
use crate::util::{create_with_backoff, replace_file_atomic_backoff};

/// A pool of `num_shards` append-only writers, each backed by a staged temp
/// file. Call `write_to(shard, bytes)` to append raw bytes to a given shard's
/// sink; call `finalize()` to flush, close, and atomically promote every
/// staged file to its final path.
pub struct WriterPool {
    writers: Vec<Mutex<BufWriter<File>>>,
    tmp_paths: Vec<PathBuf>,
    final_paths: Vec<PathBuf>,
    _fd_guard: FdLimitGuard,
}

impl WriterPool {
    /// Open `num_shards` writers under `dir`, named `<stem>.<index>.<ext>`,
    /// via a `_staging` subdirectory. `write_buf_bytes` sizes each shard's
    /// internal `BufWriter`.
    pub fn open(dir: &Path, stem: &str, ext: &str, num_shards: usize, write_buf_bytes: usize) -> Result<Self> {
        let num_shards = num_shards.max(1);
        let fd_guard = FdLimitGuard::for_shard_count(num_shards)
            .context("raising file descriptor soft limit for shard writers")?;

        let staging = dir.join("_staging");
        fs::create_dir_all(&staging).with_context(|| format!("create_dir_all {}", staging.display()))?;
        fs::create_dir_all(dir).with_context(|| format!("create_dir_all {}", dir.display()))?;

        let mut writers = Vec::with_capacity(num_shards);
        let mut tmp_paths = Vec::with_capacity(num_shards);
        let mut final_paths = Vec::with_capacity(num_shards);

        for i in 0..num_shards {
            let tmp = staging.join(format!("{stem}.{i:05}.{ext}.inprogress"));
            let final_p = dir.join(format!("{stem}.{i:05}.{ext}"));
            let f = create_with_backoff(&tmp, 16, 50).map_err(|e| DiskJoinError::io(format!("create {}", tmp.display()), e))?;
            writers.push(Mutex::new(BufWriter::with_capacity(write_buf_bytes.max(8 * 1024), f)));
            tmp_paths.push(tmp);
            final_paths.push(final_p);
        }

        Ok(Self { writers, tmp_paths, final_paths, _fd_guard: fd_guard })
    }

    pub fn num_shards(&self) -> usize {
        self.writers.len()
    }

    /// Append `bytes` to the given shard's sink. Thread-safe: many worker
    /// threads may hold references to the same pool and write to different
    /// (or, occasionally, the same) shard concurrently.
    pub fn write_to(&self, shard: usize, bytes: &[u8]) -> Result<()> {
        let mut guard = self.writers[shard].lock();
        guard.write_all(bytes).with_context(|| format!("write to shard {shard}"))
    }

    pub fn flush_all(&self) -> Result<()> {
        for w in &self.writers {
            w.lock().flush()?;
        }
        Ok(())
    }

    /// Flush, close, and atomically promote every staged file to its final
    /// path. Returns the final paths in shard order. Guaranteed to run to
    /// completion on the happy path; on error, staged files are left in
    /// place for inspection rather than silently discarded.
    pub fn finalize(mut self) -> Result<Vec<PathBuf>> {
        self.flush_all()?;
        let writers = std::mem::take(&mut self.writers);
        drop(writers);

        for (tmp, final_p) in self.tmp_paths.iter().zip(self.final_paths.iter()) {
            replace_file_atomic_backoff(tmp, final_p)?;
        }

        Ok(self.final_paths.clone())
    }
}
