//! Progress reporting: byte-based and count-based `indicatif` bars, used
//! during partitioning (byte-based, spec 4.3's periodic progress callback)
//! and the join dispatcher (count-based, per-shard completion).
//!
//! Copied and generalized from the teacher's `progress.rs` — same
//! `ProgressScope` wrapper and template strings, with the Reddit-corpus
//! `FileJob`-specific `total_compressed_size` helper dropped since nothing
//! in this crate's pipeline sizes work by a list of source files anymore.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::{Arc, OnceLock};

static GLOBAL_MP: OnceLock<Arc<MultiProgress>> = OnceLock::new();

/// Install a global MultiProgress used by all subsequently created progress
/// bars. Safe to call once; additional calls are ignored.
pub fn set_global_multiprogress(mp: Arc<MultiProgress>) {
    let _ = GLOBAL_MP.set(mp);
}

fn new_bar(total: u64) -> ProgressBar {
    if let Some(mp) = GLOBAL_MP.get() {
        mp.add(ProgressBar::new(total))
    } else {
        ProgressBar::new(total)
    }
}

fn byte_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} {msg} {bytes:>10}/{total_bytes:<10} [{bar:.cyan/blue}] {percent:>3}%  \
         {bytes_per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}",
    )
    .unwrap()
    .progress_chars("█▉▊▋▌▍▎▏  ")
}

fn count_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
         it/s: {per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}",
    )
    .unwrap()
    .progress_chars("█▉▊▋▌▍▎▏  ")
}

/// A small, ergonomic wrapper around `indicatif` progress bars. Use either
/// `ProgressScope::bytes(..)` or `ProgressScope::count(..)`.
pub struct ProgressScope {
    pb: ProgressBar,
}

impl ProgressScope {
    pub fn bytes<T: Into<String>>(label: T, total_bytes: u64) -> Self {
        let pb = new_bar(total_bytes);
        pb.set_style(byte_style());
        pb.set_message(label.into());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn count<T: Into<String>>(label: T, total: u64) -> Self {
        let pb = new_bar(total);
        pb.set_style(count_style());
        let label = label.into();
        if !label.is_empty() {
            pb.set_message(label);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    #[inline]
    pub fn inc_bytes(&self, delta: u64) {
        self.pb.inc(delta);
    }

    #[inline]
    pub fn inc_items(&self, delta: u64) {
        self.pb.inc(delta);
    }

    pub fn finish<T: Into<String>>(&self, msg: T) {
        self.pb.finish_with_message(msg.into());
    }
}
