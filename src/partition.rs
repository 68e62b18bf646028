//! Partitioner (spec 4.3): consumes a record iterator with known field names
//! and key index, routes each record to one of `N` shard writers by the
//! shard-hasher, writes the manifest once every shard is closed, then sorts
//! each shard.
//!
//! Grounded on the teacher's `partition::PartitionWriters` for the
//! staging-then-atomic-promote shape (now generalized into `writer_pool`)
//! and on `concurrency.rs`'s `W <= 1` sequential / rayon fan-out split for
//! the "sort each shard... sequentially or dispatched to workers" step.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::codec::record_stream::write_record;
use crate::codec::RecordReader;
use crate::frame::{Manifest, DEFAULT_PARTITION_FORMAT};
use crate::hash::shard_of;
use crate::progress::ProgressScope;
use crate::sort::sort_shard_file;
use crate::writer_pool::WriterPool;

const DEFAULT_PROGRESS_EVERY: u64 = 1_000_000;

pub struct PartitionRunOptions {
    pub num_shards: usize,
    pub progress_every: u64,
    pub sort_workers: usize,
    pub show_progress: bool,
    pub source_path: Option<String>,
}

impl Default for PartitionRunOptions {
    fn default() -> Self {
        Self {
            num_shards: 1,
            progress_every: DEFAULT_PROGRESS_EVERY,
            sort_workers: rayon::current_num_threads(),
            show_progress: false,
            source_path: None,
        }
    }
}

/// Run the partitioner end to end: route, close, manifest, sort.
/// Returns the number of records skipped for lacking a usable key
/// (spec 7's `MissingKey`, non-fatal).
pub fn partition(
    mut reader: Box<dyn RecordReader>,
    key_index: usize,
    dest_dir: &Path,
    opts: &PartitionRunOptions,
) -> Result<u64> {
    fs::create_dir_all(dest_dir).with_context(|| format!("create_dir_all {}", dest_dir.display()))?;
    let field_names: Vec<String> = reader.field_names().to_vec();
    if key_index >= field_names.len() {
        anyhow::bail!("key_index {key_index} out of bounds for {} fields", field_names.len());
    }

    let pool = WriterPool::open(dest_dir, "part", "bin", opts.num_shards, 1024 * 1024)
        .context("opening shard writer pool")?;

    let progress = if opts.show_progress {
        Some(ProgressScope::count("Partition: routing records", 0))
    } else {
        None
    };

    let mut seen: u64 = 0;
    let mut skipped: u64 = 0;
    let mut buf = Vec::with_capacity(256);
    while let Some(record) = reader.read_next()? {
        let key = &record[key_index];
        if key.is_null() {
            tracing::warn!("record at position {seen} has a null/missing join key; skipping");
            skipped += 1;
            seen += 1;
            continue;
        }
        let shard = shard_of(key, opts.num_shards);
        buf.clear();
        write_record(&mut buf, &record)?;
        pool.write_to(shard, &buf)?;

        seen += 1;
        if seen % opts.progress_every == 0 {
            tracing::info!("partitioned {seen} records ({skipped} skipped)");
        }
        if let Some(p) = &progress {
            p.inc_items(1);
        }
    }
    if let Some(p) = &progress {
        p.finish(format!("{seen} records routed, {skipped} skipped"));
    }

    pool.finalize().context("finalizing shard writer pool")?;

    let manifest = Manifest {
        config_format: crate::frame::CONFIG_FORMAT,
        field_names,
        key_index,
        num_partitions: opts.num_shards,
        partition_format: DEFAULT_PARTITION_FORMAT.to_string(),
        source_path: opts.source_path.clone(),
    };
    manifest.write(&dest_dir.join("manifest.txt")).context("writing manifest")?;

    sort_all_shards(dest_dir, &manifest, opts.sort_workers)?;

    Ok(skipped)
}

fn sort_all_shards(dest_dir: &Path, manifest: &Manifest, workers: usize) -> Result<()> {
    let shard_paths: Vec<_> = (0..manifest.num_partitions)
        .map(|i| dest_dir.join(crate::frame::render_shard_filename(&manifest.partition_format, i)))
        .collect();

    if workers <= 1 {
        for p in &shard_paths {
            sort_shard_file(p, manifest.key_index)?;
        }
    } else {
        shard_paths
            .par_iter()
            .try_for_each(|p| sort_shard_file(p, manifest.key_index))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, Value};

    struct VecReader {
        field_names: Vec<String>,
        records: std::vec::IntoIter<Record>,
    }

    impl RecordReader for VecReader {
        fn field_names(&self) -> &[String] {
            &self.field_names
        }
        fn read_next(&mut self) -> Result<Option<Record>> {
            Ok(self.records.next())
        }
    }

    #[test]
    fn routes_records_and_sorts_each_shard() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            vec![Value::Str("RU".into()), Value::Str("Russia".into())],
            vec![Value::Str("AU".into()), Value::Str("Australia".into())],
            vec![Value::Str("JP".into()), Value::Str("Japan".into())],
        ];
        let reader = Box::new(VecReader {
            field_names: vec!["iso".into(), "name".into()],
            records: records.into_iter(),
        });
        let opts = PartitionRunOptions { num_shards: 5, sort_workers: 1, ..Default::default() };
        let skipped = partition(reader, 0, dir.path(), &opts).unwrap();
        assert_eq!(skipped, 0);

        let frame = crate::frame::PartitionedFrame::open(dir.path()).unwrap();
        assert_eq!(frame.len(), 5);
        // AU -> 3, JP -> 4, RU -> 0 (spec S1 vectors)
        let shard0: Vec<_> = frame.shard(0).unwrap().iter().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(shard0, vec![vec![Value::Str("RU".into()), Value::Str("Russia".into())]]);
    }

    #[test]
    fn null_key_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![vec![Value::Null, Value::Str("nowhere".into())]];
        let reader = Box::new(VecReader { field_names: vec!["iso".into(), "name".into()], records: records.into_iter() });
        let opts = PartitionRunOptions { num_shards: 2, sort_workers: 1, ..Default::default() };
        let skipped = partition(reader, 0, dir.path(), &opts).unwrap();
        assert_eq!(skipped, 1);
    }
}
