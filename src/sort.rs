//! External sort, per shard (spec 4.4). Shards are bounded by design — the
//! partitioner keeps each one roughly `total / N` — so "external" here means
//! only that the rewrite goes back to disk, not that the sort itself spills;
//! the whole shard is loaded into memory, sorted, and rewritten atomically.
//!
//! Grounded on the teacher's `dedupe::merge_runs_sorted`, which is the
//! closest thing in `retl` to a disk-backed sort/merge pass — but that one
//! is a multi-run external merge sort for corpora too big for memory; this
//! one is the much simpler single-shard in-memory sort spec 4.4 actually
//! calls for, reusing only its atomic-rewrite tail (`replace_file_atomic_backoff`).

use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::Result;

use crate::codec::record_stream::{read_record, write_record};
use crate::error::DiskJoinError;
use crate::record::Record;
use crate::util::{create_with_backoff, open_with_backoff, replace_file_atomic_backoff};

/// Load `path` (a shard file in the internal binary framing) fully into
/// memory, stably sort by `key_index`, and atomically rewrite it in place.
/// Tie-breaking preserves original (partitioner) order within equal keys —
/// `Vec::sort_by` is a stable sort, so comparing only the key field already
/// gives the required tie-break behavior for free.
pub fn sort_shard_file(path: &Path, key_index: usize) -> Result<()> {
    let mut records = read_all(path)?;
    records.sort_by(|a, b| a[key_index].key_cmp(&b[key_index]));

    let tmp = path.with_extension("sort.tmp");
    {
        let f = create_with_backoff(&tmp, 16, 50).map_err(|e| DiskJoinError::io(format!("create {}", tmp.display()), e))?;
        let mut w = BufWriter::new(f);
        for r in &records {
            write_record(&mut w, r)?;
        }
    }
    replace_file_atomic_backoff(&tmp, path)
}

fn read_all(path: &Path) -> Result<Vec<Record>> {
    let f = open_with_backoff(path, 16, 50).map_err(|e| DiskJoinError::io(format!("open {}", path.display()), e))?;
    let mut r = BufReader::new(f);
    let path_str = path.display().to_string();
    let mut out = Vec::new();
    while let Some(rec) = read_record(&mut r, &path_str)? {
        out.push(rec);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    #[test]
    fn sorts_shard_ascending_by_key_stably() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0000.bin");
        {
            let f = std::fs::File::create(&path).unwrap();
            let mut w = BufWriter::new(f);
            write_record(&mut w, &vec![Value::Str("RU".into()), Value::Int(1)]).unwrap();
            write_record(&mut w, &vec![Value::Str("AU".into()), Value::Int(2)]).unwrap();
            write_record(&mut w, &vec![Value::Str("AU".into()), Value::Int(3)]).unwrap();
        }
        sort_shard_file(&path, 0).unwrap();
        let sorted = read_all(&path).unwrap();
        assert_eq!(
            sorted,
            vec![
                vec![Value::Str("AU".into()), Value::Int(2)],
                vec![Value::Str("AU".into()), Value::Int(3)],
                vec![Value::Str("RU".into()), Value::Int(1)],
            ]
        );
    }

    #[test]
    fn empty_shard_sorts_to_empty_shard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0000.bin");
        std::fs::File::create(&path).unwrap();
        sort_shard_file(&path, 0).unwrap();
        assert!(read_all(&path).unwrap().is_empty());
    }
}
