//! Worker dispatcher (spec 4.8) + output concatenator (spec 4.9).
//!
//! Fans the `N` per-shard join jobs out across `W` workers — `rayon`, the
//! way the teacher's `concurrency::for_each_file_limited` does its
//! `limit <= 1` sequential / `par_iter` split — each job independently
//! opening its shard inputs, running the merge-join kernel, and writing to
//! its own temp file; then concatenates the `N` temp files byte-wise in
//! shard order, grounded on the teacher's `stitch::stitch_tmp_parts`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::codec::{binary::BinaryWriter, csv::CsvWriter, json::JsonWriter, Format, FmtParams, RecordWriter};
use crate::error::DiskJoinError;
use crate::frame::PartitionedFrame;
use crate::join::{merge_join, RightSide};
use crate::progress::ProgressScope;
use crate::select::{default_select, resolve_select, FrameFields, SelectPlan};

pub struct JoinRunOptions {
    pub format: Format,
    pub fmtparams: FmtParams,
    pub select_expr: Option<String>,
    pub workers: usize,
    pub show_progress: bool,
}

impl Default for JoinRunOptions {
    fn default() -> Self {
        Self {
            format: Format::Binary,
            fmtparams: FmtParams::default(),
            select_expr: None,
            workers: rayon::current_num_threads(),
            show_progress: false,
        }
    }
}

/// Run a full `N`-shard left-outer join across `frames[0]` (left) and
/// `frames[1..]` (right sides), writing the result to `dest`.
pub fn run_join(frame_dirs: &[PathBuf], dest: &str, opts: &JoinRunOptions) -> Result<()> {
    anyhow::ensure!(frame_dirs.len() >= 2, "join requires at least two frames (one left, one right)");

    let frames: Vec<PartitionedFrame> = frame_dirs
        .iter()
        .map(|d| PartitionedFrame::open(d).with_context(|| format!("opening frame {}", d.display())))
        .collect::<Result<_>>()?;

    let num_shards = frames[0].len();
    for (frame, dir) in frames.iter().zip(frame_dirs.iter()).skip(1) {
        if frame.len() != num_shards {
            return Err(DiskJoinError::ShardCountMismatch {
                expected: num_shards,
                found: frame.len(),
                frame: dir.display().to_string(),
            }
            .into());
        }
    }

    let frame_fields: Vec<FrameFields> = frames
        .iter()
        .map(|f| {
            let m = f.manifest();
            FrameFields { field_names: m.field_names.clone(), key_index: m.key_index }
        })
        .collect();
    let plan: SelectPlan = match &opts.select_expr {
        Some(expr) => resolve_select(&frame_fields, expr)?,
        None => default_select(&frame_fields),
    };

    let dest_path = Path::new(dest);
    let temp_dir = dest_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".diskjoin-{}-tmp", std::process::id()));
    fs::create_dir_all(&temp_dir).with_context(|| format!("create_dir_all {}", temp_dir.display()))?;

    let temp_paths: Vec<PathBuf> = (0..num_shards).map(|i| temp_dir.join(format!("{i:05}.part"))).collect();

    let progress = if opts.show_progress { Some(ProgressScope::count("Join: shards", num_shards as u64)) } else { None };

    let result = run_shards(&frames, &temp_paths, &plan, opts, progress.as_ref());

    match result {
        Ok(()) => {
            if let Some(p) = &progress {
                p.finish("join complete");
            }
            concatenate(&temp_paths, dest_path)?;
            let _ = fs::remove_dir_all(&temp_dir);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_dir_all(&temp_dir);
            Err(e)
        }
    }
}

fn run_shards(
    frames: &[PartitionedFrame],
    temp_paths: &[PathBuf],
    plan: &SelectPlan,
    opts: &JoinRunOptions,
    progress: Option<&ProgressScope>,
) -> Result<()> {
    let num_shards = temp_paths.len();
    let job = |shard_idx: usize| -> Result<()> {
        join_one_shard(frames, shard_idx, &temp_paths[shard_idx], plan, opts.format, &opts.fmtparams)?;
        if let Some(p) = progress {
            p.inc_items(1);
        }
        Ok(())
    };

    if opts.workers <= 1 {
        for i in 0..num_shards {
            job(i)?;
        }
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.workers)
            .build()
            .context("building join worker pool")?;
        pool.install(|| (0..num_shards).into_par_iter().try_for_each(job))?;
    }
    Ok(())
}

fn join_one_shard(
    frames: &[PartitionedFrame],
    shard_idx: usize,
    temp_path: &Path,
    plan: &SelectPlan,
    format: Format,
    fmtparams: &FmtParams,
) -> Result<()> {
    let left_shard = frames[0].shard(shard_idx)?;
    let left_iter = left_shard.iter()?;
    let left_key_index = left_shard.key_index();

    let mut rights = Vec::with_capacity(frames.len() - 1);
    for frame in &frames[1..] {
        let shard = frame.shard(shard_idx)?;
        let key_index = shard.key_index();
        let field_count = shard.field_names().len();
        let iter = shard.iter()?;
        rights.push(RightSide::new(Box::new(iter), key_index, field_count, format!("{shard_idx}"))?);
    }

    let out_file = File::create(temp_path).with_context(|| format!("create {}", temp_path.display()))?;
    let write_header = shard_idx == 0;
    let mut writer: Box<dyn RecordWriter> = match format {
        Format::Csv => Box::new(CsvWriter::new(BufWriter::new(out_file), plan.output_names.clone(), fmtparams, write_header)),
        Format::Json => Box::new(JsonWriter::new(BufWriter::new(out_file), plan.output_names.clone())),
        Format::Binary => Box::new(BinaryWriter::new(BufWriter::new(out_file))),
    };

    let shard_label = shard_idx.to_string();
    merge_join(left_iter, left_key_index, rights, &shard_label, |row| {
        let projected = plan.source_columns.iter().map(|&i| row[i].clone()).collect();
        writer.write(&projected)
    })?;

    writer.close()
}

/// Strict byte-concatenation in ascending shard order (spec 4.9). Each
/// shard's writer already decided for itself whether to emit a header
/// (shard 0 only, for text formats), so concatenation here is pure bytes.
fn concatenate(temp_paths: &[PathBuf], dest: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(dest).with_context(|| format!("create {}", dest.display()))?);
    for p in temp_paths {
        let mut r = BufReader::new(File::open(p).with_context(|| format!("open {}", p.display()))?);
        std::io::copy(&mut r, &mut out).with_context(|| format!("concatenate {}", p.display()))?;
    }
    use std::io::Write;
    out.flush()?;
    Ok(())
}
