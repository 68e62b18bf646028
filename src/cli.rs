//! Command-line surface (spec section 6): two verbs, `partition` and `join`,
//! parsed with `clap`'s derive macros the way the rest of this stack's CLIs
//! do (the teacher itself has no CLI binary — the Reddit corpus tool was a
//! library driven from `main.rs` directly — so this shape is drawn from
//! `clap`'s own idiomatic derive usage, the natural choice given `clap` was
//! already part of the crate's adopted stack).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "diskjoin", about = "Disk-based, partitioned, sort-merge equi-join engine", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Partition a source table into N key-hashed, sorted shards.
    Partition(PartitionArgs),
    /// Join two or more partitioned frames, shard by shard.
    Join(JoinArgs),
}

#[derive(Parser, Debug)]
pub struct PartitionArgs {
    /// Source file path, or `s3://bucket/key`.
    pub source: String,
    /// Destination directory for the partitioned frame.
    pub dest: PathBuf,
    /// Number of shards to partition into.
    pub num_shards: usize,

    /// Explicit field names, comma-separated. Required for sources with no
    /// header row (e.g. binary); inferred from the header row for CSV when
    /// omitted.
    #[arg(long, value_delimiter = ',')]
    pub fieldnames: Option<Vec<String>>,

    /// Join key by zero-based field index. Mutually exclusive with `--keyname`.
    #[arg(long)]
    pub keyindex: Option<usize>,

    /// Join key by field name. Mutually exclusive with `--keyindex`.
    #[arg(long)]
    pub keyname: Option<String>,

    /// Source format: `auto` (sniff from the path), `csv`, or `json`.
    #[arg(long, default_value = "auto")]
    pub format: String,

    /// Repeated `KEY=VALUE` CSV dialect overrides; see `FmtParams::parse_pairs`.
    #[arg(long = "fmtparams")]
    pub fmtparams: Vec<String>,

    /// Show a progress bar while routing records.
    #[arg(long)]
    pub progress: bool,

    /// Number of worker threads to sort shards with; 1 sorts sequentially.
    #[arg(long)]
    pub workers: Option<usize>,

    /// I/O read buffer size, in bytes.
    #[arg(long, default_value_t = 1024 * 1024)]
    pub read_buffer_bytes: usize,
}

#[derive(Parser, Debug)]
pub struct JoinArgs {
    /// Destination file for the joined output.
    pub dest: String,
    /// Two or more partitioned-frame directories; the first is the left side.
    #[arg(required = true, num_args = 2..)]
    pub sources: Vec<PathBuf>,

    /// Output format: `csv`, `json`, or `binary`.
    #[arg(long, default_value = "binary")]
    pub format: String,

    /// Repeated `KEY=VALUE` CSV dialect overrides for the output.
    #[arg(long = "fmtparams")]
    pub fmtparams: Vec<String>,

    /// SELECT expression choosing and renaming output fields; omit for the
    /// default (all fields, right-side keys suppressed, duplicates suffixed).
    #[arg(long)]
    pub select: Option<String>,

    /// Number of per-shard join workers ("subs" in spec terminology).
    #[arg(long, default_value_t = rayon::current_num_threads())]
    pub subs: usize,

    /// Show a progress bar while joining shards.
    #[arg(long)]
    pub progress: bool,
}
