//! User-facing options with sensible defaults and builder chaining, grounded
//! on the teacher's `ETLOptions` — same `with_*` consuming-builder shape and
//! same pattern of the builder itself driving the run (`RedditETL::scan()`),
//! now covering the two CLI verbs (`partition`, `join`) instead of the
//! Reddit corpus's subreddit/date-range knobs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::codec::binary::BinaryReader;
use crate::codec::csv::CsvReader;
use crate::codec::json::JsonReader;
use crate::codec::{Format, FmtParams, RecordReader};
use crate::dispatch::{run_join, JoinRunOptions};
use crate::io::open_read;
use crate::partition::{partition, PartitionRunOptions};

#[derive(Clone, Debug)]
pub struct PartitionOptions {
    pub source: String,
    pub dest: PathBuf,
    pub num_shards: usize,
    pub field_names: Option<Vec<String>>,
    pub key_index: Option<usize>,
    pub key_name: Option<String>,
    pub format: Option<Format>,
    pub fmtparams: FmtParams,
    pub progress: bool,
    pub sort_workers: usize,
    pub progress_every: u64,
    pub read_buffer_bytes: usize,
}

impl PartitionOptions {
    pub fn new(source: impl Into<String>, dest: impl AsRef<Path>, num_shards: usize) -> Self {
        Self {
            source: source.into(),
            dest: dest.as_ref().to_path_buf(),
            num_shards: num_shards.max(1),
            field_names: None,
            key_index: None,
            key_name: None,
            format: None,
            fmtparams: FmtParams::default(),
            progress: false,
            sort_workers: rayon::current_num_threads(),
            progress_every: 1_000_000,
            read_buffer_bytes: 1024 * 1024,
        }
    }

    pub fn with_field_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_key_index(mut self, idx: usize) -> Self {
        self.key_index = Some(idx);
        self
    }

    pub fn with_key_name(mut self, name: impl Into<String>) -> Self {
        self.key_name = Some(name.into());
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_fmtparams(mut self, fmtparams: FmtParams) -> Self {
        self.fmtparams = fmtparams;
        self
    }

    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }

    pub fn with_sort_workers(mut self, n: usize) -> Self {
        self.sort_workers = n.max(1);
        self
    }

    pub fn with_progress_every(mut self, n: u64) -> Self {
        self.progress_every = n.max(1);
        self
    }

    pub fn with_read_buffer_bytes(mut self, n: usize) -> Self {
        self.read_buffer_bytes = n.max(1);
        self
    }

    fn open_reader(&self) -> Result<Box<dyn RecordReader>> {
        let format = self.format.unwrap_or_else(|| Format::sniff(&self.source));
        let raw = open_read(&self.source, self.read_buffer_bytes).with_context(|| format!("opening {}", self.source))?;

        let reader: Box<dyn RecordReader> = match format {
            Format::Csv => match &self.field_names {
                Some(names) => Box::new(CsvReader::new(raw, names.clone(), &self.fmtparams, false)?),
                None => Box::new(CsvReader::with_sniffed_header(raw, &self.fmtparams)?),
            },
            Format::Json => {
                let names = self
                    .field_names
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("field names are required for JSON sources"))?;
                Box::new(JsonReader::new(raw, names))
            }
            Format::Binary => {
                let names = self.field_names.clone().ok_or_else(|| anyhow::anyhow!("field names are required for binary sources"))?;
                Box::new(BinaryReader::new(raw, names, self.source.clone()))
            }
        };
        Ok(reader)
    }

    fn resolve_key_index(&self, field_names: &[String]) -> Result<usize> {
        match (self.key_index, &self.key_name) {
            (Some(_), Some(_)) => anyhow::bail!("specify only one of key_index or key_name"),
            (Some(i), None) => {
                if i >= field_names.len() {
                    anyhow::bail!("key_index {i} out of bounds for {} fields", field_names.len());
                }
                Ok(i)
            }
            (None, Some(name)) => field_names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| anyhow::anyhow!("key_name '{name}' not found among fields {field_names:?}")),
            (None, None) => anyhow::bail!("one of key_index or key_name is required"),
        }
    }

    /// Run the partitioner end to end, opening and format-decoding the
    /// source, resolving the key column, and writing the destination frame.
    /// Returns the number of records skipped for lacking a usable key.
    pub fn run(self) -> Result<u64> {
        let reader = self.open_reader()?;
        let field_names = reader.field_names().to_vec();
        let key_index = self.resolve_key_index(&field_names)?;
        let opts = PartitionRunOptions {
            num_shards: self.num_shards,
            progress_every: self.progress_every,
            sort_workers: self.sort_workers,
            show_progress: self.progress,
            source_path: Some(self.source.clone()),
        };
        partition(reader, key_index, &self.dest, &opts)
    }
}

#[derive(Clone, Debug)]
pub struct JoinOptions {
    pub dest: String,
    pub sources: Vec<PathBuf>,
    pub format: Format,
    pub fmtparams: FmtParams,
    pub select_expr: Option<String>,
    pub subs: usize,
    pub progress: bool,
}

impl JoinOptions {
    pub fn new(dest: impl Into<String>, sources: Vec<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            sources,
            format: Format::Binary,
            fmtparams: FmtParams::default(),
            select_expr: None,
            subs: rayon::current_num_threads(),
            progress: false,
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_fmtparams(mut self, fmtparams: FmtParams) -> Self {
        self.fmtparams = fmtparams;
        self
    }

    pub fn with_select(mut self, expr: impl Into<String>) -> Self {
        self.select_expr = Some(expr.into());
        self
    }

    pub fn with_subs(mut self, subs: usize) -> Self {
        self.subs = subs.max(1);
        self
    }

    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }

    /// Run the join end to end, writing the result to `dest`.
    pub fn run(self) -> Result<()> {
        let opts = JoinRunOptions {
            format: self.format,
            fmtparams: self.fmtparams,
            select_expr: self.select_expr,
            workers: self.subs,
            show_progress: self.progress,
        };
        run_join(&self.sources, &self.dest, &opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use std::io::Write;

    #[test]
    fn partition_options_runs_end_to_end_from_a_csv_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("countries.csv");
        {
            let mut f = std::fs::File::create(&source).unwrap();
            writeln!(f, "iso,name").unwrap();
            writeln!(f, "AU,Australia").unwrap();
            writeln!(f, "RU,Russia").unwrap();
        }
        let dest = dir.path().join("out");
        let skipped = PartitionOptions::new(source.to_string_lossy(), &dest, 5).with_key_name("iso").run().unwrap();
        assert_eq!(skipped, 0);

        let frame = crate::frame::PartitionedFrame::open(&dest).unwrap();
        assert_eq!(frame.len(), 5);
        let shard3: Vec<_> = frame.shard(3).unwrap().iter().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(shard3, vec![vec![Value::Str("AU".into()), Value::Str("Australia".into())]]);
    }
}
