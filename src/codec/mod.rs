//! Record codec boundary. Spec section 1 explicitly places input decoders
//! and output encoders out of the core's scope, "specified only by their
//! interface to the core" — this module is that interface: a minimal
//! `RecordReader`/`RecordWriter` capability pair (spec section 9's "pluggable
//! writer/reader classes... the core depends on the capabilities, not on a
//! class hierarchy"), with CSV, JSON, and binary implementations, matching
//! `datawelder.readwrite`'s `Reader`/`Writer` abstract classes one-for-one.

pub mod binary;
pub mod csv;
pub mod json;
pub mod record_stream;

use anyhow::Result;

use crate::record::Record;

/// A lazy, forward-only, non-restartable source of records with a fixed
/// field layout known up front (spec section 9: "lazy, finite,
/// non-restartable sequences of tuples").
pub trait RecordReader {
    fn field_names(&self) -> &[String];
    fn read_next(&mut self) -> Result<Option<Record>>;
}

/// A sink that accepts records in order and must be explicitly closed to
/// guarantee any buffered footer (closing brackets, etc.) is flushed.
pub trait RecordWriter {
    fn write(&mut self, record: &Record) -> Result<()>;
    fn close(self: Box<Self>) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
    Binary,
}

impl Format {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "binary" => Ok(Format::Binary),
            other => anyhow::bail!("unrecognized format '{other}', expected csv|json|binary"),
        }
    }

    /// `datawelder.io.sniff_format`: a plain substring match on the path,
    /// offered as `partition`'s `--format auto` default (spec.md names
    /// `csv|json` as the partition formats but doesn't forbid an `auto`
    /// convenience default; the original always offers one).
    pub fn sniff(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.contains(".csv") {
            Format::Csv
        } else if lower.contains(".json") {
            Format::Json
        } else {
            Format::Binary
        }
    }
}

/// CSV dialect knobs (`datawelder.readwrite.csv_fmtparams`), parsed from
/// repeated `--fmtparams K=V` CLI flags. Unrecognized keys are rejected so
/// a typo'd flag doesn't silently do nothing.
#[derive(Clone, Debug)]
pub struct FmtParams {
    pub delimiter: u8,
    pub doublequote: bool,
    pub escapechar: Option<u8>,
    pub quotechar: u8,
    pub quoting: QuoteStyle,
    pub skipinitialspace: bool,
    pub strict: bool,
    pub write_header: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteStyle {
    Minimal,
    All,
    NonNumeric,
    None,
}

impl Default for FmtParams {
    fn default() -> Self {
        Self {
            delimiter: b',',
            doublequote: true,
            escapechar: None,
            quotechar: b'"',
            quoting: QuoteStyle::Minimal,
            skipinitialspace: false,
            strict: false,
            write_header: true,
        }
    }
}

impl FmtParams {
    /// Parse `K=V` pairs as given after repeated `--fmtparams` flags. The
    /// key set mirrors `readwrite.py`'s `csv_fmtparams`: `delimiter`,
    /// `doublequote`, `escapechar`, `lineterminator`, `quotechar`, `quoting`,
    /// `skipinitialspace`, `strict`, plus `write_header` (this crate's own
    /// addition, controlling spec.md 4.9's "header only from shard 0" rule).
    pub fn parse_pairs(pairs: &[String]) -> Result<Self> {
        let mut out = Self::default();
        for pair in pairs {
            let (k, v) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("--fmtparams expects KEY=VALUE, got '{pair}'"))?;
            match k {
                "delimiter" => out.delimiter = single_byte(v)?,
                "doublequote" => out.doublequote = parse_bool(v)?,
                "escapechar" => out.escapechar = Some(single_byte(v)?),
                "lineterminator" => { /* csv writer always emits \n; accepted for compatibility */ }
                "quotechar" => out.quotechar = single_byte(v)?,
                "quoting" => out.quoting = parse_quoting(v)?,
                "skipinitialspace" => out.skipinitialspace = parse_bool(v)?,
                "strict" => out.strict = parse_bool(v)?,
                "write_header" => out.write_header = parse_bool(v)?,
                other => anyhow::bail!("unrecognized --fmtparams key '{other}'"),
            }
        }
        Ok(out)
    }
}

fn single_byte(v: &str) -> Result<u8> {
    let v = unescape(v);
    let mut bytes = v.bytes();
    let b = bytes.next().ok_or_else(|| anyhow::anyhow!("expected a single character, got empty string"))?;
    if bytes.next().is_some() {
        anyhow::bail!("expected a single character, got '{v}'");
    }
    Ok(b)
}

fn unescape(v: &str) -> String {
    match v {
        "\\t" => "\t".to_string(),
        "\\n" => "\n".to_string(),
        other => other.to_string(),
    }
}

fn parse_bool(v: &str) -> Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{other}'"),
    }
}

fn parse_quoting(v: &str) -> Result<QuoteStyle> {
    match v.to_ascii_lowercase().as_str() {
        "minimal" => Ok(QuoteStyle::Minimal),
        "all" => Ok(QuoteStyle::All),
        "nonnumeric" | "non_numeric" => Ok(QuoteStyle::NonNumeric),
        "none" => Ok(QuoteStyle::None),
        other => anyhow::bail!("unrecognized quoting style '{other}'"),
    }
}
