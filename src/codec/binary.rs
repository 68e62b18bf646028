//! `--format binary` codec: the same length-prefixed self-describing framing
//! `record_stream` uses internally for shard storage, exposed as a join
//! output format. This is the zero-config lossless default that stands in
//! for `PICKLE` in the Python original (an explicit adaptation — pickle is
//! not a format this crate ports, since it's Python-runtime-specific).

use std::io::{Read, Write};

use anyhow::Result;

use super::record_stream::{read_record, write_record};
use super::{RecordReader, RecordWriter};
use crate::record::Record;

pub struct BinaryReader<R: Read> {
    inner: R,
    field_names: Vec<String>,
    path_for_errors: String,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(inner: R, field_names: Vec<String>, path_for_errors: impl Into<String>) -> Self {
        Self { inner, field_names, path_for_errors: path_for_errors.into() }
    }
}

impl<R: Read> RecordReader for BinaryReader<R> {
    fn field_names(&self) -> &[String] {
        &self.field_names
    }

    fn read_next(&mut self) -> Result<Option<Record>> {
        read_record(&mut self.inner, &self.path_for_errors)
    }
}

pub struct BinaryWriter<W: Write> {
    inner: W,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> RecordWriter for BinaryWriter<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        write_record(&mut self.inner, record)
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}
