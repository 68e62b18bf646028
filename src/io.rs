//! Byte-stream abstraction (spec section 6): uniform open for local paths,
//! `s3://bucket/key` object-store URIs, and transparent `.gz` compression,
//! the way `datawelder` leans on `smart_open.open()` for all three.
//!
//! The teacher's `util::open_with_backoff` / `create_with_backoff` already
//! give us Windows-friendly retrying local opens; this module wraps those
//! behind a scheme dispatch and layers gzip transparently by path suffix.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::DiskJoinError;
use crate::util::{create_with_backoff, open_with_backoff};

const S3_SCHEME: &str = "s3://";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Uri {
    Local(std::path::PathBuf),
    S3 { bucket: String, key: String },
}

impl Uri {
    pub fn parse(s: &str) -> Self {
        if let Some(rest) = s.strip_prefix(S3_SCHEME) {
            let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
            Uri::S3 { bucket: bucket.to_string(), key: key.to_string() }
        } else {
            Uri::Local(std::path::PathBuf::from(s))
        }
    }

    pub fn is_gzip(&self) -> bool {
        let name = match self {
            Uri::Local(p) => p.to_string_lossy().to_string(),
            Uri::S3 { key, .. } => key.clone(),
        };
        name.ends_with(".gz")
    }
}

/// Open `path` for sequential reading, transparently decompressing `.gz`.
/// Object-store reads are out of this core's primary path (the core only
/// ever *writes* shards to object storage during partitioning and reads
/// them back locally during the join's worker fan-out) but are supported
/// for symmetry with `open_write`.
pub fn open_read(path: &str, read_buf_bytes: usize) -> Result<Box<dyn Read + Send>> {
    let uri = Uri::parse(path);
    match uri {
        Uri::Local(p) => open_read_local(&p, read_buf_bytes),
        Uri::S3 { bucket, key } => {
            #[cfg(feature = "s3")]
            {
                crate::s3::download_to_reader(&bucket, &key, read_buf_bytes)
            }
            #[cfg(not(feature = "s3"))]
            {
                let _ = (bucket, key);
                anyhow::bail!(
                    "reading from s3:// requires the `s3` feature to be enabled"
                )
            }
        }
    }
}

fn open_read_local(p: &Path, read_buf_bytes: usize) -> Result<Box<dyn Read + Send>> {
    let f = open_with_backoff(p, 16, 50).map_err(|e| DiskJoinError::io(format!("open {}", p.display()), e))?;
    let buffered = BufReader::with_capacity(read_buf_bytes.max(8 * 1024), f);
    if p.to_string_lossy().ends_with(".gz") {
        Ok(Box::new(GzDecoder::new(buffered)))
    } else {
        Ok(Box::new(buffered))
    }
}

/// Open `path` for sequential writing, transparently gzip-compressing when
/// the path ends in `.gz`. Local paths write directly; `s3://` paths are
/// buffered through the multipart uploader in `s3.rs` (spec section 6).
pub fn open_write(path: &str, write_buf_bytes: usize) -> Result<Box<dyn Write + Send>> {
    let uri = Uri::parse(path);
    match uri {
        Uri::Local(p) => open_write_local(&p, write_buf_bytes),
        Uri::S3 { bucket, key } => {
            #[cfg(feature = "s3")]
            {
                let gzip = key.ends_with(".gz");
                let raw = crate::s3::MultipartWriter::new(bucket, key)?;
                if gzip {
                    Ok(Box::new(GzEncoder::new(raw, Compression::default())))
                } else {
                    Ok(Box::new(raw))
                }
            }
            #[cfg(not(feature = "s3"))]
            {
                let _ = (bucket, key);
                anyhow::bail!(
                    "writing to s3:// requires the `s3` feature to be enabled"
                )
            }
        }
    }
}

fn open_write_local(p: &Path, write_buf_bytes: usize) -> Result<Box<dyn Write + Send>> {
    if let Some(parent) = p.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create_dir_all {}", parent.display()))?;
    }
    let f = create_with_backoff(p, 16, 50).map_err(|e| DiskJoinError::io(format!("create {}", p.display()), e))?;
    let buffered = BufWriter::with_capacity(write_buf_bytes.max(8 * 1024), f);
    if p.to_string_lossy().ends_with(".gz") {
        Ok(Box::new(GzEncoder::new(buffered, Compression::default())))
    } else {
        Ok(Box::new(buffered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_and_s3_uris() {
        assert_eq!(Uri::parse("/tmp/foo.csv"), Uri::Local("/tmp/foo.csv".into()));
        assert_eq!(
            Uri::parse("s3://my-bucket/path/to/key.json"),
            Uri::S3 { bucket: "my-bucket".into(), key: "path/to/key.json".into() }
        );
    }

    #[test]
    fn detects_gzip_by_suffix() {
        assert!(Uri::parse("foo.ndjson.gz").is_gzip());
        assert!(!Uri::parse("foo.ndjson").is_gzip());
        assert!(Uri::parse("s3://b/k.gz").is_gzip());
    }

    #[test]
    fn roundtrip_local_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.ndjson.gz");
        {
            let mut w = open_write_local(&path, 8192).unwrap();
            w.write_all(b"hello\nworld\n").unwrap();
            w.flush().unwrap();
        }
        let mut r = open_read_local(&path, 8192).unwrap();
        let mut out = String::new();
        r.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello\nworld\n");
    }
}
