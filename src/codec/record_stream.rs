//! Shard file framing (spec section 6): "a stream of self-delimited
//! records... the reference choice is a length-prefixed binary encoding
//! (each record preceded by its serialized length)".
//!
//! This is the internal, fixed, non-configurable format every shard file
//! is stored in regardless of what format the user's source/destination
//! uses — `partition.rs` writes it, `sort.rs` rewrites it, `frame.rs` reads
//! it, and `codec::binary` reuses it verbatim as the `--format binary`
//! *output* codec (spec.md's `binary` output format is explicitly this
//! same zero-config lossless framing, replacing the role `PICKLE` plays in
//! the Python original). Records are serialized with `serde_json` per
//! record — not because the format is JSON-flavored, but because `Value`
//! already derives `Serialize`/`Deserialize` and a length-prefixed framing
//! around compact JSON is the simplest self-describing encoding available
//! from this crate's existing dependency stack, matching the teacher's
//! "minimal hand-rolled format, no heavyweight parser" approach (`ndjson.rs`)
//! rather than reaching for a new binary serialization crate.

use std::io::{Read, Write};

use anyhow::{Context, Result};

use crate::error::DiskJoinError;
use crate::record::Record;

/// Write one record: a 4-byte little-endian length prefix followed by that
/// many bytes of its serialized form.
pub fn write_record<W: Write>(w: &mut W, record: &Record) -> Result<()> {
    let bytes = serde_json::to_vec(record).context("serialize record")?;
    let len = bytes.len() as u32;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&bytes)?;
    Ok(())
}

/// Read one record, or `Ok(None)` on a clean EOF at a record boundary.
/// Any other truncation (a length prefix with no matching payload) is a
/// `FramingError` — spec.md: "Corrupt framing → fatal read error."
pub fn read_record<R: Read>(r: &mut R, shard_path: &str) -> Result<Option<Record>> {
    let mut len_buf = [0u8; 4];
    match r.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).map_err(|_| {
        DiskJoinError::FramingError {
            path: shard_path.to_string(),
            reason: format!("truncated record payload (expected {len} bytes)"),
        }
    })?;
    let record: Record = serde_json::from_slice(&payload).map_err(|e| DiskJoinError::FramingError {
        path: shard_path.to_string(),
        reason: format!("malformed record payload: {e}"),
    })?;
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    #[test]
    fn roundtrips_records_through_the_framing() {
        let recs: Vec<Record> = vec![
            vec![Value::Str("AU".into()), Value::Str("Australia".into())],
            vec![Value::Int(7), Value::Null],
        ];
        let mut buf = Vec::new();
        for r in &recs {
            write_record(&mut buf, r).unwrap();
        }
        let mut cursor = std::io::Cursor::new(buf);
        let mut out = Vec::new();
        while let Some(r) = read_record(&mut cursor, "test").unwrap() {
            out.push(r);
        }
        assert_eq!(out, recs);
    }

    #[test]
    fn empty_stream_reads_as_immediate_eof() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(read_record(&mut cursor, "test").unwrap().is_none());
    }

    #[test]
    fn truncated_payload_is_a_framing_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&50u32.to_le_bytes());
        buf.extend_from_slice(b"short");
        let mut cursor = std::io::Cursor::new(buf);
        assert!(read_record(&mut cursor, "test").is_err());
    }
}
