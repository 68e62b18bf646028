//! JSON record codec: one JSON object per line (`datawelder.readwrite`'s
//! `JsonReader`/`JsonWriter`, which serialize each record as
//! `dict(zip(fieldnames, record))`), following the teacher's own
//! `ndjson.rs` line-oriented buffering style rather than a JSON-array
//! container format (which would require holding the whole stream in memory
//! to close the bracket).

use std::io::{BufRead, BufReader, Read, Write};

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;

use super::{RecordReader, RecordWriter};
use crate::record::{Record, Value};

pub struct JsonReader<R: Read> {
    lines: std::io::Lines<BufReader<R>>,
    field_names: Vec<String>,
}

impl<R: Read> JsonReader<R> {
    pub fn new(inner: R, field_names: Vec<String>) -> Self {
        Self { lines: BufReader::new(inner).lines(), field_names }
    }
}

impl<R: Read> RecordReader for JsonReader<R> {
    fn field_names(&self) -> &[String] {
        &self.field_names
    }

    fn read_next(&mut self) -> Result<Option<Record>> {
        loop {
            let line = match self.lines.next() {
                None => return Ok(None),
                Some(line) => line.context("read JSON line")?,
            };
            if line.trim().is_empty() {
                continue;
            }
            let obj: JsonValue = serde_json::from_str(&line).with_context(|| format!("parse JSON line: {line}"))?;
            let map = obj.as_object().ok_or_else(|| anyhow::anyhow!("expected a JSON object, got: {line}"))?;
            let record = self
                .field_names
                .iter()
                .map(|name| map.get(name).map(json_to_value).unwrap_or(Value::Null))
                .collect();
            return Ok(Some(record));
        }
    }
}

fn json_to_value(v: &JsonValue) -> Value {
    match v {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => Value::Str(s.clone()),
        other => Value::Str(other.to_string()),
    }
}

fn value_to_json(v: &Value) -> JsonValue {
    match v {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number).unwrap_or(JsonValue::Null),
        Value::Str(s) => JsonValue::String(s.clone()),
    }
}

pub struct JsonWriter<W: Write> {
    inner: W,
    field_names: Vec<String>,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(inner: W, field_names: Vec<String>) -> Self {
        Self { inner, field_names }
    }
}

impl<W: Write> RecordWriter for JsonWriter<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        let mut map = serde_json::Map::with_capacity(self.field_names.len());
        for (name, v) in self.field_names.iter().zip(record.iter()) {
            map.insert(name.clone(), value_to_json(v));
        }
        let line = serde_json::to_string(&JsonValue::Object(map)).context("serialize JSON line")?;
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")?;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_reads_back_records() {
        let field_names = vec!["iso".to_string(), "name".to_string()];
        let mut buf: Vec<u8> = Vec::new();
        {
            let mut w = JsonWriter::new(&mut buf, field_names.clone());
            w.write(&vec![Value::Str("AU".into()), Value::Str("Australia".into())]).unwrap();
            w.write(&vec![Value::Str("RU".into()), Value::Null]).unwrap();
        }
        let mut r = JsonReader::new(buf.as_slice(), field_names);
        assert_eq!(r.read_next().unwrap(), Some(vec![Value::Str("AU".into()), Value::Str("Australia".into())]));
        assert_eq!(r.read_next().unwrap(), Some(vec![Value::Str("RU".into()), Value::Null]));
        assert_eq!(r.read_next().unwrap(), None);
    }
}
