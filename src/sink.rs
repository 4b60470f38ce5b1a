//! Metric sinks receiving decoded records.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::error;

use crate::poller::FieldMap;

/// Receives one record per non-empty group per cycle.
pub trait MetricSink {
    /// Emits a record.
    fn emit(&mut self, name: &str, fields: &FieldMap, tags: Option<&BTreeMap<String, String>>);
}

#[derive(Serialize)]
struct Record<'a> {
    name: &'a str,
    fields: &'a FieldMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a BTreeMap<String, String>>,
    /// Milliseconds since the Unix epoch.
    timestamp: u64,
}

/// Writes each record as one JSON object per line.
///
/// ```
/// use s7comm_poller::{JsonLinesSink, MetricSink, Value};
/// use std::collections::BTreeMap;
///
/// let mut sink = JsonLinesSink::new(Vec::new());
/// let fields = BTreeMap::from([("speed".to_string(), Value::Int16(-3))]);
/// sink.emit("drive", &fields, None);
///
/// let line = String::from_utf8(sink.into_inner()).unwrap();
/// assert!(line.starts_with(r#"{"name":"drive","fields":{"speed":-3},"timestamp":"#));
/// ```
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Creates a sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &Record<'_>) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write> MetricSink for JsonLinesSink<W> {
    fn emit(&mut self, name: &str, fields: &FieldMap, tags: Option<&BTreeMap<String, String>>) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let record = Record {
            name,
            fields,
            tags,
            timestamp,
        };
        if let Err(e) = self.write_record(&record) {
            error!(metric = name, error = %e, "failed to write record");
        }
    }
}
