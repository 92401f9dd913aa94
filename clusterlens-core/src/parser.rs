// Line classifier for MongoDB structured logs
//
// MongoDB (4.4+) writes one JSON object per line. Anything else in a log file
// (startup banners, truncated writes, legacy text lines) is noise and is
// skipped without raising an error.

use serde_json::{Map, Value};

/// Attribute block of a structured log line (`attr` in the MongoDB format)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogAttributes {
    pub name: Option<String>,
    pub value: Option<f64>,
    pub ns: Option<String>,
    pub millis: Option<f64>,
}

/// Decoded form of a single structured log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: Option<String>,
    pub severity: Option<String>,
    pub component: Option<String>,
    pub context: Option<String>,
    pub message: Option<String>,
    pub attr: Option<LogAttributes>,
    /// The full decoded object, kept verbatim for slow-query reporting
    pub raw: Value,
}

impl LogRecord {
    /// Build a record from an already decoded JSON value.
    ///
    /// Only objects are structured records; scalars and arrays yield `None`.
    pub fn from_value(raw: Value) -> Option<Self> {
        let map = raw.as_object()?;

        let attr = map.get("attr").and_then(Value::as_object).map(|attr| LogAttributes {
            name: string_field(attr, "name"),
            value: attr.get("value").and_then(Value::as_f64),
            ns: string_field(attr, "ns"),
            millis: attr.get("millis").and_then(Value::as_f64),
        });

        Some(Self {
            timestamp: timestamp_field(map),
            severity: string_field(map, "s"),
            component: string_field(map, "component"),
            context: string_field(map, "ctx"),
            message: string_field(map, "msg"),
            attr,
            raw,
        })
    }

    pub fn attr_name(&self) -> Option<&str> {
        self.attr.as_ref().and_then(|a| a.name.as_deref())
    }

    pub fn attr_value(&self) -> Option<f64> {
        self.attr.as_ref().and_then(|a| a.value)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.attr.as_ref().and_then(|a| a.ns.as_deref())
    }

    pub fn millis(&self) -> Option<f64> {
        self.attr.as_ref().and_then(|a| a.millis)
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

// `t` is either a plain string or the extended-JSON form `{"$date": "..."}`
fn timestamp_field(map: &Map<String, Value>) -> Option<String> {
    match map.get("t")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(inner) => string_field(inner, "$date"),
        _ => None,
    }
}

/// Classify a single raw line.
///
/// Returns `None` for blank, malformed, or non-object lines. This never fails:
/// a bad line must not stop the scan of the rest of the file.
pub fn classify_line(line: &str) -> Option<LogRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: Value = serde_json::from_str(trimmed).ok()?;
    LogRecord::from_value(value)
}
