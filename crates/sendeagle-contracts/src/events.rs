use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type EventPayload = Map<String, Value>;

/// Append-only `events.jsonl` log for one batch run.
///
/// Every line is a compact JSON object carrying `type`, `run_id` and `ts`
/// ahead of the caller's payload. A log built with [`EventLog::disabled`]
/// accepts events and writes nothing.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: Option<PathBuf>,
    run_id: String,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Reserved keys cannot be overridden by the payload.
    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert("run_id".to_string(), Value::String(self.run_id.clone()));
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            if matches!(key.as_str(), "type" | "run_id" | "ts") {
                continue;
            }
            event.insert(key, value);
        }

        let Some(path) = &self.path else {
            return Ok(Value::Object(event));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(&event)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(Value::Object(event))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{EventLog, EventPayload};

    #[test]
    fn emit_appends_one_line_per_event() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let log = EventLog::new(&path).with_run_id("run-1");

        let mut payload = EventPayload::new();
        payload.insert("filename".to_string(), json!("a.png"));
        let emitted = log.emit("image_saved", payload)?;
        log.emit("batch_finished", EventPayload::new())?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0])?;
        assert_eq!(first, emitted);
        assert_eq!(first["type"], json!("image_saved"));
        assert_eq!(first["run_id"], json!("run-1"));
        assert_eq!(first["filename"], json!("a.png"));
        DateTime::parse_from_rfc3339(first["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn payload_cannot_override_reserved_keys() -> anyhow::Result<()> {
        let log = EventLog::disabled().with_run_id("run-2");
        let mut payload = EventPayload::new();
        payload.insert("type".to_string(), json!("spoofed"));
        payload.insert("run_id".to_string(), json!("other"));
        let emitted = log.emit("image_saved", payload)?;
        assert_eq!(emitted["type"], json!("image_saved"));
        assert_eq!(emitted["run_id"], json!("run-2"));
        Ok(())
    }

    #[test]
    fn disabled_log_writes_nothing() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = EventLog::disabled();
        log.emit("batch_started", EventPayload::new())?;
        assert!(log.path().is_none());
        assert_eq!(fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }
}
