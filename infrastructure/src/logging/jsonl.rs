//! JSONL run logger.
//!
//! The durable form of the iteration audit trail: every observer event is
//! serialized as a single JSON line with a `type` field and `timestamp`,
//! appended via a buffered writer.

use planwire_application::ports::RunObserver;
use planwire_domain::command::Command;
use planwire_domain::run::RunResult;
use planwire_domain::tool::ToolResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Run logger that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlRunLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlRunLogger {
    /// Create a new logger appending to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!("Could not create run log directory {}: {}", parent.display(), e);
            return None;
        }

        let file = match File::options().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open run log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, event_type: &str, payload: serde_json::Value) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let record = if let serde_json::Value::Object(mut map) = payload {
            map.insert("type".to_string(), serde_json::Value::String(event_type.into()));
            map.insert("timestamp".to_string(), serde_json::Value::String(timestamp));
            serde_json::Value::Object(map)
        } else {
            serde_json::json!({
                "type": event_type,
                "timestamp": timestamp,
                "data": payload,
            })
        };

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
            // Flush per event; a crash mid-run loses at most the current line.
            let _ = writer.flush();
        }
    }
}

impl RunObserver for JsonlRunLogger {
    fn on_run_start(&self, task: &str) {
        self.write("run_start", serde_json::json!({"task": task}));
    }

    fn on_model_request(&self, index: usize, prompt: &str) {
        self.write(
            "model_request",
            serde_json::json!({"iteration": index, "prompt": prompt}),
        );
    }

    fn on_model_response(&self, index: usize, text: &str) {
        self.write(
            "model_response",
            serde_json::json!({"iteration": index, "bytes": text.len(), "text": text}),
        );
    }

    fn on_parse_error(&self, index: usize, error: &str) {
        self.write(
            "parse_error",
            serde_json::json!({"iteration": index, "error": error}),
        );
    }

    fn on_command(&self, index: usize, command: &Command) {
        let command = serde_json::to_value(command).unwrap_or(serde_json::Value::Null);
        self.write(
            "command",
            serde_json::json!({"iteration": index, "command": command}),
        );
    }

    fn on_tool_result(&self, index: usize, result: &ToolResult) {
        let result = serde_json::to_value(result).unwrap_or(serde_json::Value::Null);
        self.write(
            "tool_result",
            serde_json::json!({"iteration": index, "result": result}),
        );
    }

    fn on_execution_error(&self, index: usize, error: &str) {
        self.write(
            "execution_error",
            serde_json::json!({"iteration": index, "error": error}),
        );
    }

    fn on_run_complete(&self, result: &RunResult) {
        let outcome = serde_json::to_value(&result.outcome).unwrap_or(serde_json::Value::Null);
        self.write(
            "run_complete",
            serde_json::json!({
                "outcome": outcome,
                "iterations": result.iterations.len(),
                "duration_ms": result.duration_ms,
            }),
        );
    }
}

impl Drop for JsonlRunLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
