//! Append-only JSONL audit journal.
//!
//! One JSON object per line, recording what was proposed, blocked, approved,
//! denied and executed in a session.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sw_protocol::RiskLevel;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AuditEvent<'a> {
    Proposed {
        command: &'a str,
        risk_level: RiskLevel,
        provider: &'a str,
    },
    Blocked {
        command: &'a str,
        warnings: &'a [String],
    },
    Approved {
        command: &'a str,
        method: &'a str,
    },
    Denied {
        command: &'a str,
        method: &'a str,
    },
    Executed {
        command: &'a str,
        exit_code: Option<i32>,
        duration_ms: u64,
        sandbox: bool,
    },
}

#[derive(Serialize)]
struct Record<'a> {
    ts: u64,
    session: &'a str,
    #[serde(flatten)]
    event: AuditEvent<'a>,
}

pub struct AuditLogger {
    writer: Option<BufWriter<File>>,
    session_id: String,
}

impl AuditLogger {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            session_id: session_id(),
        })
    }

    /// Logger that discards everything.
    pub fn noop() -> Self {
        Self {
            writer: None,
            session_id: session_id(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn log_proposed(&mut self, command: &str, risk_level: RiskLevel, provider: &str) {
        self.write(AuditEvent::Proposed {
            command,
            risk_level,
            provider,
        });
    }

    pub fn log_blocked(&mut self, command: &str, warnings: &[String]) {
        self.write(AuditEvent::Blocked { command, warnings });
    }

    /// `method` is how approval was given: `"user"`, `"auto"`.
    pub fn log_approved(&mut self, command: &str, method: &str) {
        self.write(AuditEvent::Approved { command, method });
    }

    pub fn log_denied(&mut self, command: &str, method: &str) {
        self.write(AuditEvent::Denied { command, method });
    }

    pub fn log_executed(
        &mut self,
        command: &str,
        exit_code: Option<i32>,
        duration_ms: u64,
        sandbox: bool,
    ) {
        self.write(AuditEvent::Executed {
            command,
            exit_code,
            duration_ms,
            sandbox,
        });
    }

    fn write(&mut self, event: AuditEvent<'_>) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let record = Record {
            ts: epoch_secs(),
            session: &self.session_id,
            event,
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode audit record");
                return;
            }
        };
        if let Err(e) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
            tracing::warn!(error = %e, "failed to write audit record");
        }
    }
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn session_id() -> String {
    format!("s{:x}", std::process::id() ^ (epoch_secs() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_records(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn new_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("audit.jsonl");
        let _logger = AuditLogger::new(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn records_full_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut logger = AuditLogger::new(&path).unwrap();

        logger.log_proposed("ls -la", RiskLevel::Low, "anthropic");
        logger.log_approved("ls -la", "user");
        logger.log_executed("ls -la", Some(0), 12, false);
        drop(logger);

        let records = read_records(&path);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["type"], "proposed");
        assert_eq!(records[0]["risk_level"], "low");
        assert_eq!(records[0]["provider"], "anthropic");
        assert_eq!(records[1]["type"], "approved");
        assert_eq!(records[1]["method"], "user");
        assert_eq!(records[2]["type"], "executed");
        assert_eq!(records[2]["exit_code"], 0);
        assert_eq!(records[2]["duration_ms"], 12);
        assert_eq!(records[2]["sandbox"], false);
        // one session per logger
        assert_eq!(records[0]["session"], records[2]["session"]);
    }

    #[test]
    fn blocked_keeps_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut logger = AuditLogger::new(&path).unwrap();
        logger.log_blocked(
            "rm -rf /",
            &["Blocked dangerous command: rm -rf /".to_string()],
        );
        logger.log_denied("chmod 777 x", "user");
        drop(logger);

        let records = read_records(&path);
        assert_eq!(records[0]["type"], "blocked");
        assert_eq!(records[0]["warnings"][0], "Blocked dangerous command: rm -rf /");
        assert_eq!(records[1]["type"], "denied");
    }

    #[test]
    fn appends_across_loggers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        AuditLogger::new(&path)
            .unwrap()
            .log_approved("true", "auto");
        AuditLogger::new(&path)
            .unwrap()
            .log_executed("true", None, 0, true);
        let records = read_records(&path);
        assert_eq!(records.len(), 2);
        assert!(records[1]["exit_code"].is_null());
    }

    #[test]
    fn noop_writes_nothing() {
        let mut logger = AuditLogger::noop();
        logger.log_proposed("ls", RiskLevel::High, "mock");
        logger.log_executed("ls", Some(1), 5, false);
        assert!(logger.session_id().starts_with('s'));
    }
}
