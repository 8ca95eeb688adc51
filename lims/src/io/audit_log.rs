//! Append-only audit log (`.lims/audit.jsonl`), one JSON record per line.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::audit::{AuditRecord, AuditSink};

#[derive(Debug, Clone)]
pub struct JsonlAuditLog {
    path: PathBuf,
}

impl JsonlAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the log. A missing file is an empty log.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read audit log {}", self.path.display()))?;
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("parse audit log {} line {}", self.path.display(), idx + 1)
                })
            })
            .collect()
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open audit log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append audit log {}", self.path.display()))?;
        debug!(request_id = %record.request_id, version = record.version, "audit record appended");
        Ok(())
    }

    fn history(&self, request_id: &str) -> Result<Vec<AuditRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|record| record.request_id == request_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEvent;

    fn flagged(id: &str, version: u64) -> AuditRecord {
        AuditRecord {
            at: "2024-05-01T08:00:00Z".to_string(),
            request_id: id.to_string(),
            version,
            event: AuditEvent::AnalysisFlagged {
                code: "K".to_string(),
                flagged: true,
            },
        }
    }

    #[test]
    fn missing_log_reads_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = JsonlAuditLog::new(temp.path().join("audit.jsonl"));
        assert!(log.read_all().expect("read").is_empty());
    }

    #[test]
    fn appends_one_line_per_record() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = JsonlAuditLog::new(temp.path().join("audit.jsonl"));
        log.record(&flagged("REQ-000001", 2)).expect("record");
        log.record(&flagged("REQ-000002", 2)).expect("record");
        log.record(&flagged("REQ-000001", 3)).expect("record");

        let contents = fs::read_to_string(log.path()).expect("read");
        assert_eq!(contents.lines().count(), 3);

        let history = log.history("REQ-000001").expect("history");
        assert_eq!(history, vec![flagged("REQ-000001", 2), flagged("REQ-000001", 3)]);
    }

    #[test]
    fn corrupt_line_reports_line_number() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = JsonlAuditLog::new(temp.path().join("audit.jsonl"));
        log.record(&flagged("REQ-000001", 2)).expect("record");
        let mut file = OpenOptions::new()
            .append(true)
            .open(log.path())
            .expect("open");
        file.write_all(b"{not json}\n").expect("write");

        let err = log.read_all().expect_err("corrupt");
        assert!(format!("{err:#}").contains("line 2"));
    }
}
