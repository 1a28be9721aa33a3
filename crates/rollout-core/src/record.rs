use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::action::{ActionId, ExecutionContext};

// ---------------------------------------------------------------------------
// Disposition
// ---------------------------------------------------------------------------

/// How one plan entry was disposed of during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Disposition {
    /// Condition evaluated false (or the action already ran in an earlier
    /// sequence); the body was never invoked.
    Skipped,
    Succeeded,
    /// Body failed under an aborting return policy.
    Failed { reason: String },
    /// Body failed under the ignore policy; the session continued.
    FailedIgnored { reason: String },
    /// Compensation body ran successfully during rollback.
    Compensated,
    /// Compensation body failed; rollback is best-effort, so this never
    /// escalates.
    CompensationFailed { reason: String },
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Skipped => "skipped",
            Disposition::Succeeded => "succeeded",
            Disposition::Failed { .. } => "failed",
            Disposition::FailedIgnored { .. } => "failed_ignored",
            Disposition::Compensated => "compensated",
            Disposition::CompensationFailed { .. } => "compensation_failed",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ExecutionRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub action: ActionId,
    pub context: ExecutionContext,
    pub disposition: Disposition,
    pub at: DateTime<Utc>,
}

/// Ordered log of what actually happened during a run. Append-only while
/// the executor walks forward; read-only while the rollback coordinator
/// scans it in reverse. Entry order exactly matches execution order —
/// rollback correctness depends on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    entries: Vec<RecordEntry>,
}

impl ExecutionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, action: ActionId, context: ExecutionContext, disposition: Disposition) {
        self.entries.push(RecordEntry {
            action,
            context,
            disposition,
            at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forward actions that completed successfully, in execution order.
    pub fn successes(&self) -> impl Iterator<Item = &RecordEntry> {
        self.entries
            .iter()
            .filter(|e| e.disposition == Disposition::Succeeded)
    }

    pub fn any_ignored_failures(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.disposition, Disposition::FailedIgnored { .. }))
    }
}

// ---------------------------------------------------------------------------
// SessionOutcome / SessionReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    CompletedWithIgnoredFailures,
    RolledBack,
}

impl SessionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::CompletedWithIgnoredFailures => "completed_with_ignored_failures",
            SessionOutcome::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the host receives at session end: the final outcome plus
/// the full record for audit. Never a raw error from an action body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub record: ExecutionRecord,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_preserves_append_order() {
        let mut record = ExecutionRecord::new();
        record.append(
            ActionId::new("a"),
            ExecutionContext::Immediate,
            Disposition::Succeeded,
        );
        record.append(
            ActionId::new("b"),
            ExecutionContext::Deferred,
            Disposition::Failed {
                reason: "disk full".to_string(),
            },
        );

        let ids: Vec<&str> = record.entries().iter().map(|e| e.action.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn successes_excludes_ignored_failures_and_skips() {
        let mut record = ExecutionRecord::new();
        record.append(
            ActionId::new("a"),
            ExecutionContext::Immediate,
            Disposition::Succeeded,
        );
        record.append(
            ActionId::new("b"),
            ExecutionContext::Immediate,
            Disposition::FailedIgnored {
                reason: "flaky".to_string(),
            },
        );
        record.append(
            ActionId::new("c"),
            ExecutionContext::Deferred,
            Disposition::Skipped,
        );

        let ids: Vec<&str> = record.successes().map(|e| e.action.as_str()).collect();
        assert_eq!(ids, ["a"]);
        assert!(record.any_ignored_failures());
    }

    #[test]
    fn report_serializes_to_json() {
        let mut record = ExecutionRecord::new();
        record.append(
            ActionId::new("write_config"),
            ExecutionContext::Deferred,
            Disposition::Succeeded,
        );
        let report = SessionReport {
            outcome: SessionOutcome::Completed,
            record,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"outcome\":\"completed\""));
        assert!(json.contains("\"status\":\"succeeded\""));
    }
}
