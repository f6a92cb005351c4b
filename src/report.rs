// docbackup/src/report.rs
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Backup,
    Restore,
}

/// What the core hands back to the CLI: success flag plus an optional detail,
/// rendered as a single sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub operation: Operation,
    pub success: bool,
    pub detail: Option<String>,
}

impl StatusReport {
    pub fn backup_ready(directory: &Path) -> Self {
        Self {
            operation: Operation::Backup,
            success: true,
            detail: Some(directory.display().to_string()),
        }
    }

    pub fn restored(detail: Option<String>) -> Self {
        Self {
            operation: Operation::Restore,
            success: true,
            detail,
        }
    }

    pub fn failed(operation: Operation, error: impl fmt::Display) -> Self {
        Self {
            operation,
            success: false,
            detail: Some(error.to_string()),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = self
            .detail
            .as_deref()
            .map(|d| d.trim_end_matches('.'))
            .unwrap_or_default();
        match (self.operation, self.success) {
            (Operation::Backup, true) => write!(f, "Backup is ready. Path to backup is {}.", detail),
            (Operation::Backup, false) => {
                write!(f, "Error while backing up database. {}.", detail)
            }
            (Operation::Restore, true) if detail.is_empty() => write!(f, "Database restored"),
            (Operation::Restore, true) => write!(f, "Database restored ({})", detail),
            (Operation::Restore, false) => {
                write!(f, "Error while restoring database. {}.", detail)
            }
        }
    }
}
