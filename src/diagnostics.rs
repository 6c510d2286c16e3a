// Error taxonomy and diagnostics report
// Only CollateError aborts a run. Everything else degrades gracefully and is
// aggregated into a Diagnostics report returned to the caller alongside the
// snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// FATAL ERRORS
// ============================================================================

/// Structural failures that make the run impossible to complete. These
/// propagate immediately; no partial output is produced.
#[derive(Debug, Error)]
pub enum CollateError {
    /// A column required to join two mandatory tables is entirely absent.
    #[error("required column '{column}' missing from {table}")]
    MissingColumn { table: String, column: String },

    /// Every configured sheet fell outside the authority allow-set.
    #[error("no sheets matched the selected authorities")]
    NoRelevantSheets,

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// An input sheet was absent or empty; the group was skipped.
    MissingSource,
    /// A token found no match at any resolution tier.
    UnresolvedIdentity,
    /// A high-capacity entity resolved to a node not coded 275/400 kV.
    HighCapacityMismatch,
    /// A reconciled endpoint has no canonical node in the registry.
    ConnectivityDiscrepancy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// The sheet, token, or record the entry is about.
    pub subject: String,
    pub message: String,
}

/// Aggregated non-fatal findings from one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub entries: Vec<Diagnostic>,
    pub generated_at: DateTime<Utc>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics {
            entries: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    pub fn push(&mut self, kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            kind,
            subject: subject.into(),
            message: message.into(),
        });
    }

    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|entry| entry.kind == kind).count()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |entry| entry.kind == kind)
    }

    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} diagnostics ({} missing source, {} unresolved identity, {} high-capacity mismatch, {} connectivity)",
            self.entries.len(),
            self.count_of(DiagnosticKind::MissingSource),
            self.count_of(DiagnosticKind::UnresolvedIdentity),
            self.count_of(DiagnosticKind::HighCapacityMismatch),
            self.count_of(DiagnosticKind::ConnectivityDiscrepancy),
        )
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_count() {
        let mut diags = Diagnostics::new();
        assert!(diags.is_clean());

        diags.push(DiagnosticKind::MissingSource, "B-2-1a", "sheet absent");
        diags.push(DiagnosticKind::UnresolvedIdentity, "ABCD", "no site match");
        diags.push(DiagnosticKind::UnresolvedIdentity, "EFGH", "no site match");

        assert!(!diags.is_clean());
        assert_eq!(diags.count_of(DiagnosticKind::UnresolvedIdentity), 2);
        assert_eq!(diags.count_of(DiagnosticKind::MissingSource), 1);
        assert_eq!(diags.count_of(DiagnosticKind::ConnectivityDiscrepancy), 0);
        assert_eq!(diags.of_kind(DiagnosticKind::UnresolvedIdentity).count(), 2);
    }

    #[test]
    fn test_summary_mentions_every_kind() {
        let mut diags = Diagnostics::new();
        diags.push(DiagnosticKind::ConnectivityDiscrepancy, "XXXX1A", "orphan endpoint");

        let summary = diags.summary();
        assert!(summary.contains("1 diagnostics"));
        assert!(summary.contains("1 connectivity"));
    }

    #[test]
    fn test_collate_error_display() {
        let err = CollateError::MissingColumn {
            table: "coordinates".to_string(),
            column: "Site Code".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "required column 'Site Code' missing from coordinates"
        );
    }
}
