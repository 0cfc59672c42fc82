//! Per-watch outcomes and run statistics.

use std::fmt;

/// Closed classification of everything that can go wrong for one watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Hard HTTP error whose status is on an ignore list
    Ignorable,
    /// Transport-level deadline exceeded
    Timeout,
    /// Hard HTTP error that warrants an error notification
    Reportable,
    /// Extraction or replacement pattern failure
    Processing,
    /// DNS, connection and other non-timeout network failures
    Transport,
    /// Cancellation or an aborted task
    Fatal,
}

impl ErrorKind {
    /// Whether errors of this kind produce a notification.
    pub fn is_notified(self) -> bool {
        !matches!(self, ErrorKind::Ignorable | ErrorKind::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Ignorable => write!(f, "ignorable"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Reportable => write!(f, "reportable"),
            ErrorKind::Processing => write!(f, "processing"),
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// Terminal decision for one watch in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// First successful observation; content stored without notification
    NewResource,
    /// Content byte-equal to the snapshot
    Unchanged,
    /// Content differs from the snapshot
    Changed,
    /// Ignored status code or timeout; nothing stored or sent
    IgnoredError { kind: ErrorKind },
    /// Hard HTTP error reported through an error notification
    ReportedError { status: u16 },
    /// Processing, transport or cancellation failure
    FatalError { kind: ErrorKind, message: String },
}

impl ProcessingOutcome {
    /// Whether this outcome writes the snapshot entry.
    pub fn updates_snapshot(&self) -> bool {
        matches!(
            self,
            ProcessingOutcome::NewResource
                | ProcessingOutcome::Unchanged
                | ProcessingOutcome::Changed
        )
    }
}

/// Aggregated outcome counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub skipped: usize,
    pub new_resources: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub ignored_errors: usize,
    pub reported_errors: usize,
    pub fatal_errors: usize,
    /// Watches never dispatched because the run was cancelled
    pub not_dispatched: usize,
}

impl RunReport {
    pub fn record(&mut self, outcome: &ProcessingOutcome) {
        match outcome {
            ProcessingOutcome::NewResource => self.new_resources += 1,
            ProcessingOutcome::Unchanged => self.unchanged += 1,
            ProcessingOutcome::Changed => self.changed += 1,
            ProcessingOutcome::IgnoredError { .. } => self.ignored_errors += 1,
            ProcessingOutcome::ReportedError { .. } => self.reported_errors += 1,
            ProcessingOutcome::FatalError { .. } => self.fatal_errors += 1,
        }
    }

    /// Number of watches that reached a terminal outcome.
    pub fn processed(&self) -> usize {
        self.new_resources
            + self.unchanged
            + self.changed
            + self.ignored_errors
            + self.reported_errors
            + self.fatal_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_successful_outcomes_update_snapshot() {
        assert!(ProcessingOutcome::NewResource.updates_snapshot());
        assert!(ProcessingOutcome::Unchanged.updates_snapshot());
        assert!(ProcessingOutcome::Changed.updates_snapshot());
        assert!(
            !ProcessingOutcome::IgnoredError {
                kind: ErrorKind::Timeout
            }
            .updates_snapshot()
        );
        assert!(!ProcessingOutcome::ReportedError { status: 500 }.updates_snapshot());
    }

    #[test]
    fn test_report_counts_outcomes() {
        let mut report = RunReport::default();
        report.record(&ProcessingOutcome::Changed);
        report.record(&ProcessingOutcome::Changed);
        report.record(&ProcessingOutcome::FatalError {
            kind: ErrorKind::Processing,
            message: "no match".into(),
        });
        assert_eq!(report.changed, 2);
        assert_eq!(report.fatal_errors, 1);
        assert_eq!(report.processed(), 3);
    }

    #[test]
    fn test_ignorable_kinds_are_not_notified() {
        assert!(!ErrorKind::Ignorable.is_notified());
        assert!(!ErrorKind::Timeout.is_notified());
        assert!(ErrorKind::Reportable.is_notified());
        assert!(ErrorKind::Transport.is_notified());
    }
}
