//! Closed status enumerations for messages, recipients, and dead letters.
//!
//! Statuses are tagged variants rather than strings so every consumption
//! site matches exhaustively and no invalid status value can be stored.

use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Delivery state of a single recipient within a message.
///
/// A recipient is mutated only by the worker processing its message, and is
/// immutable once terminal (`Sent` or `Failed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
}

impl RecipientStatus {
    /// A terminal recipient status is never overwritten.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

impl Display for RecipientStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Pending => write!(fmt, "pending"),
            Self::Sent => write!(fmt, "sent"),
            Self::Failed => write!(fmt, "failed"),
        }
    }
}

/// Aggregate state of one submitted message (a "job").
///
/// Progression is monotonic: `Pending` → `Sending` → one of the terminal
/// states. It never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No recipient has been claimed by a worker yet.
    Pending,
    /// At least one recipient has been attempted, not all are resolved.
    Sending,
    /// Every recipient was sent.
    Completed,
    /// A mix of sent and failed recipients.
    Partial,
    /// Every recipient failed.
    Failed,
}

impl JobStatus {
    /// Derive the job status from the multiset of recipient statuses.
    ///
    /// This is a pure function of the recipient statuses:
    /// - all pending → `Pending`
    /// - any pending alongside progress → `Sending`
    /// - all sent → `Completed`
    /// - all failed → `Failed`
    /// - a mix of sent and failed → `Partial`
    ///
    /// It can never yield `Completed` while any recipient is still pending.
    #[must_use]
    pub fn derive<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = RecipientStatus>,
    {
        let (mut pending, mut sent, mut failed) = (0_usize, 0_usize, 0_usize);

        for status in statuses {
            match status {
                RecipientStatus::Pending => pending += 1,
                RecipientStatus::Sent => sent += 1,
                RecipientStatus::Failed => failed += 1,
            }
        }

        if sent == 0 && failed == 0 {
            // Covers the no-recipient case as well: nothing has progressed.
            Self::Pending
        } else if pending > 0 {
            Self::Sending
        } else if failed == 0 {
            Self::Completed
        } else if sent == 0 {
            Self::Failed
        } else {
            Self::Partial
        }
    }

    /// Whether this status is terminal (the message will not change again).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Partial | Self::Failed)
    }
}

impl Display for JobStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Pending => write!(fmt, "pending"),
            Self::Sending => write!(fmt, "sending"),
            Self::Completed => write!(fmt, "completed"),
            Self::Partial => write!(fmt, "partial"),
            Self::Failed => write!(fmt, "failed"),
        }
    }
}

/// Lifecycle of a dead-letter record.
///
/// Records are append-only: they are never deleted, only transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadLetterStatus {
    /// Awaiting operator action.
    Pending,
    /// The operator has re-driven this record.
    Retried,
    /// Explicitly given up on by an operator.
    Abandoned,
}

impl Display for DeadLetterStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Pending => write!(fmt, "pending"),
            Self::Retried => write!(fmt, "retried"),
            Self::Abandoned => write!(fmt, "abandoned"),
        }
    }
}

/// Classification of a send failure, preserved on dead-letter records for
/// operator diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Connection failure or timeout; retrying was worthwhile but exhausted.
    Transient,
    /// The gateway explicitly rejected the message; retrying would not help.
    Application,
    /// The task body itself failed unexpectedly.
    Defect,
}

impl Display for ErrorKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Transient => write!(fmt, "transient"),
            Self::Application => write!(fmt, "application"),
            Self::Defect => write!(fmt, "defect"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    use RecipientStatus::{Failed, Pending, Sent};

    #[test]
    fn derive_all_pending() {
        assert_eq!(JobStatus::derive([Pending, Pending]), JobStatus::Pending);
    }

    #[test]
    fn derive_in_progress() {
        assert_eq!(JobStatus::derive([Sent, Pending]), JobStatus::Sending);
        assert_eq!(JobStatus::derive([Failed, Pending]), JobStatus::Sending);
        assert_eq!(
            JobStatus::derive([Sent, Failed, Pending]),
            JobStatus::Sending
        );
    }

    #[test]
    fn derive_terminal_states() {
        assert_eq!(JobStatus::derive([Sent, Sent]), JobStatus::Completed);
        assert_eq!(JobStatus::derive([Failed, Failed]), JobStatus::Failed);
        assert_eq!(JobStatus::derive([Sent, Failed]), JobStatus::Partial);
    }

    #[test]
    fn derive_never_completed_while_pending() {
        // For every multiset containing a pending recipient, the derived
        // status must not be a terminal one.
        for mix in [
            vec![Pending],
            vec![Pending, Sent],
            vec![Pending, Failed],
            vec![Pending, Sent, Failed],
            vec![Pending, Pending, Sent, Sent],
        ] {
            let status = JobStatus::derive(mix.clone());
            assert!(
                !status.is_terminal(),
                "{mix:?} derived terminal status {status}"
            );
        }
    }

    #[test]
    fn derive_no_recipients_is_pending() {
        assert_eq!(JobStatus::derive([]), JobStatus::Pending);
    }

    #[test]
    fn status_display_matches_wire_values() {
        assert_eq!(JobStatus::Partial.to_string(), "partial");
        assert_eq!(RecipientStatus::Sent.to_string(), "sent");
        assert_eq!(DeadLetterStatus::Abandoned.to_string(), "abandoned");
        assert_eq!(ErrorKind::Application.to_string(), "application");
    }

    #[test]
    fn terminal_recipient_statuses() {
        assert!(!Pending.is_terminal());
        assert!(Sent.is_terminal());
        assert!(Failed.is_terminal());
    }
}
