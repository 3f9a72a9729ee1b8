//! Error taxonomy for normalization, attribution, and case queries.

use std::fmt;

use trace_storage::StorageError;

/// The structural defect that made a ledger malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerDefect {
    /// The case has no ledger events at all.
    Empty,
    /// A day number of zero or less.
    NonPositiveDay { day: i64 },
    /// Two events claim the same day.
    DuplicateDay { day: i64 },
    /// Days skip from `expected` to `found`.
    Gap { expected: i64, found: i64 },
}

impl fmt::Display for LedgerDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerDefect::Empty => write!(f, "ledger is empty"),
            LedgerDefect::NonPositiveDay { day } => {
                write!(f, "day {} is not a positive day number", day)
            }
            LedgerDefect::DuplicateDay { day } => write!(f, "day {} appears more than once", day),
            LedgerDefect::Gap { expected, found } => {
                write!(f, "expected day {} but found day {}", expected, found)
            }
        }
    }
}

/// Errors raised while turning a stored case into an attribution.
///
/// None of these are recoverable inside the engine: a request that hits
/// one returns no partial result.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// The requested case identifier has no case.
    #[error("case '{case_id}' not found")]
    CaseNotFound { case_id: String },

    /// The stored ledger violates the one-event-per-day invariant.
    #[error("malformed ledger for case '{case_id}': {defect}")]
    MalformedLedger {
        case_id: String,
        defect: LedgerDefect,
    },

    /// A ledger event names an actor outside DCA / FedEx / Customer.
    #[error("unknown actor '{actor}' on day {day} of case '{case_id}'")]
    UnknownActor {
        case_id: String,
        day: u32,
        actor: String,
    },

    /// The stored case status is not open / escalated / closed.
    #[error("invalid status '{status}' for case '{case_id}'")]
    InvalidStatus { case_id: String, status: String },

    /// A breach whose action type has no SLA rule, under a policy that
    /// rejects unclassified breaches.
    #[error(
        "unclassified breach on day {day} of case '{case_id}': action type {} has no SLA rule",
        .action_type.as_deref().map(|t| format!("'{}'", t)).unwrap_or_else(|| "<none>".to_string())
    )]
    UnclassifiedBreach {
        case_id: String,
        day: u32,
        action_type: Option<String>,
    },

    /// The computed breakdown does not reconcile with the case duration.
    #[error(
        "attribution invariant violated for case '{case_id}': {attributed} days attributed across {records} records, expected {total_days}"
    )]
    AttributionInvariantViolation {
        case_id: String,
        attributed: u64,
        records: usize,
        total_days: u32,
    },

    /// The canonical digest input could not be encoded.
    #[error("failed to encode digest input for case '{case_id}': {source}")]
    DigestEncoding {
        case_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The case store failed for a reason other than a missing case.
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for EvalError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::CaseNotFound { case_id } => EvalError::CaseNotFound { case_id },
            other => EvalError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_found_maps_to_case_not_found() {
        let err: EvalError = StorageError::CaseNotFound {
            case_id: "X".to_string(),
        }
        .into();
        assert!(matches!(err, EvalError::CaseNotFound { case_id } if case_id == "X"));
    }

    #[test]
    fn other_storage_errors_are_wrapped() {
        let err: EvalError = StorageError::Backend("down".to_string()).into();
        assert!(matches!(err, EvalError::Storage(_)));
        assert_eq!(err.to_string(), "storage backend error: down");
    }

    #[test]
    fn malformed_ledger_message_names_the_defect() {
        let err = EvalError::MalformedLedger {
            case_id: "C".to_string(),
            defect: LedgerDefect::Gap {
                expected: 3,
                found: 4,
            },
        };
        assert_eq!(
            err.to_string(),
            "malformed ledger for case 'C': expected day 3 but found day 4"
        );
    }

    #[test]
    fn unclassified_breach_message_without_action_type() {
        let err = EvalError::UnclassifiedBreach {
            case_id: "C".to_string(),
            day: 2,
            action_type: None,
        };
        assert_eq!(
            err.to_string(),
            "unclassified breach on day 2 of case 'C': action type <none> has no SLA rule"
        );
    }

    #[test]
    fn digest_encoding_names_the_case() {
        let err = EvalError::DigestEncoding {
            case_id: "C".to_string(),
            source: serde_json::from_str::<u8>("[").unwrap_err(),
        };
        assert!(err
            .to_string()
            .starts_with("failed to encode digest input for case 'C': "));
        assert!(std::error::Error::source(&err).is_some());
    }
}
