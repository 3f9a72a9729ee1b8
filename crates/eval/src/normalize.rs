//! Ledger normalization.
//!
//! Turns the raw ledger of a stored case into a canonical timeline: events
//! sorted by day, one per day, covering exactly `1..=n`. Checks run in a
//! fixed order so a ledger with several defects always reports the same one:
//!
//! 1. empty ledger
//! 2. non-positive days (input order)
//! 3. duplicates and gaps (ascending day order)
//! 4. unrecognized actors (ascending day order)

use trace_storage::{CaseRecord, LedgerEventRecord};

use crate::error::{EvalError, LedgerDefect};
use crate::types::{Actor, Case, CaseStatus, LedgerEvent, Timeline};

/// Validate and order a raw ledger into a canonical timeline.
pub fn normalize(case_id: &str, records: &[LedgerEventRecord]) -> Result<Timeline, EvalError> {
    let malformed = |defect| EvalError::MalformedLedger {
        case_id: case_id.to_string(),
        defect,
    };

    if records.is_empty() {
        return Err(malformed(LedgerDefect::Empty));
    }

    if let Some(bad) = records.iter().find(|r| r.day <= 0) {
        return Err(malformed(LedgerDefect::NonPositiveDay { day: bad.day }));
    }

    let mut sorted: Vec<&LedgerEventRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.day);

    let mut expected: i64 = 1;
    for record in &sorted {
        if record.day < expected {
            return Err(malformed(LedgerDefect::DuplicateDay { day: record.day }));
        }
        if record.day > expected {
            return Err(malformed(LedgerDefect::Gap {
                expected,
                found: record.day,
            }));
        }
        expected += 1;
    }

    let mut events = Vec::with_capacity(sorted.len());
    for (idx, record) in sorted.into_iter().enumerate() {
        let day = idx as u32 + 1;
        let actor: Actor = record
            .actor
            .parse()
            .map_err(|_| EvalError::UnknownActor {
                case_id: case_id.to_string(),
                day,
                actor: record.actor.clone(),
            })?;
        events.push(LedgerEvent {
            day,
            actor,
            action: record.action.clone(),
            has_evidence: record.has_evidence,
            breach: record.breach,
            action_type: record.action_type.clone(),
        });
    }

    Ok(Timeline::new(case_id.to_string(), events))
}

/// Validate a whole stored case: header fields and ledger.
pub fn normalize_case(record: &CaseRecord) -> Result<(Case, Timeline), EvalError> {
    let status = CaseStatus::parse(&record.status).ok_or_else(|| EvalError::InvalidStatus {
        case_id: record.case_id.clone(),
        status: record.status.clone(),
    })?;

    let timeline = normalize(&record.case_id, &record.ledger)?;

    let case = Case {
        case_id: record.case_id.clone(),
        amount: record.amount,
        assigned_dca: record.assigned_dca.clone(),
        status,
    };

    Ok((case, timeline))
}
