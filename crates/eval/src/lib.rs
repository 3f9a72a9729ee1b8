//! TRACE responsibility engine -- accepts stored recovery cases,
//! produces day-by-day attributions and audit explanations.
//!
//! The engine normalizes a raw ledger into a canonical timeline, applies a
//! versioned SLA rule table to attribute every day to exactly one actor,
//! and renders a deterministic narrative naming the primary cause.
//!
//! Everything below the query facade is synchronous and pure: the same
//! case, ledger and rule table always produce the same output.

pub mod attribution;
pub mod digest;
pub mod error;
pub mod explain;
pub mod normalize;
pub mod provenance;
pub mod query;
pub mod sla;
pub mod types;

pub use attribution::{Attribution, AttributionEngine, AttributionPolicy, Breakdown};
pub use error::{EvalError, LedgerDefect};
pub use explain::{primary_cause, synthesize, Explanation, PrimaryCause};
pub use normalize::{normalize, normalize_case};
pub use provenance::{AttributionBasis, DayAttribution};
pub use query::{CaseQueries, CaseView};
pub use sla::{SlaConfigError, SlaRule, SlaRuleTable};
pub use types::{Actor, Case, CaseStatus, LedgerEvent, Timeline};

use serde::Serialize;
use trace_storage::CaseRecord;

/// Everything derived from one case in a single pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub case: Case,
    pub ledger: Vec<LedgerEvent>,
    pub attribution: Attribution,
    pub explanation: Explanation,
}

/// Normalize, attribute and explain a single stored case.
///
/// This is the synchronous one-shot API used when there is no store to
/// query, e.g. a case file given on the command line.
///
/// # Arguments
/// * `record` - Raw case as read from storage
/// * `engine` - Engine carrying the SLA rule table and policy
///
/// # Returns
/// * `CaseReport` with the canonical ledger, attribution and explanation,
///   or the first `EvalError` encountered
pub fn explain_case(
    record: &CaseRecord,
    engine: &AttributionEngine,
) -> Result<CaseReport, EvalError> {
    let (case, timeline) = normalize_case(record)?;
    let attribution = engine.attribute(&case, &timeline)?;
    let explanation = synthesize(&case, &timeline, &attribution);
    Ok(CaseReport {
        ledger: timeline.events().to_vec(),
        case,
        attribution,
        explanation,
    })
}

// ──────────────────────────────────────────────
// Integration tests
// ──────────────────────────────────────────────
