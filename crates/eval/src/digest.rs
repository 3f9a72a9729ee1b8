//! Input digest for derived answers.
//!
//! The digest fingerprints exactly the inputs an attribution or explanation
//! was computed from, so two answers with equal digests are guaranteed to
//! be byte-identical. It doubles as the HTTP ETag.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::EvalError;
use crate::types::{Case, LedgerEvent, Timeline};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DigestInput<'a> {
    case_id: &'a str,
    amount: String,
    #[serde(rename = "assignedDCA")]
    assigned_dca: &'a str,
    status: &'a str,
    ledger: &'a [LedgerEvent],
    rule_version: &'a str,
}

/// SHA-256 (lower-case hex) of the compact JSON of case, ledger and rule version.
pub fn input_digest(
    case: &Case,
    timeline: &Timeline,
    rule_version: &str,
) -> Result<String, EvalError> {
    let input = DigestInput {
        case_id: &case.case_id,
        amount: case.amount.normalize().to_string(),
        assigned_dca: &case.assigned_dca,
        status: case.status.as_str(),
        ledger: timeline.events(),
        rule_version,
    };
    let canonical = serde_json::to_vec(&input).map_err(|source| EvalError::DigestEncoding {
        case_id: case.case_id.clone(),
        source,
    })?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}
