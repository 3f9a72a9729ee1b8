use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A recovery case as materialized upstream, before any validation.
///
/// Field names follow the case-file JSON (`caseId`, `assignedDCA`, ...).
/// `amount` accepts either a JSON number or a decimal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub case_id: String,
    pub amount: Decimal,
    #[serde(rename = "assignedDCA")]
    pub assigned_dca: String,
    pub status: String,
    #[serde(default)]
    pub ledger: Vec<LedgerEventRecord>,
}

/// One raw ledger row. `day` is signed and `actor` is free text so that
/// malformed input survives until the normalizer can reject it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEventRecord {
    pub day: i64,
    pub actor: String,
    pub action: String,
    pub has_evidence: bool,
    pub breach: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
}
