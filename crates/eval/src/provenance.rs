//! Per-day attribution provenance.
//!
//! Every day of a case carries a record of who acted, who was held
//! responsible, and on what basis, so a reviewer can trace each count in
//! the breakdown back to a single ledger event and (for breaches) the SLA
//! rule that moved it.

use serde::Serialize;

use crate::sla::SlaRule;
use crate::types::{Actor, LedgerEvent};

/// Why a day was attributed to the actor it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "basis", rename_all = "camelCase")]
pub enum AttributionBasis {
    /// The acting party is responsible for its own day.
    Acted,
    /// A breach of an SLA rule; the day belongs to the owing party.
    #[serde(rename_all = "camelCase")]
    SlaBreach {
        action_type: String,
        owed_by: Actor,
        max_days: u32,
    },
    /// A breach with no matching rule; the day stays with the acting party.
    #[serde(rename_all = "camelCase")]
    UnclassifiedBreach {
        #[serde(skip_serializing_if = "Option::is_none")]
        action_type: Option<String>,
    },
}

impl AttributionBasis {
    pub fn is_breach(&self) -> bool {
        !matches!(self, AttributionBasis::Acted)
    }
}

/// Attribution record for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAttribution {
    pub day: u32,
    pub acting_actor: Actor,
    pub attributed_to: Actor,
    pub has_evidence: bool,
    #[serde(flatten)]
    pub basis: AttributionBasis,
}

impl DayAttribution {
    /// The acting party keeps the day.
    pub(crate) fn acted(event: &LedgerEvent) -> Self {
        DayAttribution {
            day: event.day,
            acting_actor: event.actor,
            attributed_to: event.actor,
            has_evidence: event.has_evidence,
            basis: AttributionBasis::Acted,
        }
    }

    /// The day moves to whoever owes `rule`.
    pub(crate) fn breached(event: &LedgerEvent, rule: &SlaRule) -> Self {
        DayAttribution {
            day: event.day,
            acting_actor: event.actor,
            attributed_to: rule.actor,
            has_evidence: event.has_evidence,
            basis: AttributionBasis::SlaBreach {
                action_type: rule.action_type.clone(),
                owed_by: rule.actor,
                max_days: rule.max_days,
            },
        }
    }

    /// A breach no rule classifies; flagged, attributed to the acting party.
    pub(crate) fn unclassified(event: &LedgerEvent) -> Self {
        DayAttribution {
            day: event.day,
            acting_actor: event.actor,
            attributed_to: event.actor,
            has_evidence: event.has_evidence,
            basis: AttributionBasis::UnclassifiedBreach {
                action_type: event.action_type.clone(),
            },
        }
    }
}
