//! Domain types for recovery cases and their canonical timelines.
//!
//! Raw records from `trace-storage` are untrusted; the values here are
//! only produced by the normalizer and are valid by construction.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Actors
// ──────────────────────────────────────────────

/// A party that can act on, or be responsible for, a day of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Actor {
    #[serde(rename = "DCA")]
    Dca,
    #[serde(rename = "FedEx")]
    FedEx,
    #[serde(rename = "Customer")]
    Customer,
}

impl Actor {
    /// Every actor, in primary-cause priority order (highest first).
    pub const PRIORITY: [Actor; 3] = [Actor::FedEx, Actor::Dca, Actor::Customer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Dca => "DCA",
            Actor::FedEx => "FedEx",
            Actor::Customer => "Customer",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no recognized actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedActor(pub String);

impl FromStr for Actor {
    type Err = UnrecognizedActor;

    /// Exact match only: `"fedex"` and `"Carrier"` are both rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DCA" => Ok(Actor::Dca),
            "FedEx" => Ok(Actor::FedEx),
            "Customer" => Ok(Actor::Customer),
            other => Err(UnrecognizedActor(other.to_string())),
        }
    }
}

// ──────────────────────────────────────────────
// Case
// ──────────────────────────────────────────────

/// Lifecycle status of a recovery case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Open,
    Escalated,
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "open",
            CaseStatus::Escalated => "escalated",
            CaseStatus::Closed => "closed",
        }
    }

    /// Case-insensitive parse of a stored status string.
    pub fn parse(s: &str) -> Option<CaseStatus> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Some(CaseStatus::Open),
            "escalated" => Some(CaseStatus::Escalated),
            "closed" => Some(CaseStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case header as exposed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub case_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "assignedDCA")]
    pub assigned_dca: String,
    pub status: CaseStatus,
}

// ──────────────────────────────────────────────
// Ledger
// ──────────────────────────────────────────────

/// A validated ledger event: one per day of the case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    pub day: u32,
    pub actor: Actor,
    pub action: String,
    pub has_evidence: bool,
    pub breach: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
}

/// Ledger events sorted by day, covering exactly `1..=total_days`.
///
/// Only the normalizer constructs timelines, so holding one is proof the
/// contiguity invariant was checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    case_id: String,
    events: Vec<LedgerEvent>,
}

impl Timeline {
    pub(crate) fn new(case_id: String, events: Vec<LedgerEvent>) -> Self {
        Timeline { case_id, events }
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Number of days in the case; equal to the number of events.
    pub fn total_days(&self) -> u32 {
        self.events.len() as u32
    }

    /// The event recorded on `day`, if the day is within the case.
    pub fn event_on(&self, day: u32) -> Option<&LedgerEvent> {
        day.checked_sub(1)
            .and_then(|idx| self.events.get(idx as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_parse_is_exact() {
        assert_eq!("DCA".parse::<Actor>(), Ok(Actor::Dca));
        assert_eq!("FedEx".parse::<Actor>(), Ok(Actor::FedEx));
        assert_eq!("Customer".parse::<Actor>(), Ok(Actor::Customer));
        assert_eq!(
            "Carrier".parse::<Actor>(),
            Err(UnrecognizedActor("Carrier".to_string()))
        );
        assert!("fedex".parse::<Actor>().is_err());
    }

    #[test]
    fn actor_serializes_to_wire_names() {
        let json = serde_json::to_value([Actor::Dca, Actor::FedEx, Actor::Customer]).unwrap();
        assert_eq!(json, serde_json::json!(["DCA", "FedEx", "Customer"]));
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(CaseStatus::parse("Escalated"), Some(CaseStatus::Escalated));
        assert_eq!(CaseStatus::parse(" open "), Some(CaseStatus::Open));
        assert_eq!(CaseStatus::parse("CLOSED"), Some(CaseStatus::Closed));
        assert_eq!(CaseStatus::parse("pending"), None);
    }

    #[test]
    fn case_amount_serializes_as_number() {
        let case = Case {
            case_id: "FDX-1".to_string(),
            amount: Decimal::new(12550000, 2),
            assigned_dca: "CollectCorp".to_string(),
            status: CaseStatus::Escalated,
        };
        let json = serde_json::to_value(&case).unwrap();
        assert_eq!(json["amount"], serde_json::json!(125500.0));
        assert_eq!(json["assignedDCA"], "CollectCorp");
        assert_eq!(json["status"], "escalated");
    }
}
