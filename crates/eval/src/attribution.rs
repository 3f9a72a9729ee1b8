//! Day-by-day responsibility attribution.
//!
//! A single pass over the canonical timeline assigns every day to exactly
//! one actor:
//!
//! 1. The acting party is provisionally responsible for its day.
//! 2. A breach moves the day to whichever party owes the breached action
//!    type, as named by the SLA rule table.
//! 3. Missing evidence alone never moves a day; it is surfaced as an
//!    evidence gap.
//!
//! A breach with no matching rule stays with the acting party and is
//! flagged (or rejected, under a strict policy). The per-actor counts must
//! reconcile with the case duration on every invocation.

use std::sync::Arc;

use serde::Serialize;

use crate::digest::input_digest;
use crate::error::EvalError;
use crate::provenance::DayAttribution;
use crate::sla::SlaRuleTable;
use crate::types::{Actor, Case, Timeline};

/// Day counts per actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    #[serde(rename = "DCA")]
    pub dca: u32,
    #[serde(rename = "FedEx")]
    pub fedex: u32,
    #[serde(rename = "Customer")]
    pub customer: u32,
}

impl Breakdown {
    pub fn get(&self, actor: Actor) -> u32 {
        match actor {
            Actor::Dca => self.dca,
            Actor::FedEx => self.fedex,
            Actor::Customer => self.customer,
        }
    }

    fn credit(&mut self, actor: Actor) {
        match actor {
            Actor::Dca => self.dca += 1,
            Actor::FedEx => self.fedex += 1,
            Actor::Customer => self.customer += 1,
        }
    }

    /// Sum across all actors; widened so it cannot overflow.
    pub fn total(&self) -> u64 {
        u64::from(self.dca) + u64::from(self.fedex) + u64::from(self.customer)
    }
}

/// How the engine treats breaches that no SLA rule classifies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributionPolicy {
    /// Fail with `UnclassifiedBreach` instead of flagging the day.
    pub reject_unclassified_breaches: bool,
}

/// The responsibility breakdown of one case, with per-day provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    pub case_id: String,
    pub total_days: u32,
    pub breakdown: Breakdown,
    pub rule_version: String,
    pub input_digest: String,
    pub unclassified_breaches: Vec<u32>,
    pub evidence_gaps: Vec<u32>,
    pub days: Vec<DayAttribution>,
}

impl Attribution {
    /// Number of breach-flagged days attributed to `actor`.
    pub fn breaches_attributed_to(&self, actor: Actor) -> u32 {
        self.days
            .iter()
            .filter(|d| d.attributed_to == actor && d.basis.is_breach())
            .count() as u32
    }
}

/// Applies an SLA rule table to canonical timelines.
///
/// The table is injected at construction and never changes for the life of
/// the engine, so re-running a historical case against an old table
/// version reproduces the historical answer.
#[derive(Debug, Clone)]
pub struct AttributionEngine {
    rules: Arc<SlaRuleTable>,
    policy: AttributionPolicy,
}

impl AttributionEngine {
    pub fn new(rules: Arc<SlaRuleTable>) -> Self {
        AttributionEngine {
            rules,
            policy: AttributionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AttributionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn rules(&self) -> &SlaRuleTable {
        &self.rules
    }

    /// Attribute every day of `timeline`.
    pub fn attribute(&self, case: &Case, timeline: &Timeline) -> Result<Attribution, EvalError> {
        let case_id = timeline.case_id();
        let mut breakdown = Breakdown::default();
        let mut days = Vec::with_capacity(timeline.events().len());
        let mut unclassified_breaches = Vec::new();
        let mut evidence_gaps = Vec::new();

        for event in timeline.events() {
            if !event.has_evidence {
                evidence_gaps.push(event.day);
            }

            let record = if !event.breach {
                DayAttribution::acted(event)
            } else {
                let rule = event
                    .action_type
                    .as_deref()
                    .and_then(|t| self.rules.obligation_for(t));
                match rule {
                    Some(rule) => DayAttribution::breached(event, rule),
                    None if self.policy.reject_unclassified_breaches => {
                        return Err(EvalError::UnclassifiedBreach {
                            case_id: case_id.to_string(),
                            day: event.day,
                            action_type: event.action_type.clone(),
                        });
                    }
                    None => {
                        tracing::warn!(
                            case_id,
                            day = event.day,
                            action_type = event.action_type.as_deref().unwrap_or("<none>"),
                            rule_version = self.rules.version(),
                            "breach has no matching SLA rule; attributed to acting party"
                        );
                        unclassified_breaches.push(event.day);
                        DayAttribution::unclassified(event)
                    }
                }
            };

            breakdown.credit(record.attributed_to);
            days.push(record);
        }

        check_reconciliation(case_id, &breakdown, days.len(), timeline.total_days())?;

        tracing::debug!(
            case_id,
            total_days = timeline.total_days(),
            dca = breakdown.dca,
            fedex = breakdown.fedex,
            customer = breakdown.customer,
            "attribution complete"
        );

        Ok(Attribution {
            case_id: case_id.to_string(),
            total_days: timeline.total_days(),
            breakdown,
            rule_version: self.rules.version().to_string(),
            input_digest: input_digest(case, timeline, self.rules.version())?,
            unclassified_breaches,
            evidence_gaps,
            days,
        })
    }
}

/// Post-condition: one record per day and counts summing to the duration.
pub(crate) fn check_reconciliation(
    case_id: &str,
    breakdown: &Breakdown,
    records: usize,
    total_days: u32,
) -> Result<(), EvalError> {
    let attributed = breakdown.total();
    if attributed != u64::from(total_days) || records != total_days as usize {
        tracing::error!(
            case_id,
            attributed,
            records,
            total_days,
            "attribution does not reconcile with case duration"
        );
        return Err(EvalError::AttributionInvariantViolation {
            case_id: case_id.to_string(),
            attributed,
            records,
            total_days,
        });
    }
    Ok(())
}
