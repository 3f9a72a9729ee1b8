//! Deterministic case explanations.
//!
//! The narrative is assembled from a closed set of templates, one per
//! primary-cause actor, plus fixed supplementary sentences. Inputs are
//! integers, identifiers, ledger action text, rule-table strings and the
//! case amount rendered at two decimal places. There is no clock, randomness
//! or locale-sensitive formatting, so the same case, ledger and rule table
//! always produce byte-identical text.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::attribution::{Attribution, Breakdown};
use crate::provenance::AttributionBasis;
use crate::types::{Actor, Case, Timeline};

/// The actor attributed the most days, with the figures behind the choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryCause {
    pub actor: Actor,
    pub days: u32,
    pub total_days: u32,
    pub breach_count: u32,
}

/// An audit explanation for one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub case_id: String,
    #[serde(rename = "explanation")]
    pub text: String,
    pub primary_cause: PrimaryCause,
    pub rule_version: String,
    pub input_digest: String,
}

/// Pick the actor with the strictly largest day count.
///
/// Ties go to the earlier actor in `Actor::PRIORITY` (FedEx, DCA, Customer).
pub fn primary_cause(breakdown: &Breakdown) -> Actor {
    let mut best = Actor::PRIORITY[0];
    for actor in Actor::PRIORITY.into_iter().skip(1) {
        if breakdown.get(actor) > breakdown.get(best) {
            best = actor;
        }
    }
    best
}

/// Closed set of primary-cause sentences, one variant per actor.
enum NarrativeTemplate<'a> {
    Carrier { cause: &'a PrimaryCause },
    Agency { cause: &'a PrimaryCause, agency: &'a str },
    Customer { cause: &'a PrimaryCause },
}

impl<'a> NarrativeTemplate<'a> {
    fn select(cause: &'a PrimaryCause, case: &'a Case) -> Self {
        match cause.actor {
            Actor::FedEx => NarrativeTemplate::Carrier { cause },
            Actor::Dca => NarrativeTemplate::Agency {
                cause,
                agency: &case.assigned_dca,
            },
            Actor::Customer => NarrativeTemplate::Customer { cause },
        }
    }

    fn render(&self) -> String {
        match self {
            NarrativeTemplate::Carrier { cause } => format!(
                "Primary cause: FedEx. The carrier is responsible for {} of {} of delay, {}.",
                cause.days,
                plural_days(cause.total_days),
                breach_clause(cause.breach_count)
            ),
            NarrativeTemplate::Agency { cause, agency } => format!(
                "Primary cause: DCA. The collection agency {} is responsible for {} of {} of delay, {}.",
                agency,
                cause.days,
                plural_days(cause.total_days),
                breach_clause(cause.breach_count)
            ),
            NarrativeTemplate::Customer { cause } => format!(
                "Primary cause: Customer. The case waited on the customer for {} of {}, {}.",
                cause.days,
                plural_days(cause.total_days),
                breach_clause(cause.breach_count)
            ),
        }
    }
}

/// Build the explanation for a case from its timeline and attribution.
pub fn synthesize(case: &Case, timeline: &Timeline, attribution: &Attribution) -> Explanation {
    let actor = primary_cause(&attribution.breakdown);
    let cause = PrimaryCause {
        actor,
        days: attribution.breakdown.get(actor),
        total_days: timeline.total_days(),
        breach_count: attribution.breaches_attributed_to(actor),
    };

    let mut sentences = vec![
        format!(
            "Case {} ({}, ${} at stake) spans {}.",
            case.case_id,
            case.status,
            amount_text(case.amount),
            plural_days(timeline.total_days())
        ),
        NarrativeTemplate::select(&cause, case).render(),
        breach_summary(timeline, attribution),
        agency_activity(case, timeline),
    ];

    if let Some(&first_gap) = attribution.evidence_gaps.first() {
        let mut sentence = format!(
            "Evidence missing on {}.",
            day_list(&attribution.evidence_gaps)
        );
        if let Some(event) = timeline.event_on(first_gap) {
            sentence.push_str(&format!(
                " Critical evidence gap on day {}: {}.",
                first_gap,
                event.action.trim_end_matches('.')
            ));
        }
        sentences.push(sentence);
    }

    if !attribution.unclassified_breaches.is_empty() {
        sentences.push(format!(
            "Breaches on {} match no SLA rule and stay with the acting party.",
            day_list(&attribution.unclassified_breaches)
        ));
    }

    let counts: Vec<String> = Actor::PRIORITY
        .iter()
        .map(|a| format!("{} {}", a, attribution.breakdown.get(*a)))
        .collect();
    sentences.push(format!(
        "Day attribution: {} of {} (rules {}).",
        counts.join(", "),
        timeline.total_days(),
        attribution.rule_version
    ));

    Explanation {
        case_id: case.case_id.clone(),
        text: sentences.join(" "),
        primary_cause: cause,
        rule_version: attribution.rule_version.clone(),
        input_digest: attribution.input_digest.clone(),
    }
}

/// One clause per breached rule, in rule-table key order, quoting the
/// action logged on the first breached day.
fn breach_summary(timeline: &Timeline, attribution: &Attribution) -> String {
    let mut by_rule: BTreeMap<(Actor, &str), (u32, Vec<u32>)> = BTreeMap::new();
    for day in &attribution.days {
        if let AttributionBasis::SlaBreach {
            action_type,
            owed_by,
            max_days,
        } = &day.basis
        {
            by_rule
                .entry((*owed_by, action_type.as_str()))
                .or_insert_with(|| (*max_days, Vec::new()))
                .1
                .push(day.day);
        }
    }

    if by_rule.is_empty() {
        return "No classified SLA breaches were recorded.".to_string();
    }

    let clauses: Vec<String> = by_rule
        .iter()
        .map(|((owed_by, action_type), (max_days, days))| {
            let mut clause = format!(
                "{} owed by {} ({}-day limit) on {}",
                action_type,
                owed_by,
                max_days,
                day_list(days)
            );
            let logged = days.first().and_then(|&d| timeline.event_on(d));
            if let Some(event) = logged {
                clause.push_str(&format!(", first logged as \"{}\"", event.action));
            }
            clause
        })
        .collect();
    format!("SLA breaches: {}.", clauses.join("; "))
}

/// Documented agency work: DCA days with evidence and no breach.
fn agency_activity(case: &Case, timeline: &Timeline) -> String {
    let completed = timeline
        .events()
        .iter()
        .filter(|e| e.actor == Actor::Dca && e.has_evidence && !e.breach)
        .count();
    let noun = if completed == 1 { "action" } else { "actions" };
    format!(
        "Of {}, DCA {} completed {} documented {}.",
        plural_days(timeline.total_days()),
        case.assigned_dca,
        completed,
        noun
    )
}

/// Currency amount at exactly two decimal places, no grouping separators.
fn amount_text(amount: Decimal) -> String {
    let mut amount = amount;
    amount.rescale(2);
    amount.to_string()
}

fn plural_days(n: u32) -> String {
    if n == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", n)
    }
}

fn breach_clause(count: u32) -> String {
    match count {
        0 => "with no SLA breach days".to_string(),
        1 => "1 of them an SLA breach day".to_string(),
        n => format!("{} of them SLA breach days", n),
    }
}

/// `day 15` or `days 4-9, 12` for ascending day numbers.
fn day_list(days: &[u32]) -> String {
    let noun = if days.len() == 1 { "day" } else { "days" };
    format!("{} {}", noun, day_ranges(days))
}

/// Compact ascending day numbers into ranges: `[4,5,6,9]` -> `4-6, 9`.
fn day_ranges(days: &[u32]) -> String {
    let mut parts = Vec::new();
    let mut iter = days.iter().copied();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let (mut start, mut end) = (first, first);
    for day in iter {
        if day == end + 1 {
            end = day;
        } else {
            parts.push(range_text(start, end));
            start = day;
            end = day;
        }
    }
    parts.push(range_text(start, end));
    parts.join(", ")
}

fn range_text(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}
