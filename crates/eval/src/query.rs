//! Read-only query facade over a case store.
//!
//! Every call re-reads the stored record and recomputes from scratch; the
//! facade holds no caches, so answers always reflect the current ledger and
//! the engine's rule table.

use std::sync::Arc;

use serde::Serialize;
use trace_storage::CaseStore;

use crate::attribution::{Attribution, AttributionEngine};
use crate::error::EvalError;
use crate::explain::{synthesize, Explanation};
use crate::normalize::normalize_case;
use crate::types::{Case, LedgerEvent, Timeline};

/// A case header with its canonical, day-ordered ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseView {
    pub case: Case,
    pub ledger: Vec<LedgerEvent>,
}

/// The three case queries, over an injected store and engine.
pub struct CaseQueries<S: CaseStore> {
    store: Arc<S>,
    engine: AttributionEngine,
}

impl<S: CaseStore> Clone for CaseQueries<S> {
    fn clone(&self) -> Self {
        CaseQueries {
            store: Arc::clone(&self.store),
            engine: self.engine.clone(),
        }
    }
}

impl<S: CaseStore> CaseQueries<S> {
    pub fn new(store: Arc<S>, engine: AttributionEngine) -> Self {
        CaseQueries { store, engine }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &AttributionEngine {
        &self.engine
    }

    /// Case header and ordered ledger.
    pub async fn get_case(&self, case_id: &str) -> Result<CaseView, EvalError> {
        let (case, timeline) = self.load(case_id).await?;
        Ok(CaseView {
            case,
            ledger: timeline.events().to_vec(),
        })
    }

    /// Day-by-day responsibility breakdown.
    pub async fn get_responsibility(&self, case_id: &str) -> Result<Attribution, EvalError> {
        let (case, timeline) = self.load(case_id).await?;
        self.engine.attribute(&case, &timeline)
    }

    /// Audit narrative and primary cause.
    pub async fn get_explanation(&self, case_id: &str) -> Result<Explanation, EvalError> {
        let (case, timeline) = self.load(case_id).await?;
        let attribution = self.engine.attribute(&case, &timeline)?;
        Ok(synthesize(&case, &timeline, &attribution))
    }

    async fn load(&self, case_id: &str) -> Result<(Case, Timeline), EvalError> {
        let record = self.store.get_case(case_id).await?;
        tracing::debug!(case_id, events = record.ledger.len(), "loaded case record");
        normalize_case(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sla::SlaRuleTable;
    use rust_decimal::Decimal;
    use trace_storage::{CaseRecord, LedgerEventRecord, MemoryCaseStore};

    fn record(case_id: &str, ledger: Vec<LedgerEventRecord>) -> CaseRecord {
        CaseRecord {
            case_id: case_id.to_string(),
            amount: Decimal::new(99_00, 2),
            assigned_dca: "Apex Recovery".to_string(),
            status: "open".to_string(),
            ledger,
        }
    }

    fn ev(day: i64, actor: &str) -> LedgerEventRecord {
        LedgerEventRecord {
            day,
            actor: actor.to_string(),
            action: "worked the case".to_string(),
            has_evidence: true,
            breach: false,
            action_type: None,
        }
    }

    fn queries(records: Vec<CaseRecord>) -> CaseQueries<MemoryCaseStore> {
        let store: MemoryCaseStore = records.into_iter().collect();
        let engine = AttributionEngine::new(Arc::new(SlaRuleTable::builtin().unwrap()));
        CaseQueries::new(Arc::new(store), engine)
    }

    #[tokio::test]
    async fn get_case_returns_sorted_ledger() {
        let q = queries(vec![record("Q-1", vec![ev(2, "FedEx"), ev(1, "DCA")])]);
        let view = q.get_case("Q-1").await.unwrap();
        assert_eq!(view.case.case_id, "Q-1");
        let days: Vec<u32> = view.ledger.iter().map(|e| e.day).collect();
        assert_eq!(days, vec![1, 2]);
    }

    #[tokio::test]
    async fn unknown_case_is_not_found_for_every_query() {
        let q = queries(vec![]);
        assert!(matches!(
            q.get_case("nope").await,
            Err(EvalError::CaseNotFound { .. })
        ));
        assert!(matches!(
            q.get_responsibility("nope").await,
            Err(EvalError::CaseNotFound { .. })
        ));
        assert!(matches!(
            q.get_explanation("nope").await,
            Err(EvalError::CaseNotFound { case_id }) if case_id == "nope"
        ));
    }

    #[tokio::test]
    async fn responsibility_and_explanation_agree() {
        let q = queries(vec![record(
            "Q-2",
            vec![ev(1, "DCA"), ev(2, "Customer"), ev(3, "Customer")],
        )]);
        let attribution = q.get_responsibility("Q-2").await.unwrap();
        let explanation = q.get_explanation("Q-2").await.unwrap();
        assert_eq!(attribution.breakdown.customer, 2);
        assert_eq!(explanation.primary_cause.days, 2);
        assert_eq!(explanation.input_digest, attribution.input_digest);
    }

    #[tokio::test]
    async fn malformed_ledger_surfaces_through_queries() {
        let q = queries(vec![record("Q-3", vec![ev(1, "DCA"), ev(3, "DCA")])]);
        assert!(matches!(
            q.get_responsibility("Q-3").await,
            Err(EvalError::MalformedLedger { .. })
        ));
    }
}
