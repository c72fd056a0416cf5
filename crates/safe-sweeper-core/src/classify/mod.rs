pub mod cost;
pub mod escalate;
pub mod plan;
pub mod rules;

use crate::config::AdvisorConfig;
use crate::model::{CandidateItem, ClassificationVerdict};
use cost::{CostCeiling, CostGovernor};
use escalate::{AdvisorClient, Escalator};
use rules::RuleClassifier;
use tracing::info;

pub fn governor_for(config: &AdvisorConfig) -> CostGovernor {
    CostGovernor::new(CostCeiling {
        max_calls: config.max_calls_per_session,
        max_spend_usd: config.max_spend_per_session_usd,
        estimated_call_cost_usd: config.estimated_call_cost_usd,
    })
}

/// Full classification pipeline: free rule tier over every candidate, then
/// budgeted escalation of the uncertain middle tier when an advisor is
/// available. With no advisor the output is exactly the rule verdicts.
pub fn classify_candidates(
    candidates: &[CandidateItem],
    classifier: &RuleClassifier,
    advisor: Option<&dyn AdvisorClient>,
    governor: &CostGovernor,
    batch_size: usize,
) -> Vec<ClassificationVerdict> {
    let rule_verdicts: Vec<ClassificationVerdict> =
        candidates.iter().map(|c| classifier.classify(c)).collect();
    info!("rule tier classified {} candidates", rule_verdicts.len());

    match advisor {
        Some(advisor) => {
            Escalator::new(advisor, governor, batch_size).classify_all(rule_verdicts)
        }
        None => rule_verdicts,
    }
}
