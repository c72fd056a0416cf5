use crate::model::{ClassificationVerdict, RiskTier};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

/// An immutable, analyzed batch ready for execution. Membership is frozen at
/// creation; execution produces derived records and never touches the plan.
#[derive(Debug, Clone)]
pub struct CleanupPlan {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub scan_descriptor: String,
    pub items: Vec<ClassificationVerdict>,
}

impl CleanupPlan {
    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|v| v.item.size).sum()
    }

    pub fn count_for(&self, tier: RiskTier) -> usize {
        self.items.iter().filter(|v| v.tier == tier).count()
    }

    pub fn bytes_for(&self, tier: RiskTier) -> u64 {
        self.items
            .iter()
            .filter(|v| v.tier == tier)
            .map(|v| v.item.size)
            .sum()
    }

    pub fn items_for(&self, tier: RiskTier) -> Vec<&ClassificationVerdict> {
        self.items.iter().filter(|v| v.tier == tier).collect()
    }
}

/// Build a plan from final verdicts. Deterministic given its input and
/// stateless across calls; only the id and timestamp vary between runs.
pub fn build_plan(verdicts: Vec<ClassificationVerdict>, scan_descriptor: &str) -> CleanupPlan {
    let plan = CleanupPlan {
        id: Uuid::new_v4().to_string(),
        created_at: Utc::now(),
        scan_descriptor: scan_descriptor.to_string(),
        items: verdicts,
    };
    info!(
        "Plan {}: {} items ({} safe / {} suspicious / {} dangerous), {} bytes",
        plan.id,
        plan.total_items(),
        plan.count_for(RiskTier::Safe),
        plan.count_for(RiskTier::Suspicious),
        plan.count_for(RiskTier::Dangerous),
        plan.total_bytes(),
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CandidateItem, ItemKind, VerdictSource};
    use std::path::PathBuf;

    fn verdict(path: &str, size: u64, tier: RiskTier) -> ClassificationVerdict {
        ClassificationVerdict {
            item: CandidateItem {
                path: PathBuf::from(path),
                size,
                kind: ItemKind::File,
                last_modified: None,
                risk_hint: None,
            },
            rule_tier: tier,
            tier,
            rationale: "test".into(),
            confidence: 1.0,
            source: VerdictSource::Rule,
        }
    }

    #[test]
    fn test_partition_counts_and_bytes() {
        let plan = build_plan(
            vec![
                verdict("/a", 10, RiskTier::Safe),
                verdict("/b", 20, RiskTier::Safe),
                verdict("/c", 30, RiskTier::Suspicious),
                verdict("/d", 40, RiskTier::Dangerous),
            ],
            "test scan",
        );

        assert_eq!(plan.total_items(), 4);
        assert_eq!(plan.total_bytes(), 100);
        assert_eq!(plan.count_for(RiskTier::Safe), 2);
        assert_eq!(plan.bytes_for(RiskTier::Safe), 30);
        assert_eq!(plan.count_for(RiskTier::Suspicious), 1);
        assert_eq!(plan.bytes_for(RiskTier::Dangerous), 40);
    }

    #[test]
    fn test_plans_get_distinct_ids() {
        let a = build_plan(vec![], "scan");
        let b = build_plan(vec![], "scan");
        assert_ne!(a.id, b.id);
    }
}
