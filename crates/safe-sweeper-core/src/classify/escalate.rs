use crate::classify::cost::CostGovernor;
use crate::error::ClassificationFailure;
use crate::model::{ClassificationVerdict, ItemKind, RiskTier, VerdictSource};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const MAX_RATIONALE_WORDS: usize = 50;

/// One item as submitted to the advisor: just enough already-collected
/// metadata to judge it, never file contents.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub path: String,
    pub size: u64,
    pub kind: ItemKind,
    pub tier: RiskTier,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewRequest {
    pub items: Vec<ReviewItem>,
}

/// Advisor answer for one item, parallel to the request list.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorVerdict {
    pub path: String,
    pub tier: RiskTier,
    pub rationale: String,
    pub confidence: f64,
    #[serde(default)]
    pub estimated_bytes_freed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ReviewResponse {
    pub verdicts: Vec<AdvisorVerdict>,
    pub cost_usd: f64,
}

/// Transport seam for the escalated classifier. The HTTP implementation
/// lives in the CLI; tests script their own.
pub trait AdvisorClient {
    fn review(&self, request: &ReviewRequest) -> Result<ReviewResponse, ClassificationFailure>;
}

/// Escalated classification over rule verdicts. Only the uncertain middle
/// tier is ever submitted; confident rule verdicts are not re-litigated.
/// Every failure path degrades to the rule verdicts for that batch alone.
pub struct Escalator<'a> {
    advisor: &'a dyn AdvisorClient,
    governor: &'a CostGovernor,
    batch_size: usize,
}

impl<'a> Escalator<'a> {
    pub fn new(
        advisor: &'a dyn AdvisorClient,
        governor: &'a CostGovernor,
        batch_size: usize,
    ) -> Escalator<'a> {
        Escalator {
            advisor,
            governor,
            batch_size: batch_size.max(1),
        }
    }

    /// Run escalation over a full set of rule verdicts, returning final
    /// verdicts in the original order. A batch that cannot be escalated —
    /// refused budget, transport failure, bad response — keeps its rule
    /// verdicts, indistinguishable from never having been escalated.
    pub fn classify_all(
        &self,
        verdicts: Vec<ClassificationVerdict>,
    ) -> Vec<ClassificationVerdict> {
        let eligible_indices: Vec<usize> = verdicts
            .iter()
            .enumerate()
            .filter(|(_, v)| v.tier == RiskTier::Suspicious)
            .map(|(i, _)| i)
            .collect();

        if eligible_indices.is_empty() {
            return verdicts;
        }

        let mut finals = verdicts;
        for chunk in eligible_indices.chunks(self.batch_size) {
            self.escalate_chunk(chunk, &mut finals);
        }
        finals
    }

    /// Escalate one batch in place. One batch is one advisor call.
    fn escalate_chunk(&self, indices: &[usize], verdicts: &mut [ClassificationVerdict]) {
        if !self.governor.reserve(1) {
            debug!(
                "budget refused for batch of {}; keeping rule verdicts",
                indices.len()
            );
            return;
        }

        let request = ReviewRequest {
            items: indices
                .iter()
                .map(|&i| {
                    let v = &verdicts[i];
                    ReviewItem {
                        path: v.item.path.to_string_lossy().into_owned(),
                        size: v.item.size,
                        kind: v.item.kind,
                        tier: v.tier,
                    }
                })
                .collect(),
        };

        let response = match self.advisor.review(&request) {
            Ok(response) => response,
            Err(failure) => {
                warn!(
                    "advisor batch of {} failed ({}); keeping rule verdicts",
                    indices.len(),
                    failure
                );
                self.governor.release(1);
                return;
            }
        };

        let by_path: AHashMap<&str, &AdvisorVerdict> = response
            .verdicts
            .iter()
            .map(|v| (v.path.as_str(), v))
            .collect();

        // The response must be parallel to the request: a missing item means
        // the whole batch is untrustworthy.
        let missing = request
            .items
            .iter()
            .find(|item| !by_path.contains_key(item.path.as_str()));
        if let Some(item) = missing {
            warn!(
                "advisor response missing verdict for {}; keeping rule verdicts for batch",
                item.path
            );
            self.governor.release(1);
            return;
        }

        for &i in indices {
            let path = verdicts[i].item.path.to_string_lossy().into_owned();
            if let Some(advisor_verdict) = by_path.get(path.as_str()) {
                verdicts[i].tier = advisor_verdict.tier;
                verdicts[i].rationale =
                    truncate_words(&advisor_verdict.rationale, MAX_RATIONALE_WORDS);
                verdicts[i].confidence = advisor_verdict.confidence.clamp(0.0, 1.0);
                verdicts[i].source = VerdictSource::Escalated;
            }
        }

        self.governor.record(1, response.cost_usd);
        info!(
            "escalated batch of {} at ${:.4}",
            indices.len(),
            response.cost_usd
        );
    }
}

fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        text.trim().to_string()
    } else {
        words[..max_words].join(" ")
    }
}
