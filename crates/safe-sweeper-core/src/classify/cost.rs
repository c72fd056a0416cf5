use std::sync::Mutex;
use tracing::{debug, info};

/// Session-scoped usage counters for the escalated classifier. Calls and
/// spend only ever grow within a session; the whole state resets when the
/// governor is dropped at session end.
#[derive(Debug, Clone, Default)]
pub struct CostBudget {
    pub calls_made: u32,
    pub spend_accrued_usd: f64,
    pub reserved_calls: u32,
}

/// Ceilings for one session. `None` means uncapped on that axis.
#[derive(Debug, Clone)]
pub struct CostCeiling {
    pub max_calls: Option<u32>,
    pub max_spend_usd: Option<f64>,
    /// Projected cost of one call, used to check the monetary ceiling at
    /// reservation time, before the real cost is known.
    pub estimated_call_cost_usd: f64,
}

/// Gates escalated-classifier usage. Reservation ("may I attempt this
/// batch") is decoupled from recording ("here is what it actually cost")
/// because advisor cost is only known after the call returns. Both sides
/// take one lock, so concurrent batches see a consistent budget.
pub struct CostGovernor {
    ceiling: CostCeiling,
    budget: Mutex<CostBudget>,
}

impl CostGovernor {
    pub fn new(ceiling: CostCeiling) -> CostGovernor {
        CostGovernor {
            ceiling,
            budget: Mutex::new(CostBudget::default()),
        }
    }

    /// Attempt to reserve capacity for `n` upcoming calls. Succeeds only if
    /// committed plus already-reserved usage would stay inside every
    /// configured ceiling; on refusal nothing is mutated.
    pub fn reserve(&self, n: u32) -> bool {
        let mut budget = self.budget.lock().unwrap();

        if let Some(max_calls) = self.ceiling.max_calls {
            if budget.calls_made + budget.reserved_calls + n > max_calls {
                info!(
                    "escalation budget refused: {} calls made, {} reserved, ceiling {}",
                    budget.calls_made, budget.reserved_calls, max_calls
                );
                return false;
            }
        }

        if let Some(max_spend) = self.ceiling.max_spend_usd {
            let projected = budget.spend_accrued_usd
                + f64::from(budget.reserved_calls + n) * self.ceiling.estimated_call_cost_usd;
            if projected > max_spend {
                info!(
                    "escalation budget refused: projected spend ${:.4} over ceiling ${:.2}",
                    projected, max_spend
                );
                return false;
            }
        }

        budget.reserved_calls += n;
        debug!("reserved {} escalated call(s)", n);
        true
    }

    /// Commit actual usage after a batch completes. Frees the committed
    /// calls from the pending reservation.
    pub fn record(&self, calls: u32, cost_usd: f64) {
        let mut budget = self.budget.lock().unwrap();
        budget.calls_made += calls;
        budget.spend_accrued_usd += cost_usd;
        budget.reserved_calls = budget.reserved_calls.saturating_sub(calls);
        debug!(
            "recorded {} call(s) at ${:.4}; session total {} calls, ${:.4}",
            calls, cost_usd, budget.calls_made, budget.spend_accrued_usd
        );
    }

    /// Free a reservation that was never used (failed batch, or actual calls
    /// below the reserved count). Without this, refused batches would leak
    /// capacity for the rest of the session.
    pub fn release(&self, n: u32) {
        let mut budget = self.budget.lock().unwrap();
        budget.reserved_calls = budget.reserved_calls.saturating_sub(n);
    }

    pub fn snapshot(&self) -> CostBudget {
        self.budget.lock().unwrap().clone()
    }
}
