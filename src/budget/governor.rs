//! Cumulative spend against a track-level ceiling.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::pricing::{micro_to_usd, usd_to_micro};
use crate::domain::MicroUsd;

/// Percent of the ceiling at which a warning is issued
pub const WARN_PERCENT: u64 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Ok,
    /// At least 80% of the ceiling consumed
    Warning,
    /// Ceiling reached, stop dispatching new work
    Stop,
}

impl BudgetStatus {
    pub fn allows_dispatch(&self) -> bool {
        !matches!(self, BudgetStatus::Stop)
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetStatus::Ok => write!(f, "ok"),
            BudgetStatus::Warning => write!(f, "warning"),
            BudgetStatus::Stop => write!(f, "stop"),
        }
    }
}

/// Tracks spend in micro-USD. A zero ceiling disables the governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetGovernor {
    ceiling: MicroUsd,
    spent: MicroUsd,
}

impl BudgetGovernor {
    pub fn new(ceiling: MicroUsd) -> Self {
        Self { ceiling, spent: 0 }
    }

    pub fn from_usd(ceiling_usd: f64) -> Self {
        Self::new(usd_to_micro(ceiling_usd))
    }

    /// Start from spend already recorded, e.g. in a checkpoint.
    pub fn with_spent(mut self, spent: MicroUsd) -> Self {
        self.spent = spent;
        self
    }

    pub fn ceiling(&self) -> MicroUsd {
        self.ceiling
    }

    pub fn spent(&self) -> MicroUsd {
        self.spent
    }

    pub fn remaining(&self) -> MicroUsd {
        self.ceiling.saturating_sub(self.spent)
    }

    /// Add a completed task's cost and report the resulting status.
    pub fn record(&mut self, cost: MicroUsd) -> BudgetStatus {
        let before = self.status();
        self.spent = self.spent.saturating_add(cost);
        let after = self.status();

        if after != before {
            match after {
                BudgetStatus::Warning => tracing::warn!(
                    spent_usd = micro_to_usd(self.spent),
                    ceiling_usd = micro_to_usd(self.ceiling),
                    "Budget warning threshold reached"
                ),
                BudgetStatus::Stop => tracing::warn!(
                    spent_usd = micro_to_usd(self.spent),
                    ceiling_usd = micro_to_usd(self.ceiling),
                    "Budget exhausted, recommend stopping dispatch"
                ),
                BudgetStatus::Ok => {}
            }
        }
        after
    }

    pub fn status(&self) -> BudgetStatus {
        Self::classify(self.spent, self.ceiling)
    }

    /// Status if `additional` were spent on top of the current total.
    pub fn projected(&self, additional: MicroUsd) -> BudgetStatus {
        Self::classify(self.spent.saturating_add(additional), self.ceiling)
    }

    /// Spent / ceiling, 0.0 when the governor is disabled.
    pub fn fraction_consumed(&self) -> f64 {
        if self.ceiling == 0 {
            return 0.0;
        }
        self.spent as f64 / self.ceiling as f64
    }

    fn classify(spent: MicroUsd, ceiling: MicroUsd) -> BudgetStatus {
        if ceiling == 0 {
            return BudgetStatus::Ok;
        }
        let spent = spent as u128;
        let ceiling = ceiling as u128;
        if spent >= ceiling {
            BudgetStatus::Stop
        } else if spent * 100 >= ceiling * WARN_PERCENT as u128 {
            BudgetStatus::Warning
        } else {
            BudgetStatus::Ok
        }
    }
}
