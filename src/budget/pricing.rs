//! Per-task cost estimation.
//!
//! Token volume comes from the task's size class, split 70/30 between input
//! and output, and is priced at the selected tier's rates. Rates are quoted in
//! USD per million tokens, which is exactly micro-USD per token.

use serde::{Deserialize, Serialize};

use crate::domain::{MicroUsd, ModelTier, SizeClass, Task};
use crate::scheduler::select_model_tier;

/// Share of a task's tokens billed as input, in percent
pub const INPUT_SHARE_PERCENT: u64 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierRates {
    /// USD per million input tokens
    pub input_per_mtok: f64,
    /// USD per million output tokens
    pub output_per_mtok: f64,
}

impl TierRates {
    pub const fn new(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierPricing {
    pub fast: TierRates,
    pub balanced: TierRates,
    pub capable: TierRates,
}

impl Default for TierPricing {
    fn default() -> Self {
        Self {
            fast: TierRates::new(0.80, 4.0),
            balanced: TierRates::new(3.0, 15.0),
            capable: TierRates::new(15.0, 75.0),
        }
    }
}

impl TierPricing {
    pub fn rates(&self, tier: ModelTier) -> TierRates {
        match tier {
            ModelTier::Fast => self.fast,
            ModelTier::Balanced => self.balanced,
            ModelTier::Capable => self.capable,
        }
    }
}

/// Token volume per size class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffortTokens {
    pub s: u64,
    pub m: u64,
    pub l: u64,
    pub xl: u64,
}

impl Default for EffortTokens {
    fn default() -> Self {
        Self {
            s: 20_000,
            m: 60_000,
            l: 150_000,
            xl: 300_000,
        }
    }
}

impl EffortTokens {
    pub fn for_size(&self, size: SizeClass) -> u64 {
        match size {
            SizeClass::S => self.s,
            SizeClass::M => self.m,
            SizeClass::L => self.l,
            SizeClass::XL => self.xl,
        }
    }
}

/// Pricing section of the configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub tiers: TierPricing,
    pub tokens: EffortTokens,
}

impl PricingConfig {
    /// Estimated cost of a task of `size` run on `tier`.
    pub fn estimate(&self, size: SizeClass, tier: ModelTier) -> MicroUsd {
        let tokens = self.tokens.for_size(size);
        let input = tokens * INPUT_SHARE_PERCENT / 100;
        let output = tokens - input;
        let rates = self.tiers.rates(tier);
        let micro = input as f64 * rates.input_per_mtok + output as f64 * rates.output_per_mtok;
        micro.round().max(0.0) as MicroUsd
    }

    /// Estimated cost of `task` on its auto-selected (or preferred) tier.
    pub fn estimate_task(&self, task: &Task) -> MicroUsd {
        self.estimate(task.size_class(), select_model_tier(task))
    }
}

pub fn usd_to_micro(usd: f64) -> MicroUsd {
    (usd * 1_000_000.0).round().max(0.0) as MicroUsd
}

pub fn micro_to_usd(micro: MicroUsd) -> f64 {
    micro as f64 / 1_000_000.0
}
