//! Cost estimation and budget accounting.
//!
//! - **pricing**: per-task estimate from size class and model tier
//! - **governor**: cumulative spend against a ceiling (warn at 80%, stop at 100%)

pub mod governor;
pub mod pricing;

pub use governor::{BudgetGovernor, BudgetStatus, WARN_PERCENT};
pub use pricing::{EffortTokens, PricingConfig, TierPricing, TierRates, micro_to_usd, usd_to_micro};
