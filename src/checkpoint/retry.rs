//! Bounded retry governance.

use serde::Serialize;

/// Hard ceiling on retry attempts per task
pub const MAX_RETRIES: u32 = 3;

/// Outcome of asking to retry a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RetryDecision {
    /// Retry accepted; `attempt` is the new count (1..=3)
    Allowed { attempt: u32 },
    /// Ceiling reached, the task needs manual intervention
    Refused { attempts: u32 },
}

impl RetryDecision {
    /// Decide given the attempts already recorded.
    pub fn for_count(recorded: u32) -> Self {
        if recorded >= MAX_RETRIES {
            RetryDecision::Refused { attempts: recorded }
        } else {
            RetryDecision::Allowed { attempt: recorded + 1 }
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, RetryDecision::Allowed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_until_ceiling() {
        assert_eq!(RetryDecision::for_count(0), RetryDecision::Allowed { attempt: 1 });
        assert_eq!(RetryDecision::for_count(2), RetryDecision::Allowed { attempt: 3 });
        assert_eq!(RetryDecision::for_count(3), RetryDecision::Refused { attempts: 3 });
        assert!(!RetryDecision::for_count(7).is_allowed());
    }
}
