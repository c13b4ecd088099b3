//! Iteration and time budgets for a single run.

use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};

/// Monotonic LLM round-trip counter bounded by `max_iterations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationBudget {
    used: u32,
    max: u32,
}

impl IterationBudget {
    pub fn new(max: u32) -> Self {
        Self { used: 0, max }
    }

    pub fn has_remaining(&self) -> bool {
        self.used < self.max
    }

    /// Record one round-trip. Never moves past `max`.
    pub fn consume(&mut self) {
        if self.used < self.max {
            self.used += 1;
        }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

/// Return the remaining time budget until the provided deadline.
pub fn remaining_budget(deadline: Instant) -> Result<Duration> {
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or(Duration::from_secs(0));
    if remaining.is_zero() {
        return Err(anyhow!("run deadline exceeded"));
    }
    Ok(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_stops_at_max() {
        let mut budget = IterationBudget::new(2);
        assert!(budget.has_remaining());
        budget.consume();
        budget.consume();
        assert!(!budget.has_remaining());
        budget.consume();
        assert_eq!(budget.used(), 2);
    }

    #[test]
    fn zero_budget_has_nothing_remaining() {
        assert!(!IterationBudget::new(0).has_remaining());
    }

    #[test]
    fn past_deadline_is_an_error() {
        let err = remaining_budget(Instant::now()).unwrap_err();
        assert!(err.to_string().contains("deadline"));
        assert!(remaining_budget(Instant::now() + Duration::from_secs(60)).is_ok());
    }
}
