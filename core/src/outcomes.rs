//! Bounded window of recent call outcomes

use std::collections::VecDeque;

/// Fixed-capacity FIFO of call outcomes (`true` = success)
///
/// Pushing into a full window evicts the oldest outcome. The window feeds
/// diagnostics only; trip decisions never read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeWindow {
    outcomes: VecDeque<bool>,
    capacity: usize,
}

impl OutcomeWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, success: bool) {
        if self.capacity == 0 {
            return;
        }
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.outcomes.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.outcomes.clear();
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|ok| !**ok).count()
    }

    /// Fraction of failures in the window (0.0 when empty)
    pub fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            self.failures() as f64 / self.outcomes.len() as f64
        }
    }

    /// Outcomes from oldest to newest
    pub fn to_vec(&self) -> Vec<bool> {
        self.outcomes.iter().copied().collect()
    }
}
