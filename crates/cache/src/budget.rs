//! Budget accounting for the resource cache
//!
//! Tracks how much GPU memory and how many resources currently count against
//! the cache's ceilings, and classifies the result into pressure levels that
//! drive eviction. Only budgeted (`Cached`) resources are accounted here;
//! wrapped and uncached resources pass through untracked.
//!
//! The cache is single-threaded per instance, so this ledger is plain fields
//! mutated behind `&mut ResourceCache` — no atomics, no locking.

/// Budget pressure level derived from byte utilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BudgetPressure {
    /// Under 50% of the byte ceiling
    Low,
    /// 50–75%
    Moderate,
    /// 75–90%
    High,
    /// Over 90%
    Critical,
}

impl BudgetPressure {
    /// Classify a utilization ratio (0.0 to 1.0).
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization < 0.5 {
            BudgetPressure::Low
        } else if utilization < 0.75 {
            BudgetPressure::Moderate
        } else if utilization < 0.90 {
            BudgetPressure::High
        } else {
            BudgetPressure::Critical
        }
    }

    /// Returns true if the level calls for eviction (High or Critical).
    pub fn needs_eviction(&self) -> bool {
        matches!(self, BudgetPressure::High | BudgetPressure::Critical)
    }
}

/// Ledger of budgeted resources against configured ceilings
#[derive(Debug, Clone)]
pub struct CacheBudget {
    max_bytes: usize,
    max_count: usize,
    budgeted_bytes: usize,
    budgeted_count: usize,
}

impl CacheBudget {
    /// Create a ledger with the given byte and resource-count ceilings.
    pub fn new(max_bytes: usize, max_count: usize) -> Self {
        Self {
            max_bytes,
            max_count,
            budgeted_bytes: 0,
            budgeted_count: 0,
        }
    }

    /// Byte ceiling.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Resource-count ceiling.
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Bytes currently counted against the budget.
    pub fn budgeted_bytes(&self) -> usize {
        self.budgeted_bytes
    }

    /// Resources currently counted against the budget.
    pub fn budgeted_count(&self) -> usize {
        self.budgeted_count
    }

    /// Account a resource entering the budget (created budgeted, made
    /// budgeted, or keyed).
    pub fn add(&mut self, bytes: usize) {
        self.budgeted_bytes = self.budgeted_bytes.saturating_add(bytes);
        self.budgeted_count += 1;
    }

    /// Account a resource leaving the budget (made unbudgeted or evicted).
    pub fn remove(&mut self, bytes: usize) {
        self.budgeted_bytes = self.budgeted_bytes.saturating_sub(bytes);
        self.budgeted_count = self.budgeted_count.saturating_sub(1);
    }

    /// Current byte utilization (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        if self.max_bytes == 0 {
            0.0
        } else {
            self.budgeted_bytes as f64 / self.max_bytes as f64
        }
    }

    /// Current pressure level.
    pub fn pressure(&self) -> BudgetPressure {
        BudgetPressure::from_utilization(self.utilization())
    }

    /// Is either ceiling currently exceeded?
    pub fn over_budget(&self) -> bool {
        self.budgeted_bytes > self.max_bytes || self.budgeted_count > self.max_count
    }

    /// Would adding a resource of `bytes` exceed either ceiling?
    pub fn would_exceed(&self, bytes: usize) -> bool {
        self.budgeted_bytes.saturating_add(bytes) > self.max_bytes
            || self.budgeted_count + 1 > self.max_count
    }

    /// Bytes that must leave the budget to get back under the byte ceiling.
    ///
    /// Zero when already within budget.
    pub fn bytes_to_evict(&self) -> usize {
        self.budgeted_bytes.saturating_sub(self.max_bytes)
    }

    /// Replace the ceilings. Callers are expected to purge afterwards if the
    /// new ceilings are now exceeded.
    pub fn set_limits(&mut self, max_bytes: usize, max_count: usize) {
        self.max_bytes = max_bytes;
        self.max_count = max_count;
    }
}
