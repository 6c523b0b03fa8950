//! Budget Arbiter (C7): a single mutex-serialised global article counter shared
//! across all per-site tasks in one coordinator run.

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetSnapshot {
    pub remaining: Option<usize>,
    pub unbounded: bool,
}

pub struct BudgetArbiter {
    global_remaining: Mutex<Option<usize>>,
}

impl BudgetArbiter {
    /// Starts at `global_target`, or unbounded (`None`) when no target is given.
    pub fn new(global_target: Option<usize>) -> Self {
        BudgetArbiter {
            global_remaining: Mutex::new(global_target),
        }
    }

    /// Grants up to `requested`, never more than what remains. Returns 0 when the
    /// budget is already exhausted — callers should treat that as "retry later."
    pub async fn reserve(&self, requested: usize) -> usize {
        let mut remaining = self.global_remaining.lock().await;
        match *remaining {
            None => requested,
            Some(r) if r >= requested => {
                *remaining = Some(r - requested);
                requested
            }
            Some(r) => {
                *remaining = Some(0);
                r
            }
        }
    }

    /// Returns `n` previously reserved units back to the pool, e.g. on shortfall.
    pub async fn restore(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut remaining = self.global_remaining.lock().await;
        if let Some(r) = *remaining {
            *remaining = Some(r + n);
        }
    }

    /// Legacy path for sites that consume budget without reserving it up front.
    /// Kept for API completeness; the per-site loop always reserves first, so this
    /// never actually fires in practice.
    pub async fn consume_outside_reservation(&self, n: usize) {
        let mut remaining = self.global_remaining.lock().await;
        if let Some(r) = *remaining {
            *remaining = Some(r.saturating_sub(n));
        }
    }

    pub async fn snapshot(&self) -> BudgetSnapshot {
        let remaining = *self.global_remaining.lock().await;
        BudgetSnapshot {
            remaining,
            unbounded: remaining.is_none(),
        }
    }

    pub async fn is_exhausted(&self) -> bool {
        matches!(*self.global_remaining.lock().await, Some(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_grants_at_most_remaining() {
        let arbiter = BudgetArbiter::new(Some(5));
        assert_eq!(arbiter.reserve(3).await, 3);
        assert_eq!(arbiter.reserve(10).await, 2);
        assert_eq!(arbiter.reserve(1).await, 0);
    }

    #[tokio::test]
    async fn unbounded_grants_whatever_is_requested() {
        let arbiter = BudgetArbiter::new(None);
        assert_eq!(arbiter.reserve(1_000).await, 1_000);
        let snapshot = arbiter.snapshot().await;
        assert!(snapshot.unbounded);
    }

    #[tokio::test]
    async fn restore_returns_units_to_the_pool() {
        let arbiter = BudgetArbiter::new(Some(5));
        assert_eq!(arbiter.reserve(5).await, 5);
        arbiter.restore(2).await;
        assert_eq!(arbiter.reserve(2).await, 2);
    }

    #[tokio::test]
    async fn remaining_never_goes_negative() {
        let arbiter = BudgetArbiter::new(Some(2));
        arbiter.consume_outside_reservation(10).await;
        let snapshot = arbiter.snapshot().await;
        assert_eq!(snapshot.remaining, Some(0));
    }
}
