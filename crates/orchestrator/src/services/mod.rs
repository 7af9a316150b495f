//! Collaborator service traits with HTTP and in-memory implementations.

pub mod inventory;
pub mod pricing;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

pub use inventory::{HttpInventoryService, InMemoryInventoryService, InventoryService};
pub use pricing::{HttpPricingService, InMemoryPricingService, PricingService};

/// Builds the HTTP client shared by the collaborator clients.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

fn trim_base_url(url: impl Into<String>) -> String {
    let mut url = url.into();
    while url.ends_with('/') {
        url.pop();
    }
    url
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct CallCounters {
    started: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Counts calls made to in-memory collaborators.
///
/// One tracker can be shared by several services to observe how many calls
/// overlap across all of them.
#[derive(Debug, Clone, Default)]
pub struct CallTracker {
    counters: Arc<CallCounters>,
}

impl CallTracker {
    /// Creates a tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a call; the call ends when the guard drops.
    pub fn enter(&self) -> CallGuard {
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        CallGuard {
            tracker: self.clone(),
        }
    }

    /// Number of calls started.
    pub fn started(&self) -> usize {
        self.counters.started.load(Ordering::SeqCst)
    }

    /// Number of calls that ran to completion or were dropped.
    pub fn completed(&self) -> usize {
        self.counters.completed.load(Ordering::SeqCst)
    }

    /// Number of calls currently running.
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Guard returned by [`CallTracker::enter`].
#[derive(Debug)]
pub struct CallGuard {
    tracker: CallTracker,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.tracker.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.tracker.counters.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_overlap() {
        let tracker = CallTracker::new();
        let a = tracker.enter();
        let b = tracker.enter();
        assert_eq!(tracker.in_flight(), 2);

        drop(a);
        let c = tracker.enter();
        drop(b);
        drop(c);

        assert_eq!(tracker.started(), 3);
        assert_eq!(tracker.completed(), 3);
        assert_eq!(tracker.in_flight(), 0);
        assert_eq!(tracker.peak_in_flight(), 2);
    }

    #[test]
    fn test_trim_base_url() {
        assert_eq!(trim_base_url("http://inventory:8081/"), "http://inventory:8081");
        assert_eq!(trim_base_url("http://pricing"), "http://pricing");
    }
}
