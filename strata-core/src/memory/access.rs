//! Access tracking.
//!
//! Keeps a bounded, most-recent-last history of access timestamps per node
//! and turns it into the frequency signals used by ranking and consolidation.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use super::types::{MemoryNode, NodeId};
use crate::utils::elapsed_days;

/// Default number of timestamps retained per node
pub const DEFAULT_HISTORY_CAP: usize = 100;

/// Default access-frequency increment per recorded access
pub const DEFAULT_ACCESS_INCREMENT: f64 = 0.1;

/// Per-node access history
#[derive(Debug, Clone)]
pub struct AccessTracker {
    history: HashMap<NodeId, VecDeque<DateTime<Utc>>>,
    cap: usize,
    increment: f64,
}

impl Default for AccessTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP, DEFAULT_ACCESS_INCREMENT)
    }
}

impl AccessTracker {
    pub fn new(cap: usize, increment: f64) -> Self {
        Self {
            history: HashMap::new(),
            cap: cap.max(1),
            increment,
        }
    }

    /// Start tracking a node with an empty history
    pub fn seed(&mut self, id: &str) {
        self.history.entry(id.to_string()).or_default();
    }

    /// Record an access at `at`, bumping the node's frequency and last-access time
    pub fn record_access(&mut self, node: &mut MemoryNode, at: DateTime<Utc>) {
        let times = self.history.entry(node.id.clone()).or_default();
        times.push_back(at);
        while times.len() > self.cap {
            times.pop_front();
        }

        node.access_frequency += self.increment;
        node.last_accessed = at;
    }

    /// Drop a node's history
    pub fn forget(&mut self, id: &str) {
        self.history.remove(id);
    }

    /// Recorded timestamps, oldest first
    pub fn history(&self, id: &str) -> Vec<DateTime<Utc>> {
        self.history
            .get(id)
            .map(|times| times.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn access_count(&self, id: &str) -> usize {
        self.history.get(id).map_or(0, VecDeque::len)
    }

    /// Accesses inside the trailing `window` divided by the window length in days
    pub fn frequency_over_window(&self, id: &str, window: Duration, now: DateTime<Utc>) -> f64 {
        let days = elapsed_days(now - window, now);
        if days <= 0.0 {
            return 0.0;
        }
        let start = now - window;
        let count = self
            .history
            .get(id)
            .map_or(0, |times| times.iter().filter(|t| **t >= start).count());
        count as f64 / days
    }

    /// Accesses per day from the oldest retained access up to `now`, with the
    /// span floored at one day. Idle time since the last access lowers it.
    pub fn frequency_over_recorded_span(&self, id: &str, now: DateTime<Utc>) -> f64 {
        let Some(times) = self.history.get(id) else {
            return 0.0;
        };
        let Some(first) = times.front() else {
            return 0.0;
        };
        times.len() as f64 / elapsed_days(*first, now).max(1.0)
    }

    /// Replace a node's history, keeping the newest `cap` entries oldest first
    pub fn restore(&mut self, id: &str, mut times: Vec<DateTime<Utc>>) {
        times.sort();
        let excess = times.len().saturating_sub(self.cap);
        self.history
            .insert(id.to_string(), times.into_iter().skip(excess).collect());
    }

    /// Number of nodes with a tracked history
    pub fn tracked(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::{MemoryKind, MemoryLevel};

    #[test]
    fn test_record_access_updates_node() {
        let mut tracker = AccessTracker::default();
        let mut node = MemoryNode::new("x", MemoryLevel::Working, MemoryKind::Fact);
        let at = Utc::now();

        tracker.record_access(&mut node, at);
        tracker.record_access(&mut node, at);

        assert!((node.access_frequency - 0.2).abs() < 1e-9);
        assert_eq!(node.last_accessed, at);
        assert_eq!(tracker.access_count(&node.id), 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = AccessTracker::new(3, 0.1);
        let mut node = MemoryNode::new("x", MemoryLevel::Working, MemoryKind::Fact);
        let start = Utc::now();
        for i in 0..5 {
            tracker.record_access(&mut node, start + Duration::seconds(i));
        }

        let history = tracker.history(&node.id);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], start + Duration::seconds(2));
    }

    #[test]
    fn test_frequency_over_window() {
        let mut tracker = AccessTracker::default();
        let mut node = MemoryNode::new("x", MemoryLevel::Working, MemoryKind::Fact);
        let now = Utc::now();
        tracker.record_access(&mut node, now - Duration::days(10));
        tracker.record_access(&mut node, now - Duration::hours(12));
        tracker.record_access(&mut node, now - Duration::hours(1));

        let freq = tracker.frequency_over_window(&node.id, Duration::days(2), now);
        assert!((freq - 1.0).abs() < 1e-9);
        assert_eq!(tracker.frequency_over_window("unknown", Duration::days(2), now), 0.0);
    }

    #[test]
    fn test_frequency_over_recorded_span() {
        let mut tracker = AccessTracker::default();
        let mut node = MemoryNode::new("x", MemoryLevel::Working, MemoryKind::Fact);
        let now = Utc::now();
        for _ in 0..4 {
            tracker.record_access(&mut node, now - Duration::days(2));
        }
        assert!((tracker.frequency_over_recorded_span(&node.id, now) - 2.0).abs() < 1e-9);

        // The span runs to `now`, so two more idle days halve the rate
        let later = now + Duration::days(2);
        assert!((tracker.frequency_over_recorded_span(&node.id, later) - 1.0).abs() < 1e-9);

        // Spans shorter than a day count as one day
        let mut burst = MemoryNode::new("y", MemoryLevel::Working, MemoryKind::Fact);
        for _ in 0..5 {
            tracker.record_access(&mut burst, now);
        }
        assert!((tracker.frequency_over_recorded_span(&burst.id, now) - 5.0).abs() < 1e-9);

        tracker.seed("fresh");
        assert_eq!(tracker.frequency_over_recorded_span("fresh", now), 0.0);
    }

    #[test]
    fn test_restore_orders_and_caps_history() {
        let mut tracker = AccessTracker::new(2, 0.1);
        let now = Utc::now();
        tracker.restore(
            "x",
            vec![now, now - Duration::days(3), now - Duration::days(1)],
        );

        assert_eq!(tracker.history("x"), vec![now - Duration::days(1), now]);
        assert_eq!(tracker.tracked(), 1);
    }

    #[test]
    fn test_forget_drops_history() {
        let mut tracker = AccessTracker::default();
        let mut node = MemoryNode::new("x", MemoryLevel::Working, MemoryKind::Fact);
        tracker.record_access(&mut node, Utc::now());
        tracker.forget(&node.id);
        assert_eq!(tracker.access_count(&node.id), 0);
        assert_eq!(tracker.tracked(), 0);
    }
}
