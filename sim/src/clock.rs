//! Simulated time

use serde::{Deserialize, Serialize};

/// A point in simulated time, in seconds since run start.
///
/// Wraps `f64` with a total order (`total_cmp`) so timestamps can key the
/// event queue. Times are always finite and non-negative in a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimTime(pub f64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0.0);

    pub fn seconds(self) -> f64 {
        self.0
    }

    /// Offset by `delta` seconds.
    pub fn after(self, delta: f64) -> SimTime {
        SimTime(self.0 + delta)
    }
}

impl Eq for SimTime {}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(SimTime(1.0) < SimTime(2.0));
        assert!(SimTime::ZERO < SimTime(0.5));
        assert_eq!(SimTime(3.0).after(1.5), SimTime(4.5));
    }
}
