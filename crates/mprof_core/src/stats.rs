//! Per-method duration accumulation

use ahash::AHashMap;
use std::time::Duration;

use crate::identity::MethodIdentity;

/// Finalized statistics for one method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodStats {
    pub identity: MethodIdentity,
    /// Number of recorded calls, never zero
    pub count: usize,
    pub min: Duration,
    pub max: Duration,
    pub average: Duration,
    pub total: Duration,
}

impl MethodStats {
    /// Calculate statistics from the recorded durations of one method.
    ///
    /// Returns `None` for an empty slice so that methods without calls never
    /// reach a report.
    pub fn from_durations(identity: MethodIdentity, durations: &[Duration]) -> Option<Self> {
        let first = *durations.first()?;

        let mut min = first;
        let mut max = first;
        let mut total = Duration::ZERO;
        for &duration in durations {
            min = min.min(duration);
            max = max.max(duration);
            total = total.saturating_add(duration);
        }

        let count = durations.len();
        // Calculate average using nanoseconds to avoid u32 overflow on the call count
        let avg_nanos = total.as_nanos() / count as u128;
        let average = Duration::from_nanos(u64::try_from(avg_nanos).unwrap_or(u64::MAX));

        Some(Self {
            identity,
            count,
            min,
            max,
            average,
            total,
        })
    }

    pub fn label(&self) -> String {
        self.identity.label()
    }

    pub fn min_secs(&self) -> f64 {
        self.min.as_secs_f64()
    }

    pub fn max_secs(&self) -> f64 {
        self.max.as_secs_f64()
    }

    pub fn average_secs(&self) -> f64 {
        self.average.as_secs_f64()
    }

    pub fn total_secs(&self) -> f64 {
        self.total.as_secs_f64()
    }
}

/// Maps each method to the ordered durations of its calls.
///
/// Methods keep the order in which they were first recorded, which makes
/// finalized output stable for a given run.
#[derive(Debug, Default)]
pub struct StatAccumulator {
    records: Vec<(MethodIdentity, Vec<Duration>)>,
    index: AHashMap<MethodIdentity, usize>,
}

impl StatAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, identity: MethodIdentity, duration: Duration) {
        let slot = match self.index.get(&identity) {
            Some(&slot) => slot,
            None => {
                let slot = self.records.len();
                self.records.push((identity, Vec::new()));
                self.index.insert(identity, slot);
                slot
            }
        };

        if let Some((_, durations)) = self.records.get_mut(slot) {
            durations.push(duration);
        }
    }

    /// Recorded durations for one method, in call order.
    pub fn durations(&self, identity: &MethodIdentity) -> &[Duration] {
        match self.index.get(identity).and_then(|&slot| self.records.get(slot)) {
            Some((_, durations)) => durations,
            None => &[],
        }
    }

    pub fn finalize(&self) -> Vec<MethodStats> {
        self.records
            .iter()
            .filter_map(|(identity, durations)| MethodStats::from_durations(*identity, durations))
            .collect()
    }

    /// Number of distinct methods recorded
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GET: MethodIdentity = MethodIdentity::instance("Cache", "get");
    const NEW: MethodIdentity = MethodIdentity::associated("Cache", "new");

    #[test]
    fn test_method_stats_calculation() {
        let durations = vec![
            Duration::from_micros(300),
            Duration::from_micros(100),
            Duration::from_micros(500),
            Duration::from_micros(200),
            Duration::from_micros(400),
        ];

        let stats = MethodStats::from_durations(GET, &durations).unwrap();

        assert_eq!(stats.count, 5);
        assert_eq!(stats.min, Duration::from_micros(100));
        assert_eq!(stats.max, Duration::from_micros(500));
        assert_eq!(stats.total, Duration::from_micros(1500));
        assert_eq!(stats.average, Duration::from_micros(300));
        assert!((stats.average_secs() - 0.0003).abs() < 1e-12);
    }

    #[test]
    fn test_empty_durations_have_no_stats() {
        assert!(MethodStats::from_durations(GET, &[]).is_none());
    }

    #[test]
    fn test_accumulator_keeps_first_record_order() {
        let mut acc = StatAccumulator::new();
        acc.record(NEW, Duration::from_micros(50));
        acc.record(GET, Duration::from_micros(10));
        acc.record(NEW, Duration::from_micros(70));

        let stats = acc.finalize();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].identity, NEW);
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[1].identity, GET);
        assert_eq!(stats[1].count, 1);
        assert_eq!(
            acc.durations(&NEW),
            &[Duration::from_micros(50), Duration::from_micros(70)]
        );
    }

    #[test]
    fn test_finalize_does_not_consume() {
        let mut acc = StatAccumulator::new();
        acc.record(GET, Duration::from_micros(10));

        assert_eq!(acc.finalize(), acc.finalize());
        assert_eq!(acc.len(), 1);

        acc.clear();
        assert!(acc.is_empty());
        assert!(acc.finalize().is_empty());
        assert!(acc.durations(&GET).is_empty());
    }
}
