use std::collections::HashSet;
use tracing::{info, warn};

use crate::record::{NarrativeRecord, Route};
use crate::TARGET_TRIAGE;

/// Default number of length quantiles.
pub const DEFAULT_QUANTILES: u32 = 5;

/// Buckets documents into N length quantiles and routes the extremes away
/// from auto-extraction: the shortest bucket carries too little signal, the
/// longest is usually not natural language.
pub struct QuantileRouter {
    buckets: u32,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RoutingReport {
    /// Per-bucket record counts, Q1..QN in increasing length order.
    pub distribution: Vec<(String, usize)>,
    pub accepted: usize,
    pub diverted: usize,
    pub degenerate: bool,
    pub accepted_filename: String,
    pub diverted_filename: String,
}

impl Default for QuantileRouter {
    fn default() -> Self {
        QuantileRouter {
            buckets: DEFAULT_QUANTILES,
        }
    }
}

impl QuantileRouter {
    pub fn new(buckets: u32) -> Self {
        QuantileRouter { buckets }
    }

    /// Bucket 1 and bucket N are diverted; every interior bucket is
    /// accepted.
    pub fn route_for_bucket(&self, bucket: u32) -> Route {
        if bucket == 1 || bucket == self.buckets {
            Route::Diverted
        } else {
            Route::Accepted
        }
    }

    /// Empirical quantile cut points: the i-th edge is the smallest length
    /// with at least i/N of the corpus at or below it.
    fn edges(&self, lengths: &[usize]) -> Vec<usize> {
        let mut sorted = lengths.to_vec();
        sorted.sort_unstable();
        let n = sorted.len();
        (1..=self.buckets)
            .map(|i| {
                let rank = ((i as f64 / self.buckets as f64) * n as f64).ceil() as usize;
                sorted[rank.saturating_sub(1).min(n - 1)]
            })
            .collect()
    }

    /// Assign every record a quantile bucket and a route. Ties in length
    /// always land in the lower-numbered bucket, so equal lengths share a
    /// bucket. Degenerate configurations (fewer than three buckets, or
    /// fewer distinct lengths than buckets) divert everything and warn
    /// instead of failing.
    pub fn route(&self, records: Vec<NarrativeRecord>) -> (Vec<NarrativeRecord>, RoutingReport) {
        let mut report = RoutingReport::default();
        if records.is_empty() || self.buckets == 0 {
            return (records, report);
        }

        let lengths: Vec<usize> = records.iter().map(|r| r.length).collect();
        let distinct: HashSet<usize> = lengths.iter().copied().collect();

        if self.buckets < 3 {
            warn!(
                target: TARGET_TRIAGE,
                "{} quantiles leave no interior buckets; all rows will be diverted",
                self.buckets
            );
            report.degenerate = true;
        } else if distinct.len() < self.buckets as usize {
            warn!(
                target: TARGET_TRIAGE,
                "only {} distinct lengths for {} buckets; all rows will be diverted",
                distinct.len(),
                self.buckets
            );
            report.degenerate = true;
        }

        let edges = self.edges(&lengths);
        let mut records = records;
        let mut bucket_counts = vec![0usize; self.buckets as usize];
        let mut accepted_buckets = HashSet::new();
        let mut diverted_buckets = HashSet::new();

        for record in &mut records {
            let bucket = edges
                .iter()
                .position(|&edge| record.length <= edge)
                .map(|index| index as u32 + 1)
                .unwrap_or(self.buckets);
            let route = if report.degenerate {
                Route::Diverted
            } else {
                self.route_for_bucket(bucket)
            };
            record.quantile_bucket = Some(bucket);
            record.route = Some(route);
            bucket_counts[bucket as usize - 1] += 1;
            match route {
                Route::Accepted => {
                    report.accepted += 1;
                    accepted_buckets.insert(bucket);
                }
                Route::Diverted => {
                    report.diverted += 1;
                    diverted_buckets.insert(bucket);
                }
            }
        }

        report.distribution = bucket_counts
            .iter()
            .enumerate()
            .map(|(index, count)| (format!("Q{}", index + 1), *count))
            .collect();
        report.accepted_filename = partition_filename(&bucket_names(&accepted_buckets), "accepted");
        report.diverted_filename = partition_filename(&bucket_names(&diverted_buckets), "diverted");

        info!(
            target: TARGET_TRIAGE,
            "{} rows accepted for auto-extraction, {} rows diverted to human review",
            report.accepted,
            report.diverted
        );

        (records, report)
    }
}

fn bucket_names(buckets: &HashSet<u32>) -> Vec<String> {
    let mut sorted: Vec<u32> = buckets.iter().copied().collect();
    sorted.sort_unstable();
    sorted.into_iter().map(|b| format!("q{}", b)).collect()
}

/// Partition file names encode the bucket sets they hold, e.g.
/// `q2xq3xq4.csv`; an empty set falls back to a plain name.
pub fn partition_filename(labels: &[String], fallback: &str) -> String {
    if labels.is_empty() {
        format!("{}.csv", fallback)
    } else {
        format!("{}.csv", labels.join("x"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NarrativeRecord;

    fn records_with_lengths(lengths: &[usize]) -> Vec<NarrativeRecord> {
        lengths
            .iter()
            .enumerate()
            .map(|(index, &len)| {
                NarrativeRecord::from_normalized(
                    format!("{}", index),
                    Some("x".repeat(len)),
                    "x".repeat(len),
                )
            })
            .collect()
    }

    #[test]
    fn test_partition_is_total() {
        let records = records_with_lengths(&[10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        let total = records.len();
        let (routed, report) = QuantileRouter::new(5).route(records);
        assert_eq!(report.accepted + report.diverted, total);
        assert!(routed.iter().all(|r| r.quantile_bucket.is_some()));
        assert!(routed.iter().all(|r| r.route.is_some()));
    }

    #[test]
    fn test_edge_buckets_diverted_interior_accepted() {
        let records = records_with_lengths(&[10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        let (routed, report) = QuantileRouter::new(5).route(records);
        assert!(!report.degenerate);
        for record in &routed {
            let bucket = record.quantile_bucket.unwrap();
            let expected = if bucket == 1 || bucket == 5 {
                Route::Diverted
            } else {
                Route::Accepted
            };
            assert_eq!(record.route, Some(expected));
        }
        // Two records per bucket for an even spread of ten lengths.
        assert_eq!(
            report.distribution,
            vec![
                ("Q1".to_string(), 2),
                ("Q2".to_string(), 2),
                ("Q3".to_string(), 2),
                ("Q4".to_string(), 2),
                ("Q5".to_string(), 2),
            ]
        );
        assert_eq!(report.accepted_filename, "q2xq3xq4.csv");
        assert_eq!(report.diverted_filename, "q1xq5.csv");
    }

    #[test]
    fn test_ties_share_the_lower_bucket() {
        let records = records_with_lengths(&[1, 2, 3, 4, 5, 5, 5, 5, 9, 10]);
        let (routed, _) = QuantileRouter::new(5).route(records);
        let tie_buckets: HashSet<u32> = routed
            .iter()
            .filter(|r| r.length == 5)
            .map(|r| r.quantile_bucket.unwrap())
            .collect();
        assert_eq!(tie_buckets.len(), 1);
    }

    #[test]
    fn test_two_buckets_is_degenerate() {
        let records = records_with_lengths(&[1, 2, 3, 4, 5, 6]);
        let (routed, report) = QuantileRouter::new(2).route(records);
        assert!(report.degenerate);
        assert_eq!(report.accepted, 0);
        assert_eq!(report.diverted, routed.len());
        assert!(routed.iter().all(|r| r.route == Some(Route::Diverted)));
        assert_eq!(report.accepted_filename, "accepted.csv");
    }

    #[test]
    fn test_too_few_distinct_lengths_is_degenerate() {
        let records = records_with_lengths(&[7, 7, 7, 42, 42, 42]);
        let (routed, report) = QuantileRouter::new(5).route(records);
        assert!(report.degenerate);
        assert_eq!(report.accepted, 0);
        assert_eq!(report.diverted, routed.len());
    }

    #[test]
    fn test_route_for_bucket_for_larger_n() {
        let router = QuantileRouter::new(7);
        assert_eq!(router.route_for_bucket(1), Route::Diverted);
        assert_eq!(router.route_for_bucket(7), Route::Diverted);
        for bucket in 2..7 {
            assert_eq!(router.route_for_bucket(bucket), Route::Accepted);
        }
    }

    #[test]
    fn test_empty_corpus_is_a_no_op() {
        let (routed, report) = QuantileRouter::default().route(Vec::new());
        assert!(routed.is_empty());
        assert_eq!(report, RoutingReport::default());
    }
}
