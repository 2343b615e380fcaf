//! Folding raw time reports into clusters
//!
//! Three reductions feed the pivot views:
//! - [`aggregate`]: records into yearly buckets keyed by (project, user, year)
//! - [`rollup_all_years`]: yearly buckets into (project, user) buckets
//! - [`extract_active_items`]: the sorted axes of the pivot tables
//!
//! All three are commutative folds over whole minutes, so the result never
//! depends on the order in which records or clusters are visited.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::{
    ActiveItems, AllYearsCluster, AllYearsClusters, ClusterKey, RawTimeReport, TimeCluster,
    TimeClusters, Year,
};

/// Year of a service date string: the first run of four digits.
///
/// The service formats dates as `2016-07-11 15:48:35`; no further date
/// parsing is attempted.
pub fn extract_year(reported_date: &str) -> Option<Year> {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    let re = YEAR.get_or_init(|| Regex::new(r"[0-9]{4}").expect("valid year pattern"));
    re.find(reported_date)?.as_str().parse().ok()
}

/// Counters describing one aggregation pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregationSummary {
    /// Records folded into a cluster
    pub folded: usize,
    /// Records without project association
    pub skipped_no_project: usize,
    /// Records whose date carries no year
    pub skipped_no_year: usize,
}

impl AggregationSummary {
    pub const fn skipped(&self) -> usize {
        self.skipped_no_project + self.skipped_no_year
    }
}

/// Incremental form of [`aggregate`], fed one batch of records at a time
#[derive(Clone, Debug, Default)]
pub struct TimeAggregator {
    clusters: TimeClusters,
    summary: AggregationSummary,
}

impl TimeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record, creating its bucket on first sight
    pub fn fold(&mut self, record: &RawTimeReport) {
        let Some(project_id) = record.project_id else {
            // The acting credential cannot see this report's project.
            self.summary.skipped_no_project += 1;
            return;
        };
        let Some(year) = extract_year(&record.reported_date) else {
            warn!(
                project_id,
                user_id = record.user_id,
                reported_date = %record.reported_date,
                "skipping time report without a year"
            );
            self.summary.skipped_no_year += 1;
            return;
        };

        let key = ClusterKey::new(project_id, record.user_id, year);
        self.clusters
            .entry(key)
            .or_insert(TimeCluster {
                project_id,
                user_id: record.user_id,
                year,
                minutes: 0,
            })
            .minutes += record.minutes;
        self.summary.folded += 1;
    }

    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a RawTimeReport>) {
        for record in records {
            self.fold(record);
        }
    }

    pub fn clusters(&self) -> &TimeClusters {
        &self.clusters
    }

    pub fn summary(&self) -> AggregationSummary {
        self.summary
    }

    pub fn finish(self) -> (TimeClusters, AggregationSummary) {
        debug!(
            clusters = self.clusters.len(),
            folded = self.summary.folded,
            skipped = self.summary.skipped(),
            "aggregation finished"
        );
        (self.clusters, self.summary)
    }
}

/// Sum reported time per (project, user, year)
pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a RawTimeReport>) -> TimeClusters {
    let mut aggregator = TimeAggregator::new();
    aggregator.extend(records);
    aggregator.finish().0
}

/// Sum yearly buckets per (project, user)
pub fn rollup_all_years(clusters: &TimeClusters) -> AllYearsClusters {
    let mut rollup = AllYearsClusters::new();
    for cluster in clusters.values() {
        rollup
            .entry(cluster.key().pair())
            .or_insert(AllYearsCluster {
                project_id: cluster.project_id,
                user_id: cluster.user_id,
                minutes: 0,
            })
            .minutes += cluster.minutes;
    }
    rollup
}

/// Distinct, ascending projects, users and years present in `clusters`
pub fn extract_active_items<'a>(clusters: impl IntoIterator<Item = &'a TimeCluster>) -> ActiveItems {
    let mut projects = BTreeSet::new();
    let mut users = BTreeSet::new();
    let mut years = BTreeSet::new();

    for cluster in clusters {
        projects.insert(cluster.project_id);
        users.insert(cluster.user_id);
        years.insert(cluster.year);
    }

    ActiveItems {
        active_projects: projects.into_iter().collect(),
        active_users: users.into_iter().collect(),
        active_years: years.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PairKey;
    use pretty_assertions::assert_eq;

    #[test]
    fn year_from_service_formats() {
        assert_eq!(extract_year("2016-07-11 15:48:35"), Some(2016));
        assert_eq!(extract_year("2023-01-01T00:00:00Z"), Some(2023));
        assert_eq!(extract_year("reported 1999/12/31"), Some(1999));
        assert_eq!(extract_year("20160711"), Some(2016));
    }

    #[test]
    fn year_missing() {
        assert_eq!(extract_year(""), None);
        assert_eq!(extract_year("07-11-16"), None);
        assert_eq!(extract_year("yesterday"), None);
    }

    #[test]
    fn year_uses_ascii_digits_only() {
        assert_eq!(extract_year("٢٠٢٠-01-05"), None);
        assert_eq!(extract_year("２０２０-01-05"), None);
        assert_eq!(extract_year("٢٠٢٠ / 2021-01-05"), Some(2021));
    }

    #[test]
    fn same_bucket_accumulates() {
        let records = vec![
            RawTimeReport::new(1, 10, "2020-02-01 10:00:00", 60),
            RawTimeReport::new(1, 10, "2020-06-30 17:00:00", 30),
        ];

        let clusters = aggregate(&records);

        assert_eq!(clusters.len(), 1);
        let cluster = clusters[&ClusterKey::new(1, 10, 2020)];
        assert_eq!(cluster.minutes, 90);
        assert_eq!(cluster.hours(), 1.5);
    }

    #[test]
    fn record_without_project_is_skipped() {
        let records = vec![RawTimeReport::without_project(10, "2020-02-01 10:00:00", 60)];

        let mut aggregator = TimeAggregator::new();
        aggregator.extend(&records);
        let (clusters, summary) = aggregator.finish();

        assert!(clusters.is_empty());
        assert_eq!(summary.skipped_no_project, 1);
        assert_eq!(summary.folded, 0);
    }

    #[test]
    fn record_without_year_is_skipped() {
        let records = vec![
            RawTimeReport::new(1, 10, "n/a", 60),
            RawTimeReport::new(1, 10, "2021-01-04 09:00:00", 15),
        ];

        let mut aggregator = TimeAggregator::new();
        aggregator.extend(&records);

        assert_eq!(aggregator.clusters().len(), 1);
        assert_eq!(
            aggregator.summary(),
            AggregationSummary {
                folded: 1,
                skipped_no_project: 0,
                skipped_no_year: 1,
            }
        );
    }

    #[test]
    fn zero_minute_record_still_creates_bucket() {
        let clusters = aggregate(&[RawTimeReport::new(3, 7, "2019-05-05", 0)]);
        assert_eq!(clusters[&ClusterKey::new(3, 7, 2019)].hours(), 0.0);
    }

    #[test]
    fn rollup_sums_across_years() {
        let records = vec![
            RawTimeReport::new(1, 10, "2020-01-01", 60),
            RawTimeReport::new(1, 10, "2020-03-01", 30),
            RawTimeReport::new(1, 10, "2021-01-01", 120),
            RawTimeReport::new(1, 11, "2021-01-01", 45),
        ];

        let rollup = rollup_all_years(&aggregate(&records));

        assert_eq!(rollup.len(), 2);
        assert_eq!(rollup[&PairKey::new(1, 10)].hours(), 3.5);
        assert_eq!(rollup[&PairKey::new(1, 11)].hours(), 0.75);
    }

    #[test]
    fn active_items_sorted_and_distinct() {
        let records = vec![
            RawTimeReport::new(5, 30, "2022-01-01", 10),
            RawTimeReport::new(1, 30, "2020-01-01", 10),
            RawTimeReport::new(5, 10, "2020-01-01", 10),
            RawTimeReport::new(3, 20, "2021-01-01", 10),
        ];

        let active = extract_active_items(aggregate(&records).values());

        assert_eq!(active.active_projects, vec![1, 3, 5]);
        assert_eq!(active.active_users, vec![10, 20, 30]);
        assert_eq!(active.active_years, vec![2020, 2021, 2022]);
    }

    #[test]
    fn active_items_of_nothing() {
        let active = extract_active_items(TimeClusters::new().values());
        assert!(active.is_empty());
        assert!(active.active_years.is_empty());
    }
}
