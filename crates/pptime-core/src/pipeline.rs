//! One report run, end to end
//!
//! directories → per-project time reports → clusters → active items →
//! views → materialized report. Any failure aborts the run before anything
//! is recorded.

use tracing::{debug, info, info_span};

use crate::aggregate::{extract_active_items, rollup_all_years, AggregationSummary, TimeAggregator};
use crate::{
    ActiveItems, DocumentWriter, NameDirectory, PivotBuilder, ReportArtifact, ReportBook,
    ReportComment, ReportError, ReportMaterializer, ReportStore, TimeClusters, TimeSource,
    YearlySheets,
};

/// Knobs of a report run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReportOptions {
    pub yearly_sheets: YearlySheets,
}

/// Everything computed from the remote data before materialization
#[derive(Clone, Debug)]
pub struct ReportData {
    pub projects: NameDirectory,
    pub users: NameDirectory,
    pub clusters: TimeClusters,
    pub active: ActiveItems,
    pub summary: AggregationSummary,
}

impl ReportData {
    pub fn book(&self, options: &ReportOptions) -> ReportBook {
        let rollup = rollup_all_years(&self.clusters);
        let book = PivotBuilder::new(&self.active, &self.projects, &self.users).book(
            &self.clusters,
            &rollup,
            options.yearly_sheets,
        );
        info!(
            sheets = book.views.len(),
            rows = book.views.iter().map(|v| v.rows.len()).sum::<usize>(),
            "views built"
        );
        book
    }
}

/// Fetch directories and every project's time reports, then aggregate
pub fn collect<T: TimeSource + ?Sized>(source: &T) -> Result<ReportData, ReportError> {
    let projects = source.projects()?;
    let users = source.users()?;
    info!(projects = projects.len(), users = users.len(), "directories fetched");

    let mut aggregator = TimeAggregator::new();
    for project_id in projects.ids() {
        let reports = source.time_reports(project_id)?;
        debug!(project_id, reports = reports.len(), "time reports fetched");
        aggregator.extend(&reports);
    }
    let (clusters, summary) = aggregator.finish();

    let active = extract_active_items(clusters.values());
    info!(
        clusters = clusters.len(),
        folded = summary.folded,
        skipped_no_project = summary.skipped_no_project,
        skipped_no_year = summary.skipped_no_year,
        active_projects = active.active_projects.len(),
        active_users = active.active_users.len(),
        active_years = active.active_years.len(),
        "time reports aggregated"
    );

    Ok(ReportData {
        projects,
        users,
        clusters,
        active,
        summary,
    })
}

/// Run the whole pipeline and return the stored report
pub fn generate_report<T, W, S>(
    source: &T,
    materializer: &mut ReportMaterializer<W, S>,
    options: &ReportOptions,
    comment: &ReportComment,
) -> Result<ReportArtifact, ReportError>
where
    T: TimeSource + ?Sized,
    W: DocumentWriter,
    S: ReportStore,
{
    let span = info_span!("report", comment = comment.as_str());
    let _guard = span.enter();

    let data = collect(source)?;
    let book = data.book(options);
    materializer.materialize(&book, comment)
}
