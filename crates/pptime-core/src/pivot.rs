//! Pivot views over aggregated clusters
//!
//! A report is a [`ReportBook`] of three kinds of views:
//!
//! ```text
//! Sheet: All years                      Sheet: 2021 (one per active year)
//! | Projects | Ada | Bob | Total |      | Projects | Ada | Bob | Total |
//! |----------|-----|-----|-------|      |----------|-----|-----|-------|
//! | Website  | 3.5 | 0   | 3.5   |      | Website  | 2   | 0   | 2     |
//! | Totals   | sum | sum | sum   |      | Totals   | sum | sum | sum   |
//!
//! Sheet: All time reports
//! | Project | User | Year | Hours |
//! |---------|------|------|-------|
//! | Website | Ada  | 2020 | 1.5   |
//! ```
//!
//! The all-years and yearly views share one builder, parameterized by the
//! lookup that yields a (project, user) cell.

use crate::{
    ActiveItems, AllYearsClusters, ClusterKey, NameDirectory, PairKey, ProjectId, RenderError,
    TimeCluster, TimeClusters, UserId, Year,
};

pub const ALL_YEARS_SHEET: &str = "All years";
pub const FLAT_SHEET: &str = "All time reports";

/// Aggregation applied to a column in the totals row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TotalFunction {
    Sum,
}

/// Column descriptor of a pivot view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub label: String,
    /// Aggregation for the totals row, if any
    pub total_function: Option<TotalFunction>,
    /// Fixed text for the totals row, if any
    pub total_label: Option<String>,
}

impl Column {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            total_function: None,
            total_label: None,
        }
    }

    pub fn sum(mut self) -> Self {
        self.total_function = Some(TotalFunction::Sum);
        self
    }

    pub fn total_label(mut self, label: impl Into<String>) -> Self {
        self.total_label = Some(label.into());
        self
    }
}

/// One table cell
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Number(f64),
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            Self::Text(_) => None,
        }
    }
}

/// Headers and rows destined for one sheet
#[derive(Clone, Debug, PartialEq)]
pub struct PivotView {
    pub sheet_name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
    /// Whether the sheet gets a totals row
    pub total_row: bool,
}

impl PivotView {
    /// Check the table is non-empty and rectangular
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.columns.is_empty() {
            return Err(RenderError::InvalidData(format!(
                "sheet '{}' has no columns",
                self.sheet_name
            )));
        }
        if self.rows.is_empty() {
            return Err(RenderError::InvalidData(format!(
                "sheet '{}' has no data rows",
                self.sheet_name
            )));
        }
        if let Some((index, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.columns.len())
        {
            return Err(RenderError::InvalidData(format!(
                "sheet '{}' row {} has {} cells, expected {}",
                self.sheet_name,
                index + 1,
                row.len(),
                self.columns.len()
            )));
        }
        Ok(())
    }
}

/// Every view of one report run, in sheet order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportBook {
    pub views: Vec<PivotView>,
}

impl ReportBook {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.views.is_empty() {
            return Err(RenderError::InvalidData("report has no sheets".into()));
        }
        self.views.iter().try_for_each(PivotView::validate)
    }

    pub fn view(&self, sheet_name: &str) -> Option<&PivotView> {
        self.views.iter().find(|view| view.sheet_name == sheet_name)
    }
}

/// Which data the per-year sheets show
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum YearlySheets {
    /// Each sheet shows its own year
    #[default]
    PerYear,
    /// Every sheet shows the given year under its own label
    Pinned(Year),
}

/// Builds pivot views from the active axes and name directories
#[derive(Clone, Copy, Debug)]
pub struct PivotBuilder<'a> {
    active: &'a ActiveItems,
    projects: &'a NameDirectory,
    users: &'a NameDirectory,
}

impl<'a> PivotBuilder<'a> {
    pub fn new(
        active: &'a ActiveItems,
        projects: &'a NameDirectory,
        users: &'a NameDirectory,
    ) -> Self {
        Self {
            active,
            projects,
            users,
        }
    }

    /// Projects column, one summed column per active user, summed Total
    fn matrix_columns(&self) -> Vec<Column> {
        let mut columns = Vec::with_capacity(self.active.active_users.len() + 2);
        columns.push(Column::new("Projects").total_label("Totals"));
        columns.extend(
            self.active
                .active_users
                .iter()
                .map(|&user_id| Column::new(self.users.resolve(user_id)).sum()),
        );
        columns.push(Column::new("Total").sum());
        columns
    }

    fn matrix_view(
        &self,
        sheet_name: impl Into<String>,
        hours_for: impl Fn(ProjectId, UserId) -> Option<f64>,
    ) -> PivotView {
        let rows = self
            .active
            .active_projects
            .iter()
            .map(|&project_id| {
                let mut row = Vec::with_capacity(self.active.active_users.len() + 2);
                row.push(Cell::Text(self.projects.resolve(project_id).to_string()));

                let mut total = 0.0;
                for &user_id in &self.active.active_users {
                    let hours = hours_for(project_id, user_id).unwrap_or(0.0);
                    total += hours;
                    row.push(Cell::Number(hours));
                }
                row.push(Cell::Number(total));
                row
            })
            .collect();

        PivotView {
            sheet_name: sheet_name.into(),
            columns: self.matrix_columns(),
            rows,
            total_row: true,
        }
    }

    /// Hours per project and user over all years
    pub fn all_years(&self, rollup: &AllYearsClusters) -> PivotView {
        self.matrix_view(ALL_YEARS_SHEET, |project_id, user_id| {
            rollup
                .get(&PairKey::new(project_id, user_id))
                .map(|cluster| cluster.hours())
        })
    }

    /// Hours per project and user for `year`
    pub fn year(&self, clusters: &TimeClusters, year: Year) -> PivotView {
        self.labelled_year(clusters, year, year)
    }

    fn labelled_year(&self, clusters: &TimeClusters, label: Year, data_year: Year) -> PivotView {
        self.matrix_view(label.to_string(), |project_id, user_id| {
            clusters
                .get(&ClusterKey::new(project_id, user_id, data_year))
                .map(TimeCluster::hours)
        })
    }

    /// One view per active year, in ascending order
    pub fn yearly(&self, clusters: &TimeClusters, mode: YearlySheets) -> Vec<PivotView> {
        self.active
            .active_years
            .iter()
            .map(|&year| match mode {
                YearlySheets::PerYear => self.year(clusters, year),
                YearlySheets::Pinned(pinned) => self.labelled_year(clusters, year, pinned),
            })
            .collect()
    }

    /// One row per cluster: project, user, year, hours
    pub fn flat(&self, clusters: &TimeClusters) -> PivotView {
        let rows = clusters
            .values()
            .map(|cluster| {
                vec![
                    Cell::Text(self.projects.resolve(cluster.project_id).to_string()),
                    Cell::Text(self.users.resolve(cluster.user_id).to_string()),
                    Cell::Integer(i64::from(cluster.year)),
                    Cell::Number(cluster.hours()),
                ]
            })
            .collect();

        PivotView {
            sheet_name: FLAT_SHEET.to_string(),
            columns: ["Project", "User", "Year", "Hours"]
                .into_iter()
                .map(Column::new)
                .collect(),
            rows,
            total_row: false,
        }
    }

    /// All-years view, yearly views, flat view
    pub fn book(
        &self,
        clusters: &TimeClusters,
        rollup: &AllYearsClusters,
        mode: YearlySheets,
    ) -> ReportBook {
        let mut views = Vec::with_capacity(self.active.active_years.len() + 2);
        views.push(self.all_years(rollup));
        views.extend(self.yearly(clusters, mode));
        views.push(self.flat(clusters));
        ReportBook { views }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, extract_active_items, rollup_all_years};
    use crate::{DirectoryKind, RawTimeReport};
    use pretty_assertions::assert_eq;

    struct Fixture {
        clusters: TimeClusters,
        active: ActiveItems,
        projects: NameDirectory,
        users: NameDirectory,
    }

    fn fixture() -> Fixture {
        let records = vec![
            RawTimeReport::new(1, 10, "2020-01-15 09:00:00", 90),
            RawTimeReport::new(1, 10, "2021-02-01 09:00:00", 120),
            RawTimeReport::new(1, 20, "2021-02-02 09:00:00", 30),
            RawTimeReport::new(2, 20, "2020-12-31 23:59:59", 60),
            RawTimeReport::new(3, 99, "2021-06-01 09:00:00", 15),
        ];
        let clusters = aggregate(&records);
        let active = extract_active_items(clusters.values());
        let projects = NameDirectory::from_entries(
            DirectoryKind::Projects,
            [(1, "Website"), (2, "Intranet")],
        );
        let users = NameDirectory::from_entries(DirectoryKind::Users, [(10, "Ada"), (20, "Bob")]);
        Fixture {
            clusters,
            active,
            projects,
            users,
        }
    }

    fn labels(view: &PivotView) -> Vec<&str> {
        view.columns.iter().map(|c| c.label.as_str()).collect()
    }

    fn numbers(row: &[Cell]) -> Vec<f64> {
        row.iter().filter_map(Cell::as_number).collect()
    }

    #[test]
    fn all_years_layout() {
        let f = fixture();
        let builder = PivotBuilder::new(&f.active, &f.projects, &f.users);
        let view = builder.all_years(&rollup_all_years(&f.clusters));

        assert_eq!(view.sheet_name, "All years");
        assert_eq!(labels(&view), vec!["Projects", "Ada", "Bob", "unknown user", "Total"]);
        assert!(view.total_row);
        assert_eq!(view.columns[0].total_label.as_deref(), Some("Totals"));
        assert_eq!(view.columns[0].total_function, None);
        assert!(view.columns[1..]
            .iter()
            .all(|c| c.total_function == Some(TotalFunction::Sum)));

        assert_eq!(
            view.rows,
            vec![
                vec![
                    Cell::Text("Website".into()),
                    Cell::Number(3.5),
                    Cell::Number(0.5),
                    Cell::Number(0.0),
                    Cell::Number(4.0),
                ],
                vec![
                    Cell::Text("Intranet".into()),
                    Cell::Number(0.0),
                    Cell::Number(1.0),
                    Cell::Number(0.0),
                    Cell::Number(1.0),
                ],
                vec![
                    Cell::Text("unknown project".into()),
                    Cell::Number(0.0),
                    Cell::Number(0.0),
                    Cell::Number(0.25),
                    Cell::Number(0.25),
                ],
            ]
        );
    }

    #[test]
    fn absent_pairs_are_numeric_zero() {
        let f = fixture();
        let builder = PivotBuilder::new(&f.active, &f.projects, &f.users);
        let view = builder.year(&f.clusters, 2020);

        for row in &view.rows {
            assert!(matches!(row[0], Cell::Text(_)));
            assert!(row[1..].iter().all(|cell| matches!(cell, Cell::Number(_))));
        }
        assert_eq!(view.rows[2][1..].to_vec(), vec![Cell::Number(0.0); 4]);
    }

    #[test]
    fn row_totals_match_rendered_cells() {
        let f = fixture();
        let builder = PivotBuilder::new(&f.active, &f.projects, &f.users);
        let book = builder.book(
            &f.clusters,
            &rollup_all_years(&f.clusters),
            YearlySheets::PerYear,
        );

        for view in book.views.iter().filter(|v| v.total_row) {
            for row in &view.rows {
                let cells = numbers(row);
                let (total, parts) = cells.split_last().unwrap();
                assert_eq!(*total, parts.iter().sum::<f64>(), "sheet {}", view.sheet_name);
            }
        }
    }

    #[test]
    fn yearly_views_show_their_own_year() {
        let f = fixture();
        let builder = PivotBuilder::new(&f.active, &f.projects, &f.users);
        let views = builder.yearly(&f.clusters, YearlySheets::PerYear);

        let names: Vec<&str> = views.iter().map(|v| v.sheet_name.as_str()).collect();
        assert_eq!(names, vec!["2020", "2021"]);
        assert_eq!(numbers(&views[0].rows[0]), vec![1.5, 0.0, 0.0, 1.5]);
        assert_eq!(numbers(&views[1].rows[0]), vec![2.0, 0.5, 0.0, 2.5]);
    }

    #[test]
    fn pinned_yearly_views_repeat_one_year() {
        let f = fixture();
        let builder = PivotBuilder::new(&f.active, &f.projects, &f.users);
        let views = builder.yearly(&f.clusters, YearlySheets::Pinned(2021));

        assert_eq!(views[0].sheet_name, "2020");
        assert_eq!(views[1].sheet_name, "2021");
        assert_eq!(views[0].rows, views[1].rows);
        assert_eq!(numbers(&views[0].rows[0]), vec![2.0, 0.5, 0.0, 2.5]);
    }

    #[test]
    fn pinned_year_without_data_is_all_zero() {
        let f = fixture();
        let builder = PivotBuilder::new(&f.active, &f.projects, &f.users);
        let views = builder.yearly(&f.clusters, YearlySheets::Pinned(2018));

        for view in &views {
            for row in &view.rows {
                assert!(numbers(row).iter().all(|h| *h == 0.0));
            }
        }
    }

    #[test]
    fn flat_view_lists_every_cluster() {
        let f = fixture();
        let builder = PivotBuilder::new(&f.active, &f.projects, &f.users);
        let view = builder.flat(&f.clusters);

        assert_eq!(labels(&view), vec!["Project", "User", "Year", "Hours"]);
        assert!(!view.total_row);
        assert_eq!(view.rows.len(), f.clusters.len());
        assert_eq!(
            view.rows[0],
            vec![
                Cell::Text("Website".into()),
                Cell::Text("Ada".into()),
                Cell::Integer(2020),
                Cell::Number(1.5),
            ]
        );
    }

    #[test]
    fn book_sheet_order() {
        let f = fixture();
        let builder = PivotBuilder::new(&f.active, &f.projects, &f.users);
        let book = builder.book(
            &f.clusters,
            &rollup_all_years(&f.clusters),
            YearlySheets::default(),
        );

        let names: Vec<&str> = book.views.iter().map(|v| v.sheet_name.as_str()).collect();
        assert_eq!(names, vec!["All years", "2020", "2021", "All time reports"]);
        assert!(book.validate().is_ok());
        assert!(book.view("2021").is_some());
    }

    #[test]
    fn validate_rejects_empty_and_ragged() {
        let empty = PivotView {
            sheet_name: "Empty".into(),
            columns: vec![Column::new("A")],
            rows: Vec::new(),
            total_row: false,
        };
        assert!(matches!(empty.validate(), Err(RenderError::InvalidData(_))));

        let ragged = PivotView {
            sheet_name: "Ragged".into(),
            columns: vec![Column::new("A"), Column::new("B")],
            rows: vec![vec![Cell::Integer(1), Cell::Integer(2)], vec![Cell::Integer(3)]],
            total_row: false,
        };
        let err = ragged.validate().unwrap_err();
        assert!(err.to_string().contains("row 2 has 1 cells, expected 2"));

        assert!(ReportBook::default().validate().is_err());
    }
}
