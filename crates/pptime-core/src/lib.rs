//! # pptime-core
//!
//! Core domain model for turning a remote service's time reports into
//! pivoted workbook views.
//!
//! This crate provides:
//! - Domain types: `RawTimeReport`, `TimeCluster`, `AllYearsCluster`, `ActiveItems`, `NameDirectory`
//! - The aggregation pipeline: [`aggregate`], [`pivot`], [`materialize`], [`pipeline`]
//! - Collaborator traits: `TimeSource`, `DocumentWriter`, `ReportStore`
//! - Error types for every stage
//!
//! ## Example
//!
//! ```rust
//! use pptime_core::{aggregate, RawTimeReport};
//!
//! let records = vec![
//!     RawTimeReport::new(1, 10, "2020-03-02 09:00:00", 60),
//!     RawTimeReport::new(1, 10, "2020-03-03 09:00:00", 30),
//!     RawTimeReport::without_project(10, "2020-03-04 09:00:00", 45),
//! ];
//!
//! let clusters = aggregate::aggregate(&records);
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters.values().next().unwrap().hours(), 1.5);
//! ```

pub mod aggregate;
pub mod config;
pub mod materialize;
pub mod pipeline;
pub mod pivot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

pub use aggregate::{AggregationSummary, TimeAggregator};
pub use config::{ClientConfig, Config, ConfigError, PartialConfig, ReportConfig, ServiceConfig};
pub use materialize::ReportMaterializer;
pub use pipeline::{generate_report, ReportOptions};
pub use pivot::{Cell, Column, PivotBuilder, PivotView, ReportBook, TotalFunction, YearlySheets};

// ============================================================================
// Type Aliases
// ============================================================================

/// Identifier of a project on the remote service
pub type ProjectId = i64;

/// Identifier of an account member on the remote service
pub type UserId = i64;

/// Calendar year extracted from a report date
pub type Year = i32;

/// Yearly buckets keyed by (project, user, year)
pub type TimeClusters = BTreeMap<ClusterKey, TimeCluster>;

/// All-years buckets keyed by (project, user)
pub type AllYearsClusters = BTreeMap<PairKey, AllYearsCluster>;

// ============================================================================
// Raw Records
// ============================================================================

/// One time-report entry as returned by the remote service.
///
/// `project_id` is absent when the acting credential cannot see the
/// report's project; such records are skipped during aggregation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTimeReport {
    #[serde(
        default,
        deserialize_with = "lenient_id::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<ProjectId>,
    #[serde(deserialize_with = "lenient_id::required")]
    pub user_id: UserId,
    /// Date-time string; only the leading 4-digit year is interpreted
    pub reported_date: String,
    #[serde(deserialize_with = "lenient_minutes::deserialize")]
    pub minutes: u64,
}

impl RawTimeReport {
    pub fn new(
        project_id: ProjectId,
        user_id: UserId,
        reported_date: impl Into<String>,
        minutes: u64,
    ) -> Self {
        Self {
            project_id: Some(project_id),
            user_id,
            reported_date: reported_date.into(),
            minutes,
        }
    }

    /// A record the acting credential has no project visibility for
    pub fn without_project(user_id: UserId, reported_date: impl Into<String>, minutes: u64) -> Self {
        Self {
            project_id: None,
            user_id,
            reported_date: reported_date.into(),
            minutes,
        }
    }
}

/// Serde helpers for ids sent either as JSON numbers or numeric strings
pub mod lenient_id {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LenientId {
        Number(i64),
        Text(String),
    }

    impl LenientId {
        fn into_id<E: serde::de::Error>(self) -> Result<i64, E> {
            match self {
                Self::Number(id) => Ok(id),
                Self::Text(text) => text
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("invalid numeric id {text:?}"))),
            }
        }
    }

    pub fn optional<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Option::<LenientId>::deserialize(deserializer)?
            .map(LenientId::into_id)
            .transpose()
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        LenientId::deserialize(deserializer)?.into_id::<D::Error>()
    }
}

/// Minute counts given as an integer, a float or a numeric string
///
/// Fractions round to the nearest whole minute. Negative and non-finite
/// values are rejected.
pub mod lenient_minutes {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LenientMinutes {
        Whole(u64),
        Fraction(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        use serde::de::Error;

        let value = match LenientMinutes::deserialize(deserializer)? {
            LenientMinutes::Whole(minutes) => return Ok(minutes),
            LenientMinutes::Fraction(value) => value,
            LenientMinutes::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| D::Error::custom(format!("invalid minutes {text:?}")))?,
        };
        if !value.is_finite() || value < 0.0 {
            return Err(D::Error::custom(format!("invalid minutes {value}")));
        }
        Ok(value.round() as u64)
    }
}

// ============================================================================
// Clusters
// ============================================================================

/// Key of one yearly bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterKey {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub year: Year,
}

impl ClusterKey {
    pub const fn new(project_id: ProjectId, user_id: UserId, year: Year) -> Self {
        Self {
            project_id,
            user_id,
            year,
        }
    }

    /// The all-years key this bucket rolls up into
    pub const fn pair(&self) -> PairKey {
        PairKey::new(self.project_id, self.user_id)
    }
}

/// Key of one all-years bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    pub project_id: ProjectId,
    pub user_id: UserId,
}

impl PairKey {
    pub const fn new(project_id: ProjectId, user_id: UserId) -> Self {
        Self {
            project_id,
            user_id,
        }
    }
}

/// Reported time of one user on one project during one year.
///
/// Time is kept in whole minutes so that folding records is exact and
/// independent of arrival order; [`TimeCluster::hours`] is derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeCluster {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub year: Year,
    pub minutes: u64,
}

impl TimeCluster {
    pub const fn key(&self) -> ClusterKey {
        ClusterKey::new(self.project_id, self.user_id, self.year)
    }

    pub fn hours(&self) -> f64 {
        minutes_to_hours(self.minutes)
    }
}

/// Reported time of one user on one project, summed across years
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AllYearsCluster {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub minutes: u64,
}

impl AllYearsCluster {
    pub fn hours(&self) -> f64 {
        minutes_to_hours(self.minutes)
    }
}

pub fn minutes_to_hours(minutes: u64) -> f64 {
    minutes as f64 / 60.0
}

/// Distinct projects, users and years present in a set of clusters,
/// each sorted ascending.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ActiveItems {
    pub active_projects: Vec<ProjectId>,
    pub active_users: Vec<UserId>,
    pub active_years: Vec<Year>,
}

impl ActiveItems {
    pub fn is_empty(&self) -> bool {
        self.active_projects.is_empty()
    }
}

// ============================================================================
// Identity Resolution
// ============================================================================

/// What a [`NameDirectory`] maps, which decides its fallback name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectoryKind {
    Projects,
    Users,
}

impl DirectoryKind {
    /// Name rendered for ids missing from the directory
    pub const fn sentinel(self) -> &'static str {
        match self {
            Self::Projects => "unknown project",
            Self::Users => "unknown user",
        }
    }
}

/// Id to display-name mapping fetched once per report run.
///
/// Ids listed without a name are still members of the directory: they
/// appear in [`NameDirectory::ids`] and resolve to the sentinel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameDirectory {
    kind: DirectoryKind,
    names: HashMap<i64, String>,
    unnamed: BTreeSet<i64>,
}

impl NameDirectory {
    pub fn new(kind: DirectoryKind) -> Self {
        Self {
            kind,
            names: HashMap::new(),
            unnamed: BTreeSet::new(),
        }
    }

    pub fn from_entries<N: Into<String>>(
        kind: DirectoryKind,
        entries: impl IntoIterator<Item = (i64, N)>,
    ) -> Self {
        Self {
            kind,
            names: entries
                .into_iter()
                .map(|(id, name)| (id, name.into()))
                .collect(),
            unnamed: BTreeSet::new(),
        }
    }

    pub fn insert(&mut self, id: i64, name: impl Into<String>) {
        self.unnamed.remove(&id);
        self.names.insert(id, name.into());
    }

    /// List `id` without a display name
    pub fn insert_unnamed(&mut self, id: i64) {
        if !self.names.contains_key(&id) {
            self.unnamed.insert(id);
        }
    }

    pub const fn kind(&self) -> DirectoryKind {
        self.kind
    }

    /// Display name for `id`, or the directory's sentinel
    pub fn resolve(&self, id: i64) -> &str {
        self.names
            .get(&id)
            .map_or(self.kind.sentinel(), String::as_str)
    }

    /// Whether `id` has a display name
    pub fn contains(&self, id: i64) -> bool {
        self.names.contains_key(&id)
    }

    /// All listed ids, named or not, ascending
    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .names
            .keys()
            .chain(&self.unnamed)
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.names.len() + self.unnamed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.unnamed.is_empty()
    }
}

/// Free-function form of [`NameDirectory::resolve`]
pub fn resolve_name(id: i64, directory: &NameDirectory) -> &str {
    directory.resolve(id)
}

// ============================================================================
// Report Artifacts
// ============================================================================

/// A persisted report: where the workbook lives and why it was made
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportArtifact {
    pub id: i64,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
    pub comment: String,
}

/// User comment stored alongside a report
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportComment(String);

impl ReportComment {
    pub const MAX_CHARS: usize = 250;
    pub const DEFAULT: &'static str = "no comment provided";

    /// Blank input falls back to [`ReportComment::DEFAULT`]
    pub fn new(text: impl Into<String>) -> Result<Self, ReportError> {
        let text = text.into();
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::default());
        }
        let length = text.chars().count();
        if length > Self::MAX_CHARS {
            return Err(ReportError::InvalidComment {
                length,
                max: Self::MAX_CHARS,
            });
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReportComment {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl<'de> Deserialize<'de> for ReportComment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::new(text).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Read side of the remote time-tracking service
pub trait TimeSource {
    fn projects(&self) -> Result<NameDirectory, FetchError>;

    fn users(&self) -> Result<NameDirectory, FetchError>;

    fn time_reports(&self, project_id: ProjectId) -> Result<Vec<RawTimeReport>, FetchError>;
}

/// Encodes a [`ReportBook`] into a document at `path`
pub trait DocumentWriter {
    fn write(&self, book: &ReportBook, path: &Path) -> Result<(), RenderError>;
}

/// Registry of generated reports
pub trait ReportStore {
    /// Create a new immutable record; the store assigns id and timestamp
    fn record(&mut self, file_path: &str, comment: &str) -> Result<ReportArtifact, StoreError>;

    /// Every record, newest first
    fn list(&self) -> Result<Vec<ReportArtifact>, StoreError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Failure talking to the remote service
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("remote request failed: {0}")]
    Remote(String),

    #[error("malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },
}

/// Document encoding error
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Report registry error
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid timestamp in store: {0}")]
    Timestamp(String),

    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

/// Anything that aborts a report run
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("encoding failed: {0}")]
    Encoding(#[from] RenderError),

    #[error("storing report failed: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("comment is {length} characters long, at most {max} allowed")]
    InvalidComment { length: usize, max: usize },
}

// ============================================================================
// Tests
// ============================================================================
