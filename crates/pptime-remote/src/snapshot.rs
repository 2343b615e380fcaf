//! Offline [`TimeSource`] backed by a JSON file
//!
//! ```json
//! {
//!   "projects": [{"id": 1, "name": "Website"}],
//!   "members": [{"id": 10, "name": "Ada"}],
//!   "timereports": {
//!     "1": [{"projectId": 1, "userId": 10, "reportedDate": "2020-04-01 10:00:00", "minutes": 90}]
//!   }
//! }
//! ```
//!
//! `timereports` is keyed by the project id that was queried, mirroring
//! one `1/timereports/?project_ids=` response per project.

use pptime_core::{DirectoryKind, FetchError, NameDirectory, ProjectId, RawTimeReport, TimeSource};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::payload::{directory, parse_json, DirectoryEntry};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotFile {
    projects: Vec<DirectoryEntry>,
    members: Vec<DirectoryEntry>,
    #[serde(default)]
    timereports: HashMap<ProjectId, Vec<RawTimeReport>>,
}

/// Recorded service responses served from memory
#[derive(Clone, Debug)]
pub struct SnapshotSource {
    projects: NameDirectory,
    users: NameDirectory,
    reports: HashMap<ProjectId, Vec<RawTimeReport>>,
}

impl SnapshotSource {
    pub fn from_json(text: &str) -> Result<Self, FetchError> {
        let file: SnapshotFile = parse_json("snapshot", text)?;
        Ok(Self {
            projects: directory(DirectoryKind::Projects, file.projects),
            users: directory(DirectoryKind::Users, file.members),
            reports: file.timereports,
        })
    }

    pub fn load(path: &Path) -> Result<Self, FetchError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FetchError::Remote(format!("cannot read {}: {e}", path.display())))?;
        let source = Self::from_json(&text).map_err(|e| match e {
            FetchError::Malformed { message, .. } => FetchError::Malformed {
                endpoint: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        debug!(path = %path.display(), projects = source.projects.len(), "snapshot loaded");
        Ok(source)
    }
}

impl TimeSource for SnapshotSource {
    fn projects(&self) -> Result<NameDirectory, FetchError> {
        Ok(self.projects.clone())
    }

    fn users(&self) -> Result<NameDirectory, FetchError> {
        Ok(self.users.clone())
    }

    fn time_reports(&self, project_id: ProjectId) -> Result<Vec<RawTimeReport>, FetchError> {
        Ok(self.reports.get(&project_id).cloned().unwrap_or_default())
    }
}
