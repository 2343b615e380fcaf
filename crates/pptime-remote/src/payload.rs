//! JSON shapes returned by the service

use pptime_core::{lenient_id, DirectoryKind, FetchError, NameDirectory, RawTimeReport};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

pub const PROJECTS_ENDPOINT: &str = "1/account/projects";
pub const MEMBERS_ENDPOINT: &str = "1/account/members";
pub const TIME_REPORTS_ENDPOINT: &str = "1/timereports/";
pub const PROFILE_ENDPOINT: &str = "1/user/me/profile";

/// One `{id, name}` entry of a directory listing
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DirectoryEntry {
    #[serde(deserialize_with = "lenient_id::required")]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct ProjectsEnvelope {
    projects: Vec<DirectoryEntry>,
}

#[derive(Deserialize)]
struct MembersEnvelope {
    members: Vec<DirectoryEntry>,
}

pub fn parse_json<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Malformed {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

/// Entries without a name stay listed and resolve to the sentinel
pub fn directory(kind: DirectoryKind, entries: Vec<DirectoryEntry>) -> NameDirectory {
    let mut directory = NameDirectory::new(kind);
    for entry in entries {
        match entry.name {
            Some(name) => directory.insert(entry.id, name),
            None => {
                warn!(id = entry.id, kind = ?kind, "directory entry without a name");
                directory.insert_unnamed(entry.id);
            }
        }
    }
    directory
}

pub fn parse_projects(body: &str) -> Result<NameDirectory, FetchError> {
    let envelope: ProjectsEnvelope = parse_json(PROJECTS_ENDPOINT, body)?;
    Ok(directory(DirectoryKind::Projects, envelope.projects))
}

pub fn parse_members(body: &str) -> Result<NameDirectory, FetchError> {
    let envelope: MembersEnvelope = parse_json(MEMBERS_ENDPOINT, body)?;
    Ok(directory(DirectoryKind::Users, envelope.members))
}

pub fn parse_time_reports(body: &str) -> Result<Vec<RawTimeReport>, FetchError> {
    parse_json(TIME_REPORTS_ENDPOINT, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn projects_listing() {
        let body = r#"{"projects": [
            {"id": 7, "name": "Website", "archived": false},
            {"id": "8", "name": "Intranet"},
            {"id": 9}
        ]}"#;
        let projects = parse_projects(body).unwrap();

        assert_eq!(projects.ids(), vec![7, 8, 9]);
        assert_eq!(projects.resolve(8), "Intranet");
        assert_eq!(projects.resolve(9), "unknown project");
    }

    #[test]
    fn members_listing() {
        let body = r#"{"members": [{"id": 10, "name": "Ada", "email": "ada@example.com"}]}"#;
        let users = parse_members(body).unwrap();
        assert_eq!(users.kind(), DirectoryKind::Users);
        assert_eq!(users.resolve(10), "Ada");
    }

    #[test]
    fn wrong_envelope_is_malformed() {
        let err = parse_members(r#"{"projects": []}"#).unwrap_err();
        match err {
            FetchError::Malformed { endpoint, .. } => assert_eq!(endpoint, MEMBERS_ENDPOINT),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn time_report_listing_with_hidden_project() {
        let body = r#"[
            {"projectId": 7, "userId": 10, "reportedDate": "2016-07-11 15:48:35", "minutes": 90, "comment": "x"},
            {"userId": 11, "reportedDate": "2016-07-12 09:00:00", "minutes": 30}
        ]"#;
        let reports = parse_time_reports(body).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].project_id, Some(7));
        assert_eq!(reports[1].project_id, None);
    }

    #[test]
    fn html_error_page_is_malformed() {
        assert!(matches!(
            parse_time_reports("<html>502</html>"),
            Err(FetchError::Malformed { .. })
        ));
    }
}
