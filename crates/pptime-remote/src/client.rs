//! Signed HTTP access to the remote service

use pptime_core::{FetchError, NameDirectory, ProjectId, RawTimeReport, ServiceConfig, TimeSource};
use reqwest::blocking::{Client, Response};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::payload::{
    parse_members, parse_projects, parse_time_reports, MEMBERS_ENDPOINT, PROFILE_ENDPOINT,
    PROJECTS_ENDPOINT, TIME_REPORTS_ENDPOINT,
};
use crate::signing::OAuthSigner;

const USER_AGENT: &str = concat!("pptime/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Parse `base` and make sure relative endpoints join below it
pub fn base_url(base: &str) -> Result<Url, FetchError> {
    let mut text = base.trim().to_string();
    if !text.ends_with('/') {
        text.push('/');
    }
    Url::parse(&text).map_err(|e| FetchError::Remote(format!("invalid base URL {base:?}: {e}")))
}

pub(crate) fn join(base: &Url, endpoint: &str) -> Result<Url, FetchError> {
    base.join(endpoint)
        .map_err(|e| FetchError::Remote(format!("invalid endpoint {endpoint:?}: {e}")))
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| FetchError::Remote(e.to_string()))
}

/// Turn a response into its body, classifying failures
pub(crate) fn read_body(endpoint: &str, response: Response) -> Result<String, FetchError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| FetchError::Remote(format!("{endpoint}: {e}")))?;

    match status {
        s if s.is_success() => Ok(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::Authentication(
            format!("{endpoint}: HTTP {status}: {}", snippet(&body)),
        )),
        _ => Err(FetchError::Remote(format!(
            "{endpoint}: HTTP {status}: {}",
            snippet(&body)
        ))),
    }
}

fn snippet(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(200) {
        Some((cut, _)) => &body[..cut],
        None => body,
    }
}

/// [`TimeSource`] backed by the remote service
#[derive(Debug)]
pub struct ProjectPlaceClient {
    http: Client,
    base_url: Url,
    signer: OAuthSigner,
}

impl ProjectPlaceClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, FetchError> {
        Self::with_timeout(config, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(config: &ServiceConfig, timeout: Duration) -> Result<Self, FetchError> {
        let signer = OAuthSigner::new(&config.client_key, &config.client_secret)
            .with_token(&config.access_token_key, &config.access_token_secret);
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url(&config.base_url)?,
            signer,
        })
    }

    /// Build a client and check its credentials against the profile endpoint
    pub fn connect(config: &ServiceConfig) -> Result<Self, FetchError> {
        let client = Self::new(config)?;
        client.verify()?;
        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn verify(&self) -> Result<(), FetchError> {
        self.get(PROFILE_ENDPOINT, PROFILE_ENDPOINT)?;
        info!(base_url = %self.base_url, "credentials verified");
        Ok(())
    }

    /// Signed GET of `path` (relative to the base URL)
    fn get(&self, endpoint: &str, path: &str) -> Result<String, FetchError> {
        let url = join(&self.base_url, path)?;
        let auth = self.signer.authorization("GET", &url, &[])?;
        debug!(%url, "GET");

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, auth)
            .send()
            .map_err(|e| FetchError::Remote(format!("{endpoint}: {e}")))?;
        read_body(endpoint, response)
    }
}

impl TimeSource for ProjectPlaceClient {
    fn projects(&self) -> Result<NameDirectory, FetchError> {
        parse_projects(&self.get(PROJECTS_ENDPOINT, PROJECTS_ENDPOINT)?)
    }

    fn users(&self) -> Result<NameDirectory, FetchError> {
        parse_members(&self.get(MEMBERS_ENDPOINT, MEMBERS_ENDPOINT)?)
    }

    fn time_reports(&self, project_id: ProjectId) -> Result<Vec<RawTimeReport>, FetchError> {
        let path = format!("{TIME_REPORTS_ENDPOINT}?project_ids={project_id}");
        parse_time_reports(&self.get(TIME_REPORTS_ENDPOINT, &path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = base_url("https://api.example.com/v").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v/");
        assert_eq!(
            join(&url, "1/account/projects").unwrap().as_str(),
            "https://api.example.com/v/1/account/projects"
        );
    }

    #[test]
    fn time_report_query_survives_join() {
        let url = base_url("https://api.example.com/").unwrap();
        let joined = join(&url, "1/timereports/?project_ids=42").unwrap();
        assert_eq!(joined.path(), "/1/timereports/");
        assert_eq!(joined.query(), Some("project_ids=42"));
    }

    #[test]
    fn invalid_base_url() {
        assert!(matches!(base_url("not a url"), Err(FetchError::Remote(_))));
    }

    #[test]
    fn long_bodies_are_cut() {
        let body = "x".repeat(500);
        assert_eq!(snippet(&body).len(), 200);
        assert_eq!(snippet("  short "), "short");
    }
}
