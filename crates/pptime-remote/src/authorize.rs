//! Three-legged OAuth 1.0a: request token, user approval, access token
//!
//! The approval step needs a human. It is delegated to a
//! [`VerifierSource`], which receives the authorization URL and returns
//! the verifier code the service displayed.

use pptime_core::{ClientConfig, FetchError};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use std::fmt;
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::client::{base_url, http_client, join, read_body};
use crate::signing::OAuthSigner;

pub const INITIATE_ENDPOINT: &str = "initiate";
pub const AUTHORIZE_ENDPOINT: &str = "authorize";
pub const TOKEN_ENDPOINT: &str = "token";

/// Supplies the verifier code for an authorization URL
pub trait VerifierSource {
    fn obtain_verifier(&self, authorization_url: &Url) -> Result<String, FetchError>;
}

impl<F> VerifierSource for F
where
    F: Fn(&Url) -> Result<String, FetchError>,
{
    fn obtain_verifier(&self, authorization_url: &Url) -> Result<String, FetchError> {
        self(authorization_url)
    }
}

/// A token key and secret pair, as returned by `initiate` and `token`
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Parse an `oauth_token=..&oauth_token_secret=..` form body
pub fn parse_token_response(endpoint: &str, body: &str) -> Result<TokenPair, FetchError> {
    let mut key = None;
    let mut secret = None;
    for (name, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
        match name.as_ref() {
            "oauth_token" => key = Some(value.into_owned()),
            "oauth_token_secret" => secret = Some(value.into_owned()),
            _ => {}
        }
    }

    match (key, secret) {
        (Some(key), Some(secret)) if !key.is_empty() => Ok(TokenPair { key, secret }),
        _ => Err(FetchError::Malformed {
            endpoint: endpoint.to_string(),
            message: "missing oauth_token or oauth_token_secret".into(),
        }),
    }
}

/// Client side of the three-legged flow
pub struct OAuthFlow {
    http: Client,
    base_url: Url,
    consumer_key: String,
    consumer_secret: String,
}

impl OAuthFlow {
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        Ok(Self {
            http: http_client(Duration::from_secs(60))?,
            base_url: base_url(&config.base_url)?,
            consumer_key: config.client_key.clone(),
            consumer_secret: config.client_secret.clone(),
        })
    }

    fn consumer(&self) -> OAuthSigner {
        OAuthSigner::new(&self.consumer_key, &self.consumer_secret)
    }

    fn post(
        &self,
        endpoint: &str,
        signer: &OAuthSigner,
        extra: &[(&str, &str)],
    ) -> Result<TokenPair, FetchError> {
        let url = join(&self.base_url, endpoint)?;
        let auth = signer.authorization("POST", &url, extra)?;

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, auth)
            .send()
            .map_err(|e| FetchError::Remote(format!("{endpoint}: {e}")))?;
        // any refusal during the flow is an authentication failure
        let body = read_body(endpoint, response).map_err(|e| match e {
            FetchError::Remote(message) => FetchError::Authentication(message),
            other => other,
        })?;
        parse_token_response(endpoint, &body)
    }

    /// Temporary credentials for an out-of-band approval
    pub fn request_token(&self) -> Result<TokenPair, FetchError> {
        self.post(INITIATE_ENDPOINT, &self.consumer(), &[("oauth_callback", "oob")])
    }

    /// Where the user approves `request`
    pub fn authorization_url(&self, request: &TokenPair) -> Result<Url, FetchError> {
        let mut url = join(&self.base_url, AUTHORIZE_ENDPOINT)?;
        url.query_pairs_mut().append_pair("oauth_token", &request.key);
        Ok(url)
    }

    /// Exchange an approved request token for an access token
    pub fn access_token(&self, request: &TokenPair, verifier: &str) -> Result<TokenPair, FetchError> {
        let signer = self.consumer().with_token(&request.key, &request.secret);
        self.post(TOKEN_ENDPOINT, &signer, &[("oauth_verifier", verifier)])
    }
}

/// Run the full flow and return the access token
pub fn authorize(
    config: &ClientConfig,
    verifier_source: &dyn VerifierSource,
) -> Result<TokenPair, FetchError> {
    let flow = OAuthFlow::new(config)?;

    let request = flow.request_token()?;
    info!(request_token = %request.key, "request token issued");

    let url = flow.authorization_url(&request)?;
    let verifier = verifier_source.obtain_verifier(&url)?;
    let verifier = verifier.trim();
    if verifier.is_empty() {
        return Err(FetchError::Authentication("empty verifier".into()));
    }

    let access = flow.access_token(&request, verifier)?;
    info!(access_token = %access.key, "access token issued");
    Ok(access)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client_config() -> ClientConfig {
        ClientConfig {
            base_url: "https://api.example.com".into(),
            client_key: "ck".into(),
            client_secret: "cs".into(),
        }
    }

    #[test]
    fn token_body_parsing() {
        let pair = parse_token_response(
            "initiate",
            "oauth_token=abc%2F1&oauth_token_secret=s3cr3t&oauth_callback_confirmed=true\n",
        )
        .unwrap();
        assert_eq!(pair.key, "abc/1");
        assert_eq!(pair.secret, "s3cr3t");
    }

    #[test]
    fn token_body_missing_secret() {
        let err = parse_token_response("token", "oauth_token=abc").unwrap_err();
        assert!(matches!(err, FetchError::Malformed { ref endpoint, .. } if endpoint == "token"));
    }

    #[test]
    fn authorization_url_carries_request_token() {
        let flow = OAuthFlow::new(&client_config()).unwrap();
        let request = TokenPair {
            key: "req token".into(),
            secret: "x".into(),
        };
        assert_eq!(
            flow.authorization_url(&request).unwrap().as_str(),
            "https://api.example.com/authorize?oauth_token=req+token"
        );
    }

    #[test]
    fn closures_are_verifier_sources() {
        let source = |url: &Url| Ok::<_, FetchError>(format!("code-for-{}", url.path()));
        let url = Url::parse("https://api.example.com/authorize").unwrap();
        assert_eq!(source.obtain_verifier(&url).unwrap(), "code-for-/authorize");
    }

    #[test]
    fn debug_hides_token_secret() {
        let pair = TokenPair {
            key: "k".into(),
            secret: "very-secret".into(),
        };
        assert!(!format!("{pair:?}").contains("very-secret"));
    }
}
