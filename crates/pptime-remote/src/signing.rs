//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Every request carries an `Authorization: OAuth ...` header whose
//! signature covers the method, the normalized URL and all protocol and
//! query parameters. Body parameters are never used by this client.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use pptime_core::FetchError;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;
use std::fmt;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters stay literal
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const NONCE_LEN: usize = 32;

pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE).to_string()
}

/// `scheme://host[:port]/path`, without query or fragment
pub fn normalized_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// `METHOD&url&params` with every parameter encoded and sorted
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .chain(url.query_pairs().map(|(k, v)| (encode(&k), encode(&v))))
        .collect();
    encoded.sort();

    let joined = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(&normalized_url(url)),
        encode(&joined)
    )
}

/// Consumer credentials plus an optional token
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthSigner {
    consumer_key: String,
    consumer_secret: String,
    token: Option<(String, String)>,
}

impl fmt::Debug for OAuthSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthSigner")
            .field("consumer_key", &self.consumer_key)
            .field("token", &self.token.as_ref().map(|(key, _)| key))
            .finish_non_exhaustive()
    }
}

impl OAuthSigner {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: None,
        }
    }

    /// Sign on behalf of a request or access token
    pub fn with_token(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.token = Some((key.into(), secret.into()));
        self
    }

    /// Header value with a fresh nonce and the current time
    pub fn authorization(
        &self,
        method: &str,
        url: &Url,
        extra: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp();
        self.authorization_with(method, url, extra, &nonce, timestamp)
    }

    /// Header value for a fixed nonce and timestamp
    ///
    /// `extra` holds further `oauth_*` protocol parameters such as
    /// `oauth_callback` or `oauth_verifier`; they are signed and sent in
    /// the header.
    pub fn authorization_with(
        &self,
        method: &str,
        url: &Url,
        extra: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String, FetchError> {
        let mut params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer_key.clone()),
            ("oauth_nonce".into(), nonce.into()),
            ("oauth_signature_method".into(), "HMAC-SHA1".into()),
            ("oauth_timestamp".into(), timestamp.to_string()),
            ("oauth_version".into(), "1.0".into()),
        ];
        if let Some((key, _)) = &self.token {
            params.push(("oauth_token".into(), key.clone()));
        }
        params.extend(extra.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));

        let base = signature_base_string(method, url, &params);
        let signature = self.sign(&base)?;
        params.push(("oauth_signature".into(), signature));
        params.sort();

        let fields = params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {fields}"))
    }

    /// Base64 HMAC-SHA1 of `base` keyed by both secrets
    pub fn sign(&self, base: &str) -> Result<String, FetchError> {
        let token_secret = self.token.as_ref().map_or("", |(_, secret)| secret.as_str());
        let key = format!("{}&{}", encode(&self.consumer_secret), encode(token_secret));

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| FetchError::Authentication(e.to_string()))?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}
