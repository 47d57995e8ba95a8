//! Outbound HTTP: the host allowlist and the transport seam.

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::error::{PrayerError, PrayerResult, TransportError};

/// Hosts the client may ever talk to. Adding a provider means extending this.
pub const ALLOWED_HOSTS: &[&str] = &["api.aladhan.com"];
pub const ALLOWED_SCHEME: &str = "https";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
const USER_AGENT: &str = concat!("salat/", env!("CARGO_PKG_VERSION"));

/// Closed set of permitted hostnames plus the one permitted scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    hosts: Vec<String>,
    scheme: String,
}

impl Default for AllowList {
    fn default() -> Self {
        Self {
            hosts: ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect(),
            scheme: ALLOWED_SCHEME.to_string(),
        }
    }
}

impl AllowList {
    #[cfg(test)]
    pub(crate) fn new(hosts: &[&str], scheme: &str) -> Self {
        Self {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            scheme: scheme.to_string(),
        }
    }

    /// Fail closed unless both host and scheme are allowed.
    pub fn check(&self, url: &Url) -> PrayerResult<()> {
        match self.violation(url) {
            Some(message) => Err(PrayerError::security(message)),
            None => Ok(()),
        }
    }

    fn violation(&self, url: &Url) -> Option<String> {
        let host = url.host_str().unwrap_or_default();
        if !self.hosts.iter().any(|h| h == host) {
            return Some(format!("Invalid URL: Hostname not allowed: {}", host));
        }
        if url.scheme() != self.scheme {
            return Some(format!(
                "Invalid URL: Only {} is allowed, got {}",
                self.scheme.to_uppercase(),
                url.scheme()
            ));
        }
        None
    }

    /// Redirect policy that puts every hop through the allowlist and stops
    /// after `max_redirects` hops.
    fn redirect_policy(&self, max_redirects: usize) -> Policy {
        let allow_list = self.clone();
        Policy::custom(move |attempt| {
            // `previous` starts with the original URL, so it holds one entry per hop taken.
            if attempt.previous().len() > max_redirects {
                let message = format!("Too many redirects (limit {})", max_redirects);
                return attempt.error(RedirectRejected(message));
            }
            let violation = allow_list.violation(attempt.url());
            match violation {
                Some(message) => {
                    attempt.error(RedirectRejected(format!("Redirect refused. {}", message)))
                }
                None => attempt.follow(),
            }
        })
    }
}

/// A redirect hop the transport refused to follow.
#[derive(Debug, Error)]
#[error("{0}")]
struct RedirectRejected(String);

/// Refused redirects are security failures; everything else is transport.
fn send_error(e: reqwest::Error) -> PrayerError {
    if e.is_redirect() {
        let mut source = std::error::Error::source(&e);
        while let Some(err) = source {
            if let Some(rejected) = err.downcast_ref::<RedirectRejected>() {
                return PrayerError::security(rejected.0.clone());
            }
            source = err.source();
        }
    }
    PrayerError::Transport(e.into())
}

/// A fully built GET request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub url: Url,
    pub query: Vec<(&'static str, String)>,
}

impl ApiRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            query: Vec::new(),
        }
    }

    pub fn param(mut self, name: &'static str, value: impl ToString) -> Self {
        self.query.push((name, value.to_string()));
        self
    }
}

/// Performs GET requests and returns the decoded JSON body.
///
/// Implementations must report non-2xx statuses and undecodable bodies as
/// [`PrayerError::Api`], and network-level failures as
/// [`PrayerError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, request: &ApiRequest) -> PrayerResult<serde_json::Value>;
}

#[derive(Debug, Clone, Copy)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub max_redirects: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

/// reqwest-backed transport: HTTPS only, verified certificates, bounded
/// timeout, and redirects that never leave the allowlist.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(options: TransportOptions) -> PrayerResult<Self> {
        Self::with_allow_list(options, &AllowList::default())
    }

    pub(crate) fn with_allow_list(
        options: TransportOptions,
        allow_list: &AllowList,
    ) -> PrayerResult<Self> {
        let client = Self::builder(options, allow_list)
            .https_only(true)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }

    /// Plain-HTTP variant for talking to a local mock server.
    #[cfg(test)]
    #[allow(clippy::expect_used)]
    pub(crate) fn new_for_mock_server(options: TransportOptions, allow_list: &AllowList) -> Self {
        let client = Self::builder(options, allow_list)
            .build()
            .expect("mock server client");
        Self { client }
    }

    fn builder(options: TransportOptions, allow_list: &AllowList) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(options.timeout)
            .redirect(allow_list.redirect_policy(options.max_redirects))
            .danger_accept_invalid_certs(false)
            .user_agent(USER_AGENT)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, request: &ApiRequest) -> PrayerResult<serde_json::Value> {
        tracing::debug!(url = %request.url, "GET");

        let response = self
            .client
            .get(request.url.clone())
            .query(&request.query)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PrayerError::api(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown status"),
            ));
        }

        response.json().await.map_err(|e| {
            if e.is_decode() {
                PrayerError::api(status.as_u16(), format!("Malformed response body: {}", e))
            } else {
                PrayerError::Transport(e.into())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(base: &str, p: &str) -> ApiRequest {
        ApiRequest::new(Url::parse(&format!("{}{}", base, p)).unwrap())
    }

    fn local_transport(options: TransportOptions) -> HttpTransport {
        HttpTransport::new_for_mock_server(options, &AllowList::new(&["127.0.0.1"], "http"))
    }

    #[test]
    fn test_allowlist_accepts_api_host() {
        let url = Url::parse("https://api.aladhan.com/v1/timings").unwrap();
        assert!(AllowList::default().check(&url).is_ok());
    }

    #[test]
    fn test_allowlist_rejects_other_hosts() {
        for raw in [
            "https://evil.example.com/v1/timings",
            "https://api.aladhan.com.evil.com/v1",
            "https://aladhan.com/v1",
            "https://127.0.0.1/v1",
        ] {
            let url = Url::parse(raw).unwrap();
            let err = AllowList::default().check(&url).unwrap_err();
            assert!(matches!(err, PrayerError::Security(_)), "{raw}");
        }
    }

    #[test]
    fn test_allowlist_rejects_plain_http() {
        let url = Url::parse("http://api.aladhan.com/v1/timings").unwrap();
        let err = AllowList::default().check(&url).unwrap_err();
        assert!(err.to_string().contains("Only HTTPS"));
    }

    #[test]
    fn test_request_builder_keeps_param_order() {
        let req = request("https://api.aladhan.com", "/v1/timings")
            .param("method", 3)
            .param("date", "01-01-2025");
        assert_eq!(
            req.query,
            vec![("method", "3".to_string()), ("date", "01-01-2025".to_string())]
        );
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/timings"))
            .and(query_param("method", "3"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 200, "data": {}})),
            )
            .mount(&mock_server)
            .await;

        let transport = local_transport(TransportOptions::default());
        let body = transport
            .get_json(&request(&mock_server.uri(), "/v1/timings").param("method", 3))
            .await
            .unwrap();

        assert_eq!(body["code"], 200);
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/timings"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let transport = local_transport(TransportOptions::default());
        let err = transport
            .get_json(&request(&mock_server.uri(), "/v1/timings"))
            .await
            .unwrap_err();

        match err {
            PrayerError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let transport = local_transport(TransportOptions::default());
        let err = transport
            .get_json(&request(&mock_server.uri(), "/v1/methods"))
            .await
            .unwrap_err();

        assert!(matches!(err, PrayerError::Api { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"code": 200}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let transport = local_transport(TransportOptions {
            timeout: Duration::from_millis(50),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        });
        let err = transport
            .get_json(&request(&mock_server.uri(), "/v1/methods"))
            .await
            .unwrap_err();

        assert!(matches!(err, PrayerError::Transport(TransportError::Timeout)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_https_only_transport_refuses_plain_http() {
        let mock_server = MockServer::start().await;

        let transport = HttpTransport::new(TransportOptions::default()).unwrap();
        let err = transport
            .get_json(&request(&mock_server.uri(), "/v1/methods"))
            .await
            .unwrap_err();

        assert!(matches!(err, PrayerError::Transport(_)));
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_redirect_to_disallowed_host_is_security_error() {
        let allowed = MockServer::start().await;
        let foreign = MockServer::start().await;
        // Same machine, but "localhost" is not on the allowlist.
        let foreign_base = foreign.uri().replace("127.0.0.1", "localhost");

        Mock::given(method("GET"))
            .and(path("/v1/methods"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("{}/steal", foreign_base)),
            )
            .mount(&allowed)
            .await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!("evil")))
            .mount(&foreign)
            .await;

        let err = local_transport(TransportOptions::default())
            .get_json(&request(&allowed.uri(), "/v1/methods"))
            .await
            .unwrap_err();

        match &err {
            PrayerError::Security(message) => assert!(message.contains("localhost"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retryable());
        assert!(foreign.received_requests().await.unwrap().is_empty());
    }

    async fn mount_redirect_chain(server: &MockServer, hops: usize) {
        for i in 0..hops {
            Mock::given(method("GET"))
                .and(path(format!("/hop/{}", i)))
                .respond_with(
                    ResponseTemplate::new(302)
                        .insert_header("Location", format!("{}/hop/{}", server.uri(), i + 1)),
                )
                .mount(server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path(format!("/hop/{}", hops)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 200})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_redirects_within_allowlist_are_followed_up_to_limit() {
        let mock_server = MockServer::start().await;
        mount_redirect_chain(&mock_server, DEFAULT_MAX_REDIRECTS).await;

        let body = local_transport(TransportOptions::default())
            .get_json(&request(&mock_server.uri(), "/hop/0"))
            .await
            .unwrap();

        assert_eq!(body["code"], 200);
    }

    #[tokio::test]
    async fn test_redirect_chain_over_limit_fails() {
        let mock_server = MockServer::start().await;
        mount_redirect_chain(&mock_server, DEFAULT_MAX_REDIRECTS + 1).await;

        let err = local_transport(TransportOptions::default())
            .get_json(&request(&mock_server.uri(), "/hop/0"))
            .await
            .unwrap_err();

        match err {
            PrayerError::Security(message) => assert!(message.contains("Too many redirects")),
            other => panic!("unexpected error: {other:?}"),
        }
        let last = format!("/hop/{}", DEFAULT_MAX_REDIRECTS + 1);
        let requests = mock_server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| r.url.path() != last));
    }
}
