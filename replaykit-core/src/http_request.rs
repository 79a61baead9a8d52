use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};

use crate::error::ReplayKitError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A simple wrapper on an HTTP client for making requests against the API
/// base URL. Sets sensible defaults such as timeouts and user-agent.
pub(crate) struct Request {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl Request {
    /// Initializes a new `Request` instance for the given base URL.
    pub(crate) fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// The API base URL, without a trailing slash.
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins `path` onto the base URL.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Creates a request builder with defaults applied.
    pub(crate) fn req(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("replaykit-core/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    /// Creates a GET request builder with defaults applied.
    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.req(Method::GET, path)
    }

    /// Creates a POST request builder with defaults applied.
    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.req(Method::POST, path)
    }

    /// Creates a DELETE request builder with defaults applied.
    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.req(Method::DELETE, path)
    }

    /// Sends a request built by `req`/`get`/`post`/`delete`, mapping
    /// transport-level failures. Response statuses are not inspected here.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, ReplayKitError> {
        let (client, request) = request_builder.build_split();
        let request = request.map_err(|err| ReplayKitError::Network {
            url: err
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            error: format!("request build failed: {err}"),
        })?;
        let url = request.url().to_string();

        client
            .execute(request)
            .await
            .map_err(|err| ReplayKitError::Network {
                url,
                error: format!("request failed: {err}"),
            })
    }
}
