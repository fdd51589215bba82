use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use crate::{
    intercept::Interceptor,
    params::encode_form,
    retry,
    timing::measure,
    types::{ApiResponse, Body, HasStatus},
    HarnessError, HarnessOptions, Result,
};

#[derive(Clone)]
/// HTTP request context shared by a test suite.
///
/// Joins paths onto a base URL, applies the configured timeout and auth
/// header, sends through the retry executor, stamps each response with its
/// duration, and records the exchange into an attached [`Interceptor`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    authorization: Option<String>,
    options: HarnessOptions,
    interceptor: Option<Arc<Interceptor>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("options", &self.options)
            .finish()
    }
}

enum Payload<'a> {
    Empty,
    Json(&'a Value),
    Form(&'a [(&'a str, &'a str)]),
}

impl Payload<'_> {
    fn preview(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Json(value) => Some(value.to_string()),
            Self::Form(pairs) => encode_form(pairs).ok(),
        }
    }

    fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Json(_) => Some("application/json"),
            Self::Form(_) => Some("application/x-www-form-urlencoded"),
        }
    }
}

/// Final response plus the raw body text needed for interception.
struct Exchange {
    response: ApiResponse,
    raw: String,
    content_type: Option<String>,
}

impl HasStatus for Exchange {
    fn status_code(&self) -> u16 {
        self.response.status
    }
}

impl ApiClient {
    /// Creates an unauthenticated client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            authorization: None,
            options: HarnessOptions::default(),
            interceptor: None,
        }
    }

    /// Creates a client sending a bearer token.
    ///
    /// If the token is missing the `Bearer ` prefix, it is added
    /// automatically.
    pub fn with_bearer(base_url: impl Into<String>, token: impl AsRef<str>) -> Self {
        let mut client = Self::new(base_url);
        client.authorization = Some(normalize_bearer_authorization(token.as_ref()));
        client
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `APIHARNESS_BASE_URL` — base URL of the system under test (required)
    /// - `APIHARNESS_TOKEN` — bearer token (optional, prefix optional)
    /// - `APIHARNESS_TIMEOUT_MS` — per-request timeout override (optional)
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("APIHARNESS_BASE_URL").map_err(|_| {
            HarnessError::Config("missing APIHARNESS_BASE_URL environment variable".to_owned())
        })?;
        if base_url.trim().is_empty() {
            return Err(HarnessError::Config(
                "APIHARNESS_BASE_URL is set but empty".to_owned(),
            ));
        }

        let mut client = Self::new(base_url);

        if let Ok(token) = std::env::var("APIHARNESS_TOKEN") {
            if !token.trim().is_empty() {
                client.authorization = Some(normalize_bearer_authorization(&token));
            }
        }
        if let Ok(raw) = std::env::var("APIHARNESS_TIMEOUT_MS") {
            let timeout_ms = raw.parse::<u64>().map_err(|err| {
                HarnessError::Config(format!("invalid APIHARNESS_TIMEOUT_MS '{raw}': {err}"))
            })?;
            client.options.timeout_ms = timeout_ms;
        }

        Ok(client)
    }

    /// Applies timeout and retry options.
    pub fn with_options(mut self, options: HarnessOptions) -> Self {
        self.options = options;
        self
    }

    /// Attaches an interceptor that captures every call issued here.
    pub fn with_interceptor(mut self, interceptor: Arc<Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::GET, path, Payload::Empty).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, path, Payload::Empty).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::POST, path, Payload::Json(body)).await
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::PUT, path, Payload::Json(body)).await
    }

    pub async fn post_form(&self, path: &str, pairs: &[(&str, &str)]) -> Result<ApiResponse> {
        self.send(Method::POST, path, Payload::Form(pairs)).await
    }

    async fn send(&self, method: Method, path: &str, payload: Payload<'_>) -> Result<ApiResponse> {
        let url = self.join_url(path);
        let token = self.interceptor.as_ref().map(|interceptor| {
            // Authorization never reaches the log.
            let mut request_headers = HeaderMap::new();
            if let Some(content_type) = payload.content_type() {
                if let Ok(value) = content_type.parse() {
                    request_headers.insert(CONTENT_TYPE, value);
                }
            }
            interceptor.log_request(
                method.as_str(),
                &url,
                &request_headers,
                payload.preview().as_deref(),
            )
        });

        let payload = &payload;
        let outcome = retry::retry(&self.options.retry, |_attempt| {
            let method = method.clone();
            let url = url.clone();
            async move { self.execute_once(method, &url, payload).await }
        })
        .await;

        match outcome {
            Ok(exchange) => {
                if let (Some(interceptor), Some(token)) = (self.interceptor.as_ref(), token) {
                    interceptor.log_response(
                        token,
                        exchange.response.status,
                        &exchange.response.headers,
                        exchange.content_type.as_deref(),
                        &exchange.raw,
                    );
                }
                Ok(exchange.response)
            }
            Err(err) => {
                if let (Some(interceptor), Some(token)) = (self.interceptor.as_ref(), token) {
                    interceptor.log_error(token, err.to_string());
                }
                Err(err)
            }
        }
    }

    async fn execute_once(
        &self,
        method: Method,
        url: &str,
        payload: &Payload<'_>,
    ) -> Result<Exchange> {
        let timed = measure(|| async {
            let mut builder = self
                .http
                .request(method, url)
                .timeout(Duration::from_millis(self.options.timeout_ms));
            if let Some(authorization) = &self.authorization {
                builder = builder.header(header::AUTHORIZATION, authorization);
            }
            builder = match payload {
                Payload::Empty => builder,
                Payload::Json(value) => builder.json(value),
                Payload::Form(pairs) => builder.form(pairs),
            };

            let response = builder.send().await.map_err(HarnessError::Transport)?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let raw = response.text().await.map_err(HarnessError::Transport)?;
            Ok((status, headers, raw))
        })
        .await?;

        let (status, headers, raw) = timed.value;
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        Ok(Exchange {
            response: ApiResponse {
                status,
                headers,
                body: Body::from_raw(content_type.as_deref(), &raw),
                duration: timed.elapsed,
            },
            raw,
            content_type,
        })
    }

    fn join_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
