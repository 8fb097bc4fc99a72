//! @ai:module:intent Run one logical API call with timeout, classification and retries
//! @ai:module:layer application
//! @ai:module:public_api RequestExecutor, CallConfig, AuthScheme, ExecuteOptions, ResponseBody, Attempt
//! @ai:module:stateless true

use crate::error::{ClassifiedError, ErrorKind, Result};
use crate::request::backoff::RetryPolicy;
use crate::request::classify;
use crate::request::transport::{
    HttpRequest, HttpResponse, HttpTransport, RequestBody, ReqwestTransport,
};
use chrono::{DateTime, Utc};
use reqwest::Method;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// @ai:intent How the credential is presented to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// Key sent verbatim in the named header
    Header(String),
}

/// @ai:intent Immutable per-client configuration
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub provider: String,
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub auth: AuthScheme,
}

impl CallConfig {
    /// @ai:intent Config with the default 60s timeout and bearer auth
    /// @ai:effects pure
    pub fn new(
        provider: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            auth: AuthScheme::Bearer,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn auth_header(&self) -> (String, String) {
        match &self.auth {
            AuthScheme::Bearer => (
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key),
            ),
            AuthScheme::Header(name) => (name.clone(), self.api_key.clone()),
        }
    }
}

/// @ai:intent Per-call options for execute
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub max_retries: u32,
    /// Payload fields checked before any network call
    pub required_fields: Vec<String>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            method: Method::POST,
            headers: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            required_fields: Vec::new(),
        }
    }
}

impl ExecuteOptions {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn require(mut self, fields: &[&str]) -> Self {
        self.required_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }
}

/// @ai:intent Parsed success body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Binary {
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Binary { .. } => None,
        }
    }
}

/// @ai:intent Outcome of one try, kept only for diagnostics
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success,
    Failed(ErrorKind),
}

/// @ai:intent Ephemeral record of one try within an execute call
#[derive(Debug, Clone)]
pub struct Attempt {
    pub index: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

/// @ai:intent Executor bound to one provider client's configuration
#[derive(Debug, Clone)]
pub struct RequestExecutor<T = ReqwestTransport> {
    config: CallConfig,
    retry: RetryPolicy,
    transport: T,
}

impl RequestExecutor<ReqwestTransport> {
    /// @ai:intent Executor over the real network
    /// @ai:effects pure
    pub fn new(config: CallConfig) -> Self {
        Self::with_transport(config, ReqwestTransport::new())
    }
}

impl<T: HttpTransport> RequestExecutor<T> {
    /// @ai:intent Executor with a custom transport (for testing)
    /// @ai:effects pure
    pub fn with_transport(config: CallConfig, transport: T) -> Self {
        Self {
            config,
            retry: RetryPolicy::default(),
            transport,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    pub fn provider(&self) -> &str {
        &self.config.provider
    }

    /// @ai:intent Perform a JSON call, retrying transient failures up to max_retries times
    /// @ai:post Ok after the first successful attempt, or exactly one ClassifiedError
    /// @ai:effects network, time
    pub async fn execute(
        &self,
        endpoint: &str,
        payload: Option<&serde_json::Value>,
        options: &ExecuteOptions,
    ) -> Result<ResponseBody> {
        let body = payload.cloned().map(RequestBody::Json);
        self.send(endpoint, body.as_ref(), options).await
    }

    /// @ai:intent Same as execute for any body encoding, including multipart forms
    /// @ai:effects network, time
    pub async fn send(
        &self,
        endpoint: &str,
        payload: Option<&RequestBody>,
        options: &ExecuteOptions,
    ) -> Result<ResponseBody> {
        let provider = self.provider();
        let fields = payload.map(RequestBody::fields);
        classify::require_fields(provider, fields.as_ref(), &options.required_fields)?;

        let url = self.config.url_for(endpoint);
        let mut index = 0;

        loop {
            let started_at = Utc::now();
            tracing::debug!(provider, %url, attempt = index, "issuing request");

            let outcome = self.attempt(&url, payload, options).await;
            let attempt = Attempt {
                index,
                started_at,
                outcome: match &outcome {
                    Ok(_) => AttemptOutcome::Success,
                    Err(err) => AttemptOutcome::Failed(err.kind),
                },
            };
            tracing::debug!(provider, ?attempt, "attempt settled");

            let err = match outcome {
                Ok(body) => {
                    if index > 0 {
                        tracing::debug!(provider, "request succeeded after {} attempts", index + 1);
                    }
                    return Ok(body);
                }
                Err(err) => err,
            };

            if !err.kind.is_retryable() {
                return Err(err);
            }

            if index >= options.max_retries {
                tracing::warn!(
                    provider,
                    "max retries ({}) exceeded. Last error: {}",
                    options.max_retries,
                    err
                );
                return Err(err);
            }

            let delay = match (err.kind, err.details.retry_after) {
                (ErrorKind::RateLimit, Some(hint)) => hint.min(classify::MAX_RETRY_AFTER),
                _ => self.retry.delay(index),
            };
            tracing::warn!(
                provider,
                "attempt {} failed: {}. Retrying in {:?}...",
                index + 1,
                err,
                delay
            );

            tokio::time::sleep(delay).await;
            index += 1;
        }
    }

    /// @ai:intent One try under the configured timeout; dropping the future on timeout aborts the call
    /// @ai:effects network
    async fn attempt(
        &self,
        url: &str,
        payload: Option<&RequestBody>,
        options: &ExecuteOptions,
    ) -> Result<ResponseBody> {
        let provider = self.provider();
        let mut headers = vec![self.config.auth_header()];
        headers.extend(options.headers.iter().cloned());

        let request = HttpRequest {
            method: options.method.clone(),
            url: url.to_string(),
            headers,
            body: payload.cloned(),
        };

        let response =
            match tokio::time::timeout(self.config.timeout, self.transport.send(request)).await {
                Err(_) => return Err(classify::timed_out(provider, self.config.timeout)),
                Ok(Err(err)) => return Err(classify::classify_transport(provider, &err)),
                Ok(Ok(response)) => response,
            };

        if !response.is_success() {
            return Err(classify::classify_response(provider, &response));
        }

        parse_success(provider, response)
    }
}

fn parse_success(provider: &str, response: HttpResponse) -> Result<ResponseBody> {
    let content_type = response
        .header("content-type")
        .unwrap_or_default()
        .to_string();

    if response.body.is_empty() {
        return Ok(ResponseBody::Json(serde_json::Value::Null));
    }

    if content_type.is_empty() || content_type.contains("json") {
        return serde_json::from_slice(&response.body)
            .map(ResponseBody::Json)
            .map_err(|e| {
                ClassifiedError::new(
                    ErrorKind::Generic,
                    provider,
                    format!("malformed response body: {e}"),
                )
                .with_status(response.status)
            });
    }

    Ok(ResponseBody::Binary {
        content_type,
        bytes: response.body,
    })
}
