//! Retrying request executor.
//!
//! # Responsibilities
//! - Send one logical request, repeating it on transient failures
//! - Bound every attempt with a deadline (classified as `TIMEOUT`); the
//!   decoding variants read the body inside that deadline
//! - Turn non-2xx responses into `RequestError::Http` with the status preserved
//! - Tag all attempts of a request with the same `x-request-id`
//!
//! The executor holds no per-request state. Settings can be swapped at
//! runtime; a request keeps the snapshot it started with.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::{validate_retries, ClientConfig, RetryConfig, TimeoutConfig};
use crate::http::error::{RequestError, TransientErrors};
use crate::http::request::{new_request_id, Endpoint, X_REQUEST_ID};
use crate::observability::metrics;
use crate::resilience::timeouts::{effective_timeout, with_timeout, Elapsed};
use crate::resilience::{RetryPolicy, RetryPredicate, Sleeper, TokioSleeper};

/// Error bodies longer than this are cut before being stored in the error.
const MAX_ERROR_BODY: usize = 1024;

/// Runtime-reloadable executor settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSettings {
    pub retries: RetryConfig,
    pub timeouts: TimeoutConfig,
}

/// Sends requests with per-attempt timeouts and retry/backoff.
pub struct HttpExecutor {
    client: Client,
    settings: ArcSwap<ExecutorSettings>,
    predicate: Arc<dyn RetryPredicate<RequestError>>,
    sleeper: Arc<dyn Sleeper>,
}

impl HttpExecutor {
    /// Build an executor with its own connection pool.
    ///
    /// The connect timeout is fixed here; a later [`reload`](Self::reload)
    /// only changes retries and the per-attempt deadline.
    pub fn new(retries: RetryConfig, timeouts: TimeoutConfig) -> Result<Self, RequestError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| RequestError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, retries, timeouts))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, RequestError> {
        Self::new(config.retries.clone(), config.timeouts.clone())
    }

    pub fn with_client(client: Client, retries: RetryConfig, timeouts: TimeoutConfig) -> Self {
        Self {
            client,
            settings: ArcSwap::from_pointee(ExecutorSettings { retries, timeouts }),
            predicate: Arc::new(TransientErrors),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the default transience rules.
    pub fn with_predicate(mut self, predicate: impl RetryPredicate<RequestError> + 'static) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn settings(&self) -> Arc<ExecutorSettings> {
        self.settings.load_full()
    }

    /// Swap retry and timeout settings for requests started from now on.
    pub fn reload(&self, retries: RetryConfig, timeouts: TimeoutConfig) {
        tracing::info!(
            max_retries = retries.max_retries,
            base_delay_ms = retries.base_delay_ms,
            request_timeout_ms = timeouts.request_ms,
            "Executor settings reloaded"
        );
        self.settings
            .store(Arc::new(ExecutorSettings { retries, timeouts }));
    }

    /// Perform `endpoint`, retrying transient failures.
    ///
    /// Resolves with the first 2xx response, or fails with the last error.
    /// Only the status line and headers are read under the attempt deadline;
    /// use [`execute_with`](Self::execute_with) to bound the body too.
    pub async fn execute(&self, endpoint: &Endpoint) -> Result<Response, RequestError> {
        self.execute_with(endpoint, |response| async move { Ok(response) })
            .await
    }

    /// Perform `endpoint` and decode the JSON body.
    ///
    /// The body is read inside each attempt, so a stalled or cut-off body is
    /// a `TIMEOUT` or `NETWORK_ERROR` and is retried like any other.
    pub async fn execute_json<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T, RequestError> {
        self.execute_with(endpoint, |response| async move {
            let body = read_body(response).await?;
            serde_json::from_slice(&body).map_err(|e| RequestError::InvalidResponse(e.to_string()))
        })
        .await
    }

    /// Perform `endpoint` and read the body as text.
    pub async fn execute_text(&self, endpoint: &Endpoint) -> Result<(StatusCode, String), RequestError> {
        self.execute_with(endpoint, |response| async move {
            let status = response.status();
            let body = read_body(response).await?;
            let body = String::from_utf8(body)
                .map_err(|e| RequestError::InvalidResponse(format!("body is not UTF-8: {}", e)))?;
            Ok((status, body))
        })
        .await
    }

    /// Perform `endpoint`, running `decode` on the 2xx response within the
    /// same attempt deadline and retry loop as the exchange itself.
    pub async fn execute_with<T, D, DFut>(&self, endpoint: &Endpoint, decode: D) -> Result<T, RequestError>
    where
        D: Fn(Response) -> DFut,
        DFut: Future<Output = Result<T, RequestError>>,
    {
        let settings = self.settings.load_full();
        let retry = match &endpoint.retry {
            Some(retry) => {
                validate_retries(retry).map_err(|errors| {
                    let reasons: Vec<_> = errors.iter().map(ToString::to_string).collect();
                    RequestError::InvalidRequest(format!("invalid retry override: {}", reasons.join(", ")))
                })?;
                retry.clone()
            }
            None => settings.retries.clone(),
        };
        let limit = effective_timeout(endpoint.timeout, settings.timeouts.request());
        let policy = RetryPolicy::from_parts(retry, self.predicate.clone(), self.sleeper.clone());

        let request_id = new_request_id();
        let request_id = request_id.as_str();
        let decode = &decode;
        let started = Instant::now();
        let mut attempt = 0u32;

        let result = policy
            .execute(move || {
                attempt += 1;
                self.attempt(endpoint, request_id, limit, attempt, decode)
            })
            .await;

        match &result {
            Ok(_) => {
                tracing::debug!(
                    request_id = %request_id,
                    method = %endpoint.method,
                    url = %endpoint.url,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Request succeeded"
                );
                metrics::record_request(endpoint.method.as_str(), "ok", started);
            }
            Err(err) => {
                metrics::record_request(endpoint.method.as_str(), &err.code().to_string(), started);
            }
        }
        result
    }

    async fn attempt<T, D, DFut>(
        &self,
        endpoint: &Endpoint,
        request_id: &str,
        limit: Duration,
        attempt: u32,
        decode: &D,
    ) -> Result<T, RequestError>
    where
        D: Fn(Response) -> DFut,
        DFut: Future<Output = Result<T, RequestError>>,
    {
        let mut request = self
            .client
            .request(endpoint.method.clone(), endpoint.url.clone())
            .headers(endpoint.headers.clone())
            .header(X_REQUEST_ID, request_id);
        if let Some(body) = &endpoint.body {
            request = request.body(body.clone());
        }

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| RequestError::from_reqwest(e, limit))?;
            let response = into_result(response).await?;
            decode(response).await
        };
        let outcome = match with_timeout(limit, exchange).await {
            Ok(result) => result,
            Err(Elapsed(after)) => Err(RequestError::Timeout(after)),
        };

        if let Err(err) = &outcome {
            tracing::warn!(
                request_id = %request_id,
                attempt,
                method = %endpoint.method,
                url = %endpoint.url,
                code = %err.code(),
                error = %err,
                "Request attempt failed"
            );
        }
        outcome
    }
}

impl std::fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExecutor")
            .field("settings", &self.settings.load_full())
            .finish()
    }
}

/// Pass 2xx responses through; read the body of anything else into an error.
async fn into_result(response: Response) -> Result<Response, RequestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RequestError::Http {
        status: status.as_u16(),
        body: truncate_body(body),
    })
}

/// Read a whole body. reqwest tags transport failures here as decode errors,
/// so every failure is reported as a (transient) network error.
async fn read_body(response: Response) -> Result<Vec<u8>, RequestError> {
    response
        .bytes()
        .await
        .map(|body| body.to_vec())
        .map_err(|e| RequestError::Network(format!("failed to read response body: {}", e)))
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}
