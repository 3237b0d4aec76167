//! Request dispatch.
//!
//! The [`Client`] owns the rate limit registry and pushes every REST call
//! through the same pipeline: resolve the route's bucket, take the bucket
//! gate, wait out any global lockout, transmit, then interpret the response
//! headers to keep the limiters in step with what Discord reports. Rate limit
//! responses are retried transparently; callers only ever see genuine API
//! errors or exhausted transport retries.

pub mod api;
mod error;

pub use self::error::Error;

use std::{sync::Arc, time::Duration};

use once_cell::sync::Lazy;
use reqwest::{
    Response, StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
    multipart::{Form, Part},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::time::sleep;
use urlencoding::encode;

use crate::{
    cache::Cache,
    config::Config,
    ratelimit::{Buckets, Limiter, headers::RateLimitHeaders},
    route::Route,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Shared HTTP transport for all client instances.
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Attempts made per request before giving up, counting rate limit waits and
/// transport retries alike.
const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Structure of an error body returned by the Discord API.
#[derive(Debug, Deserialize)]
struct ErrorMessage {
    code: u64,
    message: String,
}

/// Body of a 429 response, used when the retry delay is absent from the
/// headers.
#[derive(Debug, Deserialize)]
struct RateLimitedBody {
    retry_after: f64,
}

/// A file to upload with a request.
#[derive(Debug, Clone)]
pub struct Attachment {
    filename: String,
    data: Vec<u8>,
}

/// Options accompanying a single request: JSON body, query parameters, audit
/// log reason and file attachments.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    json: Option<Value>,
    query: Vec<(String, String)>,
    reason: Option<String>,
    files: Vec<Attachment>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the JSON body. Sent as `payload_json` when attachments are also
    /// present.
    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    /// Appends a query string parameter.
    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_owned(), value.to_string()));
        self
    }

    /// Sets the audit log reason, sent percent-encoded in the
    /// `X-Audit-Log-Reason` header.
    pub fn reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_owned());
        self
    }

    /// Adds a file attachment. Attachments switch the request to
    /// `multipart/form-data`.
    pub fn file(mut self, filename: &str, data: Vec<u8>) -> Self {
        self.files.push(Attachment {
            filename: filename.to_owned(),
            data,
        });
        self
    }
}

/// Discord REST client.
///
/// Owns the rate limit registry and the entity cache; cheap to share behind
/// an `Arc`. All endpoint wrappers funnel into [`Client::request`].
pub struct Client {
    http: reqwest::Client,
    token: String,
    base_url: String,
    buckets: Buckets,
    max_attempts: usize,
    cache: Cache,
}

impl Client {
    /// Creates a client authenticating with the given bot token.
    pub fn new(token: &str) -> Self {
        Client {
            http: HTTP_CLIENT.clone(),
            token: token.to_owned(),
            base_url: crate::API_BASE.to_owned(),
            buckets: Buckets::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cache: Cache::default(),
        }
    }

    /// Creates a client from a loaded configuration file.
    pub fn from_config(config: &Config) -> Self {
        Client {
            http: HTTP_CLIENT.clone(),
            token: config.token.clone(),
            base_url: config.api_base.clone(),
            buckets: Buckets::new(),
            max_attempts: config.max_attempts,
            cache: Cache::new(&config.cache),
        }
    }

    /// Overrides the API base URL. Intended for tests against a local server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    /// Overrides the per-request attempt bound.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Entity cache fed by the endpoint wrappers.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Performs a request and deserializes the response body.
    ///
    /// # Errors
    ///
    /// Same as [`Client::request`], plus a JSON error when the body does not
    /// match `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        route: Route,
        options: RequestOptions,
    ) -> Result<T> {
        let body = self.request(route, options).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Performs a request, coordinating with Discord's rate limits, and
    /// returns the raw response body.
    ///
    /// Rate limited attempts are waited out and retried without surfacing to
    /// the caller; transient transport failures are retried with linear
    /// backoff. Both count against the attempt bound.
    ///
    /// # Errors
    ///
    /// - [`Error::Api`] when Discord reports a non-rate-limit error.
    /// - [`Error::Transport`] when the transport fails without attempts left.
    /// - [`Error::RetriesExhausted`] when every attempt was consumed by rate
    ///   limits or backoff.
    pub async fn request(&self, route: Route, options: RequestOptions) -> Result<Vec<u8>> {
        let key = self.buckets.bucket_key(&route);
        let limiter = self.buckets.limiter(&key);

        tracing::debug!(%route, bucket = %key, "dispatching request");
        limiter.acquire().await;

        // The gate is released on success inside the attempt loop (possibly
        // deferred until the window resets); every error path releases it
        // here so a failure never wedges the bucket.
        match self.run(&route, &options, &limiter).await {
            Ok(body) => Ok(body),
            Err(err) => {
                limiter.release();
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        route: &Route,
        options: &RequestOptions,
        limiter: &Arc<Limiter>,
    ) -> Result<Vec<u8>> {
        for attempt in 0..self.max_attempts {
            self.buckets.global().wait().await;

            let response = match self.transmit(route, options).await {
                Ok(response) => response,
                Err(err) if is_transient(&err) && attempt + 1 < self.max_attempts => {
                    let backoff = Duration::from_secs(2 * attempt as u64 + 1);
                    tracing::warn!(
                        %route,
                        attempt,
                        "transient transport error, retrying in {backoff:?}: {err}"
                    );
                    sleep(backoff).await;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let status = response.status();
            let limits = RateLimitHeaders::parse(response.headers());

            if let Some(hash) = &limits.bucket {
                self.buckets.record_hash(route.signature(), hash.clone());
            }

            let body = response.bytes().await?;

            if status == StatusCode::TOO_MANY_REQUESTS {
                let delay = retry_delay(&limits, &body);

                if limits.global {
                    tracing::warn!(%route, "globally rate limited, locking all buckets for {delay:?}");
                    self.buckets.global().engage(delay);
                } else {
                    tracing::warn!(%route, attempt, "rate limited, retrying in {delay:?}");
                }

                // No point waiting out the cooldown when no attempt follows.
                if attempt + 1 < self.max_attempts {
                    sleep(delay).await;
                }

                continue;
            }

            if status.is_success() {
                if limits.remaining == Some(0) {
                    // Window exhausted: hand the result back now but keep the
                    // gate closed until Discord's window resets.
                    let reset = limits.reset_after.unwrap_or_default();
                    tracing::debug!(%route, "bucket exhausted, reopening in {reset:?}");
                    limiter.arm(reset);
                } else {
                    limiter.release();
                }

                return Ok(body.to_vec());
            }

            return Err(api_error(status, &body));
        }

        Err(Error::RetriesExhausted {
            route: route.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Builds and sends one attempt over the transport.
    async fn transmit(&self, route: &Route, options: &RequestOptions) -> reqwest::Result<Response> {
        let url = format!("{}{}", self.base_url, route.path());

        let mut builder = self
            .http
            .request(route.method().clone(), url)
            .header(AUTHORIZATION, format!("Bot {}", self.token))
            .header(USER_AGENT, crate::USER_AGENT);

        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }

        if let Some(reason) = &options.reason {
            builder = builder.header("X-Audit-Log-Reason", encode(reason).into_owned());
        }

        if !options.files.is_empty() {
            // Attachments are owned bytes so the form can be rebuilt for
            // every retry attempt.
            let mut form = Form::new();

            if let Some(json) = &options.json {
                form = form.text("payload_json", json.to_string());
            }

            for (index, file) in options.files.iter().enumerate() {
                let part = Part::bytes(file.data.clone()).file_name(file.filename.clone());
                form = form.part(format!("files[{index}]"), part);
            }

            builder = builder.multipart(form);
        } else if let Some(json) = &options.json {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(json.to_string());
        }

        builder.send().await
    }
}

/// Whether a transport error is worth retrying.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Delay before retrying a 429, from the headers with the body's
/// `retry_after` field as a fallback.
fn retry_delay(limits: &RateLimitHeaders, body: &[u8]) -> Duration {
    if let Some(delay) = limits.reset_after {
        return delay;
    }

    serde_json::from_slice::<RateLimitedBody>(body)
        .ok()
        .and_then(|limited| Duration::try_from_secs_f64(limited.retry_after).ok())
        .unwrap_or_default()
}

/// Builds the structured error for a non-2xx, non-429 response.
fn api_error(status: StatusCode, body: &[u8]) -> Error {
    let Ok(ErrorMessage { code, message }) = serde_json::from_slice(body) else {
        return Error::Api {
            status: status.as_u16(),
            code: 0,
            message: String::from_utf8_lossy(body).into_owned(),
        };
    };

    Error::Api {
        status: status.as_u16(),
        code,
        message,
    }
}
