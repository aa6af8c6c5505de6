//! Rate-limited request execution.
//!
//! [`RateLimitedClient`] executes one logical request against the external
//! API and returns a parsed response or a classified [`ApiFailure`], hiding
//! retry mechanics from callers. Calls are serialized per client instance
//! (one client is scoped to one account) and paced by a fixed inter-request
//! delay so the client pre-empts rate limiting instead of only reacting
//! to it.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ApiFailure, Result};
use crate::retry::RetryPolicy;

/// HTTP request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method for a logical API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One logical API request: method, path, optional query and JSON body.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Raw response from the transport: status code plus body text.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Transport seam. Production uses [`ReqwestSender`]; tests script
/// responses without a network.
pub trait HttpSend: Send + Sync {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse>;
}

/// Blocking `reqwest` transport carrying bearer auth against one account.
pub struct ReqwestSender {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ReqwestSender {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiFailure::from)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

impl HttpSend for ReqwestSender {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        let mut builder = builder
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().map_err(ApiFailure::from)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(ApiFailure::from)?;
        Ok(RawResponse { status, body })
    }
}

/// Resilient, serialized, paced request executor.
pub struct RateLimitedClient {
    sender: Box<dyn HttpSend>,
    policy: RetryPolicy,
    inter_request_delay: Duration,
    /// Completion instant of the most recent request. Holding this lock for
    /// the whole of [`Self::execute`] is what serializes calls per account.
    last_request: Mutex<Option<Instant>>,
}

impl RateLimitedClient {
    pub fn new(
        sender: Box<dyn HttpSend>,
        policy: RetryPolicy,
        inter_request_delay: Duration,
    ) -> Self {
        Self {
            sender,
            policy,
            inter_request_delay,
            last_request: Mutex::new(None),
        }
    }

    /// Convenience constructor for the production transport.
    pub fn over_http(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        policy: RetryPolicy,
        inter_request_delay: Duration,
    ) -> Result<Self> {
        let sender = ReqwestSender::new(base_url, api_key)?;
        Ok(Self::new(Box::new(sender), policy, inter_request_delay))
    }

    /// Execute one logical request.
    ///
    /// 429 responses are retried up to the policy's rate-limit bound with
    /// exponential backoff (1s, 2s, 4s by default), then surface as
    /// [`ApiFailure::RateLimited`]. 5xx and transport failures are retried
    /// on their own bound. 401/403 map to [`ApiFailure::Unauthorized`];
    /// any other 4xx fails immediately with the response detail preserved.
    pub fn execute(&self, request: &ApiRequest) -> Result<Value> {
        let mut last_request = self.last_request.lock().unwrap();
        let mut rate_retries = 0u32;
        let mut server_retries = 0u32;
        let mut attempts = 0u32;
        loop {
            self.pace(*last_request);
            attempts += 1;
            let sent = self.sender.send(request);
            *last_request = Some(Instant::now());
            let response = match sent {
                Ok(response) => response,
                Err(failure) => {
                    if server_retries < self.policy.max_server_error_retries {
                        let delay = self.policy.backoff_delay(server_retries);
                        warn!(path = %request.path, %failure, ?delay, "transport failure, retrying");
                        server_retries += 1;
                        thread::sleep(delay);
                        continue;
                    }
                    return Err(failure);
                }
            };
            match response.status {
                200..=299 => {
                    debug!(path = %request.path, attempts, "request succeeded");
                    return parse_body(&response.body);
                }
                429 => {
                    if rate_retries < self.policy.max_rate_limit_retries {
                        let delay = self.policy.backoff_delay(rate_retries);
                        warn!(path = %request.path, ?delay, "rate limited (429), backing off");
                        rate_retries += 1;
                        thread::sleep(delay);
                        continue;
                    }
                    return Err(ApiFailure::RateLimited { attempts });
                }
                401 | 403 => return Err(ApiFailure::Unauthorized),
                400..=499 => {
                    return Err(ApiFailure::Invalid {
                        status: response.status,
                        message: response.body,
                    });
                }
                500..=599 => {
                    if server_retries < self.policy.max_server_error_retries {
                        let delay = self.policy.backoff_delay(server_retries);
                        warn!(
                            path = %request.path,
                            status = response.status,
                            ?delay,
                            "server error, retrying"
                        );
                        server_retries += 1;
                        thread::sleep(delay);
                        continue;
                    }
                    return Err(ApiFailure::Server {
                        status: response.status,
                        message: response.body,
                    });
                }
                other => {
                    return Err(ApiFailure::Invalid {
                        status: other,
                        message: response.body,
                    });
                }
            }
        }
    }

    /// Wait out the remainder of the inter-request delay since the previous
    /// request. Same spacing as sleeping after every call, without the
    /// wasted trailing sleep.
    fn pace(&self, last_request: Option<Instant>) {
        if self.inter_request_delay.is_zero() {
            return;
        }
        if let Some(previous) = last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.inter_request_delay {
                thread::sleep(self.inter_request_delay - elapsed);
            }
        }
    }
}

fn parse_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(ApiFailure::from)
}
