//! Blocking HTTP client shared by the provider adapters.
//!
//! Retries timeouts, connection failures, 429 and 5xx responses with
//! exponential backoff. Authentication failures and other 4xx responses are
//! returned immediately.

use reqwest::blocking::{RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::FetchError;
use crate::config::HttpConfig;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Upper bound for a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Thin wrapper around `reqwest::blocking::Client` with retry policy.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::blocking::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        })
    }

    /// GET `url` with query parameters and decode the JSON body.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let resp = self.send_with_retry(url, || self.client.get(url).query(query))?;
        decode_json(url, resp)
    }

    /// POST a form to `url` and decode the JSON body.
    pub fn post_form_json<T: DeserializeOwned>(
        &self,
        url: &str,
        referer: &str,
        form: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let resp = self.send_with_retry(url, || {
            self.client
                .post(url)
                .header(reqwest::header::REFERER, referer)
                .form(form)
        })?;
        decode_json(url, resp)
    }

    /// Send a request, rebuilding it for every attempt.
    fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response, FetchError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.base_delay, attempt);
                tracing::debug!(%url, attempt, ?delay, "retrying");
                std::thread::sleep(delay);
            }

            match build().send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        return Ok(resp);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(FetchError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(FetchError::AuthenticationRequired(format!(
                            "HTTP {status} from {}",
                            host_of(url)
                        )));
                    }

                    if status.is_server_error() {
                        last_error = Some(FetchError::Http {
                            status: status.as_u16(),
                            message: format!("server error from {}", host_of(url)),
                        });
                        continue;
                    }

                    // remaining 4xx: not worth retrying
                    let body = resp.text().unwrap_or_default();
                    return Err(FetchError::Http {
                        status: status.as_u16(),
                        message: truncate(&body, 200),
                    });
                }
                Err(e) => {
                    let retryable = e.is_connect() || e.is_timeout();
                    let err = FetchError::NetworkUnreachable(e.without_url().to_string());
                    if retryable {
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Other("max retries exceeded".into())))
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`,
/// saturating at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

fn decode_json<T: DeserializeOwned>(url: &str, resp: Response) -> Result<T, FetchError> {
    resp.json().map_err(|e| {
        FetchError::ResponseFormatChanged(format!(
            "failed to parse response from {}: {}",
            host_of(url),
            e.without_url()
        ))
    })
}

/// Host part of a URL, so API keys in query strings never reach a log line.
fn host_of(url: &str) -> &str {
    let rest = url.split("://").nth(1).unwrap_or(url);
    rest.split(['/', '?']).next().unwrap_or(rest)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
