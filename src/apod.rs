use std::{thread, time::Duration};

use serde_json::{Map, Value};
use time::{macros::format_description, Date};

use crate::error::{ConfigError, Failure, FetchError};
use crate::http::{HttpRequest, MinreqTransport, Transport};

pub const API_URL: &str = "https://api.nasa.gov/planetary/apod";

/// APOD metadata exactly as the API returned it.
///
/// Only `url` is guaranteed. Everything else (`hdurl`, `title`, `explanation`,
/// `copyright`, ...) is kept as-is and written back out unchanged.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Decode a response body. Anything but a JSON object with a string `url` is rejected.
    pub fn from_slice(body: &[u8]) -> Result<Metadata, Failure> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Failure::Malformed(format!("body is not JSON: {}", e)))?;
        let map = match value {
            Value::Object(m) => m,
            other => {
                return Err(Failure::Malformed(format!("expected a JSON object, got {}", other)))
            }
        };
        match map.get("url") {
            Some(Value::String(_)) => Ok(Metadata(map)),
            _ => Err(Failure::Malformed("'url' field missing".to_string())),
        }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn url(&self) -> &str {
        self.str_field("url").unwrap_or_default()
    }

    pub fn hdurl(&self) -> Option<&str> {
        self.str_field("hdurl")
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    pub fn media_type(&self) -> Option<&str> {
        self.str_field("media_type")
    }

    pub fn date(&self) -> Option<&str> {
        self.str_field("date")
    }

    /// The best image available: `hdurl` when present, `url` otherwise.
    pub fn image_url(&self) -> &str {
        self.hdurl().filter(|u| !u.is_empty()).unwrap_or_else(|| self.url())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Bounded retry with doubling delays: `base`, `2·base`, `4·base`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { attempts: 3, base_delay: Duration::from_secs(5) }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed `attempt` (1-based) before the next one.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub retries: u32,
    /// Per-attempt timeout in seconds.
    pub timeout: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions { retries: 3, timeout: 120 }
    }
}

impl FetchOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retries < 1 {
            return Err(ConfigError::InvalidRetries);
        }
        if self.timeout == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Check that `date` is a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(date: &str) -> Result<Date, ConfigError> {
    Date::parse(date, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ConfigError::InvalidDate(date.to_string()))
}

/// Today's date (UTC) as `YYYY-MM-DD`.
pub fn today() -> String {
    let d = time::OffsetDateTime::now_utc().date();
    d.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| d.to_string())
}

/// Retrieves APOD metadata, retrying transient failures.
pub struct Fetcher<T: Transport> {
    transport: T,
    endpoint: String,
    policy: RetryPolicy,
    timeout: u64,
}

impl Fetcher<MinreqTransport> {
    pub fn new(options: FetchOptions) -> Result<Self, ConfigError> {
        Fetcher::with_transport(MinreqTransport::new(), options)
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn with_transport(transport: T, options: FetchOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Fetcher {
            transport,
            endpoint: API_URL.to_string(),
            policy: RetryPolicy { attempts: options.retries, ..RetryPolicy::default() },
            timeout: options.timeout,
        })
    }

    /// Point the fetcher at a different metadata URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn fetch(&self, api_key: &str, date: Option<&str>) -> Result<Metadata, FetchError> {
        self.fetch_with_sleep(api_key, date, thread::sleep)
    }

    /// Same as [`Fetcher::fetch`], with the pause between attempts handed to `sleep`.
    pub fn fetch_with_sleep<S>(
        &self,
        api_key: &str,
        date: Option<&str>,
        mut sleep: S,
    ) -> Result<Metadata, FetchError>
    where
        S: FnMut(Duration),
    {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey.into());
        }
        let mut request = HttpRequest::get(self.endpoint.as_str(), self.timeout)
            .with_param("api_key", api_key);
        if let Some(d) = date {
            parse_date(d)?;
            request = request.with_param("date", d);
        }

        let total = self.policy.attempts;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.attempt(&request) {
                Ok(meta) => return Ok(meta),
                Err(f) => f,
            };
            if !failure.is_transient() {
                log::debug!("Attempt {}/{} failed: {}. Not retrying", attempt, total, failure);
                return Err(FetchError::Fatal(failure));
            }
            if attempt >= total {
                return Err(FetchError::Transient { attempts: attempt, last: failure });
            }
            let backoff = self.policy.backoff(attempt);
            log::warn!(
                "Attempt {}/{} failed: {}. Retrying in {}s",
                attempt,
                total,
                failure,
                backoff.as_secs()
            );
            sleep(backoff);
        }
    }

    fn attempt(&self, request: &HttpRequest) -> Result<Metadata, Failure> {
        let r = self.transport.send(request)?;
        if !r.is_success() {
            return Err(r.status_failure());
        }
        Metadata::from_slice(&r.body)
    }
}

/// One-shot fetch against the live API.
pub fn fetch_apod(
    api_key: &str,
    date: Option<&str>,
    options: FetchOptions,
) -> Result<Metadata, FetchError> {
    Fetcher::new(options)?.fetch(api_key, date)
}
