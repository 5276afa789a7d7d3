use std::fmt;

use thiserror::Error;

/// A single failed attempt against a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The attempt ran past its timeout.
    Timeout(String),
    /// The connection could not be made or was dropped.
    Connection(String),
    /// The server answered with a non-success status.
    Status { code: i32, reason: String },
    /// The server answered, but not with something we understand.
    Malformed(String),
    /// The request never left this machine (bad URL, TLS setup, ...).
    Other(String),
}

impl Failure {
    /// Timeouts, connection failures and 5xx statuses may clear up on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Failure::Timeout(_) | Failure::Connection(_) => true,
            Failure::Status { code, .. } => (500..600).contains(code),
            Failure::Malformed(_) | Failure::Other(_) => false,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Timeout(m) => write!(f, "timed out: {}", m),
            Failure::Connection(m) => write!(f, "connection failed: {}", m),
            Failure::Status { code, reason } if (500..600).contains(code) => {
                write!(f, "{} Server Error: {}", code, reason)
            }
            Failure::Status { code, reason } if (400..500).contains(code) => {
                write!(f, "{} Client Error: {}", code, reason)
            }
            Failure::Status { code, reason } => write!(f, "unexpected status {}: {}", code, reason),
            Failure::Malformed(m) => write!(f, "malformed response: {}", m),
            Failure::Other(m) => write!(f, "request failed: {}", m),
        }
    }
}

/// A required setting was missing or unusable. Raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Provide NASA API key with --api-key or APOD_API_KEY env var")]
    MissingApiKey,
    #[error("missing credential {0}")]
    MissingCredential(&'static str),
    #[error("invalid date `{0}`, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("retries must be at least 1")]
    InvalidRetries,
    #[error("timeout must be greater than zero")]
    InvalidTimeout,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Every attempt failed with a retryable condition.
    #[error("gave up after {attempts} attempts: {last}")]
    Transient { attempts: u32, last: Failure },
    /// A condition retrying cannot fix (4xx, malformed body).
    #[error("{0}")]
    Fatal(Failure),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FetchError {
    /// The failure observed last, if the request was ever sent.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            FetchError::Transient { last, .. } => Some(last),
            FetchError::Fatal(f) => Some(f),
            FetchError::Config(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("error writing to disk: {0}")]
    Io(#[from] std::io::Error),
    #[error("error serializing metadata: {0}")]
    Json(#[from] serde_json::Error),
    #[error("error downloading image {url}: {failure}")]
    Download { url: String, failure: Failure },
    #[error("cannot derive a file name from image url `{0}`")]
    BadImageUrl(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("error sending post: {0}")]
    Transport(Failure),
    #[error("post rejected with status {status}: {body}")]
    Rejected { status: i32, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let f = Failure::Status { code: 503, reason: "Service Unavailable".into() };
        assert!(f.is_transient());
        assert_eq!(f.to_string(), "503 Server Error: Service Unavailable");
    }

    #[test]
    fn client_errors_and_bad_bodies_are_fatal() {
        assert!(!Failure::Status { code: 404, reason: "Not Found".into() }.is_transient());
        assert!(!Failure::Status { code: 301, reason: "Moved".into() }.is_transient());
        assert!(!Failure::Malformed("not json".into()).is_transient());
        assert!(!Failure::Other("bad scheme".into()).is_transient());
        assert!(Failure::Timeout("120s".into()).is_transient());
        assert!(Failure::Connection("reset".into()).is_transient());
    }

    #[test]
    fn config_errors_have_no_failure() {
        let e = FetchError::from(ConfigError::MissingApiKey);
        assert!(e.failure().is_none());
    }
}
