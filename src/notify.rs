//! Fallback post for days when APOD can't be retrieved.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;
use sha1::Sha1;
use time::OffsetDateTime;

use crate::error::{ConfigError, NotifyError};
use crate::http::{HttpRequest, Transport};

pub const TWEET_URL: &str = "https://api.twitter.com/2/tweets";
pub const DEFAULT_MESSAGE: &str = "NASA's APOD is temporarily unavailable. We'll be back soon!";
const POST_TIMEOUT: u64 = 30;

pub trait Notifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// The four OAuth 1.0a values needed to post as a user.
#[derive(Clone, PartialEq, Eq)]
pub struct TwitterCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

impl std::fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("api_key", &self.api_key)
            .field("access_token", &self.access_token)
            .finish_non_exhaustive()
    }
}

impl TwitterCredentials {
    /// Every value must be present and non-empty.
    pub fn new(
        api_key: Option<String>,
        api_secret: Option<String>,
        access_token: Option<String>,
        access_secret: Option<String>,
    ) -> Result<Self, ConfigError> {
        fn required(v: Option<String>, name: &'static str) -> Result<String, ConfigError> {
            match v {
                Some(s) if !s.trim().is_empty() => Ok(s),
                _ => Err(ConfigError::MissingCredential(name)),
            }
        }
        Ok(TwitterCredentials {
            api_key: required(api_key, "TWITTER_API_KEY")?,
            api_secret: required(api_secret, "TWITTER_API_SECRET")?,
            access_token: required(access_token, "TWITTER_ACCESS_TOKEN")?,
            access_secret: required(access_secret, "TWITTER_ACCESS_SECRET")?,
        })
    }
}

pub struct TwitterNotifier<T: Transport> {
    credentials: TwitterCredentials,
    transport: T,
}

impl<T: Transport> TwitterNotifier<T> {
    pub fn new(credentials: TwitterCredentials, transport: T) -> Self {
        TwitterNotifier { credentials, transport }
    }
}

impl<T: Transport> Notifier for TwitterNotifier<T> {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let auth = authorization_header(
            &self.credentials,
            "POST",
            TWEET_URL,
            &[],
            &nonce(),
            OffsetDateTime::now_utc().unix_timestamp(),
        );
        let body = json!({ "text": message }).to_string();
        let request = HttpRequest::post(TWEET_URL, POST_TIMEOUT)
            .with_header("Authorization", auth)
            .with_header("Content-Type", "application/json")
            .with_body(body);

        let r = self.transport.send(&request).map_err(|e| NotifyError::Transport(e.into()))?;
        if !r.is_success() {
            return Err(NotifyError::Rejected { status: r.status, body: r.text() });
        }
        log::debug!("Tweet accepted: {}", r.text());
        Ok(())
    }
}

fn nonce() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect()
}

fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// OAuth 1.0a signature base string (RFC 5849 §3.4.1).
fn signature_base(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> =
        params.iter().map(|(k, v)| (encode(k), encode(v))).collect();
    pairs.sort();
    let joined = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}&{}&{}", method.to_uppercase(), encode(url), encode(&joined))
}

fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> String {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    // HMAC accepts keys of any length
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes()).expect("any key length is valid");
    mac.update(base.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Build the `Authorization: OAuth ...` value for a request.
///
/// `extra` holds query or form parameters that are part of the signature;
/// JSON bodies are not.
fn authorization_header(
    creds: &TwitterCredentials,
    method: &str,
    url: &str,
    extra: &[(&str, &str)],
    nonce: &str,
    timestamp: i64,
) -> String {
    let timestamp = timestamp.to_string();
    let mut oauth = vec![
        ("oauth_consumer_key", creds.api_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp.as_str()),
        ("oauth_token", creds.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];
    let all: Vec<(String, String)> = oauth
        .iter()
        .chain(extra.iter())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let signature = sign(&signature_base(method, url, &all), &creds.api_secret, &creds.access_secret);
    oauth.push(("oauth_signature", signature.as_str()));
    oauth.sort();

    let fields = oauth
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {}", fields)
}
