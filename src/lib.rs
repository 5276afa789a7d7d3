pub mod apod;
pub mod error;
pub mod http;
pub mod notify;
pub mod run;
pub mod store;

pub use apod::{fetch_apod, FetchOptions, Fetcher, Metadata, RetryPolicy};
pub use error::{ConfigError, Failure, FetchError, NotifyError, StoreError};
pub use http::{HttpRequest, HttpResponse, MinreqTransport, Transport, TransportError};
pub use notify::{Notifier, TwitterCredentials, TwitterNotifier};
pub use run::Outcome;
pub use store::{ApodStore, SavedApod};

pub const USER_AGENT: &str = concat!("APODOfTheDayBot/", env!("CARGO_PKG_VERSION"));
