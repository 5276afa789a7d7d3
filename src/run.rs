//! What each subcommand does, and how its result maps onto an exit status.

use std::{process::ExitCode, time::Duration};

use crate::apod::Fetcher;
use crate::error::{ConfigError, FetchError};
use crate::http::Transport;
use crate::notify::{Notifier, TwitterCredentials, TwitterNotifier};
use crate::store::ApodStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything asked for happened.
    Done,
    /// APOD couldn't be retrieved; logged, but not treated as a failed run.
    Degraded,
    /// Bad configuration, or something broke after retrieval.
    Failed,
}

impl Outcome {
    /// Process status: 0 unless the run failed.
    pub fn code(self) -> u8 {
        match self {
            Outcome::Done | Outcome::Degraded => 0,
            Outcome::Failed => 1,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

/// Fetch `date` and save it under `store`, downloading through the fetcher's transport.
pub fn fetch_and_save<T, S>(
    fetcher: &Fetcher<T>,
    store: &ApodStore,
    api_key: &str,
    date: &str,
    sleep: S,
) -> Outcome
where
    T: Transport,
    S: FnMut(Duration),
{
    log::info!("Fetching APOD for {}", date);
    let meta = match fetcher.fetch_with_sleep(api_key, Some(date), sleep) {
        Ok(m) => m,
        Err(FetchError::Config(e)) => {
            log::error!("{}", e);
            return Outcome::Failed;
        }
        // A scheduled run shouldn't show up as a hard failure when NASA is down.
        Err(e) => {
            log::error!("Failed to fetch APOD metadata: {}", e);
            return Outcome::Degraded;
        }
    };

    match store.save(date, &meta, fetcher.transport()) {
        Ok(saved) => {
            println!("Saved APOD {} to {}", date, saved.dir.display());
            Outcome::Done
        }
        Err(e) => {
            log::error!("{}", e);
            Outcome::Failed
        }
    }
}

/// Post `message`, provided all credentials are there.
pub fn send_fallback<T: Transport>(
    credentials: Result<TwitterCredentials, ConfigError>,
    transport: T,
    message: &str,
) -> Outcome {
    let creds = match credentials {
        Ok(c) => c,
        Err(e) => {
            log::error!("Twitter credentials missing. Cannot tweet: {}", e);
            return Outcome::Failed;
        }
    };
    match TwitterNotifier::new(creds, transport).notify(message) {
        Ok(()) => {
            println!("Fallback tweet sent: {}", message);
            Outcome::Done
        }
        Err(e) => {
            log::error!("{}", e);
            Outcome::Failed
        }
    }
}
