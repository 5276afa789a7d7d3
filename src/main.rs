use std::process::ExitCode;

use apodoftheday::*;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fetch NASA's Astronomy Picture of the Day", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the day's metadata and image.
    Fetch {
        #[arg(long, env = "APOD_API_KEY", hide_env_values = true, help = "NASA API key")]
        api_key: Option<String>,
        #[arg(long, help = "Date to fetch as YYYY-MM-DD (default: today, UTC)")]
        date: Option<String>,
        #[arg(long, default_value = "data", help = "Directory to save into")]
        out_dir: String,
        #[arg(long, default_value_t = 3, help = "Attempts before giving up")]
        retries: u32,
        #[arg(long, default_value_t = 120, help = "Seconds to wait on each attempt")]
        timeout: u64,
    },
    /// Post a fallback message when the picture can't be retrieved.
    Notify {
        #[arg(long, default_value = notify::DEFAULT_MESSAGE)]
        message: String,
        #[arg(long, env = "TWITTER_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        #[arg(long, env = "TWITTER_API_SECRET", hide_env_values = true)]
        api_secret: Option<String>,
        #[arg(long, env = "TWITTER_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,
        #[arg(long, env = "TWITTER_ACCESS_SECRET", hide_env_values = true)]
        access_secret: Option<String>,
    },
}

fn main() -> ExitCode {
    // Initialize Logging.
    let log_environ = env_logger::Env::new()
        .filter("APOD_LOG")
        .write_style("APOD_LOG_STYLE");
    let mut log_builder = env_logger::Builder::new();

    log_builder.filter_level(log::LevelFilter::Info);
    log_builder.parse_env(log_environ);
    log_builder.init();

    let args = Args::parse();
    let transport = MinreqTransport::with_user_agent(USER_AGENT);

    let outcome = match args.command {
        Command::Fetch { api_key, date, out_dir, retries, timeout } => {
            match Fetcher::with_transport(&transport, FetchOptions { retries, timeout }) {
                Ok(fetcher) => {
                    let date = date.unwrap_or_else(apod::today);
                    let key = api_key.unwrap_or_default();
                    run::fetch_and_save(&fetcher, &ApodStore::new(out_dir), &key, &date, std::thread::sleep)
                }
                Err(e) => {
                    log::error!("{}", e);
                    Outcome::Failed
                }
            }
        }
        Command::Notify { message, api_key, api_secret, access_token, access_secret } => {
            let creds = TwitterCredentials::new(api_key, api_secret, access_token, access_secret);
            run::send_fallback(creds, &transport, &message)
        }
    };
    outcome.exit_code()
}
