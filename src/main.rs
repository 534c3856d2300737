//! # autoblog
//!
//! A single-shot content job meant to be run from a scheduler. One run:
//!
//! 1. **Topic**: asks a text model for a blog topic that does not repeat the
//!    blog's recent titles or the local topic history
//! 2. **Article**: asks for an HTML body, scrubs filler phrases, resolves the title
//! 3. **Illustration**: generates an image, falling back to a stock one
//! 4. **Publish**: uploads the image to Drive, picks labels, posts to Blogger
//! 5. **Promote**: posts to Bluesky (transcoded thumbnail, link card) and X
//!
//! Only a missing topic or article body fails the run; every later stage
//! falls back and the run continues.
//!
//! ## Usage
//!
//! ```sh
//! autoblog                  # one full run
//! autoblog seed-fallbacks   # regenerate the stock fallback images
//! ```

use clap::Parser;
use std::error::Error;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod dedup;
mod error;
mod generate;
mod history;
mod models;
mod pipeline;
mod promote;
mod services;
mod transcode;
mod utils;

use api::OpenAiClient;
use cli::{Cli, Command};
use config::AppConfig;
use generate::image::seed_fallbacks;
use pipeline::{Pipeline, RunPaths};
use services::blogger::BloggerClient;
use services::bluesky::BlueskyClient;
use services::drive::DriveClient;
use services::twitter::TwitterClient;
use utils::ensure_writable_dir;

/// Stdout logging, plus an append-only plain-text copy when `log_file` is set.
fn init_tracing(log_file: Option<&std::path::Path>) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = tfmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339());

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tfmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .init();
    Ok(())
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    init_tracing(args.log_file.as_deref())?;

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "autoblog starting up");
    debug!(config = %args.config.display(), media_dir = %args.media_dir.display(), "Parsed CLI arguments");

    let config = AppConfig::load(&args.config)?;

    if let Err(e) = ensure_writable_dir(&args.media_dir).await {
        error!(
            path = %args.media_dir.display(),
            error = %e,
            "Media directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let openai = OpenAiClient::new(&args.openai_api_key, &args.openai_base_url);
    let drive = DriveClient::new(
        &args.drive_base_url,
        args.drive_access_token.clone(),
        args.drive_folder_id.clone(),
    );

    match args.command.clone().unwrap_or(Command::Run) {
        Command::SeedFallbacks => {
            ensure_writable_dir(&args.fallback_dir).await?;
            let seeded = seed_fallbacks(&openai, &drive, &config.image, &args.fallback_dir).await;
            if seeded.len() < config.image.seeds.len() {
                warn!(
                    seeded = seeded.len(),
                    wanted = config.image.seeds.len(),
                    "Some fallback images were not seeded"
                );
            }
            for (category, url) in &seeded {
                info!(%category, %url, "Fallback image available");
            }
        }
        Command::Run => {
            let blogger = BloggerClient::new(
                &args.blogger_base_url,
                args.blogger_blog_id.clone(),
                args.blogger_access_token.clone(),
            );
            let bluesky = BlueskyClient::new(&args.bsky_base_url, args.bsky_handle.clone(), args.bsky_password.clone());
            let twitter = TwitterClient::new(&args.twitter_base_url, args.twitter_access_token.clone());
            let paths = RunPaths {
                history_file: args.history_file.clone(),
                media_dir: args.media_dir.clone(),
                fallback_dir: args.fallback_dir.clone(),
                blog_home_url: args.blog_home_url.clone(),
            };

            let pipeline = Pipeline {
                config: &config,
                paths: &paths,
                text: &openai,
                images: &openai,
                blog: &blogger,
                media: &drive,
                bluesky: &bluesky,
                twitter: &twitter,
            };
            let report = match pipeline.run().await {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "Run aborted");
                    return Err(e.into());
                }
            };
            info!(report = %serde_json::to_string(&report)?, "Run summary");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}
