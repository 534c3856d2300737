//! Command-line interface definitions for autoblog.
//!
//! Every option has an environment variable and, where sensible, a default,
//! so a bare `autoblog` invocation (as run from a scheduler) publishes one
//! post. Missing service credentials do not stop the run; the affected
//! stage falls back and the rest of the pipeline continues.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for autoblog.
///
/// # Examples
///
/// ```sh
/// # Publish one post using .env and autoblog.yaml from the working directory
/// autoblog
///
/// # Regenerate the fallback illustrations
/// autoblog seed-fallbacks
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the YAML file with tunables
    #[arg(short, long, env = "AUTOBLOG_CONFIG", default_value = "autoblog.yaml")]
    pub config: PathBuf,

    /// Append log lines to this file as well as stdout
    #[arg(long, env = "AUTOBLOG_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// JSON file holding recently used topics
    #[arg(long, env = "AUTOBLOG_HISTORY_FILE", default_value = "past_topics.json")]
    pub history_file: PathBuf,

    /// Directory for generated images
    #[arg(long, env = "AUTOBLOG_MEDIA_DIR", default_value = "media")]
    pub media_dir: PathBuf,

    /// Directory holding the static fallback images
    #[arg(long, env = "AUTOBLOG_FALLBACK_DIR", default_value = "media/fallback_images")]
    pub fallback_dir: PathBuf,

    /// Link used in promotions when publishing fails
    #[arg(long, env = "AUTOBLOG_BLOG_HOME_URL")]
    pub blog_home_url: Option<String>,

    /// OpenAI-compatible API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    #[arg(long, env = "BLOGGER_BLOG_ID")]
    pub blogger_blog_id: Option<String>,

    /// OAuth access token with the Blogger scope
    #[arg(long, env = "BLOGGER_ACCESS_TOKEN", hide_env_values = true)]
    pub blogger_access_token: Option<String>,

    #[arg(long, env = "BLOGGER_BASE_URL", default_value = "https://www.googleapis.com/blogger/v3")]
    pub blogger_base_url: String,

    /// OAuth access token with the Drive scope
    #[arg(long, env = "DRIVE_ACCESS_TOKEN", hide_env_values = true)]
    pub drive_access_token: Option<String>,

    /// Drive folder that receives uploaded images
    #[arg(long, env = "GOOGLE_DRIVE_FOLDER_ID")]
    pub drive_folder_id: Option<String>,

    #[arg(long, env = "DRIVE_BASE_URL", default_value = "https://www.googleapis.com")]
    pub drive_base_url: String,

    #[arg(long, env = "BSKY_HANDLE")]
    pub bsky_handle: Option<String>,

    /// Bluesky app password
    #[arg(long, env = "BSKY_PASSWORD", hide_env_values = true)]
    pub bsky_password: Option<String>,

    #[arg(long, env = "BSKY_BASE_URL", default_value = "https://bsky.social")]
    pub bsky_base_url: String,

    /// OAuth 2.0 user access token for X
    #[arg(long, env = "TWITTER_ACCESS_TOKEN", hide_env_values = true)]
    pub twitter_access_token: Option<String>,

    #[arg(long, env = "TWITTER_BASE_URL", default_value = "https://api.x.com")]
    pub twitter_base_url: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generate, publish and promote one post (default)
    Run,
    /// Generate the category fallback images and upload them to Drive
    SeedFallbacks,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["autoblog", "--openai-api-key", "sk-test"]);

        assert_eq!(cli.command, None);
        assert_eq!(cli.openai_api_key, "sk-test");
        assert_eq!(cli.history_file, PathBuf::from("past_topics.json"));
        assert_eq!(cli.fallback_dir, PathBuf::from("media/fallback_images"));
        assert_eq!(cli.openai_base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_cli_subcommand_and_overrides() {
        let cli = Cli::parse_from([
            "autoblog",
            "--openai-api-key",
            "sk-test",
            "-c",
            "/etc/autoblog.yaml",
            "--blogger-blog-id",
            "123",
            "seed-fallbacks",
        ]);

        assert_eq!(cli.command, Some(Command::SeedFallbacks));
        assert_eq!(cli.config, PathBuf::from("/etc/autoblog.yaml"));
        assert_eq!(cli.blogger_blog_id.as_deref(), Some("123"));
    }
}
