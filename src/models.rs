//! Data models passed between pipeline stages.
//!
//! - [`Article`]: generated post before publishing
//! - [`NewPost`] / [`PublishedPost`]: what goes to and comes back from the blog
//! - [`ImageAsset`]: the illustration and where it came from
//! - [`Promotion`]: one social post, ready to submit
//! - [`RunReport`]: summary of one pipeline run

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A generated article. Created once per run and never mutated after publishing.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// The accepted topic that drove generation.
    pub topic: String,
    /// Title as it will be published (unsanitized).
    pub title: String,
    /// HTML body with the signature appended, without the title.
    pub body_html: String,
    /// Two fixed-pool labels followed by two free-form ones.
    pub labels: Vec<String>,
}

/// Payload for a blog insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub labels: Vec<String>,
}

/// A post the blogging platform accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PublishedPost {
    pub url: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Public URL of the embedded illustration, when one was uploaded.
    #[serde(skip)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    Generated,
    Fallback,
}

/// The article illustration on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub origin: ImageOrigin,
}

/// One promotional post for a social network.
#[derive(Debug, Clone, PartialEq)]
pub struct Promotion {
    /// Final post text, already within the platform's limit.
    pub text: String,
    /// Published article URL.
    pub link_url: String,
    /// Article title, used for link cards.
    pub title: String,
    /// Link-card description.
    pub description: String,
    /// Image to attach, if the platform takes one.
    pub image: Option<PathBuf>,
}

/// Result of one promotion attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Posted { id: String },
    Failed { error: String },
    Skipped,
}

/// What a run produced, logged as JSON when the run ends.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub topic: String,
    pub topic_was_fallback: bool,
    pub title: String,
    pub labels: Vec<String>,
    pub post_url: Option<String>,
    pub image_origin: ImageOrigin,
    pub image_url: Option<String>,
    pub promotions: Vec<(String, ChannelOutcome)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_post_serializes_blogger_fields() {
        let post = NewPost {
            title: "Zero Trust".into(),
            content: "<p>Body</p>".into(),
            labels: vec!["AI".into(), "Zero Trust".into()],
        };
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["title"], "Zero Trust");
        assert_eq!(json["labels"][1], "Zero Trust");
    }

    #[test]
    fn published_post_tolerates_missing_labels() {
        let post: PublishedPost =
            serde_json::from_str(r#"{"url":"https://x.blogspot.com/p/1","id":"9"}"#).unwrap();
        assert_eq!(post.url, "https://x.blogspot.com/p/1");
        assert!(post.labels.is_empty());
        assert!(post.image_url.is_none());
    }

    #[test]
    fn channel_outcome_is_tagged() {
        let json = serde_json::to_string(&ChannelOutcome::Posted { id: "42".into() }).unwrap();
        assert_eq!(json, r#"{"status":"posted","id":"42"}"#);
        let json = serde_json::to_string(&ChannelOutcome::Skipped).unwrap();
        assert_eq!(json, r#"{"status":"skipped"}"#);
    }
}
