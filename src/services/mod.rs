//! Clients for the publishing and promotion platforms.
//!
//! | Platform | Module | Role |
//! |----------|--------|------|
//! | Blogger | [`blogger`] | list recent titles, insert the post |
//! | Google Drive | [`drive`] | host the illustration at a public URL |
//! | Bluesky | [`bluesky`] | promo with link card and uploaded thumbnail |
//! | X | [`twitter`] | promo with the original image, optional teaser |
//!
//! Each client makes a single attempt per call. Missing credentials surface
//! as [`ServiceError::NotConfigured`] on first use so the pipeline can fall
//! back instead of refusing to start.

use crate::error::ServiceError;
use crate::models::{NewPost, Promotion, PublishedPost};
use std::path::Path;

pub mod blogger;
pub mod bluesky;
pub mod drive;
pub mod twitter;

/// A blogging platform.
pub trait BlogService {
    /// Titles of the most recently published posts, newest first.
    async fn recent_titles(&self, limit: usize) -> Result<Vec<String>, ServiceError>;

    /// Publish `post` and return its public URL.
    async fn insert_post(&self, post: &NewPost) -> Result<PublishedPost, ServiceError>;
}

/// Storage that can hand out a public URL for an uploaded file.
pub trait MediaStore {
    async fn upload_public(&self, path: &Path) -> Result<String, ServiceError>;
}

/// A social network that accepts a promotional post.
pub trait Promoter {
    /// Short platform name for logs and the run report.
    fn name(&self) -> &'static str;

    /// Submit `promotion` and return the platform's identifier for the post.
    async fn promote(&self, promotion: &Promotion) -> Result<String, ServiceError>;
}

/// Guess an image MIME type from the file extension.
pub(crate) fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_follows_extension() {
        assert_eq!(image_mime(Path::new("a/b_compressed.jpg")), "image/jpeg");
        assert_eq!(image_mime(Path::new("a/b.JPEG")), "image/jpeg");
        assert_eq!(image_mime(Path::new("a/b.png")), "image/png");
        assert_eq!(image_mime(Path::new("noext")), "image/png");
    }
}
