//! X (Twitter) API v2 client.
//!
//! Uses an OAuth 2.0 user access token. Images go through the v2 media
//! upload endpoint first; the returned media id is attached to the tweet.

use super::{Promoter, image_mime};
use crate::error::{ServiceError, check_status};
use crate::models::Promotion;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct TwitterClient {
    http: Client,
    base_url: String,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct DataWrapper<T> {
    data: T,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

impl TwitterClient {
    pub fn new(base_url: &str, access_token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn token(&self) -> Result<&str, ServiceError> {
        self.access_token
            .as_deref()
            .ok_or(ServiceError::NotConfigured("twitter"))
    }

    /// Upload an image and return its media id.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn upload_media(&self, path: &Path) -> Result<String, ServiceError> {
        let token = self.token()?;
        let data = fs::read(path).await?;
        let mime = image_mime(path);
        let category = if mime == "image/gif" { "tweet_gif" } else { "tweet_image" };

        let part = Part::bytes(data)
            .file_name(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image".to_string()),
            )
            .mime_str(mime)?;
        let form = Form::new()
            .text("media_category", category)
            .text("media_type", mime)
            .part("media", part);

        let resp = self
            .http
            .post(format!("{}/2/media/upload", self.base_url))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let uploaded: DataWrapper<IdOnly> = check_status("twitter", resp).await?.json().await?;
        info!(media_id = %uploaded.data.id, "Uploaded media to X");
        Ok(uploaded.data.id)
    }

    /// Post a tweet, optionally with already-uploaded media.
    #[instrument(level = "info", skip_all, fields(chars = text.chars().count()))]
    pub async fn post_tweet(&self, text: &str, media_ids: &[String]) -> Result<String, ServiceError> {
        let token = self.token()?;
        let mut body = serde_json::json!({ "text": text });
        if !media_ids.is_empty() {
            body["media"] = serde_json::json!({ "media_ids": media_ids });
        }
        let resp = self
            .http
            .post(format!("{}/2/tweets", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let created: DataWrapper<IdOnly> = check_status("twitter", resp).await?.json().await?;
        info!(tweet_id = %created.data.id, "Posted to X");
        Ok(created.data.id)
    }
}

impl Promoter for TwitterClient {
    fn name(&self) -> &'static str {
        "twitter"
    }

    async fn promote(&self, promotion: &Promotion) -> Result<String, ServiceError> {
        let media_ids = match promotion.image.as_deref() {
            Some(path) => vec![self.upload_media(path).await?],
            None => Vec::new(),
        };
        self.post_tweet(&promotion.text, &media_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::scratch_dir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn promotion(image: Option<std::path::PathBuf>) -> Promotion {
        Promotion {
            text: "🚀 New Blog Post: Zero Trust\n\nhttps://me.blogspot.com/p/1\n\n#AI".into(),
            link_url: "https://me.blogspot.com/p/1".into(),
            title: "Zero Trust".into(),
            description: String::new(),
            image,
        }
    }

    #[tokio::test]
    async fn promote_with_image_attaches_media_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/media/upload"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "id": "m1", "media_key": "3_m1" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .and(body_json(serde_json::json!({
                "text": "🚀 New Blog Post: Zero Trust\n\nhttps://me.blogspot.com/p/1\n\n#AI",
                "media": { "media_ids": ["m1"] }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": { "id": "t9", "text": "..." }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = scratch_dir("twitter-promote");
        let img = dir.join("Zero_Trust.png");
        std::fs::write(&img, b"png").unwrap();

        let client = TwitterClient::new(&server.uri(), Some("tok".into()));
        assert_eq!(client.promote(&promotion(Some(img))).await.unwrap(), "t9");
    }

    #[tokio::test]
    async fn text_only_post_skips_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/media/upload"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": { "id": "t10" }
            })))
            .mount(&server)
            .await;

        let client = TwitterClient::new(&server.uri(), Some("tok".into()));
        assert_eq!(client.promote(&promotion(None)).await.unwrap(), "t10");
    }

    #[tokio::test]
    async fn rejected_tweet_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(403).set_body_string("duplicate content"))
            .mount(&server)
            .await;

        let client = TwitterClient::new(&server.uri(), Some("tok".into()));
        let err = client.post_tweet("hi", &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Api { status: 403, .. }));
    }

    #[tokio::test]
    async fn missing_token_is_not_configured() {
        let client = TwitterClient::new("http://127.0.0.1:9", None);
        let err = client.post_tweet("hi", &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured("twitter")));
    }
}
