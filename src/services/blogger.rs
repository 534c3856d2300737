//! Blogger v3 client.
//!
//! Authenticates with a ready-made OAuth access token; obtaining and
//! refreshing that token happens outside this program.

use super::BlogService;
use crate::error::{ServiceError, check_status};
use crate::models::{NewPost, PublishedPost};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct BloggerClient {
    http: Client,
    base_url: String,
    blog_id: Option<String>,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct PostList {
    #[serde(default)]
    items: Vec<PostItem>,
}

#[derive(Deserialize)]
struct PostItem {
    title: String,
}

impl BloggerClient {
    pub fn new(base_url: &str, blog_id: Option<String>, access_token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            blog_id,
            access_token,
        }
    }

    fn credentials(&self) -> Result<(&str, &str), ServiceError> {
        match (self.blog_id.as_deref(), self.access_token.as_deref()) {
            (Some(id), Some(token)) => Ok((id, token)),
            _ => Err(ServiceError::NotConfigured("blogger")),
        }
    }
}

impl BlogService for BloggerClient {
    #[instrument(level = "info", skip(self))]
    async fn recent_titles(&self, limit: usize) -> Result<Vec<String>, ServiceError> {
        let (blog_id, token) = self.credentials()?;
        let resp = self
            .http
            .get(format!("{}/blogs/{}/posts", self.base_url, blog_id))
            .bearer_auth(token)
            .query(&[("maxResults", limit.to_string()), ("orderBy", "PUBLISHED".to_string())])
            .send()
            .await?;
        let list: PostList = check_status("blogger", resp).await?.json().await?;
        let titles: Vec<String> = list.items.into_iter().map(|p| p.title).collect();
        info!(count = titles.len(), "Fetched recent blog titles");
        Ok(titles)
    }

    #[instrument(level = "info", skip_all, fields(title = %post.title))]
    async fn insert_post(&self, post: &NewPost) -> Result<PublishedPost, ServiceError> {
        let (blog_id, token) = self.credentials()?;
        let resp = self
            .http
            .post(format!("{}/blogs/{}/posts", self.base_url, blog_id))
            .bearer_auth(token)
            .query(&[("isDraft", "false")])
            .json(post)
            .send()
            .await?;
        let mut published: PublishedPost = check_status("blogger", resp).await?.json().await?;
        published.url = published.url.trim().to_string();
        if published.url.is_empty() {
            return Err(ServiceError::Empty("blogger post url"));
        }
        if published.labels.is_empty() {
            published.labels = post.labels.clone();
        }
        info!(url = %published.url, "Published blog post");
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> BloggerClient {
        BloggerClient::new(&server.uri(), Some("42".into()), Some("tok".into()))
    }

    #[tokio::test]
    async fn recent_titles_reads_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blogs/42/posts"))
            .and(query_param("maxResults", "30"))
            .and(query_param("orderBy", "PUBLISHED"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "title": "Zero Trust in 2024" }, { "title": "AI Ethics" }]
            })))
            .mount(&server)
            .await;

        let titles = client(&server).recent_titles(30).await.unwrap();
        assert_eq!(titles, vec!["Zero Trust in 2024", "AI Ethics"]);
    }

    #[tokio::test]
    async fn recent_titles_without_items_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "kind": "blogger#postList" })))
            .mount(&server)
            .await;
        assert!(client(&server).recent_titles(30).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_post_returns_url_and_labels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/blogs/42/posts"))
            .and(query_param("isDraft", "false"))
            .and(body_json(serde_json::json!({
                "title": "Zero Trust",
                "content": "<p>x</p>",
                "labels": ["AI", "Zero Trust"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "1",
                "url": " https://me.blogspot.com/2025/01/zero-trust.html ",
                "labels": ["AI", "Zero Trust"]
            })))
            .mount(&server)
            .await;

        let post = NewPost {
            title: "Zero Trust".into(),
            content: "<p>x</p>".into(),
            labels: vec!["AI".into(), "Zero Trust".into()],
        };
        let published = client(&server).insert_post(&post).await.unwrap();
        assert_eq!(published.url, "https://me.blogspot.com/2025/01/zero-trust.html");
        assert_eq!(published.labels, vec!["AI", "Zero Trust"]);
    }

    #[tokio::test]
    async fn insert_post_without_url_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "url": "" })))
            .mount(&server)
            .await;

        let post = NewPost {
            title: "t".into(),
            content: "c".into(),
            labels: vec![],
        };
        let err = client(&server).insert_post(&post).await.unwrap_err();
        assert!(matches!(err, ServiceError::Empty(_)));
    }

    #[tokio::test]
    async fn missing_credentials_is_not_configured() {
        let blogger = BloggerClient::new("http://127.0.0.1:9", None, Some("tok".into()));
        let err = blogger.recent_titles(30).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured("blogger")));
    }
}
