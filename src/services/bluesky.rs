//! Bluesky (AT Protocol) client.
//!
//! A post is three XRPC calls: open a session with the handle and app
//! password, upload the thumbnail as a blob, then create an
//! `app.bsky.feed.post` record. URLs in the text only become clickable
//! through link facets, whose offsets are UTF-8 byte positions.

use super::{Promoter, image_mime};
use crate::error::{ServiceError, check_status};
use crate::models::Promotion;
use crate::utils::find_urls;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::fs;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct BlueskyClient {
    http: Client,
    base_url: String,
    handle: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Deserialize)]
struct UploadBlobResponse {
    blob: Value,
}

#[derive(Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

/// A rich-text annotation on a span of the post text.
#[derive(Debug, Serialize, PartialEq)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<Value>,
}

/// Link facets for every URL in `text`.
pub fn link_facets(text: &str) -> Vec<Facet> {
    find_urls(text)
        .into_iter()
        .map(|(start, end, url)| Facet {
            index: ByteSlice {
                byte_start: start,
                byte_end: end,
            },
            features: vec![json!({ "$type": "app.bsky.richtext.facet#link", "uri": url })],
        })
        .collect()
}

impl BlueskyClient {
    pub fn new(base_url: &str, handle: Option<String>, password: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            handle,
            password,
        }
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.base_url, method)
    }

    async fn login(&self) -> Result<Session, ServiceError> {
        let (Some(handle), Some(password)) = (self.handle.as_deref(), self.password.as_deref()) else {
            return Err(ServiceError::NotConfigured("bluesky"));
        };
        let resp = self
            .http
            .post(self.xrpc("com.atproto.server.createSession"))
            .json(&json!({ "identifier": handle, "password": password }))
            .send()
            .await?;
        let session: Session = check_status("bluesky", resp).await?.json().await?;
        info!(did = %session.did, "Logged into Bluesky");
        Ok(session)
    }

    async fn upload_blob(&self, session: &Session, data: Vec<u8>, mime: &str) -> Result<Value, ServiceError> {
        let resp = self
            .http
            .post(self.xrpc("com.atproto.repo.uploadBlob"))
            .bearer_auth(&session.access_jwt)
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(data)
            .send()
            .await?;
        let uploaded: UploadBlobResponse = check_status("bluesky", resp).await?.json().await?;
        if uploaded.blob.is_null() {
            return Err(ServiceError::Empty("bluesky uploadBlob"));
        }
        Ok(uploaded.blob)
    }
}

impl Promoter for BlueskyClient {
    fn name(&self) -> &'static str {
        "bluesky"
    }

    #[instrument(level = "info", skip_all, fields(link = %promotion.link_url))]
    async fn promote(&self, promotion: &Promotion) -> Result<String, ServiceError> {
        let session = self.login().await?;

        let thumb = match promotion.image.as_deref() {
            Some(path) => {
                let data = fs::read(path).await?;
                let blob = self.upload_blob(&session, data, image_mime(path)).await?;
                debug!(path = %path.display(), "Uploaded thumbnail blob");
                Some(blob)
            }
            None => None,
        };

        let mut external = json!({
            "uri": promotion.link_url,
            "title": promotion.title,
            "description": promotion.description,
        });
        if let Some(blob) = thumb {
            external["thumb"] = blob;
        }

        let mut record = json!({
            "$type": "app.bsky.feed.post",
            "text": promotion.text,
            "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "embed": { "$type": "app.bsky.embed.external", "external": external },
        });
        let facets = link_facets(&promotion.text);
        if !facets.is_empty() {
            record["facets"] = serde_json::to_value(&facets)?;
        }

        let resp = self
            .http
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&json!({
                "repo": session.did,
                "collection": "app.bsky.feed.post",
                "record": record,
            }))
            .send()
            .await?;
        let created: CreateRecordResponse = check_status("bluesky", resp).await?.json().await?;
        info!(uri = %created.uri, "Posted to Bluesky");
        Ok(created.uri)
    }
}
