//! Google Drive v3 client, used only to get a public URL for an image.
//!
//! Upload is done in three calls: a media upload of the raw bytes, a
//! metadata update that names the file and files it into the target
//! folder, and a permission grant that makes it readable by anyone.

use super::{MediaStore, image_mime};
use crate::error::{ServiceError, check_status};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct DriveClient {
    http: Client,
    base_url: String,
    access_token: Option<String>,
    folder_id: Option<String>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

/// Thumbnail-style link that renders inline in a blog post.
pub fn public_image_url(file_id: &str) -> String {
    format!("https://drive.google.com/thumbnail?id={file_id}&sz=w1000")
}

impl DriveClient {
    pub fn new(base_url: &str, access_token: Option<String>, folder_id: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            folder_id,
        }
    }

    /// Upload `path` and make it world-readable, returning the file id.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn upload_file(&self, path: &Path) -> Result<String, ServiceError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(ServiceError::NotConfigured("drive"))?;
        let data = fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let resp = self
            .http
            .post(format!("{}/upload/drive/v3/files", self.base_url))
            .bearer_auth(token)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, image_mime(path))
            .body(data)
            .send()
            .await?;
        let file: DriveFile = check_status("drive", resp).await?.json().await?;

        let mut update = self
            .http
            .patch(format!("{}/drive/v3/files/{}", self.base_url, file.id))
            .bearer_auth(token)
            .json(&serde_json::json!({ "name": name }));
        if let Some(folder) = self.folder_id.as_deref() {
            update = update.query(&[("addParents", folder)]);
        }
        check_status("drive", update.send().await?).await?;

        let resp = self
            .http
            .post(format!("{}/drive/v3/files/{}/permissions", self.base_url, file.id))
            .bearer_auth(token)
            .json(&serde_json::json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await?;
        check_status("drive", resp).await?;

        info!(file_id = %file.id, %name, "Uploaded file to Drive");
        Ok(file.id)
    }
}

impl MediaStore for DriveClient {
    async fn upload_public(&self, path: &Path) -> Result<String, ServiceError> {
        let id = self.upload_file(path).await?;
        Ok(public_image_url(&id))
    }
}
