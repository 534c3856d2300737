//! The publish/promote sequence for one run.
//!
//! Stages run strictly in order. Only two failures end a run: no topic
//! (the text service failed hard) and no article body. Everything after the
//! body is best effort; each stage logs its own failure and the run carries
//! on with a fallback, so a published post is never held back by a broken
//! image or social network.

use crate::api::{ImageService, TextService};
use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::generate::content::{generate_article, image_embed_html, select_labels};
use crate::generate::image::{fallback_image, illustrate};
use crate::generate::topic::{TopicError, TopicOutcome, TopicPolicy, generate_topic};
use crate::history::TopicHistory;
use crate::models::{ChannelOutcome, ImageAsset, NewPost, Promotion, RunReport};
use crate::promote::{bluesky_promotion, teaser_promotion, twitter_promotion};
use crate::services::{BlogService, MediaStore, Promoter};
use crate::transcode::{TranscodeOutcome, transcode};
use crate::utils::{normalize_url, sanitize_title};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error("article generation failed: {0}")]
    Content(#[source] ServiceError),
}

/// File-system locations and the static link used when publishing fails.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub history_file: PathBuf,
    pub media_dir: PathBuf,
    pub fallback_dir: PathBuf,
    pub blog_home_url: Option<String>,
}

/// One configured run. Service clients are borrowed so tests can swap in fakes.
pub struct Pipeline<'a, T, I, B, M, S, X> {
    pub config: &'a AppConfig,
    pub paths: &'a RunPaths,
    pub text: &'a T,
    pub images: &'a I,
    pub blog: &'a B,
    pub media: &'a M,
    pub bluesky: &'a S,
    pub twitter: &'a X,
}

async fn post_to<P: Promoter>(promoter: &P, promotion: Option<Promotion>) -> (String, ChannelOutcome) {
    let name = promoter.name().to_string();
    let Some(promotion) = promotion else {
        return (name, ChannelOutcome::Skipped);
    };
    let outcome = match promoter.promote(&promotion).await {
        Ok(id) => ChannelOutcome::Posted { id },
        Err(ServiceError::NotConfigured(service)) => {
            info!(service, "Promoter not configured; skipping");
            ChannelOutcome::Skipped
        }
        Err(e) => {
            error!(channel = %name, error = %e, "Promotion failed");
            ChannelOutcome::Failed { error: e.to_string() }
        }
    };
    (name, outcome)
}

fn existing(path: &Path) -> Option<PathBuf> {
    path.exists().then(|| path.to_path_buf())
}

impl<T, I, B, M, S, X> Pipeline<'_, T, I, B, M, S, X>
where
    T: TextService,
    I: ImageService,
    B: BlogService,
    M: MediaStore,
    S: Promoter,
    X: Promoter,
{
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let config = self.config;

        let recent_titles = match self.blog.recent_titles(config.topic.recent_titles).await {
            Ok(titles) => titles,
            Err(e) => {
                warn!(error = %e, "Could not fetch recent blog titles; continuing without them");
                Vec::new()
            }
        };

        let mut history = TopicHistory::load(&self.paths.history_file, config.topic.history_limit).await;
        if history.is_empty() {
            debug!("No topic history yet");
        }
        info!(history = history.len(), recent = recent_titles.len(), "Generating topic");
        let policy = TopicPolicy::from_config(config);
        let outcome = generate_topic(self.text, &policy, &recent_titles, history.topics()).await?;
        let topic = outcome.topic().to_string();
        if let TopicOutcome::Accepted { attempts, .. } = &outcome {
            debug!(attempts, "Topic accepted");
        }

        let mut article = generate_article(self.text, config, &topic)
            .await
            .map_err(PipelineError::Content)?;
        history.push(topic.clone());
        if let Err(e) = history.save().await {
            error!(error = %e, "Failed to save topic history");
        }

        let image = illustrate(
            self.images,
            &config.image,
            &self.paths.media_dir,
            &self.paths.fallback_dir,
            &topic,
        )
        .await;

        let image_url = match self.media.upload_public(&image.path).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, path = %image.path.display(), "Image upload failed; publishing without image");
                None
            }
        };

        article.labels = select_labels(self.text, config, &article.body_html).await;

        let title = sanitize_title(&article.title);
        let content = match image_url.as_deref() {
            Some(url) => format!("{}{}", image_embed_html(url, &title), article.body_html),
            None => article.body_html.clone(),
        };
        let post = NewPost {
            title: title.clone(),
            content,
            labels: article.labels.clone(),
        };
        let published = match self.blog.insert_post(&post).await {
            Ok(mut published) => {
                published.url = normalize_url(&published.url);
                published.image_url = image_url.clone();
                info!(url = %published.url, image = ?published.image_url, "Post is live");
                Some(published)
            }
            Err(e) => {
                error!(error = %e, "Publishing failed");
                None
            }
        };
        let (post_url, labels) = match published {
            Some(p) => (Some(p.url), p.labels),
            None => (None, article.labels.clone()),
        };

        let link = post_url
            .clone()
            .or_else(|| self.paths.blog_home_url.as_deref().map(normalize_url));
        let promotions = match link.as_deref() {
            Some(link) => self.promote(&article.title, &article.body_html, link, &labels, &image).await,
            None => {
                warn!("No post URL and no blog home URL; skipping promotions");
                vec![
                    (self.bluesky.name().to_string(), ChannelOutcome::Skipped),
                    (self.twitter.name().to_string(), ChannelOutcome::Skipped),
                ]
            }
        };

        Ok(RunReport {
            topic: article.topic,
            topic_was_fallback: outcome.is_fallback(),
            title: article.title,
            labels,
            post_url,
            image_origin: image.origin,
            image_url,
            promotions,
        })
    }

    /// Small JPEG for the Bluesky blob limit, or the category fallback.
    async fn thumbnail(&self, image: &ImageAsset) -> Option<PathBuf> {
        let fallback = fallback_image(&self.paths.fallback_dir, &self.config.image, &self.config.image.fallback_category);
        let src = image.path.clone();
        let opts = self.config.transcode.clone();
        let fb = fallback.clone();
        let path = match tokio::task::spawn_blocking(move || transcode(&src, &opts, &fb)).await {
            Ok(Ok(outcome)) => {
                if let TranscodeOutcome::Transcoded(t) = &outcome {
                    debug!(bytes = t.bytes, quality = t.quality, width = t.width, height = t.height, "Thumbnail ready");
                }
                outcome.path().to_path_buf()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Transcode failed; using fallback image");
                fallback
            }
            Err(e) => {
                warn!(error = %e, "Transcode task failed; using fallback image");
                fallback
            }
        };
        existing(&path)
    }

    async fn promote(
        &self,
        title: &str,
        body_html: &str,
        link: &str,
        labels: &[String],
        image: &ImageAsset,
    ) -> Vec<(String, ChannelOutcome)> {
        let promote = &self.config.promote;
        let mut outcomes = Vec::new();

        let bluesky = if promote.bluesky_enabled {
            let thumb = self.thumbnail(image).await;
            Some(bluesky_promotion(promote, title, link, labels, thumb))
        } else {
            None
        };
        outcomes.push(post_to(self.bluesky, bluesky).await);

        let tweet = promote
            .twitter_enabled
            .then(|| twitter_promotion(promote, title, link, labels, existing(&image.path)));
        outcomes.push(post_to(self.twitter, tweet).await);

        if promote.teaser_enabled {
            let teaser = teaser_promotion(promote, title, body_html, link, labels);
            let (name, outcome) = post_to(self.twitter, Some(teaser)).await;
            outcomes.push((format!("{name}_teaser"), outcome));
        }

        for (channel, outcome) in &outcomes {
            info!(%channel, ?outcome, "Promotion finished");
        }
        outcomes
    }
}
