//! Article illustration: generate, save, or fall back to a stock image.

use crate::api::{ImageRequest, ImageService};
use crate::config::ImageConfig;
use crate::error::ServiceError;
use crate::models::{ImageAsset, ImageOrigin};
use crate::services::MediaStore;
use crate::utils::topic_file_stem;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
enum IllustrationError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("write image: {0}")]
    Io(#[from] std::io::Error),
    #[error("downloaded bytes are not an image: {0}")]
    Format(#[from] image::ImageError),
}

pub fn image_prompt(template: &str, topic: &str) -> String {
    template.replace("{topic}", topic)
}

/// Fallback file for `category`. Unknown categories use the `ai` entry; a
/// chosen file that does not exist gives way to `default_fallback`.
pub fn fallback_image(fallback_dir: &Path, config: &ImageConfig, category: &str) -> PathBuf {
    let name = config
        .fallback_images
        .get(&category.to_lowercase())
        .or_else(|| config.fallback_images.get("ai"))
        .unwrap_or(&config.default_fallback);
    let chosen = fallback_dir.join(name);
    if chosen.exists() {
        chosen
    } else {
        warn!(path = %chosen.display(), "Fallback image missing; using default");
        fallback_dir.join(&config.default_fallback)
    }
}

async fn generate_to(
    images: &impl ImageService,
    config: &ImageConfig,
    prompt: &str,
    size: &str,
    path: &Path,
) -> Result<(), IllustrationError> {
    let request = ImageRequest {
        model: &config.model,
        prompt,
        size,
        timeout: Duration::from_secs(config.timeout_secs),
    };
    let bytes = images.generate_image(&request).await?;
    image::guess_format(&bytes)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, &bytes).await?;
    Ok(())
}

/// Generate the illustration for `topic` into `{media_dir}/{stem}.png`.
///
/// Never fails: any error selects the configured fallback image instead.
#[instrument(level = "info", skip_all, fields(%topic))]
pub async fn illustrate<I: ImageService>(
    images: &I,
    config: &ImageConfig,
    media_dir: &Path,
    fallback_dir: &Path,
    topic: &str,
) -> ImageAsset {
    let path = media_dir.join(format!("{}.png", topic_file_stem(topic)));
    let prompt = image_prompt(&config.prompt_template, topic);
    match generate_to(images, config, &prompt, &config.size, &path).await {
        Ok(()) => {
            info!(path = %path.display(), "Saved generated image");
            ImageAsset {
                path,
                origin: ImageOrigin::Generated,
            }
        }
        Err(e) => {
            let path = fallback_image(fallback_dir, config, &config.fallback_category);
            warn!(error = %e, fallback = %path.display(), "Image generation failed; using fallback");
            ImageAsset {
                path,
                origin: ImageOrigin::Fallback,
            }
        }
    }
}

/// Generate every configured fallback image and upload each one.
///
/// Returns `(category, public url)` for the seeds that made it all the way.
#[instrument(level = "info", skip_all, fields(seeds = config.seeds.len()))]
pub async fn seed_fallbacks<I: ImageService, M: MediaStore>(
    images: &I,
    store: &M,
    config: &ImageConfig,
    fallback_dir: &Path,
) -> Vec<(String, String)> {
    let mut seeded = Vec::new();
    for seed in &config.seeds {
        let Some(name) = config.fallback_images.get(&seed.category) else {
            warn!(category = %seed.category, "No file name mapped for category; skipping");
            continue;
        };
        let path = fallback_dir.join(name);
        if let Err(e) = generate_to(images, config, &seed.prompt, &config.seed_size, &path).await {
            warn!(category = %seed.category, error = %e, "Could not generate fallback image");
            continue;
        }
        match store.upload_public(&path).await {
            Ok(url) => {
                info!(category = %seed.category, %url, "Seeded fallback image");
                seeded.push((seed.category.clone(), url));
            }
            Err(e) => warn!(category = %seed.category, error = %e, "Saved fallback image but upload failed"),
        }
    }
    seeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::scratch_dir;
    use std::cell::RefCell;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    struct FakeImages {
        reply: Result<Vec<u8>, ()>,
        sizes: RefCell<Vec<String>>,
    }

    impl FakeImages {
        fn ok() -> Self {
            Self {
                reply: Ok(png_bytes()),
                sizes: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                sizes: RefCell::new(Vec::new()),
            }
        }
    }

    impl ImageService for FakeImages {
        async fn generate_image(&self, request: &ImageRequest<'_>) -> Result<Vec<u8>, ServiceError> {
            self.sizes.borrow_mut().push(request.size.to_string());
            self.reply
                .clone()
                .map_err(|_| ServiceError::Timeout("image api".into()))
        }
    }

    struct FakeStore;

    impl MediaStore for FakeStore {
        async fn upload_public(&self, path: &Path) -> Result<String, ServiceError> {
            let name = path.file_name().unwrap().to_string_lossy();
            Ok(format!("https://cdn.test/{name}"))
        }
    }

    #[test]
    fn prompt_substitutes_topic() {
        assert_eq!(image_prompt("Art about {topic}.", "Zero Trust"), "Art about Zero Trust.");
    }

    #[test]
    fn fallback_picks_category_file() {
        let dir = scratch_dir("fallback-category");
        std::fs::write(dir.join("cybersecurity_fallback_image.png"), b"x").unwrap();
        let cfg = ImageConfig::default();
        assert_eq!(
            fallback_image(&dir, &cfg, "Cybersecurity"),
            dir.join("cybersecurity_fallback_image.png")
        );
    }

    #[test]
    fn missing_fallback_uses_default() {
        let dir = scratch_dir("fallback-default");
        let cfg = ImageConfig::default();
        assert_eq!(
            fallback_image(&dir, &cfg, "cybersecurity"),
            dir.join("default_fallback_image.png")
        );
    }

    #[test]
    fn unknown_category_uses_ai_entry() {
        let dir = scratch_dir("fallback-unknown");
        std::fs::write(dir.join("ai_fallback_image.png"), b"x").unwrap();
        let cfg = ImageConfig::default();
        assert_eq!(fallback_image(&dir, &cfg, "gardening"), dir.join("ai_fallback_image.png"));
    }

    #[tokio::test]
    async fn generated_image_is_saved_under_topic_stem() {
        let media = scratch_dir("illustrate-ok");
        let images = FakeImages::ok();
        let asset = illustrate(&images, &ImageConfig::default(), &media, &media, "Zero Trust in 2024").await;
        assert_eq!(asset.origin, ImageOrigin::Generated);
        assert_eq!(asset.path, media.join("Zero_Trust_in_2024.png"));
        assert!(asset.path.exists());
        assert_eq!(images.sizes.borrow()[0], "1024x1024");
    }

    #[tokio::test]
    async fn failed_generation_uses_category_fallback() {
        let media = scratch_dir("illustrate-fail");
        let fallback_dir = media.join("fallback_images");
        std::fs::create_dir_all(&fallback_dir).unwrap();
        std::fs::write(fallback_dir.join("cybersecurity_fallback_image.png"), b"x").unwrap();
        let cfg = ImageConfig {
            fallback_category: "cybersecurity".into(),
            ..ImageConfig::default()
        };

        let asset = illustrate(&FakeImages::failing(), &cfg, &media, &fallback_dir, "Zero Trust").await;
        assert_eq!(asset.origin, ImageOrigin::Fallback);
        assert_eq!(asset.path, fallback_dir.join("cybersecurity_fallback_image.png"));
        assert!(!media.join("Zero_Trust.png").exists());
    }

    #[tokio::test]
    async fn non_image_bytes_fall_back() {
        let media = scratch_dir("illustrate-garbage");
        let images = FakeImages {
            reply: Ok(b"<html>error page</html>".to_vec()),
            sizes: RefCell::new(Vec::new()),
        };
        let asset = illustrate(&images, &ImageConfig::default(), &media, &media, "Zero Trust").await;
        assert_eq!(asset.origin, ImageOrigin::Fallback);
    }

    #[tokio::test]
    async fn seeding_generates_and_uploads_each_category() {
        let dir = scratch_dir("seed");
        let images = FakeImages::ok();
        let seeded = seed_fallbacks(&images, &FakeStore, &ImageConfig::default(), &dir).await;
        assert_eq!(
            seeded,
            vec![
                ("ai".to_string(), "https://cdn.test/ai_fallback_image.png".to_string()),
                (
                    "cybersecurity".to_string(),
                    "https://cdn.test/cybersecurity_fallback_image.png".to_string()
                ),
                (
                    "it_leadership".to_string(),
                    "https://cdn.test/it_leadership_fallback_image.png".to_string()
                ),
            ]
        );
        assert!(dir.join("it_leadership_fallback_image.png").exists());
        assert!(images.sizes.borrow().iter().all(|s| s == "1792x1024"));
    }
}
