//! Small string and file-system helpers used across the pipeline.
//!
//! - String truncation for logs and character-capped posts
//! - Title sanitization, URL normalization, hashtag building
//! - HTML stripping for plain-text teasers
//! - Filename derivation for generated images
//! - File system validation for output directories

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

static H1_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1[^>]*>.*?</h1>").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with an
/// ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Drop double quotes and HTML-escape single quotes so a title is safe in
/// attributes and post payloads.
pub fn sanitize_title(title: &str) -> String {
    title.replace('"', "").replace('\'', "&#39;")
}

/// Prefix `https://` when `url` has no http(s) scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => url.to_string(),
        _ => format!("https://{url}"),
    }
}

/// `["Zero Trust", "AI", "X"]` -> `"#ZeroTrust #AI"`, at most `limit` tags.
pub fn hashtags<S: AsRef<str>>(labels: &[S], limit: usize) -> String {
    labels
        .iter()
        .map(|l| l.as_ref().split_whitespace().collect::<String>())
        .filter(|tag| tag.chars().count() > 1)
        .unique()
        .take(limit)
        .map(|tag| format!("#{tag}"))
        .join(" ")
}

/// Byte ranges and text of every http(s) URL in `text`.
pub fn find_urls(text: &str) -> Vec<(usize, usize, &str)> {
    URL_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end(), m.as_str()))
        .collect()
}

/// Remove every `<h1>` element; titles live outside the body.
pub fn strip_h1(html: &str) -> String {
    H1_RE.replace_all(html, "").trim().to_string()
}

/// Plain text of an HTML fragment with runs of blank lines collapsed.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    BLANK_LINES_RE.replace_all(text.trim(), "\n").to_string()
}

/// Filename-safe form of a topic: spaces become underscores, path
/// separators and other punctuation are dropped.
pub fn topic_file_stem(topic: &str) -> String {
    let stem: String = topic
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect();
    if stem.is_empty() {
        "image".to_string()
    } else {
        stem
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let check_path = path.join("..__write_check__");
    stdfs::File::create(&check_path)?;
    let _ = stdfs::remove_file(&check_path);
    info!("Directory is writable");
    Ok(())
}

/// Fresh, empty directory under the OS temp dir for one test.
#[cfg(test)]
pub fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("autoblog-{}-{}", name, std::process::id()));
    let _ = stdfs::remove_dir_all(&dir);
    stdfs::create_dir_all(&dir).unwrap();
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        let result = truncate_for_log("ééé", 3);
        assert_eq!(result, "é…(+4 bytes)");
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(
            sanitize_title(r#""Zero Trust" isn't optional"#),
            "Zero Trust isn&#39;t optional"
        );
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("https://a.blogspot.com/x"), "https://a.blogspot.com/x");
        assert_eq!(normalize_url("http://a.com"), "http://a.com");
        assert_eq!(normalize_url(" a.blogspot.com/p/1 "), "https://a.blogspot.com/p/1");
    }

    #[test]
    fn test_hashtags() {
        let labels = ["Zero Trust", "AI", "X", "AI", "Cloud Security", "DevSecOps"];
        assert_eq!(hashtags(&labels, 3), "#ZeroTrust #AI #CloudSecurity");
        assert_eq!(hashtags(&labels, 10), "#ZeroTrust #AI #CloudSecurity #DevSecOps");
        let none: [&str; 0] = [];
        assert_eq!(hashtags(&none, 4), "");
    }

    #[test]
    fn test_find_urls_uses_byte_offsets() {
        let text = "🚀 read https://x.com/a now";
        let urls = find_urls(text);
        assert_eq!(urls.len(), 1);
        let (start, end, url) = urls[0];
        assert_eq!(url, "https://x.com/a");
        assert_eq!(&text[start..end], url);
        assert_eq!(start, "🚀 read ".len());
    }

    #[test]
    fn test_strip_h1() {
        let html = "<H1 class=\"t\">Title</H1>\n<p>Body</p>";
        assert_eq!(strip_h1(html), "<p>Body</p>");
    }

    #[test]
    fn test_html_to_text() {
        let html = "<p>First &amp; foremost.</p>\n\n\n<p>Second <b>bold</b>.</p>";
        assert_eq!(html_to_text(html), "First & foremost.\nSecond bold.");
    }

    #[test]
    fn test_topic_file_stem() {
        assert_eq!(topic_file_stem("Zero Trust in 2024"), "Zero_Trust_in_2024");
        assert_eq!(topic_file_stem("AI/ML: What's next?"), "AIML_Whats_next");
        assert_eq!(topic_file_stem("???"), "image");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir() {
        let dir = scratch_dir("writable").join("a").join("b");
        ensure_writable_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
        assert!(!dir.join("..__write_check__").exists());
    }
}
