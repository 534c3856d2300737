//! Article body and label generation.

use crate::api::{ChatRequest, TextService};
use crate::config::{AppConfig, LabelConfig, TitleSource};
use crate::error::ServiceError;
use crate::models::Article;
use crate::utils::{html_to_text, sanitize_title, strip_h1, truncate_for_log};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title>\s*(.*?)\s*</title>").unwrap());
static LIST_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\d+[.)]|[-*•])\s*").unwrap());
static RUN_OF_SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

const LABEL_MAX_TOKENS: u32 = 20;

pub fn body_prompt(topic: &str, source: TitleSource) -> String {
    let title_rule = match source {
        TitleSource::Topic => "Do not include a title or any <h1> heading.",
        TitleSource::Embedded => {
            "Start with the post title wrapped in <title></title>, then the body. Do not use <h1>."
        }
    };
    format!(
        "Write a blog post about \"{topic}\" for IT leaders and practitioners. \
         Use a conversational, first-person voice with practical examples. \
         Format the body as HTML using <p> paragraphs and <h2> section headings. \
         {title_rule} Avoid buzzwords and do not end with a summary section."
    )
}

/// Split a raw reply into `(title, body)` according to `source`.
///
/// `<h1>` elements are always dropped from the body. In embedded mode the
/// first `<title>` element becomes the title and is removed; without one,
/// the topic is used.
pub fn resolve_title(raw: &str, topic: &str, source: TitleSource) -> (String, String) {
    let body = strip_h1(raw);
    match source {
        TitleSource::Topic => (topic.to_string(), body),
        TitleSource::Embedded => {
            let embedded = TITLE_RE
                .captures(&body)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|t| !t.is_empty());
            let body = TITLE_RE.replace(&body, "").trim().to_string();
            (embedded.unwrap_or_else(|| topic.to_string()), body)
        }
    }
}

/// Remove whole-word, case-insensitive occurrences of `phrases`.
///
/// Longer phrases are tried first, so `more than just about` wins over
/// `more than just`.
pub fn scrub_phrases<S: AsRef<str>>(html: &str, phrases: &[S]) -> String {
    let alternatives = phrases
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .unique_by(|p| p.to_lowercase())
        .sorted_by_key(|p| std::cmp::Reverse(p.chars().count()))
        .map(regex::escape)
        .join("|");
    if alternatives.is_empty() {
        return html.to_string();
    }
    let re = match Regex::new(&format!(r"(?i)\b(?:{alternatives})\b")) {
        Ok(re) => re,
        Err(e) => {
            warn!(error = %e, "Could not build avoid-phrase pattern; body left as is");
            return html.to_string();
        }
    };
    let scrubbed = re.replace_all(html, "");
    RUN_OF_SPACES_RE.replace_all(&scrubbed, " ").into_owned()
}

/// Centered image block placed above the article body.
pub fn image_embed_html(image_url: &str, alt: &str) -> String {
    format!(
        "<div style=\"text-align: center;\"><img src=\"{image_url}\" alt=\"{}\" style=\"max-width: 100%; height: auto;\" /></div>\n",
        sanitize_title(alt)
    )
}

/// Generate the article body and resolve its title. Labels are left empty.
#[instrument(level = "info", skip_all, fields(%topic))]
pub async fn generate_article<T: TextService>(
    text: &T,
    config: &AppConfig,
    topic: &str,
) -> Result<Article, ServiceError> {
    let prompt = body_prompt(topic, config.content.title_source);
    let request = ChatRequest {
        model: &config.text.model,
        prompt: &prompt,
        max_tokens: config.text.content_max_tokens,
        temperature: Some(config.text.content_temperature),
        timeout: Duration::from_secs(config.text.content_timeout_secs),
    };
    let raw = text.complete(&request).await?;
    debug!(reply = %truncate_for_log(&raw, 300), "Raw article reply");

    let (title, body) = resolve_title(&raw, topic, config.content.title_source);
    let body = scrub_phrases(&body, &config.content.avoid_phrases);
    if html_to_text(&body).trim().is_empty() {
        return Err(ServiceError::Empty("article body"));
    }

    let body_html = if config.content.signature_html.trim().is_empty() {
        body
    } else {
        format!("{body}\n{}", config.content.signature_html)
    };
    info!(%title, chars = body_html.len(), "Article generated");
    Ok(Article {
        topic: topic.to_string(),
        title,
        body_html,
        labels: Vec::new(),
    })
}

fn label_candidates(reply: &str) -> impl Iterator<Item = String> + '_ {
    reply
        .split(['\n', ','])
        .map(|line| LIST_MARKER_RE.replace(line.trim(), "").into_owned())
        .map(|l| l.trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '.')).trim().to_string())
        .filter(|l| !l.is_empty())
}

/// Two distinct pool labels named in `reply`, in pool spelling.
pub fn parse_fixed_labels<S: AsRef<str>>(reply: &str, pool: &[S]) -> Option<Vec<String>> {
    let picked: Vec<String> = label_candidates(reply)
        .filter_map(|c| {
            pool.iter()
                .map(AsRef::as_ref)
                .find(|p| p.eq_ignore_ascii_case(&c))
                .map(str::to_string)
        })
        .unique()
        .take(2)
        .collect();
    (picked.len() == 2).then_some(picked)
}

/// Two distinct free-form labels from `reply` that repeat none of `fixed`.
pub fn parse_ai_labels(reply: &str, fixed: &[String]) -> Option<Vec<String>> {
    let picked: Vec<String> = label_candidates(reply)
        .filter(|c| !fixed.iter().any(|f| f.eq_ignore_ascii_case(c)))
        .unique_by(|c| c.to_lowercase())
        .take(2)
        .collect();
    (picked.len() == 2).then_some(picked)
}

fn excerpt(body_html: &str, chars: usize) -> String {
    html_to_text(body_html).chars().take(chars).collect()
}

/// Pick the four post labels: two from the fixed pool, then two free-form.
///
/// Each half falls back to its configured pair when the model fails or
/// replies with something unusable, so this never errors.
#[instrument(level = "info", skip_all)]
pub async fn select_labels<T: TextService>(text: &T, config: &AppConfig, body_html: &str) -> Vec<String> {
    let labels: &LabelConfig = &config.labels;
    let excerpt = excerpt(body_html, labels.excerpt_chars);
    let timeout = Duration::from_secs(config.text.label_timeout_secs);

    let prompt = format!(
        "Choose exactly two labels for this blog post from this list: {}. \
         Reply with the two labels separated by a comma and nothing else.\n\n{excerpt}",
        labels.pool.join(", ")
    );
    let request = ChatRequest {
        model: &config.text.model,
        prompt: &prompt,
        max_tokens: LABEL_MAX_TOKENS,
        temperature: Some(config.text.label_temperature),
        timeout,
    };
    let fixed = match text.complete(&request).await {
        Ok(reply) => parse_fixed_labels(&reply, &labels.pool).unwrap_or_else(|| {
            warn!(%reply, "Unusable fixed-label reply; using fallback");
            labels.fixed_fallback.clone()
        }),
        Err(e) => {
            warn!(error = %e, "Fixed-label request failed; using fallback");
            labels.fixed_fallback.clone()
        }
    };

    let prompt = format!(
        "Suggest two short, specific labels for this blog post. Do not use {}. \
         Reply with one label per line and nothing else.\n\n{excerpt}",
        fixed.join(" or ")
    );
    let request = ChatRequest {
        prompt: &prompt,
        ..request
    };
    let ai = match text.complete(&request).await {
        Ok(reply) => parse_ai_labels(&reply, &fixed).unwrap_or_else(|| {
            warn!(%reply, "Unusable AI-label reply; using fallback");
            labels.ai_fallback.clone()
        }),
        Err(e) => {
            warn!(error = %e, "AI-label request failed; using fallback");
            labels.ai_fallback.clone()
        }
    };

    let all: Vec<String> = fixed.into_iter().chain(ai).collect();
    info!(labels = ?all, "Selected labels");
    all
}
