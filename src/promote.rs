//! Promotional post composition.
//!
//! Composers are pure: they only build [`Promotion`] values and never talk
//! to a platform. Every text stays within the platform's character ceiling,
//! measured the way that platform measures it: Bluesky counts characters, X
//! uses its weighted count (see [`x_weighted_len`]).
//! When a post is too long the title is shortened first so the link and
//! hashtags survive; only if that is not enough is the whole text cut.

use crate::config::PromoteConfig;
use crate::models::Promotion;
use crate::utils::{find_urls, hashtags, html_to_text};
use std::path::PathBuf;

/// Shortest title worth keeping when fitting a post into its ceiling.
const MIN_TITLE_CHARS: usize = 10;

/// What X charges for any link, whatever its real length.
const X_URL_WEIGHT: usize = 23;

/// How a platform measures post length.
#[derive(Debug, Clone, Copy)]
enum Counter {
    Chars,
    XWeighted,
}

impl Counter {
    fn len(self, text: &str) -> usize {
        match self {
            Counter::Chars => text.chars().count(),
            Counter::XWeighted => x_weighted_len(text),
        }
    }
}

fn x_char_weight(c: char) -> usize {
    match c {
        '\u{0}'..='\u{10FF}'
        | '\u{2000}'..='\u{200D}'
        | '\u{2010}'..='\u{201F}'
        | '\u{2032}'..='\u{2037}' => 1,
        _ => 2,
    }
}

/// Length of `text` as X counts it. Every link weighs 23; outside links,
/// emoji and CJK weigh 2 per character.
pub fn x_weighted_len(text: &str) -> usize {
    let mut len = 0;
    let mut last = 0;
    for (start, end, _) in find_urls(text) {
        len += text[last..start].chars().map(x_char_weight).sum::<usize>() + X_URL_WEIGHT;
        last = end;
    }
    len + text[last..].chars().map(x_char_weight).sum::<usize>()
}

fn cut(s: &str, keep: usize) -> String {
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn fit(max: usize, counter: Counter, title: &str, render: impl Fn(&str) -> String) -> String {
    let full = render(title);
    if counter.len(&full) <= max {
        return full;
    }
    let title_chars = title.chars().count();
    let min_keep = MIN_TITLE_CHARS.saturating_sub(3);
    for keep in (min_keep..title_chars).rev() {
        let text = render(&cut(title, keep));
        if counter.len(&text) <= max {
            return text;
        }
    }
    let full_chars = full.chars().count();
    (0..full_chars)
        .rev()
        .map(|keep| cut(&full, keep))
        .find(|text| counter.len(text) <= max)
        .unwrap_or_default()
}

fn join_tags(body: String, tags: &str) -> String {
    if tags.is_empty() {
        body
    } else {
        format!("{body}\n\n{tags}")
    }
}

pub fn bluesky_promotion(
    config: &PromoteConfig,
    title: &str,
    link_url: &str,
    labels: &[String],
    thumbnail: Option<PathBuf>,
) -> Promotion {
    let tags = hashtags(labels, config.bluesky_hashtags);
    let text = fit(config.bluesky_max_chars, Counter::Chars, title, |t| {
        join_tags(format!("Check out my latest blog post: {t}!\n\n{link_url}"), &tags)
    });
    Promotion {
        text,
        link_url: link_url.to_string(),
        title: title.to_string(),
        description: config.card_description.clone(),
        image: thumbnail,
    }
}

pub fn twitter_promotion(
    config: &PromoteConfig,
    title: &str,
    link_url: &str,
    labels: &[String],
    image: Option<PathBuf>,
) -> Promotion {
    let tags = hashtags(labels, config.twitter_hashtags);
    let text = fit(config.twitter_max_chars, Counter::XWeighted, title, |t| {
        join_tags(format!("🚀 New Blog Post: {t}\n\n{link_url}"), &tags)
    });
    Promotion {
        text,
        link_url: link_url.to_string(),
        title: title.to_string(),
        description: String::new(),
        image,
    }
}

/// Long-form teaser: the first quarter of the article as plain text, capped
/// at `teaser_max_chars`, followed by the link and hashtags.
pub fn teaser_promotion(
    config: &PromoteConfig,
    title: &str,
    body_html: &str,
    link_url: &str,
    labels: &[String],
) -> Promotion {
    let plain = html_to_text(body_html);
    let cut = (plain.chars().count() / 4).min(config.teaser_max_chars);
    let excerpt: String = plain.chars().take(cut).collect();
    let text = join_tags(
        format!("{}...\n\nRead more: {link_url}", excerpt.trim_end()),
        &hashtags(labels, config.teaser_hashtags),
    );
    Promotion {
        text,
        link_url: link_url.to_string(),
        title: title.to_string(),
        description: String::new(),
        image: None,
    }
}
