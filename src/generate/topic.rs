//! Topic generation with duplicate avoidance.
//!
//! Each attempt asks the text service for a topic, passing recent blog
//! titles and the topic history as things not to repeat, and checks the
//! reply with [`crate::dedup`]. The policy favours always publishing
//! something over always publishing something new:
//!
//! ```text
//! attempting --accepted--------------------> Accepted(topic)
//!     |  \--duplicate or empty--> attempting (no wait)
//!     |  \--timeout----> retrying --backoff--> attempting
//!     |  \--other error-------------------> Err (fatal)
//!     \--attempts exhausted----------------> Fallback(fixed topic)
//! ```

use crate::api::{ChatRequest, TextService};
use crate::config::AppConfig;
use crate::dedup::{closest_match, is_duplicate};
use crate::error::ServiceError;
use itertools::Itertools;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct TopicPolicy {
    pub model: String,
    pub subjects: Vec<String>,
    pub max_attempts: usize,
    pub backoff: Duration,
    pub threshold: f64,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    pub fallback_topic: String,
}

impl TopicPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.text.model.clone(),
            subjects: config.topic.subjects.clone(),
            max_attempts: config.topic.max_attempts,
            backoff: Duration::from_secs(config.topic.backoff_secs),
            threshold: config.topic.similarity_threshold,
            timeout: Duration::from_secs(config.text.topic_timeout_secs),
            max_tokens: config.text.topic_max_tokens,
            temperature: config.text.topic_temperature,
            fallback_topic: config.topic.fallback_topic.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopicOutcome {
    Accepted { topic: String, attempts: usize },
    /// Every attempt timed out, came back empty or was a duplicate.
    Fallback { topic: String },
}

impl TopicOutcome {
    pub fn topic(&self) -> &str {
        match self {
            TopicOutcome::Accepted { topic, .. } | TopicOutcome::Fallback { topic } => topic,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, TopicOutcome::Fallback { .. })
    }
}

#[derive(Debug, Error)]
pub enum TopicError {
    #[error("topic generation failed: {0}")]
    Service(#[source] ServiceError),
}

pub fn topic_prompt<S: AsRef<str>>(subjects: &[S], avoid: &[S]) -> String {
    let subjects = subjects.iter().map(AsRef::as_ref).join(", ");
    let mut prompt = format!(
        "Generate a unique and engaging blog post topic about {subjects}. \
         Ensure it is concise and free of unnecessary words. Reply with the topic only."
    );
    if !avoid.is_empty() {
        prompt.push_str(" Do NOT generate a topic similar to these: ");
        prompt.push_str(&avoid.iter().map(AsRef::as_ref).join(", "));
        prompt.push('.');
    }
    prompt
}

/// Strip whitespace, wrapping quotes and a leading `Topic:` from a reply.
pub fn clean_topic(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(rest) = s
        .strip_prefix("Topic:")
        .or_else(|| s.strip_prefix("topic:"))
    {
        s = rest.trim();
    }
    s.trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '*'))
        .trim()
        .to_string()
}

/// Run the attempt loop described in the module docs.
#[instrument(level = "info", skip_all, fields(max_attempts = policy.max_attempts))]
pub async fn generate_topic<T: TextService>(
    text: &T,
    policy: &TopicPolicy,
    recent_titles: &[String],
    history: &[String],
) -> Result<TopicOutcome, TopicError> {
    let avoid: Vec<String> = history
        .iter()
        .chain(recent_titles)
        .cloned()
        .unique()
        .collect();
    let prompt = topic_prompt(&policy.subjects, &avoid);
    let request = ChatRequest {
        model: &policy.model,
        prompt: &prompt,
        max_tokens: policy.max_tokens,
        temperature: Some(policy.temperature),
        timeout: policy.timeout,
    };

    for attempt in 1..=policy.max_attempts {
        info!(attempt, "Generating topic");
        match text.complete(&request).await {
            Ok(reply) => {
                let candidate = clean_topic(&reply);
                if candidate.is_empty() {
                    warn!(attempt, "Model returned an empty topic");
                    continue;
                }
                if is_duplicate(&candidate, &avoid, policy.threshold) {
                    let (existing, ratio) = closest_match(&candidate, &avoid).unwrap_or_default();
                    warn!(attempt, %candidate, %existing, ratio, "Duplicate topic; trying again");
                    continue;
                }
                info!(attempt, topic = %candidate, "Accepted topic");
                return Ok(TopicOutcome::Accepted {
                    topic: candidate,
                    attempts: attempt,
                });
            }
            Err(ServiceError::Empty(service)) => {
                warn!(attempt, service, "Model returned an empty topic");
            }
            Err(e) if e.is_timeout() => {
                warn!(attempt, error = %e, backoff = ?policy.backoff, "Topic request timed out; retrying");
                sleep(policy.backoff).await;
            }
            Err(e) => return Err(TopicError::Service(e)),
        }
    }

    warn!(topic = %policy.fallback_topic, "Could not generate a unique topic; using fallback");
    Ok(TopicOutcome::Fallback {
        topic: policy.fallback_topic.clone(),
    })
}
