//! Sentiment classification of comments.
//!
//! The pre-trained models run in a Python sidecar next to this service. Each
//! comment is routed to the English model or the multilingual one by its
//! language tag, and the model's class name is standardized to a polarity.
//! A keyword classifier is available for running without the sidecar.

use crate::error::ClassifierError;
use crate::models::{Comment, ScoredComment, SentimentLabel};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Character budget of the models' input.
pub const MAX_INPUT_CHARS: usize = 512;

static LABEL_POLARITY: Lazy<HashMap<&'static str, i8>> = Lazy::new(|| {
    vec![
        ("very positive", 1),
        ("positive", 1),
        ("neutral", 0),
        ("negative", -1),
        ("very negative", -1),
        ("5 stars", 1),
        ("4 stars", 1),
        ("3 stars", 0),
        ("2 stars", -1),
        ("1 star", -1),
    ]
    .into_iter()
    .collect()
});

/// Maps a model class name to a polarity. Unknown class names are neutral.
pub fn standardize_label(raw: &str) -> SentimentLabel {
    let polarity = LABEL_POLARITY
        .get(raw.trim().to_lowercase().as_str())
        .copied()
        .unwrap_or(0);
    SentimentLabel::from_polarity(polarity)
}

/// Returns at most `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Raw model output for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSentiment {
    pub label: String,
    pub score: f64,
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str, language: &str) -> Result<RawSentiment, ClassifierError>;
}

#[derive(Debug, Serialize)]
struct SentimentRequest<'a> {
    text: &'a str,
    model: &'a str,
}

/// Calls the sidecar's `/ml/sentiment` endpoint.
pub struct RemoteClassifier {
    client: reqwest::Client,
    endpoint: String,
    english_model: String,
    multilingual_model: String,
}

impl RemoteClassifier {
    pub fn new(sidecar_url: &str, english_model: &str, multilingual_model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: format!("{}/ml/sentiment", sidecar_url.trim_end_matches('/')),
            english_model: english_model.to_string(),
            multilingual_model: multilingual_model.to_string(),
        }
    }

    pub fn model_for(&self, language: &str) -> &str {
        if language == "en" {
            &self.english_model
        } else {
            &self.multilingual_model
        }
    }
}

#[async_trait]
impl SentimentClassifier for RemoteClassifier {
    async fn classify(&self, text: &str, language: &str) -> Result<RawSentiment, ClassifierError> {
        let request = SentimentRequest {
            text: truncate_chars(text, MAX_INPUT_CHARS),
            model: self.model_for(language),
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(ClassifierError::Status(response.status().as_u16()));
        }
        let sentiment: RawSentiment = response.json().await?;
        if !(0.0..=1.0).contains(&sentiment.score) {
            return Err(ClassifierError::InvalidScore(sentiment.score));
        }
        Ok(sentiment)
    }
}

// Common positive words, plus how listeners praise a performance
static POSITIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "good", "great", "excellent", "amazing", "wonderful", "fantastic", "superb",
        "outstanding", "brilliant", "love", "loved", "loving", "best", "better",
        "beautiful", "beautifully", "perfect", "perfection", "awesome", "incredible",
        "magnificent", "delightful", "impressive", "exceptional", "remarkable",
        "sublime", "gorgeous", "stunning", "masterful", "virtuoso", "breathtaking",
        "moving", "touching", "expressive", "elegant", "flawless", "divine",
        "heavenly", "bravo", "brava", "favorite", "favourite", "lovely", "tears",
        "goosebumps", "chills", "genius", "legendary", "pure", "joy",
    ]
    .into_iter()
    .collect()
});

static NEGATIVE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "bad", "terrible", "awful", "horrible", "poor", "worst", "worse", "hate",
        "hated", "dislike", "disappointing", "disappointed", "boring", "bored",
        "sloppy", "rushed", "dragging", "mechanical", "lifeless", "soulless",
        "cold", "flat", "sharp", "untuned", "wrong", "mistake", "mistakes",
        "overrated", "mediocre", "annoying", "harsh", "shrill", "messy",
        "unmusical", "exaggerated", "mannered", "cringe", "ruined", "ugly",
    ]
    .into_iter()
    .collect()
});

/// Keyword-based classifier. Emits the models' `positive`/`neutral`/`negative`
/// class names and a confidence in `[0.5, 1]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn analyze(&self, text: &str) -> RawSentiment {
        let lowercase_text = text.to_lowercase();
        let words: Vec<&str> = lowercase_text
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| w.len() > 2)
            .collect();

        let positive_count = words.iter().filter(|w| POSITIVE_WORDS.contains(*w)).count();
        let negative_count = words.iter().filter(|w| NEGATIVE_WORDS.contains(*w)).count();
        let total_sentiment_words = positive_count + negative_count;

        if total_sentiment_words == 0 {
            return RawSentiment {
                label: "neutral".to_string(),
                score: 0.5,
            };
        }

        let positive_ratio = positive_count as f64 / total_sentiment_words as f64;
        let (label, score) = if positive_ratio > 0.6 {
            ("positive", positive_ratio)
        } else if positive_ratio < 0.4 {
            ("negative", 1.0 - positive_ratio)
        } else {
            ("neutral", 0.5 + (positive_ratio - 0.5).abs())
        };

        RawSentiment {
            label: label.to_string(),
            score,
        }
    }
}

#[async_trait]
impl SentimentClassifier for LexiconClassifier {
    async fn classify(&self, text: &str, _language: &str) -> Result<RawSentiment, ClassifierError> {
        Ok(self.analyze(truncate_chars(text, MAX_INPUT_CHARS)))
    }
}

/// Classifies every comment with non-empty clean text.
///
/// A failed classification never aborts the batch: the comment is kept with
/// the `Error` sentinel and a confidence of 0.
pub async fn analyze_sentiment(
    comments: Vec<Comment>,
    classifier: &dyn SentimentClassifier,
) -> Vec<ScoredComment> {
    info!("[ML] Performing sentiment analysis on {} comments, it may take a while...", comments.len());
    let start = Instant::now();

    let mut results = Vec::with_capacity(comments.len());
    for comment in comments {
        if comment.clean_text.trim().is_empty() {
            continue;
        }
        match classifier.classify(&comment.clean_text, &comment.language).await {
            Ok(raw) => {
                let label = standardize_label(&raw.label);
                results.push(ScoredComment::from_comment(comment, label, raw.label, raw.score));
            }
            Err(e) => {
                warn!(
                    "[ML] Error performing sentiment analysis for {}...: {}",
                    truncate_chars(&comment.clean_text, 30),
                    e
                );
                results.push(ScoredComment::classification_failed(comment));
            }
        }
    }

    info!(
        "[ML] Sentiment analysis completed in {:.2} seconds",
        start.elapsed().as_secs_f64()
    );
    results
}
