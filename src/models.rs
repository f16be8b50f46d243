//! Record types shared by every stage of the pipeline.
//!
//! Rows flow strictly forward: [`Video`] and [`Comment`] come out of ingestion,
//! [`ScoredComment`] out of sentiment classification and [`VideoScore`] out of
//! the scoring engine.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Title used when a comment row carries no video title.
pub const UNKNOWN_TITLE: &str = "N/A";

/// Placeholder title-to-query relevance multiplier.
pub const DEFAULT_RELEVANCE: f64 = 1.0;

/// A candidate performance video that survived title and duration filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub video_id: String,
    pub title: String,
    /// Duration formatted as `hh:mm:ss`
    pub duration: String,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
}

/// A cleaned, language tagged top-level comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub video_id: String,
    pub video_title: String,
    pub comment_id: String,
    pub author: String,
    pub raw_text: String,
    pub clean_text: String,
    /// ISO 639-1 code where one exists, `unknown` when detection failed
    pub language: String,
    /// `None` when the API omitted the like count
    pub like_count: Option<u64>,
}

/// Standardized polarity of a classified comment.
///
/// `Error` is the sentinel for a comment whose classification failed. It
/// weighs as zero everywhere in aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
    Error,
}

impl SentimentLabel {
    pub fn from_polarity(polarity: i8) -> Self {
        match polarity.signum() {
            1 => SentimentLabel::Positive,
            -1 => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }
    }

    /// Signed multiplier used by the weighted score.
    pub fn polarity(self) -> f64 {
        match self {
            SentimentLabel::Positive => 1.0,
            SentimentLabel::Negative => -1.0,
            SentimentLabel::Neutral | SentimentLabel::Error => 0.0,
        }
    }

    pub fn is_error(self) -> bool {
        self == SentimentLabel::Error
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SentimentLabel::Negative => "-1",
            SentimentLabel::Neutral => "0",
            SentimentLabel::Positive => "1",
            SentimentLabel::Error => "Error",
        };
        f.write_str(s)
    }
}

impl FromStr for SentimentLabel {
    type Err = String;

    /// Accepts `-1`, `0`, `1`, their float spellings and `Error`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("error") {
            return Ok(SentimentLabel::Error);
        }
        let value: f64 = s
            .parse()
            .map_err(|_| format!("invalid sentiment label: {:?}", s))?;
        if value == 1.0 {
            Ok(SentimentLabel::Positive)
        } else if value == 0.0 {
            Ok(SentimentLabel::Neutral)
        } else if value == -1.0 {
            Ok(SentimentLabel::Negative)
        } else {
            Err(format!("sentiment label out of range: {}", s))
        }
    }
}

impl Serialize for SentimentLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SentimentLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// A comment annotated with its sentiment classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredComment {
    pub video_id: String,
    pub video_title: String,
    pub comment_id: String,
    pub author: String,
    pub raw_text: String,
    pub clean_text: String,
    pub language: String,
    pub like_count: Option<u64>,
    pub sentiment_label: SentimentLabel,
    /// Class name exactly as the model returned it
    pub original_sentiment_label: String,
    /// Model confidence in `[0, 1]`
    pub sentiment_score: f64,
    pub relevance_score: f64,
}

impl ScoredComment {
    pub fn from_comment(
        comment: Comment,
        sentiment_label: SentimentLabel,
        original_sentiment_label: String,
        sentiment_score: f64,
    ) -> Self {
        Self {
            video_id: comment.video_id,
            video_title: comment.video_title,
            comment_id: comment.comment_id,
            author: comment.author,
            raw_text: comment.raw_text,
            clean_text: comment.clean_text,
            language: comment.language,
            like_count: comment.like_count,
            sentiment_label,
            original_sentiment_label,
            sentiment_score,
            relevance_score: DEFAULT_RELEVANCE,
        }
    }

    /// Sentinel row for a comment the classifier could not handle.
    pub fn classification_failed(comment: Comment) -> Self {
        Self::from_comment(comment, SentimentLabel::Error, "Error".to_string(), 0.0)
    }
}

/// One aggregate row per distinct video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VideoScore {
    pub video_id: String,
    pub video_title: String,
    /// Sum of comment confidences scaled by relevance
    pub total_score: f64,
    pub relevance_score: f64,
    pub std_deviation: f64,
    pub polarization_score_with_pseudo_count: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parses_integer_and_float_spellings() {
        assert_eq!("1".parse::<SentimentLabel>().unwrap(), SentimentLabel::Positive);
        assert_eq!("-1.0".parse::<SentimentLabel>().unwrap(), SentimentLabel::Negative);
        assert_eq!(" 0 ".parse::<SentimentLabel>().unwrap(), SentimentLabel::Neutral);
        assert_eq!("Error".parse::<SentimentLabel>().unwrap(), SentimentLabel::Error);
        assert!("2".parse::<SentimentLabel>().is_err());
        assert!("positive".parse::<SentimentLabel>().is_err());
    }

    #[test]
    fn test_label_display_matches_table_encoding() {
        assert_eq!(SentimentLabel::Negative.to_string(), "-1");
        assert_eq!(SentimentLabel::Error.to_string(), "Error");
        assert_eq!(SentimentLabel::from_polarity(-3), SentimentLabel::Negative);
    }

    #[test]
    fn test_failed_classification_is_neutral_in_weight() {
        assert_eq!(SentimentLabel::Error.polarity(), 0.0);
        assert!(SentimentLabel::Error.is_error());
    }
}
