//! Scoring engine: turns classified comments into per-video aggregates and
//! picks the two recommendations.
//!
//! Everything here is pure. Groups are keyed in a `BTreeMap` and every sum is
//! taken over values in a canonical order, so the same comment table always
//! yields bit-identical output regardless of row order.

use crate::models::{ScoredComment, VideoScore, UNKNOWN_TITLE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use utoipa::ToSchema;

/// Prior strength of the polarization shrinkage.
pub const DEFAULT_PSEUDO_COUNT: f64 = 5.0;

/// How many of the most polarized videos compete on polarization × total score.
pub const DEFAULT_TOP_POLARIZED: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub pseudo_count: f64,
    pub top_polarized: usize,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            pseudo_count: DEFAULT_PSEUDO_COUNT,
            top_polarized: DEFAULT_TOP_POLARIZED,
        }
    }
}

/// `label × confidence × likes`.
///
/// An unknown like count weighs the comment at zero.
pub fn weighted_sentiment_score(comment: &ScoredComment) -> f64 {
    let likes = match comment.like_count {
        Some(likes) => likes as f64,
        None => {
            warn!(
                "[Scoring] Unknown like_count for comment {} on video {}, weighting it as 0",
                comment.comment_id, comment.video_id
            );
            0.0
        }
    };
    comment.sentiment_label.polarity() * comment.sentiment_score * likes
}

/// Balanced-polarity index in `[0, 1]`: 1 when both masses are equal, 0 when
/// sentiment is unanimous or absent.
pub fn polarization_index(positive_sum: f64, negative_sum: f64) -> f64 {
    let absolute_sum = positive_sum + negative_sum;
    if absolute_sum == 0.0 {
        return 0.0;
    }
    4.0 * (positive_sum / absolute_sum) * (negative_sum / absolute_sum)
}

/// Discounts a polarization index computed from `count` comments toward zero.
pub fn shrink_polarization(polarization: f64, count: usize, pseudo_count: f64) -> f64 {
    let n = count as f64;
    n / (n + pseudo_count) * polarization
}

/// Sample standard deviation (n - 1). Fewer than two values yield 0.
pub fn sample_std_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = canonical_sum(values.iter().copied()) / n;
    let squared = canonical_sum(values.iter().map(|v| (v - mean) * (v - mean)));
    (squared / (n - 1.0)).sqrt()
}

fn canonical_sum(values: impl Iterator<Item = f64>) -> f64 {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(f64::total_cmp);
    values.iter().sum()
}

/// Aggregates the comments of one video. Returns `None` for an empty group.
pub fn aggregate_video(comments: &[&ScoredComment], params: &ScoringParams) -> Option<VideoScore> {
    let first = comments.first()?;
    let count = comments.len();

    // The Error sentinel carries no confidence, whatever its stored score.
    let confidences: Vec<f64> = comments
        .iter()
        .map(|c| if c.sentiment_label.is_error() { 0.0 } else { c.sentiment_score })
        .collect();
    let total_score = canonical_sum(confidences.iter().copied());
    let std_deviation = sample_std_deviation(&confidences);
    let relevance_score =
        canonical_sum(comments.iter().map(|c| c.relevance_score)) / count as f64;

    let weighted: Vec<(f64, &ScoredComment)> = comments
        .iter()
        .map(|c| (weighted_sentiment_score(c), *c))
        .collect();
    let positive_sum = canonical_sum(
        weighted
            .iter()
            .filter(|(_, c)| c.sentiment_label.polarity() > 0.0)
            .map(|(w, _)| *w),
    )
    .abs();
    let negative_sum = canonical_sum(
        weighted
            .iter()
            .filter(|(_, c)| c.sentiment_label.polarity() < 0.0)
            .map(|(w, _)| *w),
    )
    .abs();

    let polarization = polarization_index(positive_sum, negative_sum);
    let shrunk = shrink_polarization(polarization, count, params.pseudo_count);
    let relevance_damping = relevance_score.max(0.0).sqrt();

    let video_title = comments
        .iter()
        .map(|c| c.video_title.as_str())
        .find(|t| !t.is_empty() && *t != UNKNOWN_TITLE)
        .unwrap_or(UNKNOWN_TITLE)
        .to_string();

    Some(VideoScore {
        video_id: first.video_id.clone(),
        video_title,
        total_score: total_score * relevance_score,
        relevance_score,
        std_deviation: std_deviation * relevance_damping,
        polarization_score_with_pseudo_count: shrunk * relevance_damping,
    })
}

/// Groups comments by `video_id` and aggregates each group.
///
/// Output rows are ordered by `video_id`. An empty comment table produces an
/// empty score table.
pub fn score_videos(comments: &[ScoredComment], params: &ScoringParams) -> Vec<VideoScore> {
    let mut groups: BTreeMap<&str, Vec<&ScoredComment>> = BTreeMap::new();
    for comment in comments {
        groups.entry(comment.video_id.as_str()).or_default().push(comment);
    }
    groups
        .values()
        .filter_map(|group| aggregate_video(group, params))
        .collect()
}

/// The five scalar fields reported for each recommendation category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Recommendation {
    pub video_id: String,
    pub video_title: String,
    pub total_score: f64,
    pub polarization_score_with_pseudo_count: f64,
    pub std_deviation: f64,
}

impl Recommendation {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

impl From<&VideoScore> for Recommendation {
    fn from(score: &VideoScore) -> Self {
        Recommendation {
            video_id: score.video_id.clone(),
            video_title: score.video_title.clone(),
            total_score: score.total_score,
            polarization_score_with_pseudo_count: score.polarization_score_with_pseudo_count,
            std_deviation: score.std_deviation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Recommendations {
    /// Highest total score, first row wins ties
    pub best: Recommendation,
    /// `None` when no top-polarized candidate has a positive
    /// polarization × total score product
    pub most_polarized: Option<Recommendation>,
}

/// Picks the best and the most polarized video. `None` for an empty table.
///
/// Best is the first row holding the maximum `total_score`. The most polarized
/// video is chosen among the `top_polarized` rows with the largest shrunk
/// polarization (ties keep row order) as the strictly largest positive
/// product of polarization and total score.
pub fn get_recommendation(scores: &[VideoScore], params: &ScoringParams) -> Option<Recommendations> {
    let best = scores
        .iter()
        .reduce(|best, row| if row.total_score > best.total_score { row } else { best })?;

    let mut by_polarization: Vec<&VideoScore> = scores.iter().collect();
    by_polarization.sort_by(|a, b| {
        b.polarization_score_with_pseudo_count
            .total_cmp(&a.polarization_score_with_pseudo_count)
    });

    let mut highest_product = 0.0;
    let mut most_polarized = None;
    for candidate in by_polarization.into_iter().take(params.top_polarized) {
        let product = candidate.polarization_score_with_pseudo_count * candidate.total_score;
        if product > highest_product {
            highest_product = product;
            most_polarized = Some(candidate);
        }
    }

    Some(Recommendations {
        best: best.into(),
        most_polarized: most_polarized.map(Recommendation::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SentimentLabel, DEFAULT_RELEVANCE};

    const EPS: f64 = 1e-9;

    fn comment(video_id: &str, label: i8, score: f64, likes: Option<u64>) -> ScoredComment {
        ScoredComment {
            video_id: video_id.to_string(),
            video_title: format!("Title {}", video_id),
            comment_id: format!("{}-{}-{}", video_id, label, score),
            author: "someone".to_string(),
            raw_text: String::new(),
            clean_text: String::new(),
            language: "en".to_string(),
            like_count: likes,
            sentiment_label: SentimentLabel::from_polarity(label),
            original_sentiment_label: String::new(),
            sentiment_score: score,
            relevance_score: DEFAULT_RELEVANCE,
        }
    }

    fn video_score(id: &str, total: f64, polar: f64) -> VideoScore {
        VideoScore {
            video_id: id.to_string(),
            video_title: id.to_string(),
            total_score: total,
            relevance_score: 1.0,
            std_deviation: 0.1,
            polarization_score_with_pseudo_count: polar,
        }
    }

    #[test]
    fn test_two_comment_example() {
        let comments = vec![comment("V1", 1, 0.9, Some(10)), comment("V1", -1, 0.8, Some(5))];
        assert!((weighted_sentiment_score(&comments[0]) - 9.0).abs() < EPS);
        assert!((weighted_sentiment_score(&comments[1]) + 4.0).abs() < EPS);

        let scores = score_videos(&comments, &ScoringParams::default());
        assert_eq!(scores.len(), 1);
        let v1 = &scores[0];
        assert_eq!(v1.video_id, "V1");
        assert_eq!(v1.video_title, "Title V1");
        assert!((v1.total_score - 1.7).abs() < EPS);
        assert!((v1.relevance_score - 1.0).abs() < EPS);
        let expected_polarization: f64 = 4.0 * (9.0 / 13.0) * (4.0 / 13.0);
        assert!((expected_polarization - 0.8521).abs() < 1e-4);
        assert!((v1.polarization_score_with_pseudo_count - 2.0 / 7.0 * expected_polarization).abs() < EPS);
        assert!((v1.polarization_score_with_pseudo_count - 0.2435).abs() < 1e-4);
        assert!((v1.std_deviation - 0.005f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_unanimous_sentiment_is_not_polarized() {
        let comments = vec![
            comment("A", 1, 0.9, Some(3)),
            comment("A", 1, 0.7, Some(8)),
            comment("A", 0, 0.6, Some(20)),
        ];
        let scores = score_videos(&comments, &ScoringParams::default());
        assert_eq!(scores[0].polarization_score_with_pseudo_count, 0.0);
        assert_eq!(polarization_index(0.0, 0.0), 0.0);
        assert_eq!(polarization_index(12.5, 0.0), 0.0);
    }

    #[test]
    fn test_balanced_masses_give_full_polarization() {
        assert!((polarization_index(6.0, 6.0) - 1.0).abs() < EPS);
        let comments = vec![comment("A", 1, 0.5, Some(4)), comment("A", -1, 1.0, Some(2))];
        let expected = shrink_polarization(1.0, 2, DEFAULT_PSEUDO_COUNT);
        let scores = score_videos(&comments, &ScoringParams::default());
        assert!((scores[0].polarization_score_with_pseudo_count - expected).abs() < EPS);
    }

    #[test]
    fn test_shrinkage_is_bounded_and_monotonic() {
        let polarization = 0.8;
        let mut previous = 0.0;
        for n in 1..200 {
            let shrunk = shrink_polarization(polarization, n, DEFAULT_PSEUDO_COUNT);
            assert!(shrunk >= 0.0 && shrunk <= polarization);
            assert!(shrunk > previous);
            previous = shrunk;
        }
        assert!(polarization - previous < 0.03);
        assert!((shrink_polarization(polarization, 1, DEFAULT_PSEUDO_COUNT) - polarization / 6.0).abs() < EPS);
    }

    #[test]
    fn test_single_comment_group() {
        let comments = vec![comment("solo", -1, 0.75, Some(4))];
        let scores = score_videos(&comments, &ScoringParams::default());
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].std_deviation, 0.0);
        assert!(!scores[0].std_deviation.is_nan());
        assert_eq!(scores[0].polarization_score_with_pseudo_count, 0.0);
    }

    #[test]
    fn test_row_order_does_not_change_output() {
        let comments = vec![
            comment("B", 1, 0.91, Some(7)),
            comment("A", -1, 0.33, Some(2)),
            comment("B", -1, 0.47, Some(11)),
            comment("A", 1, 0.62, None),
            comment("B", 0, 0.58, Some(0)),
            comment("A", 1, 0.99, Some(13)),
        ];
        let mut shuffled = comments.clone();
        shuffled.reverse();
        shuffled.swap(0, 3);

        let params = ScoringParams::default();
        let first = score_videos(&comments, &params);
        assert_eq!(first, score_videos(&shuffled, &params));
        assert_eq!(first, score_videos(&comments, &params));
        assert_eq!(first.iter().map(|s| s.video_id.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_unknown_likes_and_failed_classifications_weigh_zero() {
        let mut failed = comment("A", 1, 0.0, Some(50));
        failed.sentiment_label = SentimentLabel::Error;
        assert_eq!(weighted_sentiment_score(&failed), 0.0);
        assert_eq!(weighted_sentiment_score(&comment("A", 1, 0.9, None)), 0.0);

        let comments = vec![failed, comment("A", 1, 0.8, Some(2)), comment("A", -1, 0.9, None)];
        let scores = score_videos(&comments, &ScoringParams::default());
        assert_eq!(scores[0].polarization_score_with_pseudo_count, 0.0);
        assert!((scores[0].total_score - 1.7).abs() < EPS);
    }

    #[test]
    fn test_error_rows_add_no_confidence_even_with_stored_score() {
        let mut failed = comment("V1", 0, 0.9, Some(3));
        failed.sentiment_label = SentimentLabel::Error;
        let comments = vec![failed, comment("V1", 1, 0.5, Some(2))];

        let scores = score_videos(&comments, &ScoringParams::default());
        assert!((scores[0].total_score - 0.5).abs() < EPS);
        // confidences are [0.0, 0.5]
        assert!((scores[0].std_deviation - 0.125f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_relevance_scales_total_fully_and_dispersion_by_sqrt() {
        let mut comments = vec![comment("A", 1, 0.9, Some(10)), comment("A", -1, 0.8, Some(5))];
        let baseline = score_videos(&comments, &ScoringParams::default()).remove(0);
        for c in comments.iter_mut() {
            c.relevance_score = 0.25;
        }
        let scaled = score_videos(&comments, &ScoringParams::default()).remove(0);
        assert!((scaled.relevance_score - 0.25).abs() < EPS);
        assert!((scaled.total_score - baseline.total_score * 0.25).abs() < EPS);
        assert!((scaled.std_deviation - baseline.std_deviation * 0.5).abs() < EPS);
        assert!(
            (scaled.polarization_score_with_pseudo_count
                - baseline.polarization_score_with_pseudo_count * 0.5)
                .abs()
                < EPS
        );
    }

    #[test]
    fn test_empty_inputs() {
        assert!(score_videos(&[], &ScoringParams::default()).is_empty());
        assert!(aggregate_video(&[], &ScoringParams::default()).is_none());
        assert!(get_recommendation(&[], &ScoringParams::default()).is_none());
    }

    #[test]
    fn test_recommendation_example() {
        let scores = vec![video_score("V1", 1.7, 0.24), video_score("V2", 0.5, 0.9)];
        let rec = get_recommendation(&scores, &ScoringParams::default()).unwrap();
        assert_eq!(rec.best.video_id, "V1");
        assert_eq!(rec.best.total_score, 1.7);
        let polarized = rec.most_polarized.unwrap();
        assert_eq!(polarized.video_id, "V2");
        assert_eq!(polarized.polarization_score_with_pseudo_count, 0.9);
        assert_eq!(polarized.watch_url(), "https://www.youtube.com/watch?v=V2");
    }

    #[test]
    fn test_best_ties_go_to_first_row() {
        let scores = vec![video_score("first", 2.0, 0.0), video_score("second", 2.0, 0.0)];
        let rec = get_recommendation(&scores, &ScoringParams::default()).unwrap();
        assert_eq!(rec.best.video_id, "first");
    }

    #[test]
    fn test_only_top_three_polarized_compete() {
        let scores = vec![
            video_score("a", 1.0, 0.50),
            video_score("b", 1.0, 0.60),
            video_score("c", 1.0, 0.70),
            video_score("d", 100.0, 0.40),
            video_score("e", 1.0, 0.55),
        ];
        let rec = get_recommendation(&scores, &ScoringParams::default()).unwrap();
        assert_eq!(rec.best.video_id, "d");
        assert_eq!(rec.most_polarized.unwrap().video_id, "c");
    }

    #[test]
    fn test_polarization_ties_keep_row_order() {
        let scores = vec![
            video_score("a", 1.0, 0.5),
            video_score("b", 1.0, 0.5),
            video_score("c", 1.0, 0.5),
            video_score("d", 9.0, 0.5),
        ];
        let rec = get_recommendation(&scores, &ScoringParams::default()).unwrap();
        // "d" is fourth among equals and never makes the cut.
        assert_eq!(rec.most_polarized.unwrap().video_id, "a");
    }

    #[test]
    fn test_no_polarized_pick_without_positive_product() {
        let scores = vec![video_score("a", 3.0, 0.0), video_score("b", 0.0, 0.7)];
        let rec = get_recommendation(&scores, &ScoringParams::default()).unwrap();
        assert_eq!(rec.best.video_id, "a");
        assert!(rec.most_polarized.is_none());
    }
}
