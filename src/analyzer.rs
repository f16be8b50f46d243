//! End-to-end pipeline: search → sentiment → scores → recommendation.

use crate::config::AnalyzerConfig;
use crate::error::{IngestionError, ScoringError};
use crate::ml::{analyze_sentiment, SentimentClassifier};
use crate::models::VideoScore;
use crate::scoring::{get_recommendation, score_videos, Recommendation, Recommendations, ScoringParams};
use crate::store::{self, output_path};
use crate::youtube::{Ingestion, YouTubeClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use utoipa::ToSchema;

/// Source of candidate videos and their comments.
#[async_trait]
pub trait CommentSource: Send + Sync {
    async fn search_and_filter(
        &self,
        query: &str,
        num_candidates: u32,
        min_duration_secs: u64,
        max_comments: u32,
    ) -> Result<Ingestion, IngestionError>;
}

#[async_trait]
impl CommentSource for YouTubeClient {
    async fn search_and_filter(
        &self,
        query: &str,
        num_candidates: u32,
        min_duration_secs: u64,
        max_comments: u32,
    ) -> Result<Ingestion, IngestionError> {
        YouTubeClient::search_and_filter(self, query, num_candidates, min_duration_secs, max_comments).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisOptions {
    pub num_candidates: u32,
    pub min_duration_secs: u64,
    pub max_comments: u32,
    /// Save every intermediate table as CSV
    pub verbose: bool,
}

impl AnalysisOptions {
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self {
            num_candidates: config.num_candidates,
            min_duration_secs: config.min_duration_secs,
            max_comments: config.max_comments,
            verbose: false,
        }
    }
}

/// Outcome of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisReport {
    pub query: String,
    pub videos_found: usize,
    pub videos_with_comments: usize,
    pub comments_analyzed: usize,
    pub best: Recommendation,
    pub most_polarized: Option<Recommendation>,
}

pub struct PerformanceAnalyzer {
    source: Box<dyn CommentSource>,
    classifier: Box<dyn SentimentClassifier>,
    scoring: ScoringParams,
    output_dir: PathBuf,
}

impl PerformanceAnalyzer {
    pub fn new(
        source: Box<dyn CommentSource>,
        classifier: Box<dyn SentimentClassifier>,
        scoring: ScoringParams,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            source,
            classifier,
            scoring,
            output_dir,
        }
    }

    /// Runs the whole pipeline. `Ok(None)` means no video with comments was found.
    pub async fn get_recommendations(
        &self,
        query: &str,
        options: &AnalysisOptions,
    ) -> anyhow::Result<Option<AnalysisReport>> {
        // 1. Search and filter the videos
        let ingestion = self
            .source
            .search_and_filter(
                query,
                options.num_candidates,
                options.min_duration_secs,
                options.max_comments,
            )
            .await?;
        info!("[Analyzer] Total videos with comments: {}", ingestion.videos_with_comments);
        if ingestion.videos_with_comments == 0 {
            info!("[Analyzer] No videos with comments found.");
            return Ok(None);
        }
        if options.verbose {
            store::save_table(&ingestion.videos, &self.path(query, store::GENERAL_RESULTS_SUFFIX))?;
            store::save_table(&ingestion.comments, &self.path(query, store::COMMENTS_RESULTS_SUFFIX))?;
        }
        let videos_found = ingestion.videos.len();

        // 2. Analyze the sentiment of the comments
        let scored = analyze_sentiment(ingestion.comments, self.classifier.as_ref()).await;
        if options.verbose {
            store::save_table(&scored, &self.path(query, store::SENTIMENT_RESULTS_SUFFIX))?;
        }

        // 3. Score the videos
        let scores = score_videos(&scored, &self.scoring);
        info!("[Analyzer] Total videos with final scores: {}", scores.len());
        if options.verbose {
            store::save_table(&scores, &self.path(query, store::VIDEO_SCORES_SUFFIX))?;
        }

        // 4. Recommend
        let Some(recommendations) = get_recommendation(&scores, &self.scoring) else {
            return Ok(None);
        };
        info!(
            "[Analyzer] Best video: {}, most polarized video: {}",
            recommendations.best.video_id,
            recommendations
                .most_polarized
                .as_ref()
                .map(|r| r.video_id.as_str())
                .unwrap_or("none")
        );

        Ok(Some(AnalysisReport {
            query: query.to_string(),
            videos_found,
            videos_with_comments: ingestion.videos_with_comments,
            comments_analyzed: scored.len(),
            best: recommendations.best,
            most_polarized: recommendations.most_polarized,
        }))
    }

    fn path(&self, query: &str, suffix: &str) -> PathBuf {
        output_path(&self.output_dir, query, suffix)
    }
}

/// Scores an already classified comment table and writes the video scores.
pub fn score_comment_file(
    input: &Path,
    output: &Path,
    params: &ScoringParams,
) -> Result<(Vec<VideoScore>, Option<Recommendations>), ScoringError> {
    let comments = store::load_scored_comments(input)?;
    let scores = score_videos(&comments, params);
    store::save_table(&scores, output)?;
    let recommendations = get_recommendation(&scores, params);
    Ok((scores, recommendations))
}
