//! YouTube Data API v3 client and the search-and-filter ingestion step.

use crate::error::IngestionError;
use crate::models::{Comment, Video, UNKNOWN_TITLE};
use crate::text::{clean_text, detect_language};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const SEARCH_ATTEMPTS: u32 = 3;

/// Words whose presence in a title marks a video as something other than a
/// full performance.
pub const EXCLUDE_WORDS: &[&str] = &[
    "tutorial",
    "analysis",
    "lesson",
    "fragment",
    "excerpt",
    "review",
    "preview",
    "shorts",
    "masterclass",
    "master class",
    "explanation",
    "guide",
    "demonstration",
    "practice",
    "explained",
    "walkthrough",
    "how to play",
    "how to perform",
    "how to improve",
    "how to learn",
];

static EXCLUDE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    EXCLUDE_WORDS
        .iter()
        .map(|word| {
            let pattern = format!(r"\b{}\b", regex::escape(word));
            (*word, Regex::new(&pattern).unwrap())
        })
        .collect()
});

static ISO_DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").unwrap());

/// Returns `false` when the title contains one of [`EXCLUDE_WORDS`] as a whole word.
pub fn is_performance_video(title: &str) -> bool {
    let title_lower = title.to_lowercase();
    for (word, pattern) in EXCLUDE_PATTERNS.iter() {
        if pattern.is_match(&title_lower) {
            debug!("[YouTube] Filtered out {} because it contains {}", title, word);
            return false;
        }
    }
    true
}

/// Parses an ISO 8601 `PT#H#M#S` duration into seconds. Anything else is 0.
pub fn parse_iso_duration(iso: &str) -> u64 {
    let Some(caps) = ISO_DURATION_RE.captures(iso) else {
        return 0;
    };
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    part(1) * 3600 + part(2) * 60 + part(3)
}

pub fn format_hhmmss(seconds: u64) -> String {
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

// ============================================================================
// API payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub id: SearchItemId,
    #[serde(default)]
    pub snippet: TitleSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItemId {
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitleSnippet {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    #[serde(default)]
    pub snippet: TitleSnippet,
    #[serde(default)]
    pub statistics: VideoStatistics,
    #[serde(default)]
    pub content_details: ContentDetails,
}

/// Counts arrive as decimal strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentDetails {
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    pub snippet: CommentThreadSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadSnippet {
    pub top_level_comment: TopLevelComment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopLevelComment {
    pub id: Option<String>,
    #[serde(default)]
    pub snippet: CommentSnippet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnippet {
    pub author_display_name: Option<String>,
    pub text_display: Option<String>,
    pub like_count: Option<u64>,
}

impl VideoItem {
    pub fn title(&self) -> &str {
        self.snippet.title.as_deref().unwrap_or(UNKNOWN_TITLE)
    }

    pub fn duration_secs(&self) -> u64 {
        parse_iso_duration(self.content_details.duration.as_deref().unwrap_or("PT0S"))
    }

    pub fn to_video(&self) -> Video {
        let count = |v: &Option<String>| v.as_deref().and_then(|s| s.parse::<u64>().ok());
        Video {
            video_id: self.id.clone(),
            title: self.title().to_string(),
            duration: format_hhmmss(self.duration_secs()),
            view_count: count(&self.statistics.view_count),
            like_count: count(&self.statistics.like_count),
            comment_count: count(&self.statistics.comment_count),
        }
    }
}

impl CommentThread {
    /// Cleans and language tags the thread's top-level comment.
    pub fn to_comment(&self, video: &Video) -> Comment {
        let top = &self.snippet.top_level_comment;
        let raw_text = top.snippet.text_display.clone().unwrap_or_default();
        let clean_text = clean_text(&raw_text);
        let language = detect_language(&clean_text);
        Comment {
            video_id: video.video_id.clone(),
            video_title: video.title.clone(),
            comment_id: top.id.clone().unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            author: top
                .snippet
                .author_display_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            raw_text,
            clean_text,
            language,
            like_count: top.snippet.like_count,
        }
    }
}

/// Output of [`YouTubeClient::search_and_filter`].
#[derive(Debug, Clone, Default)]
pub struct Ingestion {
    pub videos: Vec<Video>,
    pub comments: Vec<Comment>,
    pub videos_with_comments: usize,
}

// ============================================================================
// Client
// ============================================================================

pub struct YouTubeClient {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl YouTubeClient {
    /// A missing API key is only reported once a request is made.
    pub fn new(api_base: &str, api_key: Option<String>) -> Result<Self, IngestionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, String)],
    ) -> Result<T, IngestionError> {
        let api_key = self.api_key.as_deref().ok_or(IngestionError::MissingApiKey)?;
        let url = format!("{}/{}", self.api_base, resource);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestionError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Searches videos, retrying transport and server errors.
    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchItem>, IngestionError> {
        info!("[YouTube] Starting search for {} with {} candidates", query, max_results);
        let mut last_error = String::from("No results found");

        for attempt in 1..=SEARCH_ATTEMPTS {
            if attempt > 1 {
                info!("[YouTube] Retry attempt {}/{}...", attempt, SEARCH_ATTEMPTS);
            }
            match self.search_attempt(query, max_results).await {
                Ok(items) => return Ok(items),
                Err(IngestionError::Api { status, body }) if status < 500 => {
                    return Err(IngestionError::Api { status, body });
                }
                Err(IngestionError::MissingApiKey) => return Err(IngestionError::MissingApiKey),
                Err(e) => {
                    warn!("[YouTube] Attempt {}/{}: {}", attempt, SEARCH_ATTEMPTS, e);
                    last_error = e.to_string();
                    if attempt < SEARCH_ATTEMPTS {
                        sleep(retry_delay(attempt)).await;
                    }
                }
            }
        }

        Err(IngestionError::RetriesExhausted {
            attempts: SEARCH_ATTEMPTS,
            last_error,
        })
    }

    async fn search_attempt(&self, query: &str, max_results: u32) -> Result<Vec<SearchItem>, IngestionError> {
        let response: ListResponse<SearchItem> = self
            .get_json(
                "search",
                &[
                    ("part", "id,snippet".to_string()),
                    ("q", query.to_string()),
                    ("type", "video".to_string()),
                    ("maxResults", max_results.clamp(1, 50).to_string()),
                ],
            )
            .await?;
        Ok(response.items)
    }

    pub async fn video_details(&self, ids: &[String]) -> Result<Vec<VideoItem>, IngestionError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: ListResponse<VideoItem> = self
            .get_json(
                "videos",
                &[
                    ("part", "snippet,statistics,contentDetails".to_string()),
                    ("id", ids.join(",")),
                ],
            )
            .await?;
        Ok(response.items)
    }

    /// First page of top-level comment threads for a video.
    pub async fn top_level_comments(
        &self,
        video_id: &str,
        max_comments: u32,
    ) -> Result<Vec<CommentThread>, IngestionError> {
        let result: Result<ListResponse<CommentThread>, _> = self
            .get_json(
                "commentThreads",
                &[
                    ("part", "id,snippet".to_string()),
                    ("videoId", video_id.to_string()),
                    ("maxResults", max_comments.clamp(1, 100).to_string()),
                ],
            )
            .await;
        match result {
            Ok(response) => Ok(response.items),
            Err(IngestionError::Api { status: 403, .. }) => Err(IngestionError::CommentsForbidden {
                video_id: video_id.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Searches, drops non-performance titles and short videos, then fetches
    /// and cleans the comments of every remaining video.
    ///
    /// `min_duration_secs == 0` disables the duration filter. A video whose
    /// comments cannot be fetched contributes no comments.
    pub async fn search_and_filter(
        &self,
        query: &str,
        num_candidates: u32,
        min_duration_secs: u64,
        max_comments: u32,
    ) -> Result<Ingestion, IngestionError> {
        let items = self.search(query, num_candidates).await?;

        info!("[YouTube] Filtering {} videos", items.len());
        let filtered_ids = filter_performances(&items);
        info!("[YouTube] Filtering done! {} videos left after filtering", filtered_ids.len());
        if filtered_ids.is_empty() {
            info!("[YouTube] No videos left after filtering");
            return Ok(Ingestion::default());
        }

        let mut ingestion = Ingestion::default();
        for item in self.video_details(&filtered_ids).await? {
            if min_duration_secs > 0 && item.duration_secs() < min_duration_secs {
                info!(
                    "[YouTube] Filtered out {} because it is less than {} seconds",
                    item.title(),
                    min_duration_secs
                );
                continue;
            }
            let video = item.to_video();

            info!("[YouTube] Fetching the first {} comments for {}", max_comments, video.title);
            let threads = match self.top_level_comments(&video.video_id, max_comments).await {
                Ok(threads) => threads,
                Err(e) => {
                    warn!("[YouTube] Error fetching comments for {}: {}", video.title, e);
                    Vec::new()
                }
            };
            info!("[YouTube] Fetched {} comments for {}", threads.len(), video.title);

            if !threads.is_empty() {
                ingestion.videos_with_comments += 1;
            }
            ingestion
                .comments
                .extend(threads.iter().map(|thread| thread.to_comment(&video)));
            ingestion.videos.push(video);
        }

        Ok(ingestion)
    }
}

/// Ids of search hits whose titles look like full performances.
pub fn filter_performances(items: &[SearchItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| {
            let video_id = item.id.video_id.as_ref()?;
            let title = item.snippet.title.as_deref().unwrap_or_default();
            is_performance_video(title).then(|| video_id.clone())
        })
        .collect()
}

fn retry_delay(attempt: u32) -> Duration {
    let jitter_ms: u64 = {
        use rand::Rng;
        rand::thread_rng().gen_range(0..500)
    };
    Duration::from_secs(5 * attempt as u64) + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_duration() {
        assert_eq!(parse_iso_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_iso_duration("PT4M"), 240);
        assert_eq!(parse_iso_duration("PT59S"), 59);
        assert_eq!(parse_iso_duration("PT0S"), 0);
        assert_eq!(parse_iso_duration("garbage"), 0);
        assert_eq!(format_hhmmss(3723), "01:02:03");
        assert_eq!(format_hhmmss(65), "00:01:05");
    }

    #[test]
    fn test_is_performance_video() {
        assert!(is_performance_video("Mozart Violin Sonata in E minor K.304 - Anne-Sophie Mutter"));
        assert!(!is_performance_video("Mozart Sonata K.304 TUTORIAL for beginners"));
        assert!(!is_performance_video("Violin Master Class: Mozart K.304"));
        assert!(!is_performance_video("How to play Mozart K.304"));
        // whole words only
        assert!(is_performance_video("Reviewing my favourite recordings live"));
        assert!(is_performance_video("Guidebook Ensemble plays Mozart"));
    }

    #[test]
    fn test_filter_performances_skips_channels_and_excluded_titles() {
        let items: Vec<SearchItem> = serde_json::from_value(serde_json::json!([
            {"id": {"kind": "youtube#video", "videoId": "keep"}, "snippet": {"title": "Mozart K.304 Live"}},
            {"id": {"kind": "youtube#video", "videoId": "drop"}, "snippet": {"title": "Mozart K.304 analysis"}},
            {"id": {"kind": "youtube#channel", "channelId": "UC1"}, "snippet": {"title": "Some channel"}}
        ]))
        .unwrap();
        assert_eq!(filter_performances(&items), vec!["keep".to_string()]);
    }

    #[test]
    fn test_video_item_conversion() {
        let item: VideoItem = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "snippet": {"title": "Sonata K.304"},
            "statistics": {"viewCount": "1200", "likeCount": "45"},
            "contentDetails": {"duration": "PT14M5S"}
        }))
        .unwrap();
        assert_eq!(item.duration_secs(), 845);
        let video = item.to_video();
        assert_eq!(video.duration, "00:14:05");
        assert_eq!(video.view_count, Some(1200));
        assert_eq!(video.like_count, Some(45));
        assert_eq!(video.comment_count, None);
    }

    #[test]
    fn test_comment_thread_conversion() {
        let video = Video {
            video_id: "abc".to_string(),
            title: "Sonata K.304".to_string(),
            duration: "00:14:05".to_string(),
            view_count: None,
            like_count: None,
            comment_count: None,
        };
        let thread: CommentThread = serde_json::from_value(serde_json::json!({
            "snippet": {"topLevelComment": {"id": "c1", "snippet": {
                "authorDisplayName": "@listener",
                "textDisplay": "The second movement at <a href=\"https://www.youtube.com/watch?v=abc&amp;t=300\">5:00</a> is absolutely beautiful<br>thank you",
                "likeCount": 12
            }}}
        }))
        .unwrap();
        let comment = thread.to_comment(&video);
        assert_eq!(comment.video_id, "abc");
        assert_eq!(comment.video_title, "Sonata K.304");
        assert_eq!(comment.comment_id, "c1");
        assert_eq!(comment.author, "@listener");
        assert_eq!(comment.clean_text, "The second movement at is absolutely beautiful thank you");
        assert_eq!(comment.language, "en");
        assert_eq!(comment.like_count, Some(12));
    }

    #[test]
    fn test_missing_like_count_stays_unknown() {
        let thread: CommentThread = serde_json::from_value(serde_json::json!({
            "snippet": {"topLevelComment": {"snippet": {"textDisplay": "hmm"}}}
        }))
        .unwrap();
        let video = Video {
            video_id: "v".to_string(),
            title: "t".to_string(),
            duration: "00:00:00".to_string(),
            view_count: None,
            like_count: None,
            comment_count: None,
        };
        let comment = thread.to_comment(&video);
        assert_eq!(comment.like_count, None);
        assert_eq!(comment.comment_id, "N/A");
        assert_eq!(comment.author, "N/A");
    }

    #[tokio::test]
    async fn test_search_without_api_key_fails_fast() {
        let client = YouTubeClient::new("https://example.invalid", None).unwrap();
        assert!(matches!(
            client.search("Mozart K.304", 10).await,
            Err(IngestionError::MissingApiKey)
        ));
    }

    #[test]
    fn test_retry_delay_grows_linearly() {
        let first = retry_delay(1);
        let second = retry_delay(2);
        assert!(first >= Duration::from_secs(5) && first < Duration::from_millis(5500));
        assert!(second >= Duration::from_secs(10) && second < Duration::from_millis(10500));
    }
}
