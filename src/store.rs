//! CSV persistence of the pipeline's tables.
//!
//! Files are UTF-8 with a byte order mark and a header row. Loading a scored
//! comment table is where loosely typed columns become [`ScoredComment`]s:
//! required columns are checked up front and every cell is validated.

use crate::error::ScoringError;
use crate::models::{ScoredComment, SentimentLabel, DEFAULT_RELEVANCE, UNKNOWN_TITLE};
use crate::text::UNKNOWN_LANGUAGE;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const GENERAL_RESULTS_SUFFIX: &str = "general_results";
pub const COMMENTS_RESULTS_SUFFIX: &str = "comments_results";
pub const SENTIMENT_RESULTS_SUFFIX: &str = "comments_results_with_sentiment";
pub const VIDEO_SCORES_SUFFIX: &str = "video_scores_results";

/// Columns a scored comment table cannot do without.
pub const REQUIRED_COLUMNS: &[&str] = &["video_id", "sentiment_label", "sentiment_score", "like_count"];

/// `<dir>/<query with spaces as underscores>_<suffix>.csv`
pub fn output_path(dir: &Path, query: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}_{}.csv", query.trim().replace(' ', "_"), suffix))
}

/// Default video score file for a scored comment table, next to it.
///
/// `X_comments_results_with_sentiment.csv` maps to `X_video_scores_results.csv`.
pub fn scores_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "comments".to_string());
    let prefix = stem
        .strip_suffix(SENTIMENT_RESULTS_SUFFIX)
        .map(|p| p.trim_end_matches('_'))
        .filter(|p| !p.is_empty())
        .unwrap_or(stem.as_str());
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{}_{}.csv", prefix, VIDEO_SCORES_SUFFIX))
}

/// Writes rows with a header. An empty table writes nothing and returns `false`.
pub fn save_table<T: Serialize>(rows: &[T], path: &Path) -> Result<bool, ScoringError> {
    if rows.is_empty() {
        info!("[Store] No data to save for {}", path.display());
        return Ok(false);
    }

    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(UTF8_BOM)?;
    let mut writer = csv::Writer::from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!("[Store] Data saved to {}, total {} saved", path.display(), rows.len());
    Ok(true)
}

struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &csv::StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim_start_matches('\u{feff}').trim().to_string(), i))
            .collect();
        Self { index }
    }

    fn require(&self, path: &Path) -> Result<(), ScoringError> {
        match REQUIRED_COLUMNS.iter().find(|c| !self.index.contains_key(**c)) {
            Some(column) => Err(ScoringError::MissingColumn {
                column: column.to_string(),
                path: path.to_path_buf(),
            }),
            None => Ok(()),
        }
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, names: &[&str]) -> Option<&'r str> {
        names
            .iter()
            .find_map(|name| self.index.get(*name))
            .and_then(|i| record.get(*i))
    }
}

fn invalid(row: usize, column: &str, value: &str) -> ScoringError {
    ScoringError::InvalidValue {
        row,
        column: column.to_string(),
        value: value.to_string(),
    }
}

/// Integers, integral floats (`12.0`) and nothing else. Empty or `N/A` is unknown.
fn parse_like_count(cell: &str) -> Option<u64> {
    let cell = cell.trim();
    if let Ok(likes) = cell.parse::<u64>() {
        return Some(likes);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Some(v as u64),
        _ => None,
    }
}

/// Loads a classified comment table.
///
/// `video_title` defaults to `N/A` and `relevance_score` to 1.0 when the
/// column is absent. Unparsable like counts load as unknown; unparsable
/// labels or scores are an error naming the row (1-based, header excluded).
pub fn load_scored_comments(path: &Path) -> Result<Vec<ScoredComment>, ScoringError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let columns = Columns::new(reader.headers()?);
    columns.require(path)?;

    let mut comments = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 1;
        let text = |names: &[&str], default: &str| {
            columns
                .get(&record, names)
                .map(str::to_string)
                .unwrap_or_else(|| default.to_string())
        };

        let video_id = text(&["video_id"], "");
        if video_id.trim().is_empty() {
            return Err(invalid(row, "video_id", &video_id));
        }

        let label_cell = columns.get(&record, &["sentiment_label"]).unwrap_or_default();
        let sentiment_label: SentimentLabel = label_cell
            .parse()
            .map_err(|_| invalid(row, "sentiment_label", label_cell))?;

        let score_cell = columns.get(&record, &["sentiment_score"]).unwrap_or_default();
        let sentiment_score = score_cell
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|s| (0.0..=1.0).contains(s))
            .ok_or_else(|| invalid(row, "sentiment_score", score_cell))?;

        let relevance_score = match columns.get(&record, &["relevance_score"]) {
            None => DEFAULT_RELEVANCE,
            Some(cell) if cell.trim().is_empty() => DEFAULT_RELEVANCE,
            Some(cell) => cell
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|r| r.is_finite() && *r >= 0.0)
                .ok_or_else(|| invalid(row, "relevance_score", cell))?,
        };

        let like_cell = columns.get(&record, &["like_count"]).unwrap_or_default();
        let like_count = parse_like_count(like_cell);
        let comment_id = text(&["comment_id"], "");
        if like_count.is_none() {
            warn!(
                "[Store] Row {}: like_count {:?} for comment {} on video {} is unknown",
                row, like_cell, comment_id, video_id
            );
        }

        let mut video_title = text(&["video_title", "title"], UNKNOWN_TITLE);
        if video_title.trim().is_empty() {
            video_title = UNKNOWN_TITLE.to_string();
        }

        comments.push(ScoredComment {
            video_id,
            video_title,
            comment_id,
            author: text(&["author"], ""),
            raw_text: text(&["raw_text", "text"], ""),
            clean_text: text(&["clean_text"], ""),
            language: text(&["language"], UNKNOWN_LANGUAGE),
            like_count,
            sentiment_label,
            original_sentiment_label: text(&["original_sentiment_label"], ""),
            sentiment_score,
            relevance_score,
        });
    }

    info!("[Store] Loaded {} comments from {}", comments.len(), path.display());
    Ok(comments)
}
