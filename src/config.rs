//! Environment driven configuration.
//!
//! Values come from the process environment after `.env` has been loaded by
//! the binary. Every numeric setting falls back to a default when unset but a
//! malformed value is an error.

use crate::error::ConfigError;
use crate::scoring::{ScoringParams, DEFAULT_PSEUDO_COUNT, DEFAULT_TOP_POLARIZED};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_SIDECAR_URL: &str = "http://localhost:8000";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_ENGLISH_MODEL: &str = "cardiffnlp/twitter-roberta-base-sentiment-latest";
pub const DEFAULT_MULTILINGUAL_MODEL: &str = "tabularisai/multilingual-sentiment-analysis";
pub const DEFAULT_NUM_CANDIDATES: u32 = 50;
pub const DEFAULT_MIN_DURATION_SECS: u64 = 65;
pub const DEFAULT_MAX_COMMENTS: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub youtube_api_key: Option<String>,
    pub youtube_api_base: String,
    pub sidecar_url: String,
    pub english_model: String,
    pub multilingual_model: String,
    pub redis_url: String,
    pub bind_addr: String,
    pub output_dir: PathBuf,
    pub num_candidates: u32,
    pub min_duration_secs: u64,
    pub max_comments: u32,
    pub scoring: ScoringParams,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            youtube_api_key: None,
            youtube_api_base: DEFAULT_YOUTUBE_API_BASE.to_string(),
            sidecar_url: DEFAULT_SIDECAR_URL.to_string(),
            english_model: DEFAULT_ENGLISH_MODEL.to_string(),
            multilingual_model: DEFAULT_MULTILINGUAL_MODEL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            output_dir: PathBuf::from("."),
            num_candidates: DEFAULT_NUM_CANDIDATES,
            min_duration_secs: DEFAULT_MIN_DURATION_SECS,
            max_comments: DEFAULT_MAX_COMMENTS,
            scoring: ScoringParams::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        Ok(Self {
            youtube_api_key: lookup("YOUTUBE_API_KEY")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            youtube_api_base: string("YOUTUBE_API_BASE", defaults.youtube_api_base),
            sidecar_url: string("ML_SIDECAR_URL", defaults.sidecar_url),
            english_model: string("ENGLISH_MODEL", defaults.english_model),
            multilingual_model: string("MULTILINGUAL_MODEL", defaults.multilingual_model),
            redis_url: string("REDIS_URL", defaults.redis_url),
            bind_addr: string("BIND_ADDR", defaults.bind_addr),
            output_dir: PathBuf::from(string("OUTPUT_DIR", ".".to_string())),
            num_candidates: parse_or(&lookup, "NUM_CANDIDATES", DEFAULT_NUM_CANDIDATES)?,
            min_duration_secs: parse_or(&lookup, "MIN_DURATION_SECS", DEFAULT_MIN_DURATION_SECS)?,
            max_comments: parse_or(&lookup, "MAX_COMMENTS", DEFAULT_MAX_COMMENTS)?,
            scoring: ScoringParams {
                pseudo_count: check(&lookup, "PSEUDO_COUNT", DEFAULT_PSEUDO_COUNT, |pc: &f64| {
                    pc.is_finite() && *pc >= 0.0
                })?,
                top_polarized: check(&lookup, "TOP_POLARIZED", DEFAULT_TOP_POLARIZED, |n: &usize| *n > 0)?,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: v,
        }),
    }
}

/// Like [`parse_or`], but a parsed value must also satisfy `valid`.
fn check<F, T, V>(lookup: &F, key: &str, default: T, valid: V) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    V: Fn(&T) -> bool,
{
    let value = parse_or(lookup, key, default)?;
    if valid(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: lookup(key).unwrap_or_default().trim().to_string(),
        })
    }
}
