//! Finds the best received and the most polarizing YouTube performance of a
//! classical piece by scoring the sentiment of its audience comments.

pub mod analyzer;
pub mod api;
pub mod config;
pub mod error;
pub mod ml;
pub mod models;
pub mod queue;
pub mod scoring;
pub mod store;
pub mod text;
pub mod worker;
pub mod youtube;
