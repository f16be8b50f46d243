//! Command line front end.
//!
//! `analyze search` runs the whole pipeline for a query; `analyze score`
//! scores a comment table that has already been classified.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use performance_analyzer::analyzer::{score_comment_file, AnalysisOptions, PerformanceAnalyzer};
use performance_analyzer::config::AnalyzerConfig;
use performance_analyzer::ml::{LexiconClassifier, RemoteClassifier, SentimentClassifier};
use performance_analyzer::queue::NO_RESULT_MESSAGE;
use performance_analyzer::scoring::Recommendations;
use performance_analyzer::store::scores_path_for;
use performance_analyzer::youtube::YouTubeClient;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "analyze")]
#[command(about = "Find the most recommended and the most polarized performance of a piece", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search YouTube and analyze the comments of the matching performances
    Search {
        /// Piece to look for, e.g. "Mozart Violin Sonata in E minor"
        query: String,

        /// Save the intermediate tables as CSV
        #[arg(short, long)]
        verbose: bool,

        /// Number of search results to consider [default: NUM_CANDIDATES or 50]
        #[arg(long)]
        num_candidates: Option<u32>,

        /// Shortest accepted video in seconds, 0 disables the filter [default: MIN_DURATION_SECS or 65]
        #[arg(long)]
        min_duration: Option<u64>,

        /// Classify with the built-in lexicon instead of the model sidecar
        #[arg(long)]
        offline: bool,
    },

    /// Score an already classified comment table
    Score {
        /// CSV with at least video_id, sentiment_label, sentiment_score and like_count
        input: PathBuf,

        /// Where to write the video scores (defaults next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn print_results(recommendations: Option<&Recommendations>) {
    println!("\n{} Results {}", "=".repeat(20), "=".repeat(20));
    match recommendations {
        None => println!("{}", NO_RESULT_MESSAGE),
        Some(r) => {
            println!("Recommendations with the highest total score:");
            println!("Video ID: {}, Score: {:.2}", r.best.video_id, r.best.total_score);
            println!("Video URL: {}\n", r.best.watch_url());
            println!("Recommendations with the most polarized version:");
            match &r.most_polarized {
                Some(p) => {
                    println!(
                        "Video ID: {}, Polarization score: {:.2}, Std deviation: {:.2}",
                        p.video_id, p.polarization_score_with_pseudo_count, p.std_deviation
                    );
                    println!("Video URL: {}", p.watch_url());
                }
                None => println!("No polarized performance found."),
            }
        }
    }
    println!("\n{}", "=".repeat(52));
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AnalyzerConfig::from_env()?;

    match cli.command {
        Commands::Search {
            query,
            verbose,
            num_candidates,
            min_duration,
            offline,
        } => {
            let youtube = YouTubeClient::new(&config.youtube_api_base, config.youtube_api_key.clone())?;
            let classifier: Box<dyn SentimentClassifier> = if offline {
                info!("Using the built-in lexicon classifier");
                Box::new(LexiconClassifier)
            } else {
                Box::new(RemoteClassifier::new(
                    &config.sidecar_url,
                    &config.english_model,
                    &config.multilingual_model,
                ))
            };
            if verbose {
                info!("Verbose mode enabled, will save the intermediate results to csv files");
            }

            let mut options = AnalysisOptions::from_config(&config);
            options.verbose = verbose;
            if let Some(n) = num_candidates {
                options.num_candidates = n;
            }
            if let Some(secs) = min_duration {
                options.min_duration_secs = secs;
            }

            let analyzer = PerformanceAnalyzer::new(
                Box::new(youtube),
                classifier,
                config.scoring,
                config.output_dir.clone(),
            );
            let report = analyzer.get_recommendations(&query, &options).await?;
            let recommendations = report.map(|r| Recommendations {
                best: r.best,
                most_polarized: r.most_polarized,
            });
            print_results(recommendations.as_ref());
        }
        Commands::Score { input, output } => {
            let output = output.unwrap_or_else(|| scores_path_for(&input));
            let (scores, recommendations) = score_comment_file(&input, &output, &config.scoring)?;
            info!("Scored {} videos, written to {}", scores.len(), output.display());
            print_results(recommendations.as_ref());
        }
    }

    Ok(())
}
