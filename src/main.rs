mod adapters;
mod config;
mod core;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "realign")]
#[command(about = "Moves generated review comments onto the added diff line they describe", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Embedding model (ollama:<name>, hash[:dim], or an OpenAI model)")]
    model: Option<String>,

    #[arg(long, global = true)]
    base_url: Option<String>,

    #[arg(long, global = true)]
    api_key: Option<String>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Correct the line anchors of a batch of draft review comments")]
    Fix(FixArgs),
    #[command(about = "Print the added lines of every reviewable file as JSON")]
    AddedLines {
        #[command(flatten)]
        source: DiffSource,
    },
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
struct DiffSource {
    #[arg(long, value_name = "FILE", help = "Pull request file list JSON (GitHub files API)")]
    files: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Unified diff text")]
    diff: Option<PathBuf>,

    #[arg(long, value_name = "REF", help = "Diff HEAD of the current repository against REF")]
    git_base: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct FixArgs {
    #[command(flatten)]
    source: DiffSource,

    #[arg(long, value_name = "FILE", help = "Comment batch JSON to correct")]
    response: PathBuf,

    #[arg(short, long, help = "Where to write the corrected batch (defaults to --response)")]
    output: Option<PathBuf>,

    #[arg(long, help = "Minimum similarity to accept a match (0-1)")]
    min_score: Option<f32>,

    #[arg(long, help = "Comma-separated, case-insensitive path substrings to ignore")]
    blocked_patterns: Option<String>,

    #[arg(long, value_name = "FILE", help = "Added-lines listing to compare against, for logging only")]
    upstream_added_lines: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Where to write the per-comment match audit")]
    debug_output: Option<PathBuf>,

    #[arg(long, help = "Candidates recorded per comment in the audit")]
    top_k: Option<usize>,

    #[arg(long, help = "Record matched_line, line_content and similarity on matched comments")]
    annotate_matches: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = config::Config::load().unwrap_or_else(|err| {
        warn!("Ignoring config file: {:#}", err);
        config::Config::default()
    });
    let mut overrides = config::CliOverrides {
        model: cli.model,
        api_key: cli.api_key,
        base_url: cli.base_url,
        ..config::CliOverrides::default()
    };

    match cli.command {
        Commands::Fix(args) => {
            overrides.min_score = args.min_score;
            overrides.blocked_patterns = args.blocked_patterns.clone();
            overrides.top_k = args.top_k;
            overrides.debug_output = args.debug_output.clone();
            overrides.annotate_matches = args.annotate_matches;
            config.merge_with_cli(overrides);
            config.normalize();

            let embedder = adapters::embedding::create_adapter(&config.embedding_config())?;
            let summary = fix_command(&config, &args, Arc::from(embedder)).await?;
            println!("{}", summary);
        }
        Commands::AddedLines { source } => {
            config.merge_with_cli(overrides);
            config.normalize();
            added_lines_command(&config, &source).await?;
        }
    }

    Ok(())
}

async fn load_diff_index(config: &config::Config, source: &DiffSource) -> Result<core::DiffIndex> {
    let files = if let Some(path) = &source.files {
        core::input::load_pr_files(path).await?
    } else if let Some(path) = &source.diff {
        core::input::load_unified_diff(path).await?
    } else if let Some(base) = &source.git_base {
        let git = core::GitIntegration::new(".")?;
        let text = git.branch_diff(base)?;
        core::DiffParser::split_unified_diff(&text)
    } else {
        anyhow::bail!("Specify one of --files, --diff or --git-base");
    };

    let index = core::DiffIndex::build(&files, &config.blocked_patterns);
    info!(
        "Indexed {} of {} files ({} added lines)",
        index.len(),
        files.len(),
        index.total_added_lines()
    );
    Ok(index)
}

async fn fix_command(
    config: &config::Config,
    args: &FixArgs,
    embedder: Arc<dyn adapters::embedding::EmbeddingAdapter>,
) -> Result<String> {
    let index = load_diff_index(config, &args.source).await?;

    if let Some(path) = &args.upstream_added_lines {
        let reference = core::input::load_reference(path).await;
        if !reference.is_empty() {
            let mismatches = index.compare_reference(&reference);
            if !mismatches.is_empty() {
                warn!(
                    "Upstream added_lines differ from recomputed: {}",
                    serde_json::to_string_pretty(&mismatches)?
                );
            }
        }
    }

    let raw = core::input::read_json(&args.response).await?;
    let envelope = core::CommentEnvelope::from_value(raw)
        .with_context(|| format!("Failed to read comments from {}", args.response.display()))?;
    let comments = envelope.comments();
    let model_name = embedder.model_name().to_string();
    let matcher = core::SimilarityMatcher::new(embedder, config.top_k);
    let mut engine = core::CorrectionEngine::new(&index, matcher, config.min_score)
        .annotate_matches(config.annotate_matches);
    info!(
        "Matching {} comment(s) with model {} (min score {})",
        comments.len(),
        model_name,
        engine.min_score()
    );
    let report = engine.run(comments).await?;

    info!(
        "{} corrected, {} already on the best line, {} low confidence ({} file(s) embedded)",
        report.count(core::Decision::Corrected),
        report.count(core::Decision::Unchanged),
        report.count(core::Decision::LowConfidence),
        engine.embedded_files()
    );

    let summary = format!(
        "Processed {} comments; corrected {}, skipped {}.",
        report.processed(),
        report.corrected_count(),
        report.skipped_count()
    );

    let output_path = args.output.clone().unwrap_or_else(|| args.response.clone());
    let output = envelope.into_value(report.comments, &report.skipped)?;
    core::input::write_json(&output_path, &output)
        .await
        .context("Failed to write corrected comments")?;
    core::input::write_json(&config.debug_output, &report.audit)
        .await
        .context("Failed to write match audit")?;

    Ok(summary)
}

async fn added_lines_command(config: &config::Config, source: &DiffSource) -> Result<()> {
    let index = load_diff_index(config, source).await?;
    println!("{}", serde_json::to_string_pretty(&index.listing())?);
    Ok(())
}
