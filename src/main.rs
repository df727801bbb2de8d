use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use grove_io::{Dim, MatrixReader, Options, ParsePolicy};
use grove_rf::{ColumnSpec, CrossValidation, ForestConfig, TaskKind};

#[derive(Parser)]
#[command(name = "grove")]
#[command(about = "Random forest cross-validation over a delimited numeric table")]
#[command(version)]
struct Cli {
    /// Path to the input CSV file (one header line, numeric tokens)
    csv_file: PathBuf,

    /// Number of data rows (skips the counting pass when --cols is also set)
    #[arg(long)]
    rows: Option<usize>,

    /// Number of columns (skips the counting pass when --rows is also set)
    #[arg(long)]
    cols: Option<usize>,

    /// Path to the key=value options file
    #[arg(long, default_value = "options.txt")]
    options: PathBuf,

    /// Number of cross-validation folds
    #[arg(long, default_value_t = 5)]
    folds: usize,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Task type: "classification" or "regression"
    #[arg(long, default_value = "classification")]
    task: String,

    /// Treat malformed numeric tokens as fatal instead of parsing them as 0
    #[arg(long)]
    strict: bool,

    /// Enable verbose (debug-level) logging
    #[arg(long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long)]
    quiet: bool,

    /// Number of threads for parallel tree training (defaults to all cores)
    #[arg(long)]
    threads: Option<usize>,
}

/// Final run summary printed to stdout as pretty JSON.
#[derive(Serialize)]
struct RunSummary {
    n_rows: usize,
    n_cols: usize,
    n_folds: usize,
    n_trees: usize,
    feature_columns: Vec<usize>,
    target_column: usize,
    fold_accuracies: Vec<f64>,
    mean_accuracy: f64,
    accuracy_percent: f64,
    std_accuracy: f64,
}

fn parse_task(s: &str) -> Result<TaskKind> {
    match s {
        "classification" => Ok(TaskKind::Classification),
        "regression" => Ok(TaskKind::Regression),
        other => anyhow::bail!("unknown task: {other} (expected classification or regression)"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure the Rayon thread pool.
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    let task = parse_task(&cli.task)?;

    // 1. Load options.
    let opts = Options::from_file(&cli.options)
        .with_context(|| format!("failed to read options from {}", cli.options.display()))?;
    info!(
        n_estimators = opts.n_estimators,
        max_depth = ?opts.max_depth,
        min_samples_leaf = opts.min_samples_leaf,
        "options loaded"
    );

    // 2. Load the matrix; argument-supplied dimensions skip the counting pass.
    let policy = if cli.strict {
        ParsePolicy::Strict
    } else {
        ParsePolicy::Lenient
    };
    let mut reader = MatrixReader::new(&cli.csv_file).with_policy(policy);
    if let (Some(rows), Some(cols)) = (cli.rows, cli.cols) {
        reader = reader.with_dims(Dim { rows, cols });
    }
    let matrix = reader.read().context("failed to read input CSV")?;
    info!(rows = matrix.rows(), cols = matrix.cols(), "matrix loaded");

    // 3. Resolve columns now that the total width is known.
    let columns = ColumnSpec::resolve(&opts.include_columns, opts.target_column, matrix.cols())
        .context("failed to resolve column selection")?;
    info!(
        features = ?columns.feature_columns(),
        target = columns.target_column(),
        "columns resolved"
    );

    // 4. Cross-validate.
    let config = ForestConfig::new(opts.n_estimators)?
        .with_task(task)
        .with_max_depth(opts.max_depth)
        .with_min_samples_leaf(opts.min_samples_leaf)
        .with_max_features(opts.max_features)
        .with_seed(cli.seed);

    let cv = CrossValidation::new(cli.folds)?.with_seed(cli.seed);
    let result = cv
        .evaluate(&config, &matrix, &columns)
        .context("cross-validation failed")?;
    info!(
        mean_accuracy = result.mean_score,
        std_accuracy = result.std_score,
        "cross-validation complete"
    );

    // 5. Print the summary.
    let summary = RunSummary {
        n_rows: matrix.rows(),
        n_cols: matrix.cols(),
        n_folds: result.n_folds,
        n_trees: opts.n_estimators,
        feature_columns: columns.feature_columns().to_vec(),
        target_column: columns.target_column(),
        fold_accuracies: result.fold_scores.clone(),
        mean_accuracy: result.mean_score,
        accuracy_percent: result.mean_score_percent(),
        std_accuracy: result.std_score,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
