//! Kolosal FairLab CLI Module
//!
//! Command-line interface for theta sweeps, single-configuration evaluation and
//! dataset inspection.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{DataLoader, Dataset};
use crate::experiment::{CrossValidatedObjective, ExperimentConfig, ThetaSweep};
use crate::training::{ClassifierFamily, ClassifierSpec};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fairlab")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fairness-aware model selection experiments")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sweep theta, searching hyperparameters inside every outer fold
    Sweep {
        /// Experiment configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Input data file, overriding the configured path
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Classifier family (logistic, fair_forest, adversarial)
        #[arg(short, long)]
        family: Option<String>,

        /// Trials per search, overriding the configuration
        #[arg(long)]
        trials: Option<usize>,

        /// Write the full results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Cross-validate one classifier configuration at a fixed theta
    Evaluate {
        /// Experiment configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Input data file, overriding the configured path
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Classifier specification (JSON); family defaults when absent
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Trade-off weight used to report the search loss
        #[arg(short, long, default_value = "0.0")]
        theta: f64,
    },

    /// Show dataset information
    Info {
        /// Experiment configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Input data file, overriding the configured path
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> anyhow::Result<ExperimentConfig> {
    ExperimentConfig::from_file(path)
        .with_context(|| format!("reading configuration {}", path.display()))
}

pub fn load_dataset(config: &ExperimentConfig, data: Option<&Path>) -> anyhow::Result<Dataset> {
    let path = data
        .map(Path::to_path_buf)
        .or_else(|| config.data_path.clone())
        .context("no data file given on the command line or in the configuration")?;
    let path_str = path
        .to_str()
        .with_context(|| format!("non UTF-8 path {}", path.display()))?;

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().with_rules(config.mapping.clone()).load(path_str)?;
    let dataset = Dataset::from_frame(&df, config.schema.clone())?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        df.height(),
        df.width(),
        start.elapsed()
    ));
    Ok(dataset)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_sweep(
    config_path: &Path,
    data: Option<&Path>,
    family: Option<&str>,
    trials: Option<usize>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Sweep");

    let mut config = load_config(config_path)?;
    if let Some(name) = family {
        config.family = name.parse()?;
    }
    if let Some(n) = trials {
        config.optimization.n_trials = n;
    }
    let dataset = load_dataset(&config, data)?;

    kv("Family", &config.family.to_string());
    kv("Thetas", &config.thetas.len().to_string());
    kv("Folds", &format!("{} outer × {} inner", config.outer_folds, config.inner_folds));
    kv("Trials", &config.optimization.n_trials.to_string());

    step_run(&format!("Running {}", config.family.to_string().cyan()));
    let results = ThetaSweep::new(&config).run(&config.family, &dataset)?;
    step_done(&format!("{:.1}s", results.duration_secs));

    println!();
    println!(
        "  {:>6} {:>20} {:>20}",
        muted("theta"),
        muted("AUC (mean ± std)"),
        muted("SDP (mean ± std)")
    );
    println!("  {}", dim(&"─".repeat(48)));
    for r in &results.per_theta {
        println!(
            "  {:>6.2} {:>11.4} ± {:<6.4} {:>11.4} ± {:<6.4}",
            r.theta, r.mean_performance, r.std_performance, r.mean_fairness, r.std_fairness
        );
    }

    if let Some(path) = output {
        results.save(path)?;
        println!();
        println!("  {} {}", ok("saved"), path.display());
    }
    println!();
    Ok(())
}

pub fn cmd_evaluate(
    config_path: &Path,
    data: Option<&Path>,
    spec_path: Option<&Path>,
    theta: f64,
) -> anyhow::Result<()> {
    section("Evaluate");

    let config = load_config(config_path)?;
    let spec: ClassifierSpec = match spec_path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)
            .with_context(|| format!("parsing classifier spec {}", path.display()))?,
        None => ClassifierSpec::default_for(config.family),
    };
    let dataset = load_dataset(&config, data)?;

    step_run(&format!("Cross-validating ({} folds)", config.inner_folds));
    let start = Instant::now();
    let score = CrossValidatedObjective::new(&dataset, &config.preprocessing)
        .with_folds(config.inner_folds)
        .with_random_state(config.random_state)
        .evaluate(|| spec.build())?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    kv("AUC", &format!("{:.4}", score.performance));
    kv("Fairness proxy", &format!("{:.4}", score.fairness));
    kv(&format!("Loss (θ={:.2})", theta), &format!("{:.4}", score.loss(theta)));
    println!();
    Ok(())
}

pub fn cmd_info(config_path: &Path, data: Option<&Path>) -> anyhow::Result<()> {
    section("Dataset");

    let config = load_config(config_path)?;
    let dataset = load_dataset(&config, data)?;

    let positives = dataset.labels().iter().filter(|&&y| y > 0.5).count();
    println!();
    kv("Rows", &dataset.n_samples().to_string());
    kv("Predictors", &dataset.features().width().to_string());
    kv(
        &format!("Target '{}'", config.schema.target),
        &format!("{} positive / {} negative", positives, dataset.n_samples() - positives),
    );

    for (name, values) in config.schema.protected.iter().zip(dataset.protected_columns()) {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for v in values {
            *counts.entry(v.as_str()).or_default() += 1;
        }
        section(&format!("Protected '{}'", name));
        for (value, count) in counts {
            kv(value, &count.to_string());
        }
    }

    let families = [
        ClassifierFamily::Logistic,
        ClassifierFamily::FairForest,
        ClassifierFamily::Adversarial,
    ];
    section("Families");
    for family in families {
        let marker = if family == config.family { ok("●") } else { dim("○") };
        println!("  {} {}", marker, family);
    }
    println!();
    Ok(())
}
