// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pointbench CLI
//! Distortion sweeps, re-evaluation and export of reconstruction results

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pointbench::evaluation::{
    export_csv, load_tree, reevaluate, save_tree, Driver, ObjectEvent, ObjectRelations,
    ObjectStatus, ResultStore, RunSummary, Sweep, SweepConfig,
};
use pointbench::gateway::ImageDistorter;
use pointbench::io::read_ply;
use pointbench::metrics::MetricEngine;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pointbench")]
#[command(about = "Robustness evaluation for single-image 3D reconstruction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the distortion sweep over the relation file
    Sweep {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Relation file overriding the configured one
        #[arg(long)]
        relations: Option<PathBuf>,

        /// Output root overriding the configured one
        #[arg(long)]
        output_root: Option<PathBuf>,

        /// Result document overriding the configured one
        #[arg(long)]
        results: Option<PathBuf>,

        /// Objects per group, 0 for all
        #[arg(long)]
        objects: Option<usize>,

        /// Images per object
        #[arg(long)]
        images: Option<usize>,

        /// Start a fresh document instead of resuming
        #[arg(long)]
        no_resume: bool,
    },

    /// Re-score persisted reconstructions at new tolerances
    Reevaluate {
        /// Existing result document
        #[arg(short, long)]
        results: PathBuf,

        /// Tolerances, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        taus: Vec<f64>,

        /// Root holding the reconstruction artifacts
        #[arg(short, long, default_value = "outputs")]
        artifacts: PathBuf,

        /// Relation file used to locate ground truth
        #[arg(long, default_value = "datasets/object_relations.json")]
        relations: PathBuf,

        /// Output document (defaults to overwriting --results)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Flatten a result document into CSV
    Export {
        /// Result document
        #[arg(short, long)]
        results: PathBuf,

        /// Output CSV file
        #[arg(short, long, default_value = "results.csv")]
        out: PathBuf,
    },

    /// Score a single predicted point cloud against ground truth
    Score {
        /// Predicted point cloud (PLY)
        #[arg(short, long)]
        predicted: PathBuf,

        /// Ground-truth point cloud (PLY)
        #[arg(short, long)]
        ground_truth: PathBuf,

        /// Tolerances, comma separated
        #[arg(short, long, value_delimiter = ',', default_value = "0.05,0.075,0.1")]
        taus: Vec<f64>,
    },

    /// Write the default configuration
    InitConfig {
        /// Output TOML file
        #[arg(short, long, default_value = pointbench::evaluation::DEFAULT_CONFIG_FILE)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let clean = match cli.command {
        Commands::Sweep {
            config,
            relations,
            output_root,
            results,
            objects,
            images,
            no_resume,
        } => {
            let mut config = SweepConfig::load(config.as_deref())?;
            if let Some(relations) = relations {
                config.relations_path = relations;
            }
            if let Some(output_root) = output_root {
                config.output_root = output_root;
            }
            if results.is_some() {
                config.results_path = results;
            }
            if let Some(objects) = objects {
                config.objects_per_group = objects;
            }
            if let Some(images) = images {
                config.images_per_object = images;
            }
            if no_resume {
                config.resume = false;
            }
            sweep_command(&config, cli.verbose)?
        }
        Commands::Reevaluate {
            results,
            taus,
            artifacts,
            relations,
            out,
        } => reevaluate_command(&results, &taus, &artifacts, &relations, out.as_deref())?,
        Commands::Export { results, out } => {
            export_command(&results, &out)?;
            true
        }
        Commands::Score {
            predicted,
            ground_truth,
            taus,
        } => {
            score_command(&predicted, &ground_truth, &taus)?;
            true
        }
        Commands::InitConfig { out } => {
            if out.exists() {
                bail!("Refusing to overwrite existing {}", out.display());
            }
            SweepConfig::default().save(&out)?;
            println!("{} {}", "Wrote".green(), out.display());
            true
        }
    };

    if !clean {
        std::process::exit(1);
    }

    Ok(())
}

fn sweep_command(config: &SweepConfig, verbose: bool) -> Result<bool> {
    config.validate()?;

    let relations = ObjectRelations::load(&config.relations_path)
        .with_context(|| format!("Failed to load relations {}", config.relations_path.display()))?;

    let engine = MetricEngine::with_memory_budget(config.memory_budget_bytes());
    let distorter = ImageDistorter::new(config.noise_seed);
    let reconstructor = config.reconstructor.build();

    let sweep = Sweep::new(config.sweep_settings(), &engine, &distorter, reconstructor.as_ref())?;
    let driver = Driver::new(
        sweep,
        ResultStore::new(config.results_path()),
        config.objects_per_group,
        config.resume,
    );

    let total = driver.planned_objects(&relations);
    if verbose {
        println!("{}", "Starting distortion sweep...".bold());
        println!(
            "{} objects × {} distortions × {} tolerances -> {}",
            total,
            config.resolved_distortions().len(),
            config.taus.len(),
            driver.store().path().display()
        );
    }

    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let summary = driver.run(&relations, |event: &ObjectEvent<'_>| {
        let status = match event.status {
            ObjectStatus::Completed { failed_units: 0, .. } => "done".green(),
            ObjectStatus::Completed { .. } => "partial".yellow(),
            ObjectStatus::Resumed => "resumed".cyan(),
            ObjectStatus::Failed => "failed".red(),
        };
        progress.set_message(format!("{}/{} {}", event.group, event.object_id, status));
        progress.set_position(event.position as u64);
    })?;
    progress.finish_with_message("Sweep complete");

    print_run_summary(&summary, verbose);
    Ok(summary.is_clean())
}

fn print_run_summary(summary: &RunSummary, verbose: bool) {
    println!("\n{}", "Sweep Summary".bold());
    println!("{}", "=".repeat(50));
    println!("{} {}", "Objects completed:".green(), summary.objects_completed);
    println!("{} {}", "Objects resumed:".cyan(), summary.objects_resumed);
    println!("{} {}", "Units evaluated:".green(), summary.units_evaluated);
    println!("{} {}", "Unit failures:".yellow(), summary.unit_failures.len());
    println!("{} {}", "Object failures:".red(), summary.object_failures.len());
    println!("Results: {}", summary.results_path.display());

    if verbose {
        for failure in &summary.unit_failures {
            println!("  {} {}", "✗".yellow(), failure);
        }
    }
    for failure in &summary.object_failures {
        println!(
            "  {} {}/{}: {}",
            "✗".red(),
            failure.group,
            failure.object_id,
            failure.error
        );
    }
}

fn reevaluate_command(
    results: &Path,
    taus: &[f64],
    artifacts: &Path,
    relations: &Path,
    out: Option<&Path>,
) -> Result<bool> {
    let tree = load_tree(results)?;
    let relations = ObjectRelations::load(relations)?;
    let engine = MetricEngine::default();

    let (updated, report) = reevaluate(&tree, taus, artifacts, &relations, &engine)?;

    let out = out.unwrap_or(results);
    save_tree(&updated, out)?;

    println!("{} {}", "Re-scored:".green(), report.rescored);
    println!(
        "{} {}",
        "Skipped distortions:".yellow(),
        report.skipped_distortions.len()
    );
    for skipped in &report.skipped_distortions {
        println!(
            "  {} {}/{} image {} ({}): {}",
            "✗".yellow(),
            skipped.group,
            skipped.object_id,
            skipped.image_idx,
            skipped.distortion,
            skipped.error
        );
    }
    println!("{} {}", "Skipped objects:".red(), report.skipped_objects.len());
    for skipped in &report.skipped_objects {
        println!(
            "  {} {}/{}: {}",
            "✗".red(),
            skipped.group,
            skipped.object_id,
            skipped.error
        );
    }
    println!("Results: {}", out.display());

    Ok(report.is_complete())
}

fn export_command(results: &Path, out: &Path) -> Result<()> {
    let tree = load_tree(results)?;
    let rows = export_csv(&tree, out)?;
    println!("{} {} rows -> {}", "Exported".green(), rows, out.display());
    Ok(())
}

fn score_command(predicted: &Path, ground_truth: &Path, taus: &[f64]) -> Result<()> {
    let predicted = read_ply(predicted)
        .with_context(|| format!("Failed to read {}", predicted.display()))?;
    let ground_truth = read_ply(ground_truth)
        .with_context(|| format!("Failed to read {}", ground_truth.display()))?;

    let engine = MetricEngine::default();
    let predicted = predicted.normalize()?;
    let ground_truth = ground_truth.normalize()?;

    println!(
        "{:>8}  {:>12}  {:>9}  {:>9}  {:>9}  {}",
        "tau", "chamfer", "precision", "recall", "fscore", "device"
    );
    for &tau in taus {
        let m = engine.evaluate_normalized(&predicted, &ground_truth, tau)?;
        println!(
            "{:>8}  {:>12.6}  {:>9.4}  {:>9.4}  {:>9.4}  {}",
            tau, m.chamfer_distance, m.precision, m.recall, m.fscore, m.device_used
        );
    }
    Ok(())
}
