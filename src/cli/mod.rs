// ============================================================
// Layer 1 — CLI (Presentation)
// ============================================================
// The only layer that prints. Parses arguments with clap,
// hands them to a use case, and formats the report:
//
//   hr-satisfaction train   [--data HR_comma_sep.csv] [...]
//   hr-satisfaction predict --input new_rows.csv [--output preds.csv]
//   hr-satisfaction plot    [--data HR_comma_sep.csv] [--plots-dir plots]

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PlotArgs, PredictArgs, TrainArgs};

use crate::application::train_use_case::ReloadStatus;

/// Rows shown when `predict` has no --output
const PREVIEW_ROWS: usize = 10;

/// Importances listed after training
const TOP_FEATURES: usize = 5;

#[derive(Parser, Debug)]
#[command(
    name = "hr-satisfaction",
    version = "0.1.0",
    about = "Predict employee satisfaction from an HR dataset with a tuned random forest."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
            Commands::Plot(args)    => run_plot(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on: {}", args.data);

    let report = TrainUseCase::new(args.into()).execute()?;

    println!("Rows: {} train, {} test", report.n_train, report.n_test);
    println!("Evaluation Results (Initial Model): {}", report.initial);

    if let Some(search) = &report.search {
        println!("Best Parameters: {}", search.best_params);
        println!(
            "Best CV score (neg MSE): {:.6} over {} candidates ({} failed)",
            search.best_score, search.n_trials, search.n_failed
        );
        println!("Search trials appended to {}", search.trial_log.display());
    }
    if let Some(optimized) = &report.optimized {
        println!("Evaluation Results (Optimized Model): {optimized}");
    }

    let mut ranked = report.importances.clone();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    println!("Top features:");
    for (name, importance) in ranked.iter().take(TOP_FEATURES) {
        println!("  {name:<28} {importance:.4}");
    }

    println!("Model saved to {}", report.model_path.display());
    match &report.reload {
        ReloadStatus::Loaded(path) => println!("Model loaded from {}", path.display()),
        ReloadStatus::Missing(path) => {
            println!("FileNotFoundError: No such file or directory: '{}'", path.display())
        }
    }

    if !report.plots.is_empty() {
        println!("Wrote {} plots", report.plots.len());
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let report = PredictUseCase::new(args.model_path).execute(&args.input, args.delimiter, args.output)?;

    match &report.output {
        Some(path) => println!("Wrote {} predictions to {}", report.predictions.len(), path.display()),
        None => {
            println!("row,prediction");
            for (row, p) in report.predictions.iter().enumerate().take(PREVIEW_ROWS) {
                println!("{row},{p:.6}");
            }
            if report.predictions.len() > PREVIEW_ROWS {
                println!("... ({} rows total)", report.predictions.len());
            }
        }
    }

    if let Some(evaluation) = &report.evaluation {
        println!("Evaluation Results: {evaluation}");
    }
    Ok(())
}

fn run_plot(args: PlotArgs) -> Result<()> {
    use crate::application::train_use_case::render_exploratory_plots;

    let written = render_exploratory_plots(&args.data, args.delimiter, &args.plots_dir)?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}
