//! penglm: Penguin Species Logistic Regression CLI
//!
//! Loads the penguin measurements, reports missing values and separation
//! diagnostics, fits binary and multinomial logistic models, cross-validates
//! them and evaluates both on a held-out test set.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use env_logger::Env;

use penglm::cli::{Cli, Commands};
use penglm::pipeline::{
    load_and_clean, load_observations, missing_profile, run_pipeline, separation_scan,
    CategoricalAttr, PipelineOutcome,
};
use penglm::report::{
    export_coefficients_csv, export_model_report, print_attempts, print_binary_confusion,
    print_binary_cv, print_coefficients, print_diagnostics, print_fit_statistics,
    print_missing_profile, print_multiclass_confusion, print_multinomial_cv,
    print_outcome_summary, print_rates, ModelReport,
};
use penglm::utils::{
    create_spinner, finish_with_success, finish_with_warning, print_banner, print_completion,
    print_config, print_count, print_info, print_step_header, print_step_time, print_success,
    print_warning,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // Handle subcommands
    if let Some(command) = &cli.command {
        return match command {
            Commands::Diagnose {
                input,
                infer_schema_length,
            } => run_diagnose(input, *infer_schema_length),
        };
    }

    let input = cli.input().ok_or_else(|| {
        anyhow::anyhow!("Input file is required. Use -i/--input to specify a file.")
    })?;

    let config = cli.pipeline_config()?;
    config.validate()?;

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(input, &config);

    // Step 1: Load dataset
    print_step_header(1, "Load Dataset");
    let step_start = Instant::now();
    let spinner = create_spinner("Reading penguin records...");
    let raw = load_observations(input, cli.infer_schema_length)?;
    finish_with_success(&spinner, "Dataset loaded");
    print_count("record(s)", raw.len(), None);
    print_step_time(step_start.elapsed());

    // Step 2: Fit and evaluate
    print_step_header(2, "Fit, Cross-Validate and Evaluate");
    let step_start = Instant::now();
    let spinner = create_spinner("Fitting binary and multinomial models...");
    let outcome = run_pipeline(&raw, &config)?;
    if outcome.binary.fit.model.non_converged() || outcome.multinomial.fit.model.non_converged() {
        finish_with_warning(&spinner, "Models fitted with convergence warnings");
    } else {
        finish_with_success(&spinner, "Models fitted");
    }
    print_info(&format!(
        "{} complete rows: {} train / {} test",
        outcome.n_train + outcome.n_test,
        outcome.n_train,
        outcome.n_test
    ));
    print_step_time(step_start.elapsed());

    // Step 3: Data preparation and diagnostics
    print_step_header(3, "Data Preparation and Diagnostics");
    print_missing_profile(&outcome.missing_profile, outcome.dropped_rows);
    print_diagnostics("SEPARATION vs SPECIES", &outcome.diagnostics);
    print_diagnostics(
        &format!("SEPARATION vs {} / other", outcome.config.positive_class),
        &outcome.binary_diagnostics,
    );

    // Step 4: Binary model
    print_step_header(4, "Binary Model");
    print_binary_results(&outcome);

    // Step 5: Multinomial model
    print_step_header(5, "Multinomial Model");
    print_multinomial_results(&outcome);

    // Step 6: Save reports
    print_step_header(6, "Save Reports");
    if let Some(report_path) = cli.report_path() {
        let report = ModelReport::new(&outcome, &input.display().to_string());
        export_model_report(&report, &report_path)?;
        print_success(&format!("Model report saved to {}", report_path.display()));
    } else {
        print_info("JSON report skipped");
    }
    if let Some(csv_path) = &cli.coefficients_csv {
        export_coefficients_csv(&outcome, csv_path)?;
        print_success(&format!("Coefficients saved to {}", csv_path.display()));
    }

    print_outcome_summary(&outcome);
    print_completion();

    Ok(())
}

fn print_binary_results(outcome: &PipelineOutcome) {
    let binary = &outcome.binary;
    let model = &binary.fit.model;

    print_attempts(&binary.fit.attempts);
    if let Some(dropped) = dropped_note(binary.fit.encoding.dropped()) {
        print_warning(&dropped);
    }
    print_fit_statistics(
        model.status(),
        model.iterations(),
        model.log_likelihood(),
        model.null_deviance(),
        model.residual_deviance(),
        model.aic(),
    );
    print_coefficients(
        &format!("{} vs other", binary.positive_class),
        model.coefficients(),
    );
    print_binary_cv(&binary.cross_validation);
    print_binary_confusion(&binary.test_confusion, &binary.positive_class);
    print_rates(&binary.test_rates, &binary.roc);
}

fn print_multinomial_results(outcome: &PipelineOutcome) {
    let multinomial = &outcome.multinomial;
    let model = &multinomial.fit.model;

    print_attempts(&multinomial.fit.attempts);
    if let Some(dropped) = dropped_note(multinomial.fit.encoding.dropped()) {
        print_warning(&dropped);
    }
    print_fit_statistics(
        model.status(),
        model.iterations(),
        model.log_likelihood(),
        model.null_deviance(),
        model.residual_deviance(),
        model.aic(),
    );
    for equation in model.equations() {
        print_coefficients(
            &format!("{} vs {}", equation.category, model.reference()),
            &equation.coefficients,
        );
    }
    print_multinomial_cv(&multinomial.cross_validation);
    print_multiclass_confusion(&multinomial.test_confusion);
}

fn dropped_note(dropped: &[CategoricalAttr]) -> Option<String> {
    if dropped.is_empty() {
        return None;
    }
    let names: Vec<String> = dropped.iter().map(|a| a.to_string()).collect();
    Some(format!(
        "Dropped (every level separates): {}",
        names.join(", ")
    ))
}

/// Profile missing values and scan for separation without fitting
fn run_diagnose(input: &Path, infer_schema_length: usize) -> Result<()> {
    print_banner(env!("CARGO_PKG_VERSION"));

    print_step_header(1, "Load Dataset");
    let spinner = create_spinner("Reading penguin records...");
    let raw = load_observations(input, infer_schema_length)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    finish_with_success(&spinner, "Dataset loaded");
    print_count("record(s)", raw.len(), None);

    let profile = missing_profile(&raw);
    let cleaned = load_and_clean(&raw);
    print_missing_profile(&profile, cleaned.dropped_rows);

    if cleaned.dataset.is_empty() {
        print_warning("No complete rows remain; nothing to diagnose");
        return Ok(());
    }

    print_step_header(2, "Separation Diagnostics");
    let diagnostics = separation_scan(&cleaned.dataset, &CategoricalAttr::ALL)?;
    print_diagnostics("SEPARATION vs SPECIES", &diagnostics);

    let separating = diagnostics.iter().filter(|d| d.has_separation()).count();
    println!();
    if separating == 0 {
        print_success("No attribute level separates the species");
    } else {
        println!(
            "      {} attribute(s) with separating levels",
            style(separating).red().bold()
        );
    }

    print_completion();
    Ok(())
}
