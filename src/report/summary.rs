//! Terminal tables for pipeline results

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::logistic::significance_stars;
use crate::pipeline::{
    AttributeDiagnostic, BinaryConfusion, BinaryCvSummary, BinaryRates,
    CoefficientEstimate, FieldMissing, FitAttempt, FitStatus, MetricSummary, MulticlassConfusion,
    MultinomialCvSummary, PipelineOutcome, RocCurve,
};

/// Render an optional rate, "undefined" when the denominator was zero
pub fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => "undefined".to_string(),
    }
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Inf" } else { "-Inf" }.to_string()
    } else if value != 0.0 && (value.abs() < 1e-4 || value.abs() >= 1e6) {
        format!("{:.3e}", value)
    } else {
        format!("{:.4}", value)
    }
}

fn section(icon: &str, title: &str) {
    println!();
    println!("    {} {}", style(icon).cyan(), style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
        .collect()
}

fn status_cell(status: FitStatus) -> Cell {
    let color = if status.is_converged() {
        Color::Green
    } else {
        Color::Red
    };
    Cell::new(status).fg(color)
}

/// Missing values per field, before complete-case filtering
pub fn print_missing_profile(profile: &[FieldMissing], dropped_rows: usize) {
    section("🧹", "MISSING VALUES");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Field", "Missing", "Ratio"]));
    for field in profile {
        let color = if field.missing > 0 {
            Color::Yellow
        } else {
            Color::White
        };
        table.add_row(vec![
            Cell::new(&field.field),
            Cell::new(field.missing).fg(color),
            Cell::new(format!("{:.1}%", field.ratio * 100.0)),
        ]);
    }
    print_indented(&table);
    println!();
    println!(
        "      Rows dropped as incomplete: {}",
        style(dropped_rows).yellow().bold()
    );
}

/// Chi-squared tests and separating levels per attribute
pub fn print_diagnostics(title: &str, diagnostics: &[AttributeDiagnostic]) {
    section("🔍", title);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Attribute", "Chi-squared", "df", "p-value", "Separating levels"]));
    for diag in diagnostics {
        let separated = if diag.has_separation() {
            Cell::new(
                diag.separated_levels
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            )
            .fg(Color::Red)
        } else {
            Cell::new("none").fg(Color::Green)
        };
        table.add_row(vec![
            Cell::new(diag.attribute),
            Cell::new(format!("{:.3}", diag.chi_squared.statistic)),
            Cell::new(diag.chi_squared.degrees_of_freedom),
            Cell::new(format_number(diag.chi_squared.p_value)),
            separated,
        ]);
    }
    print_indented(&table);
}

/// Coefficient table with odds ratios, Wald intervals and significance codes
pub fn print_coefficients(title: &str, coefficients: &[CoefficientEstimate]) {
    println!();
    println!("      {}", style(title).white().bold());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&[
        "Term", "Estimate", "Std. Error", "z", "Pr(>|z|)", "", "Odds ratio", "CI lower", "CI upper",
    ]));
    for c in coefficients {
        table.add_row(vec![
            Cell::new(&c.term),
            Cell::new(format_number(c.estimate)),
            Cell::new(format_number(c.std_error)),
            Cell::new(format_number(c.z_value)),
            Cell::new(format_number(c.p_value)),
            Cell::new(significance_stars(c.p_value)).fg(Color::Cyan),
            Cell::new(format_number(c.odds_ratio)),
            Cell::new(format_number(c.ci_lower)),
            Cell::new(format_number(c.ci_upper)),
        ]);
    }
    print_indented(&table);
}

/// Fit statistics shared by both model kinds
pub fn print_fit_statistics(
    status: FitStatus,
    iterations: usize,
    log_likelihood: f64,
    null_deviance: f64,
    residual_deviance: f64,
    aic: f64,
) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Statistic", "Value"]));
    table.add_row(vec![Cell::new("Status"), status_cell(status)]);
    table.add_row(vec![Cell::new("Iterations"), Cell::new(iterations)]);
    table.add_row(vec![Cell::new("Log-likelihood"), Cell::new(format_number(log_likelihood))]);
    table.add_row(vec![Cell::new("Null deviance"), Cell::new(format_number(null_deviance))]);
    table.add_row(vec![
        Cell::new("Residual deviance"),
        Cell::new(format_number(residual_deviance)),
    ]);
    table.add_row(vec![
        Cell::new("AIC"),
        Cell::new(format_number(aic)).add_attribute(Attribute::Bold),
    ]);
    print_indented(&table);
}

/// Every fit the refit policy tried, in order
pub fn print_attempts(attempts: &[FitAttempt]) {
    if attempts.len() < 2 {
        return;
    }
    println!();
    println!("      {}", style("Refit attempts").white().bold());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["#", "Features", "Status"]));
    for (i, attempt) in attempts.iter().enumerate() {
        let features = attempt
            .features
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(features),
            status_cell(attempt.status),
        ]);
    }
    print_indented(&table);
}

/// 2x2 confusion matrix, rows actual, columns predicted
pub fn print_binary_confusion(confusion: &BinaryConfusion, positive: &str) {
    println!();
    println!("      {}", style("Confusion matrix (test set)").white().bold());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    let predicted_pos = format!("Predicted {}", positive);
    table.set_header(header(&["Actual \\ Predicted", predicted_pos.as_str(), "Predicted other"]));
    table.add_row(vec![
        Cell::new(positive),
        Cell::new(confusion.true_positives).fg(Color::Green),
        Cell::new(confusion.false_negatives).fg(Color::Red),
    ]);
    table.add_row(vec![
        Cell::new("other"),
        Cell::new(confusion.false_positives).fg(Color::Red),
        Cell::new(confusion.true_negatives).fg(Color::Green),
    ]);
    print_indented(&table);
}

/// The six derived rates plus AUC
pub fn print_rates(rates: &BinaryRates, roc: &RocCurve) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Metric", "Value"]));
    for (name, value) in [
        ("Accuracy", rates.accuracy),
        ("Sensitivity", rates.sensitivity),
        ("Specificity", rates.specificity),
        ("False positive rate", rates.false_positive_rate),
        ("False negative rate", rates.false_negative_rate),
        ("Precision", rates.precision),
        ("AUC", roc.auc),
    ] {
        let cell = match value {
            Some(_) => Cell::new(format_metric(value)),
            None => Cell::new(format_metric(value)).fg(Color::Yellow),
        };
        table.add_row(vec![Cell::new(name), cell]);
    }
    print_indented(&table);
}

fn summary_row(name: &str, summary: &MetricSummary) -> Vec<Cell> {
    vec![
        Cell::new(name),
        Cell::new(format_metric(summary.mean)).add_attribute(Attribute::Bold),
        Cell::new(format_metric(summary.std_dev)),
        Cell::new(summary.defined_folds),
    ]
}

/// Mean and spread of binary metrics across folds
pub fn print_binary_cv(cv: &BinaryCvSummary) {
    println!();
    println!(
        "      {}",
        style(format!("{}-fold cross-validation", cv.k)).white().bold()
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Metric", "Mean", "Std. dev.", "Folds"]));
    table.add_row(summary_row("Accuracy", &cv.accuracy));
    table.add_row(summary_row("Sensitivity", &cv.sensitivity));
    table.add_row(summary_row("Specificity", &cv.specificity));
    table.add_row(summary_row("AUC", &cv.auc));
    print_indented(&table);

    if cv.non_converged_folds > 0 {
        println!(
            "      {} of {} folds did not converge",
            style(cv.non_converged_folds).red().bold(),
            cv.k
        );
    }
}

/// Mean accuracy of the multinomial model across folds
pub fn print_multinomial_cv(cv: &MultinomialCvSummary) {
    println!();
    println!(
        "      {}",
        style(format!("{}-fold cross-validation", cv.k)).white().bold()
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Metric", "Mean", "Std. dev.", "Folds"]));
    table.add_row(summary_row("Accuracy", &cv.accuracy));
    print_indented(&table);

    if cv.non_converged_folds > 0 {
        println!(
            "      {} of {} folds did not converge",
            style(cv.non_converged_folds).red().bold(),
            cv.k
        );
    }
}

/// K x K confusion matrix with per-class recall
pub fn print_multiclass_confusion(confusion: &MulticlassConfusion) {
    println!();
    println!("      {}", style("Confusion matrix (test set)").white().bold());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    let mut names = vec!["Actual \\ Predicted".to_string()];
    names.extend(confusion.labels.iter().cloned());
    names.push("Recall".to_string());
    table.set_header(
        names
            .iter()
            .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );

    for (i, (label, recall)) in confusion.per_class_recall().into_iter().enumerate() {
        let mut row = vec![Cell::new(label)];
        for (j, &count) in confusion.counts[i].iter().enumerate() {
            let cell = Cell::new(count);
            row.push(if i == j { cell.fg(Color::Green) } else { cell });
        }
        row.push(Cell::new(format_metric(recall)));
        table.add_row(row);
    }
    print_indented(&table);
}

/// Final one-table overview of a run
pub fn print_outcome_summary(outcome: &PipelineOutcome) {
    section("📋", "MODEL SUMMARY");

    let binary = &outcome.binary;
    let multinomial = &outcome.multinomial;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["", "Binary", "Multinomial"]));
    table.add_row(vec![
        Cell::new("Response"),
        Cell::new(format!("{} vs other", binary.positive_class)),
        Cell::new(format!("baseline {}", multinomial.fit.model.reference())),
    ]);
    table.add_row(vec![
        Cell::new("Status"),
        status_cell(binary.fit.model.status()),
        status_cell(multinomial.fit.model.status()),
    ]);
    table.add_row(vec![
        Cell::new("Features"),
        Cell::new(binary.fit.model.feature_names().len()),
        Cell::new(multinomial.fit.model.feature_names().len()),
    ]);
    table.add_row(vec![
        Cell::new("AIC"),
        Cell::new(format_number(binary.fit.model.aic())),
        Cell::new(format_number(multinomial.fit.model.aic())),
    ]);
    table.add_row(vec![
        Cell::new("CV accuracy"),
        Cell::new(format_metric(binary.cross_validation.accuracy.mean)),
        Cell::new(format_metric(multinomial.cross_validation.accuracy.mean)),
    ]);
    table.add_row(vec![
        Cell::new("Test accuracy"),
        Cell::new(format_metric(binary.test_rates.accuracy)).add_attribute(Attribute::Bold),
        Cell::new(format_metric(multinomial.test_accuracy)).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("Test AUC"),
        Cell::new(format_metric(binary.roc.auc)),
        Cell::new("-"),
    ]);
    print_indented(&table);
}
