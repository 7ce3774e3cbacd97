//! Evaluate command implementation.

use crate::cli::EvaluateArgs;
use crate::config::OutputFormat;
use crate::error::Result;
use crate::input;
use crate::output::Formatter;
use papelada_orchestrator::evaluate;

/// Execute the evaluate command.
pub async fn execute_evaluate(args: EvaluateArgs, formatter: &Formatter) -> Result<()> {
    let reports = input::load_reports(&args.predictions)?;
    let ground_truth = input::load_ground_truth(&args.ground_truth)?;

    let evaluation = evaluate(&reports, &ground_truth);
    println!("{}", formatter.format_evaluation(&evaluation)?);

    if formatter.format() == OutputFormat::Table {
        println!(
            "{}",
            formatter.info(&format!(
                "{} document(s), {} backend call(s)",
                evaluation.metrics.documents,
                evaluation.metrics.total_calls()
            ))
        );
    }
    if !evaluation.skipped_documents.is_empty() {
        eprintln!(
            "{}",
            formatter.warning(&format!(
                "{} document(s) have no ground truth and were skipped",
                evaluation.skipped_documents.len()
            ))
        );
    }

    Ok(())
}
