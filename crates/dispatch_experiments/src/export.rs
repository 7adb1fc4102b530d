//! Result export and ranking.

use std::fs::File;
use std::path::Path;

use crate::metrics::RunResult;
use crate::parameters::ExperimentRun;

#[path = "export/csv.rs"]
mod csv;
#[path = "export/ranking.rs"]
mod ranking;

/// Write results as a pretty-printed JSON array.
pub fn export_to_json(
    results: &[RunResult],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    serde_json::to_writer_pretty(File::create(path)?, results)?;
    Ok(())
}

/// Write one CSV row per run: its parameters followed by its results.
///
/// `results[i]` must belong to `runs[i]`.
///
/// # Errors
///
/// Fails on empty input, mismatched lengths, or I/O errors.
pub fn export_to_csv(
    results: &[RunResult],
    runs: &[ExperimentRun],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if results.is_empty() {
        return Err("No results to export".into());
    }
    csv::export_to_csv_impl(results, runs, File::create(path)?)
}

/// Index of the run with the best agent score; ties go to higher accuracy
/// against the oracle, then to the earlier run.
pub fn find_best_result_index(results: &[RunResult]) -> Option<usize> {
    ranking::find_best_index(results)
}
