// src/pipeline/evaluate.rs

//! Program evaluation pipeline.

use std::collections::BTreeSet;
use std::path::Path;

use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{Program, YearSnapshot};
use crate::services::{EvaluationClient, EvaluationOutcome};
use crate::storage::SnapshotStorage;

/// Summary of an evaluation batch.
#[derive(Debug, Default)]
pub struct EvaluationReport {
    pub programs: Vec<Program>,
    /// How many programs were served from cached payloads
    pub cached: usize,
    /// `(program_code, reason)` pairs
    pub failures: Vec<(String, String)>,
}

impl EvaluationReport {
    pub fn total(&self) -> usize {
        self.programs.len() + self.failures.len()
    }
}

/// Program codes listed in a written year snapshot, sorted and unique.
pub async fn program_codes_from_snapshot(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    let snapshot: YearSnapshot = serde_json::from_str(&content)?;
    let codes: BTreeSet<String> = snapshot
        .programs
        .into_iter()
        .map(|p| p.program_code)
        .filter(|code| !code.trim().is_empty())
        .collect();
    Ok(codes.into_iter().collect())
}

/// Evaluate every program code and write the reconciled programs.
///
/// Single failures are collected in the report and never stop the batch.
pub async fn run_evaluation(
    client: &EvaluationClient,
    storage: &dyn SnapshotStorage,
    catalog_year: &str,
    codes: &[String],
    concurrency: usize,
) -> Result<EvaluationReport> {
    if codes.is_empty() {
        return Err(AppError::validation("no program codes to evaluate"));
    }
    log::info!("Evaluating {} programs for catalog year {}", codes.len(), catalog_year);

    let mut outcomes = stream::iter(codes)
        .map(|code| client.evaluate(code))
        .buffer_unordered(concurrency.max(1));

    let mut report = EvaluationReport::default();
    while let Some(outcome) = outcomes.next().await {
        match outcome {
            EvaluationOutcome::Reconciled {
                code,
                program,
                cached,
            } => {
                log::info!("OK {} ({} sections)", code, section_count(&program));
                report.cached += usize::from(cached);
                report.programs.push(program);
            }
            EvaluationOutcome::Failed { code, failure } => {
                log::warn!("Evaluation failed for {}: {}", code, failure);
                report.failures.push((code, failure.to_string()));
            }
        }
    }

    report
        .programs
        .sort_by(|a, b| a.program_code.cmp(&b.program_code));
    report.failures.sort();

    let meta = storage
        .write_evaluated(catalog_year, &report.programs)
        .await?;
    log::info!(
        "Wrote {} of {} programs to {} ({} from cache, {} failed)",
        meta.count,
        report.total(),
        meta.location,
        report.cached,
        report.failures.len()
    );

    Ok(report)
}

fn section_count(program: &Program) -> usize {
    program.detail.as_ref().map_or(0, |d| d.sections.len())
}
