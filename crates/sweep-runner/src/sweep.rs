use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use crate::classify::classify;
use crate::error::SweepError;
use crate::exec::{ConfigureOutcome, RunOutcome, TrialExecutor};
use crate::extract::prompt_eval_rate;
use crate::grid::GridSpec;
use crate::store::{ResultStore, SweepMetadata, TrialOutcome};

/// How much captured output to log when a trial fails without a metric.
const OUTPUT_TAIL_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub total: usize,
    pub skipped: usize,
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Drive every grid point through configure -> run -> extract -> classify,
/// persisting after each one. Per-trial failures are recorded and the loop
/// moves on; only store corruption or I/O stops the sweep.
pub fn run_sweep(
    grid: &GridSpec,
    store: &ResultStore,
    executor: &mut dyn TrialExecutor,
) -> Result<SweepReport, SweepError> {
    let points = grid.points();
    let total = points.len();

    let mut collection = store.load()?;
    let completed = collection.completed_keys();

    collection.metadata = SweepMetadata {
        start_time: Some(Utc::now()),
        num_ctx_range: Some(grid.num_ctx.describe()),
        num_batch_range: Some(grid.num_batch.describe()),
        total_tests: Some(total),
        end_time: None,
        total_duration_seconds: None,
    };
    store.save(&collection)?;

    info!(
        total,
        num_ctx_range = %grid.num_ctx.describe(),
        num_batch_range = %grid.num_batch.describe(),
        already_completed = completed.len(),
        "starting sweep"
    );

    let started = Instant::now();
    let mut skipped = 0usize;
    let mut executed = 0usize;
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for (idx, point) in points.iter().enumerate() {
        let test_num = idx + 1;
        if completed.contains(&point.key()) {
            skipped += 1;
            info!(
                test = test_num,
                total,
                num_ctx = point.num_ctx,
                num_batch = point.num_batch,
                "skipping already completed point"
            );
            continue;
        }

        let remaining = total - test_num;
        let eta = estimate_eta(started.elapsed(), executed, remaining);
        let eta_label = eta
            .map(|d| format!("{:.1} minutes", d.as_secs_f64() / 60.0))
            .unwrap_or_else(|| "unavailable".to_string());
        info!(
            test = test_num,
            total,
            num_ctx = point.num_ctx,
            num_batch = point.num_batch,
            eta = %eta_label,
            "running trial"
        );
        executed += 1;

        if executor.configure(point.num_ctx, point.num_batch) == ConfigureOutcome::Failed {
            warn!(
                num_ctx = point.num_ctx,
                num_batch = point.num_batch,
                "failed to create model"
            );
            collection.push(TrialOutcome::failure(*point, "Failed to create model"));
            failed += 1;
            store.save(&collection)?;
            continue;
        }

        let output = match executor.run() {
            RunOutcome::TimedOut => {
                warn!(
                    num_ctx = point.num_ctx,
                    num_batch = point.num_batch,
                    "workload timed out"
                );
                collection.push(TrialOutcome::failure(*point, "Timeout"));
                failed += 1;
                store.save(&collection)?;
                continue;
            }
            RunOutcome::Completed(output) => output,
        };

        match prompt_eval_rate(&output) {
            Some(rate) => {
                info!(
                    num_ctx = point.num_ctx,
                    num_batch = point.num_batch,
                    prompt_eval_rate = rate,
                    "trial succeeded"
                );
                collection.push(TrialOutcome::success(*point, rate));
                succeeded += 1;
            }
            None => {
                let category = classify(Some(&output));
                warn!(
                    num_ctx = point.num_ctx,
                    num_batch = point.num_batch,
                    category = %category,
                    output_tail = %tail(&output, OUTPUT_TAIL_CHARS),
                    "could not parse prompt eval rate"
                );
                collection.push(TrialOutcome::failure(*point, category.as_str()));
                failed += 1;
            }
        }
        store.save(&collection)?;
    }

    collection.metadata.end_time = Some(Utc::now());
    collection.metadata.total_duration_seconds = Some(started.elapsed().as_secs_f64());
    store.save(&collection)?;

    let report = SweepReport {
        total,
        skipped,
        executed,
        succeeded,
        failed,
    };
    info!(
        total = report.total,
        skipped = report.skipped,
        executed = report.executed,
        succeeded = report.succeeded,
        failed = report.failed,
        duration_secs = started.elapsed().as_secs_f64(),
        results = %store.path().display(),
        "sweep complete"
    );
    Ok(report)
}

/// `elapsed / executed * remaining`. With nothing executed yet there is no
/// rate to project from, so the estimate is unavailable rather than a
/// division by zero.
fn estimate_eta(elapsed: Duration, executed: usize, remaining: usize) -> Option<Duration> {
    if executed == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(
        elapsed.as_secs_f64() / executed as f64 * remaining as f64,
    ))
}

fn tail(text: &str, max_chars: usize) -> &str {
    match text.char_indices().rev().nth(max_chars.saturating_sub(1)) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_unavailable_before_first_executed_trial() {
        assert_eq!(estimate_eta(Duration::from_secs(5), 0, 100), None);
    }

    #[test]
    fn eta_scales_average_trial_time_by_remaining() {
        let eta = estimate_eta(Duration::from_secs(120), 2, 10).unwrap();
        assert_eq!(eta, Duration::from_secs(600));
    }

    #[test]
    fn eta_zero_when_nothing_remains() {
        let eta = estimate_eta(Duration::from_secs(120), 2, 0).unwrap();
        assert_eq!(eta, Duration::ZERO);
    }

    #[test]
    fn tail_returns_short_text_whole() {
        assert_eq!(tail("short", 500), "short");
    }

    #[test]
    fn tail_takes_last_chars() {
        let text = "a".repeat(400) + &"b".repeat(500);
        assert_eq!(tail(&text, 500), "b".repeat(500));
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let text = "héllo wörld";
        assert_eq!(tail(text, 3), "rld");
        assert_eq!(tail("abcö", 1), "ö");
    }
}
