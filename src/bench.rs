//! Benchmark runner
//!
//! Times one operation at a time and logs the outcome. The runner never
//! fails: an operation's error (or panic) is logged and recorded in its
//! report, and the run moves on to the next operation.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::datastore::Client;
use crate::error::Result;
use crate::operations::Operation;

/// Outcome of one timed operation
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub name: String,
    pub elapsed: Duration,
    /// Rendered error, `None` on success
    pub error: Option<String>,
}

impl BenchReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Time `op` against `client` and log `<duration> - <name>`, preceded by a
/// `<duration> - <name> - failed. err: <error>` line when it fails
pub fn bench_fn<F>(name: &str, op: F, client: &Client) -> BenchReport
where
    F: FnOnce(&Client) -> Result<()>,
{
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| op(client)));
    let elapsed = start.elapsed();

    let error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some("operation panicked".to_string()),
    };

    if let Some(err) = &error {
        tracing::error!("{:?} - {} - failed. err: {}", elapsed, name, err);
    }
    tracing::info!("{:?} - {}", elapsed, name);

    BenchReport {
        name: name.to_string(),
        elapsed,
        error,
    }
}

/// Time a registered operation
pub fn bench_operation(operation: &Operation, client: &Client) -> BenchReport {
    bench_fn(operation.name, operation.run, client)
}

/// Time each operation in turn, strictly in order
pub fn run_all(operations: &[Operation], client: &Client) -> Vec<BenchReport> {
    operations
        .iter()
        .map(|operation| bench_operation(operation, client))
        .collect()
}

/// Plain-text table of a run's reports
pub fn summary(reports: &[BenchReport]) -> String {
    let width = reports
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0)
        .max("operation".len());

    let mut out = format!("{:<width$}  {:>12}  result\n", "operation", "elapsed", width = width);
    for report in reports {
        let result = match &report.error {
            None => "ok".to_string(),
            Some(e) => format!("failed: {}", e),
        };
        out.push_str(&format!(
            "{:<width$}  {:>12}  {}\n",
            report.name,
            format!("{:.3?}", report.elapsed),
            result,
            width = width
        ));
    }

    let total: Duration = reports.iter().map(|r| r.elapsed).sum();
    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    out.push_str(&format!(
        "{} operations, {} failed, {:.3?} total\n",
        reports.len(),
        failed,
        total
    ));
    out
}
