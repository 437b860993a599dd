//! Progress display and end-of-run summary for `galgo ingest`.

use std::collections::BTreeMap;

use galgo_core::{BatchStats, IngestionOutcome};

/// Running totals across every chunk of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    stats: BatchStats,
    failures: BTreeMap<&'static str, usize>,
}

impl RunReport {
    pub fn record(&mut self, outcome: &IngestionOutcome) {
        self.stats.record(outcome);
        if let Some(reason) = outcome.reason() {
            *self.failures.entry(reason.kind()).or_default() += 1;
        }
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    pub fn failures(&self) -> &BTreeMap<&'static str, usize> {
        &self.failures
    }

    /// Stamp the wall-clock duration of the run.
    pub fn finish(&mut self, elapsed: std::time::Duration) {
        self.stats.total_seconds = elapsed.as_secs_f64();
    }

    /// Print a formatted summary table to stderr.
    pub fn print_summary(&self) {
        let stats = &self.stats;
        let total = stats.succeeded + stats.failed;
        let mb_stored = stats.total_bytes as f64 / 1_000_000.0;
        let throughput = if stats.total_seconds > 0.0 {
            mb_stored / stats.total_seconds
        } else {
            0.0
        };

        eprintln!();
        eprintln!("  ====================================");
        eprintln!("               Summary");
        eprintln!("  ====================================");
        eprintln!("    Ingested:     {:>8}", stats.succeeded);
        if stats.failed > 0 {
            eprintln!("    Rejected:     {:>8}", stats.failed);
            for (kind, count) in &self.failures {
                eprintln!("      {:<20}{:>6}", kind, count);
            }
        }
        eprintln!("  ------------------------------------");
        eprintln!("    Total:        {:>8}", total);
        eprintln!("    Duration:     {:>7.1}s", stats.total_seconds);
        eprintln!("    Rate:         {:>7.1} files/sec", stats.files_per_second());
        eprintln!("    Throughput:   {:>7.1} MB/sec", throughput);
        eprintln!("  ====================================");
    }
}

/// Create a progress bar for a run over `total` files.
pub fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}
