use std::collections::BTreeMap;
use std::io::Write;

use crate::args::OutputFormat;
use crate::config::TestConfig;
use crate::error::AppResult;
use crate::metrics::MetricsSnapshot;

/// Distinct error messages shown in the text summary.
const MAX_ERROR_LINES: usize = 10;

pub(crate) fn print_summary(
    snapshot: &MetricsSnapshot,
    config: Option<&TestConfig>,
    format: OutputFormat,
) -> AppResult<()> {
    let mut stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut stdout, snapshot)?;
            writeln!(stdout)?;
        }
        OutputFormat::Text => {
            for line in summary_lines(snapshot, config) {
                writeln!(stdout, "{}", line)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn summary_lines(snapshot: &MetricsSnapshot, config: Option<&TestConfig>) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(config) = config {
        lines.push(format!("Target: {} {}", config.method, config.target_url));
    }
    lines.push(format!("Started: {}", snapshot.start_time));
    lines.push(format!("Duration: {}", snapshot.elapsed_time));
    lines.push(format!("Total Requests: {}", snapshot.total_requests));
    lines.push(format!(
        "Successful: {} ({:.2}%)",
        snapshot.success_requests, snapshot.success_rate
    ));
    lines.push(format!(
        "Failed: {} ({:.2}%)",
        snapshot.failed_requests, snapshot.error_rate
    ));
    lines.push(format!("Observed RPS: {:.2}", snapshot.rps));

    if snapshot.has_samples() {
        lines.push(format!("Avg Latency: {:.2}ms", snapshot.avg_response_time));
        lines.push(format!(
            "Min/Max Latency: {} / {}",
            format_ms(snapshot.min_response_time),
            format_ms(snapshot.max_response_time)
        ));
        lines.push(format!(
            "P50/P90/P99 Latency: {} / {} / {}",
            format_ms(snapshot.p50_response_time),
            format_ms(snapshot.p90_response_time),
            format_ms(snapshot.p99_response_time)
        ));
    } else {
        lines.push("Latency: no data".to_owned());
    }

    lines.push(format!(
        "Ticks: {} ({} dropped at the concurrency limit)",
        snapshot.ticks, snapshot.dropped_ticks
    ));
    if snapshot.in_flight > 0 {
        lines.push(format!("Still in flight: {}", snapshot.in_flight));
    }

    if !snapshot.status_codes.is_empty() {
        let codes = snapshot
            .status_codes
            .iter()
            .map(|(code, count)| format!("{}={}", code, count))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Status Codes: {}", codes));
    }

    if !snapshot.errors.is_empty() {
        lines.push("Errors:".to_owned());
        for (message, count) in distinct_errors(&snapshot.errors)
            .into_iter()
            .take(MAX_ERROR_LINES)
        {
            lines.push(format!("  {} x {}", count, message));
        }
    }

    lines
}

fn format_ms(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_owned(), |ms| format!("{:.2}ms", ms))
}

fn distinct_errors(errors: &[String]) -> Vec<(&str, u64)> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for error in errors {
        let count = counts.entry(error.as_str()).or_insert(0);
        *count = count.saturating_add(1);
    }
    let mut ordered: Vec<(&str, u64)> = counts.into_iter().collect();
    ordered.sort_by(|left, right| right.1.cmp(&left.1).then(left.0.cmp(right.0)));
    ordered
}
