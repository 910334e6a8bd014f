//! Loss summaries for logs and terminal demos.
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossSummary {
    pub min: f64,
    pub mean: f64,
    pub last: f64,
}

/// Min, mean and most recent value of a loss history. `None` when empty.
pub fn summarize_losses<I>(history: I) -> Option<LossSummary>
where
    I: IntoIterator<Item = f64>,
{
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut last = None;
    for loss in history {
        count += 1;
        sum += loss;
        min = min.min(loss);
        last = Some(loss);
    }
    last.map(|last| LossSummary {
        min,
        mean: sum / count as f64,
        last,
    })
}

/// Fixed-width table of a loss history split into first and second half.
/// Callers decide where it goes; nothing is printed or logged here.
pub fn format_summary_table(values: &[f64], title: &str) -> String {
    let mut out = String::new();
    let rule = "+----------------+------------+------------+";
    let _ = writeln!(out, "{title} summary");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "| {:<14} | {:>10} | {:>10} |", "range", "mean", "min");
    let _ = writeln!(out, "{rule}");
    let half = values.len() / 2;
    let rows = [
        ("first half", &values[..half]),
        ("second half", &values[half..]),
        ("all", values),
    ];
    for (label, slice) in rows {
        if let Some(s) = summarize_losses(slice.iter().copied()) {
            let _ = writeln!(out, "| {:<14} | {:>10.6} | {:>10.6} |", label, s.mean, s.min);
        }
    }
    let _ = write!(out, "{rule}");
    out
}
