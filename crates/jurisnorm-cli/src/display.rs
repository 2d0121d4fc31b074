//! Plain-text cards for run results.

use std::fmt::Write;
use std::time::Duration;

use jurisnorm_runner::RunSummary;
use jurisnorm_store::DuplicateSummary;

// ── Public API ──

/// Card for one normalization run.
pub fn run_card(source: &str, selection: &str, summary: &RunSummary, elapsed: Duration) -> String {
    let mut out = String::new();
    header(&mut out, &format!("normalization {source}"));
    section(
        &mut out,
        "Run",
        &[
            ("selection", selection.to_string()),
            ("elapsed", format!("{:.1}s", elapsed.as_secs_f64())),
        ],
    );
    section(
        &mut out,
        "Records",
        &[
            ("normalized", summary.normalized.to_string()),
            ("blocked", summary.blocked.to_string()),
            ("deleted", summary.deleted.to_string()),
            ("total", summary.total().to_string()),
        ],
    );
    out
}

pub fn duplicates_card(summary: &DuplicateSummary) -> String {
    let mut out = String::new();
    header(&mut out, "duplicate marking");
    section(
        &mut out,
        "Receptions",
        &[
            ("source ids duplicated", summary.groups.to_string()),
            ("marked deleted", summary.deleted.to_string()),
            ("failed", summary.failed.to_string()),
        ],
    );
    out
}

// ── Section rendering ──

fn header(out: &mut String, title: &str) {
    let _ = writeln!(out, "=== {title} ===");
    let _ = writeln!(out);
}

fn section(out: &mut String, title: &str, rows: &[(&str, String)]) {
    let _ = writeln!(out, "{title}");
    for (name, value) in rows {
        let _ = writeln!(out, "  {name:<26} {value}");
    }
    let _ = writeln!(out);
}
