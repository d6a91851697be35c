//! Human-readable rendering of a finished run

use std::fmt::Write as _;
use ywt_core::{Phase, RunOutcome};

const RULE: &str = "==================================================";

/// Per-persona sections, then the three phase summaries
pub(crate) fn render_text(outcome: &RunOutcome) -> String {
    let mut out = String::new();

    for (id, record) in &outcome.records {
        let _ = writeln!(out, "\n=== {id} ===");
        let _ = writeln!(out, "Background: {}\n", record.entity().descriptor);
        for phase in Phase::ALL {
            let text = record.get(phase).map_or("", |r| r.payload.as_str());
            let _ = writeln!(out, "[{}]\n{text}\n", phase.label());
        }
        let _ = writeln!(out, "{RULE}");
    }

    let _ = writeln!(out, "\n### Summaries ###");
    for phase in Phase::ALL {
        let _ = writeln!(out, "\n[{}]\n{}", phase.label(), outcome.summary(phase).payload);
    }

    let _ = writeln!(
        out,
        "\n{RULE}\nrun {} | {} steps | {} ms",
        outcome.run_id, outcome.stats.steps, outcome.stats.elapsed_ms
    );
    out
}
