use std::fmt::Write;

use crate::synthesis::TraceReport;

use super::styling::{build_ref, heading, highlight, muted, success};
use super::tables::{color_coded_duration_cell, create_table, header_cells, skip_reason_cell};

/// Prints a human-readable summary of a synthesized trace to stdout.
///
/// Displays:
/// - Overview: root build, trace id, build and span counts
/// - Builds: every traced build with its trigger depth and duration
/// - Skipped: triggered builds that were reached but not traced
pub fn print_summary(report: &TraceReport) {
    println!("{}", render_summary(report));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{}", heading(emoji, title));
}

fn render_summary(report: &TraceReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        muted("Root build:"),
        build_ref(&report.root),
        muted("Trace id:"),
        success(report.trace_id.as_deref().unwrap_or("-")),
        muted("Builds traced:"),
        highlight(report.builds.len()),
        muted("Spans emitted:"),
        highlight(report.spans),
    );

    if report.builds.is_empty() {
        let _ = writeln!(output, "{}", highlight("No builds were traced."));
        return output;
    }

    add_section_header(&mut output, "🏗️", "Builds");
    let mut builds_table = create_table();
    builds_table.set_header(header_cells(&["Build", "Depth", "Job Spans", "Duration"]));

    let mut builds: Vec<_> = report.builds.iter().collect();
    builds.sort_by_key(|build| (build.depth, build.started_at));
    for build in builds {
        let indent = "  ".repeat(build.depth);
        builds_table.add_row(vec![
            comfy_table::Cell::new(format!("{indent}{}", build.slug)),
            comfy_table::Cell::new(build.depth),
            comfy_table::Cell::new(build.job_spans),
            color_coded_duration_cell(build.duration_seconds()),
        ]);
    }
    let _ = writeln!(output, "{builds_table}\n");

    if !report.skipped.is_empty() {
        add_section_header(&mut output, "⏭️", "Skipped");
        let mut skipped_table = create_table();
        skipped_table.set_header(header_cells(&["Build", "Reason"]));
        for skipped in &report.skipped {
            skipped_table.add_row(vec![
                comfy_table::Cell::new(&skipped.slug),
                skip_reason_cell(skipped.reason),
            ]);
        }
        let _ = writeln!(output, "{skipped_table}\n");
    }

    output
}
