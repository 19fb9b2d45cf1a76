use std::io::Write;

use owo_colors::OwoColorize;
use sectionizer_batch::refs::RefsSummary;
use sectionizer_batch::{BatchSummary, FailureKind};
use sectionizer_core::ParagraphScore;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

const PREVIEW_CHARS: usize = 100;

/// One line for a failed document, printed above the progress bar.
pub fn failure_line(id: &str, kind: FailureKind, reason: &str, color: ColorMode) -> String {
    let label = format!("[{}]", kind.as_str());
    if color.enabled() {
        let label = match kind {
            FailureKind::Timeout => label.yellow().to_string(),
            _ => label.red().to_string(),
        };
        format!("{} {} {}", label, id.bold(), reason.dimmed())
    } else {
        format!("{} {} {}", label, id, reason)
    }
}

fn print_header(w: &mut dyn Write, title: &str, color: ColorMode) -> std::io::Result<()> {
    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", title.bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "{}", title)?;
        writeln!(w, "{}", sep)?;
    }
    Ok(())
}

/// Print the final batch summary.
pub fn print_summary(
    w: &mut dyn Write,
    summary: &BatchSummary,
    color: ColorMode,
) -> std::io::Result<()> {
    print_header(w, "SUMMARY", color)?;

    writeln!(w, "  Documents found: {}", summary.total)?;
    if color.enabled() {
        writeln!(w, "  {} {}", "Succeeded:".green(), summary.succeeded)?;
        writeln!(w, "  {} {}", "Failed:".red(), summary.failed)?;
        writeln!(w, "  {} {}", "Timed out:".yellow(), summary.timed_out)?;
        writeln!(w, "  {}", format!("Skipped: {}", summary.skipped).dimmed())?;
    } else {
        writeln!(w, "  Succeeded: {}", summary.succeeded)?;
        writeln!(w, "  Failed: {}", summary.failed)?;
        writeln!(w, "  Timed out: {}", summary.timed_out)?;
        writeln!(w, "  Skipped: {}", summary.skipped)?;
    }
    writeln!(w, "  With references: {}", summary.with_references)?;
    if summary.fallback > 0 {
        writeln!(w, "  Without headings: {}", summary.fallback)?;
    }

    if summary.interrupted {
        writeln!(w)?;
        let msg = "Interrupted: remaining documents were not processed.";
        if color.enabled() {
            writeln!(w, "{}", msg.yellow())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Print the summary of a reference re-extraction run.
pub fn print_refs_summary(
    w: &mut dyn Write,
    summary: &RefsSummary,
    color: ColorMode,
) -> std::io::Result<()> {
    print_header(w, "REFERENCE RE-EXTRACTION", color)?;
    writeln!(w, "  Files processed: {}", summary.processed)?;
    writeln!(w, "  With references: {}", summary.with_references)?;
    if summary.failed > 0 && color.enabled() {
        writeln!(w, "  {} {}", "Failed:".red(), summary.failed)?;
    } else {
        writeln!(w, "  Failed: {}", summary.failed)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Print per-paragraph reference scores for the tail of a section.
pub fn print_explain(
    w: &mut dyn Write,
    heading: &str,
    total_paragraphs: usize,
    shown: &[ParagraphScore],
    threshold: i32,
    color: ColorMode,
) -> std::io::Result<()> {
    let title = format!(
        "{} ({} paragraphs, threshold {})",
        heading, total_paragraphs, threshold
    );
    print_header(w, &title, color)?;

    let mut in_block = false;
    for p in shown {
        if p.in_references && !in_block {
            in_block = true;
            let marker = "---- reference block starts here ----";
            if color.enabled() {
                writeln!(w, "{}", marker.cyan())?;
            } else {
                writeln!(w, "{}", marker)?;
            }
        }

        let total = format!("{:>4}", p.breakdown.total);
        let total = if !color.enabled() {
            total
        } else if p.breakdown.total >= threshold {
            total.green().to_string()
        } else {
            total.dimmed().to_string()
        };
        writeln!(w, "[{:>3}] {}  {}", p.index, total, preview(&p.text))?;

        if !p.breakdown.signals.is_empty() {
            let signals: Vec<String> = p
                .breakdown
                .signals
                .iter()
                .map(|(signal, points)| format!("{}{:+}", signal.as_str(), points))
                .collect();
            let line = signals.join(", ");
            if color.enabled() {
                writeln!(w, "             {}", line.dimmed())?;
            } else {
                writeln!(w, "             {}", line)?;
            }
        }
    }

    if !shown.iter().any(|p| p.in_references) {
        writeln!(w, "No reference block found.")?;
    }
    writeln!(w)?;
    Ok(())
}

/// First line of a paragraph, whitespace-normalized and cut for display.
fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}
