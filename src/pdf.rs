//! PDF Export
//!
//! Self-contained single-page PDF writer for grade-report exports. Emits a
//! PDF 1.4 document with a Helvetica text stream and a correct xref table;
//! no external PDF dependency is involved.

use std::fmt::Write as _;

use crate::types::{JobStatus, ReportSnapshot};

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const TITLE_SIZE: u32 = 16;
const BODY_SIZE: u32 = 10;
const LEADING: f32 = 14.0;

/// Maximum body lines that fit the single page; the rest is elided.
const MAX_BODY_LINES: usize = 46;

/// Escape a string for a PDF literal string object.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            // Helvetica with the standard encoding cannot show arbitrary
            // unicode; anything outside latin-1 becomes '?'.
            c if (c as u32) < 256 => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn body_lines(snapshot: &ReportSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} / {}",
        snapshot.project_name, snapshot.version_label
    ));
    lines.push(format!("Status: {}", snapshot.status.as_str()));
    lines.push(format!(
        "Queued: {}",
        snapshot.queued_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    ));
    if let Some(completed) = snapshot.completed_at {
        lines.push(format!(
            "Completed: {}",
            completed.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ));
    }

    if snapshot.status == JobStatus::Failed {
        if let Some(reason) = &snapshot.failure_reason {
            lines.push(String::new());
            lines.push(format!("Failure reason: {}", reason));
        }
        return lines;
    }

    let result = &snapshot.result;
    lines.push(String::new());
    match result.overall_score {
        Some(score) => lines.push(format!("Overall score: {:.1}", score)),
        None => lines.push("Overall score: n/a".to_string()),
    }

    if !result.category_scores.is_empty() {
        lines.push(String::new());
        lines.push("Category scores:".to_string());
        for cs in &result.category_scores {
            lines.push(format!("  - {}: {:.0}", cs.category, cs.score));
        }
    }

    if !result.action_items.is_empty() {
        lines.push(String::new());
        lines.push("Action items:".to_string());
        for item in &result.action_items {
            let mut line = format!("  [{:?}] {}", item.priority, item.title);
            if let Some(detail) = &item.detail {
                let _ = write!(line, " ({})", detail);
            }
            lines.push(line);
        }
    }

    for (heading, entries) in [
        ("Strengths:", &result.strengths),
        ("Risks:", &result.risks),
        ("Notes:", &result.notes),
    ] {
        if !entries.is_empty() {
            lines.push(String::new());
            lines.push(heading.to_string());
            for entry in entries {
                lines.push(format!("  - {}", entry));
            }
        }
    }

    if lines.len() > MAX_BODY_LINES {
        lines.truncate(MAX_BODY_LINES);
        lines.push("...".to_string());
    }
    lines
}

fn content_stream(snapshot: &ReportSnapshot) -> String {
    let mut stream = String::new();
    stream.push_str("BT\n");
    let _ = writeln!(stream, "/F1 {} Tf", TITLE_SIZE);
    let _ = writeln!(stream, "{} {} Td", MARGIN, PAGE_HEIGHT - MARGIN);
    let _ = writeln!(stream, "({}) Tj", escape("Design Grade Report"));
    let _ = writeln!(stream, "/F1 {} Tf", BODY_SIZE);
    let _ = writeln!(stream, "0 -{} Td", LEADING * 2.0);
    for line in body_lines(snapshot) {
        let _ = writeln!(stream, "({}) Tj", escape(&line));
        let _ = writeln!(stream, "0 -{} Td", LEADING);
    }
    stream.push_str("ET\n");
    stream
}

/// Render a shared report snapshot as a complete PDF document.
pub fn render_report_pdf(snapshot: &ReportSnapshot) -> Vec<u8> {
    let stream = content_stream(snapshot);

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>",
            PAGE_WIDTH, PAGE_HEIGHT
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            stream.len(),
            stream
        ),
    ];

    let mut buf = String::new();
    buf.push_str("%PDF-1.4\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(buf.len());
        let _ = writeln!(buf, "{} 0 obj\n{}\nendobj", i + 1, body);
    }

    let xref_offset = buf.len();
    let _ = writeln!(buf, "xref");
    let _ = writeln!(buf, "0 {}", objects.len() + 1);
    buf.push_str("0000000000 65535 f \n");
    for offset in &offsets {
        let _ = writeln!(buf, "{:010} 00000 n ", offset);
    }
    let _ = writeln!(
        buf,
        "trailer\n<< /Size {} /Root 1 0 R >>",
        objects.len() + 1
    );
    let _ = writeln!(buf, "startxref\n{}", xref_offset);
    buf.push_str("%%EOF\n");

    buf.into_bytes()
}
