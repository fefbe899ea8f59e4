// 🖨️ Plain-text rendering of a grouped history page

use crate::grouping::DailyOperations;
use crate::operation::Operation;
use std::fmt::Write;

/// One header per day, one line per record, then a paging footer.
pub fn render_text(page: &DailyOperations<Operation>) -> String {
    let mut out = String::new();

    if page.sections.is_empty() {
        out.push_str("No operations.\n");
    }

    for section in &page.sections {
        let _ = writeln!(out, "{}", section.day.format("%A %Y-%m-%d"));
        for op in &section.data {
            let status = if op.is_pending() { " (pending)" } else { "" };
            let _ = writeln!(
                out,
                "  {}  {:<10} {:>14.6}  {}{}",
                op.date.format("%H:%M:%S"),
                op.operation_type.as_str(),
                op.value,
                op.account_id,
                status
            );
        }
    }

    let footer = if page.completed {
        "end of history"
    } else {
        "more operations available"
    };
    let _ = writeln!(out, "-- {} record(s), {}", page.len(), footer);
    out
}
