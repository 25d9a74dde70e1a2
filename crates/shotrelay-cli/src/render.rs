//! Plain-text rendering of the agent listing.

use std::io::{self, Write};

use unicode_width::UnicodeWidthStr;

use crate::response::AgentRow;

const HEADERS: [&str; 4] = ["ID", "NAME", "LAST SEEN", "STATUS"];
const COLUMN_GAP: &str = "  ";

pub(crate) fn render_agents<W>(agents: &[AgentRow], out: &mut W) -> io::Result<()>
where
    W: Write,
{
    if agents.is_empty() {
        return writeln!(out, "no agents connected");
    }

    let rows: Vec<[&str; 4]> = agents
        .iter()
        .map(|agent| {
            [
                agent.id.as_str(),
                agent.display_name.as_str(),
                agent.last_seen_at.as_str(),
                agent.status.as_str(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|header| header.width());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    write_row(out, &HEADERS, &widths)?;
    for row in &rows {
        write_row(out, row, &widths)?;
    }
    Ok(())
}

fn write_row<W>(out: &mut W, cells: &[&str; 4], widths: &[usize; 4]) -> io::Result<()>
where
    W: Write,
{
    let mut line = String::new();
    for (index, (cell, width)) in cells.iter().zip(widths).enumerate() {
        line.push_str(cell);
        if index + 1 < cells.len() {
            line.push_str(&" ".repeat(width.saturating_sub(cell.width())));
            line.push_str(COLUMN_GAP);
        }
    }
    writeln!(out, "{line}")
}
