//! Plain-text rendering of transcript messages.

use std::fmt::Write as _;

use parley_chat::{ChatMessage, MessageBody, Role};
use parley_query::Table;

/// Render one message as terminal text.
pub fn message(msg: &ChatMessage) -> String {
    let prefix = match msg.role {
        Role::User => "you>",
        Role::Assistant => "parley>",
        Role::Info => "*",
    };
    match &msg.body {
        MessageBody::Text(text) => format!("{prefix} {text}"),
        MessageBody::Table(t) => format!("{prefix}\n{}", table(t)),
        MessageBody::Download { path, row_count } => match row_count {
            Some(n) => format!("{prefix} saved {} ({n} rows)", path.display()),
            None => format!("{prefix} saved {}", path.display()),
        },
        MessageBody::Job {
            room_id,
            status,
            progress,
        } => match progress {
            Some(pct) => format!("{prefix} job {room_id}: {status} ({pct:.0}%)"),
            None => format!("{prefix} job {room_id}: {status}"),
        },
    }
}

/// Render a table with left-aligned, width-padded columns.
pub fn table(t: &Table) -> String {
    let cells: Vec<Vec<String>> = t
        .rows
        .iter()
        .map(|row| row.iter().map(Table::cell_text).collect())
        .collect();

    let ncols = t
        .columns
        .len()
        .max(cells.iter().map(Vec::len).max().unwrap_or(0));
    let mut widths = vec![0usize; ncols];
    for (i, h) in t.columns.iter().enumerate() {
        widths[i] = widths[i].max(h.chars().count());
    }
    for row in &cells {
        for (i, c) in row.iter().enumerate() {
            widths[i] = widths[i].max(c.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &t.columns, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &cells {
        push_row(&mut out, row, &widths);
    }
    if cells.is_empty() {
        out.push_str("(no rows)\n");
    }
    out.trim_end().to_owned()
}

fn push_row(out: &mut String, row: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            line.push_str(" | ");
        }
        let cell = row.get(i).map_or("", String::as_str);
        let _ = write!(line, "{cell:<width$}");
    }
    out.push_str(line.trim_end());
    out.push('\n');
}
