use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_due;
use crate::item::TodoItem;

const RED: &str = "31";
const GREEN: &str = "32";
const YELLOW: &str = "33";

/// One table cell: plain text plus an optional SGR color. Painting happens
/// at write time, so column widths always come from the unpainted text.
struct Cell {
    text: String,
    color: Option<&'static str>,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
        }
    }

    fn painted(text: impl Into<String>, color: &'static str) -> Self {
        Self {
            text: text.into(),
            color: Some(color),
        }
    }

    fn width(&self) -> usize {
        UnicodeWidthStr::width(self.text.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// Print the list view. With `include_status`, a Status column marks
    /// done and soft-deleted records (used by `all`).
    #[tracing::instrument(skip(self, items, now))]
    pub fn print_item_table(
        &mut self,
        items: &[&TodoItem],
        now: DateTime<Utc>,
        include_status: bool,
    ) -> anyhow::Result<()> {
        let mut headers = vec!["ID", "", "Due", "Title"];
        if include_status {
            headers.push("Status");
        }

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let checkbox = if item.done {
                Cell::painted("[x]", GREEN)
            } else {
                Cell::plain("[ ]")
            };

            let mut row = vec![
                Cell::painted(item.id.to_string(), YELLOW),
                checkbox,
                due_cell(item, now),
                Cell::plain(item.title.clone()),
            ];
            if include_status {
                row.push(Cell::plain(status_label(item)));
            }
            rows.push(row);
        }

        self.write_table(&mut io::stdout().lock(), &headers, &rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, item))]
    pub fn print_item_info(&mut self, item: &TodoItem) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id       {}", item.id)?;
        writeln!(out, "uid      {}", item.uid)?;
        writeln!(out, "title    {}", item.title)?;
        writeln!(out, "due      {}", format_due(item.due))?;
        writeln!(out, "done     {}", item.done)?;
        writeln!(out, "deleted  {}", item.deleted)?;

        Ok(())
    }

    fn write_table<W: Write>(
        &self,
        writer: &mut W,
        headers: &[&str],
        rows: &[Vec<Cell>],
    ) -> anyhow::Result<()> {
        let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(*h)).collect();
        for row in rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.width());
            }
        }

        for (&width, header) in widths.iter().zip(headers) {
            write!(writer, "{header:<width$} ")?;
        }
        writeln!(writer)?;

        for &width in &widths {
            write!(writer, "{:-<width$} ", "")?;
        }
        writeln!(writer)?;

        for row in rows {
            for (&width, cell) in widths.iter().zip(row) {
                let padding = width.saturating_sub(cell.width());
                write!(writer, "{}{} ", self.emit(cell), " ".repeat(padding))?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }

    fn emit(&self, cell: &Cell) -> String {
        match cell.color {
            Some(code) if self.color && io::stdout().is_terminal() => {
                format!("\x1b[{code}m{}\x1b[0m", cell.text)
            }
            _ => cell.text.clone(),
        }
    }
}

fn due_cell(item: &TodoItem, now: DateTime<Utc>) -> Cell {
    let text = format_due(item.due);
    if item.due < now && !item.done {
        Cell::painted(text, RED)
    } else {
        Cell::plain(text)
    }
}

fn status_label(item: &TodoItem) -> &'static str {
    if item.deleted {
        "deleted"
    } else if item.done {
        "done"
    } else {
        "open"
    }
}
