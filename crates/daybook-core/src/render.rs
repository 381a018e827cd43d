use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::grid::Membership;
use crate::navigation::NavButton;
use crate::notify::Notice;
use crate::timesheet::ProjectTask;
use crate::view::{CalendarView, CellView};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color && io::stdout().is_terminal(),
        }
    }

    /// Renderer that never emits escape codes.
    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, view), fields(month = %view.month))]
    pub fn render_calendar<W: Write>(
        &self,
        out: &mut W,
        view: &CalendarView<String>,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.nav_line(view))?;
        writeln!(out)?;

        let mut headers: Vec<String> = view.weekday_headers.to_vec();
        headers.push(view.aggregate_col_title.clone());

        let rows = view
            .weeks
            .iter()
            .map(|week| {
                let mut row: Vec<String> =
                    week.days.iter().map(|cell| self.cell_text(cell)).collect();
                row.push(week.aggregate.clone());
                row
            })
            .collect();

        write_table(&mut *out, headers, rows)?;
        writeln!(out, "{}", self.paint(&view.month_aggregate, "1"))?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn render_panes<W: Write>(
        &self,
        out: &mut W,
        view: &CalendarView<String>,
    ) -> anyhow::Result<()> {
        writeln!(out)?;
        writeln!(out, "{}", view.right_pane)?;
        if !view.bottom_pane.is_empty() {
            writeln!(out)?;
            write!(out, "{}", view.bottom_pane)?;
        }
        Ok(())
    }

    pub fn render_notices<W: Write>(&self, out: &mut W, notices: &[Notice]) -> anyhow::Result<()> {
        for notice in notices {
            writeln!(out, "{}", self.paint(&notice.message, "31"))?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, out, tasks))]
    pub fn render_tasks<W: Write>(&self, out: &mut W, tasks: &[ProjectTask]) -> anyhow::Result<()> {
        let headers = vec!["ID".to_string(), "Ref".to_string(), "Label".to_string()];
        let rows = tasks
            .iter()
            .map(|task| {
                vec![
                    self.paint(&task.id.to_string(), "33"),
                    task.reference.clone(),
                    task.label.clone(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    fn nav_line(&self, view: &CalendarView<String>) -> String {
        let nav = |button: NavButton| {
            view.nav_target(button)
                .map(|target| match button {
                    NavButton::PrevYear | NavButton::PrevMonth => {
                        format!("{} {target}", button.label())
                    }
                    NavButton::NextMonth | NavButton::NextYear => {
                        format!("{target} {}", button.label())
                    }
                })
                .unwrap_or_default()
        };
        format!(
            "{}  {}   {}   {}  {}",
            nav(NavButton::PrevYear),
            nav(NavButton::PrevMonth),
            self.paint(&view.title, "1"),
            nav(NavButton::NextMonth),
            nav(NavButton::NextYear),
        )
    }

    fn cell_text(&self, cell: &CellView<String>) -> String {
        let day = cell.day_of_month;
        match (cell.membership, cell.selected) {
            (Membership::CurrentMonth, true) => {
                let text = format!("[{day:>2}] {}", cell.info.as_deref().unwrap_or_default());
                self.paint(text.trim_end(), "7")
            }
            (Membership::CurrentMonth, false) => {
                let text = format!(" {day:>2}  {}", cell.info.as_deref().unwrap_or_default());
                text.trim_end().to_string()
            }
            (_, _) => self.paint(&format!("({day:>2})"), "2"),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let mut line = String::new();
    for (idx, header) in headers.iter().enumerate() {
        let padding = widths[idx].saturating_sub(UnicodeWidthStr::width(header.as_str()));
        line.push_str(header);
        line.push_str(&" ".repeat(padding + 1));
    }
    writeln!(writer, "{}", line.trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding + 1));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
