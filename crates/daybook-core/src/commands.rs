use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, instrument, warn};

use crate::cli::Command;
use crate::config::Config;
use crate::date_cursor::{CalendarDate, DayKey, MonthTarget};
use crate::engine::{CalendarEngine, CalendarOptions, LoadOutcome};
use crate::navigation::{NavButton, NavIntent, NavigationController};
use crate::notify::NoticeLog;
use crate::render::Renderer;
use crate::timesheet::{
    LoggedTime, TimeSpent, TimesheetHandler, TimesheetStore, format_duration, parse_duration,
};

const BROWSE_HELP: &str = "\
n / p      next / previous month
N / P      next / previous year
<day>      select a day of the displayed month
YYYY-MM-DD select any day
log TASK DURATION [NOTE]  log time on the selected day
rm ID      delete a logged time of the selected day
q          quit";

/// A calendar over the timesheet store, with its navigation bindings and
/// the notices raised by failed loads.
pub struct Session {
    engine: CalendarEngine<TimesheetHandler>,
    nav: NavigationController,
    notices: NoticeLog,
}

impl Session {
    pub fn new(options: CalendarOptions, store: TimesheetStore) -> Self {
        let notices = NoticeLog::new();
        let handler = TimesheetHandler::new(store, Arc::clone(&options.translations));
        let engine = CalendarEngine::new(options, handler).with_notifier(notices.clone());
        Self {
            engine,
            nav: NavigationController::new(),
            notices,
        }
    }

    pub fn engine(&self) -> &CalendarEngine<TimesheetHandler> {
        &self.engine
    }

    pub fn store(&self) -> &TimesheetStore {
        self.engine.handler().store()
    }

    pub fn notices(&self) -> &NoticeLog {
        &self.notices
    }

    pub fn selected_date(&self) -> Option<CalendarDate> {
        self.engine
            .selection()
            .and_then(|selection| selection.selected_date())
    }

    /// Loads `target`, or the configured initial month.
    #[instrument(skip(self))]
    pub async fn open(&mut self, target: Option<MonthTarget>) -> anyhow::Result<LoadOutcome> {
        let target = target.unwrap_or_else(|| self.engine.initial());
        let outcome = self
            .engine
            .load_month(target.year(), target.month() as i32)
            .await?;
        self.nav.sync(&self.engine);
        Ok(outcome)
    }

    /// Opens the month of `date` with `date` selected.
    #[instrument(skip(self))]
    pub async fn open_day(&mut self, date: CalendarDate) -> anyhow::Result<LoadOutcome> {
        let outcome = self.open(Some(date.month_target())).await?;
        if self.engine.current() == Some(date.month_target()) {
            self.nav
                .handle(&mut self.engine, NavIntent::ClickDay(date))
                .await?;
        }
        Ok(outcome)
    }

    pub async fn apply(&mut self, intent: NavIntent) -> anyhow::Result<Option<LoadOutcome>> {
        if !self.engine.is_loaded()
            && let NavIntent::ClickDay(date) = intent
        {
            return self.open_day(date).await.map(Some);
        }
        Ok(self.nav.handle(&mut self.engine, intent).await?)
    }

    pub fn log_time(&mut self, entry: TimeSpent) -> anyhow::Result<LoggedTime> {
        let date = entry.date;
        let logged = self.store().post_time(entry)?;
        self.reload_day(date)?;
        Ok(logged)
    }

    pub fn unlog_time(&mut self, date: CalendarDate, id: u64) -> anyhow::Result<LoggedTime> {
        let removed = self.store().delete_time(date, id)?;
        self.reload_day(date)?;
        Ok(removed)
    }

    fn reload_day(&mut self, date: CalendarDate) -> anyhow::Result<()> {
        if self.engine.handler_mut().reload_day(date)? && self.engine.is_loaded() {
            self.engine.refresh()?;
        }
        Ok(())
    }

    pub fn render<W: Write>(
        &mut self,
        renderer: &Renderer,
        out: &mut W,
        with_panes: bool,
    ) -> anyhow::Result<()> {
        renderer.render_notices(out, &self.notices.drain())?;
        let Some(view) = self.engine.view() else {
            writeln!(out, "no month loaded")?;
            return Ok(());
        };
        renderer.render_calendar(out, &view)?;
        if with_panes {
            renderer.render_panes(out, &view)?;
        }
        Ok(())
    }
}

#[instrument(skip(cfg, store, renderer, out))]
pub async fn dispatch<W: Write>(
    cfg: &Config,
    store: TimesheetStore,
    renderer: &Renderer,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()> {
    let options = cfg.calendar_options()?;
    let mut session = Session::new(options, store);

    match command {
        Command::Month { month } => {
            let outcome = session.open(month).await?;
            session.render(renderer, out, false)?;
            require_loaded(&outcome)?;
        }
        Command::Day { date } => {
            let outcome = session.open_day(date.date()).await?;
            session.render(renderer, out, true)?;
            require_loaded(&outcome)?;
        }
        Command::Log {
            date,
            task,
            duration,
            note,
            id,
        } => {
            let seconds = parse_duration(&duration)?;
            let logged = session.store().post_time(TimeSpent {
                id,
                fk_task: task,
                date: date.date(),
                duration: seconds,
                note,
            })?;
            info!(id = logged.task_time_id, "logged time");
            writeln!(
                out,
                "logged {} on {date} as #{}",
                format_duration(logged.task_duration, true),
                logged.task_time_id
            )?;
            let outcome = session.open_day(date.date()).await?;
            session.render(renderer, out, true)?;
            require_loaded(&outcome)?;
        }
        Command::Unlog { date, id } => {
            let removed = session.store().delete_time(date.date(), id)?;
            writeln!(
                out,
                "deleted #{} ({}) from {date}",
                removed.task_time_id,
                format_duration(removed.task_duration, true)
            )?;
            let outcome = session.open_day(date.date()).await?;
            session.render(renderer, out, true)?;
            require_loaded(&outcome)?;
        }
        Command::Tasks { project } => {
            let tasks = session.store().project_tasks(project)?;
            renderer.render_tasks(out, &tasks)?;
        }
        Command::Browse => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            browse(&mut session, renderer, stdin, out).await?;
        }
    }

    Ok(())
}

fn require_loaded(outcome: &LoadOutcome) -> anyhow::Result<()> {
    match outcome {
        LoadOutcome::Failed(err) => {
            Err(anyhow::Error::new(err.clone()).context("month data could not be loaded"))
        }
        LoadOutcome::Rejected(err) => {
            Err(anyhow::Error::new(err.clone()).context("month could not be displayed"))
        }
        LoadOutcome::Applied(_) | LoadOutcome::Discarded(_) | LoadOutcome::Joined(_) => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseInput {
    Show,
    Help,
    Quit,
    Navigate(NavIntent),
    Log {
        task: u64,
        seconds: u64,
        note: Option<String>,
    },
    Unlog(u64),
}

pub fn parse_browse_line(line: &str, current: Option<MonthTarget>) -> anyhow::Result<BrowseInput> {
    let line = line.trim();
    let (head, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(head, rest)| (head, rest.trim()));

    let nav = |button: NavButton| Ok(BrowseInput::Navigate(NavIntent::ClickNav(button.delta())));

    match head {
        "" => Ok(BrowseInput::Show),
        "?" | "help" => Ok(BrowseInput::Help),
        "q" | "quit" => Ok(BrowseInput::Quit),
        "n" => nav(NavButton::NextMonth),
        "p" => nav(NavButton::PrevMonth),
        "N" => nav(NavButton::NextYear),
        "P" => nav(NavButton::PrevYear),
        "log" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            let task = parts
                .next()
                .filter(|part| !part.is_empty())
                .ok_or_else(|| anyhow!("usage: log TASK DURATION [NOTE]"))?
                .parse()
                .context("task id must be a number")?;
            let seconds = parse_duration(
                parts
                    .next()
                    .ok_or_else(|| anyhow!("usage: log TASK DURATION [NOTE]"))?,
            )?;
            let note = parts
                .next()
                .map(str::trim)
                .filter(|note| !note.is_empty())
                .map(str::to_string);
            Ok(BrowseInput::Log {
                task,
                seconds,
                note,
            })
        }
        "rm" => Ok(BrowseInput::Unlog(
            rest.parse().context("usage: rm ID")?,
        )),
        day if day.chars().all(|ch| ch.is_ascii_digit()) => {
            let current = current.ok_or_else(|| anyhow!("no month displayed"))?;
            let day: u32 = day.parse().context("invalid day number")?;
            let date = CalendarDate::new(current.year(), current.month() as i32, day)
                .ok_or_else(|| anyhow!("{current} has no day {day}"))?;
            Ok(BrowseInput::Navigate(NavIntent::ClickDay(date)))
        }
        other => DayKey::parse(other)
            .map(|key| BrowseInput::Navigate(NavIntent::ClickDay(key.date())))
            .map_err(|_| anyhow!("unknown input '{other}'; type ? for help")),
    }
}

/// Line-driven month browser: reads commands from `input` until `q` or EOF,
/// redrawing after each one.
#[instrument(skip_all)]
pub async fn browse<R, W>(
    session: &mut Session,
    renderer: &Renderer,
    input: R,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    session.open(None).await?;
    session.render(renderer, out, true)?;
    writeln!(out, "{BROWSE_HELP}")?;
    out.flush()?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("failed reading input")? {
        let parsed = parse_browse_line(&line, session.engine().current());
        debug!(line = %line, ?parsed, "browse input");
        let command = match parsed {
            Ok(command) => command,
            Err(err) => {
                writeln!(out, "error: {err:#}")?;
                continue;
            }
        };

        let result = match command {
            BrowseInput::Quit => break,
            BrowseInput::Help => {
                writeln!(out, "{BROWSE_HELP}")?;
                continue;
            }
            BrowseInput::Show => Ok(()),
            BrowseInput::Navigate(intent) => session.apply(intent).await.map(|_| ()),
            BrowseInput::Log {
                task,
                seconds,
                note,
            } => match session.selected_date() {
                Some(date) => session
                    .log_time(TimeSpent {
                        id: None,
                        fk_task: task,
                        date,
                        duration: seconds,
                        note,
                    })
                    .map(|_| ()),
                None => Err(anyhow!("select a day first")),
            },
            BrowseInput::Unlog(id) => match session.selected_date() {
                Some(date) => session.unlog_time(date, id).map(|_| ()),
                None => Err(anyhow!("select a day first")),
            },
        };

        if let Err(err) = result {
            warn!(error = %err, "browse command failed");
            writeln!(out, "error: {err:#}")?;
        }
        session.render(renderer, out, true)?;
        out.flush()?;
    }

    Ok(())
}
