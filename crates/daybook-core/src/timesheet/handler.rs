use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::date_cursor::{
  CalendarDate,
  DayKey,
  MonthTarget
};
use crate::handler::{
  BusinessHandler,
  DAYS_PER_GRID,
  DAYS_PER_WEEK,
  MonthLoad
};
use crate::i18n::Translations;
use crate::timesheet::duration::format_duration;
use crate::timesheet::model::{
  DayEntries,
  LoggedTime,
  MonthData,
  ProjectCatalog,
  sum_entries
};
use crate::timesheet::store::TimesheetStore;

/// Shows logged time: per-day sums in the
/// cells, weekly and monthly totals in the
/// aggregates, an entry form summary on the
/// right and the day's entries at the bottom.
#[derive(Debug, Clone)]
pub struct TimesheetHandler {
  store:        TimesheetStore,
  translations: Arc<Translations>,
  month:        Option<MonthTarget>,
  logged:       BTreeMap<DayKey, Vec<LoggedTime>>,
  projects:     Arc<ProjectCatalog>
}

impl TimesheetHandler {
  #[must_use]
  pub fn new(
    store: TimesheetStore,
    translations: Arc<Translations>
  ) -> Self {
    Self {
      store,
      translations,
      month: None,
      logged: BTreeMap::new(),
      projects: Arc::default()
    }
  }

  pub fn store(&self) -> &TimesheetStore {
    &self.store
  }

  /// Month whose data is cached.
  pub fn cached_month(
    &self
  ) -> Option<MonthTarget> {
    self.month
  }

  pub fn projects(&self) -> &ProjectCatalog {
    &self.projects
  }

  /// Refetches one day into the cache after
  /// an entry was posted or deleted. Days
  /// outside the cached month are ignored;
  /// call `CalendarEngine::refresh` next to
  /// redraw.
  #[tracing::instrument(skip(self))]
  pub fn reload_day(
    &mut self,
    date: CalendarDate
  ) -> anyhow::Result<bool> {
    if self.month != Some(date.month_target())
    {
      debug!("day outside cached month");
      return Ok(false);
    }
    let entries = self.store.fetch_day(date)?;
    let key = date.day_key();
    if entries.is_empty() {
      self.logged.remove(&key);
    } else {
      self.logged.insert(key, entries);
    }
    Ok(true)
  }

  fn trans<'a>(
    &'a self,
    key: &'a str
  ) -> &'a str {
    self.translations.trans(key)
  }
}

impl BusinessHandler for TimesheetHandler {
  type DayPayload = DayEntries;
  type Fragment = String;
  type MonthPayload = MonthData;

  fn day_data(
    &self,
    date: CalendarDate
  ) -> DayEntries {
    DayEntries {
      entries:  self
        .logged
        .get(&date.day_key())
        .cloned()
        .unwrap_or_default(),
      projects: Arc::clone(&self.projects)
    }
  }

  fn day_cell_info(
    &self,
    payload: &DayEntries,
    _date: CalendarDate
  ) -> String {
    format_duration(
      payload.total_seconds(),
      !payload.is_empty()
    )
  }

  fn week_aggregate_cell_info(
    &self,
    week: &[DayEntries; DAYS_PER_WEEK]
  ) -> String {
    let (sum, any) = sum_entries(week);
    format_duration(sum, any)
  }

  fn month_aggregate_info(
    &self,
    month: &[DayEntries; DAYS_PER_GRID]
  ) -> String {
    let (sum, _) = sum_entries(month);
    format!(
      "{}: {}",
      self.trans("MonthTotal"),
      format_duration(sum, true)
    )
  }

  fn aggregate_col_title(&self) -> String {
    self.trans("TOTAL").to_string()
  }

  fn right_pane_content(
    &self,
    payload: Option<&DayEntries>,
    date: Option<CalendarDate>
  ) -> String {
    let (Some(payload), Some(date)) =
      (payload, date)
    else {
      return format!(
        "[{}] {}",
        self.trans("Disabled"),
        self.trans("SelectADay")
      );
    };

    let mut out = format!(
      "{} {date}\n",
      self.trans("LogTimeFor")
    );
    for (kind, projects) in
      payload.projects.iter()
    {
      for project in projects {
        out.push_str(&format!(
          "  {}: {} {} ({kind}, #{})\n",
          self.trans("Project"),
          project.reference,
          project.title,
          project.id
        ));
      }
    }
    out.push_str(&format!(
      "{}: {}",
      self.trans("Hours"),
      format_duration(
        payload.total_seconds(),
        true
      )
    ));
    out
  }

  fn bottom_pane_content(
    &self,
    payload: Option<&DayEntries>,
    _date: Option<CalendarDate>
  ) -> String {
    let Some(payload) = payload else {
      return String::new();
    };
    let mut out = String::new();
    for entry in &payload.entries {
      out.push_str(&format!(
        "[{}] {} - {} (#{})\n",
        format_duration(
          entry.task_duration,
          true
        ),
        entry.task_ref,
        entry.task_label,
        entry.task_time_id
      ));
      out.push_str(&format!(
        "  {}: {}\n",
        self.trans("Project"),
        entry.project_ref
      ));
      if let Some(note) = &entry.note {
        out.push_str(&format!("  {note}\n"));
      }
    }
    out
  }

  fn load_month_data(
    &self,
    target: MonthTarget
  ) -> MonthLoad<MonthData> {
    let store = self.store.clone();
    Box::pin(async move {
      store.fetch_month(target).await
    })
  }

  fn install_month_data(
    &mut self,
    target: MonthTarget,
    payload: MonthData
  ) {
    debug!(
      month = %target,
      days = payload.logged_times.len(),
      "caching month data"
    );
    self.month = Some(target);
    self.logged = payload.logged_times;
    self.projects = Arc::new(payload.projects);
  }
}
