use std::fmt;
use std::sync::{
  Arc,
  Weak
};

use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  warn
};

use crate::date_cursor::{
  CalendarDate,
  DateCursor,
  DayKey,
  FirstWeekday,
  MonthTarget
};
use crate::error::{
  DataLoadError,
  NavigationError
};
use crate::grid::{
  MonthGrid,
  MonthGridBuilder
};
use crate::handler::{
  BusinessHandler,
  MonthLoad
};
use crate::i18n::Translations;
use crate::navigation::NavButton;
use crate::notify::{
  Notice,
  Notifier,
  TracingNotifier
};
use crate::selection::SelectionState;
use crate::view::{
  CalendarView,
  NavTarget,
  week_views
};

#[derive(Debug, Clone)]
pub struct CalendarOptions {
  pub first_weekday: FirstWeekday,
  pub initial:       MonthTarget,
  pub timezone:      Tz,
  pub translations:  Arc<Translations>
}

impl Default for CalendarOptions {
  fn default() -> Self {
    let cursor = DateCursor::default();
    Self {
      first_weekday: FirstWeekday::default(),
      initial:       cursor
        .today()
        .month_target(),
      timezone:      cursor.timezone(),
      translations:  Arc::new(
        Translations::default()
      )
    }
  }
}

/// Identifies one month request.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub struct LoadTicket(u64);

/// A month request whose data is still being
/// fetched. Await it with
/// [`PendingLoad::wait`] and hand the
/// response back to
/// [`CalendarEngine::complete_load`].
///
/// Dropping it abandons the request: the
/// month is no longer in flight and the next
/// request for it fetches again.
pub struct PendingLoad<P> {
  ticket: LoadTicket,
  target: MonthTarget,
  future: MonthLoad<P>,
  alive:  Arc<()>
}

impl<P> PendingLoad<P> {
  #[must_use]
  pub fn ticket(&self) -> LoadTicket {
    self.ticket
  }

  #[must_use]
  pub fn target(&self) -> MonthTarget {
    self.target
  }

  pub async fn wait(
    self
  ) -> LoadResponse<P> {
    let result = self.future.await;
    LoadResponse {
      ticket: self.ticket,
      target: self.target,
      result,
      alive: self.alive
    }
  }
}

impl<P> fmt::Debug for PendingLoad<P> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("PendingLoad")
      .field("ticket", &self.ticket)
      .field("target", &self.target)
      .finish_non_exhaustive()
  }
}

pub struct LoadResponse<P> {
  pub ticket: LoadTicket,
  pub target: MonthTarget,
  pub result: Result<P, DataLoadError>,
  alive:      Arc<()>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
  /// The month is now displayed.
  Applied(MonthTarget),
  /// Reported through the notifier; the
  /// previous month stays displayed.
  Failed(DataLoadError),
  /// A newer request superseded this one.
  Discarded(MonthTarget),
  /// A request for the same month was
  /// already in flight.
  Joined(MonthTarget),
  Rejected(NavigationError)
}

/// Result of [`CalendarEngine::select_day`].
#[derive(Debug)]
pub enum Selection<P> {
  /// Day of the displayed month; panes are
  /// already refreshed.
  Updated(DayKey),
  /// Day of another month; that month opens
  /// with the day selected once the load
  /// completes.
  Loading(PendingLoad<P>),
  Joined(MonthTarget)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panes<F> {
  pub right:  F,
  pub bottom: F
}

#[derive(Debug, Clone)]
struct InFlight {
  ticket:    LoadTicket,
  target:    MonthTarget,
  preselect: Option<CalendarDate>,
  live:      Weak<()>
}

impl InFlight {
  /// True while its `PendingLoad` (or the
  /// response it resolved to) is held.
  fn is_pending(&self) -> bool {
    self.live.strong_count() > 0
  }
}

struct LoadedMonth<D, F> {
  grid:      MonthGrid<D, F>,
  selection: SelectionState,
  panes:     Panes<F>
}

enum EngineState<D, F> {
  Unloaded,
  Loaded(Box<LoadedMonth<D, F>>)
}

/// Month calendar state machine.
///
/// Starts `Unloaded`; every accepted month
/// load replaces the grid, the selection and
/// the panes at once. Failed loads leave the
/// displayed month untouched and responses
/// for a month other than the latest request
/// are dropped.
pub struct CalendarEngine<H: BusinessHandler> {
  handler:      H,
  builder:      MonthGridBuilder,
  cursor:       DateCursor,
  initial:      MonthTarget,
  translations: Arc<Translations>,
  notifier:     Box<dyn Notifier>,
  state: EngineState<H::DayPayload, H::Fragment>,
  latest:       Option<InFlight>,
  next_ticket:  u64
}

impl<H: BusinessHandler> CalendarEngine<H> {
  pub fn new(
    options: CalendarOptions,
    handler: H
  ) -> Self {
    let cursor =
      DateCursor::new(options.timezone);
    info!(
      first_weekday = options.first_weekday.get(),
      initial = %options.initial,
      timezone = %options.timezone,
      "calendar engine created"
    );
    Self {
      handler,
      builder: MonthGridBuilder::new(
        cursor,
        options.first_weekday
      ),
      cursor,
      initial: options.initial,
      translations: options.translations,
      notifier: Box::new(TracingNotifier),
      state: EngineState::Unloaded,
      latest: None,
      next_ticket: 0
    }
  }

  #[must_use]
  pub fn with_notifier(
    mut self,
    notifier: impl Notifier + 'static
  ) -> Self {
    self.notifier = Box::new(notifier);
    self
  }

  pub fn handler(&self) -> &H {
    &self.handler
  }

  pub fn handler_mut(&mut self) -> &mut H {
    &mut self.handler
  }

  pub fn cursor(&self) -> DateCursor {
    self.cursor
  }

  pub fn first_weekday(
    &self
  ) -> FirstWeekday {
    self.builder.first_weekday()
  }

  pub fn translations(
    &self
  ) -> &Translations {
    &self.translations
  }

  pub fn initial(&self) -> MonthTarget {
    self.initial
  }

  pub fn is_loaded(&self) -> bool {
    matches!(
      self.state,
      EngineState::Loaded(_)
    )
  }

  /// Displayed month, if any.
  pub fn current(
    &self
  ) -> Option<MonthTarget> {
    self
      .selection()
      .map(SelectionState::displayed)
  }

  pub fn selection(
    &self
  ) -> Option<&SelectionState> {
    match &self.state {
      | EngineState::Loaded(loaded) => {
        Some(&loaded.selection)
      }
      | EngineState::Unloaded => None
    }
  }

  pub fn grid(
    &self
  ) -> Option<&MonthGrid<H::DayPayload, H::Fragment>>
  {
    match &self.state {
      | EngineState::Loaded(loaded) => {
        Some(&loaded.grid)
      }
      | EngineState::Unloaded => None
    }
  }

  pub fn panes(
    &self
  ) -> Option<&Panes<H::Fragment>> {
    match &self.state {
      | EngineState::Loaded(loaded) => {
        Some(&loaded.panes)
      }
      | EngineState::Unloaded => None
    }
  }

  /// Month of the most recent request.
  pub fn latest_requested(
    &self
  ) -> Option<MonthTarget> {
    self
      .latest
      .as_ref()
      .map(|latest| latest.target)
  }

  pub fn is_loading(&self) -> bool {
    self
      .latest
      .as_ref()
      .is_some_and(InFlight::is_pending)
  }

  pub fn initial_load(
    &mut self
  ) -> Result<
    Option<PendingLoad<H::MonthPayload>>,
    NavigationError
  > {
    let initial = self.initial;
    self.begin_load(
      initial.year(),
      initial.month() as i32,
      None
    )
  }

  /// Loads the configured initial month.
  pub async fn open(
    &mut self
  ) -> Result<LoadOutcome, NavigationError> {
    let initial = self.initial;
    self
      .load_month(
        initial.year(),
        initial.month() as i32
      )
      .await
  }

  /// Starts loading `month` (zero-based,
  /// normalized). Returns `None` when a live
  /// load of the same month is already in
  /// flight; `preselect` then carries over to
  /// that request.
  #[tracing::instrument(skip(self))]
  pub fn begin_load(
    &mut self,
    year: i32,
    month: i32,
    preselect: Option<CalendarDate>
  ) -> Result<
    Option<PendingLoad<H::MonthPayload>>,
    NavigationError
  > {
    let target =
      MonthTarget::new(year, month);
    self.builder.check_range(target)?;

    if let Some(latest) = self.latest.as_mut()
      && latest.is_pending()
      && latest.target == target
    {
      if preselect.is_some() {
        latest.preselect = preselect;
      }
      debug!(
        month = %target,
        ticket = latest.ticket.0,
        "month already requested; joining"
      );
      return Ok(None);
    }

    let ticket = LoadTicket(self.next_ticket);
    self.next_ticket += 1;
    let alive = Arc::new(());
    self.latest = Some(InFlight {
      ticket,
      target,
      preselect,
      live: Arc::downgrade(&alive)
    });

    info!(
      month = %target,
      ticket = ticket.0,
      "requesting month data"
    );
    let future =
      self.handler.load_month_data(target);
    Ok(Some(PendingLoad {
      ticket,
      target,
      future,
      alive
    }))
  }

  #[tracing::instrument(
    skip(self, response),
    fields(
      month = %response.target,
      ticket = response.ticket.0
    )
  )]
  pub fn complete_load(
    &mut self,
    response: LoadResponse<H::MonthPayload>
  ) -> LoadOutcome {
    let LoadResponse {
      ticket,
      target,
      result,
      alive
    } = response;
    drop(alive);

    let Some(latest) = self.latest.as_mut()
    else {
      debug!("no request on record; discarding");
      return LoadOutcome::Discarded(target);
    };

    let is_latest = latest.ticket == ticket;
    // an older ticket for the latest month only
    // counts while the newest request is live
    let newer_pending =
      !is_latest && latest.is_pending();
    if latest.target != target
      || (!is_latest && !newer_pending)
    {
      debug!(
        latest = %latest.target,
        "discarding stale month data"
      );
      return LoadOutcome::Discarded(target);
    }

    match result {
      | Ok(payload) => {
        let preselect =
          latest.preselect.take();
        self.apply(target, payload, preselect)
      }
      | Err(error) if newer_pending => {
        debug!(
          error = %error,
          latest = latest.ticket.0,
          "older request failed; newer one \
           still pending"
        );
        LoadOutcome::Discarded(target)
      }
      | Err(error) => {
        self.report(target, &error);
        LoadOutcome::Failed(error)
      }
    }
  }

  pub async fn drive(
    &mut self,
    pending: PendingLoad<H::MonthPayload>
  ) -> LoadOutcome {
    let response = pending.wait().await;
    self.complete_load(response)
  }

  pub async fn load_month(
    &mut self,
    year: i32,
    month: i32
  ) -> Result<LoadOutcome, NavigationError> {
    match self.begin_load(year, month, None)? {
      | Some(pending) => {
        Ok(self.drive(pending).await)
      }
      | None => {
        Ok(LoadOutcome::Joined(
          MonthTarget::new(year, month)
        ))
      }
    }
  }

  #[tracing::instrument(skip(self))]
  pub fn select_day(
    &mut self,
    date: CalendarDate
  ) -> Result<
    Selection<H::MonthPayload>,
    NavigationError
  > {
    let EngineState::Loaded(loaded) =
      &mut self.state
    else {
      return Err(NavigationError::NotLoaded);
    };

    if loaded.selection.select(date) {
      loaded.panes = panes_for(
        &self.handler,
        &loaded.selection
      );
      debug!("selected day in displayed month");
      return Ok(Selection::Updated(
        date.day_key()
      ));
    }

    let target = date.month_target();
    debug!(
      month = %target,
      "day belongs to another month"
    );
    match self.begin_load(
      target.year(),
      target.month() as i32,
      Some(date)
    )? {
      | Some(pending) => {
        Ok(Selection::Loading(pending))
      }
      | None => Ok(Selection::Joined(target))
    }
  }

  pub fn jump_relative_months(
    &mut self,
    delta: i32
  ) -> Result<
    Option<PendingLoad<H::MonthPayload>>,
    NavigationError
  > {
    let current = self
      .current()
      .ok_or(NavigationError::NotLoaded)?;
    let target = current.offset(delta);
    debug!(
      from = %current,
      to = %target,
      delta,
      "relative month jump"
    );
    self.begin_load(
      target.year(),
      target.month() as i32,
      None
    )
  }

  /// Rebuilds grid and panes from what the
  /// handler has cached, without fetching.
  pub fn refresh(
    &mut self
  ) -> Result<(), NavigationError> {
    let selection = self
      .selection()
      .ok_or(NavigationError::NotLoaded)?;
    let target = selection.displayed();
    let selected = selection.selected_date();
    self.rebuild(target, selected)
  }

  pub fn view(
    &self
  ) -> Option<CalendarView<H::Fragment>> {
    let EngineState::Loaded(loaded) =
      &self.state
    else {
      return None;
    };
    let month = loaded.selection.displayed();
    Some(CalendarView {
      month,
      title: self
        .translations
        .month_title(month),
      weekday_headers: self
        .translations
        .weekday_headers(self.first_weekday()),
      aggregate_col_title: self
        .handler
        .aggregate_col_title(),
      weeks: week_views(
        &loaded.grid,
        &loaded.selection
      ),
      month_aggregate: loaded
        .grid
        .aggregate()
        .clone(),
      right_pane: loaded.panes.right.clone(),
      bottom_pane: loaded
        .panes
        .bottom
        .clone(),
      selected: loaded
        .selection
        .selected()
        .cloned(),
      nav: NavButton::ALL
        .iter()
        .map(|button| {
          NavTarget {
            button: *button,
            target: month
              .offset(button.delta())
          }
        })
        .collect()
    })
  }

  fn apply(
    &mut self,
    target: MonthTarget,
    payload: H::MonthPayload,
    preselect: Option<CalendarDate>
  ) -> LoadOutcome {
    self
      .handler
      .install_month_data(target, payload);
    let previous = self
      .selection()
      .and_then(SelectionState::selected_date);

    match self
      .rebuild(target, preselect.or(previous))
    {
      | Ok(()) => {
        info!(month = %target, "month displayed");
        LoadOutcome::Applied(target)
      }
      | Err(err) => {
        warn!(
          month = %target,
          error = %err,
          "could not build month grid"
        );
        LoadOutcome::Rejected(err)
      }
    }
  }

  fn rebuild(
    &mut self,
    target: MonthTarget,
    selected: Option<CalendarDate>
  ) -> Result<(), NavigationError> {
    let grid = self.builder.build(
      target.year(),
      target.month() as i32,
      &self.handler
    )?;
    let selection = SelectionState::with_selected(
      target, selected
    );
    let panes =
      panes_for(&self.handler, &selection);
    self.state =
      EngineState::Loaded(Box::new(LoadedMonth {
        grid,
        selection,
        panes
      }));
    Ok(())
  }

  fn report(
    &mut self,
    target: MonthTarget,
    error: &DataLoadError
  ) {
    let message = format!(
      "{} : {}",
      self.translations.trans(error.notice_key()),
      error.cause()
    );
    warn!(
      month = %target,
      error = %error,
      "month data could not be loaded"
    );
    self.notifier.notify(Notice {
      target,
      message,
      error: error.clone()
    });
  }
}

fn panes_for<H: BusinessHandler>(
  handler: &H,
  selection: &SelectionState
) -> Panes<H::Fragment> {
  let date = selection.selected_date();
  let payload =
    date.map(|day| handler.day_data(day));
  Panes {
    right:  handler.right_pane_content(
      payload.as_ref(),
      date
    ),
    bottom: handler.bottom_pane_content(
      payload.as_ref(),
      date
    )
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::collections::HashMap;
  use std::rc::Rc;

  use super::*;
  use crate::handler::{
    DAYS_PER_GRID,
    DAYS_PER_WEEK
  };
  use crate::notify::NoticeLog;
  use crate::view::CellView;

  type Minutes = HashMap<String, u32>;

  /// Minutes logged per day; month loads are
  /// answered from `script`.
  #[derive(Default)]
  struct Minutely {
    cache:  Minutes,
    script: HashMap<MonthTarget, Result<Minutes, DataLoadError>>,
    calls:  Rc<RefCell<Vec<MonthTarget>>>
  }

  impl Minutely {
    fn with(
      mut self,
      target: MonthTarget,
      entries: &[(&str, u32)]
    ) -> Self {
      self.script.insert(
        target,
        Ok(entries
          .iter()
          .map(|(key, minutes)| (key.to_string(), *minutes))
          .collect())
      );
      self
    }

    fn failing(
      mut self,
      target: MonthTarget,
      cause: &str
    ) -> Self {
      self
        .script
        .insert(target, Err(DataLoadError::endpoint(cause)));
      self
    }
  }

  impl BusinessHandler for Minutely {
    type DayPayload = u32;
    type Fragment = String;
    type MonthPayload = Minutes;

    fn day_data(&self, date: CalendarDate) -> u32 {
      self
        .cache
        .get(date.day_key().as_str())
        .copied()
        .unwrap_or(0)
    }

    fn day_cell_info(
      &self,
      payload: &u32,
      _date: CalendarDate
    ) -> String {
      format!("{payload}m")
    }

    fn week_aggregate_cell_info(
      &self,
      week: &[u32; DAYS_PER_WEEK]
    ) -> String {
      week.iter().sum::<u32>().to_string()
    }

    fn month_aggregate_info(
      &self,
      month: &[u32; DAYS_PER_GRID]
    ) -> String {
      month.iter().sum::<u32>().to_string()
    }

    fn aggregate_col_title(&self) -> String {
      "TOTAL".to_string()
    }

    fn right_pane_content(
      &self,
      payload: Option<&u32>,
      date: Option<CalendarDate>
    ) -> String {
      match (payload, date) {
        | (Some(minutes), Some(date)) => {
          format!("edit {date} ({minutes}m)")
        }
        | _ => "disabled".to_string()
      }
    }

    fn bottom_pane_content(
      &self,
      payload: Option<&u32>,
      _date: Option<CalendarDate>
    ) -> String {
      payload
        .map(|minutes| format!("{minutes} minutes"))
        .unwrap_or_default()
    }

    fn load_month_data(
      &self,
      target: MonthTarget
    ) -> MonthLoad<Minutes> {
      self.calls.borrow_mut().push(target);
      let result = self
        .script
        .get(&target)
        .cloned()
        .unwrap_or_else(|| Ok(Minutes::new()));
      Box::pin(async move { result })
    }

    fn install_month_data(
      &mut self,
      _target: MonthTarget,
      payload: Minutes
    ) {
      self.cache = payload;
    }
  }

  fn date(
    year: i32,
    month: i32,
    day: u32
  ) -> CalendarDate {
    CalendarDate::new(year, month, day)
      .expect("valid date")
  }

  fn engine(handler: Minutely) -> CalendarEngine<Minutely> {
    CalendarEngine::new(
      CalendarOptions {
        initial: MonthTarget::new(2023, 0),
        ..CalendarOptions::default()
      },
      handler
    )
  }

  const JAN: MonthTarget = MonthTarget::new(2023, 0);
  const FEB: MonthTarget = MonthTarget::new(2023, 1);

  #[tokio::test]
  async fn open_loads_initial_month() {
    let handler = Minutely::default()
      .with(JAN, &[("2023-01-03", 90), ("2023-01-04", 30)]);
    let mut engine = engine(handler);
    assert!(!engine.is_loaded());
    assert!(engine.view().is_none());

    let outcome = engine.open().await.expect("open");
    assert_eq!(outcome, LoadOutcome::Applied(JAN));

    let view = engine.view().expect("view");
    assert_eq!(view.title, "Jan 2023");
    assert_eq!(view.weekday_headers[0], "Mon");
    assert_eq!(view.month_aggregate, "120");
    assert_eq!(view.right_pane, "disabled");
    assert_eq!(view.bottom_pane, "");
    assert_eq!(view.weeks.len(), 6);
    assert_eq!(view.weeks[1].aggregate, "120");
    let last_week: &[CellView<String>; DAYS_PER_WEEK] =
      &view.weeks[5].days;
    assert_eq!(last_week[0].date, date(2023, 0, 30));
    assert_eq!(last_week[6].date, date(2023, 1, 5));
    assert_eq!(view.cells().count(), DAYS_PER_GRID);
    assert_eq!(
      view.nav_target(NavButton::PrevYear),
      Some(MonthTarget::new(2022, 0))
    );
  }

  #[tokio::test]
  async fn selecting_inside_month_does_not_reload() {
    let handler = Minutely::default().with(JAN, &[("2023-01-03", 90)]);
    let calls = Rc::clone(&handler.calls);
    let mut engine = engine(handler);
    engine.open().await.expect("open");

    let selection =
      engine.select_day(date(2023, 0, 3)).expect("select");
    assert!(matches!(selection, Selection::Updated(ref key) if key.as_str() == "2023-01-03"));
    assert_eq!(calls.borrow().len(), 1);

    let view = engine.view().expect("view");
    assert_eq!(view.right_pane, "edit 2023-01-03 (90m)");
    assert_eq!(view.bottom_pane, "90 minutes");
    let selected: Vec<_> = view
      .cells()
      .filter(|cell| cell.selected)
      .map(|cell| cell.key.to_string())
      .collect();
    assert_eq!(selected, vec!["2023-01-03".to_string()]);
  }

  #[tokio::test]
  async fn selecting_spillover_day_opens_that_month_preselected() {
    let handler = Minutely::default().with(FEB, &[("2023-02-05", 15)]);
    let calls = Rc::clone(&handler.calls);
    let mut engine = engine(handler);
    engine.open().await.expect("open");
    calls.borrow_mut().clear();

    let Selection::Loading(pending) =
      engine.select_day(date(2023, 1, 5)).expect("select")
    else {
      panic!("expected a month load");
    };
    assert_eq!(pending.target(), FEB);
    // January stays displayed until the load lands
    assert_eq!(engine.current(), Some(JAN));

    let outcome = engine.drive(pending).await;
    assert_eq!(outcome, LoadOutcome::Applied(FEB));
    assert_eq!(calls.borrow().as_slice(), &[FEB]);

    let view = engine.view().expect("view");
    assert_eq!(
      view.selected.as_ref().map(DayKey::as_str),
      Some("2023-02-05")
    );
    assert_eq!(
      view.selected_cell().map(|cell| cell.day_of_month),
      Some(5)
    );
    assert_eq!(view.bottom_pane, "15 minutes");
  }

  #[tokio::test]
  async fn late_response_does_not_overwrite_newer_month() {
    let handler = Minutely::default()
      .with(JAN, &[("2023-01-10", 60)])
      .with(FEB, &[("2023-02-10", 45)]);
    let mut engine = engine(handler);

    let january = engine
      .begin_load(2023, 0, None)
      .expect("begin jan")
      .expect("jan pending");
    let february = engine
      .begin_load(2023, 1, None)
      .expect("begin feb")
      .expect("feb pending");

    let feb_response = february.wait().await;
    assert_eq!(
      engine.complete_load(feb_response),
      LoadOutcome::Applied(FEB)
    );

    let jan_response = january.wait().await;
    assert_eq!(
      engine.complete_load(jan_response),
      LoadOutcome::Discarded(JAN)
    );

    assert_eq!(engine.current(), Some(FEB));
    assert_eq!(engine.view().expect("view").month_aggregate, "45");
  }

  #[tokio::test]
  async fn stale_response_is_dropped_even_before_newer_lands() {
    let handler = Minutely::default();
    let mut engine = engine(handler);
    let january = engine
      .begin_load(2023, 0, None)
      .expect("begin")
      .expect("pending");
    let _february = engine
      .begin_load(2023, 1, None)
      .expect("begin")
      .expect("pending");

    let response = january.wait().await;
    assert_eq!(
      engine.complete_load(response),
      LoadOutcome::Discarded(JAN)
    );
    assert!(!engine.is_loaded());
    assert!(engine.is_loading());
  }

  #[tokio::test]
  async fn failed_load_keeps_current_month_and_notifies() {
    let handler = Minutely::default()
      .with(JAN, &[("2023-01-10", 60)])
      .failing(FEB, "database unavailable");
    let notices = NoticeLog::new();
    let mut engine = engine(handler).with_notifier(notices.clone());
    engine.open().await.expect("open");
    engine.select_day(date(2023, 0, 10)).expect("select");

    let pending = engine
      .jump_relative_months(1)
      .expect("jump")
      .expect("pending");
    let outcome = engine.drive(pending).await;
    assert_eq!(
      outcome,
      LoadOutcome::Failed(DataLoadError::endpoint("database unavailable"))
    );

    assert_eq!(engine.current(), Some(JAN));
    let view = engine.view().expect("view");
    assert_eq!(view.month_aggregate, "60");
    assert_eq!(
      view.selected.as_ref().map(DayKey::as_str),
      Some("2023-01-10")
    );

    let notices = notices.drain();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].target, FEB);
    assert_eq!(notices[0].message, "EndPointError : database unavailable");
  }

  #[tokio::test]
  async fn duplicate_request_joins_in_flight_load() {
    let handler = Minutely::default();
    let calls = Rc::clone(&handler.calls);
    let mut engine = engine(handler);
    engine.open().await.expect("open");
    calls.borrow_mut().clear();

    let pending = engine
      .jump_relative_months(1)
      .expect("jump")
      .expect("pending");
    let joined = engine.select_day(date(2023, 1, 20)).expect("select");
    assert!(matches!(joined, Selection::Joined(target) if target == FEB));
    assert_eq!(calls.borrow().len(), 1);

    assert_eq!(engine.drive(pending).await, LoadOutcome::Applied(FEB));
    assert_eq!(
      engine
        .selection()
        .and_then(SelectionState::selected)
        .map(DayKey::as_str),
      Some("2023-02-20")
    );
  }

  #[tokio::test]
  async fn abandoned_load_is_requested_again() {
    let handler = Minutely::default().with(FEB, &[("2023-02-10", 45)]);
    let calls = Rc::clone(&handler.calls);
    let mut engine = engine(handler);
    engine.open().await.expect("open");
    calls.borrow_mut().clear();

    let abandoned = engine
      .jump_relative_months(1)
      .expect("jump")
      .expect("pending");
    drop(abandoned);
    assert!(!engine.is_loading());

    let retry = engine
      .jump_relative_months(1)
      .expect("jump")
      .expect("fresh request");
    assert_eq!(calls.borrow().as_slice(), &[FEB, FEB]);
    assert_eq!(engine.drive(retry).await, LoadOutcome::Applied(FEB));
    assert_eq!(engine.view().expect("view").month_aggregate, "45");
  }

  #[tokio::test]
  async fn slow_load_for_revisited_month_still_lands() {
    let handler = Minutely::default().with(FEB, &[("2023-02-10", 45)]);
    let calls = Rc::clone(&handler.calls);
    let mut engine = engine(handler);
    engine.open().await.expect("open");
    calls.borrow_mut().clear();

    let slow = engine
      .jump_relative_months(1)
      .expect("jump")
      .expect("pending");
    let march = engine
      .begin_load(2023, 2, None)
      .expect("begin")
      .expect("pending");
    assert_eq!(
      engine.drive(march).await,
      LoadOutcome::Applied(MonthTarget::new(2023, 2))
    );

    let back = engine
      .jump_relative_months(-1)
      .expect("jump")
      .expect("fresh request");
    assert_eq!(
      calls.borrow().as_slice(),
      &[FEB, MonthTarget::new(2023, 2), FEB]
    );

    assert_eq!(engine.drive(slow).await, LoadOutcome::Applied(FEB));
    assert_eq!(engine.drive(back).await, LoadOutcome::Applied(FEB));
    assert_eq!(engine.view().expect("view").month_aggregate, "45");
    assert!(!engine.is_loading());
  }

  #[tokio::test]
  async fn older_failure_defers_to_newer_request_for_same_month() {
    let handler = Minutely::default().failing(FEB, "boom");
    let notices = NoticeLog::new();
    let mut engine = engine(handler).with_notifier(notices.clone());

    let first = engine
      .begin_load(2023, 1, None)
      .expect("begin")
      .expect("pending");
    let _march = engine
      .begin_load(2023, 2, None)
      .expect("begin")
      .expect("pending");
    let latest = engine
      .begin_load(2023, 1, None)
      .expect("begin")
      .expect("pending");

    let response = first.wait().await;
    assert_eq!(
      engine.complete_load(response),
      LoadOutcome::Discarded(FEB)
    );
    assert!(notices.is_empty());

    assert_eq!(
      engine.drive(latest).await,
      LoadOutcome::Failed(DataLoadError::endpoint("boom"))
    );
    assert_eq!(notices.drain().len(), 1);
  }

  #[tokio::test]
  async fn preselected_day_applies_once() {
    let handler = Minutely::default();
    let mut engine = engine(handler);
    engine.open().await.expect("open");

    let first = engine
      .begin_load(2023, 1, None)
      .expect("begin")
      .expect("pending");
    let _march = engine
      .begin_load(2023, 2, None)
      .expect("begin")
      .expect("pending");
    let Selection::Loading(latest) =
      engine.select_day(date(2023, 1, 5)).expect("select")
    else {
      panic!("expected a month load");
    };

    let response = first.wait().await;
    assert_eq!(engine.complete_load(response), LoadOutcome::Applied(FEB));
    assert_eq!(
      engine.selection().and_then(SelectionState::selected_date),
      Some(date(2023, 1, 5))
    );

    engine.select_day(date(2023, 1, 20)).expect("reselect");
    assert_eq!(engine.drive(latest).await, LoadOutcome::Applied(FEB));
    assert_eq!(
      engine.selection().and_then(SelectionState::selected_date),
      Some(date(2023, 1, 20))
    );
  }

  #[tokio::test]
  async fn jumps_roll_over_years() {
    let mut engine = engine(Minutely::default());
    engine.open().await.expect("open");

    let pending = engine
      .jump_relative_months(-1)
      .expect("jump")
      .expect("pending");
    assert_eq!(pending.target(), MonthTarget::new(2022, 11));
    engine.drive(pending).await;

    let pending = engine
      .jump_relative_months(12)
      .expect("jump")
      .expect("pending");
    assert_eq!(pending.target(), MonthTarget::new(2023, 11));
  }

  #[test]
  fn navigation_requires_a_loaded_month() {
    let mut engine = engine(Minutely::default());
    assert_eq!(
      engine.jump_relative_months(1).map(|p| p.is_some()),
      Err(NavigationError::NotLoaded)
    );
    assert!(matches!(
      engine.select_day(date(2023, 0, 1)),
      Err(NavigationError::NotLoaded)
    ));
    assert_eq!(engine.refresh(), Err(NavigationError::NotLoaded));
  }

  #[tokio::test]
  async fn navigating_away_drops_selection() {
    let mut engine = engine(Minutely::default());
    engine.open().await.expect("open");
    engine.select_day(date(2023, 0, 10)).expect("select");

    engine.load_month(2023, 1).await.expect("load");
    assert_eq!(engine.view().expect("view").selected, None);
    assert_eq!(engine.view().expect("view").right_pane, "disabled");
  }

  #[tokio::test]
  async fn refresh_rebuilds_from_cache_without_fetching() {
    let handler = Minutely::default().with(JAN, &[("2023-01-10", 60)]);
    let calls = Rc::clone(&handler.calls);
    let mut engine = engine(handler);
    engine.open().await.expect("open");
    engine.select_day(date(2023, 0, 10)).expect("select");

    engine
      .handler_mut()
      .cache
      .insert("2023-01-10".to_string(), 75);
    engine.refresh().expect("refresh");

    assert_eq!(calls.borrow().len(), 1);
    let view = engine.view().expect("view");
    assert_eq!(view.month_aggregate, "75");
    assert_eq!(view.bottom_pane, "75 minutes");
  }
}
