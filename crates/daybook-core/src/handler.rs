//! Business handler port.
//!
//! The calendar never interprets day, week or
//! month data itself. Everything shown inside
//! the grid and the side panes comes from a
//! [`BusinessHandler`], so the same engine can
//! display logged time, attendance, bookings,
//! or anything else keyed by day.

use std::future::Future;
use std::pin::Pin;

use crate::date_cursor::{
  CalendarDate,
  MonthTarget
};
use crate::error::DataLoadError;

/// Cells in one grid row.
pub const DAYS_PER_WEEK: usize = 7;
/// Rows in every month grid.
pub const WEEKS_PER_GRID: usize = 6;
/// Cells in every month grid.
pub const DAYS_PER_GRID: usize =
  DAYS_PER_WEEK * WEEKS_PER_GRID;

/// Month fetch in flight. Owns everything it
/// needs so the engine stays free while it is
/// pending.
pub type MonthLoad<P> = Pin<
  Box<
    dyn Future<
      Output = Result<P, DataLoadError>
    >
  >
>;

pub trait BusinessHandler {
  /// Business data for one day; may be empty.
  type DayPayload: Clone;
  /// Backing data for one month, as returned
  /// by the data service.
  type MonthPayload;
  /// Render-ready content handed to the
  /// presentation layer.
  type Fragment: Clone;

  fn day_data(
    &self,
    date: CalendarDate
  ) -> Self::DayPayload;

  /// Content shown under the day number.
  /// Only called for days of the displayed
  /// month.
  fn day_cell_info(
    &self,
    payload: &Self::DayPayload,
    date: CalendarDate
  ) -> Self::Fragment;

  /// Content of the trailing column of a
  /// week row.
  fn week_aggregate_cell_info(
    &self,
    week: &[Self::DayPayload; DAYS_PER_WEEK]
  ) -> Self::Fragment;

  /// Content of the trailing month row.
  fn month_aggregate_info(
    &self,
    month: &[Self::DayPayload; DAYS_PER_GRID]
  ) -> Self::Fragment;

  fn aggregate_col_title(&self) -> String;

  /// Detail panel for the selected day.
  /// Called with `None` when nothing is
  /// selected; the panel must then render
  /// disabled.
  fn right_pane_content(
    &self,
    payload: Option<&Self::DayPayload>,
    date: Option<CalendarDate>
  ) -> Self::Fragment;

  fn bottom_pane_content(
    &self,
    payload: Option<&Self::DayPayload>,
    date: Option<CalendarDate>
  ) -> Self::Fragment;

  /// Starts fetching the data of `target`.
  /// The returned future must not change
  /// anything the grid reads from: results
  /// only become visible through
  /// [`BusinessHandler::install_month_data`].
  fn load_month_data(
    &self,
    target: MonthTarget
  ) -> MonthLoad<Self::MonthPayload>;

  /// Caches a fetched month. Called by the
  /// engine once a load is accepted, right
  /// before the grid is rebuilt.
  fn install_month_data(
    &mut self,
    target: MonthTarget,
    payload: Self::MonthPayload
  );
}
