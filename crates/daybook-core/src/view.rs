use crate::date_cursor::{
  CalendarDate,
  DayKey,
  MonthTarget
};
use crate::grid::{
  DayCell,
  Membership,
  MonthGrid
};
use crate::handler::{
  DAYS_PER_WEEK,
  WEEKS_PER_GRID
};
use crate::navigation::NavButton;
use crate::selection::SelectionState;

/// Everything a presentation layer needs to
/// draw one month.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarView<F> {
  pub month:               MonthTarget,
  pub title:               String,
  pub weekday_headers:     [String; DAYS_PER_WEEK],
  pub aggregate_col_title: String,
  pub weeks:               [WeekView<F>; WEEKS_PER_GRID],
  pub month_aggregate:     F,
  pub right_pane:          F,
  pub bottom_pane:         F,
  pub selected:            Option<DayKey>,
  pub nav:                 Vec<NavTarget>
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekView<F> {
  pub days:      [CellView<F>; DAYS_PER_WEEK],
  pub aggregate: F
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellView<F> {
  pub date:         CalendarDate,
  pub key:          DayKey,
  pub day_of_month: u32,
  pub membership:   Membership,
  pub selected:     bool,
  pub info:         Option<F>
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
)]
pub struct NavTarget {
  pub button: NavButton,
  pub target: MonthTarget
}

impl<F> CalendarView<F> {
  pub fn cells(
    &self
  ) -> impl Iterator<Item = &CellView<F>> {
    self
      .weeks
      .iter()
      .flat_map(|week| week.days.iter())
  }

  #[must_use]
  pub fn selected_cell(
    &self
  ) -> Option<&CellView<F>> {
    self.cells().find(|cell| cell.selected)
  }

  #[must_use]
  pub fn nav_target(
    &self,
    button: NavButton
  ) -> Option<MonthTarget> {
    self
      .nav
      .iter()
      .find(|nav| nav.button == button)
      .map(|nav| nav.target)
  }
}

pub(crate) fn week_views<D, F: Clone>(
  grid: &MonthGrid<D, F>,
  selection: &SelectionState
) -> [WeekView<F>; WEEKS_PER_GRID] {
  grid.rows().each_ref().map(|row| {
    WeekView {
      days:      row
        .cells
        .each_ref()
        .map(|cell| cell_view(cell, selection)),
      aggregate: row.aggregate.clone()
    }
  })
}

fn cell_view<D, F: Clone>(
  cell: &DayCell<D, F>,
  selection: &SelectionState
) -> CellView<F> {
  CellView {
    date:         cell.date,
    key:          cell.key.clone(),
    day_of_month: cell.date.day(),
    membership:   cell.membership,
    selected:     cell.membership
      == Membership::CurrentMonth
      && selection.is_selected(&cell.key),
    info:         cell.info.clone()
  }
}
