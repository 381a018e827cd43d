use crate::date_cursor::{
  CalendarDate,
  DateCursor,
  DayKey,
  FirstWeekday,
  MonthTarget,
  weekday_index
};
use crate::error::NavigationError;
use crate::handler::{
  BusinessHandler,
  DAYS_PER_GRID,
  DAYS_PER_WEEK,
  WEEKS_PER_GRID
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
)]
pub enum Membership {
  PreviousMonth,
  CurrentMonth,
  NextMonth
}

impl Membership {
  #[must_use]
  pub fn classify(
    date: CalendarDate,
    first: CalendarDate,
    last: CalendarDate
  ) -> Self {
    if date < first {
      Self::PreviousMonth
    } else if date > last {
      Self::NextMonth
    } else {
      Self::CurrentMonth
    }
  }

  #[must_use]
  pub fn class_name(
    self
  ) -> &'static str {
    match self {
      | Self::PreviousMonth => {
        "from-prev-month"
      }
      | Self::CurrentMonth => {
        "from-cur-month"
      }
      | Self::NextMonth => {
        "from-next-month"
      }
    }
  }
}

#[derive(Debug, Clone)]
pub struct DayCell<D, F> {
  pub date:       CalendarDate,
  pub key:        DayKey,
  pub membership: Membership,
  pub payload:    D,
  /// Handler cell content; `None` for
  /// spillover days.
  pub info:       Option<F>
}

#[derive(Debug, Clone)]
pub struct WeekRow<D, F> {
  pub cells:     [DayCell<D, F>; DAYS_PER_WEEK],
  pub aggregate: F
}

#[derive(Debug, Clone)]
pub struct MonthGrid<D, F> {
  target:    MonthTarget,
  rows:      [WeekRow<D, F>; WEEKS_PER_GRID],
  aggregate: F
}

impl<D, F> MonthGrid<D, F> {
  #[must_use]
  pub fn target(&self) -> MonthTarget {
    self.target
  }

  #[must_use]
  pub fn rows(
    &self
  ) -> &[WeekRow<D, F>; WEEKS_PER_GRID] {
    &self.rows
  }

  #[must_use]
  pub fn aggregate(&self) -> &F {
    &self.aggregate
  }

  pub fn cells(
    &self
  ) -> impl Iterator<Item = &DayCell<D, F>>
  {
    self
      .rows
      .iter()
      .flat_map(|row| row.cells.iter())
  }

  #[must_use]
  pub fn cell(
    &self,
    key: &DayKey
  ) -> Option<&DayCell<D, F>> {
    self.cells().find(|cell| &cell.key == key)
  }

  /// True when `key` names a day of the
  /// requested month (not a spillover day).
  #[must_use]
  pub fn is_current_month_day(
    &self,
    key: &DayKey
  ) -> bool {
    self.cell(key).is_some_and(|cell| {
      cell.membership
        == Membership::CurrentMonth
    })
  }

  #[must_use]
  pub fn first_cell(
    &self
  ) -> &DayCell<D, F> {
    &self.rows[0].cells[0]
  }

  #[must_use]
  pub fn last_cell(
    &self
  ) -> &DayCell<D, F> {
    &self.rows[WEEKS_PER_GRID - 1].cells
      [DAYS_PER_WEEK - 1]
  }
}

/// Computes the fixed 6x7 grid of a month,
/// padded with days of the adjacent months.
#[derive(Debug, Clone, Copy)]
pub struct MonthGridBuilder {
  cursor:        DateCursor,
  first_weekday: FirstWeekday
}

impl MonthGridBuilder {
  #[must_use]
  pub fn new(
    cursor: DateCursor,
    first_weekday: FirstWeekday
  ) -> Self {
    Self {
      cursor,
      first_weekday
    }
  }

  #[must_use]
  pub fn first_weekday(
    &self
  ) -> FirstWeekday {
    self.first_weekday
  }

  /// Every grid reaches at most into the
  /// neighbouring months, so those must be
  /// representable too.
  pub fn check_range(
    &self,
    target: MonthTarget
  ) -> Result<(), NavigationError> {
    let representable = [-1, 0, 1, 2]
      .into_iter()
      .all(|delta| {
        target
          .offset(delta)
          .first_day()
          .is_some()
      });
    if representable {
      Ok(())
    } else {
      Err(NavigationError::OutOfRange {
        year:  target.year(),
        month: target.month()
      })
    }
  }

  #[tracing::instrument(skip(self, handler))]
  pub fn build<H: BusinessHandler>(
    &self,
    year: i32,
    month: i32,
    handler: &H
  ) -> Result<
    MonthGrid<H::DayPayload, H::Fragment>,
    NavigationError
  > {
    let target =
      MonthTarget::new(year, month);
    self.check_range(target)?;
    let out_of_range = || {
      NavigationError::OutOfRange {
        year:  target.year(),
        month: target.month()
      }
    };

    let first = target
      .first_day()
      .ok_or_else(out_of_range)?;
    let first_of_next = target
      .offset(1)
      .first_day()
      .ok_or_else(out_of_range)?;
    let last = self
      .cursor
      .retreat_days(first_of_next, 1);

    let leading =
      weekday_index(first, self.first_weekday);
    let mut day =
      self.cursor.retreat_days(first, leading);

    tracing::debug!(
      month = %target,
      leading,
      start = %day,
      "building month grid"
    );

    let rows: [WeekRow<H::DayPayload, H::Fragment>;
      WEEKS_PER_GRID] =
      std::array::from_fn(|_| {
        let cells: [DayCell<
          H::DayPayload,
          H::Fragment
        >;
          DAYS_PER_WEEK] =
          std::array::from_fn(|_| {
            let date = day;
            day =
              self.cursor.advance_days(day, 1);
            let membership =
              Membership::classify(
                date, first, last
              );
            let payload =
              handler.day_data(date);
            let info = (membership
              == Membership::CurrentMonth)
              .then(|| {
                handler.day_cell_info(
                  &payload, date
                )
              });
            DayCell {
              date,
              key: date.day_key(),
              membership,
              payload,
              info
            }
          });

        let week: [H::DayPayload;
          DAYS_PER_WEEK] =
          std::array::from_fn(|idx| {
            cells[idx].payload.clone()
          });
        let aggregate = handler
          .week_aggregate_cell_info(&week);
        WeekRow { cells, aggregate }
      });

    let month_payloads: [H::DayPayload;
      DAYS_PER_GRID] =
      std::array::from_fn(|idx| {
        rows[idx / DAYS_PER_WEEK].cells
          [idx % DAYS_PER_WEEK]
          .payload
          .clone()
      });
    let aggregate = handler
      .month_aggregate_info(&month_payloads);

    Ok(MonthGrid {
      target,
      rows,
      aggregate
    })
  }
}
