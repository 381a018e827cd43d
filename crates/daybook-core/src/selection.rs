use crate::date_cursor::{
  CalendarDate,
  DayKey,
  MonthTarget
};

/// Displayed month and the selected day.
///
/// The selected day, when present, always
/// belongs to the displayed month: picking a
/// day elsewhere is the engine's job (it loads
/// that month first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
  displayed: MonthTarget,
  selected:  Option<DayKey>
}

impl SelectionState {
  #[must_use]
  pub fn new(
    displayed: MonthTarget
  ) -> Self {
    Self {
      displayed,
      selected: None
    }
  }

  /// Keeps `selected` only when it lies in
  /// `displayed`.
  #[must_use]
  pub fn with_selected(
    displayed: MonthTarget,
    selected: Option<CalendarDate>
  ) -> Self {
    let mut state = Self::new(displayed);
    if let Some(date) = selected {
      state.select(date);
    }
    state
  }

  #[must_use]
  pub fn displayed(&self) -> MonthTarget {
    self.displayed
  }

  #[must_use]
  pub fn selected(
    &self
  ) -> Option<&DayKey> {
    self.selected.as_ref()
  }

  #[must_use]
  pub fn selected_date(
    &self
  ) -> Option<CalendarDate> {
    self.selected.as_ref().map(DayKey::date)
  }

  /// Marks `date` selected if it belongs to
  /// the displayed month; returns whether it
  /// did.
  pub fn select(
    &mut self,
    date: CalendarDate
  ) -> bool {
    if !self.displayed.contains(date) {
      return false;
    }
    self.selected = Some(date.day_key());
    true
  }

  pub fn clear(&mut self) {
    self.selected = None;
  }

  #[must_use]
  pub fn is_selected(
    &self,
    key: &DayKey
  ) -> bool {
    self.selected.as_ref() == Some(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(
    year: i32,
    month: i32,
    day: u32
  ) -> CalendarDate {
    CalendarDate::new(year, month, day)
      .expect("valid date")
  }

  #[test]
  fn selects_days_of_displayed_month_only() {
    let mut state =
      SelectionState::new(MonthTarget::new(2023, 0));
    assert!(state.select(date(2023, 0, 15)));
    assert_eq!(
      state.selected().map(DayKey::as_str),
      Some("2023-01-15")
    );

    assert!(!state.select(date(2023, 1, 5)));
    assert_eq!(
      state.selected_date(),
      Some(date(2023, 0, 15))
    );
  }

  #[test]
  fn preselection_outside_month_is_dropped() {
    let state = SelectionState::with_selected(
      MonthTarget::new(2023, 1),
      Some(date(2023, 0, 31))
    );
    assert_eq!(state.selected(), None);

    let state = SelectionState::with_selected(
      MonthTarget::new(2023, 1),
      Some(date(2023, 1, 5))
    );
    assert!(state.is_selected(&date(2023, 1, 5).day_key()));
  }

  #[test]
  fn clear_forgets_selection() {
    let mut state = SelectionState::with_selected(
      MonthTarget::new(2023, 1),
      Some(date(2023, 1, 5))
    );
    state.clear();
    assert_eq!(state.selected(), None);
    assert_eq!(state.displayed(), MonthTarget::new(2023, 1));
  }
}
