use std::collections::HashMap;

use serde::Deserialize;

use crate::date_cursor::{
  FirstWeekday,
  MonthTarget
};

// translation keys for weekday names, 0 = Sunday
pub const WEEKDAY_KEYS: [&str; 7] =
  ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

// translation keys for month names
pub const MONTH_KEYS: [&str; 12] = [
  "Jan", "Feb", "Mar", "Apr", "May", "Jun",
  "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"
];

/// Immutable translation table. Unknown keys
/// translate to themselves.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Deserialize,
)]
#[serde(transparent)]
pub struct Translations {
  map: HashMap<String, String>
}

impl Translations {
  #[must_use]
  pub fn new(
    map: HashMap<String, String>
  ) -> Self {
    Self { map }
  }

  #[must_use]
  pub fn trans<'a>(
    &'a self,
    key: &'a str
  ) -> &'a str {
    self
      .map
      .get(key)
      .map_or(key, String::as_str)
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.map.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }

  /// `weekday` uses native numbering,
  /// 0 = Sunday.
  #[must_use]
  pub fn weekday_name(
    &self,
    weekday: u32
  ) -> &str {
    self.trans(WEEKDAY_KEYS[(weekday % 7) as usize])
  }

  #[must_use]
  pub fn month_name(
    &self,
    month: u32
  ) -> &str {
    self.trans(MONTH_KEYS[(month % 12) as usize])
  }

  #[must_use]
  pub fn month_title(
    &self,
    target: MonthTarget
  ) -> String {
    format!(
      "{} {}",
      self.month_name(target.month()),
      target.year()
    )
  }

  #[must_use]
  pub fn weekday_headers(
    &self,
    first_weekday: FirstWeekday
  ) -> [String; 7] {
    std::array::from_fn(|column| {
      self
        .weekday_name(
          first_weekday.weekday_at(column as u32)
        )
        .to_string()
    })
  }
}
