use std::fmt;
use std::str::FromStr;

use chrono::{
  DateTime,
  Datelike,
  Days,
  Duration,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};

use crate::error::NavigationError;

// 24 hours of 60 minutes of 60 seconds of
// 1000 milliseconds. Transition days between
// daylight saving time and standard time can
// last more or less than that.
const DAY_MILLIS: i64 =
  24 * 60 * 60 * 1000;

/// Folds an out-of-range zero-based month
/// into the year: month 12 is January of the
/// next year, month -1 December of the
/// previous one.
#[must_use]
pub const fn normalize(
  year: i32,
  month: i32
) -> (i32, u32) {
  let carry = month.div_euclid(12);
  let month = month.rem_euclid(12) as u32;
  (year.saturating_add(carry), month)
}

/// Column of `date` in a week that starts on
/// `first_weekday`.
#[must_use]
pub fn weekday_index(
  date: CalendarDate,
  first_weekday: FirstWeekday
) -> u32 {
  (date.weekday() + (7 - first_weekday.get()))
    % 7
}

#[must_use]
pub fn to_day_key(
  date: CalendarDate
) -> DayKey {
  DayKey {
    text: format!(
      "{:04}-{:02}-{:02}",
      date.year(),
      date.month() + 1,
      date.day()
    ),
    date
  }
}

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
pub struct CalendarDate {
  inner: NaiveDate
}

impl CalendarDate {
  /// `month` is zero-based and normalized
  /// before the date is built; `None` when
  /// the day does not exist in that month.
  pub fn new(
    year: i32,
    month: i32,
    day: u32
  ) -> Option<Self> {
    let (year, month) =
      normalize(year, month);
    NaiveDate::from_ymd_opt(
      year,
      month + 1,
      day
    )
    .map(Self::from_naive)
  }

  #[must_use]
  pub fn from_naive(
    inner: NaiveDate
  ) -> Self {
    Self { inner }
  }

  #[must_use]
  pub fn naive(self) -> NaiveDate {
    self.inner
  }

  #[must_use]
  pub fn year(self) -> i32 {
    self.inner.year()
  }

  /// Zero-based month, 0 = January.
  #[must_use]
  pub fn month(self) -> u32 {
    self.inner.month0()
  }

  #[must_use]
  pub fn day(self) -> u32 {
    self.inner.day()
  }

  /// Native weekday, 0 = Sunday.
  #[must_use]
  pub fn weekday(self) -> u32 {
    self
      .inner
      .weekday()
      .num_days_from_sunday()
  }

  #[must_use]
  pub fn month_target(
    self
  ) -> MonthTarget {
    MonthTarget {
      year:  self.year(),
      month: self.month()
    }
  }

  #[must_use]
  pub fn day_key(self) -> DayKey {
    to_day_key(self)
  }
}

impl fmt::Display for CalendarDate {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(to_day_key(*self).as_str())
  }
}

/// Normalized (year, zero-based month) pair.
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
pub struct MonthTarget {
  year:  i32,
  month: u32
}

impl MonthTarget {
  #[must_use]
  pub const fn new(
    year: i32,
    month: i32
  ) -> Self {
    let (year, month) =
      normalize(year, month);
    Self { year, month }
  }

  #[must_use]
  pub fn year(self) -> i32 {
    self.year
  }

  #[must_use]
  pub fn month(self) -> u32 {
    self.month
  }

  #[must_use]
  pub fn offset(
    self,
    delta: i32
  ) -> Self {
    Self::new(
      self.year,
      (self.month as i32)
        .saturating_add(delta)
    )
  }

  pub fn first_day(
    self
  ) -> Option<CalendarDate> {
    CalendarDate::new(
      self.year,
      self.month as i32,
      1
    )
  }

  #[must_use]
  pub fn contains(
    self,
    date: CalendarDate
  ) -> bool {
    date.year() == self.year
      && date.month() == self.month
  }
}

impl fmt::Display for MonthTarget {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:04}-{:02}",
      self.year,
      self.month + 1
    )
  }
}

impl FromStr for MonthTarget {
  type Err = NavigationError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let invalid = || {
      NavigationError::InvalidMonth(
        s.to_string()
      )
    };
    let (year, month) = s
      .trim()
      .rsplit_once('-')
      .ok_or_else(invalid)?;
    let year: i32 =
      year.parse().map_err(|_| invalid())?;
    let month: u32 = month
      .parse()
      .map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
      return Err(invalid());
    }
    Ok(Self {
      year,
      month: month - 1
    })
  }
}

/// Canonical `YYYY-MM-DD` form of a day, used
/// as lookup key and selection identity.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(
  try_from = "String",
  into = "String"
)]
pub struct DayKey {
  text: String,
  date: CalendarDate
}

impl DayKey {
  pub fn parse(
    raw: &str
  ) -> Result<Self, NavigationError> {
    let invalid = || {
      NavigationError::InvalidDayKey(
        raw.to_string()
      )
    };

    let mut parts = raw.rsplitn(3, '-');
    let day: u32 = parts
      .next()
      .and_then(|p| p.parse().ok())
      .ok_or_else(invalid)?;
    let month: i32 = parts
      .next()
      .and_then(|p| p.parse().ok())
      .ok_or_else(invalid)?;
    let year: i32 = parts
      .next()
      .and_then(|p| p.parse().ok())
      .ok_or_else(invalid)?;

    if !(1..=12).contains(&month) {
      return Err(invalid());
    }

    let date =
      CalendarDate::new(year, month - 1, day)
        .ok_or_else(invalid)?;
    let key = to_day_key(date);
    if key.text != raw {
      return Err(invalid());
    }
    Ok(key)
  }

  #[must_use]
  pub fn as_str(&self) -> &str {
    &self.text
  }

  #[must_use]
  pub fn date(&self) -> CalendarDate {
    self.date
  }
}

impl fmt::Display for DayKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&self.text)
  }
}

impl FromStr for DayKey {
  type Err = NavigationError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::parse(s.trim())
  }
}

impl TryFrom<String> for DayKey {
  type Error = NavigationError;

  fn try_from(
    value: String
  ) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<DayKey> for String {
  fn from(key: DayKey) -> Self {
    key.text
  }
}

/// Weekday shown in the leftmost grid column,
/// 0 = Sunday.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
)]
pub struct FirstWeekday(u32);

impl FirstWeekday {
  pub const MONDAY: Self = Self(1);
  pub const SUNDAY: Self = Self(0);

  pub fn new(
    value: i64
  ) -> Result<Self, NavigationError> {
    if (0..=6).contains(&value) {
      Ok(Self(value as u32))
    } else {
      Err(
        NavigationError::InvalidFirstWeekday(
          value
        )
      )
    }
  }

  #[must_use]
  pub fn get(self) -> u32 {
    self.0
  }

  /// Native weekday (0 = Sunday) displayed in
  /// grid column `column`.
  #[must_use]
  pub fn weekday_at(
    self,
    column: u32
  ) -> u32 {
    (column + self.0) % 7
  }
}

impl Default for FirstWeekday {
  fn default() -> Self {
    Self::MONDAY
  }
}

/// Day stepping in a configured local zone.
///
/// Steps are taken on zoned instants anchored
/// at local midnight, so days that last 23 or
/// 25 hours never shift the resulting date.
/// Every step is checked against plain
/// calendar arithmetic; zones that skipped a
/// whole day fall back to the calendar.
#[derive(Debug, Clone, Copy)]
pub struct DateCursor {
  tz: Tz
}

impl Default for DateCursor {
  fn default() -> Self {
    Self::new(chrono_tz::UTC)
  }
}

impl DateCursor {
  #[must_use]
  pub fn new(tz: Tz) -> Self {
    Self { tz }
  }

  #[must_use]
  pub fn timezone(&self) -> Tz {
    self.tz
  }

  #[must_use]
  pub fn today(&self) -> CalendarDate {
    CalendarDate::from_naive(
      Utc::now()
        .with_timezone(&self.tz)
        .date_naive()
    )
  }

  #[must_use]
  pub fn advance_days(
    &self,
    date: CalendarDate,
    n: u32
  ) -> CalendarDate {
    let expected = date
      .inner
      .checked_add_days(Days::new(
        u64::from(n)
      ))
      .unwrap_or(NaiveDate::MAX);

    // half a day on top straddles days
    // longer or shorter than 24 hours
    let landed =
      Duration::try_milliseconds(
        DAY_MILLIS * i64::from(n)
          + (DAY_MILLIS >> 1)
      )
      .and_then(|step| {
        self
          .local_midnight(date.inner)
          .checked_add_signed(step)
      })
      .map(|dt| dt.date_naive());

    match landed {
      | Some(day) if day == expected => {
        CalendarDate::from_naive(day)
      }
      | other => {
        tracing::debug!(
          from = %date,
          days = n,
          landed = ?other,
          expected = %expected,
          timezone = %self.tz,
          "zoned step disagreed with calendar; using calendar date"
        );
        CalendarDate::from_naive(expected)
      }
    }
  }

  #[must_use]
  pub fn retreat_days(
    &self,
    date: CalendarDate,
    n: u32
  ) -> CalendarDate {
    let mut day = date.inner;
    for _ in 0..n {
      let Some(expected) = day.pred_opt()
      else {
        break;
      };

      // one millisecond before local
      // midnight is always the previous
      // local day
      let landed = self
        .local_midnight(day)
        .checked_sub_signed(
          Duration::milliseconds(1)
        )
        .map(|dt| dt.date_naive());

      day = match landed {
        | Some(prev) if prev == expected => {
          prev
        }
        | _ => expected
      };
    }
    CalendarDate::from_naive(day)
  }

  #[must_use]
  pub fn to_day_key(
    &self,
    date: CalendarDate
  ) -> DayKey {
    to_day_key(date)
  }

  fn local_midnight(
    &self,
    day: NaiveDate
  ) -> DateTime<Tz> {
    let midnight =
      day.and_time(NaiveTime::MIN);
    if let Some(dt) = self
      .tz
      .from_local_datetime(&midnight)
      .earliest()
    {
      return dt;
    }

    // midnight fell into a DST gap; take the
    // first wall-clock time that exists
    (1..=48)
      .filter_map(|half_hours| {
        midnight.checked_add_signed(
          Duration::minutes(
            30 * half_hours
          )
        )
      })
      .find_map(|candidate| {
        self
          .tz
          .from_local_datetime(&candidate)
          .earliest()
      })
      .unwrap_or_else(|| {
        self.from_utc(midnight)
      })
  }

  fn from_utc(
    &self,
    naive: NaiveDateTime
  ) -> DateTime<Tz> {
    self.tz.from_utc_datetime(&naive)
  }
}

#[cfg(test)]
mod tests {
  use chrono_tz::Tz;

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
  fn normalize_folds_overflow_into_year() {
    assert_eq!(normalize(2023, 12), (2024, 0));
    assert_eq!(normalize(2023, -1), (2022, 11));
    assert_eq!(normalize(2023, 25), (2025, 1));
    assert_eq!(normalize(2023, -13), (2021, 11));
    assert_eq!(normalize(2023, 5), (2023, 5));
  }

  #[test]
  fn day_key_is_zero_padded() {
    assert_eq!(
      to_day_key(date(2023, 0, 5)).as_str(),
      "2023-01-05"
    );
    assert_eq!(
      to_day_key(date(987, 10, 30)).as_str(),
      "0987-11-30"
    );
  }

  #[test]
  fn day_key_round_trips() {
    let cursor = DateCursor::default();
    let mut day = date(1999, 11, 20);
    for _ in 0..800 {
      let key = to_day_key(day);
      let parsed = DayKey::parse(key.as_str())
        .expect("parse key");
      assert_eq!(parsed.date(), day);
      assert_eq!(parsed, key);
      day = cursor.advance_days(day, 1);
    }

    let ancient = date(-44, 2, 15);
    let key = to_day_key(ancient);
    assert_eq!(
      DayKey::parse(key.as_str())
        .expect("parse negative year")
        .date(),
      ancient
    );
  }

  #[test]
  fn day_key_rejects_garbage() {
    for raw in [
      "",
      "2023-1-05",
      "2023-02-30",
      "2023-13-01",
      "20230105",
      "abcd-01-01",
      "23-01-01"
    ] {
      assert!(
        DayKey::parse(raw).is_err(),
        "{raw} should not parse"
      );
    }
  }

  #[test]
  fn month_target_parses_one_based_months() {
    let target: MonthTarget =
      "2023-02".parse().expect("parse");
    assert_eq!(target.year(), 2023);
    assert_eq!(target.month(), 1);
    assert_eq!(target.to_string(), "2023-02");
    assert!("2023-13".parse::<MonthTarget>().is_err());
    assert!("2023".parse::<MonthTarget>().is_err());
  }

  #[test]
  fn month_target_offsets_roll_over() {
    let jan = MonthTarget::new(2023, 0);
    assert_eq!(jan.offset(-1), MonthTarget::new(2022, 11));
    assert_eq!(jan.offset(12), MonthTarget::new(2024, 0));
    assert_eq!(jan.offset(-12), MonthTarget::new(2022, 0));
    assert_eq!(
      MonthTarget::new(2023, 11).offset(1),
      MonthTarget::new(2024, 0)
    );
  }

  fn assert_round_trip(
    tz: Tz,
    around: CalendarDate
  ) {
    let cursor = DateCursor::new(tz);
    let start = cursor.retreat_days(around, 20);
    for n in 0..=40 {
      let forward = cursor.advance_days(start, n);
      assert_eq!(
        forward.naive(),
        start.naive()
          + chrono::Days::new(u64::from(n)),
        "{tz}: advance {start} by {n}"
      );
      let back = cursor.retreat_days(forward, n);
      assert_eq!(back, start, "{tz}: retreat {forward} by {n}");
    }
  }

  #[test]
  fn stepping_survives_spring_forward() {
    assert_round_trip(
      chrono_tz::America::New_York,
      date(2023, 2, 12)
    );
    assert_round_trip(
      chrono_tz::Europe::Paris,
      date(2023, 2, 26)
    );
  }

  #[test]
  fn stepping_survives_fall_back() {
    assert_round_trip(
      chrono_tz::America::New_York,
      date(2023, 10, 5)
    );
    assert_round_trip(
      chrono_tz::Europe::Paris,
      date(2023, 9, 29)
    );
  }

  #[test]
  fn stepping_survives_midnight_gap() {
    // Brazil started DST at local midnight
    assert_round_trip(
      chrono_tz::America::Sao_Paulo,
      date(2018, 10, 4)
    );
  }

  #[test]
  fn zero_step_is_identity() {
    let cursor =
      DateCursor::new(chrono_tz::Europe::Paris);
    let day = date(2023, 2, 26);
    assert_eq!(cursor.advance_days(day, 0), day);
    assert_eq!(cursor.retreat_days(day, 0), day);
  }

  #[test]
  fn weekday_index_is_a_bijection() {
    let cursor = DateCursor::default();
    let monday = date(2023, 0, 2);
    for first in 0..7 {
      let first =
        FirstWeekday::new(first).expect("first weekday");
      let mut seen: Vec<u32> = (0..7)
        .map(|n| {
          weekday_index(
            cursor.advance_days(monday, n),
            first
          )
        })
        .collect();
      seen.sort_unstable();
      assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 6]);
    }
  }

  #[test]
  fn weekday_index_is_zero_on_first_weekday() {
    let cursor = DateCursor::default();
    let mut day = date(2024, 1, 1);
    for _ in 0..30 {
      let own = FirstWeekday::new(i64::from(day.weekday()))
        .expect("first weekday");
      assert_eq!(weekday_index(day, own), 0);
      day = cursor.advance_days(day, 1);
    }
  }

  #[test]
  fn sunday_lands_last_in_monday_week() {
    let jan_first = date(2023, 0, 1);
    assert_eq!(jan_first.weekday(), 0);
    assert_eq!(
      weekday_index(jan_first, FirstWeekday::MONDAY),
      6
    );
    assert_eq!(
      weekday_index(jan_first, FirstWeekday::SUNDAY),
      0
    );
  }

  #[test]
  fn first_weekday_rejects_out_of_range() {
    assert!(FirstWeekday::new(7).is_err());
    assert!(FirstWeekday::new(-1).is_err());
    assert_eq!(FirstWeekday::default().get(), 1);
    assert_eq!(FirstWeekday::MONDAY.weekday_at(6), 0);
  }
}
