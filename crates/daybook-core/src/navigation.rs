use std::collections::BTreeMap;

use tracing::debug;

use crate::date_cursor::{
  CalendarDate,
  DayKey,
  MonthTarget
};
use crate::engine::{
  CalendarEngine,
  LoadOutcome,
  PendingLoad,
  Selection
};
use crate::error::NavigationError;
use crate::handler::BusinessHandler;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
pub enum NavButton {
  PrevYear,
  PrevMonth,
  NextMonth,
  NextYear
}

impl NavButton {
  pub const ALL: [Self; 4] = [
    Self::PrevYear,
    Self::PrevMonth,
    Self::NextMonth,
    Self::NextYear
  ];

  #[must_use]
  pub fn delta(self) -> i32 {
    match self {
      | Self::PrevYear => -12,
      | Self::PrevMonth => -1,
      | Self::NextMonth => 1,
      | Self::NextYear => 12
    }
  }

  pub fn from_delta(
    delta: i32
  ) -> Result<Self, NavigationError> {
    Self::ALL
      .into_iter()
      .find(|button| button.delta() == delta)
      .ok_or(NavigationError::InvalidDelta(
        delta
      ))
  }

  #[must_use]
  pub fn label(self) -> &'static str {
    match self {
      | Self::PrevYear => "<<",
      | Self::PrevMonth => "<",
      | Self::NextMonth => ">",
      | Self::NextYear => ">>"
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
)]
pub enum NavIntent {
  ClickDay(CalendarDate),
  /// One of -12, -1, 1, 12.
  ClickNav(i32)
}

#[derive(Debug)]
pub enum Dispatch<P> {
  Selected(DayKey),
  Load(PendingLoad<P>),
  Joined(MonthTarget)
}

/// Turns intents into engine calls and keeps
/// one binding per nav button.
///
/// Bindings are keyed by button, so binding
/// again after a grid rebuild replaces the
/// old target instead of stacking a second
/// one.
#[derive(Debug, Default)]
pub struct NavigationController {
  bindings:  BTreeMap<NavButton, MonthTarget>,
  bound_for: Option<MonthTarget>
}

impl NavigationController {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  pub fn rebind(
    &mut self,
    current: MonthTarget
  ) {
    for button in NavButton::ALL {
      self.bindings.insert(
        button,
        current.offset(button.delta())
      );
    }
    self.bound_for = Some(current);
    debug!(month = %current, "nav buttons bound");
  }

  pub fn bindings(
    &self
  ) -> impl Iterator<Item = (NavButton, MonthTarget)> + '_
  {
    self
      .bindings
      .iter()
      .map(|(button, target)| (*button, *target))
  }

  #[must_use]
  pub fn binding(
    &self,
    button: NavButton
  ) -> Option<MonthTarget> {
    self.bindings.get(&button).copied()
  }

  #[must_use]
  pub fn bound_for(
    &self
  ) -> Option<MonthTarget> {
    self.bound_for
  }

  /// Rebinds when the engine displays a
  /// month other than the bound one.
  pub fn sync<H: BusinessHandler>(
    &mut self,
    engine: &CalendarEngine<H>
  ) {
    if let Some(current) = engine.current()
      && self.bound_for != Some(current)
    {
      self.rebind(current);
    }
  }

  #[tracing::instrument(skip(self, engine))]
  pub fn dispatch<H: BusinessHandler>(
    &mut self,
    engine: &mut CalendarEngine<H>,
    intent: NavIntent
  ) -> Result<
    Dispatch<H::MonthPayload>,
    NavigationError
  > {
    self.sync(engine);
    match intent {
      | NavIntent::ClickNav(delta) => {
        let button =
          NavButton::from_delta(delta)?;
        let target = self
          .binding(button)
          .ok_or(NavigationError::NotLoaded)?;
        match engine
          .jump_relative_months(button.delta())?
        {
          | Some(pending) => {
            Ok(Dispatch::Load(pending))
          }
          | None => Ok(Dispatch::Joined(target))
        }
      }
      | NavIntent::ClickDay(date) => {
        match engine.select_day(date)? {
          | Selection::Updated(key) => {
            Ok(Dispatch::Selected(key))
          }
          | Selection::Loading(pending) => {
            Ok(Dispatch::Load(pending))
          }
          | Selection::Joined(target) => {
            Ok(Dispatch::Joined(target))
          }
        }
      }
    }
  }

  /// Dispatches `intent` and, when it needs a
  /// month load, drives it to completion.
  pub async fn handle<H: BusinessHandler>(
    &mut self,
    engine: &mut CalendarEngine<H>,
    intent: NavIntent
  ) -> Result<Option<LoadOutcome>, NavigationError>
  {
    let outcome =
      match self.dispatch(engine, intent)? {
        | Dispatch::Load(pending) => {
          Some(engine.drive(pending).await)
        }
        | Dispatch::Selected(_)
        | Dispatch::Joined(_) => None
      };
    self.sync(engine);
    Ok(outcome)
  }
}
