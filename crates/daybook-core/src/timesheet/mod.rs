//! Logged-time business handler and its
//! JSON-directory backend.

pub mod duration;
pub mod handler;
pub mod model;
pub mod store;

pub use duration::{
  format_duration,
  parse_duration
};
pub use handler::TimesheetHandler;
pub use model::{
  DayEntries,
  LoggedTime,
  MonthData,
  Project,
  ProjectCatalog,
  ProjectTask
};
pub use store::{
  TimeSpent,
  TimesheetStore
};
