use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::date_cursor::DayKey;

/// One time-spent record on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedTime {
    pub task_time_id: u64,
    pub fk_task: u64,
    pub task_ref: String,
    pub task_label: String,
    pub fk_project: u64,
    pub project_ref: String,
    /// Seconds.
    pub task_duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTask {
    pub id: u64,
    #[serde(rename = "ref")]
    pub reference: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    #[serde(rename = "ref")]
    pub reference: String,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<ProjectTask>,
}

/// Projects grouped by project type.
pub type ProjectCatalog = BTreeMap<String, Vec<Project>>;

/// Everything the month view needs, as served for one month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthData {
    #[serde(default)]
    pub logged_times: BTreeMap<DayKey, Vec<LoggedTime>>,
    #[serde(default)]
    pub projects: ProjectCatalog,
}

/// Day payload handed to the calendar: the day's entries plus the shared
/// project catalog the entry form picks from.
#[derive(Debug, Clone, Default)]
pub struct DayEntries {
    pub entries: Vec<LoggedTime>,
    pub projects: Arc<ProjectCatalog>,
}

impl DayEntries {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_seconds(&self) -> u64 {
        self.entries.iter().map(|entry| entry.task_duration).sum()
    }
}

/// Sum of all entries across `days`, and whether any entry exists.
pub fn sum_entries<'a>(days: impl IntoIterator<Item = &'a DayEntries>) -> (u64, bool) {
    days.into_iter().fold((0, false), |(sum, any), day| {
        (sum + day.total_seconds(), any || !day.is_empty())
    })
}

pub fn find_task(catalog: &ProjectCatalog, fk_task: u64) -> Option<(&Project, &ProjectTask)> {
    catalog
        .values()
        .flatten()
        .find_map(|project| {
            project
                .tasks
                .iter()
                .find(|task| task.id == fk_task)
                .map(|task| (project, task))
        })
}

pub fn find_project(catalog: &ProjectCatalog, fk_project: u64) -> Option<&Project> {
    catalog
        .values()
        .flatten()
        .find(|project| project.id == fk_project)
}
