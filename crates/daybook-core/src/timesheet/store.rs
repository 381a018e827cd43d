use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::date_cursor::{CalendarDate, DayKey, MonthTarget};
use crate::error::DataLoadError;
use crate::timesheet::model::{
    LoggedTime, MonthData, ProjectCatalog, ProjectTask, find_project, find_task,
};

/// JSON-directory backend standing in for the timesheet data service.
///
/// Layout: `months/YYYY-MM.json` holds the logged times of one month,
/// `projects.json` the project catalog shared by every month.
#[derive(Debug, Clone)]
pub struct TimesheetStore {
    pub data_dir: PathBuf,
    pub months_dir: PathBuf,
    pub projects_path: PathBuf,
}

/// Create-or-edit request for one logged time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSpent {
    /// Existing record to replace; `None` creates a new one.
    pub id: Option<u64>,
    pub fk_task: u64,
    pub date: CalendarDate,
    pub duration: u64,
    pub note: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MonthFile {
    /// Set by the service when it refuses to serve the month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default)]
    logged_times: BTreeMap<DayKey, Vec<LoggedTime>>,
}

impl TimesheetStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        let months_dir = data_dir.join("months");
        fs::create_dir_all(&months_dir)
            .with_context(|| format!("failed to create {}", months_dir.display()))?;

        let projects_path = data_dir.join("projects.json");
        if !projects_path.exists() {
            fs::write(&projects_path, "{}")
                .with_context(|| format!("failed to create {}", projects_path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            months = %months_dir.display(),
            projects = %projects_path.display(),
            "opened timesheet store"
        );

        Ok(Self {
            data_dir,
            months_dir,
            projects_path,
        })
    }

    pub fn month_path(&self, target: MonthTarget) -> PathBuf {
        self.months_dir.join(format!("{target}.json"))
    }

    /// Fetches everything needed to display `target`.
    ///
    /// A missing month file is an empty month. An `error` field in the file
    /// is reported as an endpoint failure; I/O and parse failures as
    /// transport failures.
    #[tracing::instrument(skip(self, target), fields(month = %target))]
    pub async fn fetch_month(&self, target: MonthTarget) -> Result<MonthData, DataLoadError> {
        let path = self.month_path(target);
        let mut month = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => parse_month_file(&path, &raw)
                .map_err(|err| DataLoadError::transport(format!("{err:#}")))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(file = %path.display(), "no month file; empty month");
                MonthFile::default()
            }
            Err(err) => {
                return Err(DataLoadError::transport(format!(
                    "failed reading {}: {err}",
                    path.display()
                )));
            }
        };

        if let Some(error) = month.error {
            warn!(file = %path.display(), %error, "month file carries an error payload");
            return Err(DataLoadError::endpoint(error));
        }

        let before = month.logged_times.len();
        month
            .logged_times
            .retain(|key, _| target.contains(key.date()));
        if month.logged_times.len() != before {
            warn!(
                dropped = before - month.logged_times.len(),
                "ignoring days filed under the wrong month"
            );
        }

        let projects = match tokio::fs::read_to_string(&self.projects_path).await {
            Ok(raw) => parse_projects(&self.projects_path, &raw)
                .map_err(|err| DataLoadError::transport(format!("{err:#}")))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => ProjectCatalog::new(),
            Err(err) => {
                return Err(DataLoadError::transport(format!(
                    "failed reading {}: {err}",
                    self.projects_path.display()
                )));
            }
        };

        debug!(
            days = month.logged_times.len(),
            project_types = projects.len(),
            "fetched month"
        );
        Ok(MonthData {
            logged_times: month.logged_times,
            projects,
        })
    }

    #[tracing::instrument(skip(self, date), fields(date = %date))]
    pub fn fetch_day(&self, date: CalendarDate) -> anyhow::Result<Vec<LoggedTime>> {
        let mut month = self.read_month(date.month_target())?;
        if let Some(error) = month.error {
            bail!("{error}");
        }
        Ok(month
            .logged_times
            .remove(&date.day_key())
            .unwrap_or_default())
    }

    /// Creates a logged time, or replaces the one with `entry.id`.
    ///
    /// An edited record may move to any other day, including one in another
    /// month; the new month is written before the old one drops the record.
    #[tracing::instrument(skip(self, entry), fields(id = ?entry.id, task = entry.fk_task, date = %entry.date))]
    pub fn post_time(&self, entry: TimeSpent) -> anyhow::Result<LoggedTime> {
        let catalog = self.load_projects()?;
        let (project, task) = find_task(&catalog, entry.fk_task)
            .ok_or_else(|| anyhow!("unknown task: {}", entry.fk_task))?;

        let target = entry.date.month_target();
        let mut month = self.read_month(target)?;
        if let Some(error) = &month.error {
            bail!("{error}");
        }

        let mut moved_from = None;
        let task_time_id = match entry.id {
            Some(id) => {
                if take_entry(&mut month, id).is_none() {
                    let (source, mut old) = self
                        .stored_months()?
                        .into_iter()
                        .find(|(source, old)| {
                            *source != target && contains_entry(old, id)
                        })
                        .ok_or_else(|| anyhow!("logged time {id} not found"))?;
                    if let Some(error) = &old.error {
                        bail!("{error}");
                    }
                    take_entry(&mut old, id);
                    debug!(from = %source, to = %target, id, "moving logged time");
                    moved_from = Some((source, old));
                }
                id
            }
            None => self.next_id()?,
        };

        let logged = LoggedTime {
            task_time_id,
            fk_task: task.id,
            task_ref: task.reference.clone(),
            task_label: task.label.clone(),
            fk_project: project.id,
            project_ref: project.reference.clone(),
            task_duration: entry.duration,
            note: entry.note.filter(|note| !note.trim().is_empty()),
        };
        month
            .logged_times
            .entry(entry.date.day_key())
            .or_default()
            .push(logged.clone());

        self.write_month(target, &month)?;
        if let Some((source, old)) = moved_from {
            self.write_month(source, &old)?;
        }
        info!(
            id = logged.task_time_id,
            seconds = logged.task_duration,
            "saved logged time"
        );
        Ok(logged)
    }

    #[tracing::instrument(skip(self, date), fields(date = %date))]
    pub fn delete_time(&self, date: CalendarDate, id: u64) -> anyhow::Result<LoggedTime> {
        let target = date.month_target();
        let mut month = self.read_month(target)?;
        if let Some(error) = &month.error {
            bail!("{error}");
        }
        let removed = take_entry(&mut month, id)
            .ok_or_else(|| anyhow!("logged time {id} not found in {target}"))?;
        self.write_month(target, &month)?;
        info!(id, "deleted logged time");
        Ok(removed)
    }

    #[tracing::instrument(skip(self))]
    pub fn project_tasks(&self, fk_project: u64) -> anyhow::Result<Vec<ProjectTask>> {
        let catalog = self.load_projects()?;
        let project = find_project(&catalog, fk_project)
            .ok_or_else(|| anyhow!("unknown project: {fk_project}"))?;
        Ok(project.tasks.clone())
    }

    #[tracing::instrument(skip(self))]
    pub fn load_projects(&self) -> anyhow::Result<ProjectCatalog> {
        match fs::read_to_string(&self.projects_path) {
            Ok(raw) => parse_projects(&self.projects_path, &raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(ProjectCatalog::new()),
            Err(err) => Err(err)
                .with_context(|| format!("failed reading {}", self.projects_path.display())),
        }
    }

    #[tracing::instrument(skip(self, catalog))]
    pub fn save_projects(&self, catalog: &ProjectCatalog) -> anyhow::Result<()> {
        save_json_atomic(&self.projects_path, catalog).context("failed to save projects.json")
    }

    /// Next free logged-time id across every stored month.
    fn next_id(&self) -> anyhow::Result<u64> {
        let max = self
            .stored_months()?
            .iter()
            .flat_map(|(_, month)| month.logged_times.values().flatten())
            .map(|logged| logged.task_time_id)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    /// Every `months/YYYY-MM.json` file, parsed.
    fn stored_months(&self) -> anyhow::Result<Vec<(MonthTarget, MonthFile)>> {
        let mut months = Vec::new();
        let entries = fs::read_dir(&self.months_dir)
            .with_context(|| format!("failed listing {}", self.months_dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(target) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<MonthTarget>().ok())
            else {
                warn!(file = %path.display(), "skipping file not named YYYY-MM.json");
                continue;
            };
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed reading {}", path.display()))?;
            months.push((target, parse_month_file(&path, &raw)?));
        }
        Ok(months)
    }

    fn read_month(&self, target: MonthTarget) -> anyhow::Result<MonthFile> {
        let path = self.month_path(target);
        match fs::read_to_string(&path) {
            Ok(raw) => parse_month_file(&path, &raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(MonthFile::default()),
            Err(err) => Err(err).with_context(|| format!("failed reading {}", path.display())),
        }
    }

    fn write_month(&self, target: MonthTarget, month: &MonthFile) -> anyhow::Result<()> {
        let path = self.month_path(target);
        save_json_atomic(&path, month)
            .with_context(|| format!("failed to save {}", path.display()))
    }
}

/// Removes the record `id` from whichever day of `month` holds it.
fn take_entry(month: &mut MonthFile, id: u64) -> Option<LoggedTime> {
    let mut found = None;
    for entries in month.logged_times.values_mut() {
        if let Some(idx) = entries.iter().position(|logged| logged.task_time_id == id) {
            found = Some(entries.remove(idx));
            break;
        }
    }
    month.logged_times.retain(|_, entries| !entries.is_empty());
    found
}

fn contains_entry(month: &MonthFile, id: u64) -> bool {
    month
        .logged_times
        .values()
        .flatten()
        .any(|logged| logged.task_time_id == id)
}

fn parse_month_file(path: &Path, raw: &str) -> anyhow::Result<MonthFile> {
    if raw.trim().is_empty() {
        return Ok(MonthFile::default());
    }
    serde_json::from_str(raw).with_context(|| format!("failed parsing {}", path.display()))
}

fn parse_projects(path: &Path, raw: &str) -> anyhow::Result<ProjectCatalog> {
    if raw.trim().is_empty() {
        return Ok(ProjectCatalog::new());
    }
    serde_json::from_str(raw).with_context(|| format!("failed parsing {}", path.display()))
}

#[tracing::instrument(skip(path, value))]
fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving json atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, value)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timesheet::model::Project;

    fn catalog() -> ProjectCatalog {
        let mut catalog = ProjectCatalog::new();
        catalog.insert(
            "Client".to_string(),
            vec![Project {
                id: 1,
                reference: "PJ01".to_string(),
                title: "Website".to_string(),
                tasks: vec![
                    ProjectTask {
                        id: 10,
                        reference: "T010".to_string(),
                        label: "Design".to_string(),
                    },
                    ProjectTask {
                        id: 11,
                        reference: "T011".to_string(),
                        label: "Build".to_string(),
                    },
                ],
            }],
        );
        catalog
    }

    fn store() -> (tempfile::TempDir, TimesheetStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = TimesheetStore::open(temp.path()).expect("open store");
        store.save_projects(&catalog()).expect("seed projects");
        (temp, store)
    }

    fn date(year: i32, month: i32, day: u32) -> CalendarDate {
        CalendarDate::new(year, month, day).expect("valid date")
    }

    fn spent(fk_task: u64, day: CalendarDate, duration: u64) -> TimeSpent {
        TimeSpent {
            id: None,
            fk_task,
            date: day,
            duration,
            note: None,
        }
    }

    #[test]
    fn post_assigns_ids_across_months() {
        let (_temp, store) = store();
        let first = store
            .post_time(spent(10, date(2023, 0, 3), 3600))
            .expect("post jan");
        let second = store
            .post_time(spent(11, date(2023, 1, 7), 1800))
            .expect("post feb");
        assert_eq!(first.task_time_id, 1);
        assert_eq!(second.task_time_id, 2);
        assert_eq!(second.task_ref, "T011");
        assert_eq!(second.project_ref, "PJ01");

        let day = store.fetch_day(date(2023, 1, 7)).expect("fetch day");
        assert_eq!(day, vec![second]);
        assert!(store.month_path(MonthTarget::new(2023, 0)).exists());
    }

    #[test]
    fn edit_replaces_and_can_move_within_month() {
        let (_temp, store) = store();
        let created = store
            .post_time(spent(10, date(2023, 0, 3), 3600))
            .expect("post");
        let edited = store
            .post_time(TimeSpent {
                id: Some(created.task_time_id),
                note: Some("moved".to_string()),
                ..spent(10, date(2023, 0, 4), 5400)
            })
            .expect("edit");
        assert_eq!(edited.task_time_id, created.task_time_id);
        assert!(store.fetch_day(date(2023, 0, 3)).expect("old day").is_empty());
        let moved = store.fetch_day(date(2023, 0, 4)).expect("new day");
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].task_duration, 5400);
        assert_eq!(moved[0].note.as_deref(), Some("moved"));
    }

    #[test]
    fn edit_can_move_record_to_another_month() {
        let (_temp, store) = store();
        let created = store
            .post_time(spent(10, date(2023, 0, 31), 3600))
            .expect("post");
        store
            .post_time(spent(11, date(2023, 0, 5), 600))
            .expect("post other");

        let edited = store
            .post_time(TimeSpent {
                id: Some(created.task_time_id),
                ..spent(11, date(2023, 1, 1), 1800)
            })
            .expect("edit across months");
        assert_eq!(edited.task_time_id, created.task_time_id);
        assert_eq!(edited.task_ref, "T011");

        assert!(store.fetch_day(date(2023, 0, 31)).expect("old day").is_empty());
        assert_eq!(store.fetch_day(date(2023, 0, 5)).expect("kept").len(), 1);
        assert_eq!(
            store.fetch_day(date(2023, 1, 1)).expect("new day"),
            vec![edited]
        );
        assert_eq!(
            store
                .post_time(spent(10, date(2023, 2, 1), 60))
                .expect("post")
                .task_time_id,
            3
        );
    }

    #[test]
    fn unknown_task_and_missing_ids_are_errors() {
        let (_temp, store) = store();
        assert!(store.post_time(spent(99, date(2023, 0, 3), 60)).is_err());
        assert!(store.delete_time(date(2023, 0, 3), 5).is_err());
        let edit_missing = TimeSpent {
            id: Some(42),
            ..spent(10, date(2023, 0, 3), 60)
        };
        assert!(store.post_time(edit_missing).is_err());
    }

    #[test]
    fn delete_removes_record_and_empty_day() {
        let (_temp, store) = store();
        let created = store
            .post_time(spent(10, date(2023, 0, 3), 3600))
            .expect("post");
        let removed = store
            .delete_time(date(2023, 0, 3), created.task_time_id)
            .expect("delete");
        assert_eq!(removed, created);
        let raw = fs::read_to_string(store.month_path(MonthTarget::new(2023, 0)))
            .expect("read month file");
        assert!(!raw.contains("2023-01-03"));
    }

    #[test]
    fn project_tasks_lists_catalog_entries() {
        let (_temp, store) = store();
        let tasks = store.project_tasks(1).expect("tasks");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].reference, "T010");
        assert!(store.project_tasks(2).is_err());
    }

    #[tokio::test]
    async fn fetch_month_reads_entries_and_projects() {
        let (_temp, store) = store();
        store
            .post_time(spent(10, date(2023, 0, 3), 3600))
            .expect("post");
        let data = store
            .fetch_month(MonthTarget::new(2023, 0))
            .await
            .expect("fetch");
        assert_eq!(data.logged_times.len(), 1);
        assert_eq!(data.projects["Client"][0].title, "Website");

        let empty = store
            .fetch_month(MonthTarget::new(2023, 5))
            .await
            .expect("fetch empty");
        assert!(empty.logged_times.is_empty());
    }

    #[tokio::test]
    async fn error_payload_is_an_endpoint_failure() {
        let (_temp, store) = store();
        fs::write(
            store.month_path(MonthTarget::new(2023, 2)),
            r#"{"error": "access denied"}"#,
        )
        .expect("write month");
        let err = store
            .fetch_month(MonthTarget::new(2023, 2))
            .await
            .expect_err("endpoint error");
        assert_eq!(err, DataLoadError::endpoint("access denied"));
    }

    #[tokio::test]
    async fn malformed_month_is_a_transport_failure() {
        let (_temp, store) = store();
        fs::write(store.month_path(MonthTarget::new(2023, 3)), "{not json")
            .expect("write month");
        let err = store
            .fetch_month(MonthTarget::new(2023, 3))
            .await
            .expect_err("transport error");
        assert!(matches!(err, DataLoadError::Transport(_)));
        assert_eq!(err.notice_key(), "TransportError");
    }
}
