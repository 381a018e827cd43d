use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::Arc;

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::date_cursor::{
  DateCursor,
  FirstWeekday,
  MonthTarget
};
use crate::engine::CalendarOptions;
use crate::i18n::Translations;

const CONFIG_ENV_VAR: &str =
  "DAYBOOK_CONFIG";
const TIMEZONE_ENV_VAR: &str =
  "DAYBOOK_TIMEZONE";
const CONFIG_FILE_NAME: &str =
  ".daybook.toml";
const DEFAULT_DATA_DIR: &str = ".daybook";

/// Settings read from `~/.daybook.toml`.
///
/// ```toml
/// first_weekday = 1
/// timezone = "Europe/Paris"
/// initial_month = "2023-01"
/// color = true
///
/// [data]
/// location = "~/.daybook"
///
/// [translations]
/// TOTAL = "Total"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// 0 = Sunday .. 6 = Saturday.
  pub first_weekday: i64,
  pub timezone:      Option<String>,
  pub initial_month: Option<String>,
  pub color:         bool,
  pub data:          DataSection,
  pub translations:  HashMap<String, String>,
  #[serde(skip)]
  pub loaded_files:  Vec<PathBuf>
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataSection {
  pub location: Option<String>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      first_weekday: 1,
      timezone:      None,
      initial_month: None,
      color:         true,
      data:          DataSection::default(),
      translations:  HashMap::new(),
      loaded_files:  vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let path = resolve_config_path(
      config_override,
      std::env::var(CONFIG_ENV_VAR).ok()
    )?;

    let mut cfg = if let Some(path) = path
    {
      info!(config = %path.display(), "loading config");
      Self::load_file(&path)?
    } else {
      warn!(
        "no config file found; using \
         defaults"
      );
      Self::default()
    };

    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && !raw.trim().is_empty()
    {
      debug!(timezone = %raw.trim(), "timezone from environment");
      cfg.timezone =
        Some(raw.trim().to_string());
    }

    Ok(cfg)
  }

  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    toml::from_str(text)
      .context("invalid config")
  }

  #[tracing::instrument]
  fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    let mut cfg =
      Self::from_toml_str(&text)
        .with_context(|| {
          format!(
            "failed to parse {}",
            path.display()
          )
        })?;
    cfg.loaded_files.push(path);
    Ok(cfg)
  }

  /// Applies `key=value` pairs from the
  /// command line. Keys may carry an `rc.`
  /// prefix.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      let value = v.trim().to_string();
      debug!(key = %key, value = %value, "applying override");
      match key.as_str() {
        | "first_weekday" => {
          self.first_weekday =
            value.parse().with_context(|| {
              format!(
                "first_weekday must be a \
                 number, got '{value}'"
              )
            })?;
        }
        | "timezone" => {
          self.timezone = Some(value);
        }
        | "initial_month" => {
          self.initial_month = Some(value);
        }
        | "color" => {
          self.color = parse_bool(&value);
        }
        | "data.location" => {
          self.data.location = Some(value);
        }
        | other => {
          if let Some(trans_key) =
            other.strip_prefix("translations.")
          {
            self.translations.insert(
              trans_key.to_string(),
              value
            );
          } else {
            warn!(key = %other, "ignoring unknown config override");
          }
        }
      }
    }
    Ok(())
  }

  pub fn first_weekday(
    &self
  ) -> anyhow::Result<FirstWeekday> {
    FirstWeekday::new(self.first_weekday)
      .context("invalid first_weekday")
  }

  pub fn timezone(
    &self
  ) -> anyhow::Result<Tz> {
    let Some(raw) = self.timezone.as_deref()
    else {
      return Ok(chrono_tz::UTC);
    };
    raw.trim().parse::<Tz>().map_err(|err| {
      anyhow!(
        "invalid timezone '{}': {err}",
        raw.trim()
      )
    })
  }

  pub fn cursor(
    &self
  ) -> anyhow::Result<DateCursor> {
    Ok(DateCursor::new(self.timezone()?))
  }

  /// Configured initial month, else the
  /// month of today in the configured zone.
  pub fn initial_target(
    &self,
    cursor: &DateCursor
  ) -> anyhow::Result<MonthTarget> {
    match self.initial_month.as_deref() {
      | Some(raw) => {
        raw.parse().context(
          "invalid initial_month"
        )
      }
      | None => {
        Ok(cursor.today().month_target())
      }
    }
  }

  #[must_use]
  pub fn translations(
    &self
  ) -> Translations {
    Translations::new(
      self.translations.clone()
    )
  }

  pub fn calendar_options(
    &self
  ) -> anyhow::Result<CalendarOptions> {
    let cursor = self.cursor()?;
    Ok(CalendarOptions {
      first_weekday: self.first_weekday()?,
      initial:       self
        .initial_target(&cursor)?,
      timezone:      cursor.timezone(),
      translations:  Arc::new(
        self.translations()
      )
    })
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    expand_tilde(path)
  } else if let Some(cfg_value) =
    cfg.data.location.as_deref()
  {
    expand_tilde(Path::new(cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

/// `--config` wins, then `DAYBOOK_CONFIG`
/// (`/dev/null` disables config files), then
/// `~/.daybook.toml` if it exists.
fn resolve_config_path(
  override_path: Option<&Path>,
  env_value: Option<String>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Some(env_value) = env_value {
    if env_value == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      env_value
    )));
  }

  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  let candidate =
    home.join(CONFIG_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(DEFAULT_DATA_DIR))
}

pub fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

pub fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
