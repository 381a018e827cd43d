pub mod cli;
pub mod commands;
pub mod config;
pub mod date_cursor;
pub mod engine;
pub mod error;
pub mod grid;
pub mod handler;
pub mod i18n;
pub mod navigation;
pub mod notify;
pub mod render;
pub mod selection;
pub mod timesheet;
pub mod view;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use date_cursor::{
  CalendarDate,
  DateCursor,
  DayKey,
  FirstWeekday,
  MonthTarget
};
pub use engine::{
  CalendarEngine,
  CalendarOptions,
  LoadOutcome
};
pub use error::{
  DataLoadError,
  NavigationError
};
pub use handler::BusinessHandler;
pub use navigation::{
  NavButton,
  NavIntent,
  NavigationController
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting daybook"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  )?;

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    timesheet::TimesheetStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open timesheet store \
         at {}",
        data_dir.display()
      )
    })?;

  let renderer =
    render::Renderer::new(&cfg);
  let command = cli.command.unwrap_or(
    cli::Command::Month { month: None }
  );

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;
  let mut out = io::stdout().lock();
  runtime.block_on(commands::dispatch(
    &cfg, store, &renderer, command,
    &mut out
  ))?;

  info!("done");
  Ok(())
}
