pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod layout;
pub mod period;
pub mod reconcile;
pub mod recurring;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use error::{
  ErrorKind,
  PeriodError
};
pub use layout::Timestamp;
pub use period::TimePeriod;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting period CLI"
  );

  let cfg = config::Config::load(
    cli.config.as_deref()
  )
  .context(
    "failed to load period config"
  )?;
  debug!(loaded_from = ?cfg.loaded_from, "resolved config");

  clock::install_from_config(&cfg);

  let as_json =
    cli.json || cfg.output.json;
  let outcome =
    cli::dispatch(&cfg, cli.command)?;
  println!(
    "{}",
    outcome.render(as_json)?
  );

  info!("done");
  Ok(())
}
