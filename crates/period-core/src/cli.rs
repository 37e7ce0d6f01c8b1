use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::layout::{self, EpochUnit};
use crate::period::{Granularity, TimePeriod};
use crate::reconcile::{self, MonthSpan};
use crate::recurring;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "period",
    version,
    about = "Normalize loose dates and reconcile periods against calendar months"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Emit JSON instead of one value per line.
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum UnitArg {
    Seconds,
    Millis,
}

impl From<UnitArg> for EpochUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Seconds => EpochUnit::Seconds,
            UnitArg::Millis => EpochUnit::Millis,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum GranularityArg {
    Monthly,
    Daily,
}

impl From<GranularityArg> for Granularity {
    fn from(g: GranularityArg) -> Self {
        match g {
            GranularityArg::Monthly => Granularity::Monthly,
            GranularityArg::Daily => Granularity::Daily,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Parse any supported layout and report which one matched.
    Parse { raw: String },
    /// Canonical `YYYY-MM` of any supported layout.
    Month { raw: String },
    /// Canonical `YYYY-MM-DD` of any supported layout.
    Day { raw: String },
    /// Read a bare integer as an epoch timestamp.
    Epoch {
        #[arg(allow_hyphen_values = true)]
        value: String,
        #[arg(long)]
        millis: bool,
    },
    /// Normalise a vendor timestamp to RFC3339 with nanoseconds.
    Convert {
        #[arg(allow_hyphen_values = true)]
        raw: String,
        #[arg(long, value_enum, default_value_t = UnitArg::Seconds)]
        unit: UnitArg,
        /// Emit `YYYY-MM-DD HH:MM:SS` instead.
        #[arg(long)]
        prophet: bool,
    },
    /// Clip `[start, end]` to a calendar month.
    Reconcile { month: String, start: String, end: String },
    /// Whole days between the endpoints of `[start, end]` clipped to a month.
    OverlapDays { month: String, start: String, end: String },
    /// Same day of month, going back N months from an anchor.
    Project {
        anchor: String,
        #[arg(
            long,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(recurring::MAX_PROJECTION_MONTHS))
        )]
        months: Option<u32>,
        /// Keep only the month exactly N months back.
        #[arg(long)]
        only_target: bool,
    },
    /// Check a `[start, end]` period of canonical days.
    Validate { start: String, end: String },
    /// Every month or day between start and end.
    List {
        start: String,
        end: String,
        #[arg(long, value_enum, default_value_t = GranularityArg::Daily)]
        granularity: GranularityArg,
        /// Months as `YYYYMM`.
        #[arg(long)]
        compact: bool,
    },
    /// First day, last day and length of a month.
    MonthSpan { month: String },
    /// Move a period's start to the 1st of the previous month.
    PreviousMonth { start: String, end: String },
}

/// Result of one command, renderable as text or JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub lines: Vec<String>,
    pub json: serde_json::Value,
}

impl Outcome {
    fn single(value: String) -> Self {
        Self {
            json: json!(value),
            lines: vec![value],
        }
    }

    fn list(values: Vec<String>) -> Self {
        Self {
            json: json!(values),
            lines: values,
        }
    }

    pub fn render(&self, as_json: bool) -> anyhow::Result<String> {
        if as_json {
            return serde_json::to_string_pretty(&self.json).context("failed to encode output as JSON");
        }
        Ok(self.lines.join("\n"))
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[tracing::instrument(skip(cfg))]
pub fn dispatch(cfg: &Config, command: Command) -> anyhow::Result<Outcome> {
    let outcome = match command {
        Command::Parse { raw } => {
            let (ts, matched) = layout::parse_with_layout(&raw)?;
            let rfc3339 = layout::format_rfc3339_nano(ts);
            Outcome {
                json: json!({
                    "layout": matched.name,
                    "timestamp": rfc3339,
                    "month": layout::to_month_string(ts),
                    "day": layout::to_day_string(ts),
                }),
                lines: vec![rfc3339, matched.name.to_string()],
            }
        }
        Command::Month { raw } => Outcome::single(layout::string_to_month_layout(&raw)?),
        Command::Day { raw } => Outcome::single(layout::string_to_day_layout(&raw)?),
        Command::Epoch { value, millis } => {
            let unit = if millis { EpochUnit::Millis } else { EpochUnit::Seconds };
            let ts = layout::parse_epoch(&value, unit)?;
            Outcome::single(layout::format_rfc3339_nano(ts))
        }
        Command::Convert { raw, unit, prophet } => {
            let converted = if prophet {
                layout::to_prophet_format(&raw)?
            } else {
                layout::to_rfc3339_nano(&raw, unit.into())?
            };
            Outcome::single(converted)
        }
        Command::Reconcile { month, start, end } => {
            let (lo, hi) = reconcile::reconcile(&month, &start, &end)?;
            Outcome {
                json: json!({ "start": lo, "end": hi }),
                lines: vec![lo, hi],
            }
        }
        Command::OverlapDays { month, start, end } => {
            let span = MonthSpan::of(&month)?;
            let days = reconcile::overlap_days(&span, layout::parse(&start)?, layout::parse(&end)?)?;
            Outcome {
                json: json!(days),
                lines: vec![days.to_string()],
            }
        }
        Command::Project {
            anchor,
            months,
            only_target,
        } => {
            let months = months.unwrap_or(cfg.projection.months);
            let dates: Vec<String> = if only_target {
                recurring::project_for_month(&anchor, months)
            } else {
                recurring::project_backward(&anchor, months).into_iter().collect()
            };
            Outcome::list(dates)
        }
        Command::Validate { start, end } => {
            let period = TimePeriod::new(start, end);
            period.validate()?;
            Outcome {
                json: json!({ "valid": true, "period": period }),
                lines: vec![format!("{period} ok")],
            }
        }
        Command::List {
            start,
            end,
            granularity,
            compact,
        } => {
            let period = TimePeriod::new(start, end);
            let values = match (Granularity::from(granularity), compact) {
                (Granularity::Monthly, true) => period.to_month_list_compact()?,
                (g, _) => period.to_list(g)?,
            };
            Outcome::list(values)
        }
        Command::MonthSpan { month } => {
            let period = TimePeriod::month_to_daily(&month)?;
            let days = layout::days_in_month(&month)?;
            Outcome {
                json: json!({ "first": period.start, "last": period.end, "days": days }),
                lines: vec![period.start.clone(), period.end.clone(), days.to_string()],
            }
        }
        Command::PreviousMonth { start, end } => {
            let mut period = TimePeriod::new(start, end);
            period.one_month_before()?;
            Outcome {
                json: json!(period),
                lines: vec![period.to_string()],
            }
        }
    };

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_cmd(args: &[&str]) -> anyhow::Result<Outcome> {
        let mut argv = vec!["period"];
        argv.extend_from_slice(args);
        let cli = GlobalCli::try_parse_from(argv).expect("valid arguments");
        dispatch(&Config::default(), cli.command)
    }

    #[test]
    fn parse_reports_layout() {
        let out = run_cmd(&["parse", "2022-05-01 10:00:00"]).expect("parse");
        assert_eq!(out.lines, vec!["2022-05-01T10:00:00Z", "prophet"]);
        assert_eq!(out.json["day"], "2022-05-01");
    }

    #[test]
    fn reconcile_prints_two_days() {
        let out = run_cmd(&["reconcile", "2022-05", "2022-04-20", "2022-05-10"]).expect("reconcile");
        assert_eq!(out.render(false).expect("text"), "2022-05-01\n2022-05-10");
        assert_eq!(out.json, json!({ "start": "2022-05-01", "end": "2022-05-10" }));
    }

    #[test]
    fn project_uses_config_default_months() {
        let out = run_cmd(&["project", "2022-03-31"]).expect("project");
        assert_eq!(out.lines, vec!["2022-02-28"]);

        let out = run_cmd(&["project", "2022-05-31", "--months", "3", "--only-target"]).expect("project");
        assert_eq!(out.lines, vec!["2022-02-28"]);
    }

    #[test]
    fn list_monthly_compact() {
        let out = run_cmd(&[
            "list",
            "2021-12-05",
            "2022-01-02",
            "--granularity",
            "monthly",
            "--compact",
        ])
        .expect("list");
        assert_eq!(out.lines, vec!["202112", "202201"]);
    }

    #[test]
    fn convert_defaults_to_seconds() {
        let out = run_cmd(&["convert", "1650000000"]).expect("convert");
        assert_eq!(out.lines, vec!["2022-04-15T05:20:00Z"]);
        let out = run_cmd(&["convert", "1650000000000", "--prophet"]).expect("convert");
        assert_eq!(out.lines, vec!["2022-04-15 05:20:00"]);
    }

    #[test]
    fn convert_accepts_negative_epoch() {
        let out = run_cmd(&["convert", "-1"]).expect("convert");
        assert_eq!(out.lines, vec!["1969-12-31T23:59:59Z"]);
        let out = run_cmd(&["epoch", "-1"]).expect("epoch");
        assert_eq!(out.lines, vec!["1969-12-31T23:59:59Z"]);
    }

    #[test]
    fn project_rejects_out_of_range_months() {
        let too_many = (recurring::MAX_PROJECTION_MONTHS + 1).to_string();
        assert!(GlobalCli::try_parse_from(["period", "project", "2022-03-15", "--months", &too_many]).is_err());
        assert!(GlobalCli::try_parse_from(["period", "project", "2022-03-15", "--months", "0"]).is_err());
    }

    #[test]
    fn month_span_reports_length() {
        let out = run_cmd(&["month-span", "2024-02"]).expect("span");
        assert_eq!(out.lines, vec!["2024-02-01", "2024-02-29", "29"]);
    }

    #[test]
    fn previous_month_shifts_start() {
        let out = run_cmd(&["previous-month", "2022-01-15", "2022-02-01"]).expect("shift");
        assert_eq!(out.lines, vec!["2021-12-01->2022-02-01"]);
    }

    #[test]
    fn validate_surfaces_range_error() {
        let err = run_cmd(&["validate", "2022-02-01", "2022-01-01"]).expect_err("inverted");
        assert!(err.to_string().contains("startTime is not before endTime"));
    }

    #[test]
    fn json_render_is_pretty() {
        let out = run_cmd(&["list", "2022-01-31", "2022-02-01"]).expect("list");
        assert_eq!(
            out.render(true).expect("json"),
            "[\n  \"2022-01-31\",\n  \"2022-02-01\"\n]"
        );
    }
}
