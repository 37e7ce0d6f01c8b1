//! Reference wall clock. "Today" and "the
//! current month" are read in a fixed
//! UTC offset resolved once per process.

use std::sync::OnceLock;

use chrono::{
  DateTime,
  FixedOffset,
  NaiveDate,
  Offset,
  Utc
};
use regex::Regex;

use crate::config::{
  self,
  Config
};

pub const OFFSET_ENV_VAR: &str =
  "PERIOD_UTC_OFFSET";

static REFERENCE_OFFSET: OnceLock<
  FixedOffset
> = OnceLock::new();

pub fn reference_offset()
-> &'static FixedOffset {
  REFERENCE_OFFSET
    .get_or_init(resolve_reference_offset)
}

/// Pins the reference offset before
/// anything reads it. Returns `false`
/// when an offset was already resolved.
pub fn install_reference_offset(
  offset: FixedOffset
) -> bool {
  let installed =
    REFERENCE_OFFSET.set(offset).is_ok();
  if !installed {
    tracing::debug!(
      requested = %offset,
      active = %reference_offset(),
      "reference offset already resolved"
    );
  }
  installed
}

/// Installs the offset named in `cfg`
/// unless the environment already sets
/// one.
pub fn install_from_config(cfg: &Config) {
  if std::env::var_os(OFFSET_ENV_VAR)
    .is_some()
  {
    tracing::debug!(
      "{OFFSET_ENV_VAR} set; ignoring \
       config utc_offset"
    );
    return;
  }

  if let Some(offset) =
    offset_for_config(cfg)
  {
    install_reference_offset(offset);
  }
}

/// The offset `cfg` names. An invalid
/// value is logged and read as UTC.
pub fn offset_for_config(
  cfg: &Config
) -> Option<FixedOffset> {
  match cfg.reference_offset() {
    | Ok(offset) => offset,
    | Err(err) => {
      tracing::error!(
        file = ?cfg.loaded_from,
        offset = ?cfg.utc_offset_raw(),
        error = %err,
        "invalid utc offset in config; \
         falling back to UTC"
      );
      Some(Utc.fix())
    }
  }
}

#[must_use]
pub fn now() -> DateTime<Utc> {
  Utc::now()
}

#[must_use]
pub fn today() -> NaiveDate {
  to_reference_date(now())
}

#[must_use]
pub fn to_reference_date(
  dt: DateTime<Utc>
) -> NaiveDate {
  dt.with_timezone(reference_offset())
    .date_naive()
}

fn resolve_reference_offset()
-> FixedOffset {
  if let Ok(raw) =
    std::env::var(OFFSET_ENV_VAR)
  {
    if let Some(offset) =
      parse_offset_source(&raw, OFFSET_ENV_VAR)
    {
      return offset;
    }
  }

  if let Some(offset) =
    load_offset_from_config()
  {
    return offset;
  }

  Utc.fix()
}

fn load_offset_from_config()
-> Option<FixedOffset> {
  let path =
    match config::discover_config_path()
    {
      | Ok(Some(path)) => path,
      | Ok(None) => return None,
      | Err(err) => {
        tracing::error!(
          error = %err,
          "failed locating period config"
        );
        return None;
      }
    };

  let cfg = match Config::from_file(&path)
  {
    | Ok(cfg) => cfg,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed loading period config"
      );
      return None;
    }
  };

  let Some(raw) = cfg.utc_offset_raw()
  else {
    tracing::debug!(
      file = %path.display(),
      "config had no utc_offset field"
    );
    return None;
  };

  parse_offset_source(
    raw,
    &format!("file:{}", path.display())
  )
}

fn parse_offset_source(
  raw: &str,
  source: &str
) -> Option<FixedOffset> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "utc offset source was empty"
    );
    return None;
  }

  match parse_utc_offset(trimmed) {
    | Some(offset) => {
      tracing::info!(
        source,
        offset = %offset,
        "configured reference offset"
      );
      Some(offset)
    }
    | None => {
      tracing::error!(
        source,
        offset = %trimmed,
        "failed to parse utc offset"
      );
      None
    }
  }
}

/// Accepts `Z`, `UTC`, `GMT`, `+8`,
/// `+08`, `+0800` and `+08:00`.
pub fn parse_utc_offset(
  raw: &str
) -> Option<FixedOffset> {
  let token = raw.trim();
  if matches!(
    token.to_ascii_uppercase().as_str(),
    "Z" | "UTC" | "GMT"
  ) {
    return Some(Utc.fix());
  }

  let offset_re = Regex::new(
    r"^(?P<sign>[+-])(?P<hours>\d{1,2})(?::?(?P<minutes>\d{2}))?$",
  )
  .ok()?;
  let caps = offset_re.captures(token)?;

  let hours: i32 =
    caps.name("hours")?.as_str().parse().ok()?;
  let minutes: i32 = match caps
    .name("minutes")
  {
    | Some(m) => m.as_str().parse().ok()?,
    | None => 0
  };
  if hours > 23 || minutes > 59 {
    return None;
  }

  let seconds = hours * 3600 + minutes * 60;
  match caps.name("sign")?.as_str() {
    | "-" => FixedOffset::west_opt(seconds),
    | _ => FixedOffset::east_opt(seconds)
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use chrono::{
    TimeZone,
    Utc
  };
  use tempfile::NamedTempFile;

  use super::{
    offset_for_config,
    parse_utc_offset
  };
  use crate::config::Config;

  #[test]
  fn parses_offset_spellings() {
    let cases = [
      ("Z", 0),
      ("utc", 0),
      ("+8", 8 * 3600),
      ("+08", 8 * 3600),
      ("+0530", 5 * 3600 + 30 * 60),
      ("-05:00", -5 * 3600),
    ];
    for (raw, secs) in cases {
      let offset = parse_utc_offset(raw).expect(raw);
      assert_eq!(offset.local_minus_utc(), secs, "{raw}");
    }
  }

  #[test]
  fn rejects_zone_names_and_garbage() {
    for raw in ["America/Mexico_City", "+25:00", "+08:75", "", "8"] {
      assert!(parse_utc_offset(raw).is_none(), "{raw}");
    }
  }

  #[test]
  fn bad_config_offset_falls_back_to_utc() {
    let mut file =
      NamedTempFile::new().expect("tempfile");
    writeln!(file, "utc_offset = \"Mars/Olympus\"")
      .expect("write");
    let cfg = Config::load(Some(file.path()))
      .expect("config still loads");

    let offset =
      offset_for_config(&cfg).expect("fallback");
    assert_eq!(offset.local_minus_utc(), 0);
  }

  #[test]
  fn config_without_offset_installs_nothing() {
    let cfg =
      Config::from_toml_str("").expect("config");
    assert!(offset_for_config(&cfg).is_none());

    let cfg = Config::from_toml_str(
      "[clock]\nutc_offset = \"-05:00\"\n"
    )
    .expect("config");
    assert_eq!(
      offset_for_config(&cfg)
        .map(|o| o.local_minus_utc()),
      Some(-5 * 3600)
    );
  }

  #[test]
  fn reference_date_follows_offset() {
    let late = Utc
      .with_ymd_and_hms(2026, 2, 28, 20, 0, 0)
      .single()
      .expect("valid instant");
    let plus_eight = parse_utc_offset("+08:00").expect("offset");
    assert_eq!(
      late.with_timezone(&plus_eight).date_naive().to_string(),
      "2026-03-01"
    );
  }
}
