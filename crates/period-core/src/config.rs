use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::FixedOffset;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info
};

use crate::clock;
use crate::recurring::MAX_PROJECTION_MONTHS;

pub const CONFIG_FILE: &str =
  "period.toml";
pub const CONFIG_ENV_VAR: &str =
  "PERIOD_CONFIG";

#[derive(
  Debug, Clone, Default, Serialize, Deserialize,
)]
#[serde(default)]
pub struct Config {
  /// Shorthand for
  /// `[clock] utc_offset`.
  pub utc_offset: Option<String>,
  pub clock:      ClockSection,
  pub projection: ProjectionSection,
  pub output:     OutputSection,

  #[serde(skip)]
  pub loaded_from: Option<PathBuf>
}

#[derive(
  Debug, Clone, Default, Serialize, Deserialize,
)]
#[serde(default)]
pub struct ClockSection {
  pub utc_offset: Option<String>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(default)]
pub struct ProjectionSection {
  pub months: u32
}

impl Default for ProjectionSection {
  fn default() -> Self {
    Self {
      months: 1
    }
  }
}

#[derive(
  Debug, Clone, Default, Serialize, Deserialize,
)]
#[serde(default)]
pub struct OutputSection {
  pub json: bool
}

impl Config {
  /// Loads `override_path` when given,
  /// otherwise the first config file
  /// found by [`discover_config_path`].
  /// No file at all means defaults.
  #[tracing::instrument(skip(
    override_path
  ))]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    if let Some(path) = override_path {
      return Self::from_file(path);
    }

    match discover_config_path()? {
      | Some(path) => Self::from_file(&path),
      | None => {
        info!(
          "no period config found; \
           using defaults"
        );
        Ok(Self::default())
      }
    }
  }

  pub fn from_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let raw = fs::read_to_string(path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;

    let mut cfg = Self::from_toml_str(
      &raw
    )
    .with_context(|| {
      format!(
        "failed to parse {}",
        path.display()
      )
    })?;
    info!(file = %path.display(), "loaded period config");
    cfg.loaded_from =
      Some(path.to_path_buf());
    Ok(cfg)
  }

  pub fn from_toml_str(
    raw: &str
  ) -> anyhow::Result<Self> {
    let cfg: Self = toml::from_str(raw)?;
    if cfg.projection.months == 0
      || cfg.projection.months
        > MAX_PROJECTION_MONTHS
    {
      return Err(anyhow!(
        "projection.months must be \
         between 1 and \
         {MAX_PROJECTION_MONTHS}"
      ));
    }
    Ok(cfg)
  }

  /// The top-level key wins over the
  /// `[clock]` section.
  pub fn utc_offset_raw(
    &self
  ) -> Option<&str> {
    self
      .utc_offset
      .as_deref()
      .or(self.clock.utc_offset.as_deref())
  }

  pub fn reference_offset(
    &self
  ) -> anyhow::Result<Option<FixedOffset>>
  {
    let Some(raw) = self.utc_offset_raw()
    else {
      return Ok(None);
    };

    clock::parse_utc_offset(raw)
      .map(Some)
      .ok_or_else(|| {
        anyhow!(
          "invalid utc_offset in \
           config: {raw}"
        )
      })
  }
}

/// `PERIOD_CONFIG`, then `period.toml`
/// in the working directory, then the
/// user config directory.
pub fn discover_config_path()
-> anyhow::Result<Option<PathBuf>> {
  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      let path = PathBuf::from(trimmed);
      if !path.exists() {
        return Err(anyhow!(
          "{CONFIG_ENV_VAR} points to \
           missing file {}",
          path.display()
        ));
      }
      return Ok(Some(path));
    }
  }

  let mut candidates = Vec::new();
  if let Ok(dir) = std::env::current_dir()
  {
    candidates.push(dir.join(CONFIG_FILE));
  }
  if let Some(dir) = dirs::config_dir() {
    candidates.push(
      dir.join("period").join(CONFIG_FILE)
    );
  }

  for candidate in candidates {
    debug!(candidate = %candidate.display(), "probing config path");
    if candidate.exists() {
      return Ok(Some(candidate));
    }
  }

  Ok(None)
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use tempfile::NamedTempFile;

  use super::*;

  #[test]
  fn defaults_when_empty() {
    let cfg = Config::from_toml_str("").expect("empty config");
    assert_eq!(cfg.projection.months, 1);
    assert!(!cfg.output.json);
    assert!(cfg.utc_offset_raw().is_none());
  }

  #[test]
  fn top_level_offset_wins() {
    let cfg = Config::from_toml_str(
      "utc_offset = \"+08:00\"\n[clock]\nutc_offset = \"-05:00\"\n",
    )
    .expect("config");
    assert_eq!(cfg.utc_offset_raw(), Some("+08:00"));
    let offset = cfg.reference_offset().expect("valid").expect("present");
    assert_eq!(offset.local_minus_utc(), 8 * 3600);
  }

  #[test]
  fn bad_offset_is_reported() {
    let cfg = Config::from_toml_str("[clock]\nutc_offset = \"Mars/Olympus\"\n")
      .expect("config");
    assert!(cfg.reference_offset().is_err());
  }

  #[test]
  fn out_of_range_months_rejected() {
    assert!(Config::from_toml_str("[projection]\nmonths = 0\n").is_err());
    assert!(Config::from_toml_str("[projection]\nmonths = 4294967295\n").is_err());
  }

  #[test]
  fn loads_from_file() {
    let mut file = NamedTempFile::new().expect("tempfile");
    writeln!(file, "[projection]\nmonths = 6\n[output]\njson = true").expect("write");

    let cfg = Config::load(Some(file.path())).expect("load");
    assert_eq!(cfg.projection.months, 6);
    assert!(cfg.output.json);
    assert_eq!(cfg.loaded_from.as_deref(), Some(file.path()));
  }

  #[test]
  fn missing_override_is_an_error() {
    let err = Config::load(Some(Path::new("/definitely/not/here.toml")))
      .expect_err("missing file");
    assert!(format!("{err:#}").contains("failed to read"));
  }
}
