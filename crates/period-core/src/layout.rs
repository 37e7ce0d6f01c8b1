//! Layout resolver: turns loosely formatted date strings into
//! [`Timestamp`]s and projects them back onto the two canonical
//! wire formats, `YYYY-MM` and `YYYY-MM-DD`.

use std::fmt;
use std::sync::OnceLock;

use chrono::{
  DateTime,
  Datelike,
  FixedOffset,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Timelike,
  Utc
};
use regex::Regex;
use tracing::trace;

use crate::error::{
  PeriodError,
  Result
};

pub const PROPHET_FORMAT: &str =
  "%Y-%m-%d %H:%M:%S";

/// A parsed point in time. Calendar
/// accessors read the date in the
/// offset the input carried (UTC when
/// it carried none).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash
)]
pub struct Timestamp(DateTime<FixedOffset>);

impl Timestamp {
  #[must_use]
  pub fn from_date(
    date: NaiveDate
  ) -> Self {
    Self(
      date
        .and_time(NaiveTime::MIN)
        .and_utc()
        .fixed_offset()
    )
  }

  #[must_use]
  pub fn from_utc(
    dt: DateTime<Utc>
  ) -> Self {
    Self(dt.fixed_offset())
  }

  /// `0001-01-01T00:00:00Z`, the value
  /// best-effort parsing falls back to.
  #[must_use]
  pub fn zero() -> Self {
    Self::from_date(
      NaiveDate::from_ymd_opt(1, 1, 1)
        .unwrap_or(NaiveDate::MIN)
    )
  }

  pub fn year(&self) -> i32 {
    self.0.year()
  }

  pub fn month(&self) -> u32 {
    self.0.month()
  }

  pub fn day(&self) -> u32 {
    self.0.day()
  }

  pub fn date(&self) -> NaiveDate {
    self.0.date_naive()
  }

  pub fn as_datetime(
    &self
  ) -> DateTime<FixedOffset> {
    self.0
  }

  /// Nanoseconds since the Unix epoch.
  /// Widened to `i128` so dates outside
  /// 1677..2262 still order correctly.
  pub fn ordinal_nanos(&self) -> i128 {
    i128::from(self.0.timestamp())
      * 1_000_000_000
      + i128::from(
        self.0.timestamp_subsec_nanos()
      )
  }
}

impl fmt::Display for Timestamp {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&self.0.to_rfc3339())
  }
}

type LayoutParser =
  fn(&str) -> Option<DateTime<FixedOffset>>;

/// One entry of the resolver table.
pub struct Layout {
  pub name:    &'static str,
  pub example: &'static str,
  parse:       LayoutParser
}

impl fmt::Debug for Layout {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("Layout")
      .field("name", &self.name)
      .field("example", &self.example)
      .finish()
  }
}

/// Tried in order; the first layout
/// that consumes the whole input wins.
pub static LAYOUTS: [Layout; 19] = [
  Layout {
    name:    "iso-day",
    example: "2006-01-02",
    parse:   parse_iso_day
  },
  Layout {
    name:    "iso-day-lenient",
    example: "2006-1-2",
    parse:   parse_iso_day_lenient
  },
  Layout {
    name:    "iso-month",
    example: "2006-01",
    parse:   parse_iso_month
  },
  Layout {
    name:    "iso-month-lenient",
    example: "2006-1",
    parse:   parse_iso_month_lenient
  },
  Layout {
    name:    "iso-minute-utc",
    example: "2006-01-02T15:04Z",
    parse:   parse_iso_minute_utc
  },
  Layout {
    name:    "prophet",
    example: "2006-01-02 15:04:05",
    parse:   parse_prophet
  },
  Layout {
    name:    "aws-cloudwatch",
    example: "2006-01-02 15:04:05 -0700 MST",
    parse:   parse_aws_cloudwatch
  },
  Layout {
    name:    "linode",
    example: "2006-01-02T15:04:05",
    parse:   parse_linode
  },
  Layout {
    name:    "ansic",
    example: "Mon Jan _2 15:04:05 2006",
    parse:   parse_ansic
  },
  Layout {
    name:    "unix-date",
    example: "Mon Jan _2 15:04:05 MST 2006",
    parse:   parse_unix_date
  },
  Layout {
    name:    "ruby-date",
    example: "Mon Jan 02 15:04:05 -0700 2006",
    parse:   parse_ruby_date
  },
  Layout {
    name:    "rfc822",
    example: "02 Jan 06 15:04 MST",
    parse:   parse_rfc822
  },
  Layout {
    name:    "rfc822z",
    example: "02 Jan 06 15:04 -0700",
    parse:   parse_rfc822z
  },
  Layout {
    name:    "rfc850",
    example: "Monday, 02-Jan-06 15:04:05 MST",
    parse:   parse_rfc850
  },
  Layout {
    name:    "rfc1123",
    example: "Mon, 02 Jan 2006 15:04:05 MST",
    parse:   parse_rfc1123
  },
  Layout {
    name:    "rfc1123z",
    example: "Mon, 02 Jan 2006 15:04:05 -0700",
    parse:   parse_rfc1123z
  },
  Layout {
    name:    "rfc3339",
    example: "2006-01-02T15:04:05.999999999Z07:00",
    parse:   parse_rfc3339
  },
  Layout {
    name:    "kitchen",
    example: "3:04PM",
    parse:   parse_kitchen
  },
  Layout {
    name:    "stamp",
    example: "Jan _2 15:04:05.000000000",
    parse:   parse_stamp
  }
];

struct IsoParts {
  year:        i32,
  month:       u32,
  month_width: usize,
  day:         Option<(u32, usize)>
}

fn iso_shape() -> Option<&'static Regex>
{
  static ISO_SHAPE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  ISO_SHAPE
    .get_or_init(|| {
      Regex::new(
        r"^(?P<year>\d{4})-(?P<month>\d{1,2})(?:-(?P<day>\d{1,2}))?$"
      )
      .ok()
    })
    .as_ref()
}

fn iso_parts(
  raw: &str
) -> Option<IsoParts> {
  let caps =
    iso_shape()?.captures(raw)?;
  let year = caps
    .name("year")?
    .as_str()
    .parse()
    .ok()?;
  let month_match = caps.name("month")?;
  let month =
    month_match.as_str().parse().ok()?;
  let day = match caps.name("day") {
    | Some(m) => {
      Some((
        m.as_str().parse().ok()?,
        m.as_str().len()
      ))
    }
    | None => None
  };

  Some(IsoParts {
    year,
    month,
    month_width: month_match
      .as_str()
      .len(),
    day
  })
}

fn iso_date(
  raw: &str,
  strict: bool,
  with_day: bool
) -> Option<DateTime<FixedOffset>> {
  let parts = iso_parts(raw)?;
  if strict && parts.month_width != 2 {
    return None;
  }

  let day = match (parts.day, with_day)
  {
    | (Some((day, width)), true) => {
      if strict && width != 2 {
        return None;
      }
      day
    }
    | (None, false) => 1,
    | _ => return None
  };

  let date = NaiveDate::from_ymd_opt(
    parts.year,
    parts.month,
    day
  )?;
  Some(Timestamp::from_date(date).0)
}

fn parse_iso_day(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  iso_date(raw, true, true)
}

fn parse_iso_day_lenient(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  iso_date(raw, false, true)
}

fn parse_iso_month(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  iso_date(raw, true, false)
}

fn parse_iso_month_lenient(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  iso_date(raw, false, false)
}

fn parse_iso_minute_utc(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  naive_utc(raw, "%Y-%m-%dT%H:%MZ")
}

fn parse_prophet(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  naive_utc(raw, PROPHET_FORMAT)
}

fn parse_aws_cloudwatch(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  let rest = without_zone_abbrev(raw, 0)?;
  with_offset(
    &rest,
    "%Y-%m-%d %H:%M:%S %z"
  )
}

fn parse_linode(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  naive_utc(raw, "%Y-%m-%dT%H:%M:%S")
}

fn parse_ansic(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  naive_utc(
    &collapse_whitespace(raw),
    "%a %b %e %H:%M:%S %Y"
  )
}

fn parse_unix_date(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  let rest = without_zone_abbrev(raw, 1)?;
  naive_utc(&rest, "%a %b %e %H:%M:%S %Y")
}

fn parse_ruby_date(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  with_offset(
    &collapse_whitespace(raw),
    "%a %b %d %H:%M:%S %z %Y"
  )
}

fn parse_rfc822(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  let rest = without_zone_abbrev(raw, 0)?;
  naive_utc(&rest, "%d %b %y %H:%M")
}

fn parse_rfc822z(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  with_offset(raw, "%d %b %y %H:%M %z")
}

fn parse_rfc850(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  let rest = without_zone_abbrev(raw, 0)?;
  naive_utc(&rest, "%A, %d-%b-%y %H:%M:%S")
}

fn parse_rfc1123(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  let rest = without_zone_abbrev(raw, 0)?;
  naive_utc(&rest, "%a, %d %b %Y %H:%M:%S")
}

fn parse_rfc1123z(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  with_offset(
    raw,
    "%a, %d %b %Y %H:%M:%S %z"
  )
}

// Covers both the plain and the
// fractional-second variants.
fn parse_rfc3339(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  DateTime::parse_from_rfc3339(raw).ok()
}

fn parse_kitchen(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  let time =
    NaiveTime::parse_from_str(raw, "%I:%M%p")
      .ok()?;
  let date =
    NaiveDate::from_ymd_opt(0, 1, 1)?;
  Some(
    date
      .and_time(time)
      .and_utc()
      .fixed_offset()
  )
}

fn parse_stamp(
  raw: &str
) -> Option<DateTime<FixedOffset>> {
  naive_utc(
    &format!(
      "0000 {}",
      collapse_whitespace(raw)
    ),
    "%Y %b %e %H:%M:%S%.f"
  )
}

fn naive_utc(
  raw: &str,
  fmt: &str
) -> Option<DateTime<FixedOffset>> {
  NaiveDateTime::parse_from_str(raw, fmt)
    .ok()
    .map(|ndt| {
      ndt.and_utc().fixed_offset()
    })
}

fn with_offset(
  raw: &str,
  fmt: &str
) -> Option<DateTime<FixedOffset>> {
  DateTime::parse_from_str(raw, fmt).ok()
}

fn collapse_whitespace(
  raw: &str
) -> String {
  raw
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
}

// Abbreviations such as MST carry no
// offset of their own; the token is
// dropped and the value read as UTC.
fn is_zone_abbrev(token: &str) -> bool {
  (3..=5).contains(&token.len())
    && token
      .chars()
      .all(|c| c.is_ascii_uppercase())
}

fn without_zone_abbrev(
  raw: &str,
  from_end: usize
) -> Option<String> {
  let mut tokens: Vec<&str> =
    raw.split_whitespace().collect();
  let idx = tokens
    .len()
    .checked_sub(from_end + 1)?;
  if !is_zone_abbrev(tokens[idx]) {
    return None;
  }
  tokens.remove(idx);
  Some(tokens.join(" "))
}

/// Parses `raw` against the layout
/// table and reports which layout
/// matched.
pub fn parse_with_layout(
  raw: &str
) -> Result<(Timestamp, &'static Layout)>
{
  for layout in &LAYOUTS {
    if let Some(dt) = (layout.parse)(raw)
    {
      trace!(
        input = raw,
        layout = layout.name,
        "layout matched"
      );
      return Ok((
        Timestamp(dt),
        layout
      ));
    }
  }

  Err(PeriodError::unparsable(raw))
}

pub fn parse(
  raw: &str
) -> Result<Timestamp> {
  parse_with_layout(raw)
    .map(|(ts, _)| ts)
}

/// Lenient variant of [`parse`]: an
/// unparsable input yields
/// [`Timestamp::zero`] instead of an
/// error. Only for callers that treat a
/// missing bound as "unbounded below".
#[must_use]
pub fn parse_best_effort(
  raw: &str
) -> Timestamp {
  parse(raw)
    .unwrap_or_else(|_| Timestamp::zero())
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum EpochUnit {
  Seconds,
  Millis
}

fn parse_epoch_integer(
  raw: &str
) -> Result<i64> {
  raw
    .trim()
    .parse::<i64>()
    .map_err(|_| {
      PeriodError::unparsable(raw)
    })
}

pub fn parse_epoch(
  raw: &str,
  unit: EpochUnit
) -> Result<Timestamp> {
  let value = parse_epoch_integer(raw)?;
  let dt = match unit {
    | EpochUnit::Seconds => {
      DateTime::from_timestamp(value, 0)
    }
    | EpochUnit::Millis => {
      DateTime::from_timestamp_millis(
        value
      )
    }
  };

  dt.map(Timestamp::from_utc)
    .ok_or_else(|| {
      PeriodError::invalid_timestamp(raw)
    })
}

pub fn parse_epoch_seconds(
  raw: &str
) -> Result<Timestamp> {
  parse_epoch(raw, EpochUnit::Seconds)
}

pub fn parse_epoch_millis(
  raw: &str
) -> Result<Timestamp> {
  parse_epoch(raw, EpochUnit::Millis)
}

/// RFC3339 with nanoseconds, trailing
/// zeros trimmed and `Z` for UTC.
#[must_use]
pub fn format_rfc3339_nano(
  ts: Timestamp
) -> String {
  let dt = ts.0;
  let mut out = dt
    .format("%Y-%m-%dT%H:%M:%S")
    .to_string();

  let nanos = dt.nanosecond();
  if nanos > 0 {
    let frac = format!("{nanos:09}");
    out.push('.');
    out.push_str(
      frac.trim_end_matches('0')
    );
  }

  if dt.offset().local_minus_utc() == 0 {
    out.push('Z');
  } else {
    out.push_str(
      &dt.format("%:z").to_string()
    );
  }
  out
}

/// Normalises a vendor timestamp for
/// import elsewhere. A bare integer is
/// read as an epoch in `unit`; anything
/// else goes through the layout table.
pub fn to_rfc3339_nano(
  raw: &str,
  unit: EpochUnit
) -> Result<String> {
  if parse_epoch_integer(raw).is_ok() {
    return parse_epoch(raw, unit)
      .map(format_rfc3339_nano);
  }

  parse(raw)
    .map(format_rfc3339_nano)
    .map_err(|_| {
      PeriodError::invalid_timestamp(raw)
    })
}

/// Layouts first, then epoch
/// milliseconds.
pub fn to_prophet_format(
  raw: &str
) -> Result<String> {
  let ts = match parse(raw) {
    | Ok(ts) => ts,
    | Err(_) => {
      parse_epoch_millis(raw).map_err(
        |_| {
          PeriodError::invalid_timestamp(
            raw
          )
        }
      )?
    }
  };

  Ok(
    ts.0
      .format(PROPHET_FORMAT)
      .to_string()
  )
}

#[must_use]
pub fn to_month_string(
  ts: Timestamp
) -> String {
  format!(
    "{:04}-{:02}",
    ts.year(),
    ts.month()
  )
}

#[must_use]
pub fn to_day_string(
  ts: Timestamp
) -> String {
  format!(
    "{:04}-{:02}-{:02}",
    ts.year(),
    ts.month(),
    ts.day()
  )
}

pub fn string_to_month_layout(
  raw: &str
) -> Result<String> {
  parse(raw).map(to_month_string)
}

pub fn string_to_day_layout(
  raw: &str
) -> Result<String> {
  parse(raw).map(to_day_string)
}

#[must_use]
pub fn first_day_of_month(
  ts: Timestamp
) -> Timestamp {
  let date = ts.date();
  Timestamp::from_date(
    date.with_day(1).unwrap_or(date)
  )
}

#[must_use]
pub fn first_day_of_month_string(
  ts: Timestamp
) -> String {
  to_day_string(first_day_of_month(ts))
}

fn walk_to_month_end(
  date: NaiveDate
) -> NaiveDate {
  let month = date.month();
  let mut cursor = date;

  while cursor.month() == month {
    match cursor.succ_opt() {
      | Some(next) => cursor = next,
      | None => return cursor
    }
  }

  // cursor sits on the 1st of the next
  // month now
  cursor.pred_opt().unwrap_or(cursor)
}

/// Final calendar day of `ts`'s month,
/// found by walking forward one day at
/// a time until the month changes.
#[must_use]
pub fn last_day_of_month(
  ts: Timestamp
) -> Timestamp {
  Timestamp::from_date(walk_to_month_end(
    ts.date()
  ))
}

#[must_use]
pub fn last_day_of_month_string(
  ts: Timestamp
) -> String {
  to_day_string(last_day_of_month(ts))
}

/// Number of days in `month` (any
/// parsable layout, usually `YYYY-MM`).
pub fn days_in_month(
  month: &str
) -> Result<u32> {
  let ts = parse(month)?;
  Ok(last_day_of_month(ts).day())
}

pub(crate) fn previous_month_end(
  date: NaiveDate
) -> NaiveDate {
  checked_previous_month_end(date)
    .unwrap_or_else(|| {
      date.with_day(1).unwrap_or(date)
    })
}

/// `None` once `date` sits in the first
/// representable month.
pub(crate) fn checked_previous_month_end(
  date: NaiveDate
) -> Option<NaiveDate> {
  date.with_day(1)?.pred_opt()
}

/// Last day of the month before `ts`.
#[must_use]
pub fn one_month_before(
  ts: Timestamp
) -> Timestamp {
  Timestamp::from_date(
    previous_month_end(ts.date())
  )
}

/// Steps into the previous month, then
/// walks back until the day of month
/// equals `day`.
#[must_use]
pub fn one_month_before_on_day(
  ts: Timestamp,
  day: u32
) -> Timestamp {
  let mut cursor =
    previous_month_end(ts.date());
  while cursor.day() != day {
    match cursor.pred_opt() {
      | Some(prev) => cursor = prev,
      | None => break
    }
  }
  Timestamp::from_date(cursor)
}

/// Previous month of any parsable
/// input, as `YYYY-MM`.
pub fn last_month_string(
  raw: &str
) -> Result<String> {
  let ts = parse(raw)?;
  Ok(to_month_string(one_month_before(
    ts
  )))
}

pub fn yesterday_string(
  raw: &str
) -> Result<String> {
  let ts = parse(raw)?;
  let date = ts.date();
  Ok(to_day_string(Timestamp::from_date(
    date.pred_opt().unwrap_or(date)
  )))
}

/// First day of the month after `ts`.
#[must_use]
pub fn next_month(
  ts: Timestamp
) -> Timestamp {
  let last = walk_to_month_end(ts.date());
  Timestamp::from_date(
    last.succ_opt().unwrap_or(last)
  )
}

#[must_use]
pub fn next_month_string(
  ts: Timestamp
) -> String {
  to_month_string(next_month(ts))
}

pub fn next_month_from_string(
  raw: &str
) -> Result<String> {
  parse(raw).map(next_month_string)
}

#[must_use]
pub fn next_day(
  ts: Timestamp
) -> Timestamp {
  let date = ts.date();
  Timestamp::from_date(
    date.succ_opt().unwrap_or(date)
  )
}

#[must_use]
pub fn next_day_string(
  ts: Timestamp
) -> String {
  to_day_string(next_day(ts))
}

/// `YYYY-MM`, exactly two month digits.
#[must_use]
pub fn is_std_month_layout(
  raw: &str
) -> bool {
  parse_iso_month(raw).is_some()
}

/// `YYYY-M`.
#[must_use]
pub fn is_lenient_month_layout(
  raw: &str
) -> bool {
  parse_iso_month_lenient(raw).is_some()
}

/// `YYYY-MM-DD`, exactly two digits
/// each for month and day.
#[must_use]
pub fn is_std_day_layout(
  raw: &str
) -> bool {
  parse_iso_day(raw).is_some()
}

/// `YYYY-M-D`.
#[must_use]
pub fn is_lenient_day_layout(
  raw: &str
) -> bool {
  parse_iso_day_lenient(raw).is_some()
}

/// Normalises `YYYY-M-D` to
/// `YYYY-MM-DD`; `None` for anything
/// that is not an ISO day.
#[must_use]
pub fn to_std_day_layout(
  raw: &str
) -> Option<String> {
  if is_std_day_layout(raw) {
    return Some(raw.to_string());
  }

  parse_iso_day_lenient(raw).map(|dt| {
    to_day_string(Timestamp(dt))
  })
}

#[must_use]
pub fn to_std_month_layout(
  raw: &str
) -> Option<String> {
  if is_std_month_layout(raw) {
    return Some(raw.to_string());
  }

  parse_iso_month_lenient(raw).map(
    |dt| to_month_string(Timestamp(dt))
  )
}
