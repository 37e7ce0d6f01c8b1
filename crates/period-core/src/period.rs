use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock;
use crate::error::{PeriodError, Result};
use crate::layout::{self, Timestamp};
use crate::reconcile::{self, MonthSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Monthly,
    Daily,
}

/// A `[start, end]` pair of canonical day strings.
///
/// Read operations never modify it; only [`TimePeriod::one_month_before`]
/// rewrites `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub start: String,
    pub end: String,
}

impl TimePeriod {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// First day of the current month through today.
    pub fn current_month(today: NaiveDate) -> Self {
        let today = Timestamp::from_date(today);
        Self::new(layout::first_day_of_month_string(today), layout::to_day_string(today))
    }

    /// December 1st of last year through today.
    pub fn this_year_and_last_december(today: NaiveDate) -> Self {
        Self::new(
            format!("{:04}-12-01", today.year() - 1),
            layout::to_day_string(Timestamp::from_date(today)),
        )
    }

    /// First day of the month `months` months back through today.
    pub fn last_x_months(today: NaiveDate, months: u32) -> Self {
        let mut cursor = Timestamp::from_date(today);
        for _ in 0..months {
            cursor = layout::one_month_before(cursor);
        }
        Self::new(
            layout::first_day_of_month_string(cursor),
            layout::to_day_string(Timestamp::from_date(today)),
        )
    }

    /// The whole of `month`, first to last day.
    pub fn month_to_daily(month: &str) -> Result<Self> {
        let span = MonthSpan::of(month)?;
        Ok(Self::new(span.first_day_string(), span.last_day_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_on(clock::today())
    }

    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<()> {
        self.validate_on(clock::to_reference_date(now))
    }

    /// Checks both endpoints are canonical days, that start is not after
    /// `today` (a date in the reference offset), and that start precedes
    /// end.
    pub fn validate_on(&self, today: NaiveDate) -> Result<()> {
        if !layout::is_std_day_layout(&self.start) {
            return Err(PeriodError::Format {
                field: "startTime",
                value: self.start.clone(),
                expected: "YYYY-MM-DD",
            });
        }
        if !layout::is_std_day_layout(&self.end) {
            return Err(PeriodError::Format {
                field: "endTime",
                value: self.end.clone(),
                expected: "YYYY-MM-DD",
            });
        }

        let start = layout::parse(&self.start)?;
        let end = layout::parse(&self.end)?;

        if start.date() > today {
            return Err(PeriodError::Range(format!(
                "start time {} is out of range, should be before today",
                self.start
            )));
        }

        if start >= end {
            return Err(PeriodError::Range(format!(
                "invalid startTime: {} endTime: {}, startTime is not before endTime",
                self.start, self.end
            )));
        }

        Ok(())
    }

    fn is_blank(&self) -> bool {
        self.start.is_empty() || self.end.is_empty()
    }

    /// Every `YYYY-MM` from the start month through the end month.
    pub fn to_month_list(&self) -> Result<Vec<String>> {
        if self.is_blank() {
            return Ok(vec![]);
        }

        let mut cursor = layout::first_day_of_month(layout::parse(&self.start)?);
        let end = layout::parse(&self.end)?;

        let mut out = Vec::new();
        while cursor <= end {
            out.push(layout::to_month_string(cursor));
            cursor = layout::next_month(cursor);
        }
        Ok(out)
    }

    /// [`Self::to_month_list`] as `YYYYMM`, the shape billing exports
    /// key their partitions on.
    pub fn to_month_list_compact(&self) -> Result<Vec<String>> {
        Ok(self
            .to_month_list()?
            .into_iter()
            .map(|m| m.replace('-', ""))
            .collect())
    }

    pub fn to_list(&self, granularity: Granularity) -> Result<Vec<String>> {
        match granularity {
            Granularity::Monthly => self.to_month_list(),
            Granularity::Daily => self.to_day_list(),
        }
    }

    pub fn to_day_list(&self) -> Result<Vec<String>> {
        self.to_day_list_at(clock::today())
    }

    /// Every `YYYY-MM-DD` from start through end.
    ///
    /// Either endpoint may be a `YYYY-MM` month: a month start begins
    /// on its 1st, a month end stops on its last day, or on `today`
    /// when it names the current month.
    pub fn to_day_list_at(&self, today: NaiveDate) -> Result<Vec<String>> {
        if self.is_blank() {
            return Ok(vec![]);
        }

        let mut cursor = layout::parse(&self.start)?;
        if layout::is_std_month_layout(&self.start) {
            cursor = layout::first_day_of_month(cursor);
        }

        let mut end = layout::parse(&self.end)?;
        if layout::is_std_month_layout(&self.end) {
            let today = Timestamp::from_date(today);
            end = if self.end == layout::to_month_string(today) {
                today
            } else {
                layout::last_day_of_month(end)
            };
        }

        let mut out = Vec::new();
        while cursor <= end {
            out.push(layout::to_day_string(cursor));
            cursor = layout::next_day(cursor);
        }
        Ok(out)
    }

    /// Start as a timestamp, [`Timestamp::zero`] when it does not parse.
    pub fn start_best_effort(&self) -> Timestamp {
        layout::parse_best_effort(&self.start)
    }

    /// End as a timestamp, [`Timestamp::zero`] when it does not parse.
    pub fn end_best_effort(&self) -> Timestamp {
        layout::parse_best_effort(&self.end)
    }

    /// Whether `ts` lies within `[start, end]`. Unparsable input is
    /// never in range.
    pub fn in_range(&self, ts: &str) -> bool {
        match layout::parse(ts) {
            Ok(v) => self.start_best_effort() <= v && v <= self.end_best_effort(),
            Err(_) => false,
        }
    }

    /// This period clipped to `month`.
    pub fn start_and_end_in_month(&self, month: &str) -> Result<(Timestamp, Timestamp)> {
        let span = MonthSpan::of(month)?;
        let (_, lo, hi) =
            reconcile::reconcile_timestamps(&span, self.start_best_effort(), self.end_best_effort())?;
        Ok((lo, hi))
    }

    /// Whole days between the endpoints of this period clipped to
    /// `month`.
    pub fn num_of_days(&self, month: &str) -> Result<i64> {
        let span = MonthSpan::of(month)?;
        reconcile::overlap_days(&span, self.start_best_effort(), self.end_best_effort())
    }

    /// Moves `start` to the 1st of the month before it. `end` is left
    /// alone.
    #[tracing::instrument(skip(self), fields(start = %self.start))]
    pub fn one_month_before(&mut self) -> Result<()> {
        let start = layout::parse(&self.start)?;
        let previous = layout::first_day_of_month(layout::one_month_before(start));
        self.start = layout::to_day_string(previous);
        debug!(start = %self.start, "moved period start back one month");
        Ok(())
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.start, self.end)
    }
}
