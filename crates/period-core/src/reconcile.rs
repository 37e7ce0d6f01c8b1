//! Clipping a `[start, end]` range to a calendar month.
//!
//! Every caller goes through [`classify`], which orders the four
//! ordinals `first_day`, `last_day`, `start`, `end` into one of six
//! cases:
//!
//! ```text
//! 1: [start, end, first, last]   => error
//! 2: [start, first, end, last]   => [first, end]
//! 3: [start, first, last, end]   => [first, last]
//! 4: [first, start, end, last]   => [start, end]
//! 5: [first, start, last, end]   => [start, last]
//! 6: [first, last, start, end]   => error
//! ```
//!
//! Comparisons are inclusive and the first matching case wins, so a
//! range touching a boundary exactly resolves to the lowest-numbered
//! case that accepts it.

use serde::Serialize;
use tracing::debug;

use crate::error::{PeriodError, Result};
use crate::layout::{self, Timestamp};

/// Inclusive `[first_day, last_day]` bounds of one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthSpan {
    pub first_day: Timestamp,
    pub last_day: Timestamp,
}

impl MonthSpan {
    #[must_use]
    pub fn containing(ts: Timestamp) -> Self {
        Self {
            first_day: layout::first_day_of_month(ts),
            last_day: layout::last_day_of_month(ts),
        }
    }

    /// Span of `month`, which may be in any layout the resolver knows
    /// (normally `YYYY-MM`).
    pub fn of(month: &str) -> Result<Self> {
        layout::parse(month).map(Self::containing)
    }

    pub fn first_day_string(&self) -> String {
        layout::to_day_string(self.first_day)
    }

    pub fn last_day_string(&self) -> String {
        layout::to_day_string(self.last_day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Overlap {
    /// Case 1: the range ends on or before the first day.
    BeforeMonth,
    /// Case 2: the range starts before the month and ends inside it.
    CoversStart,
    /// Case 3: the range covers the whole month.
    CoversMonth,
    /// Case 4: the range lies inside the month.
    Inside,
    /// Case 5: the range starts inside the month and runs past it.
    CoversEnd,
    /// Case 6: the range starts after the last day.
    AfterMonth,
}

impl Overlap {
    pub fn case_number(self) -> u8 {
        match self {
            Overlap::BeforeMonth => 1,
            Overlap::CoversStart => 2,
            Overlap::CoversMonth => 3,
            Overlap::Inside => 4,
            Overlap::CoversEnd => 5,
            Overlap::AfterMonth => 6,
        }
    }

    /// The clipped endpoints for this case, `None` for the two
    /// disjoint cases.
    pub fn clip(
        self,
        span: &MonthSpan,
        start: Timestamp,
        end: Timestamp,
    ) -> Option<(Timestamp, Timestamp)> {
        match self {
            Overlap::BeforeMonth | Overlap::AfterMonth => None,
            Overlap::CoversStart => Some((span.first_day, end)),
            Overlap::CoversMonth => Some((span.first_day, span.last_day)),
            Overlap::Inside => Some((start, end)),
            Overlap::CoversEnd => Some((start, span.last_day)),
        }
    }
}

/// Classifies a range against a month from four ordinals.
///
/// Returns `None` when `start > end`. Case 5 also requires
/// `start <= last`, otherwise a range lying wholly after the month
/// would be clipped to an interval outside it.
pub fn classify(first: i128, last: i128, start: i128, end: i128) -> Option<Overlap> {
    if start > end {
        return None;
    }

    let overlap = if end <= first {
        Overlap::BeforeMonth
    } else if start <= first && first <= end && end <= last {
        Overlap::CoversStart
    } else if start <= first && last <= end {
        Overlap::CoversMonth
    } else if first <= start && end <= last {
        Overlap::Inside
    } else if first <= start && start <= last && last <= end {
        Overlap::CoversEnd
    } else {
        // only `last < start` is left
        Overlap::AfterMonth
    };
    Some(overlap)
}

fn describe(span: &MonthSpan, start: Timestamp, end: Timestamp) -> String {
    format!(
        "failed to calculate startDay and endDay, firstDay:{}, lastDay:{}, startDay:{}, endDay:{}",
        span.first_day, span.last_day, start, end
    )
}

/// Clips `[start, end]` to `span`, keeping the full timestamps.
pub fn reconcile_timestamps(
    span: &MonthSpan,
    start: Timestamp,
    end: Timestamp,
) -> Result<(Overlap, Timestamp, Timestamp)> {
    let overlap = classify(
        span.first_day.ordinal_nanos(),
        span.last_day.ordinal_nanos(),
        start.ordinal_nanos(),
        end.ordinal_nanos(),
    )
    .ok_or_else(|| PeriodError::Range(describe(span, start, end)))?;

    let (lo, hi) = overlap
        .clip(span, start, end)
        .ok_or_else(|| PeriodError::Range(describe(span, start, end)))?;

    debug!(case = overlap.case_number(), "reconciled range against month");
    Ok((overlap, lo, hi))
}

/// Intersects `[start, end]` with `month` and returns the clipped
/// range as canonical day strings.
#[tracing::instrument]
pub fn reconcile(month: &str, start: &str, end: &str) -> Result<(String, String)> {
    let span = MonthSpan::of(month)?;
    let start = layout::parse(start)?;
    let end = layout::parse(end)?;

    let (_, lo, hi) = reconcile_timestamps(&span, start, end)?;
    Ok((layout::to_day_string(lo), layout::to_day_string(hi)))
}

/// Whole days between the clipped endpoints.
pub fn overlap_days(span: &MonthSpan, start: Timestamp, end: Timestamp) -> Result<i64> {
    let (_, lo, hi) = reconcile_timestamps(span, start, end)?;
    Ok(hi
        .as_datetime()
        .signed_duration_since(lo.as_datetime())
        .num_days())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    // May 2022: first = 05-01, last = 05-31.
    const MONTH: &str = "2022-05";

    fn case_of(start: &str, end: &str) -> Option<Overlap> {
        let span = MonthSpan::of(MONTH).expect("month");
        let start = layout::parse(start).expect("start");
        let end = layout::parse(end).expect("end");
        classify(
            span.first_day.ordinal_nanos(),
            span.last_day.ordinal_nanos(),
            start.ordinal_nanos(),
            end.ordinal_nanos(),
        )
    }

    fn clipped(start: &str, end: &str) -> (String, String) {
        reconcile(MONTH, start, end).expect("overlapping range")
    }

    #[test]
    fn month_span_bounds() {
        let span = MonthSpan::of("2024-02").expect("month");
        assert_eq!(span.first_day_string(), "2024-02-01");
        assert_eq!(span.last_day_string(), "2024-02-29");
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert_eq!(case_of("2022-05-10", "2022-05-09"), None);
        let err = reconcile(MONTH, "2022-05-10", "2022-05-09").expect_err("inverted");
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn case_one_before_month() {
        assert_eq!(case_of("2022-04-01", "2022-04-20"), Some(Overlap::BeforeMonth));
        // ending exactly on the first day still counts as before
        assert_eq!(case_of("2022-04-20", "2022-05-01"), Some(Overlap::BeforeMonth));
        // a single-day range on the first day as well
        assert_eq!(case_of("2022-05-01", "2022-05-01"), Some(Overlap::BeforeMonth));
        let err = reconcile(MONTH, "2022-04-20", "2022-05-01").expect_err("before");
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn case_two_covers_start() {
        assert_eq!(case_of("2022-04-20", "2022-05-10"), Some(Overlap::CoversStart));
        assert_eq!(clipped("2022-04-20", "2022-05-10"), ("2022-05-01".into(), "2022-05-10".into()));

        // start == first takes case 2 before case 4
        assert_eq!(case_of("2022-05-01", "2022-05-10"), Some(Overlap::CoversStart));
        // end == last takes case 2 before case 3
        assert_eq!(case_of("2022-04-20", "2022-05-31"), Some(Overlap::CoversStart));
        assert_eq!(case_of("2022-05-01", "2022-05-31"), Some(Overlap::CoversStart));
        assert_eq!(clipped("2022-05-01", "2022-05-31"), ("2022-05-01".into(), "2022-05-31".into()));
    }

    #[test]
    fn case_three_covers_month() {
        assert_eq!(case_of("2022-04-20", "2022-06-10"), Some(Overlap::CoversMonth));
        assert_eq!(case_of("2022-05-01", "2022-06-10"), Some(Overlap::CoversMonth));
        assert_eq!(clipped("2022-04-20", "2022-06-10"), ("2022-05-01".into(), "2022-05-31".into()));
    }

    #[test]
    fn case_four_inside() {
        assert_eq!(case_of("2022-05-05", "2022-05-10"), Some(Overlap::Inside));
        assert_eq!(case_of("2022-05-05", "2022-05-31"), Some(Overlap::Inside));
        assert_eq!(case_of("2022-05-31", "2022-05-31"), Some(Overlap::Inside));
        assert_eq!(clipped("2022-05-05", "2022-05-10"), ("2022-05-05".into(), "2022-05-10".into()));
    }

    #[test]
    fn case_five_covers_end() {
        assert_eq!(case_of("2022-05-20", "2022-06-10"), Some(Overlap::CoversEnd));
        // start == last still clips to a single day
        assert_eq!(case_of("2022-05-31", "2022-06-10"), Some(Overlap::CoversEnd));
        assert_eq!(clipped("2022-05-20", "2022-06-10"), ("2022-05-20".into(), "2022-05-31".into()));
        assert_eq!(clipped("2022-05-31", "2022-06-10"), ("2022-05-31".into(), "2022-05-31".into()));
    }

    #[test]
    fn case_six_after_month() {
        assert_eq!(case_of("2022-06-01", "2022-06-10"), Some(Overlap::AfterMonth));
        let err = reconcile(MONTH, "2022-06-01", "2022-06-10").expect_err("after");
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn month_accepts_any_layout() {
        assert_eq!(
            reconcile("2022-5", "2022-04-20", "2022-05-10").expect("lenient month"),
            ("2022-05-01".to_string(), "2022-05-10".to_string())
        );
    }

    #[test]
    fn unparsable_inputs_are_parse_errors() {
        let err = reconcile("May", "2022-04-20", "2022-05-10").expect_err("month");
        assert_eq!(err.kind(), ErrorKind::Parse);
        let err = reconcile(MONTH, "soon", "2022-05-10").expect_err("start");
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn result_always_lies_in_month() {
        let span = MonthSpan::of("2024-02").expect("month");
        let mut start = layout::parse("2024-01-20").expect("start");
        let stop = layout::parse("2024-03-10").expect("stop");

        while start <= stop {
            let mut end = start;
            while end <= stop {
                match reconcile_timestamps(&span, start, end) {
                    Ok((_, lo, hi)) => {
                        assert!(span.first_day <= lo && lo <= hi && hi <= span.last_day);
                    }
                    Err(_) => {
                        assert!(end <= span.first_day || span.last_day < start);
                    }
                }
                end = layout::next_day(end);
            }
            start = layout::next_day(start);
        }
    }

    #[test]
    fn reconcile_is_idempotent() {
        let first = reconcile(MONTH, "2022-04-20", "2022-05-10");
        let second = reconcile(MONTH, "2022-04-20", "2022-05-10");
        assert_eq!(first, second);
    }

    #[test]
    fn overlap_days_counts_between_endpoints() {
        let span = MonthSpan::of(MONTH).expect("month");
        let start = layout::parse("2022-04-20").expect("start");
        let end = layout::parse("2022-06-10").expect("end");
        assert_eq!(overlap_days(&span, start, end).expect("days"), 30);
    }
}
