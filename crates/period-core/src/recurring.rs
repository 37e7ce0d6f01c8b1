//! "Day N of every month", projected backward from an anchor date.
//!
//! Anchors on day 28 or later need care because the target month may
//! be shorter than the anchor's. The policy lives in
//! [`PROJECTION_TABLE`], keyed by anchor day, whether the anchor was
//! the last day of its own month, and the target month length:
//!
//! * a day that does not exist in the target month is replaced by the
//!   target's last day;
//! * an anchor on the last day of its month also claims every later
//!   day of a longer target month, so `04-30` projects onto both
//!   `03-30` and `03-31`.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::layout::{self, Timestamp};

/// Longest look-back the string entry points accept, a thousand years.
pub const MAX_PROJECTION_MONTHS: u32 = 12_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionRule {
    pub anchor_day: u32,
    pub is_last_day: bool,
    pub target_len: u32,
    pub days: &'static [u32],
}

const fn rule(anchor_day: u32, is_last_day: bool, target_len: u32, days: &'static [u32]) -> ProjectionRule {
    ProjectionRule {
        anchor_day,
        is_last_day,
        target_len,
        days,
    }
}

#[rustfmt::skip]
pub const PROJECTION_TABLE: [ProjectionRule; 32] = [
    rule(28, false, 28, &[28]),
    rule(28, false, 29, &[28]),
    rule(28, false, 30, &[28]),
    rule(28, false, 31, &[28]),
    rule(28, true,  28, &[28]),
    rule(28, true,  29, &[28, 29]),
    rule(28, true,  30, &[28, 29, 30]),
    rule(28, true,  31, &[28, 29, 30, 31]),

    rule(29, false, 28, &[28]),
    rule(29, false, 29, &[29]),
    rule(29, false, 30, &[29]),
    rule(29, false, 31, &[29]),
    rule(29, true,  28, &[28]),
    rule(29, true,  29, &[29]),
    rule(29, true,  30, &[29, 30]),
    rule(29, true,  31, &[29, 30, 31]),

    rule(30, false, 28, &[28]),
    rule(30, false, 29, &[29]),
    rule(30, false, 30, &[30]),
    rule(30, false, 31, &[30]),
    rule(30, true,  28, &[28]),
    rule(30, true,  29, &[29]),
    rule(30, true,  30, &[30]),
    rule(30, true,  31, &[30, 31]),

    // a 31st is always a last day; the `false` rows only keep the
    // table total
    rule(31, false, 28, &[28]),
    rule(31, false, 29, &[29]),
    rule(31, false, 30, &[30]),
    rule(31, false, 31, &[31]),
    rule(31, true,  28, &[28]),
    rule(31, true,  29, &[29]),
    rule(31, true,  30, &[30]),
    rule(31, true,  31, &[31]),
];

/// Days of a `target_len`-day month that an anchor on `anchor_day`
/// maps onto.
pub fn projection_days(anchor_day: u32, is_last_day: bool, target_len: u32) -> Vec<u32> {
    if anchor_day < 28 {
        return vec![anchor_day];
    }

    PROJECTION_TABLE
        .iter()
        .find(|r| r.anchor_day == anchor_day && r.is_last_day == is_last_day && r.target_len == target_len)
        .map(|r| r.days.to_vec())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub date: NaiveDate,
    pub is_last_day: bool,
}

impl Anchor {
    pub fn new(ts: Timestamp) -> Self {
        let date = ts.date();
        let is_last_day = date.succ_opt().is_none_or(|next| next.month() != date.month());
        Self { date, is_last_day }
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectedMonth {
    /// `YYYY-MM`
    pub month: String,
    /// `YYYY-MM-DD`, ascending.
    pub days: Vec<String>,
}

/// Per-month breakdown of the projection, most recent month first.
///
/// Stops early at the first representable month.
pub fn project_months(anchor: Anchor, month_count: u32) -> Vec<ProjectedMonth> {
    let mut out = Vec::new();
    let mut cursor = anchor.date;

    for step in 1..=month_count {
        // cursor is always the last day of the month it sits in
        let Some(previous) = layout::checked_previous_month_end(cursor) else {
            debug!(step, "reached the earliest representable month");
            break;
        };
        cursor = previous;
        let target_len = cursor.day();

        let days: Vec<String> = projection_days(anchor.day(), anchor.is_last_day, target_len)
            .into_iter()
            .filter_map(|day| NaiveDate::from_ymd_opt(cursor.year(), cursor.month(), day))
            .map(|date| layout::to_day_string(Timestamp::from_date(date)))
            .collect();

        trace!(step, target_len, ?days, "projected month");
        out.push(ProjectedMonth {
            month: layout::to_month_string(Timestamp::from_date(cursor)),
            days,
        });
    }

    out
}

/// Every date the anchor recurs on over the `month_count` months
/// before it.
///
/// An unparsable anchor, or a count above [`MAX_PROJECTION_MONTHS`],
/// yields an empty set instead of an error; the reporting jobs that
/// call this treat "no dates" and "bad anchor" the same way.
#[tracing::instrument]
pub fn project_backward(anchor: &str, month_count: u32) -> BTreeSet<String> {
    if month_count > MAX_PROJECTION_MONTHS {
        warn!(max = MAX_PROJECTION_MONTHS, "month count too large; returning empty projection");
        return BTreeSet::new();
    }

    let ts = match layout::parse(anchor) {
        Ok(ts) => ts,
        Err(err) => {
            debug!(error = %err, "anchor did not parse; returning empty projection");
            return BTreeSet::new();
        }
    };

    project_months(Anchor::new(ts), month_count)
        .into_iter()
        .flat_map(|m| m.days)
        .collect()
}

/// Only the dates falling in the month exactly `months_ago` months
/// before the anchor.
#[tracing::instrument]
pub fn project_for_month(anchor: &str, months_ago: u32) -> Vec<String> {
    if months_ago > MAX_PROJECTION_MONTHS {
        warn!(max = MAX_PROJECTION_MONTHS, "month count too large; returning empty projection");
        return vec![];
    }
    let Ok(ts) = layout::parse(anchor) else {
        return vec![];
    };

    let mut target = ts;
    for _ in 0..months_ago {
        target = layout::one_month_before(target);
    }
    let prefix = layout::to_month_string(target);

    project_backward(anchor, months_ago)
        .into_iter()
        .filter(|day| day.starts_with(&prefix))
        .collect()
}
