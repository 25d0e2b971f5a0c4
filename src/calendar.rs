//! Business-day calendar generation.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;

use crate::error::PlanError;

/// All weekdays in `[start, end]` that are not in the excluded set, in
/// strictly increasing order.
pub fn business_days(
    start: NaiveDate,
    end: NaiveDate,
    excluded: &BTreeSet<NaiveDate>,
) -> Result<Vec<NaiveDate>, PlanError> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        let is_weekday = !matches!(current.weekday(), Weekday::Sat | Weekday::Sun);
        if is_weekday && !excluded.contains(&current) {
            days.push(current);
        }
        let Some(next) = current.succ_opt() else {
            break;
        };
        current = next;
    }
    if days.is_empty() {
        return Err(PlanError::EmptyCalendar);
    }
    Ok(days)
}
