//! Calendar slot scheduling with deterministic minute jitter.
//!
//! Every planned commit is assigned exactly one (business day, time-of-day)
//! pair, in increasing sequence order. The per-day entry counts come from a
//! base of `target / days` plus a remainder spread over the range, and each
//! day's times come from the configured slot template for that count.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, TimeZone};
use chrono_tz::Tz;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::distribute::spread_indices;
use crate::error::PlanError;

/// Maximum minutes a timestamp may drift from its nominal slot time.
pub const JITTER_SPAN_MINUTES: i64 = 8;

/// The full slot assignment for one planning run.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Planned commits per business day, parallel to the calendar.
    pub day_counts: Vec<usize>,
    pub base_daily_count: usize,
    pub extra_commit_days: usize,
    /// One timestamp per planned commit, in sequence order.
    pub timestamps: Vec<DateTime<Tz>>,
}

/// Assign every planned commit a timestamp. `source_ids` carries the source
/// changeset id of each commit in sequence order and doubles as the target
/// count.
pub fn build_schedule(
    business_days: &[NaiveDate],
    source_ids: &[&str],
    daily_slots: &BTreeMap<usize, Vec<String>>,
    timezone: Tz,
) -> Result<Schedule, PlanError> {
    if business_days.is_empty() {
        return Err(PlanError::EmptyCalendar);
    }
    let day_count = business_days.len();
    let target = source_ids.len();
    let base_daily_count = target / day_count;
    let extra_commit_days = target - base_daily_count * day_count;

    let mut day_counts = vec![base_daily_count; day_count];
    for index in spread_indices(day_count, extra_commit_days)? {
        day_counts[index] += 1;
    }

    let mut timestamps = Vec::with_capacity(target);
    let mut pointer = 0usize;
    for (day_index, day) in business_days.iter().enumerate() {
        let commits_for_day = day_counts[day_index];
        let slots = daily_slots
            .get(&commits_for_day)
            .ok_or(PlanError::NoSlotTemplate {
                count: commits_for_day,
            })?;
        if slots.len() != commits_for_day {
            return Err(PlanError::SlotCountMismatch {
                count: commits_for_day,
                provided: slots.len(),
            });
        }

        for (slot_index, slot_text) in slots.iter().enumerate() {
            if pointer >= target {
                return Err(PlanError::ScheduleOverflow);
            }
            let nominal = slot_datetime(*day, slot_text, timezone)?;
            let jitter = minute_jitter(pointer + 1, source_ids[pointer], slot_index);
            let jittered = nominal + Duration::minutes(jitter);
            // Jitter must never move a commit onto another calendar date.
            let timestamp = if jittered.date_naive() == *day {
                jittered
            } else {
                nominal
            };
            timestamps.push(timestamp);
            pointer += 1;
        }
    }

    if pointer != target {
        return Err(PlanError::ScheduleUnderflow {
            assigned: pointer,
            target,
        });
    }

    Ok(Schedule {
        day_counts,
        base_daily_count,
        extra_commit_days,
        timestamps,
    })
}

/// Parse an `HH:MM` slot time.
pub(crate) fn parse_slot_time(text: &str) -> Option<(u32, u32)> {
    let (hour_text, minute_text) = text.split_once(':')?;
    let hour: u32 = hour_text.parse().ok()?;
    let minute: u32 = minute_text.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

fn slot_datetime(day: NaiveDate, slot_text: &str, timezone: Tz) -> Result<DateTime<Tz>, PlanError> {
    let (hour, minute) = parse_slot_time(slot_text).ok_or_else(|| PlanError::InvalidSlotTime {
        time: slot_text.to_string(),
    })?;
    match timezone.with_ymd_and_hms(day.year(), day.month(), day.day(), hour, minute, 0) {
        LocalResult::Single(datetime) => Ok(datetime),
        // DST fall-back repeats the local time; take the earlier instant.
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(PlanError::BlueprintInconsistent(format!(
            "slot time {slot_text} on {day} does not exist in this timezone"
        ))),
    }
}

/// Deterministic minute offset in `[-JITTER_SPAN, +JITTER_SPAN]` derived
/// from a stable hash of the assignment identity.
fn minute_jitter(sequence: usize, source_id: &str, slot_index: usize) -> i64 {
    let seed = format!("{sequence}:{source_id}:{slot_index}");
    let digest = Sha256::digest(seed.as_bytes());
    let lead = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let span = 2 * JITTER_SPAN_MINUTES + 1;
    i64::from(lead) % span - JITTER_SPAN_MINUTES
}
