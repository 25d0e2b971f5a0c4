//! Typed failures for the planning core.
//!
//! Every variant maps to a configuration or input defect that is detectable
//! in memory, before any mutation of the repository. The core either emits a
//! complete blueprint or fails with one of these.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("no business days found in the configured date range")]
    EmptyCalendar,

    #[error("target commit count {target} is smaller than source commit count {sources}")]
    Underflow { target: usize, sources: usize },

    #[error("target commit count {target} exceeds expandable capacity {capacity}")]
    CapacityExceeded { target: usize, capacity: usize },

    #[error("cannot split {items} operations into {groups} groups")]
    InvalidSplit { items: usize, groups: usize },

    #[error("no slot definition for {count} commits per day")]
    NoSlotTemplate { count: usize },

    #[error("slot definition for {count} commits per day lists {provided} times")]
    SlotCountMismatch { count: usize, provided: usize },

    #[error("invalid slot time {time:?} (expected HH:MM)")]
    InvalidSlotTime { time: String },

    #[error("schedule overflow while assigning dates")]
    ScheduleOverflow,

    #[error("schedule underflow: assigned {assigned} of {target} planned commits")]
    ScheduleUnderflow { assigned: usize, target: usize },

    #[error("blueprint inconsistent: {0}")]
    BlueprintInconsistent(String),
}
