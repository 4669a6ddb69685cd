//! # Idle-Slot Detection
//!
//! Finds gaps between consecutive appointments of the same staff member
//! that are long enough to sell an add-on into.
//!
//! ```text
//! staff-1  ├─ 10:00 cut (30m) ─┤░░░ 45m gap ░░░├─ 11:15 colour (60m) ─┤
//!                                     ▲
//!                         kept when min_gap ≤ 45 ≤ max_gap
//! ```

use chrono::{Duration, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::ValidationResult;

/// A detected gap in a staff member's day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct IdleSlot {
    pub staff_id: String,
    #[ts(as = "String")]
    pub start_time: NaiveTime,
    #[ts(as = "String")]
    pub end_time: NaiveTime,
    pub gap_size_minutes: u32,
}

/// One occupied block on the schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledBlock {
    pub staff_id: String,
    pub start: NaiveTime,
    pub duration_minutes: u32,
}

impl ScheduledBlock {
    fn end(&self) -> NaiveTime {
        self.start + Duration::minutes(self.duration_minutes as i64)
    }
}

fn default_min_gap() -> u32 {
    30
}

fn default_max_gap() -> u32 {
    120
}

/// Gap sizes worth offering, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleSlotWindow {
    #[serde(default = "default_min_gap")]
    pub min_gap_minutes: u32,
    #[serde(default = "default_max_gap")]
    pub max_gap_minutes: u32,
}

impl Default for IdleSlotWindow {
    fn default() -> Self {
        Self {
            min_gap_minutes: default_min_gap(),
            max_gap_minutes: default_max_gap(),
        }
    }
}

impl IdleSlotWindow {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.min_gap_minutes == 0 {
            return Err(ValidationError::MustBePositive {
                field: "schedule.min_gap_minutes".to_string(),
            });
        }
        if self.max_gap_minutes < self.min_gap_minutes {
            return Err(ValidationError::InvalidFormat {
                field: "schedule.max_gap_minutes".to_string(),
                reason: "must not be below min_gap_minutes".to_string(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn contains(&self, gap_minutes: u32) -> bool {
        gap_minutes >= self.min_gap_minutes && gap_minutes <= self.max_gap_minutes
    }
}

fn minutes_of_day(t: NaiveTime) -> i64 {
    (t.hour() * 60 + t.minute()) as i64
}

/// Detects idle slots per staff member.
///
/// Blocks are grouped by staff and sorted by start time; overlapping
/// blocks produce no gap. Output is ordered by staff id, then time.
pub fn detect_idle_slots(blocks: &[ScheduledBlock], window: IdleSlotWindow) -> Vec<IdleSlot> {
    let mut by_staff: BTreeMap<&str, Vec<&ScheduledBlock>> = BTreeMap::new();
    for block in blocks {
        by_staff.entry(block.staff_id.as_str()).or_default().push(block);
    }

    let mut slots = Vec::new();
    for (staff_id, mut day) in by_staff {
        day.sort_by_key(|b| b.start);
        for pair in day.windows(2) {
            let (current, next) = (pair[0], pair[1]);
            let end = current.end();
            // A block running past midnight wraps; treat it as filling the day.
            if end < current.start {
                break;
            }
            let gap = minutes_of_day(next.start) - minutes_of_day(end);
            if gap <= 0 {
                continue;
            }
            let gap = gap as u32;
            if window.contains(gap) {
                slots.push(IdleSlot {
                    staff_id: staff_id.to_string(),
                    start_time: end,
                    end_time: next.start,
                    gap_size_minutes: gap,
                });
            }
        }
    }
    slots
}

/// The slot to sell into: the first one for `staff_id` when given, else
/// the largest gap of the day.
pub fn pick_slot<'a>(slots: &'a [IdleSlot], staff_id: Option<&str>) -> Option<&'a IdleSlot> {
    match staff_id {
        Some(staff) => slots.iter().find(|s| s.staff_id == staff),
        None => slots.iter().max_by_key(|s| s.gap_size_minutes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(staff: &str, h: u32, m: u32, duration: u32) -> ScheduledBlock {
        ScheduledBlock {
            staff_id: staff.to_string(),
            start: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            duration_minutes: duration,
        }
    }

    #[test]
    fn test_detects_gap_within_window() {
        let blocks = vec![block("s1", 11, 15, 60), block("s1", 10, 0, 30)];
        let slots = detect_idle_slots(&blocks, IdleSlotWindow::default());

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].gap_size_minutes, 45);
        assert_eq!(slots[0].start_time, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
        assert_eq!(slots[0].end_time, NaiveTime::from_hms_opt(11, 15, 0).unwrap());
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let blocks = vec![
            block("s1", 9, 0, 30),
            block("s1", 10, 0, 30),  // 30m gap: kept
            block("s1", 12, 30, 30), // 120m gap: kept
            block("s1", 13, 20, 30), // 20m gap: too small
            block("s1", 16, 0, 30),  // 130m gap: too large
        ];
        let gaps: Vec<u32> = detect_idle_slots(&blocks, IdleSlotWindow::default())
            .iter()
            .map(|s| s.gap_size_minutes)
            .collect();
        assert_eq!(gaps, vec![30, 120]);
    }

    #[test]
    fn test_staff_are_independent_and_overlaps_skipped() {
        let blocks = vec![
            block("s2", 10, 0, 60),
            block("s1", 10, 0, 30),
            block("s2", 10, 30, 30), // overlaps
            block("s1", 11, 0, 30),
        ];
        let slots = detect_idle_slots(&blocks, IdleSlotWindow::default());
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].staff_id, "s1");
    }

    #[test]
    fn test_pick_slot() {
        let blocks = vec![
            block("s1", 9, 0, 30),
            block("s1", 10, 0, 30),
            block("s2", 9, 0, 30),
            block("s2", 11, 0, 30),
        ];
        let slots = detect_idle_slots(&blocks, IdleSlotWindow::default());
        assert_eq!(pick_slot(&slots, None).unwrap().staff_id, "s2");
        assert_eq!(pick_slot(&slots, Some("s1")).unwrap().gap_size_minutes, 30);
        assert!(pick_slot(&slots, Some("s9")).is_none());
    }

    #[test]
    fn test_window_validation() {
        assert!(IdleSlotWindow::default().validate().is_ok());
        let bad = IdleSlotWindow {
            min_gap_minutes: 60,
            max_gap_minutes: 30,
        };
        assert!(bad.validate().is_err());
    }
}
