//! Schedule text rendering
//!
//! Pure functions only. The weekend check runs before the empty check, so a
//! Saturday with entries still renders as a day off.

use chrono::{Datelike, NaiveDate};

use crate::calendar::{format_date, is_weekend, weekday_name};
use crate::models::{ScheduleDay, ScheduleEntry};

pub const DAY_OFF: &str = "Выходной день. Нет расписания.";
pub const NO_CLASSES: &str = "Нет пар на этот день.";

const UNKNOWN_TIME: &str = "Неизвестно";
const UNKNOWN_SUBJECT: &str = "Неизвестный предмет";
const UNKNOWN_ROOM: &str = "Неизвестная аудитория";
const UNKNOWN_TEACHER: &str = "Неизвестный преподаватель";

/// Render the schedule body for one date
pub fn format_schedule(date: NaiveDate, entries: &[ScheduleEntry]) -> String {
    if is_weekend(date) {
        return DAY_OFF.to_string();
    }
    if entries.is_empty() {
        return NO_CLASSES.to_string();
    }

    entries
        .iter()
        .map(format_entry)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_entry(entry: &ScheduleEntry) -> String {
    format!(
        "🕒 {} - {} 🕒\n📖 {}\n🚪 {}\n👨‍🏫 {}",
        entry.start_time.as_deref().unwrap_or(UNKNOWN_TIME),
        entry.end_time.as_deref().unwrap_or(UNKNOWN_TIME),
        entry.subject.as_deref().unwrap_or(UNKNOWN_SUBJECT),
        entry.room.as_deref().unwrap_or(UNKNOWN_ROOM),
        entry.teacher.as_deref().unwrap_or(UNKNOWN_TEACHER),
    )
}

/// Single-day reply with its date header
pub fn format_day_reply(day: &ScheduleDay) -> String {
    format!(
        "📆 {} - Расписание:\n\n{}",
        format_date(day.date),
        format_schedule(day.date, &day.entries)
    )
}

/// Week reply, one section per day
pub fn format_week(days: &[ScheduleDay]) -> String {
    days.iter()
        .map(|day| {
            format!(
                "📅 {} ({}):\n{}\n",
                weekday_name(day.date.weekday()),
                format_date(day.date),
                format_schedule(day.date, &day.entries)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
