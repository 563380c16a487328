//! Schedule models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One class as returned by the school schedule API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(rename = "started_at", default)]
    pub start_time: Option<String>,
    #[serde(rename = "finished_at", default)]
    pub end_time: Option<String>,
    #[serde(rename = "subject_name", default)]
    pub subject: Option<String>,
    #[serde(rename = "room_name", default)]
    pub room: Option<String>,
    #[serde(rename = "teacher_name", default)]
    pub teacher: Option<String>,
}

impl ScheduleEntry {
    pub fn new(start: &str, end: &str, subject: &str, room: &str, teacher: &str) -> Self {
        Self {
            start_time: Some(start.to_string()),
            end_time: Some(end.to_string()),
            subject: Some(subject.to_string()),
            room: Some(room.to_string()),
            teacher: Some(teacher.to_string()),
        }
    }
}

/// Entries for a single date, fetched fresh for every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDay {
    pub date: NaiveDate,
    pub entries: Vec<ScheduleEntry>,
}
