//! Data models for Timetable

mod schedule;
mod user;

pub use schedule::*;
pub use user::*;
