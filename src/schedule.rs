// src/schedule.rs
//! Day-of-week eligibility. Pure functions, evaluated once per run against the
//! invocation's local calendar day.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleRule {
    /// Monday to Friday.
    WeekdaysOnly,
    EveryDay,
    SundaysOnly,
}

impl ScheduleRule {
    /// `weekday` is 0 (Monday) through 6 (Sunday).
    pub fn allows(self, weekday: u32) -> bool {
        match self {
            ScheduleRule::WeekdaysOnly => weekday < 5,
            ScheduleRule::EveryDay => true,
            ScheduleRule::SundaysOnly => weekday == 6,
        }
    }

    pub fn allows_on(self, day: NaiveDate) -> bool {
        self.allows(weekday_index(day))
    }

    pub fn describe(self) -> &'static str {
        match self {
            ScheduleRule::WeekdaysOnly => "only runs Monday-Friday",
            ScheduleRule::EveryDay => "runs every day",
            ScheduleRule::SundaysOnly => "only runs on Sundays",
        }
    }
}

pub fn weekday_index(day: NaiveDate) -> u32 {
    day.weekday().num_days_from_monday()
}

pub fn weekday_name(day: NaiveDate) -> &'static str {
    WEEKDAY_NAMES[weekday_index(day) as usize]
}
