use super::model::{DayPeriod, Season, WeekPart};
use crate::error::DomainError;

const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Winter = Dec–Feb, Spring = Mar–May, Summer = Jun–Aug, Autumn = Sep–Nov.
pub fn season_of(month: u32) -> Result<Season, DomainError> {
    match month {
        12 | 1 | 2 => Ok(Season::Winter),
        3..=5 => Ok(Season::Spring),
        6..=8 => Ok(Season::Summer),
        9..=11 => Ok(Season::Autumn),
        _ => Err(DomainError::Month(month)),
    }
}

pub fn day_or_night_of(hour: u32) -> Result<DayPeriod, DomainError> {
    match hour {
        8..=19 => Ok(DayPeriod::Day),
        0..=7 | 20..=23 => Ok(DayPeriod::Night),
        _ => Err(DomainError::Hour(hour)),
    }
}

/// `weekday` counts from Monday = 0.
pub fn weekday_class_of(weekday: u32) -> Result<WeekPart, DomainError> {
    match weekday {
        0..=4 => Ok(WeekPart::Weekday),
        5 | 6 => Ok(WeekPart::Weekend),
        _ => Err(DomainError::Weekday(weekday)),
    }
}

pub fn weekday_name(weekday: u32) -> Result<&'static str, DomainError> {
    WEEKDAY_NAMES
        .get(weekday as usize)
        .copied()
        .ok_or(DomainError::Weekday(weekday))
}

pub fn month_name(month: u32) -> Result<&'static str, DomainError> {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
        .ok_or(DomainError::Month(month))
}
