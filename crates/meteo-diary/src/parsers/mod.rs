//! Page parsers. Each one writes into a pre-created [`ForecastCollection`]
//! and reports what it touched; shape misses inside a cell or row never stop
//! the remaining days.
//!
//! [`ForecastCollection`]: crate::model::ForecastCollection

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::TemperatureError;

pub mod diary;
pub mod upcoming;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseIssue {
    #[error("{date}: {error}")]
    Temperature {
        date: NaiveDate,
        error: TemperatureError,
    },
    #[error("row {row}: unreadable day number")]
    UnreadableDay { row: usize },
    #[error("row {row}: day {day} does not exist in {year}-{month:02}")]
    InvalidDate {
        row: usize,
        year: i32,
        month: u32,
        day: u32,
    },
    #[error("{0}: outside the requested window")]
    OutsideWindow(NaiveDate),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageReport {
    pub populated: Vec<NaiveDate>,
    pub removed: Vec<NaiveDate>,
    pub issues: Vec<ParseIssue>,
}

impl PageReport {
    pub(crate) fn reject_reading(&mut self, date: NaiveDate, error: TemperatureError) {
        match error {
            TemperatureError::Empty => log::debug!("{date}: empty temperature reading skipped"),
            error => self.issues.push(ParseIssue::Temperature { date, error }),
        }
    }
}
