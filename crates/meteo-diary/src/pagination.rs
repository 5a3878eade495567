use chrono::Datelike;

use crate::model::ForecastWindow;

/// Row index used for the trailing edge of a full month; the page simply
/// has fewer rows in shorter months.
pub const LAST_ROW: u32 = 31;

/// One month page of the diary and the row range to read from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiaryPage {
    pub year: i32,
    pub month: u32,
    pub since_day: u32,
    pub until_day: u32,
}

/// Enumerates the month pages covering `window`, oldest first.
pub fn diary_pages(window: ForecastWindow) -> Vec<DiaryPage> {
    let (first_year, first_month) = (window.since().year(), window.since().month());
    let (last_year, last_month) = (window.until().year(), window.until().month());

    let mut pages = Vec::new();
    let (mut year, mut month) = (first_year, first_month);
    loop {
        let is_first = year == first_year && month == first_month;
        let is_last = year == last_year && month == last_month;
        pages.push(DiaryPage {
            year,
            month,
            since_day: if is_first { window.since().day() } else { 1 },
            until_day: if is_last { window.until().day() } else { LAST_ROW },
        });
        if is_last {
            break;
        }
        (year, month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
    }
    pages
}
