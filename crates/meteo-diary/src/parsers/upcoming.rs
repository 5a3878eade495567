use chrono::NaiveDate;
use log::debug;
use scraper::Html;

use crate::document::DayGrid;
use crate::model::{CityReference, ForecastCollection, ForecastSource, ForecastWindow, day_offset};

use super::{PageReport, ParseIssue};

/// Splits `"Облачно, небольшой дождь"` into cloudiness and precipitation at
/// the first `", "`.
pub fn split_description(text: &str) -> (&str, Option<&str>) {
    match text.split_once(", ") {
        Some((cloudiness, precipitation)) => (cloudiness, Some(precipitation)),
        None => (text, None),
    }
}

/// Fills the days of `window` from a month grid whose first cell is
/// `grid_start`.
pub fn parse_month_grid(
    document: &Html,
    window: ForecastWindow,
    grid_start: NaiveDate,
    city: &CityReference,
    collection: &mut ForecastCollection,
) -> PageReport {
    let grid = DayGrid::from_document(document);
    let mut report = PageReport::default();

    for date in window.days() {
        let Some(cell) = grid.cell(day_offset(grid_start, date)) else {
            debug!("{date}: no grid cell");
            continue;
        };
        let Some(forecast) = collection.get_mut(date) else {
            report.issues.push(ParseIssue::OutsideWindow(date));
            continue;
        };

        forecast.set_city(city);
        forecast.mark_source(ForecastSource::Upcoming);

        match cell.description() {
            Some(text) => {
                let (cloudiness, precipitation) = split_description(text);
                forecast.set_cloudiness(Some(cloudiness));
                forecast.set_precipitation(precipitation);
            }
            None => debug!("{date}: no description on grid cell"),
        }

        for (label, reading) in [("max", cell.max_reading()), ("min", cell.min_reading())] {
            let Some(raw) = reading else {
                debug!("{date}: no {label} temperature cell");
                continue;
            };
            if let Err(error) = forecast.add_temperature_observation(&raw) {
                report.reject_reading(date, error);
            }
        }

        report.populated.push(date);
    }

    report
}
