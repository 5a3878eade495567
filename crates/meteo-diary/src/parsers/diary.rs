use std::collections::HashMap;

use chrono::NaiveDate;
use log::{debug, warn};
use scraper::{ElementRef, Html, Selector};

use crate::document::{
    DIARY_CLOUDINESS_COLUMN, DIARY_DAY_TEMP_COLUMN, DIARY_EVENING_TEMP_COLUMN,
    DIARY_PRECIPITATION_COLUMN, DiaryTable, icon_file_name, selector, text_of,
};
use crate::model::{CityReference, ForecastCollection, ForecastSource};
use crate::pagination::DiaryPage;

use super::{PageReport, ParseIssue};

/// Cloudiness icon the diary shows for days it has no record of.
pub const NO_DATA_ICON: &str = "still.gif";

const LEGEND_SELECTOR: &str =
    "#cloudness_labels > .label_smallsize, #precipitations_labels > .label_bigsize";
const DEFINITION_TAG: &str = "dl";

/// Icon file name to human-readable label, read from a diary page legend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconLegend {
    labels: HashMap<String, String>,
}

impl IconLegend {
    pub fn from_document(document: &Html) -> Self {
        let (Some(groups), Some(images), Some(definitions)) = (
            selector(LEGEND_SELECTOR),
            selector("img"),
            selector(DEFINITION_TAG),
        ) else {
            return Self::default();
        };

        let mut labels = HashMap::new();
        for group in document.select(&groups) {
            let Some(label) = following_definition(group, &definitions) else {
                continue;
            };
            for image in group.select(&images) {
                if let Some(code) = image.value().attr("src").and_then(icon_file_name) {
                    labels.insert(code.to_string(), label.clone());
                }
            }
        }
        Self { labels }
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Text of the first `<dl>` at or after `group` in document order.
fn following_definition(group: ElementRef<'_>, definitions: &Selector) -> Option<String> {
    if let Some(found) = group.select(definitions).next() {
        return Some(text_of(found));
    }

    let mut node = Some(*group);
    while let Some(current) = node {
        for sibling in current.next_siblings().filter_map(ElementRef::wrap) {
            if sibling.value().name() == DEFINITION_TAG {
                return Some(text_of(sibling));
            }
            if let Some(found) = sibling.select(definitions).next() {
                return Some(text_of(found));
            }
        }
        node = current.parent();
    }
    None
}

/// Fills the rows `page.since_day..=page.until_day` of one diary month page.
/// Days the diary marks with [`NO_DATA_ICON`] are removed from `collection`.
pub fn parse_diary_page(
    document: &Html,
    page: DiaryPage,
    legend: &IconLegend,
    city: &CityReference,
    collection: &mut ForecastCollection,
) -> PageReport {
    let table = DiaryTable::from_document(document);
    let mut report = PageReport::default();

    for row in table.rows_between(page.since_day, page.until_day) {
        let Some(day) = row.day_number() else {
            report.issues.push(ParseIssue::UnreadableDay { row: row.index() });
            continue;
        };
        let Some(date) = NaiveDate::from_ymd_opt(page.year, page.month, day) else {
            report.issues.push(ParseIssue::InvalidDate {
                row: row.index(),
                year: page.year,
                month: page.month,
                day,
            });
            continue;
        };

        let cloud_icon = row.icon(DIARY_CLOUDINESS_COLUMN);
        let cloudiness = cloud_icon.as_deref().and_then(|code| legend.label(code));
        if cloudiness.is_none() && cloud_icon.as_deref() == Some(NO_DATA_ICON) {
            if collection.remove(date).is_some() {
                debug!("{date}: no diary record, day removed");
                report.removed.push(date);
            }
            continue;
        }

        let Some(forecast) = collection.get_mut(date) else {
            warn!("{date}: diary row outside the requested window");
            report.issues.push(ParseIssue::OutsideWindow(date));
            continue;
        };

        forecast.set_city(city);
        forecast.mark_source(ForecastSource::Diary);
        match (&cloud_icon, cloudiness) {
            (_, Some(label)) => forecast.set_cloudiness(Some(label)),
            (Some(code), None) => debug!("{date}: unmapped cloudiness icon {code}"),
            (None, None) => {}
        }
        if let Some(code) = row.icon(DIARY_PRECIPITATION_COLUMN) {
            forecast.set_precipitation(Some(legend.label(&code).unwrap_or_default()));
        }

        for column in [DIARY_DAY_TEMP_COLUMN, DIARY_EVENING_TEMP_COLUMN] {
            let Some(raw) = row.column_text(column) else {
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
