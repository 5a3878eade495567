use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NBSP_ENTITY: &str = "&nbsp;";
const NBSP_CHAR: char = '\u{a0}';
const TYPOGRAPHIC_MINUS: char = '\u{2212}';

/// Canonical identity of a catalog city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityReference {
    pub id: String,
    pub display_name: String,
    pub transliterated_name: String,
    /// Site-relative path of the city's forecast pages, e.g. `/weather-moscow-4368/`.
    pub source_path: String,
}

/// Closed date interval, `since <= until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastWindow {
    since: NaiveDate,
    until: NaiveDate,
}

impl ForecastWindow {
    /// Builds a window, collapsing an inverted range to the single day `since`.
    pub fn new(since: NaiveDate, until: NaiveDate) -> Self {
        Self {
            since,
            until: until.max(since),
        }
    }

    pub fn since(&self) -> NaiveDate {
        self.since
    }

    pub fn until(&self) -> NaiveDate {
        self.until
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.since <= date && date <= self.until
    }

    pub fn len_days(&self) -> u64 {
        (self.until - self.since).num_days().unsigned_abs() + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let until = self.until;
        self.since.iter_days().take_while(move |date| *date <= until)
    }
}

/// Pipeline that populated a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastSource {
    Upcoming,
    Diary,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemperatureError {
    #[error("temperature reading is empty")]
    Empty,
    #[error("malformed temperature reading: {0:?}")]
    Malformed(String),
}

/// Parses a signed integer reading such as `+7`, `-5` or `−12`.
pub fn parse_temperature(raw: &str) -> Result<i32, TemperatureError> {
    let normalized = raw
        .replace(TYPOGRAPHIC_MINUS, "-")
        .replace(NBSP_CHAR, "")
        .replace('°', "");
    let value = normalized.trim();
    if value.is_empty() {
        return Err(TemperatureError::Empty);
    }
    value
        .parse::<i32>()
        .map_err(|_| TemperatureError::Malformed(raw.trim().to_string()))
}

pub fn format_signed(value: i32) -> String {
    if value > 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

pub fn format_signed_tenths(value: f64) -> String {
    if value > 0.0 {
        format!("+{value:.1}")
    } else if value == 0.0 {
        "0.0".to_string()
    } else {
        format!("{value:.1}")
    }
}

fn normalize_text(raw: &str) -> String {
    raw.replace(NBSP_ENTITY, " ").replace(NBSP_CHAR, " ")
}

fn round1(value: f64) -> f64 {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// One calendar day of weather. Temperatures are kept as raw observations;
/// max, min and mean are derived on every read.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    date: NaiveDate,
    pub city: String,
    pub city_translit: String,
    cloudiness: String,
    precipitation: String,
    observations: Vec<i32>,
    source: Option<ForecastSource>,
}

impl Forecast {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            city: String::new(),
            city_translit: String::new(),
            cloudiness: String::new(),
            precipitation: String::new(),
            observations: Vec::new(),
            source: None,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn set_city(&mut self, city: &CityReference) {
        self.city = city.display_name.clone();
        self.city_translit = city.transliterated_name.clone();
    }

    pub fn cloudiness(&self) -> &str {
        &self.cloudiness
    }

    pub fn precipitation(&self) -> &str {
        &self.precipitation
    }

    /// `None` keeps the current value.
    pub fn set_cloudiness(&mut self, text: Option<&str>) {
        if let Some(text) = text {
            self.cloudiness = normalize_text(text);
        }
    }

    /// `None` keeps the current value.
    pub fn set_precipitation(&mut self, text: Option<&str>) {
        if let Some(text) = text {
            self.precipitation = normalize_text(text);
        }
    }

    pub fn source(&self) -> Option<ForecastSource> {
        self.source
    }

    pub fn mark_source(&mut self, source: ForecastSource) {
        self.source = Some(source);
    }

    /// Parses one raw reading and appends it to the observations.
    pub fn add_temperature_observation(&mut self, raw: &str) -> Result<i32, TemperatureError> {
        let value = parse_temperature(raw)?;
        self.observations.push(value);
        Ok(value)
    }

    pub fn add_observation(&mut self, value: i32) {
        self.observations.push(value);
    }

    pub fn observations(&self) -> &[i32] {
        &self.observations
    }

    pub fn has_data(&self) -> bool {
        !self.observations.is_empty()
    }

    pub fn max_temp(&self) -> Option<i32> {
        self.observations.iter().copied().max()
    }

    pub fn min_temp(&self) -> Option<i32> {
        self.observations.iter().copied().min()
    }

    pub fn avg_temp(&self) -> Option<f64> {
        if self.observations.is_empty() {
            return None;
        }
        let sum: i64 = self.observations.iter().map(|value| i64::from(*value)).sum();
        Some(round1(sum as f64 / self.observations.len() as f64))
    }

    pub fn max_label(&self) -> Option<String> {
        self.max_temp().map(format_signed)
    }

    pub fn min_label(&self) -> Option<String> {
        self.min_temp().map(format_signed)
    }

    pub fn avg_label(&self) -> Option<String> {
        self.avg_temp().map(format_signed_tenths)
    }

    /// `"cloudiness, precipitation"`, or cloudiness alone.
    pub fn cloud_precip(&self) -> String {
        if self.precipitation.is_empty() {
            return self.cloudiness.clone();
        }
        format!("{}, {}", self.cloudiness, self.precipitation)
    }

    pub fn weekday(&self) -> &'static str {
        match self.date.weekday() {
            Weekday::Mon => "Пн",
            Weekday::Tue => "Вт",
            Weekday::Wed => "Ср",
            Weekday::Thu => "Чт",
            Weekday::Fri => "Пт",
            Weekday::Sat => "Сб",
            Weekday::Sun => "Вс",
        }
    }

    pub fn to_output_day(&self) -> ForecastDay {
        ForecastDay {
            date: self.date.format("%Y-%m-%d").to_string(),
            weekday: self.weekday().to_string(),
            max_temp_c: self.max_temp(),
            min_temp_c: self.min_temp(),
            avg_temp_c: self.avg_temp(),
            cloudiness: Some(self.cloudiness.clone()).filter(|value| !value.is_empty()),
            precipitation: Some(self.precipitation.clone()).filter(|value| !value.is_empty()),
            source: self.source,
        }
    }
}

/// Date-ordered result of one collection request.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastCollection {
    pub city: CityReference,
    days: BTreeMap<NaiveDate, Forecast>,
    trace: Vec<String>,
}

impl ForecastCollection {
    pub fn new(city: CityReference) -> Self {
        Self {
            city,
            days: BTreeMap::new(),
            trace: Vec::new(),
        }
    }

    /// Pre-creates one empty record per day of `window`.
    pub fn for_window(city: CityReference, window: ForecastWindow) -> Self {
        let mut collection = Self::new(city);
        for date in window.days() {
            collection.days.insert(date, Forecast::new(date));
        }
        collection
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Forecast> {
        self.days.get(&date)
    }

    pub fn get_mut(&mut self, date: NaiveDate) -> Option<&mut Forecast> {
        self.days.get_mut(&date)
    }

    pub fn remove(&mut self, date: NaiveDate) -> Option<Forecast> {
        self.days.remove(&date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn has_data(&self) -> bool {
        self.days.values().any(Forecast::has_data)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn forecasts(&self) -> impl Iterator<Item = &Forecast> {
        self.days.values()
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub fn push_trace(&mut self, event: impl Into<String>) {
        self.trace.push(event.into());
    }

    pub fn to_output(&self) -> ForecastOutput {
        ForecastOutput {
            city: self.city.clone(),
            forecast: self.days.values().map(Forecast::to_output_day).collect(),
            trace: self.trace.clone(),
        }
    }
}

/// Whole days from `start` to `date`, negative when `date` is earlier.
pub fn day_offset(start: NaiveDate, date: NaiveDate) -> i64 {
    (date - start).num_days()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub weekday: String,
    pub max_temp_c: Option<i32>,
    pub min_temp_c: Option<i32>,
    pub avg_temp_c: Option<f64>,
    pub cloudiness: Option<String>,
    pub precipitation: Option<String>,
    pub source: Option<ForecastSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutput {
    pub city: CityReference,
    pub forecast: Vec<ForecastDay>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    #[test]
    fn window_collapses_inverted_range_to_since() {
        let window = ForecastWindow::new(date(2020, 3, 10), date(2020, 3, 1));
        assert_eq!(window.since(), date(2020, 3, 10));
        assert_eq!(window.until(), date(2020, 3, 10));
        assert_eq!(window.len_days(), 1);
    }

    #[test]
    fn window_days_are_inclusive() {
        let window = ForecastWindow::new(date(2020, 2, 27), date(2020, 3, 2));
        let days: Vec<_> = window.days().collect();
        assert_eq!(days.len(), 5);
        assert_eq!(days.first(), Some(&date(2020, 2, 27)));
        assert_eq!(days.last(), Some(&date(2020, 3, 2)));
    }

    #[test]
    fn empty_forecast_reports_no_value() {
        let forecast = Forecast::new(date(2020, 3, 1));
        assert!(!forecast.has_data());
        assert_eq!(forecast.max_temp(), None);
        assert_eq!(forecast.min_temp(), None);
        assert_eq!(forecast.avg_temp(), None);
        assert_eq!(forecast.max_label(), None);
    }

    #[test]
    fn single_negative_observation_renders_without_plus() {
        let mut forecast = Forecast::new(date(2020, 3, 1));
        forecast.add_temperature_observation("-5").expect("reading");
        assert_eq!(forecast.max_temp(), Some(-5));
        assert_eq!(forecast.min_temp(), Some(-5));
        assert_eq!(forecast.max_label().as_deref(), Some("-5"));
        assert_eq!(forecast.min_label().as_deref(), Some("-5"));
    }

    #[test]
    fn single_positive_observation_renders_with_plus() {
        let mut forecast = Forecast::new(date(2020, 3, 1));
        forecast.add_temperature_observation("+7").expect("reading");
        assert_eq!(forecast.max_label().as_deref(), Some("+7"));
        assert_eq!(forecast.min_label().as_deref(), Some("+7"));
    }

    #[test]
    fn zero_renders_without_sign() {
        assert_eq!(format_signed(0), "0");
        assert_eq!(format_signed_tenths(0.0), "0.0");
        assert_eq!(format_signed_tenths(-2.5), "-2.5");
    }

    #[test]
    fn typographic_minus_is_accepted() {
        assert_eq!(parse_temperature("\u{2212}12"), Ok(-12));
        assert_eq!(parse_temperature(" +3 "), Ok(3));
    }

    #[test]
    fn malformed_reading_is_rejected_not_zeroed() {
        let mut forecast = Forecast::new(date(2020, 3, 1));
        let error = forecast
            .add_temperature_observation("warm")
            .expect_err("must fail");
        assert_eq!(error, TemperatureError::Malformed("warm".to_string()));
        assert_eq!(
            forecast.add_temperature_observation("  "),
            Err(TemperatureError::Empty)
        );
        assert!(!forecast.has_data());
    }

    #[test]
    fn average_is_true_mean_not_midpoint() {
        let mut forecast = Forecast::new(date(2020, 3, 1));
        for raw in ["3", "3", "10"] {
            forecast.add_temperature_observation(raw).expect("reading");
        }
        assert_eq!(forecast.max_temp(), Some(10));
        assert_eq!(forecast.min_temp(), Some(3));
        assert_eq!(forecast.avg_temp(), Some(5.3));
        assert_eq!(forecast.avg_label().as_deref(), Some("+5.3"));
    }

    #[test]
    fn repeated_observation_shifts_average_only() {
        let mut forecast = Forecast::new(date(2020, 3, 1));
        forecast.add_observation(2);
        forecast.add_observation(8);
        assert_eq!(forecast.avg_temp(), Some(5.0));

        forecast.add_observation(8);
        assert_eq!(forecast.max_temp(), Some(8));
        assert_eq!(forecast.min_temp(), Some(2));
        assert_eq!(forecast.avg_temp(), Some(6.0));
    }

    #[test]
    fn text_setters_normalize_nbsp_and_ignore_absent_input() {
        let mut forecast = Forecast::new(date(2020, 3, 1));
        forecast.set_cloudiness(Some("Малооблачно&nbsp;днём"));
        forecast.set_precipitation(Some("небольшой\u{a0}дождь"));
        forecast.set_cloudiness(None);
        forecast.set_precipitation(None);

        assert_eq!(forecast.cloudiness(), "Малооблачно днём");
        assert_eq!(forecast.precipitation(), "небольшой дождь");
        assert_eq!(forecast.cloud_precip(), "Малооблачно днём, небольшой дождь");
    }

    #[test]
    fn cloud_precip_omits_empty_precipitation() {
        let mut forecast = Forecast::new(date(2020, 3, 1));
        forecast.set_cloudiness(Some("Ясно"));
        assert_eq!(forecast.cloud_precip(), "Ясно");
        assert_eq!(forecast.to_output_day().precipitation, None);
    }

    #[test]
    fn collection_for_window_precreates_every_day() {
        let city = CityReference {
            id: "4368".to_string(),
            display_name: "Москва".to_string(),
            transliterated_name: "moscow".to_string(),
            source_path: "/weather-moscow-4368/".to_string(),
        };
        let window = ForecastWindow::new(date(2020, 1, 30), date(2020, 2, 2));
        let mut collection = ForecastCollection::for_window(city, window);

        assert_eq!(collection.len(), 4);
        assert!(!collection.has_data());
        assert!(collection.remove(date(2020, 1, 31)).is_some());
        assert_eq!(
            collection.dates().collect::<Vec<_>>(),
            vec![date(2020, 1, 30), date(2020, 2, 1), date(2020, 2, 2)]
        );
    }

    #[test]
    fn weekday_uses_source_locale() {
        let labels: Vec<_> = (16..=22)
            .map(|day| Forecast::new(date(2020, 3, day)).weekday())
            .collect();
        assert_eq!(labels, vec!["Пн", "Вт", "Ср", "Чт", "Пт", "Сб", "Вс"]);
    }
}
