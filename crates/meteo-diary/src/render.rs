use crate::catalog::CatalogEntry;
use crate::model::Forecast;

const TABLE_WIDTH: usize = 17;
const HALF_WIDTH: usize = 8;
const MISSING_VALUE: &str = "-";

/// Bordered console table for one day:
///
/// ```text
/// +-----------------+
/// | 18.03.2020, Ср  |
/// +--------+--------+
/// | t°C От | t°C До |
/// |   -5   |   +2   |
/// +--------+--------+
/// |  Ясно, Дождь    |
/// +-----------------+
/// ```
pub fn day_table(forecast: &Forecast) -> String {
    let full_rule = format!("+{}+", "-".repeat(TABLE_WIDTH));
    let split_rule = format!("+{0}+{0}+", "-".repeat(HALF_WIDTH));
    let title = format!("{}, {}", forecast.date().format("%d.%m.%Y"), forecast.weekday());
    let min = forecast.min_label().unwrap_or_else(|| MISSING_VALUE.to_string());
    let max = forecast.max_label().unwrap_or_else(|| MISSING_VALUE.to_string());

    [
        full_rule.clone(),
        format!("|{title:^TABLE_WIDTH$}|"),
        split_rule.clone(),
        format!("|{:^HALF_WIDTH$}|{:^HALF_WIDTH$}|", "t°C От", "t°C До"),
        format!("|{min:^HALF_WIDTH$}|{max:^HALF_WIDTH$}|"),
        split_rule,
        format!("|{:^TABLE_WIDTH$}|", forecast.cloud_precip()),
        full_rule,
    ]
    .join("\n")
}

/// All day tables for `city`, or one line when no day carries data.
pub fn forecast_report<'a, I>(city: &str, days: I) -> String
where
    I: IntoIterator<Item = &'a Forecast>,
{
    let days: Vec<&Forecast> = days.into_iter().collect();
    if !days.iter().any(|day| day.has_data()) {
        return format!("{city}: no forecast data for the requested period");
    }

    let mut sections = vec![format!("{city}:")];
    sections.extend(days.into_iter().map(day_table));
    sections.join("\n")
}

pub fn catalog_listing(entries: &[CatalogEntry]) -> String {
    let width = entries
        .iter()
        .map(|entry| entry.display_name.chars().count())
        .max()
        .unwrap_or(0);
    entries
        .iter()
        .map(|entry| format!("{:<width$}  {}", entry.display_name, entry.source_path))
        .collect::<Vec<_>>()
        .join("\n")
}
