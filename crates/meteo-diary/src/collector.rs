use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Europe::Moscow;
use log::{debug, info, warn};

use crate::cache::SourceCache;
use crate::catalog::{CityCatalog, default_city};
use crate::config::SourceUrls;
use crate::loader::{DocumentLoader, LoadError};
use crate::model::{CityReference, ForecastCollection, ForecastWindow};
use crate::pagination::diary_pages;
use crate::parsers::PageReport;
use crate::parsers::diary::parse_diary_page;
use crate::parsers::upcoming::parse_month_grid;
use crate::window::{partition, week_start};

/// Calendar day at the source, which publishes on Moscow time.
pub fn source_today() -> NaiveDate {
    Utc::now().with_timezone(&Moscow).date_naive()
}

/// Collects per-day forecasts for one city and date window. Pages are
/// fetched one at a time through the loader; a failed page leaves its days
/// as they are and collection moves on.
pub struct ForecastCollector<L> {
    loader: L,
    cache: Arc<SourceCache>,
    urls: SourceUrls,
}

impl<L: DocumentLoader> ForecastCollector<L> {
    pub fn new(loader: L, cache: Arc<SourceCache>, urls: SourceUrls) -> Self {
        Self {
            loader,
            cache,
            urls,
        }
    }

    pub fn catalog(&self) -> Result<&CityCatalog, LoadError> {
        self.cache.catalog_or_fetch(&self.loader, &self.urls)
    }

    /// Resolves `location` against the catalog. Unknown text and an
    /// unavailable catalog both resolve to the default city; the latter also
    /// returns a trace event.
    pub fn resolve_city(&self, location: &str) -> (CityReference, Option<String>) {
        match self.catalog() {
            Ok(catalog) => {
                let city = catalog.resolve(location);
                if catalog.find(location).is_none() {
                    debug!("'{}' not in catalog, using {}", location.trim(), city.display_name);
                }
                (city, None)
            }
            Err(error) => {
                let city = default_city();
                warn!("catalog unavailable ({error}), using {}", city.display_name);
                (city, Some(format!("catalog: {error}")))
            }
        }
    }

    pub fn collect_forecast(
        &self,
        location: &str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> ForecastCollection {
        self.collect_forecast_on(location, since, until, source_today())
    }

    /// [`collect_forecast`](Self::collect_forecast) against a fixed `today`.
    pub fn collect_forecast_on(
        &self,
        location: &str,
        since: NaiveDate,
        until: NaiveDate,
        today: NaiveDate,
    ) -> ForecastCollection {
        let (city, catalog_event) = self.resolve_city(location);
        let plan = partition(since, until, today);
        info!(
            "collecting {} {}..{} ({:?})",
            city.display_name,
            plan.window.since(),
            plan.window.until(),
            plan.kind
        );

        let mut collection = ForecastCollection::for_window(city.clone(), plan.window);
        if let Some(event) = catalog_event {
            collection.push_trace(event);
        }

        if let Some(historical) = plan.historical {
            self.collect_diary(historical, &city, &mut collection);
        }
        if let Some(upcoming) = plan.upcoming {
            self.collect_upcoming(upcoming, today, &city, &mut collection);
        }
        collection
    }

    fn collect_diary(
        &self,
        window: ForecastWindow,
        city: &CityReference,
        collection: &mut ForecastCollection,
    ) {
        for page in diary_pages(window) {
            let label = format!("diary {}-{:02}", page.year, page.month);
            let url = self.urls.diary(&city.id, page.year, page.month);
            let document = match self.loader.fetch(&url) {
                Ok(document) => document,
                Err(error) => {
                    warn!("{label}: {error}");
                    collection.push_trace(format!("{label}: {error}"));
                    continue;
                }
            };

            let legend = self.cache.icon_legend_or_init(&document);
            let report = parse_diary_page(&document, page, &legend, city, collection);
            record_report(&label, report, collection);
        }
    }

    fn collect_upcoming(
        &self,
        window: ForecastWindow,
        today: NaiveDate,
        city: &CityReference,
        collection: &mut ForecastCollection,
    ) {
        let label = "month grid";
        let url = self.urls.month_grid(&city.source_path);
        let document = match self.loader.fetch(&url) {
            Ok(document) => document,
            Err(error) => {
                warn!("{label}: {error}");
                collection.push_trace(format!("{label}: {error}"));
                return;
            }
        };

        let report = parse_month_grid(&document, window, week_start(today), city, collection);
        record_report(label, report, collection);
    }
}

fn record_report(label: &str, report: PageReport, collection: &mut ForecastCollection) {
    debug!(
        "{label}: {} days populated, {} removed",
        report.populated.len(),
        report.removed.len()
    );
    for issue in report.issues {
        warn!("{label}: {issue}");
        collection.push_trace(format!("{label}: {issue}"));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use scraper::Html;

    use super::*;
    use crate::catalog::DEFAULT_CITY_NAME;
    use crate::model::ForecastSource;

    const BASE: &str = "https://www.gismeteo.ru";

    struct FakeLoader {
        pages: HashMap<String, Result<String, LoadError>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeLoader {
        fn new() -> Self {
            let mut loader = Self {
                pages: HashMap::new(),
                calls: RefCell::new(Vec::new()),
            };
            loader.page("/catalog/russia/", catalog_page());
            loader
        }

        fn page(&mut self, path: &str, body: String) {
            self.pages.insert(format!("{BASE}{path}"), Ok(body));
        }

        fn fail(&mut self, path: &str, error: LoadError) {
            self.pages.insert(format!("{BASE}{path}"), Err(error));
        }

        fn calls(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|url| url.trim_start_matches(BASE).to_string())
                .collect()
        }
    }

    impl DocumentLoader for FakeLoader {
        fn fetch(&self, url: &str) -> Result<Html, LoadError> {
            self.calls.borrow_mut().push(url.to_string());
            match self.pages.get(url) {
                Some(Ok(body)) => Ok(Html::parse_document(body)),
                Some(Err(error)) => Err(error.clone()),
                None => Err(LoadError::Http {
                    status: 404,
                    message: "Not Found".to_string(),
                }),
            }
        }
    }

    fn catalog_page() -> String {
        r#"<div><div class="catalog_side">
            <div class="catalog_item"><a href="/weather-sochi-5233/">Сочи</a></div>
            <div class="catalog_item"><a href="/weather-moscow-4368/">Москва</a></div>
        </div></div>"#
            .to_string()
    }

    const LEGEND: &str = r#"
        <div id="cloudness_labels">
            <div class="label_smallsize"><img src="/img/sun.png"><dl>Ясно</dl></div>
        </div>
        <div id="precipitations_labels">
            <div class="label_bigsize"><img src="/img/rain.png"><dl>Дождь</dl></div>
        </div>"#;

    fn diary_page(days: u32, with_legend: bool, missing: &[u32]) -> String {
        let mut rows = String::new();
        for day in 1..=days {
            let icon = if missing.contains(&day) {
                "still.gif"
            } else {
                "sun.png"
            };
            rows.push_str(&format!(
                r#"<tr><td>{day}</td><td>+{day}</td><td>757</td><td><img src="/img/{icon}"></td><td><img src="/img/rain.png"></td><td>2</td><td>&minus;{day}</td></tr>"#
            ));
        }
        let legend = if with_legend { LEGEND } else { "" };
        format!("<html><body>{legend}<table><tbody>{rows}</tbody></table></body></html>")
    }

    fn grid_page() -> String {
        let mut cells = String::new();
        for offset in 0..35 {
            cells.push_str(&format!(
                r#"<div class="cell" data-text="Облачно, снег"><div class="temp">
                    <div class="temp_max"><span class="unit_temperature_c">+{offset}</span></div>
                    <div class="temp_min"><span class="unit_temperature_c">0</span></div>
                </div></div>"#
            ));
        }
        format!(r#"<div class="weather-cells">{cells}</div>"#)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    // Wednesday; the grid starts on Monday 2020-03-16.
    fn today() -> NaiveDate {
        date(2020, 3, 18)
    }

    fn collector(loader: FakeLoader) -> ForecastCollector<FakeLoader> {
        ForecastCollector::new(loader, Arc::new(SourceCache::new()), SourceUrls::new(BASE))
    }

    #[test]
    fn fully_past_window_uses_diary_pages_only() {
        let mut loader = FakeLoader::new();
        loader.page("/diary/5233/2020/2/", diary_page(29, true, &[]));
        loader.page("/diary/5233/2020/3/", diary_page(31, false, &[]));
        let collector = collector(loader);

        let collection =
            collector.collect_forecast_on("сочи", date(2020, 2, 27), date(2020, 3, 2), today());

        assert_eq!(collection.city.id, "5233");
        assert_eq!(collection.len(), 5);
        assert!(
            collection
                .forecasts()
                .all(|day| day.source() == Some(ForecastSource::Diary))
        );
        assert_eq!(
            collector.loader.calls(),
            vec!["/catalog/russia/", "/diary/5233/2020/2/", "/diary/5233/2020/3/"]
        );

        // March page has no legend of its own; the cached one is reused.
        let march_first = collection.get(date(2020, 3, 1)).expect("day");
        assert_eq!(march_first.cloud_precip(), "Ясно, Дождь");
        assert_eq!(march_first.observations(), &[1, -1]);
        assert!(collection.trace().is_empty());
    }

    #[test]
    fn fully_future_window_uses_month_grid_only() {
        let mut loader = FakeLoader::new();
        loader.page("/weather-sochi-5233/month/", grid_page());
        let collector = collector(loader);

        let collection =
            collector.collect_forecast_on("Сочи", date(2020, 3, 17), date(2020, 3, 19), today());

        assert_eq!(
            collector.loader.calls(),
            vec!["/catalog/russia/", "/weather-sochi-5233/month/"]
        );
        assert!(
            collection
                .forecasts()
                .all(|day| day.source() == Some(ForecastSource::Upcoming))
        );
        let yesterday = collection.get(date(2020, 3, 17)).expect("day");
        assert_eq!(yesterday.max_label().as_deref(), Some("+1"));
        assert_eq!(yesterday.min_label().as_deref(), Some("0"));
        assert_eq!(yesterday.precipitation(), "снег");
    }

    #[test]
    fn straddling_window_routes_each_day_to_exactly_one_pipeline() {
        let mut loader = FakeLoader::new();
        loader.page("/diary/5233/2020/3/", diary_page(31, true, &[]));
        loader.page("/weather-sochi-5233/month/", grid_page());
        let collector = collector(loader);

        let collection =
            collector.collect_forecast_on("Сочи", date(2020, 3, 14), date(2020, 3, 20), today());

        let sources: Vec<_> = collection
            .forecasts()
            .map(|day| (day.date(), day.source()))
            .collect();
        let diary = Some(ForecastSource::Diary);
        let upcoming = Some(ForecastSource::Upcoming);
        assert_eq!(
            sources,
            vec![
                (date(2020, 3, 14), diary),
                (date(2020, 3, 15), diary),
                (date(2020, 3, 16), diary),
                (date(2020, 3, 17), diary),
                (date(2020, 3, 18), upcoming),
                (date(2020, 3, 19), upcoming),
                (date(2020, 3, 20), upcoming),
            ]
        );
        // Diary rows outside 14..=17 belong to other days and are not read.
        assert!(collection.trace().is_empty());
        assert_eq!(collection.get(date(2020, 3, 18)).expect("day").observations(), &[2, 0]);
    }

    #[test]
    fn sentinel_day_is_absent_from_result() {
        let mut loader = FakeLoader::new();
        loader.page("/diary/5233/2020/3/", diary_page(31, true, &[5]));
        let collector = collector(loader);

        let collection =
            collector.collect_forecast_on("Сочи", date(2020, 3, 4), date(2020, 3, 6), today());

        assert_eq!(
            collection.dates().collect::<Vec<_>>(),
            vec![date(2020, 3, 4), date(2020, 3, 6)]
        );
    }

    #[test]
    fn failed_page_does_not_stop_remaining_pages() {
        let mut loader = FakeLoader::new();
        loader.fail(
            "/diary/5233/2020/1/",
            LoadError::Transport("operation timed out".to_string()),
        );
        loader.page("/diary/5233/2020/2/", diary_page(29, true, &[]));
        let collector = collector(loader);

        let collection =
            collector.collect_forecast_on("Сочи", date(2020, 1, 30), date(2020, 2, 1), today());

        assert_eq!(collection.len(), 3);
        assert!(!collection.get(date(2020, 1, 30)).expect("day").has_data());
        assert!(!collection.get(date(2020, 1, 31)).expect("day").has_data());
        assert!(collection.get(date(2020, 2, 1)).expect("day").has_data());
        assert_eq!(
            collection.trace(),
            &["diary 2020-01: transport error: operation timed out".to_string()]
        );
    }

    #[test]
    fn unknown_location_resolves_to_default_city() {
        let mut loader = FakeLoader::new();
        loader.page("/weather-moscow-4368/month/", grid_page());
        let collector = collector(loader);

        let collection =
            collector.collect_forecast_on("zzqx!!", date(2020, 3, 18), date(2020, 3, 18), today());

        assert_eq!(collection.city.display_name, DEFAULT_CITY_NAME);
        assert_eq!(collection.get(date(2020, 3, 18)).expect("day").city, DEFAULT_CITY_NAME);
        assert!(collection.trace().is_empty());
    }

    #[test]
    fn unavailable_catalog_falls_back_to_default_city_with_trace() {
        let mut loader = FakeLoader::new();
        loader.fail(
            "/catalog/russia/",
            LoadError::Http {
                status: 503,
                message: "Service Unavailable".to_string(),
            },
        );
        loader.page("/weather-moscow-4368/month/", grid_page());
        let collector = collector(loader);

        let collection =
            collector.collect_forecast_on("Сочи", date(2020, 3, 18), date(2020, 3, 19), today());

        assert_eq!(collection.city.id, "4368");
        assert!(collection.has_data());
        assert_eq!(
            collection.trace(),
            &["catalog: http error (503): Service Unavailable".to_string()]
        );
    }

    #[test]
    fn horizon_clips_window_before_fetching() {
        let mut loader = FakeLoader::new();
        loader.page("/weather-sochi-5233/month/", grid_page());
        let collector = collector(loader);

        let collection =
            collector.collect_forecast_on("Сочи", date(2020, 4, 10), date(2020, 6, 1), today());

        assert_eq!(collection.dates().last(), Some(date(2020, 4, 22)));
        assert_eq!(collection.len(), 13);
        // The grid holds 35 cells from 2020-03-16; later days stay empty.
        assert!(collection.get(date(2020, 4, 19)).expect("day").has_data());
        assert!(!collection.get(date(2020, 4, 20)).expect("day").has_data());
    }
}
