use std::borrow::Cow;
use std::sync::{Mutex, OnceLock, PoisonError};

use log::debug;
use scraper::Html;

use crate::catalog::CityCatalog;
use crate::config::SourceUrls;
use crate::loader::{DocumentLoader, LoadError};
use crate::parsers::diary::IconLegend;

/// Site data that only has to be read once per process: the city catalog
/// and the diary icon legend. Each slot is filled at most once; a failed or
/// empty read leaves it unset so a later request can try again.
#[derive(Debug, Default)]
pub struct SourceCache {
    catalog: OnceLock<CityCatalog>,
    catalog_guard: Mutex<()>,
    icon_legend: OnceLock<IconLegend>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(&self) -> Option<&CityCatalog> {
        self.catalog.get()
    }

    pub fn catalog_or_fetch<L: DocumentLoader>(
        &self,
        loader: &L,
        urls: &SourceUrls,
    ) -> Result<&CityCatalog, LoadError> {
        if let Some(catalog) = self.catalog.get() {
            return Ok(catalog);
        }

        let _guard = self
            .catalog_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(catalog) = self.catalog.get() {
            return Ok(catalog);
        }

        let document = loader.fetch(&urls.catalog())?;
        let catalog = CityCatalog::from_document(&document);
        if catalog.is_empty() {
            return Err(LoadError::InvalidDocument(
                "catalog page lists no cities".to_string(),
            ));
        }
        debug!("catalog loaded with {} cities", catalog.entries().len());
        Ok(self.catalog.get_or_init(|| catalog))
    }

    pub fn icon_legend(&self) -> Option<&IconLegend> {
        self.icon_legend.get()
    }

    /// The cached legend, or the one read from `document` when none is cached
    /// yet. A non-empty legend read here becomes the cached one.
    pub fn icon_legend_or_init(&self, document: &Html) -> Cow<'_, IconLegend> {
        if let Some(legend) = self.icon_legend.get() {
            return Cow::Borrowed(legend);
        }

        let legend = IconLegend::from_document(document);
        if legend.is_empty() {
            return Cow::Owned(legend);
        }
        debug!("icon legend loaded with {} labels", legend.len());
        Cow::Borrowed(self.icon_legend.get_or_init(|| legend))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    struct CountingLoader {
        body: RefCell<Result<String, LoadError>>,
        calls: Cell<usize>,
    }

    impl CountingLoader {
        fn new(body: Result<&str, LoadError>) -> Self {
            Self {
                body: RefCell::new(body.map(str::to_string)),
                calls: Cell::new(0),
            }
        }
    }

    impl DocumentLoader for CountingLoader {
        fn fetch(&self, _url: &str) -> Result<Html, LoadError> {
            self.calls.set(self.calls.get() + 1);
            self.body
                .borrow()
                .clone()
                .map(|body| Html::parse_document(&body))
        }
    }

    const CATALOG: &str = r#"<div><div class="catalog_side">
        <div class="catalog_item"><a href="/weather-sochi-5233/">Сочи</a></div>
    </div></div>"#;

    #[test]
    fn catalog_is_fetched_once() {
        let cache = SourceCache::new();
        let loader = CountingLoader::new(Ok(CATALOG));
        let urls = SourceUrls::default();

        let first = cache.catalog_or_fetch(&loader, &urls).expect("catalog");
        assert_eq!(first.entries().len(), 1);
        cache.catalog_or_fetch(&loader, &urls).expect("catalog");

        assert_eq!(loader.calls.get(), 1);
    }

    #[test]
    fn failed_catalog_fetch_is_not_cached() {
        let cache = SourceCache::new();
        let failing = CountingLoader::new(Err(LoadError::Transport("timeout".to_string())));
        let urls = SourceUrls::default();

        assert!(cache.catalog_or_fetch(&failing, &urls).is_err());
        assert!(cache.catalog().is_none());

        let working = CountingLoader::new(Ok(CATALOG));
        assert!(cache.catalog_or_fetch(&working, &urls).is_ok());
        assert_eq!(working.calls.get(), 1);
    }

    #[test]
    fn empty_catalog_page_is_an_invalid_document() {
        let cache = SourceCache::new();
        let loader = CountingLoader::new(Ok("<html></html>"));

        let error = cache
            .catalog_or_fetch(&loader, &SourceUrls::default())
            .expect_err("must fail");
        assert!(matches!(error, LoadError::InvalidDocument(_)));
    }

    #[test]
    fn first_non_empty_legend_wins() {
        let cache = SourceCache::new();
        let blank = Html::parse_document("<html></html>");
        assert!(cache.icon_legend_or_init(&blank).is_empty());
        assert!(cache.icon_legend().is_none());

        let first = Html::parse_document(
            r#"<div id="cloudness_labels"><div class="label_smallsize"><img src="/i/sun.png"><dl>Ясно</dl></div></div>"#,
        );
        let second = Html::parse_document(
            r#"<div id="cloudness_labels"><div class="label_smallsize"><img src="/i/sun.png"><dl>Солнечно</dl></div></div>"#,
        );
        assert_eq!(cache.icon_legend_or_init(&first).label("sun.png"), Some("Ясно"));
        assert_eq!(cache.icon_legend_or_init(&second).label("sun.png"), Some("Ясно"));
    }
}
