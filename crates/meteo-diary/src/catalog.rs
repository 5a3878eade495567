use scraper::Html;
use serde::Serialize;

use crate::document::{selector, text_of};
use crate::model::CityReference;

pub const DEFAULT_CITY_NAME: &str = "Москва";
pub const DEFAULT_CITY_PATH: &str = "/weather-moscow-4368/";

const CATALOG_LINK_SELECTOR: &str = ".catalog_side:last-child .catalog_item a:first-child";
const PATH_PREFIX: &str = "weather-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub display_name: String,
    pub source_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityCatalog {
    entries: Vec<CatalogEntry>,
}

impl CityCatalog {
    pub fn from_document(document: &Html) -> Self {
        let Some(links) = selector(CATALOG_LINK_SELECTOR) else {
            return Self::default();
        };

        let entries = document
            .select(&links)
            .filter_map(|link| {
                let display_name = text_of(link);
                let source_path = link.value().attr("href")?.trim().to_string();
                if display_name.is_empty() || source_path.is_empty() {
                    return None;
                }
                Some(CatalogEntry {
                    display_name,
                    source_path,
                })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, needle: &str) -> Option<CityReference> {
        let needle = needle.trim().to_uppercase();
        self.entries
            .iter()
            .find(|entry| entry.display_name.to_uppercase() == needle)
            .map(|entry| city_reference(&entry.display_name, &entry.source_path))
    }

    /// Case-insensitive match on the display name; unknown text resolves to
    /// the default city.
    pub fn resolve(&self, needle: &str) -> CityReference {
        self.find(needle).unwrap_or_else(default_city)
    }
}

pub fn default_city() -> CityReference {
    city_reference(DEFAULT_CITY_NAME, DEFAULT_CITY_PATH)
}

pub fn city_reference(display_name: &str, source_path: &str) -> CityReference {
    CityReference {
        id: city_id_from_path(source_path),
        display_name: display_name.to_string(),
        transliterated_name: translit_from_path(source_path),
        source_path: source_path.to_string(),
    }
}

fn path_slug(source_path: &str) -> Option<(&str, &str)> {
    source_path.trim().trim_matches('/').rsplit_once('-')
}

/// `4368` for `/weather-moscow-4368/`.
pub fn city_id_from_path(source_path: &str) -> String {
    path_slug(source_path)
        .map(|(_, id)| id)
        .filter(|id| !id.is_empty() && id.chars().all(|ch| ch.is_ascii_digit()))
        .unwrap_or_default()
        .to_string()
}

/// `nizhny-novgorod` for `/weather-nizhny-novgorod-4355/`.
pub fn translit_from_path(source_path: &str) -> String {
    path_slug(source_path)
        .and_then(|(head, _)| head.strip_prefix(PATH_PREFIX))
        .unwrap_or_default()
        .to_string()
}
