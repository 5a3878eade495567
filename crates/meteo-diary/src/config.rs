use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.gismeteo.ru";
pub const DEFAULT_THROTTLE_SECS: u64 = 3;

pub const BASE_URL_ENV: &str = "METEO_DIARY_BASE_URL";
pub const THROTTLE_SECS_ENV: &str = "METEO_DIARY_THROTTLE_SECS";
pub const STORE_DIR_ENV: &str = "METEO_DIARY_STORE_DIR";
const HOME_ENV: &str = "HOME";

pub const FETCH_TIMEOUT_SECS: u64 = 10;
pub const SOURCE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/79.0.3945.117 YaBrowser/20.2.0.1043 Yowser/2.5 Safari/537.36";
pub const SOURCE_ACCEPT_LANGUAGE: &str = "ru,en;q=0.9";

pub const CATALOG_PATH: &str = "/catalog/russia/";
pub const MONTH_GRID_SUFFIX: &str = "month/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub base_url: String,
    pub throttle: Duration,
    pub store_dir: PathBuf,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub(crate) fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            base_url: resolve_base_url(&map),
            throttle: Duration::from_secs(resolve_throttle_secs(&map)),
            store_dir: resolve_store_dir(&map),
        }
    }

    pub fn urls(&self) -> SourceUrls {
        SourceUrls::new(&self.base_url)
    }
}

/// URL layout of the source site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrls {
    base: String,
}

impl SourceUrls {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn catalog(&self) -> String {
        format!("{}{CATALOG_PATH}", self.base)
    }

    pub fn month_grid(&self, source_path: &str) -> String {
        format!("{}{source_path}{MONTH_GRID_SUFFIX}", self.base)
    }

    pub fn diary(&self, city_id: &str, year: i32, month: u32) -> String {
        format!("{}/diary/{city_id}/{year}/{month}/", self.base)
    }
}

impl Default for SourceUrls {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

fn resolve_base_url(env_map: &HashMap<String, String>) -> String {
    env_map
        .get(BASE_URL_ENV)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/')
        .to_string()
}

fn resolve_throttle_secs(env_map: &HashMap<String, String>) -> u64 {
    env_map
        .get(THROTTLE_SECS_ENV)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_THROTTLE_SECS)
}

fn resolve_store_dir(env_map: &HashMap<String, String>) -> PathBuf {
    let home = env_map.get(HOME_ENV).map(String::as_str);
    env_map
        .get(STORE_DIR_ENV)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| expand_home_path(value, home))
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("meteo-diary"))
}

fn expand_home_path(raw: &str, home: Option<&str>) -> String {
    let trimmed = raw.trim();
    let Some(home) = home.map(str::trim).filter(|value| !value.is_empty()) else {
        return trimmed.to_string();
    };

    let home = home.trim_end_matches('/');
    let mut expanded = trimmed.replace("$HOME", home);

    if expanded == "~" {
        expanded = home.to_string();
    } else if let Some(rest) = expanded.strip_prefix("~/") {
        expanded = format!("{home}/{rest}");
    }

    expanded
}
