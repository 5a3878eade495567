use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CityReference, Forecast};

pub const STORE_FILE_NAME: &str = "forecasts.json";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("forecast for city {city_id} on {date} is already stored")]
    DuplicateKey { city_id: String, date: NaiveDate },
    #[error("required field missing: {0}")]
    RequiredFieldMissing(&'static str),
    #[error("store io error: {0}")]
    Io(String),
    #[error("store file is corrupt: {0}")]
    Corrupt(String),
}

impl From<io::Error> for StoreError {
    fn from(value: io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

/// One persisted day, keyed by `(city_id, date)`. Text fields are stored
/// lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredForecast {
    pub city_id: String,
    pub city: String,
    pub city_translit: String,
    pub date: NaiveDate,
    pub max_temp: Option<i32>,
    pub min_temp: Option<i32>,
    pub cloudiness: Option<String>,
    pub precipitation: Option<String>,
}

impl StoredForecast {
    pub fn from_forecast(city: &CityReference, forecast: &Forecast) -> Self {
        Self {
            city_id: city.id.clone(),
            city: forecast.city.to_lowercase(),
            city_translit: forecast.city_translit.to_lowercase(),
            date: forecast.date(),
            max_temp: forecast.max_temp(),
            min_temp: forecast.min_temp(),
            cloudiness: non_empty_lowercase(forecast.cloudiness()),
            precipitation: non_empty_lowercase(forecast.precipitation()),
        }
    }

    /// Rebuilds a day record; max and min come back as two observations.
    pub fn to_forecast(&self) -> Forecast {
        let mut forecast = Forecast::new(self.date);
        forecast.city = self.city.clone();
        forecast.city_translit = self.city_translit.clone();
        forecast.set_cloudiness(self.cloudiness.as_deref());
        forecast.set_precipitation(self.precipitation.as_deref());
        for value in [self.max_temp, self.min_temp].into_iter().flatten() {
            forecast.add_observation(value);
        }
        forecast
    }

    fn key(&self) -> (String, NaiveDate) {
        (self.city_id.clone(), self.date)
    }

    fn check_required(&self) -> Result<(), StoreError> {
        if self.max_temp.is_none() {
            return Err(StoreError::RequiredFieldMissing("max_temp"));
        }
        if self.min_temp.is_none() {
            return Err(StoreError::RequiredFieldMissing("min_temp"));
        }
        if self.cloudiness.is_none() {
            return Err(StoreError::RequiredFieldMissing("cloudiness"));
        }
        Ok(())
    }
}

fn non_empty_lowercase(text: &str) -> Option<String> {
    Some(text.to_lowercase()).filter(|value| !value.is_empty())
}

pub trait ForecastStore {
    fn insert(&mut self, record: StoredForecast) -> Result<(), StoreError>;

    /// Overwrites the measurements of an existing key. Returns `false` when
    /// nothing is stored under it.
    fn update(&mut self, record: StoredForecast) -> Result<bool, StoreError>;

    fn period(
        &self,
        city_id: &str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<StoredForecast>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated,
    KeptExisting,
    SkippedIncomplete(&'static str),
}

/// Inserts `record`, falling back to an update on a duplicate key when
/// `update_existing` is set. Incomplete records are skipped.
pub fn save_forecast<S: ForecastStore + ?Sized>(
    store: &mut S,
    record: StoredForecast,
    update_existing: bool,
) -> Result<SaveOutcome, StoreError> {
    match store.insert(record.clone()) {
        Ok(()) => Ok(SaveOutcome::Inserted),
        Err(StoreError::RequiredFieldMissing(field)) => Ok(SaveOutcome::SkippedIncomplete(field)),
        Err(StoreError::DuplicateKey { .. }) if update_existing => {
            store.update(record)?;
            Ok(SaveOutcome::Updated)
        }
        Err(StoreError::DuplicateKey { .. }) => Ok(SaveOutcome::KeptExisting),
        Err(error) => Err(error),
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    forecasts: Vec<StoredForecast>,
}

/// Store backed by a single JSON file, rewritten in full on every change.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STORE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<(String, NaiveDate), StoredForecast>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let payload = fs::read_to_string(&self.path)?;
        let file = serde_json::from_str::<StoreFile>(&payload)
            .map_err(|error| StoreError::Corrupt(error.to_string()))?;
        Ok(file
            .forecasts
            .into_iter()
            .map(|record| (record.key(), record))
            .collect())
    }

    fn persist(&self, rows: BTreeMap<(String, NaiveDate), StoredForecast>) -> Result<(), StoreError> {
        let file = StoreFile {
            forecasts: rows.into_values().collect(),
        };
        let payload = serde_json::to_vec_pretty(&file)
            .map_err(|error| StoreError::Corrupt(error.to_string()))?;
        write_atomic(&self.path, &payload)?;
        debug!("store written: {}", self.path.display());
        Ok(())
    }
}

impl ForecastStore for JsonFileStore {
    fn insert(&mut self, record: StoredForecast) -> Result<(), StoreError> {
        record.check_required()?;
        let mut rows = self.load()?;
        let key = record.key();
        if rows.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                city_id: key.0,
                date: key.1,
            });
        }
        rows.insert(key, record);
        self.persist(rows)
    }

    fn update(&mut self, record: StoredForecast) -> Result<bool, StoreError> {
        record.check_required()?;
        let mut rows = self.load()?;
        let Some(existing) = rows.get_mut(&record.key()) else {
            return Ok(false);
        };
        existing.max_temp = record.max_temp;
        existing.min_temp = record.min_temp;
        existing.cloudiness = record.cloudiness;
        existing.precipitation = record.precipitation;
        self.persist(rows)?;
        Ok(true)
    }

    fn period(
        &self,
        city_id: &str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<StoredForecast>, StoreError> {
        Ok(self
            .load()?
            .into_values()
            .filter(|record| record.city_id == city_id && since <= record.date && record.date <= until)
            .collect())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "store path must have a parent directory",
        )
    })?;
    fs::create_dir_all(parent)?;

    let tmp_path = path.with_extension(format!("{}.tmp", std::process::id()));
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
