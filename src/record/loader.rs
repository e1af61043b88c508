//! Load rating records from the semicolon-delimited pricing dataset
//!
//! This is the ingestion/cleaning collaborator: downstream pool construction
//! consumes its output as ready-made record batches and does not re-validate
//! cleanliness.

use super::data::{AreaCode, FuelType, RatingRecord, RegionCode, VehicleBrand};
use crate::error::{Error, Result};
use crate::pool::ModelKind;
use csv::ReaderBuilder;
use std::path::Path;

/// Factor columns that must be present in the file header.
const REQUIRED_COLUMNS: [&str; 9] = [
    "VehPower",
    "VehAge",
    "DrivAge",
    "Density",
    "BonusMalus",
    "VehBrand",
    "VehGas",
    "Region",
    "Area",
];

/// Raw CSV row; every field optional so incomplete rows can be
/// dropped instead of aborting the load.
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "VehPower", default)]
    veh_power: Option<u32>,
    #[serde(rename = "VehAge", default)]
    veh_age: Option<u32>,
    #[serde(rename = "DrivAge", default)]
    driv_age: Option<u32>,
    #[serde(rename = "Density", default)]
    density: Option<u32>,
    #[serde(rename = "BonusMalus", default)]
    bonus_malus: Option<u32>,
    #[serde(rename = "VehBrand", default)]
    veh_brand: Option<String>,
    #[serde(rename = "VehGas", default)]
    veh_gas: Option<String>,
    #[serde(rename = "Region", default)]
    region: Option<String>,
    #[serde(rename = "Area", default)]
    area: Option<String>,
    #[serde(rename = "Exposure", default)]
    exposure: Option<f64>,
    #[serde(rename = "ClaimNb", default)]
    claim_count: Option<u32>,
    #[serde(rename = "claims_cost", default)]
    claims_cost: Option<f64>,
}

impl CsvRow {
    /// Convert to a typed record. Returns `Ok(None)` when a factor value is
    /// blank (the row is dropped, matching the source pipeline's NA
    /// filtering). An unrecognized categorical level is a hard error.
    fn into_record(self) -> Result<Option<RatingRecord>> {
        let complete = (
            self.veh_power,
            self.veh_age,
            self.driv_age,
            self.density,
            self.bonus_malus,
            self.veh_brand,
            self.veh_gas,
            self.region,
            self.area,
        );
        let (
            Some(vehicle_power),
            Some(vehicle_age),
            Some(driver_age),
            Some(density),
            Some(bonus_malus),
            Some(brand),
            Some(fuel),
            Some(region),
            Some(area),
        ) = complete
        else {
            return Ok(None);
        };

        Ok(Some(RatingRecord {
            vehicle_power,
            vehicle_age,
            driver_age,
            density,
            bonus_malus,
            brand: brand.parse::<VehicleBrand>()?,
            fuel: fuel.parse::<FuelType>()?,
            region: region.parse::<RegionCode>()?,
            area: area.parse::<AreaCode>()?,
            exposure: self.exposure,
            claim_count: self.claim_count,
            claims_cost: self.claims_cost,
        }))
    }
}

/// Load all records from a semicolon-delimited CSV file.
///
/// Rows with blank factor values are dropped and counted; a factor column
/// missing from the header entirely is a [`Error::MissingFeature`].
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<RatingRecord>> {
    let mut reader = ReaderBuilder::new().delimiter(b';').from_path(&path)?;

    let headers = reader.headers()?.clone();
    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(Error::MissingFeature(required));
        }
    }

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for result in reader.deserialize() {
        let row: CsvRow = result?;
        match row.into_record()? {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::warn!(
            "dropped {} incomplete rows from {}",
            dropped,
            path.as_ref().display()
        );
    }

    Ok(records)
}

/// Kind-specific cleaning of a loaded batch.
///
/// Frequency models need a usable Poisson offset and an observed claim
/// count; severity models need both claim fields. Zero-claim rows stay in
/// the severity batch (they become weight-0 pool rows), but zero-exposure
/// rows leave the frequency batch because their offset is undefined.
pub fn clean(records: Vec<RatingRecord>, kind: ModelKind) -> Vec<RatingRecord> {
    let before = records.len();
    let cleaned: Vec<RatingRecord> = records
        .into_iter()
        .filter(|r| match kind {
            ModelKind::Frequency => {
                r.exposure.is_some_and(|e| e > 0.0) && r.claim_count.is_some()
            }
            ModelKind::Severity => r.claim_count.is_some() && r.claims_cost.is_some(),
        })
        .collect();

    if cleaned.len() < before {
        log::warn!(
            "cleaning removed {} of {} rows for the {} model",
            before - cleaned.len(),
            before,
            kind.as_str()
        );
    }

    cleaned
}

/// The train/validation/test batches for one model kind.
#[derive(Debug, Clone)]
pub struct DataSplit {
    pub train: Vec<RatingRecord>,
    pub valid: Vec<RatingRecord>,
    pub test: Vec<RatingRecord>,
}

/// Load and clean the standard `train.csv` / `valid.csv` / `test.csv`
/// split from a data directory.
pub fn load_split<P: AsRef<Path>>(dir: P, kind: ModelKind) -> Result<DataSplit> {
    let dir = dir.as_ref();
    let split = DataSplit {
        train: clean(load_records(dir.join("train.csv"))?, kind),
        valid: clean(load_records(dir.join("valid.csv"))?, kind),
        test: clean(load_records(dir.join("test.csv"))?, kind),
    };
    log::info!(
        "{} datasets loaded: train={}, valid={}, test={}",
        kind.as_str(),
        split.train.len(),
        split.valid.len(),
        split.test.len()
    );
    Ok(split)
}
