//! Rating records, closed factor enumerations, and dataset ingestion

pub mod data;
pub mod loader;

pub use data::{
    AreaCode, FuelType, RatingRecord, RegionCode, VehicleBrand, CATEGORICAL_FACTORS,
    CATEGORICAL_LEVELS, NUMERIC_FACTORS,
};
pub use loader::{clean, load_records, load_split, DataSplit};
