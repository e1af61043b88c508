//! Rating record data structures matching the pricing dataset format

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Numeric factor column names, in pool order.
///
/// This list is a constant, not inferred from data: the pool schema must be
/// identical at train and score time.
pub const NUMERIC_FACTORS: [&str; 5] = ["VehPower", "VehAge", "DrivAge", "Density", "BonusMalus"];

/// Categorical factor column names, in pool order (after the numeric block).
pub const CATEGORICAL_FACTORS: [&str; 4] = ["VehBrand", "VehGas", "Region", "Area"];

/// Vehicle brand code (closed enumeration from the rating dataset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleBrand {
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B10,
    B11,
    B12,
    B13,
    B14,
}

impl VehicleBrand {
    pub const ALL: [VehicleBrand; 11] = [
        VehicleBrand::B1,
        VehicleBrand::B2,
        VehicleBrand::B3,
        VehicleBrand::B4,
        VehicleBrand::B5,
        VehicleBrand::B6,
        VehicleBrand::B10,
        VehicleBrand::B11,
        VehicleBrand::B12,
        VehicleBrand::B13,
        VehicleBrand::B14,
    ];

    /// Stable ordinal code used as the model-level encoding.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleBrand::B1 => "B1",
            VehicleBrand::B2 => "B2",
            VehicleBrand::B3 => "B3",
            VehicleBrand::B4 => "B4",
            VehicleBrand::B5 => "B5",
            VehicleBrand::B6 => "B6",
            VehicleBrand::B10 => "B10",
            VehicleBrand::B11 => "B11",
            VehicleBrand::B12 => "B12",
            VehicleBrand::B13 => "B13",
            VehicleBrand::B14 => "B14",
        }
    }
}

impl FromStr for VehicleBrand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| Error::domain(format!("unknown VehBrand: {}", s)))
    }
}

/// Vehicle fuel type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuelType {
    Regular,
    Diesel,
}

impl FuelType {
    pub const ALL: [FuelType; 2] = [FuelType::Regular, FuelType::Diesel];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FuelType::Regular => "Regular",
            FuelType::Diesel => "Diesel",
        }
    }
}

impl FromStr for FuelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Regular" => Ok(FuelType::Regular),
            "Diesel" => Ok(FuelType::Diesel),
            other => Err(Error::domain(format!("unknown VehGas: {}", other))),
        }
    }
}

/// Geographic area code (A = rural through G = urban centre)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaCode {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl AreaCode {
    pub const ALL: [AreaCode; 7] = [
        AreaCode::A,
        AreaCode::B,
        AreaCode::C,
        AreaCode::D,
        AreaCode::E,
        AreaCode::F,
        AreaCode::G,
    ];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AreaCode::A => "A",
            AreaCode::B => "B",
            AreaCode::C => "C",
            AreaCode::D => "D",
            AreaCode::E => "E",
            AreaCode::F => "F",
            AreaCode::G => "G",
        }
    }
}

impl FromStr for AreaCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| Error::domain(format!("unknown Area: {}", s)))
    }
}

/// Administrative region code (closed enumeration from the rating dataset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionCode {
    R11,
    R21,
    R22,
    R23,
    R24,
    R25,
    R26,
    R31,
    R41,
    R42,
    R43,
    R52,
    R53,
    R54,
    R72,
    R73,
    R74,
    R82,
    R83,
    R91,
    R93,
    R94,
}

impl RegionCode {
    pub const ALL: [RegionCode; 22] = [
        RegionCode::R11,
        RegionCode::R21,
        RegionCode::R22,
        RegionCode::R23,
        RegionCode::R24,
        RegionCode::R25,
        RegionCode::R26,
        RegionCode::R31,
        RegionCode::R41,
        RegionCode::R42,
        RegionCode::R43,
        RegionCode::R52,
        RegionCode::R53,
        RegionCode::R54,
        RegionCode::R72,
        RegionCode::R73,
        RegionCode::R74,
        RegionCode::R82,
        RegionCode::R83,
        RegionCode::R91,
        RegionCode::R93,
        RegionCode::R94,
    ];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionCode::R11 => "R11",
            RegionCode::R21 => "R21",
            RegionCode::R22 => "R22",
            RegionCode::R23 => "R23",
            RegionCode::R24 => "R24",
            RegionCode::R25 => "R25",
            RegionCode::R26 => "R26",
            RegionCode::R31 => "R31",
            RegionCode::R41 => "R41",
            RegionCode::R42 => "R42",
            RegionCode::R43 => "R43",
            RegionCode::R52 => "R52",
            RegionCode::R53 => "R53",
            RegionCode::R54 => "R54",
            RegionCode::R72 => "R72",
            RegionCode::R73 => "R73",
            RegionCode::R74 => "R74",
            RegionCode::R82 => "R82",
            RegionCode::R83 => "R83",
            RegionCode::R91 => "R91",
            RegionCode::R93 => "R93",
            RegionCode::R94 => "R94",
        }
    }
}

impl FromStr for RegionCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Error::domain(format!("unknown Region: {}", s)))
    }
}

/// Number of levels per categorical factor, in pool column order.
pub const CATEGORICAL_LEVELS: [usize; 4] = [
    VehicleBrand::ALL.len(),
    FuelType::ALL.len(),
    RegionCode::ALL.len(),
    AreaCode::ALL.len(),
];

/// A single policy-period observation, or a to-be-priced quote
///
/// Serde field names follow the rating dataset's column names so a serving
/// request body and a CSV row share one schema. The exposure, claim count
/// and claims cost are optional: absent at quote time, present on training
/// observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    /// Vehicle power in CV
    #[serde(rename = "VehPower")]
    pub vehicle_power: u32,

    /// Vehicle age in years
    #[serde(rename = "VehAge")]
    pub vehicle_age: u32,

    /// Driver age in years
    #[serde(rename = "DrivAge")]
    pub driver_age: u32,

    /// Inhabitants per km2 in the policyholder's city
    #[serde(rename = "Density")]
    pub density: u32,

    /// Bonus-malus score (100 = neutral, >100 = malus)
    #[serde(rename = "BonusMalus")]
    pub bonus_malus: u32,

    /// Vehicle brand code
    #[serde(rename = "VehBrand")]
    pub brand: VehicleBrand,

    /// Vehicle fuel type
    #[serde(rename = "VehGas")]
    pub fuel: FuelType,

    /// Administrative region code
    #[serde(rename = "Region")]
    pub region: RegionCode,

    /// Geographic area code
    #[serde(rename = "Area")]
    pub area: AreaCode,

    /// Fraction of a year the policy was in force, in (0, 1].
    /// Absent on quotes; the frequency pool defaults it to a full year.
    #[serde(rename = "Exposure", default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<f64>,

    /// Observed number of claims. Absent on quotes; the severity pool
    /// defaults the regression weight to 1.
    #[serde(rename = "ClaimNb", default, skip_serializing_if = "Option::is_none")]
    pub claim_count: Option<u32>,

    /// Total claims cost over the period (training observations only)
    #[serde(rename = "claims_cost", default, skip_serializing_if = "Option::is_none")]
    pub claims_cost: Option<f64>,
}

impl RatingRecord {
    /// Numeric factor values in pool column order ([`NUMERIC_FACTORS`]).
    pub fn numeric_factors(&self) -> [f64; 5] {
        [
            self.vehicle_power as f64,
            self.vehicle_age as f64,
            self.driver_age as f64,
            self.density as f64,
            self.bonus_malus as f64,
        ]
    }

    /// Categorical factor codes in pool column order ([`CATEGORICAL_FACTORS`]).
    pub fn categorical_codes(&self) -> [u8; 4] {
        [
            self.brand.code(),
            self.fuel.code(),
            self.region.code(),
            self.area.code(),
        ]
    }

    /// Serving-boundary range validation.
    ///
    /// Bounds match the quote request schema; the core pipeline never
    /// re-validates ranges on already-ingested observations.
    pub fn validate_ranges(&self) -> Result<()> {
        range_check("VehPower", self.vehicle_power, 1, 20)?;
        range_check("VehAge", self.vehicle_age, 0, 120)?;
        range_check("DrivAge", self.driver_age, 18, 120)?;
        range_check("Density", self.density, 1, 30_000)?;
        range_check("BonusMalus", self.bonus_malus, 50, 230)?;
        if let Some(e) = self.exposure {
            if e <= 0.0 || e > 1.0 {
                return Err(Error::domain(format!(
                    "Exposure must be in (0, 1], got {}",
                    e
                )));
            }
        }
        Ok(())
    }
}

fn range_check(name: &str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(Error::domain(format!(
            "{} must be in [{}, {}], got {}",
            name, min, max, value
        )));
    }
    Ok(())
}
