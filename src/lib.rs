//! Premium Engine - Frequency/severity pricing for motor insurance premiums
//!
//! This library provides:
//! - Rating records with closed, validated factor enumerations
//! - Kind-tagged model pools shared bit-identically by training and inference
//! - Poisson frequency training (log-exposure offset) and claim-weighted
//!   severity training with early stopping
//! - Portfolio evaluation (actual-to-predicted ratio, deviance/RMSE)
//! - Versioned fitted-model artifacts with exact reload fidelity
//! - Pure and commercial premium composition

pub mod boost;
pub mod error;
pub mod pool;
pub mod premium;
pub mod record;
pub mod scoring;
pub mod training;

// Re-export commonly used types
pub use error::{Error, Result};
pub use pool::{ModelKind, Pool};
pub use premium::{compose, pure_premium, Expenses, Premium};
pub use record::RatingRecord;
pub use scoring::{PricingModels, Quote, Scorer};
pub use training::{evaluate, Evaluation, FittedModel, Trainer};
