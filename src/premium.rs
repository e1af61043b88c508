//! Premium composition
//!
//! Combines the two model predictions into a pure risk premium and grosses
//! it up for expenses and tax. Pure functions over values from pools built
//! on the same input record; that consistency is the caller's contract.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Expense loading inputs for the commercial premium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Expenses {
    /// Fixed expenses per policy, in currency units.
    #[serde(rename = "FixedExpenses")]
    pub fixed: f64,
    /// Variable expenses as a share of the commercial premium.
    #[serde(rename = "VariableExpenses")]
    pub variable_rate: f64,
    /// Tax as a share of the commercial premium.
    #[serde(rename = "TaxRate")]
    pub tax_rate: f64,
}

impl Expenses {
    /// Validated construction; rejects loadings an insurer cannot charge.
    pub fn new(fixed: f64, variable_rate: f64, tax_rate: f64) -> Result<Self> {
        let expenses = Self {
            fixed,
            variable_rate,
            tax_rate,
        };
        expenses.validate()?;
        Ok(expenses)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fixed < 0.0 {
            return Err(Error::domain(format!(
                "fixed expenses must be non-negative, got {}",
                self.fixed
            )));
        }
        if !(0.0..1.0).contains(&self.variable_rate) {
            return Err(Error::domain(format!(
                "variable expense rate must be in [0, 1), got {}",
                self.variable_rate
            )));
        }
        if !(0.0..1.0).contains(&self.tax_rate) {
            return Err(Error::domain(format!(
                "tax rate must be in [0, 1), got {}",
                self.tax_rate
            )));
        }
        if self.variable_rate + self.tax_rate >= 1.0 {
            return Err(Error::domain(format!(
                "variable expenses plus tax must load less than 100% of the premium, got {}",
                self.variable_rate + self.tax_rate
            )));
        }
        Ok(())
    }
}

/// A composed premium for one quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Premium {
    /// Expected claim cost per unit exposure: frequency * severity.
    pub pure: f64,
    /// Pure premium grossed up for fixed costs, variable expenses and tax.
    pub commercial: f64,
}

/// Expected claim cost per unit exposure.
pub fn pure_premium(frequency: f64, severity: f64) -> f64 {
    frequency * severity
}

/// Compose pure and commercial premium from the two point predictions.
///
/// `commercial = (pure + fixed) / (1 - variable - tax)`; the loading rates
/// are re-checked here because `Expenses` fields stay public for
/// struct-literal construction.
pub fn compose(frequency: f64, severity: f64, expenses: &Expenses) -> Result<Premium> {
    expenses.validate()?;
    let pure = pure_premium(frequency, severity);
    let commercial = (pure + expenses.fixed) / (1.0 - expenses.variable_rate - expenses.tax_rate);
    Ok(Premium { pure, commercial })
}
