//! Length units and conversion to meters.
//!
//! Every dimension entering the calculator is normalized to meters before
//! any volume or placement math happens. Conversion never fails: values that
//! are not finite numbers normalize to `0.0`, which downstream code treats as
//! a box without volume.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Supported length units for box dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(from = "String")]
pub enum LengthUnit {
    #[default]
    #[serde(rename = "m")]
    Meters,
    #[serde(rename = "cm")]
    Centimeters,
    #[serde(rename = "mm")]
    Millimeters,
    #[serde(rename = "in")]
    Inches,
    #[serde(rename = "ft")]
    Feet,
}

impl LengthUnit {
    /// All units in the order they are offered to the user.
    pub const ALL: [LengthUnit; 5] = [
        LengthUnit::Meters,
        LengthUnit::Centimeters,
        LengthUnit::Millimeters,
        LengthUnit::Inches,
        LengthUnit::Feet,
    ];

    /// Multiplicative factor converting one unit into meters.
    pub const fn factor(self) -> f64 {
        match self {
            LengthUnit::Meters => 1.0,
            LengthUnit::Centimeters => 0.01,
            LengthUnit::Millimeters => 0.001,
            LengthUnit::Inches => 0.0254,
            LengthUnit::Feet => 0.3048,
        }
    }

    /// Short token used in JSON and CSV (`m`, `cm`, `mm`, `in`, `ft`).
    pub const fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Meters => "m",
            LengthUnit::Centimeters => "cm",
            LengthUnit::Millimeters => "mm",
            LengthUnit::Inches => "in",
            LengthUnit::Feet => "ft",
        }
    }

    /// Resolves a unit token, falling back to meters for unknown tokens.
    pub fn parse_lenient(raw: &str) -> Self {
        let token = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|unit| unit.symbol() == token)
            .unwrap_or_default()
    }
}

impl From<String> for LengthUnit {
    fn from(raw: String) -> Self {
        Self::parse_lenient(&raw)
    }
}

impl std::fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Converts a length into meters.
///
/// # Parameters
/// * `value` - The raw length
/// * `unit` - The unit `value` is expressed in
///
/// # Returns
/// The length in meters, or `0.0` for NaN and infinite input
pub fn to_meters(value: f64, unit: LengthUnit) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value * unit.factor()
}
