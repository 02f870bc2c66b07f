//! Data models for the CBM calculator and the container visualizer.
//!
//! This module defines the fundamental data structures:
//! - `BoxSpec`: A user-entered box row with unit-tagged dimensions and a quantity
//! - `BoxInstance`: One physical box expanded from a row, in meters
//! - `ContainerProfile`: A container type with interior dimensions and advertised volume
//! - `ContainerCapacity`: An entry of the capacity table used for recommendations
//! - `Placement`: A box positioned inside a container
//!
//! Rows are deserialized leniently: the UI sends whatever is in its input
//! fields, and a half-typed row must still be computable.

use serde::{Deserialize, Deserializer, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use serde_json::Value;
use utoipa::ToSchema;

use crate::types::{Dimensional, Vec3};
use crate::units::{LengthUnit, to_meters};

/// A box type as entered by the user.
///
/// # Fields
/// * `length` - Length in `unit`, along the container length
/// * `width` - Width in `unit`, along the container width
/// * `height` - Height in `unit`
/// * `unit` - Unit of the three dimensions
/// * `quantity` - Number of identical boxes (`qty` is accepted as an alias)
/// * `weight` - Optional mass of one box in kg
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "length": 50.0, "width": 40.0, "height": 30.0, "unit": "cm", "quantity": 1, "weight": 12.5
}))]
pub struct BoxSpec {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub length: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub width: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub height: f64,
    #[serde(default)]
    pub unit: LengthUnit,
    #[serde(
        default = "default_quantity",
        alias = "qty",
        deserialize_with = "lenient_quantity"
    )]
    pub quantity: u32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_weight"
    )]
    #[schema(nullable = true)]
    pub weight: Option<f64>,
}

impl BoxSpec {
    /// Creates a new box row without weight.
    pub fn new(length: f64, width: f64, height: f64, unit: LengthUnit, quantity: u32) -> Self {
        Self {
            length,
            width,
            height,
            unit,
            quantity,
            weight: None,
        }
    }

    /// Dimensions (length, width, height) converted to meters.
    pub fn meters(&self) -> (f64, f64, f64) {
        (
            to_meters(self.length, self.unit),
            to_meters(self.width, self.unit),
            to_meters(self.height, self.unit),
        )
    }

    /// Declared weight of all boxes of this row in kg.
    pub fn total_weight(&self) -> f64 {
        match self.weight {
            Some(weight) if weight.is_finite() && weight > 0.0 => weight * self.quantity as f64,
            _ => 0.0,
        }
    }
}

fn default_quantity() -> u32 {
    1
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Accepts numbers, numeric strings, empty strings and `null`.
///
/// Anything that is not a number becomes NaN, which normalizes to zero volume.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_number(&value).unwrap_or(f64::NAN))
}

/// Integer parsing: fractions are truncated, negative or invalid values become 0.
fn lenient_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let quantity = match parse_number(&value) {
        Some(raw) if raw.is_finite() && raw >= 1.0 => raw.trunc().min(u32::MAX as f64) as u32,
        _ => 0,
    };
    Ok(quantity)
}

fn lenient_weight<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_number(&value).filter(|weight| weight.is_finite() && *weight >= 0.0))
}

/// One physical box expanded from a `BoxSpec`.
///
/// # Fields
/// * `length`, `width`, `height` - Dimensions in meters
/// * `source_index` - Index of the originating row
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxInstance {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub source_index: usize,
}

impl BoxInstance {
    /// Checks whether the box has a positive, finite extent on every axis.
    pub fn is_degenerate(&self) -> bool {
        !self.dimensions().is_valid_dimension()
    }
}

/// Boxes lie flat: length along x, height along y, width along z.
impl Dimensional for BoxInstance {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.height, self.width)
    }
}

/// Number of boxes the rows expand to.
///
/// Summed in `u64`, so it can be checked against a limit before any
/// allocation happens.
pub fn instance_count(specs: &[BoxSpec]) -> u64 {
    specs.iter().map(|spec| u64::from(spec.quantity)).sum()
}

/// Expands every row into `quantity` identical boxes in meters.
///
/// Order follows the rows; rows with quantity 0 contribute nothing.
pub fn expand_instances(specs: &[BoxSpec]) -> Vec<BoxInstance> {
    let total: usize = specs.iter().map(|spec| spec.quantity as usize).sum();
    let mut instances = Vec::with_capacity(total);

    for (source_index, spec) in specs.iter().enumerate() {
        let (length, width, height) = spec.meters();
        instances.extend((0..spec.quantity).map(|_| BoxInstance {
            length,
            width,
            height,
            source_index,
        }));
    }

    instances
}

/// A container type with interior dimensions in meters.
///
/// `volume` is the advertised capacity and is not derived from the
/// dimensions; real containers lose space to corrugation and doors.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct ContainerProfile {
    pub name: &'static str,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub volume: f64,
}

/// An entry of the capacity table used for container recommendations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct ContainerCapacity {
    pub code: &'static str,
    pub capacity: f64,
}

/// A box positioned inside a container.
///
/// # Fields
/// * `x`, `y`, `z` - Center of the box in the container frame
/// * `lx`, `ly`, `lz` - Full extents of the box
/// * `source_index` - Index of the originating row
/// * `fallback` - Position came from the last-resort fallback and may overlap
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub lx: f64,
    pub ly: f64,
    pub lz: f64,
    pub source_index: usize,
    pub fallback: bool,
}

impl Placement {
    /// Creates a regular placement from a center and extents.
    pub fn new(center: Vec3, extents: Vec3, source_index: usize) -> Self {
        Self {
            x: center.x,
            y: center.y,
            z: center.z,
            lx: extents.x,
            ly: extents.y,
            lz: extents.z,
            source_index,
            fallback: false,
        }
    }

    /// Marks the placement as produced by the fallback.
    pub fn as_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// Center point in the container frame.
    #[inline]
    pub fn center(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Lowest corner of the box.
    #[inline]
    pub fn min_corner(&self) -> Vec3 {
        self.center() - self.dimensions().half()
    }

    /// Highest corner of the box.
    #[inline]
    pub fn max_corner(&self) -> Vec3 {
        self.center() + self.dimensions().half()
    }

    /// Top of the box (Y maximum).
    #[inline]
    pub fn top_y(&self) -> f64 {
        self.y + self.ly / 2.0
    }
}

impl Dimensional for Placement {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.lx, self.ly, self.lz)
    }
}
