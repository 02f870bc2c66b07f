//! Volume, billing and container recommendation arithmetic.
//!
//! Everything here is best-effort: invalid rows contribute zero volume and no
//! function returns an error. Results are recomputed from scratch on every
//! input change.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::{CAPACITY_TABLE, capacities_ascending};
use crate::model::{BoxSpec, ContainerCapacity, ContainerProfile};
use crate::units::{LengthUnit, to_meters};

/// Sea-freight volumetric conversion: one cubic meter bills as 1000 kg.
pub const KG_PER_CBM: f64 = 1000.0;

/// Billing increments offered to the user, in cubic meters.
pub const SUPPORTED_PRECISIONS: [f64; 3] = [0.01, 0.1, 1.0];

/// Utilization is capped at this value for display.
pub const MAX_DISPLAY_UTILIZATION: f64 = 100.0;

/// Distance of a quotient to the nearest integer below which it counts as exact.
const ROUNDING_TOLERANCE: f64 = 1e-9;

/// Volume of a single box in cubic meters.
///
/// # Returns
/// The product of the normalized dimensions, or `0.0` if any dimension is
/// non-positive or not a number
pub fn compute_cbm(length: f64, width: f64, height: f64, unit: LengthUnit) -> f64 {
    let l = to_meters(length, unit);
    let w = to_meters(width, unit);
    let h = to_meters(height, unit);
    if l <= 0.0 || w <= 0.0 || h <= 0.0 {
        return 0.0;
    }
    l * w * h
}

/// Volume of one box of a row.
pub fn item_cbm(spec: &BoxSpec) -> f64 {
    compute_cbm(spec.length, spec.width, spec.height, spec.unit)
}

/// Volume of all boxes of a row.
pub fn row_cbm(spec: &BoxSpec) -> f64 {
    item_cbm(spec) * spec.quantity as f64
}

/// Rounds a volume up to the next billing increment.
///
/// Carriers never bill less than the shipped volume, so this is a ceiling.
/// Quotients that are an integer up to floating-point noise are not pushed
/// to the next increment.
///
/// # Parameters
/// * `value` - Volume in cubic meters
/// * `precision` - Billing increment; `<= 0` disables rounding
pub fn round_up(value: f64, precision: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    if !precision.is_finite() || precision <= 0.0 {
        return value;
    }

    let steps = value / precision;
    let nearest = steps.round();
    let steps = if (steps - nearest).abs() <= ROUNDING_TOLERANCE {
        nearest
    } else {
        steps.ceil()
    };
    steps * precision
}

/// Weight equivalent of a volume.
pub fn volumetric_weight(billed_cbm: f64) -> f64 {
    billed_cbm * KG_PER_CBM
}

/// The greater of actual and volumetric weight.
pub fn chargeable_weight(actual_weight: f64, volumetric_weight: f64) -> f64 {
    sanitize_weight(actual_weight).max(volumetric_weight)
}

fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Outcome of the container recommendation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContainerRecommendation {
    /// A single container of this type holds the volume.
    Single {
        code: &'static str,
        capacity: f64,
        utilization_percent: f64,
    },
    /// The volume exceeds every container; computed against the largest one.
    Multiple {
        base_code: &'static str,
        capacity: f64,
        utilization_percent: f64,
        containers_needed: u32,
    },
    /// The capacity table is empty.
    Unavailable,
}

impl ContainerRecommendation {
    /// Display name, e.g. `20GP` or `Multiple (40HC base)`.
    pub fn name(&self) -> String {
        match self {
            ContainerRecommendation::Single { code, .. } => (*code).to_string(),
            ContainerRecommendation::Multiple { base_code, .. } => {
                format!("Multiple ({} base)", base_code)
            }
            ContainerRecommendation::Unavailable => "—".to_string(),
        }
    }

    /// Utilization without the display cap.
    pub fn utilization_percent(&self) -> f64 {
        match self {
            ContainerRecommendation::Single {
                utilization_percent,
                ..
            }
            | ContainerRecommendation::Multiple {
                utilization_percent,
                ..
            } => *utilization_percent,
            ContainerRecommendation::Unavailable => 0.0,
        }
    }

    /// Number of containers of the recommended type.
    pub fn containers_needed(&self) -> u32 {
        match self {
            ContainerRecommendation::Single {
                utilization_percent,
                ..
            } => {
                if *utilization_percent > 0.0 {
                    1
                } else {
                    0
                }
            }
            ContainerRecommendation::Multiple {
                containers_needed, ..
            } => *containers_needed,
            ContainerRecommendation::Unavailable => 0,
        }
    }
}

/// Picks the smallest container whose capacity holds the billed volume.
///
/// # Parameters
/// * `billed_cbm` - Billed volume in cubic meters
/// * `table` - Capacity table in any order
pub fn recommend_container(billed_cbm: f64, table: &[ContainerCapacity]) -> ContainerRecommendation {
    let billed = if billed_cbm.is_finite() {
        billed_cbm.max(0.0)
    } else {
        0.0
    };
    let sorted = capacities_ascending(table);

    if let Some(fit) = sorted.iter().find(|entry| billed <= entry.capacity) {
        return ContainerRecommendation::Single {
            code: fit.code,
            capacity: fit.capacity,
            utilization_percent: percent_of(billed, fit.capacity),
        };
    }

    match sorted.last() {
        Some(largest) => ContainerRecommendation::Multiple {
            base_code: largest.code,
            capacity: largest.capacity,
            utilization_percent: percent_of(billed, largest.capacity),
            containers_needed: containers_for(billed, largest.capacity),
        },
        None => ContainerRecommendation::Unavailable,
    }
}

fn percent_of(volume: f64, capacity: f64) -> f64 {
    if capacity > 0.0 {
        volume / capacity * 100.0
    } else {
        0.0
    }
}

fn containers_for(volume: f64, capacity: f64) -> u32 {
    if volume <= 0.0 || capacity <= 0.0 {
        return 0;
    }
    (volume / capacity).ceil().min(u32::MAX as f64) as u32
}

/// Aggregated summary of a calculation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VolumetricResult {
    pub raw_cbm: f64,
    pub billed_cbm: f64,
    pub precision: f64,
    pub volumetric_weight: f64,
    pub actual_weight: f64,
    pub chargeable_weight: f64,
    pub recommended_container: String,
    pub utilization_percent: f64,
    pub containers_needed: u32,
}

/// Computes the summary for a list of rows against the default capacity table.
///
/// # Parameters
/// * `items` - Box rows
/// * `precision` - Billing increment in cubic meters
/// * `actual_weight` - Declared shipment weight; when absent, the sum of
///   the per-box weights of all rows is used
pub fn aggregate(items: &[BoxSpec], precision: f64, actual_weight: Option<f64>) -> VolumetricResult {
    aggregate_with_table(items, precision, actual_weight, &CAPACITY_TABLE)
}

/// Like `aggregate`, but recommends from the given capacity table.
pub fn aggregate_with_table(
    items: &[BoxSpec],
    precision: f64,
    actual_weight: Option<f64>,
    table: &[ContainerCapacity],
) -> VolumetricResult {
    let raw_cbm: f64 = items.iter().map(row_cbm).sum();
    let billed_cbm = round_up(raw_cbm, precision);
    let volumetric = volumetric_weight(billed_cbm);
    let actual = match actual_weight {
        Some(weight) => sanitize_weight(weight),
        None => items.iter().map(BoxSpec::total_weight).sum(),
    };
    let recommendation = recommend_container(billed_cbm, table);

    VolumetricResult {
        raw_cbm,
        billed_cbm,
        precision,
        volumetric_weight: volumetric,
        actual_weight: actual,
        chargeable_weight: chargeable_weight(actual, volumetric),
        recommended_container: recommendation.name(),
        utilization_percent: recommendation
            .utilization_percent()
            .min(MAX_DISPLAY_UTILIZATION),
        containers_needed: recommendation.containers_needed(),
    }
}

/// How far a chosen container is filled by a total volume.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct FillSummary {
    pub container: String,
    pub total_cbm: f64,
    pub containers_needed: u32,
    pub fill_percent: f64,
}

/// Compares a total volume with the advertised volume of a profile.
pub fn container_fill(total_cbm: f64, profile: &ContainerProfile) -> FillSummary {
    let total = if total_cbm.is_finite() {
        total_cbm.max(0.0)
    } else {
        0.0
    };

    FillSummary {
        container: profile.name.to_string(),
        total_cbm: total,
        containers_needed: containers_for(total, profile.volume),
        fill_percent: percent_of(total, profile.volume).min(MAX_DISPLAY_UTILIZATION),
    }
}
