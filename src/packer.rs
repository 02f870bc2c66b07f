//! Greedy shelf packing for the container visualizer.
//!
//! This is a deterministic single-pass heuristic meant for drawing a
//! plausible load plan. It is not a packing optimizer:
//! - Boxes are placed largest volume first
//! - Each box goes into the first layer with a free grid position
//! - When no layer has room, a new layer opens on top of the highest one
//! - A box that still does not fit is placed at the container center and
//!   flagged, so every requested box is rendered

use std::cmp::Ordering;

use crate::geometry::{is_within_container, overlaps_any};
use crate::model::{BoxInstance, ContainerProfile, Placement};
use crate::types::{Dimensional, EPSILON_GENERAL, MIN_EXTENT, Vec3};

/// Largest number of boxes accepted for one packing run.
///
/// Each placement scans the grid against every earlier box, so the run time
/// grows quadratically with the box count.
pub const MAX_PACK_INSTANCES: usize = 1_000;

/// Configuration for the packing heuristic.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Lower bound for the grid step in meters
    pub min_grid_step: f64,
    /// The grid step is the shorter floor side divided by this value
    pub grid_divisions: f64,
    /// Smallest extent of a placed box in meters
    pub min_extent: f64,
    /// Tolerance for boundary comparisons
    pub epsilon: f64,
    /// Stack fallback boxes above everything instead of sharing the center spot
    pub stack_fallbacks: bool,
}

impl PackingConfig {
    pub const DEFAULT_MIN_GRID_STEP: f64 = 0.02;
    pub const DEFAULT_GRID_DIVISIONS: f64 = 40.0;
    pub const DEFAULT_MIN_EXTENT: f64 = MIN_EXTENT;
    pub const DEFAULT_EPSILON: f64 = EPSILON_GENERAL;
    pub const DEFAULT_STACK_FALLBACKS: bool = false;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }

    /// Grid step for a container: `max(min_grid_step, min(L, W) / grid_divisions)`.
    pub fn grid_step_for(&self, container: &ContainerProfile) -> f64 {
        let min_step = if self.min_grid_step.is_finite() && self.min_grid_step > 0.0 {
            self.min_grid_step
        } else {
            Self::DEFAULT_MIN_GRID_STEP
        };
        let divisions = if self.grid_divisions.is_finite() && self.grid_divisions >= 1.0 {
            self.grid_divisions
        } else {
            Self::DEFAULT_GRID_DIVISIONS
        };
        let adaptive = container.length.min(container.width) / divisions;
        if adaptive.is_finite() {
            min_step.max(adaptive)
        } else {
            min_step
        }
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            min_grid_step: Self::DEFAULT_MIN_GRID_STEP,
            grid_divisions: Self::DEFAULT_GRID_DIVISIONS,
            min_extent: Self::DEFAULT_MIN_EXTENT,
            epsilon: Self::DEFAULT_EPSILON,
            stack_fallbacks: Self::DEFAULT_STACK_FALLBACKS,
        }
    }
}

/// Builder for PackingConfig.
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    /// Sets the minimum grid step.
    pub fn min_grid_step(mut self, step: f64) -> Self {
        self.config.min_grid_step = step;
        self
    }

    /// Sets the number of grid divisions along the shorter floor side.
    pub fn grid_divisions(mut self, divisions: f64) -> Self {
        self.config.grid_divisions = divisions;
        self
    }

    /// Sets the minimum extent of placed boxes.
    pub fn min_extent(mut self, extent: f64) -> Self {
        self.config.min_extent = extent;
        self
    }

    /// Sets the boundary tolerance.
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    /// Enables stacking of fallback boxes.
    pub fn stack_fallbacks(mut self, enabled: bool) -> Self {
        self.config.stack_fallbacks = enabled;
        self
    }

    /// Creates the final configuration.
    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// What happened to a single box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlacementOutcome {
    /// Found a free position inside the container.
    Placed(Placement),
    /// No free position; placed at the fallback spot and flagged.
    Fallback(Placement),
    /// Zero volume; nothing to draw.
    Skipped,
}

/// Horizontal shelf: boxes stand on `y`, the tallest one defines `height`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Layer {
    y: f64,
    height: f64,
}

impl Layer {
    fn top(&self) -> f64 {
        self.y + self.height
    }
}

/// Result of a packing run.
#[derive(Clone, Debug, Default)]
pub struct PackingResult {
    /// Placements in placement order (largest box first)
    pub placements: Vec<Placement>,
    /// Source row indices of skipped boxes
    pub skipped: Vec<usize>,
    pub layer_count: usize,
    pub grid_step: f64,
}

impl PackingResult {
    /// Number of boxes placed, including fallbacks.
    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    /// Number of boxes that only got a fallback position.
    pub fn fallback_count(&self) -> usize {
        self.placements.iter().filter(|p| p.fallback).count()
    }

    /// Number of skipped zero-volume boxes.
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Indicates whether every box found a regular position.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.fallback_count() == 0
    }

    /// Total volume of all regular placements.
    pub fn packed_volume(&self) -> f64 {
        self.placements
            .iter()
            .filter(|p| !p.fallback)
            .map(|p| p.volume())
            .sum()
    }
}

/// Events emitted while packing, for live visualization.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "type")]
pub enum PackEvent {
    /// A new layer was opened.
    LayerOpened { index: usize, y: f64 },
    /// A box got a regular position.
    ItemPlaced { sequence: usize, placement: Placement },
    /// A box got the fallback position.
    ItemFallback { sequence: usize, placement: Placement },
    /// A zero-volume box was skipped.
    ItemSkipped { sequence: usize, source_index: usize },
    /// Packing finished.
    Finished {
        placed: usize,
        fallback: usize,
        skipped: usize,
        layers: usize,
    },
}

/// Packs boxes into a container with the default configuration.
///
/// # Parameters
/// * `instances` - Boxes to place, in meters
/// * `container` - The container profile
///
/// # Returns
/// `PackingResult` with one placement per non-degenerate box
pub fn pack(instances: &[BoxInstance], container: &ContainerProfile) -> PackingResult {
    pack_with_config(instances, container, PackingConfig::default())
}

/// Like `pack`, but with a custom configuration.
pub fn pack_with_config(
    instances: &[BoxInstance],
    container: &ContainerProfile,
    config: PackingConfig,
) -> PackingResult {
    pack_with_progress(instances, container, config, |_| {})
}

/// Packing with a live progress callback.
///
/// Calls `on_event` for every step (suitable for SSE).
pub fn pack_with_progress(
    instances: &[BoxInstance],
    container: &ContainerProfile,
    config: PackingConfig,
    mut on_event: impl FnMut(&PackEvent),
) -> PackingResult {
    let grid_step = config.grid_step_for(container);
    let mut result = PackingResult {
        grid_step,
        ..PackingResult::default()
    };

    if instances.is_empty() {
        on_event(&PackEvent::Finished {
            placed: 0,
            fallback: 0,
            skipped: 0,
            layers: 0,
        });
        return result;
    }

    // Largest first; stable, so equal volumes keep row order
    let mut order: Vec<&BoxInstance> = instances.iter().collect();
    order.sort_by(|a, b| {
        sort_volume(b)
            .partial_cmp(&sort_volume(a))
            .unwrap_or(Ordering::Equal)
    });

    let mut layers = vec![Layer {
        y: 0.0,
        height: 0.0,
    }];
    on_event(&PackEvent::LayerOpened { index: 0, y: 0.0 });

    for (sequence, instance) in order.into_iter().enumerate() {
        let layers_before = layers.len();
        let outcome = place_item(
            instance,
            container,
            &config,
            grid_step,
            &mut layers,
            &result.placements,
        );

        if layers.len() > layers_before {
            let index = layers.len() - 1;
            on_event(&PackEvent::LayerOpened {
                index,
                y: layers[index].y,
            });
        }

        match outcome {
            PlacementOutcome::Placed(placement) => {
                result.placements.push(placement);
                on_event(&PackEvent::ItemPlaced {
                    sequence,
                    placement,
                });
            }
            PlacementOutcome::Fallback(placement) => {
                tracing::debug!(
                    "📦 No free position for box from row {}, using fallback at y={:.3}",
                    instance.source_index,
                    placement.y
                );
                result.placements.push(placement);
                on_event(&PackEvent::ItemFallback {
                    sequence,
                    placement,
                });
            }
            PlacementOutcome::Skipped => {
                result.skipped.push(instance.source_index);
                on_event(&PackEvent::ItemSkipped {
                    sequence,
                    source_index: instance.source_index,
                });
            }
        }
    }

    result.layer_count = layers.len();
    on_event(&PackEvent::Finished {
        placed: result.placed_count() - result.fallback_count(),
        fallback: result.fallback_count(),
        skipped: result.skipped_count(),
        layers: result.layer_count,
    });
    result
}

fn sort_volume(instance: &BoxInstance) -> f64 {
    let volume = instance.volume();
    if volume.is_finite() { volume } else { 0.0 }
}

/// Finds the position of a single box.
///
/// Tries the existing layers in creation order, then a new layer on top,
/// then the fallback spot. Never removes or moves earlier placements.
fn place_item(
    instance: &BoxInstance,
    container: &ContainerProfile,
    config: &PackingConfig,
    grid_step: f64,
    layers: &mut Vec<Layer>,
    placed: &[Placement],
) -> PlacementOutcome {
    if instance.is_degenerate() {
        return PlacementOutcome::Skipped;
    }

    let extents = instance.dimensions().at_least(config.min_extent);
    let source = instance.source_index;

    for layer in layers.iter_mut() {
        // Room is measured above the tallest box of the layer, even though
        // candidates stand on the layer floor. On an empty layer this is the
        // plain height check.
        if layer.top() + extents.y > container.height + config.epsilon {
            continue;
        }

        if let Some(placement) =
            scan_layer(layer.y, extents, source, container, grid_step, config, placed)
        {
            layer.height = layer.height.max(extents.y);
            return PlacementOutcome::Placed(placement);
        }
    }

    let new_layer_y = layers.iter().map(Layer::top).fold(0.0, f64::max);

    if new_layer_y + extents.y <= container.height + config.epsilon {
        layers.push(Layer {
            y: new_layer_y,
            height: extents.y,
        });

        let corner = Vec3::new(
            -container.length / 2.0 + extents.x / 2.0,
            new_layer_y + extents.y / 2.0,
            -container.width / 2.0 + extents.z / 2.0,
        );
        let candidate = Placement::new(corner, extents, source);
        // Unlike a bare overlap check, a box longer or wider than the
        // container does not take the corner; it falls back to the center.
        if is_within_container(&candidate, container, config.epsilon)
            && !overlaps_any(&candidate, placed)
        {
            return PlacementOutcome::Placed(candidate);
        }
    }

    PlacementOutcome::Fallback(fallback_placement(
        new_layer_y,
        extents,
        source,
        config,
        placed,
    ))
}

/// Position used when the heuristic finds no room.
///
/// The box sits at the container center on top of the highest layer. With
/// `stack_fallbacks` it goes above every existing box instead, so fallback
/// boxes never overlap anything.
fn fallback_placement(
    layer_top: f64,
    extents: Vec3,
    source: usize,
    config: &PackingConfig,
    placed: &[Placement],
) -> Placement {
    let floor = if config.stack_fallbacks {
        placed.iter().map(Placement::top_y).fold(layer_top, f64::max)
    } else {
        layer_top
    };
    Placement::new(Vec3::new(0.0, floor + extents.y / 2.0, 0.0), extents, source).as_fallback()
}

/// Scans grid centers of one layer, x outer and z inner.
///
/// # Returns
/// The first candidate that overlaps no placed box
fn scan_layer(
    floor_y: f64,
    extents: Vec3,
    source: usize,
    container: &ContainerProfile,
    grid_step: f64,
    config: &PackingConfig,
    placed: &[Placement],
) -> Option<Placement> {
    let xs = axis_centers(container.length, extents.x, grid_step, config.epsilon);
    let zs = axis_centers(container.width, extents.z, grid_step, config.epsilon);
    let y = floor_y + extents.y / 2.0;

    for &x in &xs {
        for &z in &zs {
            let candidate = Placement::new(Vec3::new(x, y, z), extents, source);
            if !overlaps_any(&candidate, placed) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Generates candidate centers along one axis.
///
/// Centers run from `-len/2 + obj/2` to `len/2 - obj/2` in steps of `step`.
/// Empty if the object is longer than the container.
///
/// # Parameters
/// * `container_len` - Container length on this axis
/// * `object_len` - Object length on this axis
/// * `step` - Grid step
/// * `epsilon` - Numerical tolerance
fn axis_centers(container_len: f64, object_len: f64, step: f64, epsilon: f64) -> Vec<f64> {
    let start = -container_len / 2.0 + object_len / 2.0;
    let end = container_len / 2.0 - object_len / 2.0;
    let span = end - start;

    if !span.is_finite() || span < -epsilon || step <= 0.0 {
        return Vec::new();
    }

    let count = ((span.max(0.0) + epsilon) / step).floor() as usize;
    (0..=count).map(|i| start + i as f64 * step).collect()
}
