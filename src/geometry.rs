//! Geometric helpers for collision and containment checks.
//!
//! Placements are described by their center and full extents, so the
//! separating-axis test compares doubled center distances against summed
//! extents instead of corner coordinates.

use crate::model::{ContainerProfile, Placement};

/// Penetration depth below which two boxes count as touching.
///
/// Centers of stacked boxes are sums of halves and pick up rounding noise;
/// without this, a box resting on another can test as overlapping.
pub const CONTACT_TOLERANCE: f64 = 1e-9;

/// Checks whether two placed boxes overlap.
///
/// Uses an Axis-Aligned Bounding Box (AABB) test on centers.
/// Two boxes overlap only if they overlap strictly on all three axes;
/// boxes that merely touch (within `CONTACT_TOLERANCE`) do not overlap.
///
/// # Parameters
/// * `a` - First placement
/// * `b` - Second placement
///
/// # Returns
/// `true` if the boxes intersect, otherwise `false`
pub fn overlaps(a: &Placement, b: &Placement) -> bool {
    (a.x - b.x).abs() * 2.0 < a.lx + b.lx - CONTACT_TOLERANCE
        && (a.y - b.y).abs() * 2.0 < a.ly + b.ly - CONTACT_TOLERANCE
        && (a.z - b.z).abs() * 2.0 < a.lz + b.lz - CONTACT_TOLERANCE
}

/// Checks whether a candidate overlaps any of the already placed boxes.
pub fn overlaps_any(candidate: &Placement, placed: &[Placement]) -> bool {
    placed.iter().any(|p| overlaps(candidate, p))
}

/// Checks whether a placement lies inside the container interior.
///
/// The interior spans `[-L/2, L/2] × [0, H] × [-W/2, W/2]`.
///
/// # Parameters
/// * `placement` - The placement to check
/// * `container` - The container profile
/// * `epsilon` - Numerical tolerance for the comparison
pub fn is_within_container(placement: &Placement, container: &ContainerProfile, epsilon: f64) -> bool {
    let min = placement.min_corner();
    let max = placement.max_corner();
    let half_length = container.length / 2.0;
    let half_width = container.width / 2.0;

    min.x >= -half_length - epsilon
        && max.x <= half_length + epsilon
        && min.y >= -epsilon
        && max.y <= container.height + epsilon
        && min.z >= -half_width - epsilon
        && max.z <= half_width + epsilon
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;

    fn placement(center: (f64, f64, f64), extents: (f64, f64, f64)) -> Placement {
        Placement::new(Vec3::from(center), Vec3::from(extents), 0)
    }

    fn container() -> ContainerProfile {
        ContainerProfile {
            name: "Test",
            length: 4.0,
            width: 2.0,
            height: 2.0,
            volume: 16.0,
        }
    }

    #[test]
    fn overlapping_boxes_are_detected() {
        let a = placement((0.0, 0.5, 0.0), (1.0, 1.0, 1.0));
        let b = placement((0.5, 0.5, 0.5), (1.0, 1.0, 1.0));
        assert!(overlaps(&a, &b));
        assert!(overlaps(&b, &a));
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        let a = placement((0.0, 0.5, 0.0), (1.0, 1.0, 1.0));
        let beside = placement((1.0, 0.5, 0.0), (1.0, 1.0, 1.0));
        let above = placement((0.0, 1.5, 0.0), (1.0, 1.0, 1.0));
        assert!(!overlaps(&a, &beside));
        assert!(!overlaps(&a, &above));
    }

    #[test]
    fn rounding_noise_on_stacked_boxes_is_not_an_overlap() {
        let height = 2.39;
        let lower = placement((0.0, height / 2.0, 0.0), (5.9, height, 2.35));
        let upper = placement((0.0, height + height / 2.0, 0.0), (5.9, height, 2.35));
        assert!(!overlaps(&lower, &upper));
    }

    #[test]
    fn separation_on_a_single_axis_is_enough() {
        let a = placement((0.0, 0.5, 0.0), (1.0, 1.0, 1.0));
        let b = placement((0.2, 0.5, 3.0), (1.0, 1.0, 1.0));
        assert!(!overlaps(&a, &b));
        assert!(!overlaps_any(&a, &[b]));
        assert!(overlaps_any(&a, &[b, a]));
    }

    #[test]
    fn containment_respects_floor_and_walls() {
        let c = container();
        assert!(is_within_container(
            &placement((-1.5, 0.5, -0.5), (1.0, 1.0, 1.0)),
            &c,
            1e-9
        ));
        assert!(!is_within_container(
            &placement((1.8, 0.5, 0.0), (1.0, 1.0, 1.0)),
            &c,
            1e-9
        ));
        assert!(!is_within_container(
            &placement((0.0, 1.8, 0.0), (1.0, 1.0, 1.0)),
            &c,
            1e-9
        ));
        assert!(!is_within_container(
            &placement((0.0, 0.4, 0.0), (1.0, 1.0, 1.0)),
            &c,
            1e-9
        ));
    }
}
