//! Fixed container catalogs.
//!
//! Two tables exist: interior profiles used by the 3D visualizer and the
//! simplified capacity table the CBM calculator recommends from. Their
//! volumes differ on purpose; each is authoritative for its own view.

use crate::model::{ContainerCapacity, ContainerProfile};

/// Interior profiles offered by the container visualizer.
pub const CONTAINER_PROFILES: [ContainerProfile; 4] = [
    ContainerProfile {
        name: "20ft Standard",
        length: 5.9,
        width: 2.35,
        height: 2.39,
        volume: 33.2,
    },
    ContainerProfile {
        name: "40ft Standard",
        length: 12.03,
        width: 2.35,
        height: 2.39,
        volume: 67.7,
    },
    ContainerProfile {
        name: "40ft High Cube",
        length: 12.03,
        width: 2.35,
        height: 2.69,
        volume: 76.3,
    },
    ContainerProfile {
        name: "45ft High Cube",
        length: 13.56,
        width: 2.35,
        height: 2.69,
        volume: 86.0,
    },
];

/// Capacity table for container recommendations, in cubic meters.
pub const CAPACITY_TABLE: [ContainerCapacity; 3] = [
    ContainerCapacity {
        code: "20GP",
        capacity: 33.0,
    },
    ContainerCapacity {
        code: "40GP",
        capacity: 67.0,
    },
    ContainerCapacity {
        code: "40HC",
        capacity: 76.0,
    },
];

/// Name of the profile used when a request does not choose one.
pub const DEFAULT_PROFILE_NAME: &str = "20ft Standard";

/// Looks up a container profile by name (case-insensitive, trimmed).
pub fn find_profile(name: &str) -> Option<&'static ContainerProfile> {
    let wanted = name.trim();
    CONTAINER_PROFILES
        .iter()
        .find(|profile| profile.name.eq_ignore_ascii_case(wanted))
}

/// The profile used when nothing else is configured.
pub fn default_profile() -> &'static ContainerProfile {
    &CONTAINER_PROFILES[0]
}

/// Capacity entries in ascending capacity order.
pub fn capacities_ascending(table: &[ContainerCapacity]) -> Vec<ContainerCapacity> {
    let mut sorted = table.to_vec();
    sorted.sort_by(|a, b| a.capacity.total_cmp(&b.capacity));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_found_by_name() {
        let profile = find_profile("  40ft high cube ").expect("profile exists");
        assert_eq!(profile.height, 2.69);
        assert!(find_profile("53ft Reefer").is_none());
    }

    #[test]
    fn default_profile_matches_configured_name() {
        assert_eq!(default_profile().name, DEFAULT_PROFILE_NAME);
        assert_eq!(find_profile(DEFAULT_PROFILE_NAME), Some(default_profile()));
    }

    #[test]
    fn profiles_grow_in_catalog_order() {
        for pair in CONTAINER_PROFILES.windows(2) {
            assert!(pair[0].volume < pair[1].volume);
        }
    }

    #[test]
    fn capacities_sort_ascending() {
        let shuffled = [CAPACITY_TABLE[2], CAPACITY_TABLE[0], CAPACITY_TABLE[1]];
        let sorted = capacities_ascending(&shuffled);
        let codes: Vec<_> = sorted.iter().map(|c| c.code).collect();
        assert_eq!(codes, vec!["20GP", "40GP", "40HC"]);
    }
}
