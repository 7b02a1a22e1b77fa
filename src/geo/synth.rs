//! Deterministic pseudo-geographic coordinates from an address string
//!
//! Used wherever a node has no authoritative location: the same address
//! always lands on the same spot, away from the poles.

use super::GeoPoint;

/// Multiplier for the secondary (longitude) hash.
const SECOND_HASH_MULTIPLIER: i64 = 2_654_435_761;

const LAT_RANGE: i64 = 130;
const LAT_OFFSET: f64 = -60.0;
const LON_RANGE: i64 = 360;
const LON_OFFSET: f64 = -180.0;

/// Fold UTF-16 code units as `hash * 31 + unit`, wrapping at 32 bits.
pub fn address_hash(address: &str) -> i32 {
    address
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Coordinates for an address: latitude in [-60, 69], longitude in [-180, 179].
pub fn coords_for_address(address: &str) -> GeoPoint {
    let hash = i64::from(address_hash(address));
    // |hash| <= 2^31, so the product stays well inside i64
    let second = hash * SECOND_HASH_MULTIPLIER;

    let lat = (hash.abs() % LAT_RANGE) as f64 + LAT_OFFSET;
    let lon = (second.abs() % LON_RANGE) as f64 + LON_OFFSET;
    GeoPoint::new(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_address_same_coords() {
        let a = coords_for_address("10.144.1.27");
        let b = coords_for_address("10.144.1.27");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_address_is_valid() {
        let p = coords_for_address("");
        assert_eq!(p, GeoPoint::new(-180.0, -60.0));
    }

    #[test]
    fn hash_matches_fold() {
        // 'a' = 97, 'b' = 98 -> 97 * 31 + 98
        assert_eq!(address_hash("ab"), 97 * 31 + 98);
    }

    #[test]
    fn hash_wraps_instead_of_overflowing() {
        let long = "255.255.255.255".repeat(20);
        let _ = address_hash(&long);
        let p = coords_for_address(&long);
        assert!(p.is_finite());
    }

    #[test]
    fn coords_stay_in_range() {
        for i in 0..2000 {
            let address = format!("10.{}.{}.{}", i % 7, i / 13, i % 251);
            let p = coords_for_address(&address);
            assert!((-60.0..=70.0).contains(&p.lat), "lat {} for {}", p.lat, address);
            assert!((-180.0..=180.0).contains(&p.lon), "lon {} for {}", p.lon, address);
        }
    }

    #[test]
    fn different_addresses_spread_out() {
        let a = coords_for_address("10.0.0.1");
        let b = coords_for_address("10.0.0.2");
        assert_ne!(a, b);
    }
}
