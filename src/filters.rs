//! Per-node predicates: proximity to a reference point and a tag substring.

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Approximate distance in km using the equirectangular projection.
///
/// Cheap and accurate enough for short distances away from the poles.
pub fn rough_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());

    let x = (lon2 - lon1) * ((lat1 + lat2) / 2.0).cos();
    let y = lat2 - lat1;
    (x * x + y * y).sqrt() * EARTH_RADIUS_KM
}

/// Returns whether (`lat`, `lon`) lies strictly within `max_km` of the
/// reference point, and the distance that was computed. A negative
/// `max_km` disables the check: always matched, distance 0.
pub fn within_radius(ref_lat: f64, ref_lon: f64, lat: f64, lon: f64, max_km: f64) -> (bool, f64) {
    if max_km < 0.0 {
        return (true, 0.0);
    }
    let distance = rough_distance_km(ref_lat, ref_lon, lat, lon);
    (distance < max_km, distance)
}

/// A case-insensitive substring to look for in tag keys and values.
///
/// The needle is lowercased once on construction. An empty pattern matches
/// every node, tagged or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPattern {
    needle: String,
}

impl TagPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            needle: pattern.to_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.needle
    }

    pub fn matches<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.is_empty() || self.first_match(tags).is_some()
    }

    /// First (key, value) pair, in iteration order, whose key or value
    /// contains the needle.
    pub fn first_match<'a, I>(&self, tags: I) -> Option<(&'a str, &'a str)>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if self.is_empty() {
            return None;
        }
        tags.into_iter().find(|(key, value)| {
            key.to_lowercase().contains(&self.needle) || value.to_lowercase().contains(&self.needle)
        })
    }
}
