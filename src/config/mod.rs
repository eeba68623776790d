use anyhow::{Result, bail};

use crate::filters::TagPattern;

/// Sentinel radius meaning "no distance filtering".
pub const DISTANCE_DISABLED: f64 = -1.0;

/// Capacity of the block-result queue between decode workers and the writer.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Node selection for one run. Built once from the command line, then shared
/// read-only by every decode worker.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub ref_lat: f64,
    pub ref_lon: f64,
    pub max_distance_km: f64,
    pub pattern: TagPattern,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ref_lat: 0.0,
            ref_lon: 0.0,
            max_distance_km: DISTANCE_DISABLED,
            pattern: TagPattern::default(),
        }
    }
}

impl FilterConfig {
    /// `distance` is the raw `-d MAX_KM LAT LON` triple, if given.
    pub fn from_args(distance: Option<&[f64]>, pattern: Option<&str>) -> Result<Self> {
        let mut config = Self {
            pattern: TagPattern::new(pattern.unwrap_or_default()),
            ..Self::default()
        };

        if let Some(values) = distance {
            let &[max_km, lat, lon] = values else {
                bail!(
                    "CLI: -d expects exactly 3 values (max-dist lat lon), got {}",
                    values.len()
                );
            };
            if !max_km.is_finite() {
                bail!("CLI: Illegal value for max-distance: {max_km}");
            }
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                bail!("CLI: Illegal value for latitude: {lat}");
            }
            if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                bail!("CLI: Illegal value for longitude: {lon}");
            }
            config.ref_lat = lat;
            config.ref_lon = lon;
            config.max_distance_km = max_km;
        }

        Ok(config)
    }

    pub fn distance_enabled(&self) -> bool {
        self.max_distance_km >= 0.0
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub queue_depth: usize,
    pub progress: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            progress: false,
        }
    }
}
