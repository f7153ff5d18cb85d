//! Configuration types for tree assembly.

use crate::hash::MAX_HASH_LENGTH;
use serde::{Deserialize, Serialize};

/// Policy for points whose hashes collide exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Duplicates {
    /// Collapse colliding points into one leaf, merging their attributes.
    No,
    /// Keep one leaf per inserted point.
    #[default]
    Yes,
}

/// Build-time options for tree assembly.
///
/// Designed to be easily serializable and loadable from JSON, TOML, or
/// other formats.
///
/// # Example
///
/// ```rust
/// use geotrie::{Config, Duplicates};
///
/// let config = Config::default();
/// assert_eq!(config.max_resolution, 16);
///
/// let json = r#"{
///     "max_resolution": 9,
///     "duplicates": "no"
/// }"#;
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.duplicates, Duplicates::No);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Geohash resolution used when encoding points (1-16).
    /// Higher values = finer cells and longer hashes.
    #[serde(default = "Config::default_max_resolution")]
    pub max_resolution: usize,

    /// How points with identical hashes are handled during insertion.
    #[serde(default)]
    pub duplicates: Duplicates,
}

impl Config {
    const fn default_max_resolution() -> usize {
        MAX_HASH_LENGTH
    }

    /// Config with a specific encoding resolution.
    ///
    /// # Panics
    ///
    /// Panics if resolution is not in range 1-16.
    pub fn with_resolution(resolution: usize) -> Self {
        assert!(
            (1..=MAX_HASH_LENGTH).contains(&resolution),
            "Hash resolution must be between 1 and {}",
            MAX_HASH_LENGTH
        );
        Self {
            max_resolution: resolution,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_resolution: Self::default_max_resolution(),
            duplicates: Duplicates::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_resolution, MAX_HASH_LENGTH);
        assert_eq!(config.duplicates, Duplicates::Yes);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_resolution, MAX_HASH_LENGTH);
        assert_eq!(config.duplicates, Duplicates::Yes);
    }

    #[test]
    #[should_panic(expected = "between 1 and")]
    fn test_with_resolution_rejects_zero() {
        let _ = Config::with_resolution(0);
    }
}
