//! Builder for assembling trees from raw points.
//!
//! This module provides a builder that buffers coordinates with their
//! payload values and produces a fully built, compacted tree in one step.

use crate::attribute::Attribute;
use crate::error::Result;
use crate::hash::MAX_HASH_LENGTH;
use crate::node::Node;
use crate::schema::Schema;
use crate::tree::Tree;
use crate::types::{Config, Duplicates};
use geo::Point;
use std::sync::Arc;

/// Buffers points and payload values, then builds a compacted tree.
///
/// # Example
///
/// ```rust
/// use geotrie::{DimType, Dimension, Point, Schema, TreeBuilder};
/// use std::sync::Arc;
///
/// let mut schema = Schema::new();
/// schema.add_dimension(Dimension::new("X", "", DimType::Double, 1.0, 0.0)?)?;
/// schema.add_dimension(Dimension::new("Y", "", DimType::Double, 1.0, 0.0)?)?;
/// schema.add_dimension(Dimension::new("Z", "", DimType::Int32, 0.01, 0.0)?)?;
///
/// let mut builder = TreeBuilder::new(Arc::new(schema)).resolution(9);
/// builder.add_point(&Point::new(2.3522, 48.8566), &[("Z", 35.0)])?;
/// builder.add_point(&Point::new(2.3523, 48.8567), &[("Z", 35.0)])?;
/// let tree = builder.build()?;
/// assert_eq!(tree.num_points(), 2);
/// # Ok::<(), geotrie::GeotrieError>(())
/// ```
#[derive(Debug)]
pub struct TreeBuilder {
    schema: Arc<Schema>,
    config: Config,
    nodes: Vec<Node>,
}

impl TreeBuilder {
    /// Create a builder with default configuration.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            config: Config::default(),
            nodes: Vec::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the encoding resolution (1-16).
    ///
    /// # Panics
    ///
    /// Panics if resolution is not in range 1-16.
    pub fn resolution(mut self, resolution: usize) -> Self {
        assert!(
            (1..=MAX_HASH_LENGTH).contains(&resolution),
            "Hash resolution must be between 1 and {}",
            MAX_HASH_LENGTH
        );
        self.config.max_resolution = resolution;
        self
    }

    /// Set the duplicates policy.
    pub fn duplicates(mut self, duplicates: Duplicates) -> Self {
        self.config.duplicates = duplicates;
        self
    }

    /// Buffer one point with its payload values, given as
    /// `(dimension name, physical value)` pairs.
    pub fn add_point(&mut self, point: &Point, values: &[(&str, f64)]) -> Result<()> {
        let mut node = Node::from_coordinate(point, self.config.max_resolution)?;
        for (name, value) in values {
            let dim = self.schema.require_dimension(name)?;
            node.add_attribute(Attribute::from_double(dim, *value)?);
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Number of points buffered so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert every buffered point, compact attributes, and return the
    /// finished tree.
    pub fn build(self) -> Result<Tree> {
        Tree::from_nodelist(self.schema, self.nodes, self.config)
    }
}
