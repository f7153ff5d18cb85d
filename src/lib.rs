//! Geohash-indexed radix tree storage for LiDAR-style point clouds.
//!
//! Every point's (x, y) location becomes a short base-32 geohash; points
//! whose hashes share a prefix hang off a shared interior node, and
//! measurements that agree across a whole subtree are compacted upward
//! toward the root. The result is a compressed, filterable, serializable
//! index over millions of points.
//!
//! ```rust
//! use geotrie::{DimType, Dimension, Point, Schema, TreeBuilder};
//! use std::sync::Arc;
//!
//! let mut schema = Schema::new();
//! schema.add_dimension(Dimension::new("X", "longitude", DimType::Double, 1.0, 0.0)?)?;
//! schema.add_dimension(Dimension::new("Y", "latitude", DimType::Double, 1.0, 0.0)?)?;
//! schema.add_dimension(Dimension::new("Z", "elevation", DimType::Int32, 0.01, 0.0)?)?;
//!
//! let mut builder = TreeBuilder::new(Arc::new(schema)).resolution(9);
//! builder.add_point(&Point::new(-74.0060, 40.7128), &[("Z", 10.5)])?;
//! builder.add_point(&Point::new(-74.0061, 40.7129), &[("Z", 10.5)])?;
//! let tree = builder.build()?;
//!
//! let tall = tree.filter_greater_than("Z", 5.0)?;
//! assert_eq!(tall.num_points(), 2);
//! # Ok::<(), geotrie::GeotrieError>(())
//! ```

pub mod attribute;
pub mod builder;
pub mod error;
pub mod filter;
pub mod hash;
pub mod node;
pub mod persistence;
pub mod schema;
pub mod tree;
pub mod types;

pub use builder::TreeBuilder;
pub use error::{GeotrieError, Result};
pub use tree::Tree;

pub use attribute::{AttrValue, Attribute, AttributeStats};
pub use filter::{Filter, FilterMode};
pub use hash::{HashMatch, MAX_HASH_LENGTH};
pub use node::Node;
pub use persistence::{Reader, Writer};
pub use schema::{DimType, Dimension, Schema};
pub use types::{Config, Duplicates};

pub use geo::{Point, Rect};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeotrieError, Result, Tree, TreeBuilder};

    pub use crate::{Config, Duplicates};

    pub use crate::{DimType, Dimension, Schema};

    pub use crate::{Filter, FilterMode};

    pub use crate::{Reader, Writer};

    pub use geo::{Point, Rect};

    pub use std::sync::Arc;
}
