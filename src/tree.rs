//! The tree: a schema, a root node, and build-time configuration.

use crate::attribute::AttributeStats;
use crate::error::{GeotrieError, Result};
use crate::filter::Filter;
use crate::node::Node;
use crate::persistence::{self, Reader, Writer};
use crate::schema::Schema;
use crate::types::Config;
use geo::Rect;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A geohash-indexed radix tree over a shared read-only schema.
///
/// The tree owns its root node exclusively; the schema is shared with
/// readers and writers. `num_points` counts leaves, not interior nodes.
#[derive(Debug)]
pub struct Tree {
    schema: Arc<Schema>,
    root: Node,
    num_nodes: usize,
    config: Config,
}

impl Tree {
    /// Empty tree with default configuration.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_config(schema, Config::default())
    }

    /// Empty tree with explicit configuration.
    pub fn with_config(schema: Arc<Schema>, config: Config) -> Self {
        Self {
            schema,
            root: Node::default(),
            num_nodes: 0,
            config,
        }
    }

    /// Assemble a tree from a flat list of leaf nodes, each carrying a
    /// full-resolution hash and its payload attributes. Inserts every
    /// leaf, compacts attributes upward, then recounts.
    pub fn from_nodelist(schema: Arc<Schema>, nodes: Vec<Node>, config: Config) -> Result<Self> {
        let mut tree = Self::with_config(schema, config);
        let inserted = nodes.len();
        for node in nodes {
            tree.insert_node(node)?;
        }
        tree.compact_attributes();
        tree.num_nodes = tree.count_leaves();
        debug!(
            inserted,
            leaves = tree.num_nodes,
            "assembled tree from nodelist"
        );
        Ok(tree)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The root's hash fragment (empty for every tree built here).
    pub fn hash(&self) -> &str {
        self.root.hash()
    }

    /// Number of points (leaves) the tree holds.
    pub fn num_points(&self) -> usize {
        self.num_nodes
    }

    /// Recount leaves by walking the tree.
    pub fn count_leaves(&self) -> usize {
        if self.root.is_leaf() {
            0
        } else {
            self.root.count_leaves()
        }
    }

    /// Insert one leaf node. The node must carry a non-empty hash.
    pub fn insert_node(&mut self, node: Node) -> Result<()> {
        if node.hash().is_empty() {
            return Err(GeotrieError::InvalidHash(
                "cannot insert a node with an empty hash".to_string(),
            ));
        }
        if self.root.insert(node, self.config.duplicates)? {
            self.num_nodes += 1;
        }
        Ok(())
    }

    /// Move attributes upward wherever all descendants agree, for every
    /// payload dimension (position 2 onward; X and Y live in the hash).
    pub fn compact_attributes(&mut self) {
        for dim in self.schema.dimensions().iter().skip(2) {
            self.root.compact_attribute(dim.position());
        }
    }

    /// Flatten into leaf nodes with full-resolution hashes and fully
    /// resolved attribute lists. Inverse of [`Tree::from_nodelist`] up to
    /// insertion order.
    pub fn to_nodelist(&self) -> Vec<Node> {
        let mut leaves = Vec::with_capacity(self.num_nodes);
        if !self.root.is_leaf() {
            self.root.flatten_into("", &[], &mut leaves);
        }
        leaves
    }

    /// Bounding box of all leaf cells, `None` for an empty tree.
    pub fn extent(&self) -> Result<Option<Rect>> {
        if self.root.is_leaf() {
            return Ok(None);
        }
        let mut extent = None;
        self.root.extend_extent("", &mut extent)?;
        Ok(extent)
    }

    /// Min/max/average of a payload dimension across all leaves, honoring
    /// compacted attributes.
    pub fn attribute_stats(&self, dim_name: &str) -> Result<AttributeStats> {
        let dim = self.schema.require_dimension(dim_name)?;
        let mut stats = AttributeStats::new();
        if !self.root.is_leaf() {
            self.root.collect_stats(dim, None, &mut stats);
        }
        Ok(stats)
    }

    /// New tree containing only leaves whose value exceeds `value`.
    pub fn filter_greater_than(&self, dim_name: &str, value: f64) -> Result<Tree> {
        let dim = self.schema.require_dimension(dim_name)?;
        Ok(self.filtered(&Filter::greater_than(dim, value)))
    }

    /// New tree containing only leaves whose value is below `value`.
    pub fn filter_less_than(&self, dim_name: &str, value: f64) -> Result<Tree> {
        let dim = self.schema.require_dimension(dim_name)?;
        Ok(self.filtered(&Filter::less_than(dim, value)))
    }

    /// New tree containing only leaves whose value lies in the inclusive
    /// range.
    pub fn filter_between(&self, dim_name: &str, value1: f64, value2: f64) -> Result<Tree> {
        let dim = self.schema.require_dimension(dim_name)?;
        Ok(self.filtered(&Filter::between(dim, value1, value2)))
    }

    /// New tree containing only leaves whose value equals `value` within
    /// [`crate::filter::EQUALITY_EPSILON`].
    pub fn filter_equal(&self, dim_name: &str, value: f64) -> Result<Tree> {
        let dim = self.schema.require_dimension(dim_name)?;
        Ok(self.filtered(&Filter::equal(dim, value)))
    }

    /// Prune against an arbitrary filter, producing a disjoint tree.
    pub fn filtered(&self, filter: &Filter) -> Tree {
        let root = self.root.filter(filter).unwrap_or_default();
        let num_nodes = if root.is_leaf() { 0 } else { root.count_leaves() };
        Tree {
            schema: self.schema.clone(),
            root,
            num_nodes,
            config: self.config.clone(),
        }
    }

    /// Serialize the tree: format header, leaf count, then the root node
    /// in pre-order DFS. The schema is not written; readers are handed it
    /// out of band.
    pub fn write(&self, writer: &mut Writer) -> Result<()> {
        persistence::write_header(writer)?;
        writer.put_u32(self.num_nodes as u32)?;
        self.root.write(writer)?;
        writer.flush()
    }

    /// Deserialize a tree written by [`Tree::write`]. The reader carries
    /// the schema and has already validated the header. Fails on trailing
    /// bytes.
    pub fn read(reader: &mut Reader) -> Result<Tree> {
        let num_nodes = reader.read_u32()? as usize;
        let root = Node::read(reader)?;
        reader.expect_end()?;
        debug!(
            leaves = num_nodes,
            version = reader.version(),
            "read serialized tree"
        );
        Ok(Tree {
            schema: reader.schema().clone(),
            root,
            num_nodes,
            config: Config::default(),
        })
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, node: &Node, depth: usize) -> fmt::Result {
        for _ in 0..depth {
            write!(f, "  ")?;
        }
        if node.hash().is_empty() {
            write!(f, "\"\"")?;
        } else {
            write!(f, "{}", node.hash())?;
        }
        for attr in node.attributes() {
            if let Some(dim) = self.schema.dimension(attr.position()) {
                write!(f, " {}={}", dim.name(), attr.value(dim))?;
            }
        }
        writeln!(f)?;
        for child in node.children() {
            self.fmt_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, &self.root, 0)
    }
}
