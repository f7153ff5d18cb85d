//! Tree nodes and the recursive insertion, compaction, and filter walks.
//!
//! A node stores only the *fragment* of geohash that distinguishes it from
//! its parent; concatenating fragments along a root-to-leaf path yields the
//! leaf's full-resolution hash. Attributes attached to a node apply to every
//! leaf beneath it, which is what compaction exploits:
//!
//! ```text
//! (root "")
//! ├─ "s000"            <- shared prefix lifted into an interior node
//! │  ├─ "0000"  Z=5.0
//! │  └─ "0091"  Z=5.0
//! └─ "y0zh7w1z" Z=9.9
//!
//!        after compact
//!
//! (root "")
//! ├─ "s000"  Z=5.0     <- children agreed, value moved up
//! │  ├─ "0000"
//! │  └─ "0091"
//! └─ "y0zh7w1z" Z=9.9
//! ```

use crate::attribute::{self, Attribute, AttributeStats};
use crate::error::{GeotrieError, Result};
use crate::filter::Filter;
use crate::hash::{self, HashMatch, MAX_HASH_LENGTH};
use crate::persistence::{Reader, Writer};
use crate::schema::Dimension;
use crate::types::Duplicates;
use geo::{Coord, Point, Rect};

/// A tree element: a hash fragment, attributes that apply to every leaf
/// beneath it, and an ordered list of children.
#[derive(Debug, Clone, Default)]
pub struct Node {
    hash: String,
    flag: u8,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Node {
    /// Node carrying a validated hash fragment.
    pub fn from_hash(hash: String) -> Result<Self> {
        hash::validate(&hash)?;
        Ok(Self {
            hash,
            ..Self::default()
        })
    }

    /// Leaf node for a coordinate, hashed at `resolution` characters.
    pub fn from_coordinate(point: &Point, resolution: usize) -> Result<Self> {
        Ok(Self {
            hash: hash::encode(point, resolution)?,
            ..Self::default()
        })
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Reserved flag byte; always zero on trees built by this crate.
    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Midpoint of the cell this node's own fragment describes.
    pub fn coordinate(&self) -> Result<Point> {
        hash::coordinate(&self.hash)
    }

    /// Attach an attribute, replacing any existing entry for its dimension.
    pub fn add_attribute(&mut self, attr: Attribute) {
        attribute::set(&mut self.attributes, attr);
    }

    /// Detach and return the attribute at a schema position.
    pub fn remove_attribute(&mut self, position: usize) -> Option<Attribute> {
        attribute::remove_by_position(&mut self.attributes, position)
    }

    /// The attribute at a schema position, if attached here.
    pub fn attribute(&self, position: usize) -> Option<&Attribute> {
        attribute::get_by_position(&self.attributes, position)
    }

    pub(crate) fn set_hash(&mut self, hash: String) {
        self.hash = hash;
    }

    /// Insert `incoming` into the subtree below this node.
    ///
    /// Returns `true` when the insertion added a leaf, `false` when the
    /// incoming point collapsed into an existing leaf under
    /// [`Duplicates::No`].
    pub fn insert(&mut self, mut incoming: Node, duplicates: Duplicates) -> Result<bool> {
        if self.children.is_empty() {
            self.children.push(incoming);
            return Ok(true);
        }
        for i in 0..self.children.len() {
            let (matched, a_leaf, b_leaf) =
                hash::leaf_parts(self.children[i].hash(), incoming.hash(), MAX_HASH_LENGTH)?;
            match matched {
                // An empty-fragment child is a leaf pinned to this cell;
                // it never absorbs siblings.
                HashMatch::None | HashMatch::Global => continue,
                HashMatch::Same => {
                    return match duplicates {
                        Duplicates::No => {
                            let child = &mut self.children[i];
                            child.attributes =
                                attribute::union(&child.attributes, &incoming.attributes);
                            Ok(false)
                        }
                        Duplicates::Yes => {
                            self.children.push(incoming);
                            Ok(true)
                        }
                    };
                }
                HashMatch::Child => {
                    incoming.set_hash(b_leaf);
                    return self.children[i].insert(incoming, duplicates);
                }
                HashMatch::Split => {
                    let child = &mut self.children[i];
                    let prefix_len = child.hash.len() - a_leaf.len();
                    let interior = Node {
                        hash: child.hash[..prefix_len].to_string(),
                        ..Self::default()
                    };
                    let mut displaced = std::mem::replace(child, interior);
                    displaced.set_hash(a_leaf);
                    incoming.set_hash(b_leaf);
                    let interior = &mut self.children[i];
                    interior.children.push(displaced);
                    interior.children.push(incoming);
                    return Ok(true);
                }
            }
        }
        self.children.push(incoming);
        Ok(true)
    }

    /// Number of leaves in this subtree; a childless node counts itself.
    pub fn count_leaves(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(Node::count_leaves).sum()
        }
    }

    /// Number of attributes attached directly to this node.
    pub fn count_attributes(&self) -> usize {
        self.attributes.len()
    }

    /// Move one dimension's attribute to the highest level at which it
    /// applies to every leaf below.
    ///
    /// Returns the attribute now in force for the whole subtree, if the
    /// subtree agrees on one. Leaves keep their entries; removal is the
    /// parent's job once it has seen agreement across all children.
    pub(crate) fn compact_attribute(&mut self, position: usize) -> Option<Attribute> {
        if self.children.is_empty() {
            return self.attribute(position).copied();
        }
        let mut collected = Vec::with_capacity(self.children.len());
        let mut all_present = true;
        for child in &mut self.children {
            // keep walking even after a miss so deeper levels still compact
            match child.compact_attribute(position) {
                Some(attr) => collected.push(attr),
                None => all_present = false,
            }
        }
        if !all_present {
            return None;
        }
        let first = collected[0];
        if collected.iter().any(|attr| *attr != first) {
            return None;
        }
        for child in &mut self.children {
            child.remove_attribute(position);
        }
        self.add_attribute(first);
        Some(first)
    }

    /// Filter this subtree, producing a fully-owned pruned copy.
    ///
    /// If the filter's dimension is attached here (directly or by an
    /// earlier compaction pass) the predicate decides the entire subtree.
    /// Otherwise the decision is delegated to the children; a leaf that
    /// never sees the dimension is pruned.
    pub(crate) fn filter(&self, filter: &Filter) -> Option<Node> {
        let dim = filter.dimension();
        if let Some(attr) = self.attribute(dim.position()) {
            if filter.matches(attr.value(dim)) {
                Some(self.clone())
            } else {
                None
            }
        } else if self.children.is_empty() {
            None
        } else {
            let survivors: Vec<Node> = self
                .children
                .iter()
                .filter_map(|child| child.filter(filter))
                .collect();
            if survivors.is_empty() {
                None
            } else {
                Some(Node {
                    hash: self.hash.clone(),
                    flag: self.flag,
                    attributes: self.attributes.clone(),
                    children: survivors,
                })
            }
        }
    }

    /// Flatten this subtree into leaf nodes carrying full-resolution hashes
    /// and the union of their own and inherited attributes.
    pub(crate) fn flatten_into(&self, prefix: &str, inherited: &[Attribute], out: &mut Vec<Node>) {
        let full = format!("{}{}", prefix, self.hash);
        if self.children.is_empty() {
            out.push(Node {
                hash: full,
                flag: self.flag,
                attributes: attribute::union(&self.attributes, inherited),
                children: Vec::new(),
            });
            return;
        }
        // deeper entries shadow inherited ones
        let inherited = attribute::union(&self.attributes, inherited);
        for child in &self.children {
            child.flatten_into(&full, &inherited, out);
        }
    }

    /// Merge the cells of every leaf below this node into `extent`.
    pub(crate) fn extend_extent(&self, prefix: &str, extent: &mut Option<Rect>) -> Result<()> {
        let full = format!("{}{}", prefix, self.hash);
        if self.children.is_empty() {
            let cell = hash::decode(&full)?;
            *extent = Some(match extent.take() {
                None => cell,
                Some(acc) => Rect::new(
                    Coord {
                        x: acc.min().x.min(cell.min().x),
                        y: acc.min().y.min(cell.min().y),
                    },
                    Coord {
                        x: acc.max().x.max(cell.max().x),
                        y: acc.max().y.max(cell.max().y),
                    },
                ),
            });
            return Ok(());
        }
        for child in &self.children {
            child.extend_extent(&full, extent)?;
        }
        Ok(())
    }

    /// Fold one leaf observation per leaf into `stats`, honoring values
    /// compacted onto ancestors.
    pub(crate) fn collect_stats(
        &self,
        dim: &Dimension,
        inherited: Option<&Attribute>,
        stats: &mut AttributeStats,
    ) {
        let effective = self.attribute(dim.position()).or(inherited);
        if self.children.is_empty() {
            if let Some(attr) = effective {
                stats.add(attr.value(dim));
            }
            return;
        }
        for child in &self.children {
            child.collect_stats(dim, effective, stats);
        }
    }

    /// Write this subtree in pre-order DFS.
    pub fn write(&self, writer: &mut Writer) -> Result<()> {
        writer.put_u8(self.hash.len() as u8)?;
        writer.put_bytes(self.hash.as_bytes())?;
        // flag byte is reserved, zero on write
        writer.put_u8(0)?;
        let attr_count = u8::try_from(self.attributes.len()).map_err(|_| {
            GeotrieError::OutOfRange(format!(
                "node carries {} attributes, wire limit is 255",
                self.attributes.len()
            ))
        })?;
        writer.put_u8(attr_count)?;
        for attr in &self.attributes {
            writer.put_u8(attr.position() as u8)?;
            writer.put_value(attr.raw())?;
        }
        writer.put_u32(self.children.len() as u32)?;
        for child in &self.children {
            child.write(writer)?;
        }
        Ok(())
    }

    /// Read one subtree written by [`Node::write`].
    pub fn read(reader: &mut Reader) -> Result<Self> {
        let hash_len = reader.read_u8()? as usize;
        if hash_len > MAX_HASH_LENGTH {
            return Err(GeotrieError::InvalidFormat(format!(
                "hash length {} exceeds maximum {} at offset {}",
                hash_len,
                MAX_HASH_LENGTH,
                reader.offset()
            )));
        }
        let mut hash_bytes = vec![0u8; hash_len];
        reader.read_exact(&mut hash_bytes)?;
        let hash = String::from_utf8(hash_bytes).map_err(|_| {
            GeotrieError::InvalidFormat(format!(
                "non-UTF-8 hash at offset {}",
                reader.offset()
            ))
        })?;
        hash::validate(&hash)?;

        let flag = reader.read_u8()?;
        let attr_count = reader.read_u8()?;
        let mut attributes = Vec::with_capacity(attr_count as usize);
        for _ in 0..attr_count {
            let position = reader.read_u8()? as usize;
            let dtype = reader
                .schema()
                .dimension(position)
                .ok_or_else(|| GeotrieError::DimensionNotFound(format!("position {}", position)))?
                .dtype();
            let value = reader.read_value(dtype)?;
            attributes.push(Attribute::from_value(position, value));
        }

        let child_count = reader.read_u32()?;
        let mut children = Vec::with_capacity(child_count.min(1024) as usize);
        for _ in 0..child_count {
            children.push(Node::read(reader)?);
        }

        Ok(Node {
            hash,
            flag,
            attributes,
            children,
        })
    }
}
