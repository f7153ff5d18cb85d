//! Schemas: named, typed, scaled/offset numeric channels.
//!
//! A [`Schema`] is an insertion-ordered list of [`Dimension`]s with unique
//! names. By convention the first two dimensions are `X` and `Y` and carry
//! the spatial encoding; every later dimension is payload that attaches to
//! tree nodes as attributes. Schemas travel out of band with serialized
//! trees, as XML documents.

use crate::attribute::AttrValue;
use crate::error::{GeotrieError, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard cap on schema width; wire attribute positions are one byte.
pub const MAX_DIMENSIONS: usize = 256;

/// The ten primitive channel types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    Float,
}

impl DimType {
    /// Packed width in bytes.
    pub const fn size(&self) -> usize {
        match self {
            DimType::Int8 | DimType::UInt8 => 1,
            DimType::Int16 | DimType::UInt16 => 2,
            DimType::Int32 | DimType::UInt32 | DimType::Float => 4,
            DimType::Int64 | DimType::UInt64 | DimType::Double => 8,
        }
    }

    /// The interpretation string used in schema XML.
    pub const fn interpretation(&self) -> &'static str {
        match self {
            DimType::Int8 => "int8_t",
            DimType::UInt8 => "uint8_t",
            DimType::Int16 => "int16_t",
            DimType::UInt16 => "uint16_t",
            DimType::Int32 => "int32_t",
            DimType::UInt32 => "uint32_t",
            DimType::Int64 => "int64_t",
            DimType::UInt64 => "uint64_t",
            DimType::Double => "double",
            DimType::Float => "float",
        }
    }

    /// Parse an interpretation string (e.g. `"uint16_t"`).
    pub fn from_interpretation(s: &str) -> Result<Self> {
        match s.trim() {
            "int8_t" => Ok(DimType::Int8),
            "uint8_t" => Ok(DimType::UInt8),
            "int16_t" => Ok(DimType::Int16),
            "uint16_t" => Ok(DimType::UInt16),
            "int32_t" => Ok(DimType::Int32),
            "uint32_t" => Ok(DimType::UInt32),
            "int64_t" => Ok(DimType::Int64),
            "uint64_t" => Ok(DimType::UInt64),
            "double" => Ok(DimType::Double),
            "float" => Ok(DimType::Float),
            other => Err(GeotrieError::UnsupportedType(other.to_string())),
        }
    }
}

/// A named numeric channel with scale and offset.
///
/// Stored values relate to physical values by the affine transform
/// `physical = packed * scale + offset`.
#[derive(Debug, Clone)]
pub struct Dimension {
    position: usize,
    name: String,
    description: String,
    dtype: DimType,
    scale: f64,
    offset: f64,
}

impl Dimension {
    /// Create a dimension. The position is assigned when the dimension is
    /// added to a schema.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        dtype: DimType,
        scale: f64,
        offset: f64,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(GeotrieError::Other(
                "dimension name cannot be empty".to_string(),
            ));
        }
        if scale == 0.0 || !scale.is_finite() || !offset.is_finite() {
            return Err(GeotrieError::OutOfRange(format!(
                "dimension '{}' has invalid scale/offset ({}, {})",
                name, scale, offset
            )));
        }
        Ok(Self {
            position: 0,
            name,
            description: description.into(),
            dtype,
            scale,
            offset,
        })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn dtype(&self) -> DimType {
        self.dtype
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Functional equivalence: name, type, scale, and offset all agree.
    pub fn same(&self, other: &Dimension) -> bool {
        self.name == other.name
            && self.dtype == other.dtype
            && self.scale == other.scale
            && self.offset == other.offset
    }

    /// Quantize a physical value into this dimension's packed form.
    ///
    /// Integer targets round half away from zero and clamp to the primitive
    /// range; float targets store the scaled value unrounded. Non-finite
    /// input is rejected.
    pub fn quantize(&self, value: f64) -> Result<AttrValue> {
        if !value.is_finite() {
            return Err(GeotrieError::OutOfRange(format!(
                "non-finite value for dimension '{}'",
                self.name
            )));
        }
        let raw = (value - self.offset) / self.scale;
        Ok(match self.dtype {
            DimType::Int8 => AttrValue::Int8(clamp_round(raw, i8::MIN as f64, i8::MAX as f64) as i8),
            DimType::UInt8 => AttrValue::UInt8(clamp_round(raw, 0.0, u8::MAX as f64) as u8),
            DimType::Int16 => {
                AttrValue::Int16(clamp_round(raw, i16::MIN as f64, i16::MAX as f64) as i16)
            }
            DimType::UInt16 => AttrValue::UInt16(clamp_round(raw, 0.0, u16::MAX as f64) as u16),
            DimType::Int32 => {
                AttrValue::Int32(clamp_round(raw, i32::MIN as f64, i32::MAX as f64) as i32)
            }
            DimType::UInt32 => AttrValue::UInt32(clamp_round(raw, 0.0, u32::MAX as f64) as u32),
            DimType::Int64 => {
                AttrValue::Int64(clamp_round(raw, i64::MIN as f64, i64::MAX as f64) as i64)
            }
            DimType::UInt64 => AttrValue::UInt64(clamp_round(raw, 0.0, u64::MAX as f64) as u64),
            DimType::Float => AttrValue::Float(raw as f32),
            DimType::Double => AttrValue::Double(raw),
        })
    }

    /// Apply scale and offset to a packed value.
    pub fn dequantize(&self, value: AttrValue) -> f64 {
        value.to_f64() * self.scale + self.offset
    }
}

fn clamp_round(value: f64, min: f64, max: f64) -> f64 {
    value.round().clamp(min, max)
}

/// An insertion-ordered list of dimensions with unique names.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    dims: Vec<Dimension>,
    by_name: FxHashMap<String, usize>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a dimension, assigning it the next position.
    pub fn add_dimension(&mut self, dim: Dimension) -> Result<()> {
        if self.dims.len() >= MAX_DIMENSIONS {
            return Err(GeotrieError::OutOfRange(format!(
                "schema holds at most {} dimensions",
                MAX_DIMENSIONS
            )));
        }
        if self.by_name.contains_key(dim.name()) {
            return Err(GeotrieError::Other(format!(
                "duplicate dimension name '{}'",
                dim.name()
            )));
        }
        let mut dim = dim;
        dim.position = self.dims.len();
        self.by_name.insert(dim.name.clone(), dim.position);
        self.dims.push(dim);
        Ok(())
    }

    pub fn num_dimensions(&self) -> usize {
        self.dims.len()
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dims
    }

    /// Look up a dimension by position.
    pub fn dimension(&self, position: usize) -> Option<&Dimension> {
        self.dims.get(position)
    }

    /// Look up a dimension by name.
    pub fn dimension_by_name(&self, name: &str) -> Option<&Dimension> {
        self.by_name.get(name).map(|&i| &self.dims[i])
    }

    /// Like [`Schema::dimension_by_name`] but failing with
    /// [`GeotrieError::DimensionNotFound`].
    pub fn require_dimension(&self, name: &str) -> Result<&Dimension> {
        self.dimension_by_name(name)
            .ok_or_else(|| GeotrieError::DimensionNotFound(name.to_string()))
    }

    /// Functional equivalence across every dimension.
    pub fn same(&self, other: &Schema) -> bool {
        self.dims.len() == other.dims.len()
            && self
                .dims
                .iter()
                .zip(other.dims.iter())
                .all(|(a, b)| a.same(b))
    }

    /// Parse a schema from a `<pc:PointCloudSchema>` XML document.
    ///
    /// Positions are 1-based in the document and normalized to 0-based
    /// here; dimensions are ordered by position regardless of document
    /// order; unknown elements are ignored.
    pub fn from_xml_str(xml: &str) -> Result<Self> {
        let doc: XmlSchema = quick_xml::de::from_str(xml)
            .map_err(|e| GeotrieError::InvalidFormat(format!("schema XML: {}", e)))?;
        if doc.dimensions.is_empty() {
            return Err(GeotrieError::InvalidFormat(
                "schema XML: no pc:dimension elements".to_string(),
            ));
        }
        let mut parsed = doc.dimensions;
        parsed.sort_by_key(|d| d.position);

        let mut schema = Schema::new();
        for entry in parsed {
            if entry.position == 0 {
                return Err(GeotrieError::InvalidFormat(format!(
                    "schema XML: dimension '{}' has position 0; positions are 1-based",
                    entry.name
                )));
            }
            let dim = Dimension::new(
                entry.name,
                entry.description.unwrap_or_default(),
                DimType::from_interpretation(&entry.interpretation)?,
                entry.scale.unwrap_or(1.0),
                entry.offset.unwrap_or(0.0),
            )?;
            schema.add_dimension(dim)?;
        }
        Ok(schema)
    }

    /// Render the schema as a `<pc:PointCloudSchema>` XML document.
    pub fn to_xml_str(&self) -> Result<String> {
        let doc = XmlSchema {
            xmlns: Some("http://pointcloud.org/schemas/PC/1.1".to_string()),
            dimensions: self
                .dims
                .iter()
                .map(|dim| XmlDimension {
                    position: dim.position + 1,
                    name: dim.name.clone(),
                    description: if dim.description.is_empty() {
                        None
                    } else {
                        Some(dim.description.clone())
                    },
                    interpretation: dim.dtype.interpretation().to_string(),
                    scale: Some(dim.scale),
                    offset: Some(dim.offset),
                })
                .collect(),
        };
        quick_xml::se::to_string(&doc)
            .map_err(|e| GeotrieError::InvalidFormat(format!("schema XML: {}", e)))
    }

    /// Read a schema from an XML file.
    pub fn from_xml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let xml = std::fs::read_to_string(path)?;
        Self::from_xml_str(&xml)
    }

    /// Write the schema to an XML file.
    pub fn to_xml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_xml_str()?)?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "pc:PointCloudSchema")]
struct XmlSchema {
    #[serde(rename = "@xmlns:pc", default, skip_serializing_if = "Option::is_none")]
    xmlns: Option<String>,
    #[serde(rename(serialize = "pc:dimension", deserialize = "dimension"), default)]
    dimensions: Vec<XmlDimension>,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlDimension {
    #[serde(rename(serialize = "pc:position", deserialize = "position"))]
    position: usize,
    #[serde(rename(serialize = "pc:name", deserialize = "name"), default)]
    name: String,
    #[serde(
        rename(serialize = "pc:description", deserialize = "description"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    description: Option<String>,
    #[serde(rename(serialize = "pc:interpretation", deserialize = "interpretation"))]
    interpretation: String,
    #[serde(
        rename(serialize = "pc:scale", deserialize = "scale"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    scale: Option<f64>,
    #[serde(
        rename(serialize = "pc:offset", deserialize = "offset"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    offset: Option<f64>,
}
