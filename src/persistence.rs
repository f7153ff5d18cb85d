//! Binary writers and readers for serialized trees.
//!
//! Both endpoints come in a file-backed and a memory-backed flavor. Writers
//! are append-only; readers are forward-only cursors that validate the
//! format header up front. Payloads are little-endian on write; readers
//! honor either byte order according to the header's endian marker.

use crate::attribute::AttrValue;
use crate::error::{GeotrieError, Result};
use crate::schema::{DimType, Schema};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Four-byte magic prefixing every serialized tree.
pub const MAGIC: [u8; 4] = *b"GTRE";
/// Current wire format version.
pub const FORMAT_VERSION: u8 = 1;
/// Endian marker for little-endian payloads.
pub const ENDIAN_LITTLE: u8 = 0;
/// Endian marker for big-endian payloads.
pub const ENDIAN_BIG: u8 = 1;

const MEM_INITIAL_CAPACITY: usize = 8 * 1024;

enum WriterKind {
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
    Mem {
        buf: BytesMut,
    },
}

/// Append-only byte sink backed by a file or a growable buffer.
pub struct Writer {
    kind: WriterKind,
    size: u64,
}

impl Writer {
    /// Create (or truncate) a file-backed writer.
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            kind: WriterKind::File {
                writer: BufWriter::new(file),
                path,
            },
            size: 0,
        })
    }

    /// Create a memory-backed writer.
    pub fn memory() -> Self {
        Self {
            kind: WriterKind::Mem {
                buf: BytesMut::with_capacity(MEM_INITIAL_CAPACITY),
            },
            size: 0,
        }
    }

    /// Number of bytes written so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Append raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.kind {
            WriterKind::File { writer, .. } => writer.write_all(bytes)?,
            WriterKind::Mem { buf } => buf.put_slice(bytes),
        }
        self.size += bytes.len() as u64;
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put_bytes(&[value])
    }

    pub fn put_u16(&mut self, value: u16) -> Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Append a packed attribute value, little-endian.
    pub fn put_value(&mut self, value: AttrValue) -> Result<()> {
        match value {
            AttrValue::Int8(v) => self.put_bytes(&v.to_le_bytes()),
            AttrValue::UInt8(v) => self.put_bytes(&v.to_le_bytes()),
            AttrValue::Int16(v) => self.put_bytes(&v.to_le_bytes()),
            AttrValue::UInt16(v) => self.put_bytes(&v.to_le_bytes()),
            AttrValue::Int32(v) => self.put_bytes(&v.to_le_bytes()),
            AttrValue::UInt32(v) => self.put_bytes(&v.to_le_bytes()),
            AttrValue::Int64(v) => self.put_bytes(&v.to_le_bytes()),
            AttrValue::UInt64(v) => self.put_bytes(&v.to_le_bytes()),
            AttrValue::Float(v) => self.put_bytes(&v.to_le_bytes()),
            AttrValue::Double(v) => self.put_bytes(&v.to_le_bytes()),
        }
    }

    /// Flush buffered bytes to the backing store. Memory writers are a
    /// no-op.
    pub fn flush(&mut self) -> Result<()> {
        if let WriterKind::File { writer, .. } = &mut self.kind {
            writer.flush()?;
        }
        Ok(())
    }

    /// Flush and fsync a file-backed writer.
    pub fn sync(&mut self) -> Result<()> {
        if let WriterKind::File { writer, .. } = &mut self.kind {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// The accumulated bytes of a memory-backed writer.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.kind {
            WriterKind::Mem { buf } => Some(buf),
            WriterKind::File { .. } => None,
        }
    }

    /// Consume a memory-backed writer, yielding its bytes. File-backed
    /// writers flush and return an error naming their path instead.
    pub fn into_bytes(mut self) -> Result<Bytes> {
        self.flush()?;
        match self.kind {
            WriterKind::Mem { buf } => Ok(buf.freeze()),
            WriterKind::File { path, .. } => Err(GeotrieError::Other(format!(
                "writer for '{}' is file-backed and holds no byte buffer",
                path.display()
            ))),
        }
    }
}

#[derive(Debug)]
enum ReaderKind {
    File {
        reader: BufReader<File>,
    },
    Mem {
        bytes: Bytes,
    },
}

/// Forward-only cursor over a serialized tree.
///
/// The schema travels out of band: the caller supplies it at construction
/// and attribute widths are derived from it during decoding. The 8-byte
/// format header is consumed and validated here, so a freshly constructed
/// reader is positioned at the first payload byte.
#[derive(Debug)]
pub struct Reader {
    kind: ReaderKind,
    schema: Arc<Schema>,
    version: u8,
    endian: u8,
    offset: u64,
}

impl Reader {
    /// Open a file-backed reader and validate the header.
    pub fn file<P: AsRef<Path>>(path: P, schema: Arc<Schema>) -> Result<Self> {
        let file = File::open(path)?;
        Self::open(
            ReaderKind::File {
                reader: BufReader::new(file),
            },
            schema,
        )
    }

    /// Open a reader over an in-memory byte slice and validate the header.
    pub fn memory(bytes: impl Into<Bytes>, schema: Arc<Schema>) -> Result<Self> {
        Self::open(ReaderKind::Mem { bytes: bytes.into() }, schema)
    }

    fn open(kind: ReaderKind, schema: Arc<Schema>) -> Result<Self> {
        let mut reader = Self {
            kind,
            schema,
            version: 0,
            endian: ENDIAN_LITTLE,
            offset: 0,
        };
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(GeotrieError::InvalidFormat(format!(
                "bad magic {:02x?} at offset 0",
                magic
            )));
        }
        let version = reader.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(GeotrieError::UnsupportedVersion(version));
        }
        let endian = reader.read_u8()?;
        if endian != ENDIAN_LITTLE && endian != ENDIAN_BIG {
            return Err(GeotrieError::InvalidFormat(format!(
                "bad endian marker {} at offset 5",
                endian
            )));
        }
        let mut reserved = [0u8; 2];
        reader.read_exact(&mut reserved)?;
        reader.version = version;
        reader.endian = endian;
        Ok(reader)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Format version from the header.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Byte offset of the cursor from the start of the input.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn swapped(&self) -> bool {
        self.endian == ENDIAN_BIG
    }

    /// Fill `buf` exactly, or fail with the current offset.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match &mut self.kind {
            ReaderKind::File { reader } => {
                reader.read_exact(buf).map_err(|e| match e.kind() {
                    std::io::ErrorKind::UnexpectedEof => GeotrieError::UnexpectedEof(self.offset),
                    _ => GeotrieError::from(e),
                })?;
            }
            ReaderKind::Mem { bytes } => {
                if bytes.remaining() < buf.len() {
                    return Err(GeotrieError::UnexpectedEof(self.offset));
                }
                bytes.copy_to_slice(buf);
            }
        }
        self.offset += buf.len() as u64;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(if self.swapped() {
            u32::from_be_bytes(buf)
        } else {
            u32::from_le_bytes(buf)
        })
    }

    /// Read one packed attribute value of the given type.
    pub fn read_value(&mut self, dtype: DimType) -> Result<AttrValue> {
        macro_rules! read_primitive {
            ($ty:ty, $variant:ident) => {{
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                self.read_exact(&mut buf)?;
                AttrValue::$variant(if self.swapped() {
                    <$ty>::from_be_bytes(buf)
                } else {
                    <$ty>::from_le_bytes(buf)
                })
            }};
        }
        Ok(match dtype {
            DimType::Int8 => read_primitive!(i8, Int8),
            DimType::UInt8 => read_primitive!(u8, UInt8),
            DimType::Int16 => read_primitive!(i16, Int16),
            DimType::UInt16 => read_primitive!(u16, UInt16),
            DimType::Int32 => read_primitive!(i32, Int32),
            DimType::UInt32 => read_primitive!(u32, UInt32),
            DimType::Int64 => read_primitive!(i64, Int64),
            DimType::UInt64 => read_primitive!(u64, UInt64),
            DimType::Float => read_primitive!(f32, Float),
            DimType::Double => read_primitive!(f64, Double),
        })
    }

    /// Fail unless every input byte has been consumed.
    pub fn expect_end(&mut self) -> Result<()> {
        let trailing = match &mut self.kind {
            ReaderKind::Mem { bytes } => bytes.has_remaining(),
            ReaderKind::File { reader } => !reader.fill_buf()?.is_empty(),
        };
        if trailing {
            return Err(GeotrieError::InvalidFormat(format!(
                "trailing bytes after complete tree at offset {}",
                self.offset
            )));
        }
        Ok(())
    }
}

/// Write the 8-byte format header.
pub(crate) fn write_header(writer: &mut Writer) -> Result<()> {
    writer.put_bytes(&MAGIC)?;
    writer.put_u8(FORMAT_VERSION)?;
    writer.put_u8(ENDIAN_LITTLE)?;
    writer.put_u16(0) // reserved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DimType, Dimension};
    use tempfile::NamedTempFile;

    fn schema() -> Arc<Schema> {
        let mut schema = Schema::new();
        for (name, dtype) in [("X", DimType::Double), ("Y", DimType::Double)] {
            schema
                .add_dimension(Dimension::new(name, "", dtype, 1.0, 0.0).unwrap())
                .unwrap();
        }
        Arc::new(schema)
    }

    fn valid_header() -> Vec<u8> {
        let mut writer = Writer::memory();
        write_header(&mut writer).unwrap();
        writer.into_bytes().unwrap().to_vec()
    }

    #[test]
    fn test_memory_writer_accumulates() {
        let mut writer = Writer::memory();
        writer.put_u8(0xAB).unwrap();
        writer.put_u32(0x01020304).unwrap();
        assert_eq!(writer.size(), 5);
        let bytes = writer.into_bytes().unwrap();
        assert_eq!(&bytes[..], &[0xAB, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_file_and_memory_writers_agree() {
        let tmp = NamedTempFile::new().unwrap();
        let mut fw = Writer::file(tmp.path()).unwrap();
        let mut mw = Writer::memory();
        for writer in [&mut fw, &mut mw] {
            write_header(writer).unwrap();
            writer.put_u32(42).unwrap();
        }
        fw.sync().unwrap();
        assert!(fw.into_bytes().is_err());
        let from_file = std::fs::read(tmp.path()).unwrap();
        assert_eq!(from_file, mw.into_bytes().unwrap().to_vec());
    }

    #[test]
    fn test_reader_rejects_bad_magic() {
        let mut bytes = valid_header();
        bytes[0] = b'X';
        let err = Reader::memory(bytes, schema()).unwrap_err();
        assert!(matches!(err, GeotrieError::InvalidFormat(_)));
    }

    #[test]
    fn test_reader_rejects_unknown_version() {
        let mut bytes = valid_header();
        bytes[4] = 99;
        let err = Reader::memory(bytes, schema()).unwrap_err();
        assert!(matches!(err, GeotrieError::UnsupportedVersion(99)));
    }

    #[test]
    fn test_reader_eof_carries_offset() {
        let mut bytes = valid_header();
        bytes.extend_from_slice(&[1, 2]);
        let mut reader = Reader::memory(bytes, schema()).unwrap();
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(err, GeotrieError::UnexpectedEof(8)));
    }

    #[test]
    fn test_reader_expect_end() {
        let mut bytes = valid_header();
        bytes.push(0);
        let mut reader = Reader::memory(bytes, schema()).unwrap();
        assert!(reader.expect_end().is_err());
        reader.read_u8().unwrap();
        assert!(reader.expect_end().is_ok());
    }

    #[test]
    fn test_big_endian_payloads_are_swapped() {
        let mut bytes = valid_header();
        bytes[5] = ENDIAN_BIG;
        bytes.extend_from_slice(&0x01020304u32.to_be_bytes());
        let mut reader = Reader::memory(bytes, schema()).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0x01020304);
    }

    #[test]
    fn test_value_roundtrip_all_types() {
        let values = [
            AttrValue::Int8(-5),
            AttrValue::UInt8(200),
            AttrValue::Int16(-3000),
            AttrValue::UInt16(60000),
            AttrValue::Int32(-100000),
            AttrValue::UInt32(4000000),
            AttrValue::Int64(-1),
            AttrValue::UInt64(u64::MAX),
            AttrValue::Float(1.5),
            AttrValue::Double(-2.25),
        ];
        let mut writer = Writer::memory();
        write_header(&mut writer).unwrap();
        for value in values {
            writer.put_value(value).unwrap();
        }
        let mut reader = Reader::memory(writer.into_bytes().unwrap(), schema()).unwrap();
        for value in values {
            assert_eq!(reader.read_value(value.dtype()).unwrap(), value);
        }
        reader.expect_end().unwrap();
    }
}
