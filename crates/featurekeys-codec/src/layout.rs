//! Cache key layout definitions
//!
//! Key Layout (all integers little-endian `u32`):
//! ```text
//! +---------------------+
//! | field count         |
//! +---------------------+  x field count
//! | name type (STRING)  |
//! | name length         |
//! | name bytes          |  join-key column, e.g. "id_worker_id"
//! +---------------------+  x field count
//! | value type          |  INT64, INT32, STRING, ...
//! | value length        |
//! | value bytes         |
//! +---------------------+
//! | project name        |  trailing, no length prefix
//! +---------------------+
//! ```
//!
//! For a single-field key the identifier starts `TYPE_TAG_WIDTH +
//! LENGTH_PREFIX_WIDTH` bytes after the end of the column name. That
//! distance is what [`KeyLayout`] carries as `skip_bytes`.

use bytes::{BufMut, Bytes, BytesMut};
use featurekeys_common::config::{CodecConfig, DEFAULT_ID_WIDTH};
use featurekeys_common::{Error, Result};
use std::fmt;
use std::ops::Range;

/// Width of a value type tag
pub const TYPE_TAG_WIDTH: usize = 4;

/// Width of a length prefix
pub const LENGTH_PREFIX_WIDTH: usize = 4;

/// Upper bound on fields in a composite key
pub const MAX_FIELDS: u32 = 16;

/// Value type tag for byte strings
pub const VALUE_TYPE_BYTES: u32 = 1;

/// Value type tag for UTF-8 strings (always used for column names)
pub const VALUE_TYPE_STRING: u32 = 2;

/// Value type tag for 32-bit integers
pub const VALUE_TYPE_INT32: u32 = 3;

/// Value type tag for 64-bit integers
pub const VALUE_TYPE_INT64: u32 = 4;

/// Offsets used when locating an identifier relative to its column name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    skip_bytes: usize,
    id_width: usize,
}

impl KeyLayout {
    /// Layout observed in keys written by the feature store
    pub const DEFAULT: Self = Self {
        skip_bytes: TYPE_TAG_WIDTH + LENGTH_PREFIX_WIDTH,
        id_width: DEFAULT_ID_WIDTH,
    };

    /// Create a layout; the identifier must fit in a `u64`
    pub fn new(skip_bytes: usize, id_width: usize) -> Result<Self> {
        if !(1..=8).contains(&id_width) {
            return Err(Error::configuration(format!(
                "identifier width must be between 1 and 8, got {id_width}"
            )));
        }
        Ok(Self {
            skip_bytes,
            id_width,
        })
    }

    /// Build the layout from codec configuration
    pub fn from_config(config: &CodecConfig) -> Result<Self> {
        Self::new(config.skip_bytes, config.id_width)
    }

    /// Bytes between the end of the column name and the identifier
    #[must_use]
    pub const fn skip_bytes(&self) -> usize {
        self.skip_bytes
    }

    /// Identifier width in bytes
    #[must_use]
    pub const fn id_width(&self) -> usize {
        self.id_width
    }

    /// Byte range of the identifier for a marker found at `marker_pos`,
    /// or `None` if the offsets overflow
    #[must_use]
    pub fn id_range(&self, marker_pos: usize, marker_len: usize) -> Option<Range<usize>> {
        let start = marker_pos
            .checked_add(marker_len)?
            .checked_add(self.skip_bytes)?;
        let end = start.checked_add(self.id_width)?;
        Some(start..end)
    }

    /// Whether `raw` extends past the identifier window of a marker found
    /// at `marker_pos`
    #[must_use]
    pub fn covers(&self, raw: &[u8], marker_pos: usize, marker_len: usize) -> bool {
        self.id_range(marker_pos, marker_len)
            .is_some_and(|range| range.end <= raw.len())
    }

    /// Read the little-endian identifier following a marker.
    ///
    /// Returns `None` when the key ends before the identifier does.
    #[must_use]
    pub fn read_id(&self, raw: &[u8], marker_pos: usize, marker_len: usize) -> Option<u64> {
        let bytes = raw.get(self.id_range(marker_pos, marker_len)?)?;
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(u64::from_le_bytes(buf))
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Value stored for one entity field
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Int64(u64),
    Int32(u32),
    Text(String),
    /// Any other type tag, kept verbatim
    Other { type_tag: u32, bytes: Bytes },
}

impl FieldValue {
    /// Integer view of the value, if it is numeric
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int64(v) => Some(*v),
            Self::Int32(v) => Some(u64::from(*v)),
            _ => None,
        }
    }

    /// Type tag written for this value
    #[must_use]
    pub const fn type_tag(&self) -> u32 {
        match self {
            Self::Int64(_) => VALUE_TYPE_INT64,
            Self::Int32(_) => VALUE_TYPE_INT32,
            Self::Text(_) => VALUE_TYPE_STRING,
            Self::Other { type_tag, .. } => *type_tag,
        }
    }

    fn decode(type_tag: u32, bytes: &[u8], offset: usize) -> Result<Self> {
        match type_tag {
            VALUE_TYPE_INT64 => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    Error::malformed(offset, format!("INT64 value has length {}", bytes.len()))
                })?;
                Ok(Self::Int64(u64::from_le_bytes(arr)))
            }
            VALUE_TYPE_INT32 => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    Error::malformed(offset, format!("INT32 value has length {}", bytes.len()))
                })?;
                Ok(Self::Int32(u32::from_le_bytes(arr)))
            }
            VALUE_TYPE_STRING => std::str::from_utf8(bytes)
                .map(|s| Self::Text(s.to_string()))
                .map_err(|_| Error::malformed(offset, "STRING value is not UTF-8")),
            _ => Ok(Self::Other {
                type_tag,
                bytes: Bytes::copy_from_slice(bytes),
            }),
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.type_tag());
        match self {
            Self::Int64(v) => {
                buf.put_u32_le(8);
                buf.put_u64_le(*v);
            }
            Self::Int32(v) => {
                buf.put_u32_le(4);
                buf.put_u32_le(*v);
            }
            Self::Text(s) => put_prefixed(buf, s.as_bytes()),
            Self::Other { bytes, .. } => put_prefixed(buf, bytes),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "INT64 {v}"),
            Self::Int32(v) => write!(f, "INT32 {v}"),
            Self::Text(s) => write!(f, "STRING {s:?}"),
            Self::Other {
                type_tag: VALUE_TYPE_BYTES,
                bytes,
            } => {
                f.write_str("BYTES 0x")?;
                bytes.iter().try_for_each(|b| write!(f, "{b:02x}"))
            }
            Self::Other { type_tag, bytes } => {
                write!(f, "type {type_tag} ({} bytes)", bytes.len())
            }
        }
    }
}

/// One join-key column and its value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityField {
    /// Join-key column name
    pub name: String,
    /// Column value
    pub value: FieldValue,
}

/// A fully parsed cache key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityKey {
    /// Entity fields in key order
    pub fields: Vec<EntityField>,
    /// Project namespace the key belongs to
    pub project: String,
}

impl EntityKey {
    /// Create a single-field key with a 64-bit identifier
    pub fn single(column: impl Into<String>, identifier: u64, project: impl Into<String>) -> Self {
        Self {
            fields: vec![EntityField {
                name: column.into(),
                value: FieldValue::Int64(identifier),
            }],
            project: project.into(),
        }
    }

    /// Look up a field by column name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&EntityField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Serialize to the cache key layout
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();

        put_len(&mut buf, self.fields.len());
        for field in &self.fields {
            buf.put_u32_le(VALUE_TYPE_STRING);
            put_prefixed(&mut buf, field.name.as_bytes());
        }
        for field in &self.fields {
            field.value.encode(&mut buf);
        }
        buf.put_slice(self.project.as_bytes());

        buf.freeze()
    }

    /// Parse a key strictly according to the layout.
    ///
    /// Unlike [`KeyCodec::decode`](crate::KeyCodec::decode) this reports
    /// exactly where and why a key does not match.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);

        let count = reader.u32()?;
        if count == 0 || count > MAX_FIELDS {
            return Err(Error::malformed(
                0,
                format!("field count {count} outside 1..={MAX_FIELDS}"),
            ));
        }

        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let offset = reader.pos;
            let tag = reader.u32()?;
            if tag != VALUE_TYPE_STRING {
                return Err(Error::malformed(
                    offset,
                    format!("name type tag {tag} is not STRING"),
                ));
            }
            let name_offset = reader.pos + LENGTH_PREFIX_WIDTH;
            let bytes = reader.prefixed()?;
            let name = std::str::from_utf8(bytes)
                .map_err(|_| Error::malformed(name_offset, "column name is not UTF-8"))?;
            names.push(name.to_string());
        }

        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let offset = reader.pos;
            let tag = reader.u32()?;
            let bytes = reader.prefixed()?;
            let value = FieldValue::decode(tag, bytes, offset)?;
            fields.push(EntityField { name, value });
        }

        let project_offset = reader.pos;
        let project = std::str::from_utf8(reader.rest())
            .map_err(|_| Error::malformed(project_offset, "project name is not UTF-8"))?
            .to_string();

        Ok(Self { fields, project })
    }
}

fn put_len(buf: &mut BytesMut, len: usize) {
    buf.put_u32_le(u32::try_from(len).unwrap_or(u32::MAX));
}

fn put_prefixed(buf: &mut BytesMut, bytes: &[u8]) {
    put_len(buf, bytes.len());
    buf.put_slice(bytes);
}

/// Bounds-checked cursor over key bytes
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::TruncatedKey {
                required: self.pos.saturating_add(len),
                available: self.data.len(),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn rest(self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}
