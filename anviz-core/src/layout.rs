//! Fixed-layout field tables
//!
//! Every structured payload is described by a [`Layout`]: a list of
//! [`Field`]s, each with an offset, a width, a byte order and a sentinel
//! rule. [`Fields`] reads typed values out of a byte slice checked
//! against a layout, and [`FieldWriter`] is the inverse.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result, Violation};

/// Byte order of a multi-byte integer field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// How "no value" is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Every value is a value
    None,
    /// All bits set means absent
    AllOnes,
}

/// One field of a fixed layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
    pub endian: Endian,
    pub sentinel: Sentinel,
}

impl Field {
    /// Big-endian integer or raw bytes
    pub const fn be(name: &'static str, offset: usize, width: usize) -> Self {
        Self {
            name,
            offset,
            width,
            endian: Endian::Big,
            sentinel: Sentinel::None,
        }
    }

    /// Little-endian integer
    pub const fn le(name: &'static str, offset: usize, width: usize) -> Self {
        Self {
            name,
            offset,
            width,
            endian: Endian::Little,
            sentinel: Sentinel::None,
        }
    }

    /// Same field, all-ones meaning absent
    pub const fn optional(self) -> Self {
        Self {
            sentinel: Sentinel::AllOnes,
            ..self
        }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.width
    }

    /// Largest value the field can carry
    pub fn max_value(&self) -> u64 {
        if self.width >= 8 {
            u64::MAX
        } else {
            (1u64 << (self.width * 8)) - 1
        }
    }
}

/// A fixed-size entry description
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub name: &'static str,
    pub size: usize,
    pub fields: &'static [Field],
}

impl Layout {
    /// Bind `bytes` to this layout; the length must match exactly
    pub fn read<'a>(&'static self, bytes: &'a [u8]) -> Result<Fields<'a>> {
        if bytes.len() != self.size {
            return Err(Violation::EntrySize {
                layout: self.name,
                expected: self.size,
                actual: bytes.len(),
            }
            .into());
        }
        Ok(Fields {
            layout: self,
            bytes,
        })
    }

    /// Start a zero-filled entry for this layout
    pub fn writer(&'static self) -> FieldWriter {
        FieldWriter {
            layout: self,
            bytes: vec![0; self.size],
        }
    }

    /// Check that the fields are in bounds, ordered and non-overlapping
    pub fn is_well_formed(&self) -> bool {
        let mut cursor = 0;
        for field in self.fields {
            if field.offset < cursor || field.width == 0 {
                return false;
            }
            cursor = field.end();
        }
        cursor <= self.size
    }

    fn range(&self, field: &Field) -> Result<std::ops::Range<usize>> {
        if field.end() > self.size {
            return Err(Violation::FieldOutOfRange {
                layout: self.name,
                field: field.name,
                size: self.size,
            }
            .into());
        }
        Ok(field.offset..field.end())
    }
}

/// Entry bytes checked against a [`Layout`]
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    layout: &'static Layout,
    bytes: &'a [u8],
}

impl<'a> Fields<'a> {
    /// Raw bytes of a field
    pub fn bytes(&self, field: &Field) -> Result<&'a [u8]> {
        let range = self.layout.range(field)?;
        Ok(&self.bytes[range])
    }

    /// Unsigned integer, zero-extended to 64 bits
    pub fn uint(&self, field: &Field) -> Result<u64> {
        let raw = self.bytes(field)?;
        if field.width == 0 || field.width > 8 {
            return Err(Violation::InvalidField {
                field: field.name,
                reason: format!("a {}-byte field cannot hold an integer", field.width),
            }
            .into());
        }
        Ok(match field.endian {
            Endian::Big => BigEndian::read_uint(raw, field.width),
            Endian::Little => LittleEndian::read_uint(raw, field.width),
        })
    }

    /// Integer honouring the field's sentinel rule
    pub fn optional(&self, field: &Field) -> Result<Option<u64>> {
        let value = self.uint(field)?;
        Ok(match field.sentinel {
            Sentinel::AllOnes if value == field.max_value() => None,
            _ => Some(value),
        })
    }

    pub fn u8(&self, field: &Field) -> Result<u8> {
        self.narrow(field)
    }

    pub fn u16(&self, field: &Field) -> Result<u16> {
        self.narrow(field)
    }

    pub fn u32(&self, field: &Field) -> Result<u32> {
        self.narrow(field)
    }

    fn narrow<T: TryFrom<u64>>(&self, field: &Field) -> Result<T> {
        let value = self.uint(field)?;
        T::try_from(value).map_err(|_| {
            Violation::InvalidField {
                field: field.name,
                reason: format!("{value} out of range"),
            }
            .into()
        })
    }
}

/// Builds one entry of a [`Layout`]
#[derive(Debug, Clone)]
pub struct FieldWriter {
    layout: &'static Layout,
    bytes: Vec<u8>,
}

impl FieldWriter {
    /// Store an unsigned integer; it must fit the field width
    pub fn uint(&mut self, field: &Field, value: u64) -> Result<&mut Self> {
        let range = self.layout.range(field)?;
        if field.width == 0 || field.width > 8 || value > field.max_value() {
            return Err(Error::FieldOverflow {
                field: field.name,
                value,
                width: field.width,
            });
        }
        let slot = &mut self.bytes[range];
        match field.endian {
            Endian::Big => BigEndian::write_uint(slot, value, field.width),
            Endian::Little => LittleEndian::write_uint(slot, value, field.width),
        }
        Ok(self)
    }

    /// Store an optional integer; `None` is written as the sentinel
    pub fn optional(&mut self, field: &Field, value: Option<u64>) -> Result<&mut Self> {
        match (field.sentinel, value) {
            (Sentinel::AllOnes, None) => self.uint(field, field.max_value()),
            (Sentinel::AllOnes, Some(v)) if v == field.max_value() => Err(Error::FieldOverflow {
                field: field.name,
                value: v,
                width: field.width,
            }),
            (_, Some(v)) => self.uint(field, v),
            (Sentinel::None, None) => Err(Violation::InvalidField {
                field: field.name,
                reason: "field has no absent encoding".into(),
            }
            .into()),
        }
    }

    /// Copy raw bytes; the length must equal the field width
    pub fn bytes(&mut self, field: &Field, value: &[u8]) -> Result<&mut Self> {
        let range = self.layout.range(field)?;
        if value.len() != field.width {
            return Err(Violation::InvalidField {
                field: field.name,
                reason: format!("expected {} bytes, got {}", field.width, value.len()),
            }
            .into());
        }
        self.bytes[range].copy_from_slice(value);
        Ok(self)
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
