//! dBase III attribute tables (`.dbf`), the attribute half of a shapefile.
//!
//! Field bytes are handed out raw and values are written as the exact
//! bytes of each field. The `dbase` reader parses `N`/`F` fields into
//! `f64`/`f32` and its writer only emits UTF-8 text unless built with extra
//! code pages, so neither side goes through it; names and dates use its
//! `FieldName` and `Date`. Text decoding is left to [`CharacterEncoding`]
//! so the importer decides how strings are read.

mod encoding;
mod read;
mod value;
mod write;

use std::fmt;

pub use encoding::CharacterEncoding;
pub use read::{DbfReader, RawRecord};
pub use value::{decode_value, encode_value, ValueError};
pub use write::DbfWriter;

/// Field types understood by the codec, keyed by their dBase type character.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Logical,
    Date,
}

impl FieldType {
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'C' => Some(Self::Character),
            'N' => Some(Self::Numeric),
            'F' => Some(Self::Float),
            'L' => Some(Self::Logical),
            'D' => Some(Self::Date),
            _ => None,
        }
    }

    pub fn code(&self) -> char {
        match self {
            Self::Character => 'C',
            Self::Numeric => 'N',
            Self::Float => 'F',
            Self::Logical => 'L',
            Self::Date => 'D',
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One column of the table: name, type code, width and decimal count.
/// The type code is kept verbatim so unknown types survive until a value
/// actually has to be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub type_code: char,
    pub width: u8,
    pub precision: u8,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType, width: u8, precision: u8) -> Self {
        Self { name: name.into(), type_code: field_type.code(), width, precision }
    }

    #[inline]
    pub fn field_type(&self) -> Option<FieldType> { FieldType::from_code(self.type_code) }
}
