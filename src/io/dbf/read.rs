use std::{fs, path::Path};

use anyhow::{bail, ensure, Context, Result};

use super::FieldDescriptor;

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const HEADER_TERMINATOR: u8 = 0x0d;
const DELETED_FLAG: u8 = b'*';

/// In-memory reader over a whole `.dbf` file. Field values come out as
/// the bytes on disk, so numbers keep every stored digit.
pub struct DbfReader {
    data: Vec<u8>,
    fields: Vec<FieldDescriptor>,
    record_count: usize,
    header_len: usize,
    record_len: usize,
}

/// Raw field bytes of one record, in schema order.
pub struct RawRecord<'a> {
    pub deleted: bool,
    fields: Vec<&'a [u8]>,
}

impl<'a> RawRecord<'a> {
    #[inline]
    pub fn field(&self, index: usize) -> Option<&'a [u8]> { self.fields.get(index).copied() }
}

impl DbfReader {
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_bytes(data).with_context(|| format!("invalid dBase file {}", path.display()))
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        ensure!(data.len() >= HEADER_LEN, "file is shorter than a dBase header");

        let record_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
        let record_len = u16::from_le_bytes([data[10], data[11]]) as usize;
        ensure!(header_len <= data.len(), "header length {header_len} exceeds file size {}", data.len());

        let mut fields = Vec::new();
        let mut offset = HEADER_LEN;
        while offset < header_len && data[offset] != HEADER_TERMINATOR {
            let Some(desc) = data.get(offset..offset + DESCRIPTOR_LEN) else {
                bail!("truncated field descriptor at offset {offset}");
            };
            let name_len = desc[..11].iter().position(|&b| b == 0).unwrap_or(11);
            let name = desc[..name_len].iter().map(|&b| b as char).collect::<String>();
            fields.push(FieldDescriptor {
                name: name.trim().to_string(),
                type_code: desc[11] as char,
                width: desc[16],
                precision: desc[17],
            });
            offset += DESCRIPTOR_LEN;
        }

        let fields_len: usize = fields.iter().map(|f| f.width as usize).sum();
        ensure!(fields_len + 1 == record_len,
            "record length {record_len} does not match field widths ({fields_len} + deletion flag)");

        let available = data.len().saturating_sub(header_len) / record_len.max(1);
        ensure!(available >= record_count,
            "header declares {record_count} records but only {available} are present");

        Ok(Self { data, fields, record_count, header_len, record_len })
    }

    #[inline] pub fn fields(&self) -> &[FieldDescriptor] { &self.fields }

    #[inline] pub fn record_count(&self) -> usize { self.record_count }

    /// Record `index`, split into its field slices.
    pub fn record(&self, index: usize) -> Result<RawRecord<'_>> {
        ensure!(index < self.record_count, "record {index} out of range");
        let start = self.header_len + index * self.record_len;
        let bytes = &self.data[start..start + self.record_len];

        let mut fields = Vec::with_capacity(self.fields.len());
        let mut pos = 1;
        for field in &self.fields {
            let end = pos + field.width as usize;
            fields.push(&bytes[pos..end]);
            pos = end;
        }
        Ok(RawRecord { deleted: bytes[0] == DELETED_FLAG, fields })
    }

    pub fn records(&self) -> impl Iterator<Item = Result<RawRecord<'_>>> + '_ {
        (0..self.record_count).map(move |i| self.record(i))
    }
}
