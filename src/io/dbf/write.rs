use std::{
    io::{Seek, SeekFrom, Write},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, ensure, Context, Result};
use shapefile::dbase::FieldName;

use super::FieldDescriptor;

/// Streaming `.dbf` writer over values from [`super::encode_value`]. The
/// record count in the header is patched by [`DbfWriter::finish`].
pub struct DbfWriter<W: Write + Seek> {
    inner: W,
    fields: Vec<FieldDescriptor>,
    count: u32,
}

impl<W: Write + Seek> DbfWriter<W> {
    pub fn new(mut inner: W, fields: &[FieldDescriptor]) -> Result<Self> {
        let header_len = u16::try_from(32 + 32 * fields.len() + 1).context("too many fields for a dBase header")?;
        let record_len = 1 + fields.iter().map(|f| f.width as usize).sum::<usize>();
        let record_len = u16::try_from(record_len).context("record too wide for a dBase file")?;

        let (year, month, day) = today();
        let mut header = [0u8; 32];
        header[0] = 0x03;
        header[1] = (year - 1900).clamp(0, 255) as u8;
        header[2] = month;
        header[3] = day;
        header[8..10].copy_from_slice(&header_len.to_le_bytes());
        header[10..12].copy_from_slice(&record_len.to_le_bytes());
        inner.write_all(&header)?;

        for field in fields {
            // at most 11 bytes, checked the way dbase checks its own tables
            FieldName::try_from(field.name.as_str())
                .map_err(|e| anyhow!("field name {:?}: {e:?}", field.name))?;
            ensure!(field.name.is_ascii(), "field name {:?} is not ASCII", field.name);
            ensure!(field.field_type().is_some(), "field {:?} has unsupported type {}", field.name, field.type_code);

            let mut desc = [0u8; 32];
            desc[..field.name.len()].copy_from_slice(field.name.as_bytes());
            desc[11] = field.type_code as u8;
            desc[16] = field.width;
            desc[17] = field.precision;
            inner.write_all(&desc)?;
        }
        inner.write_all(&[0x0d])?;

        Ok(Self { inner, fields: fields.to_vec(), count: 0 })
    }

    /// Append one record. `values` hold the encoded bytes of every field,
    /// each exactly as wide as its descriptor.
    pub fn write_record(&mut self, values: &[Vec<u8>]) -> Result<()> {
        ensure!(values.len() == self.fields.len(),
            "record has {} values for {} fields", values.len(), self.fields.len());

        self.inner.write_all(b" ")?;
        for (field, value) in self.fields.iter().zip(values) {
            ensure!(value.len() == field.width as usize,
                "value for {:?} is {} bytes wide, expected {}", field.name, value.len(), field.width);
            self.inner.write_all(value)?;
        }
        self.count += 1;
        Ok(())
    }

    /// Write the end-of-file marker and the final record count.
    pub fn finish(mut self) -> Result<W> {
        self.inner.write_all(&[0x1a])?;
        self.inner.seek(SeekFrom::Start(4))?;
        self.inner.write_all(&self.count.to_le_bytes())?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush().context("failed to finish attribute table")?;
        Ok(self.inner)
    }
}

/// Current UTC date as (year, month, day).
fn today() -> (i64, u8, u8) {
    let days = SystemTime::now().duration_since(UNIX_EPOCH)
        .map(|d| (d.as_secs() / 86_400) as i64)
        .unwrap_or(0);
    civil_from_days(days)
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dbf::{DbfReader, FieldType};
    use std::io::Cursor;

    #[test]
    fn civil_dates() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(11_016), (2000, 2, 29));
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
    }

    #[test]
    fn finish_patches_record_count() {
        let fields = vec![FieldDescriptor::new("ID", FieldType::Numeric, 3, 0)];
        let mut writer = DbfWriter::new(Cursor::new(Vec::new()), &fields).unwrap();
        writer.write_record(&[b"  1".to_vec()]).unwrap();
        writer.write_record(&[b" 42".to_vec()]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(bytes.last(), Some(&0x1a));
        let reader = DbfReader::from_bytes(bytes).unwrap();
        assert_eq!(reader.record_count(), 2);
        assert_eq!(reader.record(1).unwrap().field(0), Some(&b" 42"[..]));
    }

    #[test]
    fn misaligned_values_are_rejected() {
        let fields = vec![FieldDescriptor::new("ID", FieldType::Numeric, 3, 0)];
        let mut writer = DbfWriter::new(Cursor::new(Vec::new()), &fields).unwrap();
        assert!(writer.write_record(&[b"1".to_vec()]).is_err());
        assert!(writer.write_record(&[]).is_err());
    }

    #[test]
    fn bad_field_declarations_are_rejected() {
        let long = FieldDescriptor::new("POPULATION_2020", FieldType::Numeric, 10, 0);
        assert!(DbfWriter::new(Cursor::new(Vec::new()), &[long]).is_err());
        let memo = FieldDescriptor { name: "NOTES".into(), type_code: 'M', width: 10, precision: 0 };
        assert!(DbfWriter::new(Cursor::new(Vec::new()), &[memo]).is_err());
    }

    #[test]
    fn written_tables_open_in_dbase() {
        let fields = vec![
            FieldDescriptor::new("NAME", FieldType::Character, 8, 0),
            FieldDescriptor::new("POP", FieldType::Numeric, 6, 0),
        ];
        let mut writer = DbfWriter::new(Cursor::new(Vec::new()), &fields).unwrap();
        writer.write_record(&[b"Mill    ".to_vec(), b"  1200".to_vec()]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut reader = shapefile::dbase::Reader::new(Cursor::new(bytes)).unwrap();
        let names: Vec<_> = reader.fields().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, ["NAME", "POP"]);
        let records = reader.read().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get("NAME"),
            Some(&shapefile::dbase::FieldValue::Character(Some("Mill".into()))),
        );
    }
}
