use shapefile::dbase::Date;
use thiserror::Error;

use super::{CharacterEncoding, FieldDescriptor, FieldType};

/// Failure to convert one field value, carrying the user-facing message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("Unable to decode value in '{0}' attribute. Are you sure you're using the right character encoding?")]
    Decode(String),

    #[error("Unable to encode value in '{name}' attribute using the {encoding} encoding.")]
    Encode { name: String, encoding: CharacterEncoding },

    #[error("Invalid numeric value in '{0}' attribute.")]
    Numeric(String),

    #[error("Invalid date value in '{0}' attribute.")]
    Date(String),

    #[error("Invalid logical value in '{0}' attribute.")]
    Logical(String),

    #[error("Value in '{name}' attribute does not fit in {width} characters.")]
    TooWide { name: String, width: u8 },

    #[error("Unsupported attribute type: {0}")]
    UnsupportedType(char),
}

fn field_type(field: &FieldDescriptor) -> Result<FieldType, ValueError> {
    field.field_type().ok_or(ValueError::UnsupportedType(field.type_code))
}

/// Decode raw field bytes into the stored text form. Blank fields are null.
pub fn decode_value(field: &FieldDescriptor, raw: &[u8], encoding: CharacterEncoding) -> Result<Option<String>, ValueError> {
    let ty = field_type(field)?;

    let end = raw.iter().rposition(|&b| b != b' ' && b != 0).map_or(0, |i| i + 1);
    let raw = &raw[..end];
    if raw.is_empty() { return Ok(None) }

    let name = || field.name.clone();
    match ty {
        FieldType::Character => encoding.decode(raw)
            .map(Some)
            .ok_or_else(|| ValueError::Decode(name())),
        FieldType::Numeric | FieldType::Float => {
            let text = std::str::from_utf8(raw).map_err(|_| ValueError::Numeric(name()))?.trim();
            // dBase fills a field with '*' when the number overflowed its width
            if text.bytes().all(|b| b == b'*') { return Ok(None) }
            format_number(text, field.precision).map(Some).ok_or_else(|| ValueError::Numeric(name()))
        }
        FieldType::Date => {
            let text = std::str::from_utf8(raw).map_err(|_| ValueError::Date(name()))?.trim();
            let (year, month, day) = parse_date(text).ok_or_else(|| ValueError::Date(name()))?;
            Ok(Some(format!("{year:04}-{month:02}-{day:02}")))
        }
        FieldType::Logical => match raw.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'T' | b't' | b'Y' | b'y') => Ok(Some("T".to_string())),
            Some(b'F' | b'f' | b'N' | b'n') => Ok(Some("F".to_string())),
            Some(b'?') | None => Ok(None),
            Some(_) => Err(ValueError::Logical(name())),
        },
    }
}

/// Encode a stored value into exactly `field.width` bytes. Null becomes blanks.
pub fn encode_value(field: &FieldDescriptor, value: Option<&str>, encoding: CharacterEncoding) -> Result<Vec<u8>, ValueError> {
    let ty = field_type(field)?;
    let width = field.width as usize;
    let Some(value) = value else { return Ok(vec![b' '; width]) };

    let name = || field.name.clone();
    let (bytes, right_align) = match ty {
        FieldType::Character => {
            let bytes = encoding.encode(value)
                .ok_or_else(|| ValueError::Encode { name: name(), encoding })?;
            (bytes, false)
        }
        FieldType::Numeric | FieldType::Float => {
            let text = format_number(value.trim(), field.precision).ok_or_else(|| ValueError::Numeric(name()))?;
            (text.into_bytes(), true)
        }
        FieldType::Date => {
            let digits = value.trim().replace('-', "");
            let (year, month, day) = parse_date(&digits).ok_or_else(|| ValueError::Date(name()))?;
            (Date::new(day, month, year).to_string().into_bytes(), false)
        }
        FieldType::Logical => {
            let flag = match value.trim().to_ascii_uppercase().as_str() {
                "T" | "Y" | "TRUE" | "YES" => b'T',
                "F" | "N" | "FALSE" | "NO" => b'F',
                "?" | "" => b'?',
                _ => return Err(ValueError::Logical(name())),
            };
            (vec![flag], false)
        }
    };

    if bytes.len() > width {
        return Err(ValueError::TooWide { name: name(), width: field.width });
    }
    let padding = vec![b' '; width - bytes.len()];
    Ok(if right_align { [padding, bytes].concat() } else { [bytes, padding].concat() })
}

/// `YYYYMMDD` with a month in 1..=12 and a day in 1..=31.
fn parse_date(text: &str) -> Option<(u32, u32, u32)> {
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) { return None }
    let year = text[..4].parse().ok()?;
    let month = text[4..6].parse().ok()?;
    let day = text[6..].parse().ok()?;
    ((1..=12).contains(&month) && (1..=31).contains(&day)).then_some((year, month, day))
}

/// Normalize decimal text to exactly `precision` fraction digits without
/// going through floating point. Precision 0 only accepts integers
/// (a fraction of zeros is dropped); longer fractions are rounded half up.
fn format_number(text: &str, precision: u8) -> Option<String> {
    let (negative, unsigned) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !is_digits(int) || !is_digits(frac) {
        return None;
    }

    let precision = precision as usize;
    if precision == 0 && frac.bytes().any(|b| b != b'0') {
        return None;
    }

    let mut digits: Vec<u8> = int.bytes().collect();
    digits.extend(frac.bytes().chain(std::iter::repeat(b'0')).take(precision));
    if frac.len() > precision && frac.as_bytes()[precision] >= b'5' {
        round_up(&mut digits);
    }

    let split = digits.len() - precision;
    let int_part = std::str::from_utf8(&digits[..split]).ok()?.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let frac_part = std::str::from_utf8(&digits[split..]).ok()?;

    let zero = digits.iter().all(|&b| b == b'0');
    let sign = if negative && !zero { "-" } else { "" };
    Some(if precision == 0 {
        format!("{sign}{int_part}")
    } else {
        format!("{sign}{int_part}.{frac_part}")
    })
}

/// Add one unit in the last place of a decimal digit string.
fn round_up(digits: &mut Vec<u8>) {
    for d in digits.iter_mut().rev() {
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            return;
        }
    }
    digits.insert(0, b'1');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(ty: FieldType, width: u8, precision: u8) -> FieldDescriptor {
        FieldDescriptor::new("F1", ty, width, precision)
    }

    #[test]
    fn blank_fields_are_null() {
        let enc = CharacterEncoding::Utf8;
        assert_eq!(decode_value(&field(FieldType::Character, 4, 0), b"    ", enc), Ok(None));
        assert_eq!(decode_value(&field(FieldType::Numeric, 4, 0), b"    ", enc), Ok(None));
        assert_eq!(decode_value(&field(FieldType::Numeric, 4, 0), b"****", enc), Ok(None));
        assert_eq!(decode_value(&field(FieldType::Logical, 1, 0), b"?", enc), Ok(None));
    }

    #[test]
    fn numbers_follow_precision() {
        let enc = CharacterEncoding::Ascii;
        assert_eq!(decode_value(&field(FieldType::Numeric, 6, 0), b"    42", enc), Ok(Some("42".into())));
        assert_eq!(decode_value(&field(FieldType::Numeric, 8, 2), b"   3.1", enc), Ok(Some("3.10".into())));
        assert_eq!(decode_value(&field(FieldType::Float, 8, 0), b"  7.0000", enc), Ok(Some("7".into())));
        assert_eq!(
            decode_value(&field(FieldType::Numeric, 4, 0), b"12ab", enc),
            Err(ValueError::Numeric("F1".into())),
        );
    }

    #[test]
    fn wide_integers_keep_every_digit() {
        let enc = CharacterEncoding::Ascii;
        assert_eq!(
            decode_value(&field(FieldType::Numeric, 20, 0), b"12345678901234567890", enc),
            Ok(Some("12345678901234567890".into())),
        );
        assert_eq!(
            decode_value(&field(FieldType::Numeric, 22, 0), b" -00012345678901234567", enc),
            Ok(Some("-12345678901234567".into())),
        );
    }

    #[test]
    fn fractions_are_not_rounded_into_integers() {
        let enc = CharacterEncoding::Ascii;
        assert_eq!(
            decode_value(&field(FieldType::Numeric, 6, 0), b"   2.5", enc),
            Err(ValueError::Numeric("F1".into())),
        );
        assert_eq!(
            decode_value(&field(FieldType::Numeric, 6, 0), b"  1e10", enc),
            Err(ValueError::Numeric("F1".into())),
        );
    }

    #[test]
    fn decimals_are_padded_or_rounded_as_text() {
        assert_eq!(format_number("0.125", 2).as_deref(), Some("0.13"));
        assert_eq!(format_number("9.995", 2).as_deref(), Some("10.00"));
        assert_eq!(format_number("-.5", 3).as_deref(), Some("-0.500"));
        assert_eq!(format_number("-0.001", 2).as_deref(), Some("0.00"));
        assert_eq!(format_number("+12", 1).as_deref(), Some("12.0"));
        assert_eq!(format_number("123456789012.123456789", 9).as_deref(), Some("123456789012.123456789"));
        assert_eq!(format_number(".", 2), None);
        assert_eq!(format_number("1.2.3", 2), None);
    }

    #[test]
    fn undecodable_text_names_the_attribute() {
        let err = decode_value(&field(FieldType::Character, 2, 0), &[0x43, 0xe9], CharacterEncoding::Utf8).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to decode value in 'F1' attribute. Are you sure you're using the right character encoding?",
        );
    }

    #[test]
    fn unsupported_types_are_reported_by_code() {
        let memo = FieldDescriptor { name: "NOTES".into(), type_code: 'M', width: 10, precision: 0 };
        let err = decode_value(&memo, b"0000000001", CharacterEncoding::Utf8).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported attribute type: M");
    }

    #[test]
    fn dates_gain_separators() {
        let f = field(FieldType::Date, 8, 0);
        assert_eq!(decode_value(&f, b"20240229", CharacterEncoding::Ascii), Ok(Some("2024-02-29".into())));
        assert_eq!(encode_value(&f, Some("2024-02-29"), CharacterEncoding::Ascii), Ok(b"20240229".to_vec()));
        assert!(encode_value(&f, Some("29/02/2024"), CharacterEncoding::Ascii).is_err());
        assert_eq!(decode_value(&f, b"20241340", CharacterEncoding::Ascii), Err(ValueError::Date("F1".into())));
    }

    #[test]
    fn numbers_are_checked_against_width() {
        let f = field(FieldType::Numeric, 8, 2);
        assert_eq!(encode_value(&f, Some("3.14159"), CharacterEncoding::Ascii), Ok(b"    3.14".to_vec()));
        assert_eq!(encode_value(&f, None, CharacterEncoding::Ascii), Ok(b"        ".to_vec()));
        assert_eq!(
            encode_value(&f, Some("123456789"), CharacterEncoding::Ascii),
            Err(ValueError::TooWide { name: "F1".into(), width: 8 }),
        );
    }

    #[test]
    fn wide_numbers_are_written_digit_for_digit() {
        let f = field(FieldType::Numeric, 20, 0);
        assert_eq!(
            encode_value(&f, Some("12345678901234567890"), CharacterEncoding::Ascii),
            Ok(b"12345678901234567890".to_vec()),
        );
        let f = field(FieldType::Float, 12, 3);
        assert_eq!(encode_value(&f, Some("87.88"), CharacterEncoding::Ascii), Ok(b"      87.880".to_vec()));
        assert_eq!(
            encode_value(&field(FieldType::Numeric, 6, 0), Some("2.5"), CharacterEncoding::Ascii),
            Err(ValueError::Numeric("F1".into())),
        );
    }

    #[test]
    fn logical_values_take_one_byte() {
        let f = field(FieldType::Logical, 1, 0);
        assert_eq!(encode_value(&f, Some("yes"), CharacterEncoding::Ascii), Ok(b"T".to_vec()));
        assert_eq!(encode_value(&f, Some("F"), CharacterEncoding::Ascii), Ok(b"F".to_vec()));
        assert_eq!(encode_value(&f, None, CharacterEncoding::Ascii), Ok(b" ".to_vec()));
        assert_eq!(encode_value(&f, Some("maybe"), CharacterEncoding::Ascii), Err(ValueError::Logical("F1".into())));
    }

    #[test]
    fn text_is_checked_against_encoding() {
        let f = field(FieldType::Character, 4, 0);
        assert_eq!(encode_value(&f, Some("Café"), CharacterEncoding::Latin1), Ok(b"Caf\xe9".to_vec()));
        assert!(matches!(
            encode_value(&f, Some("Café"), CharacterEncoding::Ascii),
            Err(ValueError::Encode { .. }),
        ));
        assert_eq!(
            encode_value(&f, Some("Café"), CharacterEncoding::Utf8),
            Err(ValueError::TooWide { name: "F1".into(), width: 4 }),
        );
    }
}
