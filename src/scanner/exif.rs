use chrono::{NaiveDate, NaiveDateTime};
use std::io::Cursor;

/// EXIFから取り出した、キーワード判定に使う項目
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifSummary {
    pub taken_at: Option<NaiveDateTime>,
    pub has_gps: bool,
    pub make: Option<String>,
}

pub fn read_exif(bytes: &[u8]) -> Result<ExifSummary, exif::Error> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor)?;

    // DateTimeOriginal → DateTime の順に探す
    let taken_at = [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
        .iter()
        .filter_map(|tag| exif.get_field(*tag, exif::In::PRIMARY))
        .find_map(|field| parse_datetime(&field.value));

    let has_gps = exif.get_field(exif::Tag::GPSLatitude, exif::In::PRIMARY).is_some()
        && exif.get_field(exif::Tag::GPSLongitude, exif::In::PRIMARY).is_some();

    let make = exif
        .get_field(exif::Tag::Make, exif::In::PRIMARY)
        .and_then(|f| ascii_value(&f.value));

    Ok(ExifSummary {
        taken_at,
        has_gps,
        make,
    })
}

fn parse_datetime(value: &exif::Value) -> Option<NaiveDateTime> {
    let exif::Value::Ascii(ref parts) = *value else {
        return None;
    };
    let dt = exif::DateTime::from_ascii(parts.first()?).ok()?;
    NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?.and_hms_opt(
        dt.hour as u32,
        dt.minute as u32,
        dt.second as u32,
    )
}

fn ascii_value(value: &exif::Value) -> Option<String> {
    let exif::Value::Ascii(ref parts) = *value else {
        return None;
    };
    let text = String::from_utf8_lossy(parts.first()?)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string();
    (!text.is_empty()).then_some(text)
}
