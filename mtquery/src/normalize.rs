//! Field-name normalization for router output.
//!
//! Router commands report fields with dashed names (`mac-address`, `last-seen`). Everything
//! served by this crate uses camel-case (`macAddress`, `lastSeen`), so rows pass through
//! [`normalize`] before they are turned into typed values or returned to clients.
//!
//! The result keeps the cardinality rule clients of the original service depend on: no rows
//! serialize as `{}`, a single row serializes as that row, anything more as a list.

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::types::Record;

/// Normalized rows, shaped by how many there were.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Empty,
    One(Record),
    Many(Vec<Record>),
}

impl Normalized {
    fn from_records(mut records: Vec<Record>) -> Self {
        match records.len() {
            0 => Normalized::Empty,
            1 => Normalized::One(records.remove(0)),
            _ => Normalized::Many(records),
        }
    }

    /// Flatten back into a list regardless of cardinality.
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Normalized::Empty => Vec::new(),
            Normalized::One(record) => vec![record],
            Normalized::Many(records) => records,
        }
    }

    /// The single row, or the first one when several were returned.
    pub fn into_first(self) -> Option<Record> {
        self.into_records().into_iter().next()
    }
}

impl Serialize for Normalized {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Normalized::Empty => serializer.serialize_map(Some(0))?.end(),
            Normalized::One(record) => record.serialize(serializer),
            Normalized::Many(records) => records.serialize(serializer),
        }
    }
}

/// Project each record to `keys` (when given) and rewrite every key to camel-case.
pub fn normalize(records: Vec<Record>, keys: Option<&[&str]>) -> Normalized {
    let records = records
        .into_iter()
        .map(|record| match keys {
            Some(keys) => project(record, keys),
            None => record,
        })
        .map(camel_case_record)
        .collect();

    Normalized::from_records(records)
}

/// Keep only the allow-listed keys that are present, in allow-list order.
pub fn project(mut record: Record, keys: &[&str]) -> Record {
    keys.iter()
        .filter_map(|key| record.remove(*key).map(|value| (key.to_string(), value)))
        .collect()
}

fn camel_case_record(record: Record) -> Record {
    record.into_iter().map(|(key, value)| (camel_case_key(&key), value)).collect()
}

/// `mac-address` -> `macAddress`, `factory-firmware` -> `factoryFirmware`.
///
/// Splits on every non-alphanumeric character; the first segment is kept as-is and every
/// following segment is title-cased.
pub fn camel_case_key(key: &str) -> String {
    let mut segments = key.split(|c: char| !c.is_alphanumeric()).filter(|s| !s.is_empty());

    let mut out = segments.next().unwrap_or_default().to_string();
    for segment in segments {
        out.push_str(&title_case(segment));
    }
    out
}

// Upper-case the first letter of each alphabetic run, lower-case the rest.
fn title_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut in_word = false;
    for c in segment.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
